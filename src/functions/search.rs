use serde::Deserialize;
use serde_json::{Value, json};

use crate::{Error, Result};

const SEARCH_URL: &str = "https://www.google.com/search?q=";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    keywords: Vec<String>,
    site_url: String,
}

/// `format_google_search { keywords, siteUrl }` → `{ google_url }`
///
/// # Errors
///
/// Returns a function error when the arguments are malformed
pub fn format_google_search(args: &Value) -> Result<Value> {
    let args = SearchArgs::deserialize(args)
        .map_err(|e| Error::Function(format!("invalid search arguments: {e}")))?;

    let query = args
        .keywords
        .iter()
        .map(|k| urlencoding::encode(k))
        .collect::<Vec<_>>()
        .join("+");

    Ok(json!({ "google_url": format!("{SEARCH_URL}{query}+{}", args.site_url) }))
}
