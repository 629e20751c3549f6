use chrono_tz::Tz;
use serde_json::{Value, json};

use crate::localtime::{self, TimeFormat};
use crate::{Error, Result};

/// `get_current_time { format }`; only the submission layout is offered
///
/// # Errors
///
/// Returns a function error for any other format
pub fn get_current_time(args: &Value, tz: Tz) -> Result<Value> {
    match args.get("format").and_then(Value::as_str) {
        Some("submission") => Ok(json!({ "time": localtime::format_now(TimeFormat::Submission, tz) })),
        other => Err(Error::Function(format!("unsupported time format: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localtime::DEFAULT_TIMEZONE;

    #[test]
    fn test_submission_format() {
        let out = get_current_time(&json!({ "format": "submission" }), DEFAULT_TIMEZONE).unwrap();
        let time = out["time"].as_str().unwrap();
        // "11/29/24 at 4:59:10 PM"
        assert_eq!(&time[2..3], "/");
        assert!(time.ends_with("AM") || time.ends_with("PM"));
    }

    #[test]
    fn test_other_formats_rejected() {
        assert!(get_current_time(&json!({ "format": "iso" }), DEFAULT_TIMEZONE).is_err());
        assert!(get_current_time(&json!({}), DEFAULT_TIMEZONE).is_err());
    }
}
