use serde_json::Value;

use super::required_str;
use crate::integrations::WeatherClient;
use crate::Result;

/// `get_weather { location }`
pub(super) async fn get_weather(client: &WeatherClient, args: &Value) -> Result<Value> {
    let location = required_str(args, "location")?;
    let report = client.forecast(location).await?;
    Ok(serde_json::to_value(report)?)
}
