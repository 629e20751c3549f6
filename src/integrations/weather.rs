//! Weather forecast integration (weatherapi.com)

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// Days of forecast requested
const FORECAST_DAYS: &str = "3";

/// Client for the forecast endpoint
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl WeatherClient {
    #[must_use]
    pub fn new(api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Current conditions and a three day forecast for `location`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is invalid
    pub async fn forecast(&self, location: &str) -> Result<WeatherReport> {
        let url = format!("{}/forecast.json", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.expose_secret()),
                ("q", location),
                ("days", FORECAST_DAYS),
                ("aqi", "no"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Integration(format!(
                "weather API error: {status} - {body}"
            )));
        }

        let raw: ForecastResponse = response.json().await?;
        Ok(raw.into())
    }
}

/// Condensed weather data handed back to the assistant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub temp_f: f64,
    pub feels_like_f: f64,
    pub condition: String,
    pub wind_mph: f64,
    pub wind_dir: String,
    pub humidity: f64,
    pub precip_in: f64,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: String,
    pub max_temp_f: f64,
    pub min_temp_f: f64,
    pub condition: String,
    pub chance_of_rain: f64,
    pub total_precip_in: f64,
    pub max_wind_mph: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: RawCurrent,
    forecast: RawForecast,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    temp_f: f64,
    feelslike_f: f64,
    condition: RawCondition,
    wind_mph: f64,
    wind_dir: String,
    humidity: f64,
    precip_in: f64,
    last_updated: String,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    forecastday: Vec<RawForecastDay>,
}

#[derive(Debug, Deserialize)]
struct RawForecastDay {
    date: String,
    day: RawDay,
}

#[derive(Debug, Deserialize)]
struct RawDay {
    maxtemp_f: f64,
    mintemp_f: f64,
    condition: RawCondition,
    // Sent as a number, older payloads used a string
    #[serde(deserialize_with = "number_or_string")]
    daily_chance_of_rain: f64,
    totalprecip_in: f64,
    maxwind_mph: f64,
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl From<ForecastResponse> for WeatherReport {
    fn from(raw: ForecastResponse) -> Self {
        let current = raw.current;
        Self {
            current: CurrentConditions {
                temp_f: current.temp_f,
                feels_like_f: current.feelslike_f,
                condition: current.condition.text,
                wind_mph: current.wind_mph,
                wind_dir: current.wind_dir,
                humidity: current.humidity,
                precip_in: current.precip_in,
                last_updated: current.last_updated,
            },
            forecast: raw
                .forecast
                .forecastday
                .into_iter()
                .map(|d| ForecastDay {
                    date: d.date,
                    max_temp_f: d.day.maxtemp_f,
                    min_temp_f: d.day.mintemp_f,
                    condition: d.day.condition.text,
                    chance_of_rain: d.day.daily_chance_of_rain,
                    total_precip_in: d.day.totalprecip_in,
                    max_wind_mph: d.day.maxwind_mph,
                })
                .collect(),
        }
    }
}
