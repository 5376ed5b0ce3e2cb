//! OpenWeatherMap current weather receiver

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::warn;
use rg_pipe_core::Receiver;
use rg_pipe_types::ReceiverConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_UNITS: &str = "metric";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wind {
    pub speed: f64,
    pub deg: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

/// Flattened current weather for one location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwmResponse {
    pub city: String,
    pub country: String,
    /// Unix timestamps
    pub sunrise: u64,
    pub sunset: u64,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// hPa
    pub pressure: i64,
    /// Percent
    pub humidity: i64,
    pub wind: Wind,
    pub coord: Coord,
}

/// The parts of the API payload we keep
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiWeather {
    name: String,
    coord: Coord,
    sys: ApiSys,
    main: ApiMain,
    wind: Wind,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiSys {
    country: String,
    sunrise: u64,
    sunset: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiMain {
    temp: f64,
    pressure: i64,
    humidity: i64,
    temp_min: f64,
    temp_max: f64,
}

impl From<ApiWeather> for OwmResponse {
    fn from(api: ApiWeather) -> Self {
        Self {
            city: api.name,
            country: api.sys.country,
            sunrise: api.sys.sunrise,
            sunset: api.sys.sunset,
            temp: api.main.temp,
            temp_min: api.main.temp_min,
            temp_max: api.main.temp_max,
            pressure: api.main.pressure,
            humidity: api.main.humidity,
            wind: api.wind,
            coord: api.coord,
        }
    }
}

/// Build the query string pairs for a location
///
/// Numeric locations are city ids, anything else is a city name.
fn location_query(config: &ReceiverConfig) -> Result<Vec<(&'static str, String)>> {
    let location = match config.get("location") {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Number(id)) => id.to_string(),
        Some(_) => bail!("Owm: `location` must be a string or a city id"),
        None => bail!("Owm: `location` is required"),
    };

    let key = if location.parse::<u64>().is_ok() { "id" } else { "q" };
    let mut query = vec![(key, location)];

    if let Some(api_key) = config.get_str("apiKey") {
        query.push(("APPID", api_key.to_string()));
    }

    let units = match config.get_str("units") {
        None => DEFAULT_UNITS,
        Some(units @ ("metric" | "imperial")) => units,
        Some(other) => {
            warn!("Owm: unknown units `{}`, using `{}`", other, DEFAULT_UNITS);
            DEFAULT_UNITS
        }
    };
    query.push(("units", units.to_string()));
    Ok(query)
}

/// Current weather from the OpenWeatherMap API
///
/// Config keys: `location` (required, city name or numeric id), `apiKey`,
/// `units` (`metric` or `imperial`) and `url` to use another endpoint.
#[derive(Debug, Clone)]
pub struct OwmReceiver {
    client: reqwest::Client,
    url: String,
    query: Vec<(&'static str, String)>,
}

impl Default for OwmReceiver {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: API_URL.to_string(),
            query: Vec::new(),
        }
    }
}

#[async_trait]
impl Receiver for OwmReceiver {
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        self.query = location_query(config)?;
        if let Some(url) = config.get_str("url") {
            self.url = url.to_string();
        }
        self.client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Owm: cannot build HTTP client")?;
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<Value>> {
        let resp = self
            .client
            .get(&self.url)
            .query(&self.query)
            .send()
            .await
            .map_err(|e| anyhow!("Owm: cannot get response: {}", e))?;
        if !resp.status().is_success() {
            bail!("Owm: wrong status code: {}", resp.status().as_u16());
        }

        let weather: ApiWeather = resp.json().await.context("Owm: invalid response")?;
        Ok(Some(serde_json::to_value(OwmResponse::from(weather))?))
    }
}
