//! Open-Meteo weather API client
//!
//! This module resolves a widget's location to coordinates with the
//! Open-Meteo geocoding API and fetches current conditions plus a 5-day
//! forecast, normalized into a `WeatherReport`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Fetched, UpstreamClient};
use crate::error::FetchError;
use crate::store::Settings;

/// Base URL for the Open-Meteo forecast API
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Base URL for the Open-Meteo geocoding API
pub const GEOCODING_BASE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Coordinates used when a widget has neither a location nor stored coordinates (New York)
pub const DEFAULT_COORDINATES: (f64, f64) = (40.7128, -74.0060);

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min";
const FORECAST_DAYS: u8 = 5;

const SERVICE: &str = "Weather";

/// Types of weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Rain,
    Showers,
    Thunderstorm,
    Snow,
    Fog,
}

/// Temperature unit requested from the forecast provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Anything other than "fahrenheit" means celsius
    pub fn from_setting(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("fahrenheit") => TemperatureUnit::Fahrenheit,
            _ => TemperatureUnit::Celsius,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    }
}

/// Current conditions at the widget's location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: f64,
    pub wind_speed: f64,
    /// WMO weather code
    pub weather_code: u8,
    pub condition: WeatherCondition,
}

/// Forecast for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Local date, `YYYY-MM-DD`
    pub date: String,
    pub temperature_max: f64,
    pub temperature_min: f64,
    pub weather_code: u8,
    pub condition: WeatherCondition,
}

/// Weather widget payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub latitude: f64,
    pub longitude: f64,
    pub units: TemperatureUnit,
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}

/// Where the coordinates for a fetch came from
#[derive(Debug, Clone, Copy, PartialEq)]
enum Coordinates {
    /// Freshly geocoded from the `location` setting
    Geocoded(f64, f64),
    /// Previously stored `latitude`/`longitude`
    Stored(f64, f64),
    Default,
}

impl Coordinates {
    fn lat_lon(self) -> (f64, f64) {
        match self {
            Coordinates::Geocoded(lat, lon) | Coordinates::Stored(lat, lon) => (lat, lon),
            Coordinates::Default => DEFAULT_COORDINATES,
        }
    }
}

/// Client for fetching weather data from Open-Meteo
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    forecast_url: String,
    geocoding_url: String,
}

impl WeatherClient {
    /// Create a new WeatherClient against the public Open-Meteo endpoints
    pub fn new(client: Client) -> Self {
        Self::with_base_urls(client, OPEN_METEO_BASE_URL, GEOCODING_BASE_URL)
    }

    /// Create a new WeatherClient with custom endpoints
    pub fn with_base_urls(
        client: Client,
        forecast_url: impl Into<String>,
        geocoding_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            forecast_url: forecast_url.into(),
            geocoding_url: geocoding_url.into(),
        }
    }

    /// Decides which coordinates to use
    ///
    /// A `location` name always wins over stored coordinates, so a renamed
    /// location is never served with the old place's coordinates.
    async fn resolve_coordinates(&self, settings: &Settings) -> Result<Coordinates, FetchError> {
        if let Some(location) = settings.get("location").map(str::trim).filter(|l| !l.is_empty()) {
            let (lat, lon) = self.geocode(location).await?;
            return Ok(Coordinates::Geocoded(lat, lon));
        }

        match (
            settings.get_parsed::<f64>("latitude"),
            settings.get_parsed::<f64>("longitude"),
        ) {
            (Some(lat), Some(lon)) => Ok(Coordinates::Stored(lat, lon)),
            _ => Ok(Coordinates::Default),
        }
    }

    /// Geocodes a location name, keeping only the first match
    async fn geocode(&self, location: &str) -> Result<(f64, f64), FetchError> {
        let response = self
            .client
            .get(&self.geocoding_url)
            .query(&[("name", location), ("count", "1")])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::UpstreamError(format!(
                "Geocoding failed with status {}",
                response.status()
            )));
        }

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        let place = body
            .results
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| FetchError::NotFound(format!("Could not find location: {}", location)))?;

        debug!(location, lat = place.latitude, lon = place.longitude, "geocoded location");
        Ok((place.latitude, place.longitude))
    }

    /// Fetch the forecast for the given coordinates
    ///
    /// # Arguments
    /// * `lat` - Latitude coordinate
    /// * `lon` - Longitude coordinate
    /// * `units` - Temperature unit for all temperatures in the report
    pub async fn fetch_forecast(
        &self,
        lat: f64,
        lon: f64,
        units: TemperatureUnit,
    ) -> Result<WeatherReport, FetchError> {
        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("temperature_unit", units.as_str().to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", FORECAST_DAYS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::UpstreamError("Failed to fetch weather data".to_string()));
        }

        let api_response: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        parse_response(api_response, lat, lon, units)
    }
}

#[async_trait]
impl UpstreamClient for WeatherClient {
    async fn fetch(&self, settings: &Settings) -> Result<Fetched, FetchError> {
        let units = TemperatureUnit::from_setting(settings.get("units"));
        let coordinates = self.resolve_coordinates(settings).await?;
        let (lat, lon) = coordinates.lat_lon();

        let report = self.fetch_forecast(lat, lon, units).await?;
        let fetched = Fetched::from_serialize(&report)?;

        Ok(match coordinates {
            Coordinates::Geocoded(lat, lon) => fetched
                .with_derived("latitude", lat.to_string())
                .with_derived("longitude", lon.to_string()),
            _ => fetched,
        })
    }

    fn fetch_keys(&self) -> &'static [&'static str] {
        &["location", "units"]
    }

    fn derived_keys(&self) -> &'static [&'static str] {
        &["latitude", "longitude"]
    }
}

/// Parse the Open-Meteo API response into a WeatherReport
fn parse_response(
    response: OpenMeteoResponse,
    latitude: f64,
    longitude: f64,
    units: TemperatureUnit,
) -> Result<WeatherReport, FetchError> {
    let current = response.current;
    let daily = response.daily;

    let len = daily.time.len();
    if daily.weather_code.len() != len
        || daily.temperature_2m_max.len() != len
        || daily.temperature_2m_min.len() != len
    {
        return Err(FetchError::UpstreamError(
            "Weather response has inconsistent daily arrays".to_string(),
        ));
    }

    // Days with a null reading are dropped rather than failing the forecast
    let daily = (0..len)
        .filter_map(|i| {
            let weather_code = daily.weather_code[i]?;
            Some(DailyForecast {
                date: daily.time[i].clone(),
                temperature_max: daily.temperature_2m_max[i]?,
                temperature_min: daily.temperature_2m_min[i]?,
                weather_code,
                condition: weather_code_to_condition(weather_code),
            })
        })
        .collect();

    Ok(WeatherReport {
        latitude,
        longitude,
        units,
        current: CurrentConditions {
            temperature: current.temperature_2m,
            humidity: current.relative_humidity_2m,
            wind_speed: current.wind_speed_10m,
            weather_code: current.weather_code,
            condition: weather_code_to_condition(current.weather_code),
        },
        daily,
    })
}

/// Map WMO weather code to WeatherCondition enum
///
/// Weather codes from WMO (World Meteorological Organization):
/// - 0: Clear sky
/// - 1-3: Partly cloudy
/// - 45, 48: Fog
/// - 51-55: Drizzle
/// - 56-57: Freezing drizzle
/// - 61-65: Rain
/// - 66-67: Freezing rain
/// - 71-77: Snow
/// - 80-82: Rain showers
/// - 85-86: Snow showers
/// - 95-99: Thunderstorm
pub fn weather_code_to_condition(code: u8) -> WeatherCondition {
    match code {
        0 => WeatherCondition::Clear,
        1..=3 => WeatherCondition::PartlyCloudy,
        45 | 48 => WeatherCondition::Fog,
        51..=55 | 61..=65 | 80..=82 => WeatherCondition::Rain,
        56..=57 | 66..=67 => WeatherCondition::Showers,
        71..=77 | 85..=86 => WeatherCondition::Snow,
        95..=99 => WeatherCondition::Thunderstorm,
        _ => WeatherCondition::Cloudy,
    }
}

/// Geocoding API response; `results` is absent when nothing matched
#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

/// Open-Meteo API response structure
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: CurrentWeather,
    daily: DailyWeather,
}

/// Current weather data from Open-Meteo
#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    weather_code: u8,
    wind_speed_10m: f64,
}

/// Daily weather data from Open-Meteo
#[derive(Debug, Deserialize)]
struct DailyWeather {
    time: Vec<String>,
    weather_code: Vec<Option<u8>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
}
