use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use chainwatch_common::{WeatherAlert, WeatherReport};

use crate::traits::WeatherSource;

const OWM_CURRENT: &str = "https://api.openweathermap.org/data/2.5/weather";
const OWM_FORECAST: &str = "https://api.openweathermap.org/data/2.5/forecast";

const EXTREME_HEAT_C: f64 = 45.0;
const EXTREME_COLD_C: f64 = -30.0;

/// Weather sensor backed by OpenWeatherMap current conditions plus the
/// next 24 hours of the 3-hour forecast (8 slots) for upcoming alerts.
pub struct OpenWeatherSource {
    http: reqwest::Client,
    current_url: String,
    forecast_url: String,
    api_key: Option<String>,
    offline: bool,
}

impl OpenWeatherSource {
    pub fn new(api_key: Option<String>, offline: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            current_url: OWM_CURRENT.to_string(),
            forecast_url: OWM_FORECAST.to_string(),
            api_key,
            offline,
        }
    }

    pub fn with_base_urls(mut self, current: &str, forecast: &str) -> Self {
        self.current_url = current.to_string();
        self.forecast_url = forecast.to_string();
        self
    }

    fn mock_report(location: &str) -> WeatherReport {
        WeatherReport {
            location: location.to_string(),
            temperature_c: 28.0,
            description: "scattered clouds".to_string(),
            condition_code: 802,
            is_severe: false,
            severity_label: "normal".to_string(),
            alerts: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Scan the next 24 h of forecast slots for severe conditions.
    /// Advisory only: any failure yields an empty list, never an error.
    async fn fetch_forecast_alerts(&self, lat: f64, lng: f64, api_key: &str) -> Vec<WeatherAlert> {
        let result: Result<Vec<WeatherAlert>> = async {
            let response = self
                .http
                .get(&self.forecast_url)
                .query(&[
                    ("lat", lat.to_string()),
                    ("lon", lng.to_string()),
                    ("appid", api_key.to_string()),
                    ("units", "metric".to_string()),
                    ("cnt", "8".to_string()),
                ])
                .timeout(std::time::Duration::from_secs(15))
                .send()
                .await?
                .error_for_status()?;

            let data: serde_json::Value = response.json().await?;
            let slots = data["list"].as_array().cloned().unwrap_or_default();

            let mut alerts = Vec::new();
            for slot in &slots {
                let code = slot["weather"][0]["id"].as_u64().unwrap_or(0) as u32;
                let temp = slot["main"]["temp"].as_f64().unwrap_or(0.0);
                let (is_severe, label) = assess_severity(code, temp);
                if is_severe {
                    alerts.push(WeatherAlert {
                        at: slot["dt"]
                            .as_i64()
                            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
                        description: slot["weather"][0]["description"]
                            .as_str()
                            .unwrap_or("")
                            .to_string(),
                        severity_label: label.to_string(),
                    });
                }
            }
            Ok(alerts)
        }
        .await;

        match result {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(error = %e, "forecast fetch failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherSource {
    async fn fetch_weather(&self, lat: f64, lng: f64, location: &str) -> Result<WeatherReport> {
        let api_key = match (&self.api_key, self.offline) {
            (Some(key), false) => key.clone(),
            _ => {
                info!(location, "offline mode: returning mock weather");
                return Ok(Self::mock_report(location));
            }
        };

        let response = self
            .http
            .get(&self.current_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("appid", api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await?
            .error_for_status()?;

        let data: serde_json::Value = response.json().await?;
        let code = data["weather"][0]["id"].as_u64().unwrap_or(0) as u32;
        let temp_c = data["main"]["temp"].as_f64().unwrap_or(0.0);
        let description = data["weather"][0]["description"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let (is_severe, severity_label) = assess_severity(code, temp_c);
        let alerts = self.fetch_forecast_alerts(lat, lng, &api_key).await;

        let name = if location.is_empty() {
            data["name"].as_str().unwrap_or("").to_string()
        } else {
            location.to_string()
        };

        info!(location = %name, %description, temp_c, is_severe, "weather fetched");

        Ok(WeatherReport {
            location: name,
            temperature_c: (temp_c * 10.0).round() / 10.0,
            description,
            condition_code: code,
            is_severe,
            severity_label: severity_label.to_string(),
            alerts,
            fetched_at: Utc::now(),
        })
    }
}

/// Map an OpenWeatherMap condition code plus temperature to a severity
/// label. Codes 2xx (thunderstorm), 502-531 (heavy rain), 771 (squall),
/// and 781 (tornado) are severe, as are temperature extremes.
pub fn assess_severity(code: u32, temp_c: f64) -> (bool, &'static str) {
    let severe_code = matches!(code, 200..=232 | 502..=531 | 771 | 781);
    if severe_code {
        return (true, "severe_weather");
    }
    if temp_c >= EXTREME_HEAT_C {
        return (true, "extreme_heat");
    }
    if temp_c <= EXTREME_COLD_C {
        return (true, "extreme_cold");
    }
    (false, "normal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thunderstorm_codes_are_severe() {
        assert_eq!(assess_severity(200, 20.0), (true, "severe_weather"));
        assert_eq!(assess_severity(232, 20.0), (true, "severe_weather"));
    }

    #[test]
    fn heavy_rain_squall_tornado_are_severe() {
        assert_eq!(assess_severity(502, 20.0), (true, "severe_weather"));
        assert_eq!(assess_severity(531, 20.0), (true, "severe_weather"));
        assert_eq!(assess_severity(771, 20.0), (true, "severe_weather"));
        assert_eq!(assess_severity(781, 20.0), (true, "severe_weather"));
    }

    #[test]
    fn light_rain_is_not_severe() {
        assert_eq!(assess_severity(500, 20.0), (false, "normal"));
        assert_eq!(assess_severity(501, 20.0), (false, "normal"));
    }

    #[test]
    fn clear_sky_is_normal() {
        assert_eq!(assess_severity(800, 22.0), (false, "normal"));
    }

    #[test]
    fn extreme_temperatures_are_severe() {
        assert_eq!(assess_severity(800, 45.0), (true, "extreme_heat"));
        assert_eq!(assess_severity(800, -30.0), (true, "extreme_cold"));
        assert_eq!(assess_severity(800, 44.9), (false, "normal"));
        assert_eq!(assess_severity(800, -29.9), (false, "normal"));
    }

    #[test]
    fn severe_code_wins_over_temperature() {
        assert_eq!(assess_severity(781, 50.0), (true, "severe_weather"));
    }

    #[tokio::test]
    async fn missing_key_falls_back_to_mock() {
        let source = OpenWeatherSource::new(None, false);
        let report = source.fetch_weather(22.99, 120.22, "Tainan").await.unwrap();
        assert_eq!(report.location, "Tainan");
        assert!(!report.is_severe);
    }
}
