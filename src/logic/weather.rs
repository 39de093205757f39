//! Weather Risk Advisor
//!
//! Current-conditions lookup against the OpenWeatherMap API plus a pure
//! humidity/temperature risk classifier with fixed thresholds.

use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherNow {
    pub temp_c: f32,
    pub humidity: f32,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    main: Option<ApiMain>,
    weather: Option<Vec<ApiWeather>>,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: Option<f32>,
    humidity: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiWeather {
    description: Option<String>,
}

/// Current conditions at the given coordinates. `None` on any HTTP failure,
/// non-success status or unparseable body; missing fields default rather
/// than fail.
pub async fn fetch_current(
    client: &reqwest::Client,
    lat: f64,
    lon: f64,
    api_key: &str,
) -> Option<WeatherNow> {
    let response = match client
        .get(constants::OPENWEATHER_URL)
        .query(&[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("units", "metric".to_string()),
            ("appid", api_key.to_string()),
        ])
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            log::debug!("Weather fetch failed: {}", e);
            return None;
        }
    };

    if !response.status().is_success() {
        log::debug!("Weather API returned status {}", response.status());
        return None;
    }

    match response.json::<ApiResponse>().await {
        Ok(body) => Some(parse_conditions(body)),
        Err(e) => {
            log::debug!("Weather body malformed: {}", e);
            None
        }
    }
}

fn parse_conditions(body: ApiResponse) -> WeatherNow {
    let main = body.main.unwrap_or(ApiMain {
        temp: None,
        humidity: None,
    });
    let description = body
        .weather
        .and_then(|w| w.into_iter().next())
        .and_then(|w| w.description)
        .unwrap_or_else(|| "n/a".to_string());

    WeatherNow {
        temp_c: main.temp.unwrap_or(0.0),
        humidity: main.humidity.unwrap_or(0.0),
        description,
    }
}

/// Coarse disease-risk tier from humidity (%) and temperature (deg C).
/// Pure and total: no state, no failure mode.
pub fn classify_risk(humidity: f32, temp_c: f32) -> RiskLevel {
    if humidity > 80.0 && (20.0..=30.0).contains(&temp_c) {
        RiskLevel::High
    } else if humidity > 60.0 && (18.0..=32.0).contains(&temp_c) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_tiers() {
        assert_eq!(classify_risk(85.0, 25.0), RiskLevel::High);
        assert_eq!(classify_risk(65.0, 25.0), RiskLevel::Medium);
        assert_eq!(classify_risk(40.0, 25.0), RiskLevel::Low);
    }

    #[test]
    fn humidity_threshold_is_strict() {
        // Exactly 80% humidity misses the High tier but clears Medium
        assert_eq!(classify_risk(80.0, 25.0), RiskLevel::Medium);
        assert_eq!(classify_risk(60.0, 25.0), RiskLevel::Low);
    }

    #[test]
    fn temperature_bounds_are_inclusive() {
        assert_eq!(classify_risk(85.0, 20.0), RiskLevel::High);
        assert_eq!(classify_risk(85.0, 30.0), RiskLevel::High);
        // High humidity outside the High temp band still rates Medium
        assert_eq!(classify_risk(85.0, 31.0), RiskLevel::Medium);
        assert_eq!(classify_risk(85.0, 35.0), RiskLevel::Low);
    }

    #[test]
    fn conditions_parse_with_defaults() {
        let body: ApiResponse = serde_json::from_str(
            r#"{"main":{"temp":24.5,"humidity":71},"weather":[{"description":"light rain"}]}"#,
        )
        .unwrap();
        let now = parse_conditions(body);
        assert_eq!(now.temp_c, 24.5);
        assert_eq!(now.humidity, 71.0);
        assert_eq!(now.description, "light rain");

        let sparse: ApiResponse = serde_json::from_str(r#"{}"#).unwrap();
        let now = parse_conditions(sparse);
        assert_eq!(now.temp_c, 0.0);
        assert_eq!(now.humidity, 0.0);
        assert_eq!(now.description, "n/a");
    }
}
