use std::collections::HashMap;

use chainwatch_common::{Quote, WeatherReport};

/// Per-run memo for quote and weather fetches.
///
/// One `RunCache` is created at the start of an orchestrator run and
/// dropped with it, so there is no cross-run staleness and no
/// process-wide mutable state. The orchestrator consults the cache
/// before each fetch; free-tier quotas make repeat calls for the same
/// ticker or coordinate within a run pure waste.
#[derive(Debug, Default)]
pub struct RunCache {
    quotes: HashMap<String, Quote>,
    weather: HashMap<String, WeatherReport>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote(&self, ticker: &str) -> Option<&Quote> {
        self.quotes.get(ticker)
    }

    pub fn put_quote(&mut self, quote: Quote) {
        self.quotes.insert(quote.ticker.clone(), quote);
    }

    pub fn weather(&self, lat: f64, lng: f64) -> Option<&WeatherReport> {
        self.weather.get(&coord_key(lat, lng))
    }

    pub fn put_weather(&mut self, lat: f64, lng: f64, report: WeatherReport) {
        self.weather.insert(coord_key(lat, lng), report);
    }
}

/// Cache key with 4-decimal precision (~11 m), enough to collapse
/// repeated lookups for the same configured node.
fn coord_key(lat: f64, lng: f64) -> String {
    format!("{lat:.4},{lng:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn quote_roundtrip() {
        let mut cache = RunCache::new();
        assert!(cache.quote("AAPL").is_none());
        cache.put_quote(Quote::unknown("AAPL"));
        assert!(cache.quote("AAPL").is_some());
        assert!(cache.quote("TSLA").is_none());
    }

    #[test]
    fn weather_keyed_by_rounded_coordinates() {
        let mut cache = RunCache::new();
        let report = WeatherReport {
            location: "Tainan".to_string(),
            temperature_c: 30.0,
            description: "clear".to_string(),
            condition_code: 800,
            is_severe: false,
            severity_label: "normal".to_string(),
            alerts: Vec::new(),
            fetched_at: Utc::now(),
        };
        cache.put_weather(22.99, 120.22, report);
        assert!(cache.weather(22.99, 120.22).is_some());
        // Same cell after rounding
        assert!(cache.weather(22.99001, 120.22001).is_some());
        assert!(cache.weather(23.1, 120.22).is_none());
    }
}
