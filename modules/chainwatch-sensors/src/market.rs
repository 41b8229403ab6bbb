use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use llm_client::Pacer;
use tracing::{info, warn};

use chainwatch_common::Quote;

use crate::traits::MarketSource;

const ALPHA_VANTAGE_BASE: &str = "https://www.alphavantage.co/query";

/// |% change| above this gets the "high" volatility label.
const VOLATILITY_HIGH_THRESHOLD: f64 = 3.0;

/// Market sensor backed by Alpha Vantage GLOBAL_QUOTE.
/// The free tier allows 5 calls/minute, so every call goes through a
/// shared pacer with 12 s spacing.
pub struct AlphaVantageSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    pacer: Pacer,
    offline: bool,
}

impl AlphaVantageSource {
    pub fn new(api_key: Option<String>, pacer: Pacer, offline: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: ALPHA_VANTAGE_BASE.to_string(),
            api_key,
            pacer,
            offline,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn mock_quote(ticker: &str) -> Quote {
        Quote {
            ticker: ticker.to_string(),
            price: 185.42,
            previous_close: 182.10,
            change_pct: 1.82,
            volatility_label: "normal".to_string(),
            fetched_at: Utc::now(),
        }
    }
}

#[async_trait]
impl MarketSource for AlphaVantageSource {
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote> {
        let api_key = match (&self.api_key, self.offline) {
            (Some(key), false) => key,
            _ => {
                info!(ticker, "offline mode: returning mock quote");
                return Ok(Self::mock_quote(ticker));
            }
        };

        self.pacer.wait_turn().await;

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", ticker),
                ("apikey", api_key),
            ])
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await?
            .error_for_status()?;

        let data: serde_json::Value = response.json().await?;
        let quote = &data["Global Quote"];
        if quote.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            warn!(ticker, "Alpha Vantage returned an empty quote");
            return Ok(Quote::unknown(ticker));
        }

        let price = field_f64(quote, "05. price");
        let previous_close = field_f64(quote, "08. previous close");
        let change_pct = quote["10. change percent"]
            .as_str()
            .map(|s| s.trim_end_matches('%'))
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        let result = Quote {
            ticker: ticker.to_string(),
            price,
            previous_close,
            change_pct: (change_pct * 100.0).round() / 100.0,
            volatility_label: volatility_label(change_pct).to_string(),
            fetched_at: Utc::now(),
        };

        info!(ticker, price, change_pct, "quote fetched");
        Ok(result)
    }
}

fn field_f64(quote: &serde_json::Value, key: &str) -> f64 {
    quote[key].as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

/// Label the volatility signal from the percent change.
pub fn volatility_label(change_pct: f64) -> &'static str {
    if change_pct.abs() > VOLATILITY_HIGH_THRESHOLD {
        "high"
    } else {
        "normal"
    }
}
