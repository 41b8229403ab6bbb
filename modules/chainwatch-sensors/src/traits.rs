//! Trait seams for the three external signal sources.
//!
//! The orchestrator is generic over these so tests run against
//! in-memory implementations and production wires the HTTP sensors.

use anyhow::Result;
use async_trait::async_trait;
use chainwatch_common::{Article, Quote, WeatherReport};

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch recent articles for a company query. An empty vec is a
    /// valid, non-error outcome.
    async fn fetch_news(&self, company: &str, keywords: &[String]) -> Result<Vec<Article>>;
}

#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote>;
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, lat: f64, lng: f64, location: &str) -> Result<WeatherReport>;
}
