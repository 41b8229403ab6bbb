use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use chainwatch_common::Article;

use crate::traits::NewsSource;

const GOOGLE_NEWS_RSS: &str = "https://news.google.com/rss/search";
const MAX_ARTICLES: usize = 10;

/// News sensor backed by the Google News RSS search feed.
/// No API key and no hard rate limit, so failures are rare but the
/// caller still treats them as a degraded fetch, not a fatal one.
pub struct GoogleNewsSource {
    http: reqwest::Client,
    base_url: String,
    offline: bool,
}

impl GoogleNewsSource {
    pub fn new(offline: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GOOGLE_NEWS_RSS.to_string(),
            offline,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn mock_articles(company: &str) -> Vec<Article> {
        vec![Article {
            title: "Mock: Supply chain disruption reported".to_string(),
            description: format!("A mock supply chain event for {company}."),
            url: "https://example.com/mock".to_string(),
            published_at: Some(Utc::now()),
            source: "MockNews".to_string(),
        }]
    }
}

#[async_trait]
impl NewsSource for GoogleNewsSource {
    async fn fetch_news(&self, company: &str, _keywords: &[String]) -> Result<Vec<Article>> {
        if self.offline {
            info!(company, "offline mode: returning mock news");
            return Ok(Self::mock_articles(company));
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", company),
                ("hl", "en-US"),
                ("gl", "US"),
                ("ceid", "US:en"),
            ])
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes().await?;
        let feed = feed_rs::parser::parse(bytes.as_ref())?;

        let articles: Vec<Article> = feed
            .entries
            .into_iter()
            .take(MAX_ARTICLES)
            .map(|entry| {
                let title = entry.title.map(|t| t.content).unwrap_or_default();
                let description = entry
                    .summary
                    .map(|s| strip_html(&s.content))
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| title.clone());
                let url = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
                let source = entry
                    .source
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                Article {
                    title,
                    description,
                    url,
                    published_at: entry.published,
                    source,
                }
            })
            .collect();

        if articles.is_empty() {
            warn!(company, "news feed returned no entries");
        } else {
            info!(company, count = articles.len(), "news fetched");
        }
        Ok(articles)
    }
}

/// Drop HTML tags from feed descriptions, keeping the text content.
fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags() {
        assert_eq!(
            strip_html("<a href=\"https://x\">Chip shortage</a> hits <b>ports</b>"),
            "Chip shortage hits ports"
        );
    }

    #[test]
    fn strip_html_plain_text_unchanged() {
        assert_eq!(strip_html("no markup here"), "no markup here");
    }

    #[test]
    fn strip_html_trims_result() {
        assert_eq!(strip_html("  <p>body</p>  "), "body");
    }

    #[tokio::test]
    async fn offline_mode_returns_mock() {
        let source = GoogleNewsSource::new(true);
        let articles = source.fetch_news("Apple Inc", &[]).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert!(articles[0].description.contains("Apple Inc"));
    }
}
