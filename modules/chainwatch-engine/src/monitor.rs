//! One monitoring run: fetch, gate, analyze, store, route.
//!
//! Companies are isolated from each other. A failing feed or store
//! error inside one company bumps the error counter and the run moves
//! on; a clean company is never starved by a broken neighbor.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use chainwatch_agents::{AnalysisInput, Analyst, Gate};
use chainwatch_common::{Company, EventCandidate, Quote, SupplyNode, WeatherReport};
use chainwatch_graph::CausalGraph;
use chainwatch_sensors::{MarketSource, NewsSource, RunCache, WeatherSource};
use chainwatch_store::{EventStore, StoreOutcome};

use crate::notify::{route_pending, AlertChannel};
use crate::stats::RunStats;

pub struct Monitor {
    news: Box<dyn NewsSource>,
    market: Box<dyn MarketSource>,
    weather: Box<dyn WeatherSource>,
    gate: Box<dyn Gate>,
    analyst: Box<dyn Analyst>,
    store: Arc<EventStore>,
    channels: Vec<Box<dyn AlertChannel>>,
    companies: Vec<Company>,
}

impl Monitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        news: Box<dyn NewsSource>,
        market: Box<dyn MarketSource>,
        weather: Box<dyn WeatherSource>,
        gate: Box<dyn Gate>,
        analyst: Box<dyn Analyst>,
        store: Arc<EventStore>,
        channels: Vec<Box<dyn AlertChannel>>,
        companies: Vec<Company>,
    ) -> Self {
        Self {
            news,
            market,
            weather,
            gate,
            analyst,
            store,
            channels,
            companies,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Run the full pipeline once over every configured company.
    pub async fn run_once(&self) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let mut cache = RunCache::new();
        let mut graph = CausalGraph::new();

        for company in &self.companies {
            graph.add_static_topology(company);
            match self
                .process_company(company, &mut cache, &mut graph, &mut stats)
                .await
            {
                Ok(()) => stats.companies_processed += 1,
                Err(e) => {
                    warn!(company = %company.name, error = %e, "company run failed");
                    stats.errors += 1;
                }
            }

            match graph.persist(&self.store, &company.name).await {
                Ok(written) => stats.graph_edges_written += written as u32,
                Err(e) => {
                    warn!(company = %company.name, error = %e, "graph persistence failed");
                    stats.errors += 1;
                }
            }
        }

        // A routing failure must not discard the run summary.
        match route_pending(&self.store, &self.channels).await {
            Ok(sent) => stats.alerts_sent = sent,
            Err(e) => {
                warn!(error = %e, "alert routing failed");
                stats.errors += 1;
            }
        }
        info!(
            companies = stats.companies_processed,
            events = stats.events_stored,
            alerts = stats.alerts_sent,
            "run complete"
        );
        Ok(stats)
    }

    async fn process_company(
        &self,
        company: &Company,
        cache: &mut RunCache,
        graph: &mut CausalGraph,
        stats: &mut RunStats,
    ) -> Result<()> {
        let quote = self.quote_for(company, cache, stats).await;

        let articles = match self.news.fetch_news(&company.name, &company.keywords).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!(company = %company.name, error = %e, "news fetch failed");
                stats.errors += 1;
                Vec::new()
            }
        };
        stats.articles_fetched += articles.len() as u32;

        for article in &articles {
            if !self
                .gate
                .assess(&company.name, &article.title, &article.description)
                .await
            {
                continue;
            }
            stats.gate_passed += 1;

            // A disruption is assessed against the company's most
            // exposed node; the first declared node stands in for that
            // until per-article geocoding exists.
            let node = company.nodes.first();
            let weather = self.weather_for(node, cache, stats).await;

            let input = AnalysisInput {
                company: company.name.clone(),
                node_location: node
                    .map(|n| n.location.clone())
                    .unwrap_or_else(|| "unspecified".to_string()),
                node_kind: node
                    .map(|n| n.kind.clone())
                    .unwrap_or_else(|| "unspecified".to_string()),
                headline: article.title.clone(),
                summary: article.description.clone(),
                volatility_pct: quote.change_pct,
                weather_description: weather
                    .as_ref()
                    .map(|w| w.description.clone())
                    .unwrap_or_else(|| "unavailable".to_string()),
                weather_severity: weather
                    .as_ref()
                    .map(|w| w.severity_label.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
            };

            let assessment = self.analyst.analyze(&input).await;

            let candidate = EventCandidate {
                company: company.name.clone(),
                category: "supply_chain".to_string(),
                severity: assessment.severity,
                headline: article.title.clone(),
                source_url: (!article.url.is_empty()).then(|| article.url.clone()),
                market_impact: (quote.volatility_label != "unknown").then_some(quote.change_pct),
                weather_correlation: weather
                    .as_ref()
                    .filter(|w| w.is_severe)
                    .map(|w| w.severity_label.clone()),
                rationale: assessment.rationale,
                impact_estimate: assessment.impact_estimate,
                mitigations: assessment.mitigations,
                confidence: assessment.confidence,
            };

            match self.store.store(&candidate).await? {
                StoreOutcome::Stored(event) => {
                    stats.events_stored += 1;
                    if let Some(node) = node {
                        graph.add_event(&event.headline, &node.location, &event.category, event.severity);
                    }
                }
                StoreOutcome::Duplicate { fingerprint } => {
                    stats.duplicates_skipped += 1;
                    info!(company = %company.name, %fingerprint, "duplicate event skipped");
                }
            }
        }

        Ok(())
    }

    /// Quote for the company's ticker, memoized per run. Failures fall
    /// back to a neutral quote and count as errors.
    async fn quote_for(
        &self,
        company: &Company,
        cache: &mut RunCache,
        stats: &mut RunStats,
    ) -> Quote {
        if let Some(quote) = cache.quote(&company.ticker) {
            return quote.clone();
        }
        let quote = match self.market.fetch_quote(&company.ticker).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(ticker = %company.ticker, error = %e, "quote fetch failed");
                stats.errors += 1;
                Quote::unknown(&company.ticker)
            }
        };
        cache.put_quote(quote.clone());
        quote
    }

    /// Weather at the node, memoized per run. None when the company
    /// declares no nodes; failures fall back to a neutral report.
    async fn weather_for(
        &self,
        node: Option<&SupplyNode>,
        cache: &mut RunCache,
        stats: &mut RunStats,
    ) -> Option<WeatherReport> {
        let node = node?;
        if let Some(report) = cache.weather(node.lat, node.lng) {
            return Some(report.clone());
        }
        let report = match self
            .weather
            .fetch_weather(node.lat, node.lng, &node.location)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(location = %node.location, error = %e, "weather fetch failed");
                stats.errors += 1;
                WeatherReport::unknown(&node.location)
            }
        };
        cache.put_weather(node.lat, node.lng, report.clone());
        Some(report)
    }
}
