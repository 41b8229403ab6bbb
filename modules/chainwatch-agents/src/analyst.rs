use std::sync::Arc;

use async_trait::async_trait;
use llm_client::{ChatClient, ChatMessage, ChatRequest};
use tracing::{info, warn};

use chainwatch_common::Severity;

use crate::decode::decode_assessment;

const ANALYST_MODEL: &str = "llama-3.3-70b-versatile";

const SYSTEM_PROMPT: &str = "You are a senior supply-chain risk analyst. You receive a \
news item about a company together with market and weather context for one of its supply \
nodes. Assess the disruption risk and respond with ONLY a JSON object, no markdown, no \
commentary, with exactly these fields:\n\
{\n\
  \"severity\": \"RED\" | \"YELLOW\" | \"GREEN\",\n\
  \"impact_estimate\": \"<one sentence business impact estimate>\",\n\
  \"reasoning\": \"<2-3 sentence causal chain from the event to the company>\",\n\
  \"mitigation_strategies\": [\"<concrete action>\", \"...\"],\n\
  \"confidence_score\": <number 0-100>\n\
}\n\
RED means likely material disruption within days. YELLOW means credible risk worth \
monitoring. GREEN means no meaningful supply-chain impact.";

/// Everything the analyst sees about one candidate event.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub company: String,
    pub node_location: String,
    pub node_kind: String,
    pub headline: String,
    pub summary: String,
    pub volatility_pct: f64,
    pub weather_description: String,
    pub weather_severity: String,
}

/// Structured risk assessment, post-validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub severity: Severity,
    pub impact_estimate: String,
    pub rationale: String,
    pub mitigations: Vec<String>,
    pub confidence: f64,
}

impl Assessment {
    /// Conservative stand-in when the model call or decode fails. The
    /// event still reaches the store and stays visible; the low
    /// confidence flags it for a human pass.
    pub fn fallback() -> Self {
        Self {
            severity: Severity::Yellow,
            impact_estimate: "Unquantified; automated analysis unavailable, manual review \
                              required"
                .to_string(),
            rationale: "Automated assessment failed; defaulting to cautionary severity."
                .to_string(),
            mitigations: vec![
                "Escalate to the supply-chain desk for manual review".to_string(),
                "Re-run automated analysis once the reasoning service recovers".to_string(),
                "Cross-check the headline against primary sources".to_string(),
            ],
            confidence: 20.0,
        }
    }
}

#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(&self, input: &AnalysisInput) -> Assessment;
}

pub struct LlmAnalyst {
    client: Option<Arc<ChatClient>>,
    model: String,
}

impl LlmAnalyst {
    /// `client: None` selects offline mode with canned assessments, so
    /// a dry run produces events without touching the network. The
    /// client is shared with the gate so both respect one pacer.
    pub fn new(client: Option<Arc<ChatClient>>) -> Self {
        Self {
            client,
            model: ANALYST_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn prompt(input: &AnalysisInput) -> String {
        format!(
            "Company: {company}\n\
             Supply node: {kind} in {location}\n\n\
             News headline: {headline}\n\
             News summary: {summary}\n\n\
             Market context: {company} stock moved {vol:+.2}% today.\n\
             Weather at the node: {weather} (severity: {wsev})\n\n\
             Assess the supply-chain disruption risk this event poses to {company} \
             through the {location} node. Respond with the JSON object only.",
            company = input.company,
            kind = input.node_kind,
            location = input.node_location,
            headline = input.headline,
            summary = input.summary,
            vol = input.volatility_pct,
            weather = input.weather_description,
            wsev = input.weather_severity,
        )
    }

    fn offline_assessment(input: &AnalysisInput) -> Assessment {
        // Severity keyed off the context the orchestrator already has,
        // so offline runs produce a plausible mix.
        let severity = if input.weather_severity != "normal" || input.volatility_pct.abs() > 3.0 {
            Severity::Red
        } else if input.volatility_pct.abs() > 1.0 {
            Severity::Yellow
        } else {
            Severity::Green
        };
        Assessment {
            severity,
            impact_estimate: format!(
                "Simulated impact estimate for {} via {}",
                input.company, input.node_location
            ),
            rationale: "Offline mode: assessment derived from market and weather context only."
                .to_string(),
            mitigations: vec![
                "Verify with live data sources".to_string(),
                "Review node exposure manually".to_string(),
            ],
            confidence: 50.0,
        }
    }
}

#[async_trait]
impl Analyst for LlmAnalyst {
    async fn analyze(&self, input: &AnalysisInput) -> Assessment {
        let client = match &self.client {
            Some(c) => c,
            None => {
                info!(company = %input.company, "offline analyst assessment");
                return Self::offline_assessment(input);
            }
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(Self::prompt(input)),
            ],
            temperature: Some(0.2),
            max_tokens: Some(1024),
        };

        let raw = match client.chat(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(company = %input.company, error = %e, "analyst call failed, using fallback");
                return Assessment::fallback();
            }
        };

        match decode_assessment(&raw) {
            Ok(assessment) => {
                info!(
                    company = %input.company,
                    severity = %assessment.severity,
                    confidence = assessment.confidence,
                    "analyst assessment decoded"
                );
                assessment
            }
            Err(e) => {
                warn!(company = %input.company, error = %e, "undecodable analyst output, using fallback");
                Assessment::fallback()
            }
        }
    }
}
