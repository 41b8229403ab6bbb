use std::sync::Arc;

use async_trait::async_trait;
use llm_client::{ChatClient, ChatMessage, ChatRequest};
use tracing::{info, warn};

use chainwatch_common::fingerprint;

const GATE_MODEL: &str = "llama-3.3-70b-versatile";

const SYSTEM_PROMPT: &str = "You are a fast triage assistant for a supply-chain risk \
monitoring system. Your ONLY job is to decide if a news article is directly relevant to \
supply-chain disruption, manufacturing delays, logistics problems, or significant \
financial risk for a specific company. Answer with a single word: YES or NO. No explanation.";

/// Binary relevance classifier applied before expensive analysis.
///
/// FAIL-OPEN is load-bearing: a transport error, timeout, or garbage
/// answer admits the article. Missing a real risk costs far more than
/// one wasted analysis call.
#[async_trait]
pub trait Gate: Send + Sync {
    async fn assess(&self, company: &str, headline: &str, summary: &str) -> bool;
}

pub struct LlmGate {
    client: Option<Arc<ChatClient>>,
    model: String,
}

impl LlmGate {
    /// `client: None` puts the gate in offline mode: a deterministic
    /// pseudo-random ~30% pass rate derived from the headline
    /// fingerprint, so dry runs still exercise the downstream stages.
    pub fn new(client: Option<Arc<ChatClient>>) -> Self {
        Self {
            client,
            model: GATE_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn offline_verdict(headline: &str) -> bool {
        // First fingerprint byte mod 10 < 3 ≈ 30% pass.
        let fp = fingerprint(headline);
        let byte = u8::from_str_radix(&fp[..2], 16).unwrap_or(0);
        byte % 10 < 3
    }

    fn prompt(company: &str, headline: &str, summary: &str) -> String {
        format!(
            "Analyze this news headline and summary for supply chain or financial risk \
relevance to {company}.\n\nHeadline: {headline}\nSummary: {summary}\n\nIs this directly \
relevant to supply chain disruption, manufacturing delays, or significant financial risk \
for {company}?\nAnswer ONLY with \"YES\" or \"NO\". No explanation."
        )
    }
}

#[async_trait]
impl Gate for LlmGate {
    async fn assess(&self, company: &str, headline: &str, summary: &str) -> bool {
        let client = match &self.client {
            Some(c) => c,
            None => {
                let verdict = Self::offline_verdict(headline);
                info!(company, verdict, "offline gate verdict");
                return verdict;
            }
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(Self::prompt(company, headline, summary)),
            ],
            temperature: Some(0.0),
            max_tokens: Some(5),
        };

        match client.chat(&request).await {
            Ok(answer) => {
                let pass = answer.trim().to_uppercase().starts_with("YES");
                info!(company, pass, "gate verdict");
                pass
            }
            Err(e) => {
                // Fail-open: admit the article rather than risk missing
                // a real disruption.
                warn!(company, error = %e, "gate call failed, admitting article");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_verdict_is_deterministic() {
        let h = "TSMC warns of chip disruptions";
        assert_eq!(LlmGate::offline_verdict(h), LlmGate::offline_verdict(h));
    }

    #[test]
    fn offline_verdict_varies_by_headline() {
        let verdicts: Vec<bool> = (0..50)
            .map(|i| LlmGate::offline_verdict(&format!("headline number {i}")))
            .collect();
        assert!(verdicts.iter().any(|v| *v));
        assert!(verdicts.iter().any(|v| !*v));
    }

    #[tokio::test]
    async fn offline_gate_uses_deterministic_verdict() {
        let gate = LlmGate::new(None);
        let h = "Port congestion eases in Shanghai";
        let expected = LlmGate::offline_verdict(h);
        assert_eq!(gate.assess("Apple Inc", h, "").await, expected);
    }
}
