use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// --- Severity ---

/// Traffic-light risk level. RED outranks YELLOW outranks GREEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Red,
    Yellow,
    Green,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Red => write!(f, "RED"),
            Severity::Yellow => write!(f, "YELLOW"),
            Severity::Green => write!(f, "GREEN"),
        }
    }
}

impl Severity {
    /// Parse the wire/DB form, tolerating case and surrounding whitespace.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "RED" => Some(Severity::Red),
            "YELLOW" => Some(Severity::Yellow),
            "GREEN" => Some(Severity::Green),
            _ => None,
        }
    }
}

// --- Fingerprint ---

/// Deterministic content fingerprint for dedup: SHA-256 hex of the
/// trimmed, lowercased headline. Collision margin is far beyond the
/// tens of thousands of daily entries the store sees.
pub fn fingerprint(headline: &str) -> String {
    let normalized = headline.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

// --- Watchlist entities ---

/// A tracked company and its declared supply-chain nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<SupplyNode>,
}

impl Company {
    /// Minimal entry for a company requested by name but absent from the
    /// watchlist. The pipeline still runs for it, with no topology.
    pub fn ad_hoc(name: &str) -> Self {
        let ticker: String = name.chars().take(4).collect::<String>().to_uppercase();
        Self {
            name: name.to_string(),
            ticker,
            keywords: vec!["supply chain".to_string(), "disruption".to_string()],
            nodes: Vec::new(),
        }
    }
}

/// One declared node in a company's supply chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyNode {
    /// Supplier or facility name, e.g. "TSMC".
    pub entity: String,
    /// Human-readable location, e.g. "Tainan, Taiwan".
    pub location: String,
    /// Node kind, e.g. "semiconductor_fab", "assembly", "port".
    pub kind: String,
    pub lat: f64,
    pub lng: f64,
}

// --- Sensor records ---

/// A normalized news item from the news source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
}

/// A market quote with the derived volatility signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    pub previous_close: f64,
    pub change_pct: f64,
    pub volatility_label: String,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Neutral fallback when the market source fails or returns nothing.
    pub fn unknown(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            price: 0.0,
            previous_close: 0.0,
            change_pct: 0.0,
            volatility_label: "unknown".to_string(),
            fetched_at: Utc::now(),
        }
    }
}

/// A forecast slot flagged as severe within the next 24 hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub at: Option<DateTime<Utc>>,
    pub description: String,
    pub severity_label: String,
}

/// Current conditions plus upcoming alerts for one supply-chain node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature_c: f64,
    pub description: String,
    pub condition_code: u32,
    pub is_severe: bool,
    pub severity_label: String,
    pub alerts: Vec<WeatherAlert>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherReport {
    /// Neutral fallback when the weather source fails.
    pub fn unknown(location: &str) -> Self {
        Self {
            location: location.to_string(),
            temperature_c: 0.0,
            description: "unknown".to_string(),
            condition_code: 0,
            is_severe: false,
            severity_label: "unknown".to_string(),
            alerts: Vec::new(),
            fetched_at: Utc::now(),
        }
    }
}

// --- Risk events ---

/// An unstored, fully assessed event: what the orchestrator hands to the
/// store. The store assigns id/created_at and owns dedup.
#[derive(Debug, Clone)]
pub struct EventCandidate {
    pub company: String,
    pub category: String,
    pub severity: Severity,
    pub headline: String,
    pub source_url: Option<String>,
    pub market_impact: Option<f64>,
    pub weather_correlation: Option<String>,
    pub rationale: String,
    pub impact_estimate: String,
    pub mitigations: Vec<String>,
    pub confidence: f64,
}

/// A persisted risk event. `notified` flips once after routing and the
/// row is otherwise immutable; retention is an external concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: i64,
    pub company: String,
    pub category: String,
    pub severity: Severity,
    pub headline: String,
    pub fingerprint: String,
    pub source_url: Option<String>,
    pub market_impact: Option<f64>,
    pub weather_correlation: Option<String>,
    pub rationale: String,
    pub impact_estimate: String,
    pub mitigations: Vec<String>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub notified: bool,
}

/// Audit entry for one dispatch attempt. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub risk_event_id: i64,
    pub channel: String,
    pub status: String,
    pub sent_at: DateTime<Utc>,
}

/// A directed relation between two named entities, scoped to a company.
/// (source, target, relation, company) is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdgeRow {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub company: String,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let h = "TSMC warns of chip disruptions";
        assert_eq!(fingerprint(h), fingerprint(h));
    }

    #[test]
    fn fingerprint_normalizes_case_and_whitespace() {
        assert_eq!(fingerprint("  Chip Shortage Worsens  "), fingerprint("chip shortage worsens"));
        assert_eq!(fingerprint(" H "), fingerprint("h"));
    }

    #[test]
    fn fingerprint_distinguishes_different_headlines() {
        assert_ne!(fingerprint("port strike in rotterdam"), fingerprint("port strike in hamburg"));
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = fingerprint("anything");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn severity_wire_form_roundtrips() {
        let json = serde_json::to_string(&Severity::Red).unwrap();
        assert_eq!(json, "\"RED\"");
        let back: Severity = serde_json::from_str("\"YELLOW\"").unwrap();
        assert_eq!(back, Severity::Yellow);
    }

    #[test]
    fn severity_from_str_loose_tolerates_case() {
        assert_eq!(Severity::from_str_loose(" red "), Some(Severity::Red));
        assert_eq!(Severity::from_str_loose("Green"), Some(Severity::Green));
        assert_eq!(Severity::from_str_loose("ORANGE"), None);
    }

    #[test]
    fn ad_hoc_company_gets_truncated_ticker() {
        let c = Company::ad_hoc("Globex Corporation");
        assert_eq!(c.ticker, "GLOB");
        assert!(c.nodes.is_empty());
        assert!(!c.keywords.is_empty());
    }

    #[test]
    fn ad_hoc_company_short_name() {
        let c = Company::ad_hoc("3M");
        assert_eq!(c.ticker, "3M");
    }
}
