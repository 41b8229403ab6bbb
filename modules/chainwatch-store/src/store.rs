//! SQLite persistence for risk events, alert history, and graph edges.
//!
//! Dedup is windowed, not global: a fingerprint blocks re-insertion only
//! while a row with the same fingerprint exists inside the last
//! [`DEDUP_WINDOW_HOURS`]. The check and the insert are one conditional
//! `INSERT ... SELECT ... WHERE NOT EXISTS`, so concurrent writers of the
//! same fingerprint cannot both land inside a window.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{debug, info};

use chainwatch_common::{
    fingerprint, AlertRecord, EventCandidate, GraphEdgeRow, RiskEvent, Severity,
};

use crate::error::{Result, StoreError};

/// How long an identical headline suppresses re-insertion. A recurring
/// story (say a typhoon tracked across several days) produces a fresh
/// event once per window.
pub const DEDUP_WINDOW_HOURS: i64 = 24;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS risk_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company TEXT NOT NULL,
    category TEXT NOT NULL,
    severity TEXT NOT NULL,
    headline TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    source_url TEXT,
    market_impact REAL,
    weather_correlation TEXT,
    rationale TEXT NOT NULL,
    impact_estimate TEXT NOT NULL,
    mitigations TEXT NOT NULL,
    confidence REAL NOT NULL,
    created_at TEXT NOT NULL,
    notified INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_events_fingerprint_time
    ON risk_events (fingerprint, created_at);

CREATE TABLE IF NOT EXISTS alert_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    risk_event_id INTEGER NOT NULL REFERENCES risk_events (id),
    channel TEXT NOT NULL,
    status TEXT NOT NULL,
    sent_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS graph_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    relation TEXT NOT NULL,
    company TEXT NOT NULL,
    confidence REAL NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_edge
    ON graph_edges (source, target, relation, company);
"#;

/// Result of handing a candidate to the store.
#[derive(Debug, Clone)]
pub enum StoreOutcome {
    /// The candidate was new inside the window and is now persisted.
    Stored(RiskEvent),
    /// An event with the same fingerprint already exists inside the window.
    Duplicate { fingerprint: String },
}

pub struct EventStore {
    pool: SqlitePool,
}

/// Raw risk_events row before severity/mitigations are decoded.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i64,
    company: String,
    category: String,
    severity: String,
    headline: String,
    fingerprint: String,
    source_url: Option<String>,
    market_impact: Option<f64>,
    weather_correlation: Option<String>,
    rationale: String,
    impact_estimate: String,
    mitigations: String,
    confidence: f64,
    created_at: DateTime<Utc>,
    notified: bool,
}

impl TryFrom<EventRow> for RiskEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        let severity = Severity::from_str_loose(&row.severity).ok_or_else(|| {
            StoreError::Corrupt(format!("event {} has severity '{}'", row.id, row.severity))
        })?;
        let mitigations: Vec<String> = serde_json::from_str(&row.mitigations)?;
        Ok(RiskEvent {
            id: row.id,
            company: row.company,
            category: row.category,
            severity,
            headline: row.headline,
            fingerprint: row.fingerprint,
            source_url: row.source_url,
            market_impact: row.market_impact,
            weather_correlation: row.weather_correlation,
            rationale: row.rationale,
            impact_estimate: row.impact_estimate,
            mitigations,
            confidence: row.confidence,
            created_at: row.created_at,
            notified: row.notified,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: i64,
    risk_event_id: i64,
    channel: String,
    status: String,
    sent_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct EdgeRow {
    source: String,
    target: String,
    relation: String,
    company: String,
    confidence: f64,
}

impl EventStore {
    /// Open the database and ensure the schema exists.
    ///
    /// SQLite allows a single writer at a time; one pooled connection
    /// sidesteps busy errors and keeps `sqlite::memory:` coherent.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!(url, "event store ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Persist a candidate, deduplicating against the trailing window.
    pub async fn store(&self, candidate: &EventCandidate) -> Result<StoreOutcome> {
        self.store_at(candidate, Utc::now()).await
    }

    /// [`EventStore::store`] with an explicit timestamp, which also
    /// anchors the dedup window.
    pub async fn store_at(
        &self,
        candidate: &EventCandidate,
        created_at: DateTime<Utc>,
    ) -> Result<StoreOutcome> {
        let fp = fingerprint(&candidate.headline);
        let cutoff = created_at - Duration::hours(DEDUP_WINDOW_HOURS);
        let mitigations_json = serde_json::to_string(&candidate.mitigations)?;

        let result = sqlx::query(
            r#"
            INSERT INTO risk_events
                (company, category, severity, headline, fingerprint,
                 source_url, market_impact, weather_correlation,
                 rationale, impact_estimate, mitigations, confidence,
                 created_at, notified)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0
            WHERE NOT EXISTS (
                SELECT 1 FROM risk_events
                WHERE fingerprint = ?5 AND created_at > ?14
            )
            "#,
        )
        .bind(&candidate.company)
        .bind(&candidate.category)
        .bind(candidate.severity.to_string())
        .bind(&candidate.headline)
        .bind(&fp)
        .bind(&candidate.source_url)
        .bind(candidate.market_impact)
        .bind(&candidate.weather_correlation)
        .bind(&candidate.rationale)
        .bind(&candidate.impact_estimate)
        .bind(&mitigations_json)
        .bind(candidate.confidence)
        .bind(created_at)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(fingerprint = %fp, "duplicate inside dedup window");
            return Ok(StoreOutcome::Duplicate { fingerprint: fp });
        }

        Ok(StoreOutcome::Stored(RiskEvent {
            id: result.last_insert_rowid(),
            company: candidate.company.clone(),
            category: candidate.category.clone(),
            severity: candidate.severity,
            headline: candidate.headline.clone(),
            fingerprint: fp,
            source_url: candidate.source_url.clone(),
            market_impact: candidate.market_impact,
            weather_correlation: candidate.weather_correlation.clone(),
            rationale: candidate.rationale.clone(),
            impact_estimate: candidate.impact_estimate.clone(),
            mitigations: candidate.mitigations.clone(),
            confidence: candidate.confidence,
            created_at,
            notified: false,
        }))
    }

    /// Flip the notified flag. Idempotent.
    pub async fn mark_notified(&self, event_id: i64) -> Result<()> {
        sqlx::query("UPDATE risk_events SET notified = 1 WHERE id = ?1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append one dispatch attempt to the audit trail.
    pub async fn record_alert(&self, event_id: i64, channel: &str, status: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_history (risk_event_id, channel, status, sent_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(event_id)
        .bind(channel)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Events not yet routed, oldest first, optionally restricted to
    /// one severity.
    pub async fn pending_events(&self, severity: Option<Severity>) -> Result<Vec<RiskEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT * FROM risk_events
            WHERE notified = 0
              AND (?1 IS NULL OR severity = ?1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(severity.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RiskEvent::try_from).collect()
    }

    /// Events from the trailing window, newest first, optionally
    /// restricted to one company.
    pub async fn recent_events(&self, hours: i64, company: Option<&str>) -> Result<Vec<RiskEvent>> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT * FROM risk_events
            WHERE created_at > ?1
              AND (?2 IS NULL OR company = ?2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(cutoff)
        .bind(company)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RiskEvent::try_from).collect()
    }

    /// Dispatch attempts for one event, oldest first.
    pub async fn alerts_for_event(&self, event_id: i64) -> Result<Vec<AlertRecord>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT * FROM alert_history
            WHERE risk_event_id = ?1
            ORDER BY sent_at ASC, id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AlertRecord {
                id: r.id,
                risk_event_id: r.risk_event_id,
                channel: r.channel,
                status: r.status,
                sent_at: r.sent_at,
            })
            .collect())
    }

    /// Write one edge if absent. Returns true when the row is new.
    pub async fn upsert_edge(&self, edge: &GraphEdgeRow) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO graph_edges
                (source, target, relation, company, confidence)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&edge.source)
        .bind(&edge.target)
        .bind(&edge.relation)
        .bind(&edge.company)
        .bind(edge.confidence)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All persisted edges scoped to one company.
    pub async fn edges_for_company(&self, company: &str) -> Result<Vec<GraphEdgeRow>> {
        let rows = sqlx::query_as::<_, EdgeRow>(
            r#"
            SELECT source, target, relation, company, confidence
            FROM graph_edges
            WHERE company = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(company)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| GraphEdgeRow {
                source: r.source,
                target: r.target,
                relation: r.relation,
                company: r.company,
                confidence: r.confidence,
            })
            .collect())
    }
}
