use chrono::{Duration, Utc};

use chainwatch_common::{EventCandidate, GraphEdgeRow, Severity};
use chainwatch_store::{EventStore, StoreOutcome};

fn candidate(headline: &str) -> EventCandidate {
    EventCandidate {
        company: "TSMC".to_string(),
        category: "news".to_string(),
        severity: Severity::Red,
        headline: headline.to_string(),
        source_url: Some("https://example.com/a".to_string()),
        market_impact: Some(-4.2),
        weather_correlation: None,
        rationale: "Fab shutdown overlaps with peak demand.".to_string(),
        impact_estimate: "10-15% quarterly revenue at risk".to_string(),
        mitigations: vec!["Qualify second source".to_string()],
        confidence: 82.0,
    }
}

async fn store() -> EventStore {
    EventStore::connect("sqlite::memory:").await.unwrap()
}

#[tokio::test]
async fn stores_new_event_and_returns_row() {
    let store = store().await;
    match store.store(&candidate("Earthquake halts fab")).await.unwrap() {
        StoreOutcome::Stored(event) => {
            assert!(event.id > 0);
            assert_eq!(event.company, "TSMC");
            assert_eq!(event.severity, Severity::Red);
            assert!(!event.notified);
            assert_eq!(event.fingerprint.len(), 64);
        }
        StoreOutcome::Duplicate { .. } => panic!("first insert must store"),
    }
}

#[tokio::test]
async fn duplicate_inside_window_is_rejected() {
    let store = store().await;
    let c = candidate("Port strike in Kaohsiung");
    assert!(matches!(
        store.store(&c).await.unwrap(),
        StoreOutcome::Stored(_)
    ));
    assert!(matches!(
        store.store(&c).await.unwrap(),
        StoreOutcome::Duplicate { .. }
    ));
}

#[tokio::test]
async fn dedup_normalizes_case_and_whitespace() {
    let store = store().await;
    assert!(matches!(
        store.store(&candidate("Chip Shortage Worsens")).await.unwrap(),
        StoreOutcome::Stored(_)
    ));
    assert!(matches!(
        store.store(&candidate("  chip shortage worsens ")).await.unwrap(),
        StoreOutcome::Duplicate { .. }
    ));
}

#[tokio::test]
async fn same_headline_outside_window_stores_again() {
    let store = store().await;
    let c = candidate("Typhoon approaching Taiwan");
    let t0 = Utc::now() - Duration::hours(25);
    assert!(matches!(
        store.store_at(&c, t0).await.unwrap(),
        StoreOutcome::Stored(_)
    ));
    assert!(matches!(
        store.store(&c).await.unwrap(),
        StoreOutcome::Stored(_)
    ));
    assert_eq!(store.recent_events(48, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn distinct_headlines_both_store() {
    let store = store().await;
    assert!(matches!(
        store.store(&candidate("Strike at port A")).await.unwrap(),
        StoreOutcome::Stored(_)
    ));
    assert!(matches!(
        store.store(&candidate("Strike at port B")).await.unwrap(),
        StoreOutcome::Stored(_)
    ));
}

#[tokio::test]
async fn concurrent_same_fingerprint_stores_exactly_once() {
    let store = store().await;
    let c = candidate("Factory fire in Shenzhen");
    let (a, b) = tokio::join!(store.store(&c), store.store(&c));
    let stored = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|o| matches!(o, StoreOutcome::Stored(_)))
        .count();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn pending_then_mark_notified() {
    let store = store().await;
    let event = match store.store(&candidate("Flood near supplier")).await.unwrap() {
        StoreOutcome::Stored(e) => e,
        StoreOutcome::Duplicate { .. } => panic!("first insert must store"),
    };

    let pending = store.pending_events(None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, event.id);

    store.mark_notified(event.id).await.unwrap();
    assert!(store.pending_events(None).await.unwrap().is_empty());

    // Idempotent
    store.mark_notified(event.id).await.unwrap();
    let recent = store.recent_events(24, None).await.unwrap();
    assert!(recent[0].notified);
}

#[tokio::test]
async fn pending_events_filters_by_severity() {
    let store = store().await;
    let mut red = candidate("Red headline");
    red.severity = Severity::Red;
    let mut green = candidate("Green headline");
    green.severity = Severity::Green;
    store.store(&red).await.unwrap();
    store.store(&green).await.unwrap();

    let reds = store.pending_events(Some(Severity::Red)).await.unwrap();
    assert_eq!(reds.len(), 1);
    assert_eq!(reds[0].headline, "Red headline");
    assert_eq!(store.pending_events(None).await.unwrap().len(), 2);
    assert!(store
        .pending_events(Some(Severity::Yellow))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn recent_events_respects_window_and_company_filter() {
    let store = store().await;
    let now = Utc::now();
    store
        .store_at(&candidate("old headline"), now - Duration::hours(30))
        .await
        .unwrap();
    store
        .store_at(&candidate("fresh headline"), now - Duration::hours(1))
        .await
        .unwrap();
    let mut other = candidate("other company headline");
    other.company = "NVIDIA".to_string();
    store.store_at(&other, now - Duration::hours(2)).await.unwrap();

    let last_day = store.recent_events(24, None).await.unwrap();
    assert_eq!(last_day.len(), 2);
    assert_eq!(last_day[0].headline, "fresh headline");
    assert_eq!(last_day[1].headline, "other company headline");

    let tsmc_only = store.recent_events(24, Some("TSMC")).await.unwrap();
    assert_eq!(tsmc_only.len(), 1);
    assert_eq!(tsmc_only[0].headline, "fresh headline");

    assert_eq!(store.recent_events(48, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn roundtrips_mitigations_and_optional_fields() {
    let store = store().await;
    let mut c = candidate("Supplier bankruptcy filing");
    c.mitigations = vec!["Find alternate".to_string(), "Buy ahead".to_string()];
    c.source_url = None;
    c.market_impact = None;
    c.weather_correlation = Some("severe_weather".to_string());
    store.store(&c).await.unwrap();

    let events = store.recent_events(24, None).await.unwrap();
    assert_eq!(events[0].mitigations, c.mitigations);
    assert_eq!(events[0].source_url, None);
    assert_eq!(events[0].market_impact, None);
    assert_eq!(
        events[0].weather_correlation.as_deref(),
        Some("severe_weather")
    );
}

#[tokio::test]
async fn alert_history_appends_per_attempt() {
    let store = store().await;
    let event = match store.store(&candidate("Rail outage")).await.unwrap() {
        StoreOutcome::Stored(e) => e,
        StoreOutcome::Duplicate { .. } => panic!("first insert must store"),
    };

    store.record_alert(event.id, "console", "sent").await.unwrap();
    store.record_alert(event.id, "webhook", "failed").await.unwrap();

    let alerts = store.alerts_for_event(event.id).await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].channel, "console");
    assert_eq!(alerts[1].status, "failed");
}

#[tokio::test]
async fn upsert_edge_is_idempotent() {
    let store = store().await;
    let edge = GraphEdgeRow {
        source: "Tainan, Taiwan".to_string(),
        target: "TSMC".to_string(),
        relation: "manufactures_at".to_string(),
        company: "Apple Inc".to_string(),
        confidence: 1.0,
    };
    assert!(store.upsert_edge(&edge).await.unwrap());
    assert!(!store.upsert_edge(&edge).await.unwrap());

    let edges = store.edges_for_company("Apple Inc").await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0], edge);
}

#[tokio::test]
async fn edges_scoped_by_company() {
    let store = store().await;
    let mut edge = GraphEdgeRow {
        source: "TSMC".to_string(),
        target: "Apple Inc".to_string(),
        relation: "supplies".to_string(),
        company: "Apple Inc".to_string(),
        confidence: 1.0,
    };
    store.upsert_edge(&edge).await.unwrap();
    edge.company = "NVIDIA".to_string();
    edge.target = "NVIDIA".to_string();
    store.upsert_edge(&edge).await.unwrap();

    assert_eq!(store.edges_for_company("Apple Inc").await.unwrap().len(), 1);
    assert_eq!(store.edges_for_company("NVIDIA").await.unwrap().len(), 1);
    assert!(store.edges_for_company("Globex").await.unwrap().is_empty());
}
