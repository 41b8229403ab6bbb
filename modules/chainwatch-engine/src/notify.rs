//! Severity-based routing of stored events to alert channels.
//!
//! RED goes out on every channel immediately. YELLOW and GREEN stay
//! unnotified in the store, visible through `pending_events`, so a
//! human can sweep them on their own schedule without the pipeline
//! paging anyone.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use chainwatch_common::{RiskEvent, Severity};
use chainwatch_store::EventStore;

#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, event: &RiskEvent) -> Result<()>;
}

/// Writes a formatted alert block to stdout. The default channel.
pub struct ConsoleChannel;

#[async_trait]
impl AlertChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, event: &RiskEvent) -> Result<()> {
        println!("\n{}", "=".repeat(60));
        println!("  [{}] SUPPLY CHAIN RISK ALERT", event.severity);
        println!("{}", "=".repeat(60));
        println!("  Company:    {}", event.company);
        println!("  Headline:   {}", event.headline);
        println!("  Impact:     {}", event.impact_estimate);
        println!("  Rationale:  {}", event.rationale);
        println!("  Confidence: {:.0}%", event.confidence);
        if let Some(url) = &event.source_url {
            println!("  Source:     {url}");
        }
        println!("  Mitigations:");
        for m in &event.mitigations {
            println!("    - {m}");
        }
        println!("{}", "=".repeat(60));
        Ok(())
    }
}

/// Route every unnotified event. Returns the number of successful
/// channel sends. Each dispatch attempt lands in the audit trail;
/// a RED event is marked notified after its channel pass even when
/// some channels failed, so it is never re-paged on the next run.
pub async fn route_pending(
    store: &EventStore,
    channels: &[Box<dyn AlertChannel>],
) -> Result<u32> {
    let mut sent = 0u32;

    for event in store.pending_events(Some(Severity::Red)).await? {
        for channel in channels {
            match channel.send(&event).await {
                Ok(()) => {
                    store.record_alert(event.id, channel.name(), "sent").await?;
                    sent += 1;
                }
                Err(e) => {
                    warn!(
                        event_id = event.id,
                        channel = channel.name(),
                        error = %e,
                        "alert dispatch failed"
                    );
                    store
                        .record_alert(event.id, channel.name(), "failed")
                        .await?;
                }
            }
        }
        store.mark_notified(event.id).await?;
        info!(event_id = event.id, company = %event.company, "red event routed");
    }

    Ok(sent)
}
