//! Per-flow telemetry loops
//!
//! Each monitored flow runs one loop: decode the next digest record, log the
//! counters, repeat. The only blocking point is the digest receive; a watch
//! channel cancels the loop between receives so it can be stopped
//! deterministically. Malformed records are skipped with a warning; losing
//! the subscription is fatal to the loop and only to that loop.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::device::DeviceGateway;
use crate::digest::DigestRecord;
use crate::error::{FlowAdmError, Result};
use crate::types::{DigestEvent, FlowId, Strategy};

/// Telemetry loop for one monitored flow
pub struct TelemetryLoop {
    gateway: Arc<dyn DeviceGateway>,
    flow_id: FlowId,
    strategy: Strategy,
    shutdown: watch::Receiver<bool>,
    events: Option<mpsc::Sender<DigestEvent>>,
}

impl TelemetryLoop {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        flow_id: FlowId,
        strategy: Strategy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gateway,
            flow_id,
            strategy,
            shutdown,
            events: None,
        }
    }

    /// Forwards every decoded event to `sink` in addition to logging it
    pub fn with_event_sink(mut self, sink: mpsc::Sender<DigestEvent>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Runs until the shutdown signal fires or the subscription fails.
    ///
    /// The digest channel is enabled exactly once before the first receive;
    /// an enable left over from an earlier run is tolerated.
    pub async fn run(mut self) -> Result<()> {
        let digest_name = self.strategy.digest_name();
        self.ensure_digest_enabled(digest_name).await?;
        info!(
            "flow {}: {} telemetry loop listening on {}",
            self.flow_id,
            self.strategy.as_str(),
            digest_name
        );

        loop {
            let record = tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("flow {}: telemetry loop stopping", self.flow_id);
                        return Ok(());
                    }
                    continue;
                }
                record = self.gateway.next_digest() => record?,
            };
            self.handle_record(&record);
        }
    }

    async fn ensure_digest_enabled(&self, digest_name: &str) -> Result<()> {
        let config = self
            .gateway
            .digest_get_config(digest_name)
            .await
            .map_err(|e| FlowAdmError::ChannelError(e.to_string()))?;
        match config {
            Some(_) => {
                debug!("digest {} already enabled", digest_name);
                Ok(())
            }
            None => self
                .gateway
                .digest_enable(digest_name)
                .await
                .map_err(|e| FlowAdmError::ChannelError(e.to_string())),
        }
    }

    fn handle_record(&self, record: &DigestRecord) {
        if record.digest_name != self.strategy.digest_name() {
            debug!(
                "flow {}: ignoring record from {}",
                self.flow_id, record.digest_name
            );
            return;
        }

        // Records may batch several field-sets; only the first is read.
        let Some(entry) = record.entries.first() else {
            warn!("flow {}: digest record with no entries", self.flow_id);
            return;
        };

        match DigestEvent::decode(self.strategy, entry) {
            Ok(event) => {
                self.log_event(&event);
                if let Some(sink) = &self.events {
                    let _ = sink.try_send(event);
                }
            }
            Err(e) => warn!("flow {}: skipping record: {}", self.flow_id, e),
        }
    }

    fn log_event(&self, event: &DigestEvent) {
        match event {
            DigestEvent::Count { passed, blocked } => {
                info!("{} passed={} blocked={}", self.strategy.as_str(), passed, blocked);
            }
            DigestEvent::Threshold {
                threshold,
                passed,
                blocked,
            } => {
                info!(
                    "{} threshold={} passed={} blocked={}",
                    self.strategy.as_str(),
                    threshold,
                    passed,
                    blocked
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::InMemoryGateway;
    use crate::tables::{COUNT_DIGEST, WARM_UP_DIGEST};

    fn be32(value: u32) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    fn count_record(passed: u32, blocked: u32) -> DigestRecord {
        DigestRecord {
            digest_name: COUNT_DIGEST.to_string(),
            entries: vec![vec![be32(passed), be32(blocked)]],
        }
    }

    fn threshold_record(threshold: u32, passed: u32, blocked: u32) -> DigestRecord {
        DigestRecord {
            digest_name: WARM_UP_DIGEST.to_string(),
            entries: vec![vec![be32(threshold), be32(passed), be32(blocked)]],
        }
    }

    #[tokio::test]
    async fn test_counting_loop_decodes_and_forwards() {
        let (gateway, digest_tx) = InMemoryGateway::new();
        let gateway = Arc::new(gateway);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let task = tokio::spawn(
            TelemetryLoop::new(gateway.clone(), 1, Strategy::Direct, shutdown_rx)
                .with_event_sink(event_tx)
                .run(),
        );

        digest_tx.send(count_record(5, 3)).await.unwrap();
        let event = event_rx.recv().await.unwrap();
        assert_eq!(event, DigestEvent::Count { passed: 5, blocked: 3 });

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ramp_observing_loop_decodes_threshold() {
        let (gateway, digest_tx) = InMemoryGateway::new();
        let gateway = Arc::new(gateway);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let task = tokio::spawn(
            TelemetryLoop::new(gateway.clone(), 1, Strategy::WarmUp, shutdown_rx)
                .with_event_sink(event_tx)
                .run(),
        );

        digest_tx.send(threshold_record(600, 10, 1)).await.unwrap();
        let event = event_rx.recv().await.unwrap();
        assert_eq!(
            event,
            DigestEvent::Threshold {
                threshold: 600,
                passed: 10,
                blocked: 1
            }
        );

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_digest_enable_is_idempotent() {
        let (gateway, _digest_tx) = InMemoryGateway::new();
        let gateway = Arc::new(gateway);
        gateway.digest_enable(COUNT_DIGEST).await.unwrap();
        let enables_before = gateway
            .call_log()
            .iter()
            .filter(|c| c.starts_with("digest_enable"))
            .count();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let telemetry = TelemetryLoop::new(gateway.clone(), 1, Strategy::Direct, shutdown_rx);
        telemetry.ensure_digest_enabled(COUNT_DIGEST).await.unwrap();

        let enables_after = gateway
            .call_log()
            .iter()
            .filter(|c| c.starts_with("digest_enable"))
            .count();
        assert_eq!(enables_before, enables_after, "no second enable issued");
    }

    #[tokio::test]
    async fn test_subscription_failure_is_channel_error() {
        let (gateway, _digest_tx) = InMemoryGateway::new();
        let gateway = Arc::new(gateway);
        gateway.set_reachable(false);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let err = TelemetryLoop::new(gateway, 1, Strategy::Direct, shutdown_rx)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, FlowAdmError::ChannelError(_)));
    }

    #[tokio::test]
    async fn test_malformed_record_skipped_without_killing_loop() {
        let (gateway, digest_tx) = InMemoryGateway::new();
        let gateway = Arc::new(gateway);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let task = tokio::spawn(
            TelemetryLoop::new(gateway.clone(), 1, Strategy::Direct, shutdown_rx)
                .with_event_sink(event_tx)
                .run(),
        );

        // Wrong field count for the count layout: skipped, loop survives.
        digest_tx
            .send(DigestRecord {
                digest_name: COUNT_DIGEST.to_string(),
                entries: vec![vec![be32(600), be32(10), be32(1)]],
            })
            .await
            .unwrap();
        digest_tx.send(count_record(7, 2)).await.unwrap();

        let event = event_rx.recv().await.unwrap();
        assert_eq!(event, DigestEvent::Count { passed: 7, blocked: 2 });

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_record_from_other_channel_ignored() {
        let (gateway, digest_tx) = InMemoryGateway::new();
        let gateway = Arc::new(gateway);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let task = tokio::spawn(
            TelemetryLoop::new(gateway.clone(), 1, Strategy::Direct, shutdown_rx)
                .with_event_sink(event_tx)
                .run(),
        );

        digest_tx.send(threshold_record(600, 10, 1)).await.unwrap();
        digest_tx.send(count_record(1, 0)).await.unwrap();

        let event = event_rx.recv().await.unwrap();
        assert_eq!(event, DigestEvent::Count { passed: 1, blocked: 0 });

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_loop_stops_when_shutdown_sender_dropped() {
        let (gateway, _digest_tx) = InMemoryGateway::new();
        let gateway = Arc::new(gateway);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(
            TelemetryLoop::new(gateway, 1, Strategy::Direct, shutdown_rx).run(),
        );

        drop(shutdown_tx);
        task.await.unwrap().unwrap();
    }
}
