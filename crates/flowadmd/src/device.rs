//! Device gateway: the narrow contract flowadmd uses to talk to the
//! forwarding device
//!
//! Rule install, register writes and digest subscription all go through
//! [`DeviceGateway`]. The handle is acquired once at controller start and
//! shared for the controller's lifetime. [`InMemoryGateway`] is the
//! in-memory backend used by tests and development runs; a production
//! gateway (e.g. a P4Runtime client) implements the same trait.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::digest::DigestRecord;
use crate::error::{FlowAdmError, Result};

/// Device-side digest channel configuration, as reported by
/// [`DeviceGateway::digest_get_config`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DigestConfig {
    /// Maximum entries the device batches into one record
    pub max_list_size: u32,
    /// Nanoseconds the device buffers entries before pushing a record
    pub max_timeout_ns: u64,
}

/// Narrow contract to the forwarding device
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Clears all installed rules and state; called once at startup
    async fn reset_device_state(&self) -> Result<()>;

    /// Installs the default action on a table
    async fn set_default_action(&self, table: &str, action: &str, params: &[u64]) -> Result<()>;

    /// Mirrors matched traffic to the given ports
    async fn create_clone_session(&self, session_id: u32, ports: &[u32]) -> Result<()>;

    /// Removes every entry from a table
    async fn clear_table(&self, table: &str) -> Result<()>;

    /// Removes the entry matching `match_key`, if present
    async fn remove_table_entry(&self, table: &str, match_key: &str) -> Result<()>;

    /// Adds one table entry with an ordered action-parameter tuple
    async fn add_table_entry(
        &self,
        table: &str,
        action: &str,
        match_key: &str,
        action_params: &[u64],
    ) -> Result<()>;

    /// Writes one register cell
    async fn write_register(&self, name: &str, index: u32, value: u64) -> Result<()>;

    /// Returns the digest channel configuration, or `None` if the channel
    /// has not been enabled
    async fn digest_get_config(&self, name: &str) -> Result<Option<DigestConfig>>;

    /// Enables digest generation on a channel
    async fn digest_enable(&self, name: &str) -> Result<()>;

    /// Blocks until the device pushes the next digest record
    async fn next_digest(&self) -> Result<DigestRecord>;
}

/// One installed table entry, kept for inspection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub match_key: String,
    pub action: String,
    pub action_params: Vec<u64>,
}

#[derive(Default)]
struct DeviceState {
    tables: HashMap<String, Vec<TableEntry>>,
    default_actions: HashMap<String, String>,
    registers: HashMap<String, HashMap<u32, u64>>,
    clone_sessions: HashMap<u32, Vec<u32>>,
    enabled_digests: HashSet<String>,
    call_log: Vec<String>,
}

/// In-memory device backend
///
/// Records every gateway call, stores tables and registers, and serves
/// digest records from a feed the caller injects into. The reachability
/// switch lets tests exercise the `DeviceUnreachable` paths.
pub struct InMemoryGateway {
    state: Mutex<DeviceState>,
    digests: tokio::sync::Mutex<mpsc::Receiver<DigestRecord>>,
    reachable: AtomicBool,
}

impl InMemoryGateway {
    /// Creates a gateway plus the sender used to feed digest records into it
    pub fn new() -> (Self, mpsc::Sender<DigestRecord>) {
        let (tx, rx) = mpsc::channel(64);
        let gateway = Self {
            state: Mutex::new(DeviceState::default()),
            digests: tokio::sync::Mutex::new(rx),
            reachable: AtomicBool::new(true),
        };
        (gateway, tx)
    }

    /// Flips the simulated device connection up or down
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Entries currently installed in a table
    pub fn table_entries(&self, table: &str) -> Vec<TableEntry> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    /// Default action installed on a table, if any
    pub fn default_action(&self, table: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.default_actions.get(table).cloned()
    }

    /// Value of one register cell, if it has been written
    pub fn register_value(&self, name: &str, index: u32) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state.registers.get(name).and_then(|r| r.get(&index)).copied()
    }

    /// Ports of a clone session, if it exists
    pub fn clone_session(&self, session_id: u32) -> Option<Vec<u32>> {
        let state = self.state.lock().unwrap();
        state.clone_sessions.get(&session_id).cloned()
    }

    /// Whether digest generation is enabled on a channel
    pub fn digest_enabled(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.enabled_digests.contains(name)
    }

    /// Ordered log of every gateway call issued so far
    pub fn call_log(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.call_log.clone()
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FlowAdmError::DeviceUnreachable(
                "in-memory gateway marked unreachable".to_string(),
            ))
        }
    }
}

#[async_trait]
impl DeviceGateway for InMemoryGateway {
    async fn reset_device_state(&self) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        state.tables.clear();
        state.default_actions.clear();
        state.registers.clear();
        state.clone_sessions.clear();
        state.enabled_digests.clear();
        state.call_log.push("reset_device_state".to_string());
        Ok(())
    }

    async fn set_default_action(&self, table: &str, action: &str, _params: &[u64]) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        state
            .default_actions
            .insert(table.to_string(), action.to_string());
        state
            .call_log
            .push(format!("set_default_action {} {}", table, action));
        Ok(())
    }

    async fn create_clone_session(&self, session_id: u32, ports: &[u32]) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        state.clone_sessions.insert(session_id, ports.to_vec());
        state
            .call_log
            .push(format!("create_clone_session {}", session_id));
        Ok(())
    }

    async fn clear_table(&self, table: &str) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        state.tables.remove(table);
        state.call_log.push(format!("clear_table {}", table));
        Ok(())
    }

    async fn remove_table_entry(&self, table: &str, match_key: &str) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        if let Some(entries) = state.tables.get_mut(table) {
            entries.retain(|e| e.match_key != match_key);
        }
        state
            .call_log
            .push(format!("remove_table_entry {} {}", table, match_key));
        Ok(())
    }

    async fn add_table_entry(
        &self,
        table: &str,
        action: &str,
        match_key: &str,
        action_params: &[u64],
    ) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        state.tables.entry(table.to_string()).or_default().push(TableEntry {
            match_key: match_key.to_string(),
            action: action.to_string(),
            action_params: action_params.to_vec(),
        });
        state
            .call_log
            .push(format!("add_table_entry {} {} {}", table, action, match_key));
        Ok(())
    }

    async fn write_register(&self, name: &str, index: u32, value: u64) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        state
            .registers
            .entry(name.to_string())
            .or_default()
            .insert(index, value);
        state
            .call_log
            .push(format!("write_register {} {} {}", name, index, value));
        Ok(())
    }

    async fn digest_get_config(&self, name: &str) -> Result<Option<DigestConfig>> {
        self.ensure_reachable()?;
        let state = self.state.lock().unwrap();
        if state.enabled_digests.contains(name) {
            Ok(Some(DigestConfig::default()))
        } else {
            Ok(None)
        }
    }

    async fn digest_enable(&self, name: &str) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().unwrap();
        state.enabled_digests.insert(name.to_string());
        state.call_log.push(format!("digest_enable {}", name));
        Ok(())
    }

    async fn next_digest(&self) -> Result<DigestRecord> {
        self.ensure_reachable()?;
        let mut digests = self.digests.lock().await;
        digests.recv().await.ok_or_else(|| {
            FlowAdmError::ChannelError("digest feed closed".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_write_and_read_back() {
        let (gateway, _tx) = InMemoryGateway::new();
        gateway.write_register("warm_up_ms_per_threshold", 1, 25_000).await.unwrap();
        assert_eq!(gateway.register_value("warm_up_ms_per_threshold", 1), Some(25_000));
        assert_eq!(gateway.register_value("warm_up_ms_per_threshold", 2), None);
    }

    #[tokio::test]
    async fn test_remove_missing_entry_is_noop() {
        let (gateway, _tx) = InMemoryGateway::new();
        gateway.remove_table_entry("rule_tbl", "10.0.0.2").await.unwrap();
        assert!(gateway.table_entries("rule_tbl").is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_fails_calls() {
        let (gateway, _tx) = InMemoryGateway::new();
        gateway.set_reachable(false);
        let err = gateway.clear_table("rule_tbl").await.unwrap_err();
        assert!(matches!(err, FlowAdmError::DeviceUnreachable(_)));
    }

    #[tokio::test]
    async fn test_digest_get_config_reflects_enable() {
        let (gateway, _tx) = InMemoryGateway::new();
        assert_eq!(gateway.digest_get_config("reported_data").await.unwrap(), None);
        gateway.digest_enable("reported_data").await.unwrap();
        assert!(gateway.digest_get_config("reported_data").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_next_digest_delivers_fed_record() {
        let (gateway, tx) = InMemoryGateway::new();
        tx.send(DigestRecord {
            digest_name: "reported_data".to_string(),
            entries: vec![vec![vec![0, 0, 0, 5], vec![0, 0, 0, 3]]],
        })
        .await
        .unwrap();

        let record = gateway.next_digest().await.unwrap();
        assert_eq!(record.digest_name, "reported_data");
        assert_eq!(record.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_next_digest_closed_feed_is_channel_error() {
        let (gateway, tx) = InMemoryGateway::new();
        drop(tx);
        let err = gateway.next_digest().await.unwrap_err();
        assert!(matches!(err, FlowAdmError::ChannelError(_)));
    }

    #[tokio::test]
    async fn test_reset_clears_all_state() {
        let (gateway, _tx) = InMemoryGateway::new();
        gateway.add_table_entry("rule_tbl", "flow_control", "10.0.0.2", &[1]).await.unwrap();
        gateway.write_register("warm_up_ms_per_threshold", 1, 7).await.unwrap();
        gateway.digest_enable("reported_data").await.unwrap();

        gateway.reset_device_state().await.unwrap();

        assert!(gateway.table_entries("rule_tbl").is_empty());
        assert_eq!(gateway.register_value("warm_up_ms_per_threshold", 1), None);
        assert!(!gateway.digest_enabled("reported_data"));
    }
}
