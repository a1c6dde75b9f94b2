//! Periodic provider status monitor
//!
//! A background thread checks every provider with `test_connection` once per
//! refresh interval and records the results on a shared [`StatusBoard`]. The
//! board keeps the latest status per provider, a bounded append-only log and
//! per-provider uptime counters.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use super::registry::ProviderRegistry;
use crate::error::{BillPayError, BillPayResult};
use crate::models::{ConnectionStatus, ProviderId};

/// How often the monitor checks the providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RefreshInterval {
    #[serde(rename = "5s")]
    FiveSeconds,
    #[serde(rename = "10s")]
    TenSeconds,
    #[default]
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 5] = [
        RefreshInterval::FiveSeconds,
        RefreshInterval::TenSeconds,
        RefreshInterval::ThirtySeconds,
        RefreshInterval::OneMinute,
        RefreshInterval::FiveMinutes,
    ];

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(match self {
            Self::FiveSeconds => 5,
            Self::TenSeconds => 10,
            Self::ThirtySeconds => 30,
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FiveSeconds => "5s",
            Self::TenSeconds => "10s",
            Self::ThirtySeconds => "30s",
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
        }
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RefreshInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.label() == s)
            .ok_or_else(|| format!("Unknown refresh interval '{}'. Expected one of: 5s, 10s, 30s, 1m, 5m", s))
    }
}

/// One line of the monitor log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLogLine {
    pub at: DateTime<Utc>,
    pub provider: ProviderId,
    pub reachable: bool,
    pub message: String,
}

/// Check counts for one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UptimeCounter {
    pub checks: u64,
    pub reachable: u64,
}

impl UptimeCounter {
    /// Percentage of checks that reached the provider
    pub fn percent(&self) -> Option<f64> {
        (self.checks > 0).then(|| self.reachable as f64 * 100.0 / self.checks as f64)
    }
}

/// Latest results, log and counters shared between the monitor and the shell
#[derive(Debug)]
pub struct StatusBoard {
    latest: BTreeMap<ProviderId, (DateTime<Utc>, ConnectionStatus)>,
    log: VecDeque<StatusLogLine>,
    log_capacity: usize,
    counters: BTreeMap<ProviderId, UptimeCounter>,
    rounds: u64,
}

/// Board handle shared across threads
pub type SharedStatusBoard = Arc<Mutex<StatusBoard>>;

impl StatusBoard {
    pub const DEFAULT_LOG_CAPACITY: usize = 500;

    pub fn new(log_capacity: usize) -> Self {
        Self {
            latest: BTreeMap::new(),
            log: VecDeque::with_capacity(log_capacity.min(1024)),
            log_capacity: log_capacity.max(1),
            counters: BTreeMap::new(),
            rounds: 0,
        }
    }

    pub fn shared() -> SharedStatusBoard {
        Arc::new(Mutex::new(Self::new(Self::DEFAULT_LOG_CAPACITY)))
    }

    /// Record one check result
    pub fn record(&mut self, status: ConnectionStatus) {
        let now = Utc::now();
        let counter = self.counters.entry(status.provider).or_default();
        counter.checks += 1;
        if status.reachable {
            counter.reachable += 1;
        }

        if self.log.len() == self.log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(StatusLogLine {
            at: now,
            provider: status.provider,
            reachable: status.reachable,
            message: status.message.clone(),
        });
        self.latest.insert(status.provider, (now, status));
    }

    /// Record a full round of checks
    pub fn record_round(&mut self, statuses: Vec<ConnectionStatus>) {
        for status in statuses {
            self.record(status);
        }
        self.rounds += 1;
    }

    pub fn latest(&self, provider: ProviderId) -> Option<&ConnectionStatus> {
        self.latest.get(&provider).map(|(_, s)| s)
    }

    /// Latest status of every checked provider with when it was taken
    pub fn snapshot(&self) -> Vec<(DateTime<Utc>, ConnectionStatus)> {
        self.latest.values().cloned().collect()
    }

    pub fn log(&self) -> impl Iterator<Item = &StatusLogLine> {
        self.log.iter()
    }

    pub fn uptime(&self, provider: ProviderId) -> UptimeCounter {
        self.counters.get(&provider).copied().unwrap_or_default()
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }
}

/// Check every provider concurrently and return the results in provider order
pub fn check_all(registry: &ProviderRegistry) -> Vec<ConnectionStatus> {
    thread::scope(|scope| {
        let checks: Vec<_> = ProviderId::ALL
            .iter()
            .map(|&provider| {
                let client = registry.client(provider);
                (provider, scope.spawn(move || client.test_connection()))
            })
            .collect();

        checks
            .into_iter()
            .map(|(provider, handle)| {
                handle.join().unwrap_or_else(|_| ConnectionStatus {
                    provider,
                    reachable: false,
                    message: "Connection test panicked".to_string(),
                    latency: Duration::ZERO,
                })
            })
            .collect()
    })
}

/// Background thread that keeps a [`StatusBoard`] up to date
pub struct StatusMonitor {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
    board: SharedStatusBoard,
}

impl StatusMonitor {
    /// Start probing immediately, then once per `interval`
    pub fn start(
        registry: Arc<ProviderRegistry>,
        interval: Duration,
        board: SharedStatusBoard,
    ) -> BillPayResult<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread_board = Arc::clone(&board);

        let handle = thread::Builder::new()
            .name("status-monitor".into())
            .spawn(move || loop {
                let statuses = check_all(&registry);
                let reachable = statuses.iter().filter(|s| s.reachable).count();
                match thread_board.lock() {
                    Ok(mut board) => board.record_round(statuses),
                    Err(_) => {
                        tracing::error!("status board lock poisoned; monitor exiting");
                        break;
                    }
                }
                tracing::debug!(reachable, total = ProviderId::ALL.len(), "status round complete");

                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| BillPayError::Dispatch(format!("Failed to start status monitor: {}", e)))?;

        tracing::info!(interval_secs = interval.as_secs(), "status monitor started");
        Ok(Self {
            stop_tx,
            handle: Some(handle),
            board,
        })
    }

    pub fn board(&self) -> &SharedStatusBoard {
        &self.board
    }

    /// Wake the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.try_send(());
            if handle.join().is_err() {
                tracing::warn!("status monitor thread panicked");
            }
            tracing::info!("status monitor stopped");
        }
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillLookup, PaymentStatus};
    use crate::providers::ProviderClient;
    use std::time::Instant;

    struct Unreachable(ProviderId);

    impl ProviderClient for Unreachable {
        fn provider(&self) -> ProviderId {
            self.0
        }

        fn lookup_bill(&self, _bill_number: &str) -> BillPayResult<BillLookup> {
            Err(BillPayError::transport(self.0, "connection refused"))
        }

        fn query_payment(&self, _order_id: &str) -> BillPayResult<PaymentStatus> {
            Err(BillPayError::rejected(self.0, 42, "order not found"))
        }
    }

    fn registry() -> Arc<ProviderRegistry> {
        let clients: Vec<Arc<dyn ProviderClient>> = ProviderId::ALL
            .iter()
            .map(|&p| Arc::new(Unreachable(p)) as Arc<dyn ProviderClient>)
            .collect();
        Arc::new(ProviderRegistry::with_clients(clients))
    }

    #[test]
    fn test_refresh_interval_parse_and_serde() {
        assert_eq!("1m".parse::<RefreshInterval>().unwrap(), RefreshInterval::OneMinute);
        assert!("7s".parse::<RefreshInterval>().is_err());
        assert_eq!(RefreshInterval::FiveMinutes.as_duration(), Duration::from_secs(300));
        assert_eq!(
            serde_json::to_string(&RefreshInterval::TenSeconds).unwrap(),
            "\"10s\""
        );
    }

    #[test]
    fn test_board_log_is_bounded() {
        let mut board = StatusBoard::new(3);
        for i in 0..5 {
            board.record(ConnectionStatus {
                provider: ProviderId::Momo,
                reachable: i % 2 == 0,
                message: format!("round {}", i),
                latency: Duration::ZERO,
            });
        }
        let messages: Vec<_> = board.log().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["round 2", "round 3", "round 4"]);
        assert_eq!(
            board.uptime(ProviderId::Momo),
            UptimeCounter {
                checks: 5,
                reachable: 3
            }
        );
        assert_eq!(board.latest(ProviderId::Momo).unwrap().message, "round 4");
    }

    #[test]
    fn test_check_all_uses_answered_semantics() {
        let statuses = check_all(&registry());
        assert_eq!(statuses.len(), 4);
        // BIDV is checked with a lookup, which fails at the transport
        assert!(!statuses[0].reachable);
        // the wallets and Visa answered with a rejection of the sentinel
        assert!(statuses[1..].iter().all(|s| s.reachable));
    }

    #[test]
    fn test_monitor_stops_promptly() {
        let board = StatusBoard::shared();
        let monitor =
            StatusMonitor::start(registry(), Duration::from_secs(300), Arc::clone(&board)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while board.lock().unwrap().rounds() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let started = Instant::now();
        monitor.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(board.lock().unwrap().rounds(), 1);
        assert_eq!(board.lock().unwrap().snapshot().len(), 4);
    }
}
