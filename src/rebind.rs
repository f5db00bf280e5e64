use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::cloudflare::types::{DnsRecord, TTL_AUTOMATIC};
use crate::error::Error;
use crate::resolve::ResolutionWatcher;

/// Provider-side record mutation, abstracted so the orchestrator can be
/// driven against a mock in tests.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord, Error>;
}

/// The single piece of shared mutable orchestration state.
struct RebindState {
    record: Option<DnsRecord>,
    in_flight: bool,
}

/// Fixed polling policy applied to every rebind.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

/// Drives the update → poll → notify sequence for the one managed record.
///
/// All sessions funnel through this single instance; the `in_flight` flag is
/// the only synchronization primitive guarding the record and the right to
/// mutate it at the provider.
pub struct RebindOrchestrator {
    state: Mutex<RebindState>,
    provider: Arc<dyn DnsProvider>,
    watcher: ResolutionWatcher,
    domain: String,
    original_address: IpAddr,
    poll: PollPolicy,
}

impl RebindOrchestrator {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        watcher: ResolutionWatcher,
        record: Option<DnsRecord>,
        domain: String,
        original_address: IpAddr,
        poll: PollPolicy,
    ) -> Self {
        Self {
            state: Mutex::new(RebindState {
                record,
                in_flight: false,
            }),
            provider,
            watcher,
            domain,
            original_address,
            poll,
        }
    }

    /// Whether a record to rebind was located at startup.
    pub fn has_record(&self) -> bool {
        self.state.lock().unwrap().record.is_some()
    }

    /// Whether a rebind or reset is currently running.
    pub fn in_flight(&self) -> bool {
        self.state.lock().unwrap().in_flight
    }

    /// Repoint the managed record at `address` and wait for public
    /// resolution to follow, then hand `notify` the first resolved address
    /// with `suffix` appended.
    ///
    /// At most one rebind may be in flight; a call arriving while one is
    /// running is dropped without feedback. The guard check and the flag set
    /// share a single lock acquisition with no await in between, so two
    /// tasks can never both pass. Failures along the way are logged, clear
    /// the flag, and never reach `notify`.
    pub async fn rebind<F>(&self, address: IpAddr, ttl: u32, suffix: &str, notify: F)
    where
        F: FnOnce(String) + Send,
    {
        let record = {
            let mut state = self.state.lock().unwrap();
            if state.in_flight {
                debug!("rebind to {address} dropped, another rebind is in flight");
                return;
            }
            let record = {
                let Some(record) = state.record.as_mut() else {
                    warn!("rebind to {address} dropped, no dns record is tracked");
                    return;
                };
                record.content = address.to_string();
                record.ttl = ttl;
                record.clone()
            };
            state.in_flight = true;
            record
        };

        info!("rebinding {} to {address} (ttl {ttl})", self.domain);

        match self.provider.update_record(&record).await {
            Ok(updated) => debug!(?updated, "provider accepted record update"),
            Err(err) => {
                error!("failed to update dns record: {err}");
                self.finish();
                return;
            }
        }

        let resolution = match self
            .watcher
            .wait_for_address(address, &self.domain, self.poll.max_attempts, self.poll.interval)
            .await
        {
            Ok(resolution) => resolution,
            Err(err) => {
                error!("{err}");
                self.finish();
                return;
            }
        };

        self.finish();

        let first = resolution
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        notify(format!("{first}{suffix}"));
    }

    /// Point the record back at its original address, with the provider's
    /// automatic ttl and no suffix on the completion event.
    pub async fn reset<F>(&self, notify: F)
    where
        F: FnOnce(String) + Send,
    {
        self.rebind(self.original_address, TTL_AUTOMATIC, "", notify)
            .await;
    }

    fn finish(&self) {
        self.state.lock().unwrap().in_flight = false;
    }
}
