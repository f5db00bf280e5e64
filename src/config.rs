use std::net::IpAddr;
use std::time::Duration;

use crate::rebind::PollPolicy;

/// Process-wide settings, resolved once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub zone_id: String,
    /// Managed domain, lowercased and without trailing dot.
    pub domain: String,
    /// Address the record points at before (and after resets of) the attack.
    pub original_ip: IpAddr,
    /// Private address the record is rebound to.
    pub rebind_ip: IpAddr,
    /// TTL written during a rebind; kept low so resolvers re-ask quickly.
    pub rebind_ttl: u32,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl AppConfig {
    /// Polling policy applied to every rebind.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.poll_attempts,
            interval: self.poll_interval,
        }
    }
}
