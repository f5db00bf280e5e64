use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use tracing::{info, warn};

use crate::error::Error;

/// Abstract resolver so the polling loop can run against a scripted
/// implementation in tests.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolve `domain` to its addresses, in the order the resolver
    /// returned them.
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, Error>;
}

/// Resolver backed by the host's DNS configuration (hickory).
pub struct SystemResolver {
    resolver: TokioResolver,
}

impl SystemResolver {
    pub fn from_system_conf() -> anyhow::Result<Self> {
        let resolver = TokioResolver::builder_tokio()
            .context("failed to load system resolver configuration")?
            .build();
        Ok(Self { resolver })
    }
}

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, Error> {
        let lookup = self
            .resolver
            .lookup_ip(domain)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(lookup.iter().collect())
    }
}

/// Watches public resolution of the managed domain.
#[derive(Clone)]
pub struct ResolutionWatcher {
    resolver: Arc<dyn Resolve>,
}

impl ResolutionWatcher {
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self { resolver }
    }

    /// Current resolution of `domain`.
    pub async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, Error> {
        self.resolver.resolve(domain).await
    }

    /// Poll `domain` until its first resolved address equals `target`.
    ///
    /// Fixed interval, no backoff. A failed resolution is logged and
    /// consumes an attempt like any other miss; only the first address of a
    /// resolution participates in the match decision.
    pub async fn wait_for_address(
        &self,
        target: IpAddr,
        domain: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<Vec<IpAddr>, Error> {
        for attempt in 0..max_attempts {
            info!("waiting for {domain} to resolve to {target} {attempt}/{max_attempts}");
            match self.resolver.resolve(domain).await {
                Ok(resolution) if resolution.first() == Some(&target) => {
                    info!(?resolution, "resolved");
                    return Ok(resolution);
                }
                Ok(_) => tokio::time::sleep(interval).await,
                Err(err) => warn!("resolution attempt failed: {err}"),
            }
        }

        Err(Error::ResolutionTimeout {
            domain: domain.to_string(),
            target,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedResolver {
        script: Mutex<VecDeque<Result<Vec<IpAddr>, Error>>>,
        calls: AtomicUsize,
    }

    impl ScriptedResolver {
        fn new(script: Vec<Result<Vec<IpAddr>, Error>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolve for ScriptedResolver {
        async fn resolve(&self, _domain: &str) -> Result<Vec<IpAddr>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    const INTERVAL: Duration = Duration::from_millis(2);

    #[tokio::test]
    async fn returns_as_soon_as_first_address_matches() {
        let resolver = ScriptedResolver::new(vec![
            Ok(vec![addr("1.2.3.4")]),
            Ok(vec![addr("1.2.3.4")]),
            Ok(vec![addr("10.0.0.5"), addr("1.2.3.4")]),
        ]);
        let watcher = ResolutionWatcher::new(resolver.clone());

        let resolution = watcher
            .wait_for_address(addr("10.0.0.5"), "rebind.example.com", 5, INTERVAL)
            .await
            .unwrap();

        assert_eq!(resolution, vec![addr("10.0.0.5"), addr("1.2.3.4")]);
        assert_eq!(resolver.calls(), 3);
    }

    #[tokio::test]
    async fn fails_after_exactly_max_attempts() {
        let resolver = ScriptedResolver::new(Vec::new()); // every attempt resolves to nothing
        let watcher = ResolutionWatcher::new(resolver.clone());

        let err = watcher
            .wait_for_address(addr("10.0.0.5"), "rebind.example.com", 5, INTERVAL)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ResolutionTimeout { attempts: 5, .. }));
        assert_eq!(resolver.calls(), 5);
    }

    #[tokio::test]
    async fn erroring_attempts_are_counted_but_do_not_abort() {
        let resolver = ScriptedResolver::new(vec![
            Err(Error::Resolution(anyhow::anyhow!("scripted failure"))),
            Err(Error::Resolution(anyhow::anyhow!("scripted failure"))),
            Ok(vec![addr("10.0.0.5")]),
        ]);
        let watcher = ResolutionWatcher::new(resolver.clone());

        let resolution = watcher
            .wait_for_address(addr("10.0.0.5"), "rebind.example.com", 5, INTERVAL)
            .await
            .unwrap();

        assert_eq!(resolution, vec![addr("10.0.0.5")]);
        assert_eq!(resolver.calls(), 3);
    }

    #[tokio::test]
    async fn only_the_first_address_participates_in_the_match() {
        // target present, but never first
        let resolver = ScriptedResolver::new(vec![
            Ok(vec![addr("1.2.3.4"), addr("10.0.0.5")]),
            Ok(vec![addr("1.2.3.4"), addr("10.0.0.5")]),
        ]);
        let watcher = ResolutionWatcher::new(resolver.clone());

        let err = watcher
            .wait_for_address(addr("10.0.0.5"), "rebind.example.com", 2, INTERVAL)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ResolutionTimeout { attempts: 2, .. }));
        assert_eq!(resolver.calls(), 2);
    }
}
