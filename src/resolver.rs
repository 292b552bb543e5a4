//! Reverse-DNS hostname lookup with a per-session cache.
//!
//! Lookups are bounded by a short timeout that is independent of the scan
//! timeout, and every failure collapses to the [`UNKNOWN_HOST`] sentinel.
//! The cache guarantees one lookup per address even when many open ports on
//! the same host finish at once.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::TokioAsyncResolver;

/// Hostname reported when no PTR record could be obtained.
pub const UNKNOWN_HOST: &str = "Unknown";

/// Default bound on a single reverse lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

/// Accepted lookup timeouts from configuration, milliseconds.
pub const LOOKUP_TIMEOUT_MS: RangeInclusive<u64> = 50..=500;

/// Something that can map an address back to a name.
#[async_trait]
pub trait ReverseResolver: Send + Sync {
    /// Return the PTR name for `ip`, or `None` if there is none.
    async fn reverse(&self, ip: Ipv4Addr) -> Option<String>;
}

/// [`ReverseResolver`] backed by trust-dns.
pub struct DnsReverseResolver {
    resolver: TokioAsyncResolver,
}

impl DnsReverseResolver {
    /// Use the system resolver configuration, falling back to the library
    /// defaults when it cannot be read.
    pub fn from_system_conf() -> Self {
        let config = match read_system_conf() {
            Ok((config, _)) => config,
            Err(e) => {
                tracing::debug!(error = %e, "system resolver config unavailable, using defaults");
                ResolverConfig::default()
            }
        };
        Self {
            resolver: TokioAsyncResolver::tokio(config, Self::options()),
        }
    }

    fn options() -> ResolverOpts {
        let mut opts = ResolverOpts::default();
        opts.timeout = DEFAULT_LOOKUP_TIMEOUT;
        opts.attempts = 1;
        opts
    }
}

#[async_trait]
impl ReverseResolver for DnsReverseResolver {
    async fn reverse(&self, ip: Ipv4Addr) -> Option<String> {
        match self.resolver.reverse_lookup(IpAddr::V4(ip)).await {
            Ok(lookup) => lookup.iter().next().map(|name| name.to_string()),
            Err(e) => {
                tracing::trace!(%ip, error = %e, "reverse lookup failed");
                None
            }
        }
    }
}

/// Per-session hostname cache in front of a [`ReverseResolver`].
pub struct HostnameCache {
    resolver: Arc<dyn ReverseResolver>,
    lookup_timeout: Duration,
    entries: Mutex<HashMap<Ipv4Addr, Arc<OnceCell<String>>>>,
}

impl HostnameCache {
    pub fn new(resolver: Arc<dyn ReverseResolver>, lookup_timeout: Duration) -> Self {
        Self {
            resolver,
            lookup_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Hostname for `ip`, looked up at most once for the life of the cache.
    pub async fn hostname(&self, ip: Ipv4Addr) -> String {
        let cell = {
            let mut entries = match self.entries.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(entries.entry(ip).or_default())
        };

        cell.get_or_init(|| self.lookup(ip)).await.clone()
    }

    /// Number of distinct addresses seen so far.
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn lookup(&self, ip: Ipv4Addr) -> String {
        let name = tokio::time::timeout(self.lookup_timeout, self.resolver.reverse(ip))
            .await
            .ok()
            .flatten();
        normalize_hostname(name, ip)
    }
}

/// Strip the root dot and map empty or address-literal names to the sentinel.
fn normalize_hostname(name: Option<String>, ip: Ipv4Addr) -> String {
    match name {
        Some(name) => {
            let name = name.trim().trim_end_matches('.');
            if name.is_empty() || name == ip.to_string() {
                UNKNOWN_HOST.to_string()
            } else {
                name.to_string()
            }
        }
        None => UNKNOWN_HOST.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_resolver_options_bound_each_query() {
        let opts = DnsReverseResolver::options();
        assert_eq!(opts.timeout, DEFAULT_LOOKUP_TIMEOUT);
        assert_eq!(opts.attempts, 1);
    }

    /// Answers from a fixed table after a delay, counting every call.
    struct FakeResolver {
        names: HashMap<Ipv4Addr, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeResolver {
        fn new(names: &[(Ipv4Addr, &str)], delay: Duration) -> Self {
            Self {
                names: names.iter().map(|(ip, n)| (*ip, n.to_string())).collect(),
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReverseResolver for FakeResolver {
        async fn reverse(&self, ip: Ipv4Addr) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.names.get(&ip).cloned()
        }
    }

    const HOST_A: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
    const HOST_B: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 11);

    #[tokio::test]
    async fn test_resolves_and_strips_root_dot() {
        let fake = Arc::new(FakeResolver::new(&[(HOST_A, "nas.lan.")], Duration::ZERO));
        let cache = HostnameCache::new(fake, DEFAULT_LOOKUP_TIMEOUT);
        assert_eq!(cache.hostname(HOST_A).await, "nas.lan");
    }

    #[tokio::test]
    async fn test_missing_record_is_unknown() {
        let fake = Arc::new(FakeResolver::new(&[], Duration::ZERO));
        let cache = HostnameCache::new(fake, DEFAULT_LOOKUP_TIMEOUT);
        assert_eq!(cache.hostname(HOST_B).await, UNKNOWN_HOST);
    }

    #[tokio::test]
    async fn test_address_literal_is_unknown() {
        let fake = Arc::new(FakeResolver::new(&[(HOST_A, "192.168.1.10")], Duration::ZERO));
        let cache = HostnameCache::new(fake, DEFAULT_LOOKUP_TIMEOUT);
        assert_eq!(cache.hostname(HOST_A).await, UNKNOWN_HOST);
    }

    #[tokio::test]
    async fn test_timeout_is_unknown() {
        let fake = Arc::new(FakeResolver::new(&[(HOST_A, "slow.lan")], Duration::from_secs(5)));
        let cache = HostnameCache::new(fake, Duration::from_millis(20));
        assert_eq!(cache.hostname(HOST_A).await, UNKNOWN_HOST);
    }

    #[tokio::test]
    async fn test_one_lookup_per_address() {
        let fake = Arc::new(FakeResolver::new(
            &[(HOST_A, "a.lan"), (HOST_B, "b.lan")],
            Duration::from_millis(20),
        ));
        let cache = Arc::new(HostnameCache::new(fake.clone(), DEFAULT_LOOKUP_TIMEOUT));

        let mut tasks = Vec::new();
        for i in 0..20 {
            let cache = Arc::clone(&cache);
            let ip = if i % 2 == 0 { HOST_A } else { HOST_B };
            tasks.push(tokio::spawn(async move { cache.hostname(ip).await }));
        }
        for task in tasks {
            let name = task.await.unwrap();
            assert!(name == "a.lan" || name == "b.lan");
        }

        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_normalize_hostname() {
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(normalize_hostname(Some("gw.".into()), ip), "gw");
        assert_eq!(normalize_hostname(Some(".".into()), ip), UNKNOWN_HOST);
        assert_eq!(normalize_hostname(Some("10.0.0.1".into()), ip), UNKNOWN_HOST);
        assert_eq!(normalize_hostname(None, ip), UNKNOWN_HOST);
    }
}
