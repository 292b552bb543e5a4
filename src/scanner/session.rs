//! Scan sessions: dispatch, probing, aggregation.
//!
//! One session walks the request's units in order, admits each through the
//! [`Throttle`], and runs it as its own task in a `JoinSet`. Open results
//! are pushed to the event sink from inside the unit task as soon as they
//! exist; progress is reported by the dispatcher right after each spawn, so
//! it may reach 100% shortly before the last results arrive.

use super::events::{self, EventSink, EventStream, ScanSummary, SessionState};
use super::rate_limiter::RateLimiter;
use super::request::{ScanParams, ScanRequest};
use super::tcp::TcpProber;
use super::throttle::{CancelToken, Throttle};
use super::traits::{OpenPort, ProbeOutcome, Prober};
use crate::error::{ScanError, ScanResult};
use crate::resolver::{DnsReverseResolver, HostnameCache, ReverseResolver, DEFAULT_LOOKUP_TIMEOUT};
use crate::services::ServiceCatalog;
use crate::types::{ScanUnit, SessionId};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::Instrument;

/// Runs scans. Cheap to clone; every session gets its own state.
#[derive(Clone)]
pub struct ScanEngine {
    catalog: Arc<ServiceCatalog>,
    prober: Arc<dyn Prober>,
    resolver: Arc<dyn ReverseResolver>,
    lookup_timeout: Duration,
}

impl ScanEngine {
    /// An engine using TCP connect probes and the system DNS resolver.
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self {
            prober: Arc::new(TcpProber::new(Arc::clone(&catalog))),
            resolver: Arc::new(DnsReverseResolver::from_system_conf()),
            catalog,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Replace the prober.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    /// Replace the reverse resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn ReverseResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Bound on each reverse lookup (default and maximum 500ms).
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout.min(DEFAULT_LOOKUP_TIMEOUT);
        self
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Validate `params` and start a session in the background.
    ///
    /// On invalid input the stream carries a single `ValidationError` event
    /// and no scan is started.
    pub fn start(&self, params: &ScanParams) -> (ScanHandle, EventStream) {
        let (sink, stream) = events::channel();
        match ScanRequest::from_params(params, &self.catalog) {
            Ok(request) => (self.spawn(request, sink), stream),
            Err(err) => {
                tracing::info!(error = %err, "scan rejected");
                match &err {
                    ScanError::InvalidRequest(issues) => sink.validation_error(issues.to_string()),
                    other => sink.validation_error(other.to_string()),
                }
                (ScanHandle::rejected(err), stream)
            }
        }
    }

    /// Start a session for an already validated request.
    pub fn spawn(&self, request: ScanRequest, sink: EventSink) -> ScanHandle {
        let id = SessionId::new();
        let cancel = CancelToken::new();
        let engine = self.clone();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { engine.run_session(id, request, sink, cancel).await }
        });
        ScanHandle {
            session_id: Some(id),
            cancel,
            outcome: HandleOutcome::Running(task),
        }
    }

    /// Run a session to completion on the current task.
    pub async fn run(&self, request: ScanRequest, sink: EventSink, cancel: CancelToken) -> ScanSummary {
        self.run_session(SessionId::new(), request, sink, cancel).await
    }

    async fn run_session(
        &self,
        id: SessionId,
        request: ScanRequest,
        sink: EventSink,
        cancel: CancelToken,
    ) -> ScanSummary {
        let span = tracing::info_span!("session", id = %id.short());
        let session = Arc::new(ScanSession {
            id,
            request,
            dispatched: AtomicU64::new(0),
            open: AtomicUsize::new(0),
            hostnames: HostnameCache::new(Arc::clone(&self.resolver), self.lookup_timeout),
            sink,
        });
        session
            .run(Arc::clone(&self.prober), cancel)
            .instrument(span)
            .await
    }
}

/// State owned by one running scan.
struct ScanSession {
    id: SessionId,
    request: ScanRequest,
    dispatched: AtomicU64,
    open: AtomicUsize,
    hostnames: HostnameCache,
    sink: EventSink,
}

impl ScanSession {
    async fn run(self: Arc<Self>, prober: Arc<dyn Prober>, cancel: CancelToken) -> ScanSummary {
        let started_at = Utc::now();
        let clock = Instant::now();
        let units = self.request.units();
        let total = units.total();
        let throttle = Throttle::new(
            self.request.max_concurrency(),
            RateLimiter::new(self.request.rate_limit()),
            cancel.clone(),
        );

        tracing::info!(
            range = %self.request.range(),
            ports = self.request.ports().len(),
            total,
            concurrency = throttle.limit(),
            "scan started"
        );

        let mut tasks = JoinSet::new();
        for unit in units {
            let Some(permit) = throttle.admit().await else {
                tracing::info!(
                    dispatched = self.dispatched.load(Ordering::SeqCst),
                    in_flight = throttle.in_flight(),
                    "stop requested, draining in-flight probes"
                );
                break;
            };

            let session = Arc::clone(&self);
            let prober = Arc::clone(&prober);
            tasks.spawn(
                async move {
                    let _permit = permit;
                    session.run_unit(prober.as_ref(), unit).await;
                }
                .in_current_span(),
            );

            let dispatched = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
            self.sink.progress(dispatched, total);

            while let Some(joined) = tasks.try_join_next() {
                log_join_error(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }

        let state = if cancel.is_cancelled() {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        };
        let summary = ScanSummary {
            session_id: self.id,
            state,
            total_open: self.open.load(Ordering::SeqCst),
            dispatched: self.dispatched.load(Ordering::SeqCst),
            total_units: total,
            started_at,
            finished_at: Utc::now(),
            duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        tracing::info!(
            state = %summary.state,
            open = summary.total_open,
            dispatched = summary.dispatched,
            hosts_resolved = self.hostnames.len(),
            duration_ms = summary.duration_ms,
            "scan finished"
        );
        self.sink.completed(summary.clone());
        summary
    }

    /// Probe one unit and report it if open. A panic anywhere in here is
    /// contained to this unit, which then counts as closed.
    async fn run_unit(&self, prober: &dyn Prober, unit: ScanUnit) {
        let result = AssertUnwindSafe(self.probe_unit(prober, unit))
            .catch_unwind()
            .await;

        match result {
            Ok(Some(open)) => {
                self.open.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(%unit, service = %open.service, hostname = %open.hostname, "open");
                self.sink.open_port(open);
            }
            Ok(None) => {}
            Err(_) => tracing::warn!(%unit, "probe panicked; treating unit as closed"),
        }
    }

    async fn probe_unit(&self, prober: &dyn Prober, unit: ScanUnit) -> Option<OpenPort> {
        match prober.probe(unit, self.request.timeout()).await {
            ProbeOutcome::Open { service } => {
                let hostname = self.hostnames.hostname(unit.ip).await;
                Some(OpenPort::new(unit, hostname, service))
            }
            ProbeOutcome::Closed => None,
        }
    }
}

fn log_join_error(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::warn!(error = %e, "unit task failed");
    }
}

enum HandleOutcome {
    Running(JoinHandle<ScanSummary>),
    Rejected(ScanError),
}

/// Caller's grip on a background session.
pub struct ScanHandle {
    session_id: Option<SessionId>,
    cancel: CancelToken,
    outcome: HandleOutcome,
}

impl ScanHandle {
    fn rejected(err: ScanError) -> Self {
        Self {
            session_id: None,
            cancel: CancelToken::new(),
            outcome: HandleOutcome::Rejected(err),
        }
    }

    /// `None` when the request was rejected.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Stop admitting new units. In-flight probes still finish and report.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A token that cancels this session, for signal handlers and the like.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the session to finish.
    pub async fn wait(self) -> ScanResult<ScanSummary> {
        match self.outcome {
            HandleOutcome::Running(task) => task
                .await
                .map_err(|e| ScanError::TaskFailed(e.to_string())),
            HandleOutcome::Rejected(err) => Err(err),
        }
    }
}
