//! End-to-end request dispatch with classified failover.
//!
//! One `dispatch` call walks the candidate list: reserve quota, call the
//! transport, and on error either retry the same provider (transient), or
//! move on (rate limit, fatal). The whole walk runs under the request
//! deadline; when it fires the in-flight future is dropped and its
//! reservation releases itself.
//!
//! Nothing inside the walk awaits anything but the transport and the backoff
//! timer: quota settlement, status changes and events happen synchronously
//! with each outcome. Usage records are buffered and appended once the walk
//! ends, outside the deadline, so a slow store can neither drop a served
//! response nor skip a status transition.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use switchboard_types::config::{RouterSettings, SwitchboardConfig};
use switchboard_types::error::{
    ConfigError, ErrorClass, FailureReason, ProviderFailure, RepositoryError, RouterError,
};
use switchboard_types::event::{EventKind, RouterEvent};
use switchboard_types::provider::{Provider, ProviderStatus};
use switchboard_types::usage::{TimeRange, UsageRecord, UsageStats};

use super::backoff::Backoff;
use super::request::{DispatchResult, RoutingRequest};
use super::transport::ProviderTransport;
use crate::event::{EventBus, Subscription};
use crate::quota::{QuotaSnapshot, QuotaTracker, Reservation};
use crate::routing::{ProviderRegistry, SelectionPolicy};
use crate::usage::UsageStore;

/// Per-request bookkeeping that survives a deadline abort.
#[derive(Debug, Default)]
struct Progress {
    attempted: HashSet<String>,
    order: Vec<String>,
    failures: Vec<ProviderFailure>,
    retries: u32,
    /// Round-robin offset chosen on the first pick.
    rotation: Option<usize>,
    /// Usage records of finished attempts, not yet appended.
    pending: Vec<UsageRecord>,
}

/// Routes requests across providers.
///
/// Share it behind an `Arc`; every method takes `&self` and concurrent
/// dispatches only contend on per-provider quota entries.
pub struct Dispatcher<T, S> {
    registry: Arc<ProviderRegistry>,
    tracker: QuotaTracker,
    policy: SelectionPolicy,
    transport: T,
    store: S,
    events: EventBus,
    settings: RouterSettings,
    backoff: Backoff,
}

impl<T, S> Dispatcher<T, S>
where
    T: ProviderTransport,
    S: UsageStore,
{
    /// Assemble a dispatcher from already constructed parts.
    ///
    /// `policy` must share the registry's quota tracker.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        policy: SelectionPolicy,
        transport: T,
        store: S,
        events: EventBus,
        settings: RouterSettings,
    ) -> Self {
        let tracker = registry.tracker().clone();
        let backoff = Backoff::from_settings(&settings);
        Self {
            registry,
            tracker,
            policy,
            transport,
            store,
            events,
            settings,
            backoff,
        }
    }

    /// Validate `config` and build every component from it.
    pub fn from_config(
        config: SwitchboardConfig,
        transport: T,
        store: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tracker = QuotaTracker::new();
        let registry = Arc::new(ProviderRegistry::new(config.providers, tracker.clone())?);
        let policy = SelectionPolicy::new(tracker, config.router.strategy);
        let events = EventBus::new(config.router.event_capacity);
        Ok(Self::new(
            registry,
            policy,
            transport,
            store,
            events,
            config.router,
        ))
    }

    /// Serve `request` from the best available provider.
    ///
    /// Only `AllProvidersExhausted` and `DeadlineExceeded` are returned;
    /// provider errors are classified and handled here.
    pub async fn dispatch(&self, request: RoutingRequest) -> Result<DispatchResult, RouterError> {
        let request_id = Uuid::now_v7();
        let started = Instant::now();
        let deadline = request
            .deadline
            .unwrap_or_else(|| started + self.settings.default_deadline());

        let span = tracing::info_span!(
            "dispatch",
            %request_id,
            task_type = %request.task_type
        );

        let mut progress = Progress::default();
        let outcome = tokio::time::timeout_at(
            deadline,
            self.run(request_id, started, &request, &mut progress),
        )
        .instrument(span.clone())
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                span.in_scope(|| {
                    tracing::warn!(
                        elapsed_ms,
                        attempted = ?progress.order,
                        "Deadline exceeded, aborting dispatch"
                    );
                });
                Err(RouterError::DeadlineExceeded {
                    elapsed_ms,
                    attempted: std::mem::take(&mut progress.order),
                    failures: std::mem::take(&mut progress.failures),
                })
            }
        };

        self.flush(std::mem::take(&mut progress.pending))
            .instrument(span)
            .await;
        result
    }

    async fn run(
        &self,
        request_id: Uuid,
        started: Instant,
        request: &RoutingRequest,
        progress: &mut Progress,
    ) -> Result<DispatchResult, RouterError> {
        let preferred = request.provider_override.as_deref().filter(|id| {
            let known = self
                .registry
                .get(id)
                .is_some_and(|_| self.tracker.status(id) != ProviderStatus::Disabled);
            if !known {
                tracing::warn!(provider = %id, "Ignoring override for unknown or disabled provider");
            }
            known
        });

        let mut last_failure: Option<(String, String)> = None;

        loop {
            // Re-read every round so a reload applies to the next reservation.
            let candidates = self.registry.get_candidates(request.task_type);
            let selection = self.policy.select_next(
                &candidates,
                &progress.attempted,
                request.estimated_tokens,
                preferred,
                &mut progress.rotation,
            );

            for provider_id in &selection.newly_throttled {
                tracing::warn!(provider = %provider_id, "Local quota window full, throttling");
                self.events.publish(RouterEvent::LimitReached {
                    provider_id: provider_id.clone(),
                    status: ProviderStatus::Throttled,
                    remote: false,
                });
            }

            let Some((provider, reservation)) = selection.chosen else {
                let mut failures = std::mem::take(&mut progress.failures);
                failures.extend(selection.skipped);
                self.append_disabled(&mut failures);
                tracing::warn!(
                    providers = failures.len(),
                    attempted = ?progress.order,
                    "All providers exhausted"
                );
                return Err(RouterError::AllProvidersExhausted { failures });
            };

            if let Some((from, reason)) = last_failure.take() {
                tracing::info!(%from, to = %provider.id, %reason, "Failing over");
                self.events.publish(RouterEvent::ProviderSwitch {
                    request_id,
                    from,
                    to: provider.id.clone(),
                    reason,
                });
            }

            progress.attempted.insert(provider.id.clone());
            progress.order.push(provider.id.clone());

            match self
                .attempt(request_id, started, &provider, reservation, request, progress)
                .await
            {
                Ok(result) => return Ok(result),
                Err(failure) => {
                    last_failure = Some((failure.provider_id.clone(), failure.reason.to_string()));
                    progress.failures.push(failure);
                }
            }
        }
    }

    /// Call one provider, retrying transient errors in place.
    ///
    /// The reservation is held across retries and settled exactly once, in
    /// the same poll that observes the final outcome.
    async fn attempt(
        &self,
        request_id: Uuid,
        started: Instant,
        provider: &Provider,
        reservation: Reservation,
        request: &RoutingRequest,
        progress: &mut Progress,
    ) -> Result<DispatchResult, ProviderFailure> {
        let mut retries_here: u32 = 0;

        loop {
            let call_started = Instant::now();
            let outcome = self.transport.send(provider, request).await;
            let latency_ms = call_started.elapsed().as_millis() as u64;

            let error = match outcome {
                Ok(response) => {
                    let estimated_tokens = reservation.estimated_tokens();
                    reservation.commit(response.tokens_used);
                    progress.pending.push(UsageRecord::success(
                        &provider.id,
                        request.task_type,
                        response.tokens_used,
                        latency_ms,
                    ));

                    tracing::info!(
                        provider = %provider.id,
                        estimated_tokens,
                        tokens_used = response.tokens_used,
                        latency_ms,
                        retries = progress.retries,
                        "Request served"
                    );
                    self.events.publish(RouterEvent::RequestCompleted {
                        request_id,
                        provider_id: provider.id.clone(),
                        task_type: request.task_type,
                        tokens_used: response.tokens_used,
                        latency_ms,
                        retries: progress.retries,
                    });

                    return Ok(DispatchResult {
                        request_id,
                        provider: provider.clone(),
                        response,
                        latency: started.elapsed(),
                        retries: progress.retries,
                    });
                }
                Err(error) => error,
            };

            let class = error.class();
            if class == ErrorClass::Transient && retries_here < self.settings.max_retries_per_provider {
                let delay = self.backoff.delay(retries_here);
                retries_here += 1;
                progress.retries += 1;
                tracing::debug!(
                    provider = %provider.id,
                    error = %error,
                    retry = retries_here,
                    delay_ms = delay.as_millis() as u64,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            reservation.release();
            progress.pending.push(UsageRecord::failure(
                &provider.id,
                request.task_type,
                latency_ms,
                class,
            ));

            let reason = match class {
                ErrorClass::QuotaExceeded => {
                    tracing::warn!(provider = %provider.id, error = %error, "Provider reported rate limit");
                    self.tracker.mark_throttled(&provider.id);
                    self.events.publish(RouterEvent::LimitReached {
                        provider_id: provider.id.clone(),
                        status: ProviderStatus::Throttled,
                        remote: true,
                    });
                    FailureReason::QuotaExceeded {
                        message: error.to_string(),
                    }
                }
                ErrorClass::Transient => {
                    tracing::warn!(
                        provider = %provider.id,
                        error = %error,
                        attempts = retries_here + 1,
                        "Transient errors persisted, giving up on provider"
                    );
                    FailureReason::Transient {
                        attempts: retries_here + 1,
                        message: error.to_string(),
                    }
                }
                ErrorClass::Fatal => {
                    let cool_down = self.settings.cool_down();
                    tracing::error!(
                        provider = %provider.id,
                        error = %error,
                        cool_down_secs = cool_down.as_secs(),
                        "Fatal provider error, cooling down"
                    );
                    self.tracker.mark_cooling_down(&provider.id, cool_down);
                    self.events.publish(RouterEvent::LimitReached {
                        provider_id: provider.id.clone(),
                        status: ProviderStatus::CoolingDown,
                        remote: true,
                    });
                    FailureReason::Fatal {
                        message: error.to_string(),
                    }
                }
            };

            return Err(ProviderFailure {
                provider_id: provider.id.clone(),
                reason,
            });
        }
    }

    /// Disabled providers never reach the candidate list; list them anyway so
    /// an exhaustion error accounts for every configured provider.
    fn append_disabled(&self, failures: &mut Vec<ProviderFailure>) {
        for provider in &self.registry.snapshot().providers {
            if self.tracker.status(&provider.id) == ProviderStatus::Disabled
                && !failures.iter().any(|f| f.provider_id == provider.id)
            {
                failures.push(ProviderFailure {
                    provider_id: provider.id.clone(),
                    reason: FailureReason::Unavailable {
                        status: ProviderStatus::Disabled,
                    },
                });
            }
        }
    }

    /// Append buffered usage records in call order.
    ///
    /// A store failure is logged and never changes the dispatch outcome.
    async fn flush(&self, records: Vec<UsageRecord>) {
        for record in records {
            if let Err(e) = self.store.append(&record).await {
                tracing::error!(
                    provider = %record.provider_id,
                    error = %e,
                    "Failed to append usage record"
                );
            }
        }
    }

    /// Aggregate usage over `range`.
    pub async fn stats(&self, range: TimeRange) -> Result<UsageStats, RepositoryError> {
        self.store.query(range).await
    }

    /// Invoke `handler` for every future event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(RouterEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler)
    }

    /// Operator action: take a provider out of rotation until cleared.
    pub fn disable(&self, provider_id: &str) {
        tracing::info!(provider = %provider_id, "Provider disabled");
        self.tracker.disable(provider_id);
    }

    /// Operator action: return a provider to `Active`.
    pub fn clear(&self, provider_id: &str) {
        tracing::info!(provider = %provider_id, "Provider cleared");
        self.tracker.clear(provider_id);
    }

    /// Atomically replace the provider set. Returns the new registry version.
    pub fn reload(&self, providers: Vec<Provider>) -> Result<u64, ConfigError> {
        self.registry.reload(providers)
    }

    pub fn quota_snapshot(&self) -> Vec<QuotaSnapshot> {
        self.tracker.snapshot()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<T, S> std::fmt::Debug for Dispatcher<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("strategy", &self.policy.strategy())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use switchboard_types::error::ProviderError;
    use switchboard_types::provider::TaskType;

    use crate::dispatch::request::ProviderResponse;
    use crate::usage::InMemoryUsageStore;

    #[derive(Debug, Clone)]
    enum Step {
        Ok(u64),
        Err(ProviderError),
        Hang,
    }

    /// Replays a per-provider script; an empty script answers `Ok(10)`.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Step>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn script(self, id: &str, steps: Vec<Step>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(id.to_string(), steps.into());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProviderTransport for ScriptedTransport {
        fn send(
            &self,
            provider: &Provider,
            _request: &RoutingRequest,
        ) -> impl std::future::Future<Output = Result<ProviderResponse, ProviderError>> + Send
        {
            self.calls.lock().unwrap().push(provider.id.clone());
            let step = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&provider.id)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Step::Ok(10));
            async move {
                match step {
                    Step::Ok(tokens) => Ok(ProviderResponse {
                        body: serde_json::json!({ "text": "ok" }),
                        tokens_used: tokens,
                    }),
                    Step::Err(error) => Err(error),
                    Step::Hang => {
                        std::future::pending::<()>().await;
                        Err(ProviderError::Timeout)
                    }
                }
            }
        }
    }

    /// Store whose appends always fail.
    struct BrokenStore;

    impl UsageStore for BrokenStore {
        async fn append(&self, _record: &UsageRecord) -> Result<(), RepositoryError> {
            Err(RepositoryError::Query("disk full".to_string()))
        }

        async fn query(&self, _range: TimeRange) -> Result<UsageStats, RepositoryError> {
            Err(RepositoryError::Connection)
        }

        async fn records(&self, _range: TimeRange) -> Result<Vec<UsageRecord>, RepositoryError> {
            Err(RepositoryError::Connection)
        }
    }

    /// Store whose appends take five seconds each.
    #[derive(Default)]
    struct SlowStore {
        inner: InMemoryUsageStore,
    }

    impl UsageStore for SlowStore {
        async fn append(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.inner.append(record).await
        }

        async fn query(&self, range: TimeRange) -> Result<UsageStats, RepositoryError> {
            self.inner.query(range).await
        }

        async fn records(&self, range: TimeRange) -> Result<Vec<UsageRecord>, RepositoryError> {
            self.inner.records(range).await
        }
    }

    fn provider(id: &str, tier: u32) -> Provider {
        Provider {
            id: id.to_string(),
            tier,
            rpm_limit: 100,
            tpm_limit: 100_000,
            buffer_percent: 100,
            task_affinities: BTreeSet::new(),
            model: format!("{id}-model"),
            endpoint: format!("https://{id}.invalid"),
            auth_ref: None,
        }
    }

    fn config(providers: Vec<Provider>) -> SwitchboardConfig {
        SwitchboardConfig {
            router: RouterSettings {
                jitter: false,
                ..RouterSettings::default()
            },
            providers,
        }
    }

    fn request() -> RoutingRequest {
        RoutingRequest::new(TaskType::Chat, serde_json::json!({ "prompt": "hi" }))
            .with_estimated_tokens(50)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_cools_down_and_fails_over() {
        let transport = ScriptedTransport::default()
            .script("a", vec![Step::Err(ProviderError::AuthenticationFailed)]);
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0), provider("b", 1)]),
            transport,
            InMemoryUsageStore::new(),
        )
        .unwrap();

        let result = dispatcher.dispatch(request()).await.unwrap();
        assert_eq!(result.provider.id, "b");
        assert_eq!(result.retries, 0);
        assert_eq!(dispatcher.tracker().status("a"), ProviderStatus::CoolingDown);

        tokio::time::advance(dispatcher.settings().cool_down()).await;
        assert_eq!(dispatcher.tracker().status("a"), ProviderStatus::Active);

        let records = dispatcher.store().all().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].error_kind, Some(ErrorClass::Fatal));
        assert!(records[1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded_is_distinct_and_releases_quota() {
        let transport = ScriptedTransport::default()
            .script(
                "a",
                vec![Step::Err(ProviderError::RateLimited {
                    retry_after_ms: None,
                })],
            )
            .script("b", vec![Step::Hang]);
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0), provider("b", 1)]),
            transport,
            InMemoryUsageStore::new(),
        )
        .unwrap();

        let err = dispatcher
            .dispatch(request().with_timeout(Duration::from_secs(2)))
            .await
            .unwrap_err();
        match err {
            RouterError::DeadlineExceeded {
                elapsed_ms,
                attempted,
                failures,
            } => {
                assert_eq!(attempted, vec!["a".to_string(), "b".to_string()]);
                assert!(elapsed_ms >= 2_000);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].provider_id, "a");
                assert!(matches!(
                    failures[0].reason,
                    FailureReason::QuotaExceeded { .. }
                ));
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }

        // The hung call's reservation is released; only the finished attempt is logged.
        let b = dispatcher
            .quota_snapshot()
            .into_iter()
            .find(|s| s.provider_id == "b")
            .unwrap();
        assert_eq!((b.request_count, b.token_count), (0, 0));
        assert_eq!(dispatcher.tracker().status("a"), ProviderStatus::Throttled);

        let records = dispatcher.store().all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_kind, Some(ErrorClass::QuotaExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_keeps_status_transitions() {
        let transport = ScriptedTransport::default()
            .script(
                "a",
                vec![Step::Err(ProviderError::RateLimited {
                    retry_after_ms: None,
                })],
            )
            .script("b", vec![Step::Err(ProviderError::AuthenticationFailed)]);
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0), provider("b", 1), provider("c", 2)]),
            transport,
            SlowStore::default(),
        )
        .unwrap();

        let result = dispatcher
            .dispatch(request().with_timeout(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(result.provider.id, "c");
        assert_eq!(dispatcher.tracker().status("a"), ProviderStatus::Throttled);
        assert_eq!(dispatcher.tracker().status("b"), ProviderStatus::CoolingDown);

        // Every record is durable once dispatch returns.
        let records = dispatcher.store().inner.all().await;
        let ids: Vec<&str> = records.iter().map(|r| r.provider_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_does_not_drop_served_response() {
        let transport = ScriptedTransport::default().script("a", vec![Step::Ok(10)]);
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0)]),
            transport,
            SlowStore::default(),
        )
        .unwrap();

        let result = dispatcher
            .dispatch(request().with_timeout(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(result.provider.id, "a");
        assert_eq!(result.response.tokens_used, 10);

        let snapshot = dispatcher.quota_snapshot();
        assert_eq!((snapshot[0].request_count, snapshot[0].token_count), (1, 10));
        assert_eq!(dispatcher.store().inner.all().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_override_tried_first() {
        let transport = ScriptedTransport::default();
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0), provider("b", 1)]),
            transport,
            InMemoryUsageStore::new(),
        )
        .unwrap();

        let result = dispatcher
            .dispatch(request().with_provider_override("b"))
            .await
            .unwrap();
        assert_eq!(result.provider.id, "b");

        let result = dispatcher
            .dispatch(request().with_provider_override("nope"))
            .await
            .unwrap();
        assert_eq!(result.provider.id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_does_not_fail_dispatch() {
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0)]),
            ScriptedTransport::default(),
            BrokenStore,
        )
        .unwrap();

        let result = dispatcher.dispatch(request()).await.unwrap();
        assert_eq!(result.provider.id, "a");
        assert!(dispatcher.stats(TimeRange::last(chrono::Duration::hours(1))).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_commits_actual_tokens() {
        let transport = ScriptedTransport::default().script("a", vec![Step::Ok(7)]);
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0)]),
            transport,
            InMemoryUsageStore::new(),
        )
        .unwrap();

        dispatcher.dispatch(request()).await.unwrap();
        let snapshot = dispatcher.quota_snapshot();
        assert_eq!(snapshot[0].request_count, 1);
        assert_eq!(snapshot[0].token_count, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_event_names_both_providers() {
        let transport = ScriptedTransport::default().script(
            "a",
            vec![Step::Err(ProviderError::RateLimited {
                retry_after_ms: None,
            })],
        );
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0), provider("b", 1)]),
            transport,
            InMemoryUsageStore::new(),
        )
        .unwrap();
        let mut rx = dispatcher.events().subscribe();

        dispatcher.dispatch(request()).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RouterEvent::ProviderSwitch { from, to, .. } = &event {
                assert_eq!((from.as_str(), to.as_str()), ("a", "b"));
            }
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::LimitReached,
                EventKind::ProviderSwitch,
                EventKind::RequestCompleted
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_and_clear_through_dispatcher() {
        let transport = ScriptedTransport::default();
        let dispatcher = Dispatcher::from_config(
            config(vec![provider("a", 0), provider("b", 1)]),
            transport,
            InMemoryUsageStore::new(),
        )
        .unwrap();

        dispatcher.disable("a");
        assert_eq!(dispatcher.dispatch(request()).await.unwrap().provider.id, "b");
        dispatcher.clear("a");
        assert_eq!(dispatcher.dispatch(request()).await.unwrap().provider.id, "a");
        assert_eq!(dispatcher.transport.calls(), vec!["b", "a"]);
    }

    #[test]
    fn test_from_config_rejects_invalid_settings() {
        let mut cfg = config(vec![provider("a", 0)]);
        cfg.router.event_capacity = 0;
        let result = Dispatcher::from_config(cfg, ScriptedTransport::default(), InMemoryUsageStore::new());
        assert!(matches!(result, Err(ConfigError::InvalidSetting(_))));
    }
}
