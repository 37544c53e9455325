//! Sync orchestrator.
//!
//! [`SyncService`] owns the configured sources and runs one periodic loop
//! per source. Each loop syncs immediately, then again on every tick of the
//! source's interval. Manual triggers start extra passes on demand. A source
//! never has two passes in flight: a per-source running flag is taken before
//! a pass starts and released when it ends, whether it succeeded, failed or
//! panicked.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use super::events::{SyncEvent, SyncEventBroadcaster};
use super::reconcile::{reconcile_components, ReconcileSummary};
use super::status::SourceStatus;
use crate::config::loader::ServiceConfig;
use crate::config::source::{SourceConfig, SourceKind};
use crate::error::SyncError;
use crate::fetcher::{DefaultFetcherFactory, Fetcher, FetcherFactory};
use crate::repository::ComponentRepository;

/// Runs and tracks sync passes for a fixed list of sources.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct SyncService {
    state: Arc<ServiceState>,
}

struct ServiceState {
    sources: Vec<SourceConfig>,
    repo: Arc<dyn ComponentRepository>,
    factory: Arc<dyn FetcherFactory>,
    fetchers: RwLock<HashMap<SourceKind, Arc<dyn Fetcher>>>,
    statuses: RwLock<HashMap<usize, SourceStatus>>,
    running: Mutex<HashSet<usize>>,
    events: SyncEventBroadcaster,
    shutdown: watch::Sender<bool>,
    started: AtomicBool,
}

/// Proof that a pass owns its source's running flag. Dropping it clears the
/// flag.
struct PassTicket {
    state: Arc<ServiceState>,
    index: usize,
    run_id: Uuid,
}

impl Drop for PassTicket {
    fn drop(&mut self) {
        self.state
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.index);
    }
}

impl SyncService {
    /// Creates a service using the built-in fetchers, keeping git working
    /// copies under `config.work_dir()`.
    pub fn new(config: ServiceConfig, repo: Arc<dyn ComponentRepository>) -> Self {
        let factory = Arc::new(DefaultFetcherFactory::new(config.work_dir()));
        Self::with_fetcher_factory(config, repo, factory)
    }

    pub fn with_fetcher_factory(
        config: ServiceConfig,
        repo: Arc<dyn ComponentRepository>,
        factory: Arc<dyn FetcherFactory>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            state: Arc::new(ServiceState {
                sources: config.sources,
                repo,
                factory,
                fetchers: RwLock::new(HashMap::new()),
                statuses: RwLock::new(HashMap::new()),
                running: Mutex::new(HashSet::new()),
                events: SyncEventBroadcaster::default(),
                shutdown,
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Resets every source to `Idle` and spawns its periodic loop.
    ///
    /// Must be called from within a tokio runtime. A service starts at most
    /// once, even after [`stop`](Self::stop).
    pub fn start(&self) -> Result<Vec<JoinHandle<()>>, SyncError> {
        if self.state.started.swap(true, Ordering::AcqRel) {
            return Err(SyncError::AlreadyStarted);
        }

        {
            let mut statuses = self.state.statuses.write().unwrap_or_else(|e| e.into_inner());
            for index in 0..self.state.sources.len() {
                statuses.insert(index, SourceStatus::idle());
            }
        }

        let handles = (0..self.state.sources.len())
            .map(|index| {
                let state = Arc::clone(&self.state);
                let shutdown = self.state.shutdown.subscribe();
                tokio::spawn(state.run_loop(index, shutdown))
            })
            .collect();

        log::info!("Sync service started with {} source(s)", self.state.sources.len());
        Ok(handles)
    }

    /// Signals every periodic loop to exit. Passes already underway finish.
    pub fn stop(&self) {
        self.state.shutdown.send_replace(true);
        log::info!("Sync service stopping");
    }

    pub fn list_sources(&self) -> &[SourceConfig] {
        &self.state.sources
    }

    pub fn get_source(&self, index: usize) -> Result<&SourceConfig, SyncError> {
        self.state.source(index)
    }

    /// Latest status of a source, `Idle` if it has never been synced.
    pub fn get_source_status(&self, index: usize) -> Result<SourceStatus, SyncError> {
        self.state.source(index)?;
        Ok(self.state.status(index))
    }

    /// Starts a pass for `index` in the background and returns its run id.
    ///
    /// The source is already `Running` when this returns.
    pub fn trigger_sync(&self, index: usize) -> Result<Uuid, SyncError> {
        self.state.source(index)?;
        let ticket = self
            .state
            .begin_pass(index)
            .ok_or(SyncError::AlreadyRunning(index))?;
        let run_id = ticket.run_id;

        log::info!("Manual sync triggered for source {}", index);
        self.state.spawn_pass(ticket);

        Ok(run_id)
    }

    /// Runs a pass for `index` and waits for its outcome.
    ///
    /// Dropping the returned future does not cancel the pass; the source
    /// stays `Running` until it finishes.
    pub async fn run_sync(&self, index: usize) -> Result<SourceStatus, SyncError> {
        self.state.source(index)?;
        let ticket = self
            .state
            .begin_pass(index)
            .ok_or(SyncError::AlreadyRunning(index))?;

        self.state
            .spawn_pass(ticket)
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))
    }

    /// Subscribes to status transitions of all sources.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.state.events.subscribe()
    }
}

impl ServiceState {
    fn source(&self, index: usize) -> Result<&SourceConfig, SyncError> {
        self.sources.get(index).ok_or(SyncError::SourceNotFound(index))
    }

    fn status(&self, index: usize) -> SourceStatus {
        self.statuses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&index)
            .cloned()
            .unwrap_or_default()
    }

    fn set_status(&self, index: usize, run_id: Uuid, status: SourceStatus) {
        let event = SyncEvent::from_status(index, run_id, &status);
        self.statuses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index, status);
        self.events.send(event);
    }

    /// Takes the running flag for `index` and marks it `Running`, or returns
    /// `None` if a pass is already in flight.
    fn begin_pass(self: &Arc<Self>, index: usize) -> Option<PassTicket> {
        let newly_set = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index);
        if !newly_set {
            return None;
        }

        let ticket = PassTicket {
            state: Arc::clone(self),
            index,
            run_id: Uuid::new_v4(),
        };
        let running = SourceStatus::running(&self.status(index));
        self.set_status(index, ticket.run_id, running);
        Some(ticket)
    }

    /// Returns the cached fetcher for `kind`, building it on first use.
    fn fetcher_for(&self, kind: SourceKind) -> Result<Arc<dyn Fetcher>, SyncError> {
        {
            let fetchers = self.fetchers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(fetcher) = fetchers.get(&kind) {
                return Ok(Arc::clone(fetcher));
            }
        }

        let mut fetchers = self.fetchers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(fetcher) = fetchers.get(&kind) {
            return Ok(Arc::clone(fetcher));
        }

        log::debug!("Creating {} fetcher", kind);
        let fetcher = self.factory.create(kind)?;
        fetchers.insert(kind, Arc::clone(&fetcher));
        Ok(fetcher)
    }

    /// Runs a pass on its own task. The task owns the ticket, so the running
    /// flag is only released once the outcome has been recorded.
    fn spawn_pass(self: &Arc<Self>, ticket: PassTicket) -> JoinHandle<SourceStatus> {
        tokio::spawn(Arc::clone(self).run_pass(ticket))
    }

    /// Runs one pass and records its outcome. The ticket is released on
    /// return.
    async fn run_pass(self: Arc<Self>, ticket: PassTicket) -> SourceStatus {
        let index = ticket.index;
        let run_id = ticket.run_id;
        let kind = self.sources[index].kind();
        let span = tracing::info_span!("sync_pass", source = index, kind = %kind, run_id = %run_id);

        async move {
            let started = Instant::now();

            // The pass runs as its own task so a panic surfaces as a
            // JoinError instead of leaving the source stuck in Running.
            let work = tokio::spawn(
                Arc::clone(&self)
                    .fetch_and_reconcile(index)
                    .in_current_span(),
            );
            let result = match work.await {
                Ok(result) => result,
                Err(e) => Err(SyncError::TaskFailed(e.to_string())),
            };

            let elapsed = started.elapsed();
            let source = self.sources[index].describe();
            let status = match result {
                Ok(summary) => {
                    log::info!(
                        "Synced {}: fetched {}, created {}, existing {}, skipped {} in {:?}",
                        source,
                        summary.fetched,
                        summary.created,
                        summary.existing,
                        summary.skipped,
                        elapsed
                    );
                    SourceStatus::completed(summary.fetched, elapsed)
                }
                Err(e) => {
                    log::error!("Sync of {} failed: {}", source, e);
                    SourceStatus::failed(e.to_string(), elapsed)
                }
            };

            self.set_status(index, run_id, status.clone());
            drop(ticket);
            status
        }
        .instrument(span)
        .await
    }

    async fn fetch_and_reconcile(self: Arc<Self>, index: usize) -> Result<ReconcileSummary, SyncError> {
        let source = self.source(index)?;
        let fetcher = self.fetcher_for(source.kind())?;
        let components = fetcher.fetch(source).await?;
        Ok(reconcile_components(self.repo.as_ref(), &components).await)
    }

    /// Periodic loop for one source; exits once shutdown is signalled.
    async fn run_loop(self: Arc<Self>, index: usize, mut shutdown: watch::Receiver<bool>) {
        let interval = self.sources[index].effective_interval();
        log::info!(
            "Scheduling {} every {:?}",
            self.sources[index].describe(),
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match self.begin_pass(index) {
                Some(ticket) => {
                    if let Err(e) = self.spawn_pass(ticket).await {
                        log::error!("Sync pass for source {} ended abnormally: {}", index, e);
                    }
                }
                None => {
                    log::debug!("Skipping scheduled sync of source {}: already running", index);
                }
            }
        }

        log::debug!("Sync loop for source {} stopped", index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::config::source::FilesystemSource;
    use crate::repository::InMemoryRepository;
    use crate::sync::status::SyncStatus;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Returns a fixed list, optionally waiting for a release first.
    struct StubFetcher {
        components: Vec<Component>,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
        panics: bool,
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        fn kind(&self) -> SourceKind {
            SourceKind::Filesystem
        }

        async fn fetch(&self, _source: &SourceConfig) -> Result<Vec<Component>, SyncError> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.panics {
                panic!("fetcher blew up");
            }
            Ok(self.components.clone())
        }
    }

    struct CountingFactory {
        fetcher: Arc<StubFetcher>,
        created: AtomicUsize,
    }

    impl FetcherFactory for CountingFactory {
        fn create(&self, _kind: SourceKind) -> Result<Arc<dyn Fetcher>, SyncError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(self.fetcher.clone())
        }
    }

    fn fs_source(path: &str) -> SourceConfig {
        SourceConfig::Filesystem(FilesystemSource {
            path: path.to_string(),
            interval: Duration::from_secs(60),
            base_path: None,
        })
    }

    fn service_with(fetcher: StubFetcher, sources: usize) -> (SyncService, Arc<CountingFactory>, Arc<InMemoryRepository>) {
        let factory = Arc::new(CountingFactory {
            fetcher: Arc::new(fetcher),
            created: AtomicUsize::new(0),
        });
        let repo = Arc::new(InMemoryRepository::new());
        let config = ServiceConfig::new((0..sources).map(|i| fs_source(&format!("/src/{}", i))).collect());
        let service = SyncService::with_fetcher_factory(config, repo.clone(), factory.clone());
        (service, factory, repo)
    }

    fn plain(components: Vec<Component>) -> StubFetcher {
        StubFetcher {
            components,
            gate: None,
            panics: false,
        }
    }

    #[tokio::test]
    async fn test_unknown_index() {
        let (service, _, _) = service_with(plain(vec![]), 1);

        assert!(matches!(service.get_source(1), Err(SyncError::SourceNotFound(1))));
        assert!(matches!(service.get_source_status(5), Err(SyncError::SourceNotFound(5))));
        assert!(matches!(service.trigger_sync(1), Err(SyncError::SourceNotFound(1))));
        assert!(matches!(service.run_sync(1).await, Err(SyncError::SourceNotFound(1))));
    }

    #[tokio::test]
    async fn test_status_defaults_to_idle() {
        let (service, _, _) = service_with(plain(vec![]), 2);
        let status = service.get_source_status(1).unwrap();
        assert_eq!(status.status, SyncStatus::Idle);
        assert_eq!(service.list_sources().len(), 2);
    }

    #[tokio::test]
    async fn test_run_sync_creates_components() {
        let components = vec![Component::new("auth-service"), Component::new("platform-infra")];
        let (service, _, repo) = service_with(plain(components), 1);

        let status = service.run_sync(0).await.unwrap();

        assert_eq!(status.status, SyncStatus::Completed);
        assert_eq!(status.components_count, 2);
        assert!(status.last_error.is_none());
        assert_eq!(repo.len(), 2);
        assert_eq!(service.get_source_status(0).unwrap(), status);
    }

    #[tokio::test]
    async fn test_fetcher_created_once_per_kind() {
        let (service, factory, _) = service_with(plain(vec![Component::new("a")]), 3);

        for index in 0..3 {
            service.run_sync(index).await.unwrap();
        }
        service.run_sync(0).await.unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_while_running() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let fetcher = StubFetcher {
            components: vec![Component::new("gated")],
            gate: Some((entered.clone(), release.clone())),
            panics: false,
        };
        let (service, _, repo) = service_with(fetcher, 1);
        let mut events = service.subscribe();

        let run_id = service.trigger_sync(0).unwrap();
        assert_eq!(service.get_source_status(0).unwrap().status, SyncStatus::Running);
        entered.notified().await;

        assert!(matches!(service.trigger_sync(0), Err(SyncError::AlreadyRunning(0))));
        assert!(matches!(service.run_sync(0).await, Err(SyncError::AlreadyRunning(0))));
        assert_eq!(service.get_source_status(0).unwrap().status, SyncStatus::Running);

        release.notify_one();
        let finished = loop {
            let event = events.recv().await.unwrap();
            if event.status.is_finished() {
                break event;
            }
        };

        assert_eq!(finished.run_id, run_id);
        assert_eq!(finished.status, SyncStatus::Completed);
        assert_eq!(finished.components_count, 1);
        assert_eq!(repo.len(), 1);

        // The flag is released once the pass has recorded its outcome.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match service.trigger_sync(0) {
                    Ok(_) => break,
                    Err(_) => tokio::task::yield_now().await,
                }
            }
        })
        .await
        .unwrap();
        entered.notified().await;
        release.notify_one();
    }

    #[tokio::test]
    async fn test_dropped_run_sync_keeps_source_running() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let fetcher = StubFetcher {
            components: vec![Component::new("slow")],
            gate: Some((entered.clone(), release.clone())),
            panics: false,
        };
        let (service, _, repo) = service_with(fetcher, 1);
        let mut events = service.subscribe();

        let abandoned = tokio::time::timeout(Duration::from_millis(50), service.run_sync(0)).await;
        assert!(abandoned.is_err());
        entered.notified().await;

        assert_eq!(service.get_source_status(0).unwrap().status, SyncStatus::Running);
        assert!(matches!(service.trigger_sync(0), Err(SyncError::AlreadyRunning(0))));

        release.notify_one();
        let finished = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.status.is_finished() {
                    break event;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(finished.status, SyncStatus::Completed);
        assert_eq!(service.get_source_status(0).unwrap().status, SyncStatus::Completed);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_fetcher_marks_failed() {
        let fetcher = StubFetcher {
            components: vec![],
            gate: None,
            panics: true,
        };
        let (service, _, _) = service_with(fetcher, 1);

        let status = service.run_sync(0).await.unwrap();
        assert_eq!(status.status, SyncStatus::Failed);
        assert_eq!(status.components_count, 0);
        assert!(status.last_error.is_some());

        // Flag was cleared, so another pass can start.
        assert!(service.run_sync(0).await.is_ok());
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (service, _, _) = service_with(plain(vec![]), 1);
        let handles = service.start().unwrap();
        assert!(matches!(service.start(), Err(SyncError::AlreadyStarted)));

        service.stop();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_loop_syncs_immediately() {
        let (service, _, repo) = service_with(plain(vec![Component::new("svc")]), 1);
        let mut events = service.subscribe();
        let handles = service.start().unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.status.is_finished() {
                    break event;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(finished.status, SyncStatus::Completed);
        assert_eq!(repo.len(), 1);

        service.stop();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
