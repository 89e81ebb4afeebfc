use std::sync::Arc;
use std::time::{Duration, Instant};

use clustering::{ClusterConfig, ClusterSession, TickOutcome, Viewport};
use dashmap::DashMap;
use formats::RegionCollection;
use foundation::time::Time;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One map session: the clustering session plus its debounce timer task.
pub struct SessionEntry {
    id: Uuid,
    started: Instant,
    session: Mutex<ClusterSession>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionEntry {
    fn new(id: Uuid, config: ClusterConfig) -> Self {
        let mut session = ClusterSession::new(config);
        session.subscribe(move |event| debug!(session = %id, ?event, "cluster event"));
        Self {
            id,
            started: Instant::now(),
            session: Mutex::new(session),
            timer: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session clock: whole milliseconds since the session was created.
    pub fn now(&self) -> Time {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Time::from_millis(elapsed)
    }

    pub fn session(&self) -> &Mutex<ClusterSession> {
        &self.session
    }

    /// Records the viewport and re-arms the timer task. Any previously armed
    /// task is aborted, so a burst of changes yields a single wake-up.
    pub fn viewport_changed(self: &Arc<Self>, viewport: Viewport) {
        let window = {
            let mut session = self.session.lock();
            session.on_viewport_change(viewport, self.now());
            Duration::from_millis(session.engine().config().scheduler.debounce_ms)
        };

        let entry = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            entry.fire();
        });
        if let Some(previous) = self.timer.lock().replace(task) {
            previous.abort();
        }
    }

    /// Drives one scheduler tick, waiting for any handler that holds the
    /// session. Overlapping recomputes are still refused by the session's
    /// recompute guard.
    pub fn fire(&self) -> TickOutcome {
        let mut session = self.session.lock();
        let outcome = session.tick(self.now());
        match &outcome {
            TickOutcome::Recomputed(stats) => debug!(
                session = %self.id,
                generation = stats.generation,
                tier = %stats.tier,
                clusters = stats.clusters,
                "recomputed"
            ),
            TickOutcome::Failed(e) => warn!(session = %self.id, error = %e, "recompute failed"),
            TickOutcome::Idle | TickOutcome::Stale | TickOutcome::Busy => {}
        }
        outcome
    }

    fn cancel_timer(&self) {
        if let Some(task) = self.timer.lock().take() {
            task.abort();
        }
    }
}

/// Live sessions keyed by id.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<SessionEntry>>,
    config: ClusterConfig,
    default_regions: Option<RegionCollection>,
}

impl SessionRegistry {
    pub fn new(config: ClusterConfig, default_regions: Option<RegionCollection>) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            default_regions,
        }
    }

    pub fn create(&self) -> Arc<SessionEntry> {
        let id = Uuid::new_v4();
        let entry = Arc::new(SessionEntry::new(id, self.config.clone()));
        if let Some(regions) = &self.default_regions
            && let Err(e) = entry.session.lock().set_regions(regions)
        {
            warn!(session = %id, error = %e, "default regions rejected");
        }
        self.sessions.insert(id, Arc::clone(&entry));
        info!(session = %id, "session created");
        entry
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionEntry>> {
        self.sessions.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        match self.sessions.remove(id) {
            Some((_, entry)) => {
                entry.cancel_timer();
                info!(session = %id, "session closed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
