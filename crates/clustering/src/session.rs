use std::sync::Arc;

use formats::RegionCollection;
use foundation::time::Time;
use foundation::{GeoBounds, LatLng};
use runtime::{
    EventBus, ListenerId, RecomputeScheduler, ScheduledRun, SchedulerStats, TimerHandle,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cluster::Cluster;
use crate::config::ClusterConfig;
use crate::engine::{ClusterEngine, RecomputeStats};
use crate::error::ClusterError;
use crate::point::{IngestReport, Point};
use crate::tier::ClusterTier;
use crate::viewport::Viewport;

/// Notifications delivered to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClusterEvent {
    ClustersChanged {
        tier: ClusterTier,
        stats: RecomputeStats,
    },
    /// The previous cluster list is still current.
    RecomputeFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing due (or the due run was dropped because one is in flight).
    Idle,
    Recomputed(RecomputeStats),
    Failed(ClusterError),
    /// A newer viewport arrived while computing; the result was thrown away.
    Stale,
    /// Another recompute holds the guard.
    Busy,
}

/// A [`ClusterEngine`] driven by debounced viewport changes.
///
/// Callers feed viewport changes and clock ticks; the session coalesces bursts
/// into one recompute, serializes recomputes and publishes [`ClusterEvent`]s.
#[derive(Debug)]
pub struct ClusterSession {
    engine: ClusterEngine,
    scheduler: RecomputeScheduler<Viewport>,
    bus: EventBus<ClusterEvent>,
}

impl Default for ClusterSession {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl ClusterSession {
    pub fn new(config: ClusterConfig) -> Self {
        let scheduler = RecomputeScheduler::new(config.scheduler.debounce_ms);
        let bus = EventBus::new(config.event_log_len);
        Self {
            engine: ClusterEngine::new(config),
            scheduler,
            bus,
        }
    }

    pub fn engine(&self) -> &ClusterEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ClusterEngine {
        &mut self.engine
    }

    pub fn set_points(&mut self, points: impl IntoIterator<Item = Point>) -> IngestReport {
        self.engine.set_points(points)
    }

    pub fn set_points_json(&mut self, payload: &str) -> Result<IngestReport, ClusterError> {
        self.engine.set_points_json(payload)
    }

    pub fn set_regions(&mut self, collection: &RegionCollection) -> Result<(), ClusterError> {
        self.engine.set_regions(collection)
    }

    pub fn set_regions_geojson(&mut self, payload: &str) -> Result<(), ClusterError> {
        self.engine.set_regions_geojson(payload)
    }

    pub fn decluster_region(&mut self, name: &str) -> Result<Option<GeoBounds>, ClusterError> {
        self.engine.decluster_region(name)
    }

    pub fn clusters(&self) -> &[Cluster] {
        self.engine.clusters()
    }

    pub fn find_cluster_at(&self, at: LatLng, zoom: f64) -> Option<&[Arc<Point>]> {
        self.engine.find_cluster_at(at, zoom)
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&ClusterEvent) + Send + 'static,
    ) -> ListenerId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Recently emitted events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &ClusterEvent> {
        self.bus.events()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn deadline(&self) -> Option<Time> {
        self.scheduler.deadline()
    }

    /// Records a viewport change and (re)arms the debounce timer.
    pub fn on_viewport_change(&mut self, viewport: Viewport, now: Time) -> TimerHandle {
        self.scheduler.signal(viewport, now)
    }

    /// Runs the pending recompute if its debounce window has elapsed.
    pub fn tick(&mut self, now: Time) -> TickOutcome {
        match self.take_due(now) {
            Some(run) => self.run(run),
            None => TickOutcome::Idle,
        }
    }

    /// Claims the due run, if any. Pair with [`ClusterSession::run`].
    pub fn take_due(&mut self, now: Time) -> Option<ScheduledRun<Viewport>> {
        self.scheduler.poll(now)
    }

    pub fn run(&mut self, run: ScheduledRun<Viewport>) -> TickOutcome {
        let ScheduledRun { payload, permit } = run;
        let outcome = match self.engine.compute(&payload) {
            Ok(_) if permit.is_stale() => {
                debug!(generation = permit.generation(), "discarding stale recompute");
                TickOutcome::Stale
            }
            Ok(computation) => {
                let stats = self.engine.commit(computation);
                self.bus.emit(ClusterEvent::ClustersChanged {
                    tier: stats.tier,
                    stats: stats.clone(),
                });
                TickOutcome::Recomputed(stats)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    zoom = payload.zoom,
                    "recompute failed; keeping previous clusters"
                );
                self.bus.emit(ClusterEvent::RecomputeFailed {
                    reason: e.to_string(),
                });
                TickOutcome::Failed(e)
            }
        };
        drop(permit);
        outcome
    }

    /// Skips the debounce window: cancels any pending run and recomputes now.
    pub fn recompute_now(&mut self, viewport: Viewport) -> TickOutcome {
        self.scheduler.cancel();
        let guard = self.scheduler.guard();
        guard.note_request();
        let Some(permit) = guard.try_begin() else {
            return TickOutcome::Busy;
        };
        self.run(ScheduledRun {
            payload: viewport,
            permit,
        })
    }
}
