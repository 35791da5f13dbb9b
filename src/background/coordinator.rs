//! Dispatches cluster requests and matches their completions back to the
//! state that produced them.
//!
//! Every dispatch gets a fresh, strictly increasing sequence id. Only the
//! completion carrying the highest id dispatched so far may be accepted;
//! everything older is stale and dropped without surfacing an error.

use crate::background::service::{ClusterQuery, ClusterService};
use crate::core::config::PipelineConfig;
use crate::core::viewport::Viewport;
use crate::data::filters::FilterSet;
use crate::data::geojson::FeatureCollection;
use crate::runtime::{AsyncHandle, AsyncSpawner};
use crate::FetchError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use instant::Instant;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A dispatched request, as remembered by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub sequence_id: u64,
    pub viewport: Viewport,
    pub filters: FilterSet,
    pub dispatched_at: Instant,
}

/// Features accepted for rendering, tagged with the request that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub sequence_id: u64,
    pub viewport: Viewport,
    pub filters: FilterSet,
    pub features: FeatureCollection,
}

/// Raw completion sent back by a request task
#[derive(Debug, Clone)]
pub struct FetchCompletion {
    pub sequence_id: u64,
    pub result: std::result::Result<FeatureCollection, FetchError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Accepted(FetchResult),
    /// Superseded by a newer dispatch; never rendered, never reported
    Stale { sequence_id: u64 },
    Failed { sequence_id: u64, error: FetchError },
}

struct InFlight {
    request: FetchRequest,
    handle: Option<Box<dyn AsyncHandle>>,
}

pub struct ClusterFetchCoordinator {
    service: Arc<dyn ClusterService>,
    spawner: Arc<dyn AsyncSpawner>,
    latest_sequence: u64,
    in_flight: BTreeMap<u64, InFlight>,
    completion_tx: Sender<FetchCompletion>,
    completion_rx: Receiver<FetchCompletion>,
    last_dispatched: Option<(Viewport, FilterSet)>,
    timeout: Option<Duration>,
    cancel_superseded: bool,
}

impl ClusterFetchCoordinator {
    pub fn new(
        service: Arc<dyn ClusterService>,
        spawner: Arc<dyn AsyncSpawner>,
        config: &PipelineConfig,
    ) -> Self {
        let (completion_tx, completion_rx) = unbounded();
        Self {
            service,
            spawner,
            latest_sequence: 0,
            in_flight: BTreeMap::new(),
            completion_tx,
            completion_rx,
            last_dispatched: None,
            timeout: config.request_timeout(),
            cancel_superseded: config.cancel_superseded,
        }
    }

    /// Starts a request for `viewport` + `filters` and returns immediately
    pub fn dispatch(&mut self, viewport: Viewport, filters: FilterSet, now: Instant) -> FetchRequest {
        self.latest_sequence += 1;
        let request = FetchRequest {
            sequence_id: self.latest_sequence,
            viewport,
            filters,
            dispatched_at: now,
        };

        if self.cancel_superseded {
            self.cancel_in_flight();
        }

        let query = ClusterQuery::new(&request.viewport, &request.filters);
        let service = self.service.clone();
        let tx = self.completion_tx.clone();
        let sequence_id = request.sequence_id;

        log::debug!(
            "dispatching cluster request #{} bbox={:?} zoom={} filters={:?}",
            sequence_id,
            query.bbox,
            query.zoom,
            query.filters
        );

        let handle = self.spawner.spawn_boxed(Box::pin(async move {
            let result = service.get_clusters(&query).await;
            // The receiver is gone once the coordinator is dropped
            let _ = tx.send(FetchCompletion { sequence_id, result });
        }));

        self.last_dispatched = Some((request.viewport, request.filters.clone()));
        self.in_flight.insert(
            sequence_id,
            InFlight {
                request: request.clone(),
                handle: Some(handle),
            },
        );
        request
    }

    /// Classifies one completion against the newest dispatch
    pub fn reconcile(&mut self, completion: FetchCompletion) -> FetchOutcome {
        let sequence_id = completion.sequence_id;
        let entry = self.in_flight.remove(&sequence_id);

        let request = match entry {
            Some(entry) if sequence_id == self.latest_sequence => entry.request,
            _ => {
                match &completion.result {
                    Ok(features) => log::debug!(
                        "discarding stale response #{} ({} features, latest is #{})",
                        sequence_id,
                        features.len(),
                        self.latest_sequence
                    ),
                    Err(err) => log::debug!("discarding stale failure #{}: {}", sequence_id, err),
                }
                return FetchOutcome::Stale { sequence_id };
            }
        };

        match completion.result {
            Ok(features) => {
                log::info!(
                    "accepted response #{}: {} clusters, {} points",
                    sequence_id,
                    features.clusters().count(),
                    features.points().count()
                );
                FetchOutcome::Accepted(FetchResult {
                    sequence_id,
                    viewport: request.viewport,
                    filters: request.filters,
                    features,
                })
            }
            Err(error) => {
                log::warn!("cluster request #{} failed: {}", sequence_id, error);
                // Allow the same viewport to be retried
                self.last_dispatched = None;
                FetchOutcome::Failed { sequence_id, error }
            }
        }
    }

    /// Drains every completion that has arrived so far.
    ///
    /// A task that finished without sending anything (it panicked or was
    /// aborted externally) is reported as [`FetchError::Abandoned`].
    pub fn poll_completions(&mut self) -> Vec<FetchOutcome> {
        // Sampled before draining: a finished task has already sent its completion
        let finished: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.handle.as_ref().map_or(false, |h| h.is_finished()))
            .map(|(id, _)| *id)
            .collect();

        let mut outcomes = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            outcomes.push(self.reconcile(completion));
        }

        for sequence_id in finished {
            if self.in_flight.contains_key(&sequence_id) {
                outcomes.push(self.reconcile(FetchCompletion {
                    sequence_id,
                    result: Err(FetchError::Abandoned),
                }));
            }
        }
        outcomes
    }

    /// Fails the newest request once it has been outstanding longer than the
    /// timeout. Superseded requests past the timeout are forgotten silently.
    pub fn expire(&mut self, now: Instant) -> Option<FetchOutcome> {
        let timeout = self.timeout?;
        let overdue: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.request.dispatched_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();

        let mut outcome = None;
        for sequence_id in overdue {
            if let Some(entry) = self.in_flight.remove(&sequence_id) {
                if let Some(handle) = entry.handle {
                    handle.cancel();
                }
            }
            if sequence_id == self.latest_sequence {
                log::warn!("cluster request #{} timed out after {:?}", sequence_id, timeout);
                self.last_dispatched = None;
                outcome = Some(FetchOutcome::Failed {
                    sequence_id,
                    error: FetchError::TimedOut(timeout),
                });
            }
        }
        outcome
    }

    /// Earliest instant at which [`expire`](Self::expire) could report something
    pub fn next_deadline(&self) -> Option<Instant> {
        let timeout = self.timeout?;
        self.in_flight
            .get(&self.latest_sequence)
            .map(|entry| entry.request.dispatched_at + timeout)
    }

    /// `true` while the newest request is outstanding
    pub fn is_loading(&self) -> bool {
        self.in_flight.contains_key(&self.latest_sequence)
    }

    pub fn latest_sequence(&self) -> u64 {
        self.latest_sequence
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `viewport` + `filters` equal the last request that has not failed
    pub fn is_redundant(&self, viewport: &Viewport, filters: &FilterSet) -> bool {
        matches!(&self.last_dispatched, Some((v, f)) if v == viewport && f == filters)
    }

    pub fn forget_last_dispatched(&mut self) {
        self.last_dispatched = None;
    }

    /// Aborts every outstanding task; later completions, if any, are stale
    pub fn cancel_in_flight(&mut self) {
        for (sequence_id, entry) in std::mem::take(&mut self.in_flight) {
            if let Some(handle) = entry.handle {
                if !handle.is_finished() {
                    log::debug!("aborting cluster request #{}", sequence_id);
                    handle.cancel();
                }
            }
        }
    }
}
