//! The viewport-synchronized fetch pipeline.
//!
//! [`ClusterPipeline`] owns every stateful component and is driven entirely by
//! the host: map events go through [`ClusterPipeline::handle_event`] and the
//! clock through [`ClusterPipeline::tick`]. Nothing here blocks; request tasks
//! run on the configured spawner and report back through a channel drained in
//! `tick`.

use crate::background::coordinator::{ClusterFetchCoordinator, FetchOutcome};
use crate::background::scheduler::{Gate, RequestScheduler};
use crate::background::service::ClusterService;
use crate::core::config::PipelineConfig;
use crate::core::subscription::{Listeners, Subscription};
use crate::core::viewport::Camera;
use crate::data::filters::{FilterCatalogue, FilterSet, FilterState, FilterValue};
use crate::input::drill_down::{DetailRequest, DrillDownController};
use crate::input::events::MapEvent;
use crate::input::tracker::{ViewportSnapshot, ViewportTracker};
use crate::layers::definitions::LayerSelection;
use crate::layers::render_sync::RenderSync;
use crate::runtime::{self, AsyncSpawner};
use crate::traits::MapSurface;
use crate::{FetchError, Result};
use instant::Instant;
use serde::Serialize;
use std::sync::Arc;

/// User-facing message the host should display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Notice {
    /// Zoom is below the fetch floor
    ZoomIn,
    /// The latest request failed; the previous render is still shown
    FetchFailed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStatus {
    pub loading: bool,
    pub notice: Option<Notice>,
    pub last_error: Option<FetchError>,
    /// Sequence id of the response currently rendered
    pub rendered_sequence: Option<u64>,
}

pub struct ClusterPipeline<S: MapSurface> {
    config: PipelineConfig,
    surface: S,
    tracker: ViewportTracker,
    filters: FilterState,
    scheduler: RequestScheduler,
    coordinator: ClusterFetchCoordinator,
    render: RenderSync,
    drill_down: DrillDownController,
    status: PipelineStatus,
    status_listeners: Listeners<PipelineStatus>,
    detail_listeners: Listeners<DetailRequest>,
    /// A trigger arrived while the user was interacting
    refetch_on_idle: bool,
    shut_down: bool,
}

impl<S: MapSurface> ClusterPipeline<S> {
    /// Pipeline spawning requests on the global runtime
    pub fn new(config: PipelineConfig, service: Arc<dyn ClusterService>, surface: S) -> Result<Self> {
        Self::with_spawner(config, service, runtime::runtime(), surface)
    }

    pub fn with_spawner(
        config: PipelineConfig,
        service: Arc<dyn ClusterService>,
        spawner: Arc<dyn AsyncSpawner>,
        mut surface: S,
    ) -> Result<Self> {
        config.validate()?;

        let render = RenderSync::new();
        render.apply_layer_visibility(&mut surface);

        Ok(Self {
            tracker: ViewportTracker::from_config(&config, Camera::default()),
            filters: FilterState::default(),
            scheduler: RequestScheduler::new(&config.scheduler),
            coordinator: ClusterFetchCoordinator::new(service, spawner, &config),
            drill_down: DrillDownController::from_config(&config),
            render,
            surface,
            config,
            status: PipelineStatus::default(),
            status_listeners: Listeners::new(),
            detail_listeners: Listeners::new(),
            refetch_on_idle: false,
            shut_down: false,
        })
    }

    /// Replaces the render layer set (see [`RenderSync::with_layers`])
    pub fn with_render_sync(mut self, render: RenderSync) -> Self {
        render.apply_layer_visibility(&mut self.surface);
        self.render = render;
        self
    }

    /// Feeds one event from the map engine
    pub fn handle_event(&mut self, event: MapEvent, now: Instant) {
        if self.shut_down {
            return;
        }

        match event {
            MapEvent::ClusterClick { cluster } => {
                let command = self
                    .drill_down
                    .on_cluster_click(&cluster, self.tracker.current().zoom);
                self.surface.ease_to(command.center, command.zoom);
                self.drill_down.commanded();
            }
            MapEvent::PointClick { point } => {
                let request = self.drill_down.on_point_click(&point);
                log::debug!("detail view requested for {:?}", request.feature_id);
                self.detail_listeners.notify(&request);
            }
            event => {
                self.tracker.handle_event(&event, now);
                if event == MapEvent::MoveEnd && self.drill_down.on_move_end() {
                    self.fetch_now(now);
                }
            }
        }
    }

    /// Advances timers and applies finished requests
    pub fn tick(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }

        if self.tracker.poll(now) {
            self.on_settled(now);
        }

        if !self.tracker.is_interacting() && self.scheduler.poll(now) {
            self.execute(now, false);
        }

        for outcome in self.coordinator.poll_completions() {
            self.apply_outcome(outcome);
        }
        if let Some(outcome) = self.coordinator.expire(now) {
            self.apply_outcome(outcome);
        }

        self.refresh_loading();
    }

    /// Earliest instant at which [`tick`](Self::tick) has timer work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.tracker.idle_deadline(),
            self.scheduler.next_deadline(),
            self.coordinator.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Requests a fetch through the throttle/debounce gate
    pub fn refresh(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        if self.tracker.is_interacting() {
            self.refetch_on_idle = true;
            return;
        }
        if let Gate::Execute = self.scheduler.trigger(now) {
            self.execute(now, false);
        }
    }

    /// Fetches right away, bypassing the gate and the interaction check.
    ///
    /// Always dispatches for a fetchable viewport, even one identical to the
    /// last request. The throttle window only restarts when a request goes out.
    pub fn fetch_now(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        if self.execute(now, true) {
            self.scheduler.mark_executed(now);
        }
    }

    /// Forgets the last dispatched viewport and filters, so the next settle or
    /// refresh fetches even when nothing changed (e.g. after the service cache was cleared)
    pub fn invalidate(&mut self) {
        self.coordinator.forget_last_dispatched();
    }

    /// Adds or replaces one filter alongside the others; refetches on change
    pub fn set_filter(&mut self, key: &str, value: impl Into<FilterValue>, now: Instant) -> Result<bool> {
        let changed = self.filters.set(key, value)?;
        self.after_filter_change(changed, now);
        Ok(changed)
    }

    /// Radio-style selection; choosing the active filter again clears it
    pub fn toggle_filter(&mut self, key: &str, value: impl Into<FilterValue>, now: Instant) -> Result<bool> {
        let changed = self.filters.toggle_exclusive(key, value)?;
        self.after_filter_change(changed, now);
        Ok(changed)
    }

    /// Drops one filter; refetches when it was active
    pub fn remove_filter(&mut self, key: &str, now: Instant) -> bool {
        let changed = self.filters.remove(key);
        self.after_filter_change(changed, now);
        changed
    }

    /// Back to the unfiltered dataset
    pub fn clear_filters(&mut self, now: Instant) -> bool {
        let changed = self.filters.clear();
        self.after_filter_change(changed, now);
        changed
    }

    /// Swaps in a whole new filter set after validating it against the catalogue
    pub fn replace_filters(&mut self, filters: FilterSet, now: Instant) -> Result<bool> {
        let changed = self.filters.replace(filters)?;
        self.after_filter_change(changed, now);
        Ok(changed)
    }

    /// Installs the filter catalogue; active filters it no longer knows are dropped
    pub fn set_catalogue(&mut self, catalogue: FilterCatalogue, now: Instant) {
        let changed = self.filters.set_catalogue(catalogue);
        self.after_filter_change(changed, now);
    }

    /// Switches the exclusive point layer; does not refetch
    pub fn set_layer_selection(&mut self, selection: LayerSelection) -> bool {
        self.render.set_selection(selection, &mut self.surface)
    }

    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PipelineStatus) + Send + Sync + 'static,
    {
        self.status_listeners.subscribe(callback)
    }

    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe_detail<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DetailRequest) + Send + Sync + 'static,
    {
        self.detail_listeners.subscribe(callback)
    }

    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe_filters<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FilterSet) + Send + Sync + 'static,
    {
        self.filters.subscribe(callback)
    }

    /// Cancels timers and in-flight requests; the pipeline ignores all input afterwards
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::debug!("shutting down cluster pipeline");
        self.tracker.cancel_idle_timer();
        self.scheduler.cancel();
        self.coordinator.cancel_in_flight();
        self.drill_down.reset();
        self.refetch_on_idle = false;
        self.shut_down = true;
        self.update_status(|status| status.loading = false);
    }

    /// Loading flag, active notice and last error
    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ViewportTracker {
        &self.tracker
    }

    /// Filters the next fetch will use
    pub fn filters(&self) -> &FilterSet {
        self.filters.current()
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filters
    }

    pub fn render(&self) -> &RenderSync {
        &self.render
    }

    pub fn coordinator(&self) -> &ClusterFetchCoordinator {
        &self.coordinator
    }

    pub fn drill_down(&self) -> &DrillDownController {
        &self.drill_down
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn after_filter_change(&mut self, changed: bool, now: Instant) {
        if changed {
            self.refresh(now);
        }
    }

    fn on_settled(&mut self, now: Instant) {
        let snapshot = self.tracker.snapshot();
        if let ViewportSnapshot::ZoomTooLow { zoom } = snapshot {
            log::info!(
                "zoom {} below fetch floor {}; not fetching",
                zoom,
                self.config.min_fetch_zoom
            );
            self.update_status(|status| status.notice = Some(Notice::ZoomIn));
            self.scheduler.cancel();
            self.refetch_on_idle = false;
            return;
        }

        let redundant = match &snapshot {
            ViewportSnapshot::Ready(viewport) => {
                self.coordinator.is_redundant(viewport, self.filters.current())
            }
            _ => false,
        };
        if redundant && !self.refetch_on_idle {
            log::trace!("settled on the already requested viewport");
            return;
        }
        self.refetch_on_idle = false;
        self.refresh(now);
    }

    /// Runs a fetch against the state as it is right now. Unless `force` is
    /// set, a request identical to the last dispatch is skipped.
    /// Returns `true` when a request was dispatched.
    fn execute(&mut self, now: Instant, force: bool) -> bool {
        match self.tracker.snapshot() {
            ViewportSnapshot::Ready(viewport) => {
                self.update_status(|status| {
                    if status.notice == Some(Notice::ZoomIn) {
                        status.notice = None;
                    }
                });
                let filters = self.filters.current();
                if !force && self.coordinator.is_redundant(&viewport, filters) {
                    log::debug!("skipping fetch; identical request already dispatched");
                    return false;
                }
                let filters = filters.clone();
                self.coordinator.dispatch(viewport, filters, now);
                self.refresh_loading();
                true
            }
            ViewportSnapshot::ZoomTooLow { zoom } => {
                log::info!(
                    "zoom {} below fetch floor {}; not fetching",
                    zoom,
                    self.config.min_fetch_zoom
                );
                self.update_status(|status| status.notice = Some(Notice::ZoomIn));
                false
            }
            ViewportSnapshot::Invalid(reason) => {
                log::warn!("not fetching for invalid viewport: {}", reason);
                false
            }
        }
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Accepted(result) => {
                self.render
                    .apply(result.sequence_id, result.features, &mut self.surface);
                self.update_status(|status| {
                    status.rendered_sequence = Some(result.sequence_id);
                    status.last_error = None;
                    if matches!(status.notice, Some(Notice::FetchFailed(_))) {
                        status.notice = None;
                    }
                });
            }
            FetchOutcome::Stale { .. } => {}
            FetchOutcome::Failed { error, .. } => {
                self.update_status(|status| {
                    status.notice = Some(Notice::FetchFailed(error.to_string()));
                    status.last_error = Some(error);
                });
            }
        }
    }

    fn refresh_loading(&mut self) {
        let loading = self.coordinator.is_loading();
        self.update_status(|status| status.loading = loading);
    }

    fn update_status(&mut self, change: impl FnOnce(&mut PipelineStatus)) {
        let mut next = self.status.clone();
        change(&mut next);
        if next != self.status {
            self.status = next;
            self.status_listeners.notify(&self.status);
        }
    }
}

impl<S: MapSurface> Drop for ClusterPipeline<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
