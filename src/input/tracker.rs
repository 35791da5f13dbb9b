//! Camera tracking and interaction-phase detection.
//!
//! Start events put the map into [`InteractionPhase::Interacting`] and cancel
//! the idle timer; end events (re)arm a single idle deadline. The map settles
//! when that deadline passes without another start event.

use crate::core::config::PipelineConfig;
use crate::core::subscription::{Listeners, Subscription};
use crate::core::viewport::{Camera, Viewport};
use crate::input::events::{InteractionEdge, MapEvent};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionPhase {
    Idle,
    Interacting,
}

/// What the tracker can offer for fetching right now
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportSnapshot {
    Ready(Viewport),
    /// Rounded zoom is below the fetch floor; show a "zoom in" notice instead
    ZoomTooLow { zoom: u8 },
    /// The camera bounds cannot form a valid bounding box
    Invalid(String),
}

pub struct ViewportTracker {
    camera: Camera,
    phase: InteractionPhase,
    idle_delay: Duration,
    min_fetch_zoom: u8,
    idle_deadline: Option<Instant>,
    camera_listeners: Listeners<Camera>,
    phase_listeners: Listeners<InteractionPhase>,
}

impl ViewportTracker {
    /// Starts idle on `camera`; the map settles `idle_delay` after the last end event
    pub fn new(camera: Camera, idle_delay: Duration, min_fetch_zoom: u8) -> Self {
        Self {
            camera,
            phase: InteractionPhase::Idle,
            idle_delay,
            min_fetch_zoom,
            idle_deadline: None,
            camera_listeners: Listeners::new(),
            phase_listeners: Listeners::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig, camera: Camera) -> Self {
        Self::new(camera, config.idle_delay(), config.min_fetch_zoom)
    }

    /// Latest camera reported by the host
    pub fn current(&self) -> Camera {
        self.camera
    }

    /// Current interaction phase
    pub fn phase(&self) -> InteractionPhase {
        self.phase
    }

    pub fn is_interacting(&self) -> bool {
        self.phase == InteractionPhase::Interacting
    }

    /// When the pending idle timer fires, if one is armed
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle_deadline
    }

    /// Feeds one host event. Returns `true` when the event was consumed by the tracker.
    pub fn handle_event(&mut self, event: &MapEvent, now: Instant) -> bool {
        if let MapEvent::ViewChanged { camera } = event {
            self.set_camera(*camera);
            return true;
        }

        match event.interaction() {
            Some((kind, InteractionEdge::Start)) => {
                log::trace!("interaction start: {:?}", kind);
                self.idle_deadline = None;
                self.set_phase(InteractionPhase::Interacting);
                true
            }
            Some((kind, InteractionEdge::End)) => {
                let deadline = now + self.idle_delay;
                log::trace!("interaction end: {:?}, idle at {:?}", kind, deadline);
                self.idle_deadline = Some(deadline);
                true
            }
            None => false,
        }
    }

    /// Records a camera change and notifies camera listeners
    pub fn set_camera(&mut self, camera: Camera) {
        if camera == self.camera {
            return;
        }
        self.camera = camera;
        self.camera_listeners.notify(&self.camera);
    }

    /// Fires the idle timer if it is due. Returns `true` when the map just settled.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.idle_deadline {
            Some(deadline) if now >= deadline => {
                self.idle_deadline = None;
                self.set_phase(InteractionPhase::Idle);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_idle_timer(&mut self) {
        self.idle_deadline = None;
    }

    /// Derives the fetchable viewport, applying the zoom floor
    pub fn snapshot(&self) -> ViewportSnapshot {
        let zoom = self.camera.rounded_zoom();
        if zoom < self.min_fetch_zoom {
            return ViewportSnapshot::ZoomTooLow { zoom };
        }
        match self.camera.to_viewport() {
            Ok(viewport) => ViewportSnapshot::Ready(viewport),
            Err(err) => ViewportSnapshot::Invalid(err.to_string()),
        }
    }

    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe_camera<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Camera) + Send + Sync + 'static,
    {
        self.camera_listeners.subscribe(callback)
    }

    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe_phase<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&InteractionPhase) + Send + Sync + 'static,
    {
        self.phase_listeners.subscribe(callback)
    }

    fn set_phase(&mut self, phase: InteractionPhase) {
        if self.phase == phase {
            return;
        }
        log::debug!("interaction phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.phase_listeners.notify(&phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn tracker() -> ViewportTracker {
        ViewportTracker::new(
            Camera::new(-10.0, -10.0, 10.0, 10.0, 5.0),
            Duration::from_millis(500),
            2,
        )
    }

    #[test]
    fn test_start_event_enters_interacting() {
        let mut tracker = tracker();
        let t0 = Instant::now();

        tracker.handle_event(&MapEvent::PointerUp, t0);
        assert!(tracker.idle_deadline().is_some());

        tracker.handle_event(&MapEvent::DragStart, t0);
        assert_eq!(tracker.phase(), InteractionPhase::Interacting);
        assert_eq!(tracker.idle_deadline(), None);
    }

    #[test]
    fn test_idle_after_delay() {
        let mut tracker = tracker();
        let t0 = Instant::now();

        tracker.handle_event(&MapEvent::DragStart, t0);
        tracker.handle_event(&MapEvent::DragEnd, t0);

        assert!(!tracker.poll(t0 + Duration::from_millis(499)));
        assert!(tracker.is_interacting());

        assert!(tracker.poll(t0 + Duration::from_millis(500)));
        assert_eq!(tracker.phase(), InteractionPhase::Idle);
        assert!(!tracker.poll(t0 + Duration::from_millis(900)));
    }

    #[test]
    fn test_end_event_replaces_timer() {
        let mut tracker = tracker();
        let t0 = Instant::now();

        tracker.handle_event(&MapEvent::ZoomStart, t0);
        tracker.handle_event(&MapEvent::ZoomEnd, t0);
        tracker.handle_event(&MapEvent::MoveEnd, t0 + Duration::from_millis(300));

        assert!(!tracker.poll(t0 + Duration::from_millis(600)));
        assert!(tracker.poll(t0 + Duration::from_millis(800)));
    }

    #[test]
    fn test_start_before_deadline_keeps_interacting() {
        let mut tracker = tracker();
        let t0 = Instant::now();

        tracker.handle_event(&MapEvent::DragEnd, t0);
        tracker.handle_event(&MapEvent::TouchStart, t0 + Duration::from_millis(200));

        assert!(!tracker.poll(t0 + Duration::from_secs(5)));
        assert!(tracker.is_interacting());
    }

    #[test]
    fn test_snapshot_zoom_floor() {
        let mut tracker = tracker();

        tracker.set_camera(Camera::new(-170.0, -80.0, 170.0, 80.0, 1.4));
        assert_eq!(tracker.snapshot(), ViewportSnapshot::ZoomTooLow { zoom: 1 });

        tracker.set_camera(Camera::new(-170.0, -80.0, 170.0, 80.0, 1.5));
        match tracker.snapshot() {
            ViewportSnapshot::Ready(viewport) => assert_eq!(viewport.zoom, 2),
            other => panic!("expected a ready viewport, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_invalid_bounds() {
        let mut tracker = tracker();
        tracker.set_camera(Camera::new(10.0, -10.0, 10.0, 10.0, 5.0));
        assert!(matches!(tracker.snapshot(), ViewportSnapshot::Invalid(_)));
    }

    #[test]
    fn test_listeners_see_camera_and_phase() {
        let mut tracker = tracker();
        let phases = Arc::new(Mutex::new(Vec::new()));
        let moves = Arc::new(Mutex::new(0usize));

        let phase_log = phases.clone();
        let _phase_sub = tracker.subscribe_phase(move |phase| {
            phase_log.lock().unwrap().push(*phase);
        });
        let move_count = moves.clone();
        let _camera_sub = tracker.subscribe_camera(move |_| {
            *move_count.lock().unwrap() += 1;
        });

        let t0 = Instant::now();
        tracker.handle_event(&MapEvent::DragStart, t0);
        tracker.handle_event(
            &MapEvent::ViewChanged {
                camera: Camera::new(-9.0, -10.0, 11.0, 10.0, 5.0),
            },
            t0,
        );
        tracker.handle_event(&MapEvent::DragEnd, t0);
        tracker.poll(t0 + Duration::from_secs(1));

        assert_eq!(
            *phases.lock().unwrap(),
            vec![InteractionPhase::Interacting, InteractionPhase::Idle]
        );
        assert_eq!(*moves.lock().unwrap(), 1);
    }
}
