//! Unthrottled congestion controller for the tunnel server
//!
//! The covert channel is already paced by the carrier: the server can only
//! answer when a DNS query arrives. A loss-based controller on top of that
//! would regulate the same flow twice, so server paths run with the window
//! pinned at `u64::MAX` and never leave the single `Unconstrained` state.

use super::{CongestionAlgorithm, Notification, Observation, PathCongestion};
use log::trace;
use quinn_proto::congestion::{Controller, ControllerFactory};
use quinn_proto::RttEstimator;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

/// Registration name of the unthrottled algorithm
pub const UNTHROTTLED_ID: &str = "slipstream_server";

/// Registration number of the unthrottled algorithm
pub const UNTHROTTLED_NUMBER: u8 = 10;

/// Per-path state; there is exactly one reachable state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnthrottledState {
    #[default]
    Unconstrained,
}

impl UnthrottledState {
    /// Numeric code reported by the observe hook
    pub fn code(self) -> u64 {
        match self {
            UnthrottledState::Unconstrained => 0,
        }
    }
}

/// Congestion algorithm that never limits the sender
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

impl CongestionAlgorithm for Unthrottled {
    type State = UnthrottledState;

    const ID: &'static str = UNTHROTTLED_ID;
    const NUMBER: u8 = UNTHROTTLED_NUMBER;

    fn on_path_init(&self, path: &mut PathCongestion<UnthrottledState>) {
        path.attach(UnthrottledState::Unconstrained);
    }

    fn on_notify(&self, path: &mut PathCongestion<UnthrottledState>, _notification: Notification) {
        path.cc_data_updated = true;
        path.cwin = u64::MAX;
    }

    fn on_path_delete(&self, path: &mut PathCongestion<UnthrottledState>) {
        path.detach();
    }

    fn on_observe(&self, path: &PathCongestion<UnthrottledState>) -> Observation {
        Observation {
            state: path.state().copied().unwrap_or_default().code(),
            param: u64::MAX,
        }
    }
}

/// quinn binding of [`Unthrottled`], one instance per connection path
#[derive(Debug, Clone)]
pub struct UnthrottledController {
    path: PathCongestion<UnthrottledState>,
}

impl UnthrottledController {
    pub fn new() -> Self {
        let mut path = PathCongestion::new(u64::MAX);
        Unthrottled.on_path_init(&mut path);
        trace!("{}: path initialised", UNTHROTTLED_ID);
        Self { path }
    }

    /// Engine-side record of this path
    pub fn path(&self) -> &PathCongestion<UnthrottledState> {
        &self.path
    }

    pub fn observe(&self) -> Observation {
        Unthrottled.on_observe(&self.path)
    }

    fn notify(&mut self, notification: Notification) {
        Unthrottled.on_notify(&mut self.path, notification);
    }
}

impl Default for UnthrottledController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UnthrottledController {
    fn drop(&mut self) {
        Unthrottled.on_path_delete(&mut self.path);
        trace!("{}: path released", UNTHROTTLED_ID);
    }
}

impl Controller for UnthrottledController {
    fn on_ack(&mut self, _now: Instant, _sent: Instant, bytes: u64, _app_limited: bool, _rtt: &RttEstimator) {
        self.notify(Notification::Acknowledgement { bytes });
    }

    fn on_congestion_event(&mut self, _now: Instant, _sent: Instant, is_persistent_congestion: bool, lost_bytes: u64) {
        self.notify(Notification::Repeat {
            lost_bytes,
            persistent: is_persistent_congestion,
        });
    }

    fn on_mtu_update(&mut self, new_mtu: u16) {
        self.notify(Notification::MtuUpdate { mtu: new_mtu });
    }

    fn window(&self) -> u64 {
        self.path.cwin
    }

    fn clone_box(&self) -> Box<dyn Controller> {
        Box::new(self.clone())
    }

    fn initial_window(&self) -> u64 {
        u64::MAX
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Factory installing [`UnthrottledController`] on every new path
#[derive(Debug, Clone, Copy, Default)]
pub struct UnthrottledConfig;

impl ControllerFactory for UnthrottledConfig {
    fn build(self: Arc<Self>, _now: Instant, _current_mtu: u16) -> Box<dyn Controller> {
        Box::new(UnthrottledController::new())
    }
}
