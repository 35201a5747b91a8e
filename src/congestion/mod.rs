//! Pluggable congestion control
//!
//! The transport engine drives congestion control through four hooks per
//! path: init, notify, delete and observe. Algorithms implement
//! [`CongestionAlgorithm`] against the engine's per-path record
//! ([`PathCongestion`]), and are selected by name through
//! [`CongestionControl`], which also hands quinn a matching
//! `ControllerFactory`.

pub mod unthrottled;

pub use unthrottled::{
    Unthrottled, UnthrottledConfig, UnthrottledController, UnthrottledState, UNTHROTTLED_ID,
    UNTHROTTLED_NUMBER,
};

use quinn_proto::congestion::{BbrConfig, ControllerFactory, CubicConfig, NewRenoConfig};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Event reported by the transport engine to a path's congestion algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Bytes newly acknowledged
    Acknowledgement { bytes: u64 },
    /// Packets declared lost and queued for retransmission
    Repeat { lost_bytes: u64, persistent: bool },
    /// Retransmission timer fired
    Timeout,
    /// A previously declared loss turned out to be spurious
    SpuriousRepeat,
    /// New RTT sample
    RttMeasurement { rtt: Duration },
    /// New delivery rate sample, bytes per second
    BandwidthMeasurement { bytes_per_sec: u64 },
    /// Peer echoed an ECN congestion mark
    EcnCongestionExperienced,
    /// Sender was blocked by the congestion window
    CwinBlocked,
    /// Engine suggests a starting window (e.g. resumed session)
    SeedCwin { bytes: u64 },
    /// Path MTU changed
    MtuUpdate { mtu: u16 },
    /// Path state reset (migration, new connection ID)
    Reset,
}

/// Diagnostic snapshot returned by the observe hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Algorithm-specific state code
    pub state: u64,
    /// Algorithm-specific parameter, usually the window
    pub param: u64,
}

/// Engine-side congestion record of one path
///
/// `S` is the algorithm's private per-path state, present between the init
/// and delete hooks.
#[derive(Debug, Clone)]
pub struct PathCongestion<S> {
    /// Congestion window advertised to the sender, in bytes
    pub cwin: u64,
    /// Set by the algorithm when `cwin` or its state changed
    pub cc_data_updated: bool,
    state: Option<Box<S>>,
}

impl<S> PathCongestion<S> {
    /// Fresh path record with the engine's initial window
    pub fn new(initial_cwin: u64) -> Self {
        Self {
            cwin: initial_cwin,
            cc_data_updated: false,
            state: None,
        }
    }

    pub fn state(&self) -> Option<&S> {
        self.state.as_deref()
    }

    pub fn attach(&mut self, state: S) {
        self.state = Some(Box::new(state));
    }

    /// Detach and return the algorithm state, if any
    pub fn detach(&mut self) -> Option<S> {
        self.state.take().map(|s| *s)
    }
}

/// A congestion control algorithm as seen by the transport engine
///
/// Hooks for one path are never invoked concurrently; different paths may be
/// driven from different threads, so algorithms keep all mutable state in
/// the path record.
pub trait CongestionAlgorithm: Send + Sync {
    /// Per-path private state
    type State: Send;

    /// Registration name
    const ID: &'static str;

    /// Registration number
    const NUMBER: u8;

    fn on_path_init(&self, path: &mut PathCongestion<Self::State>);

    fn on_notify(&self, path: &mut PathCongestion<Self::State>, notification: Notification);

    fn on_path_delete(&self, path: &mut PathCongestion<Self::State>);

    fn on_observe(&self, path: &PathCongestion<Self::State>) -> Observation;
}

/// Unknown `congestion-control` name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown congestion control algorithm '{0}' (expected one of: {})", CongestionControl::NAMES.join(", "))]
pub struct UnknownCongestionControl(pub String);

/// Congestion control algorithm selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CongestionControl {
    NewReno,
    Cubic,
    /// Delay-sensitive CUBIC; quinn has no delay variant, so it runs CUBIC
    #[default]
    DelayCubic,
    Bbr,
    /// Server-side unthrottled controller
    Unthrottled,
}

impl CongestionControl {
    /// Accepted configuration names
    pub const NAMES: [&'static str; 5] = ["newreno", "cubic", "dcubic", "bbr", UNTHROTTLED_ID];

    pub fn name(&self) -> &'static str {
        match self {
            CongestionControl::NewReno => "newreno",
            CongestionControl::Cubic => "cubic",
            CongestionControl::DelayCubic => "dcubic",
            CongestionControl::Bbr => "bbr",
            CongestionControl::Unthrottled => UNTHROTTLED_ID,
        }
    }

    /// Numeric algorithm id announced to the engine
    pub fn number(&self) -> u8 {
        match self {
            CongestionControl::NewReno => 1,
            CongestionControl::Cubic => 2,
            CongestionControl::DelayCubic => 3,
            CongestionControl::Bbr => 5,
            CongestionControl::Unthrottled => UNTHROTTLED_NUMBER,
        }
    }

    /// quinn controller factory implementing this algorithm
    pub fn factory(&self) -> Arc<dyn ControllerFactory + Send + Sync + 'static> {
        match self {
            CongestionControl::NewReno => Arc::new(NewRenoConfig::default()),
            CongestionControl::Cubic | CongestionControl::DelayCubic => Arc::new(CubicConfig::default()),
            CongestionControl::Bbr => Arc::new(BbrConfig::default()),
            CongestionControl::Unthrottled => Arc::new(UnthrottledConfig::default()),
        }
    }
}

impl FromStr for CongestionControl {
    type Err = UnknownCongestionControl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newreno" => Ok(CongestionControl::NewReno),
            "cubic" => Ok(CongestionControl::Cubic),
            "dcubic" => Ok(CongestionControl::DelayCubic),
            "bbr" => Ok(CongestionControl::Bbr),
            UNTHROTTLED_ID => Ok(CongestionControl::Unthrottled),
            _ => Err(UnknownCongestionControl(s.to_string())),
        }
    }
}

impl fmt::Display for CongestionControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for CongestionControl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
