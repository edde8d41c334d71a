// Copyright (c) 2025 The TCPCC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TCPCC is a library of TCP congestion control algorithms exposed behind a
//! single polymorphic interface.
//!
//! A transport layer instantiates one of the seven provided controllers
//! (Reno, BIC, CUBIC, BBR, Copa, DCTCP, Vegas), drives it with
//! ACK/loss/timeout/ECN events, and reads back the sending window and, where
//! applicable, the pacing rate.
//!
//! ## Design
//!
//! * The transport owns a [`SocketState`] per connection and passes it by
//!   mutable reference to every controller call. It carries the shared
//!   variables (cwnd, ssthresh, MSS, smoothed RTT, RTO, TCP state).
//! * Each controller holds its own private state (sample windows, EWMA
//!   accumulators, mode machines, gains) behind the
//!   [`CongestionController`] trait.
//! * The library never reads the clock on its own: entry points that need
//!   wall-clock time take an explicit `Instant`, so tests can drive the
//!   algorithms deterministically.
//! * All entry points are total. Degenerate inputs (zero segments, zero RTT
//!   samples) are absorbed without corrupting the estimators.
//!
//! ## Usage
//!
//! ```
//! use std::time::{Duration, Instant};
//! use tcpcc::{build_congestion_controller, CongestionConfig, SocketState};
//! use tcpcc::{CongestionControlAlgorithm, CongestionController, CongestionEvent};
//!
//! let mut config = CongestionConfig::new();
//! config.set_congestion_control_algorithm(CongestionControlAlgorithm::Cubic);
//!
//! let mut cc = build_congestion_controller(&config);
//! let mut socket = SocketState::new(&config);
//!
//! // Per ACK: fold the RTT sample, then grow the window.
//! let now = Instant::now();
//! cc.on_packets_acked(&mut socket, now, 1, Duration::from_millis(50), false);
//! cc.increase_window(&mut socket, now, 1);
//!
//! // On a detected loss:
//! cc.on_congestion_event(&mut socket, now, CongestionEvent::PacketLoss);
//! ```

#![allow(dead_code)]

use std::time::Duration;

/// The default maximum segment size in bytes.
pub const DEFAULT_MSS: u64 = 1460;

/// The default hard cap on the congestion window in bytes.
pub const DEFAULT_MAX_CWND: u64 = 65535;

/// Sentinel meaning "slow start threshold not set yet".
///
/// An effectively unbounded threshold keeps a fresh connection in slow
/// start until the first congestion signal.
pub const INITIAL_SSTHRESH: u64 = 0x7fff_ffff;

/// Substitute RTT used by rate/BDP calculations before any min/base RTT
/// sample has been observed.
pub const DEFAULT_RTT: Duration = Duration::from_millis(10);

/// The default initial congestion window in segments.
pub const DEFAULT_INITIAL_CWND_SEGMENTS: u64 = 4;

/// The default minimal congestion window in segments.
pub const DEFAULT_MIN_CWND_SEGMENTS: u64 = 2;

/// Configuration for congestion control on a connection.
///
/// A single `CongestionConfig` is used both to build a controller and to
/// seed the transport-owned [`SocketState`].
#[derive(Debug, Clone)]
pub struct CongestionConfig {
    /// The congestion control algorithm for the connection.
    pub congestion_control_algorithm: CongestionControlAlgorithm,

    /// The maximum segment size in bytes.
    pub max_segment_size: u64,

    /// The hard cap on the congestion window in bytes.
    pub max_congestion_window: u64,

    /// The initial congestion window in segments.
    pub initial_congestion_window: u64,

    /// The minimal congestion window in segments.
    pub min_congestion_window: u64,

    /// Enable Hystart slow-start exit for CUBIC.
    pub hystart_enabled: bool,

    /// The delay spread within one round that makes Hystart leave slow
    /// start. The classic heuristic uses a few hundred microseconds.
    pub hystart_ack_delta: Duration,

    /// Enable CUBIC fast convergence.
    pub fast_convergence_enabled: bool,

    /// Enable the CUBIC TCP-friendly (Reno estimator) region.
    pub tcp_friendly_enabled: bool,

    /// Copa: weight of delay against throughput. A larger delta prefers
    /// lower queueing delay.
    pub copa_delta: f64,

    /// Copa: enter the competitive mode instead of the velocity mode when
    /// leaving slow start.
    pub copa_competitive: bool,

    /// DCTCP: EWMA weight for the ECN-marked fraction.
    pub dctcp_g: f64,

    /// The minimum duration for the BBR ProbeRTT state.
    pub bbr_probe_rtt_duration: Duration,
}

impl CongestionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the congestion control algorithm.
    pub fn set_congestion_control_algorithm(
        &mut self,
        algorithm: CongestionControlAlgorithm,
    ) -> &mut Self {
        self.congestion_control_algorithm = algorithm;
        self
    }

    /// Set the maximum segment size in bytes.
    pub fn set_max_segment_size(&mut self, mss: u64) -> &mut Self {
        self.max_segment_size = mss;
        self
    }

    /// Set the hard cap on the congestion window in bytes.
    pub fn set_max_congestion_window(&mut self, max_cwnd: u64) -> &mut Self {
        self.max_congestion_window = max_cwnd;
        self
    }

    /// Set the initial congestion window in segments.
    pub fn set_initial_congestion_window(&mut self, segments: u64) -> &mut Self {
        self.initial_congestion_window = segments;
        self
    }

    /// Set the minimal congestion window in segments.
    pub fn set_min_congestion_window(&mut self, segments: u64) -> &mut Self {
        self.min_congestion_window = segments;
        self
    }
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            congestion_control_algorithm: CongestionControlAlgorithm::default(),
            max_segment_size: DEFAULT_MSS,
            max_congestion_window: DEFAULT_MAX_CWND,
            initial_congestion_window: DEFAULT_INITIAL_CWND_SEGMENTS,
            min_congestion_window: DEFAULT_MIN_CWND_SEGMENTS,
            hystart_enabled: true,
            hystart_ack_delta: Duration::from_micros(500),
            fast_convergence_enabled: true,
            tcp_friendly_enabled: true,
            copa_delta: congestion_control::COPA_DELTA,
            copa_competitive: false,
            dctcp_g: congestion_control::DCTCP_G,
            bbr_probe_rtt_duration: Duration::from_millis(200),
        }
    }
}

pub use crate::congestion_control::build_congestion_controller;
pub use crate::congestion_control::CongestionControlAlgorithm;
pub use crate::congestion_control::CongestionController;
pub use crate::congestion_control::CongestionEvent;
pub use crate::congestion_control::SocketState;
pub use crate::congestion_control::TcpState;
pub use crate::error::Error;

/// A specialized [`Result`] type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[path = "congestion_control/congestion_control.rs"]
pub mod congestion_control;

pub mod error;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = CongestionConfig::new();
        assert_eq!(config.max_segment_size, DEFAULT_MSS);
        assert_eq!(config.max_congestion_window, DEFAULT_MAX_CWND);
        assert_eq!(config.initial_congestion_window, 4);
        assert_eq!(config.min_congestion_window, 2);
        assert_eq!(
            config.congestion_control_algorithm,
            CongestionControlAlgorithm::Bbr
        );
    }

    #[test]
    fn config_setters() {
        let mut config = CongestionConfig::new();
        config
            .set_congestion_control_algorithm(CongestionControlAlgorithm::Vegas)
            .set_max_segment_size(1200)
            .set_max_congestion_window(1_000_000)
            .set_initial_congestion_window(10)
            .set_min_congestion_window(4);

        assert_eq!(
            config.congestion_control_algorithm,
            CongestionControlAlgorithm::Vegas
        );
        assert_eq!(config.max_segment_size, 1200);
        assert_eq!(config.max_congestion_window, 1_000_000);
        assert_eq!(config.initial_congestion_window, 10);
        assert_eq!(config.min_congestion_window, 4);
    }
}
