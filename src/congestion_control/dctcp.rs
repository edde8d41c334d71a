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

//! DCTCP congestion control.
//!
//! DCTCP estimates the fraction of bytes that encountered congestion from
//! the ECN marks echoed by the receiver, keeps it in an EWMA (alpha), and
//! reduces the window in proportion to it instead of halving. A fully
//! marked window behaves like Reno; a lightly marked one gives up almost
//! nothing, which keeps datacenter queues short without starving
//! throughput.
//!
//! See <https://www.rfc-editor.org/rfc/rfc8257>.

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::CongestionController;
use super::CongestionEvent;
use super::SocketState;
use super::TcpState;
use crate::CongestionConfig;

/// EWMA weight for the marked fraction: 1/16.
pub const DCTCP_G: f64 = 0.0625;

/// DCTCP configurable parameters.
#[derive(Debug)]
pub struct DctcpConfig {
    /// EWMA weight for the ECN-marked fraction.
    g: f64,
}

impl DctcpConfig {
    pub fn from(conf: &CongestionConfig) -> Self {
        Self { g: conf.dctcp_g }
    }
}

impl Default for DctcpConfig {
    fn default() -> Self {
        Self { g: DCTCP_G }
    }
}

/// DCTCP congestion control algorithm.
#[derive(Debug)]
pub struct Dctcp {
    /// Configuration.
    config: DctcpConfig,

    /// Mirror of the congestion window in bytes.
    cwnd: u64,

    /// Mirror of the slow start threshold in bytes.
    ssthresh: u64,

    /// EWMA of the fraction of ECN-marked bytes, in [0, 1]. Starts at the
    /// conservative maximum.
    alpha: f64,

    /// ECN-marked bytes acked in the current window.
    acked_bytes_ecn: u64,

    /// Total bytes acked in the current window.
    acked_bytes_total: u64,

    /// Whether the last ACK carried a congestion-experienced echo.
    ce_state: bool,
}

impl Dctcp {
    pub fn new(config: DctcpConfig) -> Self {
        Self {
            config,
            cwnd: 0,
            ssthresh: 0,
            alpha: 1.0,
            acked_bytes_ecn: 0,
            acked_bytes_total: 0,
            ce_state: false,
        }
    }

    /// The current marked-fraction estimate.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fold the finished window's marked fraction into alpha:
    /// alpha = (1 - g) * alpha + g * F.
    fn update_alpha(&mut self) {
        if self.acked_bytes_total == 0 {
            return;
        }

        let fraction = self.acked_bytes_ecn as f64 / self.acked_bytes_total as f64;
        self.alpha = (1.0 - self.config.g) * self.alpha + self.config.g * fraction;
        self.alpha = self.alpha.clamp(0.0, 1.0);

        trace!(
            "{} alpha={:.6} marked={} total={}",
            self.name(),
            self.alpha,
            self.acked_bytes_ecn,
            self.acked_bytes_total
        );
    }

    /// Start accounting for the next window.
    fn reset_counters(&mut self) {
        self.acked_bytes_ecn = 0;
        self.acked_bytes_total = 0;
    }

    /// Exponential growth, capped at the slow start threshold.
    fn slow_start(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        let cwnd = self
            .cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(self.ssthresh);

        cwnd.min(socket.max_cwnd)
    }

    /// Linear growth, as standard TCP.
    fn congestion_avoidance(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        if self.cwnd == 0 {
            return self.cwnd;
        }

        let mut increment = segments_acked
            .saturating_mul(socket.mss)
            .saturating_mul(socket.mss)
            / self.cwnd;
        if increment == 0 && segments_acked > 0 {
            increment = 1;
        }

        self.cwnd.saturating_add(increment).min(socket.max_cwnd)
    }

    /// Inflate the window by one segment per duplicate ACK.
    fn fast_recovery(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        self.cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(socket.max_cwnd)
    }
}

impl CongestionController for Dctcp {
    fn name(&self) -> &str {
        "DCTCP"
    }

    fn ssthresh(&mut self, socket: &mut SocketState, _bytes_in_flight: u64) -> u64 {
        // Proportional reduction: cwnd * (1 - alpha/2). Gentler than
        // halving unless the whole window was marked.
        self.ssthresh =
            ((socket.cwnd as f64 * (1.0 - self.alpha / 2.0)) as u64).max(2 * socket.mss);
        socket.ssthresh = self.ssthresh;

        self.ssthresh
    }

    fn increase_window(&mut self, socket: &mut SocketState, _now: Instant, segments_acked: u64) {
        if segments_acked == 0 {
            return;
        }

        self.cwnd = socket.cwnd;
        self.ssthresh = socket.ssthresh;

        self.cwnd = if socket.tcp_state == TcpState::Recovery {
            self.fast_recovery(socket, segments_acked)
        } else if self.cwnd < self.ssthresh {
            self.slow_start(socket, segments_acked)
        } else {
            self.congestion_avoidance(socket, segments_acked)
        };

        self.cwnd = self.cwnd.min(socket.max_cwnd);
        socket.cwnd = self.cwnd;
    }

    fn on_packets_acked(
        &mut self,
        socket: &mut SocketState,
        _now: Instant,
        segments_acked: u64,
        rtt: Duration,
        ecn_marked: bool,
    ) {
        if segments_acked == 0 {
            return;
        }

        if !rtt.is_zero() {
            socket.update_rtt(rtt);
        }

        // Per-window ECN accounting. The marked flag arrives with the ACK
        // from the transport's ECN extractor.
        let acked_bytes = segments_acked.saturating_mul(socket.mss);
        self.acked_bytes_total = self.acked_bytes_total.saturating_add(acked_bytes);
        if ecn_marked {
            self.acked_bytes_ecn = self.acked_bytes_ecn.saturating_add(acked_bytes);
        }
        self.ce_state = ecn_marked;

        // One window's worth of ACKs closes the observation period.
        if self.acked_bytes_total >= socket.cwnd {
            self.update_alpha();
            self.reset_counters();
        }
    }

    fn on_congestion_state_changed(&mut self, socket: &mut SocketState, state: TcpState) {
        socket.tcp_state = state;

        if state == TcpState::Recovery || state == TcpState::Loss {
            self.ssthresh(socket, 0);
        }
    }

    fn on_congestion_event(
        &mut self,
        socket: &mut SocketState,
        _now: Instant,
        event: CongestionEvent,
    ) {
        socket.last_event = Some(event);
        self.cwnd = socket.cwnd;

        match event {
            CongestionEvent::PacketLoss => {
                self.ssthresh(socket, 0);

                self.cwnd = self.ssthresh;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Recovery;
            }

            CongestionEvent::Timeout => {
                self.ssthresh = (socket.cwnd / 2).max(2 * socket.mss);
                socket.ssthresh = self.ssthresh;

                self.cwnd = socket.mss;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Loss;

                // Assume the worst about the path again.
                self.alpha = 1.0;
                self.reset_counters();
            }

            CongestionEvent::Ecn => {
                self.ce_state = true;

                // In slow start the mark is recorded but the window is
                // not reduced yet.
                if socket.cwnd >= socket.ssthresh {
                    self.ssthresh(socket, 0);
                    self.cwnd = self.ssthresh;
                    socket.cwnd = self.cwnd;
                }
                socket.tcp_state = TcpState::Cwr;
            }

            CongestionEvent::FastRecovery => {
                socket.tcp_state = TcpState::Recovery;
            }

            _ => (),
        }
    }

    fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }
}
