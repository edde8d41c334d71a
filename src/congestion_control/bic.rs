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

//! BIC congestion control.
//!
//! BIC (Binary Increase Congestion control) remembers the window size at
//! the last loss (W_max) and searches for the new saturation point by
//! halving the distance to it on every ACK, bounded by a maximum probe
//! step Smax and a minimum step Smin. Past W_max it probes slowly first,
//! then additively.
//!
//! See <https://doi.org/10.1109/INFCOM.2004.1354672> (Xu, Harfoush, Rhee,
//! "Binary increase congestion control for fast long-distance networks").

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::CongestionController;
use super::CongestionEvent;
use super::SocketState;
use super::TcpState;

/// Multiplicative decrease factor. BIC reduces less aggressively than
/// Reno's one half.
const BETA: f64 = 0.8;

/// Maximum window increment per ACK, in segments.
const SMAX: u64 = 32;

/// Minimum window increment per ACK, in segments.
const SMIN: u64 = 1;

/// BIC congestion control algorithm.
#[derive(Debug)]
pub struct Bic {
    /// Mirror of the congestion window in bytes.
    cwnd: u64,

    /// Mirror of the slow start threshold in bytes.
    ssthresh: u64,

    /// Window size just before the last reduction (W_max), in bytes.
    last_max_cwnd: u64,

    /// Floor for the window during the current epoch.
    min_win: u64,

    /// Whether the binary search crossed W_max in this epoch.
    found_new_max: bool,

    /// ACKs counted since the epoch started.
    ack_count: u64,

    /// When the current growth epoch started.
    epoch_start: Option<Instant>,
}

impl Bic {
    pub fn new() -> Self {
        Self {
            cwnd: 0,
            ssthresh: 0,
            last_max_cwnd: 0,
            min_win: 0,
            found_new_max: false,
            ack_count: 0,
            epoch_start: None,
        }
    }

    /// Exponential growth, capped at the slow start threshold.
    fn slow_start(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        let cwnd = self
            .cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(self.ssthresh);

        cwnd.min(socket.max_cwnd)
    }

    /// Inflate the window by one segment per duplicate ACK.
    fn fast_recovery(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        self.cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(socket.max_cwnd)
    }

    /// One step of the binary-search window growth.
    fn bic_update(&mut self, socket: &SocketState) {
        let mss = socket.mss;
        if mss == 0 {
            return;
        }

        self.ack_count += 1;

        // Search toward W_max once it is known for this epoch, otherwise
        // probe additively above the current window.
        let target = if self.found_new_max && self.last_max_cwnd > 0 {
            self.last_max_cwnd
        } else {
            self.cwnd.saturating_add(SMAX * mss)
        };

        let dist = (target as i64 - self.cwnd as i64) / mss as i64;

        if dist > SMAX as i64 {
            // Far from the target: additive increase by Smax.
            self.cwnd = self.cwnd.saturating_add(SMAX * mss);
        } else if dist > SMIN as i64 {
            // Binary search: halve the remaining distance.
            let step = ((dist / 2) as u64).max(SMIN);
            self.cwnd = self.cwnd.saturating_add(step * mss);
        } else if dist > 0 {
            // Close to the target: linear increase.
            self.cwnd = self.cwnd.saturating_add(SMIN * mss);
        } else {
            // At or past the target.
            if !self.found_new_max {
                self.found_new_max = true;
                self.last_max_cwnd = self.cwnd;
            }

            // Probe slowly just above W_max, then switch back to the
            // additive step and move the maximum along.
            if self.cwnd < self.last_max_cwnd.saturating_add(SMAX * mss) {
                self.cwnd = self.cwnd.saturating_add(SMIN * mss);
            } else {
                self.cwnd = self.cwnd.saturating_add(SMAX * mss);
                self.last_max_cwnd = self.cwnd;
            }
        }

        if self.cwnd < self.min_win {
            self.cwnd = self.min_win;
        }
    }

    /// Reduce the window for a new epoch: remember W_max and shrink by
    /// beta.
    fn reduce(&mut self, socket: &mut SocketState, now: Instant) {
        if socket.cwnd > self.last_max_cwnd {
            self.last_max_cwnd = socket.cwnd;
        }

        self.ssthresh(socket, 0);
        self.min_win = self.ssthresh;
        self.found_new_max = false;
        self.epoch_start = Some(now);
        self.ack_count = 0;
    }

    /// Forget everything learned about the path.
    fn reset(&mut self, now: Instant) {
        self.last_max_cwnd = 0;
        self.min_win = 0;
        self.found_new_max = false;
        self.ack_count = 0;
        self.epoch_start = Some(now);
    }
}

impl Default for Bic {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController for Bic {
    fn name(&self) -> &str {
        "BIC"
    }

    fn ssthresh(&mut self, socket: &mut SocketState, _bytes_in_flight: u64) -> u64 {
        self.last_max_cwnd = socket.cwnd;
        self.ssthresh = ((socket.cwnd as f64 * BETA) as u64).max(2 * socket.mss);
        socket.ssthresh = self.ssthresh;

        self.ssthresh
    }

    fn increase_window(&mut self, socket: &mut SocketState, _now: Instant, segments_acked: u64) {
        if segments_acked == 0 {
            return;
        }

        self.cwnd = socket.cwnd;
        self.ssthresh = socket.ssthresh;

        if socket.tcp_state == TcpState::Recovery {
            self.cwnd = self.fast_recovery(socket, segments_acked);
        } else if self.cwnd < self.ssthresh {
            self.cwnd = self.slow_start(socket, segments_acked);
        } else {
            self.bic_update(socket);
        }

        self.cwnd = self.cwnd.min(socket.max_cwnd);
        socket.cwnd = self.cwnd;
    }

    fn on_packets_acked(
        &mut self,
        socket: &mut SocketState,
        _now: Instant,
        segments_acked: u64,
        rtt: Duration,
        _ecn_marked: bool,
    ) {
        if segments_acked == 0 || rtt.is_zero() {
            return;
        }

        socket.update_rtt(rtt);
    }

    fn on_congestion_state_changed(&mut self, socket: &mut SocketState, state: TcpState) {
        socket.tcp_state = state;

        if state == TcpState::Recovery || state == TcpState::Loss {
            self.ssthresh(socket, 0);
            self.min_win = self.ssthresh;
            self.found_new_max = false;
        }
    }

    fn on_congestion_event(
        &mut self,
        socket: &mut SocketState,
        now: Instant,
        event: CongestionEvent,
    ) {
        socket.last_event = Some(event);
        self.cwnd = socket.cwnd;

        match event {
            CongestionEvent::PacketLoss => {
                self.reduce(socket, now);

                self.cwnd = self.ssthresh;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Recovery;

                trace!(
                    "{} loss: w_max={} ssthresh={}",
                    self.name(),
                    self.last_max_cwnd,
                    self.ssthresh
                );
            }

            CongestionEvent::Timeout => {
                self.reduce(socket, now);

                self.cwnd = socket.mss;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Loss;
                self.reset(now);
            }

            CongestionEvent::Ecn => {
                self.ssthresh(socket, 0);
                self.min_win = self.ssthresh;
                self.found_new_max = false;

                self.cwnd = self.ssthresh;
                socket.cwnd = self.cwnd;
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
