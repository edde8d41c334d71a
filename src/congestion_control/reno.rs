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

//! Reno congestion control.
//!
//! The classic AIMD baseline: exponential slow start, linear congestion
//! avoidance, fast retransmit with window inflation during fast recovery,
//! and a multiplicative decrease of one half on loss.
//!
//! See RFC 5681.

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::CongestionController;
use super::CongestionEvent;
use super::SocketState;
use super::TcpState;

/// Reno congestion control algorithm.
///
/// Reno keeps no model of the network path; the only private state is a
/// mirror of the shared window variables, refreshed at the start of every
/// call.
#[derive(Debug, Default)]
pub struct Reno {
    /// Mirror of the congestion window in bytes.
    cwnd: u64,

    /// Mirror of the slow start threshold in bytes.
    ssthresh: u64,
}

impl Reno {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exponential growth, capped at the slow start threshold.
    fn slow_start(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        let cwnd = self
            .cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(self.ssthresh);

        cwnd.min(socket.max_cwnd)
    }

    /// Linear growth: about one segment per round trip.
    fn congestion_avoidance(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        if self.cwnd == 0 {
            return self.cwnd;
        }

        // cwnd += segments_acked * MSS^2 / cwnd, at least one byte per ACK
        // so tiny windows still make progress.
        let mut increment = segments_acked
            .saturating_mul(socket.mss)
            .saturating_mul(socket.mss)
            / self.cwnd;
        if increment == 0 && segments_acked > 0 {
            increment = 1;
        }

        self.cwnd.saturating_add(increment).min(socket.max_cwnd)
    }

    /// Inflate the window by one segment per duplicate ACK until the loss
    /// is repaired.
    fn fast_recovery(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        self.cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(socket.max_cwnd)
    }

    /// Fast retransmit: halve the threshold, enter recovery and inflate
    /// the window by the three duplicate ACKs that triggered it.
    fn fast_retransmit(&mut self, socket: &mut SocketState) {
        self.ssthresh(socket, 0);
        socket.tcp_state = TcpState::Recovery;

        self.cwnd = self
            .ssthresh
            .saturating_add(3 * socket.mss)
            .min(socket.max_cwnd);
        socket.cwnd = self.cwnd;
    }
}

impl CongestionController for Reno {
    fn name(&self) -> &str {
        "Reno"
    }

    fn ssthresh(&mut self, socket: &mut SocketState, _bytes_in_flight: u64) -> u64 {
        self.ssthresh = (socket.cwnd / 2).max(2 * socket.mss);
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
                // The window is left inflated until the fast retransmit
                // fires.
                self.ssthresh(socket, 0);
                socket.tcp_state = TcpState::Recovery;
            }

            CongestionEvent::Timeout => {
                self.ssthresh(socket, 0);

                // Restart from a single segment.
                self.cwnd = socket.mss;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Loss;
            }

            CongestionEvent::Ecn => {
                self.ssthresh(socket, 0);
                self.cwnd = self.ssthresh;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Cwr;
            }

            CongestionEvent::FastRecovery => {
                trace!("{} fast retransmit at cwnd {}", self.name(), socket.cwnd);
                self.fast_retransmit(socket);
            }

            _ => (),
        }
    }

    fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }
}
