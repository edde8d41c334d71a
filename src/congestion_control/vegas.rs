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

//! Vegas congestion control.
//!
//! Vegas estimates how many segments the connection keeps queued in the
//! network from the gap between expected throughput (cwnd/base_rtt) and
//! actual throughput (cwnd/current_rtt). It holds that backlog between
//! alpha and beta segments, growing the window below alpha and shrinking
//! it above beta, and leaves slow start as soon as the backlog passes
//! gamma.
//!
//! See <https://doi.org/10.1109/49.464716> (Brakmo and O'Malley, "TCP
//! Vegas: end to end congestion avoidance on a global Internet").

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::sampling::SampleWindow;
use super::CongestionController;
use super::CongestionEvent;
use super::SocketState;
use super::TcpState;

/// Grow the window while fewer than this many segments are queued.
const ALPHA: i64 = 2;

/// Shrink the window once more than this many segments are queued.
const BETA: i64 = 4;

/// Leave slow start once more than this many segments are queued.
const GAMMA: i64 = 1;

/// Max number of retained RTT samples.
const RTT_SAMPLE_WINDOW: usize = 100;

/// Base RTT validity window; past it the base is re-seeded from the
/// retained samples.
const BASE_RTT_WINDOW: Duration = Duration::from_secs(10);

/// Phases of the Vegas controller.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum VegasPhase {
    SlowStart,
    CongestionAvoidance,
    Recovery,
}

/// Vegas congestion control algorithm.
#[derive(Debug)]
pub struct Vegas {
    /// Mirror of the congestion window in bytes.
    cwnd: u64,

    /// Mirror of the slow start threshold in bytes.
    ssthresh: u64,

    /// Current phase.
    phase: VegasPhase,

    /// Lowest RTT observed, approximating the propagation delay.
    base_rtt: Option<Duration>,

    /// When the base RTT was last lowered or re-seeded.
    base_rtt_stamp: Option<Instant>,

    /// The most recent RTT sample.
    current_rtt: Duration,

    /// Smallest RTT within the current adjustment period.
    min_rtt_in_period: Option<Duration>,

    /// Recent RTT samples, in microseconds.
    rtt_samples: SampleWindow,

    /// Whether enough state exists to run the Vegas update. Cleared on
    /// loss, timeout, ECN and fast recovery.
    doing_vegas: bool,

    /// RTT samples folded in since the last reset.
    cnt_rtt: u64,
}

impl Vegas {
    pub fn new() -> Self {
        Self {
            cwnd: 0,
            ssthresh: 0,
            phase: VegasPhase::SlowStart,
            base_rtt: None,
            base_rtt_stamp: None,
            current_rtt: Duration::ZERO,
            min_rtt_in_period: None,
            rtt_samples: SampleWindow::new(RTT_SAMPLE_WINDOW, BASE_RTT_WINDOW),
            doing_vegas: false,
            cnt_rtt: 0,
        }
    }

    /// Estimated queued segments: cwnd_segments * (current - base) / base.
    fn calculate_diff(&self, socket: &SocketState) -> i64 {
        let base = match self.base_rtt {
            Some(base) if !base.is_zero() => base.as_micros() as i64,
            _ => return 0,
        };
        if self.current_rtt.is_zero() || socket.mss == 0 {
            return 0;
        }

        let cwnd_segments = (self.cwnd / socket.mss) as i64;
        let rtt_diff = self.current_rtt.as_micros() as i64 - base;

        cwnd_segments * rtt_diff / base
    }

    /// Track the lowest RTT, aging it out of the sample window.
    fn update_base_rtt(&mut self, now: Instant, rtt: Duration) {
        self.rtt_samples.push(now, rtt.as_micros() as u64);
        self.rtt_samples.evict_expired(now);

        match self.base_rtt {
            Some(base) if rtt >= base => {
                // Base unchanged; re-seed from retained samples once it
                // has gone stale.
                let stale = self
                    .base_rtt_stamp
                    .map_or(false, |stamp| now.saturating_duration_since(stamp) >= BASE_RTT_WINDOW);

                if stale {
                    if let Some(min) = self.rtt_samples.min() {
                        self.base_rtt = Some(Duration::from_micros(min));
                        self.base_rtt_stamp = Some(now);

                        trace!("{} base rtt re-seeded to {}us", self.name(), min);
                    }
                }
            }
            _ => {
                self.base_rtt = Some(rtt);
                self.base_rtt_stamp = Some(now);
            }
        }
    }

    /// Exponential growth, with the early exit once the estimated backlog
    /// passes gamma.
    fn slow_start(&mut self, socket: &mut SocketState, segments_acked: u64) -> u64 {
        if self.doing_vegas && self.calculate_diff(socket) > GAMMA {
            // The queue is building: stop doubling here.
            self.ssthresh = self.cwnd;
            socket.ssthresh = self.ssthresh;

            return self.cwnd;
        }

        let cwnd = self
            .cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(self.ssthresh);

        cwnd.min(socket.max_cwnd)
    }

    /// Reno-style linear growth, used until a base RTT is known.
    fn congestion_avoidance_reno(&self, socket: &SocketState, segments_acked: u64) -> u64 {
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

    /// The Vegas decision: hold the backlog between alpha and beta.
    fn vegas_update(&mut self, socket: &SocketState) -> u64 {
        let diff = self.calculate_diff(socket);
        let mss = socket.mss;
        let mut cwnd = self.cwnd;

        if diff < ALPHA {
            // Network underutilized.
            cwnd = cwnd.saturating_add(mss);
        } else if diff > BETA {
            // Queue building up; back off but never below two segments.
            if cwnd > 2 * mss {
                cwnd -= mss;
            }
        }

        // A new measurement period begins.
        self.min_rtt_in_period = None;

        cwnd.min(socket.max_cwnd)
    }

    /// Inflate the window by one segment per duplicate ACK.
    fn fast_recovery(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        self.cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(socket.max_cwnd)
    }

    fn disable_vegas(&mut self) {
        self.doing_vegas = false;
    }

    /// Drop all per-period counters; path knowledge (base RTT) survives.
    fn reset_state(&mut self) {
        self.doing_vegas = false;
        self.cnt_rtt = 0;
        self.min_rtt_in_period = None;
        self.current_rtt = Duration::ZERO;
    }
}

impl Default for Vegas {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController for Vegas {
    fn name(&self) -> &str {
        "Vegas"
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

        if socket.tcp_state == TcpState::Recovery {
            self.cwnd = self.fast_recovery(socket, segments_acked);
            self.phase = VegasPhase::Recovery;
        } else if self.cwnd < self.ssthresh {
            self.cwnd = self.slow_start(socket, segments_acked);
            self.phase = VegasPhase::SlowStart;
        } else {
            self.cwnd = if self.doing_vegas {
                self.vegas_update(socket)
            } else {
                self.congestion_avoidance_reno(socket, segments_acked)
            };
            self.phase = VegasPhase::CongestionAvoidance;
        }

        self.cwnd = self.cwnd.clamp(2 * socket.mss, socket.max_cwnd);
        socket.cwnd = self.cwnd;
    }

    fn on_packets_acked(
        &mut self,
        socket: &mut SocketState,
        now: Instant,
        segments_acked: u64,
        rtt: Duration,
        _ecn_marked: bool,
    ) {
        if segments_acked == 0 || rtt.is_zero() {
            return;
        }

        socket.update_rtt(rtt);

        self.current_rtt = rtt;
        self.update_base_rtt(now, rtt);

        self.min_rtt_in_period = Some(match self.min_rtt_in_period {
            Some(min) => min.min(rtt),
            None => rtt,
        });

        self.cnt_rtt += 1;

        // A known base RTT is all Vegas needs to run.
        if !self.doing_vegas && self.base_rtt.is_some() {
            self.doing_vegas = true;
        }
    }

    fn on_congestion_state_changed(&mut self, socket: &mut SocketState, state: TcpState) {
        socket.tcp_state = state;

        if state == TcpState::Recovery || state == TcpState::Loss {
            self.ssthresh(socket, 0);
            self.disable_vegas();
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
                self.phase = VegasPhase::Recovery;
                self.disable_vegas();
            }

            CongestionEvent::Timeout => {
                self.ssthresh(socket, 0);

                self.cwnd = socket.mss;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Loss;
                self.phase = VegasPhase::SlowStart;
                self.reset_state();
            }

            CongestionEvent::Ecn => {
                self.ssthresh(socket, 0);

                self.cwnd = self.ssthresh;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Cwr;
                self.disable_vegas();
            }

            CongestionEvent::FastRecovery => {
                socket.tcp_state = TcpState::Recovery;
                self.phase = VegasPhase::Recovery;
                self.disable_vegas();
            }

            _ => (),
        }
    }

    fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }
}
