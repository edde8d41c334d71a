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

//! CUBIC congestion control.
//!
//! CUBIC replaces the linear window growth of standard TCP with a cubic
//! function of the time since the last congestion event, centered on the
//! window size at that event (W_max). The window first approaches W_max
//! in a concave sweep, plateaus around it, then probes convexly beyond.
//! A Reno estimator keeps CUBIC at least as aggressive as standard TCP in
//! short-RTT regimes, and Hystart leaves slow start on rising delay
//! before the first loss.
//!
//! See <https://www.rfc-editor.org/rfc/rfc9438.html>.

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::CongestionController;
use super::CongestionEvent;
use super::Hystart;
use super::SocketState;
use super::TcpState;
use crate::CongestionConfig;

/// Cubic constant C, determining the aggressiveness of window growth.
const C: f64 = 0.4;

/// Cubic multiplicative decrease factor beta.
const BETA: f64 = 0.7;

/// Cubic configurable parameters.
#[derive(Debug)]
pub struct CubicConfig {
    /// Enable the Hystart slow-start exit heuristic.
    hystart_enabled: bool,

    /// Hystart delay-spread threshold.
    hystart_ack_delta: Duration,

    /// Enable fast convergence.
    fast_convergence_enabled: bool,

    /// Enable the TCP-friendly (Reno estimator) region.
    tcp_friendly_enabled: bool,
}

impl CubicConfig {
    pub fn from(conf: &CongestionConfig) -> Self {
        Self {
            hystart_enabled: conf.hystart_enabled,
            hystart_ack_delta: conf.hystart_ack_delta,
            fast_convergence_enabled: conf.fast_convergence_enabled,
            tcp_friendly_enabled: conf.tcp_friendly_enabled,
        }
    }
}

impl Default for CubicConfig {
    fn default() -> Self {
        Self::from(&CongestionConfig::default())
    }
}

/// CUBIC congestion control algorithm.
#[derive(Debug)]
pub struct Cubic {
    /// Configuration.
    config: CubicConfig,

    /// Hystart slow-start exit detector.
    hystart: Hystart,

    /// Mirror of the congestion window in bytes.
    cwnd: u64,

    /// Mirror of the slow start threshold in bytes.
    ssthresh: u64,

    /// Window size just before the last reduction (W_max), in bytes.
    last_max_cwnd: u64,

    /// Time for the cubic function to climb back to W_max, in seconds.
    k: f64,

    /// Estimated window of a Reno flow over the same path, in bytes.
    tcp_cwnd: u64,

    /// When the current growth epoch started. Seeded by the congestion
    /// event that opened the epoch, or lazily by the first congestion
    /// avoidance ACK.
    epoch_start: Option<Instant>,

    /// ACKs counted toward the next one-segment increment.
    ack_count: u64,

    /// Smallest RTT sample observed on the connection.
    delay_min: Option<Duration>,
}

impl Cubic {
    pub fn new(config: CubicConfig) -> Self {
        let hystart = Hystart::new(config.hystart_enabled, config.hystart_ack_delta);

        Self {
            config,
            hystart,
            cwnd: 0,
            ssthresh: 0,
            last_max_cwnd: 0,
            k: 0.0,
            tcp_cwnd: 0,
            epoch_start: None,
            ack_count: 0,
            delay_min: None,
        }
    }

    /// The cubic window at `t` seconds into the epoch, in bytes.
    ///
    /// W(t) = C * (t - K)^3 + W_max, with the cubic term scaled from
    /// segments to bytes.
    fn cubic_window(&self, t: f64, mss: u64) -> f64 {
        let delta_t = t - self.k;
        let target = self.last_max_cwnd as f64 + C * delta_t * delta_t * delta_t * mss as f64;

        target.max(0.0)
    }

    /// K = cubic_root(W_max * (1 - beta) / C), with W_max in segments.
    fn cubic_k(&self, mss: u64) -> f64 {
        if self.last_max_cwnd == 0 || mss == 0 {
            return 0.0;
        }

        let w_max_segments = self.last_max_cwnd as f64 / mss as f64;
        (w_max_segments * (1.0 - BETA) / C).cbrt()
    }

    /// Exponential growth, capped at the slow start threshold.
    fn slow_start(&mut self, socket: &SocketState, segments_acked: u64) -> u64 {
        let mut cwnd = self
            .cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss));

        if cwnd > self.ssthresh {
            cwnd = self.ssthresh;
            self.hystart.reset_round();
        }

        cwnd.min(socket.max_cwnd)
    }

    /// Inflate the window by one segment per duplicate ACK.
    fn fast_recovery(&self, socket: &SocketState, segments_acked: u64) -> u64 {
        self.cwnd
            .saturating_add(segments_acked.saturating_mul(socket.mss))
            .min(socket.max_cwnd)
    }

    /// One congestion avoidance step along the cubic curve.
    fn cubic_update(&mut self, socket: &SocketState, now: Instant) {
        let mss = socket.mss;
        if mss == 0 || self.cwnd == 0 {
            return;
        }

        self.ack_count += 1;

        // Without a preceding congestion event the curve has no origin
        // yet; anchor it at the current window so growth starts from the
        // plateau.
        let epoch_start = match self.epoch_start {
            Some(epoch_start) => epoch_start,
            None => {
                self.last_max_cwnd = self.cwnd;
                self.k = 0.0;
                self.tcp_cwnd = self.cwnd;
                self.epoch_start = Some(now);
                now
            }
        };

        let t = now.saturating_duration_since(epoch_start).as_secs_f64();
        let mut target = self.cubic_window(t, mss);

        // TCP-friendly region: follow the Reno estimate when it outgrows
        // the cubic curve.
        if self.config.tcp_friendly_enabled && !socket.rtt.is_zero() {
            let rtt_sec = socket.rtt.as_secs_f64();
            let tcp_increment = (3.0 * BETA / (2.0 - BETA)) * (t / rtt_sec) * mss as f64;
            let tcp_est = self.last_max_cwnd as f64 * (1.0 - BETA) + tcp_increment;

            self.tcp_cwnd = tcp_est as u64;
            if tcp_est > target {
                target = tcp_est;
            }
        }

        if target > self.cwnd as f64 {
            // Grow by one segment every cwnd/delta ACKs.
            let delta = (target as u64).saturating_sub(self.cwnd).max(1);
            let cnt = (self.cwnd / delta).max(1);

            if self.ack_count >= cnt {
                self.cwnd = self.cwnd.saturating_add(mss);
                self.ack_count = 0;
            }
        } else {
            // Above the curve: creep by one segment per window.
            if self.ack_count >= self.cwnd / mss {
                self.cwnd = self.cwnd.saturating_add(mss);
                self.ack_count = 0;
            }
        }
    }

    /// Open a new epoch after a congestion event at time `now`.
    fn reset_epoch(&mut self, now: Instant) {
        self.epoch_start = Some(now);
        self.ack_count = 0;
        self.tcp_cwnd = 0;
        self.hystart.reset_round();
    }

    /// Forget everything learned about the path.
    fn reset(&mut self) {
        self.last_max_cwnd = 0;
        self.k = 0.0;
        self.tcp_cwnd = 0;
        self.ack_count = 0;
        self.delay_min = None;
        self.epoch_start = None;
        self.hystart.reset_round();
    }
}

impl CongestionController for Cubic {
    fn name(&self) -> &str {
        "CUBIC"
    }

    fn ssthresh(&mut self, socket: &mut SocketState, _bytes_in_flight: u64) -> u64 {
        // Fast convergence: when the window stalls below the previous
        // maximum, release bandwidth early by shrinking W_max further.
        if self.config.fast_convergence_enabled && socket.cwnd < self.last_max_cwnd {
            self.last_max_cwnd = (socket.cwnd as f64 * (2.0 - BETA) / 2.0) as u64;
        } else {
            self.last_max_cwnd = socket.cwnd;
        }

        self.ssthresh = ((socket.cwnd as f64 * BETA) as u64).max(2 * socket.mss);
        socket.ssthresh = self.ssthresh;

        self.k = self.cubic_k(socket.mss);

        self.ssthresh
    }

    fn increase_window(&mut self, socket: &mut SocketState, now: Instant, segments_acked: u64) {
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
            self.cubic_update(socket, now);
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

        self.delay_min = Some(match self.delay_min {
            Some(min) => min.min(rtt),
            None => rtt,
        });

        // Hystart: leave slow start when the delay spread inside the
        // round signals a building queue.
        if socket.cwnd < socket.ssthresh && self.hystart.on_rtt_sample(rtt) {
            trace!(
                "{} hystart exit at cwnd {}, rtt {:?}",
                self.name(),
                socket.cwnd,
                rtt
            );

            self.ssthresh = socket.cwnd;
            socket.ssthresh = self.ssthresh;
            self.hystart.reset_round();
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
        now: Instant,
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

                self.reset_epoch(now);

                trace!(
                    "{} loss: w_max={} k={:.3} ssthresh={}",
                    self.name(),
                    self.last_max_cwnd,
                    self.k,
                    self.ssthresh
                );
            }

            CongestionEvent::Timeout => {
                self.ssthresh(socket, 0);

                self.cwnd = socket.mss;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Loss;

                self.reset();
            }

            CongestionEvent::Ecn => {
                self.ssthresh(socket, 0);

                self.cwnd = self.ssthresh;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Cwr;

                self.reset_epoch(now);
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
