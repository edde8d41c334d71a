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

//! Copa congestion control.
//!
//! Copa steers the sending rate by the queueing delay it observes: the
//! standing RTT above the minimum RTT, normalized to the minimum. Below
//! the target (delta) the rate rises, above it the rate falls, and a
//! velocity term that accumulates while the direction holds makes the
//! controller converge quickly without oscillating.
//!
//! See <https://web.mit.edu/copa/>.

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::sampling::SampleWindow;
use super::CongestionController;
use super::CongestionEvent;
use super::SocketState;
use super::TcpState;
use crate::CongestionConfig;
use crate::DEFAULT_RTT;

/// Delta: how much to weigh delay compared to throughput. The target
/// queueing delay is delta round trips.
pub const COPA_DELTA: f64 = 0.5;

/// Gain applied to each velocity adjustment.
const VELOCITY_GAIN: f64 = 1.0;

/// Min RTT validity window.
const MIN_RTT_WINDOW: Duration = Duration::from_secs(10);

/// Max number of retained RTT samples.
const RTT_SAMPLE_WINDOW: usize = 100;

/// Queueing delay above which slow start ends.
const SLOW_START_EXIT_THRESHOLD: Duration = Duration::from_millis(1);

/// Floor for the target rate in bytes per second.
const MIN_TARGET_RATE: u64 = 1000;

/// Copa operating modes.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum CopaMode {
    /// Exponential growth until queueing delay appears.
    SlowStart,

    /// Steady state: velocity-controlled rate tracking.
    Velocity,

    /// Like velocity mode, but tuned for competing with buffer-filling
    /// flows. Entered only by configuration.
    Competitive,
}

/// Copa configurable parameters.
#[derive(Debug)]
pub struct CopaConfig {
    /// Weight of delay against throughput.
    delta: f64,

    /// Leave slow start into the competitive mode instead of the default
    /// velocity mode.
    competitive: bool,
}

impl CopaConfig {
    pub fn from(conf: &CongestionConfig) -> Self {
        Self {
            delta: conf.copa_delta,
            competitive: conf.copa_competitive,
        }
    }
}

impl Default for CopaConfig {
    fn default() -> Self {
        Self {
            delta: COPA_DELTA,
            competitive: false,
        }
    }
}

/// Copa congestion control algorithm.
#[derive(Debug)]
pub struct Copa {
    /// Configuration.
    config: CopaConfig,

    /// Current operating mode.
    mode: CopaMode,

    /// Mirror of the congestion window in bytes.
    cwnd: u64,

    /// Mirror of the slow start threshold in bytes.
    ssthresh: u64,

    /// Lowest RTT observed within the validity window.
    min_rtt: Option<Duration>,

    /// When the min RTT was last lowered or re-seeded.
    min_rtt_stamp: Option<Instant>,

    /// Mean RTT over the recent sample window.
    standing_rtt: Option<Duration>,

    /// Recent RTT samples, in microseconds.
    rtt_samples: SampleWindow,

    /// Velocity of rate change, clamped to [-1, +1].
    velocity: f64,

    /// Target sending rate in bytes per second.
    target_rate: u64,

    /// Direction of the previous adjustment: +1, -1 or 0.
    prev_direction: i32,

    /// Normalized queueing delay at the previous adjustment.
    prev_queue_delay: f64,
}

impl Copa {
    pub fn new(config: CopaConfig) -> Self {
        Self {
            config,
            mode: CopaMode::SlowStart,
            cwnd: 0,
            ssthresh: 0,
            min_rtt: None,
            min_rtt_stamp: None,
            standing_rtt: None,
            rtt_samples: SampleWindow::new(RTT_SAMPLE_WINDOW, MIN_RTT_WINDOW),
            velocity: 0.0,
            target_rate: 0,
            prev_direction: 0,
            prev_queue_delay: 0.0,
        }
    }

    /// The minimum RTT, or the library default before any sample.
    fn min_rtt(&self) -> Duration {
        self.min_rtt.unwrap_or(DEFAULT_RTT)
    }

    /// Standing RTT above the minimum.
    fn standing_queue_delay(&self) -> Duration {
        match (self.standing_rtt, self.min_rtt) {
            (Some(standing), Some(min)) => standing.saturating_sub(min),
            _ => Duration::ZERO,
        }
    }

    /// Queueing delay as a fraction of the minimum RTT.
    fn normalized_queue_delay(&self) -> f64 {
        let min_rtt = self.min_rtt();
        if min_rtt.is_zero() {
            return 0.0;
        }

        self.standing_queue_delay().as_micros() as f64 / min_rtt.as_micros() as f64
    }

    /// Fold an RTT sample into the standing and minimum estimators.
    fn update_rtt_samples(&mut self, now: Instant, rtt: Duration) {
        self.rtt_samples.push(now, rtt.as_micros() as u64);
        self.rtt_samples.evict_expired(now);

        self.standing_rtt = self.rtt_samples.mean().map(Duration::from_micros);

        let stale = self
            .min_rtt_stamp
            .map_or(false, |stamp| now.saturating_duration_since(stamp) >= MIN_RTT_WINDOW);

        match self.min_rtt {
            // A smaller sample always wins; a stale minimum is re-seeded
            // by whatever the path delivers next.
            Some(min) if rtt < min || stale => {
                self.min_rtt = Some(rtt);
                self.min_rtt_stamp = Some(now);
            }
            None => {
                self.min_rtt = Some(rtt);
                self.min_rtt_stamp = Some(now);
            }
            _ => (),
        }
    }

    /// One velocity step.
    ///
    /// The direction follows the normalized queueing delay against delta;
    /// a change of direction takes a full delta step, a held direction
    /// takes half of one, and the result stays within [-1, +1].
    fn update_velocity(&mut self) {
        let queue_delay = self.normalized_queue_delay();
        let delta = self.config.delta;

        let direction = if queue_delay < delta {
            1
        } else if queue_delay > delta {
            -1
        } else {
            0
        };

        let update = if direction != self.prev_direction && self.prev_direction != 0 {
            delta * direction as f64
        } else if direction != 0 {
            0.5 * delta * direction as f64
        } else {
            0.0
        };

        self.velocity = (self.velocity + update * VELOCITY_GAIN).clamp(-1.0, 1.0);
        self.prev_direction = direction;
        self.prev_queue_delay = queue_delay;
    }

    /// Rate the window should converge to: the current rate scaled by
    /// (1 + velocity * delta).
    fn update_target_rate(&mut self, socket: &SocketState) {
        let min_rtt = self.min_rtt().max(Duration::from_micros(1));
        let current_rate = socket.cwnd as f64 * 1_000_000.0 / min_rtt.as_micros() as f64;
        let target = current_rate * (1.0 + self.velocity * self.config.delta);

        self.target_rate = (target as u64).max(MIN_TARGET_RATE);
    }

    /// Move the window toward target_rate * min_rtt, one segment at most
    /// per step.
    fn update_cwnd_from_rate(&mut self, socket: &SocketState) -> u64 {
        if self.target_rate == 0 {
            return self.cwnd;
        }

        let min_rtt = self.min_rtt();
        let new_cwnd = (self.target_rate as u128 * min_rtt.as_micros() / 1_000_000) as u64;

        if new_cwnd > self.cwnd {
            new_cwnd.min(self.cwnd.saturating_add(socket.mss))
        } else {
            new_cwnd.max(self.cwnd.saturating_sub(socket.mss))
        }
    }

    /// Leave slow start into the configured steady-state mode.
    fn enter_steady_state(&mut self) {
        self.mode = if self.config.competitive {
            CopaMode::Competitive
        } else {
            CopaMode::Velocity
        };
        self.velocity = 0.0;
        self.prev_direction = 0;
        self.prev_queue_delay = self.normalized_queue_delay();

        trace!(
            "{} slow start exit into {:?}, queue_delay={:?}",
            self.name(),
            self.mode,
            self.standing_queue_delay()
        );
    }

    /// Restart probing from scratch.
    fn enter_slow_start(&mut self) {
        self.mode = CopaMode::SlowStart;
        self.velocity = 0.0;
        self.prev_direction = 0;
        self.target_rate = 0;
    }

    fn in_steady_state(&self) -> bool {
        matches!(self.mode, CopaMode::Velocity | CopaMode::Competitive)
    }
}

impl CongestionController for Copa {
    fn name(&self) -> &str {
        "Copa"
    }

    fn ssthresh(&mut self, socket: &mut SocketState, _bytes_in_flight: u64) -> u64 {
        // Reduce to cwnd * (1 - delta/2), gentler than halving.
        self.ssthresh = ((socket.cwnd as f64 * (1.0 - self.config.delta / 2.0)) as u64)
            .max(2 * socket.mss);
        socket.ssthresh = self.ssthresh;

        self.ssthresh
    }

    fn increase_window(&mut self, socket: &mut SocketState, _now: Instant, segments_acked: u64) {
        if segments_acked == 0 {
            return;
        }

        self.cwnd = socket.cwnd;
        self.ssthresh = socket.ssthresh;

        self.cwnd = match self.mode {
            CopaMode::SlowStart => self
                .cwnd
                .saturating_add(segments_acked.saturating_mul(socket.mss)),
            CopaMode::Velocity | CopaMode::Competitive => self.update_cwnd_from_rate(socket),
        };

        // Two segments suffice while probing; steady state keeps four to
        // preserve the delay signal.
        let floor = if self.mode == CopaMode::SlowStart {
            2 * socket.mss
        } else {
            4 * socket.mss
        };

        self.cwnd = self.cwnd.clamp(floor, socket.max_cwnd);
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
        self.update_rtt_samples(now, rtt);

        if self.mode == CopaMode::SlowStart
            && self.standing_queue_delay() > SLOW_START_EXIT_THRESHOLD
        {
            self.enter_steady_state();
        }

        if self.in_steady_state() {
            self.update_velocity();
            self.update_target_rate(socket);

            trace!(
                "{} velocity={:.3} target_rate={} queue_delay={:?}",
                self.name(),
                self.velocity,
                self.target_rate,
                self.standing_queue_delay()
            );
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
            CongestionEvent::PacketLoss | CongestionEvent::Ecn => {
                // Moderate reduction; delay, not loss, is the primary
                // signal.
                self.cwnd = ((socket.cwnd as f64 * (1.0 - self.config.delta / 2.0)) as u64)
                    .max(4 * socket.mss);
                socket.cwnd = self.cwnd;

                self.velocity = 0.0;
                self.prev_direction = 0;

                if event == CongestionEvent::Ecn {
                    socket.tcp_state = TcpState::Cwr;
                }
            }

            CongestionEvent::Timeout => {
                self.cwnd = 4 * socket.mss;
                socket.cwnd = self.cwnd;
                socket.tcp_state = TcpState::Loss;

                self.enter_slow_start();
            }

            CongestionEvent::FastRecovery => {
                socket.tcp_state = TcpState::Recovery;
            }

            _ => (),
        }
    }

    fn in_slow_start(&self) -> bool {
        self.mode == CopaMode::SlowStart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CongestionConfig;

    fn test_setup() -> (Copa, SocketState, Instant) {
        let config = CongestionConfig::new();
        let socket = SocketState::new(&config);
        (Copa::new(CopaConfig::from(&config)), socket, Instant::now())
    }

    #[test]
    fn copa_velocity_steps() {
        let (mut copa, _socket, _now) = test_setup();
        copa.mode = CopaMode::Velocity;
        copa.min_rtt = Some(Duration::from_micros(10_000));

        // Queueing delay exactly at delta: no direction, no movement.
        copa.standing_rtt = Some(Duration::from_micros(15_000));
        copa.update_velocity();
        assert_eq!(copa.velocity, 0.0);
        assert_eq!(copa.prev_direction, 0);

        // Above delta with no previous direction: half step down.
        copa.standing_rtt = Some(Duration::from_micros(18_000));
        copa.update_velocity();
        assert_eq!(copa.velocity, -0.25);
        assert_eq!(copa.prev_direction, -1);

        // Holding the direction: another half step.
        copa.update_velocity();
        assert_eq!(copa.velocity, -0.5);

        // Reversing direction: a full delta step.
        copa.standing_rtt = Some(Duration::from_micros(12_000));
        copa.update_velocity();
        assert_eq!(copa.velocity, 0.0);
        assert_eq!(copa.prev_direction, 1);
    }

    #[test]
    fn copa_velocity_clamped() {
        let (mut copa, _socket, _now) = test_setup();
        copa.mode = CopaMode::Velocity;
        copa.min_rtt = Some(Duration::from_micros(10_000));
        copa.standing_rtt = Some(Duration::from_micros(30_000));

        for _ in 0..20 {
            copa.update_velocity();
            assert!(copa.velocity >= -1.0);
            assert!(copa.velocity <= 1.0);
        }
        assert_eq!(copa.velocity, -1.0);
    }

    #[test]
    fn copa_slow_start_exit() {
        let (mut copa, mut socket, now) = test_setup();

        // Low flat RTT keeps slow start going.
        copa.on_packets_acked(&mut socket, now, 1, Duration::from_micros(10_000), false);
        assert!(copa.in_slow_start());

        // The standing RTT rising 5 ms above the minimum crosses the 1 ms
        // exit threshold.
        copa.on_packets_acked(&mut socket, now, 1, Duration::from_micros(20_000), false);
        assert!(!copa.in_slow_start());
        assert_eq!(copa.mode, CopaMode::Velocity);
        // At that point the queueing delay sits exactly at delta.
        assert_eq!(copa.velocity, 0.0);
    }

    #[test]
    fn copa_slow_start_growth() {
        let (mut copa, mut socket, now) = test_setup();
        let cwnd = socket.cwnd;

        copa.increase_window(&mut socket, now, 2);
        assert_eq!(socket.cwnd, cwnd + 2 * socket.mss);
    }

    #[test]
    fn copa_cwnd_moves_one_segment_at_a_time() {
        let (mut copa, mut socket, now) = test_setup();
        copa.mode = CopaMode::Velocity;
        copa.min_rtt = Some(Duration::from_micros(100_000));
        socket.cwnd = 10 * socket.mss;

        // Target twice the current window: a single step only closes one
        // segment of the gap.
        let target_cwnd = 20 * socket.mss;
        copa.target_rate = target_cwnd * 10; // rate = cwnd / 100ms
        let cwnd = socket.cwnd;
        copa.increase_window(&mut socket, now, 1);
        assert_eq!(socket.cwnd, cwnd + socket.mss);

        // Target far below: one segment down per step.
        copa.target_rate = 8 * socket.mss * 10;
        let cwnd = socket.cwnd;
        copa.increase_window(&mut socket, now, 1);
        assert_eq!(socket.cwnd, cwnd - socket.mss);
    }

    #[test]
    fn copa_loss_reduction() {
        let (mut copa, mut socket, now) = test_setup();
        socket.cwnd = 20 * socket.mss;

        copa.velocity = -0.75;
        copa.prev_direction = -1;
        copa.on_congestion_event(&mut socket, now, CongestionEvent::PacketLoss);

        // cwnd * (1 - delta/2) = 0.75 * cwnd, and velocity state resets.
        assert_eq!(socket.cwnd, 15 * socket.mss);
        assert_eq!(copa.velocity, 0.0);
        assert_eq!(copa.prev_direction, 0);
    }

    #[test]
    fn copa_loss_floor() {
        let (mut copa, mut socket, now) = test_setup();
        socket.cwnd = 4 * socket.mss;

        copa.on_congestion_event(&mut socket, now, CongestionEvent::PacketLoss);
        assert_eq!(socket.cwnd, 4 * socket.mss);
    }

    #[test]
    fn copa_timeout_restarts_slow_start() {
        let (mut copa, mut socket, now) = test_setup();
        copa.mode = CopaMode::Velocity;
        socket.cwnd = 30 * socket.mss;

        copa.on_congestion_event(&mut socket, now, CongestionEvent::Timeout);

        assert_eq!(socket.cwnd, 4 * socket.mss);
        assert_eq!(socket.tcp_state, TcpState::Loss);
        assert!(copa.in_slow_start());
        assert_eq!(copa.target_rate, 0);
    }

    #[test]
    fn copa_min_rtt_reseeded_when_stale() {
        let (mut copa, mut socket, now) = test_setup();

        copa.on_packets_acked(&mut socket, now, 1, Duration::from_micros(10_000), false);
        assert_eq!(copa.min_rtt, Some(Duration::from_micros(10_000)));

        // Within the window a larger sample leaves the minimum alone.
        let later = now + Duration::from_secs(5);
        copa.on_packets_acked(&mut socket, later, 1, Duration::from_micros(50_000), false);
        assert_eq!(copa.min_rtt, Some(Duration::from_micros(10_000)));

        // Past the window, the next sample re-seeds it.
        let later = now + Duration::from_secs(11);
        copa.on_packets_acked(&mut socket, later, 1, Duration::from_micros(50_000), false);
        assert_eq!(copa.min_rtt, Some(Duration::from_micros(50_000)));
    }

    #[test]
    fn copa_competitive_mode_entry() {
        let mut config = CongestionConfig::new();
        config.copa_competitive = true;
        let mut copa = Copa::new(CopaConfig::from(&config));
        let mut socket = SocketState::new(&config);
        let now = Instant::now();

        copa.on_packets_acked(&mut socket, now, 1, Duration::from_micros(10_000), false);
        copa.on_packets_acked(&mut socket, now, 1, Duration::from_micros(20_000), false);

        assert_eq!(copa.mode, CopaMode::Competitive);
        assert!(!copa.in_slow_start());
    }
}
