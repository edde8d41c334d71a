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

//! BBR congestion control.
//!
//! BBR builds an explicit model of the network path from two estimates: the
//! bottleneck bandwidth (a windowed maximum of per-ACK delivery rate
//! samples) and the round-trip propagation delay (a windowed minimum of RTT
//! samples). The product of the two is the pipe's capacity; cwnd and the
//! pacing rate are that capacity scaled by mode-dependent gains while a
//! four-state machine cycles through filling the pipe (Startup), draining
//! the queue it built (Drain), probing for more bandwidth (ProbeBW) and
//! re-measuring the propagation delay (ProbeRTT).
//!
//! Packet loss is deliberately not a signal: losses during bandwidth
//! probing are treated as noise.
//!
//! See <https://datatracker.ietf.org/doc/html/draft-cardwell-iccrg-bbr-congestion-control-00>.

use std::time::Duration;
use std::time::Instant;

use log::*;

use super::sampling::SampleWindow;
use super::CongestionController;
use super::CongestionEvent;
use super::SocketState;
use super::TcpState;
use crate::CongestionConfig;
use crate::INITIAL_SSTHRESH;

/// Startup gain in percent: 2/ln(2), the minimum that doubles the sending
/// rate every round.
const HIGH_GAIN: u64 = 289;

/// Drain gain in percent, the inverse of the startup gain.
const DRAIN_GAIN: u64 = 35;

/// Default cwnd gain in percent.
const CWND_GAIN: u64 = 200;

/// Cwnd gain in percent while probing for the propagation delay.
const PROBE_RTT_CWND_GAIN: u64 = 50;

/// Pacing gain cycle for ProbeBW, in percent. One phase probes above the
/// estimated bandwidth, one drains the resulting queue, six cruise.
const PROBE_BW_GAINS: [u64; 8] = [125, 75, 100, 100, 100, 100, 100, 100];

/// Max number of bandwidth samples in the max filter.
const BANDWIDTH_WINDOW: usize = 10;

/// Max number of retained RTT samples.
const RTT_SAMPLE_WINDOW: usize = 100;

/// Samples older than this are garbage collected.
const SAMPLE_MAX_AGE: Duration = Duration::from_secs(60);

/// Min RTT validity window; expiry forces a ProbeRTT visit.
const MIN_RTT_WINDOW: Duration = Duration::from_secs(10);

/// Rounds without bandwidth growth before the pipe counts as full.
const FULL_PIPE_ROUNDS: u64 = 3;

/// Pacing rate assumed before the first bandwidth sample.
const DEFAULT_PACING_RATE: u64 = 1_000_000;

/// Floor for the pacing rate in bytes per second.
const MIN_PACING_RATE: u64 = 1000;

/// Phase length fallback for the ProbeBW gain cycle.
const DEFAULT_CYCLE_PHASE: Duration = Duration::from_millis(100);

/// BBR operating modes.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum BbrMode {
    /// Exponential growth to find the bandwidth.
    Startup,

    /// Drain the queue created during startup.
    Drain,

    /// Cyclically probe for more bandwidth.
    ProbeBW,

    /// Hold a minimal window to measure the propagation delay.
    ProbeRTT,
}

/// BBR configurable parameters.
#[derive(Debug)]
pub struct BbrConfig {
    /// The minimum time spent in ProbeRTT.
    probe_rtt_duration: Duration,
}

impl BbrConfig {
    pub fn from(conf: &CongestionConfig) -> Self {
        Self {
            probe_rtt_duration: conf.bbr_probe_rtt_duration,
        }
    }
}

impl Default for BbrConfig {
    fn default() -> Self {
        Self {
            probe_rtt_duration: Duration::from_millis(200),
        }
    }
}

/// BBR congestion control algorithm.
#[derive(Debug)]
pub struct Bbr {
    /// Configuration.
    config: BbrConfig,

    /// Current mode.
    mode: BbrMode,

    /// Mirror of the congestion window in bytes.
    cwnd: u64,

    /// Delivery rate samples feeding the max filter, in bytes per second.
    bandwidth_samples: SampleWindow,

    /// Max over the bandwidth sample window.
    max_bandwidth: u64,

    /// Baseline for the full-pipe estimator. Advances only when the
    /// bandwidth estimate grows by at least a quarter.
    prev_max_bandwidth: u64,

    /// Rounds since the baseline last advanced.
    rounds_without_growth: u64,

    /// Recent RTT samples, in microseconds.
    rtt_samples: SampleWindow,

    /// Lowest RTT within the validity window.
    min_rtt: Option<Duration>,

    /// When the min RTT was last lowered or refreshed.
    min_rtt_stamp: Option<Instant>,

    /// Whether the min RTT went stale since the last refresh.
    is_min_rtt_expired: bool,

    /// Current pacing rate in bytes per second.
    pacing_rate: u64,

    /// Gain applied to the bandwidth estimate for pacing, in percent.
    pacing_gain: u64,

    /// Gain applied to the BDP for the window, in percent.
    cwnd_gain: u64,

    /// Position in the ProbeBW gain cycle.
    probe_bw_cycle_index: usize,

    /// When the current ProbeBW phase started.
    probe_bw_cycle_start: Option<Instant>,

    /// When ProbeRTT was entered.
    probe_rtt_start: Option<Instant>,

    /// Total bytes delivered on the connection.
    delivered_bytes: u64,
}

impl Bbr {
    pub fn new(config: BbrConfig) -> Self {
        let mut bbr = Self {
            config,
            mode: BbrMode::Startup,
            cwnd: 0,
            bandwidth_samples: SampleWindow::new(BANDWIDTH_WINDOW, SAMPLE_MAX_AGE),
            max_bandwidth: 0,
            prev_max_bandwidth: 0,
            rounds_without_growth: 0,
            rtt_samples: SampleWindow::new(RTT_SAMPLE_WINDOW, SAMPLE_MAX_AGE),
            min_rtt: None,
            min_rtt_stamp: None,
            is_min_rtt_expired: false,
            pacing_rate: DEFAULT_PACING_RATE,
            pacing_gain: HIGH_GAIN,
            cwnd_gain: CWND_GAIN,
            probe_bw_cycle_index: 0,
            probe_bw_cycle_start: None,
            probe_rtt_start: None,
            delivered_bytes: 0,
        };
        bbr.enter_startup();

        bbr
    }

    fn enter_startup(&mut self) {
        self.mode = BbrMode::Startup;
        self.pacing_gain = HIGH_GAIN;
        self.cwnd_gain = CWND_GAIN;
        self.rounds_without_growth = 0;
        self.prev_max_bandwidth = 0;
    }

    fn enter_drain(&mut self) {
        self.mode = BbrMode::Drain;

        // Pace well below the estimate to drain the queue startup built,
        // while the window keeps the pipe full.
        self.pacing_gain = DRAIN_GAIN;
        self.cwnd_gain = CWND_GAIN;
    }

    fn enter_probe_bw(&mut self, now: Instant) {
        self.mode = BbrMode::ProbeBW;
        self.cwnd_gain = CWND_GAIN;
        self.probe_bw_cycle_index = 0;
        self.probe_bw_cycle_start = Some(now);
        self.pacing_gain = PROBE_BW_GAINS[0];
    }

    fn enter_probe_rtt(&mut self, now: Instant) {
        self.mode = BbrMode::ProbeRTT;
        self.pacing_gain = 100;
        self.cwnd_gain = PROBE_RTT_CWND_GAIN;
        self.probe_rtt_start = Some(now);
    }

    /// Fold a delivery rate sample into the max filter and run the
    /// full-pipe estimator.
    fn update_bandwidth(&mut self, now: Instant, acked_bytes: u64, rtt: Duration) {
        if rtt.is_zero() {
            return;
        }

        let bandwidth = (acked_bytes as u128 * 1_000_000 / rtt.as_micros()) as u64;
        self.bandwidth_samples.push(now, bandwidth);
        self.bandwidth_samples.evict_expired(now);

        let new_max = self.bandwidth_samples.max().unwrap_or(0);

        if self.mode == BbrMode::Startup {
            // Plateau detection: the baseline only advances on >= 25%
            // growth; three stagnant rounds mean the pipe is full.
            if new_max as u128 * 4 >= self.prev_max_bandwidth as u128 * 5 {
                self.prev_max_bandwidth = new_max;
                self.rounds_without_growth = 0;
            } else {
                self.rounds_without_growth += 1;
            }
        }

        self.max_bandwidth = new_max;
    }

    /// Track the windowed minimum RTT and its freshness.
    fn update_min_rtt(&mut self, now: Instant, rtt: Duration) {
        if rtt.is_zero() {
            return;
        }

        self.rtt_samples.push(now, rtt.as_micros() as u64);
        self.rtt_samples.evict_expired(now);

        self.is_min_rtt_expired = self
            .min_rtt_stamp
            .map_or(false, |stamp| now.saturating_duration_since(stamp) >= MIN_RTT_WINDOW);

        match self.min_rtt {
            Some(min) if rtt < min || self.is_min_rtt_expired => {
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

    fn is_full_pipe(&self) -> bool {
        self.rounds_without_growth >= FULL_PIPE_ROUNDS
    }

    /// The BDP scaled by a gain, bounded to [4*MSS, max_cwnd].
    fn target_cwnd(&self, socket: &SocketState, gain_percent: u64) -> u64 {
        let min_rtt = match self.min_rtt {
            Some(min_rtt) if self.max_bandwidth > 0 => min_rtt,
            // No usable model yet.
            _ => return 4 * socket.mss,
        };

        let bdp = (self.max_bandwidth as u128 * min_rtt.as_micros() / 1_000_000) as u64;
        let target = bdp * gain_percent / 100;

        target.max(4 * socket.mss).min(socket.max_cwnd)
    }

    /// Bandwidth estimate scaled by a gain, with a floor.
    fn calculate_pacing_rate(&self, gain_percent: u64) -> u64 {
        if self.max_bandwidth == 0 {
            return DEFAULT_PACING_RATE;
        }

        (self.max_bandwidth * gain_percent / 100).max(MIN_PACING_RATE)
    }

    /// A stale min RTT calls for a ProbeRTT visit.
    fn should_probe_rtt(&self) -> bool {
        self.min_rtt.is_some() && self.is_min_rtt_expired
    }

    /// Advance the ProbeBW gain cycle once per ~min_rtt of wall clock.
    fn advance_probe_bw_gain(&mut self, now: Instant) {
        if self.mode != BbrMode::ProbeBW {
            return;
        }

        let cycle_start = match self.probe_bw_cycle_start {
            Some(start) => start,
            None => {
                self.probe_bw_cycle_start = Some(now);
                return;
            }
        };

        let phase_len = self.min_rtt.unwrap_or(DEFAULT_CYCLE_PHASE);
        if now.saturating_duration_since(cycle_start) >= phase_len {
            self.probe_bw_cycle_index = (self.probe_bw_cycle_index + 1) % PROBE_BW_GAINS.len();
            self.pacing_gain = PROBE_BW_GAINS[self.probe_bw_cycle_index];
            self.probe_bw_cycle_start = Some(now);
        }
    }

    /// Model update and state machine step, run on every clean ACK.
    fn bbr_update(&mut self, socket: &SocketState, now: Instant, acked_bytes: u64, rtt: Duration) {
        self.update_bandwidth(now, acked_bytes, rtt);
        self.update_min_rtt(now, rtt);

        self.pacing_rate = self.calculate_pacing_rate(self.pacing_gain);

        match self.mode {
            BbrMode::Startup => {
                if self.is_full_pipe() {
                    trace!(
                        "{} full pipe at {} B/s, entering drain",
                        self.name(),
                        self.max_bandwidth
                    );
                    self.enter_drain();
                }
            }

            BbrMode::Drain => {
                // The queue is drained once no more than one BDP remains
                // in flight.
                if socket.cwnd <= self.target_cwnd(socket, 100) {
                    self.enter_probe_bw(now);
                }
            }

            BbrMode::ProbeBW => {
                self.advance_probe_bw_gain(now);

                if self.should_probe_rtt() {
                    self.enter_probe_rtt(now);
                }
            }

            BbrMode::ProbeRTT => {
                let done = self
                    .probe_rtt_start
                    .map_or(false, |start| {
                        now.saturating_duration_since(start) >= self.config.probe_rtt_duration
                    });

                if done {
                    self.min_rtt_stamp = Some(now);
                    self.is_min_rtt_expired = false;
                    self.probe_rtt_start = None;

                    if self.is_full_pipe() {
                        self.enter_probe_bw(now);
                    } else {
                        self.enter_startup();
                    }
                }
            }
        }
    }
}

impl CongestionController for Bbr {
    fn name(&self) -> &str {
        "BBR"
    }

    fn ssthresh(&mut self, socket: &mut SocketState, _bytes_in_flight: u64) -> u64 {
        // BBR does not use a slow start threshold; keep the sentinel.
        socket.ssthresh = INITIAL_SSTHRESH;

        INITIAL_SSTHRESH
    }

    fn increase_window(&mut self, socket: &mut SocketState, _now: Instant, segments_acked: u64) {
        if segments_acked == 0 {
            return;
        }

        self.cwnd = socket.cwnd;

        let mut target = self.target_cwnd(socket, self.cwnd_gain);

        // ProbeRTT halves the target toward the four-segment floor so the
        // queue empties and the propagation delay shows.
        if self.mode == BbrMode::ProbeRTT {
            target = (target / 2).max(4 * socket.mss);
        }

        if self.cwnd < target {
            self.cwnd = self
                .cwnd
                .saturating_add(segments_acked.saturating_mul(socket.mss))
                .min(target);
        } else {
            self.cwnd = target;
        }

        self.cwnd = self.cwnd.clamp(4 * socket.mss, socket.max_cwnd);
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

        let acked_bytes = segments_acked.saturating_mul(socket.mss);
        self.delivered_bytes = self.delivered_bytes.saturating_add(acked_bytes);

        self.bbr_update(socket, now, acked_bytes, rtt);
    }

    fn on_congestion_state_changed(&mut self, socket: &mut SocketState, state: TcpState) {
        // BBR tracks the state for the transport's benefit but does not
        // react to it.
        socket.tcp_state = state;
    }

    fn on_congestion_event(
        &mut self,
        socket: &mut SocketState,
        _now: Instant,
        event: CongestionEvent,
    ) {
        socket.last_event = Some(event);

        match event {
            CongestionEvent::PacketLoss => {
                // Loss during probing is expected noise; the model, not
                // the loss, governs the window.
            }

            CongestionEvent::Timeout => {
                self.cwnd = 4 * socket.mss;
                socket.cwnd = self.cwnd;
                self.enter_startup();
            }

            CongestionEvent::Ecn => {
                // Informational only.
            }

            _ => (),
        }
    }

    fn in_slow_start(&self) -> bool {
        self.mode == BbrMode::Startup
    }

    fn pacing_rate(&self) -> Option<u64> {
        Some(self.pacing_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CongestionConfig;

    fn test_setup() -> (Bbr, SocketState, Instant) {
        let config = CongestionConfig::new();
        let mut socket = SocketState::new(&config);
        socket.max_cwnd = 10_000_000;
        (Bbr::new(BbrConfig::from(&config)), socket, Instant::now())
    }

    #[test]
    fn bbr_startup_to_drain_on_plateau() {
        let (mut bbr, mut socket, now) = test_setup();
        assert_eq!(bbr.pacing_gain, HIGH_GAIN);
        assert!(bbr.in_slow_start());

        // Bandwidth grows 1.0 -> 1.1 -> 1.2 -> 1.3 MB/s, then plateaus.
        // One segment per ACK; the RTT sets the sampled rate.
        let rtts = [
            Duration::from_micros(1460), // 1.00 MB/s
            Duration::from_micros(1327), // ~1.10 MB/s
            Duration::from_micros(1217), // ~1.20 MB/s
            Duration::from_micros(1123), // ~1.30 MB/s
            Duration::from_micros(1123),
            Duration::from_micros(1123),
        ];
        for rtt in rtts {
            bbr.on_packets_acked(&mut socket, now, 1, rtt, false);
            assert_eq!(bbr.mode, BbrMode::Startup);
        }

        // The third round without growth fills the pipe and drops the
        // pacing gain from 289 to 35.
        bbr.on_packets_acked(&mut socket, now, 1, Duration::from_micros(1123), false);
        assert_eq!(bbr.mode, BbrMode::Drain);
        assert!(bbr.is_full_pipe());
        assert_eq!(bbr.pacing_gain, DRAIN_GAIN);
        assert_eq!(bbr.cwnd_gain, CWND_GAIN);
    }

    #[test]
    fn bbr_drain_to_probe_bw() {
        let (mut bbr, mut socket, now) = test_setup();

        bbr.min_rtt = Some(Duration::from_millis(100));
        bbr.min_rtt_stamp = Some(now);
        bbr.rounds_without_growth = FULL_PIPE_ROUNDS;
        bbr.enter_drain();

        // Seed the model: 146000 bytes over 100 ms is 1.46 MB/s, so one
        // BDP is 146000 bytes.
        bbr.update_bandwidth(now, 146_000, Duration::from_millis(100));
        assert_eq!(bbr.max_bandwidth, 1_460_000);

        // In flight above one BDP: stay in drain.
        socket.cwnd = 300_000;
        bbr.on_packets_acked(&mut socket, now, 1, Duration::from_millis(100), false);
        assert_eq!(bbr.mode, BbrMode::Drain);

        // At or below one BDP the queue is drained.
        socket.cwnd = 100_000;
        bbr.on_packets_acked(&mut socket, now, 1, Duration::from_millis(100), false);
        assert_eq!(bbr.mode, BbrMode::ProbeBW);
        assert_eq!(bbr.pacing_gain, PROBE_BW_GAINS[0]);
    }

    #[test]
    fn bbr_max_filter_property() {
        let (mut bbr, _socket, now) = test_setup();

        let mut t = now;
        for bw in [500_000u64, 900_000, 700_000, 1_200_000, 800_000] {
            // acked_bytes = bw / 1000 over a 1 ms RTT.
            t += Duration::from_millis(1);
            bbr.update_bandwidth(t, bw / 1000, Duration::from_millis(1));

            assert_eq!(bbr.max_bandwidth, bbr.bandwidth_samples.max().unwrap());
        }
        assert_eq!(bbr.max_bandwidth, 1_200_000);

        // The filter window stays bounded.
        for _ in 0..20 {
            t += Duration::from_millis(1);
            bbr.update_bandwidth(t, 1000, Duration::from_millis(1));
        }
        assert!(bbr.bandwidth_samples.len() <= BANDWIDTH_WINDOW);
    }

    #[test]
    fn bbr_bandwidth_samples_age_out() {
        let (mut bbr, _socket, now) = test_setup();

        bbr.update_bandwidth(now, 10_000, Duration::from_millis(1));
        assert_eq!(bbr.bandwidth_samples.len(), 1);

        // Sixty-one seconds later the old sample is gone.
        let later = now + Duration::from_secs(61);
        bbr.update_bandwidth(later, 5_000, Duration::from_millis(1));
        assert_eq!(bbr.bandwidth_samples.len(), 1);
        assert_eq!(bbr.max_bandwidth, 5_000_000);
    }

    #[test]
    fn bbr_target_cwnd() {
        let (mut bbr, mut socket, _now) = test_setup();

        // No model yet: four segments.
        assert_eq!(bbr.target_cwnd(&socket, 100), 4 * socket.mss);

        // BDP = 1.46 MB/s * 100 ms = 146000 bytes.
        bbr.max_bandwidth = 1_460_000;
        bbr.min_rtt = Some(Duration::from_millis(100));
        assert_eq!(bbr.target_cwnd(&socket, 100), 146_000);
        assert_eq!(bbr.target_cwnd(&socket, 200), 292_000);

        // Capped by max_cwnd.
        socket.max_cwnd = 200_000;
        assert_eq!(bbr.target_cwnd(&socket, 200), 200_000);
    }

    #[test]
    fn bbr_increase_window_tracks_target() {
        let (mut bbr, mut socket, now) = test_setup();

        bbr.max_bandwidth = 1_460_000;
        bbr.min_rtt = Some(Duration::from_millis(100));
        bbr.cwnd_gain = 100;

        // Below target: grow by the acked bytes.
        socket.cwnd = 100_000;
        bbr.increase_window(&mut socket, now, 2);
        assert_eq!(socket.cwnd, 100_000 + 2 * socket.mss);

        // Above target: snap down to it.
        socket.cwnd = 200_000;
        bbr.increase_window(&mut socket, now, 1);
        assert_eq!(socket.cwnd, 146_000);
    }

    #[test]
    fn bbr_probe_bw_gain_cycle() {
        let (mut bbr, _socket, now) = test_setup();

        bbr.min_rtt = Some(Duration::from_millis(100));
        bbr.min_rtt_stamp = Some(now);
        bbr.enter_probe_bw(now);
        assert_eq!(bbr.pacing_gain, 125);

        // A phase lasts one min_rtt; short of it nothing moves.
        bbr.advance_probe_bw_gain(now + Duration::from_millis(50));
        assert_eq!(bbr.probe_bw_cycle_index, 0);

        // Each full phase advances the cycle.
        let mut t = now;
        for expected in [75, 100, 100, 100, 100, 100, 100, 125] {
            t += Duration::from_millis(100);
            bbr.advance_probe_bw_gain(t);
            assert_eq!(bbr.pacing_gain, expected);
        }
    }

    #[test]
    fn bbr_min_rtt_expiry_enters_probe_rtt() {
        let (mut bbr, mut socket, now) = test_setup();

        bbr.on_packets_acked(&mut socket, now, 1, Duration::from_millis(10), false);
        assert_eq!(bbr.min_rtt, Some(Duration::from_millis(10)));

        bbr.enter_probe_bw(now);

        // Eleven seconds without a lower sample: the estimate is stale,
        // the next ACK re-seeds it and requests ProbeRTT.
        let later = now + Duration::from_secs(11);
        bbr.on_packets_acked(&mut socket, later, 1, Duration::from_millis(20), false);

        assert_eq!(bbr.mode, BbrMode::ProbeRTT);
        assert_eq!(bbr.cwnd_gain, PROBE_RTT_CWND_GAIN);
        assert_eq!(bbr.min_rtt, Some(Duration::from_millis(20)));
    }

    #[test]
    fn bbr_probe_rtt_duration() {
        let (mut bbr, mut socket, now) = test_setup();

        bbr.min_rtt = Some(Duration::from_millis(10));
        bbr.min_rtt_stamp = Some(now);
        bbr.enter_probe_rtt(now);

        // Halved window during the probe.
        bbr.max_bandwidth = 14_600_000;
        socket.cwnd = 100_000;
        bbr.increase_window(&mut socket, now, 1);
        assert!(socket.cwnd <= bbr.target_cwnd(&socket, bbr.cwnd_gain) / 2 + socket.mss);

        // Before 200 ms elapse the mode holds.
        let early = now + Duration::from_millis(100);
        bbr.on_packets_acked(&mut socket, early, 1, Duration::from_millis(10), false);
        assert_eq!(bbr.mode, BbrMode::ProbeRTT);

        // Past the duration it exits; the pipe was never filled, so back
        // to startup with a fresh min RTT stamp.
        let done = now + Duration::from_millis(250);
        bbr.on_packets_acked(&mut socket, done, 1, Duration::from_millis(10), false);
        assert_eq!(bbr.mode, BbrMode::Startup);
        assert_eq!(bbr.min_rtt_stamp, Some(done));
        assert!(!bbr.is_min_rtt_expired);
    }

    #[test]
    fn bbr_ignores_packet_loss() {
        let (mut bbr, mut socket, now) = test_setup();
        socket.cwnd = 50_000;

        bbr.on_congestion_event(&mut socket, now, CongestionEvent::PacketLoss);
        assert_eq!(socket.cwnd, 50_000);
        assert_eq!(socket.last_event, Some(CongestionEvent::PacketLoss));

        bbr.on_congestion_event(&mut socket, now, CongestionEvent::Ecn);
        assert_eq!(socket.cwnd, 50_000);
    }

    #[test]
    fn bbr_timeout_restarts() {
        let (mut bbr, mut socket, now) = test_setup();
        socket.cwnd = 50_000;
        bbr.enter_probe_bw(now);

        bbr.on_congestion_event(&mut socket, now, CongestionEvent::Timeout);

        assert_eq!(socket.cwnd, 4 * socket.mss);
        assert_eq!(bbr.mode, BbrMode::Startup);
        assert_eq!(bbr.pacing_gain, HIGH_GAIN);
    }

    #[test]
    fn bbr_pacing_rate() {
        let (mut bbr, mut socket, now) = test_setup();

        // Before any bandwidth sample: the default rate.
        assert_eq!(bbr.pacing_rate(), Some(DEFAULT_PACING_RATE));

        // One segment over 10 ms: 146000 B/s, scaled by the startup gain.
        bbr.on_packets_acked(&mut socket, now, 1, Duration::from_millis(10), false);
        assert_eq!(bbr.pacing_rate(), Some(146_000 * HIGH_GAIN / 100));
    }

    #[test]
    fn bbr_ssthresh_is_sentinel() {
        let (mut bbr, mut socket, _now) = test_setup();
        socket.cwnd = 50_000;

        assert_eq!(bbr.ssthresh(&mut socket, 0), INITIAL_SSTHRESH);
        assert_eq!(socket.ssthresh, INITIAL_SSTHRESH);
    }
}
