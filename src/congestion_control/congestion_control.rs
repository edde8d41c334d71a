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

#![allow(unused_variables)]

use core::str::FromStr;
use std::fmt;
use std::time::Duration;
use std::time::Instant;

use crate::CongestionConfig;
use crate::Error;
use crate::Result;
use crate::INITIAL_SSTHRESH;

pub use bbr::Bbr;
pub use bbr::BbrConfig;
pub use bic::Bic;
pub use copa::Copa;
pub use copa::CopaConfig;
pub use copa::COPA_DELTA;
pub use cubic::Cubic;
pub use cubic::CubicConfig;
pub use dctcp::Dctcp;
pub use dctcp::DctcpConfig;
pub use dctcp::DCTCP_G;
pub use hystart::Hystart;
pub use reno::Reno;
pub use vegas::Vegas;

/// Available congestion control algorithms.
#[repr(C)]
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, strum_macros::EnumIter)]
pub enum CongestionControlAlgorithm {
    /// BBR uses recent measurements of a transport connection's delivery
    /// rate and round-trip time to build an explicit model of the network
    /// path, and controls both how fast it sends and how much data it
    /// allows in flight.
    #[default]
    Bbr,

    /// BIC grows the window by binary-searching between the window size at
    /// the last loss and the current one, plus additive probing beyond it.
    Bic,

    /// CUBIC uses a cubic function instead of a linear window increase to
    /// improve scalability and stability under fast and long-distance
    /// networks.
    Cubic,

    /// DCTCP keeps an EWMA of the fraction of ECN-marked bytes and reduces
    /// the window proportionally to it, targeting shallow datacenter
    /// queues.
    Dctcp,

    /// Reno is the classic AIMD baseline with slow start, fast retransmit
    /// and fast recovery.
    Reno,

    /// Vegas compares expected against actual throughput and keeps a small,
    /// bounded number of segments queued in the network.
    Vegas,

    /// Copa is a tunable delay-based algorithm driven by the gap between
    /// the standing RTT and the minimum RTT, with a velocity term that
    /// speeds up convergence.
    Copa,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        if algor.eq_ignore_ascii_case("bbr") {
            Ok(CongestionControlAlgorithm::Bbr)
        } else if algor.eq_ignore_ascii_case("bic") {
            Ok(CongestionControlAlgorithm::Bic)
        } else if algor.eq_ignore_ascii_case("cubic") {
            Ok(CongestionControlAlgorithm::Cubic)
        } else if algor.eq_ignore_ascii_case("dctcp") {
            Ok(CongestionControlAlgorithm::Dctcp)
        } else if algor.eq_ignore_ascii_case("reno") {
            Ok(CongestionControlAlgorithm::Reno)
        } else if algor.eq_ignore_ascii_case("vegas") {
            Ok(CongestionControlAlgorithm::Vegas)
        } else if algor.eq_ignore_ascii_case("copa") {
            Ok(CongestionControlAlgorithm::Copa)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// TCP congestion states of a connection.
#[repr(C)]
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum TcpState {
    /// Normal state, no congestion signal outstanding.
    #[default]
    Open = 0,

    /// Reordering has been observed but no loss assumed yet.
    Disorder = 1,

    /// The window was reduced in response to an ECN echo.
    Cwr = 2,

    /// Fast recovery after a fast retransmit.
    Recovery = 3,

    /// Loss state entered on a retransmission timeout.
    Loss = 4,
}

/// Congestion events reported by the transport.
///
/// The discriminants are stable and part of the external contract.
#[repr(C)]
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CongestionEvent {
    /// The connection (re-)entered slow start.
    SlowStart = 0,

    /// The connection entered congestion avoidance.
    CongestionAvoidance = 1,

    /// Fast recovery was entered after a fast retransmit.
    FastRecovery = 2,

    /// A retransmission timeout fired.
    Timeout = 3,

    /// An ECN echo arrived from the receiver.
    Ecn = 4,

    /// Packet loss was detected.
    PacketLoss = 5,

    /// Packet reordering was detected.
    Reordering = 6,
}

impl CongestionEvent {
    /// Whether an event of this kind is carried by a regular ACK, so that
    /// an RTT sample delivered alongside it can be trusted.
    ///
    /// Loss and timeout notifications are not ACKs; folding their RTT into
    /// the bandwidth and min-RTT estimators would corrupt them.
    pub fn is_clean_ack(&self) -> bool {
        !matches!(self, CongestionEvent::PacketLoss | CongestionEvent::Timeout)
    }
}

/// Shared per-connection congestion state.
///
/// The transport owns one `SocketState` per connection and passes it by
/// mutable reference to every controller call. The controller may read and
/// write every field but must not retain the reference beyond the call.
#[derive(Debug, Clone)]
pub struct SocketState {
    /// Current TCP congestion state.
    pub tcp_state: TcpState,

    /// The most recent congestion event, informational.
    pub last_event: Option<CongestionEvent>,

    /// Congestion window in bytes.
    pub cwnd: u64,

    /// Slow start threshold in bytes. `INITIAL_SSTHRESH` means unset.
    pub ssthresh: u64,

    /// Hard cap on the congestion window in bytes.
    pub max_cwnd: u64,

    /// Maximum segment size in bytes.
    pub mss: u64,

    /// The latest RTT sample.
    pub rtt: Duration,

    /// Mean variation of the RTT samples.
    pub rtt_var: Duration,

    /// Retransmission timeout derived from rtt and rtt_var.
    pub rto: Duration,
}

impl SocketState {
    pub fn new(config: &CongestionConfig) -> Self {
        let mss = config.max_segment_size;

        Self {
            tcp_state: TcpState::Open,
            last_event: None,
            cwnd: config.initial_congestion_window.saturating_mul(mss),
            ssthresh: INITIAL_SSTHRESH,
            max_cwnd: config.max_congestion_window,
            mss,
            rtt: Duration::ZERO,
            rtt_var: Duration::ZERO,
            rto: Duration::ZERO,
        }
    }

    /// Fold a new RTT sample into the smoothed estimator.
    ///
    /// The variation is seeded to `rtt/2` on the first sample and follows
    /// `rtt_var = (3*rtt_var + sample)/4` afterwards; the retransmission
    /// timeout is `rtt + 4*rtt_var`. Callers must reject zero samples.
    pub fn update_rtt(&mut self, rtt: Duration) {
        self.rtt = rtt;

        self.rtt_var = if self.rtt_var.is_zero() {
            rtt / 2
        } else {
            (self.rtt_var * 3 + rtt) / 4
        };

        self.rto = self.rtt + self.rtt_var * 4;
    }
}

/// Congestion control interfaces shared by different algorithms.
///
/// Every entry point is total: degenerate inputs (zero `segments_acked`,
/// zero RTT samples) are absorbed without touching the estimators.
pub trait CongestionController {
    /// Name of the congestion control algorithm.
    fn name(&self) -> &str;

    /// Compute the slow start threshold appropriate for leaving the
    /// current window, store it in `socket.ssthresh` and return it.
    ///
    /// The result is at least two segments for every loss-based algorithm;
    /// BBR, which does not use a threshold, stores its unset sentinel.
    fn ssthresh(&mut self, socket: &mut SocketState, bytes_in_flight: u64) -> u64;

    /// Grow the congestion window in response to an ACK of
    /// `segments_acked` segments, dispatching to slow start, congestion
    /// avoidance or fast recovery as appropriate.
    fn increase_window(&mut self, socket: &mut SocketState, now: Instant, segments_acked: u64);

    /// Fold a new RTT sample into the smoothed estimator and run
    /// algorithm-specific sampling (bandwidth, standing RTT, ECN
    /// accounting).
    ///
    /// A zero `rtt` means no RTT was measured on this ACK; such calls must
    /// not corrupt the min/base RTT estimators. `ecn_marked` tells whether
    /// the acked bytes carried a CE echo; only DCTCP consumes it.
    fn on_packets_acked(
        &mut self,
        socket: &mut SocketState,
        now: Instant,
        segments_acked: u64,
        rtt: Duration,
        ecn_marked: bool,
    );

    /// Record a TCP state transition. Entering recovery or loss computes a
    /// new slow start threshold.
    fn on_congestion_state_changed(&mut self, socket: &mut SocketState, state: TcpState);

    /// React to a congestion event with the algorithm's reduction policy.
    fn on_congestion_event(
        &mut self,
        socket: &mut SocketState,
        now: Instant,
        event: CongestionEvent,
    );

    /// Composite entry point: handle the event, then ingest the RTT sample
    /// if one was measured and the event is a clean ACK.
    fn cong_control(
        &mut self,
        socket: &mut SocketState,
        now: Instant,
        event: CongestionEvent,
        rtt: Duration,
    ) {
        self.on_congestion_event(socket, now, event);

        if !rtt.is_zero() && event.is_clean_ack() {
            self.on_packets_acked(socket, now, 1, rtt, event == CongestionEvent::Ecn);
        }
    }

    /// Whether the algorithm implements full congestion control.
    fn has_cong_control(&self) -> bool {
        true
    }

    /// Check if in slow start.
    fn in_slow_start(&self) -> bool {
        true
    }

    /// Current pacing rate estimated by the algorithm, in bytes per
    /// second. `None` if the algorithm does not pace.
    fn pacing_rate(&self) -> Option<u64> {
        None
    }
}

impl fmt::Debug for dyn CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller.")
    }
}

/// Build a congestion controller.
pub fn build_congestion_controller(conf: &CongestionConfig) -> Box<dyn CongestionController> {
    match conf.congestion_control_algorithm {
        CongestionControlAlgorithm::Bbr => Box::new(Bbr::new(BbrConfig::from(conf))),
        CongestionControlAlgorithm::Bic => Box::new(Bic::new()),
        CongestionControlAlgorithm::Cubic => Box::new(Cubic::new(CubicConfig::from(conf))),
        CongestionControlAlgorithm::Dctcp => Box::new(Dctcp::new(DctcpConfig::from(conf))),
        CongestionControlAlgorithm::Reno => Box::new(Reno::new()),
        CongestionControlAlgorithm::Vegas => Box::new(Vegas::new()),
        CongestionControlAlgorithm::Copa => Box::new(Copa::new(CopaConfig::from(conf))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn congestion_control_name() {
        let cases = [
            ("bbr", Ok(CongestionControlAlgorithm::Bbr)),
            ("Bbr", Ok(CongestionControlAlgorithm::Bbr)),
            ("BBR", Ok(CongestionControlAlgorithm::Bbr)),
            ("bic", Ok(CongestionControlAlgorithm::Bic)),
            ("BIC", Ok(CongestionControlAlgorithm::Bic)),
            ("cubic", Ok(CongestionControlAlgorithm::Cubic)),
            ("CUBIC", Ok(CongestionControlAlgorithm::Cubic)),
            ("dctcp", Ok(CongestionControlAlgorithm::Dctcp)),
            ("DCTCP", Ok(CongestionControlAlgorithm::Dctcp)),
            ("reno", Ok(CongestionControlAlgorithm::Reno)),
            ("Reno", Ok(CongestionControlAlgorithm::Reno)),
            ("vegas", Ok(CongestionControlAlgorithm::Vegas)),
            ("Vegas", Ok(CongestionControlAlgorithm::Vegas)),
            ("copa", Ok(CongestionControlAlgorithm::Copa)),
            ("COPA", Ok(CongestionControlAlgorithm::Copa)),
            ("cubci", Err(Error::InvalidConfig("unknown".into()))),
        ];

        for (name, algor) in cases {
            assert_eq!(CongestionControlAlgorithm::from_str(name), algor);
        }
    }

    #[test]
    fn congestion_control_build_congestion_controller() {
        let mut config = CongestionConfig::new();

        // Every algorithm id builds a controller whose name round-trips
        // through FromStr.
        for algor in CongestionControlAlgorithm::iter() {
            config.set_congestion_control_algorithm(algor);
            let cc = build_congestion_controller(&config);

            assert_eq!(cc.name().parse::<CongestionControlAlgorithm>(), Ok(algor));
            assert_eq!(cc.has_cong_control(), true);
            assert_eq!(format!("{:?}", cc), "congestion controller.");
        }

        config.set_congestion_control_algorithm(CongestionControlAlgorithm::Bbr);
        let cc = build_congestion_controller(&config);
        assert_eq!(cc.name(), "BBR");
        assert!(cc.pacing_rate().is_some());

        config.set_congestion_control_algorithm(CongestionControlAlgorithm::Reno);
        let cc = build_congestion_controller(&config);
        assert_eq!(cc.name(), "Reno");
        assert!(cc.pacing_rate().is_none());
    }

    #[test]
    fn socket_state_new() {
        let config = CongestionConfig::new();
        let socket = SocketState::new(&config);

        assert_eq!(socket.tcp_state, TcpState::Open);
        assert_eq!(socket.last_event, None);
        assert_eq!(socket.cwnd, 4 * config.max_segment_size);
        assert_eq!(socket.ssthresh, INITIAL_SSTHRESH);
        assert_eq!(socket.max_cwnd, config.max_congestion_window);
        assert_eq!(socket.mss, config.max_segment_size);
    }

    #[test]
    fn socket_state_update_rtt() {
        let config = CongestionConfig::new();
        let mut socket = SocketState::new(&config);

        // First sample seeds the variation to half the sample.
        socket.update_rtt(Duration::from_micros(50_000));
        assert_eq!(socket.rtt, Duration::from_micros(50_000));
        assert_eq!(socket.rtt_var, Duration::from_micros(25_000));
        assert_eq!(socket.rto, Duration::from_micros(150_000));

        // Subsequent samples follow the EWMA.
        socket.update_rtt(Duration::from_micros(100_000));
        assert_eq!(socket.rtt, Duration::from_micros(100_000));
        assert_eq!(socket.rtt_var, Duration::from_micros(43_750));
        assert_eq!(socket.rto, Duration::from_micros(275_000));

        // The invariant rto = rtt + 4 * rtt_var holds after any sample.
        socket.update_rtt(Duration::from_micros(30_000));
        assert_eq!(socket.rto, socket.rtt + socket.rtt_var * 4);
    }

    #[test]
    fn congestion_event_clean_ack() {
        assert!(CongestionEvent::SlowStart.is_clean_ack());
        assert!(CongestionEvent::CongestionAvoidance.is_clean_ack());
        assert!(CongestionEvent::FastRecovery.is_clean_ack());
        assert!(CongestionEvent::Ecn.is_clean_ack());
        assert!(CongestionEvent::Reordering.is_clean_ack());
        assert!(!CongestionEvent::PacketLoss.is_clean_ack());
        assert!(!CongestionEvent::Timeout.is_clean_ack());
    }

    #[test]
    fn cong_control_gates_rtt_on_clean_ack() {
        let config = CongestionConfig::new();
        let mut cc = Reno::new();
        let mut socket = SocketState::new(&config);
        let now = Instant::now();
        let rtt = Duration::from_millis(50);

        // A loss event must not ingest the RTT sample.
        cc.cong_control(&mut socket, now, CongestionEvent::PacketLoss, rtt);
        assert_eq!(socket.rtt, Duration::ZERO);

        // A clean ACK does.
        cc.cong_control(&mut socket, now, CongestionEvent::CongestionAvoidance, rtt);
        assert_eq!(socket.rtt, rtt);
    }
}

mod bbr;
mod bic;
mod copa;
mod cubic;
mod dctcp;
mod hystart;
mod reno;
mod sampling;
mod vegas;
