//! ## portvakt-detection::portscan
//! **SYN-rate port-scan detection**
//!
//! A qualifying packet is a TCP segment with SYN set and ACK clear. Each one
//! is recorded under its source address; once a source has `syn_threshold`
//! or more qualifying packets inside `window_secs`, every further qualifying
//! packet raises a `PORT_SCAN` alert. There is no cooldown.

use std::net::IpAddr;
use std::time::{Duration, UNIX_EPOCH};

use ipnetwork::IpNetwork;
use portvakt_core::{Alert, AlertKind, Packet};
use tracing::{debug, trace};

use crate::window::SlidingWindow;
use crate::{DetectionError, Detector};

#[derive(Debug)]
pub struct PortScanDetector {
    threshold: usize,
    window_secs: u64,
    window: SlidingWindow<IpAddr>,
    allowlist: Vec<IpNetwork>,
}

impl PortScanDetector {
    pub fn new(syn_threshold: u32, window_secs: u64) -> Self {
        Self {
            threshold: syn_threshold.max(1) as usize,
            window_secs,
            window: SlidingWindow::new(Duration::from_secs(window_secs)),
            allowlist: Vec::new(),
        }
    }

    /// Sources inside any of these networks are never counted.
    pub fn with_allowlist(mut self, allowlist: Vec<IpNetwork>) -> Self {
        self.allowlist = allowlist;
        self
    }

    pub fn tracked_sources(&self) -> usize {
        self.window.tracked_keys()
    }

    fn is_allowlisted(&self, source: IpAddr) -> bool {
        self.allowlist.iter().any(|net| net.contains(source))
    }
}

impl Detector for PortScanDetector {
    fn name(&self) -> &'static str {
        "port_scan"
    }

    fn process(&mut self, packet: &Packet) -> Result<Option<Alert>, DetectionError> {
        let qualifies = packet
            .tcp_flags()
            .is_some_and(|flags| flags.is_connection_attempt());
        if !qualifies {
            return Ok(None);
        }
        if self.is_allowlisted(packet.source) {
            trace!(src = %packet.source, "allowlisted source");
            return Ok(None);
        }

        let at = packet
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map_err(|_| DetectionError::TimestampBeforeEpoch)?;
        let count = self.window.record(packet.source, at);
        if count < self.threshold {
            return Ok(None);
        }

        debug!(src = %packet.source, count, window_secs = self.window_secs, "port scan threshold reached");
        Ok(Some(
            Alert::new(AlertKind::PortScan, Some(packet.source), packet.timestamp)
                .with_attribute("count", count)
                .with_attribute("window_sec", self.window_secs),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portvakt_core::{TcpFlags, Transport};
    use proptest::prelude::*;
    use std::time::SystemTime;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn packet(src: &str, secs: u64, flags: TcpFlags) -> Packet {
        Packet::tcp(
            at(secs),
            src.parse().unwrap(),
            40000,
            "10.0.0.1".parse().unwrap(),
            22,
            flags,
        )
    }

    fn syn(src: &str, secs: u64) -> Packet {
        packet(src, secs, TcpFlags::SYN)
    }

    #[test]
    fn third_syn_in_window_alerts() {
        let mut detector = PortScanDetector::new(3, 10);
        assert!(detector.process(&syn("10.0.0.5", 0)).unwrap().is_none());
        assert!(detector.process(&syn("10.0.0.5", 2)).unwrap().is_none());

        let alert = detector.process(&syn("10.0.0.5", 4)).unwrap().unwrap();
        let details = alert.details();
        assert_eq!(details["type"], "PORT_SCAN");
        assert_eq!(details["src"], "10.0.0.5");
        assert_eq!(details["count"], 3);
        assert_eq!(details["window_sec"], 10);
    }

    #[test]
    fn spread_out_syns_do_not_alert() {
        let mut detector = PortScanDetector::new(3, 10);
        for t in [0, 2, 15] {
            assert!(detector.process(&syn("10.0.0.5", t)).unwrap().is_none());
        }
    }

    #[test]
    fn syn_ack_is_never_counted() {
        let mut detector = PortScanDetector::new(1, 10);
        for t in 0..100 {
            let p = packet("10.0.0.5", t / 10, TcpFlags::SYN_ACK);
            assert!(detector.process(&p).unwrap().is_none());
        }
        assert_eq!(detector.tracked_sources(), 0);
    }

    #[test]
    fn non_tcp_is_ignored() {
        let mut detector = PortScanDetector::new(1, 10);
        let mut p = syn("10.0.0.5", 0);
        p.transport = Transport::Udp;
        assert!(detector.process(&p).unwrap().is_none());
    }

    #[test]
    fn alerts_repeat_while_saturated() {
        let mut detector = PortScanDetector::new(2, 10);
        detector.process(&syn("10.0.0.5", 0)).unwrap();
        assert!(detector.process(&syn("10.0.0.5", 1)).unwrap().is_some());
        let again = detector.process(&syn("10.0.0.5", 2)).unwrap().unwrap();
        assert_eq!(again.attributes["count"], 3);
    }

    #[test]
    fn late_syn_outside_window_does_not_alert() {
        let mut detector = PortScanDetector::new(2, 10);
        assert!(detector.process(&syn("10.0.0.5", 20)).unwrap().is_none());
        assert!(detector.process(&syn("10.0.0.5", 5)).unwrap().is_none());

        // A late SYN still inside the window counts at its own time.
        let alert = detector.process(&syn("10.0.0.5", 12)).unwrap().unwrap();
        assert_eq!(alert.attributes["count"], 2);
    }

    #[test]
    fn sources_are_independent() {
        let mut detector = PortScanDetector::new(2, 10);
        detector.process(&syn("10.0.0.5", 0)).unwrap();
        assert!(detector.process(&syn("10.0.0.6", 1)).unwrap().is_none());
    }

    #[test]
    fn allowlisted_sources_are_skipped() {
        let mut detector =
            PortScanDetector::new(1, 10).with_allowlist(vec!["10.0.0.0/24".parse().unwrap()]);
        assert!(detector.process(&syn("10.0.0.5", 0)).unwrap().is_none());
        assert!(detector.process(&syn("10.0.1.5", 0)).unwrap().is_some());
    }

    #[test]
    fn pre_epoch_timestamp_is_an_error() {
        let mut detector = PortScanDetector::new(1, 10);
        let mut p = syn("10.0.0.5", 0);
        p.timestamp = UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(
            detector.process(&p),
            Err(DetectionError::TimestampBeforeEpoch)
        );
    }

    /// Largest number of offsets that fit in any closed `span`-second interval.
    fn max_in_any_window(times: &[u64], span: u64) -> usize {
        times
            .iter()
            .map(|&start| times.iter().filter(|&&t| t >= start && t - start <= span).count())
            .max()
            .unwrap_or(0)
    }

    proptest! {
        #[test]
        fn dense_bursts_always_alert(
            threshold in 1u32..8,
            window in 1u64..30,
            gaps in proptest::collection::vec(0u64..5, 0..40),
        ) {
            let mut detector = PortScanDetector::new(threshold, window);
            let mut t = 0;
            let mut times = Vec::new();
            let mut alerted = false;
            for gap in gaps {
                t += gap;
                times.push(t);
                alerted |= detector.process(&syn("10.9.9.9", t)).unwrap().is_some();
            }
            let reached = max_in_any_window(&times, window) >= threshold as usize;
            prop_assert_eq!(alerted, reached);
        }

        #[test]
        fn unordered_stamps_only_alert_on_a_real_burst(
            threshold in 1u32..6,
            window in 1u64..20,
            stamps in proptest::collection::vec(0u64..60, 0..40),
        ) {
            let mut detector = PortScanDetector::new(threshold, window);
            let mut seen = Vec::new();
            for t in stamps {
                seen.push(t);
                if detector.process(&syn("10.9.9.9", t)).unwrap().is_some() {
                    prop_assert!(max_in_any_window(&seen, window) >= threshold as usize);
                }
            }
        }

        #[test]
        fn window_never_holds_stale_entries(
            window in 1u64..30,
            gaps in proptest::collection::vec(0u64..20, 1..60),
        ) {
            let mut detector = PortScanDetector::new(1_000, window);
            let src: IpAddr = "10.9.9.9".parse().unwrap();
            let mut t = 0;
            for gap in gaps {
                t += gap;
                detector.process(&syn("10.9.9.9", t)).unwrap();
                let now = Duration::from_secs(1_700_000_000 + t);
                let oldest = detector.window.oldest(&src).unwrap();
                prop_assert!(now - oldest <= Duration::from_secs(window));
            }
        }
    }
}
