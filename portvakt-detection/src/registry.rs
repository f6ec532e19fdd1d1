//! ## portvakt-detection::registry
//! **Ordered detector list with fault isolation**
//!
//! Every packet is offered to every detector in registration order. A
//! detector error only skips that packet for that detector; it is counted and
//! never propagated.

use portvakt_core::{Alert, Packet};
use tracing::debug;

use crate::{DetectionError, Detector};

struct Slot {
    detector: Box<dyn Detector>,
    faults: u64,
}

#[derive(Default)]
pub struct DetectorRegistry {
    slots: Vec<Slot>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, detector: Box<dyn Detector>) {
        debug!(detector = detector.name(), "detector registered");
        self.slots.push(Slot {
            detector,
            faults: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.detector.name()).collect()
    }

    pub fn process(&mut self, packet: &Packet) -> Vec<Alert> {
        self.process_with(packet, |_, _| {})
    }

    /// Like [`process`](Self::process), reporting each detector fault to
    /// `on_fault` as it happens.
    pub fn process_with<F>(&mut self, packet: &Packet, mut on_fault: F) -> Vec<Alert>
    where
        F: FnMut(&'static str, &DetectionError),
    {
        let mut alerts = Vec::new();
        for slot in &mut self.slots {
            match slot.detector.process(packet) {
                Ok(Some(alert)) => alerts.push(alert),
                Ok(None) => {}
                Err(e) => {
                    slot.faults += 1;
                    on_fault(slot.detector.name(), &e);
                }
            }
        }
        alerts
    }

    /// Fault count per detector, in registration order.
    pub fn faults(&self) -> Vec<(&'static str, u64)> {
        self.slots
            .iter()
            .map(|s| (s.detector.name(), s.faults))
            .collect()
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("detectors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortScanDetector;
    use portvakt_core::{AlertKind, TcpFlags};
    use std::time::{Duration, UNIX_EPOCH};

    struct Faulty;

    impl Detector for Faulty {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn process(&mut self, _packet: &Packet) -> Result<Option<Alert>, DetectionError> {
            Err(DetectionError::Malformed("boom".into()))
        }
    }

    struct Always;

    impl Detector for Always {
        fn name(&self) -> &'static str {
            "always"
        }

        fn process(&mut self, packet: &Packet) -> Result<Option<Alert>, DetectionError> {
            Ok(Some(Alert::new(
                AlertKind::PortScan,
                Some(packet.source),
                packet.timestamp,
            )))
        }
    }

    fn syn() -> Packet {
        Packet::tcp(
            UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            "10.0.0.5".parse().unwrap(),
            40000,
            "10.0.0.1".parse().unwrap(),
            22,
            TcpFlags::SYN,
        )
    }

    #[test]
    fn a_faulty_detector_does_not_suppress_others() {
        let mut registry = DetectorRegistry::new();
        registry.register(Box::new(Faulty));
        registry.register(Box::new(Always));

        let mut reported = Vec::new();
        let alerts = registry.process_with(&syn(), |name, _| reported.push(name));
        assert_eq!(alerts.len(), 1);
        assert_eq!(reported, vec!["faulty"]);

        registry.process(&syn());
        assert_eq!(registry.faults(), vec![("faulty", 2), ("always", 0)]);
    }

    #[test]
    fn every_detector_sees_every_packet() {
        let mut registry = DetectorRegistry::new();
        registry.register(Box::new(Always));
        registry.register(Box::new(PortScanDetector::new(1, 10)));

        let alerts = registry.process(&syn());
        assert_eq!(alerts.len(), 2);
        assert_eq!(registry.names(), vec!["always", "port_scan"]);
    }

    #[test]
    fn empty_registry_yields_nothing() {
        let mut registry = DetectorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.process(&syn()).is_empty());
    }
}
