//! ## portvakt-telemetry::metrics
//! **Prometheus counters for the capture → detect → sink pipeline**
//!
//! One [`MetricsRecorder`] is built at startup and shared (`Arc`) between the
//! capture thread and the service runtime. Every drop, fault and failure the
//! pipeline absorbs instead of propagating is counted here.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub frames_captured: IntCounter,
    pub packets_decoded: IntCounter,
    pub frames_malformed: IntCounter,
    pub detector_faults: IntCounterVec,
    pub alerts_detected: IntCounter,
    pub alerts_persisted: IntCounter,
    pub persist_failures: IntCounter,
    pub handoff_drops: IntCounter,
    pub broadcasts: IntCounter,
    pub subscriber_evictions: IntCounter,
    pub subscribers: IntGauge,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new_custom(Some("portvakt".into()), None)?;

        let frames_captured = IntCounter::new("frames_captured_total", "Frames read from the link")?;
        let packets_decoded =
            IntCounter::new("packets_decoded_total", "Frames decoded into IP packets")?;
        let frames_malformed =
            IntCounter::new("frames_malformed_total", "Frames that failed to decode")?;
        let detector_faults = IntCounterVec::new(
            Opts::new("detector_faults_total", "Packets a detector failed to process"),
            &["detector"],
        )?;
        let alerts_detected = IntCounter::new("alerts_detected_total", "Alerts raised by detectors")?;
        let alerts_persisted = IntCounter::new("alerts_persisted_total", "Alerts written to storage")?;
        let persist_failures =
            IntCounter::new("persist_failures_total", "Alerts that failed to persist")?;
        let handoff_drops = IntCounter::new(
            "handoff_drops_total",
            "Persisted alerts not handed to the broadcast domain",
        )?;
        let broadcasts = IntCounter::new("broadcasts_total", "Fan-out sweeps performed")?;
        let subscriber_evictions = IntCounter::new(
            "subscriber_evictions_total",
            "Subscribers removed after a failed delivery",
        )?;
        let subscribers = IntGauge::new("subscribers", "Currently connected subscribers")?;

        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(packets_decoded.clone()))?;
        registry.register(Box::new(frames_malformed.clone()))?;
        registry.register(Box::new(detector_faults.clone()))?;
        registry.register(Box::new(alerts_detected.clone()))?;
        registry.register(Box::new(alerts_persisted.clone()))?;
        registry.register(Box::new(persist_failures.clone()))?;
        registry.register(Box::new(handoff_drops.clone()))?;
        registry.register(Box::new(broadcasts.clone()))?;
        registry.register(Box::new(subscriber_evictions.clone()))?;
        registry.register(Box::new(subscribers.clone()))?;

        Ok(Self {
            registry,
            frames_captured,
            packets_decoded,
            frames_malformed,
            detector_faults,
            alerts_detected,
            alerts_persisted,
            persist_failures,
            handoff_drops,
            broadcasts,
            subscriber_evictions,
            subscribers,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn record_detector_fault(&self, detector: &str) {
        self.detector_faults.with_label_values(&[detector]).inc();
    }
}
