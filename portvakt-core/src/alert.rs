//! ## portvakt-core::alert
//! **Detector output, persisted records and the subscriber wire format**
//!
//! An [`Alert`] is what a detector hands back from a single processing call.
//! Storage turns it into an [`AlertRecord`] (identity + server timestamp),
//! and the broadcast side only ever sees records, never raw alerts.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Alert categories known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    PortScan,
}

impl AlertKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            AlertKind::PortScan => "PORT_SCAN",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown alert kind: {0}")]
pub struct UnknownAlertKind(pub String);

impl FromStr for AlertKind {
    type Err = UnknownAlertKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PORT_SCAN" => Ok(AlertKind::PortScan),
            other => Err(UnknownAlertKind(other.to_string())),
        }
    }
}

/// Transient detector output. Not yet persisted, no identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub source: Option<IpAddr>,
    pub attributes: Map<String, Value>,
    pub detected_at: SystemTime,
}

impl Alert {
    pub fn new(kind: AlertKind, source: Option<IpAddr>, detected_at: SystemTime) -> Self {
        Self {
            kind,
            source,
            attributes: Map::new(),
            detected_at,
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn source_text(&self) -> Option<String> {
        self.source.map(|ip| ip.to_string())
    }

    /// The detector payload as persisted and broadcast: `type`, `src`, then
    /// every attribute.
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::with_capacity(self.attributes.len() + 2);
        details.insert("type".into(), Value::from(self.kind.as_str()));
        details.insert(
            "src".into(),
            self.source_text().map_or(Value::Null, Value::from),
        );
        for (key, value) in &self.attributes {
            details.insert(key.clone(), value.clone());
        }
        details
    }
}

/// An alert after storage assigned it an id and a server timestamp.
/// Read-only from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: AlertKind,
    pub source: Option<String>,
    pub details: Map<String, Value>,
}

impl AlertRecord {
    pub fn wire(&self) -> WireMessage<'_> {
        WireMessage {
            id: self.id,
            ts: wire_timestamp(&self.timestamp),
            kind: self.kind.as_str(),
            src: self.source.as_deref(),
            details: &self.details,
        }
    }

    pub fn to_wire_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.wire())
    }
}

/// Message pushed verbatim to every subscriber.
#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub id: i64,
    pub ts: String,
    #[serde(rename = "type")]
    pub kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<&'a str>,
    pub details: &'a Map<String, Value>,
}

/// ISO-8601, microsecond precision, trailing `Z`.
pub fn wire_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
