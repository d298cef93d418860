// Telemetry data domain models
use crate::error::DecodeError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const STATE: &str = "state";
pub const POWER_WATTAGE: &str = "power_wattage";
pub const WATER_FLOW: &str = "water_flow";

/// Timestamps below this are epoch-seconds rather than epoch-milliseconds.
const SECONDS_CUTOFF: u64 = 100_000_000_000;

/// Largest raw timestamp magnitude accepted from a history document.
const MAX_RAW_TIMESTAMP: f64 = 1e15;

pub fn normalize_timestamp(timestamp: i64) -> i64 {
    if timestamp.unsigned_abs() < SECONDS_CUTOFF {
        timestamp * 1000
    } else {
        timestamp
    }
}

/// One `[timestamp, value]` pair, timestamp in epoch-milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, Value)")]
pub struct Sample {
    pub time_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

impl TryFrom<(f64, Value)> for Sample {
    type Error = DecodeError;

    fn try_from((timestamp, value): (f64, Value)) -> Result<Self, Self::Error> {
        if !timestamp.is_finite() || timestamp.abs() > MAX_RAW_TIMESTAMP {
            return Err(DecodeError::Timestamp(timestamp));
        }
        Ok(Self::new(
            normalize_timestamp(timestamp.round() as i64),
            sample_value(&value)?,
        ))
    }
}

/// Map a raw reading onto a number. Door and switch states arrive as words or
/// booleans; inactive states are 0 and any other word is 1.
fn sample_value(value: &Value) -> Result<f64, DecodeError> {
    match value {
        Value::Null => Ok(0.0),
        Value::Bool(on) => Ok(if *on { 1.0 } else { 0.0 }),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DecodeError::SampleValue(n.to_string())),
        Value::String(s) => match s.as_str() {
            "closed" | "off" | "false" | "" => Ok(0.0),
            word => Ok(word.parse::<f64>().unwrap_or(1.0)),
        },
        other => Err(DecodeError::SampleValue(other.to_string())),
    }
}

/// Raw history of one chart: channel name to samples in ascending time order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawSeriesSet {
    channels: BTreeMap<String, Vec<Sample>>,
}

impl RawSeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, name: &str, samples: Vec<Sample>) -> Self {
        self.channels.insert(name.to_string(), samples);
        self
    }

    /// Absent channels read as empty.
    pub fn channel(&self, name: &str) -> &[Sample] {
        self.channels.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.channels.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageTotals {
    /// kWh-equivalent for switches.
    pub total_power_usage: f64,
    /// Litres for switches.
    pub total_water_usage: f64,
    /// Seconds a door spent open.
    pub open_duration: f64,
}

/// Chart-ready series plus the usage accumulated while building them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedSeriesSet {
    pub channels: BTreeMap<String, Vec<Sample>>,
    pub totals: UsageTotals,
}

impl DerivedSeriesSet {
    /// Charts without usage semantics are plotted as delivered.
    pub fn passthrough(raw: RawSeriesSet) -> Self {
        Self {
            channels: raw.channels,
            totals: UsageTotals::default(),
        }
    }

    pub fn channel(&self, name: &str) -> &[Sample] {
        self.channels.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageKind {
    Door,
    Switch,
}

impl UsageKind {
    pub fn channels(self) -> &'static [&'static str] {
        match self {
            UsageKind::Door => &[STATE],
            UsageKind::Switch => &[STATE, POWER_WATTAGE, WATER_FLOW],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ChartKind {
    Door,
    Switch,
    /// Temperature, humidity, weather and friends.
    Passthrough(String),
}

impl ChartKind {
    pub fn usage_kind(&self) -> Option<UsageKind> {
        match self {
            ChartKind::Door => Some(UsageKind::Door),
            ChartKind::Switch => Some(UsageKind::Switch),
            ChartKind::Passthrough(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChartKind::Door => "door",
            ChartKind::Switch => "switch",
            ChartKind::Passthrough(label) => label,
        }
    }
}

impl From<String> for ChartKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "door" => ChartKind::Door,
            "switch" => ChartKind::Switch,
            _ => ChartKind::Passthrough(kind),
        }
    }
}

impl From<&str> for ChartKind {
    fn from(kind: &str) -> Self {
        ChartKind::from(kind.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl HistoryPeriod {
    pub fn as_segment(self) -> &'static str {
        match self {
            HistoryPeriod::Day => "day",
            HistoryPeriod::Week => "week",
            HistoryPeriod::Month => "month",
            HistoryPeriod::Year => "year",
        }
    }
}
