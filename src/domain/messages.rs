// Live channel message envelope and typed payloads
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const CLIENT_INIT: &str = "client_init";

/// Every type tag the server may send.
pub const INBOUND_TYPES: &[&str] = &[
    Uptime::TYPE,
    PowerUsageWaterFlow::TYPE,
    Environment::TYPE,
    SensorGauges::TYPE,
    PowerSwitches::TYPE,
    DoorIndicator::TYPE,
    Weather::TYPE,
];

/// `{type, data}` as received on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
}

/// A payload carried under a fixed type tag.
pub trait InboundPayload: DeserializeOwned + Send + 'static {
    const TYPE: &'static str;
}

/// Announcement sent once per successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "client_init")]
pub struct ClientInit {
    pub reconnect: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Uptime {
    /// Seconds since boot.
    pub uptime: f64,
    /// Server clock, epoch-seconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub day: bool,
    #[serde(default)]
    pub load: Vec<f64>,
}

impl InboundPayload for Uptime {
    const TYPE: &'static str = "uptime";
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Meter {
    pub current: f64,
    pub max: f64,
    pub total: f64,
    pub price: f64,
    /// Seconds covered by `total`.
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PowerUsageWaterFlow {
    pub power: Meter,
    pub water: Meter,
}

impl InboundPayload for PowerUsageWaterFlow {
    const TYPE: &'static str = "power_usage_water_flow";
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnvironmentPart {
    pub enabled: bool,
    pub mode: Option<String>,
    pub on: Option<i64>,
    pub off: Option<i64>,
    pub current: Option<f64>,
    pub alarm_min: Option<f64>,
    pub alarm_max: Option<f64>,
    pub alarm: Option<bool>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub heater: Option<EnvironmentPart>,
    pub sprayer: Option<EnvironmentPart>,
    pub light: Option<EnvironmentPart>,
    pub cooler: Option<EnvironmentPart>,
}

impl Environment {
    pub fn parts(&self) -> [(&'static str, Option<&EnvironmentPart>); 4] {
        [
            ("heater", self.heater.as_ref()),
            ("sprayer", self.sprayer.as_ref()),
            ("light", self.light.as_ref()),
            ("cooler", self.cooler.as_ref()),
        ]
    }
}

impl InboundPayload for Environment {
    const TYPE: &'static str = "environment";
}

/// The server sends some collections as arrays and some keyed by id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Keyed<T> {
    List(Vec<T>),
    Map(BTreeMap<String, T>),
}

impl<T> Keyed<T> {
    /// Items paired with their position or key.
    pub fn entries(&self) -> Vec<(String, &T)> {
        match self {
            Keyed::List(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            Keyed::Map(items) => items.iter().map(|(key, item)| (key.clone(), item)).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorReading {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub sensor_type: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub current: f64,
    pub alarm_min: f64,
    pub alarm_max: f64,
    pub limit_min: f64,
    pub limit_max: f64,
    pub alarm: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SensorGauges(pub Keyed<SensorReading>);

impl SensorGauges {
    /// Gauges are addressed by their id when present, else by position or key.
    pub fn readings(&self) -> Vec<(String, &SensorReading)> {
        self.0
            .entries()
            .into_iter()
            .map(|(key, sensor)| (sensor.id.clone().unwrap_or(key), sensor))
            .collect()
    }
}

impl InboundPayload for SensorGauges {
    const TYPE: &'static str = "sensor_gauge";
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PowerSwitch {
    pub id: String,
    pub name: String,
    pub power_wattage: f64,
    pub water_flow: f64,
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PowerSwitches(pub Keyed<PowerSwitch>);

impl PowerSwitches {
    pub fn switches(&self) -> Vec<&PowerSwitch> {
        self.0.entries().into_iter().map(|(_, switch)| switch).collect()
    }
}

impl InboundPayload for PowerSwitches {
    const TYPE: &'static str = "power_switches";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum DoorIndicator {
    Open,
    Closed,
}

impl From<String> for DoorIndicator {
    fn from(status: String) -> Self {
        if status == "open" {
            DoorIndicator::Open
        } else {
            DoorIndicator::Closed
        }
    }
}

impl InboundPayload for DoorIndicator {
    const TYPE: &'static str = "door_indicator";
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct City {
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Sun {
    pub rise: i64,
    pub set: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Forecast {
    /// Epoch-seconds.
    pub from: i64,
    pub to: i64,
    pub temperature: f64,
    pub weather: String,
    pub icon: String,
    pub wind_speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Weather {
    pub city: City,
    pub sun: Sun,
    pub day: bool,
    pub windspeed: String,
    pub hour_forecast: Vec<Forecast>,
    pub week_forecast: Vec<Forecast>,
}

impl InboundPayload for Weather {
    const TYPE: &'static str = "update_weather";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_init_wire_format() {
        let encoded = serde_json::to_value(ClientInit { reconnect: true }).unwrap();
        assert_eq!(encoded, json!({"type": "client_init", "reconnect": true}));
    }

    #[test]
    fn test_sensor_gauges_prefer_id_over_key() {
        let gauges: SensorGauges = serde_json::from_value(json!({
            "a": {"id": "probe1", "current": 24.5},
            "b": {"current": 60.0}
        }))
        .unwrap();

        let readings = gauges.readings();
        assert_eq!(readings[0].0, "probe1");
        assert_eq!(readings[1].0, "b");
        assert_eq!(readings[1].1.current, 60.0);
    }

    #[test]
    fn test_power_switches_accept_list() {
        let switches: PowerSwitches = serde_json::from_value(json!([
            {"id": "s1", "name": "Pump", "power_wattage": 15.0, "water_flow": 2.0, "state": true}
        ]))
        .unwrap();

        assert_eq!(switches.switches()[0].name, "Pump");
    }

    #[test]
    fn test_door_indicator_treats_anything_else_as_closed() {
        let open: DoorIndicator = serde_json::from_value(json!("open")).unwrap();
        let other: DoorIndicator = serde_json::from_value(json!("unknown")).unwrap();
        assert_eq!(open, DoorIndicator::Open);
        assert_eq!(other, DoorIndicator::Closed);
    }

    #[test]
    fn test_inbound_types_exclude_client_init() {
        assert!(!INBOUND_TYPES.contains(&CLIENT_INIT));
        assert_eq!(INBOUND_TYPES.len(), 7);
    }
}
