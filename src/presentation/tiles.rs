// Tile formatting for live dashboard values
use crate::domain::messages::{EnvironmentPart, Forecast, Meter};
use crate::domain::telemetry::Sample;

/// `1D02H03M04S`
pub fn format_uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{}D{:02}H{:02}M{:02}S", days, hours, minutes, secs)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterTile {
    /// `current/max`
    pub reading: String,
    /// Load bar height in percent.
    pub load_percentage: f64,
    pub total: String,
    pub costs: String,
}

fn load_percentage(meter: &Meter) -> f64 {
    if meter.max > 0.0 {
        meter.current / meter.max * 100.0
    } else {
        0.0
    }
}

/// Power totals arrive in Wh and are shown in kWh.
pub fn power_tile(meter: &Meter) -> MeterTile {
    let kwh = meter.total / 1000.0;
    MeterTile {
        reading: format!("{}/{}", meter.current, meter.max),
        load_percentage: load_percentage(meter),
        total: format!("{:.2}", kwh),
        costs: format!("{:.3}", meter.price * kwh),
    }
}

/// Water totals arrive in litres; the price is per cubic metre.
pub fn water_tile(meter: &Meter) -> MeterTile {
    MeterTile {
        reading: format!("{}/{}", meter.current, meter.max),
        load_percentage: load_percentage(meter),
        total: format!("{:.2}", meter.total),
        costs: format!("{:.3}", meter.price * (meter.total / 1000.0)),
    }
}

/// One-line summary of an environment part, or `None` when it is switched off.
pub fn environment_summary(name: &str, part: &EnvironmentPart) -> Option<String> {
    if !part.enabled {
        return None;
    }
    let unit = if name == "sprayer" { "%" } else { "°C" };

    let mut summary = format!(
        "{} ({}) is {}",
        name,
        part.mode.as_deref().unwrap_or("manual"),
        part.state.as_deref().unwrap_or("off")
    );
    if let Some(current) = part.current {
        summary.push_str(&format!(", current {:.3} {}", current, unit));
    }
    if let (Some(min), Some(max)) = (part.alarm_min, part.alarm_max) {
        summary.push_str(&format!(", alarm {:.3}-{:.3} {}", min, max, unit));
    }
    if part.alarm == Some(true) {
        summary.push_str(", ALARM");
    }
    Some(summary)
}

/// Forecast temperatures plotted at the middle of each forecast window.
pub fn forecast_series(forecasts: &[Forecast]) -> Vec<Sample> {
    forecasts
        .iter()
        .map(|forecast| {
            let middle = forecast.to - (forecast.to - forecast.from) / 2;
            Sample::new(middle * 1000, forecast.temperature)
        })
        .collect()
}
