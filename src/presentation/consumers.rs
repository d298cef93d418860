// Logging consumers for dispatched payloads, charts and liveness
use crate::application::connection_manager::LivenessObserver;
use crate::application::dispatcher::MessageDispatcher;
use crate::application::history_cache::ChartRenderer;
use crate::domain::messages::{
    DoorIndicator, Environment, PowerSwitches, PowerUsageWaterFlow, SensorGauges, Uptime, Weather,
};
use crate::domain::telemetry::{ChartKind, DerivedSeriesSet};
use crate::error::RegistrationError;
use crate::presentation::tiles::{
    environment_summary, forecast_series, format_uptime, power_tile, water_tile,
};

/// Subscribe a tracing-based consumer to every live message type.
pub fn register_logging_consumers(
    dispatcher: &mut MessageDispatcher,
) -> Result<(), RegistrationError> {
    dispatcher.register(|uptime: Uptime| {
        tracing::info!(
            uptime = %format_uptime(uptime.uptime),
            day = uptime.day,
            load = ?uptime.load,
            "Uptime"
        );
    })?;

    dispatcher.register(|usage: PowerUsageWaterFlow| {
        let power = power_tile(&usage.power);
        let water = water_tile(&usage.water);
        tracing::info!(
            power = %power.reading,
            power_total_kwh = %power.total,
            power_costs = %power.costs,
            water = %water.reading,
            water_total_l = %water.total,
            water_costs = %water.costs,
            "Power and water usage"
        );
    })?;

    dispatcher.register(|environment: Environment| {
        for (name, part) in environment.parts() {
            match part.and_then(|part| environment_summary(name, part)) {
                Some(summary) => tracing::info!("Environment {}", summary),
                None => tracing::debug!("Environment {} disabled", name),
            }
        }
    })?;

    dispatcher.register(|gauges: SensorGauges| {
        for (id, sensor) in gauges.readings() {
            tracing::info!(
                sensor = %id,
                current = sensor.current,
                alarm = sensor.alarm,
                "Sensor reading"
            );
        }
    })?;

    dispatcher.register(|switches: PowerSwitches| {
        for switch in switches.switches() {
            tracing::info!(
                switch = %switch.name,
                on = switch.state,
                watt = switch.power_wattage,
                flow = switch.water_flow,
                "Power switch"
            );
        }
    })?;

    dispatcher.register(|door: DoorIndicator| match door {
        DoorIndicator::Open => tracing::info!("Door is open"),
        DoorIndicator::Closed => tracing::info!("Door is closed"),
    })?;

    dispatcher.register(|weather: Weather| {
        let hourly = forecast_series(&weather.hour_forecast);
        let weekly = forecast_series(&weather.week_forecast);
        tracing::info!(
            city = %weather.city.city,
            now = ?weather.hour_forecast.first().map(|f| f.temperature),
            hourly_points = hourly.len(),
            weekly_points = weekly.len(),
            "Weather update"
        );
    })?;

    Ok(())
}

#[derive(Debug, Default)]
pub struct LoggingChartRenderer;

impl ChartRenderer for LoggingChartRenderer {
    fn render(&self, chart_id: &str, kind: &ChartKind, series: &DerivedSeriesSet) {
        let points: usize = series.channels.values().map(Vec::len).sum();
        tracing::info!(
            chart = chart_id,
            kind = kind.as_str(),
            points,
            power_kwh = series.totals.total_power_usage,
            water_l = series.totals.total_water_usage,
            open_secs = series.totals.open_duration,
            "Chart rendered"
        );
    }
}

#[derive(Debug, Default)]
pub struct LoggingLiveness;

impl LivenessObserver for LoggingLiveness {
    fn online(&self) {
        tracing::info!("Online: connection restored");
    }

    fn offline(&self) {
        tracing::warn!("Offline: connection lost");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::Dispatch;
    use crate::domain::messages::INBOUND_TYPES;

    #[test]
    fn test_every_inbound_type_has_a_consumer() {
        let mut dispatcher = MessageDispatcher::new();
        register_logging_consumers(&mut dispatcher).unwrap();

        for message_type in INBOUND_TYPES {
            assert!(dispatcher.is_registered(message_type), "{}", message_type);
        }
    }

    #[test]
    fn test_consumers_accept_server_payloads() {
        let mut dispatcher = MessageDispatcher::new();
        register_logging_consumers(&mut dispatcher).unwrap();

        let frames = [
            r#"{"type": "uptime", "data": {"uptime": 3600, "timestamp": 1700000000, "day": true, "load": [0.1, 0.2, 0.3]}}"#,
            r#"{"type": "power_usage_water_flow", "data": {"power": {"current": 20, "max": 300, "total": 1500, "price": 0.22, "duration": 86400}, "water": {"current": 0, "max": 5, "total": 20, "price": 3.1, "duration": 86400}}}"#,
            r#"{"type": "environment", "data": {"heater": {"enabled": true, "mode": "timer", "on": 1700000000, "off": 1700030000, "state": "on"}, "sprayer": {}}}"#,
            r#"{"type": "sensor_gauge", "data": [{"id": "t1", "type": "temperature", "name": "Basking", "current": 31.2, "alarm": false}]}"#,
            r#"{"type": "power_switches", "data": {"s1": {"id": "s1", "name": "UV lamp", "power_wattage": 40, "water_flow": 0, "state": true}}}"#,
            r#"{"type": "door_indicator", "data": "closed"}"#,
            r#"{"type": "update_weather", "data": {"city": {"city": "Utrecht"}, "hour_forecast": [{"from": 0, "to": 3600, "temperature": 12.0}]}}"#,
        ];

        for frame in frames {
            assert!(matches!(dispatcher.dispatch(frame), Ok(Dispatch::Handled(_))), "{}", frame);
        }
    }
}
