// Usage deriver - Turns state-change history into stepped, usage-accumulated series
use crate::domain::telemetry::{
    DerivedSeriesSet, POWER_WATTAGE, RawSeriesSet, STATE, Sample, UsageKind, UsageTotals,
    WATER_FLOW,
};
use std::collections::BTreeMap;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Usage is integrated per second.
const UNIT_TIME_MS: f64 = 1000.0;

/// Derive chart series for a door or switch from its raw history.
///
/// Every state change is drawn as a step: each channel gets a closing sample
/// holding its previous value at the new timestamp, followed by the new
/// sample. Usage (value x seconds) is integrated between consecutive samples
/// and only while the earlier sample is non-zero. Each non-empty channel is
/// then padded to end at `now_ms` and to start no later than a day before it.
pub fn derive(raw: &RawSeriesSet, kind: UsageKind, now_ms: i64) -> DerivedSeriesSet {
    let states = sanitized_channel(raw, STATE, kind, raw.channel(STATE));
    let inputs: Vec<(&str, Vec<Sample>)> = kind
        .channels()
        .iter()
        .map(|&name| (name, sanitized_channel(raw, name, kind, &states)))
        .collect();

    let mut channels: BTreeMap<String, Vec<Sample>> = inputs
        .iter()
        .map(|(name, _)| (name.to_string(), Vec::new()))
        .collect();
    let mut totals = UsageTotals::default();
    let mut last_state: Option<f64> = None;

    for (index, state) in states.iter().enumerate() {
        let changed = last_state != Some(state.value);

        for (name, samples) in &inputs {
            let Some(series) = channels.get_mut(*name) else {
                continue;
            };

            if index > 0 {
                if let Some(previous) = samples.get(index - 1) {
                    let until = samples.get(index).map_or(state.time_ms, |s| s.time_ms);
                    accumulate(&mut totals, kind, name, previous, until);
                    if changed {
                        series.push(Sample::new(state.time_ms, previous.value));
                    }
                }
            } else if changed && state.value != 0.0 && samples.first().is_some() {
                // Leading active interval: start the step from zero.
                series.push(Sample::new(state.time_ms, 0.0));
            }

            if let Some(sample) = samples.get(index) {
                series.push(*sample);
            }
        }

        last_state = Some(state.value);
    }

    let channels = channels
        .into_iter()
        .map(|(name, series)| (name, pad_to_window(series, now_ms)))
        .collect();

    if kind == UsageKind::Switch {
        totals.total_power_usage /= 3600.0;
        totals.total_water_usage /= 60.0;
    }

    DerivedSeriesSet { channels, totals }
}

/// Copy of one input channel. Door states collapse to 0/1; switch readings
/// taken while the switch is off are zeroed.
fn sanitized_channel(
    raw: &RawSeriesSet,
    name: &str,
    kind: UsageKind,
    states: &[Sample],
) -> Vec<Sample> {
    raw.channel(name)
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let value = match (kind, name) {
                (UsageKind::Door, STATE) => {
                    if sample.value != 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                (UsageKind::Switch, POWER_WATTAGE | WATER_FLOW) => {
                    let off = states.get(index).is_none_or(|state| state.value == 0.0);
                    if off { 0.0 } else { sample.value }
                }
                _ => sample.value,
            };
            Sample::new(sample.time_ms, value)
        })
        .collect()
}

fn accumulate(totals: &mut UsageTotals, kind: UsageKind, channel: &str, previous: &Sample, until: i64) {
    if previous.value == 0.0 {
        return;
    }
    let usage = until.saturating_sub(previous.time_ms) as f64 / UNIT_TIME_MS * previous.value;
    match (kind, channel) {
        (UsageKind::Door, STATE) => totals.open_duration += usage,
        (UsageKind::Switch, POWER_WATTAGE) => totals.total_power_usage += usage,
        (UsageKind::Switch, WATER_FLOW) => totals.total_water_usage += usage,
        _ => {}
    }
}

/// Extend a series to `now_ms` with its last value and back to a day before
/// `now_ms` with its first value. Empty series stay empty.
fn pad_to_window(series: Vec<Sample>, now_ms: i64) -> Vec<Sample> {
    let (Some(first), Some(last)) = (series.first().copied(), series.last().copied()) else {
        return series;
    };
    let window_start = now_ms.saturating_sub(DAY_MS);

    let lead = (first.time_ms > window_start).then(|| Sample::new(window_start, first.value));
    let tail = Sample::new(now_ms.max(last.time_ms), last.value);

    lead.into_iter()
        .chain(series)
        .chain(std::iter::once(tail))
        .collect()
}

/// A door opening or closing, as shown in the door message log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoorEvent {
    pub time_ms: i64,
    pub open: bool,
}

/// Change points of every door's `state` channel, merged in time order.
pub fn door_events(doors: &[RawSeriesSet]) -> Vec<DoorEvent> {
    let mut events: Vec<DoorEvent> = doors
        .iter()
        .flat_map(|door| {
            let states = door.channel(STATE);
            states
                .iter()
                .enumerate()
                .filter(|(index, sample)| *index == 0 || states[index - 1].value != sample.value)
                .map(|(_, sample)| DoorEvent {
                    time_ms: sample.time_ms,
                    open: sample.value != 0.0,
                })
                .collect::<Vec<_>>()
        })
        .collect();
    events.sort_by_key(|event| event.time_ms);
    events
}
