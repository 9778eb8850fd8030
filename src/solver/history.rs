//! Bounded per-component history of state values.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::circuit::{ComponentId, Terminal};
use crate::components::DeviceState;

/// One recorded value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// Build a history key: `key` alone or `key.sub_key` (e.g. `voltages.p1`).
pub fn history_key(key: &str, sub_key: Option<&str>) -> String {
    match sub_key {
        Some(sub) => format!("{}.{}", key, sub),
        None => key.to_string(),
    }
}

/// Time series keyed by component and state key. Each series holds at most
/// `capacity` samples; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    series: BTreeMap<(ComponentId, String), VecDeque<Sample>>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the cap, dropping the oldest samples of longer series.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        for samples in self.series.values_mut() {
            while samples.len() > self.capacity {
                samples.pop_front();
            }
        }
    }

    /// Append one sample.
    pub fn record(&mut self, id: ComponentId, key: String, time: f64, value: f64) {
        let samples = self.series.entry((id, key)).or_default();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(Sample { time, value });
    }

    /// Append every observable of a state block: terminal voltages and
    /// currents under `voltages.<terminal>` / `currents.<terminal>`, then
    /// the kind's scalar values.
    pub fn record_state(&mut self, id: ComponentId, terminals: &[Terminal], state: &DeviceState, time: f64) {
        for (terminal, v) in terminals.iter().zip(state.voltages()) {
            self.record(id, history_key("voltages", Some(terminal.as_str())), time, *v);
        }
        for (terminal, i) in terminals.iter().zip(state.currents()) {
            self.record(id, history_key("currents", Some(terminal.as_str())), time, *i);
        }
        for (name, value) in state.scalars() {
            self.record(id, name.to_string(), time, value);
        }
    }

    /// Samples for one series, oldest first.
    pub fn get(&self, id: ComponentId, key: &str, sub_key: Option<&str>) -> Option<&VecDeque<Sample>> {
        self.series.get(&(id, history_key(key, sub_key)))
    }

    /// Keys recorded for a component.
    pub fn keys(&self, id: ComponentId) -> impl Iterator<Item = &str> {
        self.series
            .keys()
            .filter(move |(owner, _)| *owner == id)
            .map(|(_, key)| key.as_str())
    }

    /// Forget everything recorded for a component.
    pub fn remove_component(&mut self, id: ComponentId) {
        self.series.retain(|(owner, _), _| *owner != id);
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ResistorState, SwitchState};

    #[test]
    fn test_oldest_sample_evicted() {
        let mut h = History::new(3);
        let id = ComponentId(1);
        for i in 0..5 {
            h.record(id, "power".into(), i as f64, i as f64 * 10.0);
        }
        let series = h.get(id, "power", None).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.front().unwrap().time, 2.0);
        assert_eq!(series.back().unwrap().value, 40.0);
    }

    #[test]
    fn test_record_state_keys() {
        let mut h = History::new(10);
        let id = ComponentId(4);
        let state = DeviceState::Resistor(ResistorState {
            voltages: [5.0, 2.0],
            currents: [3e-3, -3e-3],
            power: 9e-3,
            temperature: 26.8,
        });
        h.record_state(id, &[Terminal::P1, Terminal::P2], &state, 0.5);

        assert_eq!(h.get(id, "voltages", Some("p1")).unwrap()[0].value, 5.0);
        assert_eq!(h.get(id, "currents", Some("p2")).unwrap()[0].value, -3e-3);
        assert_eq!(h.get(id, "temperature", None).unwrap()[0].time, 0.5);
        assert_eq!(h.keys(id).count(), 6);
    }

    #[test]
    fn test_flags_recorded_as_numbers() {
        let mut h = History::new(10);
        let id = ComponentId(0);
        let state = DeviceState::Switch(SwitchState {
            closed: true,
            ..Default::default()
        });
        h.record_state(id, &[Terminal::P1, Terminal::P2], &state, 0.0);
        assert_eq!(h.get(id, "closed", None).unwrap()[0].value, 1.0);
    }

    #[test]
    fn test_shrinking_capacity_and_removal() {
        let mut h = History::new(5);
        let a = ComponentId(0);
        let b = ComponentId(1);
        for i in 0..5 {
            h.record(a, "power".into(), i as f64, 0.0);
            h.record(b, "power".into(), i as f64, 0.0);
        }
        h.set_capacity(2);
        assert_eq!(h.get(a, "power", None).unwrap().len(), 2);
        assert_eq!(h.get(a, "power", None).unwrap()[0].time, 3.0);

        h.remove_component(a);
        assert!(h.get(a, "power", None).is_none());
        assert!(h.get(b, "power", None).is_some());
    }
}
