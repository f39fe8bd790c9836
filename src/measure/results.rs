use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use super::Measurement;
use crate::error::{CharzError, Result};

/// The outcome of a single measurement.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureValue {
    Value(f64),
    /// The simulator could not evaluate the measurement.
    Unresolved,
}

impl MeasureValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MeasureValue::Value(v) => Some(*v),
            MeasureValue::Unresolved => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, MeasureValue::Unresolved)
    }
}

/// Builds the lookup key for `name` on `port`.
///
/// Keys are lower case with the port id appended.
pub fn result_key(name: &str, port: Option<usize>) -> Result<String> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '=') {
        return Err(CharzError::InvalidMeasurementName(name.to_string()));
    }
    let name = name.to_lowercase();
    Ok(match port {
        Some(port) => format!("{name}{port}"),
        None => name,
    })
}

/// Parses a number with an optional SPICE scale suffix, such as `3.2n`.
///
/// Non-finite values (`nan`, `inf`) are rejected.
pub fn parse_spice_number(s: &str) -> Option<f64> {
    let suffixes = [
        ("meg", 1e6),
        ("f", 1e-15),
        ("p", 1e-12),
        ("n", 1e-9),
        ("u", 1e-6),
        ("m", 1e-3),
        ("k", 1e3),
        ("g", 1e9),
    ];
    let lower = s.to_ascii_lowercase();
    let value = s.parse::<f64>().ok().or_else(|| {
        suffixes.iter().find_map(|(suffix, mult)| {
            lower
                .strip_suffix(suffix)
                .and_then(|num| num.parse::<f64>().ok())
                .map(|v| v * mult)
        })
    })?;
    value.is_finite().then_some(value)
}

/// Measurement values reported by a simulator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimResults {
    values: HashMap<String, MeasureValue>,
}

impl SimResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `name = value` lines from a simulator log.
    ///
    /// Values that are not numbers, such as `failed`, are recorded as
    /// [`MeasureValue::Unresolved`]. Lines of any other shape are skipped.
    pub fn parse(log: &str) -> Self {
        let mut results = Self::new();
        for line in log.lines() {
            let Some((name, rest)) = line.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                continue;
            }
            let value = rest
                .split_whitespace()
                .next()
                .and_then(parse_spice_number)
                .map(MeasureValue::Value)
                .unwrap_or(MeasureValue::Unresolved);
            results.insert(name, value);
        }
        results
    }

    /// Inserts a value under its case-folded name.
    pub fn insert(&mut self, name: &str, value: MeasureValue) {
        self.values.insert(name.to_lowercase(), value);
    }

    pub fn get(&self, name: &str, port: Option<usize>) -> Result<MeasureValue> {
        let key = result_key(name, port)?;
        self.values
            .get(&key)
            .copied()
            .ok_or(CharzError::MeasurementNotFound(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MeasureValue)> + '_ {
        self.values.iter()
    }
}

impl Measurement {
    /// Looks up this measurement for `port` and applies its scale.
    pub fn retrieve(&self, results: &SimResults, port: Option<usize>) -> Result<MeasureValue> {
        let value = results.get(self.name(), port)?;
        Ok(match (value, self.scale()) {
            (MeasureValue::Value(v), Some(scale)) => MeasureValue::Value(v * scale),
            (MeasureValue::Value(v), None) => MeasureValue::Value(v),
            (MeasureValue::Unresolved, _) => {
                warn!("measurement {} is unresolved", self.port_name(port));
                MeasureValue::Unresolved
            }
        })
    }
}
