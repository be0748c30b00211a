use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{StrategyError, StrategyKind};

/// A single parameter value as it appears in a grid file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Positive whole number usable as a lookback window.
    pub fn as_window(&self) -> Option<usize> {
        match *self {
            ParamValue::Int(n) if n > 0 => Some(n as usize),
            ParamValue::Float(f) if f.is_finite() && f > 0.0 && f.fract() == 0.0 => {
                Some(f as usize)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Int(n) => Some(n as f64),
            ParamValue::Float(f) if f.is_finite() => Some(f),
            ParamValue::Float(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<ParamValue> for Value {
    fn from(v: ParamValue) -> Self {
        match v {
            ParamValue::Int(n) => Value::from(n),
            ParamValue::Float(x) => Value::from(x),
        }
    }
}

/// One concrete assignment of parameter name to value, in grid order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Map<String, Value>", try_from = "Map<String, Value>")]
pub struct ParameterSet {
    values: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing an existing value of the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// First present value among `names`, with the name that matched.
    pub fn get_any<'a>(&self, names: &[&'a str]) -> Option<(&'a str, ParamValue)> {
        names
            .iter()
            .find_map(|name| self.get(name).map(|v| (*name, v)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Required lookback window under any of the given names.
    pub fn window(&self, names: &[&str]) -> Result<usize, StrategyError> {
        let (name, value) = self
            .get_any(names)
            .ok_or_else(|| StrategyError::invalid_parameter(names.join("|"), "missing"))?;
        value.as_window().ok_or_else(|| {
            StrategyError::invalid_parameter(name, format!("expected a positive integer, got {value}"))
        })
    }

    /// Required finite number under any of the given names.
    pub fn float(&self, names: &[&str]) -> Result<f64, StrategyError> {
        let (name, value) = self
            .get_any(names)
            .ok_or_else(|| StrategyError::invalid_parameter(names.join("|"), "missing"))?;
        value.as_f64().ok_or_else(|| {
            StrategyError::invalid_parameter(name, format!("expected a finite number, got {value}"))
        })
    }

    /// Optional finite number, `default` when none of the names is present.
    pub fn float_or(&self, names: &[&str], default: f64) -> Result<f64, StrategyError> {
        match self.get_any(names) {
            None => Ok(default),
            Some(_) => self.float(names),
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

impl From<ParameterSet> for Map<String, Value> {
    fn from(set: ParameterSet) -> Self {
        set.values
            .into_iter()
            .map(|(n, v)| (n, Value::from(v)))
            .collect()
    }
}

impl TryFrom<Map<String, Value>> for ParameterSet {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut set = ParameterSet::new();
        for (name, value) in map {
            let value: ParamValue = serde_json::from_value(value)
                .map_err(|e| format!("parameter '{name}': {e}"))?;
            set.set(name, value);
        }
        Ok(set)
    }
}

/// Candidate values for one named parameter, in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Search space for one strategy: the Cartesian product of its axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Map<String, Value>", try_from = "Map<String, Value>")]
pub struct GridEntry {
    axes: Vec<ParamAxis>,
}

impl GridEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.axes.push(ParamAxis {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn axes(&self) -> &[ParamAxis] {
        &self.axes
    }

    /// Product of the axis lengths.
    pub fn candidate_count(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Every parameter set in the product, first axis outermost and the last
    /// axis varying fastest. Enumeration order is the optimizer's tie-break.
    pub fn candidates(&self) -> Vec<ParameterSet> {
        let mut sets = vec![ParameterSet::new()];
        for axis in &self.axes {
            let mut next = Vec::with_capacity(sets.len() * axis.values.len());
            for prefix in &sets {
                for value in &axis.values {
                    let mut set = prefix.clone();
                    set.values.push((axis.name.clone(), *value));
                    next.push(set);
                }
            }
            sets = next;
        }
        sets
    }
}

impl From<GridEntry> for Map<String, Value> {
    fn from(entry: GridEntry) -> Self {
        entry
            .axes
            .into_iter()
            .map(|axis| {
                let values = axis.values.into_iter().map(Value::from).collect();
                (axis.name, Value::Array(values))
            })
            .collect()
    }
}

impl TryFrom<Map<String, Value>> for GridEntry {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut axes = Vec::with_capacity(map.len());
        for (name, value) in map {
            let values: Vec<ParamValue> = match value {
                Value::Array(_) => serde_json::from_value(value)
                    .map_err(|e| format!("parameter '{name}': {e}"))?,
                scalar => vec![serde_json::from_value(scalar)
                    .map_err(|e| format!("parameter '{name}': {e}"))?],
            };
            axes.push(ParamAxis { name, values });
        }
        Ok(Self { axes })
    }
}

/// Per-strategy search spaces. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGrid {
    entries: HashMap<StrategyKind, GridEntry>,
}

impl ParameterGrid {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_entry(mut self, kind: StrategyKind, entry: GridEntry) -> Self {
        self.entries.insert(kind, entry);
        self
    }

    pub fn get(&self, kind: StrategyKind) -> Option<&GridEntry> {
        self.entries.get(&kind)
    }

    /// Strategies with a grid entry, in [`StrategyKind::ALL`] order.
    pub fn strategies(&self) -> Vec<StrategyKind> {
        StrategyKind::ALL
            .into_iter()
            .filter(|k| self.entries.contains_key(k))
            .collect()
    }

    pub fn from_json_str(json: &str) -> Result<Self, StrategyError> {
        serde_json::from_str(json).map_err(|e| StrategyError::Config(format!("parameter grid: {e}")))
    }
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self::empty()
            .with_entry(
                StrategyKind::MovingAverageCross,
                GridEntry::new()
                    .axis("fast", [5, 10, 20])
                    .axis("slow", [50, 100, 200]),
            )
            .with_entry(
                StrategyKind::RsiThreshold,
                GridEntry::new()
                    .axis("window", [10, 14, 20])
                    .axis("overbought", [70])
                    .axis("oversold", [30]),
            )
            .with_entry(
                StrategyKind::MacdCross,
                GridEntry::new()
                    .axis("fast_window", [12])
                    .axis("slow_window", [26])
                    .axis("signal_window", [9]),
            )
            .with_entry(
                StrategyKind::BollingerBreakout,
                GridEntry::new()
                    .axis("window", [20, 30])
                    .axis("std", [1.5, 2.0]),
            )
            .with_entry(
                StrategyKind::RollingBreakout,
                GridEntry::new().axis("window", [20, 50]),
            )
            .with_entry(
                StrategyKind::Momentum,
                GridEntry::new().axis("window", [5, 10, 20]),
            )
            .with_entry(
                StrategyKind::MeanReversion,
                GridEntry::new()
                    .axis("window", [20])
                    .axis("zscore", [1.5, 2.0, 2.5]),
            )
    }
}
