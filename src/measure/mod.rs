//! Measurement specifications and the simulator requests built from them.
//!
//! A [`Measurement`] is immutable and may be reused across runs and corners.
//! Per-run values such as trigger times and the supply voltage are supplied
//! as [`MeasureInputs`] when a request is built.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::error::{CharzError, Result};

pub mod results;

pub use results::{result_key, MeasureValue, SimResults};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Rise,
    Fall,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Rise => "RISE",
            Edge::Fall => "FALL",
        }
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Edge {
    type Err = CharzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rise" => Ok(Edge::Rise),
            "fall" => Ok(Edge::Fall),
            _ => Err(CharzError::UnrecognizedEdge(s.to_string())),
        }
    }
}

/// A net name that may contain a `{port}` placeholder.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SignalTemplate(ArcStr);

impl SignalTemplate {
    pub fn new(template: impl Into<ArcStr>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn instantiate(&self, port: Option<usize>) -> String {
        match port {
            Some(port) => self.0.replace("{port}", &port.to_string()),
            None => self.0.to_string(),
        }
    }
}

impl From<&str> for SignalTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SignalTemplate {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<ArcStr> for SignalTemplate {
    fn from(value: ArcStr) -> Self {
        Self(value)
    }
}

/// Propagation delay between threshold crossings of two signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayMeasure {
    trig: SignalTemplate,
    targ: SignalTemplate,
    trig_dir: Edge,
    targ_dir: Edge,
    trig_frac: f64,
    targ_frac: f64,
}

impl DelayMeasure {
    /// Edge directions are parsed case-insensitively from `"rise"`/`"fall"`.
    pub fn new(
        trig: impl Into<SignalTemplate>,
        targ: impl Into<SignalTemplate>,
        trig_dir: &str,
        targ_dir: &str,
    ) -> Result<Self> {
        Ok(Self {
            trig: trig.into(),
            targ: targ.into(),
            trig_dir: trig_dir.parse()?,
            targ_dir: targ_dir.parse()?,
            trig_frac: 0.5,
            targ_frac: 0.5,
        })
    }

    /// Sets the crossing thresholds as fractions of the supply voltage.
    pub fn with_thresholds(mut self, trig_frac: f64, targ_frac: f64) -> Self {
        self.trig_frac = trig_frac;
        self.targ_frac = targ_frac;
        self
    }

    pub fn trig_frac(&self) -> f64 {
        self.trig_frac
    }

    pub fn targ_frac(&self) -> f64 {
        self.targ_frac
    }
}

/// Transition time of a single signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlewMeasure {
    signal: SignalTemplate,
    dir: Edge,
}

impl SlewMeasure {
    pub fn new(signal: impl Into<SignalTemplate>, dir: &str) -> Result<Self> {
        Ok(Self {
            signal: signal.into(),
            dir: dir.parse()?,
        })
    }

    pub fn dir(&self) -> Edge {
        self.dir
    }

    pub fn trig_frac(&self) -> f64 {
        match self.dir {
            Edge::Rise => 0.1,
            Edge::Fall => 0.9,
        }
    }

    pub fn targ_frac(&self) -> f64 {
        match self.dir {
            Edge::Rise => 0.9,
            Edge::Fall => 0.1,
        }
    }
}

/// Average supply current over an interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerMeasure {
    /// Only used for labeling.
    edge: Option<Edge>,
}

impl PowerMeasure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge(dir: &str) -> Result<Self> {
        Ok(Self {
            edge: Some(dir.parse()?),
        })
    }

    pub fn edge(&self) -> Option<Edge> {
        self.edge
    }
}

/// Voltage of `targ` at the instant `trig` crosses its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageWhenMeasure {
    trig: SignalTemplate,
    targ: SignalTemplate,
    trig_dir: Edge,
    trig_frac: f64,
}

impl VoltageWhenMeasure {
    pub fn new(
        trig: impl Into<SignalTemplate>,
        targ: impl Into<SignalTemplate>,
        trig_dir: &str,
        trig_frac: f64,
    ) -> Result<Self> {
        Ok(Self {
            trig: trig.into(),
            targ: targ.into(),
            trig_dir: trig_dir.parse()?,
            trig_frac,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureKind {
    Delay(DelayMeasure),
    Slew(SlewMeasure),
    Power(PowerMeasure),
    VoltageWhen(VoltageWhenMeasure),
}

impl MeasureKind {
    /// The shape of per-run inputs this measurement accepts.
    pub fn expected_inputs(&self) -> &'static str {
        match self {
            MeasureKind::Delay(_) | MeasureKind::Slew(_) => "timed",
            MeasureKind::Power(_) => "interval",
            MeasureKind::VoltageWhen(_) => "triggered",
        }
    }
}

/// Per-run values used to build a request.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureInputs {
    Timed { trig_td: f64, targ_td: f64, vdd: f64 },
    Interval { t_initial: f64, t_final: f64 },
    Triggered { trig_td: f64, vdd: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    name: ArcStr,
    scale: Option<f64>,
    kind: MeasureKind,
}

impl Measurement {
    pub fn new(name: impl Into<ArcStr>, kind: MeasureKind) -> Self {
        Self {
            name: name.into(),
            scale: None,
            kind,
        }
    }

    pub fn delay(name: impl Into<ArcStr>, measure: DelayMeasure) -> Self {
        Self::new(name, MeasureKind::Delay(measure))
    }

    pub fn slew(name: impl Into<ArcStr>, measure: SlewMeasure) -> Self {
        Self::new(name, MeasureKind::Slew(measure))
    }

    pub fn power(name: impl Into<ArcStr>, measure: PowerMeasure) -> Self {
        Self::new(name, MeasureKind::Power(measure))
    }

    pub fn voltage_when(name: impl Into<ArcStr>, measure: VoltageWhenMeasure) -> Self {
        Self::new(name, MeasureKind::VoltageWhen(measure))
    }

    /// Multiplies retrieved values by `scale`.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    pub fn kind(&self) -> &MeasureKind {
        &self.kind
    }

    /// The measurement name as written to the deck for `port`.
    pub fn port_name(&self, port: Option<usize>) -> String {
        match port {
            Some(port) => format!("{}{}", self.name, port),
            None => self.name.to_string(),
        }
    }

    pub fn build_request(&self, inputs: &MeasureInputs, port: Option<usize>) -> Result<RequestArgs> {
        let name = self.port_name(port);
        let args = match (&self.kind, *inputs) {
            (
                MeasureKind::Delay(m),
                MeasureInputs::Timed {
                    trig_td,
                    targ_td,
                    vdd,
                },
            ) => RequestArgs::Delay(DelayArgs {
                name,
                trig: m.trig.instantiate(port),
                targ: m.targ.instantiate(port),
                trig_val: m.trig_frac * vdd,
                targ_val: m.targ_frac * vdd,
                trig_dir: m.trig_dir,
                targ_dir: m.targ_dir,
                trig_td,
                targ_td,
            }),
            (
                MeasureKind::Slew(m),
                MeasureInputs::Timed {
                    trig_td,
                    targ_td,
                    vdd,
                },
            ) => {
                let signal = m.signal.instantiate(port);
                RequestArgs::Delay(DelayArgs {
                    name,
                    trig: signal.clone(),
                    targ: signal,
                    trig_val: m.trig_frac() * vdd,
                    targ_val: m.targ_frac() * vdd,
                    trig_dir: m.dir,
                    targ_dir: m.dir,
                    trig_td,
                    targ_td,
                })
            }
            (MeasureKind::Power(_), MeasureInputs::Interval { t_initial, t_final }) => {
                RequestArgs::Power(PowerArgs {
                    name,
                    t_initial,
                    t_final,
                })
            }
            (MeasureKind::VoltageWhen(m), MeasureInputs::Triggered { trig_td, vdd }) => {
                RequestArgs::FindVoltage(VoltageArgs {
                    name,
                    trig: m.trig.instantiate(port),
                    targ: m.targ.instantiate(port),
                    trig_val: m.trig_frac * vdd,
                    trig_dir: m.trig_dir,
                    trig_td,
                })
            }
            (kind, _) => {
                return Err(CharzError::MismatchedInputs {
                    name,
                    expected: kind.expected_inputs(),
                })
            }
        };
        Ok(args)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayArgs {
    pub name: String,
    pub trig: String,
    pub targ: String,
    pub trig_val: f64,
    pub targ_val: f64,
    pub trig_dir: Edge,
    pub targ_dir: Edge,
    pub trig_td: f64,
    pub targ_td: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerArgs {
    pub name: String,
    pub t_initial: f64,
    pub t_final: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageArgs {
    pub name: String,
    pub trig: String,
    pub targ: String,
    pub trig_val: f64,
    pub trig_dir: Edge,
    pub trig_td: f64,
}

/// Arguments for a single simulator measurement statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestArgs {
    Delay(DelayArgs),
    Power(PowerArgs),
    FindVoltage(VoltageArgs),
}

impl RequestArgs {
    pub fn name(&self) -> &str {
        match self {
            RequestArgs::Delay(args) => &args.name,
            RequestArgs::Power(args) => &args.name,
            RequestArgs::FindVoltage(args) => &args.name,
        }
    }
}

/// Renders the request as an ngspice `.meas` statement.
impl Display for RequestArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestArgs::Delay(a) => write!(
                f,
                ".meas tran {} TRIG v({}) VAL={} {}=1 TD={} TARG v({}) VAL={} {}=1 TD={}",
                a.name,
                a.trig,
                a.trig_val,
                a.trig_dir,
                a.trig_td,
                a.targ,
                a.targ_val,
                a.targ_dir,
                a.targ_td
            ),
            RequestArgs::Power(a) => write!(
                f,
                ".meas tran {} avg i(vvdd) from={} to={}",
                a.name, a.t_initial, a.t_final
            ),
            RequestArgs::FindVoltage(a) => write!(
                f,
                ".meas tran {} FIND v({}) WHEN v({})={} {}=1 TD={}",
                a.name, a.targ, a.trig, a.trig_val, a.trig_dir, a.trig_td
            ),
        }
    }
}
