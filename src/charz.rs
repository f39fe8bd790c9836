//! Characterization runs: builds the operation sequence, measurement requests
//! and stimulus deck for one corner, and reads the results back.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{CharzConfig, Corner};
use crate::cycle::{CycleWaveform, TbSignal};
use crate::deck::{save_stimulus, DeckParams};
use crate::error::{CharzError, Result};
use crate::measure::{
    DelayMeasure, MeasureInputs, MeasureKind, MeasureValue, Measurement, PowerMeasure,
    RequestArgs, SimResults, SlewMeasure, VoltageWhenMeasure,
};
use crate::paths::out_stim;
use crate::sequence::{apply_ops, ExpectedRead, TestSequence};

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(derive(Debug))]
pub struct CharzParams {
    pub config: CharzConfig,
    pub corner: Corner,
    #[builder(default = "TestSequence::Short")]
    pub sequence: TestSequence,
    /// Output bit observed by delay, slew and voltage measurements.
    #[builder(default)]
    pub probe_bit: usize,
}

impl CharzParams {
    #[inline]
    pub fn builder() -> CharzParamsBuilder {
        CharzParamsBuilder::default()
    }
}

/// Delay, slew, power and output voltage measurements on output bit `bit`.
///
/// Delays and slews are reported in nanoseconds, power in milliamps of
/// average supply current.
pub fn standard_measurements(bit: usize) -> Result<Vec<Measurement>> {
    let dout = format!("DOUT{{port}}_{bit}");
    Ok(vec![
        Measurement::delay(
            "delay_lh",
            DelayMeasure::new("CLK{port}", dout.as_str(), "rise", "rise")?,
        )
        .with_scale(1e9),
        Measurement::delay(
            "delay_hl",
            DelayMeasure::new("CLK{port}", dout.as_str(), "rise", "fall")?,
        )
        .with_scale(1e9),
        Measurement::slew("slew_lh", SlewMeasure::new(dout.as_str(), "rise")?).with_scale(1e9),
        Measurement::slew("slew_hl", SlewMeasure::new(dout.as_str(), "fall")?).with_scale(1e9),
        Measurement::power("read_power", PowerMeasure::new()).with_scale(1e3),
        Measurement::power("write_power", PowerMeasure::new()).with_scale(1e3),
        Measurement::voltage_when(
            "v_dout",
            VoltageWhenMeasure::new("CLK{port}", dout.as_str(), "fall", 0.5)?,
        ),
    ])
}

/// A measurement instantiated for one port of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureRequest {
    pub measurement: Measurement,
    pub port: usize,
    pub inputs: MeasureInputs,
    pub args: RequestArgs,
}

#[derive(Debug, Clone)]
pub struct Testbench {
    pub waveform: CycleWaveform,
    pub reads: Vec<ExpectedRead>,
    pub requests: Vec<MeasureRequest>,
    pub deck: DeckParams,
}

impl Testbench {
    /// Writes the stimulus deck to `work_dir` and returns its path.
    pub fn save(&self, work_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = out_stim(work_dir, &self.deck.name, &self.deck.corner.name());
        save_stimulus(&path, &self.deck, &self.waveform)?;
        Ok(path)
    }
}

/// A retrieved measurement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredValue {
    pub name: String,
    pub port: usize,
    pub value: MeasureValue,
}

/// Chooses the cycle whose start time triggers `measurement` on `port`.
fn trigger_cycle(
    measurement: &Measurement,
    port: usize,
    reads: &[&ExpectedRead],
    writes: &[usize],
    bit: usize,
) -> Option<usize> {
    // DOUT level after each read, paired with the level before it.
    let transitions = reads
        .iter()
        .tuple_windows()
        .map(|(prev, next)| (prev.data.bit(bit), next.data.bit(bit), next.cycle));
    let rising = |(prev, next, _): &(bool, bool, usize)| !prev && *next;
    let falling = |(prev, next, _): &(bool, bool, usize)| *prev && !next;

    match (measurement.name().as_str(), measurement.kind()) {
        ("delay_lh", _) | ("slew_lh", _) => transitions.filter(rising).map(|t| t.2).next(),
        ("delay_hl", _) | ("slew_hl", _) => transitions.filter(falling).map(|t| t.2).next(),
        ("write_power", _) => writes.first().copied(),
        (_, MeasureKind::Power(_)) | (_, MeasureKind::VoltageWhen(_)) => {
            reads.first().map(|r| r.cycle)
        }
        (name, _) => {
            warn!("no trigger cycle rule for measurement {name} on port {port}");
            None
        }
    }
}

/// Cycles in which `port` performs a write.
fn write_cycles(wf: &CycleWaveform, port: usize) -> Vec<usize> {
    if !wf.ports().is_writable(port) {
        return Vec::new();
    }
    let Some(csb) = wf.trace(TbSignal::Csb(port)) else {
        return Vec::new();
    };
    let web = wf.trace(TbSignal::Web(port));
    (0..csb.len())
        .filter(|&k| !csb[k] && web.map(|web| !web[k]).unwrap_or(true))
        .collect()
}

pub fn build_testbench(params: &CharzParams) -> Result<Testbench> {
    let config = &params.config;
    config.validate()?;
    if params.probe_bit >= config.word_size {
        return Err(CharzError::InvalidConfig(format!(
            "probe bit {} is outside a {}-bit word",
            params.probe_bit, config.word_size
        )));
    }

    let ports = config.ports();
    let ops = params
        .sequence
        .ops(&ports, config.addr_width, config.word_size)?;
    let mut waveform =
        CycleWaveform::new(ports.clone(), config.addr_width, config.word_size, config.period);
    let reads = apply_ops(&mut waveform, &ops)?;
    info!(
        "generated {} cycles of {} sequence for {}",
        waveform.num_cycles(),
        params.sequence,
        config.name
    );

    let vdd = params.corner.vdd;
    let period = config.period;
    let mut requests = Vec::new();
    for measurement in standard_measurements(params.probe_bit)? {
        for port in ports.iter() {
            let id = port.id();
            let is_write = measurement.name().as_str() == "write_power";
            if (is_write && !port.is_writable()) || (!is_write && !port.is_readable()) {
                continue;
            }
            let port_reads = reads.iter().filter(|r| r.port == id).collect::<Vec<_>>();
            let writes = write_cycles(&waveform, id);
            let Some(cycle) =
                trigger_cycle(&measurement, id, &port_reads, &writes, params.probe_bit)
            else {
                warn!(
                    "no suitable cycle for {} on port {}",
                    measurement.name(),
                    id
                );
                continue;
            };
            let t = waveform.cycle_times()[cycle];
            let inputs = match measurement.kind() {
                MeasureKind::Delay(_) | MeasureKind::Slew(_) => MeasureInputs::Timed {
                    trig_td: t,
                    targ_td: t,
                    vdd,
                },
                MeasureKind::Power(_) => MeasureInputs::Interval {
                    t_initial: t,
                    t_final: t + period,
                },
                MeasureKind::VoltageWhen(_) => MeasureInputs::Triggered { trig_td: t, vdd },
            };
            let args = measurement.build_request(&inputs, Some(id))?;
            requests.push(MeasureRequest {
                measurement: measurement.clone(),
                port: id,
                inputs,
                args,
            });
        }
    }

    let deck = DeckParams::builder()
        .name(config.name.clone())
        .corner(params.corner.clone())
        .rise_time(config.rise_time)
        .setup(config.setup())
        .load(config.load)
        .includes(config.includes.clone())
        .netlist(config.netlist.clone())
        .measurements(requests.iter().map(|r| r.args.clone()).collect::<Vec<_>>())
        .build()
        .map_err(|e| CharzError::InvalidConfig(e.to_string()))?;

    Ok(Testbench {
        waveform,
        reads,
        requests,
        deck,
    })
}

pub fn collect_results(tb: &Testbench, results: &SimResults) -> Result<Vec<MeasuredValue>> {
    let values = tb
        .requests
        .iter()
        .map(|req| {
            Ok(MeasuredValue {
                name: req.measurement.name().to_string(),
                port: req.port,
                value: req.measurement.retrieve(results, Some(req.port))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let unresolved = values.iter().filter(|v| v.value.is_unresolved()).count();
    if unresolved > 0 {
        warn!("{unresolved} of {} measurements unresolved", values.len());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use paste::paste;

    use super::*;
    use crate::port::PortSet;

    fn config(num_rw: usize, num_w: usize, num_r: usize) -> CharzConfig {
        CharzConfig {
            name: format!("sram_{num_rw}rw{num_w}w{num_r}r"),
            word_size: 4,
            addr_width: 3,
            num_rw_ports: num_rw,
            num_w_ports: num_w,
            num_r_ports: num_r,
            period: 2e-9,
            rise_time: 50e-12,
            load: 5e-15,
            netlist: None,
            includes: Vec::new(),
            check_lvsdrc: false,
            corners: vec![corner()],
        }
    }

    fn corner() -> Corner {
        Corner {
            process: "tt".to_string(),
            vdd: 1.8,
            temperature: 25.0,
        }
    }

    fn params(config: CharzConfig) -> CharzParams {
        CharzParams::builder()
            .config(config)
            .corner(corner())
            .build()
            .unwrap()
    }

    macro_rules! test_ports {
        ($num_rw:literal, $num_w:literal, $num_r:literal) => {
            paste! {
                #[test]
                fn [<test_testbench_ $num_rw rw_ $num_w w_ $num_r r>]() {
                    let tb = build_testbench(&params(config($num_rw, $num_w, $num_r))).unwrap();
                    let ports = PortSet::new($num_rw, $num_w, $num_r);
                    let wf = &tb.waveform;

                    for signal in wf.signals() {
                        assert_eq!(wf.trace(signal).unwrap().len(), wf.num_cycles());
                    }
                    for port in ports.read_ports() {
                        for name in ["delay_lh", "delay_hl", "slew_lh", "slew_hl", "read_power", "v_dout"] {
                            assert!(
                                tb.requests
                                    .iter()
                                    .any(|r| r.port == port.id() && r.measurement.name() == name),
                                "missing {name} on port {}",
                                port.id()
                            );
                        }
                    }
                    for port in ports.write_ports() {
                        assert!(tb
                            .requests
                            .iter()
                            .any(|r| r.port == port.id() && r.measurement.name() == "write_power"));
                    }
                }
            }
        };
    }

    test_ports!(1, 0, 0);
    test_ports!(1, 0, 1);
    test_ports!(0, 1, 1);
    test_ports!(0, 1, 2);
    test_ports!(2, 0, 0);

    #[test]
    fn test_standard_measurements() {
        let measurements = standard_measurements(3).unwrap();
        assert_eq!(measurements.len(), 7);
        let inputs = MeasureInputs::Timed {
            trig_td: 0.0,
            targ_td: 0.0,
            vdd: 1.0,
        };
        let RequestArgs::Delay(args) = measurements[0].build_request(&inputs, Some(2)).unwrap()
        else {
            panic!("expected a delay request");
        };
        assert_eq!(args.targ, "DOUT2_3");
        assert_eq!(measurements[0].scale(), Some(1e9));
    }

    #[test]
    fn test_delay_triggers_on_transition() {
        let tb = build_testbench(&params(config(1, 0, 0))).unwrap();
        let delay_lh = tb
            .requests
            .iter()
            .find(|r| r.measurement.name() == "delay_lh")
            .unwrap();
        let MeasureInputs::Timed { trig_td, .. } = delay_lh.inputs else {
            panic!("expected timed inputs");
        };
        let cycle = (trig_td / 2e-9).round() as usize;
        let read = tb.reads.iter().find(|r| r.cycle == cycle).unwrap();
        assert!(read.data.bit(0));
    }

    #[test]
    fn test_probe_bit_out_of_range() {
        let mut params = params(config(1, 0, 0));
        params.probe_bit = 4;
        assert!(matches!(
            build_testbench(&params),
            Err(CharzError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_wide_address_rejected() {
        for width in [24, 64] {
            let mut config = config(1, 0, 0);
            config.addr_width = width;
            let mut params = params(config);
            params.sequence = TestSequence::MarchCm;
            assert!(matches!(
                build_testbench(&params),
                Err(CharzError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_collect_results() {
        let tb = build_testbench(&params(config(1, 0, 0))).unwrap();
        let mut results = SimResults::new();
        for req in &tb.requests {
            let value = if req.measurement.name() == "v_dout" {
                MeasureValue::Unresolved
            } else {
                MeasureValue::Value(2e-9)
            };
            results.insert(req.args.name(), value);
        }

        let values = collect_results(&tb, &results).unwrap();
        assert_eq!(values.len(), tb.requests.len());
        let delay = values.iter().find(|v| v.name == "delay_lh").unwrap();
        assert_relative_eq!(delay.value.value().unwrap(), 2.0, max_relative = 1e-12);
        let v_dout = values.iter().find(|v| v.name == "v_dout").unwrap();
        assert!(v_dout.value.is_unresolved());

        assert!(matches!(
            collect_results(&tb, &SimResults::new()),
            Err(CharzError::MeasurementNotFound(_))
        ));
    }

    #[test]
    fn test_save_testbench() {
        let dir = tempfile::tempdir().unwrap();
        let tb = build_testbench(&params(config(0, 1, 1))).unwrap();
        let path = tb.save(dir.path()).unwrap();
        assert!(path.ends_with("sram_0rw1w1r.tt_1p8v_25c.stim.sp"));
        let deck = std::fs::read_to_string(path).unwrap();
        assert!(deck.contains(".meas tran write_power0 avg i(vvdd)"));
        assert!(deck.contains(".meas tran delay_lh1 TRIG v(CLK1)"));
    }
}
