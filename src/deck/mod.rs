use std::fmt::Write;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use log::info;
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::config::Corner;
use crate::cycle::{CycleWaveform, TbSignal};
use crate::error::Result;
use crate::measure::RequestArgs;
use crate::port::PortSet;
use crate::waveform::Waveform;
use crate::TEMPLATES;

const GND_NET: &str = "gnd";

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(derive(Debug))]
pub struct DeckParams {
    /// Subcircuit name of the memory under test.
    #[builder(setter(into))]
    pub name: String,
    pub corner: Corner,
    /// Rise and fall time of the clock and inputs in seconds.
    pub rise_time: f64,
    /// Time before each clock edge at which inputs switch, in seconds.
    pub setup: f64,
    /// Capacitance on output pins.
    #[builder(default)]
    pub load: f64,
    #[builder(default, setter(into))]
    pub includes: Vec<PathBuf>,
    #[builder(default, setter(into))]
    pub netlist: Option<PathBuf>,
    #[builder(default, setter(into))]
    pub measurements: Vec<RequestArgs>,
}

impl DeckParams {
    #[inline]
    pub fn builder() -> DeckParamsBuilder {
        DeckParamsBuilder::default()
    }
}

#[derive(Serialize)]
struct StimulusContext {
    name: String,
    corner: String,
    includes: Vec<String>,
    netlist: Option<String>,
    temperature: f64,
    vdd: f64,
    pins: Vec<String>,
    loads: Vec<String>,
    load: f64,
    comments: Vec<String>,
    sources: Vec<String>,
    measurements: Vec<String>,
    tran_step: f64,
    tran_stop: f64,
}

/// Pins of the memory under test, in subcircuit port order.
pub fn dut_pins(ports: &PortSet, addr_width: usize, word_size: usize) -> Vec<String> {
    let mut pins = Vec::new();
    for port in ports.write_ports() {
        pins.extend((0..word_size).map(|b| TbSignal::Din(port.id(), b).net_name()));
    }
    for port in ports.iter() {
        pins.extend((0..addr_width).map(|b| TbSignal::Addr(port.id(), b).net_name()));
    }
    pins.extend(ports.iter().map(|p| TbSignal::Csb(p.id()).net_name()));
    pins.extend(ports.readwrite_ports().map(|p| TbSignal::Web(p.id()).net_name()));
    pins.extend(ports.iter().map(|p| TbSignal::Clk(p.id()).net_name()));
    for port in ports.read_ports() {
        pins.extend((0..word_size).map(|b| TbSignal::Dout(port.id(), b).net_name()));
    }
    pins.push("vdd".to_string());
    pins.push(GND_NET.to_string());
    pins
}

pub fn write_pwl(out: &mut String, net: &str, gnd_net: &str, waveform: &Waveform) -> Result<()> {
    writeln!(out, "V{net} {net} {gnd_net} pwl(")?;
    for (t, x) in waveform.values() {
        writeln!(out, "+ {t} {x}")?;
    }
    writeln!(out, "+ )")?;
    Ok(())
}

/// Piecewise-linear sources for every clock and input of `wf`.
pub fn generate_sources(params: &DeckParams, wf: &CycleWaveform) -> Result<Vec<String>> {
    let vdd = params.corner.vdd;
    let tr = params.rise_time;
    let mut sources = Vec::new();

    for port in wf.ports().ids() {
        let mut out = String::new();
        let clk = Waveform::clock(wf.num_cycles(), wf.period(), vdd, tr);
        write_pwl(&mut out, &TbSignal::Clk(port).net_name(), GND_NET, &clk)?;
        sources.push(out);
    }

    for signal in wf.signals() {
        if let Some(trace) = wf.trace(signal) {
            let mut out = String::new();
            let wav = Waveform::from_trace(trace, wf.cycle_times(), params.setup, vdd, tr);
            write_pwl(&mut out, &signal.net_name(), GND_NET, &wav)?;
            sources.push(out);
        }
    }
    Ok(sources)
}

pub fn generate_stimulus(params: &DeckParams, wf: &CycleWaveform) -> Result<String> {
    let ports = wf.ports();
    let loads = ports
        .read_ports()
        .flat_map(|p| (0..wf.word_size()).map(move |b| TbSignal::Dout(p.id(), b).net_name()))
        .collect();

    let context = StimulusContext {
        name: params.name.clone(),
        corner: params.corner.name(),
        includes: params
            .includes
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        netlist: params.netlist.as_ref().map(|p| p.display().to_string()),
        temperature: params.corner.temperature,
        vdd: params.corner.vdd,
        pins: dut_pins(ports, wf.addr_width(), wf.word_size()),
        loads,
        load: params.load,
        comments: wf.cycle_comments().to_vec(),
        sources: generate_sources(params, wf)?,
        measurements: params.measurements.iter().map(|m| m.to_string()).collect(),
        tran_step: params.rise_time / 2.0,
        tran_stop: wf.t_current() + wf.period(),
    };

    Ok(TEMPLATES.render("stimulus.sp", &Context::from_serialize(context)?)?)
}

pub fn save_stimulus(
    path: impl AsRef<Path>,
    params: &DeckParams,
    wf: &CycleWaveform,
) -> Result<()> {
    let deck = generate_stimulus(params, wf)?;

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, deck)?;
    info!("wrote stimulus deck to {:?}", path);

    Ok(())
}
