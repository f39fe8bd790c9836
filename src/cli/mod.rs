use std::fs::canonicalize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use crate::charz::{build_testbench, collect_results, CharzParams, MeasuredValue, Testbench};
use crate::cli::args::Args;
use crate::cli::progress::{StepContext, TaskKey};
use crate::config::parse_charz_config;
use crate::measure::{MeasureValue, SimResults};
use crate::sim::{Ngspice, Simulator};

pub mod args;
pub mod progress;

pub const BANNER: &str = r"
 ________  ________  ________  _____ ______     _______   _______
|\   ____\|\   __  \|\   __  \|\   _ \  _   \  /  ___  \ /  ___  \
\ \  \___|\ \  \|\  \ \  \|\  \ \  \\\__\ \  \/__/|_/  //__/|_/  /|
 \ \_____  \ \   _  _\ \   __  \ \  \\|__| \  \__|//  / /__|//  / /
  \|____|\  \ \  \\  \\ \  \ \  \ \  \    \ \  \  /  /_/__  /  /_/__
    ____\_\  \ \__\\ _\\ \__\ \__\ \__\    \ \__\|\________\\________\
   |\_________\|__|\|__|\|__|\|__|\|__|     \|__| \|_______|\|_______|
   \|_________|

SRAM22 characterization v0.2
";

fn print_values(corner: &str, values: &[MeasuredValue], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(values)?);
        return Ok(());
    }
    println!("\nMeasurements at corner {}:", corner.bold());
    for v in values {
        let value = match v.value {
            MeasureValue::Value(x) => format!("{x:.4}").green(),
            MeasureValue::Unresolved => "unresolved".yellow(),
        };
        println!("\t{:<12} port {:<3} {}", v.name, v.port, value);
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    let config_path = canonicalize(&args.config)
        .with_context(|| format!("configuration file {:?} not found", args.config))?;

    println!("{BANNER}");

    println!("Reading configuration file...\n");
    let config = parse_charz_config(&config_path)?;

    println!("Configuration file: {:?}", &config_path);
    println!("Memory parameters:");
    println!("\tName: {}", config.name);
    println!("\tNumber of words: {}", config.num_words()?);
    println!("\tWord size: {}", config.word_size);
    println!(
        "\tPorts: {} rw, {} w, {} r",
        config.num_rw_ports, config.num_w_ports, config.num_r_ports
    );
    println!("\tClock period: {:.3} ns", config.period * 1e9);
    println!("\tSequence: {}", args.sequence);
    println!("\tCorners: {}\n", config.corners.len());

    let work_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.name));
    std::fs::create_dir_all(&work_dir)?;
    let work_dir = canonicalize(work_dir)?;

    let mut tasks = Vec::new();
    for corner in config.corners.iter() {
        let name = corner.name();
        tasks.push(TaskKey::GenerateTestbench(name.clone()));
        tasks.push(TaskKey::WriteDeck(name.clone()));
        if args.simulate {
            tasks.push(TaskKey::Simulate(name));
        }
    }
    if args.results.is_some() {
        tasks.push(TaskKey::CollectResults);
    }
    let mut ctx = StepContext::new(tasks);

    let sim = Ngspice::new(&work_dir);
    let mut testbenches: Vec<Testbench> = Vec::new();
    let mut reports = Vec::new();
    for corner in config.corners.iter() {
        let name = corner.name();
        let params = CharzParams::builder()
            .config(config.clone())
            .corner(corner.clone())
            .sequence(args.sequence)
            .probe_bit(args.probe_bit)
            .build()?;

        let tb = ctx.check(build_testbench(&params).map_err(anyhow::Error::from))?;
        ctx.finish(TaskKey::GenerateTestbench(name.clone()));

        let deck = ctx.check(tb.save(&work_dir).map_err(anyhow::Error::from))?;
        ctx.finish(TaskKey::WriteDeck(name.clone()));

        if args.simulate {
            let res = sim
                .simulate(&deck, corner)
                .and_then(|results| collect_results(&tb, &results));
            let values = ctx.check(res.map_err(anyhow::Error::from))?;
            ctx.finish(TaskKey::Simulate(name.clone()));
            reports.push((name, values));
        }
        testbenches.push(tb);
    }

    if let Some(path) = args.results.as_ref() {
        let res = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read simulator log {path:?}"))
            .and_then(|log| {
                let tb = testbenches
                    .first()
                    .context("no testbench was generated")?;
                Ok(collect_results(tb, &SimResults::parse(&log))?)
            });
        let values = ctx.check(res)?;
        ctx.finish(TaskKey::CollectResults);
        reports.push((config.corners[0].name(), values));
    }

    for (corner, values) in reports.iter() {
        print_values(corner, values, args.json)?;
    }

    println!("\nArtifacts saved to: {:?}\n", &work_dir);

    Ok(())
}
