use clap::Parser;
use std::path::PathBuf;

use crate::sequence::TestSequence;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "charz.toml")]
    pub config: PathBuf,

    /// Directory to which stimulus decks and logs should be saved.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Operation sequence to simulate (short or marchcm).
    #[arg(short, long, default_value = "short")]
    pub sequence: TestSequence,

    /// Output bit observed by delay, slew and voltage measurements.
    #[arg(long, default_value_t = 0)]
    pub probe_bit: usize,

    /// Run ngspice on every generated deck.
    #[arg(long)]
    pub simulate: bool,

    /// Parse measurements from an existing ngspice log for the first corner.
    #[arg(short, long, conflicts_with = "simulate")]
    pub results: Option<PathBuf>,

    /// Print measurements as JSON.
    #[arg(long)]
    pub json: bool,
}
