//! Stimulus and measurement engine for characterizing multi-port SRAMs.
//!
//! A [`cycle::CycleWaveform`] records read, write and idle cycles on every
//! port. The [`deck`] module turns the recorded traces and a set of
//! [`measure::Measurement`] requests into an ngspice deck, and
//! [`measure::SimResults`] reads the simulator's answers back.

use lazy_static::lazy_static;
use tera::Tera;

pub mod bits;
pub mod charz;
pub mod cli;
pub mod config;
pub mod cycle;
pub mod deck;
pub mod error;
pub mod measure;
pub mod paths;
pub mod port;
pub mod sequence;
pub mod sim;
pub mod verification;
pub mod waveform;

pub use error::{CharzError, Result};

lazy_static! {
    pub static ref TEMPLATES: Tera =
        match Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/*")) {
            Ok(t) => t,
            Err(e) => panic!("Error parsing templates: {e}"),
        };
}
