use thiserror::Error;

use crate::bits::Operand;
use crate::port::PortKind;

#[derive(Debug, Error)]
pub enum CharzError {
    #[error("port {port} ({kind}) cannot perform a {op} operation")]
    InvalidPortRole {
        port: usize,
        kind: PortKind,
        op: &'static str,
    },

    #[error("no port with id {0}")]
    UnknownPort(usize),

    #[error("malformed {operand}: expected {expected} bits, got {actual}")]
    MalformedOperand {
        operand: Operand,
        expected: usize,
        actual: usize,
    },

    #[error("non-binary {operand} literal `{literal}`")]
    NonBinaryLiteral { operand: Operand, literal: String },

    #[error("port {port} requires a {operand} operand")]
    MissingOperand { port: usize, operand: Operand },

    #[error("port {0} already has an operation in the current cycle")]
    PortAlreadyStaged(usize),

    #[error("unrecognized edge direction `{0}`")]
    UnrecognizedEdge(String),

    #[error("measurement `{name}` expects {expected} inputs")]
    MismatchedInputs {
        name: String,
        expected: &'static str,
    },

    #[error("invalid measurement name `{0}`")]
    InvalidMeasurementName(String),

    #[error("measurement `{0}` not found in simulation results")]
    MeasurementNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{check} failed for {cell} with {errors} error(s)")]
    VerificationFailed {
        check: &'static str,
        cell: String,
        errors: usize,
    },

    #[error("simulator error: {0}")]
    Simulator(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("error rendering template: {0}")]
    Template(#[from] tera::Error),

    #[error("error parsing configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CharzError>;
