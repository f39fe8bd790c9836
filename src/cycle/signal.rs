use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Nets driven or observed by a characterization testbench.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TbSignal {
    Clk(usize),
    /// Active-low chip select.
    Csb(usize),
    /// Active-low write enable. Only read-write ports have one.
    Web(usize),
    Addr(usize, usize),
    Din(usize, usize),
    Dout(usize, usize),
}

impl TbSignal {
    pub fn port(&self) -> usize {
        match *self {
            TbSignal::Clk(p)
            | TbSignal::Csb(p)
            | TbSignal::Web(p)
            | TbSignal::Addr(p, _)
            | TbSignal::Din(p, _)
            | TbSignal::Dout(p, _) => p,
        }
    }

    pub fn net_name(&self) -> String {
        match *self {
            TbSignal::Clk(p) => format!("CLK{p}"),
            TbSignal::Csb(p) => format!("CSB{p}"),
            TbSignal::Web(p) => format!("WEB{p}"),
            TbSignal::Addr(p, b) => format!("ADDR{p}_{b}"),
            TbSignal::Din(p, b) => format!("DIN{p}_{b}"),
            TbSignal::Dout(p, b) => format!("DOUT{p}_{b}"),
        }
    }
}

impl Display for TbSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net_name())
    }
}
