use std::fmt::{Display, Formatter};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::bits::{BitSignal, Operand};
use crate::error::{CharzError, Result};
use crate::port::PortSet;

use self::trace::BusTraces;

pub mod signal;
pub mod trace;

pub use signal::TbSignal;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Read,
    Write,
    Noop,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::Noop => "noop",
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An operation on a single port.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// `data` is the value driven on the data bus of a read-write port.
    Read {
        addr: BitSignal,
        data: Option<BitSignal>,
    },
    Write {
        addr: BitSignal,
        data: BitSignal,
    },
    Noop,
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Read { .. } => OpKind::Read,
            Op::Write { .. } => OpKind::Write,
            Op::Noop => OpKind::Noop,
        }
    }

    pub fn addr(&self) -> Option<&BitSignal> {
        match self {
            Op::Read { addr, .. } | Op::Write { addr, .. } => Some(addr),
            Op::Noop => None,
        }
    }
}

/// Cycle-by-cycle control, address and data traces for every port of a
/// multi-port memory.
///
/// Each advancing call (`append_read`, `append_write`, `append_noop`) commits
/// exactly one cycle to every port. The `*_same_cycle` variants stage an
/// operation for one port in the cycle that the next advancing call commits.
#[derive(Debug, Clone)]
pub struct CycleWaveform {
    ports: PortSet,
    addr_width: usize,
    word_size: usize,
    period: f64,
    t_current: f64,
    cycle_times: Vec<f64>,
    csb: Vec<Vec<bool>>,
    web: Vec<Option<Vec<bool>>>,
    addr: BusTraces,
    data: BusTraces,
    staged: Vec<Option<Op>>,
    cycle_comments: Vec<String>,
    op_comments: Vec<String>,
}

impl CycleWaveform {
    /// `period` is the clock period in seconds.
    pub fn new(ports: PortSet, addr_width: usize, word_size: usize, period: f64) -> Self {
        let n = ports.len();
        let web = ports
            .iter()
            .map(|p| p.is_readwrite().then(Vec::new))
            .collect();
        Self {
            addr: BusTraces::new(n, addr_width),
            data: BusTraces::new(n, word_size),
            csb: vec![Vec::new(); n],
            web,
            staged: vec![None; n],
            ports,
            addr_width,
            word_size,
            period,
            t_current: 0.0,
            cycle_times: Vec::new(),
            cycle_comments: Vec::new(),
            op_comments: Vec::new(),
        }
    }

    pub fn append_write(&mut self, port: usize, addr: &str, data: &str, comment: &str) -> Result<()> {
        let op = self.write_op(port, addr, data)?;
        self.commit(Some((port, op)), comment)
    }

    pub fn append_read(
        &mut self,
        port: usize,
        addr: &str,
        data: Option<&str>,
        comment: &str,
    ) -> Result<()> {
        let op = self.read_op(port, addr, data)?;
        self.commit(Some((port, op)), comment)
    }

    pub fn append_noop(&mut self, comment: &str) -> Result<()> {
        self.commit(None, comment)
    }

    /// Stages a write on `port` without advancing time.
    pub fn append_write_same_cycle(
        &mut self,
        port: usize,
        addr: &str,
        data: &str,
        comment: &str,
    ) -> Result<()> {
        let op = self.write_op(port, addr, data)?;
        self.stage(port, op, comment)
    }

    /// Stages a read on `port` without advancing time.
    pub fn append_read_same_cycle(
        &mut self,
        port: usize,
        addr: &str,
        data: Option<&str>,
        comment: &str,
    ) -> Result<()> {
        let op = self.read_op(port, addr, data)?;
        self.stage(port, op, comment)
    }

    /// Commits one cycle in which `op` is issued on `port`.
    ///
    /// [`Op::Noop`] idles every port.
    pub fn apply(&mut self, port: usize, op: Op, comment: &str) -> Result<()> {
        if op == Op::Noop {
            return self.append_noop(comment);
        }
        let op = self.check_op(port, op)?;
        self.commit(Some((port, op)), comment)
    }

    /// Stages `op` on `port` in the current cycle.
    pub fn apply_same_cycle(&mut self, port: usize, op: Op, comment: &str) -> Result<()> {
        let op = self.check_op(port, op)?;
        self.stage(port, op, comment)
    }

    /// Annotation for generated files. Does not modify the waveform.
    pub fn describe_cycle(
        &self,
        op: OpKind,
        word: &str,
        addr: &str,
        port: usize,
        t: f64,
    ) -> String {
        // Truncates to the cycle containing `t`, tolerating accumulated error
        // in cycle start times.
        let cycle = (t / self.period + 1e-9).floor() as usize;
        let start = t * 1e9;
        let end = (t + self.period) * 1e9;
        match op {
            OpKind::Noop => format!("Idle during cycle {cycle} ({start:.2}ns - {end:.2}ns)"),
            OpKind::Write => format!(
                "Writing {word} to address {addr} (from port {port}) during cycle {cycle} ({start:.2}ns - {end:.2}ns)"
            ),
            OpKind::Read => format!(
                "Reading {word} from address {addr} (from port {port}) during cycle {cycle} ({start:.2}ns - {end:.2}ns)"
            ),
        }
    }

    #[inline]
    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    #[inline]
    pub fn addr_width(&self) -> usize {
        self.addr_width
    }

    #[inline]
    pub fn word_size(&self) -> usize {
        self.word_size
    }

    #[inline]
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Start time of the next cycle to be committed.
    #[inline]
    pub fn t_current(&self) -> f64 {
        self.t_current
    }

    #[inline]
    pub fn num_cycles(&self) -> usize {
        self.cycle_times.len()
    }

    /// Start time of every committed cycle.
    pub fn cycle_times(&self) -> &[f64] {
        &self.cycle_times
    }

    pub fn has_staged(&self) -> bool {
        self.staged.iter().any(Option::is_some)
    }

    pub fn cycle_comments(&self) -> &[String] {
        &self.cycle_comments
    }

    pub fn op_comments(&self) -> &[String] {
        &self.op_comments
    }

    pub fn addr_at(&self, port: usize, cycle: usize) -> Option<BitSignal> {
        self.addr.value_at(port, cycle)
    }

    pub fn data_at(&self, port: usize, cycle: usize) -> Option<BitSignal> {
        if !self.ports.is_writable(port) {
            return None;
        }
        self.data.value_at(port, cycle)
    }

    /// The committed trace of `signal`, or `None` if the memory has no such net.
    pub fn trace(&self, signal: TbSignal) -> Option<&[bool]> {
        match signal {
            TbSignal::Csb(p) => self.csb.get(p).map(Vec::as_slice),
            TbSignal::Web(p) => self.web.get(p)?.as_deref(),
            TbSignal::Addr(p, b) => self.addr.bit_trace(p, b),
            TbSignal::Din(p, b) => {
                if self.ports.is_writable(p) {
                    self.data.bit_trace(p, b)
                } else {
                    None
                }
            }
            TbSignal::Clk(_) | TbSignal::Dout(_, _) => None,
        }
    }

    /// Every traced input net, port by port.
    pub fn signals(&self) -> Vec<TbSignal> {
        let mut signals = Vec::new();
        for port in self.ports.iter() {
            let p = port.id();
            signals.push(TbSignal::Csb(p));
            if port.is_readwrite() {
                signals.push(TbSignal::Web(p));
            }
            signals.extend((0..self.addr_width).map(|b| TbSignal::Addr(p, b)));
            if port.is_writable() {
                signals.extend((0..self.word_size).map(|b| TbSignal::Din(p, b)));
            }
        }
        signals
    }

    fn write_op(&self, port: usize, addr: &str, data: &str) -> Result<Op> {
        self.ports.require_writable(port)?;
        let op = Op::Write {
            addr: BitSignal::parse(addr, Operand::Address)?,
            data: BitSignal::parse(data, Operand::Data)?,
        };
        self.check_op(port, op)
    }

    fn read_op(&self, port: usize, addr: &str, data: Option<&str>) -> Result<Op> {
        self.ports.require_readable(port)?;
        let op = Op::Read {
            addr: BitSignal::parse(addr, Operand::Address)?,
            data: data
                .map(|data| BitSignal::parse(data, Operand::Data))
                .transpose()?,
        };
        self.check_op(port, op)
    }

    /// Validates capability and operand widths.
    ///
    /// Data supplied for a read on a read-only port is dropped.
    fn check_op(&self, port: usize, op: Op) -> Result<Op> {
        let info = self.ports.get(port)?;
        match op {
            Op::Read { addr, data } => {
                self.ports.require_readable(port)?;
                self.check_width(&addr, Operand::Address)?;
                let data = if info.is_writable() {
                    let data = data.ok_or(CharzError::MissingOperand {
                        port,
                        operand: Operand::Data,
                    })?;
                    self.check_width(&data, Operand::Data)?;
                    Some(data)
                } else {
                    None
                };
                Ok(Op::Read { addr, data })
            }
            Op::Write { addr, data } => {
                self.ports.require_writable(port)?;
                self.check_width(&addr, Operand::Address)?;
                self.check_width(&data, Operand::Data)?;
                Ok(Op::Write { addr, data })
            }
            Op::Noop => Ok(Op::Noop),
        }
    }

    fn check_width(&self, value: &BitSignal, operand: Operand) -> Result<()> {
        let expected = match operand {
            Operand::Address => self.addr_width,
            Operand::Data => self.word_size,
        };
        if value.width() != expected {
            return Err(CharzError::MalformedOperand {
                operand,
                expected,
                actual: value.width(),
            });
        }
        Ok(())
    }

    fn stage(&mut self, port: usize, op: Op, comment: &str) -> Result<()> {
        if self.staged[port].is_some() {
            return Err(CharzError::PortAlreadyStaged(port));
        }
        debug!("{comment}");
        self.push_comment(&port.to_string(), comment);
        self.staged[port] = Some(op);
        Ok(())
    }

    fn commit(&mut self, active: Option<(usize, Op)>, comment: &str) -> Result<()> {
        if let Some((port, _)) = active {
            if self.staged[port].is_some() {
                return Err(CharzError::PortAlreadyStaged(port));
            }
        }

        debug!("{comment}");
        let label = match active {
            Some((port, _)) => port.to_string(),
            None => "All".to_string(),
        };
        self.push_comment(&label, comment);

        let mut ops = std::mem::replace(&mut self.staged, vec![None; self.ports.len()]);
        let idle_addr = active.as_ref().and_then(|(_, op)| op.addr().cloned());
        if let Some((port, op)) = active {
            ops[port] = Some(op);
        }

        for (port, op) in ops.into_iter().enumerate() {
            match op {
                Some(Op::Noop) | None => self.push_noop(port, idle_addr.as_ref()),
                Some(op) => self.push_op(port, &op),
            }
        }

        self.cycle_times.push(self.t_current);
        self.t_current += self.period;
        Ok(())
    }

    fn push_comment(&mut self, port: &str, comment: &str) {
        self.op_comments.push(comment.to_string());
        let time = format!("{:.2} ns:", self.t_current * 1e9);
        self.cycle_comments.push(format!(
            "Cycle {:<6} Port {:<6} {:<14} {}",
            self.cycle_times.len(),
            port,
            time,
            comment
        ));
    }

    fn push_control(&mut self, port: usize, csb: bool, web: bool) {
        self.csb[port].push(csb);
        if let Some(trace) = self.web[port].as_mut() {
            trace.push(web);
        }
    }

    fn push_op(&mut self, port: usize, op: &Op) {
        match op {
            Op::Read { addr, data } => {
                self.push_control(port, false, true);
                self.addr.push(port, addr);
                if let Some(data) = data {
                    self.data.push(port, data);
                }
            }
            Op::Write { addr, data } => {
                self.push_control(port, false, false);
                self.addr.push(port, addr);
                self.data.push(port, data);
            }
            Op::Noop => self.push_noop(port, None),
        }
    }

    /// Idles `port`.
    ///
    /// With `addr` the port follows the active port's address and drives an
    /// all-zero word; otherwise it holds its previous values.
    fn push_noop(&mut self, port: usize, addr: Option<&BitSignal>) {
        self.push_control(port, true, true);
        let (addr, data) = match addr {
            Some(addr) => (addr.clone(), BitSignal::zeros(self.word_size)),
            None => (
                self.addr
                    .last_value(port)
                    .unwrap_or_else(|| BitSignal::zeros(self.addr_width)),
                self.data
                    .last_value(port)
                    .unwrap_or_else(|| BitSignal::zeros(self.word_size)),
            ),
        };
        self.addr.push(port, &addr);
        if self.ports.is_writable(port) {
            self.data.push(port, &data);
        }
    }
}
