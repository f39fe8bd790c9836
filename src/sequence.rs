use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bits::BitSignal;
use crate::cycle::{CycleWaveform, Op};
use crate::error::{CharzError, Result};
use crate::port::PortSet;

/// An operation targeted at a single port.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PortOp {
    pub port: usize,
    pub op: Op,
}

impl PortOp {
    pub fn new(port: usize, op: Op) -> Self {
        Self { port, op }
    }

    pub fn noop() -> Self {
        Self { port: 0, op: Op::Noop }
    }
}

/// A read whose result is known from the preceding writes.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpectedRead {
    pub cycle: usize,
    pub port: usize,
    pub addr: BitSignal,
    pub data: BitSignal,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TestSequence {
    Short,
    MarchCm,
}

impl TestSequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestSequence::Short => "short",
            TestSequence::MarchCm => "marchcm",
        }
    }

    pub fn ops(&self, ports: &PortSet, addr_width: usize, word_size: usize) -> Result<Vec<PortOp>> {
        match self {
            TestSequence::Short => short_test(ports, addr_width, word_size),
            TestSequence::MarchCm => march_cm_test(ports, addr_width, word_size),
        }
    }
}

impl Display for TestSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TestSequence {
    type Err = CharzError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "short" => Ok(TestSequence::Short),
            "marchcm" => Ok(TestSequence::MarchCm),
            _ => Err(CharzError::InvalidConfig(format!(
                "unknown test sequence `{s}`"
            ))),
        }
    }
}

fn bits0101(width: usize) -> BitSignal {
    alternating_bits(width, true)
}

fn bits1010(width: usize) -> BitSignal {
    alternating_bits(width, false)
}

fn alternating_bits(width: usize, start: bool) -> BitSignal {
    BitSignal::from_lsb_bits((0..width).map(|i| (i % 2 == 0) == start).collect())
}

/// Chooses the port used for writes and the port used for reads.
fn test_ports(ports: &PortSet) -> Result<(usize, usize)> {
    let writer = ports
        .write_ports()
        .next()
        .ok_or_else(|| CharzError::InvalidConfig("memory has no writable port".to_string()))?;
    let reader = ports
        .read_ports()
        .next()
        .ok_or_else(|| CharzError::InvalidConfig("memory has no readable port".to_string()))?;
    Ok((writer.id(), reader.id()))
}

fn read_op(ports: &PortSet, port: usize, addr: BitSignal, word_size: usize) -> PortOp {
    let data = ports
        .get(port)
        .ok()
        .filter(|p| p.is_writable())
        .map(|_| BitSignal::zeros(word_size));
    PortOp::new(port, Op::Read { addr, data })
}

/// Writes alternating patterns to the lowest and highest addresses from every
/// writable port, then reads them back alternately on every readable port.
pub fn short_test(ports: &PortSet, addr_width: usize, word_size: usize) -> Result<Vec<PortOp>> {
    test_ports(ports)?;
    let addr1 = BitSignal::zeros(addr_width);
    let addr2 = BitSignal::ones(addr_width);

    let mut ops = Vec::new();
    for port in ports.write_ports() {
        ops.extend([
            PortOp::new(
                port.id(),
                Op::Write {
                    addr: addr1.clone(),
                    data: bits0101(word_size),
                },
            ),
            PortOp::noop(),
            PortOp::new(
                port.id(),
                Op::Write {
                    addr: addr2.clone(),
                    data: bits1010(word_size),
                },
            ),
            PortOp::noop(),
        ]);
    }

    for port in ports.read_ports() {
        ops.push(PortOp::noop());
        for addr in [&addr1, &addr2, &addr1] {
            ops.push(read_op(ports, port.id(), addr.clone(), word_size));
        }
    }
    ops.push(PortOp::noop());

    Ok(ops)
}

/// Widest address for which a full March C- sequence is generated.
pub const MAX_MARCH_ADDR_WIDTH: usize = 16;

/// March C- over every address.
pub fn march_cm_test(ports: &PortSet, addr_width: usize, word_size: usize) -> Result<Vec<PortOp>> {
    let (writer, reader) = test_ports(ports)?;
    let n = Some(addr_width)
        .filter(|&w| w <= MAX_MARCH_ADDR_WIDTH)
        .and_then(|w| 1u64.checked_shl(w as u32))
        .ok_or_else(|| {
            CharzError::InvalidConfig(format!(
                "March C- supports address widths up to {MAX_MARCH_ADDR_WIDTH}, got {addr_width}"
            ))
        })?;
    let write = |i: u64, data: BitSignal| {
        PortOp::new(
            writer,
            Op::Write {
                addr: BitSignal::from_u64(i, addr_width),
                data,
            },
        )
    };
    let read = |i: u64| read_op(ports, reader, BitSignal::from_u64(i, addr_width), word_size);
    let zeros = BitSignal::zeros(word_size);
    let ones = BitSignal::ones(word_size);

    let ops = (0..n)
        .map(|i| write(i, zeros.clone()))
        .chain((0..n).flat_map(|i| [read(i), write(i, ones.clone())]))
        .chain((0..n).flat_map(|i| [read(i), write(i, zeros.clone())]))
        .chain((0..n).rev().flat_map(|i| [read(i), write(i, ones.clone())]))
        .chain((0..n).rev().flat_map(|i| [read(i), write(i, zeros.clone())]))
        .chain((0..n).rev().map(&read))
        .collect::<Vec<_>>();
    Ok(ops)
}

/// Appends `ops` to the waveform one cycle each.
///
/// Returns every read whose data was written earlier in the sequence.
pub fn apply_ops(wf: &mut CycleWaveform, ops: &[PortOp]) -> Result<Vec<ExpectedRead>> {
    let mut memory: HashMap<BitSignal, BitSignal> = HashMap::new();
    let mut reads = Vec::new();
    for PortOp { port, op } in ops {
        let t = wf.t_current();
        let comment = match op {
            Op::Write { addr, data } => {
                wf.describe_cycle(op.kind(), &data.to_string(), &addr.to_string(), *port, t)
            }
            Op::Read { addr, .. } => {
                let word = memory
                    .get(addr)
                    .map(BitSignal::to_literal)
                    .unwrap_or_else(|| "x".repeat(wf.word_size()));
                wf.describe_cycle(op.kind(), &word, &addr.to_string(), *port, t)
            }
            Op::Noop => wf.describe_cycle(op.kind(), "", "", *port, t),
        };
        let cycle = wf.num_cycles();
        wf.apply(*port, op.clone(), &comment)?;
        match op {
            Op::Write { addr, data } => {
                memory.insert(addr.clone(), data.clone());
            }
            Op::Read { addr, .. } => {
                if let Some(data) = memory.get(addr) {
                    reads.push(ExpectedRead {
                        cycle,
                        port: *port,
                        addr: addr.clone(),
                        data: data.clone(),
                    });
                }
            }
            Op::Noop => {}
        }
    }
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::{OpKind, TbSignal};

    #[test]
    fn test_alternating_bits() {
        assert_eq!(bits0101(4).to_literal(), "0101");
        assert_eq!(bits1010(4).to_literal(), "1010");
        assert_eq!(bits0101(3).to_literal(), "101");
    }

    #[test]
    fn test_parse_sequence() {
        for seq in [TestSequence::Short, TestSequence::MarchCm] {
            assert_eq!(seq.as_str().parse::<TestSequence>().unwrap(), seq);
        }
        assert!("medium".parse::<TestSequence>().is_err());
    }

    #[test]
    fn test_march_cm_length() {
        let ports = PortSet::new(1, 0, 0);
        let ops = march_cm_test(&ports, 2, 4).unwrap();
        assert_eq!(ops.len(), 4 * 10);
        assert_eq!(ops.iter().filter(|op| op.op.kind() == OpKind::Read).count(), 20);
    }

    #[test]
    fn test_march_cm_address_width_limit() {
        let ports = PortSet::new(1, 0, 0);
        for width in [MAX_MARCH_ADDR_WIDTH + 1, 64, 200] {
            assert!(matches!(
                march_cm_test(&ports, width, 4),
                Err(CharzError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_short_reads_every_read_port() {
        let ports = PortSet::new(0, 1, 2);
        let ops = short_test(&ports, 3, 4).unwrap();
        for port in [1, 2] {
            assert_eq!(
                ops.iter()
                    .filter(|op| op.port == port && op.op.kind() == OpKind::Read)
                    .count(),
                3
            );
        }
        assert!(ops
            .iter()
            .filter(|op| op.op.kind() == OpKind::Write)
            .all(|op| op.port == 0));

        let ports = PortSet::new(2, 0, 0);
        let ops = short_test(&ports, 3, 4).unwrap();
        for port in [0, 1] {
            assert_eq!(
                ops.iter()
                    .filter(|op| op.port == port && op.op.kind() == OpKind::Write)
                    .count(),
                2
            );
        }
    }

    #[test]
    fn test_no_writable_port() {
        let ports = PortSet::new(0, 0, 1);
        assert!(matches!(
            short_test(&ports, 2, 2),
            Err(CharzError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_apply_ops_tracks_expected_reads() {
        let ports = PortSet::new(1, 0, 1);
        let ops = short_test(&ports, 2, 4).unwrap();
        let mut wf = CycleWaveform::new(ports, 2, 4, 1e-9);
        let reads = apply_ops(&mut wf, &ops).unwrap();

        assert_eq!(wf.num_cycles(), ops.len());
        assert_eq!(reads.len(), 6);
        assert_eq!(reads[0].data.to_literal(), "0101");
        assert_eq!(reads[1].data.to_literal(), "1010");
        for read in &reads {
            assert!(!wf.trace(TbSignal::Csb(read.port)).unwrap()[read.cycle]);
        }
        assert!(wf.op_comments()[0].starts_with("Writing 0101 to address 00"));
    }
}
