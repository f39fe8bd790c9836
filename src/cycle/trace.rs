use grid::Grid;

use crate::bits::BitSignal;

/// Per-bit traces of one bus for every port.
///
/// The `(port, bit)` shape is fixed when the table is created; only the
/// per-cycle traces grow.
#[derive(Debug, Clone)]
pub struct BusTraces {
    grid: Grid<Vec<bool>>,
    width: usize,
}

impl BusTraces {
    pub fn new(num_ports: usize, width: usize) -> Self {
        Self {
            grid: Grid::new(num_ports, width),
            width,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Appends one cycle of `value` to every bit trace of `port`.
    pub(crate) fn push(&mut self, port: usize, value: &BitSignal) {
        assert_eq!(value.width(), self.width);
        for (bit, level) in value.bits().enumerate() {
            self.grid
                .get_mut(port, bit)
                .expect("bus trace index out of bounds")
                .push(level);
        }
    }

    pub fn bit_trace(&self, port: usize, bit: usize) -> Option<&[bool]> {
        self.grid.get(port, bit).map(|trace| trace.as_slice())
    }

    /// Number of cycles recorded for `port`.
    pub fn len(&self, port: usize) -> usize {
        self.bit_trace(port, 0).map(|t| t.len()).unwrap_or(0)
    }

    /// Reassembles the bus value driven on `port` during `cycle`.
    pub fn value_at(&self, port: usize, cycle: usize) -> Option<BitSignal> {
        let bits = (0..self.width)
            .map(|bit| self.bit_trace(port, bit)?.get(cycle).copied())
            .collect::<Option<Vec<_>>>()?;
        Some(BitSignal::from_lsb_bits(bits))
    }

    /// The most recent value on `port`, if any cycle has been recorded.
    pub fn last_value(&self, port: usize) -> Option<BitSignal> {
        let len = self.len(port);
        if len == 0 {
            None
        } else {
            self.value_at(port, len - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::Operand;

    #[test]
    fn test_bus_traces_bit_order() {
        let mut traces = BusTraces::new(2, 4);
        let value = BitSignal::parse("1011", Operand::Address).unwrap();
        traces.push(1, &value);

        let read_back = (0..4)
            .rev()
            .map(|bit| {
                if traces.bit_trace(1, bit).unwrap()[0] {
                    '1'
                } else {
                    '0'
                }
            })
            .collect::<String>();
        assert_eq!(read_back, "1011");
        assert_eq!(traces.len(1), 1);
        assert_eq!(traces.len(0), 0);
        assert_eq!(traces.last_value(1), Some(value));
        assert_eq!(traces.last_value(0), None);
        assert!(traces.bit_trace(2, 0).is_none());
    }
}
