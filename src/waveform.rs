pub const DIGITAL_REL_TOL: f64 = 1e-5;

pub fn is_logical_low(x: f64, vdd: f64) -> bool {
    (x / vdd).abs() < DIGITAL_REL_TOL
}

pub fn is_logical_high(x: f64, vdd: f64) -> bool {
    ((vdd - x) / vdd).abs() < DIGITAL_REL_TOL
}

/// A piecewise-linear voltage source.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// List of `(t, x)` pairs.
    values: Vec<(f64, f64)>,
}

impl Waveform {
    #[inline]
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn with_initial_value(x: f64) -> Self {
        Self {
            values: vec![(0f64, x)],
        }
    }

    /// Converts a per-cycle digital trace into a PWL source.
    ///
    /// The value for cycle `k` settles `setup` before `cycle_times[k]`, with a
    /// transition of `tr` centered on that instant. Unchanged levels add no
    /// points.
    pub fn from_trace(trace: &[bool], cycle_times: &[f64], setup: f64, vdd: f64, tr: f64) -> Self {
        let level = |b: bool| if b { vdd } else { 0f64 };
        let mut wav = Self::with_initial_value(trace.first().copied().map(level).unwrap_or(0f64));
        for (k, (&bit, &t)) in trace.iter().zip(cycle_times).enumerate().skip(1) {
            if bit == trace[k - 1] {
                continue;
            }
            let center = (t - setup).max(tr / 2f64);
            wav.push(center - tr / 2f64, level(!bit));
            wav.push(center + tr / 2f64, level(bit));
        }
        wav
    }

    /// A square clock that rises at the start of each cycle.
    pub fn clock(num_cycles: usize, period: f64, vdd: f64, tr: f64) -> Self {
        let mut wav = Self::with_initial_value(0f64);
        for k in 0..num_cycles {
            let t = k as f64 * period;
            wav.push_high(t + period / 2f64, vdd, tr);
            wav.push_low(t + period, vdd, tr);
        }
        wav
    }

    pub fn push(&mut self, t: f64, x: f64) {
        self.values.push((t, x));
    }

    pub fn values(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_t(&self) -> Option<f64> {
        self.values.last().map(|v| v.0)
    }

    pub fn last_x(&self) -> Option<f64> {
        self.values.last().map(|v| v.1)
    }

    /// Holds `vdd` until `until`, ramping up over `tr` first if currently low.
    pub fn push_high(&mut self, until: f64, vdd: f64, tr: f64) {
        if is_logical_low(self.last_x().unwrap_or(vdd), vdd) {
            let t = self.last_t().unwrap_or(0f64) + tr;
            self.push(t, vdd);
        }
        self.push(until, vdd);
    }

    /// Holds 0 until `until`, ramping down over `tf` first if currently high.
    pub fn push_low(&mut self, until: f64, vdd: f64, tf: f64) {
        if is_logical_high(self.last_x().unwrap_or(0f64), vdd) {
            let t = self.last_t().unwrap_or(0f64) + tf;
            self.push(t, 0f64);
        }
        self.push(until, 0f64);
    }
}

impl Default for Waveform {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_push_high_low() {
        let mut wav = Waveform::with_initial_value(0f64);
        wav.push_high(2e-9, 1.8, 1e-10);
        wav.push_high(3e-9, 1.8, 1e-10);
        wav.push_low(4e-9, 1.8, 1e-10);

        let values = wav.values().collect::<Vec<_>>();
        assert_eq!(values.len(), 6);
        assert_relative_eq!(values[1].0, 1e-10, max_relative = 1e-9);
        assert_relative_eq!(values[1].1, 1.8);
        assert_relative_eq!(values[3].0, 3e-9, max_relative = 1e-9);
        assert_relative_eq!(values[4].0, 3.1e-9, max_relative = 1e-9);
        assert_relative_eq!(values[4].1, 0.0);
    }

    #[test]
    fn test_from_trace() {
        let times = [0.0, 2e-9, 4e-9, 6e-9];
        let wav = Waveform::from_trace(&[true, true, false, true], &times, 0.5e-9, 1.2, 0.2e-9);
        let values = wav.values().collect::<Vec<_>>();
        assert_eq!(values.len(), 5);
        assert_relative_eq!(values[0].1, 1.2);
        assert_relative_eq!(values[1].0, 3.4e-9, max_relative = 1e-9);
        assert_relative_eq!(values[1].1, 1.2);
        assert_relative_eq!(values[2].0, 3.6e-9, max_relative = 1e-9);
        assert_relative_eq!(values[2].1, 0.0);
        assert_relative_eq!(values[4].0, 5.6e-9, max_relative = 1e-9);
        assert_relative_eq!(values[4].1, 1.2);
    }

    #[test]
    fn test_clock() {
        let wav = Waveform::clock(2, 2e-9, 1.0, 1e-10);
        let values = wav.values().collect::<Vec<_>>();
        assert!(is_logical_low(values[0].1, 1.0));
        assert_relative_eq!(values[1].0, 1e-10, max_relative = 1e-9);
        assert!(is_logical_high(values[1].1, 1.0));
        assert_relative_eq!(wav.last_t().unwrap(), 4e-9, max_relative = 1e-9);
        assert!(is_logical_low(wav.last_x().unwrap(), 1.0));
    }

    fn is_monotonic(wav: &Waveform) -> bool {
        wav.values()
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| w[0].0 <= w[1].0)
    }

    #[test]
    fn test_monotonic_at_max_rise_time() {
        let period = 1e-9;
        let tr = 0.49e-9;
        assert!(is_monotonic(&Waveform::clock(4, period, 1.0, tr)));

        let times = [0.0, 1e-9, 2e-9, 3e-9];
        let wav = Waveform::from_trace(&[false, true, false, true], &times, period / 4.0, 1.0, tr);
        assert_eq!(wav.len(), 7);
        assert!(is_monotonic(&wav));
    }
}
