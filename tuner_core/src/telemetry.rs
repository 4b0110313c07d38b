//! Fixed-capacity rolling record of control-loop samples.

use std::collections::VecDeque;

/// One acquisition: setpoint, process value, controller output, elapsed seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    pub setpoint: f64,
    pub process_value: f64,
    pub output: f64,
    pub elapsed_s: f64,
}

impl TelemetrySample {
    pub const ZERO: TelemetrySample = TelemetrySample {
        setpoint: 0.0,
        process_value: 0.0,
        output: 0.0,
        elapsed_s: 0.0,
    };

    pub fn new(setpoint: f64, process_value: f64, output: f64, elapsed_s: f64) -> Self {
        Self {
            setpoint,
            process_value,
            output,
            elapsed_s,
        }
    }
}

/// Time-ordered samples, oldest first, never more than `capacity`.
///
/// Samples are stored whole, so the four channels always have the same
/// length.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySeries {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl TelemetrySeries {
    /// Empty series. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn append(&mut self, sample: TelemetrySample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Change capacity. Growing prepends `new - old` zero samples, shrinking
    /// drops the oldest. Order is never changed. A capacity of 0 is ignored.
    pub fn resize(&mut self, new_capacity: usize) {
        if new_capacity == 0 {
            tracing::warn!("ignoring telemetry resize to 0");
            return;
        }
        let old = self.capacity;
        if new_capacity > old {
            for _ in 0..new_capacity - old {
                self.samples.push_front(TelemetrySample::ZERO);
            }
        }
        while self.samples.len() > new_capacity {
            self.samples.pop_front();
        }
        self.capacity = new_capacity;
        tracing::debug!(old, new = new_capacity, "telemetry resized");
    }

    /// Refill with `capacity` zero samples.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.samples.resize(self.capacity, TelemetrySample::ZERO);
    }

    pub fn samples(&self) -> impl ExactSizeIterator<Item = &TelemetrySample> + '_ {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    pub fn setpoints(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.setpoint)
    }

    pub fn process_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.process_value)
    }

    pub fn outputs(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.output)
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.elapsed_s)
    }
}
