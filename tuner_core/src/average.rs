//! Moving average over the last N readings of one channel.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    buf: VecDeque<f64>,
}

impl MovingAverage {
    /// `window` is fixed for the lifetime of the average; 0 is raised to 1.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buf: VecDeque::with_capacity(window),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Add a reading and return the average of the readings held.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.buf.len() == self.window {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
        self.mean_of_buffer()
    }

    pub fn average(&self) -> Option<f64> {
        (!self.buf.is_empty()).then(|| self.mean_of_buffer())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    // summed fresh each time so no drift accumulates
    fn mean_of_buffer(&self) -> f64 {
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }
}
