pub const HISTORY_SIZE: usize = 5;

/// A fixed-size window of the most recently accepted readings for one register.
///
/// Once full, each new reading evicts the oldest one.
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    buffer: [f64; HISTORY_SIZE],
    index: usize,
    count: usize,
}

impl ReadingHistory {
    pub fn new() -> Self {
        Self {
            buffer: [0.0; HISTORY_SIZE],
            index: 0,
            count: 0,
        }
    }

    /// Appends a reading, replacing the oldest one if the window is full.
    pub fn push(&mut self, value: f64) {
        if self.count < HISTORY_SIZE {
            self.count += 1;
        }

        self.buffer[self.index] = value;

        self.index = (self.index + 1) % HISTORY_SIZE;
    }

    /// Mean of the readings currently held. An empty history averages to 0.0.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        // Slots fill from zero, so the first `count` slots are always the held ones.
        self.buffer.iter().take(self.count).sum::<f64>() / self.count as f64
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == HISTORY_SIZE
    }

    /// Readings from oldest to newest.
    pub fn values(&self) -> Vec<f64> {
        let start = if self.is_full() { self.index } else { 0 };
        (0..self.count)
            .map(|offset| self.buffer[(start + offset) % HISTORY_SIZE])
            .collect()
    }
}

impl Default for ReadingHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<f64> for ReadingHistory {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut history = Self::new();
        for value in iter {
            history.push(value);
        }
        history
    }
}
