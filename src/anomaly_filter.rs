//! Suppression of spurious register readings.
//!
//! Some meters briefly report exactly `1` on a register whose readings sit far
//! from zero. A reading of `1` is dropped when the register's full history
//! averages outside `[-5, 5]`, and the register enters a skip streak. The next
//! reading ends the streak, and is itself dropped if it jumps above 1.8 times
//! the history average.
//!
//! Histories are keyed by the raw register name, matching the published topic.

use std::collections::HashMap;

use crate::reading_history::{ReadingHistory, HISTORY_SIZE};

const GLITCH_READING: f64 = 1.0;
const GLITCH_AVERAGE_LIMIT: f64 = 5.0;
const RECOVERY_JUMP_FACTOR: f64 = 1.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accepted,
    Suppressed(SuppressReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SuppressReason {
    /// A reading of exactly 1 against a history averaging outside [-5, 5].
    GlitchSpike { average: f64 },
    /// An upward jump while recovering from a glitch.
    RecoveryJump { average: f64 },
}

#[derive(Debug, Default, Clone)]
struct RegisterState {
    history: ReadingHistory,
    skipping: bool,
}

/// Per-register history and skip state, owned for the lifetime of the process.
#[derive(Debug, Default)]
pub struct AnomalyFilter {
    registers: HashMap<String, RegisterState>,
}

impl AnomalyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Judges one reading and updates the register's state.
    ///
    /// History only grows on acceptance. Skip state is set by a glitch and
    /// cleared by the next evaluation, whatever its outcome.
    pub fn evaluate(&mut self, name: &str, reading: f64) -> Verdict {
        let state = self.registers.entry(name.to_string()).or_default();

        let mut verdict = Verdict::Accepted;
        if reading == GLITCH_READING && !state.skipping {
            if state.history.len() >= HISTORY_SIZE {
                let average = state.history.average();
                if !(-GLITCH_AVERAGE_LIMIT..=GLITCH_AVERAGE_LIMIT).contains(&average) {
                    verdict = Verdict::Suppressed(SuppressReason::GlitchSpike { average });
                    state.skipping = true;
                }
            }
        } else if state.skipping {
            let average = state.history.average();
            if reading > average * RECOVERY_JUMP_FACTOR {
                verdict = Verdict::Suppressed(SuppressReason::RecoveryJump { average });
            }
            state.skipping = false;
        }

        if verdict.is_accepted() {
            state.skipping = false;
            state.history.push(reading);
        }
        verdict
    }

    /// Seeds a register's history, e.g. when restoring known-good readings.
    pub fn seed<I>(&mut self, name: &str, readings: I)
    where
        I: IntoIterator<Item = f64>,
    {
        let state = self.registers.entry(name.to_string()).or_default();
        for reading in readings {
            state.history.push(reading);
        }
    }

    pub fn history(&self, name: &str) -> Option<&ReadingHistory> {
        self.registers.get(name).map(|state| &state.history)
    }

    pub fn is_skipping(&self, name: &str) -> bool {
        self.registers
            .get(name)
            .map(|state| state.skipping)
            .unwrap_or(false)
    }

    pub fn tracked_registers(&self) -> usize {
        self.registers.len()
    }
}
