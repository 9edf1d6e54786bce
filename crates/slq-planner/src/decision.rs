//! Decision vector
//!
//! Holds the per-shot decision variables of the multiple-shooting problem:
//! shot-start states `s_0 .. s_N` and control parameter knots `q_0 .. q_N`.
//! A monotonically increasing update counter is the single source of truth
//! that every shot cache validates against: a cached quantity is current iff
//! its token equals the counter.
//!
//! The counter starts at 1 so that freshly constructed shots (tokens at 0)
//! are always stale, and it increments exactly once per logical update.

use slq_core::Vector;

/// Versioned container of the shooting decision variables.
#[derive(Debug, Clone)]
pub struct DecisionVector {
    /// Shot-start states, length N+1
    states: Vec<Vector>,
    /// Control parameter knots, length N+1
    controls: Vec<Vector>,
    update_count: u64,
}

impl DecisionVector {
    /// Zero-initialized decision vector for `num_shots` intervals.
    pub fn new(num_shots: usize, state_dim: usize, control_dim: usize) -> Self {
        Self {
            states: vec![Vector::zeros(state_dim); num_shots + 1],
            controls: vec![Vector::zeros(control_dim); num_shots + 1],
            update_count: 1,
        }
    }

    /// Build from explicit knot values. Both sequences must have length N+1.
    pub fn from_parts(states: Vec<Vector>, controls: Vec<Vector>) -> Self {
        debug_assert_eq!(states.len(), controls.len());
        Self {
            states,
            controls,
            update_count: 1,
        }
    }

    /// Current version stamp. Never decreases.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn num_shots(&self) -> usize {
        self.states.len() - 1
    }

    pub fn state_dim(&self) -> usize {
        self.states[0].len()
    }

    pub fn control_dim(&self) -> usize {
        self.controls[0].len()
    }

    /// Shot-start state `s_i`
    pub fn state(&self, shot: usize) -> &Vector {
        &self.states[shot]
    }

    /// Control knot `q_i`
    pub fn control(&self, shot: usize) -> &Vector {
        &self.controls[shot]
    }

    /// Replace `s_i`; counts as one update.
    pub fn set_state(&mut self, shot: usize, value: Vector) {
        self.states[shot] = value;
        self.update_count += 1;
    }

    /// Replace `q_i`; counts as one update.
    pub fn set_control(&mut self, shot: usize, value: Vector) {
        self.controls[shot] = value;
        self.update_count += 1;
    }

    /// Batch mutation counted as a single logical update, for outer-loop
    /// steps that touch many knots at once.
    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&mut [Vector], &mut [Vector]),
    {
        f(&mut self.states, &mut self.controls);
        self.update_count += 1;
    }
}
