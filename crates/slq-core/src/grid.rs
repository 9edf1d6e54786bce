//! Shooting time grid
//!
//! Maps a shot index to its `[start, end)` time window. The grid is fixed
//! for the duration of a solve session and shared read-only by all shots.

/// Time discretization of the horizon into shooting intervals.
#[derive(Debug, Clone)]
pub struct TimeGrid {
    /// Node times, length `num_shots + 1`, strictly increasing
    node_times: Vec<f64>,
}

impl TimeGrid {
    /// Uniform grid with `num_shots` equal intervals over `[0, horizon]`.
    pub fn uniform(num_shots: usize, horizon: f64) -> Self {
        if num_shots == 0 {
            return Self {
                node_times: vec![0.0],
            };
        }
        let dt = horizon / num_shots as f64;
        Self {
            node_times: (0..=num_shots).map(|k| k as f64 * dt).collect(),
        }
    }

    /// Grid from explicit node times. Times must be strictly increasing.
    pub fn from_node_times(node_times: Vec<f64>) -> Self {
        debug_assert!(node_times.windows(2).all(|w| w[0] < w[1]));
        Self { node_times }
    }

    pub fn num_shots(&self) -> usize {
        self.node_times.len() - 1
    }

    pub fn shot_start_time(&self, shot: usize) -> f64 {
        self.node_times[shot]
    }

    pub fn shot_end_time(&self, shot: usize) -> f64 {
        self.node_times[shot + 1]
    }

    pub fn shot_duration(&self, shot: usize) -> f64 {
        self.shot_end_time(shot) - self.shot_start_time(shot)
    }

    pub fn horizon(&self) -> f64 {
        *self.node_times.last().unwrap_or(&0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_grid() {
        let grid = TimeGrid::uniform(10, 2.0);
        assert_eq!(grid.num_shots(), 10);
        assert_relative_eq!(grid.horizon(), 2.0);
        assert_relative_eq!(grid.shot_start_time(0), 0.0);
        assert_relative_eq!(grid.shot_end_time(9), 2.0);
        for i in 0..10 {
            assert_relative_eq!(grid.shot_duration(i), 0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_empty_horizon() {
        let grid = TimeGrid::uniform(0, 1.0);
        assert_eq!(grid.num_shots(), 0);
        assert_relative_eq!(grid.horizon(), 0.0);
    }

    #[test]
    fn test_explicit_nodes() {
        let grid = TimeGrid::from_node_times(vec![0.0, 0.1, 0.3, 0.6]);
        assert_eq!(grid.num_shots(), 3);
        assert_relative_eq!(grid.shot_duration(2), 0.3, epsilon = 1e-12);
    }
}
