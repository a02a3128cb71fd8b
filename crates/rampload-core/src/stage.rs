//! Ramp stages and the target-concurrency curve.
//!
//! A schedule interpolates the VU target piecewise-linearly: each stage ramps
//! from the previous stage's target (or `start_vus` for the first stage) to its
//! own target over its duration. A zero-length stage is an instantaneous jump.

use crate::duration::RawDuration;
use crate::error::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::time::Duration;

/// Tolerance applied before flooring the curve into a whole VU count.
const VU_EPSILON: f64 = 1e-9;

/// A validated, time-boxed target concurrency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Stage as written in a scenario file, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StageConfig {
    pub duration: RawDuration,
    pub target: i64,
}

impl StageConfig {
    /// Validates the raw stage; `index` is only used for error reporting.
    pub fn validate(&self, index: usize) -> ConfigResult<Stage> {
        let duration = self
            .duration
            .resolve()
            .map_err(|message| ConfigError::invalid_stage(index, message))?;

        if self.target < 0 {
            return Err(ConfigError::invalid_stage(
                index,
                format!("target must not be negative, got {}", self.target),
            ));
        }

        Ok(Stage::new(duration, self.target as u64))
    }
}

/// Immutable, validated ramp profile.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSchedule {
    start_vus: u64,
    stages: Vec<Stage>,
    /// Cumulative end offset of every stage.
    boundaries: Vec<Duration>,
}

impl StageSchedule {
    /// Builds a schedule from already-validated stages.
    pub fn new(start_vus: u64, stages: Vec<Stage>) -> ConfigResult<Self> {
        if stages.is_empty() {
            return Err(ConfigError::InvalidScenario(
                "at least one stage is required".to_string(),
            ));
        }

        let mut boundaries = Vec::with_capacity(stages.len());
        let mut end = Duration::ZERO;
        for stage in &stages {
            end = end.checked_add(stage.duration).ok_or_else(|| {
                ConfigError::InvalidScenario("total duration overflows".to_string())
            })?;
            boundaries.push(end);
        }

        Ok(Self {
            start_vus,
            stages,
            boundaries,
        })
    }

    /// Validates raw stages from a scenario file.
    pub fn from_config(start_vus: i64, stages: &[StageConfig]) -> ConfigResult<Self> {
        if start_vus < 0 {
            return Err(ConfigError::InvalidScenario(format!(
                "start_vus must not be negative, got {start_vus}"
            )));
        }

        let stages = stages
            .iter()
            .enumerate()
            .map(|(index, stage)| stage.validate(index))
            .collect::<ConfigResult<Vec<_>>>()?;

        Self::new(start_vus as u64, stages)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn start_vus(&self) -> u64 {
        self.start_vus
    }

    /// Cumulative end offset of each stage, in stage order.
    pub fn boundaries(&self) -> &[Duration] {
        &self.boundaries
    }

    /// Sum of all stage durations.
    pub fn total_duration(&self) -> Duration {
        self.boundaries.last().copied().unwrap_or(Duration::ZERO)
    }

    /// Highest VU count the curve ever reaches.
    pub fn max_target(&self) -> u64 {
        self.stages
            .iter()
            .map(|s| s.target)
            .max()
            .unwrap_or(0)
            .max(self.start_vus)
    }

    /// Exact target concurrency at `elapsed` since the run started.
    ///
    /// Past the last stage the curve holds the final target.
    pub fn target_at(&self, elapsed: Duration) -> f64 {
        let mut from = self.start_vus as f64;
        let mut stage_start = Duration::ZERO;

        for (stage, &stage_end) in self.stages.iter().zip(&self.boundaries) {
            if elapsed < stage_end {
                let progress =
                    (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                return from + (stage.target as f64 - from) * progress;
            }
            from = stage.target as f64;
            stage_start = stage_end;
        }

        from
    }

    /// Number of VUs that should be active at `elapsed` (curve rounded down).
    pub fn vus_at(&self, elapsed: Duration) -> u64 {
        (self.target_at(elapsed) + VU_EPSILON).floor().max(0.0) as u64
    }

    /// Index of the stage running at `elapsed`, `None` once the schedule is over.
    pub fn stage_index_at(&self, elapsed: Duration) -> Option<usize> {
        self.boundaries.iter().position(|end| elapsed < *end)
    }

    /// Samples the curve every `step`, always including both end points.
    pub fn sample(&self, step: Duration) -> Vec<(Duration, f64)> {
        let total = self.total_duration();
        let mut points = Vec::new();

        if step.is_zero() {
            points.push((Duration::ZERO, self.target_at(Duration::ZERO)));
            points.push((total, self.target_at(total)));
            return points;
        }

        let mut t = Duration::ZERO;
        while t < total {
            points.push((t, self.target_at(t)));
            t += step;
        }
        points.push((total, self.target_at(total)));
        points
    }

    /// One-line description, e.g. `5 stages, 3m 30s, up to 100 VUs`.
    pub fn description(&self) -> String {
        format!(
            "{} stages, {}, up to {} VUs",
            self.stages.len(),
            crate::duration::format_duration(self.total_duration()),
            self.max_target()
        )
    }
}
