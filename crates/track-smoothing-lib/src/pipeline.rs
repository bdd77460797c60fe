//! Configured smoothing sequence

use crate::smoothing::{SmoothOptions, SmoothReport, Smoother};
use crate::utils::{ANGULAR_SPEED_LIMIT_RAD_S, STATIONARY_SPEED_LIMIT_MPS};
use crate::{Result, Track};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which smoothers run and with what limits
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmoothingConfig {
    /// Minimum plausible speed in m/s, `None` skips the stationary smoother
    pub stationary_limit: Option<f64>,
    /// Maximum plausible rotation rate in rad/s, `None` skips the angular smoother
    pub angular_speed_limit: Option<f64>,
    /// Repeat each smoother until it converges
    pub iterate: bool,
    /// Pass bound per smoother, defaults to the vertex count
    pub max_passes: Option<usize>,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            stationary_limit: Some(STATIONARY_SPEED_LIMIT_MPS),
            angular_speed_limit: Some(ANGULAR_SPEED_LIMIT_RAD_S),
            iterate: true,
            max_passes: None,
        }
    }
}

impl SmoothingConfig {
    pub fn options(&self) -> SmoothOptions {
        SmoothOptions {
            iterate: self.iterate,
            max_passes: self.max_passes,
        }
    }

    /// The smoothers to run, in order
    pub fn smoothers(&self) -> Vec<Smoother> {
        self.stationary_limit
            .map(Smoother::stationary)
            .into_iter()
            .chain(self.angular_speed_limit.map(Smoother::angular_speed))
            .collect()
    }
}

/// Reports of every smoother that ran
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SmoothingOutcome {
    pub reports: Vec<SmoothReport>,
}

impl SmoothingOutcome {
    pub fn removed_count(&self) -> usize {
        self.reports.iter().map(SmoothReport::removed_count).sum()
    }
}

/// Seed the track if needed, then run the stationary and angular-speed smoothers
pub fn smooth_track(track: &mut Track, config: &SmoothingConfig) -> Result<SmoothingOutcome> {
    #[cfg(feature = "profiling")]
    profiling::scope!("smooth_track");

    if !track.is_seeded() {
        track.add_properties()?;
    }

    let options = config.options();
    let mut outcome = SmoothingOutcome::default();
    for smoother in config.smoothers() {
        let report = smoother.smooth(track, options)?;
        tracing::debug!(
            "{} smoother removed {} vertices in {} passes",
            report.smoother,
            report.removed_count(),
            report.passes
        );
        outcome.reports.push(report);
    }
    Ok(outcome)
}
