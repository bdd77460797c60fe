use clap::Parser;
use std::path::PathBuf;
use track_smoothing_lib::SmoothingConfig;
use track_smoothing_lib::utils::{ANGULAR_SPEED_LIMIT_RAD_S, STATIONARY_SPEED_LIMIT_MPS};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Track Smoothing - Remove implausible points from recorded GPS tracks
pub struct Settings {
    /// GPX (.gpx) or GeoJSON (.geojson, .json) track to smooth
    #[clap(value_name = "FILE")]
    pub input: PathBuf,

    /// Write the smoothed track here, in the input format
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Points reached slower than this are dropped, in m/s (0 disables)
    #[clap(short, long, default_value_t = STATIONARY_SPEED_LIMIT_MPS)]
    pub stationary_limit: f64,

    /// Points where the track turns faster than this are dropped, in rad/s (0 disables)
    #[clap(short, long, default_value_t = ANGULAR_SPEED_LIMIT_RAD_S)]
    pub angular_speed_limit: f64,

    /// Run each smoother once instead of until nothing changes
    #[clap(long, default_value = "false")]
    pub single_pass: bool,

    /// Maximum passes per smoother (defaults to the number of points)
    #[clap(long)]
    pub max_passes: Option<usize>,
}

/// A zero limit turns the smoother off
fn enabled(limit: f64) -> Option<f64> {
    (limit != 0.0).then_some(limit)
}

impl Settings {
    pub fn smoothing_config(&self) -> SmoothingConfig {
        SmoothingConfig {
            stationary_limit: enabled(self.stationary_limit),
            angular_speed_limit: enabled(self.angular_speed_limit),
            iterate: !self.single_pass,
            max_passes: self.max_passes,
        }
    }
}
