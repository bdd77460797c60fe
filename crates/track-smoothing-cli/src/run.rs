//! Load, smooth, report and save one track file

use crate::settings::Settings;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use track_smoothing_lib::{
    GeoJsonTrack, SmoothReport, Track, TrackError, TrackStatistics, read_gpx_file, smooth_track,
};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("Unsupported file type for {} (expected .gpx, .geojson or .json)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Gpx,
    GeoJson,
}

impl Format {
    fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gpx") => Ok(Self::Gpx),
            Some("geojson" | "json") => Ok(Self::GeoJson),
            _ => Err(CliError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// A loaded track, remembering what it needs to be written back
enum Loaded {
    Gpx(Track),
    GeoJson(GeoJsonTrack),
}

impl Loaded {
    fn read(path: &Path) -> Result<Self> {
        Ok(match Format::detect(path)? {
            Format::Gpx => Self::Gpx(Track::from_gpx(&read_gpx_file(path)?)?),
            Format::GeoJson => Self::GeoJson(std::fs::read_to_string(path)?.parse()?),
        })
    }

    fn track(&self) -> &Track {
        match self {
            Self::Gpx(track) => track,
            Self::GeoJson(geojson) => geojson.track(),
        }
    }

    fn track_mut(&mut self) -> &mut Track {
        match self {
            Self::Gpx(track) => track,
            Self::GeoJson(geojson) => geojson.track_mut(),
        }
    }

    /// Write in the format of `path`, which may differ from the input
    fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        match Format::detect(path)? {
            Format::Gpx => self.track().write_gpx(&mut writer)?,
            Format::GeoJson => {
                let text = match self {
                    Self::GeoJson(geojson) => geojson.to_string_pretty()?,
                    Self::Gpx(track) => serde_json::to_string_pretty(&track.to_geojson())?,
                };
                writer.write_all(text.as_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SmootherSummary {
    pub smoother: &'static str,
    pub removed: usize,
    pub passes: usize,
    pub converged: bool,
}

impl From<&SmoothReport> for SmootherSummary {
    fn from(report: &SmoothReport) -> Self {
        Self {
            smoother: report.smoother,
            removed: report.removed_count(),
            passes: report.passes,
            converged: report.converged,
        }
    }
}

/// What gets printed after a run
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub before: TrackStatistics,
    pub after: TrackStatistics,
    pub smoothers: Vec<SmootherSummary>,
}

pub fn run(settings: &Settings) -> Result<RunSummary> {
    // Fail on a bad output name before doing any work
    if let Some(output) = &settings.output {
        Format::detect(output)?;
    }

    let mut loaded = Loaded::read(&settings.input)?;
    let track = loaded.track_mut();
    track.register_default_properties()?;
    track.add_properties()?;
    let before = track.statistics();
    tracing::info!(
        "Loaded {} points from {}",
        before.points,
        settings.input.display()
    );

    let outcome = smooth_track(track, &settings.smoothing_config())?;
    let after = track.statistics();
    tracing::info!(
        "Removed {} points, {} remain",
        outcome.removed_count(),
        after.points
    );

    if let Some(output) = &settings.output {
        loaded.write(output)?;
        tracing::info!("Wrote {}", output.display());
    }

    Ok(RunSummary {
        input: settings.input.clone(),
        before,
        after,
        smoothers: outcome.reports.iter().map(SmootherSummary::from).collect(),
    })
}
