#![warn(clippy::pedantic)]
//! On-disk record of a finished sweep: one PNG per captured frame plus a TOML manifest listing
//! every visited offset.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use gethostname::gethostname;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::hologram::{HologramParams, PanelGeometry};
use crate::sweep::{SweepPlan, SweepPoint};

pub const MANIFEST_NAME: &str = "sweep.toml";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to save frame: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to serialize sweep record: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to parse sweep record: {0}")]
    Deserialize(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedPoint {
    pub x0: i32,
    pub y0: i32,
    /// file name relative to the record directory; absent when nothing was captured
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub hostname: String,
    pub started: String,
    pub geometry: PanelGeometry,
    pub params: HologramParams,
    pub plan: SweepPlan,
    pub points: Vec<RecordedPoint>,
}

impl SweepRecord {
    #[must_use]
    pub fn new(params: HologramParams, geometry: PanelGeometry, plan: SweepPlan) -> Self {
        SweepRecord {
            hostname: gethostname().to_string_lossy().into_owned(),
            started: Local::now().to_rfc3339(),
            geometry,
            params,
            plan,
            points: Vec::with_capacity(plan.len()),
        }
    }

    #[must_use]
    pub fn frame_name(x0: i32, y0: i32) -> String {
        format!("frame_x{x0:+05}_y{y0:+05}.png")
    }

    /// Save the point's frame (if any) into `dir` and append it to the record.
    /// # Errors
    /// Propagates failures writing the frame.
    pub fn push(&mut self, point: &SweepPoint, dir: &Path) -> Result<(), RecordError> {
        let frame = match &point.frame {
            Some(frame) => {
                let name = Self::frame_name(point.x0, point.y0);
                frame.save(dir.join(&name))?;
                Some(name)
            }
            None => None,
        };
        self.points.push(RecordedPoint {
            x0: point.x0,
            y0: point.y0,
            frame,
        });
        Ok(())
    }

    /// # Errors
    /// Propagates serialization and write failures.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, RecordError> {
        let path = dir.join(MANIFEST_NAME);
        fs::write(&path, toml::to_string_pretty(self)?)?;
        info!(path = %path.display(), points = self.points.len(), "wrote sweep record");
        Ok(path)
    }

    /// # Errors
    /// Propagates read and parse failures.
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }
}

/// A fresh, timestamped directory under `base` for one sweep's output.
/// # Errors
/// Fails if the directory cannot be created.
pub fn sweep_dir(base: &Path) -> Result<PathBuf, RecordError> {
    let dir = base.join(format!("sweep_{}", Local::now().format("%Y%m%d_%H%M%S")));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
