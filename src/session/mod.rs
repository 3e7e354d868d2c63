#![warn(clippy::pedantic)]
//! The running hologram session: everything the operator loop and the sweep need, owned in one
//! place and handed to whoever drives it.

use std::fmt;
use std::path::PathBuf;
use std::str::Split;
use std::time::Duration;

use slm_sys::{Camera, DeviceError, DisplaySurface, Frame, Monitor, Placement};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::configs::ConfigError;
use crate::hologram::{self, HologramImage, HologramParams, PanelGeometry};
use crate::params::{Field, ParameterStore, Profile};
use crate::placement;
use crate::preview::PreviewReport;
use crate::record::{self, RecordError, SweepRecord};
use crate::sweep::{SweepController, SweepError, SweepPlan};


#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
    #[error("failed to record sweep: {0}")]
    Record(#[from] RecordError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Gathered,
    Quit,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Running => write!(f, "running"),
            SessionState::Gathered => write!(f, "gathered"),
            SessionState::Quit => write!(f, "quit"),
        }
    }
}

/// What a session is opened with. `output_dir` of `None` keeps sweep results in memory only.
pub struct SessionSetup {
    pub profile: Profile,
    pub monitors: Vec<Monitor>,
    pub display: Box<dyn DisplaySurface>,
    pub camera: Option<Box<dyn Camera>>,
    pub settle_time: Duration,
    pub output_dir: Option<PathBuf>,
}

impl SessionSetup {
    #[must_use]
    pub fn new(profile: Profile, monitors: Vec<Monitor>, display: Box<dyn DisplaySurface>) -> Self {
        SessionSetup {
            profile,
            monitors,
            display,
            camera: None,
            settle_time: Duration::ZERO,
            output_dir: None,
        }
    }

    #[must_use]
    pub fn camera(mut self, camera: Box<dyn Camera>) -> Self {
        self.camera = Some(camera);
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }
}

pub struct Session {
    geometry: PanelGeometry,
    placement: Placement,
    store: ParameterStore,
    display: Box<dyn DisplaySurface>,
    camera: Option<Box<dyn Camera>>,
    sweep: SweepController,
    output_dir: Option<PathBuf>,
    last_image: Option<HologramImage>,
    regenerations: u64,
    state: SessionState,
}

impl Session {
    /// Pick the SLM monitor and bring the display surface up on it. Nothing is shown until the
    /// first [`refresh`](Self::refresh).
    /// # Errors
    /// `NoMonitor` when no monitor is known, or whatever the surface reports while configuring.
    pub fn new(setup: SessionSetup) -> Result<Self, SessionError> {
        let placement = placement::select_placement(&setup.monitors)?;
        let mut surface = setup.display;
        surface.configure(&placement)?;
        let geometry = PanelGeometry::from(&placement);
        info!(
            surface = surface.name(),
            profile = %setup.profile,
            width = geometry.width,
            height = geometry.height,
            "session opened"
        );
        let mut store = ParameterStore::new(setup.profile);
        store.mark_dirty();
        Ok(Session {
            geometry,
            placement,
            store,
            display: surface,
            camera: setup.camera,
            sweep: SweepController::new().with_settle_time(setup.settle_time),
            output_dir: setup.output_dir,
            last_image: None,
            regenerations: 0,
            state: SessionState::Running,
        })
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    #[inline]
    #[must_use]
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> HologramParams {
        self.store.get_current()
    }

    #[inline]
    #[must_use]
    pub fn last_image(&self) -> Option<&HologramImage> {
        self.last_image.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    #[inline]
    #[must_use]
    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// Whether the surface stays up for the operator to look at, as opposed to writing files.
    #[inline]
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.display.is_interactive()
    }

    pub fn commit(&mut self, field: Field, raw: &str) -> i32 {
        self.store.commit(field, raw)
    }

    /// Regenerate and show the hologram if any parameter changed since the last call. Returns
    /// the new image, or `None` when nothing was due.
    /// # Errors
    /// Propagates display failures.
    pub fn refresh(&mut self) -> Result<Option<&HologramImage>, SessionError> {
        if self.state != SessionState::Running || !self.store.take_dirty() {
            return Ok(None);
        }
        let params = self.store.get_current();
        let image = hologram::generate(&params, self.geometry);
        self.display.show(&image)?;
        self.regenerations += 1;
        debug!(
            l = params.l,
            nx = params.nx,
            ny = params.ny,
            x0 = params.x0,
            y0 = params.y0,
            regenerations = self.regenerations,
            "hologram regenerated"
        );
        self.last_image = Some(image);
        Ok(self.last_image.as_ref())
    }

    /// Bring the display up to date and grab one camera frame of the result. Returns `None` when
    /// there is no camera or the grab failed.
    /// # Errors
    /// Propagates display failures.
    pub fn preview(&mut self) -> Result<Option<PreviewReport>, SessionError> {
        self.refresh()?;
        let Some(camera) = self.camera.as_mut() else {
            info!("no camera attached; preview disabled");
            return Ok(None);
        };
        let HologramParams { x0, y0, .. } = self.store.get_current();
        let Some(frame) = grab_frame(&mut **camera, x0, y0) else {
            return Ok(None);
        };
        let report = PreviewReport::new(frame);
        if report.is_saturated() {
            warn!(
                pixels = report.saturated_pixels,
                "several pixels capped at 255 brightness"
            );
        }
        Ok(Some(report))
    }

    /// Run the session's one sweep, capturing a frame per point from the attached camera.
    /// Returns the number of points visited.
    /// # Errors
    /// See [`gather_with`](Self::gather_with).
    pub fn gather(&mut self) -> Result<usize, SessionError> {
        let mut camera = self.camera.take();
        if camera.is_none() {
            info!("no camera attached; sweep will run without capturing frames");
        }
        let result = self.gather_with(|x0, y0| {
            camera
                .as_mut()
                .and_then(|camera| grab_frame(&mut **camera, x0, y0))
        });
        self.camera = camera;
        result
    }

    /// Run the session's one sweep with the current parameters, asking `on_point` for the frame
    /// at each offset. With an output directory, frames and a manifest are written to a fresh
    /// `sweep_<timestamp>` directory under it.
    /// # Errors
    /// `AlreadyStarted` on any call after the first, and display or record failures during the
    /// run.
    pub fn gather_with<F>(&mut self, on_point: F) -> Result<usize, SessionError>
    where
        F: FnMut(i32, i32) -> Option<Frame>,
    {
        let params = self.store.get_current();
        let (x, y) = (self.store.x_range(), self.store.y_range());
        let run = self.sweep.run_sweep(
            x,
            y,
            params,
            self.geometry,
            &mut *self.display,
            on_point,
        )?;
        self.state = SessionState::Gathered;

        let dir = match &self.output_dir {
            Some(base) => Some(record::sweep_dir(base)?),
            None => None,
        };
        let mut record = SweepRecord::new(params, self.geometry, SweepPlan::new(x, y));
        let mut visited = 0;
        for point in run {
            let point = point?;
            if let Some(dir) = &dir {
                record.push(&point, dir)?;
            }
            visited += 1;
        }
        if let Some(dir) = &dir {
            record.save(dir)?;
        }
        info!(points = visited, "data gathering complete");
        Ok(visited)
    }

    /// Close the display surface. Later calls do nothing.
    pub fn quit(&mut self) {
        if self.state == SessionState::Quit {
            return;
        }
        self.display.close();
        self.state = SessionState::Quit;
        info!(regenerations = self.regenerations, "session closed");
    }

    /// Quit if the surface asked for it (Esc, window closed). Returns whether the session is over.
    pub fn poll_quit(&mut self) -> bool {
        if self.state != SessionState::Quit && self.display.quit_requested() {
            info!("quit requested from display surface");
            self.quit();
        }
        self.state == SessionState::Quit
    }

    #[must_use]
    pub fn status(&self) -> String {
        let params = self.store.get_current();
        format!(
            "profile={} state={} l={} nx={} ny={} x0={} y0={} regenerations={} camera={}",
            self.store.profile(),
            self.state,
            params.l,
            params.nx,
            params.ny,
            params.x0,
            params.y0,
            self.regenerations,
            self.has_camera()
        )
    }

    /// Handle one operator command. Returns the reply for the sender.
    /// # Errors
    /// Returns `Err(())` if `cmd` is not a valid command.
    pub fn process_command(&mut self, cmd: Split<'_, char>) -> Result<String, ()> {
        match cmd.collect::<Vec<&str>>()[..] {
            ["PARAM", field, "SET", raw] => {
                let field = Field::from_command_name(field).ok_or(())?;
                Ok(self.commit(field, raw).to_string())
            }
            ["PARAM", field, "GET"] => {
                let field = Field::from_command_name(field).ok_or(())?;
                Ok(self.store.get(field).to_string())
            }
            ["PREVIEW"] => Ok(match self.preview() {
                Ok(Some(report)) if report.is_saturated() => {
                    format!("SATURATED:{}", report.saturated_pixels)
                }
                Ok(Some(report)) => format!("OK:{}", report.saturated_pixels),
                Ok(None) => "NO_CAMERA".to_string(),
                Err(e) => {
                    warn!("preview failed: {e}");
                    format!("ERROR:{e}")
                }
            }),
            ["GATHER"] => Ok(match self.gather() {
                Ok(points) => points.to_string(),
                Err(e) => {
                    warn!("sweep failed: {e}");
                    format!("ERROR:{e}")
                }
            }),
            ["STATUS"] => Ok(self.status()),
            ["QUIT"] => {
                self.quit();
                Ok(SessionState::Quit.to_string())
            }
            _ => Err(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.quit();
    }
}

fn grab_frame(camera: &mut dyn Camera, x0: i32, y0: i32) -> Option<Frame> {
    match camera.grab() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(x0, y0, camera = camera.name(), "camera grab failed: {e}");
            None
        }
    }
}
