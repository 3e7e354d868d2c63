#![warn(clippy::pedantic)]
//! Rastering the vortex centre over a grid of offsets.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slm_sys::{DeviceError, DisplaySurface, Frame};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::hologram::{self, HologramParams, PanelGeometry};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("data gathering has already begun for this session")]
    AlreadyStarted,
    #[error("sweep step must be nonzero")]
    ZeroStep,
    #[error("device failure during sweep: {0}")]
    Device(#[from] DeviceError),
}

/// Inclusive range of offsets along one axis.
///
/// `start == stop` visits exactly that one offset, whichever way `step` points. A step that
/// points away from `stop` visits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRange {
    start: i32,
    stop: i32,
    step: i32,
}

impl SweepRange {
    /// # Errors
    /// `ZeroStep` if `step` is zero.
    pub fn new(start: i32, stop: i32, step: i32) -> Result<Self, SweepError> {
        if step == 0 {
            return Err(SweepError::ZeroStep);
        }
        Ok(SweepRange { start, stop, step })
    }

    #[must_use]
    pub fn single(at: i32) -> Self {
        SweepRange {
            start: at,
            stop: at,
            step: 1,
        }
    }

    // callers in this crate have already validated the step
    pub(crate) fn from_parts(start: i32, stop: i32, step: i32) -> Self {
        SweepRange { start, stop, step }
    }

    #[inline]
    #[must_use]
    pub fn start(&self) -> i32 {
        self.start
    }
    #[inline]
    #[must_use]
    pub fn stop(&self) -> i32 {
        self.stop
    }
    #[inline]
    #[must_use]
    pub fn step(&self) -> i32 {
        self.step
    }

    #[must_use]
    pub fn offsets(&self) -> Offsets {
        let forward = (self.step > 0 && self.start < self.stop)
            || (self.step < 0 && self.start > self.stop);
        Offsets {
            next: (self.start == self.stop || forward).then_some(self.start),
            stop: self.stop,
            step: self.step,
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn len(&self) -> usize {
        if self.start == self.stop {
            return 1;
        }
        let span = i64::from(self.stop) - i64::from(self.start);
        let step = i64::from(self.step);
        if step == 0 || span.signum() != step.signum() {
            0
        } else {
            (span / step) as usize + 1
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Offsets {
    next: Option<i32>,
    stop: i32,
    step: i32,
}

impl Iterator for Offsets {
    type Item = i32;
    fn next(&mut self) -> Option<i32> {
        let current = self.next?;
        let (step, stop) = (self.step, self.stop);
        // overflow ends the sequence rather than wrapping
        self.next = current.checked_add(step).filter(|&n| {
            if step > 0 {
                n <= stop
            } else {
                step < 0 && n >= stop
            }
        });
        Some(current)
    }
}

/// Both axes of a sweep. Iterates row-major: `y` is the slow axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPlan {
    pub x: SweepRange,
    pub y: SweepRange,
}

impl SweepPlan {
    #[must_use]
    pub fn new(x: SweepRange, y: SweepRange) -> Self {
        SweepPlan { x, y }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len() * self.y.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn iter(&self) -> PlanIter {
        let mut rows = self.y.offsets();
        let row = rows.next();
        PlanIter {
            x: self.x,
            rows,
            row,
            cols: self.x.offsets(),
        }
    }
}

impl IntoIterator for &SweepPlan {
    type Item = (i32, i32);
    type IntoIter = PlanIter;
    fn into_iter(self) -> PlanIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct PlanIter {
    x: SweepRange,
    rows: Offsets,
    row: Option<i32>,
    cols: Offsets,
}

impl Iterator for PlanIter {
    type Item = (i32, i32);
    fn next(&mut self) -> Option<(i32, i32)> {
        if self.x.is_empty() {
            return None;
        }
        loop {
            let y = self.row?;
            if let Some(x) = self.cols.next() {
                return Some((x, y));
            }
            self.row = self.rows.next();
            self.cols = self.x.offsets();
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepPoint {
    pub x0: i32,
    pub y0: i32,
    pub frame: Option<Frame>,
}

/// Owns the "gathering has begun" flag: a session gets exactly one sweep.
#[derive(Debug, Default)]
pub struct SweepController {
    started: bool,
    settle_time: Duration,
}

impl SweepController {
    #[must_use]
    pub fn new() -> Self {
        SweepController::default()
    }

    /// Pause between showing a hologram and calling the capture callback, for the SLM to settle.
    #[must_use]
    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    #[inline]
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Start the one sweep of this session. Nothing is generated until the returned run is
    /// iterated; each step regenerates `params` with the next offset, shows it and then asks
    /// `on_point` for a frame.
    /// # Errors
    /// `AlreadyStarted` if a sweep was started before, even if it never ran to completion.
    pub fn run_sweep<'a, F>(
        &mut self,
        x: SweepRange,
        y: SweepRange,
        params: HologramParams,
        geometry: PanelGeometry,
        display: &'a mut dyn DisplaySurface,
        on_point: F,
    ) -> Result<SweepRun<'a, F>, SweepError>
    where
        F: FnMut(i32, i32) -> Option<Frame>,
    {
        if self.started {
            warn!("sweep requested after data gathering had begun; ignoring");
            return Err(SweepError::AlreadyStarted);
        }
        self.started = true;
        let plan = SweepPlan::new(x, y);
        info!(points = plan.len(), "data gathering has begun");
        Ok(SweepRun {
            points: plan.iter(),
            params,
            geometry,
            display,
            on_point,
            settle_time: self.settle_time,
            failed: false,
        })
    }
}

pub struct SweepRun<'a, F> {
    points: PlanIter,
    params: HologramParams,
    geometry: PanelGeometry,
    display: &'a mut dyn DisplaySurface,
    on_point: F,
    settle_time: Duration,
    failed: bool,
}

impl<'a, F> Iterator for SweepRun<'a, F>
where
    F: FnMut(i32, i32) -> Option<Frame>,
{
    type Item = Result<SweepPoint, SweepError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (x0, y0) = self.points.next()?;
        let image = hologram::generate(&self.params.with_offset(x0, y0), self.geometry);
        if let Err(e) = self.display.show(&image) {
            // a dead surface ends the sweep
            self.failed = true;
            return Some(Err(e.into()));
        }
        if !self.settle_time.is_zero() {
            thread::sleep(self.settle_time);
        }
        let frame = (self.on_point)(x0, y0);
        debug!(x0, y0, captured = frame.is_some(), "sweep point");
        Some(Ok(SweepPoint { x0, y0, frame }))
    }
}
