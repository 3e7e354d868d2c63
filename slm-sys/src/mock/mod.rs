//! Stand-in devices for running without an SLM or camera attached, and for tests.

macro_rules! mock_call {
    ($device:expr, $call:literal $(, $arg:ident)* $(,)?) => {{
        let args: Vec<String> = vec![$(format!(concat!(stringify!($arg), " = {:?}"), $arg)),*];
        if cfg!(feature = "mock_loud") {
            tracing::info!(
                "[{:.3}] {} {} ({})",
                START_TIME.elapsed().as_secs_f32(),
                $device,
                $call,
                args.join(", ")
            );
        } else {
            tracing::trace!(
                "[{:.3}] {} {} ({})",
                START_TIME.elapsed().as_secs_f32(),
                $device,
                $call,
                args.join(", ")
            );
        }
    }};
}

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use lazy_static::lazy_static;
use rand::Rng;

use crate::camera::Camera;
use crate::core::{DeviceError, DeviceResult, Frame};
use crate::display::{DisplaySurface, Placement};

lazy_static! {
    static ref START_TIME: Instant = Instant::now();
}

pub fn mock_init() {
    lazy_static::initialize(&START_TIME);
    tracing::info!("mock devices initialized");
}

/// Everything a `RecordingSurface` has been asked to do.
#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub placement: Option<Placement>,
    pub shown: Vec<Frame>,
    pub calls: Vec<String>,
    pub closed: bool,
}

/// In-memory surface. Clones share one log, so a test can keep a handle while the session owns
/// the surface.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    name: String,
    log: Rc<RefCell<SurfaceLog>>,
    quit_after: Option<usize>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new(name: &str) -> Self {
        RecordingSurface {
            name: name.to_string(),
            log: Rc::new(RefCell::new(SurfaceLog::default())),
            quit_after: None,
        }
    }

    /// Request a quit once `shows` images have been displayed, like an operator pressing the quit
    /// key.
    #[must_use]
    pub fn quit_after(mut self, shows: usize) -> Self {
        self.quit_after = Some(shows);
        self
    }

    #[must_use]
    pub fn shown_count(&self) -> usize {
        self.log.borrow().shown.len()
    }

    #[must_use]
    pub fn last_shown(&self) -> Option<Frame> {
        self.log.borrow().shown.last().cloned()
    }

    #[must_use]
    pub fn placement(&self) -> Option<Placement> {
        self.log.borrow().placement
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.log.borrow().closed
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().calls.clone()
    }
}

impl DisplaySurface for RecordingSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, placement: &Placement) -> DeviceResult<()> {
        let (x, y, mode) = (placement.x, placement.y, placement.mode);
        mock_call!(self.name, "configure", x, y, mode);
        let mut log = self.log.borrow_mut();
        log.placement = Some(*placement);
        log.calls.push("configure".to_string());
        Ok(())
    }

    fn show(&mut self, image: &Frame) -> DeviceResult<()> {
        let (width, height) = image.dimensions();
        mock_call!(self.name, "show", width, height);
        let mut log = self.log.borrow_mut();
        if log.closed {
            return Err(DeviceError::SurfaceClosed(self.name.clone()));
        }
        log.shown.push(image.clone());
        log.calls.push("show".to_string());
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.quit_after
            .map_or(false, |limit| self.log.borrow().shown.len() >= limit)
    }

    fn close(&mut self) {
        mock_call!(self.name, "close");
        let mut log = self.log.borrow_mut();
        log.closed = true;
        log.calls.push("close".to_string());
    }
}

/// Renders a Gaussian spot with uniform noise, roughly what the camera sees of a well-aligned
/// first-order beam.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    peak: f32,
    sigma_px: f32,
    noise: f32,
    grabs: usize,
    fail: bool,
}

impl SyntheticCamera {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        SyntheticCamera {
            width,
            height,
            peak: 200.0,
            sigma_px: (width.min(height) as f32 / 10.0).max(1.0),
            noise: 0.0,
            grabs: 0,
            fail: false,
        }
    }

    #[must_use]
    pub fn peak(mut self, peak: f32) -> Self {
        self.peak = peak;
        self
    }

    #[must_use]
    pub fn noise(mut self, noise: f32) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    #[must_use]
    pub fn sigma_px(mut self, sigma: f32) -> Self {
        self.sigma_px = sigma.max(f32::EPSILON);
        self
    }

    /// Every subsequent grab fails, as if the camera had been unplugged.
    pub fn unplug(&mut self) {
        self.fail = true;
    }

    #[inline]
    #[must_use]
    pub fn grabs(&self) -> usize {
        self.grabs
    }
}

impl Camera for SyntheticCamera {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn grab(&mut self) -> DeviceResult<Frame> {
        let (width, height) = (self.width, self.height);
        mock_call!("camera", "grab", width, height);
        if self.fail {
            return Err(DeviceError::NoCamera);
        }
        self.grabs += 1;
        let cx = self.width as f32 / 2.0;
        let cy = self.height as f32 / 2.0;
        let two_sigma_sq = 2.0 * self.sigma_px * self.sigma_px;
        let mut rng = rand::thread_rng();
        let noise = self.noise;
        Ok(Frame::from_fn(self.width, self.height, |x, y| {
            let r2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
            let mut value = self.peak * (-r2 / two_sigma_sq).exp();
            if noise > 0.0 {
                value += rng.gen_range(-noise..noise);
            }
            image::Luma([value.clamp(0.0, 255.0) as u8])
        }))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
