#![warn(clippy::pedantic)]
#![warn(clippy::all)]

pub mod camera;
pub mod core;
pub mod display;
pub mod mock;
pub mod monitor;
#[cfg(feature = "window")]
pub mod window;

pub use self::core::{DeviceError, DeviceResult, Frame};
pub use camera::Camera;
pub use display::{DisplaySurface, FileSurface, Placement, WindowMode};
pub use monitor::{ConfiguredMonitors, Monitor, MonitorSource};
