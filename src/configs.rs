#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::missing_errors_doc
)]

use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use gethostname::gethostname;
use slm_sys::mock::{self, RecordingSurface, SyntheticCamera};
use slm_sys::{Camera, DeviceError, DisplaySurface, FileSurface, Monitor};
use thiserror::Error;
use tracing::{info, warn};

use crate::params::Profile;
use crate::session::SessionSetup;
use crate::util::{tomlget, tomlget_opt, tomlget_or};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Key(String),
    #[error("failed to open device: {0}")]
    Device(#[from] DeviceError),
}

impl From<String> for ConfigError {
    fn from(msg: String) -> Self {
        ConfigError::Key(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayBackend {
    File,
    Window,
    Mock,
}

impl FromStr for DisplayBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(DisplayBackend::File),
            "window" => Ok(DisplayBackend::Window),
            "mock" => Ok(DisplayBackend::Mock),
            other => Err(format!("unknown display backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraBackend {
    None,
    Synthetic,
}

impl FromStr for CameraBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CameraBackend::None),
            "synthetic" => Ok(CameraBackend::Synthetic),
            other => Err(format!("unknown camera backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub backend: DisplayBackend,
    pub name: String,
    pub keep_history: bool,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    pub width: u32,
    pub height: u32,
    pub peak: f32,
    pub noise: f32,
}

#[derive(Debug, Clone)]
pub struct SlmConfig {
    pub profile: Profile,
    pub tick: Duration,
    pub command_port: u16,
    pub logs_port: u16,
    pub publish_every: u32,
    pub output_dir: PathBuf,
    pub settle_time: Duration,
    pub display: DisplayConfig,
    pub camera: CameraConfig,
    pub monitors: Vec<Monitor>,
}

pub fn load(path: &Path) -> Result<toml::Value, ConfigError> {
    let cfg_text = read_to_string(path)?;
    Ok(toml::from_str(&cfg_text)?)
}

#[must_use]
pub fn empty() -> toml::Value {
    toml::Value::Table(toml::Table::new())
}

fn hostname() -> String {
    gethostname().to_string_lossy().into_owned()
}

/// `[general] profile`, overridden by `profile` in this host's own section.
#[must_use]
pub fn profile_from_config(cfg: &toml::Value) -> Profile {
    let host = hostname();
    let name = tomlget_opt!(cfg, host.as_str(), "profile", as_str)
        .unwrap_or_else(|| tomlget_or!(cfg, "general", "profile", as_str, "interactive"));
    name.parse().unwrap_or_else(|e| {
        warn!("{e}; proceeding with the interactive profile");
        Profile::Interactive
    })
}

#[must_use]
pub fn display_config_from_config(cfg: &toml::Value) -> DisplayConfig {
    let host = hostname();
    let backend = tomlget_opt!(cfg, host.as_str(), "display_backend", as_str)
        .unwrap_or_else(|| tomlget_or!(cfg, "display", "backend", as_str, "file"));
    DisplayConfig {
        backend: backend.parse().unwrap_or_else(|e| {
            warn!("{e}; proceeding with the file backend");
            DisplayBackend::File
        }),
        name: tomlget_or!(cfg, "display", "name", as_str, "SLM").to_string(),
        keep_history: tomlget_or!(cfg, "display", "keep_history", as_bool, false),
    }
}

#[must_use]
pub fn camera_config_from_config(cfg: &toml::Value) -> CameraConfig {
    let backend = tomlget_or!(cfg, "camera", "backend", as_str, "none");
    CameraConfig {
        backend: backend.parse().unwrap_or_else(|e| {
            warn!("{e}; proceeding without a camera");
            CameraBackend::None
        }),
        width: unsigned_or(cfg, "camera", "width", 640_u32),
        height: unsigned_or(cfg, "camera", "height", 480_u32),
        peak: tomlget_or!(cfg, "camera", "peak", as_float, f32, 200.0),
        noise: tomlget_or!(cfg, "camera", "noise", as_float, f32, 2.0),
    }
}

/// Integer `section:key` that must fit `T`; anything out of range falls back to `or`.
fn unsigned_or<T>(cfg: &toml::Value, section: &str, key: &str, or: T) -> T
where
    T: TryFrom<i64> + Into<i64> + Copy + std::fmt::Debug,
{
    let fallback: i64 = or.into();
    let raw = tomlget_or!(cfg, section, key, as_integer, i64, fallback);
    T::try_from(raw).unwrap_or_else(|_| {
        warn!("{section}:{key} = {raw} is out of range; proceeding with default {or:?}");
        or
    })
}

fn monitor_size(monitor: &toml::Value, key: &str) -> Result<u32, ConfigError> {
    let raw = tomlget!(monitor, key, as_integer, i64);
    u32::try_from(raw)
        .ok()
        .filter(|&size| size > 0)
        .ok_or_else(|| ConfigError::Key(format!("monitor {key} must be positive, got {raw}")))
}

fn monitor_origin(monitor: &toml::Value, key: &str) -> Result<i32, ConfigError> {
    let raw = monitor.get(key).and_then(toml::Value::as_integer).unwrap_or(0);
    i32::try_from(raw)
        .map_err(|_| ConfigError::Key(format!("monitor {key} = {raw} is out of range")))
}

/// Monitors from `[[monitors]]`, primary first. Each entry needs `width` and `height`; `x`, `y`
/// default to the desktop origin.
pub fn monitors_from_config(cfg: &toml::Value) -> Result<Vec<Monitor>, ConfigError> {
    let Some(entries) = cfg.get("monitors").and_then(toml::Value::as_array) else {
        warn!("no [[monitors]] declared in config; assuming a single 1920x1080 primary monitor");
        return Ok(vec![Monitor::new("primary", 0, 0, 1920, 1080)]);
    };
    entries
        .iter()
        .enumerate()
        .map(|(i, monitor)| -> Result<Monitor, ConfigError> {
            Ok(Monitor {
                name: monitor
                    .get("name")
                    .and_then(toml::Value::as_str)
                    .map_or_else(|| format!("monitor{i}"), str::to_string),
                x: monitor_origin(monitor, "x")?,
                y: monitor_origin(monitor, "y")?,
                width: monitor_size(monitor, "width")?,
                height: monitor_size(monitor, "height")?,
            })
        })
        .collect()
}

pub fn slm_from_config(cfg: &toml::Value) -> Result<SlmConfig, ConfigError> {
    Ok(SlmConfig {
        profile: profile_from_config(cfg),
        tick: Duration::from_millis(u64::from(unsigned_or(cfg, "general", "tick_ms", 30_u32))),
        command_port: unsigned_or(cfg, "general", "command_port", 8081_u16),
        logs_port: unsigned_or(cfg, "general", "logs_port", 8080_u16),
        publish_every: unsigned_or(cfg, "general", "publish_every", 1_u32),
        output_dir: PathBuf::from(tomlget_or!(cfg, "general", "output_dir", as_str, "slm_output")),
        settle_time: Duration::from_millis(u64::from(unsigned_or(
            cfg,
            "sweep",
            "settle_time_ms",
            0_u32,
        ))),
        display: display_config_from_config(cfg),
        camera: camera_config_from_config(cfg),
        monitors: monitors_from_config(cfg)?,
    })
}

pub fn display_from_config(
    display: &DisplayConfig,
    output_dir: &Path,
) -> Result<Box<dyn DisplaySurface>, ConfigError> {
    match display.backend {
        DisplayBackend::File => Ok(Box::new(
            FileSurface::new(&display.name, &output_dir.join("surface"))?
                .keep_history(display.keep_history),
        )),
        DisplayBackend::Mock => {
            mock::mock_init();
            Ok(Box::new(RecordingSurface::new(&display.name)))
        }
        DisplayBackend::Window => window_surface(display, output_dir),
    }
}

#[cfg(feature = "window")]
fn window_surface(
    display: &DisplayConfig,
    _output_dir: &Path,
) -> Result<Box<dyn DisplaySurface>, ConfigError> {
    Ok(Box::new(slm_sys::window::WindowSurface::new(&display.name)))
}

#[cfg(not(feature = "window"))]
fn window_surface(
    display: &DisplayConfig,
    output_dir: &Path,
) -> Result<Box<dyn DisplaySurface>, ConfigError> {
    warn!("built without the `window` feature; writing holograms to files instead");
    display_from_config(
        &DisplayConfig {
            backend: DisplayBackend::File,
            ..display.clone()
        },
        output_dir,
    )
}

#[must_use]
pub fn camera_from_config(camera: &CameraConfig) -> Option<Box<dyn Camera>> {
    match camera.backend {
        CameraBackend::None => {
            info!("no camera configured; preview and frame capture disabled");
            None
        }
        CameraBackend::Synthetic => Some(Box::new(
            SyntheticCamera::new(camera.width, camera.height)
                .peak(camera.peak)
                .noise(camera.noise),
        )),
    }
}

pub fn session_setup(config: &SlmConfig) -> Result<SessionSetup, ConfigError> {
    Ok(SessionSetup {
        profile: config.profile,
        monitors: config.monitors.clone(),
        display: display_from_config(&config.display, &config.output_dir)?,
        camera: camera_from_config(&config.camera),
        settle_time: config.settle_time,
        output_dir: Some(config.output_dir.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[general]
profile = "gather"
tick_ms = 50
command_port = 9001
logs_port = 9000
output_dir = "/tmp/slm"

[display]
backend = "mock"
name = "hologram"

[camera]
backend = "synthetic"
width = 320
height = 240

[sweep]
settle_time_ms = 25

[[monitors]]
name = "desk"
width = 2560
height = 1440

[[monitors]]
name = "pluto"
x = 2560
width = 1920
height = 1080
"#;

    #[test]
    fn full_config() {
        let cfg: toml::Value = toml::from_str(FULL).unwrap();
        let settings = slm_from_config(&cfg).unwrap();
        assert_eq!(settings.profile, Profile::Gather);
        assert_eq!(settings.tick, Duration::from_millis(50));
        assert_eq!(settings.command_port, 9001);
        assert_eq!(settings.logs_port, 9000);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/slm"));
        assert_eq!(settings.settle_time, Duration::from_millis(25));
        assert_eq!(settings.display.backend, DisplayBackend::Mock);
        assert_eq!(settings.display.name, "hologram");
        assert_eq!(settings.camera.backend, CameraBackend::Synthetic);
        assert_eq!((settings.camera.width, settings.camera.height), (320, 240));
        assert_eq!(
            settings.monitors,
            vec![
                Monitor::new("desk", 0, 0, 2560, 1440),
                Monitor::new("pluto", 2560, 0, 1920, 1080)
            ]
        );
    }

    #[test]
    fn missing_keys_use_defaults() {
        let settings = slm_from_config(&empty()).unwrap();
        assert_eq!(settings.profile, Profile::Interactive);
        assert_eq!(settings.tick, Duration::from_millis(30));
        assert_eq!(settings.command_port, 8081);
        assert_eq!(settings.logs_port, 8080);
        assert_eq!(settings.publish_every, 1);
        assert_eq!(settings.display.backend, DisplayBackend::File);
        assert_eq!(settings.camera.backend, CameraBackend::None);
        assert_eq!(settings.monitors.len(), 1);
        assert!(settings.settle_time.is_zero());
    }

    #[test]
    fn wrongly_typed_and_unknown_values_fall_back() {
        let cfg: toml::Value = toml::from_str(
            r#"
[general]
tick_ms = "fast"
profile = "calibrate"

[display]
backend = "hdmi"
"#,
        )
        .unwrap();
        let settings = slm_from_config(&cfg).unwrap();
        assert_eq!(settings.tick, Duration::from_millis(30));
        assert_eq!(settings.profile, Profile::Interactive);
        assert_eq!(settings.display.backend, DisplayBackend::File);
    }

    #[test]
    fn monitor_without_size_is_an_error() {
        let cfg: toml::Value = toml::from_str("[[monitors]]\nname = \"slm\"\nwidth = 800\n").unwrap();
        let err = monitors_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("height"));
    }

    #[test]
    fn monitor_with_nonpositive_size_is_an_error() {
        let cfg: toml::Value =
            toml::from_str("[[monitors]]\nwidth = -1\nheight = 1080\n").unwrap();
        let err = monitors_from_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Key(_)));
        assert!(err.to_string().contains("width"));

        let cfg: toml::Value = toml::from_str("[[monitors]]\nwidth = 800\nheight = 0\n").unwrap();
        assert!(monitors_from_config(&cfg).is_err());

        let cfg: toml::Value =
            toml::from_str("[[monitors]]\nwidth = 800\nheight = 600\nx = 9999999999\n").unwrap();
        assert!(monitors_from_config(&cfg).is_err());
    }

    #[test]
    fn out_of_range_integers_fall_back() {
        let cfg: toml::Value = toml::from_str(
            r#"
[general]
command_port = 70000
logs_port = -1
tick_ms = -5
publish_every = 4

[camera]
width = -640
"#,
        )
        .unwrap();
        let settings = slm_from_config(&cfg).unwrap();
        assert_eq!(settings.command_port, 8081);
        assert_eq!(settings.logs_port, 8080);
        assert_eq!(settings.tick, Duration::from_millis(30));
        assert_eq!(settings.publish_every, 4);
        assert_eq!(settings.camera.width, 640);
    }

    #[test]
    fn no_camera_backend() {
        let camera = camera_config_from_config(&empty());
        assert!(camera_from_config(&camera).is_none());
    }
}
