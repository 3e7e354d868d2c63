#![warn(clippy::pedantic)]

use slm_sys::{DeviceError, Monitor, MonitorSource, Placement, WindowMode};
use tracing::{info, warn};

/// Window size used on the primary monitor when no SLM is connected.
pub const WINDOWED_FALLBACK: (u32, u32) = (1200, 900);

/// The SLM is expected to be the second monitor. With only one monitor the hologram goes into an
/// ordinary window on the primary instead, still computed at the primary's full resolution.
/// # Errors
/// `NoMonitor` if there is nothing to display on at all.
pub fn select_placement(monitors: &[Monitor]) -> Result<Placement, DeviceError> {
    match monitors {
        [] => Err(DeviceError::NoMonitor),
        [primary] => {
            warn!(
                monitor = %primary.name,
                "SLM not detected; connect and configure it as a SECONDARY monitor. Displaying in \
                 a window on the primary monitor instead"
            );
            Ok(Placement {
                x: primary.x,
                y: primary.y,
                width: primary.width,
                height: primary.height,
                mode: WindowMode::Windowed {
                    width: WINDOWED_FALLBACK.0,
                    height: WINDOWED_FALLBACK.1,
                },
            })
        }
        [_, slm, ..] => {
            info!(
                monitor = %slm.name,
                "secondary monitor set as SLM display ({}x{} at {}, {})",
                slm.width,
                slm.height,
                slm.x,
                slm.y
            );
            Ok(Placement {
                x: slm.x,
                y: slm.y,
                width: slm.width,
                height: slm.height,
                mode: WindowMode::Fullscreen,
            })
        }
    }
}

/// # Errors
/// See [`select_placement`].
pub fn select_from(source: &dyn MonitorSource) -> Result<Placement, DeviceError> {
    select_placement(&source.monitors())
}
