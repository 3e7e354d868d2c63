use thiserror::Error;

/// 8-bit grayscale buffer shared by everything that goes to or comes from a device: holograms
/// sent to the SLM surface and frames grabbed from the camera.
pub type Frame = image::GrayImage;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no monitor available to host the SLM surface")]
    NoMonitor,
    #[error("no camera attached")]
    NoCamera,
    #[error("display surface '{0}' has been closed")]
    SurfaceClosed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("window error: {0}")]
    Window(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
