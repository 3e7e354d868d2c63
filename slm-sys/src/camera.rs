use crate::core::{DeviceResult, Frame};

/// A camera looking at the beam after the SLM. Grabbing blocks until a frame is available.
pub trait Camera {
    /// # Errors
    /// Returns the backend's failure; callers treat it as "no frame for this point".
    fn grab(&mut self) -> DeviceResult<Frame>;

    fn name(&self) -> &str {
        "camera"
    }
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn grab(&mut self) -> DeviceResult<Frame> {
        (**self).grab()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
