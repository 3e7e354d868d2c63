use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::{DeviceError, DeviceResult, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Fullscreen,
    /// Ordinary resizable window of the given size, used when no dedicated SLM monitor exists.
    Windowed { width: u32, height: u32 },
}

/// Where a surface lives on the desktop and how large the panel behind it is. `width` and
/// `height` are always the panel's, even for a window that is smaller on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub mode: WindowMode,
}

impl Placement {
    #[inline]
    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        matches!(self.mode, WindowMode::Fullscreen)
    }
}

/// Output surface for holograms. Exactly one writer owns a surface at a time.
pub trait DisplaySurface {
    fn name(&self) -> &str;

    /// Move the surface onto its monitor and size it.
    /// # Errors
    /// Returns the backend failure if the surface could not be opened.
    fn configure(&mut self, placement: &Placement) -> DeviceResult<()>;

    /// # Errors
    /// `SurfaceClosed` after `close`; otherwise the backend failure.
    fn show(&mut self, image: &Frame) -> DeviceResult<()>;

    /// True once the operator asked to quit through the surface itself (quit key, closed window).
    fn quit_requested(&mut self) -> bool {
        false
    }

    /// Whether an operator can see and interact with the surface. Non-interactive surfaces never
    /// request a quit, so callers must not wait on them.
    fn is_interactive(&self) -> bool {
        false
    }

    fn close(&mut self);
}

impl<S: DisplaySurface + ?Sized> DisplaySurface for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn configure(&mut self, placement: &Placement) -> DeviceResult<()> {
        (**self).configure(placement)
    }
    fn show(&mut self, image: &Frame) -> DeviceResult<()> {
        (**self).show(image)
    }
    fn quit_requested(&mut self) -> bool {
        (**self).quit_requested()
    }
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }
    fn close(&mut self) {
        (**self).close();
    }
}

/// Writes every shown image as a PNG. With history enabled each image gets its own numbered
/// file, otherwise `<name>.png` is overwritten in place.
#[derive(Debug)]
pub struct FileSurface {
    name: String,
    dir: PathBuf,
    keep_history: bool,
    counter: u64,
    last_path: Option<PathBuf>,
    placement: Option<Placement>,
    closed: bool,
}

impl FileSurface {
    /// # Errors
    /// Fails if the output directory cannot be created.
    pub fn new(name: &str, dir: &Path) -> DeviceResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(FileSurface {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            keep_history: false,
            counter: 0,
            last_path: None,
            placement: None,
            closed: false,
        })
    }

    #[must_use]
    pub fn keep_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }

    #[inline]
    #[must_use]
    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn images_written(&self) -> u64 {
        self.counter
    }

    #[inline]
    #[must_use]
    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    fn next_path(&self) -> PathBuf {
        if self.keep_history {
            self.dir.join(format!("{}_{:05}.png", self.name, self.counter))
        } else {
            self.dir.join(format!("{}.png", self.name))
        }
    }
}

impl DisplaySurface for FileSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, placement: &Placement) -> DeviceResult<()> {
        info!(
            surface = %self.name,
            dir = %self.dir.display(),
            "file surface standing in for a {}x{} panel",
            placement.width,
            placement.height
        );
        self.placement = Some(*placement);
        Ok(())
    }

    fn show(&mut self, image: &Frame) -> DeviceResult<()> {
        if self.closed {
            return Err(DeviceError::SurfaceClosed(self.name.clone()));
        }
        let path = self.next_path();
        image.save(&path)?;
        debug!(path = %path.display(), "wrote hologram");
        self.counter += 1;
        self.last_path = Some(path);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("slm-sys-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn file_surface_overwrites_without_history() {
        let dir = scratch_dir("overwrite");
        let mut surface = FileSurface::new("SLM", &dir).expect("should create dir");
        let image = Frame::from_pixel(4, 3, image::Luma([7]));
        surface.show(&image).unwrap();
        surface.show(&image).unwrap();
        assert_eq!(surface.images_written(), 2);
        assert_eq!(surface.last_path(), Some(dir.join("SLM.png").as_path()));
        let back = image::open(dir.join("SLM.png")).unwrap().to_luma8();
        assert_eq!(back, image);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_surface_numbers_history() {
        let dir = scratch_dir("history");
        let mut surface = FileSurface::new("SLM", &dir).unwrap().keep_history(true);
        let image = Frame::new(2, 2);
        surface.show(&image).unwrap();
        surface.show(&image).unwrap();
        assert!(dir.join("SLM_00000.png").exists());
        assert!(dir.join("SLM_00001.png").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn closed_surface_rejects_show() {
        let dir = scratch_dir("closed");
        let mut surface = FileSurface::new("SLM", &dir).unwrap();
        surface.close();
        assert!(matches!(
            surface.show(&Frame::new(1, 1)),
            Err(DeviceError::SurfaceClosed(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
