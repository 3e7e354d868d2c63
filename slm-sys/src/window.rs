use minifb::{Key, Window, WindowOptions};
use tracing::info;

use crate::core::{DeviceError, DeviceResult, Frame};
use crate::display::{DisplaySurface, Placement, WindowMode};

/// A real window on the desktop. Fullscreen placements get a borderless window covering the
/// whole monitor; Esc or closing the window requests a quit.
pub struct WindowSurface {
    name: String,
    window: Option<Window>,
    buffer: Vec<u32>,
}

impl WindowSurface {
    #[must_use]
    pub fn new(name: &str) -> Self {
        WindowSurface {
            name: name.to_string(),
            window: None,
            buffer: Vec::new(),
        }
    }
}

impl DisplaySurface for WindowSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, placement: &Placement) -> DeviceResult<()> {
        let (width, height, borderless) = match placement.mode {
            WindowMode::Fullscreen => (placement.width, placement.height, true),
            WindowMode::Windowed { width, height } => (width, height, false),
        };
        let mut window = Window::new(
            &self.name,
            width as usize,
            height as usize,
            WindowOptions {
                borderless,
                resize: !borderless,
                topmost: borderless,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| DeviceError::Window(e.to_string()))?;
        window.set_position(placement.x as isize, placement.y as isize);
        info!(
            surface = %self.name,
            x = placement.x,
            y = placement.y,
            "opened {}x{} window",
            width,
            height
        );
        self.window = Some(window);
        Ok(())
    }

    fn show(&mut self, image: &Frame) -> DeviceResult<()> {
        let window = self
            .window
            .as_mut()
            .ok_or_else(|| DeviceError::SurfaceClosed(self.name.clone()))?;
        self.buffer.clear();
        self.buffer.extend(image.pixels().map(|p| {
            let v = u32::from(p.0[0]);
            (v << 16) | (v << 8) | v
        }));
        window
            .update_with_buffer(&self.buffer, image.width() as usize, image.height() as usize)
            .map_err(|e| DeviceError::Window(e.to_string()))
    }

    fn quit_requested(&mut self) -> bool {
        match self.window.as_mut() {
            Some(window) => {
                window.update();
                !window.is_open() || window.is_key_down(Key::Escape)
            }
            None => true,
        }
    }

    fn is_interactive(&self) -> bool {
        true
    }

    fn close(&mut self) {
        self.window = None;
    }
}
