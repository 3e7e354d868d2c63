/// One physical output as reported by the windowing layer. `x`, `y` are the origin of the
/// monitor on the virtual desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Monitor {
    #[must_use]
    pub fn new(name: &str, x: i32, y: i32, width: u32, height: u32) -> Self {
        Monitor {
            name: name.to_string(),
            x,
            y,
            width,
            height,
        }
    }
}

/// Queried once at startup. The first entry is the primary monitor.
pub trait MonitorSource {
    fn monitors(&self) -> Vec<Monitor>;
}

/// Monitors declared up front (from the config file, or by a test).
#[derive(Debug, Clone, Default)]
pub struct ConfiguredMonitors {
    monitors: Vec<Monitor>,
}

impl ConfiguredMonitors {
    #[must_use]
    pub fn new(monitors: Vec<Monitor>) -> Self {
        ConfiguredMonitors { monitors }
    }

    pub fn push(&mut self, monitor: Monitor) -> &mut Self {
        self.monitors.push(monitor);
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl MonitorSource for ConfiguredMonitors {
    fn monitors(&self) -> Vec<Monitor> {
        self.monitors.clone()
    }
}
