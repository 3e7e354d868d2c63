pub mod communications;
pub mod configs;
pub mod hologram;
pub mod params;
pub mod placement;
pub mod preview;
pub mod record;
pub mod session;
pub mod sweep;
pub mod util;
