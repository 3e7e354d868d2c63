#![warn(clippy::pedantic)]
#![warn(clippy::all)]

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use async_std::task;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use vortex_slm::communications::SlmComms;
use vortex_slm::configs::{self, SlmConfig};
use vortex_slm::params::Profile;
use vortex_slm::session::{Session, SessionState};
use vortex_slm::util::find_file;

#[derive(Parser, Debug)]
#[command(author, version, about = "Optical vortex hologram generator for a phase-only SLM")]
struct Args {
    /// Config file, looked up in the working directory and then next to the executable
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Operator profile, overriding the config file
    #[arg(short, long)]
    profile: Option<Profile>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Mode {
    /// Render the default hologram once and hold it until the surface is closed
    Show,
    /// Serve operator commands, keeping the hologram in step with them
    Interactive,
    /// Serve operator commands with the gather profile
    Gather {
        /// Run the sweep as soon as the session opens
        #[arg(long)]
        now: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let cfg = if let Some(path) = find_file(&args.config) {
        info!("reading config file {}", path.display());
        configs::load(&path).with_context(|| format!("failed to load {}", path.display()))?
    } else {
        warn!(
            "config file {} not found; proceeding with defaults",
            args.config.display()
        );
        configs::empty()
    };
    let mut settings = configs::slm_from_config(&cfg).context("invalid config file")?;

    let mode = args.mode.unwrap_or(match settings.profile {
        Profile::Interactive => Mode::Interactive,
        Profile::Gather => Mode::Gather { now: false },
    });
    settings.profile = match (args.profile, mode) {
        (Some(profile), _) => profile,
        (None, Mode::Gather { .. }) => Profile::Gather,
        (None, _) => settings.profile,
    };

    let setup = configs::session_setup(&settings).context("failed to open devices")?;
    let mut session = Session::new(setup).context("failed to open session")?;

    match mode {
        Mode::Show => show(&mut session, settings.tick),
        Mode::Interactive => task::block_on(serve(&mut session, &settings, false)),
        Mode::Gather { now } => task::block_on(serve(&mut session, &settings, now)),
    }
}

fn show(session: &mut Session, tick: Duration) -> Result<()> {
    session.refresh()?;
    if !session.is_interactive() {
        info!("hologram rendered; surface does not stay open");
        return Ok(());
    }
    info!("holding hologram on display; close the window or press Esc to quit");
    while !session.poll_quit() {
        thread::sleep(tick);
    }
    Ok(())
}

async fn serve(session: &mut Session, settings: &SlmConfig, gather_now: bool) -> Result<()> {
    let mut comms = SlmComms::new().context("failed to read hostname")?;
    comms.set_publish_frequency(settings.publish_every);
    comms
        .bind_sockets(settings.logs_port, settings.command_port)
        .await
        .context("failed to bind sockets")?;
    info!(
        command_port = comms.command_port(),
        logs_port = comms.logs_port(),
        "waiting for operator commands"
    );

    if gather_now {
        session.gather()?;
    }

    while session.state() == SessionState::Running {
        if let Some(cmd) = comms.handle_socket_request(session).await {
            debug!("handled command [{cmd}]");
        }
        if session.refresh()?.is_some() && comms.should_publish(session.regenerations()) {
            if let Err(e) = comms.publish_hologram(session).await {
                warn!("failed to publish hologram: {e}");
            }
        }
        if session.poll_quit() {
            break;
        }
        task::sleep(settings.tick).await;
    }

    let _ = comms.unbind_sockets().await;
    info!(state = %session.state(), "leaving main loop");
    Ok(())
}
