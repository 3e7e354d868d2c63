#![warn(clippy::pedantic)]

use bytes::Bytes;
use futures::future::FutureExt;
use gethostname::gethostname;
use tracing::{debug, warn};
use zeromq::prelude::*;

use crate::session::Session;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str;

macro_rules! to_bytes {
    ($collection:expr) => {
        $collection.iter().flat_map(|x| x.to_le_bytes())
    };
}

/// Operator command socket (REP) and hologram feed (PUB).
pub struct SlmComms {
    hostname: String,
    logs_sock: zeromq::PubSocket,
    logs_port: u16,
    command_sock: zeromq::RepSocket,
    command_port: u16,
    publish_frequency_exponent: u8,
}

impl SlmComms {
    #[must_use]
    pub fn new() -> Option<Self> {
        let hostname = gethostname().into_string().ok()?;
        Some(SlmComms {
            hostname,
            logs_sock: zeromq::PubSocket::new(),
            logs_port: 8080,
            command_sock: zeromq::RepSocket::new(),
            command_port: 8081,
            publish_frequency_exponent: 0,
        })
    }

    #[inline]
    #[must_use]
    pub fn logs_port(&self) -> u16 {
        self.logs_port
    }
    #[inline]
    #[must_use]
    pub fn command_port(&self) -> u16 {
        self.command_port
    }

    #[inline]
    #[must_use]
    pub fn publish_frequency_exponent(&self) -> u8 {
        self.publish_frequency_exponent
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn set_publish_frequency(&mut self, num_regenerations: u32) {
        // round down to the nearest power of 2
        self.publish_frequency_exponent = num_regenerations.checked_ilog2().unwrap_or(0) as u8;
    }

    #[inline]
    #[must_use]
    pub fn should_publish(&self, regenerations: u64) -> bool {
        (regenerations & ((1 << self.publish_frequency_exponent) - 1)) == 0
    }

    /// Answer at most one pending command without waiting for one. Returns the command text if
    /// one was handled.
    pub async fn handle_socket_request(&mut self, session: &mut Session) -> Option<String> {
        let polled = catch_unwind(AssertUnwindSafe(|| self.command_sock.recv().now_or_never()));
        let cmd_msg = match polled {
            Ok(msg) => msg?.ok()?,
            Err(_) => {
                warn!("command socket panicked while polling; rebinding");
                let _ = self.unbind_sockets().await;
                let _ = self.bind_sockets(self.logs_port, self.command_port).await;
                return None;
            }
        };
        let cmd = str::from_utf8(cmd_msg.get(0)?).ok()?;
        let reply = reply_to(session, cmd);
        if let Err(e) = self.command_sock.send(reply.into()).await {
            warn!("failed to reply to command [{cmd}]: {e}");
        }
        Some(cmd.to_string())
    }

    /// Publish the session's current hologram, see [`hologram_frames`] for the layout. Does
    /// nothing before the first regeneration.
    /// # Errors
    /// Propagates any zeromq error in the socket send operation.
    pub async fn publish_hologram(&mut self, session: &Session) -> zeromq::ZmqResult<()> {
        let Some(frames) = hologram_frames(&self.hostname, session) else {
            return Ok(());
        };
        let mut frames = frames.into_iter();
        let Some(first) = frames.next() else {
            return Ok(());
        };
        let mut msg = zeromq::ZmqMessage::from(first);
        for frame in frames {
            msg.push_back(frame);
        }
        debug!(regenerations = session.regenerations(), "publishing hologram");
        self.logs_sock.send(msg).await
    }

    /// # Errors
    /// In case of any zmq error, aborts early and returns the error.
    pub async fn bind_sockets(
        &mut self,
        logs_port: u16,
        command_port: u16,
    ) -> zeromq::ZmqResult<()> {
        self.logs_sock
            .bind(format!("tcp://0.0.0.0:{logs_port}").as_str())
            .await?;
        self.logs_port = logs_port;
        self.command_sock
            .bind(format!("tcp://0.0.0.0:{command_port}").as_str())
            .await?;
        self.command_port = command_port;
        Ok(())
    }

    /// # Errors
    /// In case of any zmq error, aborts early and returns the error.
    pub async fn unbind_sockets(&mut self) -> zeromq::ZmqResult<()> {
        let _ = self.logs_sock.unbind_all().await;
        let _ = self.command_sock.unbind_all().await;
        Ok(())
    }
}

/// Frames: hostname, regeneration counter (u64), l nx ny x0 y0 (i32), width height (u32),
/// then the row-major 8-bit image. All little-endian. `None` before the first regeneration.
#[must_use]
pub fn hologram_frames(hostname: &str, session: &Session) -> Option<Vec<Bytes>> {
    let image = session.last_image()?;
    let params = session.params();
    let geometry = session.geometry();
    Some(vec![
        Bytes::copy_from_slice(hostname.as_bytes()),
        Bytes::copy_from_slice(&session.regenerations().to_le_bytes()),
        Bytes::from_iter(to_bytes!([
            params.l, params.nx, params.ny, params.x0, params.y0
        ])),
        Bytes::from_iter(to_bytes!([geometry.width, geometry.height])),
        Bytes::copy_from_slice(image.as_raw()),
    ])
}

/// The reply sent back for `cmd`.
#[must_use]
pub fn reply_to(session: &mut Session, cmd: &str) -> String {
    session.process_command(cmd.split(':')).unwrap_or_else(|()| {
        warn!("failed to process command [{cmd}]");
        format!("Command '{cmd}' not recognized")
    })
}

#[cfg(test)]
mod tests {
    use slm_sys::mock::RecordingSurface;
    use slm_sys::Monitor;

    use std::time::Duration;

    use super::*;
    use crate::params::{Field, Profile};
    use crate::session::SessionSetup;

    fn open_session(width: u32, height: u32) -> Session {
        let setup = SessionSetup::new(
            Profile::Interactive,
            vec![Monitor::new("slm", 0, 0, width, height)],
            Box::new(RecordingSurface::new("SLM")),
        );
        Session::new(setup).unwrap()
    }

    #[test]
    fn hologram_frame_layout() {
        let mut session = open_session(6, 4);
        assert!(hologram_frames("lab-pc", &session).is_none());
        session.commit(Field::L, "-3");
        session.commit(Field::X0, "-2");
        session.commit(Field::Y0, "1");
        session.refresh().unwrap();

        let frames = hologram_frames("lab-pc", &session).unwrap();
        assert_eq!(frames.len(), 5);
        assert_eq!(&frames[0][..], b"lab-pc");
        assert_eq!(&frames[1][..], &1_u64.to_le_bytes()[..]);
        let params: Vec<i32> = frames[2]
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(params, vec![-3, 50, 50, -2, 1]);
        assert_eq!(&frames[3][..], &[6, 0, 0, 0, 4, 0, 0, 0][..]);
        assert_eq!(&frames[4][..], session.last_image().unwrap().as_raw().as_slice());
        assert_eq!(frames[4].len(), 24);
    }

    #[test]
    fn command_socket_round_trip() {
        async_std::task::block_on(async {
            let mut session = open_session(8, 8);
            let mut comms = SlmComms::new().unwrap();
            comms.bind_sockets(38571, 38572).await.unwrap();
            let mut client = zeromq::ReqSocket::new();
            client.connect("tcp://127.0.0.1:38572").await.unwrap();
            client.send("PARAM:NX:SET:12".into()).await.unwrap();

            let mut handled = None;
            for _ in 0..500 {
                handled = comms.handle_socket_request(&mut session).await;
                if handled.is_some() {
                    break;
                }
                async_std::task::sleep(Duration::from_millis(10)).await;
            }
            assert_eq!(handled.as_deref(), Some("PARAM:NX:SET:12"));
            let reply = client.recv().await.unwrap();
            assert_eq!(reply.get(0).map(|frame| &frame[..]), Some(&b"12"[..]));
            assert_eq!(session.params().nx, 12);
            let _ = comms.unbind_sockets().await;
        });
    }

    #[test]
    fn publish_cadence_rounds_down_to_power_of_two() {
        let mut comms = SlmComms::new().unwrap();
        assert!((1..10).all(|n| comms.should_publish(n)));
        comms.set_publish_frequency(6);
        assert_eq!(comms.publish_frequency_exponent(), 2);
        assert!(comms.should_publish(8));
        assert!(!comms.should_publish(6));
        comms.set_publish_frequency(0);
        assert!(comms.should_publish(3));
    }

    #[test]
    fn unknown_command_reply() {
        let mut session = open_session(8, 8);
        assert_eq!(
            reply_to(&mut session, "LASER:GET"),
            "Command 'LASER:GET' not recognized"
        );
        assert_eq!(reply_to(&mut session, "PARAM:NX:SET:12"), "12");
    }
}
