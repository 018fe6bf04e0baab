use bytes::Bytes;
use framelink_frame::{FrameError, FrameReader, FrameWriter};
use framelink_transport::Transport;
use tracing::{debug, info, warn};

use crate::config::{PeerConfig, ResyncMode, WaitMode};
use crate::error::{PeerError, Result};
use crate::establish::{Establish, LinkEstablisher};
use crate::retry::{Sleeper, ThreadSleeper};
use crate::shutdown::ShutdownSignal;
use crate::state::{ConnectionState, LinkStats};

/// Outcome of one [`ConnectionManager::receive_event`] call.
#[derive(Debug)]
pub enum Received {
    /// A decoded payload.
    Payload(Bytes),
    /// A frame that was dropped. The session is still up.
    Corrupt(FrameError),
}

/// Reader and writer halves of one established link.
struct Session<L> {
    reader: FrameReader<L>,
    writer: FrameWriter<L>,
    label: String,
    /// Frames carried in either direction.
    frames: u64,
}

impl<L: Transport> Session<L> {
    fn open(link: L, config: &PeerConfig) -> Result<Self> {
        let label = link.label();
        let reader_link = link.try_clone()?;
        let reader = FrameReader::for_link(reader_link, config.frame.clone())?;
        let writer = FrameWriter::for_link(link, config.frame.clone())?;
        Ok(Self {
            reader,
            writer,
            label,
            frames: 0,
        })
    }

    fn close(mut self) {
        if let Err(err) = self.writer.get_mut().close() {
            debug!(link = %self.label, error = %err, "close failed");
        }
        if let Err(err) = self.reader.get_mut().close() {
            debug!(link = %self.label, error = %err, "close failed");
        }
    }
}

/// Owns the one active link to the peer and keeps it alive.
///
/// Establishment is retried forever with a fixed delay. A link that faults
/// is closed and replaced; a frame that fails to decode is dropped and the
/// link is kept. With [`WaitMode::Block`] all of this happens inside
/// `send`/`receive`; with [`WaitMode::FailFast`] those calls report the
/// failure and the caller reconnects with [`start`](Self::start).
pub struct ConnectionManager<E: Establish = LinkEstablisher, S: Sleeper = ThreadSleeper> {
    config: PeerConfig,
    establisher: E,
    sleeper: S,
    session: Option<Session<E::Link>>,
    state: ConnectionState,
    stats: LinkStats,
    shutdown: ShutdownSignal,
}

impl ConnectionManager {
    /// Manager over real sockets, role and endpoint taken from `config`.
    pub fn new(config: PeerConfig) -> Self {
        let establisher = LinkEstablisher::from_config(&config);
        Self::with_parts(config, establisher, ThreadSleeper)
    }
}

impl<E: Establish, S: Sleeper> ConnectionManager<E, S> {
    /// Manager with an explicit establisher and sleeper.
    pub fn with_parts(config: PeerConfig, establisher: E, sleeper: S) -> Self {
        Self {
            config,
            establisher,
            sleeper,
            session: None,
            state: ConnectionState::Disconnected,
            stats: LinkStats::default(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Share an existing shutdown signal (e.g. one wired to Ctrl-C).
    pub fn with_shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = signal;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Handle for stopping this manager from another thread.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Label of the active link, if any.
    pub fn link_label(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.label.as_str())
    }

    /// Establish a session, retrying until one is up.
    ///
    /// Returns immediately if already connected. Only shutdown stops the
    /// retry loop.
    pub fn start(&mut self) -> Result<()> {
        self.check_shutdown()?;
        if self.session.is_some() && self.state == ConnectionState::Connected {
            return Ok(());
        }

        loop {
            self.state = ConnectionState::Connecting;
            let link = self.establish_with_retry()?;

            match self.open_session(link) {
                Ok(session) => {
                    self.session = Some(session);
                    self.state = ConnectionState::Connected;
                    self.stats.sessions += 1;
                    if self.stats.sessions > 1 {
                        self.stats.reconnects += 1;
                    }
                    info!(
                        link = self.link_label().unwrap_or_default(),
                        session = self.stats.sessions,
                        "link established"
                    );
                    return Ok(());
                }
                Err(PeerError::Shutdown) => return Err(self.enter_shutdown()),
                Err(err) => {
                    warn!(error = %err, "session setup failed");
                    self.state = ConnectionState::Disconnected;
                    self.pause()?;
                }
            }
        }
    }

    /// Send one payload.
    ///
    /// In `Block` mode a link failure triggers a reconnect and the same
    /// payload is sent on the new link. Oversized payloads are rejected
    /// without touching the link.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        loop {
            self.ensure_connected()?;
            let Some(session) = self.session.as_mut() else {
                return Err(PeerError::NotConnected);
            };

            match session.writer.send(payload) {
                Ok(()) => {
                    session.frames += 1;
                    self.stats.frames_sent += 1;
                    return Ok(());
                }
                Err(err) if err.is_encoding() => return Err(err.into()),
                Err(err) => self.link_failed(err)?,
            }
        }
    }

    /// Receive the next payload, skipping frames that fail to decode.
    pub fn receive(&mut self) -> Result<Bytes> {
        loop {
            match self.receive_event()? {
                Received::Payload(payload) => return Ok(payload),
                Received::Corrupt(_) => continue,
            }
        }
    }

    /// Receive the next frame, reporting corrupt ones instead of skipping
    /// them.
    pub fn receive_event(&mut self) -> Result<Received> {
        loop {
            self.ensure_connected()?;
            let Some(session) = self.session.as_mut() else {
                return Err(PeerError::NotConnected);
            };

            match session.reader.read_payload() {
                Ok(payload) => {
                    session.frames += 1;
                    self.stats.frames_received += 1;
                    return Ok(Received::Payload(payload));
                }
                Err(FrameError::Timeout) => {
                    self.check_shutdown()?;
                    return Err(PeerError::Timeout);
                }
                Err(err) if err.is_corrupt_frame() => {
                    self.stats.decode_failures += 1;
                    warn!(link = %session.label, error = %err, "dropping corrupt frame");
                    return Ok(Received::Corrupt(err));
                }
                Err(err) => self.link_failed(err)?,
            }
        }
    }

    /// Close the link and stop for good. Idempotent.
    pub fn shutdown(&mut self) {
        let _ = self.enter_shutdown();
    }

    fn ensure_connected(&mut self) -> Result<()> {
        self.check_shutdown()?;
        if self.session.is_some() && self.state == ConnectionState::Connected {
            return Ok(());
        }
        match self.config.wait_mode {
            WaitMode::Block => self.start(),
            WaitMode::FailFast => Err(PeerError::NotConnected),
        }
    }

    fn establish_with_retry(&mut self) -> Result<E::Link> {
        loop {
            self.check_shutdown()?;
            self.stats.attempts += 1;
            match self.establisher.establish() {
                Ok(link) => return Ok(link),
                Err(err) => {
                    warn!(
                        via = %self.establisher.describe(),
                        attempt = self.stats.attempts,
                        error = %err,
                        retry_in = ?self.config.retry_delay,
                        "link establishment failed; retrying"
                    );
                    self.pause()?;
                }
            }
        }
    }

    fn open_session(&mut self, link: E::Link) -> Result<Session<E::Link>> {
        let is_stream = link.kind().is_stream();
        let mut session = Session::open(link, &self.config)?;

        if is_stream && self.config.resync == ResyncMode::Eager {
            self.state = ConnectionState::Resyncing;
            loop {
                match session.reader.resync() {
                    Ok(()) => break,
                    // Keep waiting for the peer, but stay responsive to shutdown.
                    Err(FrameError::Timeout) if !self.shutdown.is_triggered() => continue,
                    Err(FrameError::Timeout) => {
                        session.close();
                        return Err(PeerError::Shutdown);
                    }
                    Err(err) => {
                        session.close();
                        return Err(err.into());
                    }
                }
            }
        }
        Ok(session)
    }

    /// Tear down the session after a link fault. `Ok` means try again.
    fn link_failed(&mut self, err: FrameError) -> Result<()> {
        let mut idle = true;
        if let Some(session) = self.session.take() {
            warn!(link = %session.label, frames = session.frames, error = %err, "link lost");
            idle = session.frames == 0;
            session.close();
        }
        self.state = ConnectionState::Disconnected;
        self.check_shutdown()?;

        match self.config.wait_mode {
            // A link that dies before carrying anything (e.g. a UDP acceptor
            // with no peer yet) would otherwise be rebuilt in a tight loop.
            WaitMode::Block if idle => self.pause(),
            WaitMode::Block => Ok(()),
            WaitMode::FailFast => Err(PeerError::Disconnected(err.to_string())),
        }
    }

    fn pause(&mut self) -> Result<()> {
        if self.sleeper.sleep(self.config.retry_delay, &self.shutdown) {
            Ok(())
        } else {
            Err(self.enter_shutdown())
        }
    }

    fn check_shutdown(&mut self) -> Result<()> {
        if self.state == ConnectionState::ShuttingDown || self.shutdown.is_triggered() {
            return Err(self.enter_shutdown());
        }
        Ok(())
    }

    fn enter_shutdown(&mut self) -> PeerError {
        self.shutdown.trigger();
        if let Some(session) = self.session.take() {
            info!(link = %session.label, "closing link");
            session.close();
        }
        self.state = ConnectionState::ShuttingDown;
        PeerError::Shutdown
    }
}

impl<E: Establish, S: Sleeper> Drop for ConnectionManager<E, S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

impl<E: Establish, S: Sleeper> std::fmt::Debug for ConnectionManager<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("role", &self.config.role)
            .field("endpoint", &self.config.endpoint.to_string())
            .field("state", &self.state)
            .field("link", &self.link_label())
            .finish()
    }
}
