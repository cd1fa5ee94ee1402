use crate::config::BoardConfig;
use crate::decode::{decode_response, Response};
use crate::encode::{encode, Command, Operation};
use crate::error::SessionError;
use crate::gate::CommandGate;
use crate::metrics::SessionMetrics;
use serial_transport::{SerialLink, TransportError};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Protocol state of one board channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    AwaitingResponse,
    /// The link failed at the connection level; every call fails fast until
    /// the session is reopened with a fresh link.
    Failed,
}

/// Identity banner reported by a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardIdentity {
    pub board: String,
    pub firmware: String,
}

const BOARD_NAME: &str = "Isotope Board";
// Firmware before the banner format reported this fixed token.
const LEGACY_BANNER: &str = "ISOTOPE_BOARD";

struct Inner {
    link: Option<Box<dyn SerialLink + Send>>,
    state: SessionState,
}

/// One serialized command channel to one board.
///
/// The session owns its link exclusively. Concurrent callers are admitted
/// strictly FIFO through the [`CommandGate`]; at most one command is in
/// flight per board at any time.
pub struct BoardSession {
    name: String,
    timeout: Duration,
    retries: u32,
    gate: CommandGate,
    inner: Mutex<Inner>,
    metrics: Option<SessionMetrics>,
}

impl BoardSession {
    pub fn new(cfg: &BoardConfig, link: Box<dyn SerialLink + Send>) -> Self {
        Self {
            name: cfg.name.clone(),
            timeout: cfg.timeout(),
            retries: cfg.retries,
            gate: CommandGate::new(),
            inner: Mutex::new(Inner {
                link: Some(link),
                state: SessionState::Idle,
            }),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SessionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.lock_inner().state
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send one command and wait for the board's response payload.
    ///
    /// Timeouts are re-sent up to the configured retry count, then surfaced;
    /// the session stays usable afterwards. A connection-level failure
    /// poisons the session until [`BoardSession::reopen_with`].
    pub fn send(&self, cmd: &Command) -> Result<String, SessionError> {
        let _pass = self.gate.enter();
        let mut inner = self.lock_inner();
        match inner.state {
            SessionState::Failed => {
                return Err(SessionError::ConnectionLost(format!(
                    "board {} marked failed",
                    self.name
                )))
            }
            _ if inner.link.is_none() => return Err(SessionError::Closed),
            _ => {}
        }

        let frame = encode(cmd);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            inner.state = SessionState::Sending;
            let link = inner.link.as_mut().ok_or(SessionError::Closed)?;
            if let Err(e) = link.send_raw(&frame) {
                inner.state = SessionState::Failed;
                tracing::error!(board = %self.name, error = %e, "write failed, session marked failed");
                return Err(SessionError::ConnectionLost(e.to_string()));
            }
            if let Some(m) = &self.metrics {
                m.commands_sent.inc();
            }

            inner.state = SessionState::AwaitingResponse;
            let link = inner.link.as_mut().ok_or(SessionError::Closed)?;
            match link.receive_raw(self.timeout) {
                Ok(bytes) => {
                    inner.state = SessionState::Idle;
                    if let Some(m) = &self.metrics {
                        m.responses_received.inc();
                    }
                    let resp = decode_response(&bytes)
                        .map_err(|e| SessionError::MalformedResponse(e.to_string()))?;
                    return match resp {
                        Response::Ok(payload) => Ok(payload),
                        Response::Fault(code) => Err(SessionError::BoardFault(code)),
                    };
                }
                Err(TransportError::Timeout) => {
                    if attempts > self.retries {
                        // The channel is assumed recoverable; stay usable.
                        inner.state = SessionState::Idle;
                        tracing::warn!(board = %self.name, attempts, "response timeout");
                        return Err(SessionError::Timeout { attempts });
                    }
                    if let Some(m) = &self.metrics {
                        m.timeout_retries.inc();
                    }
                    tracing::debug!(board = %self.name, attempt = attempts, "timeout, re-sending");
                }
                Err(e) => {
                    inner.state = SessionState::Failed;
                    tracing::error!(board = %self.name, error = %e, "read failed, session marked failed");
                    return Err(SessionError::ConnectionLost(e.to_string()));
                }
            }
        }
    }

    /// Ask the board who it is and parse the firmware banner.
    pub fn identify(&self) -> Result<BoardIdentity, SessionError> {
        let payload = self.send(&Command::global(Operation::WhoAmI))?;
        parse_identity(&payload)
    }

    /// Keep-alive; the payload carries nothing.
    pub fn ping(&self) -> Result<(), SessionError> {
        self.send(&Command::global(Operation::Heartbeat))
            .map(|_| ())
    }

    /// Read one analogue input port. Out-of-range ids are the board's to
    /// reject (it answers with a fault).
    pub fn read_analogue(&self, port_id: u8) -> Result<i64, SessionError> {
        self.read_numeric(Command::new(port_id, Operation::AnalogRead))
    }

    /// Read one temperature sensor port.
    pub fn read_temperature(&self, port_id: u8) -> Result<i64, SessionError> {
        self.read_numeric(Command::new(port_id, Operation::TempRead))
    }

    fn read_numeric(&self, cmd: Command) -> Result<i64, SessionError> {
        let payload = self.send(&cmd)?;
        payload.trim().parse::<i64>().map_err(|_| {
            SessionError::MalformedResponse(format!("expected a number, got {payload:?}"))
        })
    }

    /// Close the underlying link. Later calls are no-ops; commands after
    /// close fail with [`SessionError::Closed`].
    pub fn close(&self) -> Result<(), SessionError> {
        let _pass = self.gate.enter();
        let mut inner = self.lock_inner();
        if let Some(mut link) = inner.link.take() {
            link.close()
                .map_err(|e| SessionError::ConnectionLost(e.to_string()))?;
        }
        Ok(())
    }

    /// Replace the link after a connection-level failure or a close.
    pub fn reopen_with(&self, link: Box<dyn SerialLink + Send>) {
        let _pass = self.gate.enter();
        let mut inner = self.lock_inner();
        inner.link = Some(link);
        inner.state = SessionState::Idle;
        tracing::info!(board = %self.name, "session reopened");
    }
}

fn parse_identity(payload: &str) -> Result<BoardIdentity, SessionError> {
    if payload == LEGACY_BANNER {
        return Ok(BoardIdentity {
            board: BOARD_NAME.to_string(),
            firmware: "0.0.0".to_string(),
        });
    }
    let mut board = None;
    let mut firmware = None;
    for field in payload.split(',') {
        match field.split_once('=') {
            Some(("BOARD_NAME", v)) => board = Some(v.to_string()),
            Some(("FIRMWARE", v)) => firmware = Some(v.to_string()),
            _ => {}
        }
    }
    match (board, firmware) {
        (Some(board), Some(firmware)) if board == BOARD_NAME => {
            Ok(BoardIdentity { board, firmware })
        }
        (Some(board), _) => Err(SessionError::Handshake(format!(
            "not an Isotope board: {board}"
        ))),
        _ => Err(SessionError::Handshake(format!(
            "unrecognized identity banner: {payload}"
        ))),
    }
}
