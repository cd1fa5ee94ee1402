use crate::config::ValveConfig;
use crate::encode::{Command, Operation};
use crate::error::{DeviceError, SessionError};
use crate::session::BoardSession;
use std::sync::Arc;

// Full duty energizes the solenoid with constant voltage.
const ENERGIZED_DUTY: u16 = 1024;
const RELEASED_DUTY: u16 = 0;

/// A solenoid valve bound to one power output port.
///
/// `open`/`close` speak flow, not wiring: a normally-open valve is driven
/// with inverted polarity so the vocabulary stays the same.
pub struct Valve {
    cfg: ValveConfig,
    session: Arc<BoardSession>,
}

impl Valve {
    pub(crate) fn new(cfg: ValveConfig, session: Arc<BoardSession>) -> Self {
        Self { cfg, session }
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn config(&self) -> &ValveConfig {
        &self.cfg
    }

    pub fn open(&self) -> Result<(), DeviceError> {
        self.set(true)
    }

    pub fn close(&self) -> Result<(), DeviceError> {
        self.set(false)
    }

    fn set(&self, open: bool) -> Result<(), DeviceError> {
        let energize = open != self.cfg.normally_open;
        let duty = if energize {
            ENERGIZED_DUTY
        } else {
            RELEASED_DUTY
        };
        tracing::debug!(valve = %self.cfg.name, open, energize, "switching valve");
        self.session
            .send(&Command::new(self.cfg.port_id, Operation::PowerSet(duty)))
            .map(|_| ())
            .map_err(|source| DeviceError::Session {
                device: self.cfg.name.clone(),
                source,
            })
    }
}
