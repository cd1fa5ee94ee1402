use crate::config::FleetConfig;
use crate::error::{FleetError, SessionError};
use crate::metrics::MetricsHub;
use crate::pump::Pump;
use crate::registry::DeviceRegistry;
use crate::session::BoardSession;
use crate::valve::Valve;
use serial_transport::{SerialLink, Traced, TransportError};
use std::collections::HashMap;
use std::sync::Arc;

/// Entry point for operating a fleet: owns one session per configured board
/// plus the device registry, and hands out drivers bound to both.
pub struct Fleet {
    registry: DeviceRegistry,
    sessions: HashMap<String, Arc<BoardSession>>,
    metrics: MetricsHub,
}

impl Fleet {
    /// Open a session to every configured board with the given backend and
    /// verify each one answers the identity handshake.
    pub fn connect<L: SerialLink + Send + 'static>(cfg: &FleetConfig) -> Result<Self, FleetError> {
        let registry = DeviceRegistry::build(cfg)?;
        let metrics = MetricsHub::new().map_err(FleetError::Metrics)?;

        let mut sessions = HashMap::new();
        for board in registry.boards() {
            let board_err = |source| FleetError::Board {
                board: board.name.clone(),
                source,
            };
            tracing::debug!(board = %board.name, port = %board.port, "opening board");
            let link = L::open(&board.port)
                .map_err(|e| board_err(SessionError::PortUnavailable(e)))?;
            let link: Box<dyn SerialLink + Send> = if board.debug_enabled {
                Box::new(Traced::new(board.name.clone(), link))
            } else {
                Box::new(link)
            };
            let session = Arc::new(
                BoardSession::new(board, link).with_metrics(metrics.session.clone()),
            );
            let identity = session.identify().map_err(board_err)?;
            tracing::info!(
                board = %board.name,
                firmware = %identity.firmware,
                "board online"
            );
            metrics.boards_online.inc();
            sessions.insert(board.name.clone(), session);
        }

        Ok(Self {
            registry,
            sessions,
            metrics,
        })
    }

    /// Build a fleet over pre-opened links, one per board name. No identity
    /// handshake is performed; tests script the whole exchange themselves.
    pub fn with_links(
        cfg: &FleetConfig,
        mut links: HashMap<String, Box<dyn SerialLink + Send>>,
    ) -> Result<Self, FleetError> {
        let registry = DeviceRegistry::build(cfg)?;
        let metrics = MetricsHub::new().map_err(FleetError::Metrics)?;

        let mut sessions = HashMap::new();
        for board in registry.boards() {
            let link = links.remove(&board.name).ok_or_else(|| FleetError::Board {
                board: board.name.clone(),
                source: SessionError::PortUnavailable(TransportError::PortUnavailable(
                    "no link provided for board".to_string(),
                )),
            })?;
            let session = Arc::new(
                BoardSession::new(board, link).with_metrics(metrics.session.clone()),
            );
            metrics.boards_online.inc();
            sessions.insert(board.name.clone(), session);
        }

        Ok(Self {
            registry,
            sessions,
            metrics,
        })
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Session for one board, for port-level access (analogue reads,
    /// temperature reads, ping).
    pub fn board(&self, name: &str) -> Option<&Arc<BoardSession>> {
        self.sessions.get(name)
    }

    pub fn get_pump(&self, name: &str) -> Result<Pump, FleetError> {
        let cfg = self.registry.resolve_pump(name)?;
        let session = self
            .sessions
            .get(&cfg.board_name)
            .ok_or_else(|| FleetError::UnknownDevice(name.to_string()))?;
        Ok(Pump::new(cfg.clone(), Arc::clone(session)))
    }

    pub fn get_valve(&self, name: &str) -> Result<Valve, FleetError> {
        let cfg = self.registry.resolve_valve(name)?;
        let session = self
            .sessions
            .get(&cfg.board_name)
            .ok_or_else(|| FleetError::UnknownDevice(name.to_string()))?;
        Ok(Valve::new(cfg.clone(), Arc::clone(session)))
    }

    /// Close every board session exactly once. Individual close failures
    /// are logged and never stop the rest of the fleet from shutting down.
    pub fn shutdown(&self) {
        for (name, session) in &self.sessions {
            match session.close() {
                Ok(()) => tracing::debug!(board = %name, "session closed"),
                Err(e) => tracing::warn!(board = %name, error = %e, "close failed during shutdown"),
            }
        }
        self.metrics.boards_online.set(0);
    }

    /// Prometheus exposition text for the whole fleet.
    pub fn metrics_text(&self) -> String {
        self.metrics.encode_text()
    }
}
