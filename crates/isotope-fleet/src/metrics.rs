use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Counters a session bumps per exchange; cheap to clone into each session.
#[derive(Clone)]
pub struct SessionMetrics {
    pub commands_sent: IntCounter,
    pub responses_received: IntCounter,
    pub timeout_retries: IntCounter,
}

/// Fleet-wide Prometheus registry.
#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub session: SessionMetrics,
    pub boards_online: IntGauge,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let commands_sent = IntCounter::new("iso_commands_sent", "Total command frames sent")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let responses_received =
            IntCounter::new("iso_responses_received", "Total response frames received")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let timeout_retries =
            IntCounter::new("iso_timeout_retries", "Commands re-sent after a timeout")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let boards_online = IntGauge::new("iso_boards_online", "Boards with an open session")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let session = SessionMetrics {
            commands_sent,
            responses_received,
            timeout_retries,
        };
        let _ = registry.register(Box::new(session.commands_sent.clone()));
        let _ = registry.register(Box::new(session.responses_received.clone()));
        let _ = registry.register(Box::new(session.timeout_retries.clone()));
        let _ = registry.register(Box::new(boards_online.clone()));
        Ok(Self {
            registry,
            session,
            boards_online,
        })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
