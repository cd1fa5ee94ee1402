use crate::config::PumpConfig;
use crate::encode::{Command, Operation};
use crate::error::{DeviceError, SessionError};
use crate::session::BoardSession;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A diaphragm pump bound to one motor port.
///
/// The motor parameters (rpm, current limit, step angle) are pushed to the
/// board once, before the first motion after the driver is created.
pub struct Pump {
    cfg: PumpConfig,
    session: Arc<BoardSession>,
    configured: AtomicBool,
}

impl Pump {
    pub(crate) fn new(cfg: PumpConfig, session: Arc<BoardSession>) -> Self {
        Self {
            cfg,
            session,
            configured: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn config(&self) -> &PumpConfig {
        &self.cfg
    }

    /// Spin the pump continuously at the configured speed, or at an
    /// explicit rpm override. Returns once the board acknowledges.
    pub fn run(&self, rpm: Option<u32>) -> Result<(), DeviceError> {
        self.ensure_configured()?;
        if let Some(rpm) = rpm {
            self.send(Operation::MotorSetRpm(rpm))?;
        }
        self.send(Operation::MotorEnable(true))
    }

    /// Move `volume_ml` of liquid. The step count is
    /// `round(volume_ml * steps_per_ml)`, reversed when the pump is
    /// configured with `reverse_direction`.
    ///
    /// Returns when the board accepts the motion command; the motion itself
    /// completes asynchronously on the board.
    pub fn dispense(&self, volume_ml: f64) -> Result<(), DeviceError> {
        if !(volume_ml > 0.0) {
            return Err(self.invalid(format!("volume must be positive, got {volume_ml} ml")));
        }
        let steps = (volume_ml * self.cfg.steps_per_ml).round();
        if steps > f64::from(i32::MAX) {
            return Err(self.invalid(format!("{volume_ml} ml exceeds the step range")));
        }
        self.dispense_steps(steps as i32)
    }

    /// Move liquid by a raw motor step count; negative runs against the
    /// configured direction.
    pub fn dispense_steps(&self, steps: i32) -> Result<(), DeviceError> {
        if steps == 0 {
            return Err(self.invalid("zero-step motion".to_string()));
        }
        let steps = if self.cfg.reverse_direction {
            -steps
        } else {
            steps
        };
        self.ensure_configured()?;
        self.send(Operation::MotorEnable(true))?;
        tracing::debug!(pump = %self.cfg.name, steps, "dispensing");
        self.send(Operation::MotorStep(steps))
    }

    /// Release the motor port. Also ends any motion in progress.
    pub fn stop(&self) -> Result<(), DeviceError> {
        self.send(Operation::MotorEnable(false))
    }

    fn ensure_configured(&self) -> Result<(), DeviceError> {
        if self.configured.load(Ordering::Acquire) {
            return Ok(());
        }
        tracing::debug!(pump = %self.cfg.name, "pushing motor configuration");
        self.send(Operation::MotorSetRpm(self.cfg.rpm))?;
        self.send(Operation::MotorSetCurrent(self.cfg.current_ma))?;
        let step_angle = self.cfg.steps_per_degree.round().max(1.0) as u32;
        self.send(Operation::MotorSetStepAngle(step_angle))?;
        self.configured.store(true, Ordering::Release);
        Ok(())
    }

    fn send(&self, op: Operation) -> Result<(), DeviceError> {
        self.session
            .send(&Command::new(self.cfg.port_id, op))
            .map(|_| ())
            .map_err(|source| self.wrap(source))
    }

    fn wrap(&self, source: SessionError) -> DeviceError {
        DeviceError::Session {
            device: self.cfg.name.clone(),
            source,
        }
    }

    fn invalid(&self, reason: String) -> DeviceError {
        DeviceError::InvalidRequest {
            device: self.cfg.name.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardConfig;
    use crate::decode_command;
    use serial_transport::{MockHandle, MockLink};

    fn pump_cfg(steps_per_ml: f64, reverse: bool) -> PumpConfig {
        PumpConfig {
            name: "feed".to_string(),
            board_name: "1".to_string(),
            port_id: 0,
            rpm: 100,
            current_ma: 400,
            steps_per_degree: 8.0,
            steps_per_ml,
            reverse_direction: reverse,
        }
    }

    fn pump_on_mock(cfg: PumpConfig) -> (Pump, MockHandle) {
        let board = BoardConfig {
            name: "1".to_string(),
            port: "mock0".to_string(),
            comm_timeout: 0.05,
            retries: 0,
            debug_enabled: false,
        };
        let (link, handle) = MockLink::with_handle("mock0");
        let session = Arc::new(BoardSession::new(&board, Box::new(link)));
        (Pump::new(cfg, session), handle)
    }

    fn ack_n(handle: &MockHandle, n: usize) {
        for _ in 0..n {
            handle.push_frame(br#"{"payload":"","error":"ACK"}"#);
        }
    }

    fn sent_ops(handle: &MockHandle) -> Vec<Operation> {
        handle
            .sent()
            .iter()
            .map(|f| decode_command(f).expect("well-formed frame").op)
            .collect()
    }

    #[test]
    fn dispense_converts_millilitres_to_steps() {
        let (pump, handle) = pump_on_mock(pump_cfg(10.0, false));
        // configure (3) + enable + step
        ack_n(&handle, 5);

        pump.dispense(2.5).expect("dispense");

        let ops = sent_ops(&handle);
        assert_eq!(
            ops,
            vec![
                Operation::MotorSetRpm(100),
                Operation::MotorSetCurrent(400),
                Operation::MotorSetStepAngle(8),
                Operation::MotorEnable(true),
                Operation::MotorStep(25),
            ]
        );
    }

    #[test]
    fn reverse_direction_flips_the_sign() {
        let (pump, handle) = pump_on_mock(pump_cfg(10.0, true));
        ack_n(&handle, 5);

        pump.dispense(2.5).expect("dispense");
        assert_eq!(sent_ops(&handle).last(), Some(&Operation::MotorStep(-25)));
    }

    #[test]
    fn configuration_is_pushed_once() {
        let (pump, handle) = pump_on_mock(pump_cfg(48.0, false));
        ack_n(&handle, 5);
        pump.dispense(1.0).expect("first dispense");

        handle.clear_sent();
        ack_n(&handle, 2);
        pump.dispense(1.0).expect("second dispense");
        assert_eq!(
            sent_ops(&handle),
            vec![Operation::MotorEnable(true), Operation::MotorStep(48)]
        );
    }

    #[test]
    fn run_applies_the_rpm_override() {
        let (pump, handle) = pump_on_mock(pump_cfg(10.0, false));
        ack_n(&handle, 5);

        pump.run(Some(30)).expect("run");
        let ops = sent_ops(&handle);
        assert_eq!(
            &ops[3..],
            &[Operation::MotorSetRpm(30), Operation::MotorEnable(true)]
        );

        handle.clear_sent();
        ack_n(&handle, 1);
        pump.stop().expect("stop");
        assert_eq!(sent_ops(&handle), vec![Operation::MotorEnable(false)]);
    }

    #[test]
    fn invalid_volumes_never_reach_the_wire() {
        let (pump, handle) = pump_on_mock(pump_cfg(10.0, false));
        assert!(matches!(
            pump.dispense(0.0),
            Err(DeviceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            pump.dispense(-1.0),
            Err(DeviceError::InvalidRequest { .. })
        ));
        assert!(handle.sent().is_empty());
    }

    #[test]
    fn session_errors_carry_the_device_name() {
        let (pump, handle) = pump_on_mock(pump_cfg(10.0, false));
        handle.push_timeout();

        let err = pump.dispense(1.0).expect_err("timeout");
        match err {
            DeviceError::Session { device, source } => {
                assert_eq!(device, "feed");
                assert!(matches!(source, SessionError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
