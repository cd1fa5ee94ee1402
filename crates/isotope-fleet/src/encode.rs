use crate::config::PortKind;
use crate::error::CodecError;
use serde::Deserialize;

// Wire section names, fixed by the board firmware.
const SEC_WHO_I_AM: &str = "Who_I_am";
const SEC_HEARTBEAT: &str = "HeartBeat";
const SEC_POWER_OUTPUT: &str = "Power_output";
const SEC_TEMP_SENSOR: &str = "Temp_sensor";
const SEC_PWM_OUTPUT: &str = "PWM_output";
const SEC_PWM_ENABLE: &str = "PWM_enable";
const SEC_ANALOG_INPUT: &str = "Analog_input";
const SEC_MOTOR_STEP: &str = "Motor_step";
const SEC_MOTOR_RPM_SPEED: &str = "Motor_rpm_speed";
const SEC_MOTOR_CURRENT: &str = "Motor_current_milliamps";
const SEC_MOTOR_ENABLE: &str = "Motor_enable";
const SEC_MOTOR_STEP_ANGLE: &str = "Motor_step_angle";

const KIND_GET: &str = "GET";
const KIND_SET: &str = "SET";

/// One operation the board understands. Values are already quantized;
/// unit conversion happens in the device drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Identity and firmware banner (board-global).
    WhoAmI,
    /// Keep-alive (board-global).
    Heartbeat,
    MotorEnable(bool),
    /// Signed step count; negative reverses the rotation.
    MotorStep(i32),
    MotorSetRpm(u32),
    MotorSetCurrent(u32),
    /// Motor step angle in whole degrees.
    MotorSetStepAngle(u32),
    /// Power output duty, 0..=1024; 0 releases the port.
    PowerSet(u16),
    PwmSet(u16),
    PwmEnable(bool),
    AnalogRead,
    TempRead,
}

impl Operation {
    fn wire(self) -> (&'static str, &'static str, i64) {
        match self {
            Operation::WhoAmI => (KIND_GET, SEC_WHO_I_AM, 0),
            Operation::Heartbeat => (KIND_SET, SEC_HEARTBEAT, 0),
            Operation::MotorEnable(on) => (KIND_SET, SEC_MOTOR_ENABLE, i64::from(on)),
            Operation::MotorStep(steps) => (KIND_SET, SEC_MOTOR_STEP, i64::from(steps)),
            Operation::MotorSetRpm(rpm) => (KIND_SET, SEC_MOTOR_RPM_SPEED, i64::from(rpm)),
            Operation::MotorSetCurrent(ma) => (KIND_SET, SEC_MOTOR_CURRENT, i64::from(ma)),
            Operation::MotorSetStepAngle(deg) => (KIND_SET, SEC_MOTOR_STEP_ANGLE, i64::from(deg)),
            Operation::PowerSet(duty) => (KIND_SET, SEC_POWER_OUTPUT, i64::from(duty)),
            Operation::PwmSet(duty) => (KIND_SET, SEC_PWM_OUTPUT, i64::from(duty)),
            Operation::PwmEnable(on) => (KIND_SET, SEC_PWM_ENABLE, i64::from(on)),
            Operation::AnalogRead => (KIND_GET, SEC_ANALOG_INPUT, 0),
            Operation::TempRead => (KIND_GET, SEC_TEMP_SENSOR, 0),
        }
    }

    /// The port family this operation addresses; `None` for board-global
    /// operations, whose item field is always 0.
    pub fn port_kind(self) -> Option<PortKind> {
        match self {
            Operation::WhoAmI | Operation::Heartbeat => None,
            Operation::MotorEnable(_)
            | Operation::MotorStep(_)
            | Operation::MotorSetRpm(_)
            | Operation::MotorSetCurrent(_)
            | Operation::MotorSetStepAngle(_) => Some(PortKind::Motor),
            Operation::PowerSet(_) => Some(PortKind::Valve),
            Operation::PwmSet(_) | Operation::PwmEnable(_) => Some(PortKind::Pwm),
            Operation::AnalogRead => Some(PortKind::Analogue),
            Operation::TempRead => Some(PortKind::Temperature),
        }
    }
}

/// One command addressed to a port on one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub port_id: u8,
    pub op: Operation,
}

impl Command {
    pub fn new(port_id: u8, op: Operation) -> Self {
        Self { port_id, op }
    }

    /// A board-global command (identity, heartbeat).
    pub fn global(op: Operation) -> Self {
        Self { port_id: 0, op }
    }
}

/// Encode a command into the exact request frame the board expects.
///
/// Pure function of the command; the field order is fixed so one command
/// always produces one byte sequence.
pub fn encode(cmd: &Command) -> Vec<u8> {
    let (kind, section, value) = cmd.op.wire();
    format!(
        r#"{{"type":"{kind}","section":"{section}","item":{item},"value":{value}}}"#,
        item = cmd.port_id,
    )
    .into_bytes()
}

#[derive(Debug, Deserialize)]
struct WireRequest {
    #[serde(rename = "type")]
    kind: String,
    section: String,
    item: u8,
    value: i64,
}

/// Strict inverse of [`encode`]. Used by tests and board simulators; the
/// live path only ever decodes responses.
pub fn decode_command(frame: &[u8]) -> Result<Command, CodecError> {
    let req: WireRequest = serde_json::from_slice(frame)
        .map_err(|e| CodecError(format!("request is not valid JSON: {e}")))?;
    let is_set = match req.kind.as_str() {
        KIND_SET => true,
        KIND_GET => false,
        other => return Err(CodecError(format!("unknown command type: {other}"))),
    };

    let op = match (req.section.as_str(), is_set) {
        (SEC_WHO_I_AM, false) => Operation::WhoAmI,
        (SEC_HEARTBEAT, true) => Operation::Heartbeat,
        (SEC_MOTOR_ENABLE, true) => Operation::MotorEnable(req.value != 0),
        (SEC_MOTOR_STEP, true) => Operation::MotorStep(
            i32::try_from(req.value)
                .map_err(|_| CodecError(format!("step count out of range: {}", req.value)))?,
        ),
        (SEC_MOTOR_RPM_SPEED, true) => Operation::MotorSetRpm(in_range(req.value)?),
        (SEC_MOTOR_CURRENT, true) => Operation::MotorSetCurrent(in_range(req.value)?),
        (SEC_MOTOR_STEP_ANGLE, true) => Operation::MotorSetStepAngle(in_range(req.value)?),
        (SEC_POWER_OUTPUT, true) => Operation::PowerSet(in_range(req.value)?),
        (SEC_PWM_OUTPUT, true) => Operation::PwmSet(in_range(req.value)?),
        (SEC_PWM_ENABLE, true) => Operation::PwmEnable(req.value != 0),
        (SEC_ANALOG_INPUT, false) => Operation::AnalogRead,
        (SEC_TEMP_SENSOR, false) => Operation::TempRead,
        (section, _) => {
            return Err(CodecError(format!(
                "unknown section/type pairing: {section}/{}",
                req.kind
            )))
        }
    };

    Ok(Command {
        port_id: req.item,
        op,
    })
}

fn in_range<T: TryFrom<i64>>(value: i64) -> Result<T, CodecError> {
    T::try_from(value).map_err(|_| CodecError(format!("value out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic_and_exact() {
        let cmd = Command::new(0, Operation::MotorStep(25));
        let frame = encode(&cmd);
        assert_eq!(
            frame,
            br#"{"type":"SET","section":"Motor_step","item":0,"value":25}"#
        );
        assert_eq!(frame, encode(&cmd));
    }

    #[test]
    fn every_operation_round_trips() {
        let ops = [
            Operation::WhoAmI,
            Operation::Heartbeat,
            Operation::MotorEnable(true),
            Operation::MotorEnable(false),
            Operation::MotorStep(-480),
            Operation::MotorSetRpm(120),
            Operation::MotorSetCurrent(400),
            Operation::MotorSetStepAngle(8),
            Operation::PowerSet(1024),
            Operation::PwmSet(512),
            Operation::PwmEnable(true),
            Operation::AnalogRead,
            Operation::TempRead,
        ];
        for op in ops {
            let port_id = if op.port_kind().is_some() { 2 } else { 0 };
            let cmd = Command::new(port_id, op);
            let back = decode_command(&encode(&cmd)).expect("round trip");
            assert_eq!(back, cmd, "{op:?}");
        }
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let err = decode_command(br#"{"type":"SET","section":"RGB_red","item":0,"value":1}"#);
        assert!(err.is_err());
    }

    #[test]
    fn get_on_a_set_only_section_is_rejected() {
        let err = decode_command(br#"{"type":"GET","section":"Motor_step","item":0,"value":0}"#);
        assert!(err.is_err());
    }
}
