use crate::error::CodecError;
use core::fmt;
use serde::Deserialize;

const RES_ACK: &str = "ACK";

/// Fault codes the board reports in place of an ACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultCode {
    /// "ERR": unspecified failure.
    General,
    /// "ERR0": the board could not parse the request frame.
    BadRequestFormat,
    /// "ERR1": unknown command type.
    BadCommandType,
    /// "ERR2": unknown command section.
    UnknownSection,
    /// "ERR3": item not valid for the section.
    BadItem,
    /// "ERR4": value out of range for the section.
    ValueOutOfRange,
    /// A code this library does not know; kept verbatim.
    Other(String),
}

impl FaultCode {
    fn from_wire(code: &str) -> Self {
        match code {
            "ERR" => FaultCode::General,
            "ERR0" => FaultCode::BadRequestFormat,
            "ERR1" => FaultCode::BadCommandType,
            "ERR2" => FaultCode::UnknownSection,
            "ERR3" => FaultCode::BadItem,
            "ERR4" => FaultCode::ValueOutOfRange,
            other => FaultCode::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultCode::General => write!(f, "ERR (unspecified failure)"),
            FaultCode::BadRequestFormat => write!(f, "ERR0 (request not understood)"),
            FaultCode::BadCommandType => write!(f, "ERR1 (bad command type)"),
            FaultCode::UnknownSection => write!(f, "ERR2 (unknown section)"),
            FaultCode::BadItem => write!(f, "ERR3 (item not valid for section)"),
            FaultCode::ValueOutOfRange => write!(f, "ERR4 (value out of range)"),
            FaultCode::Other(code) => write!(f, "{code} (unrecognized fault code)"),
        }
    }
}

/// Decoded board response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// ACK; the payload is the requested value for GET commands and
    /// incidental for SET commands.
    Ok(String),
    /// The board explicitly reported a fault.
    Fault(FaultCode),
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    payload: serde_json::Value,
    error: String,
}

fn payload_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decode one response frame. Bytes that do not match the known response
/// shape fail with [`CodecError`]; the caller must treat that as a protocol
/// desync, never as something to retry silently.
pub fn decode_response(frame: &[u8]) -> Result<Response, CodecError> {
    let resp: WireResponse = serde_json::from_slice(frame).map_err(|e| {
        CodecError(format!(
            "response is not valid JSON ({e}): {}",
            String::from_utf8_lossy(frame)
        ))
    })?;
    if resp.error == RES_ACK {
        Ok(Response::Ok(payload_text(resp.payload)))
    } else {
        Ok(Response::Fault(FaultCode::from_wire(&resp.error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_with_payload_decodes_to_ok() {
        let resp = decode_response(br#"{"payload":"180","error":"ACK"}"#).expect("decode");
        assert_eq!(resp, Response::Ok("180".to_string()));
    }

    #[test]
    fn numeric_payloads_are_kept_as_text() {
        let resp = decode_response(br#"{"payload":180,"error":"ACK"}"#).expect("decode");
        assert_eq!(resp, Response::Ok("180".to_string()));
    }

    #[test]
    fn known_fault_codes_are_mapped() {
        let resp = decode_response(br#"{"payload":0,"error":"ERR4"}"#).expect("decode");
        assert_eq!(resp, Response::Fault(FaultCode::ValueOutOfRange));
    }

    #[test]
    fn unknown_fault_codes_are_preserved() {
        let resp = decode_response(br#"{"payload":0,"error":"ERR9"}"#).expect("decode");
        assert_eq!(
            resp,
            Response::Fault(FaultCode::Other("ERR9".to_string()))
        );
    }

    #[test]
    fn non_json_bytes_are_malformed() {
        assert!(decode_response(b"garbage\x00").is_err());
        assert!(decode_response(br#"{"unrelated":1}"#).is_err());
    }
}
