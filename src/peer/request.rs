use crate::error::{LinkError, LinkResult};
use crate::peer::PeerRequest;

/// A client's text request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Single peer transaction
    Peer(PeerRequest),
    /// Time, alarm, sunrise duration and brightness in one report
    Settings,
    /// Written to the peer as is, outside the command queue
    Raw(String),
    /// Flash the Intel-HEX file at the given path
    Flash(String),
    StartReadingLogs,
    StopReadingLogs,
}

impl ClientRequest {
    pub fn parse(text: &str) -> LinkResult<Self> {
        let text = text.trim();
        let (op, parameter) = match text.split_once(' ') {
            Some((op, rest)) => (op, rest.trim()),
            None => (text, ""),
        };

        let require = |parameter: &str| {
            if parameter.is_empty() {
                Err(LinkError::MissingParameter(op.to_string()))
            } else {
                Ok(parameter.to_string())
            }
        };

        let request = match op {
            "connect" => ClientRequest::Peer(PeerRequest::Connect),
            "settings" => ClientRequest::Settings,
            "gt" => ClientRequest::Peer(PeerRequest::GetTime),
            "ga" => ClientRequest::Peer(PeerRequest::GetAlarm),
            "gsd" => ClientRequest::Peer(PeerRequest::GetSunriseDuration),
            "gb" => ClientRequest::Peer(PeerRequest::GetBrightness),
            "st" => ClientRequest::Peer(PeerRequest::SetTime(require(parameter)?)),
            "sa" => ClientRequest::Peer(PeerRequest::SetAlarmTime(require(parameter)?)),
            "ea" => ClientRequest::Peer(PeerRequest::EnableAlarm(require(parameter)?)),
            "ssd" => ClientRequest::Peer(PeerRequest::SetSunriseDuration(require(parameter)?)),
            "sb" => ClientRequest::Peer(PeerRequest::SetBrightness(require(parameter)?)),
            "raw" | "arduino_command" => ClientRequest::Raw(require(parameter)?),
            "flash" => ClientRequest::Flash(require(parameter)?),
            "start_reading_logs" => ClientRequest::StartReadingLogs,
            "stop_reading_logs" => ClientRequest::StopReadingLogs,
            _ => return Err(LinkError::UnknownRequest(text.to_string())),
        };
        Ok(request)
    }
}
