//! Commands understood by the peer firmware and the reporting of their
//! results to clients.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::LinkResult;
use crate::interface::SerialChannel;
use crate::scheduler::{Command, Transaction};

pub mod protocol;
pub mod request;

use protocol::Operation;

/// Opaque identifier of whoever asked for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where results, progress and errors are reported
pub trait ReplySink {
    fn deliver(&mut self, client: ClientId, text: &str);
}

impl ReplySink for Vec<(ClientId, String)> {
    fn deliver(&mut self, client: ClientId, text: &str) {
        self.push((client, text.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRequest {
    Connect,
    GetTime,
    GetAlarm,
    GetSunriseDuration,
    GetBrightness,
    SetTime(String),
    EnableAlarm(String),
    SetAlarmTime(String),
    SetSunriseDuration(String),
    SetBrightness(String),
}

impl PeerRequest {
    pub fn operation(&self) -> &'static Operation {
        match self {
            PeerRequest::Connect => &protocol::CONNECT,
            PeerRequest::GetTime => &protocol::GET_TIME,
            PeerRequest::GetAlarm => &protocol::GET_ALARM,
            PeerRequest::GetSunriseDuration => &protocol::GET_SUNRISE_DURATION,
            PeerRequest::GetBrightness => &protocol::GET_BRIGHTNESS,
            PeerRequest::SetTime(_) => &protocol::SET_TIME,
            PeerRequest::EnableAlarm(_) => &protocol::ENABLE_ALARM,
            PeerRequest::SetAlarmTime(_) => &protocol::SET_ALARM_TIME,
            PeerRequest::SetSunriseDuration(_) => &protocol::SET_SUNRISE_DURATION,
            PeerRequest::SetBrightness(_) => &protocol::SET_BRIGHTNESS,
        }
    }

    fn parameter(&self) -> Option<&str> {
        match self {
            PeerRequest::SetTime(p)
            | PeerRequest::EnableAlarm(p)
            | PeerRequest::SetAlarmTime(p)
            | PeerRequest::SetSunriseDuration(p)
            | PeerRequest::SetBrightness(p) => Some(p),
            _ => None,
        }
    }

    /// Full request line as written to the peer
    pub fn wire_text(&self) -> String {
        let op = self.operation();
        if op.takes_parameter() {
            format!("{}{}\n", op.request, self.parameter().unwrap_or_default())
        } else {
            op.request.to_string()
        }
    }
}

/// Answers collected for one settings query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsReport {
    pub time: Option<String>,
    pub alarm: Option<String>,
    pub sunrise_duration: Option<String>,
    pub brightness: Option<String>,
}

impl SettingsReport {
    fn record(&mut self, request: &PeerRequest, value: &str) {
        let slot = match request {
            PeerRequest::GetTime => &mut self.time,
            PeerRequest::GetAlarm => &mut self.alarm,
            PeerRequest::GetSunriseDuration => &mut self.sunrise_duration,
            PeerRequest::GetBrightness => &mut self.brightness,
            _ => return,
        };
        *slot = Some(value.to_string());
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("ERROR: {}", e))
    }
}

/// Peer-facing state shared by all commands
#[derive(Debug, Default)]
pub struct PeerState {
    reports: HashMap<ClientId, SettingsReport>,
    /// Set while the peer reboots after flashing; its output is noise
    /// until the connect handshake is acknowledged.
    pub output_suppressed: bool,
}

/// Everything a command may touch while it runs
pub struct PeerContext<'a> {
    pub serial: &'a mut dyn SerialChannel,
    pub replies: &'a mut dyn ReplySink,
    pub state: &'a mut PeerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Nobody,
    Client(ClientId),
    /// Part of a settings query; the last part delivers the report
    Settings { client: ClientId, last: bool },
}

/// One request/response transaction with the peer. Owns everything it
/// needs to report its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCommand {
    request: PeerRequest,
    delivery: Delivery,
}

impl PeerCommand {
    pub fn new(request: PeerRequest, client: ClientId) -> Self {
        PeerCommand {
            request,
            delivery: Delivery::Client(client),
        }
    }

    /// Handshake nobody waits on, used after the peer reboots
    pub fn handshake() -> Self {
        PeerCommand {
            request: PeerRequest::Connect,
            delivery: Delivery::Nobody,
        }
    }

    /// The four queries whose answers form one settings report
    pub fn settings_query(client: ClientId) -> [Command<PeerCommand>; 4] {
        let part = |request, last| {
            Command::new(PeerCommand {
                request,
                delivery: Delivery::Settings { client, last },
            })
        };
        [
            part(PeerRequest::GetTime, false),
            part(PeerRequest::GetAlarm, false),
            part(PeerRequest::GetSunriseDuration, false),
            part(PeerRequest::GetBrightness, true),
        ]
    }

    fn deliver(&self, ctx: &mut PeerContext<'_>, text: &str) {
        if let Delivery::Client(client) = self.delivery {
            ctx.replies.deliver(client, text);
        }
    }

    fn finish_settings(&self, ctx: &mut PeerContext<'_>) {
        if let Delivery::Settings { client, last: true } = self.delivery {
            let report = ctx.state.reports.remove(&client).unwrap_or_default();
            ctx.replies.deliver(client, &report.to_json());
        }
    }
}

impl<'a> Transaction<PeerContext<'a>> for PeerCommand {
    fn name(&self) -> &str {
        self.request.operation().name
    }

    fn execute(&mut self, ctx: &mut PeerContext<'a>) -> LinkResult<()> {
        let text = self.request.wire_text();
        info!("TO   PEER: {}", text.trim_end());
        ctx.serial.send(text.as_bytes())
    }

    fn handle_response(&mut self, line: &str, ctx: &mut PeerContext<'a>) -> bool {
        let op = self.request.operation();
        let Some(payload) = op.payload(line) else {
            return false;
        };

        match self.request {
            PeerRequest::Connect => {
                ctx.state.output_suppressed = false;
                info!("Peer acknowledged connect");
                self.deliver(ctx, "connect OK");
            }
            _ => match self.delivery {
                Delivery::Settings { client, .. } => {
                    ctx.state
                        .reports
                        .entry(client)
                        .or_default()
                        .record(&self.request, payload);
                    self.finish_settings(ctx);
                }
                _ if op.ack.ends_with(' ') => self.deliver(ctx, payload),
                _ => self.deliver(ctx, &format!("{} OK", op.name)),
            },
        }
        true
    }

    fn handle_timeout(&mut self, ctx: &mut PeerContext<'a>) {
        let name = self.request.operation().name;
        warn!("No response from peer for {}", name);

        if self.request == PeerRequest::Connect {
            ctx.state.output_suppressed = false;
        }
        self.deliver(ctx, &format!("ERROR: no response from peer for {}", name));
        self.finish_settings(ctx);
    }
}
