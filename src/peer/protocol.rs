//! ASCII request/acknowledgment literals understood by the peer firmware.

/// One peer operation: the request text sent to the peer and the prefix of
/// the line that acknowledges it. Requests without a trailing newline take
/// a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub request: &'static str,
    pub ack: &'static str,
}

impl Operation {
    pub fn takes_parameter(&self) -> bool {
        !self.request.ends_with('\n')
    }

    /// Whatever follows the ack prefix, if `line` acknowledges this operation
    pub fn payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        line.strip_prefix(self.ack)
    }
}

pub const CONNECT: Operation = Operation {
    name: "connect",
    request: "ESP: connect\n",
    ack: "TOESP: connect ACK",
};

pub const SET_TIME: Operation = Operation {
    name: "set-time",
    request: "ESP: st ",
    ack: "TOESP: st ACK",
};

pub const GET_TIME: Operation = Operation {
    name: "get-time",
    request: "ESP: gt\n",
    ack: "TOESP: gt ACK ",
};

pub const SET_ALARM_TIME: Operation = Operation {
    name: "set-alarm-time",
    request: "ESP: sa ",
    ack: "TOESP: sa ACK",
};

pub const GET_ALARM: Operation = Operation {
    name: "get-alarm",
    request: "ESP: ga\n",
    ack: "TOESP: ga ACK ",
};

pub const ENABLE_ALARM: Operation = Operation {
    name: "enable-alarm",
    request: "ESP: ea ",
    ack: "TOESP: ea ACK ",
};

pub const SET_SUNRISE_DURATION: Operation = Operation {
    name: "set-sunrise-duration",
    request: "ESP: ssd ",
    ack: "TOESP: ssd ACK",
};

pub const GET_SUNRISE_DURATION: Operation = Operation {
    name: "get-sunrise-duration",
    request: "ESP: gsd\n",
    ack: "TOESP: gsd ACK ",
};

pub const SET_BRIGHTNESS: Operation = Operation {
    name: "set-brightness",
    request: "ESP: sb ",
    ack: "TOESP: sb ACK ",
};

pub const GET_BRIGHTNESS: Operation = Operation {
    name: "get-brightness",
    request: "ESP: gb\n",
    ack: "TOESP: gb ACK ",
};

/// Sent by the peer when it wants the supervisor restarted
pub const RESET_REQUEST: &str = "TOESP: RESETESP";
