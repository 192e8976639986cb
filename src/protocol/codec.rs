//! Text framing for the line-oriented wire protocol: `\r\n`-terminated
//! control lines, plus `PUB`/`MSG` frames whose payload is a raw byte count
//! rather than a length-tagged value.
//!
//! This module never touches a socket — it only builds strings and parses
//! headers. All I/O lives in [`crate::broker::connection`].

use super::types::{ConnectOpts, ServerInfo};
use crate::error::ProtocolError;

pub const CRLF: &str = "\r\n";

/// The verb a control line starts with, after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    Info(String),
    ConnectAck,
    Ok,
    Err(String),
    Ping,
    Pong,
    Msg(String),
    Unknown(String),
}

/// Parsed `MSG` header: `MSG <subject> <sid> [<reply>] <size>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgHeader {
    pub subject: String,
    pub sid: u64,
    pub reply: Option<String>,
    pub size: usize,
}

/// Classify a single control line by its leading token. Lines carrying an
/// inline argument (`INFO {...}`, `-ERR '...'`, `MSG ...`) keep the
/// remainder attached for the caller to parse further.
pub fn classify(line: &str) -> Verb {
    let line = line.trim_end_matches("\r\n").trim_end_matches('\n');
    let (verb, rest) = match line.split_once(' ') {
        Some((v, r)) => (v, r.trim_start()),
        None => (line, ""),
    };
    match verb.to_ascii_uppercase().as_str() {
        "INFO" => Verb::Info(rest.to_string()),
        "+OK" => Verb::Ok,
        "-ERR" => Verb::Err(strip_quotes(rest)),
        "PING" => Verb::Ping,
        "PONG" => Verb::Pong,
        "MSG" => Verb::Msg(rest.to_string()),
        "CONNECT" => Verb::ConnectAck,
        other => Verb::Unknown(other.to_string()),
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim().trim_matches('\'').to_string()
}

/// Build a `CONNECT {json}\r\n` line.
pub fn build_connect(opts: &ConnectOpts) -> Result<String, ProtocolError> {
    let json = serde_json::to_string(opts)
        .map_err(|e| ProtocolError::Malformed(format!("CONNECT options: {e}")))?;
    Ok(format!("CONNECT {json}{CRLF}"))
}

/// Build the header line for a `PUB` frame. The caller is responsible for
/// writing the payload bytes and trailing `\r\n` immediately after,
/// without interleaving any other write.
pub fn build_pub_header(subject: &str, reply: Option<&str>, size: usize) -> String {
    match reply {
        Some(r) => format!("PUB {subject} {r} {size}{CRLF}"),
        None => format!("PUB {subject} {size}{CRLF}"),
    }
}

/// Build a `SUB <subject> [<queue>] <sid>\r\n` line.
pub fn build_sub(subject: &str, queue: Option<&str>, sid: u64) -> String {
    match queue {
        Some(q) => format!("SUB {subject} {q} {sid}{CRLF}"),
        None => format!("SUB {subject} {sid}{CRLF}"),
    }
}

/// Build an `UNSUB <sid> [<max>]\r\n` line.
pub fn build_unsub(sid: u64, max_msgs: Option<u64>) -> String {
    match max_msgs {
        Some(max) => format!("UNSUB {sid} {max}{CRLF}"),
        None => format!("UNSUB {sid}{CRLF}"),
    }
}

/// Build a `PONG\r\n` line.
pub fn build_pong() -> String {
    format!("PONG{CRLF}")
}

/// Build a `PING\r\n` line.
pub fn build_ping() -> String {
    format!("PING{CRLF}")
}

/// Build the header line for a `MSG` frame (server -> client framing; kept
/// here so round-trip tests can exercise the full encode/decode cycle).
pub fn build_msg_header(subject: &str, sid: u64, reply: Option<&str>, size: usize) -> String {
    match reply {
        Some(r) => format!("MSG {subject} {sid} {r} {size}{CRLF}"),
        None => format!("MSG {subject} {sid} {size}{CRLF}"),
    }
}

/// Parse a `MSG` header's argument tail (the text after the `MSG ` token)
/// into `(subject, sid, reply?, size)`.
///
/// `MSG <subject> <sid> [<reply>] <size>` — four tokens means no reply,
/// five means a reply subject occupies the third slot.
pub fn parse_msg_args(args: &str) -> Result<MsgHeader, ProtocolError> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let (subject, sid, reply, size) = match tokens.as_slice() {
        [subject, sid, size] => (*subject, *sid, None, *size),
        [subject, sid, reply, size] => (*subject, *sid, Some(*reply), *size),
        _ => {
            return Err(ProtocolError::Malformed(format!(
                "bad MSG header: {args:?}"
            )))
        }
    };

    let sid = sid
        .parse::<u64>()
        .map_err(|_| ProtocolError::Malformed(format!("non-integer sid: {sid:?}")))?;
    let size = size
        .parse::<usize>()
        .map_err(|_| ProtocolError::InvalidSize(format!("non-integer size: {size:?}")))?;

    Ok(MsgHeader {
        subject: subject.to_string(),
        sid,
        reply: reply.map(str::to_string),
        size,
    })
}

/// Parse the JSON tail of an `INFO` line into a [`ServerInfo`].
pub fn parse_info(args: &str) -> Result<ServerInfo, ProtocolError> {
    let info: ServerInfo =
        serde_json::from_str(args).map_err(|e| ProtocolError::Malformed(format!("INFO: {e}")))?;
    if info.max_payload == 0 {
        return Err(ProtocolError::Malformed(
            "INFO.max_payload must be > 0".to_string(),
        ));
    }
    Ok(info)
}
