use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Convert,
    Delete,
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Success,
    Warning,
    Failure,
}

impl LogKind {
    fn marker(self) -> &'static str {
        match self {
            LogKind::Info => "",
            LogKind::Success => "✓ ",
            LogKind::Warning => "⚠ ",
            LogKind::Failure => "✗ ",
        }
    }
}

/// A human-readable log line; the kind travels as a leading marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LogKind,
    pub text: String,
}

impl LogLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Warning,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Failure,
            text: text.into(),
        }
    }

    pub fn blank() -> Self {
        Self::info("")
    }

    pub fn parse(rendered: &str) -> Self {
        for kind in [LogKind::Success, LogKind::Warning, LogKind::Failure] {
            if let Some(text) = rendered.strip_prefix(kind.marker()) {
                return Self {
                    kind,
                    text: text.to_string(),
                };
            }
        }
        Self::info(rendered)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.marker(), self.text)
    }
}

/// One record of the batch progress stream. `Complete` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireEvent", try_from = "WireEvent")]
pub enum ProgressEvent {
    Log(LogLine),
    Progress {
        phase: Phase,
        current: usize,
        total: usize,
        message: String,
    },
    Complete {
        processed: usize,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }
}

impl From<LogLine> for ProgressEvent {
    fn from(line: LogLine) -> Self {
        ProgressEvent::Log(line)
    }
}

/// JSON shape understood by the browser client.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ProgressEvent> for WireEvent {
    fn from(event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::Log(line) => WireEvent {
                log: Some(line.to_string()),
                ..Default::default()
            },
            ProgressEvent::Progress {
                phase,
                current,
                total,
                message,
            } => WireEvent {
                progress: Some(true),
                phase: Some(phase),
                current: Some(current),
                total: Some(total),
                message: Some(message),
                ..Default::default()
            },
            ProgressEvent::Complete { processed } => WireEvent {
                complete: Some(true),
                processed: Some(processed),
                ..Default::default()
            },
            ProgressEvent::Error { message } => WireEvent {
                error: Some(message),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<WireEvent> for ProgressEvent {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, String> {
        if let Some(message) = wire.error {
            return Ok(ProgressEvent::Error { message });
        }
        if wire.complete == Some(true) {
            return Ok(ProgressEvent::Complete {
                processed: wire.processed.unwrap_or(0),
            });
        }
        if wire.progress == Some(true) {
            return match (wire.current, wire.total) {
                (Some(current), Some(total)) => Ok(ProgressEvent::Progress {
                    phase: wire.phase.unwrap_or(Phase::Convert),
                    current,
                    total,
                    message: wire.message.unwrap_or_default(),
                }),
                _ => Err("progress event without current/total".to_string()),
            };
        }
        match wire.log {
            Some(log) => Ok(ProgressEvent::Log(LogLine::parse(&log))),
            None => Err("event carries none of log/progress/complete/error".to_string()),
        }
    }
}
