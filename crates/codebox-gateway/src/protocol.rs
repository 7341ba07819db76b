//! Wire protocol between the browser client and the gateway.
//!
//! Every frame is a JSON envelope `{type, data, callbackId}`. Responses to a
//! request reuse its `callbackId` and are typed `<type>Result`; a failed
//! request carries `data: null` and an `error` string.

use codebox_common::{FileNode, ProtocolError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A recognized client request, tagged by `type` with its payload in `data`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Request {
    /// List the immediate children of a directory (`""` is the root).
    FetchDir { path: String },
    FetchContent { path: String },
    UpdateContent { path: String, content: String },
    /// Raw input for the terminal.
    TerminalData { data: String },
    Resize { cols: u16, rows: u16 },
}

impl Request {
    /// Every `type` this gateway handles. Anything else is ignored.
    pub const KINDS: [&'static str; 5] =
        ["fetchDir", "fetchContent", "updateContent", "terminalData", "resize"];

    pub fn kind(&self) -> &'static str {
        match self {
            Request::FetchDir { .. } => "fetchDir",
            Request::FetchContent { .. } => "fetchContent",
            Request::UpdateContent { .. } => "updateContent",
            Request::TerminalData { .. } => "terminalData",
            Request::Resize { .. } => "resize",
        }
    }

    /// Workspace path the request touches, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Request::FetchDir { path }
            | Request::FetchContent { path }
            | Request::UpdateContent { path, .. } => Some(path),
            Request::TerminalData { .. } | Request::Resize { .. } => None,
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub callback_id: Option<String>,
    pub request: Request,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default, rename = "callbackId")]
    callback_id: Value,
}

/// Client callback ids are opaque; numbers are accepted and kept as text.
fn callback_id(raw: Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `fetchDir` also accepts a bare path string, or no data for the root.
fn dir_payload(data: Value) -> Value {
    match data {
        Value::Null => json!({ "path": "" }),
        Value::String(path) => json!({ "path": path }),
        other => other,
    }
}

/// Decode one text frame.
///
/// `Ok(None)` means a well-formed envelope of a type this gateway does not
/// handle; such frames are ignored.
pub fn decode(text: &str) -> Result<Option<Inbound>, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ProtocolError::Malformed("envelope is not an object".into()));
    }
    let raw: RawEnvelope =
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let kind = raw.kind.ok_or(ProtocolError::MissingType)?;
    if !Request::KINDS.contains(&kind.as_str()) {
        return Ok(None);
    }

    let data = if kind == "fetchDir" {
        dir_payload(raw.data)
    } else {
        raw.data
    };
    let request: Request = serde_json::from_value(json!({ "type": kind, "data": data }))
        .map_err(|e| ProtocolError::InvalidPayload {
            kind: kind.clone(),
            reason: e.to_string(),
        })?;

    if matches!(request, Request::Resize { cols, rows } if cols == 0 || rows == 0) {
        return Err(ProtocolError::InvalidPayload {
            kind,
            reason: "cols and rows must be positive".into(),
        });
    }

    Ok(Some(Inbound {
        callback_id: callback_id(raw.callback_id),
        request,
    }))
}

/// Messages sent from the gateway to the client.
///
/// Pushes are unsolicited; `*Result` variants answer a request and carry
/// `null` data when the request failed or has nothing to return.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Sent once the workspace is ready.
    #[serde(rename_all = "camelCase")]
    Loaded { root_content: Vec<FileNode> },

    Terminal { data: String },

    #[serde(rename_all = "camelCase")]
    TerminalClosed { exit_code: Option<u32> },

    /// Request-scoped failure that has no callback to answer.
    Error { message: String },

    FetchDirResult(Option<Vec<FileNode>>),
    FetchContentResult(Option<String>),
    UpdateContentResult(()),
    TerminalDataResult(()),
    ResizeResult(()),
}

impl ServerMessage {
    /// The `*Result` for `request` with no data.
    pub fn bare_result(request: &Request) -> Self {
        match request {
            Request::FetchDir { .. } => ServerMessage::FetchDirResult(None),
            Request::FetchContent { .. } => ServerMessage::FetchContentResult(None),
            Request::UpdateContent { .. } => ServerMessage::UpdateContentResult(()),
            Request::TerminalData { .. } => ServerMessage::TerminalDataResult(()),
            Request::Resize { .. } => ServerMessage::ResizeResult(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Loaded { .. } => "loaded",
            ServerMessage::Terminal { .. } => "terminal",
            ServerMessage::TerminalClosed { .. } => "terminalClosed",
            ServerMessage::Error { .. } => "error",
            ServerMessage::FetchDirResult(_) => "fetchDirResult",
            ServerMessage::FetchContentResult(_) => "fetchContentResult",
            ServerMessage::UpdateContentResult(()) => "updateContentResult",
            ServerMessage::TerminalDataResult(()) => "terminalDataResult",
            ServerMessage::ResizeResult(()) => "resizeResult",
        }
    }
}

/// A frame sent to the client: a message plus its correlation fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    #[serde(flatten)]
    pub message: ServerMessage,
    #[serde(rename = "callbackId", skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ServerMessage> for Outbound {
    fn from(message: ServerMessage) -> Self {
        Self {
            message,
            callback_id: None,
            error: None,
        }
    }
}

impl Outbound {
    pub fn loaded(root: &[FileNode]) -> Self {
        ServerMessage::Loaded {
            root_content: root.to_vec(),
        }
        .into()
    }

    pub fn terminal(data: String) -> Self {
        ServerMessage::Terminal { data }.into()
    }

    pub fn terminal_closed(exit_code: Option<u32>) -> Self {
        ServerMessage::TerminalClosed { exit_code }.into()
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
        .into()
    }

    /// Answer a request.
    pub fn reply(message: ServerMessage, callback_id: Option<String>) -> Self {
        Self {
            message,
            callback_id,
            error: None,
        }
    }

    /// Answer a failed request: its `*Result` with null data and `error` set.
    pub fn failure(request: &Request, callback_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            message: ServerMessage::bare_result(request),
            callback_id,
            error: Some(message.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.message.kind()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
