//! Request codes
//!
//! The station recognises six request kinds. Each is identified by a five
//! character code: the kind letter followed by four characters granted with
//! the session (the base form uses `XXXX` as placeholder). Some requests carry
//! a parameter suffix, and every request is terminated with `\r`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ProtocolError;

/// Length of a request code, without suffix or terminator
pub const REQUEST_CODE_LEN: usize = 5;

/// Byte terminating every request on the wire
pub const REQUEST_TERMINATOR: u8 = b'\r';

/// Request kinds understood by the station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Echo packet ('E')
    Echo,
    /// Error-free camera image ('M')
    Image,
    /// Camera image with transmission errors ('G')
    DamagedImage,
    /// GPS track or GPS-pinned map image ('P')
    Gps,
    /// ARQ acknowledgement, asks for the next packet ('Q')
    Ack,
    /// ARQ negative acknowledgement, asks for the same packet again ('R')
    Nack,
}

impl RequestKind {
    /// All kinds, in the order they are listed in configuration files
    pub const ALL: [RequestKind; 6] = [
        RequestKind::Echo,
        RequestKind::Image,
        RequestKind::DamagedImage,
        RequestKind::Gps,
        RequestKind::Ack,
        RequestKind::Nack,
    ];

    /// Leading letter of codes of this kind
    pub fn letter(&self) -> char {
        match self {
            RequestKind::Echo => 'E',
            RequestKind::Image => 'M',
            RequestKind::DamagedImage => 'G',
            RequestKind::Gps => 'P',
            RequestKind::Ack => 'Q',
            RequestKind::Nack => 'R',
        }
    }

    /// Kind identified by a code's leading letter
    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.letter() == letter)
    }

    /// Placeholder code of this kind, e.g. `EXXXX`
    pub fn base_code(&self) -> String {
        format!("{}XXXX", self.letter())
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Echo => "echo",
            RequestKind::Image => "image",
            RequestKind::DamagedImage => "damaged image",
            RequestKind::Gps => "gps",
            RequestKind::Ack => "ack",
            RequestKind::Nack => "nack",
        };
        f.write_str(name)
    }
}

/// A validated five character request code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCode {
    kind: RequestKind,
    code: String,
}

impl RequestCode {
    /// Validate `code` as a code of the given kind
    pub fn new(kind: RequestKind, code: impl Into<String>) -> Result<Self, ProtocolError> {
        let code = code.into();
        let invalid = |reason| ProtocolError::InvalidRequestCode {
            code: code.clone(),
            reason,
        };

        if code.len() != REQUEST_CODE_LEN {
            return Err(invalid("expected exactly 5 characters"));
        }
        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid("only ASCII letters and digits are allowed"));
        }
        if !code.starts_with(kind.letter()) {
            return Err(invalid("leading letter does not match the request kind"));
        }

        Ok(Self { kind, code })
    }

    /// Placeholder code of the given kind
    pub fn base(kind: RequestKind) -> Self {
        Self {
            kind,
            code: kind.base_code(),
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Request with no parameters
    pub fn request(&self) -> Request {
        Request::new(self.clone())
    }

    /// Request with a parameter suffix
    pub fn with_suffix(&self, suffix: impl Into<String>) -> Request {
        Request::new(self.clone()).with_suffix(suffix)
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// A request ready to be written to the station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    code: RequestCode,
    suffix: String,
}

impl Request {
    pub fn new(code: RequestCode) -> Self {
        Self {
            code,
            suffix: String::new(),
        }
    }

    /// Append parameters (e.g. `R=1028090` or encoded GPS pins)
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix.push_str(&suffix.into());
        self
    }

    pub fn kind(&self) -> RequestKind {
        self.code.kind()
    }

    pub fn code(&self) -> &RequestCode {
        &self.code
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Wire form: code, suffix and the terminating carriage return
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(REQUEST_CODE_LEN + self.suffix.len() + 1);
        bytes.extend_from_slice(self.code.as_str().as_bytes());
        bytes.extend_from_slice(self.suffix.as_bytes());
        bytes.push(REQUEST_TERMINATOR);
        bytes
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.code, self.suffix)
    }
}

/// The six request codes granted for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCodes {
    pub echo: String,
    pub image: String,
    pub damaged_image: String,
    pub gps: String,
    pub ack: String,
    pub nack: String,
}

impl Default for RequestCodes {
    fn default() -> Self {
        Self {
            echo: RequestKind::Echo.base_code(),
            image: RequestKind::Image.base_code(),
            damaged_image: RequestKind::DamagedImage.base_code(),
            gps: RequestKind::Gps.base_code(),
            ack: RequestKind::Ack.base_code(),
            nack: RequestKind::Nack.base_code(),
        }
    }
}

impl RequestCodes {
    fn raw(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Echo => &self.echo,
            RequestKind::Image => &self.image,
            RequestKind::DamagedImage => &self.damaged_image,
            RequestKind::Gps => &self.gps,
            RequestKind::Ack => &self.ack,
            RequestKind::Nack => &self.nack,
        }
    }

    /// Validated code for the given kind
    pub fn get(&self, kind: RequestKind) -> Result<RequestCode, ProtocolError> {
        RequestCode::new(kind, self.raw(kind))
    }

    /// Check every code, reporting the first invalid one
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for kind in RequestKind::ALL {
            self.get(kind)?;
        }
        Ok(())
    }
}
