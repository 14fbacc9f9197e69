//! # Wire Codecs
//!
//! One logical message set, two interchangeable encodings. The client is built
//! around a single [`Codec`] strategy object chosen from the [`Encoding`] at
//! construction; nothing above this module knows which wire is in use.
//!
//! Decoding is lenient in one direction only: a frame whose union carries a
//! variant this client does not know decodes to `Ok(None)`, while a frame that
//! cannot be parsed at all is an [`OtcError::Decode`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{OtcError, OtcResult};
use crate::model::{Inbound, OtcRequest};

/// Binary (protocol-buffer) codec.
pub mod binary;
/// JSON text codec.
pub mod json;
/// Hand-declared `prost` schema of the binary wire.
pub mod proto;

pub use binary::BinaryCodec;
pub use json::JsonCodec;

/// URL suffix that selects the binary endpoint.
const BINARY_PATH_SUFFIX: &str = "/binary";

/// A single websocket payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Binary(Vec<u8>),
    Text(String),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Binary(bytes) => bytes.len(),
            Frame::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wire encoding, fixed for the lifetime of a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Binary,
    Json,
}

impl Encoding {
    /// Infers the encoding from the endpoint: `.../binary` serves protobuf.
    pub fn from_url(url: &str) -> Self {
        if url.trim_end_matches('/').ends_with(BINARY_PATH_SUFFIX) {
            Encoding::Binary
        } else {
            Encoding::Json
        }
    }

    /// JSON requested against the binary endpoint drops the `/binary` suffix;
    /// any other combination leaves the url untouched.
    pub fn endpoint_for(&self, url: &str) -> String {
        match self {
            Encoding::Json => {
                let base = url.trim_end_matches('/');
                base.strip_suffix(BINARY_PATH_SUFFIX).unwrap_or(url).to_string()
            }
            Encoding::Binary => url.to_string(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Binary => f.write_str("binary"),
            Encoding::Json => f.write_str("json"),
        }
    }
}

impl FromStr for Encoding {
    type Err = OtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "protobuf" | "proto" => Ok(Encoding::Binary),
            "json" | "text" => Ok(Encoding::Json),
            other => Err(OtcError::InvalidInput(format!("unknown encoding '{other}'"))),
        }
    }
}

/// Marshals the logical message set to and from websocket frames.
///
/// Both directions are implemented for both message kinds so that test servers
/// can reuse the client's codec.
pub trait Codec: Send + Sync {
    fn encoding(&self) -> Encoding;

    fn encode_request(&self, request: &OtcRequest) -> OtcResult<Frame>;

    fn decode_request(&self, frame: &Frame) -> OtcResult<OtcRequest>;

    fn encode_inbound(&self, inbound: &Inbound) -> OtcResult<Frame>;

    /// `Ok(None)` means the frame was well-formed but carried an unknown variant.
    fn decode_inbound(&self, frame: &Frame) -> OtcResult<Option<Inbound>>;
}

/// Builds the codec strategy for an encoding.
pub fn codec_for(encoding: Encoding) -> Arc<dyn Codec> {
    match encoding {
        Encoding::Binary => Arc::new(BinaryCodec),
        Encoding::Json => Arc::new(JsonCodec),
    }
}
