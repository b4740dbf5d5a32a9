//! Payload codecs
//!
//! A [`Codec`] turns [`Payload`]s into transport [`Message`]s and back. JSON
//! payloads travel as text frames, or as zlib-compressed binary frames when
//! compression is on. ETF payloads always travel as binary frames and are
//! never compressed on the way out.
//!
//! Which codecs exist is decided at build time by the `etf` and
//! `compression` cargo features; asking for a missing one is a configuration
//! error, reported before any connection is attempted.

use crate::error::{CodecError, ConfigError};
use crate::message::Message;
use crate::payload::Payload;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether this build can compress JSON payloads
pub const COMPRESSION_AVAILABLE: bool = cfg!(feature = "compression");

/// Whether this build can speak the binary-term encoding
pub const ETF_AVAILABLE: bool = cfg!(feature = "etf");

/// Wire encoding negotiated in the gateway URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8 JSON
    Json,
    /// Erlang external term format
    Etf,
}

impl Encoding {
    /// Value of the `encoding` query parameter
    pub const fn as_str(self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::Etf => "etf",
        }
    }

    /// Check if this encoding was compiled in
    pub const fn is_available(self) -> bool {
        match self {
            Encoding::Json => true,
            Encoding::Etf => ETF_AVAILABLE,
        }
    }
}

impl Default for Encoding {
    fn default() -> Self {
        if ETF_AVAILABLE {
            Encoding::Etf
        } else {
            Encoding::Json
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder/decoder for one connection's encoding and compression settings
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    encoding: Encoding,
    compress: bool,
}

impl Codec {
    /// Create a codec, rejecting settings this build cannot honor.
    pub fn new(encoding: Encoding, compress: bool) -> Result<Self, ConfigError> {
        if !encoding.is_available() {
            return Err(ConfigError::FeatureDisabled {
                option: "gateway.encoding = etf",
                feature: "etf",
            });
        }
        if compress && !COMPRESSION_AVAILABLE {
            return Err(ConfigError::FeatureDisabled {
                option: "gateway.compress",
                feature: "compression",
            });
        }
        Ok(Self { encoding, compress })
    }

    /// Plain JSON codec
    pub fn json() -> Self {
        Self {
            encoding: Encoding::Json,
            compress: false,
        }
    }

    /// Wire encoding
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Whether JSON payloads are compressed
    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Encode a payload into the message to put on the wire
    pub fn encode(&self, payload: &Payload) -> Result<Message, CodecError> {
        match self.encoding {
            #[cfg(feature = "etf")]
            Encoding::Etf => {
                let value =
                    serde_json::to_value(payload).map_err(|e| CodecError::Encode(e.to_string()))?;
                Ok(Message::Binary(crate::etf::pack(&value)?))
            }
            #[cfg(not(feature = "etf"))]
            Encoding::Etf => Err(CodecError::Unsupported(Encoding::Etf.to_string())),
            Encoding::Json => {
                let text =
                    serde_json::to_string(payload).map_err(|e| CodecError::Encode(e.to_string()))?;
                if self.compress {
                    Ok(Message::Binary(deflate(text.as_bytes())?))
                } else {
                    Ok(Message::Text(text))
                }
            }
        }
    }

    /// Decode a received message into a payload
    pub fn decode(&self, message: &Message) -> Result<Payload, CodecError> {
        match message {
            #[cfg(feature = "etf")]
            Message::Binary(data) if self.encoding == Encoding::Etf => {
                let value = crate::etf::unpack(data)?;
                serde_json::from_value(value).map_err(|e| CodecError::Decode(e.to_string()))
            }
            Message::Binary(data) if self.compress => {
                let inflated = inflate(data)?;
                from_json(&inflated)
            }
            Message::Binary(data) => from_json(data),
            Message::Text(text) => from_json(text.as_bytes()),
            Message::Close(_) => Err(CodecError::Decode(
                "close message carries no payload".to_string(),
            )),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            compress: COMPRESSION_AVAILABLE,
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("encoding", &self.encoding.as_str())
            .field("compress", &self.compress)
            .finish()
    }
}

fn from_json(data: &[u8]) -> Result<Payload, CodecError> {
    serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(feature = "compression")]
fn deflate(data: &[u8]) -> Result<Bytes, CodecError> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(Bytes::from(compressed))
}

#[cfg(not(feature = "compression"))]
fn deflate(_data: &[u8]) -> Result<Bytes, CodecError> {
    Err(CodecError::Unsupported("zlib compression".to_string()))
}

#[cfg(feature = "compression")]
fn inflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut decoder = ZlibDecoder::new(data);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| CodecError::Decode(format!("invalid zlib stream: {}", e)))?;
    Ok(inflated)
}

#[cfg(not(feature = "compression"))]
fn inflate(_data: &[u8]) -> Result<Vec<u8>, CodecError> {
    Err(CodecError::Unsupported("zlib compression".to_string()))
}
