//! Sync message codec.
//!
//! One text message per tick carries two positions, `(x1, y1, x2, y2)`, as
//! four fixed-width decimal fields separated by single spaces. With
//! [`WireFormat::V1`] (width 7, precision 3):
//!
//! ```text
//! texture (100, 200), message (0, 0)  ->  "100.000 200.000 000.000 000.000"
//! texture (-5, 12),   message (3, 4)  ->  "-05.000 012.000 003.000 004.000"
//! ```
//!
//! Encoding is strict: every field is exactly `width` characters, so the
//! message length is known up front ([`WireFormat::message_len`]). Decoding
//! is tolerant: fields are split on any run of whitespace and parsed as
//! decimals, so a peer with a different width still interoperates.

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::math::IVec2;

/// The replicated subset of the scene: two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Position of the texture (logo) entity.
    pub texture: IVec2,
    /// Position of the message (text) entity.
    pub message: IVec2,
}

impl SyncSnapshot {
    pub const fn new(texture: IVec2, message: IVec2) -> Self {
        Self { texture, message }
    }

    fn fields(&self) -> [i32; 4] {
        [self.texture.x, self.texture.y, self.message.x, self.message.y]
    }
}

/// Field layout both ends of a channel agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFormat {
    /// Characters per field, sign and decimal point included.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Fractional digits per field.
    #[serde(default = "default_precision")]
    pub precision: usize,
    /// Optional literal appended after the four fields.
    #[serde(default)]
    pub sentinel: Option<String>,
}

fn default_width() -> usize {
    WireFormat::V1.width
}

fn default_precision() -> usize {
    WireFormat::V1.precision
}

impl Default for WireFormat {
    fn default() -> Self {
        Self::V1
    }
}

impl WireFormat {
    /// Width 7, three decimals, no sentinel. Carries x/y in `-99..=999`.
    pub const V1: WireFormat = WireFormat {
        width: 7,
        precision: 3,
        sentinel: None,
    };

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = Some(sentinel.into());
        self
    }

    /// Exact byte length of every encoded message.
    pub fn message_len(&self) -> usize {
        let fields = 4 * self.width + 3;
        match &self.sentinel {
            Some(s) => fields + 1 + s.len(),
            None => fields,
        }
    }

    pub fn encode(&self, snapshot: &SyncSnapshot) -> Result<String, WireError> {
        let mut out = String::with_capacity(self.message_len());
        for (i, value) in snapshot.fields().into_iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let field = format!(
                "{:0width$.precision$}",
                f64::from(value),
                width = self.width,
                precision = self.precision
            );
            if field.len() > self.width {
                return Err(WireError::FieldOverflow {
                    value,
                    width: self.width,
                });
            }
            out.push_str(&field);
        }
        if let Some(sentinel) = &self.sentinel {
            out.push(' ');
            out.push_str(sentinel);
        }
        Ok(out)
    }

    pub fn decode(&self, message: &str) -> Result<SyncSnapshot, WireError> {
        let malformed = |reason: String| WireError::Malformed {
            payload: message.to_string(),
            reason,
        };

        let mut tokens = message.split_whitespace();
        let mut fields = [0i32; 4];
        for (i, slot) in fields.iter_mut().enumerate() {
            let token = tokens
                .next()
                .ok_or_else(|| malformed(format!("expected 4 fields, found {i}")))?;
            *slot = parse_field(token)
                .ok_or_else(|| malformed(format!("field {} is not a coordinate: {token:?}", i + 1)))?;
        }

        match (&self.sentinel, tokens.next()) {
            (None, None) => {}
            (Some(expected), Some(found)) if found == expected.as_str() => {}
            (Some(expected), found) => {
                return Err(malformed(format!(
                    "expected sentinel {expected:?}, found {found:?}"
                )))
            }
            (None, Some(found)) => return Err(malformed(format!("trailing token {found:?}"))),
        }
        if let Some(extra) = tokens.next() {
            return Err(malformed(format!("trailing token {extra:?}")));
        }

        let [x1, y1, x2, y2] = fields;
        Ok(SyncSnapshot::new(IVec2::new(x1, y1), IVec2::new(x2, y2)))
    }

    /// Decodes raw payload bytes; non-UTF-8 input is malformed.
    pub fn decode_bytes(&self, payload: &[u8]) -> Result<SyncSnapshot, WireError> {
        let message = std::str::from_utf8(payload).map_err(|e| WireError::Malformed {
            payload: String::from_utf8_lossy(payload).into_owned(),
            reason: e.to_string(),
        })?;
        self.decode(message)
    }
}

/// Parses a decimal token and rounds it to the nearest pixel.
fn parse_field(token: &str) -> Option<i32> {
    let value = token.parse::<f64>().ok().filter(|v| v.is_finite())?.round();
    if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return None;
    }
    Some(value as i32)
}
