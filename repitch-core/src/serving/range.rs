//! HTTP `Range` header parsing (RFC 7233, single byte range).
//!
//! Parsing and resolution are split: [`RangeSpec::parse`] only looks at the
//! header syntax, [`RangeSpec::resolve`] applies it to a known file length.

use std::fmt;

/// Errors from parsing or resolving a `Range` header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Range not satisfiable for {total_size} bytes")]
    NotSatisfiable { total_size: u64 },

    #[error("Malformed range header: {reason}")]
    Malformed { reason: String },

    #[error("Unsupported range unit: {unit}")]
    UnsupportedUnit { unit: String },

    #[error("Multiple ranges are not supported")]
    MultipleRanges,
}

impl RangeError {
    /// Whether the request should fall back to a full 200 response.
    ///
    /// Only an unsatisfiable range is answered with 416; anything the
    /// parser does not understand is ignored as HTTP permits.
    pub fn is_ignorable(&self) -> bool {
        !matches!(self, RangeError::NotSatisfiable { .. })
    }
}

/// A syntactically valid single byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=a-b`
    Bounded { start: u64, end: u64 },
    /// `bytes=a-`
    From { start: u64 },
    /// `bytes=-n`, the last `n` bytes
    Suffix { length: u64 },
}

/// Inclusive byte span inside a file of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the span.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a resolved range holds at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value, e.g. `bytes 0-99/1000`.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// `Content-Range` value of a 416 response, e.g. `bytes */1000`.
pub fn unsatisfied_content_range(total_size: u64) -> String {
    format!("bytes */{total_size}")
}

fn malformed(reason: impl Into<String>) -> RangeError {
    RangeError::Malformed {
        reason: reason.into(),
    }
}

fn parse_position(raw: &str) -> Result<u64, RangeError> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(malformed(format!("invalid position {raw:?}")));
    }
    raw.parse::<u64>()
        .map_err(|_| malformed(format!("position out of range {raw:?}")))
}

impl RangeSpec {
    /// Parses a header value such as `bytes=0-99`, `bytes=500-` or `bytes=-200`.
    ///
    /// # Errors
    ///
    /// - `RangeError::UnsupportedUnit` - Unit other than `bytes`
    /// - `RangeError::MultipleRanges` - More than one range requested
    /// - `RangeError::Malformed` - Anything else that is not a valid range,
    ///   including an end before the start
    pub fn parse(header: &str) -> Result<Self, RangeError> {
        let (unit, spec) = header
            .trim()
            .split_once('=')
            .ok_or_else(|| malformed("missing '='"))?;

        let unit = unit.trim();
        if !unit.eq_ignore_ascii_case("bytes") {
            return Err(RangeError::UnsupportedUnit {
                unit: unit.to_string(),
            });
        }

        if spec.contains(',') {
            return Err(RangeError::MultipleRanges);
        }

        let (start, end) = spec
            .trim()
            .split_once('-')
            .ok_or_else(|| malformed("missing '-'"))?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(malformed("empty range")),
            (true, false) => Ok(RangeSpec::Suffix {
                length: parse_position(end)?,
            }),
            (false, true) => Ok(RangeSpec::From {
                start: parse_position(start)?,
            }),
            (false, false) => {
                let start = parse_position(start)?;
                let end = parse_position(end)?;
                if end < start {
                    return Err(malformed(format!("end {end} before start {start}")));
                }
                Ok(RangeSpec::Bounded { start, end })
            }
        }
    }

    /// Applies the range to a file of `total_size` bytes.
    ///
    /// Ends past the file are clamped to the last byte.
    ///
    /// # Errors
    ///
    /// - `RangeError::NotSatisfiable` - Start at or past the end, a zero
    ///   suffix, or an empty file
    pub fn resolve(&self, total_size: u64) -> Result<ByteRange, RangeError> {
        let unsatisfiable = RangeError::NotSatisfiable { total_size };
        if total_size == 0 {
            return Err(unsatisfiable);
        }
        let last = total_size - 1;

        match *self {
            RangeSpec::Bounded { start, end } => {
                if start > last {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange {
                    start,
                    end: end.min(last),
                })
            }
            RangeSpec::From { start } => {
                if start > last {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange { start, end: last })
            }
            RangeSpec::Suffix { length } => {
                if length == 0 {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange {
                    start: total_size.saturating_sub(length),
                    end: last,
                })
            }
        }
    }
}

/// Parses and resolves a header in one step.
///
/// # Errors
///
/// - `RangeError` - See [`RangeSpec::parse`] and [`RangeSpec::resolve`]
pub fn resolve_range(header: &str, total_size: u64) -> Result<ByteRange, RangeError> {
    RangeSpec::parse(header)?.resolve(total_size)
}
