//! The closed error taxonomy returned by every fallible operation in this
//! crate. Unlike a generic "kind + free-form message" error, flight
//! software wants a small fixed set of codes it can switch on, so
//! `CmpError` carries no payload: the variant IS the diagnostic.

use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// One of the closed set of outcomes a compress/decompress call can report.
///
/// `NoError` is included for parity with the C-style `cmp_is_error`/
/// `cmp_get_error_code` helpers below; idiomatic Rust call sites never
/// construct it, since success is `Ok(_)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CmpError {
  NoError,

  // framing
  ChunkNull,
  ChunkTooLarge,
  ChunkTooSmall,
  ChunkSizeInconsistent,
  ChunkSubserviceInconsistent,

  // collections
  ColSubserviceUnsupported,
  ColSizeInconsistent,

  // entity
  EntityNull,
  EntityTooSmall,
  EntityHeader,
  EntityTimestamp,

  // parameters
  ParGeneric,
  ParSpecific,
  ParBuffers,
  ParNull,

  // runtime
  SmallBuf,
  DataValueTooLarge,
  Generic,

  // internal, should be unreachable if the registry is complete
  IntDecoder,
  IntDataTypeUnsupported,
  IntCmpColTooLarge,

  // decode-only
  CorruptionDetected,
}

impl CmpError {
  /// The same fixed string a C caller would get back from
  /// `cmp_get_error_string`.
  pub fn as_str(&self) -> &'static str {
    use CmpError::*;
    match self {
      NoError => "no error",
      ChunkNull => "chunk buffer is null",
      ChunkTooLarge => "chunk exceeds the maximum original size",
      ChunkTooSmall => "chunk is smaller than one collection header",
      ChunkSizeInconsistent => "sum of collection sizes does not match chunk size",
      ChunkSubserviceInconsistent => "collections in a chunk do not share a chunk class",
      ColSubserviceUnsupported => "collection subservice code has no known record layout",
      ColSizeInconsistent => "collection data length is not a multiple of its sample size",
      EntityNull => "entity buffer is null",
      EntityTooSmall => "entity buffer is smaller than its header",
      EntityHeader => "entity header is malformed",
      EntityTimestamp => "entity timestamps are inconsistent",
      ParGeneric => "compression configuration is invalid",
      ParSpecific => "per-field compression parameter is out of range",
      ParBuffers => "caller-provided buffers are inconsistent with each other",
      ParNull => "a required parameter or host service was not provided",
      SmallBuf => "destination buffer is too small",
      DataValueTooLarge => "a sample or model value exceeds its declared bit width",
      Generic => "unspecified error",
      IntDecoder => "internal decoder invariant violated",
      IntDataTypeUnsupported => "internal: data type unsupported by this build",
      IntCmpColTooLarge => "internal: compressed collection exceeds its budget",
      CorruptionDetected => "bitstream failed an escape-layer integrity check",
    }
  }
}

impl Display for CmpError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "rdcu-cmp-core error: {}", self.as_str())
  }
}

impl Error for CmpError {}

pub type CmpResult<T> = Result<T, CmpError>;

/// `true` for every variant except [`CmpError::NoError`]. Kept for parity
/// with the abstract C API; a Rust caller inspecting a `CmpResult` never
/// needs it.
pub fn cmp_is_error(code: CmpError) -> bool {
  !matches!(code, CmpError::NoError)
}

/// Identity function kept for API parity: in the C original this maps a
/// packed return value to its error code. Here the code already is the
/// error code.
pub fn cmp_get_error_code(code: CmpError) -> CmpError {
  code
}

/// The diagnostic string for an error code.
pub fn cmp_get_error_string(code: CmpError) -> &'static str {
  code.as_str()
}
