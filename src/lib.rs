//! Bit-exact Golomb/Rice entropy codec core for onboard science telemetry
//! compression.
//!
//! The public surface is intentionally narrow and mirrors an embedded C
//! API (§6): install a host environment once with
//! [`compress_chunk_init`], then call [`compress_chunk`]/
//! [`decompress_cmp_entity`] per chunk. Everything below that —
//! bit-level I/O, the prefix codec, the two escape mechanisms, the
//! predictor, the record registry — is exposed for testing and advanced
//! callers, but ordinary use only needs the top-level functions.

pub use config::{CompressionConfig, CompressionMode, EscapeKind, FieldParams};
pub use entity::{DataType, EntityHeader, HeaderParPair};
pub use env::{compress_chunk_init, environment, Environment, Timestamp48};
pub use errors::{cmp_get_error_code, cmp_get_error_string, cmp_is_error, CmpError, CmpResult};
pub use framer::{
  compress_chunk, compress_chunk_cmp_size_bound, compress_chunk_set_model_id_and_counter,
  decompress_cmp_entity,
};

pub mod bit_reader;
pub mod bit_writer;
pub mod collection;
pub mod config;
pub mod entity;
pub mod env;
pub mod errors;
pub mod escape;
pub mod field_codec;
pub mod framer;
pub mod predictor;
pub mod prefix;
pub mod registry;

mod bits;
mod constants;
