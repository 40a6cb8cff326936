//! Entity header (component H, §4.7). A fixed-layout, big-endian metadata
//! envelope that precedes every compressed chunk's bitstream. Two
//! variants share the same leading fields: the canonical chunk variant
//! carries six `(cmp_par, spill_par)` slots, the narrower imagette
//! variant one (§9's open question resolves the chunk variant as
//! canonical; imagette is a subset, not a separate format). Raw-mode
//! entities (`raw_bit = 1`) carry neither — there is nothing to
//! parametrize when the predictor and escape layer are both bypassed.
//!
//! Exact field offsets below are this crate's own contract (the upstream
//! wire layout was not recoverable from source), fixed once and
//! documented in DESIGN.md so every implementation of this crate agrees
//! on them bit-for-bit, matching §6's requirement that "exact field
//! offsets are part of the contract."

use crate::config::CompressionMode;
use crate::constants::{
  CHUNK_HEADER_N_PAR_PAIRS, IMAGETTE_HEADER_N_PAR_PAIRS, TIMESTAMP_BYTES, TIMESTAMP_MAX,
};
use crate::errors::{CmpError, CmpResult};
use crate::registry::ChunkClass;

/// What kind of payload this entity carries, derived from the chunk's
/// class (§4.7's `data_type` field). Imagette chunks get their own
/// narrower header variant; everything else uses the canonical one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
  Chunk,
  NcamImagette,
  SatImagette,
}

impl DataType {
  pub fn from_chunk_class(class: ChunkClass) -> Self {
    match class {
      ChunkClass::NcamImagette => DataType::NcamImagette,
      ChunkClass::SatImagette => DataType::SatImagette,
      _ => DataType::Chunk,
    }
  }

  fn code(self) -> u8 {
    match self {
      DataType::Chunk => 0,
      DataType::NcamImagette => 1,
      DataType::SatImagette => 2,
    }
  }

  fn from_code(code: u8) -> CmpResult<Self> {
    Ok(match code {
      0 => DataType::Chunk,
      1 => DataType::NcamImagette,
      2 => DataType::SatImagette,
      _ => return Err(CmpError::EntityHeader),
    })
  }

  fn is_imagette(self) -> bool {
    matches!(self, DataType::NcamImagette | DataType::SatImagette)
  }
}

/// The generic (fixed) prefix every entity header carries, independent
/// of `raw_bit`/`data_type`.
pub const GENERIC_HEADER_SIZE: usize = 36;
/// Byte offset of `model_id` within the generic prefix (§4.7: the only
/// fields `set_model_id_and_counter` ever rewrites).
const MODEL_ID_OFFSET: usize = 32;
const MODEL_COUNTER_OFFSET: usize = 34;

/// One `(cmp_par, spill_par)` pair is 4 bytes (two big-endian `u16`s).
const PAR_PAIR_SIZE: usize = 4;

/// Byte offsets of the two 48-bit host-clock timestamps within the
/// generic prefix, back-to-back and `TIMESTAMP_BYTES` wide each.
const START_TIMESTAMP_OFFSET: usize = 12;
const END_TIMESTAMP_OFFSET: usize = START_TIMESTAMP_OFFSET + TIMESTAMP_BYTES;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderParPair {
  pub cmp_par: u16,
  pub spill_par: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityHeader {
  pub version_id: u32,
  pub entity_size: u32,
  pub original_size: u32,
  pub start_timestamp: u64,
  pub end_timestamp: u64,
  pub data_type: DataType,
  pub raw_bit: bool,
  pub cmp_mode: CompressionMode,
  pub model_value: u8,
  pub lossy_round: u8,
  pub model_id: u16,
  pub model_counter: u16,
  /// Empty when `raw_bit` is set. Otherwise exactly
  /// [`CHUNK_HEADER_N_PAR_PAIRS`] entries for [`DataType::Chunk`] or
  /// [`IMAGETTE_HEADER_N_PAR_PAIRS`] for an imagette data type.
  pub par_pairs: Vec<HeaderParPair>,
}

impl EntityHeader {
  /// Total header size this header's `raw_bit`/`data_type` implies.
  pub fn header_len(&self) -> usize {
    Self::header_len_for(self.raw_bit, self.data_type)
  }

  pub fn header_len_for(raw_bit: bool, data_type: DataType) -> usize {
    if raw_bit {
      GENERIC_HEADER_SIZE
    } else if data_type.is_imagette() {
      GENERIC_HEADER_SIZE + IMAGETTE_HEADER_N_PAR_PAIRS * PAR_PAIR_SIZE
    } else {
      GENERIC_HEADER_SIZE + CHUNK_HEADER_N_PAR_PAIRS * PAR_PAIR_SIZE
    }
  }

  pub fn write(&self, buf: &mut [u8]) -> CmpResult<()> {
    let len = self.header_len();
    if buf.len() < len {
      return Err(CmpError::SmallBuf);
    }
    if self.start_timestamp > TIMESTAMP_MAX || self.end_timestamp > TIMESTAMP_MAX {
      return Err(CmpError::EntityTimestamp);
    }

    buf[0..4].copy_from_slice(&self.version_id.to_be_bytes());
    buf[4..8].copy_from_slice(&self.entity_size.to_be_bytes());
    buf[8..12].copy_from_slice(&self.original_size.to_be_bytes());
    write_u48(
      &mut buf[START_TIMESTAMP_OFFSET..START_TIMESTAMP_OFFSET + TIMESTAMP_BYTES],
      self.start_timestamp,
    );
    write_u48(
      &mut buf[END_TIMESTAMP_OFFSET..END_TIMESTAMP_OFFSET + TIMESTAMP_BYTES],
      self.end_timestamp,
    );
    buf[24] = self.data_type.code();
    buf[25] = self.raw_bit as u8;
    buf[26] = self.cmp_mode.code();
    buf[27] = self.model_value;
    buf[28] = self.lossy_round;
    buf[29] = 0;
    buf[30] = 0;
    buf[31] = 0;
    buf[MODEL_ID_OFFSET..MODEL_ID_OFFSET + 2].copy_from_slice(&self.model_id.to_be_bytes());
    buf[MODEL_COUNTER_OFFSET..MODEL_COUNTER_OFFSET + 2]
      .copy_from_slice(&self.model_counter.to_be_bytes());

    let mut off = GENERIC_HEADER_SIZE;
    for pair in &self.par_pairs {
      buf[off..off + 2].copy_from_slice(&pair.cmp_par.to_be_bytes());
      buf[off + 2..off + 4].copy_from_slice(&pair.spill_par.to_be_bytes());
      off += PAR_PAIR_SIZE;
    }
    Ok(())
  }

  /// Parses an entity header from the front of `buf`, returning the
  /// header and its length (so the caller knows where the payload
  /// starts).
  pub fn parse(buf: &[u8]) -> CmpResult<(Self, usize)> {
    if buf.len() < GENERIC_HEADER_SIZE {
      return Err(CmpError::EntityTooSmall);
    }
    let version_id = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let entity_size = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    let original_size = u32::from_be_bytes(buf[8..12].try_into().unwrap());
    let start_timestamp =
      read_u48(&buf[START_TIMESTAMP_OFFSET..START_TIMESTAMP_OFFSET + TIMESTAMP_BYTES]);
    let end_timestamp = read_u48(&buf[END_TIMESTAMP_OFFSET..END_TIMESTAMP_OFFSET + TIMESTAMP_BYTES]);
    let data_type = DataType::from_code(buf[24])?;
    let raw_bit = match buf[25] {
      0 => false,
      1 => true,
      _ => return Err(CmpError::EntityHeader),
    };
    let cmp_mode = CompressionMode::from_code(buf[26])?;
    let model_value = buf[27];
    let lossy_round = buf[28];
    let model_id = u16::from_be_bytes(buf[MODEL_ID_OFFSET..MODEL_ID_OFFSET + 2].try_into().unwrap());
    let model_counter = u16::from_be_bytes(
      buf[MODEL_COUNTER_OFFSET..MODEL_COUNTER_OFFSET + 2]
        .try_into()
        .unwrap(),
    );

    if start_timestamp > end_timestamp {
      return Err(CmpError::EntityTimestamp);
    }

    let header_len = Self::header_len_for(raw_bit, data_type);
    if buf.len() < header_len {
      return Err(CmpError::EntityTooSmall);
    }
    let n_pairs = if raw_bit {
      0
    } else if data_type.is_imagette() {
      IMAGETTE_HEADER_N_PAR_PAIRS
    } else {
      CHUNK_HEADER_N_PAR_PAIRS
    };
    let mut par_pairs = Vec::with_capacity(n_pairs);
    let mut off = GENERIC_HEADER_SIZE;
    for _ in 0..n_pairs {
      let cmp_par = u16::from_be_bytes(buf[off..off + 2].try_into().unwrap());
      let spill_par = u16::from_be_bytes(buf[off + 2..off + 4].try_into().unwrap());
      par_pairs.push(HeaderParPair { cmp_par, spill_par });
      off += PAR_PAIR_SIZE;
    }

    Ok((
      EntityHeader {
        version_id,
        entity_size,
        original_size,
        start_timestamp,
        end_timestamp,
        data_type,
        raw_bit,
        cmp_mode,
        model_value,
        lossy_round,
        model_id,
        model_counter,
        par_pairs,
      },
      header_len,
    ))
  }
}

/// The only post-hoc mutation a finalized entity allows (§4.7): rewrites
/// `model_id`/`model_counter` in place at their fixed offsets, leaving
/// everything else — including `entity_size` — untouched.
pub fn set_model_id_and_counter(dst: &mut [u8], model_id: u16, model_counter: u16) -> CmpResult<usize> {
  if dst.len() < GENERIC_HEADER_SIZE {
    return Err(CmpError::EntityTooSmall);
  }
  dst[MODEL_ID_OFFSET..MODEL_ID_OFFSET + 2].copy_from_slice(&model_id.to_be_bytes());
  dst[MODEL_COUNTER_OFFSET..MODEL_COUNTER_OFFSET + 2].copy_from_slice(&model_counter.to_be_bytes());
  Ok(dst.len())
}

fn write_u48(buf: &mut [u8], v: u64) {
  let bytes = v.to_be_bytes();
  buf.copy_from_slice(&bytes[2..8]);
}

fn read_u48(buf: &[u8]) -> u64 {
  let mut arr = [0_u8; 8];
  arr[2..8].copy_from_slice(buf);
  u64::from_be_bytes(arr)
}
