//! Collection header parsing (part of component G, §3, §4.6). A
//! collection is a fixed 12-byte big-endian header followed by `N`
//! fixed-shape records of one sub-service. The header is opaque to the
//! codec beyond the fields it needs to size and validate the collection
//! that follows it — everything else (the raw bytes) is copied verbatim
//! into the framed output, never re-derived.

use crate::constants::COLLECTION_HEADER_SIZE;
use crate::errors::{CmpError, CmpResult};
use crate::registry::{layout_for_subservice, RecordLayout};

/// The 12-byte collection header (§3): sub-service code, a reserved byte,
/// record count, data length in bytes, and an opaque coarse time tag the
/// codec passes through without interpreting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionHeader {
  pub subservice: u8,
  pub reserved: u8,
  pub n_records: u16,
  pub data_length: u32,
  pub coarse_time: u32,
}

impl CollectionHeader {
  pub fn parse(bytes: &[u8]) -> CmpResult<Self> {
    if bytes.len() < COLLECTION_HEADER_SIZE {
      return Err(CmpError::ChunkSizeInconsistent);
    }
    Ok(CollectionHeader {
      subservice: bytes[0],
      reserved: bytes[1],
      n_records: u16::from_be_bytes([bytes[2], bytes[3]]),
      data_length: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
      coarse_time: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
    })
  }

  pub fn write(&self, buf: &mut [u8]) {
    debug_assert!(buf.len() >= COLLECTION_HEADER_SIZE);
    buf[0] = self.subservice;
    buf[1] = self.reserved;
    buf[2..4].copy_from_slice(&self.n_records.to_be_bytes());
    buf[4..8].copy_from_slice(&self.data_length.to_be_bytes());
    buf[8..12].copy_from_slice(&self.coarse_time.to_be_bytes());
  }

  /// Looks up this header's record layout and validates `n_records *
  /// sample_size == data_length` (§3's per-collection invariant).
  pub fn layout(&self) -> CmpResult<&'static RecordLayout> {
    let layout = layout_for_subservice(self.subservice)?;
    let sample_bits = layout.sample_bits();
    if sample_bits == 0 || sample_bits % 8 != 0 {
      return Err(CmpError::IntDataTypeUnsupported);
    }
    let sample_size = (sample_bits / 8) as usize;
    let expected = self.n_records as usize * sample_size;
    if expected != self.data_length as usize {
      return Err(CmpError::ColSizeInconsistent);
    }
    Ok(layout)
  }
}
