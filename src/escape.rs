//! Escape layer (component C, §4.3): two ways to let a prefix codeword
//! carry values past where the Golomb/Rice code stays efficient. Both
//! share one property that matters more than their encoding density: a
//! bitstream that tries to abuse the escape path is rejected rather than
//! silently misdecoded, so every malformed-input branch here is reachable
//! from fuzzing, not just from a well-behaved encoder's output.

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::bits::round_up_even;
use crate::errors::{CmpError, CmpResult};
use crate::prefix::{decode_golomb, encode_golomb};

/// Zero-escape: values below `s` go through the prefix codec directly
/// (shifted by one so a literal count of zero is never ambiguous with the
/// escape marker); values at or above `s` are signalled by a zero
/// codeword followed by a `big_w`-bit literal.
pub fn encode_zero_escape(
  w: &mut BitWriter,
  v: u64,
  m: u32,
  s: u32,
  big_w: u32,
) -> CmpResult<()> {
  if v + 1 < s as u64 {
    encode_golomb(w, v + 1, m)?;
  } else {
    encode_golomb(w, 0, m)?;
    w.put_bits((v + 1) as u32, big_w)?;
  }
  Ok(())
}

pub fn decode_zero_escape(r: &mut BitReader, m: u32, s: u32, big_w: u32) -> CmpResult<u64> {
  let x = decode_golomb(r, m);
  if x != 0 {
    if x >= s as u64 {
      return Err(CmpError::CorruptionDetected);
    }
    Ok(x - 1)
  } else {
    let lit = r.read32_sub1(big_w) as u64;
    if s == 0 || lit < s as u64 - 1 {
      return Err(CmpError::CorruptionDetected);
    }
    Ok(lit)
  }
}

/// Multi-escape: values below `s` pass through the prefix codec directly;
/// values at or above `s` are signalled by an escape codeword `s + k`
/// (chosen from the magnitude of the overflow) followed by a
/// canonically-sized literal.
pub fn encode_multi_escape(
  w: &mut BitWriter,
  v: u64,
  m: u32,
  s: u32,
  big_w: u32,
) -> CmpResult<()> {
  if v < s as u64 {
    encode_golomb(w, v, m)?;
  } else {
    let d = v - s as u64;
    let k = floor_log2_of_max1(d) >> 1;
    let literal_len = 2 * (k + 1);
    debug_assert!(literal_len <= round_up_even(big_w));
    encode_golomb(w, s as u64 + k as u64, m)?;
    w.put_bits(d as u32, literal_len)?;
  }
  Ok(())
}

pub fn decode_multi_escape(r: &mut BitReader, m: u32, s: u32, big_w: u32) -> CmpResult<u64> {
  let x = decode_golomb(r, m);
  if x < s as u64 {
    return Ok(x);
  }
  let k = (x - s as u64) as u32;
  let literal_len = 2 * (k + 1);
  if literal_len > round_up_even(big_w) {
    return Err(CmpError::CorruptionDetected);
  }
  let d = r.read32(literal_len) as u64;
  if literal_len > 2 {
    let top_two = d >> (literal_len - 2);
    if top_two == 0 {
      return Err(CmpError::CorruptionDetected);
    }
  }
  let modulus = 1_u64 << big_w;
  let result = (s as u64 + d) % modulus;
  if result < s as u64 {
    return Err(CmpError::CorruptionDetected);
  }
  Ok(result)
}

/// `floor(log2(max(d, 1)))`.
#[inline(always)]
fn floor_log2_of_max1(d: u64) -> u32 {
  if d == 0 {
    0
  } else {
    63 - d.leading_zeros()
  }
}
