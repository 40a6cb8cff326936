//! Unary/Rice/Golomb prefix codec (component B, §4.2). A single parameter
//! `m` selects the family: `m = 1` is unary, a power-of-two `m` is Rice, any
//! other `m` is the general Golomb code. All three are the same algorithm —
//! a unary-coded quotient followed by a truncated-binary remainder — so
//! there is exactly one encode/decode pair here rather than three.

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::errors::CmpResult;

/// `L = floor(log2(m))`, for `m >= 1`.
#[inline(always)]
pub fn log2_floor(m: u32) -> u32 {
  debug_assert!(m >= 1);
  31 - m.leading_zeros()
}

/// The truncated-binary cutoff `c = 2^(L+1) - m`.
#[inline(always)]
pub fn cutoff(m: u32) -> u32 {
  let l = log2_floor(m);
  (1_u32 << (l + 1)) - m
}

/// Largest value a Golomb codeword under parameter `m` can carry while
/// staying within the 32-bit codeword budget §4.2 requires. Producers use
/// this to size the escape threshold `s` so an outlier value can never
/// itself overflow the prefix codec (§4.3).
pub fn max_spill(m: u32) -> u64 {
  let l = log2_floor(m);
  let remainder_bits = l + 1;
  if remainder_bits >= 32 {
    return 0;
  }
  let unary_budget = 32 - remainder_bits;
  let q_max = (unary_budget - 1) as u64;
  q_max * m as u64 + (m as u64 - 1)
}

/// Writes `v`'s Golomb/Rice codeword under parameter `m`. Returns the
/// number of bits written.
pub fn encode_golomb(w: &mut BitWriter, v: u64, m: u32) -> CmpResult<u32> {
  debug_assert!(m >= 1);
  let l = log2_floor(m);
  let c = cutoff(m);
  let q = (v / m as u64) as u32;
  let r = (v % m as u64) as u32;

  w.put_unary(q)?;
  if r < c {
    if l > 0 {
      w.put_bits(r, l)?;
    }
    Ok(q + 1 + l)
  } else {
    w.put_bits(r + c, l + 1)?;
    Ok(q + 1 + l + 1)
  }
}

/// Reads one Golomb/Rice codeword under parameter `m`.
pub fn decode_golomb(r: &mut BitReader, m: u32) -> u64 {
  debug_assert!(m >= 1);
  let l = log2_floor(m);
  let c = cutoff(m);

  let q = r.peek_leading_ones();
  r.consume(q + 1);

  let remainder = if l == 0 {
    0_u32
  } else {
    let r2 = r.peek(l + 1) as u32;
    let r1 = r2 >> 1;
    if r1 < c {
      r.consume(l);
      r1
    } else {
      r.consume(l + 1);
      r2 - c
    }
  };

  q as u64 * m as u64 + remainder as u64
}
