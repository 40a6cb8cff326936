//! Predictor and model update (component D, §4.4). Turns a sample and its
//! model into the small non-negative value the escape/prefix layers like to
//! see, and back again. Every operation here is defined modulo `2^W` for a
//! field's declared width `W`, so callers must validate `W` themselves —
//! this module trusts it.

use crate::constants::MODEL_VALUE_MAX;
use crate::errors::{CmpError, CmpResult};

/// `round_fwd(x, r) = x >> r`: the low `r` bits are noise the lossy mode
/// discards. `r = 0` is lossless.
#[inline(always)]
pub fn round_fwd(x: u32, r: u8) -> u32 {
  x >> r
}

/// Inverse of [`round_fwd`]: the discarded low bits come back as zero.
#[inline(always)]
pub fn round_inv(x: u32, r: u8) -> u32 {
  x << r
}

/// Folds a `W`-bit two's-complement residue onto the non-negative range
/// `[0, 2^W)`, negatives landing on odd values and non-negatives on even
/// ones. Bijective on `[0, 2^W)`.
pub fn map_to_pos(delta: u32, w: u32) -> u64 {
  let modulus = 1_u64 << w;
  let d = delta as u64 & (modulus - 1);
  let sign_bit = 1_u64 << (w - 1);
  if d & sign_bit != 0 {
    2 * (modulus - d) - 1
  } else {
    2 * d
  }
}

/// Inverse of [`map_to_pos`]: recovers the `W`-bit two's-complement
/// residue from its folded form.
pub fn re_map_to_pos(u: u64, w: u32) -> u32 {
  let modulus = 1_u64 << w;
  let delta = if u & 1 == 1 {
    modulus.wrapping_sub((u + 1) / 2)
  } else {
    u / 2
  };
  (delta & (modulus - 1)) as u32
}

/// Computes the folded prediction residual for one sample, ready to pass
/// into the escape layer (§4.3) with parameters `(m, s)`.
///
/// `data` and `model` are the raw (un-rounded) sample and model values;
/// `w` is the field's declared bit width and `r` its lossy round amount.
pub fn predict(data: u32, model: u32, w: u32, r: u8) -> CmpResult<u64> {
  let d = round_fwd(data, r);
  let m = round_fwd(model, r);
  // `w` ranges over the full [1, 32] field-width budget (§3), so the limit
  // must be computed in 64 bits: `1_u32 << 32` is an out-of-range shift.
  let limit = 1_u64 << w;
  if d as u64 >= limit || m as u64 >= limit {
    return Err(CmpError::DataValueTooLarge);
  }
  let mask = (limit - 1) as u32;
  let delta = d.wrapping_sub(m) & mask;
  Ok(map_to_pos(delta, w))
}

/// Inverts [`predict`]: recovers the rounded-back sample from a decoded
/// folded residual and the (un-rounded) model value used to predict it.
pub fn unpredict(u: u64, model: u32, w: u32, r: u8) -> u32 {
  let mask = ((1_u64 << w) - 1) as u32;
  let delta = re_map_to_pos(u, w);
  let m = round_fwd(model, r);
  let data_rounded = delta.wrapping_add(m) & mask;
  round_inv(data_rounded, r)
}

/// Integer exponential-moving-average model update, §4.4. `mu` is the
/// model weight in `[0, 16]`; `mu = 0` freezes the model, `mu = 16`
/// replaces it outright. Callers must pass the same reconstruction the
/// decoder sees (`round_inv(round_fwd(data, r), r)` when lossy rounding is
/// in play, `data` unchanged when `r = 0`), not the raw un-rounded sample,
/// so consecutive compressions stay consistent with what the decoder
/// recomputes.
pub fn update_model_u32(data: u32, model_old: u32, mu: u8) -> u32 {
  debug_assert!(mu <= MODEL_VALUE_MAX);
  let mu = mu as u64;
  let weighted = mu * data as u64 + (16 - mu) * model_old as u64 + 8;
  (weighted / 16) as u32
}

/// Same update rule, kept distinct for wide fields (e.g. `exp_flags`)
/// where the caller already works in `u16` and wants to avoid a
/// truncating cast at the call site.
pub fn update_model_u16(data: u16, model_old: u16, mu: u8) -> u16 {
  update_model_u32(data as u32, model_old as u32, mu) as u16
}
