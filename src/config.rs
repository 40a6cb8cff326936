//! Configuration layer (component J, §4.10) — ambient stack addition.
//!
//! Grounded in the teacher crate's `CompressorConfig`/`DecompressorConfig`
//! (builder-style structs with a `Default` impl and `with_*` setters) and
//! the sibling `pco` crate's `ChunkConfig`, which favors `#[non_exhaustive]`
//! plain structs with doc comments on every field and validation deferred
//! to first use rather than in the setters themselves. `CompressionConfig`
//! follows that second style: it is built once per call, validated exactly
//! once at the top of `compress_chunk`/`decompress_cmp_entity`, and never
//! mutated afterward.

use crate::constants::{GOLOMB_PAR_MAX, GOLOMB_PAR_MIN, LOSSY_ROUND_MAX, MODEL_VALUE_MAX};
use crate::errors::{CmpError, CmpResult};
use crate::prefix::max_spill;

/// The five compression modes §4.8 defines. Each fully determines the
/// per-field predictor and escape mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompressionMode {
  /// Copy samples big-endian, untouched by the predictor or escape layer.
  Raw,
  /// Subtract the previous sample (initial running model `0`), zero-escape.
  DiffZero,
  /// Subtract the previous sample (initial running model `0`), multi-escape.
  DiffMulti,
  /// Subtract a caller-supplied model, zero-escape; model update is
  /// applied when the caller asked for an updated-model buffer.
  ModelZero,
  /// Subtract a caller-supplied model, multi-escape; same update rule.
  ModelMulti,
}

/// Which escape mechanism (component C) a mode uses. `Raw` has none.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeKind {
  Zero,
  Multi,
}

impl CompressionMode {
  pub fn escape_kind(self) -> Option<EscapeKind> {
    use CompressionMode::*;
    match self {
      Raw => None,
      DiffZero | ModelZero => Some(EscapeKind::Zero),
      DiffMulti | ModelMulti => Some(EscapeKind::Multi),
    }
  }

  /// The entity header's one-byte `cmp_mode` encoding (§4.7).
  pub fn code(self) -> u8 {
    use CompressionMode::*;
    match self {
      Raw => 0,
      DiffZero => 1,
      DiffMulti => 2,
      ModelZero => 3,
      ModelMulti => 4,
    }
  }

  pub fn from_code(code: u8) -> CmpResult<Self> {
    use CompressionMode::*;
    Ok(match code {
      0 => Raw,
      1 => DiffZero,
      2 => DiffMulti,
      3 => ModelZero,
      4 => ModelMulti,
      _ => return Err(CmpError::EntityHeader),
    })
  }
}

/// `true` only for the two `MODEL_*` modes, i.e. whether a caller-supplied
/// model buffer (and optionally an updated-model output) is in play.
pub fn model_mode_is_used(mode: CompressionMode) -> bool {
  matches!(mode, CompressionMode::ModelZero | CompressionMode::ModelMulti)
}

/// `true` when the mode's escape mechanism is multi-escape rather than
/// zero-escape (or the mode has no escape mechanism at all).
pub fn multi_escape_mech_is_used(mode: CompressionMode) -> bool {
  mode.escape_kind() == Some(EscapeKind::Multi)
}

/// Per-field-slot Golomb parameter and spill threshold (§4.3).
/// `s = 0` is sugar for "auto-fill via `max_spill(m)`" (§4.10, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldParams {
  pub m: u32,
  pub s: u32,
}

impl FieldParams {
  /// Resolves `s = 0` to `max_spill(m)`, leaving any explicit `s` as-is.
  /// Auto-fill is clamped to `GOLOMB_PAR_MAX`: `s` shares the entity
  /// header's 16-bit `spill_par` field width with `m`, and `max_spill(m)`
  /// exceeds that width once `m` gets large enough (it grows roughly
  /// linearly with `m`, while `spill_par` stays fixed at 16 bits). An
  /// explicit `s` past that bound is rejected by `validate()` instead of
  /// being clamped here.
  pub fn resolved_s(&self) -> u64 {
    if self.s == 0 {
      max_spill(self.m).min(GOLOMB_PAR_MAX as u64)
    } else {
      self.s as u64
    }
  }
}

/// Per-call compression configuration: mode, model weight, lossy round,
/// and the per-field-slot `(m, s)` table. `#[non_exhaustive]` so adding a
/// field later (as the teacher's `pco::ChunkConfig` does across releases)
/// is not a breaking change.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CompressionConfig {
  pub cmp_mode: CompressionMode,
  /// Model weight μ ∈ [0, 16].
  pub model_value: u8,
  /// Lossy bit-round r ∈ [0, 2].
  pub lossy_par: u8,
  /// Indexed by [`crate::registry::ParamSlot`].
  pub field_params: Vec<FieldParams>,
}

impl Default for CompressionConfig {
  fn default() -> Self {
    CompressionConfig {
      cmp_mode: CompressionMode::DiffZero,
      model_value: 0,
      lossy_par: 0,
      field_params: Vec::new(),
    }
  }
}

impl CompressionConfig {
  pub fn with_mode(mut self, mode: CompressionMode) -> Self {
    self.cmp_mode = mode;
    self
  }

  pub fn with_model_value(mut self, mu: u8) -> Self {
    self.model_value = mu;
    self
  }

  pub fn with_lossy_par(mut self, r: u8) -> Self {
    self.lossy_par = r;
    self
  }

  pub fn with_field_params(mut self, params: Vec<FieldParams>) -> Self {
    self.field_params = params;
    self
  }

  /// Validates every piece of this configuration against §4.10's rules.
  /// Called once, at the top of `compress_chunk`/`decompress_cmp_entity`;
  /// never silently clamped.
  pub fn validate(&self) -> CmpResult<()> {
    if self.model_value > MODEL_VALUE_MAX {
      return Err(CmpError::ParGeneric);
    }
    if self.lossy_par > LOSSY_ROUND_MAX {
      return Err(CmpError::ParGeneric);
    }
    for p in &self.field_params {
      if p.m < GOLOMB_PAR_MIN || p.m > GOLOMB_PAR_MAX {
        return Err(CmpError::ParSpecific);
      }
      // `s` shares the entity header's 16-bit `spill_par` field width with
      // `m`, so it is bounded the same way even though `max_spill(m)` can
      // itself exceed 16 bits for small `m`.
      if p.s > GOLOMB_PAR_MAX {
        return Err(CmpError::ParSpecific);
      }
      if p.s != 0 && p.s as u64 > max_spill(p.m) {
        return Err(CmpError::ParSpecific);
      }
    }
    Ok(())
  }
}
