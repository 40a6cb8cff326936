//! Per-field codec (component E, §4.5). Applies the predictor (D) and
//! escape layer (C) to every sample of one field across a collection's `N`
//! records, emitting through the prefix codec (B) into the shared bit
//! writer/reader (A). One generic routine serves every record layout; the
//! registry (F) supplies the field list it loops over.

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::config::{model_mode_is_used, CompressionMode, EscapeKind, FieldParams};
use crate::errors::CmpResult;
use crate::escape::{decode_multi_escape, decode_zero_escape, encode_multi_escape, encode_zero_escape};
use crate::predictor::{predict, round_fwd, round_inv, unpredict, update_model_u32};
use crate::registry::FieldDescriptor;

/// Splits a collection's raw, row-major, big-endian record bytes into one
/// column (a `Vec<u32>` of length `n_records`) per field, in declaration
/// order (§4.5's ordering contract). Every field width in this registry
/// is a whole number of bytes, so no bit-level unpacking is needed here —
/// only the escape/prefix layers work below byte granularity.
pub fn extract_field_columns(data: &[u8], fields: &[FieldDescriptor], n_records: usize) -> Vec<Vec<u32>> {
  let mut columns: Vec<Vec<u32>> = fields.iter().map(|_| Vec::with_capacity(n_records)).collect();
  let record_bytes: usize = fields.iter().map(|f| (f.max_bits / 8) as usize).sum();
  for k in 0..n_records {
    let mut off = k * record_bytes;
    for (i, f) in fields.iter().enumerate() {
      let w = (f.max_bits / 8) as usize;
      let v = read_be_uint(&data[off..off + w]);
      columns[i].push(v);
      off += w;
    }
  }
  columns
}

/// Inverse of [`extract_field_columns`]: packs per-field columns back into
/// row-major, big-endian record bytes.
pub fn pack_field_columns(fields: &[FieldDescriptor], columns: &[Vec<u32>], n_records: usize) -> Vec<u8> {
  let record_bytes: usize = fields.iter().map(|f| (f.max_bits / 8) as usize).sum();
  let mut out = vec![0_u8; record_bytes * n_records];
  for k in 0..n_records {
    let mut off = k * record_bytes;
    for (i, f) in fields.iter().enumerate() {
      let w = (f.max_bits / 8) as usize;
      write_be_uint(&mut out[off..off + w], columns[i][k]);
      off += w;
    }
  }
  out
}

fn read_be_uint(bytes: &[u8]) -> u32 {
  let mut v = 0_u32;
  for &b in bytes {
    v = (v << 8) | b as u32;
  }
  v
}

fn write_be_uint(bytes: &mut [u8], value: u32) {
  let n = bytes.len();
  for (i, b) in bytes.iter_mut().enumerate() {
    let shift = 8 * (n - 1 - i);
    *b = (value >> shift) as u8;
  }
}

/// Where a field stream's predictor state comes from.
pub enum ModelSource<'a> {
  /// `DIFF_*` modes: no external buffer, the running state is simply the
  /// previous raw sample, starting at `0`.
  RunningDiff,
  /// `MODEL_*` modes: one prior estimate per record, supplied by the
  /// caller (possibly from a previous chunk).
  External(&'a [u32]),
}

/// Encodes one field's `N` samples. `updated_model_out`, when present,
/// receives one entry per record — only meaningful in `MODEL_*` modes,
/// where the caller asked for the post-update model back (§3, §4.4).
pub fn encode_field(
  w: &mut BitWriter,
  mode: CompressionMode,
  params: FieldParams,
  max_bits: u32,
  round: u8,
  mu: u8,
  samples: &[u32],
  model_source: ModelSource,
  mut updated_model_out: Option<&mut Vec<u32>>,
) -> CmpResult<()> {
  if mode == CompressionMode::Raw {
    for &v in samples {
      w.put_bits(v, max_bits)?;
    }
    return Ok(());
  }

  let escape_kind = mode.escape_kind().expect("non-raw modes always escape");
  let s = params.resolved_s() as u32;
  let use_model_update = model_mode_is_used(mode);
  let mut running = 0_u32;

  for (k, &data) in samples.iter().enumerate() {
    let model_val = match &model_source {
      ModelSource::RunningDiff => running,
      ModelSource::External(models) => models[k],
    };

    let folded = predict(data, model_val, max_bits, round)?;
    match escape_kind {
      EscapeKind::Zero => encode_zero_escape(w, folded, params.m, s, max_bits)?,
      EscapeKind::Multi => encode_multi_escape(w, folded, params.m, s, max_bits)?,
    }

    if use_model_update {
      // The decoder only ever sees the rounded-back reconstruction
      // (`unpredict` returns `round_inv(round_fwd(data, r), r)`), never the
      // un-rounded sample, so the update must run on that same
      // reconstruction here for the two sides to agree on the updated
      // model (§4.4, §8 property 2) when `round > 0`.
      let reconstructed = round_inv(round_fwd(data, round), round);
      let updated = update_model_u32(reconstructed, model_val, mu);
      if let Some(out) = updated_model_out.as_deref_mut() {
        out.push(updated);
      }
    } else if let ModelSource::RunningDiff = &model_source {
      running = data;
    }
  }

  Ok(())
}

/// Decodes one field's `N` samples, the exact inverse of [`encode_field`].
pub fn decode_field(
  r: &mut BitReader,
  mode: CompressionMode,
  params: FieldParams,
  max_bits: u32,
  round: u8,
  mu: u8,
  n_records: usize,
  model_source: ModelSource,
  out: &mut Vec<u32>,
  mut updated_model_out: Option<&mut Vec<u32>>,
) -> CmpResult<()> {
  if mode == CompressionMode::Raw {
    for _ in 0..n_records {
      out.push(r.read32(max_bits));
      reject_on_overflow(r)?;
    }
    return Ok(());
  }

  let escape_kind = mode.escape_kind().expect("non-raw modes always escape");
  let s = params.resolved_s() as u32;
  let use_model_update = model_mode_is_used(mode);
  let mut running = 0_u32;

  for k in 0..n_records {
    let model_val = match &model_source {
      ModelSource::RunningDiff => running,
      ModelSource::External(models) => models[k],
    };

    let folded = match escape_kind {
      EscapeKind::Zero => decode_zero_escape(r, params.m, s, max_bits)?,
      EscapeKind::Multi => decode_multi_escape(r, params.m, s, max_bits)?,
    };
    // refill once per symbol (§4.1): a single codeword plus its optional
    // escape literal never exceeds the 64-bit register this reader keeps.
    reject_on_overflow(r)?;
    let data = unpredict(folded, model_val, max_bits, round);
    out.push(data);

    if use_model_update {
      let updated = update_model_u32(data, model_val, mu);
      if let Some(o) = updated_model_out.as_deref_mut() {
        o.push(updated);
      }
    } else if let ModelSource::RunningDiff = &model_source {
      running = data;
    }
  }

  Ok(())
}

/// Refills the reader's register and maps a caller-overrun `OVERFLOW`
/// status to `CORRUPTION_DETECTED`, per §9's bit-reader safety note.
fn reject_on_overflow(r: &mut BitReader) -> CmpResult<()> {
  use crate::bit_reader::RefillStatus;
  match r.refill() {
    RefillStatus::Overflow => Err(crate::errors::CmpError::CorruptionDetected),
    _ => Ok(()),
  }
}
