//! Chunk framer (component G, §4.6) and the crate's public entry points
//! (§6's abstract "Input API surface"). Compresses a chunk's collections
//! one at a time into a self-describing entity (component H's header
//! plus per-collection framing), with a raw fallback for any collection
//! that does not compress within its budget. Decompression is the exact
//! inverse.

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::collection::CollectionHeader;
use crate::config::{model_mode_is_used, CompressionConfig, CompressionMode, FieldParams};
use crate::constants::{
  CHUNK_HEADER_N_PAR_PAIRS, CMP_ENTITY_MAX_ORIGINAL_SIZE, COLLECTION_HEADER_SIZE,
  COLLECTION_LEN_PREFIX_SIZE, IMAGETTE_HEADER_N_PAR_PAIRS,
};
use crate::entity::{DataType, EntityHeader, HeaderParPair};
use crate::env::environment;
use crate::errors::{CmpError, CmpResult};
use crate::field_codec::{
  decode_field, encode_field, extract_field_columns, pack_field_columns, ModelSource,
};
use crate::registry::{ChunkClass, RecordLayout};
use std::ops::Range;

struct CollectionEntry {
  header: CollectionHeader,
  layout: &'static RecordLayout,
  data_range: Range<usize>,
}

/// Walks a chunk's collections once, validating the framing invariants
/// from §3/§4.6: every collection header resolves to a known layout,
/// `n_records * sample_size == data_length`, every collection shares one
/// chunk class, and the collections exactly tile the chunk.
fn scan_collections(chunk: &[u8]) -> CmpResult<Vec<CollectionEntry>> {
  if chunk.len() < COLLECTION_HEADER_SIZE {
    return Err(CmpError::ChunkTooSmall);
  }
  if chunk.len() > CMP_ENTITY_MAX_ORIGINAL_SIZE {
    return Err(CmpError::ChunkTooLarge);
  }

  let mut entries = Vec::new();
  let mut offset = 0;
  let mut chunk_class: Option<ChunkClass> = None;

  while offset < chunk.len() {
    if chunk.len() - offset < COLLECTION_HEADER_SIZE {
      return Err(CmpError::ChunkSizeInconsistent);
    }
    let header = CollectionHeader::parse(&chunk[offset..offset + COLLECTION_HEADER_SIZE])?;
    let layout = header.layout()?;

    match chunk_class {
      None => chunk_class = Some(layout.chunk_class),
      Some(c) if c == layout.chunk_class => {}
      _ => return Err(CmpError::ChunkSubserviceInconsistent),
    }

    if header.data_length as usize > u16::MAX as usize {
      return Err(CmpError::IntCmpColTooLarge);
    }

    let data_start = offset + COLLECTION_HEADER_SIZE;
    let data_end = data_start + header.data_length as usize;
    if data_end > chunk.len() {
      return Err(CmpError::ChunkSizeInconsistent);
    }

    entries.push(CollectionEntry {
      header,
      layout,
      data_range: data_start..data_end,
    });
    offset = data_end;
  }

  Ok(entries)
}

fn n_par_slots_for(data_type: DataType) -> usize {
  if matches!(data_type, DataType::NcamImagette | DataType::SatImagette) {
    IMAGETTE_HEADER_N_PAR_PAIRS
  } else {
    CHUNK_HEADER_N_PAR_PAIRS
  }
}

/// Attempts to compress one collection's field columns into `budget_bytes`.
/// Returns `Err(SmallBuf)` (never a partial write the caller could
/// mistake for success) the moment the budget is exceeded, so the framer
/// can fall back to storing the collection raw (§4.6).
fn try_compress_collection(
  data: &[u8],
  model: Option<&[u8]>,
  layout: &RecordLayout,
  cfg: &CompressionConfig,
  n_records: usize,
  budget_bytes: usize,
) -> CmpResult<(Vec<u8>, Option<Vec<u8>>)> {
  let model_mode = model_mode_is_used(cfg.cmp_mode);
  let data_columns = extract_field_columns(data, layout.fields, n_records);
  let model_columns = model.map(|m| extract_field_columns(m, layout.fields, n_records));

  let mut buf = vec![0_u8; budget_bytes];
  let mut updated_columns: Vec<Vec<u32>> = Vec::with_capacity(layout.fields.len());
  let byte_len;
  {
    let mut w = BitWriter::new(&mut buf);
    for (i, field) in layout.fields.iter().enumerate() {
      let params = cfg.field_params[field.param_slot as usize];
      let model_source = if model_mode {
        ModelSource::External(&model_columns.as_ref().unwrap()[i])
      } else {
        ModelSource::RunningDiff
      };
      let mut updated_out = if model_mode {
        Some(Vec::with_capacity(n_records))
      } else {
        None
      };
      encode_field(
        &mut w,
        cfg.cmp_mode,
        params,
        field.max_bits,
        cfg.lossy_par,
        cfg.model_value,
        &data_columns[i],
        model_source,
        updated_out.as_mut(),
      )?;
      if let Some(u) = updated_out {
        updated_columns.push(u);
      }
    }
    w.pad_to_word_boundary();
    byte_len = w.byte_len();
  }

  if byte_len > budget_bytes {
    return Err(CmpError::SmallBuf);
  }
  buf.truncate(byte_len);

  let updated_bytes = if model_mode {
    Some(pack_field_columns(layout.fields, &updated_columns, n_records))
  } else {
    None
  };
  Ok((buf, updated_bytes))
}

/// Compresses `chunk` (a byte-exact sequence of collections, §3) into
/// `dst`, following `cfg`. Reads the host timestamp/version through the
/// process-wide [`crate::env::Environment`] installed by
/// [`crate::env::compress_chunk_init`]. On success, returns the number of
/// bytes written to `dst` (the entity size).
pub fn compress_chunk(
  chunk: &[u8],
  model: Option<&[u8]>,
  mut updated_model: Option<&mut Vec<u8>>,
  dst: &mut [u8],
  cfg: &CompressionConfig,
) -> CmpResult<usize> {
  cfg.validate()?;
  let env = environment()?;
  let entries = scan_collections(chunk)?;
  if entries.is_empty() {
    return Err(CmpError::ChunkTooSmall);
  }
  let chunk_class = entries[0].layout.chunk_class;
  let data_type = DataType::from_chunk_class(chunk_class);
  let model_mode = model_mode_is_used(cfg.cmp_mode);

  if model_mode {
    let m = model.ok_or(CmpError::ParBuffers)?;
    if m.len() != chunk.len() {
      return Err(CmpError::ParBuffers);
    }
  }
  if let Some(out) = updated_model.as_deref_mut() {
    out.clear();
  }

  if cfg.cmp_mode == CompressionMode::Raw {
    let header_len = EntityHeader::header_len_for(true, data_type);
    let entity_size = header_len + chunk.len();
    if dst.len() < entity_size {
      return Err(CmpError::SmallBuf);
    }
    let header = EntityHeader {
      version_id: env.version_id,
      entity_size: entity_size as u32,
      original_size: chunk.len() as u32,
      start_timestamp: (env.get_timestamp)(),
      end_timestamp: (env.get_timestamp)(),
      data_type,
      raw_bit: true,
      cmp_mode: CompressionMode::Raw,
      model_value: 0,
      lossy_round: 0,
      model_id: 0,
      model_counter: 0,
      par_pairs: Vec::new(),
    };
    header.write(&mut dst[..header_len])?;
    dst[header_len..entity_size].copy_from_slice(chunk);
    return Ok(entity_size);
  }

  let n_slots = n_par_slots_for(data_type);
  if cfg.field_params.len() < n_slots {
    return Err(CmpError::ParSpecific);
  }

  let header_len = EntityHeader::header_len_for(false, data_type);
  if dst.len() < header_len {
    return Err(CmpError::SmallBuf);
  }
  let mut offset_out = header_len;

  for entry in &entries {
    let n_records = entry.header.n_records as usize;
    let data_slice = &chunk[entry.data_range.clone()];
    let model_slice = model.map(|m| &m[entry.data_range.clone()]);

    let (cmp_bytes, updated_bytes) = if n_records == 0 {
      (Vec::new(), if model_mode { Some(Vec::new()) } else { None })
    } else {
      let budget_bytes = entry.header.data_length as usize - 1;
      match try_compress_collection(data_slice, model_slice, entry.layout, cfg, n_records, budget_bytes) {
        Ok(r) => r,
        Err(CmpError::SmallBuf) => {
          let raw = data_slice.to_vec();
          let updated = if model_mode { Some(raw.clone()) } else { None };
          (raw, updated)
        }
        Err(e) => return Err(e),
      }
    };

    let cmp_len = cmp_bytes.len();
    if cmp_len > u16::MAX as usize {
      return Err(CmpError::IntCmpColTooLarge);
    }
    if offset_out + COLLECTION_LEN_PREFIX_SIZE + COLLECTION_HEADER_SIZE + cmp_len > dst.len() {
      return Err(CmpError::SmallBuf);
    }

    dst[offset_out..offset_out + COLLECTION_LEN_PREFIX_SIZE].copy_from_slice(&(cmp_len as u16).to_be_bytes());
    let header_dst = &mut dst[offset_out + COLLECTION_LEN_PREFIX_SIZE
      ..offset_out + COLLECTION_LEN_PREFIX_SIZE + COLLECTION_HEADER_SIZE];
    entry.header.write(header_dst);
    let body_start = offset_out + COLLECTION_LEN_PREFIX_SIZE + COLLECTION_HEADER_SIZE;
    let body_end = body_start + cmp_len;
    dst[body_start..body_end].copy_from_slice(&cmp_bytes);

    if let Some(out) = updated_model.as_deref_mut() {
      if model_mode {
        let mut header_bytes = [0_u8; COLLECTION_HEADER_SIZE];
        entry.header.write(&mut header_bytes);
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&updated_bytes.unwrap());
      }
    }

    offset_out = body_end;
  }

  let entity_size = offset_out;
  let par_pairs: Vec<HeaderParPair> = (0..n_slots)
    .map(|i| {
      let p = cfg.field_params[i];
      HeaderParPair {
        cmp_par: p.m as u16,
        spill_par: p.resolved_s() as u16,
      }
    })
    .collect();
  let header = EntityHeader {
    version_id: env.version_id,
    entity_size: entity_size as u32,
    original_size: chunk.len() as u32,
    start_timestamp: (env.get_timestamp)(),
    end_timestamp: (env.get_timestamp)(),
    data_type,
    raw_bit: false,
    cmp_mode: cfg.cmp_mode,
    model_value: cfg.model_value,
    lossy_round: cfg.lossy_par,
    model_id: 0,
    model_counter: 0,
    par_pairs,
  };
  header.write(&mut dst[..header_len])?;
  Ok(entity_size)
}

/// Upper bound on `compress_chunk`'s output size for `chunk`, without
/// actually compressing it (§6). Worst case every collection falls back
/// to raw storage: `header + chunk_size + 2 bytes per collection` for the
/// per-collection length prefixes, using the widest (chunk-variant)
/// header unconditionally since the caller hasn't committed to a mode.
pub fn compress_chunk_cmp_size_bound(chunk: &[u8]) -> CmpResult<usize> {
  let entries = scan_collections(chunk)?;
  let header_len = EntityHeader::header_len_for(false, DataType::Chunk);
  Ok(header_len + chunk.len() + entries.len() * COLLECTION_LEN_PREFIX_SIZE)
}

/// Rewrites a finalized entity's `model_id`/`model_counter` fields in
/// place (§4.7) — the only mutation this format allows after the fact.
pub fn compress_chunk_set_model_id_and_counter(
  dst: &mut [u8],
  model_id: u16,
  model_counter: u16,
) -> CmpResult<usize> {
  crate::entity::set_model_id_and_counter(dst, model_id, model_counter)
}

/// Decompresses one entity produced by [`compress_chunk`] back into the
/// original chunk bytes. When the entity was compressed in a `MODEL_*`
/// mode, `model` must hold the same prior model the compressor used, and
/// `updated_model`, if supplied, receives the recomputed model — required
/// to agree byte-for-byte with the compressor's own `updated_model`
/// output (§8's property 2).
pub fn decompress_cmp_entity(
  entity: &[u8],
  model: Option<&[u8]>,
  mut updated_model: Option<&mut Vec<u8>>,
  out: &mut Vec<u8>,
) -> CmpResult<usize> {
  let (header, header_len) = EntityHeader::parse(entity)?;
  let payload = &entity[header_len..];
  out.clear();
  if let Some(u) = updated_model.as_deref_mut() {
    u.clear();
  }

  if header.raw_bit {
    if payload.len() != header.original_size as usize {
      return Err(CmpError::EntityHeader);
    }
    out.extend_from_slice(payload);
    return Ok(out.len());
  }

  let model_mode = model_mode_is_used(header.cmp_mode);
  if model_mode && model.is_none() {
    return Err(CmpError::ParBuffers);
  }

  let mut offset_in = 0_usize;
  let mut offset_model = 0_usize;
  let mut chunk_class: Option<ChunkClass> = None;

  while offset_in < payload.len() {
    if payload.len() - offset_in < COLLECTION_LEN_PREFIX_SIZE + COLLECTION_HEADER_SIZE {
      return Err(CmpError::ChunkSizeInconsistent);
    }
    let cmp_len = u16::from_be_bytes([payload[offset_in], payload[offset_in + 1]]) as usize;
    let header_bytes = &payload[offset_in + COLLECTION_LEN_PREFIX_SIZE
      ..offset_in + COLLECTION_LEN_PREFIX_SIZE + COLLECTION_HEADER_SIZE];
    let coll_header = CollectionHeader::parse(header_bytes)?;
    let layout = coll_header.layout()?;

    match chunk_class {
      None => chunk_class = Some(layout.chunk_class),
      Some(c) if c == layout.chunk_class => {}
      _ => return Err(CmpError::ChunkSubserviceInconsistent),
    }

    let body_start = offset_in + COLLECTION_LEN_PREFIX_SIZE + COLLECTION_HEADER_SIZE;
    let body_end = body_start + cmp_len;
    if body_end > payload.len() {
      return Err(CmpError::ChunkSizeInconsistent);
    }
    let body = &payload[body_start..body_end];

    let data_length = coll_header.data_length as usize;
    let n_records = coll_header.n_records as usize;

    let model_slice = if model_mode {
      let m = model.unwrap();
      if offset_model + data_length > m.len() {
        return Err(CmpError::ParBuffers);
      }
      Some(&m[offset_model..offset_model + data_length])
    } else {
      None
    };

    out.extend_from_slice(header_bytes);
    if let Some(u) = updated_model.as_deref_mut() {
      if model_mode {
        u.extend_from_slice(header_bytes);
      }
    }

    if cmp_len == data_length {
      // Raw per-collection fallback (§4.6): the compressor could not fit
      // this collection in its budget, so it is stored verbatim, and the
      // updated model — if requested — is a copy of the raw data.
      out.extend_from_slice(body);
      if let Some(u) = updated_model.as_deref_mut() {
        if model_mode {
          u.extend_from_slice(body);
        }
      }
    } else {
      let model_columns = model_slice.map(|m| extract_field_columns(m, layout.fields, n_records));
      let mut r = BitReader::new(body);
      let mut columns: Vec<Vec<u32>> = Vec::with_capacity(layout.fields.len());
      let mut updated_columns: Vec<Vec<u32>> = Vec::new();

      for (i, field) in layout.fields.iter().enumerate() {
        let idx = field.param_slot as usize;
        if idx >= header.par_pairs.len() {
          return Err(CmpError::ParSpecific);
        }
        let pair = header.par_pairs[idx];
        let params = FieldParams {
          m: pair.cmp_par as u32,
          s: pair.spill_par as u32,
        };
        let model_source = if model_mode {
          ModelSource::External(&model_columns.as_ref().unwrap()[i])
        } else {
          ModelSource::RunningDiff
        };
        let mut out_col = Vec::with_capacity(n_records);
        let mut updated_out = if model_mode {
          Some(Vec::with_capacity(n_records))
        } else {
          None
        };
        decode_field(
          &mut r,
          header.cmp_mode,
          params,
          field.max_bits,
          header.lossy_round,
          header.model_value,
          n_records,
          model_source,
          &mut out_col,
          updated_out.as_mut(),
        )?;
        columns.push(out_col);
        if let Some(u) = updated_out {
          updated_columns.push(u);
        }
      }

      let packed = pack_field_columns(layout.fields, &columns, n_records);
      out.extend_from_slice(&packed);
      if let Some(u) = updated_model.as_deref_mut() {
        if model_mode {
          let packed_updated = pack_field_columns(layout.fields, &updated_columns, n_records);
          u.extend_from_slice(&packed_updated);
        }
      }
    }

    offset_model += data_length;
    offset_in = body_end;
  }

  if offset_in != payload.len() {
    return Err(CmpError::ChunkSizeInconsistent);
  }
  if out.len() != header.original_size as usize {
    return Err(CmpError::EntityHeader);
  }

  Ok(out.len())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::FieldParams;
  use crate::env::compress_chunk_init;
  use std::sync::Once;

  static INIT: Once = Once::new();
  fn fixed_timestamp() -> crate::env::Timestamp48 {
    42
  }
  fn ensure_env() {
    INIT.call_once(|| {
      let _ = compress_chunk_init(fixed_timestamp, 0xCAFEBABE_u32 & 0x7FFF_FFFF);
    });
  }

  fn imagette_chunk(samples: &[u16]) -> Vec<u8> {
    let mut buf = vec![0_u8; COLLECTION_HEADER_SIZE + samples.len() * 2];
    let header = CollectionHeader {
      subservice: 1, // NcamImagette
      reserved: 0,
      n_records: samples.len() as u16,
      data_length: (samples.len() * 2) as u32,
      coarse_time: 0,
    };
    header.write(&mut buf[0..COLLECTION_HEADER_SIZE]);
    for (i, &s) in samples.iter().enumerate() {
      let off = COLLECTION_HEADER_SIZE + i * 2;
      buf[off..off + 2].copy_from_slice(&s.to_be_bytes());
    }
    buf
  }

  #[test]
  fn test_s1_raw_mode_imagette() {
    ensure_env();
    let chunk = imagette_chunk(&[0x0001, 0x0203]);
    let cfg = CompressionConfig::default().with_mode(CompressionMode::Raw);
    let mut dst = vec![0_u8; 256];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    let mut out = Vec::new();
    let recovered = decompress_cmp_entity(&dst[..size], None, None, &mut out).unwrap();
    assert_eq!(recovered, chunk.len());
    assert_eq!(out, chunk);
  }

  #[test]
  fn test_s2_zero_escape_rice_all_in_range() {
    ensure_env();
    let chunk = imagette_chunk(&[3, 5, 5, 6]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffZero)
      .with_field_params(vec![FieldParams { m: 4, s: 32 }]);
    let mut dst = vec![0_u8; 256];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    let mut out = Vec::new();
    decompress_cmp_entity(&dst[..size], None, None, &mut out).unwrap();
    assert_eq!(out, chunk);
  }

  #[test]
  fn test_auto_spill_round_trips_for_large_golomb_m() {
    // `m = 4096` pushes `max_spill(m)` past the header's 16-bit
    // `spill_par` width; leaving `s = 0` (auto-fill) must not truncate
    // differently on the encode and decode sides.
    ensure_env();
    let chunk = imagette_chunk(&[3, 5, 5, 6, 40000, 1]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffZero)
      .with_field_params(vec![FieldParams { m: 4096, s: 0 }]);
    let mut dst = vec![0_u8; 256];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    let mut out = Vec::new();
    decompress_cmp_entity(&dst[..size], None, None, &mut out).unwrap();
    assert_eq!(out, chunk);
  }

  #[test]
  fn test_s3_zero_escape_outlier() {
    ensure_env();
    let chunk = imagette_chunk(&[3, 5, 0xFFFF, 6]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffZero)
      .with_field_params(vec![FieldParams { m: 4, s: 32 }]);
    let mut dst = vec![0_u8; 256];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    let mut out = Vec::new();
    decompress_cmp_entity(&dst[..size], None, None, &mut out).unwrap();
    assert_eq!(out, chunk);
  }

  #[test]
  fn test_s4_multi_escape_boundary() {
    ensure_env();
    let chunk = imagette_chunk(&[0, 17, 0, 0]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffMulti)
      .with_field_params(vec![FieldParams { m: 4, s: 16 }]);
    let mut dst = vec![0_u8; 256];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    let mut out = Vec::new();
    decompress_cmp_entity(&dst[..size], None, None, &mut out).unwrap();
    assert_eq!(out, chunk);
  }

  #[test]
  fn test_s5_raw_fallback_per_collection() {
    ensure_env();
    // first collection compresses well (constant), second is adversarial
    // (alternating min/max) so it cannot fit the compressed budget.
    let n = 20;
    let compressible: Vec<u16> = vec![5; n];
    let incompressible: Vec<u16> = (0..n)
      .map(|i| if i % 2 == 0 { 0 } else { 0xFFFF })
      .collect();

    let mut chunk = Vec::new();
    for samples in [&compressible, &incompressible] {
      let h = CollectionHeader {
        subservice: 1,
        reserved: 0,
        n_records: samples.len() as u16,
        data_length: (samples.len() * 2) as u32,
        coarse_time: 0,
      };
      let mut hbuf = [0_u8; COLLECTION_HEADER_SIZE];
      h.write(&mut hbuf);
      chunk.extend_from_slice(&hbuf);
      for &s in samples.iter() {
        chunk.extend_from_slice(&s.to_be_bytes());
      }
    }

    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffMulti)
      .with_field_params(vec![FieldParams { m: 2, s: 4 }]);
    let mut dst = vec![0_u8; 4096];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    let mut out = Vec::new();
    decompress_cmp_entity(&dst[..size], None, None, &mut out).unwrap();
    assert_eq!(out, chunk);
  }

  #[test]
  fn test_s6_multi_collection_same_class_roundtrip() {
    ensure_env();
    // two short-cadence collections, different sub-services (S_FX and
    // S_FX_EFX_NCOB_ECOB), same chunk class.
    let mut chunk = Vec::new();
    let fx_h = CollectionHeader {
      subservice: 10, // S_FX
      reserved: 0,
      n_records: 2,
      data_length: 2 * 5, // exp_flags(1B) + fx(4B)
      coarse_time: 0,
    };
    let mut hbuf = [0_u8; COLLECTION_HEADER_SIZE];
    fx_h.write(&mut hbuf);
    chunk.extend_from_slice(&hbuf);
    chunk.extend_from_slice(&[1, 0, 0, 0, 10]);
    chunk.extend_from_slice(&[2, 0, 0, 1, 0]);

    let full_h = CollectionHeader {
      subservice: 11, // S_FX_EFX_NCOB_ECOB
      reserved: 0,
      n_records: 1,
      data_length: 1 + 4 * 6,
      coarse_time: 0,
    };
    let mut hbuf2 = [0_u8; COLLECTION_HEADER_SIZE];
    full_h.write(&mut hbuf2);
    chunk.extend_from_slice(&hbuf2);
    chunk.push(7);
    for v in [100_u32, 200, 300, 400, 500, 600] {
      chunk.extend_from_slice(&v.to_be_bytes());
    }

    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffZero)
      .with_field_params(vec![
        FieldParams { m: 2, s: 0 },
        FieldParams { m: 4, s: 0 },
        FieldParams { m: 4, s: 0 },
        FieldParams { m: 4, s: 0 },
        FieldParams { m: 4, s: 0 },
        FieldParams { m: 4, s: 0 },
      ]);
    let mut dst = vec![0_u8; 4096];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    let mut out = Vec::new();
    decompress_cmp_entity(&dst[..size], None, None, &mut out).unwrap();
    assert_eq!(out, chunk);
  }

  #[test]
  fn test_mixed_chunk_class_is_rejected() {
    ensure_env();
    let mut chunk = Vec::new();
    let short_h = CollectionHeader {
      subservice: 10, // S_FX, short cadence
      reserved: 0,
      n_records: 1,
      data_length: 5,
      coarse_time: 0,
    };
    let mut hbuf = [0_u8; COLLECTION_HEADER_SIZE];
    short_h.write(&mut hbuf);
    chunk.extend_from_slice(&hbuf);
    chunk.extend_from_slice(&[1, 0, 0, 0, 1]);

    let long_h = CollectionHeader {
      subservice: 30, // L_FX, long cadence
      reserved: 0,
      n_records: 1,
      data_length: 5,
      coarse_time: 0,
    };
    let mut hbuf2 = [0_u8; COLLECTION_HEADER_SIZE];
    long_h.write(&mut hbuf2);
    chunk.extend_from_slice(&hbuf2);
    chunk.extend_from_slice(&[1, 0, 0, 0, 1]);

    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffZero)
      .with_field_params(vec![FieldParams { m: 2, s: 0 }]);
    let mut dst = vec![0_u8; 4096];
    assert_eq!(
      compress_chunk(&chunk, None, None, &mut dst, &cfg),
      Err(CmpError::ChunkSubserviceInconsistent)
    );
  }

  #[test]
  fn test_model_mode_updated_model_agreement() {
    ensure_env();
    let chunk = imagette_chunk(&[10, 12, 9, 40]);
    let model = imagette_chunk(&[0, 10, 11, 10]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::ModelMulti)
      .with_model_value(8)
      .with_field_params(vec![FieldParams { m: 4, s: 16 }]);
    let mut dst = vec![0_u8; 256];
    let mut updated_enc = Vec::new();
    let size = compress_chunk(&chunk, Some(&model), Some(&mut updated_enc), &mut dst, &cfg).unwrap();

    let mut out = Vec::new();
    let mut updated_dec = Vec::new();
    decompress_cmp_entity(&dst[..size], Some(&model), Some(&mut updated_dec), &mut out).unwrap();
    assert_eq!(out, chunk);
    assert_eq!(updated_enc, updated_dec);
  }

  #[test]
  fn test_model_mode_updated_model_agreement_with_lossy_round() {
    ensure_env();
    let chunk = imagette_chunk(&[10, 12, 9, 40]);
    let model = imagette_chunk(&[0, 10, 11, 10]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::ModelMulti)
      .with_model_value(8)
      .with_lossy_par(2)
      .with_field_params(vec![FieldParams { m: 4, s: 16 }]);
    let mut dst = vec![0_u8; 256];
    let mut updated_enc = Vec::new();
    let size = compress_chunk(&chunk, Some(&model), Some(&mut updated_enc), &mut dst, &cfg).unwrap();

    let mut out = Vec::new();
    let mut updated_dec = Vec::new();
    decompress_cmp_entity(&dst[..size], Some(&model), Some(&mut updated_dec), &mut out).unwrap();
    assert_eq!(updated_enc, updated_dec);
  }

  #[test]
  fn test_size_bound_holds() {
    ensure_env();
    let chunk = imagette_chunk(&[1, 2, 3, 4, 5]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffZero)
      .with_field_params(vec![FieldParams { m: 4, s: 32 }]);
    let bound = compress_chunk_cmp_size_bound(&chunk).unwrap();
    let mut dst = vec![0_u8; bound];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    assert!(size <= bound);
  }

  #[test]
  fn test_set_model_id_and_counter_round_trips_through_decompress() {
    ensure_env();
    let chunk = imagette_chunk(&[1, 2, 3]);
    let cfg = CompressionConfig::default().with_mode(CompressionMode::Raw);
    let mut dst = vec![0_u8; 256];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    compress_chunk_set_model_id_and_counter(&mut dst[..size], 55, 9).unwrap();
    let (header, _) = EntityHeader::parse(&dst[..size]).unwrap();
    assert_eq!(header.model_id, 55);
    assert_eq!(header.model_counter, 9);
  }

  /// Builds a one-collection chunk for `subservice` out of the given
  /// per-field columns (`columns.len()` must match the layout's field
  /// count, `columns[*].len()` the record count).
  fn build_one_collection_chunk(subservice: u8, columns: &[Vec<u32>]) -> Vec<u8> {
    let layout = crate::registry::layout_for_subservice(subservice).unwrap();
    let n_records = columns[0].len();
    let data = pack_field_columns(layout.fields, columns, n_records);
    let header = CollectionHeader {
      subservice,
      reserved: 0,
      n_records: n_records as u16,
      data_length: data.len() as u32,
      coarse_time: 0,
    };
    let mut out = vec![0_u8; COLLECTION_HEADER_SIZE];
    header.write(&mut out);
    out.extend_from_slice(&data);
    out
  }

  /// Synthetic, in-range sample for record `k`, field `i`, bounded to the
  /// field's own declared width so every mode/layout combination below
  /// stays a valid input regardless of which param slot it lands on.
  fn synth_sample(max_bits: u32, k: usize, i: usize) -> u32 {
    let cap_bits = max_bits.min(16); // keep values modest so escape literals stay cheap
    let modulus = 1_u64 << cap_bits;
    (((k * 7 + i * 13 + 1) as u64) % modulus) as u32
  }

  /// Coverage matrix (§8): every compression mode against every record
  /// kind the registry defines. Not all 35 combinations get a dedicated
  /// named test — this loop is the equivalent, and fails with the exact
  /// (subservice, mode) pair that broke.
  #[test]
  fn test_mode_x_record_kind_coverage_matrix() {
    ensure_env();
    let subservices: &[u8] = &[1, 10, 11, 31, 40, 41, 50]; // imagette, S_FX, S_FX_EFX_NCOB_ECOB, L_FX_EFX_NCOB_ECOB, offset, background, smearing
    let modes = [
      CompressionMode::Raw,
      CompressionMode::DiffZero,
      CompressionMode::DiffMulti,
      CompressionMode::ModelZero,
      CompressionMode::ModelMulti,
    ];
    let n_records = 5;

    for &sub in subservices {
      let layout = crate::registry::layout_for_subservice(sub).unwrap();
      let data_columns: Vec<Vec<u32>> = layout
        .fields
        .iter()
        .enumerate()
        .map(|(i, f)| (0..n_records).map(|k| synth_sample(f.max_bits, k, i)).collect())
        .collect();
      let chunk = build_one_collection_chunk(sub, &data_columns);
      let n_slots = if matches!(sub, 1 | 2) { 1 } else { 6 };

      for &mode in &modes {
        let field_params: Vec<FieldParams> = (0..n_slots).map(|_| FieldParams { m: 4, s: 0 }).collect();
        let cfg = CompressionConfig::default().with_mode(mode).with_field_params(field_params);

        let model_chunk = if model_mode_is_used(mode) {
          let model_columns: Vec<Vec<u32>> = layout
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (0..n_records).map(|k| synth_sample(f.max_bits, k.saturating_sub(1), i)).collect())
            .collect();
          Some(build_one_collection_chunk(sub, &model_columns))
        } else {
          None
        };

        let mut dst = vec![0_u8; 4096];
        let size = compress_chunk(&chunk, model_chunk.as_deref(), None, &mut dst, &cfg)
          .unwrap_or_else(|e| panic!("compress failed for subservice {sub} mode {mode:?}: {e:?}"));
        let mut out = Vec::new();
        decompress_cmp_entity(&dst[..size], model_chunk.as_deref(), None, &mut out)
          .unwrap_or_else(|e| panic!("decompress failed for subservice {sub} mode {mode:?}: {e:?}"));
        assert_eq!(out, chunk, "round-trip mismatch for subservice {sub} mode {mode:?}");
      }
    }
  }

  #[test]
  fn test_determinism_same_inputs_same_bytes() {
    ensure_env();
    let chunk = imagette_chunk(&[3, 5, 5, 6, 9000, 1]);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffMulti)
      .with_field_params(vec![FieldParams { m: 4, s: 16 }]);
    let mut dst_a = vec![0_u8; 256];
    let mut dst_b = vec![0_u8; 256];
    let size_a = compress_chunk(&chunk, None, None, &mut dst_a, &cfg).unwrap();
    let size_b = compress_chunk(&chunk, None, None, &mut dst_b, &cfg).unwrap();
    assert_eq!(size_a, size_b);
    assert_eq!(dst_a[..size_a], dst_b[..size_b]);
  }

  #[test]
  fn test_compressed_collection_bitstream_is_word_padded() {
    ensure_env();
    // Highly compressible data so this collection is expected to compress
    // rather than raw-fallback; its bitstream byte length must then be a
    // multiple of 4 (§3, §6's 32-bit padding rule).
    let samples: Vec<u16> = (0..64).map(|_| 5_u16).collect();
    let chunk = imagette_chunk(&samples);
    let cfg = CompressionConfig::default()
      .with_mode(CompressionMode::DiffZero)
      .with_field_params(vec![FieldParams { m: 2, s: 0 }]);
    let mut dst = vec![0_u8; 4096];
    let size = compress_chunk(&chunk, None, None, &mut dst, &cfg).unwrap();
    // payload = entity bytes after the (imagette, non-raw) header
    let header_len = EntityHeader::header_len_for(false, DataType::NcamImagette);
    let cmp_len = u16::from_be_bytes([dst[header_len], dst[header_len + 1]]) as usize;
    assert!(cmp_len < samples.len() * 2, "expected this input to actually compress");
    assert_eq!(cmp_len % 4, 0);
  }

  #[test]
  fn test_random_round_trip_property() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    ensure_env();
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let modes = [
      CompressionMode::DiffZero,
      CompressionMode::DiffMulti,
      CompressionMode::ModelZero,
      CompressionMode::ModelMulti,
    ];

    for trial in 0..20 {
      let mode = modes[trial % modes.len()];
      let n: usize = rng.gen_range(1..40);
      let samples: Vec<u16> = (0..n).map(|_| rng.gen()).collect();
      let chunk = imagette_chunk(&samples);
      let m = rng.gen_range(1_u32..64);
      let cfg = CompressionConfig::default()
        .with_mode(mode)
        .with_model_value(rng.gen_range(0..=16))
        .with_lossy_par(0)
        .with_field_params(vec![FieldParams { m, s: 0 }]);

      let model_chunk = if model_mode_is_used(mode) {
        let model_samples: Vec<u16> = (0..n).map(|_| rng.gen()).collect();
        Some(imagette_chunk(&model_samples))
      } else {
        None
      };

      let mut dst = vec![0_u8; n * 2 + 256];
      let size = compress_chunk(&chunk, model_chunk.as_deref(), None, &mut dst, &cfg).unwrap();
      let mut out = Vec::new();
      decompress_cmp_entity(&dst[..size], model_chunk.as_deref(), None, &mut out).unwrap();
      assert_eq!(out, chunk, "trial {trial} failed for mode {mode:?}, m={m}");
    }
  }
}
