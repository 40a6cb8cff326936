//! Record-type registry (component F, §4.5 and §9's design note on
//! "polymorphism over record variants"). Instead of a switch statement per
//! data type, every known record shape is a static [`RecordLayout`]
//! descriptor; the per-field codec (component E) loops over whichever
//! layout [`layout_for_subservice`] returns instead of duplicating its loop
//! per variant.
//!
//! Subservice codes below are this crate's own numbering — the original
//! instrument's numbering was not available to ground them against, so
//! they're assigned sequentially by chunk class (see DESIGN.md).

use crate::constants::{MAX_FIELD_BITS, MIN_FIELD_BITS};
use crate::errors::{CmpError, CmpResult};

/// Which of a chunk's `(cmp_par, spill_par)` pairs a field's samples are
/// compressed with. Grouped so that even the widest 10-field record stays
/// within [`crate::constants::CHUNK_HEADER_N_PAR_PAIRS`] slots — paired
/// axes (`ncob_x`/`ncob_y`, `ecob_x`/`ecob_y`) and the three variance
/// fields share a slot, matching how the fields vary together physically.
pub type ParamSlot = u8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
  pub name: &'static str,
  pub max_bits: u32,
  pub param_slot: ParamSlot,
}

const fn field(name: &'static str, max_bits: u32, param_slot: ParamSlot) -> FieldDescriptor {
  debug_assert!(max_bits >= MIN_FIELD_BITS && max_bits <= MAX_FIELD_BITS);
  FieldDescriptor {
    name,
    max_bits,
    param_slot,
  }
}

/// A chunk's shared classification: every collection within one chunk
/// must belong to the same class (§3, §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChunkClass {
  NcamImagette,
  SatImagette,
  ShortCadence,
  LongCadence,
  /// The `F_FX*` family. §9's open question about asymmetric encode/decode
  /// support is resolved here by supporting it fully and symmetrically,
  /// scoped to its own chunk class rather than rejecting it outright.
  FChain,
  OffsetBackground,
  Smearing,
}

/// One subservice code's record shape, independent of chunk class.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum SubService {
  NcamImagette,
  SatImagette,
  SFx,
  SFxEfxNcobEcob,
  SFxEfxNcobEcobVariance,
  FFx,
  FFxEfxNcobEcob,
  LFx,
  LFxEfxNcobEcob,
  LFxEfxNcobEcobVariance,
  Offset,
  Background,
  Smearing,
}

impl SubService {
  pub fn code(self) -> u8 {
    use SubService::*;
    match self {
      NcamImagette => 1,
      SatImagette => 2,
      SFx => 10,
      SFxEfxNcobEcob => 11,
      SFxEfxNcobEcobVariance => 12,
      FFx => 20,
      FFxEfxNcobEcob => 21,
      LFx => 30,
      LFxEfxNcobEcob => 31,
      LFxEfxNcobEcobVariance => 32,
      Offset => 40,
      Background => 41,
      Smearing => 50,
    }
  }

  pub fn from_code(code: u8) -> CmpResult<Self> {
    use SubService::*;
    Ok(match code {
      1 => NcamImagette,
      2 => SatImagette,
      10 => SFx,
      11 => SFxEfxNcobEcob,
      12 => SFxEfxNcobEcobVariance,
      20 => FFx,
      21 => FFxEfxNcobEcob,
      30 => LFx,
      31 => LFxEfxNcobEcob,
      32 => LFxEfxNcobEcobVariance,
      40 => Offset,
      41 => Background,
      50 => Smearing,
      _ => return Err(CmpError::ColSubserviceUnsupported),
    })
  }
}

pub struct RecordLayout {
  pub subservice: SubService,
  pub chunk_class: ChunkClass,
  pub fields: &'static [FieldDescriptor],
}

impl RecordLayout {
  /// Total bits one record of this layout occupies in its raw (pre-fold,
  /// pre-escape) form — used to validate a collection's `data_length`
  /// against its sample count.
  pub fn sample_bits(&self) -> u32 {
    self.fields.iter().map(|f| f.max_bits).sum()
  }

  pub fn n_param_slots(&self) -> usize {
    self
      .fields
      .iter()
      .map(|f| f.param_slot as usize)
      .max()
      .map(|m| m + 1)
      .unwrap_or(0)
  }
}

const IMAGETTE_FIELDS: [FieldDescriptor; 1] = [field("pixel", 16, 0)];

const S_FX_FIELDS: [FieldDescriptor; 2] = [field("exp_flags", 8, 0), field("fx", 32, 1)];

const FX_EFX_NCOB_ECOB_FIELDS: [FieldDescriptor; 7] = [
  field("exp_flags", 8, 0),
  field("fx", 32, 1),
  field("efx", 32, 2),
  field("ncob_x", 32, 3),
  field("ncob_y", 32, 3),
  field("ecob_x", 32, 4),
  field("ecob_y", 32, 4),
];

const FX_EFX_NCOB_ECOB_VARIANCE_FIELDS: [FieldDescriptor; 10] = [
  field("exp_flags", 8, 0),
  field("fx", 32, 1),
  field("efx", 32, 2),
  field("ncob_x", 32, 3),
  field("ncob_y", 32, 3),
  field("ecob_x", 32, 4),
  field("ecob_y", 32, 4),
  field("fx_variance", 32, 5),
  field("cob_x_variance", 32, 5),
  field("cob_y_variance", 32, 5),
];

const OFFSET_FIELDS: [FieldDescriptor; 2] = [field("mean", 32, 0), field("variance", 32, 1)];

const BACKGROUND_FIELDS: [FieldDescriptor; 3] = [
  field("mean", 32, 0),
  field("variance", 32, 1),
  field("outlier_pixels", 24, 2),
];

const SMEARING_FIELDS: [FieldDescriptor; 3] = [
  field("mean", 32, 0),
  field("variance_mean", 32, 1),
  field("outlier_pixels", 24, 2),
];

static LAYOUTS: &[RecordLayout] = &[
  RecordLayout {
    subservice: SubService::NcamImagette,
    chunk_class: ChunkClass::NcamImagette,
    fields: &IMAGETTE_FIELDS,
  },
  RecordLayout {
    subservice: SubService::SatImagette,
    chunk_class: ChunkClass::SatImagette,
    fields: &IMAGETTE_FIELDS,
  },
  RecordLayout {
    subservice: SubService::SFx,
    chunk_class: ChunkClass::ShortCadence,
    fields: &S_FX_FIELDS,
  },
  RecordLayout {
    subservice: SubService::SFxEfxNcobEcob,
    chunk_class: ChunkClass::ShortCadence,
    fields: &FX_EFX_NCOB_ECOB_FIELDS,
  },
  RecordLayout {
    subservice: SubService::SFxEfxNcobEcobVariance,
    chunk_class: ChunkClass::ShortCadence,
    fields: &FX_EFX_NCOB_ECOB_VARIANCE_FIELDS,
  },
  RecordLayout {
    subservice: SubService::FFx,
    chunk_class: ChunkClass::FChain,
    fields: &S_FX_FIELDS,
  },
  RecordLayout {
    subservice: SubService::FFxEfxNcobEcob,
    chunk_class: ChunkClass::FChain,
    fields: &FX_EFX_NCOB_ECOB_FIELDS,
  },
  RecordLayout {
    subservice: SubService::LFx,
    chunk_class: ChunkClass::LongCadence,
    fields: &S_FX_FIELDS,
  },
  RecordLayout {
    subservice: SubService::LFxEfxNcobEcob,
    chunk_class: ChunkClass::LongCadence,
    fields: &FX_EFX_NCOB_ECOB_FIELDS,
  },
  RecordLayout {
    subservice: SubService::LFxEfxNcobEcobVariance,
    chunk_class: ChunkClass::LongCadence,
    fields: &FX_EFX_NCOB_ECOB_VARIANCE_FIELDS,
  },
  RecordLayout {
    subservice: SubService::Offset,
    chunk_class: ChunkClass::OffsetBackground,
    fields: &OFFSET_FIELDS,
  },
  RecordLayout {
    subservice: SubService::Background,
    chunk_class: ChunkClass::OffsetBackground,
    fields: &BACKGROUND_FIELDS,
  },
  RecordLayout {
    subservice: SubService::Smearing,
    chunk_class: ChunkClass::Smearing,
    fields: &SMEARING_FIELDS,
  },
];

/// Looks up the record layout for a collection's subservice byte.
pub fn layout_for_subservice(code: u8) -> CmpResult<&'static RecordLayout> {
  let sub = SubService::from_code(code)?;
  LAYOUTS
    .iter()
    .find(|l| l.subservice == sub)
    .ok_or(CmpError::ColSubserviceUnsupported)
}

impl PartialEq for SubService {
  fn eq(&self, other: &Self) -> bool {
    self.code() == other.code()
  }
}
impl Eq for SubService {}
