//! Prediction scheme plumbing: the scheme id, the wrap transform for
//! integer corrections, and the delta scheme. The mesh-aware schemes live
//! in their own modules and share [`MeshPredictionContext`].

use crate::corner_table::CornerTable;
use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, Result};
use crate::indices::CornerIndex;

/// Wire identifier of a prediction scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PredictionMethod {
    None = 0,
    Delta = 1,
    Parallelogram = 2,
    ConstrainedMultiParallelogram = 3,
    TexCoordsPortable = 4,
    GeometricNormal = 5,
}

impl PredictionMethod {
    pub(crate) fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::None,
            1 => Self::Delta,
            2 => Self::Parallelogram,
            3 => Self::ConstrainedMultiParallelogram,
            4 => Self::TexCoordsPortable,
            5 => Self::GeometricNormal,
            other => return Err(corrupt(format!("unknown prediction scheme {other}"))),
        })
    }
}

/// Topology handed to the mesh prediction schemes: the corner table plus
/// the two maps produced by the attribute traversal.
#[derive(Clone, Copy)]
pub(crate) struct MeshPredictionContext<'a> {
    pub table: &'a CornerTable,
    /// data position -> corner of first visit.
    pub data_to_corner: &'a [CornerIndex],
    /// vertex id -> data position, -1 while unvisited.
    pub vertex_to_data: &'a [i32],
}

/// Clamp-and-wrap transform for integer corrections. The value bounds are
/// serialized so the decoder wraps identically.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WrapTransform {
    min: i32,
    max: i32,
    max_dif: i64,
}

impl WrapTransform {
    pub fn from_values(values: &[i32]) -> Self {
        let mut min = 0;
        let mut max = 0;
        if let (Some(&lo), Some(&hi)) =
            (values.iter().min(), values.iter().max())
        {
            min = lo;
            max = hi;
        }
        Self::from_bounds(min, max)
    }

    fn from_bounds(min: i32, max: i32) -> Self {
        Self {
            min,
            max,
            max_dif: 1 + max as i64 - min as i64,
        }
    }

    pub fn correction(&self, orig: i32, pred: i32) -> i32 {
        let pred = pred.clamp(self.min, self.max);
        let mut corr = orig as i64 - pred as i64;
        let max_correction = {
            let mut m = self.max_dif / 2;
            if self.max_dif & 1 == 0 {
                m -= 1;
            }
            m
        };
        let min_correction = -(self.max_dif / 2);
        if corr < min_correction {
            corr += self.max_dif;
        } else if corr > max_correction {
            corr -= self.max_dif;
        }
        corr as i32
    }

    pub fn recover(&self, pred: i32, corr: i32) -> i32 {
        let pred = pred.clamp(self.min, self.max);
        let mut value = pred as i64 + corr as i64;
        if value < self.min as i64 {
            value += self.max_dif;
        } else if value > self.max as i64 {
            value -= self.max_dif;
        }
        value as i32
    }

    pub fn write(&self, buffer: &mut EncoderBuffer) -> Result<()> {
        buffer.encode_i32(self.min)?;
        buffer.encode_i32(self.max)
    }

    pub fn read(buffer: &mut DecoderBuffer) -> Result<Self> {
        let min = buffer.decode_i32()?;
        let max = buffer.decode_i32()?;
        if min > max {
            return Err(corrupt("inverted wrap transform bounds"));
        }
        Ok(Self::from_bounds(min, max))
    }
}

/// Computes delta corrections in place of `out`: entry i is predicted from
/// entry i-1, entry 0 from zero.
pub(crate) fn delta_corrections(
    values: &[i32],
    num_components: usize,
    wrap: &WrapTransform,
    out: &mut [i32],
) {
    let num_entries = values.len() / num_components;
    for c in 0..num_components {
        out[c] = wrap.correction(values[c], 0);
    }
    for entry in 1..num_entries {
        let offset = entry * num_components;
        let prev = offset - num_components;
        for c in 0..num_components {
            out[offset + c] = wrap.correction(values[offset + c], values[prev + c]);
        }
    }
}

/// Inverse of [`delta_corrections`].
pub(crate) fn delta_recover(
    corrections: &[i32],
    num_components: usize,
    wrap: &WrapTransform,
    out: &mut [i32],
) {
    let num_entries = corrections.len() / num_components;
    for c in 0..num_components {
        out[c] = wrap.recover(0, corrections[c]);
    }
    for entry in 1..num_entries {
        let offset = entry * num_components;
        for c in 0..num_components {
            let prev = out[offset - num_components + c];
            out[offset + c] = wrap.recover(prev, corrections[offset + c]);
        }
    }
}
