//! Uniform quantization of floating-point attributes.

use crate::attribute::PointAttribute;
use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, invalid_parameter, Result};

/// Range handling for multi-component attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationMode {
    /// One range shared by all components: the largest component spread.
    ScalarRange = 0,
    /// An independent range per component.
    PerComponent = 1,
}

/// Parameters of a quantized attribute: per-component minima, range(s) and
/// the number of bits. Serialized next to the residuals so the decoder can
/// invert the transform.
#[derive(Debug, Clone)]
pub struct AttributeQuantization {
    bits: u8,
    mode: QuantizationMode,
    mins: Vec<f32>,
    ranges: Vec<f32>,
}

impl AttributeQuantization {
    /// Scans the attribute's unique values and derives the parameters.
    pub fn compute(
        attribute: &PointAttribute,
        bits: u8,
        mode: QuantizationMode,
    ) -> Result<Self> {
        if !(1..=30).contains(&bits) {
            return Err(invalid_parameter(format!(
                "quantization bits {bits} out of range 1-30"
            )));
        }
        let num_components = attribute.num_components() as usize;
        let mut mins = vec![f32::MAX; num_components];
        let mut maxs = vec![f32::MIN; num_components];
        for i in 0..attribute.num_values() {
            for c in 0..num_components {
                let v = attribute.component_as_f64(crate::indices::AttributeValueIndex(i as u32), c)?
                    as f32;
                mins[c] = mins[c].min(v);
                maxs[c] = maxs[c].max(v);
            }
        }
        if attribute.num_values() == 0 {
            mins.iter_mut().for_each(|m| *m = 0.0);
            maxs.iter_mut().for_each(|m| *m = 0.0);
        }
        if mins.iter().any(|m| !m.is_finite()) || maxs.iter().any(|m| !m.is_finite()) {
            return Err(invalid_parameter("attribute contains non-finite values"));
        }

        let ranges = match mode {
            QuantizationMode::ScalarRange => {
                let mut range = 0.0f32;
                for c in 0..num_components {
                    range = range.max(maxs[c] - mins[c]);
                }
                vec![if range > 0.0 { range } else { 1.0 }]
            }
            QuantizationMode::PerComponent => (0..num_components)
                .map(|c| {
                    let r = maxs[c] - mins[c];
                    if r > 0.0 {
                        r
                    } else {
                        1.0
                    }
                })
                .collect(),
        };
        Ok(Self {
            bits,
            mode,
            mins,
            ranges,
        })
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    fn max_quantized_value(&self) -> i64 {
        (1i64 << self.bits) - 1
    }

    fn range(&self, component: usize) -> f32 {
        match self.mode {
            QuantizationMode::ScalarRange => self.ranges[0],
            QuantizationMode::PerComponent => self.ranges[component],
        }
    }

    pub fn quantize_component(&self, component: usize, v: f32) -> i32 {
        let max = self.max_quantized_value();
        let normalized = (v - self.mins[component]) / self.range(component);
        let q = (normalized as f64 * max as f64 + 0.5).floor() as i64;
        q.clamp(0, max) as i32
    }

    pub fn dequantize_component(&self, component: usize, q: i32) -> f32 {
        self.mins[component] + (q as f64 * self.range(component) as f64
            / self.max_quantized_value() as f64) as f32
    }

    pub fn write_parameters(&self, buffer: &mut EncoderBuffer) -> Result<()> {
        buffer.encode_u8(self.mode as u8)?;
        for &m in &self.mins {
            buffer.encode_f32(m)?;
        }
        for &r in &self.ranges {
            buffer.encode_f32(r)?;
        }
        buffer.encode_u8(self.bits)
    }

    pub fn read_parameters(buffer: &mut DecoderBuffer, num_components: usize) -> Result<Self> {
        let mode = match buffer.decode_u8()? {
            0 => QuantizationMode::ScalarRange,
            1 => QuantizationMode::PerComponent,
            other => return Err(corrupt(format!("unknown quantization mode {other}"))),
        };
        let mut mins = Vec::with_capacity(num_components);
        for _ in 0..num_components {
            mins.push(buffer.decode_f32()?);
        }
        let num_ranges = match mode {
            QuantizationMode::ScalarRange => 1,
            QuantizationMode::PerComponent => num_components,
        };
        let mut ranges = Vec::with_capacity(num_ranges);
        for _ in 0..num_ranges {
            let r = buffer.decode_f32()?;
            if !(r > 0.0) || !r.is_finite() {
                return Err(corrupt("invalid quantization range"));
            }
            ranges.push(r);
        }
        let bits = buffer.decode_u8()?;
        if !(1..=30).contains(&bits) {
            return Err(corrupt(format!("invalid quantization bit count {bits}")));
        }
        Ok(Self {
            bits,
            mode,
            mins,
            ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeType, DataType};
    use crate::indices::AttributeValueIndex;
    use approx::assert_abs_diff_eq;

    fn float_attribute(values: &[[f32; 3]]) -> PointAttribute {
        let mut att = PointAttribute::new(
            AttributeType::Position,
            DataType::Float32,
            3,
            false,
            values.len(),
        )
        .unwrap();
        for (i, v) in values.iter().enumerate() {
            let mut bytes = Vec::new();
            for c in v {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
            att.set_value(AttributeValueIndex(i as u32), &bytes).unwrap();
        }
        att
    }

    #[test]
    fn roundtrip_error_is_within_half_step() {
        let att = float_attribute(&[[0.0, 0.0, 0.0], [1.0, 2.0, -1.0], [0.5, 1.0, 0.25]]);
        let q = AttributeQuantization::compute(&att, 12, QuantizationMode::ScalarRange).unwrap();
        let step = 3.0 / ((1 << 12) - 1) as f32;
        for i in 0..att.num_values() {
            for c in 0..3 {
                let v = att
                    .component_as_f64(AttributeValueIndex(i as u32), c)
                    .unwrap() as f32;
                let restored = q.dequantize_component(c, q.quantize_component(c, v));
                assert_abs_diff_eq!(restored, v, epsilon = step);
            }
        }
    }

    #[test]
    fn quantization_is_monotone() {
        let att = float_attribute(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]);
        let q = AttributeQuantization::compute(&att, 8, QuantizationMode::ScalarRange).unwrap();
        let mut last = i32::MIN;
        for i in 0..=1000 {
            let v = i as f32 * 0.01;
            let qv = q.quantize_component(0, v);
            assert!(qv >= last);
            last = qv;
        }
    }

    #[test]
    fn per_component_mode_uses_tighter_ranges() {
        let att = float_attribute(&[[0.0, 0.0, 0.0], [100.0, 1.0, 1.0]]);
        let q = AttributeQuantization::compute(&att, 10, QuantizationMode::PerComponent).unwrap();
        // Component 1 spans [0, 1]; a mid value must survive with the fine
        // per-component step, not the coarse shared one.
        let restored = q.dequantize_component(1, q.quantize_component(1, 0.5));
        assert_abs_diff_eq!(restored, 0.5, epsilon = 1.0 / 1023.0);
    }

    #[test]
    fn parameters_roundtrip() {
        let att = float_attribute(&[[0.0, -1.0, 2.0], [4.0, 3.0, 5.0]]);
        let q = AttributeQuantization::compute(&att, 14, QuantizationMode::PerComponent).unwrap();
        let mut enc = EncoderBuffer::new();
        q.write_parameters(&mut enc).unwrap();
        let mut dec = DecoderBuffer::new(enc.data());
        let q2 = AttributeQuantization::read_parameters(&mut dec, 3).unwrap();
        assert_eq!(q2.bits(), 14);
        assert_eq!(q.quantize_component(2, 3.3), q2.quantize_component(2, 3.3));
    }

    #[test]
    fn bad_bit_count_is_rejected() {
        let att = float_attribute(&[[0.0; 3]]);
        assert!(AttributeQuantization::compute(&att, 0, QuantizationMode::ScalarRange).is_err());
        assert!(AttributeQuantization::compute(&att, 31, QuantizationMode::ScalarRange).is_err());
    }
}
