//! Encoder configuration.

use crate::attribute::{AttributeType, PointAttribute};
use crate::error::{invalid_parameter, Result};
use crate::prediction_scheme::PredictionMethod;
use crate::quantization::QuantizationMode;
use std::collections::BTreeMap;

/// Connectivity codec selection for meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMethod {
    Sequential,
    EdgeBreaker,
}

#[derive(Debug, Clone, Copy, Default)]
struct AttributeOptions {
    quantization_bits: Option<u8>,
    prediction_scheme: Option<PredictionMethod>,
}

/// Keyed settings controlling the encoder. Out-of-range values are
/// rejected when set, so a constructed options object is always valid.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    encoding_speed: u8,
    decoding_speed: u8,
    encoding_method: Option<EncodingMethod>,
    quantization_mode: QuantizationMode,
    attributes: BTreeMap<i32, AttributeOptions>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            encoding_speed: 5,
            decoding_speed: 5,
            encoding_method: None,
            quantization_mode: QuantizationMode::ScalarRange,
            attributes: BTreeMap::new(),
        }
    }
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0 = smallest output, 10 = fastest encode.
    pub fn set_encoding_speed(&mut self, speed: u8) -> Result<()> {
        if speed > 10 {
            return Err(invalid_parameter(format!("encoding speed {speed} out of range 0-10")));
        }
        self.encoding_speed = speed;
        Ok(())
    }

    pub fn encoding_speed(&self) -> u8 {
        self.encoding_speed
    }

    /// Advisory hint biasing scheme selection toward cheaper decoders.
    pub fn set_decoding_speed(&mut self, speed: u8) -> Result<()> {
        if speed > 10 {
            return Err(invalid_parameter(format!("decoding speed {speed} out of range 0-10")));
        }
        self.decoding_speed = speed;
        Ok(())
    }

    pub fn decoding_speed(&self) -> u8 {
        self.decoding_speed
    }

    pub fn set_encoding_method(&mut self, method: EncodingMethod) {
        self.encoding_method = Some(method);
    }

    pub fn encoding_method(&self) -> Option<EncodingMethod> {
        self.encoding_method
    }

    pub fn set_quantization_mode(&mut self, mode: QuantizationMode) {
        self.quantization_mode = mode;
    }

    pub fn quantization_mode(&self) -> QuantizationMode {
        self.quantization_mode
    }

    pub fn set_quantization_bits(&mut self, attribute_id: i32, bits: u8) -> Result<()> {
        if !(1..=30).contains(&bits) {
            return Err(invalid_parameter(format!(
                "quantization bits {bits} out of range 1-30"
            )));
        }
        self.attributes.entry(attribute_id).or_default().quantization_bits = Some(bits);
        Ok(())
    }

    pub fn set_prediction_scheme(&mut self, attribute_id: i32, scheme: PredictionMethod) {
        self.attributes.entry(attribute_id).or_default().prediction_scheme = Some(scheme);
    }

    pub fn prediction_scheme(&self, attribute_id: i32) -> Option<PredictionMethod> {
        self.attributes
            .get(&attribute_id)
            .and_then(|a| a.prediction_scheme)
    }

    /// Effective quantization bits for a floating-point attribute: the
    /// per-attribute setting, or the semantic default. Integral attributes
    /// never quantize.
    pub fn quantization_bits_for(&self, attribute_id: i32, attribute: &PointAttribute) -> Option<u8> {
        if !attribute.data_type().is_float() {
            return None;
        }
        if let Some(bits) = self
            .attributes
            .get(&attribute_id)
            .and_then(|a| a.quantization_bits)
        {
            return Some(bits);
        }
        match attribute.attribute_type() {
            AttributeType::Position => Some(14),
            AttributeType::Normal => Some(10),
            AttributeType::Color => Some(8),
            AttributeType::TexCoord => Some(12),
            AttributeType::Generic => None,
        }
    }
}
