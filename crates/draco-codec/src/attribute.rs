//! Geometry attributes: typed per-point (or shared) value arrays.

use crate::error::{invalid_parameter, Result};
use crate::indices::{AttributeValueIndex, PointIndex};

/// Semantic interpretation of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Position = 0,
    Normal = 1,
    Color = 2,
    TexCoord = 3,
    Generic = 4,
}

impl AttributeType {
    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Position),
            1 => Some(Self::Normal),
            2 => Some(Self::Color),
            3 => Some(Self::TexCoord),
            4 => Some(Self::Generic),
            _ => None,
        }
    }
}

/// Primitive type of a single attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8 = 1,
    Uint8 = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Int64 = 7,
    Uint64 = 8,
    Float32 = 9,
    Float64 = 10,
    Bool = 11,
}

impl DataType {
    pub fn byte_length(self) -> usize {
        match self {
            DataType::Int8 | DataType::Uint8 | DataType::Bool => 1,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Uint64 | DataType::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// True for integral types that fit the 32-bit integer coding path.
    pub fn is_narrow_integral(self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Uint8
                | DataType::Int16
                | DataType::Uint16
                | DataType::Int32
                | DataType::Uint32
                | DataType::Bool
        )
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Int8),
            2 => Some(Self::Uint8),
            3 => Some(Self::Int16),
            4 => Some(Self::Uint16),
            5 => Some(Self::Int32),
            6 => Some(Self::Uint32),
            7 => Some(Self::Int64),
            8 => Some(Self::Uint64),
            9 => Some(Self::Float32),
            10 => Some(Self::Float64),
            11 => Some(Self::Bool),
            _ => None,
        }
    }
}

/// A per-point attribute with an optional point-to-value mapping.
///
/// When `mapping` is `None` the attribute is *direct*: point `i` owns value
/// `i`. Otherwise values may be shared between points (seam-edge UVs and the
/// like) and the mapping translates point indices to value indices.
#[derive(Debug, Clone)]
pub struct PointAttribute {
    attribute_type: AttributeType,
    data_type: DataType,
    num_components: u8,
    normalized: bool,
    unique_id: u32,
    num_values: usize,
    data: Vec<u8>,
    mapping: Option<Vec<AttributeValueIndex>>,
}

impl PointAttribute {
    /// Creates an attribute with storage for `num_values` zeroed values.
    pub fn new(
        attribute_type: AttributeType,
        data_type: DataType,
        num_components: u8,
        normalized: bool,
        num_values: usize,
    ) -> Result<Self> {
        if num_components == 0 || num_components > 16 {
            return Err(invalid_parameter(format!(
                "attribute component count {num_components} out of range 1-16"
            )));
        }
        let stride = num_components as usize * data_type.byte_length();
        Ok(Self {
            attribute_type,
            data_type,
            num_components,
            normalized,
            unique_id: 0,
            num_values,
            data: vec![0; num_values * stride],
            mapping: None,
        })
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn num_components(&self) -> u8 {
        self.num_components
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    pub(crate) fn set_unique_id(&mut self, id: u32) {
        self.unique_id = id;
    }

    /// Number of unique values stored in the attribute buffer.
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    pub fn byte_stride(&self) -> usize {
        self.num_components as usize * self.data_type.byte_length()
    }

    pub fn is_direct(&self) -> bool {
        self.mapping.is_none()
    }

    /// Installs an explicit point-to-value mapping of length `num_points`.
    pub fn set_explicit_mapping(&mut self, mapping: Vec<AttributeValueIndex>) {
        self.mapping = Some(mapping);
    }

    /// Resolves a point index to the index of its value.
    pub fn mapped_index(&self, point: PointIndex) -> AttributeValueIndex {
        match &self.mapping {
            None => AttributeValueIndex(point.0),
            Some(map) => map
                .get(point.index())
                .copied()
                .unwrap_or(AttributeValueIndex::INVALID),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Writes one value's raw bytes. `bytes` must match the stride.
    pub fn set_value(&mut self, value: AttributeValueIndex, bytes: &[u8]) -> Result<()> {
        let stride = self.byte_stride();
        if bytes.len() != stride {
            return Err(invalid_parameter("value byte length does not match stride"));
        }
        let offset = value.index() * stride;
        if offset + stride > self.data.len() {
            return Err(invalid_parameter("attribute value index out of range"));
        }
        self.data[offset..offset + stride].copy_from_slice(bytes);
        Ok(())
    }

    /// Reads one value's raw bytes.
    pub fn value_bytes(&self, value: AttributeValueIndex) -> Result<&[u8]> {
        let stride = self.byte_stride();
        let offset = value.index() * stride;
        if offset + stride > self.data.len() {
            return Err(invalid_parameter("attribute value index out of range"));
        }
        Ok(&self.data[offset..offset + stride])
    }

    /// Reads one component of a value widened to f64.
    pub fn component_as_f64(&self, value: AttributeValueIndex, component: usize) -> Result<f64> {
        let bytes = self.value_bytes(value)?;
        let size = self.data_type.byte_length();
        let off = component * size;
        let raw = &bytes[off..off + size];
        Ok(match self.data_type {
            DataType::Int8 => raw[0] as i8 as f64,
            DataType::Uint8 | DataType::Bool => raw[0] as f64,
            DataType::Int16 => i16::from_le_bytes([raw[0], raw[1]]) as f64,
            DataType::Uint16 => u16::from_le_bytes([raw[0], raw[1]]) as f64,
            DataType::Int32 => i32::from_le_bytes(raw.try_into().unwrap()) as f64,
            DataType::Uint32 => u32::from_le_bytes(raw.try_into().unwrap()) as f64,
            DataType::Int64 => i64::from_le_bytes(raw.try_into().unwrap()) as f64,
            DataType::Uint64 => u64::from_le_bytes(raw.try_into().unwrap()) as f64,
            DataType::Float32 => f32::from_le_bytes(raw.try_into().unwrap()) as f64,
            DataType::Float64 => f64::from_le_bytes(raw.try_into().unwrap()),
        })
    }

    /// Reads one component of a value as i32. Only meaningful for the narrow
    /// integral types; the caller is expected to have checked.
    pub fn component_as_i32(&self, value: AttributeValueIndex, component: usize) -> Result<i32> {
        let bytes = self.value_bytes(value)?;
        let size = self.data_type.byte_length();
        let off = component * size;
        let raw = &bytes[off..off + size];
        Ok(match self.data_type {
            DataType::Int8 => raw[0] as i8 as i32,
            DataType::Uint8 | DataType::Bool => raw[0] as i32,
            DataType::Int16 => i16::from_le_bytes([raw[0], raw[1]]) as i32,
            DataType::Uint16 => u16::from_le_bytes([raw[0], raw[1]]) as i32,
            DataType::Int32 => i32::from_le_bytes(raw.try_into().unwrap()),
            DataType::Uint32 => u32::from_le_bytes(raw.try_into().unwrap()) as i32,
            _ => 0,
        })
    }

    /// Writes one component of a value from an i32, truncating to the
    /// attribute's data type.
    pub fn set_component_from_i32(
        &mut self,
        value: AttributeValueIndex,
        component: usize,
        v: i32,
    ) -> Result<()> {
        let stride = self.byte_stride();
        let size = self.data_type.byte_length();
        let offset = value.index() * stride + component * size;
        if offset + size > self.data.len() {
            return Err(invalid_parameter("attribute value index out of range"));
        }
        let dst = &mut self.data[offset..offset + size];
        match self.data_type {
            DataType::Int8 => dst[0] = v as i8 as u8,
            DataType::Uint8 | DataType::Bool => dst[0] = v as u8,
            DataType::Int16 => dst.copy_from_slice(&(v as i16).to_le_bytes()),
            DataType::Uint16 => dst.copy_from_slice(&(v as u16).to_le_bytes()),
            DataType::Int32 => dst.copy_from_slice(&v.to_le_bytes()),
            DataType::Uint32 => dst.copy_from_slice(&(v as u32).to_le_bytes()),
            _ => return Err(invalid_parameter("not a narrow integral attribute")),
        }
        Ok(())
    }

    /// Writes one component of a value from an f64, narrowing to the
    /// attribute's float type.
    pub fn set_component_from_f64(
        &mut self,
        value: AttributeValueIndex,
        component: usize,
        v: f64,
    ) -> Result<()> {
        let stride = self.byte_stride();
        let size = self.data_type.byte_length();
        let offset = value.index() * stride + component * size;
        if offset + size > self.data.len() {
            return Err(invalid_parameter("attribute value index out of range"));
        }
        let dst = &mut self.data[offset..offset + size];
        match self.data_type {
            DataType::Float32 => dst.copy_from_slice(bytemuck::bytes_of(&(v as f32))),
            DataType::Float64 => dst.copy_from_slice(bytemuck::bytes_of(&v)),
            _ => return Err(invalid_parameter("not a floating-point attribute")),
        }
        Ok(())
    }

    /// Reads a 3-component f32 value (positions, normals).
    pub fn value_as_vec3_f32(&self, value: AttributeValueIndex) -> Result<[f32; 3]> {
        let bytes = self.value_bytes(value)?;
        if self.data_type != DataType::Float32 || self.num_components < 3 {
            return Err(invalid_parameter("expected a float32 vec3 attribute"));
        }
        Ok([
            f32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            f32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            f32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        ])
    }
}
