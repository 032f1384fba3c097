use crate::attribute::{AttributeType, PointAttribute};
use crate::error::{invalid_parameter, Result};

/// A key/value metadata entry attached to a geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// An ordered collection of points with attached attributes.
#[derive(Debug, Default, Clone)]
pub struct PointCloud {
    num_points: usize,
    attributes: Vec<PointAttribute>,
    metadata: Vec<MetadataEntry>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn set_num_points(&mut self, num_points: usize) {
        self.num_points = num_points;
    }

    /// Adds an attribute and returns its id. Ids are assigned in insertion
    /// order and stay stable for the lifetime of the geometry.
    pub fn add_attribute(&mut self, mut attribute: PointAttribute) -> i32 {
        if self.num_points == 0 && attribute.is_direct() {
            self.num_points = attribute.num_values();
        }
        let id = self.attributes.len() as i32;
        attribute.set_unique_id(id as u32);
        self.attributes.push(attribute);
        id
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute(&self, id: i32) -> Result<&PointAttribute> {
        self.attributes
            .get(id as usize)
            .ok_or_else(|| invalid_parameter(format!("no attribute with id {id}")))
    }

    pub fn attribute_mut(&mut self, id: i32) -> Result<&mut PointAttribute> {
        self.attributes
            .get_mut(id as usize)
            .ok_or_else(|| invalid_parameter(format!("no attribute with id {id}")))
    }

    pub fn attributes(&self) -> &[PointAttribute] {
        &self.attributes
    }

    /// Id of the first attribute with the given semantic, or -1.
    pub fn named_attribute_id(&self, attribute_type: AttributeType) -> i32 {
        self.attributes
            .iter()
            .position(|a| a.attribute_type() == attribute_type)
            .map(|i| i as i32)
            .unwrap_or(-1)
    }

    pub fn named_attribute(&self, attribute_type: AttributeType) -> Option<&PointAttribute> {
        let id = self.named_attribute_id(attribute_type);
        (id >= 0).then(|| &self.attributes[id as usize])
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.metadata.push(MetadataEntry {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn metadata(&self) -> &[MetadataEntry] {
        &self.metadata
    }
}
