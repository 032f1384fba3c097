//! Top-level encoder: header, codec dispatch, attribute section.

use crate::attribute::AttributeType;
use crate::attribute_codec::{encode_attribute_values, value_codec_for};
use crate::corner_table::CornerTable;
use crate::edgebreaker_encoder::encode_connectivity;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{internal, invalid_parameter, Result};
use crate::indices::{PointIndex, VertexIndex};
use crate::mesh::Mesh;
use crate::options::{EncoderOptions, EncodingMethod};
use crate::point_cloud::PointCloud;
use crate::prediction_scheme::MeshPredictionContext;
use crate::traversal::sequence_vertices;
use log::debug;

pub(crate) const MAGIC: &[u8; 5] = b"DRACO";
pub(crate) const VERSION_MAJOR: u8 = 1;
pub(crate) const VERSION_MINOR: u8 = 0;

pub(crate) const GEOMETRY_POINT_CLOUD_SEQUENTIAL: u8 = 0;
pub(crate) const GEOMETRY_MESH_SEQUENTIAL: u8 = 1;
pub(crate) const GEOMETRY_MESH_EDGEBREAKER: u8 = 2;

pub(crate) const FLAG_METADATA: u16 = 0x8000;

fn write_header(
    geometry_type: u8,
    point_cloud: &PointCloud,
    buffer: &mut EncoderBuffer,
) -> Result<()> {
    buffer.encode_bytes(MAGIC)?;
    buffer.encode_u8(VERSION_MAJOR)?;
    buffer.encode_u8(VERSION_MINOR)?;
    buffer.encode_u8(geometry_type)?;
    buffer.encode_u8(0)?; // encoder method sub-variant
    let flags = if point_cloud.metadata().is_empty() {
        0
    } else {
        FLAG_METADATA
    };
    buffer.encode_u16(flags)?;
    if flags & FLAG_METADATA != 0 {
        buffer.encode_varint(point_cloud.metadata().len() as u64)?;
        for entry in point_cloud.metadata() {
            if entry.key.len() > u8::MAX as usize {
                return Err(invalid_parameter("metadata key longer than 255 bytes"));
            }
            buffer.encode_u8(entry.key.len() as u8)?;
            buffer.encode_bytes(entry.key.as_bytes())?;
            buffer.encode_varint(entry.value.len() as u64)?;
            buffer.encode_bytes(&entry.value)?;
        }
    }
    Ok(())
}

fn validate_geometry(point_cloud: &PointCloud) -> Result<()> {
    if point_cloud.num_points() == 0 {
        return Err(invalid_parameter("geometry has no points"));
    }
    if point_cloud.named_attribute_id(AttributeType::Position) < 0 {
        return Err(invalid_parameter("geometry has no position attribute"));
    }
    for (id, attribute) in point_cloud.attributes().iter().enumerate() {
        for p in 0..point_cloud.num_points() {
            let value = attribute.mapped_index(PointIndex(p as u32));
            if !value.is_valid() || value.index() >= attribute.num_values() {
                return Err(invalid_parameter(format!(
                    "attribute {id} has no value for point {p}"
                )));
            }
        }
    }
    Ok(())
}

/// Attribute encoding order: position attributes first (dependent schemes
/// predict from them), the rest in id order.
fn attribute_order(point_cloud: &PointCloud) -> Vec<i32> {
    let mut order: Vec<i32> = Vec::with_capacity(point_cloud.num_attributes());
    for (id, attribute) in point_cloud.attributes().iter().enumerate() {
        if attribute.attribute_type() == AttributeType::Position {
            order.push(id as i32);
        }
    }
    for (id, attribute) in point_cloud.attributes().iter().enumerate() {
        if attribute.attribute_type() != AttributeType::Position {
            order.push(id as i32);
        }
    }
    order
}

fn encode_attribute_section(
    point_cloud: &PointCloud,
    point_order: &[PointIndex],
    mesh_ctx: Option<&MeshPredictionContext>,
    options: &EncoderOptions,
    buffer: &mut EncoderBuffer,
) -> Result<()> {
    let order = attribute_order(point_cloud);
    if order.len() > u8::MAX as usize {
        return Err(invalid_parameter("more than 255 attributes"));
    }
    buffer.encode_u8(order.len() as u8)?;

    let mut codecs = Vec::with_capacity(order.len());
    for &id in &order {
        let attribute = point_cloud.attribute(id)?;
        let qbits = options.quantization_bits_for(id, attribute);
        let codec = value_codec_for(attribute, qbits);
        codecs.push(codec);
        buffer.encode_u8(attribute.attribute_type() as u8)?;
        buffer.encode_u8(attribute.data_type() as u8)?;
        buffer.encode_u8(attribute.num_components())?;
        buffer.encode_u8(attribute.normalized() as u8)?;
        buffer.encode_varint(attribute.unique_id() as u64)?;
        buffer.encode_u8(codec)?;
    }

    let mut positions_portable: Option<Vec<i32>> = None;
    for (&id, &codec) in order.iter().zip(&codecs) {
        let attribute = point_cloud.attribute(id)?;
        let is_position = attribute.attribute_type() == AttributeType::Position;
        let portable = encode_attribute_values(
            attribute,
            id,
            codec,
            point_order,
            mesh_ctx,
            if is_position {
                None
            } else {
                positions_portable.as_deref()
            },
            options,
            buffer,
        )?;
        // Only 3-component positions can act as prediction parents.
        if is_position && attribute.num_components() == 3 && positions_portable.is_none() {
            positions_portable = portable;
        }
    }
    Ok(())
}

/// Encodes a triangle mesh into a self-describing byte stream.
pub fn encode_mesh(mesh: &Mesh, options: &EncoderOptions) -> Result<Vec<u8>> {
    validate_geometry(mesh)?;
    if mesh.num_faces() == 0 {
        return Err(invalid_parameter("mesh has no faces"));
    }
    for (f, face) in mesh.faces().iter().enumerate() {
        for &p in face {
            if p.index() >= mesh.num_points() {
                return Err(invalid_parameter(format!(
                    "face {f} references point {} out of range",
                    p.0
                )));
            }
        }
    }

    let method = options
        .encoding_method()
        .unwrap_or(EncodingMethod::EdgeBreaker);
    let mut buffer = EncoderBuffer::new();
    match method {
        EncodingMethod::EdgeBreaker => encode_mesh_edgebreaker(mesh, options, &mut buffer)?,
        EncodingMethod::Sequential => encode_mesh_sequential(mesh, options, &mut buffer)?,
    }
    debug!(
        "encoded mesh: {} points, {} faces, {} bytes",
        mesh.num_points(),
        mesh.num_faces(),
        buffer.size()
    );
    Ok(buffer.into_bytes())
}

fn encode_mesh_edgebreaker(
    mesh: &Mesh,
    options: &EncoderOptions,
    buffer: &mut EncoderBuffer,
) -> Result<()> {
    let faces: Vec<[VertexIndex; 3]> = mesh
        .faces()
        .iter()
        .map(|f| [VertexIndex(f[0].0), VertexIndex(f[1].0), VertexIndex(f[2].0)])
        .collect();
    let table = CornerTable::from_faces(&faces, mesh.num_points())?;
    if table.num_isolated_vertices() > 0 {
        return Err(invalid_parameter(
            "mesh has isolated points not referenced by any face",
        ));
    }

    write_header(GEOMETRY_MESH_EDGEBREAKER, mesh, buffer)?;
    let connectivity = encode_connectivity(&table, buffer)?;
    debug!(
        "edgebreaker connectivity: {} components, {} bytes so far",
        connectivity.num_components,
        buffer.size()
    );

    let sequence = sequence_vertices(&table, &connectivity.corner_order);
    if sequence.vertices.len() != mesh.num_points() {
        return Err(internal("attribute traversal missed vertices"));
    }
    let point_order: Vec<PointIndex> =
        sequence.vertices.iter().map(|v| PointIndex(v.0)).collect();
    let mesh_ctx = MeshPredictionContext {
        table: &table,
        data_to_corner: &sequence.corners,
        vertex_to_data: &sequence.vertex_to_data,
    };
    encode_attribute_section(mesh, &point_order, Some(&mesh_ctx), options, buffer)
}

fn encode_mesh_sequential(
    mesh: &Mesh,
    options: &EncoderOptions,
    buffer: &mut EncoderBuffer,
) -> Result<()> {
    write_header(GEOMETRY_MESH_SEQUENTIAL, mesh, buffer)?;
    buffer.encode_varint(mesh.num_points() as u64)?;
    buffer.encode_varint(mesh.num_faces() as u64)?;
    // Faces as deltas against the previously written index.
    let mut prev = 0i64;
    for face in mesh.faces() {
        for &p in face {
            buffer.encode_varint_signed(p.0 as i64 - prev)?;
            prev = p.0 as i64;
        }
    }

    let point_order: Vec<PointIndex> =
        (0..mesh.num_points()).map(|p| PointIndex(p as u32)).collect();
    encode_attribute_section(mesh, &point_order, None, options, buffer)
}

/// Encodes a point cloud into a self-describing byte stream.
pub fn encode_point_cloud(
    point_cloud: &PointCloud,
    options: &EncoderOptions,
) -> Result<Vec<u8>> {
    validate_geometry(point_cloud)?;
    let mut buffer = EncoderBuffer::new();
    write_header(GEOMETRY_POINT_CLOUD_SEQUENTIAL, point_cloud, &mut buffer)?;
    buffer.encode_varint(point_cloud.num_points() as u64)?;
    let point_order: Vec<PointIndex> = (0..point_cloud.num_points())
        .map(|p| PointIndex(p as u32))
        .collect();
    encode_attribute_section(point_cloud, &point_order, None, options, &mut buffer)?;
    debug!(
        "encoded point cloud: {} points, {} bytes",
        point_cloud.num_points(),
        buffer.size()
    );
    Ok(buffer.into_bytes())
}
