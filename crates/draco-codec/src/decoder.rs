//! Top-level decoder: header parsing, codec dispatch, geometry assembly.
//!
//! All failures leave no partial geometry behind; the decoded object only
//! exists once the whole stream parsed cleanly.

use crate::attribute::{AttributeType, DataType, PointAttribute};
use crate::attribute_codec::decode_attribute_values;
use crate::corner_table::CornerTable;
use crate::decoder_buffer::DecoderBuffer;
use crate::edgebreaker_decoder::decode_connectivity;
use crate::encoder::{
    FLAG_METADATA, GEOMETRY_MESH_EDGEBREAKER, GEOMETRY_MESH_SEQUENTIAL,
    GEOMETRY_POINT_CLOUD_SEQUENTIAL, MAGIC, VERSION_MAJOR, VERSION_MINOR,
};
use crate::error::{corrupt, invalid_parameter, CodecError, Result};
use crate::indices::{CornerIndex, FaceIndex, PointIndex, VertexIndex};
use crate::mesh::Mesh;
use crate::point_cloud::PointCloud;
use crate::prediction_scheme::MeshPredictionContext;
use crate::traversal::sequence_vertices;
use log::debug;

// Allocation guard for counts read from the wire.
const MAX_DECODED_ELEMENTS: usize = 1 << 28;

/// A decoded geometry: either a mesh or a bare point cloud.
#[derive(Debug, Clone)]
pub enum Geometry {
    PointCloud(PointCloud),
    Mesh(Mesh),
}

/// Decodes a compressed stream into the geometry it describes.
pub fn decode(data: &[u8]) -> Result<Geometry> {
    let mut buffer = DecoderBuffer::new(data);
    let header = decode_header(&mut buffer)?;
    let geometry = match header.geometry_type {
        GEOMETRY_POINT_CLOUD_SEQUENTIAL => {
            Geometry::PointCloud(decode_point_cloud_body(&mut buffer, header)?)
        }
        GEOMETRY_MESH_SEQUENTIAL => {
            Geometry::Mesh(decode_mesh_sequential_body(&mut buffer, header)?)
        }
        GEOMETRY_MESH_EDGEBREAKER => {
            Geometry::Mesh(decode_mesh_edgebreaker_body(&mut buffer, header)?)
        }
        other => return Err(corrupt(format!("unknown encoder type {other}"))),
    };
    debug!("decoded {} of {} bytes", buffer.decoded_size(), data.len());
    Ok(geometry)
}

/// Decodes a stream that must contain a mesh.
pub fn decode_mesh(data: &[u8]) -> Result<Mesh> {
    match decode(data)? {
        Geometry::Mesh(mesh) => Ok(mesh),
        Geometry::PointCloud(_) => Err(invalid_parameter(
            "stream contains a point cloud, not a mesh",
        )),
    }
}

/// Decodes a stream that must contain a point cloud.
pub fn decode_point_cloud(data: &[u8]) -> Result<PointCloud> {
    match decode(data)? {
        Geometry::PointCloud(pc) => Ok(pc),
        Geometry::Mesh(_) => Err(invalid_parameter(
            "stream contains a mesh, not a point cloud",
        )),
    }
}

struct Header {
    geometry_type: u8,
    metadata: Vec<(String, Vec<u8>)>,
}

fn decode_header(buffer: &mut DecoderBuffer) -> Result<Header> {
    let mut magic = [0u8; 5];
    buffer.decode_bytes(&mut magic)?;
    if &magic != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let major = buffer.decode_u8()?;
    let minor = buffer.decode_u8()?;
    if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) {
        return Err(CodecError::UnsupportedVersion(major, minor));
    }
    let geometry_type = buffer.decode_u8()?;
    let method = buffer.decode_u8()?;
    if method != 0 {
        return Err(CodecError::UnsupportedFeature(format!(
            "encoder method {method}"
        )));
    }
    let flags = buffer.decode_u16()?;
    if flags & !FLAG_METADATA != 0 {
        return Err(CodecError::UnsupportedFeature(format!(
            "header flags {flags:#06x}"
        )));
    }

    let mut metadata = Vec::new();
    if flags & FLAG_METADATA != 0 {
        let count = buffer.decode_varint()? as usize;
        if count > buffer.remaining_size() {
            return Err(corrupt("metadata entry count exceeds stream size"));
        }
        for _ in 0..count {
            let key_len = buffer.decode_u8()? as usize;
            let key = std::str::from_utf8(buffer.decode_slice(key_len)?)
                .map_err(|_| corrupt("metadata key is not valid utf-8"))?
                .to_string();
            let value_len = buffer.decode_varint()? as usize;
            if value_len > buffer.remaining_size() {
                return Err(CodecError::BufferUnderflow);
            }
            let value = buffer.decode_slice(value_len)?.to_vec();
            metadata.push((key, value));
        }
    }
    Ok(Header {
        geometry_type,
        metadata,
    })
}

fn checked_count(v: u64, what: &str, remaining: usize) -> Result<usize> {
    let v = usize::try_from(v).map_err(|_| corrupt(format!("{what} count overflow")))?;
    // Even a degenerate rANS stream needs some input per 4096 elements;
    // anything beyond that cannot be a real stream and only serves to make
    // the decoder allocate.
    let limit = MAX_DECODED_ELEMENTS.min(remaining.saturating_add(1) * 4096);
    if v > limit {
        return Err(corrupt(format!("{what} count {v} exceeds the decoder limit")));
    }
    Ok(v)
}

fn decode_attribute_section(
    point_cloud: &mut PointCloud,
    point_order: &[PointIndex],
    mesh_ctx: Option<&MeshPredictionContext>,
    buffer: &mut DecoderBuffer,
) -> Result<()> {
    let num_points = point_cloud.num_points();
    let num_attributes = buffer.decode_u8()? as usize;
    if num_attributes == 0 {
        return Err(corrupt("stream has no attributes"));
    }

    let mut codecs = Vec::with_capacity(num_attributes);
    for _ in 0..num_attributes {
        let semantic = AttributeType::from_u8(buffer.decode_u8()?)
            .ok_or_else(|| corrupt("unknown attribute semantic"))?;
        let data_type = DataType::from_u8(buffer.decode_u8()?)
            .ok_or_else(|| corrupt("unknown attribute data type"))?;
        let num_components = buffer.decode_u8()?;
        let normalized = buffer.decode_u8()? != 0;
        let unique_id = buffer.decode_varint()? as u32;
        let codec = buffer.decode_u8()?;

        let attribute =
            PointAttribute::new(semantic, data_type, num_components, normalized, num_points)
                .map_err(|e| match e {
                    CodecError::InvalidParameter(msg) => corrupt(msg),
                    other => other,
                })?;
        let id = point_cloud.add_attribute(attribute);
        point_cloud.attribute_mut(id)?.set_unique_id(unique_id);
        codecs.push(codec);
    }

    let mut positions_portable: Option<Vec<i32>> = None;
    for (id, &codec) in codecs.iter().enumerate() {
        let is_parent_position = {
            let attribute = point_cloud.attribute(id as i32)?;
            attribute.attribute_type() == AttributeType::Position
                && attribute.num_components() == 3
        };
        let mut attribute = std::mem::replace(
            point_cloud.attribute_mut(id as i32)?,
            PointAttribute::new(AttributeType::Generic, DataType::Uint8, 1, false, 0)?,
        );
        let portable = decode_attribute_values(
            &mut attribute,
            codec,
            point_order,
            mesh_ctx,
            if is_parent_position {
                None
            } else {
                positions_portable.as_deref()
            },
            buffer,
        );
        *point_cloud.attribute_mut(id as i32)? = attribute;
        let portable = portable?;
        if is_parent_position && positions_portable.is_none() {
            positions_portable = portable;
        }
    }
    Ok(())
}

fn decode_point_cloud_body(buffer: &mut DecoderBuffer, header: Header) -> Result<PointCloud> {
    let remaining = buffer.remaining_size();
    let num_points = checked_count(buffer.decode_varint()?, "point", remaining)?;
    if num_points == 0 {
        return Err(corrupt("point cloud with zero points"));
    }
    let mut point_cloud = PointCloud::new();
    point_cloud.set_num_points(num_points);
    for (key, value) in header.metadata {
        point_cloud.add_metadata(key, value);
    }
    let point_order: Vec<PointIndex> =
        (0..num_points).map(|p| PointIndex(p as u32)).collect();
    decode_attribute_section(&mut point_cloud, &point_order, None, buffer)?;
    Ok(point_cloud)
}

fn decode_mesh_sequential_body(buffer: &mut DecoderBuffer, header: Header) -> Result<Mesh> {
    let remaining = buffer.remaining_size();
    let num_points = checked_count(buffer.decode_varint()?, "point", remaining)?;
    let num_faces = checked_count(buffer.decode_varint()?, "face", remaining)?;
    if num_points == 0 || num_faces == 0 {
        return Err(corrupt("empty sequential mesh"));
    }

    let mut mesh = Mesh::new();
    mesh.set_num_points(num_points);
    for (key, value) in header.metadata {
        mesh.add_metadata(key, value);
    }

    let mut prev = 0i64;
    for _ in 0..num_faces {
        let mut face = [PointIndex(0); 3];
        for slot in &mut face {
            let index = prev + buffer.decode_varint_signed()?;
            if index < 0 || index as usize >= num_points {
                return Err(corrupt(format!("face index {index} out of range")));
            }
            *slot = PointIndex(index as u32);
            prev = index;
        }
        mesh.add_face(face);
    }

    let point_order: Vec<PointIndex> =
        (0..num_points).map(|p| PointIndex(p as u32)).collect();
    decode_attribute_section(&mut mesh, &point_order, None, buffer)?;
    Ok(mesh)
}

fn decode_mesh_edgebreaker_body(buffer: &mut DecoderBuffer, header: Header) -> Result<Mesh> {
    let connectivity = decode_connectivity(buffer)?;
    if connectivity.num_points > MAX_DECODED_ELEMENTS
        || connectivity.faces.len() > MAX_DECODED_ELEMENTS
    {
        return Err(corrupt("decoded mesh exceeds the decoder limit"));
    }

    let mut mesh = Mesh::new();
    mesh.set_num_points(connectivity.num_points);
    for (key, value) in header.metadata {
        mesh.add_metadata(key, value);
    }
    let faces: Vec<[VertexIndex; 3]> = connectivity
        .faces
        .iter()
        .map(|f| [VertexIndex(f[0]), VertexIndex(f[1]), VertexIndex(f[2])])
        .collect();
    for (i, f) in connectivity.faces.iter().enumerate() {
        mesh.set_face(
            FaceIndex(i as u32),
            [PointIndex(f[0]), PointIndex(f[1]), PointIndex(f[2])],
        );
    }

    // The same deterministic traversal the encoder ran, seeded at each
    // face's tip corner in decode order.
    let table = CornerTable::from_faces(&faces, connectivity.num_points)
        .map_err(|_| corrupt("decoded connectivity is not manifold"))?;
    let corner_order: Vec<CornerIndex> = (0..table.num_faces())
        .map(|f| CornerIndex((f * 3) as u32))
        .collect();
    let sequence = sequence_vertices(&table, &corner_order);
    if sequence.vertices.len() != connectivity.num_points {
        return Err(corrupt("attribute traversal missed decoded vertices"));
    }
    let point_order: Vec<PointIndex> =
        sequence.vertices.iter().map(|v| PointIndex(v.0)).collect();
    let mesh_ctx = MeshPredictionContext {
        table: &table,
        data_to_corner: &sequence.corners,
        vertex_to_data: &sequence.vertex_to_data,
    };
    decode_attribute_section(&mut mesh, &point_order, Some(&mesh_ctx), buffer)?;
    Ok(mesh)
}
