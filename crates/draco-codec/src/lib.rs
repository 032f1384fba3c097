//! Lossy compression codec for 3D triangle meshes and point clouds.
//!
//! Geometry (positions, normals, colors, texture coordinates, generic
//! attributes and triangle connectivity) is transformed into a compact
//! self-describing byte stream and reconstructed from it. Connectivity is
//! compressed with an EdgeBreaker traversal over a corner table; attribute
//! values are quantized, predicted from already-coded neighbours, and
//! entropy-coded with rANS.
//!
//! ```
//! use draco_codec::{
//!     AttributeType, AttributeValueIndex, DataType, EncoderOptions, Mesh,
//!     PointAttribute, PointIndex,
//! };
//!
//! let mut mesh = Mesh::new();
//! let mut positions =
//!     PointAttribute::new(AttributeType::Position, DataType::Float32, 3, false, 3).unwrap();
//! for (i, p) in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]]
//!     .iter()
//!     .enumerate()
//! {
//!     let bytes: Vec<u8> = p.iter().flat_map(|c| c.to_le_bytes()).collect();
//!     positions.set_value(AttributeValueIndex(i as u32), &bytes).unwrap();
//! }
//! mesh.add_attribute(positions);
//! mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
//!
//! let bytes = draco_codec::encode_mesh(&mesh, &EncoderOptions::default()).unwrap();
//! let decoded = draco_codec::decode_mesh(&bytes).unwrap();
//! assert_eq!(decoded.num_faces(), 1);
//! ```

pub mod attribute;
pub mod corner_table;
pub mod decoder_buffer;
pub mod encoder_buffer;
pub mod error;
pub mod indices;
pub mod mesh;
pub mod octahedron;
pub mod options;
pub mod point_cloud;
pub mod quantization;

mod attribute_codec;
mod decoder;
mod direct_bit_codec;
mod edgebreaker;
mod edgebreaker_decoder;
mod edgebreaker_encoder;
mod encoder;
mod folded_bit_codec;
mod prediction_geometric_normal;
mod prediction_multi_parallelogram;
mod prediction_parallelogram;
mod prediction_scheme;
mod prediction_tex_coords;
mod rans;
mod rans_bit_codec;
mod rans_symbol_codec;
mod symbol_codec;
mod traversal;

pub use attribute::{AttributeType, DataType, PointAttribute};
pub use corner_table::CornerTable;
pub use decoder::{decode, decode_mesh, decode_point_cloud, Geometry};
pub use decoder_buffer::DecoderBuffer;
pub use direct_bit_codec::{DirectBitDecoder, DirectBitEncoder};
pub use encoder::{encode_mesh, encode_point_cloud};
pub use folded_bit_codec::{FoldedBit32Decoder, FoldedBit32Encoder};
pub use encoder_buffer::EncoderBuffer;
pub use error::{CodecError, Result};
pub use indices::{AttributeValueIndex, CornerIndex, FaceIndex, PointIndex, VertexIndex};
pub use mesh::{Face, Mesh};
pub use octahedron::Octahedron;
pub use options::{EncoderOptions, EncodingMethod};
pub use point_cloud::{MetadataEntry, PointCloud};
pub use prediction_scheme::PredictionMethod;
pub use quantization::{AttributeQuantization, QuantizationMode};
pub use rans_bit_codec::{RansBitDecoder, RansBitEncoder};
pub use symbol_codec::{decode_symbols, encode_symbols, zigzag_decode, zigzag_encode};
