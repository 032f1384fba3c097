//! Per-attribute value coding shared by the mesh and point-cloud paths:
//! transform to a portable integer form, predict, entropy-code, and the
//! inverse of all three.

use crate::attribute::{AttributeType, PointAttribute};
use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, internal, invalid_parameter, CodecError, Result};
use crate::folded_bit_codec::{FoldedBit32Decoder, FoldedBit32Encoder};
use crate::indices::{AttributeValueIndex, PointIndex};
use crate::octahedron::Octahedron;
use crate::options::EncoderOptions;
use crate::prediction_geometric_normal::{
    geometric_normal_corrections, geometric_normal_recover, NormalFlips,
};
use crate::prediction_multi_parallelogram::{
    multi_parallelogram_corrections, multi_parallelogram_recover, CreaseFlags,
};
use crate::prediction_parallelogram::{parallelogram_corrections, parallelogram_recover};
use crate::prediction_scheme::{
    delta_corrections, delta_recover, MeshPredictionContext, PredictionMethod, WrapTransform,
};
use crate::prediction_tex_coords::{
    tex_coords_corrections, tex_coords_recover, TexCoordOrientations,
};
use crate::quantization::AttributeQuantization;
use crate::symbol_codec::{
    decode_symbols, encode_symbols, estimate_symbol_bits, zigzag_decode, zigzag_encode,
};

pub(crate) const VALUE_CODEC_RAW: u8 = 0;
pub(crate) const VALUE_CODEC_INTEGER: u8 = 1;
pub(crate) const VALUE_CODEC_QUANTIZED: u8 = 2;
pub(crate) const VALUE_CODEC_NORMAL: u8 = 3;

/// Chooses the value codec for an attribute, given its effective
/// quantization setting.
pub(crate) fn value_codec_for(attribute: &PointAttribute, qbits: Option<u8>) -> u8 {
    if attribute.attribute_type() == AttributeType::Normal
        && attribute.data_type().is_float()
        && attribute.num_components() == 3
        && qbits.is_some()
    {
        VALUE_CODEC_NORMAL
    } else if attribute.data_type().is_float() && qbits.is_some() {
        VALUE_CODEC_QUANTIZED
    } else if attribute.data_type().is_narrow_integral() {
        VALUE_CODEC_INTEGER
    } else {
        VALUE_CODEC_RAW
    }
}

fn mapped_value(attribute: &PointAttribute, point: PointIndex) -> Result<AttributeValueIndex> {
    let value = attribute.mapped_index(point);
    if !value.is_valid() || value.index() >= attribute.num_values() {
        return Err(invalid_parameter(format!(
            "point {} has no mapped attribute value",
            point.0
        )));
    }
    Ok(value)
}

fn scheme_compatible(
    method: PredictionMethod,
    codec: u8,
    num_components: usize,
    has_mesh: bool,
    has_positions: bool,
) -> bool {
    match method {
        PredictionMethod::None | PredictionMethod::Delta => true,
        PredictionMethod::Parallelogram
        | PredictionMethod::ConstrainedMultiParallelogram => has_mesh,
        PredictionMethod::TexCoordsPortable => has_mesh && has_positions && num_components == 2,
        PredictionMethod::GeometricNormal => {
            has_mesh && has_positions && codec == VALUE_CODEC_NORMAL
        }
    }
}

/// Scheme selection: an explicit override wins, then the speed table, with
/// a trial encode of the mesh candidates at the slowest setting.
fn select_scheme(
    attribute: &PointAttribute,
    attribute_id: i32,
    codec: u8,
    num_components: usize,
    values: &[i32],
    options: &EncoderOptions,
    mesh_ctx: Option<&MeshPredictionContext>,
    positions: Option<&[i32]>,
) -> Result<PredictionMethod> {
    let has_mesh = mesh_ctx.is_some();
    let has_positions = positions.is_some();

    if let Some(method) = options.prediction_scheme(attribute_id) {
        if !scheme_compatible(method, codec, num_components, has_mesh, has_positions) {
            return Err(invalid_parameter(format!(
                "prediction scheme {method:?} is not applicable to attribute {attribute_id}"
            )));
        }
        return Ok(method);
    }

    let speed = options.encoding_speed();
    if speed >= 10 {
        return Ok(PredictionMethod::None);
    }
    if !has_mesh || speed >= 8 {
        return Ok(PredictionMethod::Delta);
    }
    if codec == VALUE_CODEC_NORMAL && has_positions {
        return Ok(PredictionMethod::GeometricNormal);
    }
    if attribute.attribute_type() == AttributeType::TexCoord
        && num_components == 2
        && has_positions
    {
        return Ok(PredictionMethod::TexCoordsPortable);
    }
    if speed == 0 {
        // Trial-encode the integer candidates and keep the cheapest.
        let ctx = mesh_ctx.unwrap();
        let wrap = WrapTransform::from_values(values);
        let mut corr = vec![0i32; values.len()];
        let mut best = (u64::MAX, PredictionMethod::Delta);
        for method in [
            PredictionMethod::Delta,
            PredictionMethod::Parallelogram,
            PredictionMethod::ConstrainedMultiParallelogram,
        ] {
            match method {
                PredictionMethod::Delta => {
                    delta_corrections(values, num_components, &wrap, &mut corr)
                }
                PredictionMethod::Parallelogram => {
                    parallelogram_corrections(ctx, values, num_components, &wrap, &mut corr)
                }
                _ => {
                    multi_parallelogram_corrections(
                        ctx,
                        values,
                        num_components,
                        &wrap,
                        &mut corr,
                    );
                }
            }
            let symbols: Vec<u32> = corr.iter().map(|&c| zigzag_encode(c)).collect();
            let bits = estimate_symbol_bits(&symbols, num_components);
            if bits < best.0 {
                best = (bits, method);
            }
        }
        return Ok(best.1);
    }
    if speed <= 1 && options.decoding_speed() < 8 {
        return Ok(PredictionMethod::ConstrainedMultiParallelogram);
    }
    Ok(PredictionMethod::Parallelogram)
}

fn encode_prediction_block(
    values: &[i32],
    num_components: usize,
    method: PredictionMethod,
    mesh_ctx: Option<&MeshPredictionContext>,
    positions: Option<&[i32]>,
    octahedron: Option<&Octahedron>,
    buffer: &mut EncoderBuffer,
) -> Result<()> {
    buffer.encode_u8(method as u8)?;
    if method == PredictionMethod::None {
        let symbols: Vec<u32> = values.iter().map(|&v| zigzag_encode(v)).collect();
        let width = symbols
            .iter()
            .map(|&s| 32 - s.leading_zeros())
            .max()
            .unwrap_or(1)
            .max(1);
        buffer.encode_u8(width as u8)?;
        let mut coder = FoldedBit32Encoder::new();
        for &s in &symbols {
            coder.encode_bits32(width, s);
        }
        return coder.end_encoding(buffer);
    }

    let mut corrections = vec![0i32; values.len()];
    let mut crease: Option<CreaseFlags> = None;
    let mut orientations: Option<TexCoordOrientations> = None;
    let mut flips: Option<NormalFlips> = None;
    let mut wrap: Option<WrapTransform> = None;

    match method {
        PredictionMethod::Delta => {
            let w = WrapTransform::from_values(values);
            delta_corrections(values, num_components, &w, &mut corrections);
            wrap = Some(w);
        }
        PredictionMethod::Parallelogram => {
            let ctx = mesh_ctx.ok_or_else(|| internal_scheme_error(method))?;
            let w = WrapTransform::from_values(values);
            parallelogram_corrections(ctx, values, num_components, &w, &mut corrections);
            wrap = Some(w);
        }
        PredictionMethod::ConstrainedMultiParallelogram => {
            let ctx = mesh_ctx.ok_or_else(|| internal_scheme_error(method))?;
            let w = WrapTransform::from_values(values);
            crease = Some(multi_parallelogram_corrections(
                ctx,
                values,
                num_components,
                &w,
                &mut corrections,
            ));
            wrap = Some(w);
        }
        PredictionMethod::TexCoordsPortable => {
            let ctx = mesh_ctx.ok_or_else(|| internal_scheme_error(method))?;
            let pos = positions.ok_or_else(|| internal_scheme_error(method))?;
            let w = WrapTransform::from_values(values);
            orientations = Some(tex_coords_corrections(ctx, values, pos, &w, &mut corrections));
            wrap = Some(w);
        }
        PredictionMethod::GeometricNormal => {
            let ctx = mesh_ctx.ok_or_else(|| internal_scheme_error(method))?;
            let pos = positions.ok_or_else(|| internal_scheme_error(method))?;
            let oct = octahedron.ok_or_else(|| internal_scheme_error(method))?;
            flips = Some(geometric_normal_corrections(
                ctx,
                oct,
                values,
                pos,
                &mut corrections,
            ));
        }
        PredictionMethod::None => unreachable!(),
    }

    let symbols: Vec<u32> = corrections.iter().map(|&c| zigzag_encode(c)).collect();
    encode_symbols(&symbols, num_components, buffer)?;

    if let Some(crease) = crease {
        crease.write(buffer)?;
    }
    if let Some(orientations) = orientations {
        orientations.write(buffer)?;
    }
    if let Some(flips) = flips {
        flips.write(buffer)?;
    }
    if let Some(wrap) = wrap {
        wrap.write(buffer)?;
    }
    Ok(())
}

fn internal_scheme_error(method: PredictionMethod) -> CodecError {
    CodecError::InternalError(format!("prediction scheme {method:?} missing its inputs"))
}

fn decode_prediction_block(
    num_entries: usize,
    num_components: usize,
    mesh_ctx: Option<&MeshPredictionContext>,
    positions: Option<&[i32]>,
    octahedron: Option<&Octahedron>,
    buffer: &mut DecoderBuffer,
) -> Result<Vec<i32>> {
    let method = PredictionMethod::from_u8(buffer.decode_u8()?)?;
    let num_values = num_entries * num_components;

    if method == PredictionMethod::None {
        let width = buffer.decode_u8()? as u32;
        if width == 0 || width > 32 {
            return Err(corrupt(format!("invalid raw value width {width}")));
        }
        let mut coder = FoldedBit32Decoder::start_decoding(buffer)?;
        let mut values = Vec::with_capacity(num_values);
        for _ in 0..num_values {
            values.push(zigzag_decode(coder.decode_bits32(width)?));
        }
        return Ok(values);
    }

    let mut symbols = vec![0u32; num_values];
    decode_symbols(num_values, num_components, buffer, &mut symbols)?;
    let corrections: Vec<i32> = symbols.iter().map(|&s| zigzag_decode(s)).collect();

    let require_mesh = |method: PredictionMethod| {
        mesh_ctx.ok_or_else(|| {
            corrupt(format!(
                "prediction scheme {method:?} used without mesh connectivity"
            ))
        })
    };

    let mut values = vec![0i32; num_values];
    match method {
        PredictionMethod::Delta => {
            let wrap = WrapTransform::read(buffer)?;
            delta_recover(&corrections, num_components, &wrap, &mut values);
        }
        PredictionMethod::Parallelogram => {
            let ctx = require_mesh(method)?;
            let wrap = WrapTransform::read(buffer)?;
            parallelogram_recover(ctx, &corrections, num_components, &wrap, &mut values);
        }
        PredictionMethod::ConstrainedMultiParallelogram => {
            let ctx = require_mesh(method)?;
            let crease = CreaseFlags::read(buffer, ctx.table.num_corners())?;
            let wrap = WrapTransform::read(buffer)?;
            multi_parallelogram_recover(
                ctx,
                &corrections,
                num_components,
                &wrap,
                &crease,
                &mut values,
            )?;
        }
        PredictionMethod::TexCoordsPortable => {
            if num_components != 2 {
                return Err(corrupt("texture coordinate prediction needs two components"));
            }
            let ctx = require_mesh(method)?;
            let pos = positions
                .ok_or_else(|| corrupt("texture coordinate prediction without positions"))?;
            let orientations = TexCoordOrientations::read(buffer, num_entries)?;
            let wrap = WrapTransform::read(buffer)?;
            tex_coords_recover(ctx, &corrections, pos, &wrap, &orientations, &mut values)?;
        }
        PredictionMethod::GeometricNormal => {
            let ctx = require_mesh(method)?;
            let pos =
                positions.ok_or_else(|| corrupt("normal prediction without positions"))?;
            let oct = octahedron
                .ok_or_else(|| corrupt("normal prediction on a non-normal attribute"))?;
            let flips = NormalFlips::read(buffer, num_entries)?;
            geometric_normal_recover(ctx, oct, &corrections, pos, &flips, &mut values)?;
        }
        PredictionMethod::None => unreachable!(),
    }
    Ok(values)
}

/// Encodes one attribute's values (and its transform parameters) in data
/// order. Returns the portable integer values so dependent attributes can
/// predict from them.
#[allow(clippy::too_many_arguments)]
pub(crate) fn encode_attribute_values(
    attribute: &PointAttribute,
    attribute_id: i32,
    codec: u8,
    point_order: &[PointIndex],
    mesh_ctx: Option<&MeshPredictionContext>,
    positions: Option<&[i32]>,
    options: &EncoderOptions,
    buffer: &mut EncoderBuffer,
) -> Result<Option<Vec<i32>>> {
    let num_components = attribute.num_components() as usize;

    match codec {
        VALUE_CODEC_RAW => {
            for &point in point_order {
                let value = mapped_value(attribute, point)?;
                buffer.encode_bytes(attribute.value_bytes(value)?)?;
            }
            Ok(None)
        }
        VALUE_CODEC_INTEGER => {
            let mut values = Vec::with_capacity(point_order.len() * num_components);
            for &point in point_order {
                let value = mapped_value(attribute, point)?;
                for c in 0..num_components {
                    values.push(attribute.component_as_i32(value, c)?);
                }
            }
            let method = select_scheme(
                attribute,
                attribute_id,
                codec,
                num_components,
                &values,
                options,
                mesh_ctx,
                positions,
            )?;
            encode_prediction_block(
                &values,
                num_components,
                method,
                mesh_ctx,
                positions,
                None,
                buffer,
            )?;
            Ok(Some(values))
        }
        VALUE_CODEC_QUANTIZED => {
            let bits = options
                .quantization_bits_for(attribute_id, attribute)
                .ok_or_else(|| internal("quantized codec without quantization bits"))?;
            let quantization =
                AttributeQuantization::compute(attribute, bits, options.quantization_mode())?;
            let mut values = Vec::with_capacity(point_order.len() * num_components);
            for &point in point_order {
                let value = mapped_value(attribute, point)?;
                for c in 0..num_components {
                    let v = attribute.component_as_f64(value, c)? as f32;
                    values.push(quantization.quantize_component(c, v));
                }
            }
            quantization.write_parameters(buffer)?;
            let method = select_scheme(
                attribute,
                attribute_id,
                codec,
                num_components,
                &values,
                options,
                mesh_ctx,
                positions,
            )?;
            encode_prediction_block(
                &values,
                num_components,
                method,
                mesh_ctx,
                positions,
                None,
                buffer,
            )?;
            Ok(Some(values))
        }
        VALUE_CODEC_NORMAL => {
            let bits = options
                .quantization_bits_for(attribute_id, attribute)
                .ok_or_else(|| internal("octahedral codec without quantization bits"))?;
            let octahedron = Octahedron::new(bits)?;
            let mut values = Vec::with_capacity(point_order.len() * 2);
            for &point in point_order {
                let value = mapped_value(attribute, point)?;
                let n = [
                    attribute.component_as_f64(value, 0)? as f32,
                    attribute.component_as_f64(value, 1)? as f32,
                    attribute.component_as_f64(value, 2)? as f32,
                ];
                let (s, t) = octahedron.vector_to_coords(n);
                values.push(s);
                values.push(t);
            }
            octahedron.write_parameters(buffer)?;
            let method = select_scheme(
                attribute,
                attribute_id,
                codec,
                2,
                &values,
                options,
                mesh_ctx,
                positions,
            )?;
            encode_prediction_block(
                &values,
                2,
                method,
                mesh_ctx,
                positions,
                Some(&octahedron),
                buffer,
            )?;
            Ok(Some(values))
        }
        other => Err(internal(format!("unknown attribute value codec {other}"))),
    }
}

/// Decodes one attribute's values into `attribute`, scattering them from
/// data order back to point order. Returns the portable values.
pub(crate) fn decode_attribute_values(
    attribute: &mut PointAttribute,
    codec: u8,
    point_order: &[PointIndex],
    mesh_ctx: Option<&MeshPredictionContext>,
    positions: Option<&[i32]>,
    buffer: &mut DecoderBuffer,
) -> Result<Option<Vec<i32>>> {
    let num_components = attribute.num_components() as usize;
    let num_entries = point_order.len();

    match codec {
        VALUE_CODEC_RAW => {
            let stride = attribute.byte_stride();
            for &point in point_order {
                let bytes = buffer.decode_slice(stride)?;
                attribute.set_value(AttributeValueIndex(point.0), bytes)?;
            }
            Ok(None)
        }
        VALUE_CODEC_INTEGER => {
            let values = decode_prediction_block(
                num_entries,
                num_components,
                mesh_ctx,
                positions,
                None,
                buffer,
            )?;
            for (data_id, &point) in point_order.iter().enumerate() {
                for c in 0..num_components {
                    attribute.set_component_from_i32(
                        AttributeValueIndex(point.0),
                        c,
                        values[data_id * num_components + c],
                    )?;
                }
            }
            Ok(Some(values))
        }
        VALUE_CODEC_QUANTIZED => {
            let quantization = AttributeQuantization::read_parameters(buffer, num_components)?;
            let values = decode_prediction_block(
                num_entries,
                num_components,
                mesh_ctx,
                positions,
                None,
                buffer,
            )?;
            for (data_id, &point) in point_order.iter().enumerate() {
                for c in 0..num_components {
                    let v = quantization
                        .dequantize_component(c, values[data_id * num_components + c]);
                    attribute.set_component_from_f64(AttributeValueIndex(point.0), c, v as f64)?;
                }
            }
            Ok(Some(values))
        }
        VALUE_CODEC_NORMAL => {
            if num_components != 3 {
                return Err(corrupt("octahedral normals need three components"));
            }
            let octahedron = Octahedron::read_parameters(buffer)?;
            let values = decode_prediction_block(
                num_entries,
                2,
                mesh_ctx,
                positions,
                Some(&octahedron),
                buffer,
            )?;
            for (data_id, &point) in point_order.iter().enumerate() {
                let s = values[data_id * 2];
                let t = values[data_id * 2 + 1];
                if s < 0 || t < 0 || s > octahedron.max_quantized_value()
                    || t > octahedron.max_quantized_value()
                {
                    return Err(corrupt("octahedral coordinate out of range"));
                }
                let n = octahedron.coords_to_unit_vector(s, t);
                for c in 0..3 {
                    attribute.set_component_from_f64(
                        AttributeValueIndex(point.0),
                        c,
                        n[c] as f64,
                    )?;
                }
            }
            Ok(Some(values))
        }
        other => Err(corrupt(format!("unknown attribute value codec {other}"))),
    }
}
