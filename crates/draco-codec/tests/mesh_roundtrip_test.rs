use draco_codec::{
    decode_mesh, encode_mesh, AttributeType, AttributeValueIndex, DataType, EncoderOptions,
    EncodingMethod, Mesh, PointAttribute, PointIndex,
};

fn float_position_attribute(points: &[[f32; 3]]) -> PointAttribute {
    let mut att =
        PointAttribute::new(AttributeType::Position, DataType::Float32, 3, false, points.len())
            .unwrap();
    for (i, p) in points.iter().enumerate() {
        let bytes: Vec<u8> = p.iter().flat_map(|c| c.to_le_bytes()).collect();
        att.set_value(AttributeValueIndex(i as u32), &bytes).unwrap();
    }
    att
}

fn int_position_attribute(points: &[[i32; 3]]) -> PointAttribute {
    let mut att =
        PointAttribute::new(AttributeType::Position, DataType::Int32, 3, false, points.len())
            .unwrap();
    for (i, p) in points.iter().enumerate() {
        let bytes: Vec<u8> = p.iter().flat_map(|c| c.to_le_bytes()).collect();
        att.set_value(AttributeValueIndex(i as u32), &bytes).unwrap();
    }
    att
}

fn decoded_positions_f32(mesh: &Mesh) -> Vec<[f32; 3]> {
    let att = mesh.named_attribute(AttributeType::Position).unwrap();
    (0..mesh.num_points())
        .map(|p| {
            let v = att.mapped_index(PointIndex(p as u32));
            att.value_as_vec3_f32(v).unwrap()
        })
        .collect()
}

/// Every decoded position must be close to some input position (the codec
/// permutes vertices).
fn assert_positions_match(input: &[[f32; 3]], decoded: &[[f32; 3]], tolerance: f32) {
    assert_eq!(input.len(), decoded.len());
    for d in decoded {
        let best = input
            .iter()
            .map(|i| {
                (i[0] - d[0])
                    .abs()
                    .max((i[1] - d[1]).abs())
                    .max((i[2] - d[2]).abs())
            })
            .fold(f32::MAX, f32::min);
        assert!(best <= tolerance, "decoded point {d:?} off by {best}");
    }
}

#[test]
fn unit_triangle_roundtrip() {
    let points = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]];
    let mut mesh = Mesh::new();
    mesh.add_attribute(float_position_attribute(&points));
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);

    let mut options = EncoderOptions::default();
    options.set_quantization_bits(0, 14).unwrap();
    options.set_encoding_method(EncodingMethod::EdgeBreaker);

    let bytes = encode_mesh(&mesh, &options).unwrap();
    assert!(bytes.len() > 20, "stream suspiciously small: {}", bytes.len());
    assert!(bytes.len() < 120, "stream suspiciously large: {}", bytes.len());

    let decoded = decode_mesh(&bytes).unwrap();
    assert_eq!(decoded.num_faces(), 1);
    assert_eq!(decoded.num_points(), 3);
    // Positions within half a quantization step per axis (range is 1.0).
    assert_positions_match(&points, &decoded_positions_f32(&decoded), f32::powi(2.0, -13));
}

#[test]
fn two_triangle_quad_roundtrip() {
    let points = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let mut mesh = Mesh::new();
    mesh.add_attribute(float_position_attribute(&points));
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    mesh.add_face([PointIndex(0), PointIndex(2), PointIndex(3)]);

    let options = EncoderOptions::default();
    let bytes = encode_mesh(&mesh, &options).unwrap();
    let decoded = decode_mesh(&bytes).unwrap();
    assert_eq!(decoded.num_faces(), 2);
    assert_eq!(decoded.num_points(), 4);
    assert_positions_match(&points, &decoded_positions_f32(&decoded), f32::powi(2.0, -13));

    // The decoded faces must still form a quad: exactly one shared edge.
    let f0: Vec<u32> = decoded.face(draco_codec::FaceIndex(0)).iter().map(|p| p.0).collect();
    let f1: Vec<u32> = decoded.face(draco_codec::FaceIndex(1)).iter().map(|p| p.0).collect();
    let shared = f0.iter().filter(|p| f1.contains(p)).count();
    assert_eq!(shared, 2);

    // Re-encoding the decoded mesh is deterministic byte for byte.
    let again = encode_mesh(&decoded, &options).unwrap();
    let again2 = encode_mesh(&decoded, &options).unwrap();
    assert_eq!(again, again2);
}

#[test]
fn integer_positions_are_bit_exact() {
    let points = [
        [0i32, 0, 0],
        [1000, 0, 50],
        [1000, 1000, -20],
        [0, 1000, 7],
        [500, 1500, 0],
    ];
    let mut mesh = Mesh::new();
    mesh.add_attribute(int_position_attribute(&points));
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    mesh.add_face([PointIndex(0), PointIndex(2), PointIndex(3)]);
    mesh.add_face([PointIndex(3), PointIndex(2), PointIndex(4)]);

    let bytes = encode_mesh(&mesh, &EncoderOptions::default()).unwrap();
    let decoded = decode_mesh(&bytes).unwrap();
    assert_eq!(decoded.num_points(), 5);

    let att = decoded.named_attribute(AttributeType::Position).unwrap();
    let mut decoded_points: Vec<[i32; 3]> = (0..decoded.num_points())
        .map(|p| {
            let v = att.mapped_index(PointIndex(p as u32));
            [
                att.component_as_i32(v, 0).unwrap(),
                att.component_as_i32(v, 1).unwrap(),
                att.component_as_i32(v, 2).unwrap(),
            ]
        })
        .collect();
    let mut expected = points.to_vec();
    decoded_points.sort();
    expected.sort();
    assert_eq!(decoded_points, expected);
}

#[test]
fn sequential_method_preserves_face_order() {
    let points = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let mut mesh = Mesh::new();
    mesh.add_attribute(float_position_attribute(&points));
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    mesh.add_face([PointIndex(0), PointIndex(2), PointIndex(3)]);

    let mut options = EncoderOptions::default();
    options.set_encoding_method(EncodingMethod::Sequential);
    let bytes = encode_mesh(&mesh, &options).unwrap();
    let decoded = decode_mesh(&bytes).unwrap();

    // Sequential coding keeps both the point order and the face list.
    assert_eq!(decoded.num_points(), 4);
    for i in 0..2 {
        let f = draco_codec::FaceIndex(i as u32);
        assert_eq!(decoded.face(f), mesh.face(f));
    }
    assert_positions_match(&points, &decoded_positions_f32(&decoded), f32::powi(2.0, -13));
}

#[test]
fn encoding_is_deterministic_across_speeds() {
    let points = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.2],
        [0.0, 1.0, 0.1],
        [2.0, 0.5, 0.0],
    ];
    let mut mesh = Mesh::new();
    mesh.add_attribute(float_position_attribute(&points));
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    mesh.add_face([PointIndex(0), PointIndex(2), PointIndex(3)]);
    mesh.add_face([PointIndex(1), PointIndex(4), PointIndex(2)]);

    for speed in [0u8, 1, 5, 8, 10] {
        let mut options = EncoderOptions::default();
        options.set_encoding_speed(speed).unwrap();
        let a = encode_mesh(&mesh, &options).unwrap();
        let b = encode_mesh(&mesh, &options).unwrap();
        assert_eq!(a, b, "speed {speed} is not deterministic");

        let decoded = decode_mesh(&a).unwrap();
        assert_eq!(decoded.num_faces(), 3);
        assert_positions_match(
            &points,
            &decoded_positions_f32(&decoded),
            2.0 * f32::powi(2.0, -13),
        );
    }
}

#[test]
fn empty_and_invalid_meshes_are_rejected() {
    let mesh = Mesh::new();
    assert!(matches!(
        encode_mesh(&mesh, &EncoderOptions::default()),
        Err(draco_codec::CodecError::InvalidParameter(_))
    ));

    // A mesh with a face but no position attribute.
    let mut mesh = Mesh::new();
    mesh.set_num_points(3);
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    assert!(matches!(
        encode_mesh(&mesh, &EncoderOptions::default()),
        Err(draco_codec::CodecError::InvalidParameter(_))
    ));

    // Isolated points are rejected rather than guessed at.
    let mut mesh = Mesh::new();
    mesh.add_attribute(float_position_attribute(&[
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [5.0, 5.0, 5.0],
    ]));
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    assert!(matches!(
        encode_mesh(&mesh, &EncoderOptions::default()),
        Err(draco_codec::CodecError::InvalidParameter(_))
    ));
}

#[test]
fn non_manifold_mesh_is_rejected() {
    let mut mesh = Mesh::new();
    mesh.add_attribute(float_position_attribute(&[
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
    ]));
    // Three faces share the edge (0, 1).
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    mesh.add_face([PointIndex(1), PointIndex(0), PointIndex(3)]);
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(4)]);
    assert_eq!(
        encode_mesh(&mesh, &EncoderOptions::default()).unwrap_err(),
        draco_codec::CodecError::NonManifold
    );
}
