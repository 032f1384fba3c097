use draco_codec::{
    decode_mesh, encode_mesh, AttributeType, AttributeValueIndex, DataType, EncoderOptions,
    Mesh, PointAttribute, PointIndex,
};

fn vec3_attribute(kind: AttributeType, values: &[[f32; 3]]) -> PointAttribute {
    let mut att =
        PointAttribute::new(kind, DataType::Float32, 3, false, values.len()).unwrap();
    for (i, p) in values.iter().enumerate() {
        let bytes: Vec<u8> = p.iter().flat_map(|c| c.to_le_bytes()).collect();
        att.set_value(AttributeValueIndex(i as u32), &bytes).unwrap();
    }
    att
}

/// A closed octahedron: 6 vertices, 8 faces, outward vertex normals.
fn octahedron_mesh() -> (Mesh, Vec<[f32; 3]>) {
    let positions = [
        [1.0f32, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    // Outward normals of a unit octahedron's vertices are the positions.
    let normals = positions;
    let faces: [[u32; 3]; 8] = [
        [0, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ];
    let mut mesh = Mesh::new();
    mesh.add_attribute(vec3_attribute(AttributeType::Position, &positions));
    mesh.add_attribute(vec3_attribute(AttributeType::Normal, &normals));
    for f in faces {
        mesh.add_face([PointIndex(f[0]), PointIndex(f[1]), PointIndex(f[2])]);
    }
    (mesh, normals.to_vec())
}

fn angle_degrees(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let la = (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt();
    let lb = (b[0] * b[0] + b[1] * b[1] + b[2] * b[2]).sqrt();
    (dot / (la * lb)).clamp(-1.0, 1.0).acos().to_degrees()
}

#[test]
fn octahedron_normals_within_one_degree() {
    let (mesh, input_normals) = octahedron_mesh();
    let mut options = EncoderOptions::default();
    let normal_id = mesh.named_attribute_id(AttributeType::Normal);
    options.set_quantization_bits(normal_id, 8).unwrap();

    let bytes = encode_mesh(&mesh, &options).unwrap();
    let decoded = decode_mesh(&bytes).unwrap();
    assert_eq!(decoded.num_points(), 6);
    assert_eq!(decoded.num_faces(), 8);

    let pos = decoded.named_attribute(AttributeType::Position).unwrap();
    let nrm = decoded.named_attribute(AttributeType::Normal).unwrap();
    for p in 0..decoded.num_points() {
        let point = PointIndex(p as u32);
        let position = pos.value_as_vec3_f32(pos.mapped_index(point)).unwrap();
        let normal = nrm.value_as_vec3_f32(nrm.mapped_index(point)).unwrap();

        // Vertices were permuted: find the matching input by position (the
        // octahedron's vertex normals equal its vertex positions).
        let expected = input_normals
            .iter()
            .min_by(|a, b| {
                let da = angle_degrees(**a, position);
                let db = angle_degrees(**b, position);
                da.partial_cmp(&db).unwrap()
            })
            .unwrap();
        let err = angle_degrees(normal, *expected);
        assert!(err <= 1.0, "normal off by {err} degrees");
    }
}

#[test]
fn normals_with_delta_fallback_roundtrip() {
    let (mesh, _) = octahedron_mesh();
    let normal_id = mesh.named_attribute_id(AttributeType::Normal);
    let mut options = EncoderOptions::default();
    options.set_quantization_bits(normal_id, 10).unwrap();
    options.set_prediction_scheme(normal_id, draco_codec::PredictionMethod::Delta);

    let bytes = encode_mesh(&mesh, &options).unwrap();
    let decoded = decode_mesh(&bytes).unwrap();
    let nrm = decoded.named_attribute(AttributeType::Normal).unwrap();
    for p in 0..decoded.num_points() {
        let n = nrm.value_as_vec3_f32(nrm.mapped_index(PointIndex(p as u32))).unwrap();
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-3, "decoded normal is not unit: {n:?}");
    }
}
