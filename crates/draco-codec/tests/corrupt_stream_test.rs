use draco_codec::{
    decode, decode_mesh, encode_mesh, AttributeType, AttributeValueIndex, CodecError, DataType,
    EncoderOptions, Mesh, PointAttribute, PointIndex,
};

fn valid_stream() -> Vec<u8> {
    let mut mesh = Mesh::new();
    let mut pos =
        PointAttribute::new(AttributeType::Position, DataType::Float32, 3, false, 4).unwrap();
    let points = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    for (i, p) in points.iter().enumerate() {
        let bytes: Vec<u8> = p.iter().flat_map(|c| c.to_le_bytes()).collect();
        pos.set_value(AttributeValueIndex(i as u32), &bytes).unwrap();
    }
    mesh.add_attribute(pos);
    mesh.add_face([PointIndex(0), PointIndex(1), PointIndex(2)]);
    mesh.add_face([PointIndex(0), PointIndex(2), PointIndex(3)]);
    encode_mesh(&mesh, &EncoderOptions::default()).unwrap()
}

#[test]
fn mutated_magic_is_corrupt() {
    let mut bytes = valid_stream();
    bytes[4] = b'X'; // "DRACO" -> "DRACX"
    assert!(matches!(
        decode(&bytes),
        Err(CodecError::CorruptBitstream(_))
    ));
}

#[test]
fn truncated_stream_underflows() {
    let bytes = valid_stream();
    let truncated = &bytes[..bytes.len() - 10];
    let err = decode(truncated).unwrap_err();
    assert!(
        matches!(err, CodecError::BufferUnderflow | CodecError::CorruptBitstream(_)),
        "unexpected error {err:?}"
    );
}

#[test]
fn every_prefix_fails_cleanly() {
    // No prefix of a valid stream may panic or succeed.
    let bytes = valid_stream();
    for len in 0..bytes.len() {
        assert!(decode(&bytes[..len]).is_err(), "prefix of {len} bytes decoded");
    }
}

#[test]
fn newer_version_is_unsupported() {
    let mut bytes = valid_stream();
    bytes[5] = 9; // major version
    assert_eq!(
        decode(&bytes).unwrap_err(),
        CodecError::UnsupportedVersion(9, 0)
    );
}

#[test]
fn unknown_flags_are_unsupported() {
    let mut bytes = valid_stream();
    // Flags live after magic(5) + version(2) + type(1) + method(1).
    bytes[9] = 0x01;
    assert!(matches!(
        decode(&bytes).unwrap_err(),
        CodecError::UnsupportedFeature(_)
    ));
}

#[test]
fn unknown_geometry_type_is_corrupt() {
    let mut bytes = valid_stream();
    bytes[7] = 9;
    assert!(matches!(
        decode(&bytes).unwrap_err(),
        CodecError::CorruptBitstream(_)
    ));
}

#[test]
fn point_cloud_stream_is_not_a_mesh() {
    use draco_codec::{encode_point_cloud, PointCloud};
    let mut pc = PointCloud::new();
    let mut pos =
        PointAttribute::new(AttributeType::Position, DataType::Float32, 3, false, 2).unwrap();
    pos.set_value(AttributeValueIndex(0), &[0u8; 12]).unwrap();
    pos.set_value(AttributeValueIndex(1), &[0u8; 12]).unwrap();
    pc.add_attribute(pos);
    let bytes = encode_point_cloud(&pc, &EncoderOptions::default()).unwrap();
    assert!(matches!(
        decode_mesh(&bytes).unwrap_err(),
        CodecError::InvalidParameter(_)
    ));
}

#[test]
fn garbage_tail_mutations_never_panic() {
    // Flipping any single byte must produce either an error or a decodable
    // (possibly different) geometry, never a panic.
    let bytes = valid_stream();
    for i in 11..bytes.len() {
        let mut mutated = bytes.clone();
        mutated[i] ^= 0xff;
        let _ = decode(&mutated);
    }
}
