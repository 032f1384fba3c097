//! Integer newtypes for the different index spaces of a geometry.
//!
//! Points, vertices, corners, faces and attribute values each get their own
//! wrapper so that an accidental cross-assignment is a type error.

macro_rules! index_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub const INVALID: $name = $name(u32::MAX);

            #[inline]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self(v as u32)
            }
        }
    };
}

index_type!(
    /// Index of a point in a point cloud or mesh.
    PointIndex
);
index_type!(
    /// Index of a connectivity vertex in a corner table.
    VertexIndex
);
index_type!(
    /// Index of a corner (3 per face) in a corner table.
    CornerIndex
);
index_type!(
    /// Index of a triangular face.
    FaceIndex
);
index_type!(
    /// Index of a unique value inside an attribute buffer.
    AttributeValueIndex
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel() {
        assert!(!PointIndex::INVALID.is_valid());
        assert!(CornerIndex(0).is_valid());
        assert_eq!(FaceIndex::from(7usize).index(), 7);
    }
}
