use std::num::NonZero;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $name(NonZero<u32>);

        impl $name {
            /// Return the underlying u32 value of the ID.
            pub fn as_u32(self) -> u32 {
                self.0.get() - 1
            }

            /// Return the underlying ID value as a usize, for slice indexing.
            pub fn as_usize(self) -> usize {
                self.as_u32() as usize
            }

            /// Construct an ID from a u32 value.
            ///
            /// Panics if the value is `u32::MAX`.
            pub fn from_u32(value: u32) -> $name {
                // IDs are stored offset by one so that zero is available as a
                // niche, making `Option<Id>` the same size as `Id`.
                let stored = value.checked_add(1).expect("ID overflow");
                $name(NonZero::new(stored).expect("stored ID is non-zero"))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.as_u32().fmt(f)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.as_u32())
            }
        }
    };
}

define_id!(
    /// ID of an operator node in a [`Graph`](crate::Graph).
    NodeId,
    "NodeId"
);

define_id!(
    /// ID of a value (tensor edge) in a [`Graph`](crate::Graph).
    ///
    /// Values are produced by exactly one operator node, which may be an
    /// input or constant node.
    ValueId,
    "ValueId"
);

#[cfg(test)]
mod tests {
    use super::{NodeId, ValueId};

    #[test]
    fn test_id_round_trip() {
        let id = ValueId::from_u32(7);
        assert_eq!(id.as_u32(), 7);
        assert_eq!(id.as_usize(), 7);
        assert_eq!(format!("{:?}", id), "ValueId(7)");
        assert_eq!(NodeId::from_u32(0).to_string(), "0");
    }

    #[test]
    fn test_option_id_has_niche() {
        assert_eq!(
            std::mem::size_of::<Option<NodeId>>(),
            std::mem::size_of::<NodeId>()
        );
    }
}
