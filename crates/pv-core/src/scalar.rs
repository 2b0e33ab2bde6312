//! The closed set of scalar element types a process variable may carry, and the trait that
//! lets generic PV code learn each type's wire tag without a runtime type registry.
//!
//! Per the design notes this crate follows a tagged-union-by-trait-impl approach rather than
//! a runtime type-dispatch table: [`ValueType`] is the tag, [`PvElement`] is implemented for
//! exactly the twelve scalar types below, and generic code (`Sender<T>`, `Receiver<T>`, the
//! persistence codec) is monomorphized per type instead of branching on the tag at runtime.

use std::fmt;

/// The wire-level type tag used by the persistence XML format and by registry type checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    String,
    Bool,
}

impl ValueType {
    /// The XML `type="..."` attribute value for this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int8 => "int8",
            ValueType::Uint8 => "uint8",
            ValueType::Int16 => "int16",
            ValueType::Uint16 => "uint16",
            ValueType::Int32 => "int32",
            ValueType::Uint32 => "uint32",
            ValueType::Int64 => "int64",
            ValueType::Uint64 => "uint64",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Bool => "bool",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "int8" => ValueType::Int8,
            "uint8" => ValueType::Uint8,
            "int16" => ValueType::Int16,
            "uint16" => ValueType::Uint16,
            "int32" => ValueType::Int32,
            "uint32" => ValueType::Uint32,
            "int64" => ValueType::Int64,
            "uint64" => ValueType::Uint64,
            "float" => ValueType::Float,
            "double" => ValueType::Double,
            "string" => ValueType::String,
            "bool" => ValueType::Bool,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented for exactly the scalar types a PV payload may hold. `to_wire`/`from_wire`
/// give the persistence overlay a type-erased string encoding without requiring every
/// concrete type to round-trip through `serde` directly.
pub trait PvElement: Default + Clone + Send + Sync + PartialEq + 'static {
    const VALUE_TYPE: ValueType;

    fn to_wire(&self) -> String;

    /// Parses a wire value. Returns `None` on malformed input; the persistence overlay treats
    /// that the same as a type mismatch (§4.6) — downgrade to default, never abort the load.
    fn from_wire(s: &str) -> Option<Self>;
}

macro_rules! impl_pv_element_numeric {
    ($ty:ty, $variant:ident) => {
        impl PvElement for $ty {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            fn to_wire(&self) -> String {
                self.to_string()
            }

            fn from_wire(s: &str) -> Option<Self> {
                s.parse().ok()
            }
        }
    };
}

impl_pv_element_numeric!(i8, Int8);
impl_pv_element_numeric!(u8, Uint8);
impl_pv_element_numeric!(i16, Int16);
impl_pv_element_numeric!(u16, Uint16);
impl_pv_element_numeric!(i32, Int32);
impl_pv_element_numeric!(u32, Uint32);
impl_pv_element_numeric!(i64, Int64);
impl_pv_element_numeric!(u64, Uint64);
impl_pv_element_numeric!(f32, Float);
impl_pv_element_numeric!(f64, Double);

impl PvElement for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;

    fn to_wire(&self) -> String {
        self.to_string()
    }

    fn from_wire(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl PvElement for String {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn to_wire(&self) -> String {
        self.clone()
    }

    fn from_wire(s: &str) -> Option<Self> {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_round_trips_through_wire_encoding() {
        assert_eq!(i32::from_wire(&42i32.to_wire()), Some(42));
        assert_eq!(f64::VALUE_TYPE, ValueType::Double);
    }

    #[test]
    fn malformed_wire_value_is_none_not_a_panic() {
        assert_eq!(u16::from_wire("not-a-number"), None);
    }

    #[test]
    fn value_type_string_round_trips() {
        for vt in [
            ValueType::Int8,
            ValueType::Uint8,
            ValueType::Int16,
            ValueType::Uint16,
            ValueType::Int32,
            ValueType::Uint32,
            ValueType::Int64,
            ValueType::Uint64,
            ValueType::Float,
            ValueType::Double,
            ValueType::String,
            ValueType::Bool,
        ] {
            assert_eq!(ValueType::from_str(vt.as_str()), Some(vt));
        }
    }
}
