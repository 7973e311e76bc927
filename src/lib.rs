//! A cycle-aware, reference-deduplicating serializer for arbitrary in-memory value graphs.
//!
//! Values are walked into a flat, linear [`atom::Atom`] stream by an [`atomizer::Atomizer`];
//! repeated or self-referencing composites collapse into [`atom::Atom::BackRef`] cells instead of
//! being walked twice or looping forever. The atom stream is then packed into bytes by
//! [`serial::serialize_atoms`], and the whole round trip reverses through
//! [`serial::deserialize_atoms`] and [`rebuild::Rebuilder`].
//!
//! Every stage is pluggable: a host can override how individual [`value::Kind`]s are built
//! (`options::AtomizerOptions::with_builder`), hand in a shared dictionary of common values so
//! they never appear in the output (`with_dictionary`), or delegate an entire branch of the graph
//! to user-defined types through [`options::CustomCodec`].
//!
//! # Thread Safety
//!
//! By default, this library uses [`std::rc::Rc`] as its reference-counting pointer, which is not
//! thread-safe. To use this library in a multi-threaded context, enable the `thread-safe` feature,
//! which will use [`std::sync::Arc`], a thread-safe reference-counting pointer, instead of
//! [`std::rc::Rc`].

pub mod atom;
mod atomizer;
mod builders;
pub mod error;
pub mod options;
mod rebuild;
mod serial;
pub mod value;
mod writer;

pub use crate::atomizer::Atomizer;
pub use crate::error::{DecodeError, EncodeError};
pub use crate::options::{AtomizerOptions, CustomCodec, RebuilderOptions};
pub use crate::rebuild::Rebuilder;
pub use crate::serial::{deserialize_atoms, serialize_atoms};
pub use crate::value::{Kind, Value};
pub use crate::writer::Writer;

/// A reference-counting pointer.
///
/// Alias for [`std::rc::Rc`] when `thread-safe` feature is disabled.
#[cfg(not(feature = "thread-safe"))]
pub type Rc<T> = std::rc::Rc<T>;

/// A reference-counting pointer.
///
/// Alias for [`std::sync::Arc`] when `thread-safe` feature is enabled.
#[cfg(feature = "thread-safe")]
pub type Rc<T> = std::sync::Arc<T>;

/// Builds a fresh [`Atomizer`] with default options.
pub fn atomizer() -> Atomizer {
    Atomizer::new(AtomizerOptions::new())
}

/// Builds a fresh [`Rebuilder`] with default options.
pub fn rebuilder() -> Rebuilder {
    Rebuilder::new(RebuilderOptions::new())
}

/// Atomizes `value` and packs the result straight to bytes.
pub fn serializer(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let atoms = atomizer().atomize(value)?;
    serialize_atoms(&atoms)
}

/// Unpacks `bytes` and rebuilds the result straight to a [`Value`].
pub fn deserializer(bytes: &[u8]) -> Result<Value, DecodeError> {
    let atoms = deserialize_atoms(bytes)?;
    rebuilder().rebuild(&atoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BytesView;

    fn round_trip(value: &Value) -> Value {
        let bytes = serializer(value).unwrap();
        deserializer(&bytes).unwrap()
    }

    #[test]
    fn cyclic_array_round_trips() {
        let array = Value::array(vec![Value::Null]);
        if let Value::Array(rc) = &array {
            rc.borrow_mut()[0] = array.clone();
        }
        let rebuilt = round_trip(&array);
        let Value::Array(rc) = rebuilt else { panic!("expected array") };
        let Value::Array(inner) = rc.borrow()[0].clone() else { panic!("expected array") };
        assert!(Rc::ptr_eq(&rc, &inner));
    }

    #[test]
    fn shared_string_round_trips_as_single_backref() {
        let s: Value = value!("shared");
        let array = Value::array(vec![s.clone(), s.clone()]);
        let atoms = atomizer().atomize(&array).unwrap();
        assert!(matches!(atoms.last(), Some(crate::atom::Atom::BackRef(_))));

        let rebuilt = round_trip(&array);
        let Value::Array(rc) = rebuilt else { panic!("expected array") };
        let entries = rc.borrow();
        let (Value::String(a), Value::String(b)) = (&entries[0], &entries[1]) else {
            panic!("expected strings")
        };
        assert!(Rc::ptr_eq(a, b));
    }

    #[test]
    fn shared_bytes_round_trip_as_single_backref() {
        let bytes = Value::bytes(vec![9u8, 8, 7]);
        let array = Value::array(vec![bytes.clone(), bytes.clone()]);
        let atoms = atomizer().atomize(&array).unwrap();
        assert!(matches!(atoms.last(), Some(crate::atom::Atom::BackRef(_))));

        let rebuilt = round_trip(&array);
        let Value::Array(rc) = rebuilt else { panic!("expected array") };
        let entries = rc.borrow();
        let (Value::Bytes { data: a, .. }, Value::Bytes { data: b, .. }) = (&entries[0], &entries[1]) else {
            panic!("expected bytes")
        };
        assert!(Rc::ptr_eq(a, b));
    }

    #[test]
    fn mutually_referencing_maps_round_trip() {
        let a = Value::map(vec![]);
        let b = Value::map(vec![(value!("peer"), a.clone())]);
        if let Value::Map(rc) = &a {
            rc.borrow_mut().push((value!("peer"), b.clone()));
        }
        let wrapper = Value::array(vec![a, b]);
        let rebuilt = round_trip(&wrapper);
        let Value::Array(rc) = rebuilt else { panic!("expected array") };
        let entries = rc.borrow();
        let Value::Map(map_a) = &entries[0] else { panic!("expected map") };
        let Value::Map(map_b) = &entries[1] else { panic!("expected map") };
        let a_peer = &map_a.borrow()[0].1;
        let b_peer = &map_b.borrow()[0].1;
        assert!(matches!(a_peer, Value::Map(rc) if Rc::ptr_eq(rc, map_b)));
        assert!(matches!(b_peer, Value::Map(rc) if Rc::ptr_eq(rc, map_a)));
    }

    #[test]
    fn negative_integers_round_trip() {
        for n in [-1i64, i64::MIN, i64::MAX, 0, -(2i64.pow(30)), 2i64.pow(30) - 1] {
            let rebuilt = round_trip(&value!(n));
            assert!(matches!(rebuilt, Value::Int(m) if m == n));
        }
    }

    #[test]
    fn data_view_wraps_bytes() {
        let bytes = Value::bytes_as(vec![1u8, 2, 3], BytesView::DataView);
        let rebuilt = round_trip(&bytes);
        let Value::Bytes { data, view } = rebuilt else { panic!("expected bytes") };
        assert_eq!(&*data, &[1, 2, 3]);
        assert_eq!(view, BytesView::DataView);
    }

    #[test]
    fn dictionary_values_never_appear_in_output() {
        let greeting: Value = value!("hello");
        let options = AtomizerOptions::new().with_dictionary(vec![greeting.clone()]);
        let mut atomizer = Atomizer::new(options);
        let atoms = atomizer.atomize(&greeting).unwrap();
        assert_eq!(atoms, vec![crate::atom::Atom::DictRef(0)]);

        let rebuild_options = RebuilderOptions::new().with_dictionary(vec![greeting.clone()]);
        let rebuilder = Rebuilder::new(rebuild_options);
        let rebuilt = rebuilder.rebuild(&atoms).unwrap();
        assert!(matches!(rebuilt, Value::String(s) if &*s == "hello"));
    }

    #[test]
    fn self_referential_object_round_trips() {
        let object = Value::object(vec![]);
        if let Value::Object(rc) = &object {
            rc.borrow_mut().push((Rc::from("self"), object.clone()));
        }
        let rebuilt = round_trip(&object);
        let Value::Object(rc) = rebuilt else { panic!("expected object") };
        let entries = rc.borrow();
        assert_eq!(entries[0].0.as_ref(), "self");
        assert!(matches!(&entries[0].1, Value::Object(inner) if Rc::ptr_eq(inner, &rc)));
    }

    #[test]
    fn boundary_magnitudes_round_trip() {
        for n in [-(2i64.pow(30)) - 1, -(2i64.pow(30)), 2i64.pow(30) - 1, 2i64.pow(30)] {
            assert!(matches!(round_trip(&value!(n)), Value::Int(m) if m == n));
        }
    }

    #[test]
    fn empty_composites_round_trip() {
        assert!(matches!(round_trip(&Value::array(vec![])), Value::Array(rc) if rc.borrow().is_empty()));
        assert!(matches!(round_trip(&Value::map(vec![])), Value::Map(rc) if rc.borrow().is_empty()));
        assert!(matches!(round_trip(&Value::set(vec![])), Value::Set(rc) if rc.borrow().is_empty()));
        assert!(matches!(round_trip(&Value::object(vec![])), Value::Object(rc) if rc.borrow().is_empty()));
    }

    #[test]
    fn nan_is_preserved() {
        assert!(matches!(round_trip(&value!(f64::NAN)), Value::Float(x) if x.is_nan()));
    }

    #[test]
    fn zero_child_custom_atom_round_trips() {
        use crate::options::CustomCodec;

        #[derive(Debug)]
        struct Marker;

        impl crate::value::CustomObject for Marker {
            fn type_name(&self) -> &str {
                "marker"
            }
        }

        #[derive(Debug)]
        struct MarkerCodec;

        impl CustomCodec for MarkerCodec {
            fn encode_custom(&self, _value: &Value, _writer: &mut Writer) -> Result<bool, EncodeError> {
                Ok(false)
            }

            fn decode_custom(
                &self,
                _read_next: &mut dyn FnMut() -> Result<Value, DecodeError>,
            ) -> Result<Value, DecodeError> {
                Ok(Value::Custom(Rc::new(Marker)))
            }
        }

        let codec: Rc<dyn CustomCodec> = Rc::new(MarkerCodec);
        let atomizer_options = AtomizerOptions::new().with_custom_codec(codec.clone());
        let mut atomizer = Atomizer::new(atomizer_options);
        let value = Value::Custom(Rc::new(Marker));
        let atoms = atomizer.atomize(&value).unwrap();

        let rebuild_options = RebuilderOptions::new().with_custom_codec(codec);
        let rebuilder = Rebuilder::new(rebuild_options);
        let rebuilt = rebuilder.rebuild(&atoms).unwrap();
        assert!(matches!(rebuilt, Value::Custom(_)));
    }
}
