//! One builder per value [`Kind`], dispatched by the atomizer.
//!
//! A builder emits zero or more cells through the [`Writer`], optionally wrapping children in
//! `push_jump`/`pop_jump`, and returns a cacheability hint. The atomizer (`crate::atomizer`)
//! takes care of identity bookkeeping and recursion; builders only know how to walk one value's
//! own contents.

use crate::atom::{Atom, AtomKind, Scalar};
use crate::atomizer::Atomizer;
use crate::error::EncodeError;
use crate::value::{Kind, Value};
use crate::writer::Writer;

/// Integers in `[-128, 128)` are cheap enough inline that deduplicating them isn't worth a
/// back-reference.
const SMALL_INT_RANGE: std::ops::Range<i64> = -128..128;

/// Dispatches `value` to its builder, returning the cacheability hint.
///
/// Checks `atomizer`'s options for a per-kind override before falling back to the default
/// builder below.
pub(crate) fn build(atomizer: &mut Atomizer, value: &Value) -> Result<bool, EncodeError> {
    let kind = value.kind();
    if let Some(builder) = atomizer.options().override_for(kind) {
        let builder = builder.clone();
        let mut writer = Writer::new(atomizer);
        return builder(value, &mut writer);
    }
    build_default(atomizer, kind, value)
}

fn build_default(atomizer: &mut Atomizer, kind: Kind, value: &Value) -> Result<bool, EncodeError> {
    let mut writer = Writer::new(atomizer);
    match (kind, value) {
        (Kind::Void, _) => {
            writer.emit_raw(Atom::Scalar(Scalar::Void));
            Ok(false)
        }
        (Kind::Null, _) => {
            writer.emit_raw(Atom::Scalar(Scalar::Null));
            Ok(false)
        }
        (Kind::Boolean, Value::Bool(b)) => {
            writer.emit_raw(Atom::Scalar(Scalar::Bool(*b)));
            Ok(false)
        }
        (Kind::Number, Value::Int(n)) => {
            writer.emit_as_is(Scalar::Int(*n));
            Ok(!SMALL_INT_RANGE.contains(n))
        }
        (Kind::Number, Value::Float(x)) => {
            // Like Int, Value::Float has no identity() (value.rs), so this cacheability hint
            // is always discarded by the atomizer — two equal floats are never deduplicated.
            writer.emit_raw(Atom::Scalar(Scalar::Float(*x)));
            Ok(!x.is_nan())
        }
        (Kind::String, Value::String(s)) => {
            writer.emit_raw(Atom::Scalar(Scalar::Str(s.clone())));
            Ok(true)
        }
        (Kind::Bytes, Value::Bytes { data, view }) => {
            writer.emit_raw(Atom::Scalar(Scalar::Bytes {
                data: data.clone(),
                view: *view,
            }));
            Ok(true)
        }
        (Kind::Array, Value::Array(rc)) => {
            writer.allow_self_reference();
            writer.push_jump(AtomKind::Array);
            let elems = rc.borrow().clone();
            for elem in elems.iter() {
                writer.write_child(elem)?;
            }
            writer.pop_jump()?;
            Ok(true)
        }
        (Kind::Set, Value::Set(rc)) => {
            writer.allow_self_reference();
            writer.push_jump(AtomKind::Set);
            let elems = rc.borrow().clone();
            for elem in elems.iter() {
                writer.write_child(elem)?;
            }
            writer.pop_jump()?;
            Ok(true)
        }
        (Kind::Object, Value::Object(rc)) => {
            writer.allow_self_reference();
            writer.push_jump(AtomKind::Object);
            let entries = rc.borrow().clone();
            for (key, _) in entries.iter() {
                writer.write_child(&Value::String(key.clone()))?;
            }
            writer.pop_jump()?;
            for (_, val) in entries.iter() {
                writer.write_child(val)?;
            }
            Ok(true)
        }
        (Kind::Map, Value::Map(rc)) => {
            writer.allow_self_reference();
            writer.push_jump(AtomKind::Map);
            let entries = rc.borrow().clone();
            for (key, _) in entries.iter() {
                writer.write_child(key)?;
            }
            writer.pop_jump()?;
            for (_, val) in entries.iter() {
                writer.write_child(val)?;
            }
            Ok(true)
        }
        (Kind::Custom, Value::Custom(_)) | (Kind::Function, _) | (Kind::Symbol, _) | (Kind::Instance, _) => {
            build_custom_or_reject(writer, value)
        }
        _ => unreachable!("value's own kind() disagrees with its variant"),
    }
}

/// The fallback path for `custom`/`function`/`symbol`/`instance`: delegate to a configured
/// [`CustomCodec`](crate::options::CustomCodec); absent one, degrade to `Void` when
/// `keep_unknowns_as_is` is set, or reject the value as unencodable otherwise.
fn build_custom_or_reject(mut writer: Writer<'_>, value: &Value) -> Result<bool, EncodeError> {
    let Some(codec) = writer.custom_codec() else {
        if writer.keep_unknowns_as_is() {
            writer.emit_raw(Atom::Scalar(Scalar::Void));
            return Ok(false);
        }
        return Err(EncodeError::UnsupportedValue);
    };
    writer.push_jump(AtomKind::Custom);
    let cacheable = codec.encode_custom(value, &mut writer)?;
    writer.pop_jump()?;
    Ok(cacheable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomizer::Atomizer;
    use crate::options::AtomizerOptions;
    use crate::value;

    #[test]
    fn ints_emit_as_is_marker_then_scalar() {
        let mut atomizer = Atomizer::new(AtomizerOptions::new());
        let atoms = atomizer.atomize(&value!(5)).unwrap();
        assert_eq!(atoms, vec![Atom::AsIsMarker, Atom::Scalar(Scalar::Int(5))]);
    }

    #[test]
    fn repeated_int_values_never_back_reference() {
        // Value::Int has no identity() (it is not heap-allocated), so two equal-valued but
        // independently-constructed ints are never deduplicated regardless of magnitude.
        let mut atomizer = Atomizer::new(AtomizerOptions::new());
        let array = Value::array(vec![value!(1_000_000i64), value!(1_000_000i64)]);
        let atoms = atomizer.atomize(&array).unwrap();
        assert!(!atoms.iter().any(|a| matches!(a, Atom::BackRef(_))));
    }

    #[test]
    fn repeated_float_values_never_back_reference() {
        // Same divergence as repeated_int_values_never_back_reference, for Value::Float.
        let mut atomizer = Atomizer::new(AtomizerOptions::new());
        let array = Value::array(vec![value!(2.5f64), value!(2.5f64)]);
        let atoms = atomizer.atomize(&array).unwrap();
        assert!(!atoms.iter().any(|a| matches!(a, Atom::BackRef(_))));
    }

    #[test]
    fn repeated_array_identity_back_references() {
        let mut atomizer = Atomizer::new(AtomizerOptions::new());
        let shared = Value::array(vec![value!(1)]);
        let array = Value::array(vec![shared.clone(), shared]);
        let atoms = atomizer.atomize(&array).unwrap();
        assert!(atoms.iter().any(|a| matches!(a, Atom::BackRef(_))));
    }

    #[derive(Debug)]
    struct Opaque;

    impl crate::value::CustomObject for Opaque {
        fn type_name(&self) -> &str {
            "opaque"
        }
    }

    #[test]
    fn unconfigured_custom_value_is_rejected_by_default() {
        let mut atomizer = Atomizer::new(AtomizerOptions::new());
        let value = Value::Custom(crate::Rc::new(Opaque));
        assert!(matches!(atomizer.atomize(&value), Err(EncodeError::UnsupportedValue)));
    }

    #[test]
    fn keep_unknowns_as_is_degrades_unconfigured_custom_value_to_void() {
        let options = AtomizerOptions::new().with_keep_unknowns_as_is(true);
        let mut atomizer = Atomizer::new(options);
        let value = Value::Custom(crate::Rc::new(Opaque));
        let atoms = atomizer.atomize(&value).unwrap();
        assert_eq!(atoms, vec![Atom::Scalar(Scalar::Void)]);
    }
}
