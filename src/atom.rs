//! The atom stream: the intermediate representation produced by the atomizer and consumed by
//! either the serializer or the rebuilder.
//!
//! A stream is a flat [`Vec<Atom>`]. Each [`Atom`] is one of: an inline scalar, a composite header
//! carrying an until-index, an as-is marker (always immediately followed by exactly one scalar),
//! a back-reference, or a dictionary reference.

use crate::value::BytesView;

/// The tag carried in a composite header's low bits.
///
/// `AsIs = 0` is reserved for the as-is marker cell and never appears as a composite header's
/// kind in a well-formed stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum AtomKind {
    AsIs = 0,
    Array = 1,
    Object = 2,
    Map = 3,
    Set = 4,
    Custom = 5,
}

/// An inline scalar literal: a value small/simple enough to appear directly in the atom stream
/// rather than behind a composite header.
#[derive(Clone, Debug)]
pub enum Scalar {
    Void,
    Null,
    Bool(bool),
    Int(i64),
    /// Carries the raw bits so that any NaN payload round-trips, not just the canonical one.
    Float(f64),
    Str(crate::Rc<str>),
    Bytes {
        data: crate::Rc<[u8]>,
        view: BytesView,
    },
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Void, Scalar::Void) | (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::Bytes { data: a, view: va }, Scalar::Bytes { data: b, view: vb }) => {
                a == b && va == vb
            }
            _ => false,
        }
    }
}

/// One cell of the atom stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    /// An inline scalar literal.
    Scalar(Scalar),
    /// The `AsIs` marker cell; the next [`Atom`] in the stream must be `Atom::Scalar(Scalar::Int)`.
    AsIsMarker,
    /// A composite header. `until` is the exclusive atom-stream index of the end of this
    /// composite's first child-run (keys, for `Object`/`Map`; all elements, otherwise).
    Header { kind: AtomKind, until: usize },
    /// A back-reference to a previously-produced value, by atom-index.
    BackRef(usize),
    /// A reference into the atomizer/rebuilder's shared dictionary, by dictionary index. Kept
    /// distinct from `BackRef` because both index spaces start at 0 and would otherwise collide.
    DictRef(usize),
}

impl Atom {
    /// Convenience: wraps an integer scalar the way builders do. Integers always need the `AsIs`
    /// marker cell ahead of them, to distinguish a raw integer from a tag byte.
    pub fn push_int(out: &mut Vec<Atom>, n: i64) {
        out.push(Atom::AsIsMarker);
        out.push(Atom::Scalar(Scalar::Int(n)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_scalar_eq_is_bitwise() {
        let nan_a = Scalar::Float(f64::NAN);
        let nan_b = Scalar::Float(f64::from_bits(f64::NAN.to_bits() ^ 1));
        assert_eq!(nan_a, nan_a.clone());
        assert_ne!(nan_a, nan_b, "distinct NaN bit patterns are distinct scalars");
    }

    #[test]
    fn push_int_emits_marker_then_value() {
        let mut out = Vec::new();
        Atom::push_int(&mut out, -1);
        assert_eq!(out, vec![Atom::AsIsMarker, Atom::Scalar(Scalar::Int(-1))]);
    }
}
