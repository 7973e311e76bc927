//! Reconstructs a [`Value`] from an atom stream.
//!
//! Mirrors the atomizer: a composite's empty shell is registered in the back-reference cache
//! before its children are decoded, so a `BackRef` pointing at a still-open ancestor resolves to
//! the same `Rc` the ancestor will keep filling in (cf. `crate::atomizer::Atomizer`'s
//! self-reference handling on the encode side).

use crate::atom::{Atom, AtomKind, Scalar};
use crate::error::DecodeError;
use crate::options::RebuilderOptions;
use crate::value::{MapEntries, ObjectEntries, Value};
use crate::Rc;
use std::cell::RefCell;
use std::collections::HashMap;

/// Rebuilds [`Value`]s from atom streams produced by `crate::atomizer::Atomizer`.
pub struct Rebuilder {
    options: RebuilderOptions,
}

impl Rebuilder {
    pub fn new(options: RebuilderOptions) -> Self {
        Self { options }
    }

    /// Reconstructs the single top-level value encoded in `atoms`.
    pub fn rebuild(&self, atoms: &[Atom]) -> Result<Value, DecodeError> {
        let mut cache = HashMap::new();
        if atoms.is_empty() {
            return Err(DecodeError::IncompleteData);
        }
        let (value, next) = self.decode_one(atoms, 0, &mut cache)?;
        if next != atoms.len() {
            return Err(DecodeError::ExcessContent);
        }
        Ok(value)
    }

    fn decode_one(
        &self,
        atoms: &[Atom],
        index: usize,
        cache: &mut HashMap<usize, Value>,
    ) -> Result<(Value, usize), DecodeError> {
        let atom = atoms.get(index).ok_or(DecodeError::IncompleteData)?;
        match atom {
            Atom::Scalar(scalar) => {
                let value = self.intercept(scalar_to_value(scalar));
                cache.insert(index, value.clone());
                Ok((value, index + 1))
            }
            Atom::AsIsMarker => {
                let Some(Atom::Scalar(Scalar::Int(n))) = atoms.get(index + 1) else {
                    return Err(DecodeError::IncompleteData);
                };
                Ok((self.intercept(Value::Int(*n)), index + 2))
            }
            Atom::BackRef(target) => {
                let value = cache.get(target).cloned().ok_or(DecodeError::DanglingBackref)?;
                Ok((value, index + 1))
            }
            Atom::DictRef(dict_index) => {
                let value = self
                    .options
                    .dictionary
                    .get(*dict_index)
                    .cloned()
                    .ok_or(DecodeError::DanglingBackref)?;
                Ok((value, index + 1))
            }
            Atom::Header { kind, until } => self.decode_header(atoms, index, *kind, *until, cache),
        }
    }

    fn decode_n(
        &self,
        atoms: &[Atom],
        mut index: usize,
        count: usize,
        cache: &mut HashMap<usize, Value>,
    ) -> Result<(Vec<Value>, usize), DecodeError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let (value, next) = self.decode_one(atoms, index, cache)?;
            out.push(value);
            index = next;
        }
        Ok((out, index))
    }

    fn decode_header(
        &self,
        atoms: &[Atom],
        index: usize,
        kind: AtomKind,
        until: usize,
        cache: &mut HashMap<usize, Value>,
    ) -> Result<(Value, usize), DecodeError> {
        match kind {
            AtomKind::Array => {
                let rc = Rc::new(RefCell::new(Vec::new()));
                let value = Value::Array(rc.clone());
                cache.insert(index, value.clone());
                let mut cursor = index + 1;
                while cursor < until {
                    let (elem, next) = self.decode_one(atoms, cursor, cache)?;
                    rc.borrow_mut().push(elem);
                    cursor = next;
                }
                Ok((value, until))
            }
            AtomKind::Set => {
                let rc = Rc::new(RefCell::new(Vec::new()));
                let value = Value::Set(rc.clone());
                cache.insert(index, value.clone());
                let mut cursor = index + 1;
                while cursor < until {
                    let (elem, next) = self.decode_one(atoms, cursor, cache)?;
                    rc.borrow_mut().push(elem);
                    cursor = next;
                }
                Ok((value, until))
            }
            AtomKind::Object => {
                let rc: Rc<RefCell<ObjectEntries>> = Rc::new(RefCell::new(Vec::new()));
                let value = Value::Object(rc.clone());
                cache.insert(index, value.clone());
                let mut keys = Vec::new();
                let mut cursor = index + 1;
                while cursor < until {
                    let (key, next) = self.decode_one(atoms, cursor, cache)?;
                    let Value::String(s) = key else {
                        return Err(DecodeError::BadTag);
                    };
                    keys.push(s);
                    cursor = next;
                }
                let (values, next) = self.decode_n(atoms, until, keys.len(), cache)?;
                *rc.borrow_mut() = keys.into_iter().zip(values).collect();
                Ok((value, next))
            }
            AtomKind::Map => {
                let rc: Rc<RefCell<MapEntries>> = Rc::new(RefCell::new(Vec::new()));
                let value = Value::Map(rc.clone());
                cache.insert(index, value.clone());
                let mut keys = Vec::new();
                let mut cursor = index + 1;
                while cursor < until {
                    let (key, next) = self.decode_one(atoms, cursor, cache)?;
                    keys.push(key);
                    cursor = next;
                }
                let (values, next) = self.decode_n(atoms, until, keys.len(), cache)?;
                *rc.borrow_mut() = keys.into_iter().zip(values).collect();
                Ok((value, next))
            }
            AtomKind::Custom => {
                let codec = self
                    .options
                    .custom
                    .as_ref()
                    .ok_or(DecodeError::MissingCustomCodec)?;
                let (children, next) = self.decode_n_until(atoms, index + 1, until, cache)?;
                let mut children = children.into_iter();
                let mut read_next = move || children.next().ok_or(DecodeError::IncompleteData);
                let value = codec.decode_custom(&mut read_next)?;
                // Unlike Array/Object/Map/Set, a Custom value has no generic shell to
                // pre-allocate, so it can't resolve a self-reference to its own still-open
                // header (see DESIGN.md). It can still be the *target* of a later sibling's
                // back-reference, so it's registered here, after decoding completes.
                cache.insert(index, value.clone());
                Ok((value, next))
            }
            AtomKind::AsIs => unreachable!("AsIs never appears as a header kind"),
        }
    }

    fn decode_n_until(
        &self,
        atoms: &[Atom],
        mut cursor: usize,
        until: usize,
        cache: &mut HashMap<usize, Value>,
    ) -> Result<(Vec<Value>, usize), DecodeError> {
        let mut out = Vec::new();
        while cursor < until {
            let (value, next) = self.decode_one(atoms, cursor, cache)?;
            out.push(value);
            cursor = next;
        }
        Ok((out, cursor))
    }

    fn intercept(&self, value: Value) -> Value {
        match &self.options.custom {
            Some(codec) => codec.intercept_scalar(value),
            None => value,
        }
    }
}

fn scalar_to_value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Void => Value::Void,
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(n) => Value::Int(*n),
        Scalar::Float(x) => Value::Float(*x),
        Scalar::Str(s) => Value::String(s.clone()),
        Scalar::Bytes { data, view } => Value::Bytes {
            data: data.clone(),
            view: *view,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomKind;

    #[test]
    fn rebuilds_flat_array() {
        let atoms = vec![
            Atom::Header { kind: AtomKind::Array, until: 3 },
            Atom::AsIsMarker,
            Atom::Scalar(Scalar::Int(42)),
        ];
        let rebuilder = Rebuilder::new(RebuilderOptions::new());
        let value = rebuilder.rebuild(&atoms).unwrap();
        let Value::Array(rc) = value else { panic!("expected array") };
        assert_eq!(rc.borrow().len(), 1);
    }

    #[test]
    fn self_referencing_array_resolves_backref() {
        // [0] is a back-reference to the array's own header at atom-index 0.
        let atoms = vec![
            Atom::Header { kind: AtomKind::Array, until: 2 },
            Atom::BackRef(0),
        ];
        let rebuilder = Rebuilder::new(RebuilderOptions::new());
        let value = rebuilder.rebuild(&atoms).unwrap();
        let Value::Array(rc) = value.clone() else { panic!("expected array") };
        let Value::Array(inner) = rc.borrow()[0].clone() else { panic!("expected array") };
        assert!(Rc::ptr_eq(&rc, &inner));
    }

    #[test]
    fn dangling_backref_is_an_error() {
        let atoms = vec![Atom::BackRef(5)];
        let rebuilder = Rebuilder::new(RebuilderOptions::new());
        assert!(matches!(rebuilder.rebuild(&atoms), Err(DecodeError::DanglingBackref)));
    }

    #[test]
    fn object_keys_then_values_rebuild_in_order() {
        // two keys ("a","b") bounded by until=3, then their two values follow unbounded.
        let atoms = vec![
            Atom::Header { kind: AtomKind::Object, until: 3 },
            Atom::Scalar(Scalar::Str(Rc::from("a"))),
            Atom::Scalar(Scalar::Str(Rc::from("b"))),
            Atom::Scalar(Scalar::Bool(false)),
            Atom::Scalar(Scalar::Bool(true)),
        ];
        let rebuilder = Rebuilder::new(RebuilderOptions::new());
        let value = rebuilder.rebuild(&atoms).unwrap();
        let Value::Object(rc) = value else { panic!("expected object") };
        let entries = rc.borrow();
        assert_eq!(entries[0].0.as_ref(), "a");
        assert_eq!(entries[1].0.as_ref(), "b");
    }
}
