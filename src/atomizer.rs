//! Walks a [`Value`] graph into a flat atom stream, deduplicating by identity and breaking
//! cycles with back-references.
//!
//! A value with a stable [`Value::identity`] is registered in the reference table before its
//! builder runs, so a child that points back at an in-progress ancestor can be encoded as a
//! [`Atom::BackRef`] instead of recursing forever — but only once the ancestor's builder has
//! explicitly called [`Writer::allow_self_reference`]; otherwise that back-reference is a bug in
//! the input graph, not a reference, and atomizing fails with [`EncodeError::InfiniteLoop`].

use crate::atom::{Atom, AtomKind};
use crate::builders;
use crate::error::EncodeError;
use crate::options::AtomizerOptions;
use crate::value::Value;
use std::collections::HashMap;

/// A value's position in the reference table.
#[derive(Clone, Copy, Debug)]
pub(crate) enum RefState {
    /// Registered, but no descendant may reference it yet.
    Open,
    /// `allow_self_reference` was called; `usize` is the atom-index a self-reference resolves to.
    OpenSelfRef(usize),
    /// Fully atomized and cacheable; `usize` is the atom-index later references resolve to.
    Closed(usize),
}

/// One value currently being atomized, tracked so `Writer::allow_self_reference` and
/// `Writer::push_jump`/`pop_jump` know which value and which reserved header they act on.
pub(crate) struct Frame {
    pub(crate) identity: usize,
    pub(crate) atom_index: usize,
}

/// Turns [`Value`] graphs into atom streams ([`Vec<Atom>`]).
pub struct Atomizer {
    pub(crate) output: Vec<Atom>,
    pub(crate) refs: HashMap<usize, RefState>,
    dict_identity: HashMap<usize, usize>,
    pub(crate) jumps: Vec<usize>,
    pub(crate) frames: Vec<Frame>,
    options: AtomizerOptions,
}

impl Atomizer {
    pub fn new(options: AtomizerOptions) -> Self {
        let mut dict_identity = HashMap::new();
        for (i, value) in options.dictionary.iter().enumerate() {
            if let Some(id) = value.identity() {
                dict_identity.insert(id, i);
            }
        }
        Self {
            output: Vec::new(),
            refs: HashMap::new(),
            dict_identity,
            jumps: Vec::new(),
            frames: Vec::new(),
            options,
        }
    }

    pub(crate) fn options(&self) -> &AtomizerOptions {
        &self.options
    }

    /// Atomizes `value` into a fresh atom stream.
    pub fn atomize(&mut self, value: &Value) -> Result<Vec<Atom>, EncodeError> {
        self.atomize_value(value)?;
        debug_assert!(self.frames.is_empty());
        debug_assert!(self.jumps.is_empty());
        Ok(std::mem::take(&mut self.output))
    }

    #[cfg(test)]
    pub(crate) fn take_output(&mut self) -> Vec<Atom> {
        std::mem::take(&mut self.output)
    }

    /// Atomizes one value, recursing through its builder. Called by `Writer::write_child` for
    /// every child, and by [`Atomizer::atomize`] for the top-level value.
    pub(crate) fn atomize_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        let Some(id) = value.identity() else {
            return self.run_builder(value);
        };

        if let Some(&dict_index) = self.dict_identity.get(&id) {
            self.output.push(Atom::DictRef(dict_index));
            return Ok(());
        }

        if let Some(state) = self.refs.get(&id) {
            match *state {
                RefState::Open => return Err(EncodeError::InfiniteLoop),
                RefState::OpenSelfRef(idx) | RefState::Closed(idx) => {
                    self.output.push(Atom::BackRef(idx));
                    return Ok(());
                }
            }
        }

        let atom_index = self.output.len();
        self.refs.insert(id, RefState::Open);
        self.frames.push(Frame { identity: id, atom_index });

        let cacheable = self.run_builder(value)?;

        self.frames.pop();
        if cacheable {
            self.refs.insert(id, RefState::Closed(atom_index));
        } else {
            self.refs.remove(&id);
        }
        Ok(())
    }

    fn run_builder(&mut self, value: &Value) -> Result<bool, EncodeError> {
        let before = self.output.len();
        let cacheable = builders::build(self, value)?;
        if self.output.len() == before {
            return Err(EncodeError::ValueEncodedIntoNothing);
        }
        Ok(cacheable)
    }

    /// Lets the currently-open value be referenced by its own descendants from now on.
    pub(crate) fn allow_self_reference(&mut self) {
        if let Some(frame) = self.frames.last() {
            self.refs.insert(frame.identity, RefState::OpenSelfRef(frame.atom_index));
        }
    }

    /// Reserves a composite header, to be finalized by a matching `pop_jump`.
    pub(crate) fn push_jump(&mut self, kind: AtomKind) {
        let position = self.output.len();
        self.output.push(Atom::Header { kind, until: 0 });
        self.jumps.push(position);
    }

    /// Finalizes the most recently reserved header with the current output length.
    pub(crate) fn pop_jump(&mut self) -> Result<(), EncodeError> {
        let position = self
            .jumps
            .pop()
            .expect("pop_jump called without a matching push_jump");
        let until = self.output.len();
        if until > isize::MAX as usize {
            return Err(EncodeError::JumpOverflow);
        }
        let Atom::Header { kind, .. } = self.output[position] else {
            unreachable!("push_jump always reserves a Header atom");
        };
        self.output[position] = Atom::Header { kind, until };
        Ok(())
    }

    pub(crate) fn emit_raw(&mut self, atom: Atom) {
        self.output.push(atom);
    }

    pub(crate) fn custom_codec(&self) -> Option<crate::Rc<dyn crate::options::CustomCodec>> {
        self.options.custom.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;

    #[test]
    fn scalars_atomize_without_registration() {
        let mut atomizer = Atomizer::new(AtomizerOptions::new());
        let atoms = atomizer.atomize(&value!(true)).unwrap();
        assert_eq!(atoms.len(), 1);
    }

    #[test]
    fn cyclic_array_encodes_with_default_builder() {
        let array = Value::array(vec![Value::Null]);
        if let Value::Array(rc) = &array {
            rc.borrow_mut()[0] = array.clone();
        }
        let mut atomizer = Atomizer::new(AtomizerOptions::new());
        let atoms = atomizer.atomize(&array).unwrap();
        assert!(matches!(atoms.last(), Some(Atom::BackRef(0))));
    }

    #[test]
    fn unallowed_self_reference_is_infinite_loop() {
        // A builder override that recurses into the same value without ever calling
        // `allow_self_reference` must fail instead of looping forever.
        let array = Value::array(vec![Value::Null]);
        if let Value::Array(rc) = &array {
            rc.borrow_mut()[0] = array.clone();
        }
        let options = AtomizerOptions::new().with_builder(
            crate::value::Kind::Array,
            crate::Rc::new(|value: &Value, writer: &mut crate::writer::Writer| {
                writer.push_jump(crate::atom::AtomKind::Array);
                let Value::Array(rc) = value else { unreachable!() };
                let elems = rc.borrow().clone();
                for elem in elems.iter() {
                    writer.write_child(elem)?;
                }
                writer.pop_jump()?;
                Ok(true)
            }),
        );
        let mut atomizer = Atomizer::new(options);
        let result = atomizer.atomize(&array);
        assert!(matches!(result, Err(EncodeError::InfiniteLoop)));
    }
}
