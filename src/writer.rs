//! The handle a builder uses to emit cells.
//!
//! A builder never touches `Atomizer` fields directly; it only ever holds a `&mut Writer`, which
//! is a thin, short-lived view over the atomizer passed down for the duration of one builder call
//! (see `crate::builders::build`).

use crate::atom::{Atom, AtomKind, Scalar};
use crate::atomizer::Atomizer;
use crate::error::EncodeError;
use crate::options::CustomCodec;
use crate::value::Value;
use crate::Rc;

pub struct Writer<'a> {
    atomizer: &'a mut Atomizer,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(atomizer: &'a mut Atomizer) -> Self {
        Self { atomizer }
    }

    /// Appends one cell to the atom stream as-is, with no bookkeeping.
    pub fn emit_raw(&mut self, atom: Atom) {
        self.atomizer.emit_raw(atom);
    }

    /// Emits a scalar through the `AsIs` convention: an integer is always preceded by an
    /// `AsIsMarker` cell so the rebuilder knows not to treat it as a tag byte of its own; other
    /// scalars are inline values and need no marker.
    pub fn emit_as_is(&mut self, scalar: Scalar) {
        match scalar {
            Scalar::Int(_) => {
                self.atomizer.emit_raw(Atom::AsIsMarker);
                self.atomizer.emit_raw(Atom::Scalar(scalar));
            }
            other => self.atomizer.emit_raw(Atom::Scalar(other)),
        }
    }

    /// Reserves a composite header of kind `kind`. Must be matched by exactly one [`Self::pop_jump`]
    /// once this composite's bounded child-run has been fully written.
    pub fn push_jump(&mut self, kind: AtomKind) {
        self.atomizer.push_jump(kind);
    }

    /// Finalizes the most recently reserved header with the current stream position.
    pub fn pop_jump(&mut self) -> Result<(), EncodeError> {
        self.atomizer.pop_jump()
    }

    /// Lets the value currently being built be referenced by its own descendants. Must be called
    /// before any child that might point back at this value is written, or that child's write
    /// fails with [`EncodeError::InfiniteLoop`].
    pub fn allow_self_reference(&mut self) {
        self.atomizer.allow_self_reference();
    }

    /// Recursively atomizes `value` as a child of the value currently being built.
    pub fn write_child(&mut self, value: &Value) -> Result<(), EncodeError> {
        self.atomizer.atomize_value(value)
    }

    /// The atomizer-wide custom codec, if one was configured.
    pub(crate) fn custom_codec(&self) -> Option<Rc<dyn CustomCodec>> {
        self.atomizer.custom_codec()
    }

    /// Whether unclassifiable values should degrade to `Void` instead of failing to encode.
    pub(crate) fn keep_unknowns_as_is(&self) -> bool {
        self.atomizer.options().keep_unknowns_as_is
    }
}
