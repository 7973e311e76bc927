//! Configuration for the atomizer and the rebuilder.
//!
//! Builder-style option structs, in the same vein as [`crate::atom::Scalar`]'s companion
//! [`crate::writer::Writer`] — construct with `::new()`, mutate with `with_*`.

use crate::error::{DecodeError, EncodeError};
use crate::value::{Kind, Value};
use crate::writer::Writer;
use crate::Rc;
use std::fmt::Debug;

/// A builder override: replaces the default encoding for one [`Kind`].
///
/// Returns the same cacheability hint a default builder would.
pub type BuilderFn = Rc<dyn Fn(&Value, &mut Writer) -> Result<bool, EncodeError>>;

/// Bridges a single user-defined encode/decode pair across the `Custom` wire atom
/// ([`crate::atom::AtomKind::Custom`]).
///
/// Exactly one `CustomCodec` is configured per atomizer/rebuilder pair: any kind's
/// builder override may delegate to [`CustomCodec::encode_custom`], framed in `PushJump(Custom)`/
/// `PopJump` by the caller (see `crate::builders::build_custom`), and the rebuilder always
/// dispatches a decoded `Custom` atom to [`CustomCodec::decode_custom`].
pub trait CustomCodec: Debug {
    /// Encodes `value`'s contents through `writer`. Returns whether the caller may cache and
    /// back-reference the result, a choice left to the user encoder.
    fn encode_custom(&self, value: &Value, writer: &mut Writer) -> Result<bool, EncodeError>;

    /// Reconstructs a value from a bounded reader, calling `read_next` as many times as the
    /// encoder emitted children.
    fn decode_custom(
        &self,
        read_next: &mut dyn FnMut() -> Result<Value, DecodeError>,
    ) -> Result<Value, DecodeError>;

    /// Called after every leaf scalar is decoded, letting a codec remap scalars it substituted
    /// during encoding (for example, a custom string builder that emits booleans in place of
    /// particular strings needs a matching decode-side intercept).
    fn intercept_scalar(&self, value: Value) -> Value {
        value
    }
}

/// Per-kind builder overrides plus atomizer-wide settings.
#[derive(Default)]
pub struct AtomizerOptions {
    pub(crate) overrides: [Option<BuilderFn>; 14],
    pub(crate) keep_unknowns_as_is: bool,
    pub(crate) dictionary: Vec<Value>,
    pub(crate) custom: Option<Rc<dyn CustomCodec>>,
}

fn kind_slot(kind: Kind) -> usize {
    match kind {
        Kind::Void => 0,
        Kind::Null => 1,
        Kind::Boolean => 2,
        Kind::Number => 3,
        Kind::String => 4,
        Kind::Bytes => 5,
        Kind::Array => 6,
        Kind::Object => 7,
        Kind::Map => 8,
        Kind::Set => 9,
        Kind::Function => 10,
        Kind::Symbol => 11,
        Kind::Instance => 12,
        Kind::Custom => 13,
    }
}

impl AtomizerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a builder override for `kind`, replacing the default behavior in
    /// `crate::builders`.
    pub fn with_builder(mut self, kind: Kind, builder: BuilderFn) -> Self {
        self.overrides[kind_slot(kind)] = Some(builder);
        self
    }

    /// If set, `custom`/`function`/`symbol`/`instance` values with no builder override and no
    /// configured [`CustomCodec`] degrade to a `Void` scalar on encode rather than failing with
    /// [`EncodeError::UnsupportedValue`]. Has no effect once a codec is configured, since the
    /// codec always gets first refusal.
    pub fn with_keep_unknowns_as_is(mut self, keep: bool) -> Self {
        self.keep_unknowns_as_is = keep;
        self
    }

    /// Seeds the reference table with a shared vocabulary known in advance to both sides.
    /// Occurrences of these values encode as `DictRef`s into this list and never appear in the
    /// output.
    pub fn with_dictionary(mut self, dictionary: Vec<Value>) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn with_custom_codec(mut self, codec: Rc<dyn CustomCodec>) -> Self {
        self.custom = Some(codec);
        self
    }

    pub(crate) fn override_for(&self, kind: Kind) -> Option<&BuilderFn> {
        self.overrides[kind_slot(kind)].as_ref()
    }
}

/// Settings for the rebuilder. Decode only ever needs a single custom codec, plus
/// the matching dictionary used at encode time (`dictionary[i]` must decode any back-reference to
/// atom-index `i` for `i < dictionary.len()`).
#[derive(Default)]
pub struct RebuilderOptions {
    pub(crate) custom: Option<Rc<dyn CustomCodec>>,
    pub(crate) dictionary: Vec<Value>,
}

impl RebuilderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom_codec(mut self, codec: Rc<dyn CustomCodec>) -> Self {
        self.custom = Some(codec);
        self
    }

    pub fn with_dictionary(mut self, dictionary: Vec<Value>) -> Self {
        self.dictionary = dictionary;
        self
    }
}
