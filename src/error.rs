//! Errors raised while atomizing, serializing, rebuilding, or deserializing.

use std::fmt::{self, Display, Formatter};

/// Errors that occur while turning a [`Value`](crate::value::Value) into an atom stream or
/// packing an atom stream into bytes.
#[derive(Debug)]
pub enum EncodeError {
    /// The classifier yielded a kind with no builder, no `CustomCodec` was configured, and
    /// `keep_unknowns_as_is` was false.
    UnsupportedValue,
    /// A value back-referenced a currently-open ancestor that never called
    /// `allow_self_reference`.
    InfiniteLoop,
    /// A builder returned without appending a single cell.
    ValueEncodedIntoNothing,
    /// A composite's until-index could not be represented without losing bits.
    JumpOverflow,
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedValue => write!(f, "no builder is registered for this value's kind"),
            Self::InfiniteLoop => write!(
                f,
                "a value back-referenced an ancestor that is still open and did not allow self-reference"
            ),
            Self::ValueEncodedIntoNothing => {
                write!(f, "a builder emitted zero cells for a value")
            }
            Self::JumpOverflow => write!(f, "a composite's until-index is too large to encode"),
        }
    }
}

/// Errors that occur while consuming an atom stream or a byte stream to reconstruct a value.
#[derive(Debug)]
pub enum DecodeError {
    /// The cursor reached the end of the input mid-value.
    IncompleteData,
    /// The top-level value finished decoding but bytes remained.
    ExcessContent,
    /// A tag byte did not match any recognized atom or scalar sentinel.
    BadTag,
    /// A back-reference pointed at an atom-index that has not been produced yet.
    DanglingBackref,
    /// A custom atom was encountered but no custom codec was configured.
    MissingCustomCodec,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteData => write!(f, "the input ended in the middle of a value"),
            Self::ExcessContent => write!(f, "bytes remained after the top-level value decoded"),
            Self::BadTag => write!(f, "an unrecognized tag byte was encountered"),
            Self::DanglingBackref => write!(f, "a back-reference pointed at an unknown atom-index"),
            Self::MissingCustomCodec => {
                write!(f, "a custom atom was encountered with no custom codec configured")
            }
        }
    }
}
