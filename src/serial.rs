//! Packs an atom stream into bytes, and unpacks bytes back into an atom stream.
//!
//! Every composite's bounded first child-run (its "until" slice in `crate::atom::Atom::Header`)
//! is packed into its own length-prefixed sub-buffer. This lets the packer avoid in-place
//! length-patching: build the sub-buffer, then write its length once it's known. `Object`/`Map`
//! values, which are unbounded, are written directly after into the same outer buffer instead of
//! getting their own sub-buffer, and the unpacker knows to keep reading exactly as many values as
//! it decoded keys.

use crate::atom::{Atom, AtomKind, Scalar};
use crate::error::{DecodeError, EncodeError};
use crate::value::BytesView;
use crate::Rc;

const TAG_VOID: u8 = 0x00;
const TAG_NULL: u8 = 0x01;
const TAG_FALSE: u8 = 0x02;
const TAG_TRUE: u8 = 0x03;
const TAG_NAN: u8 = 0x04;
const TAG_FLOAT64: u8 = 0x05;
const TAG_UINT8ARRAY: u8 = 0x06;
const TAG_ARRAYBUFFER: u8 = 0x07;
const TAG_INT8ARRAY: u8 = 0x08;
const TAG_UINT8CLAMPEDARRAY: u8 = 0x09;
const TAG_DATAVIEW: u8 = 0x0A;
const TAG_STRING: u8 = 0x0B;
const TAG_AS_IS: u8 = 0x0C;
const TAG_BACKREF: u8 = 0x0E;
const TAG_HEADER_ARRAY: u8 = 0x0F;
const TAG_HEADER_OBJECT: u8 = 0x10;
const TAG_HEADER_MAP: u8 = 0x11;
const TAG_HEADER_SET: u8 = 0x12;
const TAG_HEADER_CUSTOM: u8 = 0x13;
const TAG_DICTREF: u8 = 0x14;

fn header_tag(kind: AtomKind) -> u8 {
    match kind {
        AtomKind::Array => TAG_HEADER_ARRAY,
        AtomKind::Object => TAG_HEADER_OBJECT,
        AtomKind::Map => TAG_HEADER_MAP,
        AtomKind::Set => TAG_HEADER_SET,
        AtomKind::Custom => TAG_HEADER_CUSTOM,
        AtomKind::AsIs => unreachable!("AsIs never appears as a header kind"),
    }
}

fn bytes_tag(view: BytesView) -> u8 {
    match view {
        BytesView::Uint8Array => TAG_UINT8ARRAY,
        BytesView::ArrayBuffer => TAG_ARRAYBUFFER,
        BytesView::Int8Array => TAG_INT8ARRAY,
        BytesView::Uint8ClampedArray => TAG_UINT8CLAMPEDARRAY,
        BytesView::DataView => TAG_DATAVIEW,
    }
}

fn view_for_tag(tag: u8) -> Option<BytesView> {
    match tag {
        TAG_UINT8ARRAY => Some(BytesView::Uint8Array),
        TAG_ARRAYBUFFER => Some(BytesView::ArrayBuffer),
        TAG_INT8ARRAY => Some(BytesView::Int8Array),
        TAG_UINT8CLAMPEDARRAY => Some(BytesView::Uint8ClampedArray),
        TAG_DATAVIEW => Some(BytesView::DataView),
        _ => None,
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn zigzag_decode(z: u64) -> i64 {
    ((z >> 1) as i64) ^ -((z & 1) as i64)
}

/// Packs a complete atom stream (as produced by [`crate::atomizer::Atomizer::atomize`]) into
/// bytes.
pub fn serialize_atoms(atoms: &[Atom]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    let next = pack_one(atoms, 0, &mut out)?;
    debug_assert_eq!(next, atoms.len(), "serialize_atoms must consume the whole stream");
    Ok(out)
}

/// Packs the single value starting at `atoms[start]`, returning the index just past it.
fn pack_one(atoms: &[Atom], start: usize, out: &mut Vec<u8>) -> Result<usize, EncodeError> {
    match &atoms[start] {
        Atom::Scalar(scalar) => {
            pack_scalar(scalar, out);
            Ok(start + 1)
        }
        Atom::AsIsMarker => {
            let Atom::Scalar(Scalar::Int(n)) = &atoms[start + 1] else {
                return Err(EncodeError::ValueEncodedIntoNothing);
            };
            out.push(TAG_AS_IS);
            write_varint(out, zigzag_encode(*n));
            Ok(start + 2)
        }
        Atom::BackRef(index) => {
            out.push(TAG_BACKREF);
            write_varint(out, *index as u64);
            Ok(start + 1)
        }
        Atom::DictRef(index) => {
            out.push(TAG_DICTREF);
            write_varint(out, *index as u64);
            Ok(start + 1)
        }
        Atom::Header { kind, until } => pack_header(atoms, start, *kind, *until, out),
    }
}

/// Packs `count` consecutive values starting at `start`, returning the index just past the last.
fn pack_n(atoms: &[Atom], mut start: usize, count: usize, out: &mut Vec<u8>) -> Result<usize, EncodeError> {
    for _ in 0..count {
        start = pack_one(atoms, start, out)?;
    }
    Ok(start)
}

/// Packs every value from `start` up to (not including) `until`, returning the packed bytes and
/// how many top-level values were packed.
fn pack_until(atoms: &[Atom], mut start: usize, until: usize, out: &mut Vec<u8>) -> Result<usize, EncodeError> {
    let mut count = 0;
    while start < until {
        start = pack_one(atoms, start, out)?;
        count += 1;
    }
    Ok(count)
}

fn pack_header(
    atoms: &[Atom],
    start: usize,
    kind: AtomKind,
    until: usize,
    out: &mut Vec<u8>,
) -> Result<usize, EncodeError> {
    out.push(header_tag(kind));
    let mut inner = Vec::new();
    let count = pack_until(atoms, start + 1, until, &mut inner)?;
    if inner.len() > (u64::MAX >> 1) as usize {
        return Err(EncodeError::JumpOverflow);
    }
    write_varint(out, inner.len() as u64);
    out.extend_from_slice(&inner);
    match kind {
        AtomKind::Object | AtomKind::Map => pack_n(atoms, until, count, out),
        _ => Ok(until),
    }
}

fn pack_scalar(scalar: &Scalar, out: &mut Vec<u8>) {
    match scalar {
        Scalar::Void => out.push(TAG_VOID),
        Scalar::Null => out.push(TAG_NULL),
        Scalar::Bool(true) => out.push(TAG_TRUE),
        Scalar::Bool(false) => out.push(TAG_FALSE),
        Scalar::Int(n) => {
            // Builders always reach ints through `Writer::emit_as_is`, which wraps them in an
            // `AsIsMarker` first; this arm only fires for a bare `Atom::Scalar(Scalar::Int(_))`
            // constructed directly, and encodes the same tag an AsIsMarker pair would.
            out.push(TAG_AS_IS);
            write_varint(out, zigzag_encode(*n));
        }
        Scalar::Float(x) if x.is_nan() => out.push(TAG_NAN),
        Scalar::Float(x) => {
            out.push(TAG_FLOAT64);
            out.extend_from_slice(&x.to_bits().to_le_bytes());
        }
        Scalar::Str(s) => {
            out.push(TAG_STRING);
            let bytes = s.as_bytes();
            write_varint(out, bytes.len() as u64);
            out.extend_from_slice(bytes);
        }
        Scalar::Bytes { data, view } => {
            out.push(bytes_tag(*view));
            write_varint(out, data.len() as u64);
            out.extend_from_slice(data);
        }
    }
}

/// A cursor over an immutable byte slice, local to the unpacker below.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.bytes.get(self.pos).ok_or(DecodeError::IncompleteData)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::IncompleteData)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DecodeError::IncompleteData)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(DecodeError::BadTag);
            }
        }
    }
}

/// Unpacks a byte stream into an atom stream (the inverse of [`serialize_atoms`]).
pub fn deserialize_atoms(bytes: &[u8]) -> Result<Vec<Atom>, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let mut atoms = Vec::new();
    unpack_one(&mut cursor, &mut atoms)?;
    if cursor.remaining() != 0 {
        return Err(DecodeError::ExcessContent);
    }
    Ok(atoms)
}

/// Unpacks exactly one value from `cursor`, appending its atoms to `atoms`.
fn unpack_one(cursor: &mut Cursor, atoms: &mut Vec<Atom>) -> Result<(), DecodeError> {
    let tag = cursor.read_byte()?;
    match tag {
        TAG_VOID => atoms.push(Atom::Scalar(Scalar::Void)),
        TAG_NULL => atoms.push(Atom::Scalar(Scalar::Null)),
        TAG_TRUE => atoms.push(Atom::Scalar(Scalar::Bool(true))),
        TAG_FALSE => atoms.push(Atom::Scalar(Scalar::Bool(false))),
        TAG_NAN => atoms.push(Atom::Scalar(Scalar::Float(f64::NAN))),
        TAG_FLOAT64 => {
            let bits = cursor.read_bytes(8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bits);
            atoms.push(Atom::Scalar(Scalar::Float(f64::from_bits(u64::from_le_bytes(buf)))));
        }
        TAG_STRING => {
            let len = cursor.read_varint()? as usize;
            let raw = cursor.read_bytes(len)?;
            let s = std::str::from_utf8(raw).map_err(|_| DecodeError::BadTag)?;
            atoms.push(Atom::Scalar(Scalar::Str(Rc::from(s))));
        }
        TAG_AS_IS => {
            let n = zigzag_decode(cursor.read_varint()?);
            atoms.push(Atom::AsIsMarker);
            atoms.push(Atom::Scalar(Scalar::Int(n)));
        }
        TAG_BACKREF => {
            let index = cursor.read_varint()? as usize;
            atoms.push(Atom::BackRef(index));
        }
        TAG_DICTREF => {
            let index = cursor.read_varint()? as usize;
            atoms.push(Atom::DictRef(index));
        }
        TAG_HEADER_ARRAY | TAG_HEADER_OBJECT | TAG_HEADER_MAP | TAG_HEADER_SET | TAG_HEADER_CUSTOM => {
            unpack_header(cursor, atoms, tag)?;
        }
        tag if view_for_tag(tag).is_some() => {
            let view = view_for_tag(tag).unwrap();
            let len = cursor.read_varint()? as usize;
            let raw = cursor.read_bytes(len)?;
            atoms.push(Atom::Scalar(Scalar::Bytes {
                data: Rc::from(raw),
                view,
            }));
        }
        _ => return Err(DecodeError::BadTag),
    }
    Ok(())
}

fn unpack_header(cursor: &mut Cursor, atoms: &mut Vec<Atom>, tag: u8) -> Result<(), DecodeError> {
    let kind = match tag {
        TAG_HEADER_ARRAY => AtomKind::Array,
        TAG_HEADER_OBJECT => AtomKind::Object,
        TAG_HEADER_MAP => AtomKind::Map,
        TAG_HEADER_SET => AtomKind::Set,
        TAG_HEADER_CUSTOM => AtomKind::Custom,
        _ => unreachable!(),
    };
    let header_index = atoms.len();
    // placeholder; patched once `until` is known
    atoms.push(Atom::Header { kind, until: 0 });

    let inner_len = cursor.read_varint()? as usize;
    let inner_bytes = cursor.read_bytes(inner_len)?;
    let mut inner_cursor = Cursor::new(inner_bytes);
    let mut count = 0;
    while inner_cursor.remaining() > 0 {
        unpack_one(&mut inner_cursor, atoms)?;
        count += 1;
    }

    let until = atoms.len();
    atoms[header_index] = Atom::Header { kind, until };

    if matches!(kind, AtomKind::Object | AtomKind::Map) {
        for _ in 0..count {
            unpack_one(cursor, atoms)?;
        }
    }
    Ok(())
}
