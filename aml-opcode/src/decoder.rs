//! The bytecode cursor (`spec.md` §4.1).
//!
//! A `Decoder` wraps an immutable byte slice and a movable `[cursor, end)`
//! window. Every consume operation advances `cursor`; callers shrink `end`
//! temporarily (via [`Decoder::sub_window`]) to bound a nested `TermList` to
//! a `PkgLength`-derived extent, mirroring how the original tracks
//! `CurrentOffset`/`Length` directly on `AML_STATE`.

use crate::{
    error::DecodeError,
    name::{is_lead_name_char, is_name_char, NamePrefix, NameSeg, NameString},
    opcode::Opcode,
    pkglength::PkgLength,
};

/// The active integer width of an evaluation context, fixed from the table
/// revision byte at state creation (`spec.md` §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerWidth {
    Bits32,
    Bits64,
}

impl IntegerWidth {
    pub fn from_revision(revision: u8) -> Self {
        if revision == 1 {
            IntegerWidth::Bits32
        } else {
            IntegerWidth::Bits64
        }
    }

    pub fn mask(self) -> u64 {
        match self {
            IntegerWidth::Bits32 => u32::MAX as u64,
            IntegerWidth::Bits64 => u64::MAX,
        }
    }

    /// Sign-extend a masked value to the full 64-bit return width
    /// (`spec.md` §4.1 "Sign extension").
    pub fn sign_extend(self, value: u64) -> u64 {
        match self {
            IntegerWidth::Bits64 => value,
            IntegerWidth::Bits32 => {
                if value & 0x8000_0000 != 0 {
                    value | 0xFFFF_FFFF_0000_0000
                } else {
                    value
                }
            }
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            IntegerWidth::Bits32 => 32,
            IntegerWidth::Bits64 => 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    cursor: usize,
    end: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder {
            data,
            cursor: 0,
            end: data.len(),
        }
    }

    pub fn at(data: &'a [u8], cursor: usize, end: usize) -> Self {
        Decoder { data, cursor, end }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.cursor)
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.end
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    pub fn set_end(&mut self, end: usize) {
        self.end = end;
    }

    /// A sub-decoder over `[cursor, cursor + len)`, validated against the
    /// current window. Used to bound a nested term-list to a `PkgLength`.
    pub fn sub_window(&self, start: usize, len: usize) -> Result<Decoder<'a>, DecodeError> {
        let stop = start
            .checked_add(len)
            .ok_or(DecodeError::InvalidPkgLength)?;
        if stop > self.end || start > self.data.len() {
            return Err(DecodeError::WindowOutOfBounds(start, stop, self.data.len()));
        }
        Ok(Decoder {
            data: self.data,
            cursor: start,
            end: stop,
        })
    }

    fn is_window_valid(&self, offset: usize, length: usize) -> bool {
        let Some(stop) = offset.checked_add(length) else {
            return false;
        };
        stop <= self.end && offset <= self.data.len()
    }

    pub fn peek_byte(&self, lookahead: usize) -> Option<u8> {
        let offset = self.cursor.checked_add(lookahead)?;
        if !self.is_window_valid(offset, 1) {
            return None;
        }
        self.data.get(offset).copied()
    }

    pub fn consume_byte(&mut self) -> Result<u8, DecodeError> {
        let b = self
            .peek_byte(0)
            .ok_or(DecodeError::UnexpectedEnd(self.cursor))?;
        self.cursor += 1;
        Ok(b)
    }

    pub fn consume_byte_span(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if !self.is_window_valid(self.cursor, len) {
            return Err(DecodeError::WindowOutOfBounds(
                self.cursor,
                self.cursor + len,
                self.data.len(),
            ));
        }
        let span = &self.data[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(span)
    }

    pub fn match_byte(&mut self, expected: u8) -> bool {
        if self.peek_byte(0) == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn consume_word(&mut self) -> Result<u16, DecodeError> {
        let span = self.consume_byte_span(2)?;
        Ok(u16::from_le_bytes([span[0], span[1]]))
    }

    pub fn consume_dword(&mut self) -> Result<u32, DecodeError> {
        let span = self.consume_byte_span(4)?;
        Ok(u32::from_le_bytes([span[0], span[1], span[2], span[3]]))
    }

    pub fn consume_qword(&mut self) -> Result<u64, DecodeError> {
        let span = self.consume_byte_span(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(span);
        Ok(u64::from_le_bytes(buf))
    }

    /// Decode the opcode at the cursor without consuming it.
    pub fn peek_opcode(&self) -> Result<(Opcode, u8), DecodeError> {
        let first = self
            .peek_byte(0)
            .ok_or(DecodeError::UnexpectedEnd(self.cursor))?;
        if first == crate::consts::EXT_OP_PREFIX {
            let second = self.peek_byte(1);
            let op = Opcode::decode(first, second)
                .ok_or_else(|| DecodeError::InvalidExtendedOpcode(second.unwrap_or(0)))?;
            Ok((op, 2))
        } else {
            let op = Opcode::decode(first, None).ok_or(DecodeError::InvalidOpcode(first))?;
            Ok((op, 1))
        }
    }

    /// Decode and consume the opcode at the cursor.
    pub fn consume_opcode(&mut self) -> Result<Opcode, DecodeError> {
        let (op, len) = self.peek_opcode()?;
        self.cursor += len as usize;
        Ok(op)
    }

    /// `PkgLength` (`spec.md` §4.1 item "Package length (VLE)").
    pub fn consume_pkg_length(&mut self) -> Result<PkgLength, DecodeError> {
        let remaining = &self.data[self.cursor..self.end.min(self.data.len())];
        let pkg = PkgLength::decode(remaining).ok_or(DecodeError::InvalidPkgLength)?;
        self.cursor += pkg.encoded_bytes as usize;
        Ok(pkg)
    }

    /// `NameSeg`.
    pub fn consume_name_seg(&mut self) -> Result<NameSeg, DecodeError> {
        let span = self.consume_byte_span(4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(span);
        NameSeg::from_bytes(arr)
    }

    /// `NameString := <RootChar NamePath> | <PrefixPath NamePath>`.
    pub fn consume_name_string(&mut self) -> Result<NameString, DecodeError> {
        let mut prefix = NamePrefix::NONE;
        if self.match_byte(crate::consts::NAME_CHAR_ROOT_PREFIX) {
            prefix.is_root = true;
        } else {
            while self.match_byte(crate::consts::NAME_CHAR_PARENT_PREFIX) {
                prefix.parent_count += 1;
            }
        }
        let segments = self.consume_name_path()?;
        Ok(NameString { prefix, segments })
    }

    /// `NamePath := NameSeg | DualNamePath | MultiNamePath | NullName`.
    fn consume_name_path(&mut self) -> Result<alloc_free::SegVec, DecodeError> {
        if self.match_byte(crate::consts::NULL_NAME) {
            return Ok(alloc_free::SegVec::new());
        }
        if self.match_byte(crate::consts::DUAL_NAME_PREFIX) {
            let a = self.consume_name_seg()?;
            let b = self.consume_name_seg()?;
            let mut v = alloc_free::SegVec::new();
            v.push(a);
            v.push(b);
            return Ok(v);
        }
        if self.match_byte(crate::consts::MULTI_NAME_PREFIX) {
            let count = self.consume_byte()?;
            let mut v = alloc_free::SegVec::new();
            for _ in 0..count {
                v.push(self.consume_name_seg()?);
            }
            return Ok(v);
        }
        // Bare prefix (no NamePath at all) is legal: zero segments.
        match self.peek_byte(0) {
            Some(b) if is_lead_name_char(b) => {
                let mut v = alloc_free::SegVec::new();
                v.push(self.consume_name_seg()?);
                Ok(v)
            }
            _ => Ok(alloc_free::SegVec::new()),
        }
    }

    /// Validate raw interior bytes of a name segment already read as a span
    /// (used by callers that read 4 bytes manually, e.g. field names).
    pub fn validate_name_seg_bytes(bytes: &[u8; 4]) -> Result<(), DecodeError> {
        if !is_lead_name_char(bytes[0]) {
            return Err(DecodeError::InvalidNameChar(bytes[0]));
        }
        for &b in &bytes[1..] {
            if !is_name_char(b) {
                return Err(DecodeError::InvalidNameChar(b));
            }
        }
        Ok(())
    }

    /// Skip a `TermArg` without evaluating it, returning the end offset.
    /// Used by bank-field/method-argument decoding that only needs the span
    /// length, not the value (`spec.md` §4.1 "TermArg span skip").
    ///
    /// This performs a structural skip: computational data is fixed-size,
    /// strings/buffers/packages carry their own length, and any other
    /// expression opcode is assumed (conservatively) to consume the rest of
    /// the surrounding window unless it is one of the recognized
    /// fixed-shape leaves. Full generality requires mutual recursion with
    /// the evaluator's opcode table, so this handles exactly the leaf shapes
    /// `spec.md` requires skipping through (constants, simple names).
    pub fn skip_term_arg_span(&mut self) -> Result<(), DecodeError> {
        let (op, _) = self.peek_opcode()?;
        match op {
            Opcode::Zero | Opcode::One | Opcode::Ones | Opcode::RevisionOf => {
                self.consume_opcode()?;
            }
            Opcode::BytePrefix => {
                self.consume_opcode()?;
                self.consume_byte()?;
            }
            Opcode::WordPrefix => {
                self.consume_opcode()?;
                self.consume_word()?;
            }
            Opcode::DWordPrefix => {
                self.consume_opcode()?;
                self.consume_dword()?;
            }
            Opcode::QWordPrefix => {
                self.consume_opcode()?;
                self.consume_qword()?;
            }
            Opcode::StringPrefix => {
                self.consume_opcode()?;
                while self.consume_byte()? != 0 {}
            }
            Opcode::Local(_) | Opcode::Arg(_) => {
                self.consume_opcode()?;
            }
            _ => {
                // Names (NameString referencing a value) fall through here.
                self.consume_name_string()?;
            }
        }
        Ok(())
    }
}

/// Small helpers that avoid pulling in `alloc::vec::Vec` by name at every
/// call site above; `std` is available so this just re-exports `Vec`.
mod alloc_free {
    pub type SegVec = std::vec::Vec<crate::name::NameSeg>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_name_string() {
        let bytes = [b'\\', b'_', b'S', b'B', b'_', b'.', b'P', b'C', b'I', b'0'];
        let mut d = Decoder::new(&bytes);
        let name = d.consume_name_string().unwrap();
        assert!(name.prefix.is_root);
        assert_eq!(name.segments.len(), 2);
        assert_eq!(name.segments[0].as_str(), "_SB_");
        assert_eq!(name.segments[1].as_str(), "PCI0");
    }

    #[test]
    fn parent_prefix_and_null_name() {
        let bytes = [b'^', b'^', 0x00];
        let mut d = Decoder::new(&bytes);
        let name = d.consume_name_string().unwrap();
        assert_eq!(name.prefix.parent_count, 2);
        assert!(name.segments.is_empty());
    }

    #[test]
    fn window_bounds_enforced() {
        let bytes = [0x0A, 0x11];
        let mut d = Decoder::at(&bytes, 0, 1);
        assert_eq!(d.consume_byte().unwrap(), 0x0A);
        assert!(d.consume_byte().is_err());
    }
}
