//! `NameSeg` / `NamePrefix` / `NameString` grammar (`spec.md` §3.1).

use crate::error::DecodeError;

/// A 4-byte ASCII name segment, padded on the right with `_` when the
/// original segment was shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameSeg(pub [u8; 4]);

impl NameSeg {
    pub const ROOT: NameSeg = NameSeg(*b"____");

    /// Build a segment from raw bytes already padded to 4 bytes, validating
    /// the AML name-char grammar: the first byte must be `A-Z`, `_`, and
    /// digits are only legal from the second byte onward.
    pub fn from_bytes(bytes: [u8; 4]) -> Result<Self, DecodeError> {
        if !is_lead_name_char(bytes[0]) {
            return Err(DecodeError::InvalidNameChar(bytes[0]));
        }
        for &b in &bytes[1..] {
            if !is_name_char(b) {
                return Err(DecodeError::InvalidNameChar(b));
            }
        }
        Ok(NameSeg(bytes))
    }

    /// Build a segment from a short ASCII tag, right-padding with `_` up to
    /// 4 bytes (used by built-in names such as `_STA`, `_INI`, `_REG`).
    pub fn from_str(s: &str) -> Result<Self, DecodeError> {
        let bytes = s.as_bytes();
        if bytes.len() > 4 || bytes.is_empty() {
            return Err(DecodeError::InvalidNameSegLength(bytes.len()));
        }
        let mut out = [b'_'; 4];
        out[..bytes.len()].copy_from_slice(bytes);
        Self::from_bytes(out)
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl core::fmt::Display for NameSeg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const fn is_lead_name_char(b: u8) -> bool {
    b == b'_' || b.is_ascii_uppercase()
}

pub const fn is_name_char(b: u8) -> bool {
    is_lead_name_char(b) || b.is_ascii_digit()
}

/// The prefix portion of a `NameString`: zero or more `^` (parent) segments,
/// optionally preceded by a single `\` (root) marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamePrefix {
    pub is_root: bool,
    pub parent_count: u8,
}

impl NamePrefix {
    pub const NONE: NamePrefix = NamePrefix {
        is_root: false,
        parent_count: 0,
    };
}

/// A fully parsed `NameString`: a prefix plus zero or more name segments.
///
/// Per `spec.md` §3.1, a bare prefix with zero segments is a legal reference
/// to the root or an ancestor scope; an entirely empty name (no prefix, no
/// segments) is the null name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameString {
    pub prefix: NamePrefix,
    pub segments: Vec<NameSeg>,
}

impl NameString {
    pub fn is_null(&self) -> bool {
        !self.prefix.is_root && self.prefix.parent_count == 0 && self.segments.is_empty()
    }

    /// Render the canonical ACPI textual form, e.g. `\_SB.PCI0._STA`.
    pub fn to_display_string(&self) -> String {
        let mut s = String::new();
        if self.prefix.is_root {
            s.push('\\');
        }
        for _ in 0..self.prefix.parent_count {
            s.push('^');
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 || self.prefix.is_root {
                if i > 0 {
                    s.push('.');
                }
            }
            s.push_str(seg.as_str());
        }
        s
    }
}

impl core::fmt::Display for NameString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_display_string())
    }
}
