//! Decoder-level errors. Folded into `aml::error::AmlError::Decoder` by the
//! evaluator crate; kept standalone here as a leaf enum independent of
//! the evaluator's own error type.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("unexpected end of bytecode at offset {0:#x}")]
    UnexpectedEnd(usize),
    #[error("cursor window [{0:#x}, {1:#x}) is out of bounds for a {2}-byte buffer")]
    WindowOutOfBounds(usize, usize, usize),
    #[error("byte {0:#04x} is not a valid opcode lead")]
    InvalidOpcode(u8),
    #[error("extended opcode 0x5B{0:02x} is not recognized")]
    InvalidExtendedOpcode(u8),
    #[error("name character {0:#04x} is not a valid AML name character")]
    InvalidNameChar(u8),
    #[error("name segment length {0} is invalid (must be 1..=4)")]
    InvalidNameSegLength(usize),
    #[error("malformed package length")]
    InvalidPkgLength,
    #[error("multi-name prefix segment count {0} would read past the window")]
    NameSegCountOverflow(u8),
}
