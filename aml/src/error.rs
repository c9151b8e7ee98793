//! Unified interpreter error type (`spec.md` §7).
//!
//! Every evaluator entry point returns [`AmlResult`]. Failures propagate up
//! to the enclosing method frame, which rolls its state snapshot back
//! (`spec.md` §4.11 step 5) before re-raising.

use aml_opcode::DecodeError;
use thiserror::Error;

use crate::data::AcpiObjectType;

pub type AmlResult<T> = Result<T, AmlError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AmlError {
    #[error("decode error: {0}")]
    Decoder(#[from] DecodeError),

    #[error("name '{0}' already exists in the namespace")]
    NameCollision(String),
    #[error("name '{0}' could not be resolved")]
    NameNotFound(String),
    #[error("relative lookup of '{0}' crossed a scope boundary")]
    ScopeBoundaryCrossed(String),
    #[error("'{0}' does not name a scope-like object")]
    NotAScope(String),

    #[error("operand of type {0:?} is not valid for this operation")]
    WrongType(AcpiObjectType),
    #[error("conversion from {from:?} to {to:?} is not possible")]
    ConversionImpossible {
        from: AcpiObjectType,
        to: AcpiObjectType,
    },
    #[error("empty string or buffer cannot be converted to an integer")]
    EmptyConversionSource,

    #[error("index {index} is out of bounds (len {len})")]
    IndexOutOfBounds { index: u64, len: u64 },
    #[error("field bit offset {bit_offset} + width {bit_count} overflows the backing store")]
    FieldBitOverflow { bit_offset: u64, bit_count: u64 },

    #[error("division by zero")]
    DivideByZero,
    #[error("modulo by zero")]
    ModuloByZero,

    #[error("host callback failed: {0}")]
    Host(String),

    #[error("Fatal opcode executed: type={fatal_type:#x} code={code:#x} arg={arg:#x}")]
    Fatal {
        fatal_type: u8,
        code: u32,
        arg: u64,
    },

    #[error("Break or Continue used outside of an enclosing loop")]
    InterruptionMisuse,

    #[error("no enclosing method scope for Return")]
    ReturnOutsideMethod,

    #[error("maximum loop iteration watchdog exceeded")]
    LoopWatchdogExceeded,

    #[error("attempted to store a package as its own element")]
    SelfReferentialPackage,

    #[error("mutex '{0}' acquire timed out")]
    MutexTimeout(String),

    #[error("invalid ACPI table header: {0}")]
    InvalidTableHeader(String),
}

impl AmlError {
    pub fn host(msg: impl Into<String>) -> Self {
        AmlError::Host(msg.into())
    }
}
