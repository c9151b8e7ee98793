//! Wire-format primitives for ACPI Machine Language: the opcode table, the
//! `NameString` grammar, the variable-length `PkgLength` codec and the
//! bytecode cursor built on top of them.
//!
//! This crate has no notion of a namespace or an evaluator; it only knows
//! how to walk a byte slice and classify what it finds, leaving
//! instruction encoding cleanly separated from evaluation.

pub mod consts;
pub mod decoder;
pub mod error;
pub mod flags;
pub mod name;
pub mod opcode;
pub mod pkglength;

pub use decoder::{Decoder, IntegerWidth};
pub use error::DecodeError;
pub use flags::{
    AccessType, DeviceStatus, FieldFlags, FieldListElementTag, LockRule, MethodFlags, ScopeFlags,
    UpdateRule,
};
pub use name::{NamePrefix, NameSeg, NameString};
pub use opcode::Opcode;
pub use pkglength::PkgLength;
