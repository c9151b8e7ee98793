//! An interpreter for ACPI Machine Language (AML): a namespace, an object
//! model and a two-pass evaluator built on top of [`aml_opcode`]'s wire
//! format.
//!
//! `aml_opcode` only decodes bytes; this crate gives them meaning. A
//! [`state::State`] owns the namespace, the
//! running tables and the snapshot stack; a [`host::Host`] implementation
//! supplies everything platform-specific (memory-mapped I/O, mutexes,
//! events, table lookup).
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod arena;
pub mod bcd;
pub mod bits;
pub mod builtins;
pub mod convert;
pub mod data;
pub mod default_host;
pub mod device;
pub mod error;
pub mod eval;
pub mod field_io;
pub mod host;
pub mod method;
pub mod namespace;
pub mod object;
pub mod region;
pub mod state;

pub use data::{AcpiObjectType, Data};
pub use default_host::DefaultHost;
pub use error::{AmlError, AmlResult};
pub use host::{FoundTable, Host};
pub use state::{InterpreterConfig, InterruptionEvent, State};
