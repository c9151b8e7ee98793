//! `Object` — the tagged record every namespace node is bound to
//! (`spec.md` §3.3).
//!
//! Rust's enum payloads already give us the "type tag + payload variant"
//! pairing the original expresses as a C tag + union, so [`ObjectKind`]
//! carries its fields directly rather than through a secondary union.
//! `Arg`/`Local` sentinels are not represented as `Object`s at all: they are
//! never namespace-bound, so they live as plain `Data` cells on
//! [`crate::method::MethodFrame`] instead of carrying the "supertype" tag
//! the original uses to distinguish them from ordinary `Name` objects
//! (documented as an Open Question resolution in `DESIGN.md`).

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use aml_opcode::{FieldFlags, MethodFlags};

use crate::{
    data::Data,
    namespace::node::NamespaceNode,
    region::RegionSpace,
};

pub type ObjectRef = Rc<RefCell<Object>>;
pub type WeakNode = Weak<RefCell<NamespaceNode>>;

/// A method body is either bytecode owned by a loaded table, or a
/// host-registered native routine (`spec.md` §4.9 "Method",
/// `SPEC_FULL.md` §2 `_OSI`/`_OS`/`_REV`).
pub enum MethodBody {
    Bytecode { table: Rc<Vec<u8>>, start: usize, end: usize },
    Native(Rc<dyn Fn(&mut crate::state::State, &[Data]) -> crate::error::AmlResult<Data>>),
}

impl std::fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodBody::Bytecode { start, end, .. } => {
                f.debug_struct("Bytecode").field("start", start).field("end", end).finish()
            }
            MethodBody::Native(_) => f.write_str("Native(..)"),
        }
    }
}

#[derive(Debug)]
pub struct MethodObject {
    pub arg_count: u8,
    pub serialized: bool,
    pub sync_level: u8,
    pub body: MethodBody,
}

impl MethodObject {
    pub fn flags(&self) -> MethodFlags {
        MethodFlags((self.arg_count & 0x07) | ((self.serialized as u8) << 3) | ((self.sync_level & 0x0F) << 4))
    }
}

/// Bit offset/length/access description shared by every field kind
/// (`spec.md` §3.3 "Field objects").
#[derive(Debug, Clone)]
pub struct FieldElement {
    pub bit_offset: u64,
    pub bit_count: u64,
    pub flags: FieldFlags,
    pub access_attrib: u8,
    pub access_byte_len: u8,
    pub connection: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct FieldObject {
    pub element: FieldElement,
    pub region: ObjectRef,
}

#[derive(Debug)]
pub struct BankFieldObject {
    pub element: FieldElement,
    pub region: ObjectRef,
    pub bank: ObjectRef,
    pub bank_value: u64,
}

#[derive(Debug)]
pub struct IndexFieldObject {
    pub element: FieldElement,
    pub index: ObjectRef,
    pub data: ObjectRef,
}

#[derive(Debug)]
pub struct BufferFieldObject {
    pub bit_offset: u64,
    pub bit_count: u64,
    pub source: Data,
}

#[derive(Debug)]
pub struct OperationRegionObject {
    pub space: RegionSpace,
    pub offset: u64,
    pub length: u64,
    pub mapped_cookie: Cell<Option<u64>>,
}

#[derive(Debug, Default)]
pub struct DeviceObject {
    pub status_cache: Cell<Option<aml_opcode::DeviceStatus>>,
}

#[derive(Debug)]
pub struct MutexObject {
    pub sync_level: u8,
    pub handle: Cell<Option<u64>>,
}

#[derive(Debug, Default)]
pub struct EventObject {
    pub handle: Cell<Option<u64>>,
}

#[derive(Debug, Default)]
pub struct ProcessorObject {
    pub proc_id: u8,
    pub pblk_addr: u32,
    pub pblk_len: u8,
}

#[derive(Debug, Default)]
pub struct PowerResourceObject {
    pub system_level: u8,
    pub resource_order: u16,
}

/// The per-kind payload (`spec.md` §3.3 object type tag union).
#[derive(Debug)]
pub enum ObjectKind {
    Name(RefCell<Data>),
    Method(MethodObject),
    Device(DeviceObject),
    Mutex(MutexObject),
    Event(EventObject),
    OperationRegion(OperationRegionObject),
    Field(FieldObject),
    BankField(BankFieldObject),
    IndexField(IndexFieldObject),
    BufferField(BufferFieldObject),
    Alias(WeakNode),
    Scope,
    Processor(ProcessorObject),
    ThermalZone,
    PowerResource(PowerResourceObject),
    DataRegion(OperationRegionObject),
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Name(_) => "Name",
            ObjectKind::Method(_) => "Method",
            ObjectKind::Device(_) => "Device",
            ObjectKind::Mutex(_) => "Mutex",
            ObjectKind::Event(_) => "Event",
            ObjectKind::OperationRegion(_) => "OperationRegion",
            ObjectKind::Field(_) => "Field",
            ObjectKind::BankField(_) => "BankField",
            ObjectKind::IndexField(_) => "IndexField",
            ObjectKind::BufferField(_) => "BufferField",
            ObjectKind::Alias(_) => "Alias",
            ObjectKind::Scope => "Scope",
            ObjectKind::Processor(_) => "Processor",
            ObjectKind::ThermalZone => "ThermalZone",
            ObjectKind::PowerResource(_) => "PowerResource",
            ObjectKind::DataRegion(_) => "DataRegion",
        }
    }

    pub fn acpi_type(&self) -> crate::data::AcpiObjectType {
        use crate::data::AcpiObjectType as T;
        match self {
            ObjectKind::Name(data) => data.borrow().acpi_type(),
            ObjectKind::Method(_) => T::Method,
            ObjectKind::Device(_) => T::Device,
            ObjectKind::Mutex(_) => T::Mutex,
            ObjectKind::Event(_) => T::Event,
            ObjectKind::OperationRegion(_) | ObjectKind::DataRegion(_) => T::OperationRegion,
            ObjectKind::Field(_) | ObjectKind::BankField(_) | ObjectKind::IndexField(_) => {
                T::FieldUnit
            }
            ObjectKind::BufferField(_) => T::BufferField,
            ObjectKind::Alias(_) => T::Uninitialized,
            ObjectKind::Scope => T::Uninitialized,
            ObjectKind::Processor(_) => T::Processor,
            ObjectKind::ThermalZone => T::ThermalZone,
            ObjectKind::PowerResource(_) => T::PowerResource,
        }
    }

    /// Whether this kind is "scope-like" for `_REG` broadcast purposes
    /// (`spec.md` §4.13): has (or may have) namespace children.
    pub fn is_scope_like(&self) -> bool {
        matches!(
            self,
            ObjectKind::Scope
                | ObjectKind::Device(_)
                | ObjectKind::Processor(_)
                | ObjectKind::ThermalZone
                | ObjectKind::PowerResource(_)
        )
    }
}

/// `Object` (`spec.md` §3.3): a tagged record, reference-counted, linked to
/// at most one namespace node.
#[derive(Debug)]
pub struct Object {
    pub kind: ObjectKind,
    pub node: RefCell<Option<WeakNode>>,
    /// Bitmap of region-space types that have already had `_REG` broadcast
    /// to this object (`spec.md` §4.13).
    pub reg_broadcast_bitmap: Cell<u32>,
    pub is_initialized_device: Cell<bool>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> ObjectRef {
        Rc::new(RefCell::new(Object {
            kind,
            node: RefCell::new(None),
            reg_broadcast_bitmap: Cell::new(0),
            is_initialized_device: Cell::new(false),
        }))
    }

    pub fn has_broadcast(&self, space: RegionSpace) -> bool {
        let bit = space.broadcast_bit();
        bit.map(|b| self.reg_broadcast_bitmap.get() & (1 << b) != 0)
            .unwrap_or(false)
    }

    pub fn mark_broadcast(&self, space: RegionSpace) {
        if let Some(bit) = space.broadcast_bit() {
            self.reg_broadcast_bitmap
                .set(self.reg_broadcast_bitmap.get() | (1 << bit));
        }
    }
}
