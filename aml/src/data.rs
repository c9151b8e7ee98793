//! Primitive `Data` values (`spec.md` §3.2) and their lifecycle
//! (`spec.md` §4.2).
//!
//! Rust's `Rc`/`RefCell` already give us the reference counting and
//! interior mutability the original hand-rolls over a bump arena, so
//! `BufferRef`/`PackageRef`/`ObjectRef` are plain `Rc<RefCell<_>>` handles
//! rather than raw arena offsets. The "arena" in `spec.md` §2 item 1
//! reappears here as [`crate::arena::SnapshotStack`], a journal of which
//! handles were created/strengthened since a savepoint, used for rollback —
//! not a manual allocator, since Rust's own allocator already does that
//! part safely.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::object::ObjectRef;

/// The complete ACPI object-type integer table returned by the `ObjectType`
/// operator, per the original's `AmlDataToAcpiObjectType`
/// (`SPEC_FULL.md` §2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[repr(u8)]
pub enum AcpiObjectType {
    Uninitialized = 0,
    Integer = 1,
    String = 2,
    Buffer = 3,
    Package = 4,
    FieldUnit = 5,
    Device = 6,
    Event = 7,
    Method = 8,
    Mutex = 9,
    OperationRegion = 10,
    PowerResource = 11,
    Processor = 12,
    ThermalZone = 13,
    BufferField = 14,
    DdbHandle = 15,
    DebugObject = 16,
}

impl fmt::Display for AcpiObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Backing storage for `Data::String`/`Data::Buffer`. `data.len()` is the
/// logical capacity; `size <= data.len()` is the live content length
/// (`spec.md` §3.2 invariants).
#[derive(Debug, Clone, Default)]
pub struct BufferData {
    pub data: Vec<u8>,
    pub size: usize,
}

pub type BufferRef = Rc<RefCell<BufferData>>;

impl BufferData {
    pub fn new(size: usize, capacity: usize) -> Self {
        let capacity = capacity.max(size);
        BufferData {
            data: vec![0u8; capacity],
            size,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        BufferData { data: bytes, size }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// `spec.md` §4.2 "Resize": grow allocates + zero-fills the new tail;
    /// shrink only lowers `size`/capacity bookkeeping, no reallocation.
    pub fn resize(&mut self, new_size: usize) {
        if new_size > self.data.len() {
            self.data.resize(new_size, 0);
        } else if new_size < self.data.len() {
            self.data.truncate(new_size);
        }
        self.size = new_size;
    }
}

pub fn new_buffer_ref(data: BufferData) -> BufferRef {
    Rc::new(RefCell::new(data))
}

/// `Data::Package` backing storage: a fixed-size vector of element slots,
/// each independently mutable so `Index`/`Store` can target a single slot
/// without cloning the whole package.
#[derive(Debug, Default)]
pub struct PackageData {
    pub elements: Vec<RefCell<Data>>,
}

pub type PackageRef = Rc<RefCell<PackageData>>;

impl PackageData {
    pub fn with_len(len: usize) -> Self {
        PackageData {
            elements: (0..len).map(|_| RefCell::new(Data::None)).collect(),
        }
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

pub fn new_package_ref(data: PackageData) -> PackageRef {
    Rc::new(RefCell::new(data))
}

/// A by-index indirection into a package slot (`spec.md` §3.2). Resolves
/// through the package's *current* elements at each use, rather than
/// pointing at a fixed child, which is how `spec.md` §9 breaks the
/// package-element cycle.
#[derive(Debug, Clone)]
pub struct PackageElementHandle {
    pub package: PackageRef,
    pub index: u64,
}

impl PackageElementHandle {
    pub fn is_valid(&self) -> bool {
        (self.index as usize) < self.package.borrow().element_count()
    }
}

/// `Data` (`spec.md` §3.2): a tagged union of every value an AML operand
/// slot can hold.
#[derive(Debug, Clone, Default)]
pub enum Data {
    #[default]
    None,
    Integer(u64),
    String(BufferRef),
    Buffer(BufferRef),
    Package(PackageRef),
    Reference(ObjectRef),
    FieldUnit(ObjectRef),
    PackageElement(PackageElementHandle),
    Debug,
}

impl Data {
    pub fn acpi_type(&self) -> AcpiObjectType {
        match self {
            Data::None => AcpiObjectType::Uninitialized,
            Data::Integer(_) => AcpiObjectType::Integer,
            Data::String(_) => AcpiObjectType::String,
            Data::Buffer(_) => AcpiObjectType::Buffer,
            Data::Package(_) => AcpiObjectType::Package,
            Data::Reference(_) => AcpiObjectType::DdbHandle,
            Data::FieldUnit(_) => AcpiObjectType::FieldUnit,
            Data::PackageElement(_) => AcpiObjectType::Uninitialized,
            Data::Debug => AcpiObjectType::DebugObject,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Data::None)
    }

    /// `Data duplicate` (`spec.md` §4.2): a shallow copy that bumps
    /// reference counts of any owning payload. Buffers/strings/packages are
    /// *shared*, never deep-copied (`spec.md` §9) — `CopyObject`'s package
    /// deep-copy lives in `crate::convert::deep_copy_package` instead.
    pub fn duplicate(&self) -> Data {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_resize_grow_zero_fills_tail() {
        let mut b = BufferData::new(2, 2);
        b.data[0] = 0xAA;
        b.data[1] = 0xBB;
        b.resize(4);
        assert_eq!(b.data, vec![0xAA, 0xBB, 0, 0]);
        assert_eq!(b.size, 4);
    }

    #[test]
    fn buffer_resize_shrink_drops_tail() {
        let mut b = BufferData::new(4, 4);
        b.resize(1);
        assert_eq!(b.size, 1);
        assert_eq!(b.capacity(), 1);
    }

    #[test]
    fn package_element_validity_tracks_live_length() {
        let pkg = new_package_ref(PackageData::with_len(2));
        let handle = PackageElementHandle {
            package: pkg.clone(),
            index: 1,
        };
        assert!(handle.is_valid());
        let handle2 = PackageElementHandle {
            package: pkg,
            index: 5,
        };
        assert!(!handle2.is_valid());
    }
}
