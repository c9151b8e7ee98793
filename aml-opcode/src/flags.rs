//! `MethodFlags`, `FieldFlags` and the small enums they pack
//! (`spec.md` §4.9).

use bitflags::bitflags;

/// `MethodFlags := ByteData // bit 0-2: ArgCount, bit 3: SerializeFlag,
/// bit 4-7: SyncLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodFlags(pub u8);

impl MethodFlags {
    pub fn arg_count(self) -> u8 {
        self.0 & 0x07
    }

    pub fn is_serialized(self) -> bool {
        (self.0 & 0x08) != 0
    }

    pub fn sync_level(self) -> u8 {
        (self.0 >> 4) & 0x0F
    }
}

/// `AccessType` nibble shared by `FieldFlags` and the field-list `AccessField`
/// element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[repr(u8)]
pub enum AccessType {
    Any = 0,
    Byte = 1,
    Word = 2,
    DWord = 3,
    QWord = 4,
    Buffer = 5,
}

impl AccessType {
    /// `Any` behaves as `Byte` once an access width must actually be chosen
    /// (`spec.md` §4.5.2).
    pub fn access_bit_width(self) -> u32 {
        match self {
            AccessType::Any | AccessType::Byte => 8,
            AccessType::Word => 16,
            AccessType::DWord => 32,
            AccessType::QWord => 64,
            AccessType::Buffer => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[repr(u8)]
pub enum LockRule {
    NoLock = 0,
    Lock = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[repr(u8)]
pub enum UpdateRule {
    Preserve = 0,
    WriteAsOnes = 1,
    WriteAsZeros = 2,
}

/// `FieldFlags := ByteData // bits 0-3 AccessType, bit 4 LockRule, bits 5-6
/// UpdateRule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFlags(pub u8);

impl FieldFlags {
    pub fn access_type(self) -> AccessType {
        AccessType::from_repr(self.0 & 0x0F).unwrap_or(AccessType::Any)
    }

    pub fn lock_rule(self) -> LockRule {
        if self.0 & 0x10 != 0 {
            LockRule::Lock
        } else {
            LockRule::NoLock
        }
    }

    pub fn update_rule(self) -> UpdateRule {
        UpdateRule::from_repr((self.0 >> 5) & 0x03).unwrap_or(UpdateRule::Preserve)
    }

    /// `AllowTruncation` is not a real AML bit; some field-unit write paths
    /// (`spec.md` §4.5.2) opt into lenient truncation instead of following
    /// the update rule. Exposed as a flag callers set explicitly, not parsed
    /// from the wire byte.
    pub const EXTENDED_ACCESS_RESERVED_BITS: u8 = 0x80;
}

bitflags! {
    /// Internal evaluator state, not an AML wire encoding: per-namespace-node
    /// scope bookkeeping (`spec.md` §3.4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScopeFlags: u8 {
        const TEMPORARY = 0b0000_0001;
        const BOUNDARY  = 0b0000_0010;
    }
}

bitflags! {
    /// `_STA` device status bits (`spec.md` §4.13, expanded per
    /// `SPEC_FULL.md` §2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceStatus: u32 {
        const PRESENT     = 0b0000_0001;
        const ENABLED     = 0b0000_0010;
        const SHOWN       = 0b0000_0100;
        const FUNCTIONING = 0b0000_1000;
        const BATTERY     = 0b0001_0000;
    }
}

impl Default for DeviceStatus {
    fn default() -> Self {
        DeviceStatus::PRESENT
            | DeviceStatus::ENABLED
            | DeviceStatus::SHOWN
            | DeviceStatus::FUNCTIONING
    }
}

/// Field-list internal element tags (`spec.md` §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldListElementTag {
    Reserved,
    Access,
    Connect,
    ExtendedAccess,
    Named,
}
