//! Operation-region address spaces and the host-handler dispatch table
//! (`spec.md` §4.5.1).

use std::rc::Rc;

use crate::{error::AmlResult, state::State};

/// `RegionSpace` (`spec.md` §3.3 "operation regions", §4.5.1).
///
/// The first 10 values are exactly the ACPI-defined generic address space
/// IDs; values `0x80..=0xFF` are host-defined ("OEM-defined") spaces per
/// the ACPI spec, represented here as `Oem(u8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionSpace {
    SystemMemory,
    SystemIo,
    PciConfig,
    EmbeddedControl,
    SmBus,
    SystemCmos,
    PciBarTarget,
    Ipmi,
    GeneralPurposeIo,
    GenericSerialBus,
    Pcc,
    Oem(u8),
}

impl RegionSpace {
    pub fn from_byte(b: u8) -> RegionSpace {
        match b {
            0x00 => RegionSpace::SystemMemory,
            0x01 => RegionSpace::SystemIo,
            0x02 => RegionSpace::PciConfig,
            0x03 => RegionSpace::EmbeddedControl,
            0x04 => RegionSpace::SmBus,
            0x05 => RegionSpace::SystemCmos,
            0x06 => RegionSpace::PciBarTarget,
            0x07 => RegionSpace::Ipmi,
            0x08 => RegionSpace::GeneralPurposeIo,
            0x09 => RegionSpace::GenericSerialBus,
            0x0A => RegionSpace::Pcc,
            other => RegionSpace::Oem(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            RegionSpace::SystemMemory => 0x00,
            RegionSpace::SystemIo => 0x01,
            RegionSpace::PciConfig => 0x02,
            RegionSpace::EmbeddedControl => 0x03,
            RegionSpace::SmBus => 0x04,
            RegionSpace::SystemCmos => 0x05,
            RegionSpace::PciBarTarget => 0x06,
            RegionSpace::Ipmi => 0x07,
            RegionSpace::GeneralPurposeIo => 0x08,
            RegionSpace::GenericSerialBus => 0x09,
            RegionSpace::Pcc => 0x0A,
            RegionSpace::Oem(b) => b,
        }
    }

    /// `_REG` broadcasts are elided for the three always-available spaces
    /// (`spec.md` §4.13).
    pub fn reg_broadcast_elided(self) -> bool {
        matches!(
            self,
            RegionSpace::SystemMemory | RegionSpace::SystemIo | RegionSpace::PciConfig
        )
    }

    /// Bit index into `Object::reg_broadcast_bitmap`. `None` for spaces that
    /// never get a bit (the elided ones never need tracking).
    pub fn broadcast_bit(self) -> Option<u32> {
        if self.reg_broadcast_elided() {
            None
        } else {
            Some(self.to_byte() as u32)
        }
    }

    /// Whether this space's I/O is whole-packet (status+length+payload in
    /// one call) rather than chunked access-width words (`spec.md` §4.5.1
    /// "BufferAcc").
    pub fn is_buffer_acc_space(self) -> bool {
        matches!(
            self,
            RegionSpace::SmBus | RegionSpace::Ipmi | RegionSpace::GenericSerialBus
        )
    }
}

/// Access type/attribute passed through to the host handler
/// (`spec.md` §4.5.1).
#[derive(Debug, Clone, Copy)]
pub struct RegionAccess {
    pub access_type: aml_opcode::AccessType,
    pub access_attrib: u8,
    pub bit_width: u32,
}

/// A host-registered region handler: routine plus opaque user context
/// (`spec.md` §4.5.1).
pub type RegionHandlerFn = Rc<
    dyn Fn(
        &mut State,
        RegionOp<'_>,
    ) -> AmlResult<()>,
>;

/// The operation passed to a region handler: either a read (caller supplies
/// an output buffer to fill) or a write (caller supplies the bytes to
/// commit). `BufferAcc` spaces receive the full packet in one call
/// (`spec.md` §4.5.1).
pub enum RegionOp<'a> {
    Read {
        region: &'a crate::object::OperationRegionObject,
        field: Option<&'a crate::object::FieldElement>,
        byte_offset: u64,
        access: RegionAccess,
        out: &'a mut [u8],
    },
    Write {
        region: &'a crate::object::OperationRegionObject,
        field: Option<&'a crate::object::FieldElement>,
        byte_offset: u64,
        access: RegionAccess,
        input: &'a [u8],
    },
}

#[derive(Default)]
pub struct RegionHandlerSlot {
    pub routine: Option<RegionHandlerFn>,
    pub enabled: bool,
    pub broadcast_pending: bool,
}

/// The state's 256-slot region-handler table (`spec.md` §4.5.1, one entry
/// per possible `RegionSpace` byte value).
pub struct RegionHandlerTable {
    slots: Vec<RegionHandlerSlot>,
}

impl RegionHandlerTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(256);
        slots.resize_with(256, RegionHandlerSlot::default);
        RegionHandlerTable { slots }
    }

    pub fn register(&mut self, space: RegionSpace, routine: RegionHandlerFn) {
        let slot = &mut self.slots[space.to_byte() as usize];
        slot.routine = Some(routine);
        slot.enabled = true;
        slot.broadcast_pending = !space.reg_broadcast_elided();
    }

    pub fn unregister(&mut self, space: RegionSpace) {
        let slot = &mut self.slots[space.to_byte() as usize];
        slot.routine = None;
        slot.enabled = false;
    }

    pub fn get(&self, space: RegionSpace) -> Option<&RegionHandlerSlot> {
        self.slots.get(space.to_byte() as usize)
    }

    pub fn take_broadcast_pending(&mut self, space: RegionSpace) -> bool {
        let slot = &mut self.slots[space.to_byte() as usize];
        let pending = slot.broadcast_pending;
        slot.broadcast_pending = false;
        pending
    }
}

impl Default for RegionHandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-default handlers for `SystemIO`/`SystemMemory`/`PciConfig` dispatch
/// through [`crate::host::Host`] directly rather than the table
/// (`spec.md` §4.5.1 "Built-in defaults"); other spaces must be registered
/// by the embedder or every field access fails with
/// [`crate::error::AmlError::Host`].
pub fn read_with_builtin_default(
    state: &mut State,
    space: RegionSpace,
    region: &crate::object::OperationRegionObject,
    field: Option<&crate::object::FieldElement>,
    byte_offset: u64,
    access: RegionAccess,
    out: &mut [u8],
) -> AmlResult<()> {
    match space {
        RegionSpace::SystemMemory => {
            let addr = region.offset + byte_offset;
            state.host_mut().mmio_read(addr, access.bit_width, out)
        }
        RegionSpace::SystemIo => {
            let port = (region.offset + byte_offset) as u16;
            state.host_mut().pio_read(port, access.bit_width, out)
        }
        RegionSpace::PciConfig => state.host_mut().pci_config_read(
            region.offset,
            byte_offset as u16,
            access.bit_width,
            out,
        ),
        other => {
            let slot = state
                .regions
                .get(other)
                .and_then(|s| s.routine.clone())
                .ok_or_else(|| {
                    crate::error::AmlError::host(format!(
                        "no region handler registered for space {other:?}"
                    ))
                })?;
            slot(
                state,
                RegionOp::Read {
                    region,
                    field,
                    byte_offset,
                    access,
                    out,
                },
            )
        }
    }
}

pub fn write_with_builtin_default(
    state: &mut State,
    space: RegionSpace,
    region: &crate::object::OperationRegionObject,
    field: Option<&crate::object::FieldElement>,
    byte_offset: u64,
    access: RegionAccess,
    input: &[u8],
) -> AmlResult<()> {
    match space {
        RegionSpace::SystemMemory => {
            let addr = region.offset + byte_offset;
            state.host_mut().mmio_write(addr, access.bit_width, input)
        }
        RegionSpace::SystemIo => {
            let port = (region.offset + byte_offset) as u16;
            state.host_mut().pio_write(port, access.bit_width, input)
        }
        RegionSpace::PciConfig => state.host_mut().pci_config_write(
            region.offset,
            byte_offset as u16,
            access.bit_width,
            input,
        ),
        other => {
            let slot = state
                .regions
                .get(other)
                .and_then(|s| s.routine.clone())
                .ok_or_else(|| {
                    crate::error::AmlError::host(format!(
                        "no region handler registered for space {other:?}"
                    ))
                })?;
            slot(
                state,
                RegionOp::Write {
                    region,
                    field,
                    byte_offset,
                    access,
                    input,
                },
            )
        }
    }
}
