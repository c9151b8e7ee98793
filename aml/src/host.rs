//! Host callback interface (`spec.md` §6).
//!
//! Everything the interpreter needs from its embedder is expressed as one
//! trait object, drawing a clean seam between the evaluator core and
//! whatever the host actually backs memory, mutexes and table lookup
//! with. `aml-cli` (out of `spec.md`'s scope per §1) supplies a concrete
//! implementation; `aml`'s own test suite supplies a `MockHost`.

use crate::error::AmlResult;

/// A found ACPI table, returned by [`Host::search_acpi_table`] for
/// `LoadTable` (`spec.md` §4.7 "LoadTable").
pub struct FoundTable {
    pub bytes: std::rc::Rc<Vec<u8>>,
}

/// `spec.md` §6 "Host callback interface". Every method takes `&mut self`;
/// the interpreter never holds a callback across a suspension point
/// because there is none (`spec.md` §5).
pub trait Host {
    fn memory_allocate(&mut self, size: usize) -> AmlResult<u64>;
    fn memory_free(&mut self, ptr: u64, size: usize) -> AmlResult<()>;

    /// `width` is in bytes, one of `{1, 2, 4}`.
    fn pio_read(&mut self, port: u16, width: u32, out: &mut [u8]) -> AmlResult<()>;
    fn pio_write(&mut self, port: u16, width: u32, input: &[u8]) -> AmlResult<()>;

    /// `width` is in bytes, one of `{1, 2, 4, 8}`. `addr` is either a
    /// physical address for an already-mapped region or a mapped cookie,
    /// per `spec.md` §4.5.1's region dispatch.
    fn mmio_read(&mut self, addr: u64, width: u32, out: &mut [u8]) -> AmlResult<()>;
    fn mmio_write(&mut self, addr: u64, width: u32, input: &[u8]) -> AmlResult<()>;

    fn memory_map(&mut self, phys: u64, len: u64) -> AmlResult<u64>;
    fn memory_unmap(&mut self, cookie: u64, len: u64) -> AmlResult<()>;

    /// `sbdf` packs segment/bus/device/function the way the original's PCI
    /// config handler does; `offset`/`width` address PCI 1.0 config space.
    fn pci_config_read(&mut self, sbdf: u64, offset: u16, width: u32, out: &mut [u8]) -> AmlResult<()>;
    fn pci_config_write(&mut self, sbdf: u64, offset: u16, width: u32, input: &[u8]) -> AmlResult<()>;

    /// Generic address-space I/O for spaces `aml::region` has no built-in
    /// handler for (SMBus/IPMI/GenericSerialBus/embedded-controller/etc.),
    /// used by [`crate::region::RegionHandlerTable`] entries the host
    /// registers itself; kept here too so a host that wants a single
    /// trait-object seam for every space can route through it uniformly.
    fn generic_region_read(
        &mut self,
        space: u8,
        offset: u64,
        width: u32,
        out: &mut [u8],
    ) -> AmlResult<()>;
    fn generic_region_write(
        &mut self,
        space: u8,
        offset: u64,
        width: u32,
        input: &[u8],
    ) -> AmlResult<()>;

    fn mutex_create(&mut self) -> AmlResult<u64>;
    fn mutex_destroy(&mut self, handle: u64) -> AmlResult<()>;
    /// Returns `true` on timeout (`spec.md` §4.7 "Acquire").
    fn mutex_acquire(&mut self, handle: u64, timeout_ms: u16) -> AmlResult<bool>;
    fn mutex_release(&mut self, handle: u64) -> AmlResult<()>;

    fn event_create(&mut self) -> AmlResult<u64>;
    fn event_destroy(&mut self, handle: u64) -> AmlResult<()>;
    fn event_signal(&mut self, handle: u64) -> AmlResult<()>;
    fn event_reset(&mut self, handle: u64) -> AmlResult<()>;
    /// Returns `true` on timeout (`spec.md` §4.7 "Wait").
    fn event_await(&mut self, handle: u64, timeout_ms: u16) -> AmlResult<bool>;

    /// 100ns ticks (`spec.md` §4.7 "Timer").
    fn monotonic_timer(&mut self) -> AmlResult<u64>;
    fn sleep(&mut self, ms: u64) -> AmlResult<()>;
    fn stall(&mut self, us: u64) -> AmlResult<()>;

    /// Delivers an AML `Notify` (`spec.md` §4.8 "Notify").
    fn object_notification(&mut self, object_path: &str, code: u64) -> AmlResult<()>;
    /// Post-`_INI` callback (`spec.md` §4.13 "_INI").
    fn on_device_initialized(&mut self, object_path: &str, sta: u32) -> AmlResult<()>;

    fn search_acpi_table(
        &mut self,
        signature: [u8; 4],
        oem_id: [u8; 6],
        oem_table_id: [u8; 8],
    ) -> AmlResult<Option<FoundTable>>;
}

/// The global-lock mutex is automatically acquired/released around every
/// field operation whose `lock_rule == Lock` (`spec.md` §4.5.6, §5).
/// Hosts that have no real firmware-shared global lock may back this with
/// an ordinary host mutex; `0xFFFF` as the timeout means "wait forever"
/// (`spec.md` §5 "Cancellation and timeouts").
pub const GLOBAL_LOCK_WAIT_FOREVER: u16 = 0xFFFF;
