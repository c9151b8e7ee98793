//! A [`Host`] good enough to drive the evaluator end to end in tests,
//! grounded in [`aml::DefaultHost`]'s own shape but with shared,
//! externally-inspectable logs so assertions can see what the interpreter
//! asked the host to do (mutex acquire/release pairs, region I/O).

use std::cell::RefCell;
use std::rc::Rc;

use aml::host::{FoundTable, Host};
use aml::AmlResult;

#[derive(Default)]
pub struct MockHostState {
    pub memory: Vec<u8>,
    pub io_ports: Vec<u8>,
    pub next_handle: u64,
    /// `(handle, acquired)` — `true` for acquire, `false` for release, in
    /// call order, across both mutexes and (reusing the same log) the
    /// global lock handle the state hands back directly.
    pub mutex_log: Vec<(u64, bool)>,
    pub tables: Vec<([u8; 4], [u8; 6], [u8; 8], Rc<Vec<u8>>)>,
}

pub struct MockHost {
    pub shared: Rc<RefCell<MockHostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost {
            shared: Rc::new(RefCell::new(MockHostState {
                memory: vec![0u8; 0x1000],
                io_ports: vec![0u8; 0x1000],
                next_handle: 1,
                mutex_log: Vec::new(),
                tables: Vec::new(),
            })),
        }
    }

    pub fn handle(&self) -> Rc<RefCell<MockHostState>> {
        self.shared.clone()
    }

    /// Register a table `search_acpi_table` can find by signature, used by
    /// the `LoadTable` scenario.
    pub fn register_table(&self, sig: [u8; 4], oem_id: [u8; 6], oem_table_id: [u8; 8], bytes: Vec<u8>) {
        self.shared
            .borrow_mut()
            .tables
            .push((sig, oem_id, oem_table_id, Rc::new(bytes)));
    }
}

impl Host for MockHost {
    fn memory_allocate(&mut self, _size: usize) -> AmlResult<u64> {
        Ok(0)
    }

    fn memory_free(&mut self, _ptr: u64, _size: usize) -> AmlResult<()> {
        Ok(())
    }

    fn pio_read(&mut self, port: u16, width: u32, out: &mut [u8]) -> AmlResult<()> {
        let n = (width as usize / 8).max(1);
        let shared = self.shared.borrow();
        out[..n].copy_from_slice(&shared.io_ports[port as usize..port as usize + n]);
        Ok(())
    }

    fn pio_write(&mut self, port: u16, width: u32, input: &[u8]) -> AmlResult<()> {
        let n = (width as usize / 8).max(1);
        let mut shared = self.shared.borrow_mut();
        shared.io_ports[port as usize..port as usize + n].copy_from_slice(&input[..n]);
        Ok(())
    }

    fn mmio_read(&mut self, addr: u64, width: u32, out: &mut [u8]) -> AmlResult<()> {
        let n = (width as usize / 8).max(1);
        let start = addr as usize;
        let shared = self.shared.borrow();
        out[..n].copy_from_slice(&shared.memory[start..start + n]);
        Ok(())
    }

    fn mmio_write(&mut self, addr: u64, width: u32, input: &[u8]) -> AmlResult<()> {
        let n = (width as usize / 8).max(1);
        let start = addr as usize;
        let mut shared = self.shared.borrow_mut();
        shared.memory[start..start + n].copy_from_slice(&input[..n]);
        Ok(())
    }

    fn memory_map(&mut self, phys: u64, _len: u64) -> AmlResult<u64> {
        Ok(phys)
    }

    fn memory_unmap(&mut self, _cookie: u64, _len: u64) -> AmlResult<()> {
        Ok(())
    }

    fn pci_config_read(&mut self, _sbdf: u64, _offset: u16, width: u32, out: &mut [u8]) -> AmlResult<()> {
        out[..(width as usize / 8).max(1)].fill(0xFF);
        Ok(())
    }

    fn pci_config_write(&mut self, _sbdf: u64, _offset: u16, _width: u32, _input: &[u8]) -> AmlResult<()> {
        Ok(())
    }

    fn generic_region_read(&mut self, _space: u8, _offset: u64, width: u32, out: &mut [u8]) -> AmlResult<()> {
        out[..(width as usize / 8).max(1)].fill(0);
        Ok(())
    }

    fn generic_region_write(&mut self, _space: u8, _offset: u64, _width: u32, _input: &[u8]) -> AmlResult<()> {
        Ok(())
    }

    fn mutex_create(&mut self) -> AmlResult<u64> {
        let mut shared = self.shared.borrow_mut();
        let h = shared.next_handle;
        shared.next_handle += 1;
        Ok(h)
    }

    fn mutex_destroy(&mut self, _handle: u64) -> AmlResult<()> {
        Ok(())
    }

    fn mutex_acquire(&mut self, handle: u64, _timeout_ms: u16) -> AmlResult<bool> {
        self.shared.borrow_mut().mutex_log.push((handle, true));
        Ok(false)
    }

    fn mutex_release(&mut self, handle: u64) -> AmlResult<()> {
        self.shared.borrow_mut().mutex_log.push((handle, false));
        Ok(())
    }

    fn event_create(&mut self) -> AmlResult<u64> {
        let mut shared = self.shared.borrow_mut();
        let h = shared.next_handle;
        shared.next_handle += 1;
        Ok(h)
    }

    fn event_destroy(&mut self, _handle: u64) -> AmlResult<()> {
        Ok(())
    }

    fn event_signal(&mut self, _handle: u64) -> AmlResult<()> {
        Ok(())
    }

    fn event_reset(&mut self, _handle: u64) -> AmlResult<()> {
        Ok(())
    }

    fn event_await(&mut self, _handle: u64, _timeout_ms: u16) -> AmlResult<bool> {
        Ok(false)
    }

    fn monotonic_timer(&mut self) -> AmlResult<u64> {
        Ok(0)
    }

    fn sleep(&mut self, _ms: u64) -> AmlResult<()> {
        Ok(())
    }

    fn stall(&mut self, _us: u64) -> AmlResult<()> {
        Ok(())
    }

    fn object_notification(&mut self, _object_path: &str, _code: u64) -> AmlResult<()> {
        Ok(())
    }

    fn on_device_initialized(&mut self, _object_path: &str, _sta: u32) -> AmlResult<()> {
        Ok(())
    }

    fn search_acpi_table(
        &mut self,
        signature: [u8; 4],
        oem_id: [u8; 6],
        oem_table_id: [u8; 8],
    ) -> AmlResult<Option<FoundTable>> {
        let shared = self.shared.borrow();
        let found = shared
            .tables
            .iter()
            .find(|(sig, oid, otid, _)| *sig == signature && *oid == oem_id && *otid == oem_table_id)
            .map(|(_, _, _, bytes)| FoundTable { bytes: bytes.clone() });
        Ok(found)
    }
}
