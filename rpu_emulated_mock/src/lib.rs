// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Emulated register windows and processor backing for driver tests.
//!
//! The emulated windows keep a full log of writes so tests can assert on
//! the exact register traffic a sequence produced, and support seeding
//! register state without polluting that log.

#![forbid(unsafe_code)]

use parking_lot::Mutex;
use rpu_platform::ProcessorBacking;
use rpu_platform::RegisterIo;
use rpu_platform::WindowId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

#[derive(Default)]
struct RegisterStore {
    regs: HashMap<usize, u32>,
    writes: Vec<(usize, u32)>,
}

/// One emulated 32-bit register window. Cheaply cloneable; clones share
/// the same backing store.
#[derive(Clone, Default)]
pub struct EmulatedRegisters {
    store: Arc<Mutex<RegisterStore>>,
}

impl EmulatedRegisters {
    /// Creates a window with all registers reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a register value without recording a write, for establishing
    /// pre-test hardware state.
    pub fn seed(&self, offset: usize, value: u32) {
        self.store.lock().regs.insert(offset, value);
    }

    /// The current value of the register at `offset`.
    pub fn value(&self, offset: usize) -> u32 {
        self.store.lock().regs.get(&offset).copied().unwrap_or(0)
    }

    /// Every value written to `offset`, in order.
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.store
            .lock()
            .writes
            .iter()
            .filter(|&&(o, _)| o == offset)
            .map(|&(_, v)| v)
            .collect()
    }

    /// The full write log, in order.
    pub fn write_log(&self) -> Vec<(usize, u32)> {
        self.store.lock().writes.clone()
    }

    /// Discards the write log, keeping register values.
    pub fn clear_write_log(&self) {
        self.store.lock().writes.clear();
    }
}

impl RegisterIo for EmulatedRegisters {
    fn read_u32(&self, offset: usize) -> u32 {
        self.value(offset)
    }

    fn write_u32(&self, offset: usize, value: u32) {
        let mut store = self.store.lock();
        store.regs.insert(offset, value);
        store.writes.push((offset, value));
    }
}

struct ProcessorInner {
    rpu: EmulatedRegisters,
    crl_apb: EmulatedRegisters,
    ipi: EmulatedRegisters,
    flushes: AtomicUsize,
    id: String,
}

/// An emulated processor backing: three register windows plus a data
/// cache flush counter. Cheaply cloneable; clones share all state, so a
/// test can keep a handle for assertions after handing one to the driver.
#[derive(Clone)]
pub struct EmulatedProcessor {
    inner: Arc<ProcessorInner>,
}

impl EmulatedProcessor {
    /// Creates a backing whose registers all read zero.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ProcessorInner {
                rpu: EmulatedRegisters::new(),
                crl_apb: EmulatedRegisters::new(),
                ipi: EmulatedRegisters::new(),
                flushes: AtomicUsize::new(0),
                id: id.into(),
            }),
        }
    }

    /// A shared handle to one of the windows.
    pub fn window(&self, window: WindowId) -> EmulatedRegisters {
        match window {
            WindowId::RpuControl => self.inner.rpu.clone(),
            WindowId::CrlApb => self.inner.crl_apb.clone(),
            WindowId::Ipi => self.inner.ipi.clone(),
        }
    }

    /// How many global data-cache flushes the driver issued.
    pub fn flush_count(&self) -> usize {
        self.inner.flushes.load(Ordering::SeqCst)
    }
}

impl ProcessorBacking for EmulatedProcessor {
    type Registers = EmulatedRegisters;

    fn map_window(&self, window: WindowId) -> anyhow::Result<Self::Registers> {
        Ok(self.window(window))
    }

    fn flush_data_cache(&self) {
        self.inner.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn id(&self) -> &str {
        &self.inner.id
    }
}
