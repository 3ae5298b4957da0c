// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Platform seams for the RPU remote-processor control driver.
//!
//! The driver in `rpu_driver` is generic over the traits defined here so
//! that it can run against real memory-mapped windows in production and
//! against emulated register stores in tests. The platform layer (device
//! discovery, interrupt line registration, coherent memory declaration)
//! lives behind these traits and is not part of the driver.

#![forbid(unsafe_code)]

mod memory;

pub use memory::TranslateError;
pub use memory::VringDmaRegion;

/// Identifies one of the memory-mapped register windows a processor
/// instance needs when it is controlled through direct hardware access.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowId {
    /// RPU control block: global control plus the per-core configuration
    /// registers.
    RpuControl,
    /// CRL_APB block holding the low-power-domain reset register.
    CrlApb,
    /// IPI block for the instance's notification channel.
    Ipi,
}

/// Raw 32-bit access to a mapped register window.
///
/// Reads and writes have no failure channel; a memory-mapped access either
/// completes or faults, it does not report an error to the driver.
pub trait RegisterIo: Send + Sync + 'static {
    /// Reads the 32-bit register at `offset` bytes into the window.
    fn read_u32(&self, offset: usize) -> u32;
    /// Writes the 32-bit register at `offset` bytes into the window.
    fn write_u32(&self, offset: usize, value: u32);
}

/// Platform services backing one processor instance.
pub trait ProcessorBacking: Send + Sync + 'static {
    /// The register window type produced by [`Self::map_window`].
    type Registers: RegisterIo;

    /// Maps one of the instance's register windows.
    ///
    /// Only called for instances using the direct control method; the
    /// firmware-call methods need no windows.
    fn map_window(&self, window: WindowId) -> anyhow::Result<Self::Registers>;

    /// Flushes the host data cache globally.
    ///
    /// The remote core does not coherently snoop the host's caches, so the
    /// driver flushes before boot handoff and before consuming data the
    /// remote core wrote.
    fn flush_data_cache(&self);

    /// A stable identifier for diagnostics.
    fn id(&self) -> &str;
}

/// The external virtqueue-processing layer for one instance.
pub trait VringHost: Send + Sync + 'static {
    /// Processes any pending buffers on virtqueue `vqid`.
    ///
    /// Returns `false` when nothing was pending. That is a normal outcome:
    /// several hardware notification edges can coalesce into one deferred
    /// service pass.
    fn vq_interrupt(&self, vqid: u16) -> bool;
}
