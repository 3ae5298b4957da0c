// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lifecycle control for one RPU instance.

use crate::backend::ControlBackend;
use crate::backend::CorePairShared;
use crate::backend::InstanceParams;
use crate::config::ControlMethod;
use crate::config::RpuConfig;
use crate::interrupt::InterruptHandle;
use crate::interrupt::VringWorker;
use crate::interrupt::WorkSignal;
use crate::registry::InstanceEntry;
use crate::registry::InstanceRegistry;
use crate::spec;
use anyhow::Context as _;
use rpu_platform::ProcessorBacking;
use rpu_platform::TranslateError;
use rpu_platform::VringDmaRegion;
use rpu_platform::VringHost;
use rpu_platform::WindowId;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Stopped,
    Running,
}

/// One RPU instance: a companion core (or lock-stepped pair) whose power,
/// reset, boot memory, and notification channel this driver owns.
///
/// A freshly constructed instance is halted with reset asserted. `start`
/// leaves it running; `stop` returns it to halted-and-reset. The external
/// lifecycle framework serializes `start`/`stop` per instance.
pub struct RpuProcessor<B: ProcessorBacking> {
    backing: Arc<B>,
    config: RpuConfig,
    params: InstanceParams,
    backend: Arc<ControlBackend<B::Registers>>,
    registry: Arc<InstanceRegistry>,
    vring: Arc<dyn VringHost>,
    signal: Arc<WorkSignal>,
    worker: Option<VringWorker>,
    state: State,
}

impl<B: ProcessorBacking> RpuProcessor<B> {
    /// Builds an instance from a resolved configuration record.
    ///
    /// Maps the register windows (direct control method only) and binds
    /// the control backend. Fails without touching any hardware state;
    /// no degraded instance is ever returned.
    ///
    /// Both instances of a core pair must share `pair` so that their
    /// accesses to the pair-shared registers serialize.
    pub fn new(
        backing: B,
        config: RpuConfig,
        pair: Arc<CorePairShared>,
        registry: Arc<InstanceRegistry>,
        vring: Arc<dyn VringHost>,
    ) -> anyhow::Result<Self> {
        let backing = Arc::new(backing);
        let backend = match config.method {
            ControlMethod::Direct => ControlBackend::Direct {
                rpu: backing
                    .map_window(WindowId::RpuControl)
                    .context("failed to map RPU control window")?,
                crl_apb: backing
                    .map_window(WindowId::CrlApb)
                    .context("failed to map CRL_APB window")?,
                ipi: backing
                    .map_window(WindowId::Ipi)
                    .context("failed to map IPI window")?,
                shared: pair,
            },
            ControlMethod::Hvc => ControlBackend::Hvc,
            ControlMethod::Smc => ControlBackend::Smc,
        };
        let params = InstanceParams {
            core_index: config.core_index,
            core_conf: config.core_conf,
            bootmem: config.bootmem,
            ipi_dest_mask: config.ipi_dest_mask,
        };
        Ok(Self {
            backing,
            params,
            backend: Arc::new(backend),
            registry,
            vring,
            signal: WorkSignal::new(),
            worker: None,
            state: State::Stopped,
            config,
        })
    }

    /// Boots the remote core.
    ///
    /// The register sequence and its settle delay are a hardware contract:
    /// core mode and boot device are programmed with reset and halt
    /// asserted, the boot vector is given time to latch, and only then are
    /// reset and halt released. The IPI channel is quiesced and re-enabled
    /// last.
    pub fn start(&mut self) {
        tracing::debug!(
            id = self.backing.id(),
            core_index = self.params.core_index,
            "starting remote core"
        );

        // The remote core does not snoop the host cache at boot handoff.
        self.backing.flush_data_cache();

        self.registry
            .register(
                self.params.core_index,
                Arc::new(InstanceEntry {
                    vring: self.vring.clone(),
                }),
            )
            .expect("core index is validated at configuration");

        if self.worker.is_none() {
            let worker = VringWorker::spawn(
                self.signal.clone(),
                self.params.core_index,
                self.registry.clone(),
                self.backing.clone(),
            )
            .expect("failed to spawn vring worker thread");
            self.worker = Some(worker);
        }

        self.backend.configure_core_mode(&self.params);
        self.backend.set_reset(&self.params, true);
        self.backend.set_halt(&self.params, true);
        self.backend.set_boot_device(&self.params);
        // Hold reset and halt until the boot vector has latched.
        std::thread::sleep(spec::BOOT_RELEASE_DELAY);
        self.backend.set_reset(&self.params, false);
        self.backend.set_halt(&self.params, false);

        // Disable-and-clear before enabling the destination mask.
        self.backend.reset_notification_channel(&self.params);
        self.backend.program_destination_mask(&self.params);

        self.state = State::Running;
    }

    /// Powers the remote core down: reset asserted, core halted, IPI
    /// channel quiesced. No settle delay is needed between the steps.
    pub fn stop(&mut self) {
        tracing::debug!(
            id = self.backing.id(),
            core_index = self.params.core_index,
            "stopping remote core"
        );
        self.backend.set_reset(&self.params, true);
        self.backend.set_halt(&self.params, true);
        self.backend.reset_notification_channel(&self.params);
        self.state = State::Stopped;
    }

    /// Notifies the remote core that outbound buffers are queued on
    /// `vqid`.
    ///
    /// Only one IPI channel exists, so `vqid` does not select among
    /// destinations yet; it is accepted for forward compatibility.
    pub fn kick(&self, vqid: u16) {
        tracing::debug!(vqid, "kick remote core");
        self.backend.trigger_notification(&self.params);
    }

    /// Translates a host virtual address inside `region` into the address
    /// the remote core uses to reach the same byte.
    pub fn translate(
        &self,
        region: &VringDmaRegion,
        host_addr: u64,
    ) -> Result<u64, TranslateError> {
        region.remote_address(host_addr)
    }

    /// The entry point the platform layer binds to the instance's vring0
    /// interrupt line.
    pub fn interrupt_handle(&self) -> InterruptHandle<B::Registers> {
        InterruptHandle {
            signal: self.signal.clone(),
            backend: self.backend.clone(),
            params: self.params,
        }
    }

    /// Whether the instance is in the running state.
    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// The core index identifying this instance's registry slot.
    pub fn core_index(&self) -> u8 {
        self.params.core_index
    }

    /// The firmware image name resolved for this instance. Consumed by
    /// the external lifecycle framework.
    pub fn firmware(&self) -> &str {
        &self.config.firmware
    }

    /// Tears the instance down: forces the stopped state if it is
    /// running, removes it from the registry, and joins the deferred
    /// worker.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.state == State::Running {
            self.stop();
        }
        self.registry.unregister(self.params.core_index).ok();
        // Dropping the worker joins its thread.
        self.worker = None;
    }
}

impl<B: ProcessorBacking> Drop for RpuProcessor<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
