// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Control backends for the RPU core-control and IPI operations.
//!
//! The backend is selected once at instance construction from the
//! configured [`ControlMethod`](crate::config::ControlMethod) and never
//! rebound. Only the direct-hardware variant has concrete behavior; the
//! firmware-call variants log and return without effect.

use crate::config::BootMemory;
use crate::config::CoreConfiguration;
use crate::spec;
use crate::spec::RpuCoreConfig;
use crate::spec::RpuGlobalControl;
use parking_lot::Mutex;
use rpu_platform::RegisterIo;
use std::sync::Arc;

/// Mutual exclusion for the registers shared by both cores of a pair: the
/// RPU global control register and the LPD top reset register.
///
/// Both instances of a pair must be constructed with the same token so
/// that their read-modify-write sequences serialize even if both cores are
/// started concurrently.
#[derive(Default)]
pub struct CorePairShared {
    rmw: Mutex<()>,
}

/// The per-instance identity a backend operation needs to address its
/// registers. Fixed at construction.
#[derive(Debug, Copy, Clone)]
pub struct InstanceParams {
    /// Which core of the pair (0 or 1).
    pub core_index: u8,
    /// Lock-step or split operation.
    pub core_conf: CoreConfiguration,
    /// Boot-vector source.
    pub bootmem: BootMemory,
    /// IPI destination mask.
    pub ipi_dest_mask: u32,
}

/// A bound control backend for one processor instance.
pub enum ControlBackend<M: RegisterIo> {
    /// Direct memory-mapped access to the RPU, CRL_APB, and IPI blocks.
    Direct {
        /// RPU control window.
        rpu: M,
        /// CRL_APB window holding the LPD reset register.
        crl_apb: M,
        /// IPI window for the instance's notification channel.
        ipi: M,
        /// Serializes RMW of the pair-shared registers.
        shared: Arc<CorePairShared>,
    },
    /// Secure-monitor calls into platform firmware. Not implemented:
    /// every operation is a logged no-op.
    Smc,
    /// Hypervisor calls. Not implemented: every operation is a logged
    /// no-op.
    Hvc,
}

fn unimplemented_method(method: &str, op: &str) {
    tracing::error!(method, op, "control method not implemented");
}

impl<M: RegisterIo> ControlBackend<M> {
    /// Programs the shared global control register for the configured core
    /// mode.
    ///
    /// The register carries state for both cores; the RMW serializes
    /// through the pair-shared token.
    pub fn configure_core_mode(&self, params: &InstanceParams) {
        match self {
            Self::Direct { rpu, shared, .. } => {
                tracing::debug!(core_conf = ?params.core_conf, "core configuration");
                let _rmw = shared.rmw.lock();
                let mut ctrl = RpuGlobalControl::from(rpu.read_u32(spec::RPU_GLBL_CNTL_OFFSET));
                match params.core_conf {
                    CoreConfiguration::Split => {
                        ctrl.set_sl_split(true);
                        ctrl.set_tcm_comb(false);
                        ctrl.set_sl_clamp(false);
                    }
                    CoreConfiguration::LockStep => {
                        ctrl.set_sl_split(false);
                        ctrl.set_tcm_comb(true);
                        ctrl.set_sl_clamp(true);
                    }
                }
                rpu.write_u32(spec::RPU_GLBL_CNTL_OFFSET, ctrl.into());
            }
            Self::Smc => unimplemented_method("smc", "configure_core_mode"),
            Self::Hvc => unimplemented_method("hvc", "configure_core_mode"),
        }
    }

    /// Selects the boot-vector source in the per-core configuration
    /// register.
    pub fn set_boot_device(&self, params: &InstanceParams) {
        match self {
            Self::Direct { rpu, .. } => {
                tracing::debug!(
                    core_index = params.core_index,
                    bootmem = ?params.bootmem,
                    "boot device"
                );
                let offset = spec::core_cfg_offset(params.core_index);
                let mut cfg = RpuCoreConfig::from(rpu.read_u32(offset));
                cfg.set_vinithi(matches!(params.bootmem, BootMemory::Ocm));
                rpu.write_u32(offset, cfg.into());
            }
            Self::Smc => unimplemented_method("smc", "set_boot_device"),
            Self::Hvc => unimplemented_method("hvc", "set_boot_device"),
        }
    }

    /// Halts the core (`halt = true`) or lets it run.
    pub fn set_halt(&self, params: &InstanceParams, halt: bool) {
        match self {
            Self::Direct { rpu, .. } => {
                tracing::debug!(core_index = params.core_index, halt, "halt");
                let offset = spec::core_cfg_offset(params.core_index);
                let mut cfg = RpuCoreConfig::from(rpu.read_u32(offset));
                cfg.set_ncpuhalt(!halt);
                rpu.write_u32(offset, cfg.into());
            }
            Self::Smc => unimplemented_method("smc", "set_halt"),
            Self::Hvc => unimplemented_method("hvc", "set_halt"),
        }
    }

    /// Asserts (`reset = true`) or releases the core's reset line in the
    /// shared LPD reset register.
    pub fn set_reset(&self, params: &InstanceParams, reset: bool) {
        match self {
            Self::Direct {
                crl_apb, shared, ..
            } => {
                tracing::debug!(core_index = params.core_index, reset, "reset");
                let bit = 1u32 << (spec::RPU_0_RESET_BIT + params.core_index as u32);
                let _rmw = shared.rmw.lock();
                let mut val = crl_apb.read_u32(spec::RST_LPD_TOP_OFFSET);
                if reset {
                    val |= bit;
                } else {
                    val &= !bit;
                }
                crl_apb.write_u32(spec::RST_LPD_TOP_OFFSET, val);
            }
            Self::Smc => unimplemented_method("smc", "set_reset"),
            Self::Hvc => unimplemented_method("hvc", "set_reset"),
        }
    }

    /// Acknowledges the pending notification for this instance's
    /// destination mask.
    pub fn clear_notification(&self, params: &InstanceParams) {
        match self {
            Self::Direct { ipi, .. } => {
                tracing::debug!(
                    mask = format_args!("{:#x}", params.ipi_dest_mask),
                    "clear ipi"
                );
                ipi.write_u32(spec::IPI_ISR_OFFSET, params.ipi_dest_mask);
            }
            Self::Smc => unimplemented_method("smc", "clear_notification"),
            Self::Hvc => unimplemented_method("hvc", "clear_notification"),
        }
    }

    /// Disables every notification source, clears all pending status, and
    /// waits for the channel to settle.
    ///
    /// Contains a blocking sleep; must not be called from interrupt
    /// context. Reachable only through start/stop.
    pub fn reset_notification_channel(&self, _params: &InstanceParams) {
        match self {
            Self::Direct { ipi, .. } => {
                ipi.write_u32(spec::IPI_IDR_OFFSET, spec::IPI_ALL_MASK);
                ipi.write_u32(spec::IPI_ISR_OFFSET, spec::IPI_ALL_MASK);
                // The disable and clear need settle time to take effect.
                std::thread::sleep(spec::IPI_SETTLE_DELAY);
                tracing::debug!("ipi reset done");
            }
            Self::Smc => unimplemented_method("smc", "reset_notification_channel"),
            Self::Hvc => unimplemented_method("hvc", "reset_notification_channel"),
        }
    }

    /// Enables exactly the configured destination mask as a notification
    /// source.
    pub fn program_destination_mask(&self, params: &InstanceParams) {
        match self {
            Self::Direct { ipi, .. } => {
                tracing::debug!(
                    mask = format_args!("{:#x}", params.ipi_dest_mask),
                    "set ipi mask"
                );
                ipi.write_u32(spec::IPI_IER_OFFSET, params.ipi_dest_mask);
            }
            Self::Smc => unimplemented_method("smc", "program_destination_mask"),
            Self::Hvc => unimplemented_method("hvc", "program_destination_mask"),
        }
    }

    /// Asserts the notification to the remote destinations encoded by the
    /// mask.
    pub fn trigger_notification(&self, params: &InstanceParams) {
        match self {
            Self::Direct { ipi, .. } => {
                tracing::debug!(
                    mask = format_args!("{:#x}", params.ipi_dest_mask),
                    "trigger ipi"
                );
                ipi.write_u32(spec::IPI_TRIG_OFFSET, params.ipi_dest_mask);
            }
            Self::Smc => unimplemented_method("smc", "trigger_notification"),
            Self::Hvc => unimplemented_method("hvc", "trigger_notification"),
        }
    }
}
