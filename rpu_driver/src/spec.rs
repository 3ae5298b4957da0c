// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Register layout of the RPU control, CRL_APB reset, and IPI blocks.
//!
//! Offsets are relative to each block's mapped window.

use bitfield_struct::bitfield;
use std::time::Duration;

/// Shared RPU global control register.
pub const RPU_GLBL_CNTL_OFFSET: usize = 0x0;
/// RPU core 0 configuration register.
pub const RPU_0_CFG_OFFSET: usize = 0x100;
/// RPU core 1 configuration register.
pub const RPU_1_CFG_OFFSET: usize = 0x200;

/// Low-power-domain top reset register, in the CRL_APB window.
pub const RST_LPD_TOP_OFFSET: usize = 0x23c;
/// Bit position of the core 0 reset line; core N resets at this bit + N.
pub const RPU_0_RESET_BIT: u32 = 0;

/// IPI trigger register.
pub const IPI_TRIG_OFFSET: usize = 0x0;
/// IPI observation register.
pub const IPI_OBS_OFFSET: usize = 0x4;
/// IPI interrupt status register; writing a mask clears its pending bits.
pub const IPI_ISR_OFFSET: usize = 0x10;
/// IPI interrupt mask register.
pub const IPI_IMR_OFFSET: usize = 0x14;
/// IPI interrupt enable register.
pub const IPI_IER_OFFSET: usize = 0x18;
/// IPI interrupt disable register.
pub const IPI_IDR_OFFSET: usize = 0x1c;
/// Every notification source on the channel.
pub const IPI_ALL_MASK: u32 = 0x0f0f_0301;

/// Destination mask used when the configuration omits one.
pub const DEFAULT_IPI_DEST_MASK: u32 = 0x100;
/// Firmware image name used when the configuration omits one. Consumed by
/// the external lifecycle framework, not by this driver.
pub const DEFAULT_FIRMWARE_NAME: &str = "rproc-rpu-fw";

/// Settle time after disabling and clearing the IPI channel. The next
/// channel operation must not be issued before this has elapsed.
pub const IPI_SETTLE_DELAY: Duration = Duration::from_micros(10);
/// Settle time between boot-device selection under reset/halt and the
/// release from reset/halt. Releasing earlier races the boot-vector latch.
pub const BOOT_RELEASE_DELAY: Duration = Duration::from_micros(500);

/// The per-core configuration register for `core_index`.
pub const fn core_cfg_offset(core_index: u8) -> usize {
    if core_index == 0 {
        RPU_0_CFG_OFFSET
    } else {
        RPU_1_CFG_OFFSET
    }
}

/// RPU global control register, shared by both cores of the pair.
#[bitfield(u32)]
pub struct RpuGlobalControl {
    #[bits(3)]
    _reserved0: u8,
    /// High for split mode, low for lock-step.
    pub sl_split: bool,
    /// Clamp mode; low in split mode.
    pub sl_clamp: bool,
    _reserved5: bool,
    /// High to combine the pair's TCMs, low to split them.
    pub tcm_comb: bool,
    #[bits(25)]
    _reserved7: u32,
}

/// Per-core RPU configuration register.
#[bitfield(u32)]
pub struct RpuCoreConfig {
    /// High while the core is running, low while halted.
    pub ncpuhalt: bool,
    _reserved1: bool,
    /// Boot-vector source: high for OCM, low for TCM.
    pub vinithi: bool,
    #[bits(29)]
    _reserved3: u32,
}
