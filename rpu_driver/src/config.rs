// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The resolved configuration record for one processor instance.
//!
//! The platform layer reads the raw option strings from its descriptor
//! data and hands them here; resolution applies the platform defaults and
//! rejects anything unrecognized before any hardware is touched.

use crate::spec;
use thiserror::Error;

/// A configuration option failed to resolve.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The core configuration string was not `split0`, `split1`, or
    /// `lock-step`.
    #[error("invalid core_conf mode: {0}")]
    InvalidCoreConf(String),
    /// The control method string was not `direct`, `hvc`, or `smc`.
    #[error("invalid control method: {0}")]
    InvalidMethod(String),
    /// The boot memory string was not `tcm` or `ocm`.
    #[error("invalid bootmem: {0}")]
    InvalidBootMemory(String),
}

/// Whether the core pair runs as one lock-stepped unit or as two
/// independent cores.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoreConfiguration {
    /// Both physical cores act as one redundant unit.
    LockStep,
    /// The cores run independently.
    Split,
}

/// The memory the core fetches its boot vector from at release-from-reset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootMemory {
    /// Tightly coupled memory.
    Tcm,
    /// On-chip memory.
    Ocm,
}

/// The privilege mechanism used for core-control and IPI operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlMethod {
    /// Direct memory-mapped register access.
    Direct,
    /// Hypervisor calls. Not implemented.
    Hvc,
    /// Secure-monitor calls into platform firmware. Not implemented.
    Smc,
}

/// Resolved per-instance configuration. Immutable once an instance is
/// constructed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpuConfig {
    /// Lock-step or split operation.
    pub core_conf: CoreConfiguration,
    /// Which core of the pair this instance controls (0 or 1).
    pub core_index: u8,
    /// Control backend selection.
    pub method: ControlMethod,
    /// Boot-vector source.
    pub bootmem: BootMemory,
    /// IPI destination mask; opaque hardware routing bits.
    pub ipi_dest_mask: u32,
    /// Firmware image name, carried for the external lifecycle framework.
    pub firmware: String,
}

impl RpuConfig {
    /// Resolves raw option strings into a configuration record.
    ///
    /// A `None` option falls back to the platform default with a warning;
    /// an unrecognized string fails resolution.
    pub fn resolve(
        core_conf: Option<&str>,
        method: Option<&str>,
        bootmem: Option<&str>,
        ipi_dest_mask: Option<u32>,
        firmware: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let core_conf_str = core_conf.unwrap_or_else(|| {
            tracing::warn!("default core_conf used: lock-step");
            "lock-step"
        });
        let (core_conf, core_index) = match core_conf_str {
            "split0" => (CoreConfiguration::Split, 0),
            "split1" => (CoreConfiguration::Split, 1),
            "lock-step" => (CoreConfiguration::LockStep, 0),
            other => return Err(ConfigError::InvalidCoreConf(other.to_owned())),
        };

        let method_str = method.unwrap_or_else(|| {
            tracing::warn!("default control method used: smc");
            "smc"
        });
        let method = match method_str {
            "direct" => ControlMethod::Direct,
            "hvc" => ControlMethod::Hvc,
            "smc" => ControlMethod::Smc,
            other => return Err(ConfigError::InvalidMethod(other.to_owned())),
        };

        let bootmem_str = bootmem.unwrap_or_else(|| {
            tracing::warn!("default bootmem used: tcm");
            "tcm"
        });
        let bootmem = match bootmem_str {
            "tcm" => BootMemory::Tcm,
            "ocm" => BootMemory::Ocm,
            other => return Err(ConfigError::InvalidBootMemory(other.to_owned())),
        };

        let ipi_dest_mask = ipi_dest_mask.unwrap_or_else(|| {
            tracing::warn!(
                mask = format_args!("{:#x}", spec::DEFAULT_IPI_DEST_MASK),
                "default ipi_dest_mask used"
            );
            spec::DEFAULT_IPI_DEST_MASK
        });

        let firmware = firmware.unwrap_or(spec::DEFAULT_FIRMWARE_NAME).to_owned();

        tracing::info!(
            ?core_conf,
            core_index,
            ?method,
            ?bootmem,
            ipi_dest_mask = format_args!("{ipi_dest_mask:#x}"),
            firmware,
            "resolved rpu configuration"
        );

        Ok(Self {
            core_conf,
            core_index,
            method,
            bootmem,
            ipi_dest_mask,
            firmware,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults() {
        let config = RpuConfig::resolve(None, None, None, None, None).unwrap();
        assert_eq!(config.core_conf, CoreConfiguration::LockStep);
        assert_eq!(config.core_index, 0);
        assert_eq!(config.method, ControlMethod::Smc);
        assert_eq!(config.bootmem, BootMemory::Tcm);
        assert_eq!(config.ipi_dest_mask, spec::DEFAULT_IPI_DEST_MASK);
        assert_eq!(config.firmware, spec::DEFAULT_FIRMWARE_NAME);
    }

    #[test]
    fn resolve_split_cores() {
        let config =
            RpuConfig::resolve(Some("split0"), Some("direct"), Some("ocm"), Some(0x200), None)
                .unwrap();
        assert_eq!(config.core_conf, CoreConfiguration::Split);
        assert_eq!(config.core_index, 0);
        let config =
            RpuConfig::resolve(Some("split1"), Some("direct"), Some("ocm"), Some(0x200), None)
                .unwrap();
        assert_eq!(config.core_conf, CoreConfiguration::Split);
        assert_eq!(config.core_index, 1);
        assert_eq!(config.method, ControlMethod::Direct);
        assert_eq!(config.bootmem, BootMemory::Ocm);
        assert_eq!(config.ipi_dest_mask, 0x200);
    }

    #[test]
    fn resolve_rejects_unknown_strings() {
        assert_eq!(
            RpuConfig::resolve(Some("split2"), None, None, None, None),
            Err(ConfigError::InvalidCoreConf("split2".to_owned()))
        );
        assert_eq!(
            RpuConfig::resolve(None, Some("svc"), None, None, None),
            Err(ConfigError::InvalidMethod("svc".to_owned()))
        );
        assert_eq!(
            RpuConfig::resolve(None, None, Some("ddr"), None, None),
            Err(ConfigError::InvalidBootMemory("ddr".to_owned()))
        );
    }

    #[test]
    fn firmware_override() {
        let config =
            RpuConfig::resolve(None, None, None, None, Some("custom-fw.elf")).unwrap();
        assert_eq!(config.firmware, "custom-fw.elf");
    }
}
