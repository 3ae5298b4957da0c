// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Address translation for vring buffers shared with the remote core.

use thiserror::Error;

/// An address failed to translate because it lies outside the vring's
/// coherent region.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    /// The host-side address is not within the region.
    #[error("host address {addr:#x} outside vring region ({base:#x}, len {len:#x})")]
    HostAddressOutOfRange {
        /// The offending address.
        addr: u64,
        /// Host virtual base of the region.
        base: u64,
        /// Region length in bytes.
        len: u64,
    },
    /// The remote-side address is not within the region.
    #[error("remote address {addr:#x} outside vring region ({base:#x}, len {len:#x})")]
    RemoteAddressOutOfRange {
        /// The offending address.
        addr: u64,
        /// Bus (physical) base of the region.
        base: u64,
        /// Region length in bytes.
        len: u64,
    },
}

/// A contiguous coherent DMA region backing one vring.
///
/// The region is declared by the platform layer with a known host virtual
/// base and a known bus (physical) base. The remote core is assumed to map
/// this physical range identically, so an address it can use is the bus
/// address of the same byte. That is a deliberate simplifying assumption of
/// this system, not a generality.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VringDmaRegion {
    host_base: u64,
    bus_base: u64,
    len: u64,
}

impl VringDmaRegion {
    /// Describes a region with host virtual base `host_base`, bus base
    /// `bus_base`, and `len` bytes.
    pub fn new(host_base: u64, bus_base: u64, len: u64) -> Self {
        Self {
            host_base,
            bus_base,
            len,
        }
    }

    /// The host virtual base of the region.
    pub fn host_base(&self) -> u64 {
        self.host_base
    }

    /// The bus (physical) base of the region.
    pub fn bus_base(&self) -> u64 {
        self.bus_base
    }

    /// The region length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the region is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Translates a host virtual address within the region into the
    /// address the remote core must use to reach the same byte.
    pub fn remote_address(&self, host_addr: u64) -> Result<u64, TranslateError> {
        let offset = host_addr
            .checked_sub(self.host_base)
            .filter(|&offset| offset < self.len)
            .ok_or(TranslateError::HostAddressOutOfRange {
                addr: host_addr,
                base: self.host_base,
                len: self.len,
            })?;
        Ok(self.bus_base + offset)
    }

    /// Inverse of [`Self::remote_address`].
    pub fn host_address(&self, remote_addr: u64) -> Result<u64, TranslateError> {
        let offset = remote_addr
            .checked_sub(self.bus_base)
            .filter(|&offset| offset < self.len)
            .ok_or(TranslateError::RemoteAddressOutOfRange {
                addr: remote_addr,
                base: self.bus_base,
                len: self.len,
            })?;
        Ok(self.host_base + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_offsets() {
        let region = VringDmaRegion::new(0xffff_8000_1000_0000, 0x3ed0_0000, 0x8000);
        assert_eq!(
            region.remote_address(0xffff_8000_1000_0000).unwrap(),
            0x3ed0_0000
        );
        assert_eq!(
            region.remote_address(0xffff_8000_1000_0040).unwrap(),
            0x3ed0_0040
        );
        assert_eq!(
            region.remote_address(0xffff_8000_1000_7fff).unwrap(),
            0x3ed0_7fff
        );
    }

    #[test]
    fn translate_round_trip() {
        let region = VringDmaRegion::new(0x7f00_0000_0000, 0x3ed0_0000, 0x4000);
        for host in [
            0x7f00_0000_0000,
            0x7f00_0000_0123,
            0x7f00_0000_3fff,
        ] {
            let remote = region.remote_address(host).unwrap();
            assert_eq!(region.host_address(remote).unwrap(), host);
        }
    }

    #[test]
    fn translate_out_of_range() {
        let region = VringDmaRegion::new(0x1000, 0x9000, 0x100);
        assert!(matches!(
            region.remote_address(0xfff),
            Err(TranslateError::HostAddressOutOfRange { .. })
        ));
        assert!(matches!(
            region.remote_address(0x1100),
            Err(TranslateError::HostAddressOutOfRange { .. })
        ));
        assert!(matches!(
            region.host_address(0x9100),
            Err(TranslateError::RemoteAddressOutOfRange { .. })
        ));
    }
}
