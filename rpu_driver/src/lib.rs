// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lifecycle and notification control for a companion RPU core pair.
//!
//! The host owns the remote cores' power, reset, boot memory, and core
//! configuration, and bridges the vring IPI interrupt into deferred
//! virtqueue servicing. Platform concerns (descriptor parsing, interrupt
//! line registration, coherent memory declaration, the generic lifecycle
//! framework) stay behind the seams in [`rpu_platform`].
//!
//! The driver is generic over [`rpu_platform::ProcessorBacking`], so tests
//! run the full register sequences against emulated windows.

#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
mod driver;
mod interrupt;
pub mod registry;
pub mod spec;

pub use backend::ControlBackend;
pub use backend::CorePairShared;
pub use backend::InstanceParams;
pub use config::RpuConfig;
pub use driver::RpuProcessor;
pub use interrupt::InterruptHandle;
pub use interrupt::IrqStatus;
pub use registry::InstanceRegistry;
