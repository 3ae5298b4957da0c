// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bridges the vring IPI interrupt into deferred, schedulable processing.
//!
//! The interrupt handler runs in restricted context and only raises a
//! coalescing single-slot signal plus a register write; the deferred body
//! runs on a dedicated worker thread that may block, flush caches, and
//! call into the external virtqueue layer.

use crate::backend::ControlBackend;
use crate::backend::InstanceParams;
use crate::registry::InstanceRegistry;
use parking_lot::Condvar;
use parking_lot::Mutex;
use rpu_platform::ProcessorBacking;
use rpu_platform::RegisterIo;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;

/// Outcome reported back to the platform interrupt layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IrqStatus {
    /// The interrupt was recognized and serviced.
    Handled,
}

/// Coalescing single-slot work signal.
///
/// Raises that arrive while a run is already pending collapse into that
/// run, so at most one deferred execution is outstanding per instance.
pub(crate) struct WorkSignal {
    pending: Mutex<bool>,
    wake: Condvar,
    shutdown: AtomicBool,
}

impl WorkSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(false),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Requests a deferred run. Non-blocking beyond the flag update; safe
    /// from interrupt context.
    pub fn raise(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.wake.notify_one();
    }

    fn stop(&self) {
        let _guard = self.pending.lock();
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Blocks until a run is pending or shutdown is requested; returns
    /// `false` on shutdown.
    fn take(&self) -> bool {
        let mut pending = self.pending.lock();
        loop {
            if *pending {
                *pending = false;
                return true;
            }
            if self.shutdown.load(Ordering::SeqCst) {
                return false;
            }
            self.wake.wait(&mut pending);
        }
    }
}

/// The deferred-task runner for one instance.
pub(crate) struct VringWorker {
    signal: Arc<WorkSignal>,
    thread: Option<JoinHandle<()>>,
}

impl VringWorker {
    /// Spawns the worker thread servicing `signal` for the instance at
    /// `core_index`.
    pub fn spawn<B: ProcessorBacking>(
        signal: Arc<WorkSignal>,
        core_index: u8,
        registry: Arc<InstanceRegistry>,
        backing: Arc<B>,
    ) -> anyhow::Result<Self> {
        let thread = std::thread::Builder::new()
            .name(format!("rpu{core_index}-vring0"))
            .spawn({
                let signal = signal.clone();
                move || run_deferred(&signal, core_index, &registry, &*backing)
            })?;
        Ok(Self {
            signal,
            thread: Some(thread),
        })
    }
}

impl Drop for VringWorker {
    fn drop(&mut self) {
        self.signal.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_deferred<B: ProcessorBacking>(
    signal: &WorkSignal,
    core_index: u8,
    registry: &InstanceRegistry,
    backing: &B,
) {
    while signal.take() {
        // Make anything the remote core wrote visible before consuming it.
        backing.flush_data_cache();
        match registry.lookup(core_index) {
            Some(entry) => {
                if !entry.vring.vq_interrupt(0) {
                    tracing::debug!(core_index, "no message found in vqid 0");
                }
            }
            None => {
                tracing::debug!(core_index, "deferred work for unregistered instance");
            }
        }
    }
    tracing::debug!(core_index, "vring worker exiting");
}

/// Entry point bound to the instance's vring0 interrupt line.
///
/// Cloneable so the platform layer can hold it for the lifetime of its
/// interrupt registration.
pub struct InterruptHandle<M: RegisterIo> {
    pub(crate) signal: Arc<WorkSignal>,
    pub(crate) backend: Arc<ControlBackend<M>>,
    pub(crate) params: InstanceParams,
}

impl<M: RegisterIo> Clone for InterruptHandle<M> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            backend: self.backend.clone(),
            params: self.params,
        }
    }
}

impl<M: RegisterIo> InterruptHandle<M> {
    /// Services one edge of the vring0 interrupt.
    ///
    /// Never blocks: schedules the deferred run (coalescing with any run
    /// already pending) and acknowledges the hardware source.
    pub fn handle_interrupt(&self) -> IrqStatus {
        tracing::debug!(
            core_index = self.params.core_index,
            "pending message from remote core"
        );
        self.signal.raise();
        self.backend.clear_notification(&self.params);
        IrqStatus::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raises_coalesce_into_one_run() {
        let signal = WorkSignal::new();
        signal.raise();
        signal.raise();
        signal.raise();
        // One pending run, however many raises preceded it.
        assert!(signal.take());
        assert!(!*signal.pending.lock());
    }

    #[test]
    fn raise_after_take_pends_again() {
        let signal = WorkSignal::new();
        signal.raise();
        assert!(signal.take());
        signal.raise();
        assert!(signal.take());
    }

    #[test]
    fn stop_wakes_idle_worker() {
        let signal = WorkSignal::new();
        let worker = std::thread::spawn({
            let signal = signal.clone();
            move || signal.take()
        });
        // Give the worker a moment to block in take().
        std::thread::sleep(std::time::Duration::from_millis(10));
        signal.stop();
        assert!(!worker.join().unwrap());
    }
}
