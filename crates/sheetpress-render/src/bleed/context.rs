// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pool of flood contexts shared by every execution unit of an export.
//
// A context is checked out for one synthesis and returned when the guard
// drops. A context that reports itself lost is discarded instead of returned;
// the next acquire builds a fresh one through the factory.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use sheetpress_core::config::FloodBackend;
use sheetpress_core::error::{Result, SheetpressError};
use tracing::{debug, info, warn};

use super::flood::{FloodContext, SoftwareFlood};

/// Builds a new flood context on demand.
pub type ContextFactory = Box<dyn Fn() -> Result<Box<dyn FloodContext>> + Send + Sync>;

pub struct ContextPool {
    factory: ContextFactory,
    idle: Mutex<Vec<Box<dyn FloodContext>>>,
    created: AtomicUsize,
    lost: AtomicUsize,
}

impl ContextPool {
    pub fn new(factory: ContextFactory) -> Self {
        Self {
            factory,
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            lost: AtomicUsize::new(0),
        }
    }

    /// A pool of software contexts; always available.
    pub fn software() -> Self {
        Self::new(Box::new(|| Ok(Box::new(SoftwareFlood::new()) as Box<dyn FloodContext>)))
    }

    /// Build the pool for the configured backend.
    ///
    /// `Gpu` fails with `SynthesisUnavailable` when no adapter can be opened;
    /// `Auto` falls back to software in that case.
    pub fn for_backend(backend: FloodBackend) -> Result<Self> {
        match backend {
            FloodBackend::Software => Ok(Self::software()),
            FloodBackend::Gpu => Self::gpu(),
            FloodBackend::Auto => match Self::gpu() {
                Ok(pool) => Ok(pool),
                Err(e) => {
                    info!(reason = %e, "GPU flood fill unavailable, using software");
                    Ok(Self::software())
                }
            },
        }
    }

    #[cfg(feature = "gpu")]
    fn gpu() -> Result<Self> {
        // Probe once so a missing adapter surfaces here rather than per tile.
        let probe = super::gpu::GpuFlood::new()?;
        let pool = Self::new(Box::new(|| {
            Ok(Box::new(super::gpu::GpuFlood::new()?) as Box<dyn FloodContext>)
        }));
        pool.release(Box::new(probe));
        pool.created.store(1, Ordering::Relaxed);
        Ok(pool)
    }

    #[cfg(not(feature = "gpu"))]
    fn gpu() -> Result<Self> {
        Err(SheetpressError::SynthesisUnavailable(
            "built without the `gpu` feature".into(),
        ))
    }

    /// Check out a context, creating one when none is idle.
    pub fn acquire(&self) -> Result<PooledContext<'_>> {
        let reused = self
            .idle
            .lock()
            .map_err(|_| SheetpressError::SynthesisUnavailable("context pool poisoned".into()))?
            .pop();

        let context = match reused {
            Some(context) => context,
            None => {
                let context = (self.factory)().map_err(|e| match e {
                    SheetpressError::SynthesisUnavailable(_) => e,
                    other => SheetpressError::SynthesisUnavailable(other.to_string()),
                })?;
                let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(backend = context.name(), total, "flood context created");
                context
            }
        };

        Ok(PooledContext {
            pool: self,
            context: Some(context),
        })
    }

    fn release(&self, context: Box<dyn FloodContext>) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(context);
        }
    }

    /// Contexts built so far, including replacements for lost ones.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn lost(&self) -> usize {
        self.lost.load(Ordering::Relaxed)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

/// A checked-out context; returned to the pool on drop.
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    context: Option<Box<dyn FloodContext>>,
}

impl PooledContext<'_> {
    pub fn propagate(&mut self, seeds: &mut Vec<i32>, width: u32, height: u32) -> Result<()> {
        match self.context.as_mut() {
            Some(context) => context.propagate(seeds, width, height),
            None => Err(SheetpressError::ContextLost("context already discarded".into())),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.context.as_ref().map(|c| c.name()).unwrap_or("discarded")
    }

    /// Discard this context instead of returning it to the pool.
    pub fn mark_lost(mut self) {
        if let Some(context) = self.context.take() {
            let lost = self.pool.lost.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(backend = context.name(), lost, "flood context lost, discarding");
        }
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(context);
        }
    }
}
