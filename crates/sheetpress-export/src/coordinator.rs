// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Task coordinator: renders the pages of one chunk on a small set of
// execution units and hands them to the sink strictly in page order.
//
// Units are tokio tasks that run each render on the blocking pool. They talk
// to the coordinator through one event channel; the coordinator answers each
// `Ready`/`PageComplete` with the next page or, once the queue is empty, by
// dropping the unit's inbox, which ends the unit. All assembly state (work
// queue, reorder buffer, sink, progress) lives behind a single lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sheetpress_core::error::{Result, SheetpressError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::renderer::{PageRenderer, PageSink, PageTask};
use crate::reorder::ReorderBuffer;

/// Upper bound on concurrently rendering pages.
pub const MAX_UNITS: usize = 4;

/// Default number of execution units for a machine with `cores` cores.
pub fn unit_count(cores: usize) -> usize {
    cores.div_ceil(2).clamp(1, MAX_UNITS)
}

/// Default number of execution units for this machine.
pub fn default_unit_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    unit_count(cores)
}

// -- Unit protocol -----------------------------------------------------------

enum UnitEvent<P> {
    Ready {
        unit: usize,
    },
    PageComplete {
        unit: usize,
        index: usize,
        cards: usize,
        page: P,
    },
    Failed {
        unit: usize,
        index: usize,
        error: SheetpressError,
    },
}

async fn unit_loop<R: PageRenderer>(
    unit: usize,
    renderer: Arc<R>,
    mut inbox: mpsc::Receiver<PageTask>,
    events: mpsc::UnboundedSender<UnitEvent<R::Page>>,
    abort: Arc<AtomicBool>,
) {
    if events.send(UnitEvent::Ready { unit }).is_err() {
        return;
    }

    while let Some(task) = inbox.recv().await {
        if abort.load(Ordering::Acquire) {
            break;
        }
        let index = task.index;
        let cards = task.card_count();
        let renderer = Arc::clone(&renderer);
        let flag = Arc::clone(&abort);
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&task, &flag)).await;

        let event = match rendered {
            Ok(Ok(page)) => UnitEvent::PageComplete {
                unit,
                index,
                cards,
                page,
            },
            Ok(Err(error)) => UnitEvent::Failed { unit, index, error },
            Err(join) => UnitEvent::Failed {
                unit,
                index,
                error: SheetpressError::Coordinator(format!("render task failed: {join}")),
            },
        };
        // A closed channel means the export was abandoned; the page is dropped here.
        if events.send(event).is_err() {
            break;
        }
    }
    debug!(unit, "execution unit stopped");
}

// -- Assembly state ----------------------------------------------------------

struct Assembly<P, S, F> {
    queue: VecDeque<PageTask>,
    reorder: ReorderBuffer<(P, usize)>,
    sink: Option<S>,
    cards_done: usize,
    progress: F,
}

fn lock<T>(state: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    state
        .lock()
        .map_err(|_| SheetpressError::Coordinator("assembly state poisoned".into()))
}

/// Apply one unit event. Returns `true` once every page has reached the sink.
fn handle_event<P, S, F>(
    state: &Mutex<Assembly<P, S, F>>,
    inboxes: &mut [Option<mpsc::Sender<PageTask>>],
    total: usize,
    event: UnitEvent<P>,
) -> Result<bool>
where
    S: PageSink<P>,
    F: FnMut(usize),
{
    let mut guard = lock(state)?;
    let st = &mut *guard;

    let unit = match event {
        UnitEvent::Ready { unit } => unit,
        UnitEvent::PageComplete {
            unit,
            index,
            cards,
            page,
        } => {
            let ready = st.reorder.insert(index, (page, cards)).map_err(|(index, _)| {
                SheetpressError::Coordinator(format!("page {index} completed twice"))
            })?;
            let sink = st
                .sink
                .as_mut()
                .ok_or_else(|| SheetpressError::Coordinator("sink already finished".into()))?;
            let drained = !ready.is_empty();
            for (index, (page, cards)) in ready {
                sink.append(index, page)?;
                st.cards_done += cards;
            }
            if drained {
                (st.progress)(st.cards_done);
            }
            debug!(unit, index, cursor = st.reorder.cursor(), held = st.reorder.pending(), "page complete");
            unit
        }
        UnitEvent::Failed { unit, index, error } => {
            return Err(match error {
                SheetpressError::Cancelled => SheetpressError::Cancelled,
                other => SheetpressError::UnitFailure {
                    unit,
                    page: index,
                    reason: other.to_string(),
                },
            });
        }
    };

    if st.reorder.cursor() == total {
        return Ok(true);
    }

    let slot = inboxes
        .get_mut(unit)
        .ok_or_else(|| SheetpressError::Coordinator(format!("unknown unit {unit}")))?;
    match st.queue.pop_front() {
        Some(task) => {
            let inbox = slot.as_ref().ok_or_else(|| {
                SheetpressError::Coordinator(format!("unit {unit} asked for work after stopping"))
            })?;
            let index = task.index;
            inbox.try_send(task).map_err(|e| {
                SheetpressError::Coordinator(format!("cannot assign page {index} to unit {unit}: {e}"))
            })?;
        }
        // Nothing left to hand out; dropping the inbox stops the unit.
        None => *slot = None,
    }
    Ok(false)
}

async fn join_units(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "execution unit did not shut down cleanly");
        }
    }
}

// -- Coordinator -------------------------------------------------------------

/// Schedules page tasks across execution units and assembles the result.
pub struct TaskCoordinator<R: PageRenderer> {
    renderer: Arc<R>,
    units: usize,
}

impl<R: PageRenderer> TaskCoordinator<R> {
    pub fn new(renderer: Arc<R>, units: usize) -> Self {
        Self {
            renderer,
            units: units.max(1),
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Render `tasks` and feed them to `sink` in index order.
    ///
    /// Task indices must be `0..tasks.len()`. `progress` receives the running
    /// count of cards whose page has reached the sink. On a unit failure or
    /// cancellation every unit is stopped and joined and every held page is
    /// dropped before the error is returned; no partial output escapes.
    #[instrument(skip_all, fields(pages = tasks.len(), units = self.units))]
    pub async fn run<S, F>(
        &self,
        tasks: Vec<PageTask>,
        sink: S,
        progress: F,
        cancel: &CancelSignal,
    ) -> Result<S::Output>
    where
        S: PageSink<R::Page>,
        F: FnMut(usize) + Send,
    {
        let total = tasks.len();
        if cancel.is_cancelled() {
            return Err(SheetpressError::Cancelled);
        }
        if total == 0 {
            return sink.finish();
        }

        let units = self.units.min(total);
        let abort = Arc::new(AtomicBool::new(false));
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let mut inboxes = Vec::with_capacity(units);
        let mut handles = Vec::with_capacity(units);
        for unit in 0..units {
            let (tx, rx) = mpsc::channel(1);
            inboxes.push(Some(tx));
            handles.push(tokio::spawn(unit_loop(
                unit,
                Arc::clone(&self.renderer),
                rx,
                event_tx.clone(),
                Arc::clone(&abort),
            )));
        }
        drop(event_tx);

        let state = Mutex::new(Assembly {
            queue: VecDeque::from(tasks),
            reorder: ReorderBuffer::new(),
            sink: Some(sink),
            cards_done: 0,
            progress,
        });

        let outcome = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(SheetpressError::Cancelled),
                event = events.recv() => event,
            };
            let Some(event) = event else {
                break Err(SheetpressError::Coordinator(
                    "execution units exited before the document was complete".into(),
                ));
            };
            match handle_event(&state, &mut inboxes, total, event) {
                Ok(false) => {}
                Ok(true) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(()) => {
                inboxes.clear();
                join_units(handles).await;
                let sink = lock(&state)?.sink.take().ok_or_else(|| {
                    SheetpressError::Coordinator("sink already finished".into())
                })?;
                let output = sink.finish()?;
                info!(pages = total, "chunk assembled");
                Ok(output)
            }
            Err(e) => {
                abort.store(true, Ordering::Release);
                inboxes.clear();
                drop(events);
                join_units(handles).await;
                {
                    let mut st = lock(&state)?;
                    st.reorder.clear();
                    st.sink = None;
                }
                match &e {
                    SheetpressError::Cancelled => info!("chunk cancelled"),
                    other => warn!(error = %other, "chunk aborted"),
                }
                Err(e)
            }
        }
    }
}
