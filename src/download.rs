//! Download tables: a row source that fetches its wires on a worker pool
//! and hands rows to the consumer in wire order.
//!
//! Workers claim wires in increasing index order and park each outcome in
//! that wire's slot. The consumer walks the slots in order and blocks on
//! the first one that is not filled yet, so output order never depends on
//! which fetch finishes first.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use crate::dom::{DomFactory, Document, load_document};
use crate::error::RuntimeError;
use crate::http::{DownloadError, DynamicObject, RequestFactory, Wire, json_rows};

/// A fetched and parsed HTML page.
pub struct DownloadPage {
    pub url: String,
    pub date: DateTime<Utc>,
    /// Body size in bytes.
    pub size: usize,
    pub document: Box<dyn Document>,
}

impl DownloadPage {
    pub fn date_text(&self) -> String {
        self.date.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl std::fmt::Debug for DownloadPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadPage")
            .field("url", &self.url)
            .field("date", &self.date)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// A fetched image, kept as raw bytes.
#[derive(Debug, Clone)]
pub struct DownloadImage {
    pub url: String,
    pub date: DateTime<Utc>,
    /// Generated `<uuid><extension>` name; empty when the body is empty.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl DownloadImage {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn date_text(&self) -> String {
        self.date.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Extension of the last path segment of `url`, dot included.
fn url_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind('.') {
        Some(dot) if dot > 0 => &segment[dot..],
        _ => "",
    }
}

type ParseFn<T> = dyn Fn(&Wire, Vec<u8>) -> Result<T, DownloadError> + Send + Sync;

enum SlotState<T> {
    Pending,
    Ready(Result<T, DownloadError>),
    Taken,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    cv: Condvar,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            cv: Condvar::new(),
        }
    }

    fn finish(&self, outcome: Result<T, DownloadError>) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Ready(outcome);
            self.cv.notify_all();
        }
    }

    fn wait(&self) -> Result<T, DownloadError> {
        let mut guard = self.state.lock();
        loop {
            match std::mem::replace(&mut *guard, SlotState::Taken) {
                SlotState::Ready(outcome) => return outcome,
                SlotState::Taken => return Err(DownloadError::Consumed),
                SlotState::Pending => {
                    *guard = SlotState::Pending;
                    self.cv.wait(&mut guard);
                }
            }
        }
    }
}

struct Shared<T> {
    wires: Vec<Wire>,
    slots: Vec<Slot<T>>,
    next: AtomicUsize,
    aborted: AtomicBool,
    stop_on_error: bool,
}

/// Rows of a download source, fetched in the background.
///
/// Dropping the table stops workers from claiming further wires and joins
/// them; fetches already in flight run to completion.
pub struct DownloadTable<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> DownloadTable<T> {
    /// Starts `threads` workers (at least one, at most one per wire).
    ///
    /// With `stop_on_error`, the first failure stops workers from claiming
    /// later wires, since the consumer will not read past it.
    pub fn spawn<F>(
        wires: Vec<Wire>,
        threads: usize,
        stop_on_error: bool,
        requests: Arc<dyn RequestFactory>,
        parse: F,
    ) -> Self
    where
        F: Fn(&Wire, Vec<u8>) -> Result<T, DownloadError> + Send + Sync + 'static,
    {
        let slots = wires.iter().map(|_| Slot::new()).collect();
        let count = threads.min(wires.len()).max(1);
        let shared = Arc::new(Shared {
            wires,
            slots,
            next: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
            stop_on_error,
        });
        let parse: Arc<ParseFn<T>> = Arc::new(parse);

        let mut workers = Vec::with_capacity(count);
        if !shared.wires.is_empty() {
            for _ in 0..count {
                let shared = Arc::clone(&shared);
                let requests = Arc::clone(&requests);
                let parse = Arc::clone(&parse);
                workers.push(thread::spawn(move || work(&shared, requests.as_ref(), parse.as_ref())));
            }
        }
        tracing::debug!(wires = shared.wires.len(), workers = workers.len(), "download table started");

        DownloadTable { shared, workers }
    }

    pub fn len(&self) -> usize {
        self.shared.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.wires.is_empty()
    }

    pub fn wire(&self, index: usize) -> Option<&Wire> {
        self.shared.wires.get(index)
    }

    /// One unresolved row per wire, available before any fetch completes.
    pub fn rows(&self) -> impl Iterator<Item = LazyRow<'_, T>> + '_ {
        (0..self.len()).map(move |index| LazyRow { table: self, index })
    }

    /// Blocks until wire `index` is fetched and parsed, then takes its result.
    pub fn wait(&self, index: usize) -> Result<T, RuntimeError> {
        let wire = self.shared.wires.get(index).ok_or_else(|| {
            RuntimeError::Type(format!("download table has no wire {}", index))
        })?;
        self.shared.slots[index]
            .wait()
            .map_err(|source| RuntimeError::Download {
                index,
                url: wire.url.clone(),
                source,
            })
    }
}

impl<T: Send + 'static> Drop for DownloadTable<T> {
    fn drop(&mut self) {
        self.shared.aborted.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("download worker exited abnormally");
            }
        }
    }
}

/// Handle to one row of a download table; resolving it waits for the fetch.
pub struct LazyRow<'t, T: Send + 'static> {
    table: &'t DownloadTable<T>,
    index: usize,
}

impl<'t, T: Send + 'static> LazyRow<'t, T> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn wire(&self) -> &'t Wire {
        &self.table.shared.wires[self.index]
    }

    pub fn resolve(self) -> Result<T, RuntimeError> {
        self.table.wait(self.index)
    }
}

fn work<T>(shared: &Shared<T>, requests: &dyn RequestFactory, parse: &ParseFn<T>) {
    loop {
        if shared.aborted.load(Ordering::Acquire) {
            break;
        }
        let index = shared.next.fetch_add(1, Ordering::AcqRel);
        let Some(wire) = shared.wires.get(index) else {
            break;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let body = requests.create(wire).download()?;
            parse(wire, body)
        }))
        .unwrap_or(Err(DownloadError::Panicked));

        match &outcome {
            Ok(_) => tracing::debug!(index, url = %wire.url, "wire fetched"),
            Err(e) => {
                tracing::warn!(index, url = %wire.url, error = %e, "wire failed");
                if shared.stop_on_error {
                    shared.aborted.store(true, Ordering::Release);
                }
            }
        }
        shared.slots[index].finish(outcome);
    }
}

/// Download table over HTML pages, parsed with `dom`.
pub fn download_pages(
    wires: Vec<Wire>,
    threads: usize,
    stop_on_error: bool,
    requests: Arc<dyn RequestFactory>,
    dom: Arc<dyn DomFactory>,
) -> DownloadTable<DownloadPage> {
    DownloadTable::spawn(wires, threads, stop_on_error, requests, move |wire, body| {
        let size = body.len();
        let text = String::from_utf8_lossy(&body);
        let document = load_document(dom.as_ref(), &text)
            .map_err(|e| DownloadError::Parse(e.to_string()))?;
        Ok(DownloadPage {
            url: wire.url.clone(),
            date: Utc::now(),
            size,
            document,
        })
    })
}

/// Download table over images; each wire yields one row of raw bytes.
pub fn download_images(
    wires: Vec<Wire>,
    threads: usize,
    stop_on_error: bool,
    requests: Arc<dyn RequestFactory>,
) -> DownloadTable<DownloadImage> {
    DownloadTable::spawn(wires, threads, stop_on_error, requests, |wire, bytes| {
        let filename = if bytes.is_empty() {
            String::new()
        } else {
            format!("{}{}", Uuid::new_v4().simple(), url_extension(&wire.url))
        };
        Ok(DownloadImage {
            url: wire.url.clone(),
            date: Utc::now(),
            filename,
            bytes,
        })
    })
}

/// Download table over JSON responses; each wire yields zero or more objects.
pub fn download_json(
    wires: Vec<Wire>,
    threads: usize,
    stop_on_error: bool,
    requests: Arc<dyn RequestFactory>,
) -> DownloadTable<Vec<DynamicObject>> {
    DownloadTable::spawn(wires, threads, stop_on_error, requests, |_, body| {
        json_rows(&body)
    })
}
