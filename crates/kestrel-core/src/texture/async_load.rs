//! Background decoding of texture files.
//!
//! Workers only ever touch an [`AsyncSlot`]; the texture itself stays on the
//! render thread, which takes the staged pixels out of the slot and uploads
//! them. A discarded slot is never written again.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use kestrel_types::image::ImageFormat;

use super::pot::{self, Prepared};
use crate::decoder::ImageDecoder;

#[derive(Debug, Default)]
struct SlotState {
    queued: bool,
    discarded: bool,
    result: Option<Result<Prepared, String>>,
}

/// Hand-off point between one texture and the worker decoding it.
#[derive(Debug, Default)]
pub(crate) struct AsyncSlot {
    state: Mutex<SlotState>,
    done: Condvar,
}

impl AsyncSlot {
    fn new_queued() -> Self {
        Self {
            state: Mutex::new(SlotState {
                queued: true,
                ..SlotState::default()
            }),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // A worker that panicked mid-decode leaves consistent flags behind.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_queued(&self) -> bool {
        self.lock().queued
    }

    pub fn is_ready(&self) -> bool {
        self.lock().result.is_some()
    }

    /// Bytes held by a finished but not yet uploaded result.
    pub fn staged_bytes(&self) -> usize {
        match &self.lock().result {
            Some(Ok(prepared)) => prepared.byte_size(),
            _ => 0,
        }
    }

    /// Mark the job dropped; a worker that has not yet finished discards its
    /// result.
    pub fn discard(&self) {
        let mut state = self.lock();
        state.discarded = true;
        state.result = None;
    }

    /// Take a finished result, leaving the slot empty.
    pub fn take(&self) -> Option<Result<Prepared, String>> {
        self.lock().result.take()
    }

    /// Block until the job is no longer queued. A zero or negative timeout
    /// waits indefinitely. Returns whether the job finished.
    pub fn wait(&self, timeout: f32) -> bool {
        let mut state = self.lock();
        if timeout <= 0.0 || !timeout.is_finite() {
            while state.queued {
                state = self.done.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            return true;
        }
        let deadline = Instant::now() + Duration::from_secs_f32(timeout);
        while state.queued {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .done
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        true
    }

    fn finish(&self, result: Option<Result<Prepared, String>>) {
        let mut state = self.lock();
        if !state.discarded {
            state.result = result;
        }
        state.queued = false;
        self.done.notify_all();
    }

    fn is_discarded(&self) -> bool {
        self.lock().discarded
    }
}

struct AsyncJob {
    slot: Arc<AsyncSlot>,
    path: PathBuf,
    format: ImageFormat,
    pad: bool,
    decoder: Arc<dyn ImageDecoder>,
}

impl AsyncJob {
    fn run(self) {
        if self.slot.is_discarded() {
            self.slot.finish(None);
            return;
        }
        let result = std::fs::read(&self.path)
            .map_err(|e| format!("{}: {e}", self.path.display()))
            .and_then(|bytes| {
                self.decoder
                    .decode(&bytes)
                    .map_err(|e| format!("{}: {e}", self.path.display()))
            })
            .map(|image| pot::prepare(image, self.format, self.pad));
        if let Err(e) = &result {
            log::error!("async texture load failed: {e}");
        }
        self.slot.finish(Some(result));
    }
}

/// What a worker needs to turn a file into upload-ready pixels.
pub(crate) struct AsyncRequest {
    pub path: PathBuf,
    /// Storage format of the texture.
    pub format: ImageFormat,
    pub pad: bool,
    pub decoder: Arc<dyn ImageDecoder>,
}

/// Fixed pool of decode threads fed by a channel.
pub struct AsyncLoader {
    sender: Option<Sender<AsyncJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl AsyncLoader {
    pub fn new(workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<AsyncJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..workers.max(1))
            .filter_map(|i| {
                let receiver = Arc::clone(&receiver);
                std::thread::Builder::new()
                    .name(format!("kestrel-loader-{i}"))
                    .spawn(move || worker_loop(&receiver))
                    .map_err(|e| log::error!("failed to spawn texture loader thread: {e}"))
                    .ok()
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a decode; `None` if no worker is available.
    pub(crate) fn submit(&self, request: AsyncRequest) -> Option<Arc<AsyncSlot>> {
        if self.workers.is_empty() {
            return None;
        }
        let sender = self.sender.as_ref()?;
        let slot = Arc::new(AsyncSlot::new_queued());
        let job = AsyncJob {
            slot: Arc::clone(&slot),
            path: request.path,
            format: request.format,
            pad: request.pad,
            decoder: request.decoder,
        };
        sender.send(job).ok()?;
        Some(slot)
    }
}

fn worker_loop(receiver: &Mutex<Receiver<AsyncJob>>) {
    loop {
        let job = {
            let Ok(guard) = receiver.lock() else {
                return;
            };
            guard.recv()
        };
        match job {
            Ok(job) => job.run(),
            Err(_) => return,
        }
    }
}

impl Drop for AsyncLoader {
    fn drop(&mut self) {
        // Closing the channel lets idle workers exit once the queue drains.
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("texture loader thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::RawDecoder;

    fn request(path: PathBuf) -> AsyncRequest {
        AsyncRequest {
            path,
            format: ImageFormat::Rgb,
            pad: false,
            decoder: Arc::new(RawDecoder::new(2, 1, ImageFormat::Rgb)),
        }
    }

    #[test]
    fn decodes_file_on_worker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.raw");
        std::fs::write(&path, [1, 2, 3, 4, 5, 6]).unwrap();
        let loader = AsyncLoader::new(1);
        let slot = loader.submit(request(path)).unwrap();
        assert!(slot.wait(0.0));
        assert!(!slot.is_queued());
        assert_eq!(slot.staged_bytes(), 6);
        let prepared = slot.take().unwrap().unwrap();
        assert_eq!(prepared.data, vec![1, 2, 3, 4, 5, 6]);
        assert!(slot.take().is_none());
    }

    #[test]
    fn missing_file_reports_error() {
        let loader = AsyncLoader::new(1);
        let slot = loader
            .submit(request(PathBuf::from("/nonexistent/kestrel.raw")))
            .unwrap();
        slot.wait(0.0);
        assert!(matches!(slot.take(), Some(Err(_))));
    }

    #[test]
    fn discarded_slot_stays_empty() {
        let slot = AsyncSlot::new_queued();
        slot.discard();
        slot.finish(Some(Err("late".into())));
        assert!(!slot.is_queued());
        assert!(slot.take().is_none());
    }

    #[test]
    fn wait_times_out_on_unfinished_job() {
        let slot = AsyncSlot::new_queued();
        assert!(!slot.wait(0.01));
        assert!(slot.is_queued());
    }

    #[test]
    fn drop_joins_workers() {
        let loader = AsyncLoader::new(3);
        assert_eq!(loader.worker_count(), 3);
        drop(loader);
    }
}
