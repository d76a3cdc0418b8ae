// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-job serialized status writer.
//!
//! All updates to one job's status document execute sequentially in FIFO
//! arrival order, across any number of async callers, without OS file
//! locks: each job directory gets a lazily-spawned mailbox worker that
//! drains queued updates one read-modify-write turn at a time. When a
//! queue runs dry its worker exits and the map entry is dropped.
//!
//! Every committed turn stamps `lastUpdated`, writes atomically, and
//! publishes `state:change`. A failing update function rejects only its
//! own caller; the queue continues with the next update.

use crate::status_io::{load_status, save_status, StatusIoError};
use relay_core::{BusEvent, Clock, EventSink, StatusDoc, SystemClock, TaskRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors surfaced to a writer's caller.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("update failed: {0}")]
    Update(String),
    #[error(transparent)]
    Io(#[from] StatusIoError),
    #[error("status writer queue closed")]
    QueueClosed,
}

type UpdateFn = Box<dyn FnOnce(&mut StatusDoc) -> Result<(), String> + Send>;

struct Turn {
    update: UpdateFn,
    reply: oneshot::Sender<Result<StatusDoc, WriteError>>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    queues: parking_lot::Mutex<HashMap<PathBuf, mpsc::UnboundedSender<Turn>>>,
}

/// Serialized read-modify-write access to status documents.
#[derive(Clone)]
pub struct StatusWriter {
    inner: Arc<Inner>,
}

impl StatusWriter {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                sink,
                queues: parking_lot::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Writer with the wall clock and the given sink.
    pub fn system(sink: Arc<dyn EventSink>) -> Self {
        Self::new(Arc::new(SystemClock), sink)
    }

    /// Queue an update for `job_dir`'s status document. Resolves once the
    /// turn commits (or fails); the returned document is the committed
    /// state.
    pub async fn update<F>(&self, job_dir: &Path, f: F) -> Result<StatusDoc, WriteError>
    where
        F: FnOnce(&mut StatusDoc) -> Result<(), String> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.enqueue(
            job_dir,
            Turn {
                update: Box::new(f),
                reply,
            },
        );
        rx.await.map_err(|_| WriteError::QueueClosed)?
    }

    /// Create-or-update one task record, recompute the derived fields,
    /// and emit `task:updated` alongside the commit's `state:change`.
    pub async fn update_task<F>(
        &self,
        job_dir: &Path,
        task_name: &str,
        f: F,
    ) -> Result<StatusDoc, WriteError>
    where
        F: FnOnce(&mut TaskRecord) + Send + 'static,
    {
        let name = task_name.to_string();
        let doc = self
            .update(job_dir, move |doc| {
                f(doc.ensure_task(&name));
                doc.recompute();
                Ok(())
            })
            .await?;

        if let Some(task) = doc.tasks.get(task_name) {
            self.inner.sink.publish(BusEvent::TaskUpdated {
                job_id: doc.id.clone(),
                task_id: task_name.to_string(),
                task: task.clone(),
            });
        }
        Ok(doc)
    }

    /// Reset every task at or after `from_task`. `order` is the pipeline's
    /// task order; when absent the document's own insertion order is used.
    pub async fn reset_from_task(
        &self,
        job_dir: &Path,
        from_task: &str,
        order: Option<Vec<String>>,
        clear_token_usage: bool,
    ) -> Result<StatusDoc, WriteError> {
        let from = from_task.to_string();
        self.update(job_dir, move |doc| {
            if doc.reset_from_task(&from, order.as_deref(), clear_token_usage) {
                Ok(())
            } else {
                Err(format!("task {from:?} not found"))
            }
        })
        .await
    }

    /// Reset all tasks to pending; file lists untouched.
    pub async fn reset_clean_slate(
        &self,
        job_dir: &Path,
        clear_token_usage: bool,
    ) -> Result<StatusDoc, WriteError> {
        self.update(job_dir, move |doc| {
            doc.reset_all(clear_token_usage);
            Ok(())
        })
        .await
    }

    /// Reset one task only.
    pub async fn reset_single_task(
        &self,
        job_dir: &Path,
        task_name: &str,
        clear_token_usage: bool,
    ) -> Result<StatusDoc, WriteError> {
        let name = task_name.to_string();
        self.update(job_dir, move |doc| {
            if doc.reset_single(&name, clear_token_usage) {
                Ok(())
            } else {
                Err(format!("task {name:?} not found"))
            }
        })
        .await
    }

    fn enqueue(&self, job_dir: &Path, turn: Turn) {
        let mut queues = self.inner.queues.lock();
        let turn = match queues.get(job_dir) {
            Some(sender) => match sender.send(turn) {
                Ok(()) => return,
                // Stale entry: the worker is gone. Replace it below.
                Err(mpsc::error::SendError(turn)) => {
                    queues.remove(job_dir);
                    turn
                }
            },
            None => turn,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(Arc::clone(&self.inner), job_dir.to_path_buf(), rx));
        let _ = tx.send(turn);
        queues.insert(job_dir.to_path_buf(), tx);
    }
}

/// Drain one job directory's queue, then retire.
async fn worker(inner: Arc<Inner>, job_dir: PathBuf, mut rx: mpsc::UnboundedReceiver<Turn>) {
    loop {
        let turn = match rx.try_recv() {
            Ok(turn) => turn,
            Err(mpsc::error::TryRecvError::Disconnected) => break,
            Err(mpsc::error::TryRecvError::Empty) => {
                // Retire the queue entry, but only if it is still empty
                // under the map lock (enqueue sends while holding it, so
                // this check cannot race with a new arrival).
                let mut queues = inner.queues.lock();
                match rx.try_recv() {
                    Ok(turn) => {
                        drop(queues);
                        turn
                    }
                    Err(_) => {
                        queues.remove(&job_dir);
                        break;
                    }
                }
            }
        };

        let result = process_turn(&inner, &job_dir, turn.update);
        let _ = turn.reply.send(result);
    }
}

/// One read-modify-write turn.
fn process_turn(inner: &Inner, job_dir: &Path, update: UpdateFn) -> Result<StatusDoc, WriteError> {
    let job_id = job_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let status_path = job_dir.join("tasks-status.json");
    let now = inner.clock.iso();

    let mut doc = load_status(&status_path, &job_id, &now)?;
    update(&mut doc).map_err(WriteError::Update)?;
    doc.last_updated = inner.clock.iso();
    save_status(&status_path, &doc)?;

    // Best-effort emission; the sink contract forbids failing back here.
    inner.sink.publish(BusEvent::StateChange {
        job_id,
        path: status_path,
        timestamp: doc.last_updated.clone(),
    });

    Ok(doc)
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
