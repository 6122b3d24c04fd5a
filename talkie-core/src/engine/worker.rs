//! The Engine Worker (§4.4): a dedicated thread that owns a
//! [`RecognizerHandle`] exclusively and drains a bounded FIFO command queue.
//!
//! `process-async` never blocks the caller — it is a plain channel send.
//! `reset` and `close` are synchronous barriers: the caller blocks on an
//! ack channel until the worker has drained everything enqueued ahead of
//! them, matching §4.4's "operations are applied strictly in the order
//! enqueued" requirement.

use std::sync::mpsc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use tracing::{error, info, warn};

use crate::audio::chunk::PcmChunk;
use crate::engine::recognizer::{Alternative, RecognitionResult, RecognizerHandle};
use crate::error::Result;

/// Queue depth for the Engine Worker's command channel. Deep enough to
/// absorb a burst of `process-async` sends without the Audio Worker ever
/// blocking on a full queue during normal operation.
const QUEUE_DEPTH: usize = 256;

enum Command {
    ProcessAsync(PcmChunk),
    /// `discard` carries forward the Audio Worker's too-short-utterance
    /// verdict so the Result Dispatcher sees it attached to the very Final
    /// it applies to, preserving FIFO ordering without a side channel.
    FinalAsync { discard: bool },
    Reset(mpsc::Sender<Result<()>>),
    Close(mpsc::Sender<Result<()>>),
}

/// Events posted from the Engine Worker to the Result Dispatcher, in the
/// same order the underlying recognizer produced them.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Partial { text: String },
    Final {
        alternatives: Vec<Alternative>,
        discard: bool,
    },
    /// Child death or framing error: the worker is now refusing requests
    /// until the application re-initializes it.
    Fatal { detail: String },
}

/// A cheap, cloneable send-side handle to a running Engine Worker.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<Command>,
}

impl EngineHandle {
    /// Enqueue a chunk for recognition. Never blocks under normal load;
    /// only backs up if the queue is saturated, at which point it applies
    /// ordinary channel backpressure rather than dropping silently.
    pub fn process_async(&self, chunk: PcmChunk) {
        if self.tx.send(Command::ProcessAsync(chunk)).is_err() {
            warn!("engine worker command queue closed; chunk dropped");
        }
    }

    pub fn final_async(&self, discard: bool) {
        if self.tx.send(Command::FinalAsync { discard }).is_err() {
            warn!("engine worker command queue closed; final request dropped");
        }
    }

    /// Synchronous barrier: blocks until every command enqueued before this
    /// call has been applied and the recognizer has reset its state.
    pub fn reset(&self) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Command::Reset(ack_tx)).is_err() {
            return Ok(());
        }
        ack_rx.recv().unwrap_or(Ok(()))
    }

    /// Synchronous barrier: blocks until the worker has drained its queue
    /// and torn down the recognizer.
    pub fn close(&self) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Command::Close(ack_tx)).is_err() {
            return Ok(());
        }
        ack_rx.recv().unwrap_or(Ok(()))
    }
}

/// Spawn the Engine Worker thread. `on_event` is called on the worker
/// thread itself for every posted event — callers that need main-thread
/// delivery should have it forward through their own channel.
pub fn spawn<F>(recognizer: RecognizerHandle, mut on_event: F) -> (EngineHandle, JoinHandle<()>)
where
    F: FnMut(EngineEvent) + Send + 'static,
{
    let (tx, rx) = bounded::<Command>(QUEUE_DEPTH);

    let join = std::thread::spawn(move || {
        let mut recognizer = recognizer;
        let mut fatal = false;

        for command in rx {
            if fatal {
                // Refuse further requests until the user re-initializes,
                // per §4.4's fatal-engine lifecycle; still ack barriers so
                // callers waiting on reset/close don't hang forever.
                match command {
                    Command::Reset(ack) => {
                        let _ = ack.send(Ok(()));
                    }
                    Command::Close(ack) => {
                        let _ = ack.send(Ok(()));
                        break;
                    }
                    _ => {}
                }
                continue;
            }

            match command {
                Command::ProcessAsync(chunk) => match recognizer.process(&chunk) {
                    Ok(Some(RecognitionResult::Partial { text })) => {
                        on_event(EngineEvent::Partial { text });
                    }
                    Ok(Some(RecognitionResult::Final { alternatives })) => {
                        // A backend that emits Final from `process` rather
                        // than waiting for an explicit final-async — still
                        // valid per the Recognizer Handle contract.
                        on_event(EngineEvent::Final {
                            alternatives,
                            discard: false,
                        });
                    }
                    Ok(None) => {}
                    Err(crate::error::Error::EngineFatal { detail }) => {
                        error!(detail = %detail, "engine worker: fatal error during process");
                        fatal = true;
                        on_event(EngineEvent::Fatal { detail });
                    }
                    Err(e) => {
                        // Recognition transient (§7): log, drop, continue.
                        warn!(error = %e, "recognition error on chunk, dropping");
                    }
                },

                Command::FinalAsync { discard } => match recognizer.final_() {
                    Ok(Some(RecognitionResult::Final { alternatives })) => {
                        on_event(EngineEvent::Final {
                            alternatives,
                            discard,
                        });
                    }
                    Ok(Some(RecognitionResult::Partial { text })) => {
                        on_event(EngineEvent::Partial { text });
                    }
                    Ok(None) => {}
                    Err(crate::error::Error::EngineFatal { detail }) => {
                        error!(detail = %detail, "engine worker: fatal error during final");
                        fatal = true;
                        on_event(EngineEvent::Fatal { detail });
                    }
                    Err(e) => {
                        warn!(error = %e, "recognition error on final, dropping");
                    }
                },

                Command::Reset(ack) => {
                    let result = recognizer.reset();
                    if let Err(e) = &result {
                        warn!(error = %e, "engine worker: reset failed");
                    }
                    let _ = ack.send(result);
                }

                Command::Close(ack) => {
                    info!("engine worker: closing recognizer");
                    let result = std::mem::replace(
                        &mut recognizer,
                        // Placeholder never used again: the loop breaks
                        // immediately after.
                        RecognizerHandle::InProcess(Box::new(
                            crate::engine::inprocess::StubModel::new(),
                        )),
                    )
                    .close();
                    let _ = ack.send(result);
                    break;
                }
            }
        }
    });

    (EngineHandle { tx }, join)
}
