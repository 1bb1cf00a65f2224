use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::core::brain::{AgentBrain, TurnOutcome};

/// How long a conversation worker waits for more work before retiring.
const DEFAULT_IDLE: Duration = Duration::from_secs(30);

/// Anything that can run one turn of a conversation.
#[async_trait]
pub trait TurnRunner: Send + Sync {
    async fn run_turn(&self, conversation_id: i64) -> TurnOutcome;
}

#[async_trait]
impl TurnRunner for AgentBrain {
    async fn run_turn(&self, conversation_id: i64) -> TurnOutcome {
        AgentBrain::run_turn(self, conversation_id).await
    }
}

struct TurnJob {
    done: oneshot::Sender<TurnOutcome>,
}

/// Returned by `TurnQueue::submit`; awaiting it is optional.
pub struct TurnHandle {
    conversation_id: i64,
    done: oneshot::Receiver<TurnOutcome>,
}

impl TurnHandle {
    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    /// Wait for the turn to finish. `None` if the worker died mid-turn.
    pub async fn wait(self) -> Option<TurnOutcome> {
        self.done.await.ok()
    }
}

type WorkerMap = Arc<Mutex<HashMap<i64, mpsc::UnboundedSender<TurnJob>>>>;

/// Runs turns in the background with one worker per conversation, so turns of
/// the same conversation never overlap while different conversations proceed
/// in parallel.
pub struct TurnQueue {
    runner: Arc<dyn TurnRunner>,
    workers: WorkerMap,
    idle: Duration,
}

impl TurnQueue {
    pub fn new(runner: Arc<dyn TurnRunner>) -> Self {
        Self::with_idle_timeout(runner, DEFAULT_IDLE)
    }

    pub fn with_idle_timeout(runner: Arc<dyn TurnRunner>, idle: Duration) -> Self {
        Self {
            runner,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle,
        }
    }

    /// Queue a turn. Never blocks; must be called inside a tokio runtime.
    pub fn submit(&self, conversation_id: i64) -> TurnHandle {
        let (done_tx, done_rx) = oneshot::channel();
        let handle = TurnHandle {
            conversation_id,
            done: done_rx,
        };

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        let mut job = TurnJob { done: done_tx };
        if let Some(sender) = workers.get(&conversation_id) {
            match sender.send(job) {
                Ok(()) => return handle,
                Err(mpsc::error::SendError(returned)) => {
                    warn!(
                        "Worker for conversation {} is gone; starting a new one",
                        conversation_id
                    );
                    job = returned;
                }
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is still in scope.
        let _ = sender.send(job);
        workers.insert(conversation_id, sender);
        drop(workers);

        debug!("Starting worker for conversation {}", conversation_id);
        tokio::spawn(worker_loop(
            Arc::clone(&self.runner),
            Arc::clone(&self.workers),
            conversation_id,
            receiver,
            self.idle,
        ));
        handle
    }

    /// Number of conversations with a live worker.
    #[cfg(test)]
    pub fn active_workers(&self) -> usize {
        self.workers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

async fn worker_loop(
    runner: Arc<dyn TurnRunner>,
    workers: WorkerMap,
    conversation_id: i64,
    mut jobs: mpsc::UnboundedReceiver<TurnJob>,
    idle: Duration,
) {
    loop {
        let job = match tokio::time::timeout(idle, jobs.recv()).await {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(_) => {
                // Submitters send while holding the map lock, so an empty
                // queue seen under the lock means nobody can still reach us.
                let mut map = workers.lock().unwrap_or_else(|e| e.into_inner());
                match jobs.try_recv() {
                    Ok(job) => job,
                    Err(_) => {
                        map.remove(&conversation_id);
                        debug!("Worker for conversation {} retired", conversation_id);
                        break;
                    }
                }
            }
        };

        let outcome = runner.run_turn(conversation_id).await;
        let _ = job.done.send(outcome);
    }
}
