//! Turn Queue
//!
//! Runs an `AgentLoop` on its own task. Callers submit turns through a
//! bounded channel and get the answer back on a oneshot, so new turns can be
//! queued while the current one is still generating.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::agent_loop::AgentLoop;
use crate::utils::error::{AppError, AppResult};

struct TurnRequest {
    text: String,
    reply: oneshot::Sender<String>,
}

/// Cloneable front end of the agent worker task.
///
/// The worker stops once every handle is dropped and then shuts the tool
/// worker down.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<TurnRequest>,
}

impl AgentHandle {
    /// Spawn the worker task that owns `agent`.
    pub fn spawn(agent: AgentLoop, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(agent, rx));
        (Self { tx }, worker)
    }

    /// Queue a turn; the receiver resolves with its answer.
    pub async fn submit(&self, text: impl Into<String>) -> AppResult<oneshot::Receiver<String>> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(TurnRequest {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| AppError::internal("agent worker has stopped"))?;
        Ok(answer)
    }

    /// Queue a turn and wait for its answer.
    pub async fn ask(&self, text: impl Into<String>) -> AppResult<String> {
        let answer = self.submit(text).await?;
        answer
            .await
            .map_err(|_| AppError::internal("agent worker dropped the turn"))
    }
}

async fn run_worker(mut agent: AgentLoop, mut rx: mpsc::Receiver<TurnRequest>) {
    let mut turns: u64 = 0;
    while let Some(TurnRequest { text, reply }) = rx.recv().await {
        turns += 1;
        let answer = agent.handle_turn(&text).await;
        if reply.send(answer).is_err() {
            tracing::debug!(turn = turns, "Caller went away before the answer was ready");
        }
    }
    tracing::info!(turns, "Turn queue closed; shutting down tool worker");
    agent.shutdown().await;
}
