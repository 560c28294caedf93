use tokio::sync::{
    mpsc::{self, error::TryRecvError, error::TrySendError},
    oneshot,
};
use tracing::debug;

use super::IngestError;

/// Token that starts a run immediately.
pub const BEGIN_JOB: &str = "begin job";
/// Token that cancels the run in progress, if any.
pub const ABORT_JOB: &str = "abort job";

const CONTROL_CAPACITY: usize = 16;
const STATUS_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    BeginJob,
    AbortJob,
    /// Accepted into the mailbox but ignored by the consumer.
    Unrecognized(String),
}

impl From<&str> for ControlMessage {
    fn from(token: &str) -> Self {
        match token {
            BEGIN_JOB => ControlMessage::BeginJob,
            ABORT_JOB => ControlMessage::AbortJob,
            other => ControlMessage::Unrecognized(other.to_string()),
        }
    }
}

pub type ControlMailbox = mpsc::Receiver<ControlMessage>;

/// Reply slot for one status query.
pub type StatusRequest = oneshot::Sender<String>;
pub type StatusMailbox = mpsc::Receiver<StatusRequest>;

pub fn control_mailbox() -> (ControlSender, ControlMailbox) {
    let (tx, rx) = mpsc::channel(CONTROL_CAPACITY);
    (ControlSender { tx }, rx)
}

pub(super) fn status_mailbox() -> (StatusHandle, StatusMailbox) {
    let (tx, rx) = mpsc::channel(STATUS_CAPACITY);
    (StatusHandle { tx }, rx)
}

/// Producer side of the control mailbox. Dropping every sender closes the
/// mailbox, which stops the scheduler once it is idle.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControlSender {
    pub fn begin(&self) -> Result<(), IngestError> {
        self.send(ControlMessage::BeginJob)
    }

    pub fn abort(&self) -> Result<(), IngestError> {
        self.send(ControlMessage::AbortJob)
    }

    pub fn send_token(&self, token: &str) -> Result<(), IngestError> {
        self.send(ControlMessage::from(token))
    }

    fn send(&self, message: ControlMessage) -> Result<(), IngestError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            // tokens coalesce, so one already waiting has the same effect
            Err(TrySendError::Full(message)) => {
                debug!(?message, "control mailbox full, dropping token");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(IngestError::Stopped),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusHandle {
    tx: mpsc::Sender<StatusRequest>,
}

impl StatusHandle {
    /// Asks the scheduler for its current status and waits for the answer.
    ///
    /// There is no timeout: the reply arrives at the scheduler's next poll
    /// point, which during a run is the next CSV record. Once the scheduler
    /// has stopped this returns [`IngestError::Stopped`].
    pub async fn status(&self) -> Result<String, IngestError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(reply_tx)
            .await
            .map_err(|_| IngestError::Stopped)?;
        reply_rx.await.map_err(|_| IngestError::Stopped)
    }
}

/// Empties the control mailbox without waiting. Returns true if an abort
/// was among the pending tokens.
pub fn drain_control(mailbox: &mut ControlMailbox) -> bool {
    let mut abort_requested = false;
    loop {
        match mailbox.try_recv() {
            Ok(ControlMessage::AbortJob) => abort_requested = true,
            Ok(_) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                return abort_requested
            }
        }
    }
}

/// Answers every pending status request with the same snapshot. Requests
/// whose caller has gone away are dropped.
pub fn answer_status<F>(mailbox: &mut StatusMailbox, snapshot: F)
where
    F: FnOnce() -> String,
{
    let Ok(first) = mailbox.try_recv() else {
        return;
    };
    let text = snapshot();
    let _ = first.send(text.clone());
    while let Ok(reply) = mailbox.try_recv() {
        let _ = reply.send(text.clone());
    }
}
