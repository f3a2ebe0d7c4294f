// Command and transaction matching

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::RtmpError;
use crate::rtmp::RtmpCommand;

/// One-shot completion for a pending command
pub type CommandCompletion = oneshot::Sender<Result<RtmpCommand, RtmpError>>;

/// A waiter for an onStatus notification, matched by code prefix
struct StatusWaiter {
    code_prefix: Option<String>,
    completion: CommandCompletion,
}

/// Pending completions keyed by transaction id or status code
///
/// Owned by the reactor task; callers register waiters through the
/// reactor's request channel, so no lock guards this table.
#[derive(Default)]
pub struct TransactionTable {
    by_id: HashMap<u32, CommandCompletion>,
    status_waiters: Vec<StatusWaiter>,
}

impl TransactionTable {
    pub fn new() -> TransactionTable {
        TransactionTable::default()
    }

    /// Registers a waiter for a `_result`/`_error` with this id.
    /// A previous waiter on the same id is failed and replaced.
    pub fn register(&mut self, transaction_id: u32, completion: CommandCompletion) {
        if let Some(previous) = self.by_id.insert(transaction_id, completion) {
            let _ = previous.send(Err(RtmpError::protocol(format!(
                "transaction {} superseded by a new waiter",
                transaction_id
            ))));
        }
    }

    /// Registers a waiter for an onStatus notification. With a code
    /// prefix, only an info object whose `code` starts with it
    /// completes the waiter.
    pub fn register_status(&mut self, code_prefix: Option<String>, completion: CommandCompletion) {
        self.status_waiters.push(StatusWaiter {
            code_prefix,
            completion,
        });
    }

    /// Routes a `_result`/`_error` to its waiter.
    /// Returns the command back when nobody was waiting.
    pub fn complete(&mut self, command: RtmpCommand) -> Option<RtmpCommand> {
        let transaction_id = command.transaction_id as u32;

        match self.by_id.remove(&transaction_id) {
            Some(completion) => {
                let result = if command.is_error() {
                    Err(RtmpError::remote(command))
                } else {
                    Ok(command)
                };

                let _ = completion.send(result);
                None
            }
            None => Some(command),
        }
    }

    /// Routes an onStatus to the first waiter whose prefix matches.
    /// Error-level statuses fail the waiter with RemoteServerError.
    /// Returns the command back when nobody matched.
    pub fn complete_status(&mut self, command: RtmpCommand) -> Option<RtmpCommand> {
        let code = command.info_code().unwrap_or("");

        let position = self.status_waiters.iter().position(|waiter| {
            waiter
                .code_prefix
                .as_ref()
                .map(|prefix| code.starts_with(prefix.as_str()))
                .unwrap_or(true)
        });

        match position {
            Some(position) => {
                let waiter = self.status_waiters.remove(position);

                let result = if command.is_error_status() {
                    Err(RtmpError::remote(command))
                } else {
                    Ok(command)
                };

                let _ = waiter.completion.send(result);
                None
            }
            None => Some(command),
        }
    }

    /// Fails every outstanding completion with ConnectionClosed
    /// carrying the original cause
    pub fn fail_all(&mut self, cause: &str) {
        for (_, completion) in self.by_id.drain() {
            let _ = completion.send(Err(RtmpError::closed(cause)));
        }

        for waiter in self.status_waiters.drain(..) {
            let _ = waiter.completion.send(Err(RtmpError::closed(cause)));
        }
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.status_waiters.is_empty()
    }
}
