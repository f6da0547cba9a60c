//! Sequencing gate
//!
//! Execute requests receive strictly increasing tokens in send order. A
//! completion may only append once every earlier token has completed, so the
//! store's order matches send order even when analysis and inspection round
//! trips finish out of order.
//!
//! Waiters park on a watch channel instead of polling. Completion is tied to
//! dropping the [`Turn`] guard, so an event that is dropped after taking its
//! turn still releases its successors.

use crate::error::StoreError;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Send-order token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceToken(pub u64);

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct GateState {
    /// Lowest token that has not completed
    next: u64,
    /// Completed tokens above `next`
    done: BTreeSet<u64>,
}

impl GateState {
    fn complete(&mut self, token: u64) {
        if token == self.next {
            self.next += 1;
            while self.done.remove(&self.next) {
                self.next += 1;
            }
        } else if token > self.next {
            self.done.insert(token);
        }
    }

    fn skip_to(&mut self, token: u64) {
        if token > self.next {
            self.done.retain(|t| *t > token);
            self.next = token;
        }
    }
}

/// Orders appends by send-order token
#[derive(Debug)]
pub struct SequenceGate {
    issued: AtomicU64,
    state: watch::Sender<GateState>,
}

impl SequenceGate {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::default());
        Self {
            issued: AtomicU64::new(0),
            state,
        }
    }

    /// Issue the next token; call in send order
    pub fn issue(&self) -> SequenceToken {
        SequenceToken(self.issued.fetch_add(1, Ordering::SeqCst))
    }

    /// Lowest token still pending
    #[must_use]
    pub fn next_pending(&self) -> u64 {
        self.state.borrow().next
    }

    /// Number of tokens issued so far
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Wait until every earlier token has completed
    ///
    /// With a `timeout`, a predecessor that has not completed in time is
    /// skipped; its own completion will later be reported stale.
    ///
    /// # Errors
    /// `StoreError::StaleToken` if this token was already skipped past
    pub async fn wait_turn(
        &self,
        token: SequenceToken,
        timeout: Option<Duration>,
    ) -> Result<Turn<'_>, StoreError> {
        let waiting = self.wait_for(token);
        match timeout {
            None => waiting.await?,
            Some(limit) => {
                if tokio::time::timeout(limit, waiting).await.is_err() {
                    let next = self.next_pending();
                    tracing::warn!(
                        "Sequence token {} waited {:?} for token {}; skipping stalled predecessors",
                        token,
                        limit,
                        next
                    );
                    self.state.send_modify(|state| state.skip_to(token.0));
                }
                let next = self.next_pending();
                if next != token.0 {
                    return Err(StoreError::StaleToken {
                        token: token.0,
                        next,
                    });
                }
            }
        }

        Ok(Turn {
            gate: self,
            token,
        })
    }

    async fn wait_for(&self, token: SequenceToken) -> Result<(), StoreError> {
        let mut rx = self.state.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.next == token.0 {
                    return Ok(());
                }
                if state.next > token.0 {
                    return Err(StoreError::StaleToken {
                        token: token.0,
                        next: state.next,
                    });
                }
            }
            // The sender lives in `self`, so the channel cannot close here
            if rx.changed().await.is_err() {
                return Err(StoreError::StaleToken {
                    token: token.0,
                    next: self.next_pending(),
                });
            }
        }
    }

    /// Mark a token complete without taking its turn
    ///
    /// Used for requests that will never see a completion (e.g. the kernel
    /// restarted before replying).
    pub fn release(&self, token: SequenceToken) {
        self.state.send_modify(|state| state.complete(token.0));
    }
}

impl Default for SequenceGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to append; completes its token on drop
#[derive(Debug)]
#[must_use = "dropping the turn immediately releases the next token"]
pub struct Turn<'a> {
    gate: &'a SequenceGate,
    token: SequenceToken,
}

impl Turn<'_> {
    #[inline]
    pub fn token(&self) -> SequenceToken {
        self.token
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.gate.release(self.token);
    }
}
