//! Dispatch state machine: pure transitions from (state, event) to effects.
//!
//! No timers, no I/O. The engine feeds events in and carries out the
//! returned effects, which keeps the turn-taking rules unit-testable.

use std::collections::VecDeque;

/// Identifier of one accepted submission, unique within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user message waiting for, or undergoing, a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub id: SubmissionId,
    pub text: String,
}

/// Engine phase. `Dispatching` means exactly one gateway round (and its
/// reveal, and the cooldown before a queued follow-up) is underway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dispatching,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A non-blank user message was accepted.
    Submitted(PendingMessage),
    /// The current dispatch revealed all of its segments.
    RevealCompleted,
    /// The caller withdrew a submission that has not started yet.
    CancelRequested(SubmissionId),
}

/// Work the engine must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEffect {
    /// Start a dispatch for `message`; wait the inter-turn cooldown first when set.
    Dispatch {
        message: PendingMessage,
        after_cooldown: bool,
    },
    /// The submission was parked behind the current dispatch.
    Queued(SubmissionId),
    /// The queued submission was removed.
    Cancelled(SubmissionId),
    /// Nothing left to do.
    BecameIdle,
}

/// FIFO of submissions made while a dispatch was underway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingQueue {
    items: VecDeque<PendingMessage>,
}

impl PendingQueue {
    pub fn push(&mut self, message: PendingMessage) {
        self.items.push_back(message);
    }

    pub fn pop(&mut self) -> Option<PendingMessage> {
        self.items.pop_front()
    }

    pub fn remove(&mut self, id: SubmissionId) -> Option<PendingMessage> {
        let position = self.items.iter().position(|item| item.id == id)?;
        self.items.remove(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingMessage> {
        self.items.iter()
    }
}

/// Busy flag plus pending queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchState {
    phase: Phase,
    queue: PendingQueue,
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            queue: PendingQueue::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Dispatching
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Apply one event and return the effects to carry out, in order.
    pub fn apply(&mut self, event: DispatchEvent) -> Vec<DispatchEffect> {
        match (self.phase, event) {
            (Phase::Idle, DispatchEvent::Submitted(message)) => {
                self.phase = Phase::Dispatching;
                vec![DispatchEffect::Dispatch {
                    message,
                    after_cooldown: false,
                }]
            }
            (Phase::Dispatching, DispatchEvent::Submitted(message)) => {
                let id = message.id;
                self.queue.push(message);
                vec![DispatchEffect::Queued(id)]
            }
            (Phase::Dispatching, DispatchEvent::RevealCompleted) => match self.queue.pop() {
                Some(message) => vec![DispatchEffect::Dispatch {
                    message,
                    after_cooldown: true,
                }],
                None => {
                    self.phase = Phase::Idle;
                    vec![DispatchEffect::BecameIdle]
                }
            },
            (Phase::Idle, DispatchEvent::RevealCompleted) => {
                tracing::warn!("reveal completion received while idle, ignoring");
                Vec::new()
            }
            (_, DispatchEvent::CancelRequested(id)) => match self.queue.remove(id) {
                Some(_) => vec![DispatchEffect::Cancelled(id)],
                None => Vec::new(),
            },
        }
    }
}
