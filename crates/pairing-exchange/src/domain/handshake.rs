//! # Handshake State Machine
//!
//! ```text
//! Idle ─▶ AwaitingLinkSend ─▶ AwaitingLinkResponse ─┬▶ Paired
//!   │            │                                  ├▶ Rejected
//!   └────────────┴──────────▶ Failed ◀──────────────┼▶ TimedOut
//!                                                   └▶ Failed
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handshake lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeState {
    /// Nothing sent yet.
    #[default]
    Idle,
    /// LINK request built, waiting on the relay to accept it.
    AwaitingLinkSend,
    /// LINK request delivered, polling for the answer.
    AwaitingLinkResponse,
    /// Peer approved and the record was written.
    Paired,
    /// Peer declined.
    Rejected,
    /// Poll budget exhausted.
    TimedOut,
    /// Local or transport failure.
    Failed,
}

impl HandshakeState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: HandshakeState) -> bool {
        match (self, next) {
            (Self::Idle, Self::AwaitingLinkSend) => true,
            (Self::Idle, Self::Failed) => true,
            (Self::AwaitingLinkSend, Self::AwaitingLinkResponse) => true,
            (Self::AwaitingLinkSend, Self::Failed) => true,
            (Self::AwaitingLinkResponse, Self::Paired) => true,
            (Self::AwaitingLinkResponse, Self::Rejected) => true,
            (Self::AwaitingLinkResponse, Self::TimedOut) => true,
            (Self::AwaitingLinkResponse, Self::Failed) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Paired | Self::Rejected | Self::TimedOut | Self::Failed
        )
    }

    /// Label used for the handshake outcome metric.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Paired => "success",
            Self::Rejected => "rejected",
            Self::TimedOut => "timeout",
            Self::Failed => "failed",
            Self::Idle | Self::AwaitingLinkSend | Self::AwaitingLinkResponse => "pending",
        }
    }
}

/// Attempted transition the state machine does not allow.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Invalid handshake transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// State before the attempt
    pub from: HandshakeState,
    /// Rejected target state
    pub to: HandshakeState,
}

/// State plus poll budget of one handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeProgress {
    state: HandshakeState,
    attempts: u32,
    max_attempts: u32,
}

impl HandshakeProgress {
    /// Fresh handshake with the given poll budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: HandshakeState::Idle,
            attempts: 0,
            max_attempts,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Poll ticks consumed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Move to `next` if allowed.
    pub fn advance(&mut self, next: HandshakeState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Count one poll tick. Returns false once the budget is spent.
    pub fn record_attempt(&mut self) -> bool {
        if self.attempts >= self.max_attempts {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// True once a terminal state is reached.
    pub fn is_resolved(&self) -> bool {
        self.state.is_terminal()
    }
}
