//! Cancellation scopes for one unit of presentation.
//!
//! Every line and every option set gets a fresh `UnitCancellation` whose `next` token is a
//! child of the session token and whose `hurry` token is a child of `next`. Cancelling a
//! parent reaches every descendant; cancelling a child never touches its parent.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Line,
    Options,
}

/// Tokens handed to views while a line is presented.
#[derive(Debug, Clone)]
pub struct LineCancellationToken {
    /// Cancelled when views should stop presenting the line: dismiss UI, stop audio.
    pub next_line: CancellationToken,
    /// Cancelled when views should speed up delivery. Always cancelled with `next_line`.
    pub hurry_up: CancellationToken,
}

impl LineCancellationToken {
    /// A pair nobody will cancel, for presenting a line outside a running dialogue.
    pub fn detached() -> Self {
        let next_line = CancellationToken::new();
        let hurry_up = next_line.child_token();
        Self {
            next_line,
            hurry_up,
        }
    }

    pub fn is_next_line_requested(&self) -> bool {
        self.next_line.is_cancelled()
    }

    pub fn is_hurry_up_requested(&self) -> bool {
        self.hurry_up.is_cancelled()
    }
}

#[derive(Debug)]
pub struct UnitCancellation {
    kind: UnitKind,
    next: CancellationToken,
    hurry: CancellationToken,
}

impl UnitCancellation {
    pub fn new(kind: UnitKind, parent: &CancellationToken) -> Self {
        let next = parent.child_token();
        let hurry = next.child_token();
        Self { kind, next, hurry }
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn cancel_next(&self) {
        self.next.cancel();
    }

    pub fn cancel_hurry(&self) {
        self.hurry.cancel();
    }

    pub fn is_next_cancelled(&self) -> bool {
        self.next.is_cancelled()
    }

    pub fn line_token(&self) -> LineCancellationToken {
        LineCancellationToken {
            next_line: self.next.clone(),
            hurry_up: self.hurry.clone(),
        }
    }

    /// Shared token for the option race; any participant may cancel it.
    pub fn option_token(&self) -> CancellationToken {
        self.next.clone()
    }
}
