use crate::session::SessionId;

/// Movement (logical px) that turns a press into a drag.
pub const DRAG_THRESHOLD: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPos {
    pub x: f32,
    pub y: f32,
}

impl PointerPos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(self, other: PointerPos) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PointerState {
    #[default]
    Idle,
    PressStarted {
        session: SessionId,
        origin: PointerPos,
    },
    Dragging {
        session: SessionId,
    },
}

/// Where a dragged tab was released.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    Session(SessionId),
    Background,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    None,
    Clicked(SessionId),
    Reorder { from: SessionId, to: SessionId },
    MoveToEnd(SessionId),
}

/// Separates click from drag on a tab. A press becomes a drag only after the
/// pointer travels [`DRAG_THRESHOLD`]; release resolves to exactly one outcome.
#[derive(Debug, Default)]
pub struct PointerTracker {
    state: PointerState,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PointerState {
        &self.state
    }

    pub fn dragged_session(&self) -> Option<&SessionId> {
        match &self.state {
            PointerState::Dragging { session } => Some(session),
            _ => None,
        }
    }

    pub fn press(&mut self, session: SessionId, at: PointerPos) {
        self.state = PointerState::PressStarted {
            session,
            origin: at,
        };
    }

    /// Returns true on the move that starts a drag.
    pub fn moved(&mut self, to: PointerPos) -> bool {
        let PointerState::PressStarted { session, origin } = &self.state else {
            return false;
        };
        if origin.distance(to) < DRAG_THRESHOLD {
            return false;
        }
        self.state = PointerState::Dragging {
            session: session.clone(),
        };
        true
    }

    pub fn release(&mut self, target: Option<DropTarget>) -> PointerOutcome {
        match std::mem::take(&mut self.state) {
            PointerState::Idle => PointerOutcome::None,
            PointerState::PressStarted { session, .. } => PointerOutcome::Clicked(session),
            PointerState::Dragging { session } => match target {
                Some(DropTarget::Session(to)) if to != session => PointerOutcome::Reorder {
                    from: session,
                    to,
                },
                Some(DropTarget::Background) => PointerOutcome::MoveToEnd(session),
                _ => PointerOutcome::None,
            },
        }
    }

    pub fn cancel(&mut self) {
        self.state = PointerState::Idle;
    }
}
