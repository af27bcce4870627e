use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Lifecycle phases of the game entry for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    /// Nothing selected, no game in progress.
    NoActiveGame,
    /// Players are being chosen for the next game.
    Setup,
    /// A pending game is being entered.
    Active,
    /// A settled game was re-opened for correction.
    Editing,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    /// The next-game selection changed.
    SelectionChanged {
        /// Whether any player remains selected.
        non_empty: bool,
    },
    /// Start a new game from the current selection.
    StartGame,
    /// Pick up an unsettled game found in the store.
    ResumeGame,
    /// Write the pending game.
    Settle,
    /// Discard the pending game.
    Cancel,
    /// Re-open the most recently settled game.
    BeginEdit,
    /// Overwrite the edited game.
    SaveEdit,
    /// Discard the edit.
    CancelEdit,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SlotPhase,
    /// The event that cannot be applied from this phase.
    pub event: SlotEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SlotPhase,
        /// Current phase.
        actual: SlotPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SlotPhase,
    /// Phase the state machine will transition to.
    pub to: SlotPhase,
    /// Event that triggered this transition.
    pub event: SlotEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SlotPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SlotPhase>,
}

/// State machine driving game entry within one slot.
#[derive(Debug, Clone)]
pub struct SlotStateMachine {
    phase: SlotPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for SlotStateMachine {
    fn default() -> Self {
        Self {
            phase: SlotPhase::NoActiveGame,
            version: 0,
            pending: None,
        }
    }
}

impl SlotStateMachine {
    /// Create a new state machine with no game in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SlotPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: SlotEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SlotPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Plan and apply in one step, for transitions without side effects.
    pub fn fire(&mut self, event: SlotEvent) -> Result<SlotPhase, PlanError> {
        let plan = self.plan(event)?;
        self.phase = plan.to;
        self.version = plan.version_next;
        self.pending = None;
        Ok(self.phase)
    }

    /// Whether `event` would be accepted from the current phase.
    pub fn can_fire(&self, event: SlotEvent) -> bool {
        self.pending.is_none() && self.compute_transition(event).is_ok()
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SlotEvent) -> Result<SlotPhase, InvalidTransition> {
        use SlotEvent as E;
        use SlotPhase as P;

        let next = match (self.phase, event) {
            (P::NoActiveGame | P::Setup, E::SelectionChanged { non_empty: true }) => P::Setup,
            (P::NoActiveGame | P::Setup, E::SelectionChanged { non_empty: false }) => {
                P::NoActiveGame
            }
            (P::Setup, E::StartGame) => P::Active,
            (P::NoActiveGame | P::Setup, E::ResumeGame) => P::Active,
            (P::Active, E::Settle | E::Cancel) => P::NoActiveGame,
            (P::NoActiveGame | P::Setup, E::BeginEdit) => P::Editing,
            (P::Editing, E::SaveEdit | E::CancelEdit) => P::NoActiveGame,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
