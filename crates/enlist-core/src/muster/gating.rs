//! When a muster may start.

use enlist_events::EnlistmentState;
use std::fmt;

use crate::host::{EncounterKind, WorldFacts};

use super::BeginOutcome;

/// Why a muster cannot start right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerBlock {
    NotEnlisted,
    SessionActive,
    Prisoner,
    InCombat,
    FieldEncounter,
    InConversation,
    MenuOpen,
}

impl TriggerBlock {
    /// The deferred trigger this block arms, if it is a temporary one.
    pub fn deferral(self) -> Option<DeferredTrigger> {
        match self {
            TriggerBlock::InCombat => Some(DeferredTrigger::AfterCombat),
            TriggerBlock::FieldEncounter | TriggerBlock::InConversation | TriggerBlock::MenuOpen => {
                Some(DeferredTrigger::AfterMenu)
            }
            TriggerBlock::NotEnlisted | TriggerBlock::SessionActive | TriggerBlock::Prisoner => {
                None
            }
        }
    }
}

impl fmt::Display for TriggerBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TriggerBlock::NotEnlisted => "not enlisted",
            TriggerBlock::SessionActive => "a muster is already active",
            TriggerBlock::Prisoner => "player is a prisoner",
            TriggerBlock::InCombat => "player is in combat",
            TriggerBlock::FieldEncounter => "player is in an encounter",
            TriggerBlock::InConversation => "player is in a conversation",
            TriggerBlock::MenuOpen => "a menu is open",
        };
        f.write_str(text)
    }
}

/// A muster attempt waiting for a block to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTrigger {
    AfterCombat,
    AfterMenu,
}

/// Result of a trigger attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Began(BeginOutcome),
    Deferred(DeferredTrigger),
    /// The player was a prisoner; wages were added to back pay.
    SkippedAsPrisoner,
    Blocked(TriggerBlock),
}

/// Checks the blocking conditions in priority order.
pub(crate) fn check<H: WorldFacts + ?Sized>(
    host: &H,
    enlistment: &EnlistmentState,
    session_active: bool,
) -> Result<(), TriggerBlock> {
    if !enlistment.is_enlisted {
        return Err(TriggerBlock::NotEnlisted);
    }
    if session_active {
        return Err(TriggerBlock::SessionActive);
    }
    if host.is_prisoner() {
        return Err(TriggerBlock::Prisoner);
    }
    if host.in_combat() {
        return Err(TriggerBlock::InCombat);
    }
    if host.active_encounter() == Some(EncounterKind::Field) {
        return Err(TriggerBlock::FieldEncounter);
    }
    if host.in_conversation() {
        return Err(TriggerBlock::InConversation);
    }
    if host.menu_open() {
        return Err(TriggerBlock::MenuOpen);
    }
    Ok(())
}
