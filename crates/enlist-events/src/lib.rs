//! Shared data model for enlistment and the muster sequence.
//!
//! This crate contains pure data structures with no host or workflow logic.
//! It is a dependency for all other crates in the workspace.

#[macro_use]
mod tag;

pub mod enlistment;
pub mod geometry;
pub mod outcome;
pub mod record;
pub mod session;
pub mod stage;
pub mod time;

pub use tag::ParseTagError;

pub use enlistment::{CommanderId, EnlistmentState};
pub use geometry::Vec2;
pub use outcome::{
    BaggageOutcome, FollowOnAction, InspectionOutcome, PayOutcome, RecruitOutcome,
    RetinueOutcome, SkipReason, TimeFlow,
};
pub use record::{generate_record_id, MusterOutcomeRecord};
pub use session::{MusterSessionState, StageSkip};
pub use stage::MusterStage;
pub use time::{CampaignTime, ParseTimeError, HOURS_PER_DAY};
