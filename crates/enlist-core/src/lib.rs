//! Enlistment core: commander attachment and the muster sequence.
//!
//! The player's agent serves under an NPC commander. Two pieces of logic
//! keep that arrangement alive inside a host simulation:
//!
//! - [`attachment`]: per-tick synchronisation with the commander (tether,
//!   visibility, escort, camera, battle joining, safe detachment)
//! - [`muster`]: the eight-stage muster workflow with deferred triggering,
//!   persistence and a fallback path that never leaves the player stuck
//!
//! # Architecture
//!
//! ```text
//! host clock ──frame tick──▶ ┌──────────────────┐ ──escort/camera──▶ host engine
//!            ──hourly tick─▶ │ EnlistmentService │ ──stage views───▶ presentation
//! presentation ──choice────▶ └──────────────────┘ ◀──world facts─── host world
//! ```
//!
//! The host is injected once, at construction, as a value implementing the
//! narrow traits in [`host`].

pub mod attachment;
pub mod config;
pub mod error;
pub mod host;
pub mod muster;
pub mod persistence;
pub mod promotion;
pub mod sandbox;
pub mod service;
pub mod tasks;

pub use attachment::{
    tether_correction, AttachmentCoordinator, AttachmentPhase, DetachReason,
    PreEnlistmentSnapshot,
};
pub use config::{
    default_config_toml, AttachmentConfig, ConfigError, EnlistConfig, GeneralConfig,
    MusterConfig, PayConfig, PromotionConfig,
};
pub use error::{EnlistError, MusterError, OptionRejection};
pub use host::{
    CameraTarget, CommanderLocator, CommanderStatus, EffectApplier, EncounterKind,
    EscortDriver, Host, HostError, HostResult, MusterPresenter, Skill, WorldFacts,
};
pub use muster::{
    skip_reason, BeginOutcome, ControllerMode, DeferredTrigger, LegacyPayPrompt,
    MusterContext, MusterOption, MusterSequenceController, OptionResolution, OptionView,
    StageFacts, StageView, TriggerBlock, TriggerOutcome,
};
pub use persistence::{MemorySaveStore, PersistError, SaveStore, SaveValue, SessionLoad};
pub use sandbox::{SandboxCommander, SandboxHost};
pub use service::EnlistmentService;
pub use tasks::{DeferredTask, DeferredTaskQueue};
