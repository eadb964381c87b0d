//! Error types for enlistment and the muster workflow.
//!
//! Every `MusterError` carries a stable diagnostic code. Codes are for logs
//! and bug reports only; control flow matches on the variant.

use enlist_events::{CommanderId, MusterStage};
use thiserror::Error;

use crate::host::HostError;
use crate::muster::MusterOption;

/// Failures of the muster workflow.
#[derive(Debug, Error)]
pub enum MusterError {
    /// Stage menus could not be registered; the controller runs the legacy
    /// flow for the rest of its lifetime.
    #[error("muster menu registration failed: {0}")]
    Registration(#[source] HostError),

    /// A stage could not be activated.
    #[error("transition to stage '{stage}' failed: {source}")]
    StageTransition {
        stage: MusterStage,
        #[source]
        source: HostError,
    },

    /// A single side effect of an option failed; the stage carries on.
    #[error("effect '{effect}' failed during stage '{stage}': {source}")]
    EffectApplication {
        stage: MusterStage,
        effect: &'static str,
        #[source]
        source: HostError,
    },

    /// A persisted session could not be restored.
    #[error("muster session corrupted on load: {0}")]
    StateCorruption(String),

    /// An option was chosen that cannot be resolved right now.
    #[error("option '{option}' rejected: {reason}")]
    OptionRejected {
        option: MusterOption,
        reason: OptionRejection,
    },
}

impl MusterError {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            MusterError::Registration(_) => "ENL-REG",
            MusterError::StageTransition { .. } => "ENL-TRANSITION",
            MusterError::EffectApplication { .. } => "ENL-EFFECT",
            MusterError::StateCorruption(_) => "ENL-CORRUPT",
            MusterError::OptionRejected { .. } => "ENL-OPTION",
        }
    }

    /// True for failures that stop the sequence from making progress.
    pub fn threatens_progress(&self) -> bool {
        matches!(
            self,
            MusterError::Registration(_)
                | MusterError::StageTransition { .. }
                | MusterError::StateCorruption(_)
        )
    }

    pub(crate) fn rejected(option: MusterOption, reason: OptionRejection) -> Self {
        MusterError::OptionRejected { option, reason }
    }
}

/// Why an option choice was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionRejection {
    #[error("no muster session is on screen")]
    NoSession,
    #[error("stage '{current}' is current, option belongs to '{expected}'")]
    WrongStage {
        current: MusterStage,
        expected: MusterStage,
    },
    #[error("option is not available")]
    Unavailable,
    #[error("no legacy pay prompt is pending")]
    NoLegacyPrompt,
}

/// Failures of the enlistment surface (enlist, leave).
#[derive(Debug, Error)]
pub enum EnlistError {
    #[error("already enlisted under {0}")]
    AlreadyEnlisted(CommanderId),
    #[error("not enlisted")]
    NotEnlisted,
    #[error("commander {0} cannot take recruits right now")]
    CommanderUnavailable(CommanderId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let transition = MusterError::StageTransition {
            stage: MusterStage::Pay,
            source: HostError::call_failed("show_stage", "menu missing"),
        };
        assert_eq!(transition.code(), "ENL-TRANSITION");
        assert!(transition.threatens_progress());

        let effect = MusterError::EffectApplication {
            stage: MusterStage::Pay,
            effect: "change_relation",
            source: HostError::call_failed("change_relation", "hero missing"),
        };
        assert_eq!(effect.code(), "ENL-EFFECT");
        assert!(!effect.threatens_progress());

        assert_eq!(MusterError::StateCorruption("x".into()).code(), "ENL-CORRUPT");
    }

    #[test]
    fn test_display_includes_stage_and_cause() {
        let err = MusterError::StageTransition {
            stage: MusterStage::Inspection,
            source: HostError::call_failed("show_stage", "menu missing"),
        };
        let text = err.to_string();
        assert!(text.contains("inspection"));
        assert!(text.contains("menu missing"));
    }

    #[test]
    fn test_rejection_display() {
        let err = MusterError::rejected(
            MusterOption::AcceptFullPay,
            OptionRejection::WrongStage {
                current: MusterStage::Intro,
                expected: MusterStage::Pay,
            },
        );
        assert_eq!(err.code(), "ENL-OPTION");
        assert!(err.to_string().contains("accept_full_pay"));
        assert!(err.to_string().contains("intro"));
    }
}
