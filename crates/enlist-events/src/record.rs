//! Muster outcome records.
//!
//! Completing a muster emits exactly one record summarising the whole
//! session. Records are written one per line (JSONL) and read back for
//! later display.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::{
    BaggageOutcome, FollowOnAction, InspectionOutcome, PayOutcome, RecruitOutcome,
    RetinueOutcome,
};
use crate::session::{MusterSessionState, StageSkip};
use crate::stage::MusterStage;
use crate::time::CampaignTime;

/// Generates a unique record ID.
pub fn generate_record_id() -> String {
    format!("mst_{}", Uuid::new_v4().simple())
}

/// Structured summary of one completed muster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusterOutcomeRecord {
    pub record_id: String,
    pub completed_at: CampaignTime,
    pub muster_day: u32,
    pub days_since_last_muster: u32,
    pub tier: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commander: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_outcome: Option<PayOutcome>,
    pub pay_amount: i32,
    pub backpay_paid: i32,
    pub baggage_outcome: BaggageOutcome,
    pub contraband_value: i32,
    pub inspection_outcome: InspectionOutcome,
    pub recruit_outcome: RecruitOutcome,
    pub recruit_xp_awarded: u32,
    pub promotion_acknowledged: bool,
    pub retinue_outcome: RetinueOutcome,
    pub retinue_replacements: u32,

    pub stages_visited: Vec<MusterStage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages_skipped: Vec<StageSkip>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ons: Vec<FollowOnAction>,
    pub summary_lines: Vec<String>,
    /// One-line warning when some effects could not be applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_warning: Option<String>,
}

impl MusterOutcomeRecord {
    /// Copies the outcome fields of a finished session.
    pub fn from_session(
        session: &MusterSessionState,
        completed_at: CampaignTime,
        tier: u32,
        commander: Option<String>,
    ) -> Self {
        Self {
            record_id: generate_record_id(),
            completed_at,
            muster_day: session.muster_day,
            days_since_last_muster: session.days_since_last_muster(),
            tier,
            commander,
            pay_outcome: session.pay_outcome,
            pay_amount: session.pay_amount,
            backpay_paid: session.backpay_paid,
            baggage_outcome: session.baggage_outcome,
            contraband_value: session.contraband_value,
            inspection_outcome: session.inspection_outcome,
            recruit_outcome: session.recruit_outcome,
            recruit_xp_awarded: session.recruit_xp_awarded,
            promotion_acknowledged: session.promotion_acknowledged,
            retinue_outcome: session.retinue_outcome,
            retinue_replacements: session.retinue_replacements,
            stages_visited: session.stages_visited.clone(),
            stages_skipped: session.stages_skipped.clone(),
            follow_ons: session.follow_ons.clone(),
            summary_lines: Vec::new(),
            soft_warning: None,
        }
    }

    /// Sets the summary lines.
    pub fn with_summary(mut self, lines: Vec<String>) -> Self {
        self.summary_lines = lines;
        self
    }

    /// Sets the soft warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.soft_warning = Some(warning.into());
        self
    }

    pub fn visited(&self, stage: MusterStage) -> bool {
        self.stages_visited.contains(&stage)
    }

    /// Serializes the record as a single JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a record from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
