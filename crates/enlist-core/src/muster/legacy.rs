//! Single-step pay prompt used when the staged muster is unavailable.

use serde::{Deserialize, Serialize};

/// Wages offered by the legacy prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPayPrompt {
    pub muster_day: u32,
    pub wage: i32,
    pub backpay: i32,
}

impl LegacyPayPrompt {
    pub fn new(muster_day: u32, wage: i32, backpay: i32) -> Self {
        Self {
            muster_day,
            wage,
            backpay: backpay.max(0),
        }
    }

    pub fn total(&self) -> i32 {
        self.wage + self.backpay
    }

    /// Text shown to the player.
    pub fn message(&self) -> String {
        if self.backpay > 0 {
            format!(
                "Muster pay: {} denars in wages and {} in back pay.",
                self.wage, self.backpay
            )
        } else {
            format!("Muster pay: {} denars in wages.", self.wage)
        }
    }
}
