//! Summary lines for the complete stage and the outcome record.

use enlist_events::{
    BaggageOutcome, InspectionOutcome, MusterSessionState, MusterStage, PayOutcome,
    RecruitOutcome, RetinueOutcome,
};

/// One line per stage, in nominal order. Skipped stages say why.
pub fn summary_lines(session: &MusterSessionState) -> Vec<String> {
    let mut lines = vec![format!(
        "Muster of day {} ({} days since the last).",
        session.muster_day,
        session.days_since_last_muster()
    )];

    for stage in MusterStage::ALL {
        if let Some(skip) = session.stages_skipped.iter().find(|s| s.stage == *stage) {
            lines.push(format!("{}: skipped ({}).", stage_label(*stage), skip.reason));
            continue;
        }
        if let Some(line) = stage_line(*stage, session) {
            lines.push(line);
        }
    }

    lines
}

/// Warning appended when some effects failed.
pub fn soft_warning(session: &MusterSessionState) -> Option<String> {
    session.has_soft_failures().then(|| {
        format!(
            "{} muster effect(s) could not be applied; details were logged.",
            session.encountered_errors.len().max(1)
        )
    })
}

fn stage_line(stage: MusterStage, s: &MusterSessionState) -> Option<String> {
    let line = match stage {
        MusterStage::Intro | MusterStage::Complete => return None,
        MusterStage::Pay => match s.pay_outcome? {
            PayOutcome::Full => format!("Pay: {} denars in full.", s.pay_amount + s.backpay_paid),
            PayOutcome::Partial => format!("Pay: {} denars, the rest owed.", s.pay_amount),
            PayOutcome::Iou => "Pay: an IOU from the paymaster.".to_string(),
            PayOutcome::Corruption => format!(
                "Pay: {} denars after reporting the paymaster.",
                s.pay_amount + s.backpay_paid
            ),
            PayOutcome::SideDeal => format!(
                "Pay: {} denars including a side deal.",
                s.pay_amount + s.backpay_paid
            ),
            PayOutcome::FinalDischarge => format!(
                "Pay: final discharge, {} denars with pension.",
                s.pay_amount + s.backpay_paid
            ),
            PayOutcome::Desertion => "Pay: forfeited by desertion.".to_string(),
        },
        MusterStage::Baggage => match s.baggage_outcome {
            BaggageOutcome::NotConducted => return None,
            BaggageOutcome::Clean => "Baggage: clean.".to_string(),
            BaggageOutcome::Confiscated => {
                format!("Baggage: {} denars of contraband confiscated.", s.contraband_value)
            }
            BaggageOutcome::Bribed => "Baggage: the quartermaster was paid off.".to_string(),
            BaggageOutcome::Smuggled => "Baggage: contraband smuggled through.".to_string(),
        },
        MusterStage::Inspection => match s.inspection_outcome {
            InspectionOutcome::NotConducted => return None,
            InspectionOutcome::Passed => "Inspection: passed.".to_string(),
            InspectionOutcome::Failed => "Inspection: failed.".to_string(),
            InspectionOutcome::Excused => "Inspection: excused.".to_string(),
        },
        MusterStage::Recruit => match s.recruit_outcome {
            RecruitOutcome::NotConducted => return None,
            RecruitOutcome::Mentored => {
                format!("Recruit: mentored (+{} xp).", s.recruit_xp_awarded)
            }
            RecruitOutcome::Assigned => "Recruit: assigned to the sergeant.".to_string(),
            RecruitOutcome::Ignored => "Recruit: ignored.".to_string(),
        },
        MusterStage::PromotionRecap => {
            if !s.promotion_acknowledged {
                return None;
            }
            "Promotion: acknowledged.".to_string()
        }
        MusterStage::Retinue => match s.retinue_outcome {
            RetinueOutcome::NotConducted => return None,
            RetinueOutcome::Replenished => {
                format!("Retinue: {} replacements.", s.retinue_replacements)
            }
            RetinueOutcome::Kept => "Retinue: kept.".to_string(),
            RetinueOutcome::Dismissed => "Retinue: dismissed.".to_string(),
        },
    };
    Some(line)
}

fn stage_label(stage: MusterStage) -> &'static str {
    match stage {
        MusterStage::Intro => "Intro",
        MusterStage::Pay => "Pay",
        MusterStage::Baggage => "Baggage",
        MusterStage::Inspection => "Inspection",
        MusterStage::Recruit => "Recruit",
        MusterStage::PromotionRecap => "Promotion",
        MusterStage::Retinue => "Retinue",
        MusterStage::Complete => "Complete",
    }
}
