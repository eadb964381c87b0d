//! Save/load of enlistment status and the in-progress muster session.
//!
//! The host's save channel stores primitive values under string keys. Keys
//! are order-independent; a missing key falls back to its default so older
//! saves keep loading. A session whose stage or outcome tags cannot be
//! recognised is reported as corrupted rather than restored.

use enlist_events::{
    CommanderId, EnlistmentState, MusterSessionState, MusterStage, ParseTagError, StageSkip,
    TimeFlow,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// A primitive value in the save channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SaveValue {
    Bool(bool),
    Int(i64),
    Text(String),
    TextList(Vec<String>),
}

impl SaveValue {
    fn type_name(&self) -> &'static str {
        match self {
            SaveValue::Bool(_) => "bool",
            SaveValue::Int(_) => "int",
            SaveValue::Text(_) => "text",
            SaveValue::TextList(_) => "text_list",
        }
    }
}

/// Keyed read/write access to the host's save data.
pub trait SaveStore {
    fn write(&mut self, key: &str, value: SaveValue) -> Result<(), PersistError>;
    fn read(&self, key: &str) -> Option<SaveValue>;
    fn remove(&mut self, key: &str);
}

/// Errors from the save channel.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("key '{key}' holds {found}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("key '{key}' value {value} is out of range")]
    OutOfRange { key: String, value: i64 },
    #[error("save store rejected key '{key}': {reason}")]
    Rejected { key: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory save store, serializable to a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySaveStore {
    values: BTreeMap<String, SaveValue>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_file(&self, path: &Path) -> Result<(), PersistError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Self, PersistError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl SaveStore for MemorySaveStore {
    fn write(&mut self, key: &str, value: SaveValue) -> Result<(), PersistError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn read(&self, key: &str) -> Option<SaveValue> {
        self.values.get(key).cloned()
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

// Enlistment keys
const ENLISTED: &str = "enlist.is_enlisted";
const COMMANDER: &str = "enlist.commander";
const TIER: &str = "enlist.tier";
const XP: &str = "enlist.xp";
const XP_AT_LAST_MUSTER: &str = "enlist.xp_at_last_muster";
const TIER_AT_LAST_MUSTER: &str = "enlist.tier_at_last_muster";
const DAY_OF_LAST_PROMOTION: &str = "enlist.day_of_last_promotion";
const LAST_MUSTER_DAY: &str = "enlist.last_muster_day";
const LAST_INSPECTION_DAY: &str = "enlist.last_inspection_day";
const LAST_RECRUIT_DAY: &str = "enlist.last_recruit_day";
const ENLISTED_ON_DAY: &str = "enlist.enlisted_on_day";
const PENDING_BACKPAY: &str = "enlist.pending_backpay";
const RETINUE_SIZE: &str = "enlist.retinue_size";

// Session keys
const SESSION_ACTIVE: &str = "muster.active";
const STAGE: &str = "muster.stage";
const MUSTER_DAY: &str = "muster.day";
const SESSION_LAST_MUSTER_DAY: &str = "muster.last_muster_day";
const TIER_AT_START: &str = "muster.tier_at_start";
const PAY_OUTCOME: &str = "muster.pay_outcome";
const PAY_AMOUNT: &str = "muster.pay_amount";
const BACKPAY_PAID: &str = "muster.backpay_paid";
const BAGGAGE_OUTCOME: &str = "muster.baggage_outcome";
const CONTRABAND_VALUE: &str = "muster.contraband_value";
const INSPECTION_OUTCOME: &str = "muster.inspection_outcome";
const RECRUIT_OUTCOME: &str = "muster.recruit_outcome";
const RECRUIT_XP: &str = "muster.recruit_xp_awarded";
const PROMOTION_ACKNOWLEDGED: &str = "muster.promotion_acknowledged";
const RETINUE_OUTCOME: &str = "muster.retinue_outcome";
const RETINUE_REPLACEMENTS: &str = "muster.retinue_replacements";
const OUTCOME_LOG: &str = "muster.outcome_log";
const STAGES_VISITED: &str = "muster.stages_visited";
const STAGES_SKIPPED: &str = "muster.stages_skipped";
const ESCALATION_EVENTS: &str = "muster.escalation_events";
const FOLLOW_ONS: &str = "muster.follow_ons";
const ERRORS: &str = "muster.errors";
const PARTIAL_FAILURE: &str = "muster.effects_partially_failed";
const TIME_FLOW: &str = "muster.time_flow";

const SESSION_KEYS: &[&str] = &[
    STAGE,
    MUSTER_DAY,
    SESSION_LAST_MUSTER_DAY,
    TIER_AT_START,
    PAY_OUTCOME,
    PAY_AMOUNT,
    BACKPAY_PAID,
    BAGGAGE_OUTCOME,
    CONTRABAND_VALUE,
    INSPECTION_OUTCOME,
    RECRUIT_OUTCOME,
    RECRUIT_XP,
    PROMOTION_ACKNOWLEDGED,
    RETINUE_OUTCOME,
    RETINUE_REPLACEMENTS,
    OUTCOME_LOG,
    STAGES_VISITED,
    STAGES_SKIPPED,
    ESCALATION_EVENTS,
    FOLLOW_ONS,
    ERRORS,
    PARTIAL_FAILURE,
    TIME_FLOW,
];

/// Writes the enlistment status.
pub fn save_enlistment<S: SaveStore + ?Sized>(
    state: &EnlistmentState,
    store: &mut S,
) -> Result<(), PersistError> {
    let commander = state
        .commander
        .as_ref()
        .map(|c| c.as_str().to_string())
        .unwrap_or_default();

    store.write(ENLISTED, SaveValue::Bool(state.is_enlisted))?;
    store.write(COMMANDER, SaveValue::Text(commander))?;
    store.write(TIER, SaveValue::Int(state.tier.into()))?;
    store.write(XP, SaveValue::Int(state.xp.into()))?;
    store.write(XP_AT_LAST_MUSTER, SaveValue::Int(state.xp_at_last_muster.into()))?;
    store.write(TIER_AT_LAST_MUSTER, SaveValue::Int(state.tier_at_last_muster.into()))?;
    store.write(DAY_OF_LAST_PROMOTION, SaveValue::Int(state.day_of_last_promotion.into()))?;
    store.write(LAST_MUSTER_DAY, SaveValue::Int(state.last_muster_day.into()))?;
    store.write(LAST_INSPECTION_DAY, SaveValue::Int(state.last_inspection_day.into()))?;
    store.write(LAST_RECRUIT_DAY, SaveValue::Int(state.last_recruit_day.into()))?;
    store.write(ENLISTED_ON_DAY, SaveValue::Int(state.enlisted_on_day.into()))?;
    store.write(PENDING_BACKPAY, SaveValue::Int(state.pending_backpay.into()))?;
    store.write(RETINUE_SIZE, SaveValue::Int(state.retinue_size.into()))?;
    Ok(())
}

/// Reads the enlistment status. A save without enlistment data yields the
/// default (not enlisted) state.
pub fn load_enlistment<S: SaveStore + ?Sized>(store: &S) -> Result<EnlistmentState, PersistError> {
    let Some(is_enlisted) = read_bool(store, ENLISTED)? else {
        return Ok(EnlistmentState::default());
    };

    let commander = read_text(store, COMMANDER)?
        .filter(|c| !c.is_empty())
        .map(CommanderId::new);

    Ok(EnlistmentState {
        commander,
        is_enlisted,
        tier: read_int(store, TIER)?.unwrap_or(0),
        xp: read_int(store, XP)?.unwrap_or(0),
        xp_at_last_muster: read_int(store, XP_AT_LAST_MUSTER)?.unwrap_or(0),
        tier_at_last_muster: read_int(store, TIER_AT_LAST_MUSTER)?.unwrap_or(0),
        day_of_last_promotion: read_int(store, DAY_OF_LAST_PROMOTION)?.unwrap_or(0),
        last_muster_day: read_int(store, LAST_MUSTER_DAY)?.unwrap_or(0),
        last_inspection_day: read_int(store, LAST_INSPECTION_DAY)?.unwrap_or(0),
        last_recruit_day: read_int(store, LAST_RECRUIT_DAY)?.unwrap_or(0),
        enlisted_on_day: read_int(store, ENLISTED_ON_DAY)?.unwrap_or(0),
        pending_backpay: read_int(store, PENDING_BACKPAY)?.unwrap_or(0),
        retinue_size: read_int(store, RETINUE_SIZE)?.unwrap_or(0),
    })
}

/// Writes the session, or clears session keys when there is none.
pub fn save_session<S: SaveStore + ?Sized>(
    session: Option<&MusterSessionState>,
    store: &mut S,
) -> Result<(), PersistError> {
    let Some(s) = session else {
        store.write(SESSION_ACTIVE, SaveValue::Bool(false))?;
        for key in SESSION_KEYS {
            store.remove(key);
        }
        return Ok(());
    };

    store.write(SESSION_ACTIVE, SaveValue::Bool(true))?;
    store.write(STAGE, SaveValue::Text(s.current_stage.as_str().to_string()))?;
    store.write(MUSTER_DAY, SaveValue::Int(s.muster_day.into()))?;
    store.write(SESSION_LAST_MUSTER_DAY, SaveValue::Int(s.last_muster_day.into()))?;
    store.write(TIER_AT_START, SaveValue::Int(s.tier_at_start.into()))?;
    store.write(
        PAY_OUTCOME,
        SaveValue::Text(s.pay_outcome.map(|o| o.as_str()).unwrap_or_default().to_string()),
    )?;
    store.write(PAY_AMOUNT, SaveValue::Int(s.pay_amount.into()))?;
    store.write(BACKPAY_PAID, SaveValue::Int(s.backpay_paid.into()))?;
    store.write(BAGGAGE_OUTCOME, SaveValue::Text(s.baggage_outcome.as_str().to_string()))?;
    store.write(CONTRABAND_VALUE, SaveValue::Int(s.contraband_value.into()))?;
    store.write(
        INSPECTION_OUTCOME,
        SaveValue::Text(s.inspection_outcome.as_str().to_string()),
    )?;
    store.write(RECRUIT_OUTCOME, SaveValue::Text(s.recruit_outcome.as_str().to_string()))?;
    store.write(RECRUIT_XP, SaveValue::Int(s.recruit_xp_awarded.into()))?;
    store.write(PROMOTION_ACKNOWLEDGED, SaveValue::Bool(s.promotion_acknowledged))?;
    store.write(RETINUE_OUTCOME, SaveValue::Text(s.retinue_outcome.as_str().to_string()))?;
    store.write(RETINUE_REPLACEMENTS, SaveValue::Int(s.retinue_replacements.into()))?;
    store.write(OUTCOME_LOG, SaveValue::TextList(s.outcome_log.clone()))?;
    store.write(STAGES_VISITED, SaveValue::TextList(tags(&s.stages_visited)))?;
    store.write(STAGES_SKIPPED, SaveValue::TextList(tags(&s.stages_skipped)))?;
    store.write(
        ESCALATION_EVENTS,
        SaveValue::TextList(s.pending_escalation_events.clone()),
    )?;
    store.write(FOLLOW_ONS, SaveValue::TextList(tags(&s.follow_ons)))?;
    store.write(ERRORS, SaveValue::TextList(s.encountered_errors.clone()))?;
    store.write(PARTIAL_FAILURE, SaveValue::Bool(s.effects_partially_failed))?;
    store.write(TIME_FLOW, SaveValue::Text(s.time_flow_before.as_str().to_string()))?;
    Ok(())
}

/// Result of reading the session keys.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionLoad {
    /// No session was in progress when the game was saved.
    Absent,
    Restored(Box<MusterSessionState>),
    /// Session keys were present but could not be decoded.
    Corrupted(String),
}

/// Reads the session keys.
pub fn load_session<S: SaveStore + ?Sized>(store: &S) -> SessionLoad {
    match read_bool(store, SESSION_ACTIVE) {
        Ok(Some(true)) => {}
        Ok(_) => return SessionLoad::Absent,
        Err(e) => return SessionLoad::Corrupted(e.to_string()),
    }

    match decode_session(store) {
        Ok(session) => SessionLoad::Restored(Box::new(session)),
        Err(reason) => SessionLoad::Corrupted(reason),
    }
}

fn decode_session<S: SaveStore + ?Sized>(store: &S) -> Result<MusterSessionState, String> {
    let stage: MusterStage = read_tag(store, STAGE)?.ok_or_else(|| format!("'{}' missing", STAGE))?;
    let muster_day = read_int(store, MUSTER_DAY)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("'{}' missing", MUSTER_DAY))?;
    let last_muster_day = int_or_default(store, SESSION_LAST_MUSTER_DAY)?;
    let tier_at_start = int_or_default(store, TIER_AT_START)?;
    let time_flow: TimeFlow = read_tag(store, TIME_FLOW)?.unwrap_or_default();

    let mut session = MusterSessionState::new(muster_day, last_muster_day, tier_at_start, time_flow);
    session.current_stage = stage;
    session.pay_outcome = read_tag(store, PAY_OUTCOME)?;
    session.pay_amount = int_or_default(store, PAY_AMOUNT)?;
    session.backpay_paid = int_or_default(store, BACKPAY_PAID)?;
    session.baggage_outcome = read_tag(store, BAGGAGE_OUTCOME)?.unwrap_or_default();
    session.contraband_value = int_or_default(store, CONTRABAND_VALUE)?;
    session.inspection_outcome = read_tag(store, INSPECTION_OUTCOME)?.unwrap_or_default();
    session.recruit_outcome = read_tag(store, RECRUIT_OUTCOME)?.unwrap_or_default();
    session.recruit_xp_awarded = int_or_default(store, RECRUIT_XP)?;
    session.promotion_acknowledged = read_bool(store, PROMOTION_ACKNOWLEDGED)
        .map_err(|e| e.to_string())?
        .unwrap_or(false);
    session.retinue_outcome = read_tag(store, RETINUE_OUTCOME)?.unwrap_or_default();
    session.retinue_replacements = int_or_default(store, RETINUE_REPLACEMENTS)?;
    session.outcome_log = list_or_default(store, OUTCOME_LOG)?;
    session.stages_visited = read_tag_list(store, STAGES_VISITED)?;
    session.stages_skipped = read_tag_list::<S, StageSkip>(store, STAGES_SKIPPED)?;
    session.pending_escalation_events = list_or_default(store, ESCALATION_EVENTS)?;
    session.follow_ons = read_tag_list(store, FOLLOW_ONS)?;
    session.encountered_errors = list_or_default(store, ERRORS)?;
    session.effects_partially_failed = read_bool(store, PARTIAL_FAILURE)
        .map_err(|e| e.to_string())?
        .unwrap_or(false);
    Ok(session)
}

fn tags<T: ToString>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn read_bool<S: SaveStore + ?Sized>(store: &S, key: &str) -> Result<Option<bool>, PersistError> {
    match store.read(key) {
        None => Ok(None),
        Some(SaveValue::Bool(b)) => Ok(Some(b)),
        Some(other) => Err(wrong_type(key, "bool", &other)),
    }
}

fn read_int<S, T>(store: &S, key: &str) -> Result<Option<T>, PersistError>
where
    S: SaveStore + ?Sized,
    T: TryFrom<i64>,
{
    match store.read(key) {
        None => Ok(None),
        Some(SaveValue::Int(value)) => T::try_from(value)
            .map(Some)
            .map_err(|_| PersistError::OutOfRange {
                key: key.to_string(),
                value,
            }),
        Some(other) => Err(wrong_type(key, "int", &other)),
    }
}

fn read_text<S: SaveStore + ?Sized>(store: &S, key: &str) -> Result<Option<String>, PersistError> {
    match store.read(key) {
        None => Ok(None),
        Some(SaveValue::Text(text)) => Ok(Some(text)),
        Some(other) => Err(wrong_type(key, "text", &other)),
    }
}

fn read_list<S: SaveStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<Vec<String>>, PersistError> {
    match store.read(key) {
        None => Ok(None),
        Some(SaveValue::TextList(items)) => Ok(Some(items)),
        Some(other) => Err(wrong_type(key, "text_list", &other)),
    }
}

fn int_or_default<S, T>(store: &S, key: &str) -> Result<T, String>
where
    S: SaveStore + ?Sized,
    T: TryFrom<i64> + Default,
{
    read_int(store, key)
        .map(Option::unwrap_or_default)
        .map_err(|e| e.to_string())
}

fn list_or_default<S: SaveStore + ?Sized>(store: &S, key: &str) -> Result<Vec<String>, String> {
    read_list(store, key)
        .map(Option::unwrap_or_default)
        .map_err(|e| e.to_string())
}

/// Reads a tag; an empty string means "not set".
fn read_tag<S, T>(store: &S, key: &str) -> Result<Option<T>, String>
where
    S: SaveStore + ?Sized,
    T: FromStr<Err = ParseTagError>,
{
    match read_text(store, key).map_err(|e| e.to_string())? {
        None => Ok(None),
        Some(text) if text.is_empty() => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|e: ParseTagError| format!("'{}': {}", key, e)),
    }
}

fn read_tag_list<S, T>(store: &S, key: &str) -> Result<Vec<T>, String>
where
    S: SaveStore + ?Sized,
    T: FromStr<Err = ParseTagError>,
{
    list_or_default(store, key)?
        .iter()
        .map(|item| {
            item.parse()
                .map_err(|e: ParseTagError| format!("'{}': {}", key, e))
        })
        .collect()
}

fn wrong_type(key: &str, expected: &'static str, found: &SaveValue) -> PersistError {
    PersistError::WrongType {
        key: key.to_string(),
        expected,
        found: found.type_name(),
    }
}
