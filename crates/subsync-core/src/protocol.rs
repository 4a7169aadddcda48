// Confirm/execute protocol: request model, response outcome, and the phase
// state machine.
//
// The remote service requires a confirm-mode request (preview) before an
// execute-mode request (commit) for the same field map. Its answers can ask
// for a warning acknowledgement or point at a later period where the change
// is still legal. `PhaseMachine` encodes those rules as pure transitions; the
// executor drives it with I/O.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::eligibility::EligibilityMap;
use crate::planner::effective_bucket;
use crate::position::{PositionCode, SlotPosition, POS_ID_BENCH};
use crate::roster::Roster;

// ---------------------------------------------------------------------------
// Request model
// ---------------------------------------------------------------------------

/// Starter/bench status for a field map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Starter,
    Bench,
}

impl SlotStatus {
    /// Remote status id: "1" active, "2" reserve.
    pub fn st_id(&self) -> &'static str {
        match self {
            SlotStatus::Starter => "1",
            SlotStatus::Bench => "2",
        }
    }
}

/// Requested placement of one rostered player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAssignment {
    pub position: SlotPosition,
    pub status: SlotStatus,
}

impl FieldAssignment {
    pub fn starter(code: PositionCode) -> Self {
        Self {
            position: SlotPosition::Field(code),
            status: SlotStatus::Starter,
        }
    }

    /// Reserves always carry the bench slot id.
    pub fn bench() -> Self {
        Self {
            position: SlotPosition::Bench,
            status: SlotStatus::Bench,
        }
    }

    pub fn pos_id(&self) -> u32 {
        self.position
            .code()
            .map(|c| c.pos_id())
            .unwrap_or(POS_ID_BENCH)
    }

    pub fn is_starter(&self) -> bool {
        self.status == SlotStatus::Starter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineupMode {
    /// Preview: the server validates and may ask for acknowledgement.
    Confirm,
    /// Commit.
    Execute,
}

impl LineupMode {
    pub fn display_str(&self) -> &'static str {
        match self {
            LineupMode::Confirm => "CONFIRM",
            LineupMode::Execute => "EXECUTE",
        }
    }
}

/// A complete lineup change request: every rostered player with a
/// resolvable placement appears in `field_map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupChangeRequest {
    pub team_id: String,
    pub field_map: BTreeMap<String, FieldAssignment>,
    /// 0 lets the server decide.
    pub target_period: u32,
    pub apply_to_future_periods: bool,
    pub mode: LineupMode,
}

impl LineupChangeRequest {
    pub fn new(team_id: impl Into<String>, field_map: BTreeMap<String, FieldAssignment>) -> Self {
        Self {
            team_id: team_id.into(),
            field_map,
            target_period: 0,
            apply_to_future_periods: false,
            mode: LineupMode::Confirm,
        }
    }

    pub fn with_mode(&self, mode: LineupMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    pub fn starter_ids(&self) -> Vec<&str> {
        self.field_map
            .iter()
            .filter(|(_, a)| a.is_starter())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Target period: explicit override, else the roster's inferred period,
/// else 0 ("server decides").
pub fn resolve_target_period(override_period: Option<u32>, roster: &Roster) -> u32 {
    override_period.or(roster.period).unwrap_or(0)
}

/// Build the full field map for a roster where exactly `starters` should be
/// active. Reserves go to the bench slot; starters go to their effective
/// bucket. Starters whose bucket cannot be resolved are left out so the
/// server keeps their current placement.
pub fn build_field_map(
    roster: &Roster,
    starters: &[String],
    positions: &EligibilityMap,
    overrides: &HashMap<String, PositionCode>,
) -> BTreeMap<String, FieldAssignment> {
    let wanted: HashSet<&str> = starters.iter().map(String::as_str).collect();
    let mut field_map = BTreeMap::new();

    for slot in roster.occupied() {
        let Some(id) = slot.player_id() else {
            continue;
        };
        if !wanted.contains(id) {
            field_map.insert(id.to_string(), FieldAssignment::bench());
            continue;
        }
        match effective_bucket(id, Some(slot), positions, overrides) {
            Some(code) => {
                field_map.insert(id.to_string(), FieldAssignment::starter(code));
            }
            None => debug!(player_id = id, "no bucket for starter; left out of field map"),
        }
    }

    field_map
}

// ---------------------------------------------------------------------------
// Response model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Success,
    Confirm,
    Warning,
    Error,
    Other(String),
}

impl MessageType {
    pub fn from_str_msg(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SUCCESS" => MessageType::Success,
            "CONFIRM" => MessageType::Confirm,
            "WARNING" => MessageType::Warning,
            "ERROR" => MessageType::Error,
            other => MessageType::Other(other.to_string()),
        }
    }

    /// Message types that count as acceptance.
    pub fn is_accepting(&self) -> bool {
        matches!(
            self,
            MessageType::Success | MessageType::Confirm | MessageType::Warning
        )
    }
}

/// Normalised server answer to a confirm- or execute-mode request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolOutcome {
    pub accepted: bool,
    pub message_type: Option<MessageType>,
    pub show_confirm_window: bool,
    pub change_allowed: Option<bool>,
    pub first_illegal_period: Option<u32>,
    pub pick_deadline_passed: Option<bool>,
    pub illegal_messages: Vec<String>,
    pub main_message: Option<String>,
    /// Period the server scheduled the change for, when reported.
    pub scheduled_period: Option<u32>,
}

impl ProtocolOutcome {
    pub fn accepted(message_type: MessageType) -> Self {
        Self {
            accepted: true,
            message_type: Some(message_type),
            ..Self::default()
        }
    }

    pub fn rejected(main_message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message_type: Some(MessageType::Error),
            main_message: Some(main_message.into()),
            ..Self::default()
        }
    }

    fn wants_acknowledgement(&self) -> bool {
        self.show_confirm_window || self.message_type == Some(MessageType::Warning)
    }

    /// Main message followed by illegal-roster messages.
    pub fn failure_reason(&self) -> String {
        let parts: Vec<&str> = self
            .main_message
            .iter()
            .map(String::as_str)
            .chain(self.illegal_messages.iter().map(String::as_str))
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            "rejected by server".to_string()
        } else {
            parts.join("; ")
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolState {
    Init,
    ConfirmSent,
    WarningAckSent,
    PeriodRetargeted,
    ExecuteSent,
    Verified,
    AcceptedUnverified,
    Failed(String),
}

impl ProtocolState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProtocolState::Verified | ProtocolState::AcceptedUnverified | ProtocolState::Failed(_)
        )
    }

    /// The server accepted the change (whether or not the view caught up).
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProtocolState::Verified | ProtocolState::AcceptedUnverified)
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            ProtocolState::Init => "INIT",
            ProtocolState::ConfirmSent => "CONFIRM_SENT",
            ProtocolState::WarningAckSent => "WARNING_ACK_SENT",
            ProtocolState::PeriodRetargeted => "PERIOD_RETARGETED",
            ProtocolState::ExecuteSent => "EXECUTE_SENT",
            ProtocolState::Verified => "VERIFIED",
            ProtocolState::AcceptedUnverified => "ACCEPTED_UNVERIFIED",
            ProtocolState::Failed(_) => "FAILED",
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolState::Failed(reason) => write!(f, "FAILED ({reason})"),
            other => write!(f, "{}", other.display_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    Start,
    Response(ProtocolOutcome),
    Verification(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    SendConfirm(LineupChangeRequest),
    SendExecute(LineupChangeRequest),
    Verify,
    Finish,
}

/// Drives one lineup change through confirm, optional acknowledgement or
/// period retarget, execute, and verification.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    state: ProtocolState,
    request: LineupChangeRequest,
    warning_acked: bool,
    retargeted: bool,
    scheduled_period: Option<u32>,
}

impl PhaseMachine {
    pub fn new(request: LineupChangeRequest) -> Self {
        Self {
            state: ProtocolState::Init,
            request: request.with_mode(LineupMode::Confirm),
            warning_acked: false,
            retargeted: false,
            scheduled_period: None,
        }
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// The current confirm-mode request (reflects any retarget).
    pub fn request(&self) -> &LineupChangeRequest {
        &self.request
    }

    /// Period the server reported for the change, from the last confirm.
    pub fn scheduled_period(&self) -> Option<u32> {
        self.scheduled_period
    }

    fn confirm(mut self, state: ProtocolState) -> (Self, NextAction) {
        self.state = state;
        let request = self.request.clone();
        (self, NextAction::SendConfirm(request))
    }

    fn fail(mut self, reason: String) -> (Self, NextAction) {
        self.state = ProtocolState::Failed(reason);
        (self, NextAction::Finish)
    }

    fn on_confirm_response(mut self, outcome: ProtocolOutcome) -> (Self, NextAction) {
        if outcome.scheduled_period.is_some() {
            self.scheduled_period = outcome.scheduled_period;
        }

        if outcome.change_allowed == Some(false) {
            let target = self.request.target_period;
            if let Some(period) = outcome.first_illegal_period {
                if period != target && !self.retargeted {
                    debug!(from = target, to = period, "retargeting lineup change");
                    self.retargeted = true;
                    self.warning_acked = false;
                    self.request.target_period = period;
                    self.request.apply_to_future_periods = true;
                    return self.confirm(ProtocolState::PeriodRetargeted);
                }
            }
            let mut reason = format!("change not allowed for period {target}");
            if outcome.pick_deadline_passed == Some(true) {
                reason.push_str(" (pick deadline passed)");
            }
            if outcome.main_message.is_some() || !outcome.illegal_messages.is_empty() {
                reason = format!("{reason}: {}", outcome.failure_reason());
            }
            return self.fail(reason);
        }

        if outcome.wants_acknowledgement() && !self.warning_acked {
            self.warning_acked = true;
            return self.confirm(ProtocolState::WarningAckSent);
        }

        if outcome.accepted {
            self.state = ProtocolState::ExecuteSent;
            let request = self.request.with_mode(LineupMode::Execute);
            return (self, NextAction::SendExecute(request));
        }

        let reason = outcome.failure_reason();
        self.fail(reason)
    }

    /// Advance by one event. Pure: the caller performs the returned action
    /// and feeds the result back in.
    pub fn step(mut self, event: ProtocolEvent) -> (Self, NextAction) {
        if self.state.is_terminal() {
            return (self, NextAction::Finish);
        }

        match (self.state.clone(), event) {
            (ProtocolState::Init, ProtocolEvent::Start) => self.confirm(ProtocolState::ConfirmSent),

            (
                ProtocolState::ConfirmSent
                | ProtocolState::WarningAckSent
                | ProtocolState::PeriodRetargeted,
                ProtocolEvent::Response(outcome),
            ) => self.on_confirm_response(outcome),

            (ProtocolState::ExecuteSent, ProtocolEvent::Response(outcome)) => {
                if !outcome.accepted {
                    return self.fail(outcome.failure_reason());
                }
                if outcome.scheduled_period.is_some() {
                    self.scheduled_period = outcome.scheduled_period;
                }
                (self, NextAction::Verify)
            }

            (ProtocolState::ExecuteSent, ProtocolEvent::Verification(verified)) => {
                self.state = if verified {
                    ProtocolState::Verified
                } else {
                    ProtocolState::AcceptedUnverified
                };
                (self, NextAction::Finish)
            }

            (state, event) => {
                let reason = format!("unexpected event {event:?} in state {}", state.display_str());
                self.fail(reason)
            }
        }
    }
}
