// Lineup engine: plans swaps and executes them through the confirm/execute
// protocol, one promote/demote phase pair per swap.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::eligibility::{EligibilityCache, EligibilityMap, EligibilityResolver, ResolvedPositions};
use crate::error::{EngineError, Result};
use crate::planner::{self, ExecutionPolicy, PlanOptions, PlanOutcome, SwapPair, SwapPlan};
use crate::position::PositionCode;
use crate::protocol::{
    build_field_map, resolve_target_period, LineupChangeRequest, NextAction, PhaseMachine,
    ProtocolEvent, ProtocolState,
};
use crate::remote::{EligibilityLookup, LineupTransport, RosterSource};
use crate::roster::Roster;
use crate::throttle::{pause, ThrottleSettings};
use crate::verifier::{self, Expectation, VerifySettings, OPTIMISTIC_REASON};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Policy used by the standalone planning calls.
    pub policy: ExecutionPolicy,
    pub ensure_unlocked: bool,
    pub apply_to_future_periods: bool,
    /// Explicit roster limit period; otherwise inferred from the roster.
    pub target_period: Option<u32>,
    pub position_overrides: HashMap<String, PositionCode>,
    pub verify: VerifySettings,
    pub throttle: ThrottleSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            policy: ExecutionPolicy::BestEffort,
            ensure_unlocked: true,
            apply_to_future_periods: false,
            target_period: None,
            position_overrides: HashMap::new(),
            verify: VerifySettings::default(),
            throttle: ThrottleSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Incoming player made active (temporarily twelve actives).
    Promote,
    /// Outgoing player benched (back to eleven).
    Demote,
}

impl Phase {
    pub fn display_str(&self) -> &'static str {
        match self {
            Phase::Promote => "promote",
            Phase::Demote => "demote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub state: ProtocolState,
    pub target_period: u32,
    pub apply_to_future_periods: bool,
    pub scheduled_period: Option<u32>,
    pub requests_sent: u32,
    pub verify_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapResult {
    pub out_id: String,
    pub in_id: String,
    pub ok: bool,
    pub verified: bool,
    pub phases: Vec<PhaseReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub ok: bool,
    pub verified: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub per_swap_results: Vec<SwapResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_starters: Vec<String>,
}

// ---------------------------------------------------------------------------
// LineupEngine
// ---------------------------------------------------------------------------

pub struct LineupEngine {
    roster_source: Arc<dyn RosterSource>,
    transport: Arc<dyn LineupTransport>,
    lookup: Option<Arc<dyn EligibilityLookup>>,
    cache: Arc<EligibilityCache>,
    settings: EngineSettings,
}

impl LineupEngine {
    pub fn new(
        roster_source: Arc<dyn RosterSource>,
        transport: Arc<dyn LineupTransport>,
        cache: Arc<EligibilityCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            roster_source,
            transport,
            lookup: None,
            cache,
            settings,
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn EligibilityLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<EligibilityCache> {
        &self.cache
    }

    pub async fn fetch_roster(&self, team_id: &str) -> Result<Roster> {
        self.roster_source
            .fetch_roster(team_id)
            .await
            .map_err(EngineError::Transport)
    }

    /// Resolve eligibility for every rostered player.
    pub async fn annotate(&self, roster: &Roster) -> EligibilityMap {
        let resolver = EligibilityResolver::new(&self.cache, self.lookup.as_deref());
        resolver.annotate(roster).await
    }

    /// Resolve only the players `resolved` has not attempted yet.
    async fn annotate_into(&self, roster: &Roster, resolved: &mut ResolvedPositions) {
        let resolver = EligibilityResolver::new(&self.cache, self.lookup.as_deref());
        resolver.extend(roster, resolved).await;
    }

    fn plan_options(&self, policy: ExecutionPolicy) -> PlanOptions {
        PlanOptions {
            policy,
            ensure_unlocked: self.settings.ensure_unlocked,
            position_overrides: self.settings.position_overrides.clone(),
        }
    }

    pub async fn plan_swap(
        &self,
        roster: &Roster,
        out_id: &str,
        in_id: &str,
    ) -> Result<PlanOutcome> {
        let positions = self.annotate(roster).await;
        let options = self.plan_options(self.settings.policy);
        Ok(planner::plan_swap(roster, out_id, in_id, &positions, &options)?)
    }

    pub async fn plan_full_lineup(
        &self,
        roster: &Roster,
        desired_ids: &[String],
    ) -> Result<PlanOutcome> {
        let mut resolved = ResolvedPositions::default();
        self.plan_full_lineup_with(roster, desired_ids, self.settings.policy, &mut resolved)
            .await
    }

    async fn plan_full_lineup_with(
        &self,
        roster: &Roster,
        desired_ids: &[String],
        policy: ExecutionPolicy,
        resolved: &mut ResolvedPositions,
    ) -> Result<PlanOutcome> {
        self.annotate_into(roster, resolved).await;
        let options = self.plan_options(policy);
        let outcome =
            planner::plan_full_lineup(roster, desired_ids, resolved.positions(), &options)?;
        info!(
            team_id = %roster.team_id,
            swaps = outcome.plan.len(),
            from = %outcome.current_formation,
            to = %outcome.desired_formation,
            "planned lineup"
        );
        Ok(outcome)
    }

    /// Execute a plan swap by swap. Transport failures abort and propagate;
    /// server rejections are recorded per swap.
    pub async fn execute(
        &self,
        team_id: &str,
        plan: &SwapPlan,
        policy: ExecutionPolicy,
    ) -> Result<ExecutionResult> {
        let mut resolved = ResolvedPositions::default();
        self.execute_with(team_id, plan, policy, &mut resolved).await
    }

    /// Execution sharing one eligibility resolution across every phase.
    async fn execute_with(
        &self,
        team_id: &str,
        plan: &SwapPlan,
        policy: ExecutionPolicy,
        resolved: &mut ResolvedPositions,
    ) -> Result<ExecutionResult> {
        let started_at = Utc::now();
        let mut results: Vec<SwapResult> = Vec::new();
        let mut warnings = Vec::new();

        for (i, pair) in plan.iter().enumerate() {
            if i > 0 {
                let t = &self.settings.throttle;
                pause(t.inter_swap, t.inter_swap_jitter).await;
            }
            let result = self.run_swap(team_id, pair, resolved).await?;

            if result.ok && !result.verified {
                warnings.push(format!(
                    "Swap {} -> {}: {OPTIMISTIC_REASON}",
                    pair.out_id, pair.in_id
                ));
            }
            for period in result.phases.iter().filter_map(|p| p.scheduled_period) {
                let note = format!("Server scheduled change to period {period}.");
                if !warnings.contains(&note) {
                    warnings.push(note);
                }
            }

            let failed = !result.ok;
            if failed {
                warn!(
                    out_id = %pair.out_id,
                    in_id = %pair.in_id,
                    error = result.error.as_deref().unwrap_or(""),
                    "swap failed"
                );
            }
            results.push(result);
            if failed && policy.is_strict() {
                break;
            }
        }

        let final_starters = match self.roster_source.fetch_roster(team_id).await {
            Ok(roster) => roster.starter_ids(),
            Err(e) => {
                warnings.push(format!("Final roster fetch failed: {e:#}"));
                Vec::new()
            }
        };

        let errors: Vec<String> = results.iter().filter_map(|r| r.error.clone()).collect();
        let ok = results.len() == plan.len() && results.iter().all(|r| r.ok);
        let verified = ok && results.iter().all(|r| r.verified);

        info!(team_id, swaps = results.len(), ok, verified, "execution finished");
        Ok(ExecutionResult {
            ok,
            verified,
            warnings,
            errors,
            per_swap_results: results,
            started_at,
            finished_at: Utc::now(),
            final_starters,
        })
    }

    /// Fetch, plan, and execute a full desired lineup.
    pub async fn set_lineup(
        &self,
        team_id: &str,
        desired_ids: &[String],
        policy: ExecutionPolicy,
    ) -> Result<ExecutionResult> {
        let roster = self.fetch_roster(team_id).await?;
        let mut resolved = ResolvedPositions::default();
        let outcome = self
            .plan_full_lineup_with(&roster, desired_ids, policy, &mut resolved)
            .await?;
        let mut result = self
            .execute_with(team_id, &outcome.plan, policy, &mut resolved)
            .await?;
        let mut warnings = outcome.warnings;
        warnings.append(&mut result.warnings);
        result.warnings = warnings;
        Ok(result)
    }

    /// Fetch, plan, and execute a single swap.
    pub async fn swap_players(
        &self,
        team_id: &str,
        out_id: &str,
        in_id: &str,
        policy: ExecutionPolicy,
    ) -> Result<ExecutionResult> {
        let roster = self.fetch_roster(team_id).await?;
        let mut resolved = ResolvedPositions::default();
        self.annotate_into(&roster, &mut resolved).await;
        let outcome = planner::plan_swap(
            &roster,
            out_id,
            in_id,
            resolved.positions(),
            &self.plan_options(policy),
        )?;
        let mut result = self
            .execute_with(team_id, &outcome.plan, policy, &mut resolved)
            .await?;
        let mut warnings = outcome.warnings;
        warnings.append(&mut result.warnings);
        result.warnings = warnings;
        Ok(result)
    }

    // -- swap internals -----------------------------------------------------

    async fn run_swap(
        &self,
        team_id: &str,
        pair: &SwapPair,
        resolved: &mut ResolvedPositions,
    ) -> Result<SwapResult> {
        info!(out_id = %pair.out_id, in_id = %pair.in_id, "starting swap");
        let mut phases = Vec::new();

        // Promote: `in` joins the actives.
        let roster = self.fetch_roster(team_id).await?;
        let mut starters = roster.starter_ids();
        if !starters.contains(&pair.in_id) {
            starters.push(pair.in_id.clone());
        }
        let promote = self
            .run_phase(
                Phase::Promote,
                team_id,
                &roster,
                &starters,
                Expectation::new(vec![pair.in_id.clone()], Vec::new()),
                resolved,
            )
            .await?;
        let promoted = promote.state.is_accepted();
        let promote_state = promote.state.clone();
        phases.push(promote);

        if !promoted {
            return Ok(SwapResult {
                out_id: pair.out_id.clone(),
                in_id: pair.in_id.clone(),
                ok: false,
                verified: false,
                phases,
                error: Some(phase_error(Phase::Promote, &promote_state)),
            });
        }

        pause(self.settings.throttle.inter_phase, std::time::Duration::ZERO).await;

        // Demote: `out` goes to the bench, `in` stays active.
        let roster = self.fetch_roster(team_id).await?;
        let mut starters: Vec<String> = roster
            .starter_ids()
            .into_iter()
            .filter(|id| id != &pair.out_id)
            .collect();
        if !starters.contains(&pair.in_id) {
            starters.push(pair.in_id.clone());
        }
        let demote = self
            .run_phase(
                Phase::Demote,
                team_id,
                &roster,
                &starters,
                Expectation::new(vec![pair.in_id.clone()], vec![pair.out_id.clone()]),
                resolved,
            )
            .await?;

        let ok = demote.state.is_accepted();
        let verified = demote.state == ProtocolState::Verified;
        let error = (!ok).then(|| phase_error(Phase::Demote, &demote.state));
        phases.push(demote);

        Ok(SwapResult {
            out_id: pair.out_id.clone(),
            in_id: pair.in_id.clone(),
            ok,
            verified,
            phases,
            error,
        })
    }

    /// Run one phase's protocol machine to completion.
    async fn run_phase(
        &self,
        phase: Phase,
        team_id: &str,
        roster: &Roster,
        starters: &[String],
        expectation: Expectation,
        resolved: &mut ResolvedPositions,
    ) -> Result<PhaseReport> {
        // Players seen earlier in this call are not resolved again.
        self.annotate_into(roster, resolved).await;
        let field_map = build_field_map(
            roster,
            starters,
            resolved.positions(),
            &self.settings.position_overrides,
        );
        let mut request = LineupChangeRequest::new(team_id, field_map);
        request.target_period = resolve_target_period(self.settings.target_period, roster);
        request.apply_to_future_periods = self.settings.apply_to_future_periods;

        let mut machine = PhaseMachine::new(request);
        let mut event = ProtocolEvent::Start;
        let mut requests_sent = 0;
        let mut verify_attempts = 0;

        loop {
            let (next, action) = machine.step(event);
            machine = next;
            event = match action {
                NextAction::SendConfirm(req) | NextAction::SendExecute(req) => {
                    requests_sent += 1;
                    let outcome = self
                        .transport
                        .submit(&req)
                        .await
                        .map_err(EngineError::Transport)?;
                    info!(
                        phase = phase.display_str(),
                        mode = req.mode.display_str(),
                        period = req.target_period,
                        accepted = outcome.accepted,
                        msg_type = ?outcome.message_type,
                        change_allowed = ?outcome.change_allowed,
                        "lineup request answered"
                    );
                    ProtocolEvent::Response(outcome)
                }
                NextAction::Verify => {
                    let v = verifier::verify(
                        self.roster_source.as_ref(),
                        team_id,
                        &expectation,
                        &self.settings.verify,
                    )
                    .await;
                    verify_attempts = v.attempts;
                    ProtocolEvent::Verification(v.verified)
                }
                NextAction::Finish => break,
            };
        }

        Ok(PhaseReport {
            phase,
            state: machine.state().clone(),
            target_period: machine.request().target_period,
            apply_to_future_periods: machine.request().apply_to_future_periods,
            scheduled_period: machine.scheduled_period(),
            requests_sent,
            verify_attempts,
        })
    }
}

fn phase_error(phase: Phase, state: &ProtocolState) -> String {
    match state {
        ProtocolState::Failed(reason) => format!("{} failed: {reason}", phase.display_str()),
        other => format!("{} ended in {}", phase.display_str(), other.display_str()),
    }
}
