// Swap planning: turn a desired starting eleven into ordered (out, in) pairs.
//
// Planning is pure. Callers resolve eligibility up front and pass it in as an
// `EligibilityMap`; no remote calls happen here.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::eligibility::EligibilityMap;
use crate::error::PlanError;
use crate::formation::{Formation, ACTIVE_PLAYERS};
use crate::locks::{is_locked, lock_signal};
use crate::position::PositionCode;
use crate::roster::{Roster, RosterSlot};

/// Upper bound on rebalancing iterations.
const REBALANCE_SAFETY: usize = 100;

// ---------------------------------------------------------------------------
// ExecutionPolicy
// ---------------------------------------------------------------------------

/// How lock conflicts and failed swaps are handled, shared by the planner and
/// the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Lock conflicts fail planning; the first failed swap stops execution.
    Strict,
    /// Lock conflicts drop the pair with a warning; failed swaps are recorded
    /// and execution continues.
    #[default]
    BestEffort,
}

impl ExecutionPolicy {
    pub fn from_str_policy(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "strict" => Some(ExecutionPolicy::Strict),
            "best_effort" | "besteffort" => Some(ExecutionPolicy::BestEffort),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            ExecutionPolicy::Strict => "strict",
            ExecutionPolicy::BestEffort => "best_effort",
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, ExecutionPolicy::Strict)
    }
}

// ---------------------------------------------------------------------------
// SwapPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPair {
    pub out_id: String,
    pub in_id: String,
}

impl SwapPair {
    pub fn new(out_id: impl Into<String>, in_id: impl Into<String>) -> Self {
        Self {
            out_id: out_id.into(),
            in_id: in_id.into(),
        }
    }
}

/// Ordered swap pairs. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPlan {
    pairs: Vec<SwapPair>,
}

/// Human-readable rendering of one swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapDescription {
    pub out_id: String,
    pub out_name: String,
    pub out_slot: String,
    pub in_id: String,
    pub in_name: String,
    pub in_slot: String,
}

impl fmt::Display for SwapDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OUT {} ({}) <-> IN {} ({})",
            self.out_name, self.out_slot, self.in_name, self.in_slot
        )
    }
}

impl SwapPlan {
    pub fn new(pairs: Vec<SwapPair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[SwapPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SwapPair> {
        self.pairs.iter()
    }

    /// The starter set obtained by applying every pair to `current`, in
    /// order.
    pub fn resulting_starters(&self, current: &[String]) -> Vec<String> {
        let mut starters: Vec<String> = current.to_vec();
        for pair in &self.pairs {
            starters.retain(|id| id != &pair.out_id);
            if !starters.contains(&pair.in_id) {
                starters.push(pair.in_id.clone());
            }
        }
        starters
    }

    /// Render each pair with player names and current slots.
    pub fn describe(&self, roster: &Roster) -> Vec<SwapDescription> {
        let side = |id: &str| -> (String, String) {
            match roster.find(id) {
                Some(slot) => (
                    slot.player_name().unwrap_or("?").to_string(),
                    slot.slot.display_str().to_string(),
                ),
                None => ("?".to_string(), "BN".to_string()),
            }
        };
        self.pairs
            .iter()
            .map(|pair| {
                let (out_name, out_slot) = side(&pair.out_id);
                let (in_name, in_slot) = side(&pair.in_id);
                SwapDescription {
                    out_id: pair.out_id.clone(),
                    out_name,
                    out_slot,
                    in_id: pair.in_id.clone(),
                    in_name,
                    in_slot,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub policy: ExecutionPolicy,
    /// Refuse to move locked players.
    pub ensure_unlocked: bool,
    /// Caller-chosen bucket per player id, taking precedence over everything.
    pub position_overrides: HashMap<String, PositionCode>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            policy: ExecutionPolicy::BestEffort,
            ensure_unlocked: true,
            position_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutcome {
    pub plan: SwapPlan,
    pub warnings: Vec<String>,
    pub current_formation: Formation,
    pub desired_formation: Formation,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Effective bucket of a player: override, then current starter slot, then
/// first eligible code in G, D, M, F order. `None` means unknown.
pub fn effective_bucket(
    player_id: &str,
    slot: Option<&RosterSlot>,
    positions: &EligibilityMap,
    overrides: &HashMap<String, PositionCode>,
) -> Option<PositionCode> {
    if let Some(code) = overrides.get(player_id) {
        return Some(*code);
    }
    if let Some(code) = slot.and_then(RosterSlot::starter_code) {
        return Some(code);
    }
    positions.get(player_id).and_then(|set| set.primary())
}

/// Working state shared by the planning passes.
struct Planner<'a> {
    roster: &'a Roster,
    positions: &'a EligibilityMap,
    options: &'a PlanOptions,
    plan: Vec<SwapPair>,
    warnings: Vec<String>,
}

impl<'a> Planner<'a> {
    fn new(roster: &'a Roster, positions: &'a EligibilityMap, options: &'a PlanOptions) -> Self {
        Self {
            roster,
            positions,
            options,
            plan: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn bucket_of(&self, player_id: &str) -> Option<PositionCode> {
        effective_bucket(
            player_id,
            self.roster.find(player_id),
            self.positions,
            &self.options.position_overrides,
        )
    }

    fn formation_of<'i, I: IntoIterator<Item = &'i String>>(&self, ids: I) -> Formation {
        Formation::from_codes(ids.into_iter().filter_map(|id| self.bucket_of(id)))
    }

    fn movable(&self, player_id: &str) -> bool {
        if !self.options.ensure_unlocked {
            return true;
        }
        !self.roster.find(player_id).is_some_and(is_locked)
    }

    /// Record a pair unless a lock blocks it. Returns whether it was added.
    fn admit(&mut self, out_id: String, in_id: String) -> Result<bool, PlanError> {
        if self.movable(&out_id) && self.movable(&in_id) {
            debug!(out_id = %out_id, in_id = %in_id, "planned swap");
            self.plan.push(SwapPair { out_id, in_id });
            return Ok(true);
        }
        if self.options.policy.is_strict() {
            return Err(PlanError::LockConflict { out_id, in_id });
        }
        let warning = format!(
            "Skipped swap {} <-> {} due to lock.",
            self.roster.name_of(&out_id),
            self.roster.name_of(&in_id)
        );
        warn!("{warning}");
        self.warnings.push(warning);
        Ok(false)
    }

    fn same_position_pass(
        &mut self,
        order: &[PositionCode],
        adds: &mut Pools,
        removes: &mut Pools,
    ) -> Result<(), PlanError> {
        for &code in order {
            while adds.has(code) && removes.has(code) {
                let (Some(in_id), Some(out_id)) = (adds.take(code), removes.take(code)) else {
                    break;
                };
                self.admit(out_id, in_id)?;
            }
        }
        Ok(())
    }
}

/// Per-bucket LIFO pools plus a pool for players with no known bucket.
#[derive(Default)]
struct Pools {
    by_code: BTreeMap<PositionCode, Vec<String>>,
    unknown: Vec<String>,
}

impl Pools {
    fn push(&mut self, code: Option<PositionCode>, id: String) {
        match code {
            Some(code) => self.by_code.entry(code).or_default().push(id),
            None => self.unknown.push(id),
        }
    }

    fn has(&self, code: PositionCode) -> bool {
        self.by_code.get(&code).is_some_and(|v| !v.is_empty())
    }

    /// Pop the most recently pushed id for a bucket.
    fn take(&mut self, code: PositionCode) -> Option<String> {
        self.by_code.get_mut(&code).and_then(Vec::pop)
    }

    fn remaining(&self) -> usize {
        self.by_code.values().map(Vec::len).sum::<usize>() + self.unknown.len()
    }
}

fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Check the desired set without touching the network.
fn validate_desired(
    planner: &Planner<'_>,
    desired: &[String],
) -> Result<Formation, PlanError> {
    let mut messages = Vec::new();
    if desired.len() != ACTIVE_PLAYERS {
        messages.push(format!(
            "Exactly {ACTIVE_PLAYERS} starters required; got {}.",
            desired.len()
        ));
    }
    let missing: Vec<&str> = desired
        .iter()
        .filter(|id| !planner.roster.has_player(id))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        messages.push(format!(
            "{} selected not on roster: {}",
            missing.len(),
            missing.join(", ")
        ));
    }
    if !messages.is_empty() {
        return Err(PlanError::Validation { messages });
    }

    let unknown: Vec<&str> = desired
        .iter()
        .filter(|id| planner.bucket_of(id).is_none())
        .map(|id| planner.roster.name_of(id))
        .collect();
    if !unknown.is_empty() {
        messages.push(format!("Position unknown for: {}", unknown.join(", ")));
    }

    let formation = planner.formation_of(desired);
    if !formation.is_legal(true) {
        messages.push(format!(
            "Invalid formation {formation} (needs GK 0-1, D 3-5, M 2-5, F 1-3; 11 total)."
        ));
    }
    if formation.gk > 1 {
        messages.push("You can have at most 1 GK.".to_string());
    }
    if !messages.is_empty() {
        return Err(PlanError::Validation { messages });
    }
    Ok(formation)
}

/// Plan the swaps that take the roster's current starters to `desired_ids`.
pub fn plan_full_lineup(
    roster: &Roster,
    desired_ids: &[String],
    positions: &EligibilityMap,
    options: &PlanOptions,
) -> Result<PlanOutcome, PlanError> {
    let desired = dedup_preserving_order(desired_ids);
    let mut planner = Planner::new(roster, positions, options);
    let target = validate_desired(&planner, &desired)?;

    let current = roster.starter_ids();
    let mut working = planner.formation_of(&current);
    let current_formation = working;

    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

    let mut adds = Pools::default();
    for id in desired.iter().filter(|id| !current_set.contains(id.as_str())) {
        adds.push(planner.bucket_of(id), id.clone());
    }
    let mut removes = Pools::default();
    for id in current.iter().filter(|id| !desired_set.contains(id.as_str())) {
        removes.push(planner.bucket_of(id), id.clone());
    }

    if adds.remaining() == 0 && removes.remaining() == 0 {
        return Ok(PlanOutcome {
            plan: SwapPlan::default(),
            warnings: Vec::new(),
            current_formation,
            desired_formation: target,
        });
    }

    // 1. Same-position swaps.
    planner.same_position_pass(&PositionCode::ALL, &mut adds, &mut removes)?;
    for pair in &planner.plan {
        let buckets = (planner.bucket_of(&pair.out_id), planner.bucket_of(&pair.in_id));
        if let (Some(o), Some(i)) = buckets {
            working.apply_swap(o, i);
        }
    }

    // 2. Goalkeeper balancing.
    if working.gk > target.gk && removes.has(PositionCode::Goalkeeper) {
        let in_code = working
            .deficit(&target)
            .into_iter()
            .find(|&code| adds.has(code));
        if let Some(in_code) = in_code {
            if let (Some(in_id), Some(out_id)) =
                (adds.take(in_code), removes.take(PositionCode::Goalkeeper))
            {
                if planner.admit(out_id, in_id)? {
                    working.apply_swap(PositionCode::Goalkeeper, in_code);
                }
            }
        }
    } else if working.gk < target.gk && adds.has(PositionCode::Goalkeeper) {
        let mut candidates = working.surplus(&target);
        if candidates.is_empty() {
            candidates = PositionCode::OUTFIELD.to_vec();
        }
        if let Some(out_code) = candidates.into_iter().find(|&code| removes.has(code)) {
            if let (Some(in_id), Some(out_id)) =
                (adds.take(PositionCode::Goalkeeper), removes.take(out_code))
            {
                if planner.admit(out_id, in_id)? {
                    working.apply_swap(out_code, PositionCode::Goalkeeper);
                }
            }
        }
    }

    // 3. Outfield rebalancing: pair a surplus removal with a deficit
    //    addition until the outfield counts match.
    let mut safety = REBALANCE_SAFETY;
    while safety > 0 && !working.outfield_matches(&target) {
        safety -= 1;
        let surplus = working.surplus(&target);
        let deficit = working.deficit(&target);
        let pick = surplus.iter().find_map(|&out_code| {
            deficit
                .iter()
                .find(|&&in_code| adds.has(in_code) && removes.has(out_code))
                .map(|&in_code| (out_code, in_code))
        });
        let Some((out_code, in_code)) = pick else {
            break;
        };
        let (Some(out_id), Some(in_id)) = (removes.take(out_code), adds.take(in_code)) else {
            break;
        };
        if planner.admit(out_id, in_id)? {
            working.apply_swap(out_code, in_code);
        }
    }
    if safety == 0 && !working.outfield_matches(&target) {
        planner.warnings.push(format!(
            "Rebalancing stopped after {REBALANCE_SAFETY} iterations at {working}; plan may be incomplete."
        ));
    }

    // 4. Cleanup same-position pass.
    let cleanup = [
        PositionCode::Defender,
        PositionCode::Midfielder,
        PositionCode::Forward,
        PositionCode::Goalkeeper,
    ];
    planner.same_position_pass(&cleanup, &mut adds, &mut removes)?;

    let unpaired_adds = adds.remaining();
    let unpaired_removes = removes.remaining();
    if unpaired_adds > 0 || unpaired_removes > 0 {
        planner.warnings.push(format!(
            "Plan incomplete: {unpaired_adds} addition(s) and {unpaired_removes} removal(s) could not be paired."
        ));
    }

    Ok(PlanOutcome {
        plan: SwapPlan::new(planner.plan),
        warnings: planner.warnings,
        current_formation,
        desired_formation: target,
    })
}

/// Plan a single explicit swap.
pub fn plan_swap(
    roster: &Roster,
    out_id: &str,
    in_id: &str,
    positions: &EligibilityMap,
    options: &PlanOptions,
) -> Result<PlanOutcome, PlanError> {
    let mut planner = Planner::new(roster, positions, options);

    let mut messages = Vec::new();
    match roster.find(out_id) {
        None => messages.push(format!("Outgoing player {out_id} not found on roster.")),
        Some(slot) if !slot.is_starter => messages.push(format!(
            "Outgoing player {} is not active.",
            roster.name_of(out_id)
        )),
        Some(_) => {}
    }
    match roster.find(in_id) {
        None => messages.push(format!("Incoming player {in_id} not found on roster.")),
        Some(slot) if slot.is_starter => messages.push(format!(
            "Incoming player {} is already active.",
            roster.name_of(in_id)
        )),
        Some(_) => {}
    }
    if !messages.is_empty() {
        return Err(PlanError::Validation { messages });
    }

    let current_formation = planner.formation_of(&roster.starter_ids());
    let mut desired_formation = current_formation;
    if let (Some(out_code), Some(in_code)) = (planner.bucket_of(out_id), planner.bucket_of(in_id)) {
        desired_formation.apply_swap(out_code, in_code);
        if !desired_formation.is_legal(true) {
            return Err(PlanError::validation(format!(
                "Swap would leave an invalid formation {desired_formation}."
            )));
        }
    }

    planner.admit(out_id.to_string(), in_id.to_string())?;

    Ok(PlanOutcome {
        plan: SwapPlan::new(planner.plan),
        warnings: planner.warnings,
        current_formation,
        desired_formation,
    })
}

/// Advisory checks for a single swap. Missing players are errors; role
/// mix-ups and locks are only warnings.
pub fn preflight_swap(
    roster: &Roster,
    starter_id: &str,
    bench_id: &str,
) -> Result<Vec<String>, PlanError> {
    let starter = roster.find(starter_id);
    let bench = roster.find(bench_id);

    let mut errors = Vec::new();
    if starter.is_none() {
        errors.push("Starter player not found on roster.".to_string());
    }
    if bench.is_none() {
        errors.push("Bench player not found on roster.".to_string());
    }
    let (Some(starter), Some(bench)) = (starter, bench) else {
        return Err(PlanError::Validation { messages: errors });
    };

    let mut warnings = Vec::new();
    if !starter.is_starter {
        warnings.push("Selected starter appears to be on the bench.".to_string());
    }
    if bench.is_starter {
        warnings.push("Selected bench player appears to be a starter.".to_string());
    }
    if let Some(signal) = lock_signal(starter) {
        warnings.push(format!(
            "Starter appears locked ({signal}); swap may defer or be rejected."
        ));
    }
    if let Some(signal) = lock_signal(bench) {
        warnings.push(format!(
            "Bench player appears locked ({signal}); swap may defer or be rejected."
        ));
    }
    Ok(warnings)
}
