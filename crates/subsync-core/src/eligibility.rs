// Position eligibility resolution with a session-owned cache.
//
// Remote roster rows describe positions inconsistently: starters carry an
// authoritative slot, bench rows may carry numeric ids or textual hints, and
// some players only reveal their positions through a separate stats lookup.
// The resolver walks an explicit, ordered list of sources and stops at the
// first one that yields anything.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::position::{codes_from_hint, codes_from_pos_ids, EligibilitySet, PositionCode};
use crate::remote::EligibilityLookup;
use crate::roster::{Roster, RosterSlot};

/// Raw metadata keys carrying numeric position ids, in lookup order.
const POS_ID_KEYS: [&str; 4] = ["defaultPosId", "posId", "posIds", "posIdsNoFlex"];

/// Raw metadata keys carrying textual position hints, in lookup order.
const HINT_KEYS: [&str; 2] = ["posShortNames", "posShortName"];

/// Player id -> best-known eligibility.
pub type EligibilityMap = HashMap<String, EligibilitySet>;

// ---------------------------------------------------------------------------
// EligibilityCache
// ---------------------------------------------------------------------------

/// Process- or session-scoped eligibility cache.
///
/// Entries only ever grow: every write is a union with what is already
/// stored. Owned by the caller (typically wrapped in an `Arc`) rather than
/// being a global, so independent sessions and tests never share state.
#[derive(Debug, Default)]
pub struct EligibilityCache {
    entries: Mutex<HashMap<String, EligibilitySet>>,
}

impl EligibilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, EligibilitySet>> {
        // A panic while holding the lock cannot leave a half-merged set, so a
        // poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, player_id: &str) -> Option<EligibilitySet> {
        self.entries().get(player_id).cloned()
    }

    /// Union `codes` into the entry for `player_id` and return the merged
    /// set. Empty sets are not recorded.
    pub fn merge(&self, player_id: &str, codes: &EligibilitySet) -> EligibilitySet {
        let mut entries = self.entries();
        if codes.is_empty() {
            return entries.get(player_id).cloned().unwrap_or_default();
        }
        let entry = entries.entry(player_id.to_string()).or_default();
        entry.merge(codes);
        entry.clone()
    }

    /// Manually prime a player's eligibility from remote ids and/or a hint
    /// string (e.g. after fetching a player page elsewhere).
    pub fn prime(&self, player_id: &str, pos_ids: &[u32], hint: Option<&str>) -> bool {
        let mut codes = codes_from_pos_ids(pos_ids);
        if let Some(hint) = hint {
            codes.merge(&codes_from_hint(hint));
        }
        if codes.is_empty() {
            return false;
        }
        self.merge(player_id, &codes);
        true
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn snapshot(&self) -> EligibilityMap {
        self.entries().clone()
    }
}

// ---------------------------------------------------------------------------
// Resolution sources
// ---------------------------------------------------------------------------

/// Where a resolved eligibility set came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilitySource {
    /// The slot's current bucket, when the player is active.
    StarterSlot,
    /// Numeric position ids and textual hints inside the raw row metadata.
    RawMetadata,
    /// A previously cached entry.
    Cache,
    /// Primary/listed positions on the player record.
    PlayerAttributes,
    /// On-demand lookup by player name.
    RemoteLookup,
}

impl EligibilitySource {
    /// Sources that can be evaluated without I/O, in priority order.
    pub const LOCAL_ORDER: [EligibilitySource; 4] = [
        EligibilitySource::StarterSlot,
        EligibilitySource::RawMetadata,
        EligibilitySource::Cache,
        EligibilitySource::PlayerAttributes,
    ];

    fn apply(&self, slot: &RosterSlot, cache: &EligibilityCache) -> EligibilitySet {
        match self {
            EligibilitySource::StarterSlot => slot
                .starter_code()
                .map(EligibilitySet::single)
                .unwrap_or_default(),
            EligibilitySource::RawMetadata => codes_from_raw(&slot.raw),
            EligibilitySource::Cache => slot
                .player_id()
                .and_then(|id| cache.get(id))
                .unwrap_or_default(),
            EligibilitySource::PlayerAttributes => codes_from_player_attributes(slot),
            // Needs I/O; handled by `EligibilityResolver::resolve`.
            EligibilitySource::RemoteLookup => EligibilitySet::new(),
        }
    }
}

/// A resolved eligibility set together with the source that produced it.
/// An empty set with no source means "unknown".
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub codes: EligibilitySet,
    pub source: Option<EligibilitySource>,
}

impl Resolution {
    fn unknown() -> Self {
        Self {
            codes: EligibilitySet::new(),
            source: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw metadata decoding
// ---------------------------------------------------------------------------

/// Collect numeric ids from a scalar, numeric string, or (nested) array.
fn pos_ids_from_value(value: &Value, out: &mut Vec<u32>) {
    match value {
        Value::Number(n) => {
            if let Some(id) = n.as_u64().and_then(|n| u32::try_from(n).ok()) {
                out.push(id);
            }
        }
        Value::String(s) => {
            for tok in s.split(|c: char| c == ',' || c == '/' || c == '|' || c.is_whitespace()) {
                if let Ok(id) = tok.trim().parse::<u32>() {
                    out.push(id);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                pos_ids_from_value(item, out);
            }
        }
        _ => {}
    }
}

fn hint_codes_from_value(value: &Value) -> EligibilitySet {
    match value {
        Value::String(s) => codes_from_hint(s),
        Value::Array(items) => {
            let mut codes = EligibilitySet::new();
            for item in items {
                codes.merge(&hint_codes_from_value(item));
            }
            codes
        }
        _ => EligibilitySet::new(),
    }
}

/// Ids from the first id key that yields a field bucket, unioned with codes
/// from the first hint key present.
fn codes_from_object(obj: &Map<String, Value>) -> EligibilitySet {
    let mut codes = EligibilitySet::new();

    for key in POS_ID_KEYS {
        let Some(value) = obj.get(key) else {
            continue;
        };
        let mut ids = Vec::new();
        pos_ids_from_value(value, &mut ids);
        let from_ids = codes_from_pos_ids(&ids);
        if !from_ids.is_empty() {
            codes.merge(&from_ids);
            break;
        }
    }

    if let Some(hint) = HINT_KEYS.iter().find_map(|k| obj.get(*k)) {
        codes.merge(&hint_codes_from_value(hint));
    }

    codes
}

/// Decode eligibility from raw row metadata: the row itself first, then its
/// nested `scorer` object.
pub fn codes_from_raw(raw: &Map<String, Value>) -> EligibilitySet {
    let codes = codes_from_object(raw);
    if !codes.is_empty() {
        return codes;
    }
    match raw.get("scorer") {
        Some(Value::Object(scorer)) => codes_from_object(scorer),
        _ => EligibilitySet::new(),
    }
}

/// "Midfielder", "GK", "F" ... -> bucket; falls back to the first letter.
fn code_from_attribute(value: &str) -> Option<PositionCode> {
    PositionCode::from_token(value).or_else(|| {
        value
            .trim()
            .chars()
            .next()
            .and_then(|c| PositionCode::from_token(&c.to_string()))
    })
}

fn codes_from_player_attributes(slot: &RosterSlot) -> EligibilitySet {
    let Some(player) = &slot.player else {
        return EligibilitySet::new();
    };
    player
        .primary_position
        .iter()
        .chain(player.positions.iter())
        .filter_map(|v| code_from_attribute(v))
        .collect()
}

// ---------------------------------------------------------------------------
// EligibilityResolver
// ---------------------------------------------------------------------------

/// Resolves eligibility for roster slots, recording every success in the
/// cache.
pub struct EligibilityResolver<'a> {
    cache: &'a EligibilityCache,
    lookup: Option<&'a dyn EligibilityLookup>,
}

impl<'a> EligibilityResolver<'a> {
    pub fn new(cache: &'a EligibilityCache, lookup: Option<&'a dyn EligibilityLookup>) -> Self {
        Self { cache, lookup }
    }

    /// Resolve using only the local sources (no I/O).
    pub fn resolve_local(&self, slot: &RosterSlot) -> Resolution {
        let Some(player_id) = slot.player_id() else {
            return Resolution::unknown();
        };
        for source in EligibilitySource::LOCAL_ORDER {
            let codes = source.apply(slot, self.cache);
            if !codes.is_empty() {
                self.cache.merge(player_id, &codes);
                return Resolution {
                    codes,
                    source: Some(source),
                };
            }
        }
        Resolution::unknown()
    }

    /// Resolve through the full chain, ending with the remote lookup by
    /// player name. Lookup failures leave the result empty.
    pub async fn resolve(&self, slot: &RosterSlot) -> Resolution {
        let local = self.resolve_local(slot);
        if local.source.is_some() {
            return local;
        }
        let (Some(lookup), Some(player)) = (self.lookup, slot.player.as_ref()) else {
            return local;
        };
        if player.name.trim().is_empty() {
            return local;
        }

        match lookup.lookup_positions(&player.id, &player.name).await {
            Ok(codes) if !codes.is_empty() => {
                debug!(player_id = %player.id, codes = %codes, "eligibility resolved remotely");
                self.cache.merge(&player.id, &codes);
                Resolution {
                    codes,
                    source: Some(EligibilitySource::RemoteLookup),
                }
            }
            Ok(_) => {
                debug!(player_id = %player.id, "remote lookup returned no positions");
                local
            }
            Err(e) => {
                warn!(player_id = %player.id, "eligibility lookup failed: {e:#}");
                local
            }
        }
    }

    /// Resolve every occupied slot. Players that stay unknown are absent
    /// from the returned map.
    pub async fn annotate(&self, roster: &Roster) -> EligibilityMap {
        let mut resolved = ResolvedPositions::default();
        self.extend(roster, &mut resolved).await;
        resolved.into_map()
    }

    /// Resolve the occupied slots of `roster` that `resolved` has not seen
    /// yet. Players already attempted are skipped even when they stayed
    /// unknown, so a failing lookup runs at most once per `resolved`.
    pub async fn extend(&self, roster: &Roster, resolved: &mut ResolvedPositions) {
        for slot in roster.occupied() {
            let Some(id) = slot.player_id() else {
                continue;
            };
            if !resolved.attempted.insert(id.to_string()) {
                continue;
            }
            let resolution = self.resolve(slot).await;
            if !resolution.codes.is_empty() {
                resolved.positions.insert(id.to_string(), resolution.codes);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ResolvedPositions
// ---------------------------------------------------------------------------

/// Eligibility resolved during one planning/execution call, including the
/// players that could not be resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPositions {
    positions: EligibilityMap,
    attempted: HashSet<String>,
}

impl ResolvedPositions {
    pub fn positions(&self) -> &EligibilityMap {
        &self.positions
    }

    pub fn into_map(self) -> EligibilityMap {
        self.positions
    }

    pub fn attempted(&self, player_id: &str) -> bool {
        self.attempted.contains(player_id)
    }
}
