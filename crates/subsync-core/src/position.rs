// Position buckets, remote slot ids, and eligibility sets.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Remote position id constants (as observed in FXPA payloads)
// ---------------------------------------------------------------------------

pub const POS_ID_BENCH: u32 = 0;
pub const POS_ID_FORWARD: u32 = 701;
pub const POS_ID_MIDFIELDER: u32 = 702;
pub const POS_ID_DEFENDER: u32 = 703;
pub const POS_ID_GOALKEEPER: u32 = 704;

/// Soccer position buckets used for formation counting and slot assignment.
///
/// The derived ordering (G, D, M, F) is the canonical iteration order used
/// everywhere a deterministic choice between buckets is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionCode {
    #[serde(rename = "G")]
    Goalkeeper,
    #[serde(rename = "D")]
    Defender,
    #[serde(rename = "M")]
    Midfielder,
    #[serde(rename = "F")]
    Forward,
}

impl PositionCode {
    pub const ALL: [PositionCode; 4] = [
        PositionCode::Goalkeeper,
        PositionCode::Defender,
        PositionCode::Midfielder,
        PositionCode::Forward,
    ];

    /// Outfield buckets in the order the rebalancing loop scans them.
    pub const OUTFIELD: [PositionCode; 3] = [
        PositionCode::Defender,
        PositionCode::Midfielder,
        PositionCode::Forward,
    ];

    /// Parse a position token into a bucket using the synonym table.
    ///
    /// - "G", "GK", "GKP", "GOALKEEPER" -> Goalkeeper
    /// - "D", "DEF", "DEFENDER", "WB" -> Defender
    /// - "M", "MID", "MIDFIELDER", "CM", "DM", "AM", "W" -> Midfielder
    /// - "F", "FW", "FWD", "STRIKER", "ST" -> Forward
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_uppercase().as_str() {
            "G" | "GK" | "GKP" | "GOALKEEPER" => Some(PositionCode::Goalkeeper),
            "D" | "DEF" | "DEFENDER" | "WB" => Some(PositionCode::Defender),
            "M" | "MID" | "MIDFIELDER" | "CM" | "DM" | "AM" | "W" => {
                Some(PositionCode::Midfielder)
            }
            "F" | "FW" | "FWD" | "STRIKER" | "ST" => Some(PositionCode::Forward),
            _ => None,
        }
    }

    /// Map a remote numeric position id to a bucket. Bench (0) and unknown
    /// ids return `None`.
    pub fn from_pos_id(id: u32) -> Option<Self> {
        match id {
            POS_ID_FORWARD => Some(PositionCode::Forward),
            POS_ID_MIDFIELDER => Some(PositionCode::Midfielder),
            POS_ID_DEFENDER => Some(PositionCode::Defender),
            POS_ID_GOALKEEPER => Some(PositionCode::Goalkeeper),
            _ => None,
        }
    }

    /// The remote numeric id for this bucket.
    pub fn pos_id(&self) -> u32 {
        match self {
            PositionCode::Forward => POS_ID_FORWARD,
            PositionCode::Midfielder => POS_ID_MIDFIELDER,
            PositionCode::Defender => POS_ID_DEFENDER,
            PositionCode::Goalkeeper => POS_ID_GOALKEEPER,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            PositionCode::Goalkeeper => "G",
            PositionCode::Defender => "D",
            PositionCode::Midfielder => "M",
            PositionCode::Forward => "F",
        }
    }
}

impl fmt::Display for PositionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// The slot a rostered player currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotPosition {
    Field(PositionCode),
    Bench,
}

impl SlotPosition {
    /// Map a remote slot id; anything that is not a field bucket is bench.
    pub fn from_pos_id(id: u32) -> Self {
        match PositionCode::from_pos_id(id) {
            Some(code) => SlotPosition::Field(code),
            None => SlotPosition::Bench,
        }
    }

    pub fn code(&self) -> Option<PositionCode> {
        match self {
            SlotPosition::Field(code) => Some(*code),
            SlotPosition::Bench => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            SlotPosition::Field(code) => code.display_str(),
            SlotPosition::Bench => "BN",
        }
    }
}

impl fmt::Display for SlotPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// ---------------------------------------------------------------------------
// EligibilitySet
// ---------------------------------------------------------------------------

/// The set of buckets a player may legally occupy. Iterates in G, D, M, F
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySet(BTreeSet<PositionCode>);

impl EligibilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(code: PositionCode) -> Self {
        let mut set = Self::new();
        set.insert(code);
        set
    }

    pub fn insert(&mut self, code: PositionCode) -> bool {
        self.0.insert(code)
    }

    /// Union `other` into `self`. Returns `true` if anything was added.
    pub fn merge(&mut self, other: &EligibilitySet) -> bool {
        let before = self.0.len();
        self.0.extend(other.0.iter().copied());
        self.0.len() != before
    }

    pub fn contains(&self, code: PositionCode) -> bool {
        self.0.contains(&code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First bucket in canonical order, used when a single bucket must be
    /// picked for a multi-eligible player.
    pub fn primary(&self) -> Option<PositionCode> {
        self.0.iter().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = PositionCode> + '_ {
        self.0.iter().copied()
    }

    pub fn is_superset(&self, other: &EligibilitySet) -> bool {
        self.0.is_superset(&other.0)
    }
}

impl FromIterator<PositionCode> for EligibilitySet {
    fn from_iter<I: IntoIterator<Item = PositionCode>>(iter: I) -> Self {
        EligibilitySet(iter.into_iter().collect())
    }
}

impl fmt::Display for EligibilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(|c| c.display_str()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// Split a textual position hint ("M/F", "D, M", "GK|DEF", "CM DM") into
/// buckets. Unrecognised tokens are ignored.
pub fn codes_from_hint(hint: &str) -> EligibilitySet {
    hint.split(|c: char| c == ',' || c == '/' || c == '|' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .filter_map(PositionCode::from_token)
        .collect()
}

/// Map a list of remote numeric ids to buckets, ignoring bench/unknown ids.
pub fn codes_from_pos_ids(ids: &[u32]) -> EligibilitySet {
    ids.iter().filter_map(|&id| PositionCode::from_pos_id(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_token_synonyms() {
        assert_eq!(PositionCode::from_token("GK"), Some(PositionCode::Goalkeeper));
        assert_eq!(PositionCode::from_token("gkp"), Some(PositionCode::Goalkeeper));
        assert_eq!(PositionCode::from_token("WB"), Some(PositionCode::Defender));
        assert_eq!(PositionCode::from_token("CM"), Some(PositionCode::Midfielder));
        assert_eq!(PositionCode::from_token("DM"), Some(PositionCode::Midfielder));
        assert_eq!(PositionCode::from_token("AM"), Some(PositionCode::Midfielder));
        assert_eq!(PositionCode::from_token(" st "), Some(PositionCode::Forward));
        assert_eq!(PositionCode::from_token("Res"), None);
        assert_eq!(PositionCode::from_token(""), None);
    }

    #[test]
    fn pos_id_table_round_trips_for_all_buckets() {
        for code in PositionCode::ALL {
            assert_eq!(PositionCode::from_pos_id(code.pos_id()), Some(code));
        }
        assert_eq!(PositionCode::from_pos_id(POS_ID_BENCH), None);
        assert_eq!(PositionCode::from_pos_id(705), None);
    }

    #[test]
    fn slot_position_from_bench_id() {
        assert_eq!(SlotPosition::from_pos_id(0), SlotPosition::Bench);
        assert_eq!(
            SlotPosition::from_pos_id(703),
            SlotPosition::Field(PositionCode::Defender)
        );
        assert_eq!(SlotPosition::Bench.code(), None);
    }

    #[test]
    fn hint_parsing_handles_all_delimiters() {
        let set = codes_from_hint("M/F");
        assert!(set.contains(PositionCode::Midfielder));
        assert!(set.contains(PositionCode::Forward));
        assert_eq!(set.len(), 2);

        let set = codes_from_hint("GK|DEF, cm  ST");
        assert_eq!(set.len(), 4);

        assert!(codes_from_hint("Res").is_empty());
    }

    #[test]
    fn eligibility_primary_follows_canonical_order() {
        let set: EligibilitySet = [PositionCode::Forward, PositionCode::Defender]
            .into_iter()
            .collect();
        assert_eq!(set.primary(), Some(PositionCode::Defender));
        assert_eq!(set.to_string(), "D/F");
    }

    #[test]
    fn merge_reports_growth() {
        let mut set = EligibilitySet::single(PositionCode::Midfielder);
        assert!(!set.merge(&EligibilitySet::single(PositionCode::Midfielder)));
        assert!(set.merge(&EligibilitySet::single(PositionCode::Forward)));
        assert_eq!(set.len(), 2);
    }
}
