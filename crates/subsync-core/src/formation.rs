// Formation counts and legality rules for the eleven active players.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::PositionCode;
use crate::roster::RosterSlot;

/// Number of active players the remote service requires.
pub const ACTIVE_PLAYERS: usize = 11;

/// Goalkeeper/defender/midfielder/forward counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
    pub gk: usize,
    pub d: usize,
    pub m: usize,
    pub f: usize,
}

impl Formation {
    pub fn new(gk: usize, d: usize, m: usize, f: usize) -> Self {
        Self { gk, d, m, f }
    }

    /// Count buckets from an iterator of codes.
    pub fn from_codes<I: IntoIterator<Item = PositionCode>>(codes: I) -> Self {
        let mut formation = Formation::default();
        for code in codes {
            formation.add(code);
        }
        formation
    }

    pub fn total(&self) -> usize {
        self.gk + self.d + self.m + self.f
    }

    pub fn count(&self, code: PositionCode) -> usize {
        match code {
            PositionCode::Goalkeeper => self.gk,
            PositionCode::Defender => self.d,
            PositionCode::Midfielder => self.m,
            PositionCode::Forward => self.f,
        }
    }

    fn count_mut(&mut self, code: PositionCode) -> &mut usize {
        match code {
            PositionCode::Goalkeeper => &mut self.gk,
            PositionCode::Defender => &mut self.d,
            PositionCode::Midfielder => &mut self.m,
            PositionCode::Forward => &mut self.f,
        }
    }

    pub fn add(&mut self, code: PositionCode) {
        *self.count_mut(code) += 1;
    }

    pub fn remove(&mut self, code: PositionCode) {
        let slot = self.count_mut(code);
        *slot = slot.saturating_sub(1);
    }

    /// Apply one swap: `out_code` leaves the lineup, `in_code` joins it.
    pub fn apply_swap(&mut self, out_code: PositionCode, in_code: PositionCode) {
        self.remove(out_code);
        self.add(in_code);
    }

    /// Legality: exactly 11 players, 3-5 D, 2-5 M, 1-3 F, and one
    /// goalkeeper. The relaxed variant accepts zero or one goalkeeper and is
    /// used for intermediate states and desired-set validation.
    pub fn is_legal(&self, relaxed: bool) -> bool {
        let gk_ok = if relaxed { self.gk <= 1 } else { self.gk == 1 };
        self.total() == ACTIVE_PLAYERS
            && gk_ok
            && (3..=5).contains(&self.d)
            && (2..=5).contains(&self.m)
            && (1..=3).contains(&self.f)
    }

    /// Outfield buckets holding more players than `target`, in D, M, F order.
    pub fn surplus(&self, target: &Formation) -> Vec<PositionCode> {
        PositionCode::OUTFIELD
            .into_iter()
            .filter(|&code| self.count(code) > target.count(code))
            .collect()
    }

    /// Outfield buckets holding fewer players than `target`, in D, M, F order.
    pub fn deficit(&self, target: &Formation) -> Vec<PositionCode> {
        PositionCode::OUTFIELD
            .into_iter()
            .filter(|&code| self.count(code) < target.count(code))
            .collect()
    }

    pub fn outfield_matches(&self, target: &Formation) -> bool {
        self.d == target.d && self.m == target.m && self.f == target.f
    }
}

impl fmt::Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.gk, self.d, self.m, self.f)
    }
}

/// Count the active field slots of a roster by their current bucket.
pub fn compute_formation<'a, I>(slots: I) -> Formation
where
    I: IntoIterator<Item = &'a RosterSlot>,
{
    Formation::from_codes(
        slots
            .into_iter()
            .filter(|s| s.player.is_some())
            .filter_map(|s| s.starter_code()),
    )
}
