// Post-execute verification against a freshly fetched roster.
//
// The remote view is eventually consistent: an accepted change may take a
// moment to show up. Verification polls a bounded number of times and then
// gives up optimistically.

use std::time::Duration;

use tracing::{debug, warn};

use crate::remote::RosterSource;
use crate::roster::Roster;
use crate::throttle::pause;

/// Reason attached to changes the server accepted but the view never showed.
pub const OPTIMISTIC_REASON: &str = "optimistic (server accepted change but view not yet updated)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifySettings {
    pub attempts: u32,
    pub delay: Duration,
    pub jitter: Duration,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            attempts: 4,
            delay: Duration::from_millis(400),
            jitter: Duration::ZERO,
        }
    }
}

/// Exact membership the roster must show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectation {
    pub must_be_active: Vec<String>,
    pub must_be_inactive: Vec<String>,
}

impl Expectation {
    pub fn new(must_be_active: Vec<String>, must_be_inactive: Vec<String>) -> Self {
        Self {
            must_be_active,
            must_be_inactive,
        }
    }

    pub fn is_met(&self, roster: &Roster) -> bool {
        let starters = roster.starter_ids();
        self.must_be_active.iter().all(|id| starters.contains(id))
            && !self.must_be_inactive.iter().any(|id| starters.contains(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verified: bool,
    pub attempts: u32,
}

/// Re-fetch the roster up to `settings.attempts` times, waiting before each
/// attempt. Fetch errors count as failed attempts.
pub async fn verify(
    source: &dyn RosterSource,
    team_id: &str,
    expectation: &Expectation,
    settings: &VerifySettings,
) -> Verification {
    for attempt in 1..=settings.attempts {
        pause(settings.delay, settings.jitter).await;
        match source.fetch_roster(team_id).await {
            Ok(roster) if expectation.is_met(&roster) => {
                debug!(team_id, attempt, "lineup change verified");
                return Verification {
                    verified: true,
                    attempts: attempt,
                };
            }
            Ok(_) => debug!(team_id, attempt, "roster does not reflect change yet"),
            Err(e) => warn!(team_id, attempt, "verification fetch failed: {e:#}"),
        }
    }
    warn!(team_id, attempts = settings.attempts, "{OPTIMISTIC_REASON}");
    Verification {
        verified: false,
        attempts: settings.attempts,
    }
}
