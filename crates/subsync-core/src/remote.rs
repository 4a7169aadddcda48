// Collaborator seams between the engine and the remote service.

use async_trait::async_trait;

use crate::position::EligibilitySet;
use crate::protocol::{LineupChangeRequest, ProtocolOutcome};
use crate::roster::Roster;

/// Fetches a fresh roster snapshot for a team.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_roster(&self, team_id: &str) -> anyhow::Result<Roster>;
}

/// Looks up a player's eligible positions by name. Failures are non-fatal to
/// callers: the resolver logs them and treats the player as unknown.
#[async_trait]
pub trait EligibilityLookup: Send + Sync {
    async fn lookup_positions(
        &self,
        player_id: &str,
        player_name: &str,
    ) -> anyhow::Result<EligibilitySet>;
}

/// Submits one confirm- or execute-mode lineup change request.
#[async_trait]
pub trait LineupTransport: Send + Sync {
    async fn submit(&self, request: &LineupChangeRequest) -> anyhow::Result<ProtocolOutcome>;
}
