// Command implementations behind the `subsync` binary. Each returns the JSON
// document the binary prints.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use serde_json::{json, Value};
use tracing::info;

use subsync_core::formation::compute_formation;
use subsync_core::locks::lock_signal;
use subsync_core::{EligibilityCache, ExecutionPolicy, LineupEngine};
use subsync_fxpa::FxpaClient;

use crate::config::Config;

const CLIENT_USER_AGENT: &str = concat!("subsync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// HTTP client carrying the configured session cookie on every request.
pub fn build_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    if let Some(cookie) = config.credentials.cookie.as_deref() {
        let mut value = HeaderValue::from_str(cookie.trim())
            .context("credentials.cookie is not a valid header value")?;
        value.set_sensitive(true);
        headers.insert(COOKIE, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

/// Engine backed by the FXPA client for all three collaborator seams.
pub fn build_engine(
    config: &Config,
    http: reqwest::Client,
    policy: ExecutionPolicy,
) -> LineupEngine {
    let cache = Arc::new(EligibilityCache::new());
    let client = Arc::new(
        FxpaClient::new(http, config.api.base_url.clone(), config.league.league_id.clone())
            .with_cache(cache.clone()),
    );
    let mut settings = config.engine_settings();
    settings.policy = policy;
    LineupEngine::new(client.clone(), client.clone(), cache, settings).with_lookup(client)
}

/// Split a comma or whitespace separated id list, dropping duplicates.
pub fn parse_lineup(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Current roster with resolved eligibility, lock state and formation.
pub async fn show(engine: &LineupEngine, team_id: &str) -> anyhow::Result<Value> {
    let roster = engine.fetch_roster(team_id).await?;
    let positions = engine.annotate(&roster).await;

    let players: Vec<Value> = roster
        .occupied()
        .map(|slot| {
            let id = slot.player_id().unwrap_or_default();
            json!({
                "id": id,
                "name": slot.player_name(),
                "slot": slot.slot.display_str(),
                "starter": slot.is_starter,
                "positions": positions.get(id).map(|p| p.to_string()),
                "locked": lock_signal(slot).map(|s| s.to_string()),
            })
        })
        .collect();

    Ok(json!({
        "team_id": roster.team_id,
        "period": roster.period,
        "formation": compute_formation(roster.slots.iter()).to_string(),
        "starters": roster.starter_ids(),
        "players": players,
    }))
}

/// Plan a full lineup change without executing it.
pub async fn plan(
    engine: &LineupEngine,
    team_id: &str,
    lineup: &[String],
) -> anyhow::Result<Value> {
    let roster = engine.fetch_roster(team_id).await?;
    let outcome = engine.plan_full_lineup(&roster, lineup).await?;
    Ok(json!({
        "from": outcome.current_formation.to_string(),
        "to": outcome.desired_formation.to_string(),
        "swaps": outcome.plan.describe(&roster),
        "warnings": outcome.warnings,
    }))
}

pub async fn swap(
    engine: &LineupEngine,
    team_id: &str,
    out_id: &str,
    in_id: &str,
    dry_run: bool,
) -> anyhow::Result<Value> {
    let policy = engine.settings().policy;
    if dry_run {
        let roster = engine.fetch_roster(team_id).await?;
        let outcome = engine.plan_swap(&roster, out_id, in_id).await?;
        return Ok(json!({
            "dry_run": true,
            "swaps": outcome.plan.describe(&roster),
            "warnings": outcome.warnings,
        }));
    }

    info!(team_id, out_id, in_id, policy = policy.display_str(), "swap requested");
    let result = engine.swap_players(team_id, out_id, in_id, policy).await?;
    Ok(serde_json::to_value(result)?)
}

pub async fn apply(
    engine: &LineupEngine,
    team_id: &str,
    lineup: &[String],
    dry_run: bool,
) -> anyhow::Result<Value> {
    if dry_run {
        let mut value = plan(engine, team_id, lineup).await?;
        value["dry_run"] = Value::Bool(true);
        return Ok(value);
    }

    let policy = engine.settings().policy;
    info!(team_id, starters = lineup.len(), policy = policy.display_str(), "lineup requested");
    let result = engine.set_lineup(team_id, lineup, policy).await?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lineup_splits_and_dedupes() {
        assert_eq!(
            parse_lineup("a1, b2 c3,,a1\n d4"),
            vec!["a1", "b2", "c3", "d4"]
        );
        assert!(parse_lineup("  , ").is_empty());
    }
}
