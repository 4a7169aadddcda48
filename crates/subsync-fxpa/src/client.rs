// HTTP client for the FXPA JSON-RPC endpoint.
//
// Every call POSTs a single-message envelope to `{base}/fxpa/req`. The session
// cookie is carried by the `reqwest::Client` handed in by the caller.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use subsync_core::eligibility::EligibilityCache;
use subsync_core::position::EligibilitySet;
use subsync_core::protocol::{LineupChangeRequest, ProtocolOutcome};
use subsync_core::remote::{EligibilityLookup, LineupTransport, RosterSource};
use subsync_core::roster::Roster;

use crate::decode::{
    self, METHOD_LINEUP_CHANGE, METHOD_PLAYER_STATS, METHOD_ROSTER,
};
use crate::error::FxpaError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://www.fantrax.com";

/// Error bodies are cut to this many characters before being reported.
const ERROR_BODY_LIMIT: usize = 300;

// ---------------------------------------------------------------------------
// FxpaClient
// ---------------------------------------------------------------------------

pub struct FxpaClient {
    http: reqwest::Client,
    base_url: String,
    league_id: String,
    cache: Option<Arc<EligibilityCache>>,
}

impl FxpaClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        league_id: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            league_id: league_id.into(),
            cache: None,
        }
    }

    /// Share an eligibility cache that lineup change responses and player
    /// searches will warm.
    pub fn with_cache(mut self, cache: Arc<EligibilityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn league_id(&self) -> &str {
        &self.league_id
    }

    fn endpoint(&self) -> String {
        format!("{}/fxpa/req?leagueId={}", self.base_url, self.league_id)
    }

    fn ref_url(&self, page: &str) -> String {
        format!(
            "{}/fantasy/league/{}/{}",
            self.base_url, self.league_id, page
        )
    }

    async fn call(&self, method: &str, data: Value, page: &str) -> Result<Value, FxpaError> {
        let body = decode::envelope(method, data, &self.ref_url(page));
        debug!(method, "fxpa request");

        let response = self.http.post(self.endpoint()).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() >= 400 {
            let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            warn!(method, status = status.as_u16(), "fxpa request rejected");
            return Err(FxpaError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| FxpaError::Decode(e.to_string()))?;
        decode::check_session(&value)?;
        Ok(value)
    }

    /// Fetch and decode a team's roster.
    pub async fn roster_info(&self, team_id: &str) -> Result<Roster, FxpaError> {
        let data = json!({ "leagueId": self.league_id, "teamId": team_id });
        let body = self.call(METHOD_ROSTER, data, "team/roster").await?;
        decode::decode_roster(team_id, &body)
    }

    /// Search the player list by name and return the positions of the row
    /// whose id matches. Every row found is cached as a side effect.
    pub async fn player_positions(
        &self,
        player_id: &str,
        search_name: &str,
    ) -> Result<EligibilitySet, FxpaError> {
        let data = json!({
            "statusOrTeamFilter": "ALL",
            "pageNumber": "1",
            "searchName": search_name,
        });
        let body = self.call(METHOD_PLAYER_STATS, data, "players").await?;
        if let Some(cache) = &self.cache {
            let warmed = decode::warm_from_player_stats(cache, &body);
            debug!(warmed, "cached eligibility from player search");
        }
        decode::decode_player_positions(&body, player_id)
    }

    /// Send one confirm- or execute-mode lineup change.
    pub async fn confirm_or_execute(
        &self,
        request: &LineupChangeRequest,
    ) -> Result<ProtocolOutcome, FxpaError> {
        let data = decode::encode_change_request(request);
        if let Some(cache) = &self.cache {
            decode::warm_from_field_map(cache, &data["fieldMap"]);
        }
        info!(
            team_id = %request.team_id,
            mode = request.mode.display_str(),
            period = request.target_period,
            "submitting lineup change"
        );

        let body = self.call(METHOD_LINEUP_CHANGE, data, "team/roster").await?;
        if let Some(cache) = &self.cache {
            decode::warm_from_scorer_map(cache, &body);
        }
        decode::decode_outcome(&body)
    }
}

// ---------------------------------------------------------------------------
// Engine seams
// ---------------------------------------------------------------------------

#[async_trait]
impl RosterSource for FxpaClient {
    async fn fetch_roster(&self, team_id: &str) -> anyhow::Result<Roster> {
        self.roster_info(team_id)
            .await
            .with_context(|| format!("failed to fetch roster for team {team_id}"))
    }
}

#[async_trait]
impl EligibilityLookup for FxpaClient {
    async fn lookup_positions(
        &self,
        player_id: &str,
        player_name: &str,
    ) -> anyhow::Result<EligibilitySet> {
        self.player_positions(player_id, player_name)
            .await
            .with_context(|| format!("player search for {player_name} failed"))
    }
}

#[async_trait]
impl LineupTransport for FxpaClient {
    async fn submit(&self, request: &LineupChangeRequest) -> anyhow::Result<ProtocolOutcome> {
        self.confirm_or_execute(request).await.with_context(|| {
            format!(
                "{} request for team {} failed",
                request.mode.display_str(),
                request.team_id
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use subsync_core::position::PositionCode;
    use subsync_core::protocol::FieldAssignment;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read until the headers and the declared body have arrived.
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let declared = text[..split]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + declared {
                        break;
                    }
                }
            }
            let request = String::from_utf8_lossy(&raw).to_string();

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            request
        });

        (format!("http://{addr}"), server_task)
    }

    #[tokio::test]
    async fn roster_info_round_trip() {
        let body = json!({ "responses": [{ "data": {
            "rosterAdjustmentInfo": { "rosterLimitPeriod": 9 },
            "tables": [{ "rows": [
                { "posId": 704, "statusId": "1", "scorer": { "scorerId": "g1", "name": "Keeper" } }
            ] }]
        } }] })
        .to_string();
        let (base, server) = serve_once("HTTP/1.1 200 OK", body).await;

        let client = FxpaClient::new(reqwest::Client::new(), base, "L1");
        let roster = client.roster_info("T1").await.unwrap();
        assert_eq!(roster.starter_ids(), vec!["g1"]);
        assert_eq!(roster.period, Some(9));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /fxpa/req?leagueId=L1"));
        assert!(request.contains("getTeamRosterInfo"));
        assert!(request.contains("\"teamId\":\"T1\""));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let (base, _server) =
            serve_once("HTTP/1.1 503 Service Unavailable", "{\"oops\":1}".to_string()).await;

        let client = FxpaClient::new(reqwest::Client::new(), base, "L1");
        let err = client.roster_info("T1").await.unwrap_err();
        assert!(matches!(err, FxpaError::Status { code: 503, ref body } if body == "{\"oops\":1}"));
    }

    #[tokio::test]
    async fn lost_session_is_unauthorized() {
        let body = json!({ "pageError": { "code": "WARNING_NOT_LOGGED_IN" } }).to_string();
        let (base, _server) = serve_once("HTTP/1.1 200 OK", body).await;

        let client = FxpaClient::new(reqwest::Client::new(), base, "L1");
        let err = client.fetch_roster("T1").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FxpaError>(),
            Some(FxpaError::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn confirm_warms_cache_and_decodes_outcome() {
        let body = json!({ "responses": [{ "data": {
            "fantasyResponse": {
                "msgType": "CONFIRM",
                "scorerMap": { "m1": { "posShortNames": "M/F" } }
            }
        } }] })
        .to_string();
        let (base, server) = serve_once("HTTP/1.1 200 OK", body).await;

        let cache = Arc::new(EligibilityCache::new());
        let client = FxpaClient::new(reqwest::Client::new(), base, "L1").with_cache(cache.clone());

        let mut map = BTreeMap::new();
        map.insert("d1".to_string(), FieldAssignment::starter(PositionCode::Defender));
        let outcome = client
            .submit(&LineupChangeRequest::new("T1", map))
            .await
            .unwrap();
        assert!(outcome.accepted);

        assert_eq!(cache.get("d1"), Some(EligibilitySet::single(PositionCode::Defender)));
        assert_eq!(cache.get("m1").map(|s| s.len()), Some(2));

        let request = server.await.unwrap();
        assert!(request.contains("confirmOrExecuteTeamRosterChanges"));
        assert!(request.contains("\"action\":\"CONFIRM\""));
    }
}
