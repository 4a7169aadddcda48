// Wire encoding and decoding for FXPA request/response payloads.
//
// FXPA responses are loosely typed: ids arrive as numbers or strings, the
// permission model shows up under different parents depending on the call,
// and errors can sit at three levels of the envelope. Each ambiguity is
// resolved by an explicit, ordered list of lookups.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use subsync_core::eligibility::{codes_from_raw, EligibilityCache};
use subsync_core::position::{codes_from_pos_ids, EligibilitySet, SlotPosition, POS_ID_BENCH};
use subsync_core::protocol::{
    FieldAssignment, LineupChangeRequest, LineupMode, MessageType, ProtocolOutcome,
};
use subsync_core::roster::{Roster, RosterSlot, RosteredPlayer};

use crate::error::FxpaError;

pub const METHOD_ROSTER: &str = "getTeamRosterInfo";
pub const METHOD_PLAYER_STATS: &str = "getPlayerStats";
pub const METHOD_LINEUP_CHANGE: &str = "confirmOrExecuteTeamRosterChanges";

const NOT_LOGGED_IN: &str = "WARNING_NOT_LOGGED_IN";
const STATUS_STARTER: &str = "1";
const TX_OK_STATUSES: [&str; 3] = ["SUCCEEDED", "SUCCESS", "OK"];

// ---------------------------------------------------------------------------
// Loose scalar helpers
// ---------------------------------------------------------------------------

fn loose_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}

fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Text of a message that may be a plain string or an object with a text
/// field.
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => ["message", "msg", "text"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Ordered lookups
// ---------------------------------------------------------------------------

/// Where the change-permission model can live, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelLocation {
    /// `data.textArray.model`
    DataTextArray,
    /// `data.fantasyResponse.textArray.model`
    FantasyResponseTextArray,
    /// `data.model`
    DataModel,
}

impl ModelLocation {
    const ORDER: [ModelLocation; 3] = [
        ModelLocation::DataTextArray,
        ModelLocation::FantasyResponseTextArray,
        ModelLocation::DataModel,
    ];

    fn find<'a>(&self, data: &'a Value) -> Option<&'a Map<String, Value>> {
        let v = match self {
            ModelLocation::DataTextArray => data.get("textArray")?.get("model")?,
            ModelLocation::FantasyResponseTextArray => {
                data.get("fantasyResponse")?.get("textArray")?.get("model")?
            }
            ModelLocation::DataModel => data.get("model")?,
        };
        v.as_object()
    }
}

fn find_model(data: &Value) -> Option<&Map<String, Value>> {
    ModelLocation::ORDER.iter().find_map(|loc| loc.find(data))
}

/// Keys carrying a player's id inside a `scorer` object, in lookup order.
const PLAYER_ID_KEYS: [&str; 3] = ["scorerId", "playerId", "id"];

fn player_id_of(scorer: &Map<String, Value>) -> Option<String> {
    PLAYER_ID_KEYS
        .iter()
        .find_map(|k| scorer.get(*k).and_then(loose_string))
}

/// Roster limit period: `rosterAdjustmentInfo` at the data level, then inside
/// the model, then the model's own `rosterLimitPeriod`. Zero means unknown.
fn roster_period(data: &Value) -> Option<u32> {
    let model = find_model(data);
    let candidates = [
        data.get("rosterAdjustmentInfo")
            .and_then(|r| r.get("rosterLimitPeriod")),
        model
            .and_then(|m| m.get("rosterAdjustmentInfo"))
            .and_then(|r| r.get("rosterLimitPeriod")),
        model.and_then(|m| m.get("rosterLimitPeriod")),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(loose_u32)
        .find(|&p| p > 0)
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Build the request envelope around a single method call.
pub fn envelope(method: &str, data: Value, ref_url: &str) -> Value {
    json!({
        "msgs": [{ "method": method, "data": data }],
        "uiv": 3,
        "refUrl": ref_url,
        "dt": 0,
        "at": 0,
        "av": "0.0",
    })
}

fn page_error_text(pe: &Value) -> String {
    match pe {
        Value::Object(obj) => obj
            .get("message")
            .or_else(|| obj.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| pe.to_string()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_not_logged_in(pe: &Value) -> bool {
    pe.get("code").and_then(Value::as_str) == Some(NOT_LOGGED_IN)
        || pe.as_str() == Some(NOT_LOGGED_IN)
}

/// Reject envelopes whose top-level page error says the session is gone.
pub fn check_session(body: &Value) -> Result<(), FxpaError> {
    match body.get("pageError") {
        Some(pe) if is_not_logged_in(pe) => Err(FxpaError::NotLoggedIn),
        _ => Ok(()),
    }
}

/// `responses[0].data`, failing on any top-level page error.
pub fn response_data(body: &Value) -> Result<&Value, FxpaError> {
    check_session(body)?;
    if let Some(pe) = body.get("pageError") {
        return Err(FxpaError::PageError(page_error_text(pe)));
    }
    body.get("responses")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("data"))
        .ok_or_else(|| FxpaError::Decode("missing responses[0].data".to_string()))
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

fn hint_tokens(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c == '/' || c == '|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_row(row: &Map<String, Value>) -> RosterSlot {
    let pos_id = row.get("posId").and_then(loose_u32).unwrap_or(POS_ID_BENCH);
    let status_id = row.get("statusId").and_then(loose_string);
    // A non-starter status wins over whatever slot id the row carries.
    let benched = status_id.as_deref().is_some_and(|s| s != STATUS_STARTER);
    let effective_pos = if benched { POS_ID_BENCH } else { pos_id };

    let player = row.get("scorer").and_then(Value::as_object).and_then(|scorer| {
        let id = player_id_of(scorer)?;
        let name = scorer
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut player = RosteredPlayer::new(id, name);
        // Long-form attributes only; short names and pos ids stay in `raw`.
        player.primary_position = hint_tokens(scorer.get("position")).into_iter().next();
        player.positions = hint_tokens(scorer.get("eligiblePositions"));
        Some(player)
    });

    RosterSlot {
        is_starter: player.is_some() && effective_pos != POS_ID_BENCH,
        slot: SlotPosition::from_pos_id(effective_pos),
        player,
        raw: row.clone(),
    }
}

/// Decode a `getTeamRosterInfo` response.
pub fn decode_roster(team_id: &str, body: &Value) -> Result<Roster, FxpaError> {
    let data = response_data(body)?;
    let tables = data
        .get("tables")
        .and_then(Value::as_array)
        .ok_or_else(|| FxpaError::Decode("roster response has no tables".to_string()))?;

    let mut slots = Vec::new();
    for table in tables {
        let Some(rows) = table.get("rows").and_then(Value::as_array) else {
            continue;
        };
        for row in rows {
            match row.as_object() {
                Some(obj) => slots.push(decode_row(obj)),
                None => debug!("skipping non-object roster row"),
            }
        }
    }

    let mut roster = Roster::new(team_id, slots);
    roster.period = roster_period(data);
    debug!(
        team_id,
        slots = roster.slots.len(),
        period = ?roster.period,
        "decoded roster"
    );
    Ok(roster)
}

// ---------------------------------------------------------------------------
// Confirm / execute
// ---------------------------------------------------------------------------

pub fn encode_field_map(field_map: &BTreeMap<String, FieldAssignment>) -> Value {
    let entries: Map<String, Value> = field_map
        .iter()
        .map(|(id, a)| {
            (
                id.clone(),
                json!({ "posId": a.pos_id(), "stId": a.status.st_id() }),
            )
        })
        .collect();
    Value::Object(entries)
}

/// `data` payload for a confirm- or execute-mode lineup change.
pub fn encode_change_request(request: &LineupChangeRequest) -> Value {
    let mut data = json!({
        "rosterLimitPeriod": request.target_period,
        "fantasyTeamId": request.team_id,
        "teamId": request.team_id,
        "daily": false,
        "adminMode": false,
        "applyToFuturePeriods": request.apply_to_future_periods,
        "fieldMap": encode_field_map(&request.field_map),
    });
    if let Value::Object(obj) = &mut data {
        match request.mode {
            LineupMode::Confirm => {
                obj.insert("confirm".into(), Value::Bool(true));
            }
            LineupMode::Execute => {
                obj.insert("acceptWarnings".into(), Value::Bool(true));
            }
        }
        obj.insert("action".into(), Value::from(request.mode.display_str()));
    }
    data
}

/// Decode a lineup change response. Only a lost session is an error; every
/// other problem becomes a non-accepted outcome.
pub fn decode_outcome(body: &Value) -> Result<ProtocolOutcome, FxpaError> {
    check_session(body)?;

    let resp0 = body.get("responses").and_then(|r| r.get(0));
    let empty = Value::Null;
    let data = resp0.and_then(|r| r.get("data")).unwrap_or(&empty);

    let page_error = [
        body.get("pageError"),
        resp0.and_then(|r| r.get("pageError")),
        data.get("pageError"),
    ]
    .into_iter()
    .flatten()
    .find(|v| !v.is_null())
    .map(page_error_text);

    let fr = data.get("fantasyResponse").unwrap_or(&empty);
    let model = find_model(data);
    let tx = data
        .get("txResponses")
        .and_then(|t| t.get(0))
        .unwrap_or(&empty);

    let message_type = fr
        .get("msgType")
        .and_then(Value::as_str)
        .map(MessageType::from_str_msg);

    let tx_code = tx
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_uppercase();
    let tx_status = tx
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_uppercase();
    let tx_ok = tx_code.starts_with("OK") || TX_OK_STATUSES.contains(&tx_status.as_str());

    let accepted_by_type = message_type.as_ref().is_some_and(MessageType::is_accepting);
    let accepted = (accepted_by_type || tx_ok) && page_error.is_none();

    let illegal_messages = fr
        .get("illegalRosterMsgs")
        .and_then(Value::as_array)
        .map(|msgs| msgs.iter().filter_map(message_text).collect())
        .unwrap_or_default();

    let main_message = fr
        .get("mainMsg")
        .and_then(message_text)
        .or_else(|| tx.get("message").and_then(message_text))
        .or_else(|| page_error.clone());

    let model_field = |key: &str| model.and_then(|m| m.get(key));
    let outcome = ProtocolOutcome {
        accepted,
        message_type,
        show_confirm_window: fr
            .get("showConfirmWindow")
            .and_then(loose_bool)
            .unwrap_or(false),
        change_allowed: model_field("changeAllowed").and_then(loose_bool),
        first_illegal_period: model_field("firstIllegalRosterPeriod").and_then(loose_u32),
        pick_deadline_passed: model_field("playerPickDeadlinePassed").and_then(loose_bool),
        illegal_messages,
        main_message,
        scheduled_period: model_field("rosterAdjustmentInfo")
            .and_then(|r| r.get("rosterLimitPeriod"))
            .or_else(|| {
                data.get("rosterAdjustmentInfo")
                    .and_then(|r| r.get("rosterLimitPeriod"))
            })
            .and_then(loose_u32)
            .filter(|&p| p > 0),
    };

    if resp0.is_none() {
        warn!("lineup change response carried no responses[0]");
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Eligibility warming
// ---------------------------------------------------------------------------

/// Positions of `player_id` from a `getPlayerStats` response.
pub fn decode_player_positions(body: &Value, player_id: &str) -> Result<EligibilitySet, FxpaError> {
    let data = response_data(body)?;
    let rows = data
        .get("statsTable")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    Ok(rows
        .iter()
        .filter_map(|row| row.get("scorer").and_then(Value::as_object))
        .find(|scorer| player_id_of(scorer).as_deref() == Some(player_id))
        .map(codes_from_raw)
        .unwrap_or_default())
}

/// Cache every player found in a `getPlayerStats` response. Returns the
/// number of players recorded.
pub fn warm_from_player_stats(cache: &EligibilityCache, body: &Value) -> usize {
    let Ok(data) = response_data(body) else {
        return 0;
    };
    let Some(rows) = data.get("statsTable").and_then(Value::as_array) else {
        return 0;
    };
    let mut warmed = 0;
    for scorer in rows
        .iter()
        .filter_map(|row| row.get("scorer").and_then(Value::as_object))
    {
        let (Some(id), codes) = (player_id_of(scorer), codes_from_raw(scorer)) else {
            continue;
        };
        if !codes.is_empty() {
            cache.merge(&id, &codes);
            warmed += 1;
        }
    }
    warmed
}

/// Cache eligibility from `fantasyResponse.scorerMap` in a lineup change
/// response.
pub fn warm_from_scorer_map(cache: &EligibilityCache, body: &Value) -> usize {
    let Some(map) = body
        .get("responses")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("data"))
        .and_then(|d| d.get("fantasyResponse"))
        .and_then(|f| f.get("scorerMap"))
        .and_then(Value::as_object)
    else {
        return 0;
    };
    let mut warmed = 0;
    for (id, info) in map {
        let Some(info) = info.as_object() else {
            continue;
        };
        let codes = codes_from_raw(info);
        if !codes.is_empty() {
            cache.merge(id, &codes);
            warmed += 1;
        }
    }
    warmed
}

/// Cache the buckets assigned to starters in an encoded field map.
pub fn warm_from_field_map(cache: &EligibilityCache, field_map: &Value) -> usize {
    let Some(map) = field_map.as_object() else {
        return 0;
    };
    let mut warmed = 0;
    for (id, meta) in map {
        let Some(pos_id) = meta.get("posId").and_then(loose_u32) else {
            continue;
        };
        let codes = codes_from_pos_ids(&[pos_id]);
        if !codes.is_empty() {
            cache.merge(id, &codes);
            warmed += 1;
        }
    }
    warmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsync_core::eligibility::{EligibilityResolver, EligibilitySource};
    use subsync_core::position::PositionCode;

    fn roster_body() -> Value {
        json!({
            "responses": [{
                "data": {
                    "rosterAdjustmentInfo": { "rosterLimitPeriod": "12" },
                    "tables": [{
                        "rows": [
                            { "posId": 704, "statusId": "1",
                              "scorer": { "scorerId": "g01", "name": "Keeper",
                                          "posShortNames": "G" } },
                            { "posId": "703", "statusId": "1", "isLocked": true,
                              "scorer": { "scorerId": "d01", "name": "Back",
                                          "posShortNames": "D" } },
                            { "posId": 702, "statusId": "2",
                              "scorer": { "scorerId": "m01", "name": "Mid",
                                          "posShortNames": "M/F",
                                          "position": "Midfielder",
                                          "eligiblePositions": ["Midfielder", "Forward"] } },
                            { "posId": 0, "statusId": "2" }
                        ]
                    }]
                }
            }]
        })
    }

    #[test]
    fn decode_roster_rows() {
        let roster = decode_roster("t1", &roster_body()).unwrap();
        assert_eq!(roster.slots.len(), 4);
        assert_eq!(roster.period, Some(12));
        assert_eq!(roster.starter_ids(), vec!["g01", "d01"]);
        assert_eq!(roster.bench_ids(), vec!["m01"]);

        let d = roster.find("d01").unwrap();
        assert_eq!(d.slot, SlotPosition::Field(PositionCode::Defender));
        assert_eq!(d.raw.get("isLocked"), Some(&Value::Bool(true)));

        // Status id overrides the slot id.
        let m = roster.find("m01").unwrap();
        assert_eq!(m.slot, SlotPosition::Bench);
        let mid = m.player.as_ref().unwrap();
        assert_eq!(mid.primary_position.as_deref(), Some("Midfielder"));
        assert_eq!(mid.positions, vec!["Midfielder", "Forward"]);
        assert!(roster.find("g01").unwrap().player.as_ref().unwrap().positions.is_empty());
        assert!(roster.slots[3].player.is_none());
    }

    #[test]
    fn bench_row_without_short_names_resolves_from_attributes() {
        let body = json!({ "responses": [{ "data": { "tables": [{ "rows": [
            { "posId": 0, "statusId": "2",
              "scorer": { "scorerId": "w01", "name": "Winger",
                          "position": "Forward", "eligiblePositions": "Forward, Midfielder" } }
        ] }] } }] });
        let roster = decode_roster("t1", &body).unwrap();
        let slot = roster.find("w01").unwrap();
        assert!(codes_from_raw(&slot.raw).is_empty());

        let cache = EligibilityCache::new();
        let resolution = EligibilityResolver::new(&cache, None).resolve_local(slot);
        assert_eq!(resolution.source, Some(EligibilitySource::PlayerAttributes));
        assert!(resolution.codes.contains(PositionCode::Forward));
        assert!(resolution.codes.contains(PositionCode::Midfielder));
        assert_eq!(cache.get("w01"), Some(resolution.codes.clone()));
    }

    #[test]
    fn decode_roster_errors() {
        let body = json!({ "pageError": { "code": "WARNING_NOT_LOGGED_IN" } });
        let err = decode_roster("t1", &body).unwrap_err();
        assert!(matches!(err, FxpaError::NotLoggedIn));

        let body = json!({ "pageError": { "code": "ERR", "message": "boom" } });
        let err = decode_roster("t1", &body).unwrap_err();
        assert!(matches!(err, FxpaError::PageError(ref m) if m == "boom"));

        let err = decode_roster("t1", &json!({ "responses": [{ "data": {} }] })).unwrap_err();
        assert!(matches!(err, FxpaError::Decode(_)));
    }

    #[test]
    fn period_falls_back_to_model() {
        let body = json!({ "responses": [{ "data": {
            "tables": [],
            "fantasyResponse": { "textArray": { "model": { "rosterLimitPeriod": 4 } } }
        } }] });
        assert_eq!(decode_roster("t1", &body).unwrap().period, Some(4));
    }

    #[test]
    fn encode_confirm_and_execute() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), FieldAssignment::starter(PositionCode::Forward));
        map.insert("b".to_string(), FieldAssignment::bench());
        let mut req = LineupChangeRequest::new("team9", map);
        req.target_period = 7;

        let data = encode_change_request(&req);
        assert_eq!(data["action"], "CONFIRM");
        assert_eq!(data["confirm"], true);
        assert!(data.get("acceptWarnings").is_none());
        assert_eq!(data["rosterLimitPeriod"], 7);
        assert_eq!(data["fantasyTeamId"], "team9");
        assert_eq!(data["daily"], false);
        assert_eq!(data["fieldMap"]["a"], json!({ "posId": 701, "stId": "1" }));
        assert_eq!(data["fieldMap"]["b"], json!({ "posId": 0, "stId": "2" }));

        let data = encode_change_request(&req.with_mode(LineupMode::Execute));
        assert_eq!(data["action"], "EXECUTE");
        assert_eq!(data["acceptWarnings"], true);
        assert!(data.get("confirm").is_none());
    }

    #[test]
    fn envelope_shape() {
        let body = envelope(METHOD_ROSTER, json!({ "teamId": "t" }), "https://x/ref");
        assert_eq!(body["msgs"][0]["method"], METHOD_ROSTER);
        assert_eq!(body["uiv"], 3);
        assert_eq!(body["av"], "0.0");
    }

    #[test]
    fn outcome_from_fantasy_response() {
        let body = json!({ "responses": [{ "data": {
            "fantasyResponse": {
                "msgType": "WARNING",
                "showConfirmWindow": true,
                "illegalRosterMsgs": ["Too many forwards", { "message": "Keeper missing" }],
                "mainMsg": "Please confirm"
            },
            "textArray": { "model": {
                "changeAllowed": false,
                "firstIllegalRosterPeriod": "5",
                "playerPickDeadlinePassed": true,
                "rosterAdjustmentInfo": { "rosterLimitPeriod": 5 }
            } }
        } }] });
        let o = decode_outcome(&body).unwrap();
        assert!(o.accepted);
        assert_eq!(o.message_type, Some(MessageType::Warning));
        assert!(o.show_confirm_window);
        assert_eq!(o.change_allowed, Some(false));
        assert_eq!(o.first_illegal_period, Some(5));
        assert_eq!(o.pick_deadline_passed, Some(true));
        assert_eq!(o.illegal_messages, vec!["Too many forwards", "Keeper missing"]);
        assert_eq!(o.main_message.as_deref(), Some("Please confirm"));
        assert_eq!(o.scheduled_period, Some(5));
    }

    #[test]
    fn outcome_from_tx_response() {
        let body = json!({ "responses": [{ "data": {
            "txResponses": [{ "code": "ok_success", "message": "Lineup saved" }]
        } }] });
        let o = decode_outcome(&body).unwrap();
        assert!(o.accepted);
        assert_eq!(o.main_message.as_deref(), Some("Lineup saved"));

        let body = json!({
            "responses": [{ "data": { "txResponses": [{ "status": "Succeeded" }] } }]
        });
        assert!(decode_outcome(&body).unwrap().accepted);
    }

    #[test]
    fn page_error_rejects_outcome() {
        let body = json!({ "responses": [{
            "pageError": { "message": "Roster locked" },
            "data": { "fantasyResponse": { "msgType": "SUCCESS" } }
        }] });
        let o = decode_outcome(&body).unwrap();
        assert!(!o.accepted);
        assert_eq!(o.failure_reason(), "Roster locked");

        let body = json!({ "pageError": { "code": "WARNING_NOT_LOGGED_IN" } });
        assert!(matches!(decode_outcome(&body), Err(FxpaError::NotLoggedIn)));

        let o = decode_outcome(&json!({})).unwrap();
        assert!(!o.accepted);
    }

    #[test]
    fn player_stats_lookup_and_warming() {
        let body = json!({ "responses": [{ "data": { "statsTable": [
            { "scorer": { "scorerId": "p1", "name": "Ann", "posIds": ["702", "701"] } },
            { "scorer": { "scorerId": "p2", "name": "Bob",
                          "defaultPosId": 703, "posShortNames": "D" } },
            { "scorer": { "scorerId": "p3", "name": "Cat" } }
        ] } }] });

        let codes = decode_player_positions(&body, "p1").unwrap();
        assert!(codes.contains(PositionCode::Midfielder) && codes.contains(PositionCode::Forward));
        assert!(decode_player_positions(&body, "zz").unwrap().is_empty());

        let cache = EligibilityCache::new();
        assert_eq!(warm_from_player_stats(&cache, &body), 2);
        assert_eq!(cache.get("p2"), Some(EligibilitySet::single(PositionCode::Defender)));
        assert_eq!(cache.get("p3"), None);
    }

    #[test]
    fn scorer_map_and_field_map_warming() {
        let cache = EligibilityCache::new();
        let body = json!({ "responses": [{ "data": { "fantasyResponse": { "scorerMap": {
            "p1": { "posShortNames": "M/F" },
            "p2": { "posIdsNoFlex": [704] },
            "p3": { "name": "nothing useful" }
        } } } }] });
        assert_eq!(warm_from_scorer_map(&cache, &body), 2);
        assert_eq!(cache.get("p2"), Some(EligibilitySet::single(PositionCode::Goalkeeper)));

        let field_map = json!({
            "p1": { "posId": 703, "stId": "1" },
            "p4": { "posId": 0, "stId": "2" }
        });
        assert_eq!(warm_from_field_map(&cache, &field_map), 1);
        let p1 = cache.get("p1").unwrap();
        assert_eq!(p1.len(), 3);
    }
}
