// Integration tests for the subsync command layer.
//
// Config tests copy the shipped defaults into a temp dir. Command tests run
// the real FXPA client against a local TCP server that answers every request
// with a canned roster and records what it received.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use subsync_cli::commands;
use subsync_cli::config::{ensure_config_files, load_config, Config};
use subsync_core::ExecutionPolicy;

// ===========================================================================
// Helpers
// ===========================================================================

fn defaults_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("defaults")
}

/// Temp home containing a copy of defaults/ and no config/ yet.
fn temp_home(name: &str) -> PathBuf {
    let home = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&home);
    fs::create_dir_all(home.join("defaults")).unwrap();
    for entry in fs::read_dir(defaults_dir()).unwrap() {
        let path = entry.unwrap().path();
        fs::copy(&path, home.join("defaults").join(path.file_name().unwrap())).unwrap();
    }
    home
}

fn row(id: &str, pos_id: u32, status: &str, hint: &str) -> Value {
    json!({
        "posId": pos_id,
        "statusId": status,
        "scorer": { "scorerId": id, "name": format!("Player {id}"), "posShortNames": hint }
    })
}

/// 1-4-3-3 with one bench defender.
fn roster_body() -> String {
    let mut rows = vec![row("g1", 704, "1", "G")];
    rows.extend((1..=4).map(|i| row(&format!("d{i}"), 703, "1", "D")));
    rows.extend((1..=3).map(|i| row(&format!("m{i}"), 702, "1", "M")));
    rows.extend((1..=3).map(|i| row(&format!("f{i}"), 701, "1", "F")));
    rows.push(row("d5", 0, "2", "D"));
    json!({ "responses": [{ "data": {
        "rosterAdjustmentInfo": { "rosterLimitPeriod": 6 },
        "tables": [{ "rows": rows }]
    } }] })
    .to_string()
}

/// Answer every connection with `body` and record each raw request.
async fn spawn_server(body: String) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap_or(0);
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
            recorded
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&raw).to_string());

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
        }
    });

    (format!("http://{addr}"), seen)
}

fn config_for(home: &PathBuf, base_url: String) -> Config {
    let mut config = load_config(home).unwrap();
    config.api.base_url = base_url;
    config.credentials.cookie = Some("JSESSIONID=test-session".to_string());
    config
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn first_run_copies_defaults_once() {
    let home = temp_home("subsync_cli_first_run");

    let copied = ensure_config_files(&home).unwrap();
    let mut names: Vec<String> = copied
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["engine.toml", "league.toml"]);
    assert!(!home.join("config/credentials.toml.example").exists());

    assert!(ensure_config_files(&home).unwrap().is_empty());

    let config = load_config(&home).unwrap();
    assert_eq!(config.league.team_id, "replace-with-team-id");
    assert_eq!(config.policy(), ExecutionPolicy::BestEffort);

    let _ = fs::remove_dir_all(&home);
}

#[test]
fn missing_defaults_and_config_is_an_error() {
    let home = std::env::temp_dir().join("subsync_cli_empty_home");
    let _ = fs::remove_dir_all(&home);
    fs::create_dir_all(&home).unwrap();

    assert!(ensure_config_files(&home).is_err());
    let _ = fs::remove_dir_all(&home);
}

// ===========================================================================
// Commands against a local server
// ===========================================================================

#[tokio::test]
async fn show_reports_roster_and_sends_cookie() {
    let home = temp_home("subsync_cli_show");
    let (base, seen) = spawn_server(roster_body()).await;
    let config = config_for(&home, base);

    let http = commands::build_http_client(&config).unwrap();
    let engine = commands::build_engine(&config, http, ExecutionPolicy::BestEffort);
    let out = commands::show(&engine, "T1").await.unwrap();

    assert_eq!(out["formation"], "1-4-3-3");
    assert_eq!(out["period"], 6);
    assert_eq!(out["starters"].as_array().unwrap().len(), 11);
    assert_eq!(out["players"].as_array().unwrap().len(), 12);

    let requests = seen.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("POST /fxpa/req?leagueId=replace-with-league-id"));
    assert!(requests[0]
        .to_lowercase()
        .contains("cookie: jsessionid=test-session"));
    assert!(requests[0].contains("getTeamRosterInfo"));

    let _ = fs::remove_dir_all(&home);
}

#[tokio::test]
async fn dry_run_apply_sends_no_lineup_change() {
    let home = temp_home("subsync_cli_dry_run");
    let (base, seen) = spawn_server(roster_body()).await;
    let config = config_for(&home, base);

    let http = commands::build_http_client(&config).unwrap();
    let engine = commands::build_engine(&config, http, ExecutionPolicy::Strict);
    let lineup = commands::parse_lineup("g1,d1,d2,d3,d5,m1,m2,m3,f1,f2,f3");
    let out = commands::apply(&engine, "T1", &lineup, true).await.unwrap();

    assert_eq!(out["dry_run"], true);
    assert_eq!(out["from"], "1-4-3-3");
    assert_eq!(out["to"], "1-4-3-3");
    let swaps = out["swaps"].as_array().unwrap();
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0]["out_id"], "d4");
    assert_eq!(swaps[0]["in_id"], "d5");

    let requests = seen.lock().unwrap().clone();
    assert!(requests
        .iter()
        .all(|r| !r.contains("confirmOrExecuteTeamRosterChanges")));

    let _ = fs::remove_dir_all(&home);
}

#[tokio::test]
async fn plan_rejects_short_lineup() {
    let home = temp_home("subsync_cli_short_lineup");
    let (base, _seen) = spawn_server(roster_body()).await;
    let config = config_for(&home, base);

    let http = commands::build_http_client(&config).unwrap();
    let engine = commands::build_engine(&config, http, ExecutionPolicy::BestEffort);
    let err = commands::plan(&engine, "T1", &commands::parse_lineup("g1,d1"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Exactly 11 starters required; got 2."));

    let _ = fs::remove_dir_all(&home);
}
