// Lock classification from raw roster row metadata.

use std::fmt;

use serde_json::{Map, Value};

use crate::roster::RosterSlot;

const EXPLICIT_FLAGS: [&str; 3] = ["isLocked", "locked", "lineupLocked"];
const INVERSE_FLAGS: [&str; 3] = ["changeAllowed", "canChange", "canMove"];
const CELL_TEXT_FIELDS: [&str; 3] = ["toolTip", "tooltip", "content"];
const ROW_TEXT_FIELDS: [&str; 4] = ["toolTip", "tooltip", "display", "lockedReason"];

/// Which rule classified a slot as locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockSignal {
    /// An explicit lock flag is true (`isLocked`, `locked`, `lineupLocked`).
    ExplicitFlag(&'static str),
    /// A permission flag is explicitly false (`changeAllowed`, ...).
    InverseFlag(&'static str),
    /// Some other key mentioning "lock" is true.
    KeyPattern(String),
    /// Display text mentions "lock".
    TextHint(String),
}

impl fmt::Display for LockSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockSignal::ExplicitFlag(key) => write!(f, "{key}=true"),
            LockSignal::InverseFlag(key) => write!(f, "{key}=false"),
            LockSignal::KeyPattern(key) => write!(f, "{key}=true"),
            LockSignal::TextHint(text) => write!(f, "text \"{text}\""),
        }
    }
}

fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_u64() == Some(1),
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn mentions_lock(text: &str) -> bool {
    text.to_lowercase().contains("lock")
}

fn text_hint(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| mentions_lock(s))
        .map(str::to_string)
}

/// Classify raw row metadata. Checks run in a fixed order and the first
/// match wins.
pub fn lock_signal_from_raw(raw: &Map<String, Value>) -> Option<LockSignal> {
    if let Some(key) = EXPLICIT_FLAGS
        .into_iter()
        .find(|k| raw.get(*k).is_some_and(is_true))
    {
        return Some(LockSignal::ExplicitFlag(key));
    }

    if let Some(key) = INVERSE_FLAGS
        .into_iter()
        .find(|k| raw.get(*k) == Some(&Value::Bool(false)))
    {
        return Some(LockSignal::InverseFlag(key));
    }

    if let Some((key, _)) = raw
        .iter()
        .find(|(k, v)| k.to_lowercase().contains("lock") && is_true(v))
    {
        return Some(LockSignal::KeyPattern(key.clone()));
    }

    if let Some(Value::Array(cells)) = raw.get("cells") {
        let hint = cells
            .iter()
            .filter_map(Value::as_object)
            .find_map(|cell| text_hint(cell, &CELL_TEXT_FIELDS));
        if let Some(text) = hint {
            return Some(LockSignal::TextHint(text));
        }
    }

    text_hint(raw, &ROW_TEXT_FIELDS).map(LockSignal::TextHint)
}

/// Classify a roster slot. Empty slots are never locked.
pub fn lock_signal(slot: &RosterSlot) -> Option<LockSignal> {
    slot.player.as_ref()?;
    lock_signal_from_raw(&slot.raw)
}

pub fn is_locked(slot: &RosterSlot) -> bool {
    lock_signal(slot).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosteredPlayer;
    use serde_json::json;

    fn slot(raw: Value) -> RosterSlot {
        let Value::Object(map) = raw else {
            panic!("expected object");
        };
        RosterSlot::bench(RosteredPlayer::new("p", "Player")).with_raw(map)
    }

    #[test]
    fn unlocked_row() {
        assert!(!is_locked(&slot(json!({ "posId": 0, "statusId": "2" }))));
        assert!(!is_locked(&slot(json!({ "isLocked": false, "changeAllowed": true }))));
    }

    #[test]
    fn explicit_flags_win_first() {
        let s = slot(json!({ "lineupLocked": true, "canMove": false }));
        assert_eq!(lock_signal(&s), Some(LockSignal::ExplicitFlag("lineupLocked")));
    }

    #[test]
    fn inverse_flags_must_be_exactly_false() {
        assert_eq!(
            lock_signal(&slot(json!({ "canChange": false }))),
            Some(LockSignal::InverseFlag("canChange"))
        );
        // Missing or null inverse flags do not lock.
        assert!(!is_locked(&slot(json!({ "canChange": null }))));
    }

    #[test]
    fn arbitrary_lock_keys() {
        assert_eq!(
            lock_signal(&slot(json!({ "gameLockStatus": true }))),
            Some(LockSignal::KeyPattern("gameLockStatus".into()))
        );
        assert!(!is_locked(&slot(json!({ "gameLockStatus": false }))));
    }

    #[test]
    fn text_hints_in_cells_and_row() {
        let s = slot(json!({
            "cells": [{ "content": "3" }, { "toolTip": "Locked: game started" }]
        }));
        assert_eq!(
            lock_signal(&s),
            Some(LockSignal::TextHint("Locked: game started".into()))
        );

        let s = slot(json!({ "lockedReason": "Player locked until Sunday" }));
        assert!(is_locked(&s));

        let s = slot(json!({ "display": "Available" }));
        assert!(!is_locked(&s));
    }

    #[test]
    fn empty_slot_never_locked() {
        let mut s = slot(json!({ "locked": true }));
        s.player = None;
        assert!(!is_locked(&s));
    }
}
