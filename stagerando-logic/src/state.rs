use crypto_hash::Algorithm;
use serde::{Deserialize, Serialize};
use stagerando_game::{Outcomes, Requirement, RequirementSet, Requirements, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{HISTORY_KEYS, ROOM_KEY, SECTION_KEY};

/// Player state: an open key/value map.
///
/// The map is shared copy-on-write, so cloning a state to branch a search is
/// cheap and writing to the clone never touches the ancestor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    values: Arc<BTreeMap<String, Value>>,
}

/// Which parts of the state take part in a digest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DigestOptions {
    pub include_location: bool,
    pub include_history: bool,
}

impl DigestOptions {
    // Same place and same progress, regardless of the route taken to get there.
    pub const REVISIT: DigestOptions = DigestOptions {
        include_location: true,
        include_history: false,
    };
    pub const LOCATION_INVARIANT: DigestOptions = DigestOptions {
        include_location: false,
        include_history: false,
    };
    pub const FULL: DigestOptions = DigestOptions {
        include_location: true,
        include_history: true,
    };
}

/// SHA-256 of the canonical encoding of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateDigest(pub [u8; 32]);

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u64).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

// Tagged, length-prefixed encoding so that distinct structures can never
// produce the same byte stream.
fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bool(b) => {
            out.push(0);
            out.push(*b as u8);
        }
        Value::Int(x) => {
            out.push(1);
            out.extend_from_slice(&x.to_le_bytes());
        }
        Value::Float(x) => {
            out.push(2);
            out.extend_from_slice(&x.to_bits().to_le_bytes());
        }
        Value::Str(s) => {
            out.push(3);
            encode_str(s, out);
        }
        Value::Table(t) => {
            out.push(4);
            out.extend_from_slice(&(t.len() as u64).to_le_bytes());
            for (k, v) in t {
                encode_str(k, out);
                encode_value(v, out);
            }
        }
    }
}

fn prune_table(table: &mut BTreeMap<String, Value>) {
    table.retain(|_, v| {
        if let Value::Table(t) = v {
            prune_table(t);
        }
        !v.is_default()
    });
}

fn merge_outcome(current: Option<&Value>, outcome: &Value) -> Value {
    match (current, outcome) {
        (Some(Value::Int(a)), Value::Int(b)) => Value::Int(a.saturating_add(*b)),
        (Some(cur), Value::Int(_) | Value::Float(_)) if cur.as_f64().is_some() => {
            Value::Float(cur.as_f64().unwrap_or(0.0) + outcome.as_f64().unwrap_or(0.0))
        }
        (Some(Value::Table(cur)), Value::Table(delta)) => {
            let mut merged = cur.clone();
            for (k, v) in delta {
                let new_value = merge_outcome(merged.get(k), v);
                merged.insert(k.clone(), new_value);
            }
            Value::Table(merged)
        }
        // Missing numeric keys start from zero; strings, booleans and
        // mismatched types overwrite.
        _ => outcome.clone(),
    }
}

fn satisfies_in(scope: &BTreeMap<String, Value>, set: &RequirementSet) -> bool {
    set.iter().all(|(key, req)| {
        let actual = scope.get(key);
        match req {
            Requirement::Exact(expected) => match actual {
                Some(v) => v.matches(expected),
                None => expected.default_like().matches(expected),
            },
            Requirement::Range(range) => {
                let x = match actual {
                    Some(v) => match v.as_f64() {
                        Some(x) => x,
                        None => return false,
                    },
                    None => 0.0,
                };
                range.contains(x)
            }
            Requirement::Nested(sub) => match actual {
                Some(Value::Table(t)) => satisfies_in(t, sub),
                Some(_) => false,
                None => satisfies_in(&BTreeMap::new(), sub),
            },
        }
    })
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        Arc::make_mut(&mut self.values).insert(key.to_string(), value);
    }

    /// Mark `entry` as visited in the history table `key`.
    pub fn mark(&mut self, key: &str, entry: &str) {
        let values = Arc::make_mut(&mut self.values);
        let table = values
            .entry(key.to_string())
            .or_insert_with(|| Value::Table(BTreeMap::new()));
        match table {
            Value::Table(t) => {
                t.insert(entry.to_string(), Value::Bool(true));
            }
            other => {
                let mut t = BTreeMap::new();
                t.insert(entry.to_string(), Value::Bool(true));
                *other = Value::Table(t);
            }
        }
    }

    /// Number of truthy entries in a history table.
    pub fn count_marked(&self, key: &str) -> usize {
        self.values
            .get(key)
            .and_then(|v| v.as_table())
            .map_or(0, |t| t.values().filter(|v| !v.is_default()).count())
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// True iff every key of the set holds (using defaults for missing keys).
    pub fn satisfies(&self, set: &RequirementSet) -> bool {
        satisfies_in(&self.values, set)
    }

    /// True iff any one alternative holds. No alternatives means never.
    pub fn satisfies_any(&self, reqs: &Requirements) -> bool {
        reqs.values().any(|set| self.satisfies(set))
    }

    /// Strings and booleans overwrite; numbers accumulate.
    pub fn apply_outcomes(&mut self, outcomes: &Outcomes) {
        if outcomes.is_empty() {
            return;
        }
        let values = Arc::make_mut(&mut self.values);
        for (key, outcome) in outcomes {
            let new_value = merge_outcome(values.get(key), outcome);
            values.insert(key.clone(), new_value);
        }
    }

    /// Drop keys still holding their default value.
    pub fn prune(&mut self) {
        if self.values.values().any(|v| v.is_default() || matches!(v, Value::Table(_))) {
            prune_table(Arc::make_mut(&mut self.values));
        }
    }

    /// The pruned map a digest is taken over. History tables named in `tracked`
    /// are kept even when `options` leaves history out.
    pub fn canonical(
        &self,
        options: DigestOptions,
        tracked: &[String],
    ) -> BTreeMap<String, Value> {
        let mut values: BTreeMap<String, Value> = (*self.values).clone();
        prune_table(&mut values);
        if !options.include_history {
            for key in HISTORY_KEYS {
                if !tracked.iter().any(|t| t == key) {
                    values.remove(key);
                }
            }
        }
        if !options.include_location {
            values.remove(ROOM_KEY);
            values.remove(SECTION_KEY);
        }
        values
    }

    pub fn digest(&self, options: DigestOptions) -> StateDigest {
        self.digest_tracking(options, &[])
    }

    pub fn digest_tracking(&self, options: DigestOptions, tracked: &[String]) -> StateDigest {
        let canonical = self.canonical(options, tracked);
        let mut bytes: Vec<u8> = Vec::with_capacity(64 * canonical.len());
        encode_value(&Value::Table(canonical), &mut bytes);
        let hash = crypto_hash::digest(Algorithm::SHA256, &bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash[..32]);
        StateDigest(out)
    }
}
