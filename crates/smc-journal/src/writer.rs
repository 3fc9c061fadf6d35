use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Append-only JSON Lines writer with an optional SHA-256 hash chain.
///
/// Each event is one canonical (recursively key-sorted, compact) JSON
/// line. With the chain enabled, every event carries `hash_prev` (the
/// previous event's `hash_self`) and `hash_self` computed over the event
/// without its own hash. On reopen the writer reads the last line to
/// resume the chain, so restarts never fork it.
pub struct JsonlWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
}

/// One journal event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    pub run_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

impl JsonlWriter {
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
        }

        // Resume the chain from the last event already on disk.
        let last_hash = if hash_chain && path.exists() {
            let raw = fs::read_to_string(&path)?;
            raw.lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .and_then(|line| serde_json::from_str::<JournalEvent>(line).ok())
                .and_then(|ev| ev.hash_self)
        } else {
            None
        };

        Ok(Self {
            path,
            hash_chain,
            last_hash,
        })
    }

    /// Append one event. Returns the written envelope.
    pub fn append<T: Serialize>(
        &mut self,
        run_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: &T,
    ) -> Result<JournalEvent> {
        let mut event = JournalEvent {
            run_id,
            ts_utc: Utc::now(),
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload: serde_json::to_value(payload).context("serialize journal payload")?,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            event.hash_prev = self.last_hash.clone();
            let hash = compute_event_hash(&event)?;
            event.hash_self = Some(hash.clone());
            self.last_hash = Some(hash);
        }

        let line = canonical_json(&event)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open journal {:?}", self.path))?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
        Ok(event)
    }
}

/// Hash over the canonical encoding of the event without `hash_self`.
pub fn compute_event_hash(event: &JournalEvent) -> Result<String> {
    let mut clone = event.clone();
    clone.hash_self = None;
    let canonical = canonical_json(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let raw = serde_json::to_value(value).context("serialize journal event")?;
    Ok(serde_json::to_string(&sort_keys(&raw))?)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for k in keys {
                sorted.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Outcome of a hash-chain verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

/// Walk a journal file and verify its hash chain end to end.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read journal {:?}", path.as_ref()))?;

    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: JournalEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse journal event at line {}", i + 1))?;
        count += 1;

        if event.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: "hash_prev does not match previous hash_self".to_string(),
            });
        }
        if let Some(claimed) = &event.hash_self {
            let recomputed = compute_event_hash(&event)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: "hash_self does not match event content".to_string(),
                });
            }
        }
        prev_hash = event.hash_self.clone();
    }
    Ok(VerifyResult::Valid { lines: count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_resumes_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.jsonl");
        let run = Uuid::new_v4();

        {
            let mut w = JsonlWriter::new(&path, true).unwrap();
            w.append(run, "t", "e", &serde_json::json!({"n": 1})).unwrap();
        }
        {
            let mut w = JsonlWriter::new(&path, true).unwrap();
            w.append(run, "t", "e", &serde_json::json!({"n": 2})).unwrap();
        }

        assert!(matches!(
            verify_hash_chain(&path).unwrap(),
            VerifyResult::Valid { lines: 2 }
        ));
    }

    #[test]
    fn canonical_encoding_sorts_keys() {
        let v = serde_json::json!({"b": 1, "a": {"z": 2, "y": 3}});
        let s = serde_json::to_string(&sort_keys(&v)).unwrap();
        assert_eq!(s, r#"{"a":{"y":3,"z":2},"b":1}"#);
    }
}
