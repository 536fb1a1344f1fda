//! Canonicalization of qstat JSON payloads into typed job and queue records.
//!
//! The scheduler emits JSON with inconsistently-cased keys (`Job_Name`,
//! `job_state`, `Resource_List`) that vary between server versions. Every
//! payload is first canonicalized (all object keys lowercased, recursively)
//! and then mapped onto the typed records below, so the records are
//! independent of the server's casing. Fields the caller does not consume
//! are retained untyped in the flattened `extra` maps.

use chrono::{DateTime, TimeZone, Utc};
use hashlink::LinkedHashMap;
use quarry_parsers::{parse_pbs_timestamp, parse_size_bytes, parse_walltime_secs};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("scheduler payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lowercase every object key, recursively. Job ids used as keys are
/// canonicalized too; the host part of an id is case-insensitive anyway.
pub fn canonicalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.to_ascii_lowercase(), canonicalize_keys(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize_keys).collect()),
        other => other,
    }
}

/// Single-character job state codes as qstat reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Begun,
    Exiting,
    Finished,
    Held,
    Moved,
    Queued,
    Running,
    Suspended,
    Transit,
    Waiting,
    Expired,
    Unknown(char),
}

impl JobState {
    pub fn from_code(code: char) -> Self {
        match code {
            'B' => Self::Begun,
            'E' => Self::Exiting,
            'F' => Self::Finished,
            'H' => Self::Held,
            'M' => Self::Moved,
            'Q' => Self::Queued,
            'R' => Self::Running,
            'S' => Self::Suspended,
            'T' => Self::Transit,
            'W' => Self::Waiting,
            'X' => Self::Expired,
            other => Self::Unknown(other),
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::Unknown('?')
    }
}

/// A job's resource list, requested or used. Memory is normalized to bytes
/// and durations to seconds; everything else stays untyped in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Resources {
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub ncpus: Option<u64>,
    #[serde(default, deserialize_with = "de_size_bytes")]
    pub mem: Option<u64>,
    #[serde(default, deserialize_with = "de_size_bytes")]
    pub vmem: Option<u64>,
    #[serde(default, deserialize_with = "de_duration_secs")]
    pub walltime: Option<u64>,
    #[serde(default, deserialize_with = "de_duration_secs")]
    pub cput: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row from a status listing. Never mutated after construction;
/// superseded by re-fetching.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Job {
    /// Scheduler-assigned id, `<seq>.<host>`. Filled from the listing key.
    #[serde(skip)]
    pub id: String,
    #[serde(default, rename = "job_name")]
    pub name: String,
    #[serde(default, rename = "job_owner")]
    pub owner: String,
    #[serde(default, rename = "job_state", deserialize_with = "de_state")]
    pub state: JobState,
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub resource_list: Resources,
    #[serde(default)]
    pub resources_used: Resources,
    /// Environment exposed to the job, including the scheduler's own
    /// working-directory and queue-origin variables. Keys are canonicalized
    /// along with the rest of the payload.
    #[serde(default, rename = "variable_list", deserialize_with = "de_variables")]
    pub variables: HashMap<String, String>,
    /// Dependency relation name to the job ids it references.
    #[serde(default, rename = "depend", deserialize_with = "de_depend")]
    pub dependencies: HashMap<String, Vec<String>>,
    /// Present only once the job has run.
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub exit_status: Option<i64>,
    #[serde(default, rename = "ctime", deserialize_with = "de_timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "qtime", deserialize_with = "de_timestamp")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "stime", deserialize_with = "de_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "obittime", deserialize_with = "de_timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One status fetch, wholesale. Discarded after use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobList {
    pub timestamp: Option<DateTime<Utc>>,
    pub pbs_version: Option<String>,
    pub pbs_server: Option<String>,
    pub jobs: LinkedHashMap<String, Job>,
}

/// Job counts by state, from a queue's `state_count` word list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCount {
    pub transit: u64,
    pub queued: u64,
    pub held: u64,
    pub waiting: u64,
    pub running: u64,
    pub exiting: u64,
    pub begun: u64,
}

impl StateCount {
    fn parse(s: &str) -> Self {
        let mut counts = Self::default();
        for word in s.split_whitespace() {
            let Some((state, count)) = word.split_once(':') else {
                continue;
            };
            let Ok(count) = count.parse() else { continue };
            match state.to_ascii_lowercase().as_str() {
                "transit" => counts.transit = count,
                "queued" => counts.queued = count,
                "held" => counts.held = count,
                "waiting" => counts.waiting = count,
                "running" => counts.running = count,
                "exiting" => counts.exiting = count,
                "begun" => counts.begun = count,
                _ => {}
            }
        }
        counts
    }
}

/// Queue-level accounting from `qstat -Q`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Queue {
    /// Queue name; filled from the listing key.
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub queue_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub total_jobs: Option<u64>,
    #[serde(default, deserialize_with = "de_state_count")]
    pub state_count: StateCount,
    #[serde(default)]
    pub resources_max: Resources,
    #[serde(default)]
    pub resources_min: Resources,
    #[serde(default)]
    pub resources_default: Resources,
    #[serde(default)]
    pub resources_assigned: Resources,
    #[serde(default, deserialize_with = "de_word_bool")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "de_word_bool")]
    pub started: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueList {
    pub timestamp: Option<DateTime<Utc>>,
    pub pbs_version: Option<String>,
    pub pbs_server: Option<String>,
    pub queues: LinkedHashMap<String, Queue>,
}

/// Common listing header plus whichever collection the query produced.
#[derive(Debug, Default, Deserialize)]
struct RawListing {
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    pbs_version: Option<String>,
    #[serde(default)]
    pbs_server: Option<String>,
    #[serde(default)]
    jobs: Map<String, Value>,
    #[serde(default)]
    queue: Map<String, Value>,
}

fn decode_listing(raw: &str) -> Result<RawListing, PayloadError> {
    if raw.trim().is_empty() {
        return Ok(RawListing::default());
    }
    let value: Value = serde_json::from_str(raw)?;
    Ok(serde_json::from_value(canonicalize_keys(value))?)
}

fn epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Transform a `qstat -f -F json` payload into a [`JobList`]. An empty
/// payload (nothing selected) yields an empty list.
pub fn parse_job_list(raw: &str) -> Result<JobList, PayloadError> {
    let listing = decode_listing(raw)?;
    let mut jobs = LinkedHashMap::new();
    for (id, entry) in listing.jobs {
        let mut job: Job = serde_json::from_value(entry)?;
        job.id = id.clone();
        jobs.insert(id, job);
    }
    Ok(JobList {
        timestamp: epoch(listing.timestamp),
        pbs_version: listing.pbs_version,
        pbs_server: listing.pbs_server,
        jobs,
    })
}

/// Transform a `qstat -Q -f -F json` payload into a [`QueueList`].
pub fn parse_queue_list(raw: &str) -> Result<QueueList, PayloadError> {
    let listing = decode_listing(raw)?;
    let mut queues = LinkedHashMap::new();
    for (name, entry) in listing.queue {
        let mut queue: Queue = serde_json::from_value(entry)?;
        queue.name = name.clone();
        queues.insert(name, queue);
    }
    Ok(QueueList {
        timestamp: epoch(listing.timestamp),
        pbs_version: listing.pbs_version,
        pbs_server: listing.pbs_server,
        queues,
    })
}

fn de_state<'de, D>(deserializer: D) -> Result<JobState, D::Error>
where
    D: Deserializer<'de>,
{
    let code: Option<String> = Option::deserialize(deserializer)?;
    Ok(code
        .and_then(|s| s.chars().next())
        .map(JobState::from_code)
        .unwrap_or_default())
}

fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn de_size_bytes<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_size_bytes(&s),
        _ => None,
    }))
}

fn de_duration_secs<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_walltime_secs(&s),
        _ => None,
    }))
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => epoch(n.as_i64()),
        Value::String(s) => parse_pbs_timestamp(&s),
        _ => None,
    }))
}

/// Variable lists are an object in JSON mode, but older servers still emit
/// the classic "A=1,B=2" string; both map to the same record.
fn de_variables<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    let mut variables = HashMap::new();
    match value {
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let rendered = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                variables.insert(key, rendered);
            }
        }
        Some(Value::String(list)) => {
            for pair in list.split(',') {
                if let Some((key, value)) = pair.split_once('=') {
                    variables.insert(key.trim().to_string(), value.to_string());
                }
            }
        }
        _ => {}
    }
    Ok(variables)
}

/// Parse the `depend` attribute ("afterok:12.host@srv:13.host,beforeok:14.host")
/// into relation name → job ids.
fn de_depend<'de, D>(deserializer: D) -> Result<HashMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
    for clause in value.unwrap_or_default().split(',') {
        let mut parts = clause.split(':');
        let Some(relation) = parts.next().map(str::trim).filter(|r| !r.is_empty()) else {
            continue;
        };
        let ids: Vec<String> = parts.map(|id| id.trim().to_string()).collect();
        dependencies
            .entry(relation.to_string())
            .or_default()
            .extend(ids);
    }
    Ok(dependencies)
}

fn de_word_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn de_state_count<'de, D>(deserializer: D) -> Result<StateCount, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.as_deref().map(StateCount::parse).unwrap_or_default())
}
