//! Parser for qmgr limit listings.
//!
//! `qmgr -c 'list server <key>'` prints mode headers (`Server <name>`,
//! `Queue <name>`) followed by indented attribute lines. Limit attributes use
//! the bracketed form
//!
//! ```text
//! max_queued = [u:PBS_GENERIC=10]
//! max_queued = [g:"research staff"=5]
//! ```
//!
//! where the class letter is `u`ser, `g`roup, `p`roject or `o`verall, and the
//! name may be double-quoted. Only limits that can apply to the current
//! principal are kept.

use std::cmp::Ordering;
use thiserror::Error;

/// Name carried by every overall (class `o`) limit.
pub const PBS_ALL: &str = "PBS_ALL";
/// Name of the generic per-user/group/project fallback limit.
pub const PBS_GENERIC: &str = "PBS_GENERIC";

#[derive(Error, Debug)]
pub enum LimitError {
    /// The value has a unit suffix or is otherwise not a plain integer. The
    /// suffix grammar is deliberately not interpreted: raising beats
    /// guessing a multiplier.
    #[error("unsupported limit value {value:?} for {name}: unit suffixes are not handled")]
    UnsupportedValue { name: String, value: String },
    #[error("malformed limit line: {0}")]
    Malformed(String),
}

/// The scope a limit applies to. Queue-level limits order (and are
/// evaluated) before server-level ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LimitScope {
    Queue(String),
    Server,
}

/// Which identity a limit constrains, in evaluation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LimitClass {
    Group,
    Project,
    All,
    User,
}

impl LimitClass {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "u" => Some(Self::User),
            "g" => Some(Self::Group),
            "p" => Some(Self::Project),
            "o" => Some(Self::All),
            _ => None,
        }
    }
}

/// One parsed limit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub scope: LimitScope,
    pub class: LimitClass,
    pub name: String,
    pub value: i64,
}

impl Ord for Limit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.scope.cmp(&other.scope))
            .then_with(|| self.class.cmp(&other.class))
    }
}

impl PartialOrd for Limit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The identity limits are filtered against.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: String,
    pub group: String,
    pub project: String,
}

impl Principal {
    /// Whether a limit of `class` named `name` can constrain this principal.
    fn is_constrained_by(&self, class: LimitClass, name: &str) -> bool {
        match class {
            LimitClass::All => true,
            LimitClass::User => name == PBS_GENERIC || name == self.user,
            LimitClass::Group => name == PBS_GENERIC || name == self.group,
            LimitClass::Project => name == PBS_GENERIC || name == self.project,
        }
    }
}

/// Parse a limit listing, keeping limits for `key` that apply to
/// `principal`, sorted by name, then queue-before-server, then class
/// priority (group, project, all, user). Empty result when nothing matched.
pub fn parse_limits(
    listing: &str,
    key: &str,
    principal: &Principal,
) -> Result<Vec<Limit>, LimitError> {
    let mut scope: Option<LimitScope> = None;
    let mut limits = Vec::new();

    for line in listing.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(header) = parse_header(trimmed) {
            scope = Some(header);
            continue;
        }

        let Some((line_key, rest)) = trimmed.split_once('=') else {
            continue;
        };
        if line_key.trim() != key {
            continue;
        }
        // attribute lines before any mode header cannot be scoped
        let Some(scope) = scope.clone() else {
            continue;
        };

        let limit = parse_limit_value(scope, rest.trim())?;
        if principal.is_constrained_by(limit.class, &limit.name) {
            limits.push(limit);
        }
    }

    limits.sort();
    Ok(limits)
}

/// Look up a plain (non-limit) `key = value` attribute in a qmgr listing.
pub fn parse_attribute(listing: &str, key: &str) -> Option<String> {
    for line in listing.lines() {
        if let Some((line_key, value)) = line.trim().split_once('=') {
            if line_key.trim() == key {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

fn parse_header(line: &str) -> Option<LimitScope> {
    if line.contains('=') {
        return None;
    }
    if line.strip_prefix("Server ").is_some() {
        return Some(LimitScope::Server);
    }
    line.strip_prefix("Queue ")
        .map(|name| LimitScope::Queue(name.trim().to_string()))
}

/// Parse the bracketed `[c:name=value]` part of a limit line.
fn parse_limit_value(scope: LimitScope, raw: &str) -> Result<Limit, LimitError> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| LimitError::Malformed(raw.to_string()))?;

    let (code, rest) = inner
        .split_once(':')
        .ok_or_else(|| LimitError::Malformed(raw.to_string()))?;
    let class =
        LimitClass::from_code(code).ok_or_else(|| LimitError::Malformed(raw.to_string()))?;

    // the value sits after the last '='; the name may be quoted and contain
    // spaces (or, quoted, an '=')
    let (name, value) = if let Some(quoted) = rest.strip_prefix('"') {
        let (name, after) = quoted
            .split_once('"')
            .ok_or_else(|| LimitError::Malformed(raw.to_string()))?;
        let value = after
            .strip_prefix('=')
            .ok_or_else(|| LimitError::Malformed(raw.to_string()))?;
        (name, value)
    } else {
        rest.rsplit_once('=')
            .ok_or_else(|| LimitError::Malformed(raw.to_string()))?
    };

    if class == LimitClass::All && name != PBS_ALL {
        return Err(LimitError::Malformed(raw.to_string()));
    }

    let value_num: i64 = value.trim().parse().map_err(|_| LimitError::UnsupportedValue {
        name: name.to_string(),
        value: value.trim().to_string(),
    })?;

    Ok(Limit {
        scope,
        class,
        name: name.to_string(),
        value: value_num,
    })
}
