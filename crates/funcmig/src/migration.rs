//! Migration definitions, run records, and ordered sequences.
//!
//! A migration is identified by its canonical operation name,
//! `Migration_<unixSeconds>_<up|down>`. The timestamp embedded in the
//! name orders execution; it is never the wall-clock time of a run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Prefix every migration operation name must carry.
pub const MIGRATION_PREFIX: &str = "Migration";

/// Direction of a migration: apply or revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply a change.
    Up,
    /// Revert a change.
    Down,
}

impl Direction {
    /// The `_up` / `_down` suffix carried by canonical names.
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Up => "_up",
            Direction::Down => "_down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(Error::InvalidName {
                name: other.to_string(),
            }),
        }
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The operation returned without error.
    Success,
    /// The operation returned an error.
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failure => write!(f, "failure"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "failure" => Ok(RunStatus::Failure),
            other => Err(Error::InvalidName {
                name: other.to_string(),
            }),
        }
    }
}

/// One discovered migration definition. Immutable after discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDef {
    /// Canonical operation name, `Migration_<unixSeconds>_<up|down>`.
    pub name: String,
    /// Direction parsed from the name.
    pub direction: Direction,
    /// The unix time embedded in the name. Orders the sequence.
    pub timestamp: DateTime<Utc>,
}

/// One durable, append-only log entry for a single execution attempt.
///
/// A migration may have zero, one, or many records; re-running a name
/// appends a new record. Records are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Monotonically increasing identifier assigned by the store.
    pub id: i64,
    /// Name of the executed migration.
    pub name: String,
    /// Direction copied from the definition.
    pub direction: Direction,
    /// Outcome of the attempt.
    pub status: RunStatus,
    /// Failure detail; empty on success.
    pub error: String,
    /// The definition's embedded time, copied from the name.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time of the attempt.
    pub created: DateTime<Utc>,
}

/// Split a canonical operation name into its embedded timestamp and
/// direction.
///
/// Names must be exactly `Migration_<unixSeconds>_<up|down>`; anything
/// else is [`Error::InvalidName`].
pub fn parse_name(name: &str) -> Result<(DateTime<Utc>, Direction), Error> {
    let invalid = || Error::InvalidName {
        name: name.to_string(),
    };

    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() != 3 || parts[0] != MIGRATION_PREFIX {
        return Err(invalid());
    }

    let seconds: i64 = parts[1].parse().map_err(|_| invalid())?;
    let timestamp = DateTime::from_timestamp(seconds, 0).ok_or_else(invalid)?;
    let direction = parts[2].parse::<Direction>().map_err(|_| invalid())?;

    Ok((timestamp, direction))
}

/// Normalize caller input into the canonical name for `direction`.
///
/// Accepts a full canonical name, a bare numeric timestamp, or a partial
/// name missing the direction suffix:
///
/// - `"1658164360"` becomes `"Migration_1658164360_up"` (for [`Direction::Up`])
/// - `"Migration_1658164360"` gains the missing `_up` suffix
/// - `"Migration_1658164360_up"` passes through unchanged
pub fn canonical_name(input: &str, direction: Direction) -> String {
    let input = input.trim();

    let mut name = if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        format!("{}_{}", MIGRATION_PREFIX, input)
    } else {
        input.to_string()
    };

    if !name.ends_with(direction.suffix()) {
        name.push_str(direction.suffix());
    }

    name
}

/// Extract the timestamp embedded in a generated migration file name.
///
/// The first contiguous run of digits in `name` is taken as unix seconds.
pub fn file_name_timestamp(name: &str) -> Result<DateTime<Utc>, Error> {
    let invalid = || Error::InvalidName {
        name: name.to_string(),
    };

    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let seconds: i64 = digits.parse().map_err(|_| invalid())?;
    DateTime::from_timestamp(seconds, 0).ok_or_else(invalid)
}

/// Ordered collection of migration definitions for one direction.
///
/// Built once during discovery and never mutated afterwards. The up
/// sequence is ascending by `(timestamp, name)`, the down sequence
/// descending by the same key; the name component is the tie-break for
/// definitions sharing a timestamp.
#[derive(Debug, Clone, Default)]
pub struct MigrationSequence {
    defs: Vec<MigrationDef>,
}

impl MigrationSequence {
    pub(crate) fn push(
        &mut self,
        name: impl Into<String>,
        direction: Direction,
        timestamp: DateTime<Utc>,
    ) {
        self.defs.push(MigrationDef {
            name: name.into(),
            direction,
            timestamp,
        });
    }

    pub(crate) fn sort_ascending(&mut self) {
        self.defs
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));
    }

    pub(crate) fn sort_descending(&mut self) {
        self.defs
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.name.cmp(&a.name)));
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Check if the sequence holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate definitions in sequence order.
    pub fn iter(&self) -> std::slice::Iter<'_, MigrationDef> {
        self.defs.iter()
    }

    /// The first definition in sequence order.
    pub fn first(&self) -> Option<&MigrationDef> {
        self.defs.first()
    }

    /// The final definition in sequence order.
    pub fn last(&self) -> Option<&MigrationDef> {
        self.defs.last()
    }

    /// Ordered definition names, for driving execution.
    pub fn names(&self) -> Vec<String> {
        self.defs.iter().map(|def| def.name.clone()).collect()
    }

    /// Prefix of the sequence up to and including the first definition
    /// named `name`.
    ///
    /// When `name` is not present the entire sequence is returned;
    /// callers wanting "run up through X" strictly should check
    /// membership first.
    pub fn before_name(&self, name: &str) -> &[MigrationDef] {
        if self.defs.is_empty() {
            return &[];
        }

        match self.defs.iter().position(|def| def.name == name) {
            Some(idx) => &self.defs[..=idx],
            None => &self.defs,
        }
    }

    /// Suffix starting at the first definition, in sequence order, whose
    /// timestamp is strictly after `record`'s.
    ///
    /// `None` means "no history yet" and yields the whole sequence.
    pub fn after(&self, record: Option<&RunRecord>) -> &[MigrationDef] {
        let record = match record {
            Some(record) => record,
            None => return &self.defs,
        };

        match self
            .defs
            .iter()
            .position(|def| def.timestamp > record.timestamp)
        {
            Some(idx) => &self.defs[idx..],
            None => &[],
        }
    }
}
