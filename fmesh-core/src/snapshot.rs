use log::warn;
use serde::{Deserialize, Serialize};

/// One node's row parsed out of a server snapshot payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub ip: String,
    /// Status token as the server reported it. The protocol does not fix a
    /// vocabulary, so it stays an open string rather than an enum.
    pub status: String,
    /// Application-defined file listing, possibly empty.
    pub files: String,
}

/// Outcome of parsing a snapshot payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotUpdate {
    /// Empty payload: the server had nothing to report. Not an error.
    NoUpdate,
    /// Parsed entries plus the count of malformed ones that were skipped.
    Nodes {
        entries: Vec<NodeEntry>,
        skipped: usize,
    },
}

/// Parse the multi-node listing carried by a snapshot payload.
///
/// Format: `entry (";" entry)*` with `entry = ip ":" status ":" files`.
/// An entry is well-formed iff splitting on `:` yields exactly three
/// fields; `files` may be empty (trailing `:`). Malformed entries are
/// logged, counted and skipped while the rest of the payload still
/// parses. The protocol defines no escaping, so a `:` embedded in `files`
/// yields a fourth field and the entry is rejected as malformed.
pub fn parse_snapshot(payload: &str) -> SnapshotUpdate {
    if payload.is_empty() {
        return SnapshotUpdate::NoUpdate;
    }

    let mut entries = Vec::new();
    let mut skipped = 0;

    for candidate in payload.split(';') {
        // A trailing `;` leaves an empty candidate; there is no entry to
        // parse or count there.
        if candidate.is_empty() {
            continue;
        }

        let fields: Vec<&str> = candidate.split(':').collect();
        if fields.len() != 3 {
            warn!(
                "skipping malformed snapshot entry '{}': expected 3 fields, got {}",
                candidate,
                fields.len()
            );
            skipped += 1;
            continue;
        }

        entries.push(NodeEntry {
            ip: fields[0].to_string(),
            status: fields[1].to_string(),
            files: fields[2].to_string(),
        });
    }

    SnapshotUpdate::Nodes { entries, skipped }
}
