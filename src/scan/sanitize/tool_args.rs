//! `ToolArgsCanonicalizer` (spec §4.3): NFKC-normalizes and strips
//! invisible/bidi characters from every string in a tool-call argument tree.

use super::unicode::{normalize_nfkc, strip_invisible_and_bidi};
use serde_json::Value;

/// Default node visitation budget (spec §4.3, §5 "Cancellation").
pub const DEFAULT_NODE_BUDGET: usize = 20_000;

/// Counters describing what a canonicalization pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonStats {
    /// Number of string leaves that were altered.
    pub strings_changed: usize,
    /// Number of tree nodes visited.
    pub nodes_visited: usize,
    /// `true` if the node budget was exhausted before the whole tree was
    /// visited (spec §4.3, §7(d): not an error, reported via this flag).
    pub max_nodes_exceeded: bool,
}

/// Walk a JSON value tree, normalizing every string leaf, bounded by
/// `budget` visited nodes.
#[must_use]
pub fn canonicalize_value(value: &Value, budget: usize) -> (Value, CanonStats) {
    let mut stats = CanonStats::default();
    let out = walk(value, budget, &mut stats);
    (out, stats)
}

fn walk(value: &Value, budget: usize, stats: &mut CanonStats) -> Value {
    if stats.nodes_visited >= budget {
        stats.max_nodes_exceeded = true;
        return value.clone();
    }
    stats.nodes_visited += 1;

    match value {
        Value::String(s) => {
            let nfkc = normalize_nfkc(s);
            let (stripped, counts) = strip_invisible_and_bidi(&nfkc);
            if stripped.as_ref() != s.as_str() || counts.invisible > 0 || counts.bidi > 0 {
                stats.strings_changed += 1;
            }
            Value::String(stripped.into_owned())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| walk(v, budget, stats))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), walk(v, budget, stats));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
