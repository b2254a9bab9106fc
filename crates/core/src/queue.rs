//! Queue/job/node traversal over saved queue snapshots.
//!
//! A snapshot stores named queue sections, each an array of jobs. A job is
//! either the standard `[priority, job_id, graph, meta, outputs?]` array
//! with the node graph at index 2, or (in older snapshots) a bare node-map
//! object. The helpers here normalize both shapes into a uniform walk and
//! are total: malformed input yields fewer items, never a panic or an error.

use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Section names
// ---------------------------------------------------------------------------

/// Jobs currently executing.
pub const QUEUE_RUNNING: &str = "queue_running";

/// Jobs waiting to execute.
pub const QUEUE_PENDING: &str = "queue_pending";

/// Jobs that failed and were parked for inspection.
pub const QUEUE_FAILED: &str = "queue_failed";

/// Every known queue section, in traversal order.
pub const ALL_SECTIONS: &[&str] = &[QUEUE_RUNNING, QUEUE_PENDING, QUEUE_FAILED];

/// Sections reseeded when the caller does not narrow the selection.
pub const DEFAULT_RESEED_SECTIONS: &[&str] = &[QUEUE_RUNNING, QUEUE_PENDING];

// ---------------------------------------------------------------------------
// Job traversal
// ---------------------------------------------------------------------------

/// Visit `(section, index, job)` for every recognizable job in the listed
/// sections.
///
/// Sections are walked in the order given, not in document key order; the
/// increment seed sequence depends on a deterministic traversal order.
/// A section that is missing or not an array contributes nothing. An
/// array job whose graph slot (index 2) is not an object is skipped whole:
/// its metadata is not rescued independently.
pub fn for_each_job<F>(doc: &mut Value, sections: &[&str], mut visit: F)
where
    F: FnMut(&str, usize, &mut Value),
{
    for &section in sections {
        let Some(jobs) = doc.get_mut(section).and_then(Value::as_array_mut) else {
            continue;
        };
        for (index, job) in jobs.iter_mut().enumerate() {
            if is_job(job) {
                visit(section, index, job);
            }
        }
    }
}

/// Whether a queue entry has one of the two recognized job shapes.
fn is_job(entry: &Value) -> bool {
    match entry {
        Value::Array(parts) => parts.len() >= 3 && parts[2].is_object(),
        Value::Object(_) => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Job shape normalization
// ---------------------------------------------------------------------------

/// The canonical node graph of a job: index 2 of the standard array shape,
/// or the job itself when it is a bare node-map.
pub fn job_graph_mut(job: &mut Value) -> Option<&mut Map<String, Value>> {
    match job {
        Value::Array(parts) => parts.get_mut(2).and_then(Value::as_object_mut),
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// The metadata mapping of a job (index 3 of the standard array shape).
/// Bare node-map jobs have no metadata slot.
pub fn job_metadata_mut(job: &mut Value) -> Option<&mut Map<String, Value>> {
    match job {
        Value::Array(parts) => parts.get_mut(3).and_then(Value::as_object_mut),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Node iteration
// ---------------------------------------------------------------------------

/// Visit `(node_id, node)` for every object-typed entry of a node graph.
/// Non-object entries are skipped.
pub fn for_each_node<F>(graph: &mut Map<String, Value>, mut visit: F)
where
    F: FnMut(&str, &mut Map<String, Value>),
{
    for (id, entry) in graph.iter_mut() {
        if let Some(node) = entry.as_object_mut() {
            visit(id, node);
        }
    }
}

/// The `class_type` discriminator of a canonical graph node.
pub fn node_class(node: &Map<String, Value>) -> Option<&str> {
    node.get("class_type").and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
