//! Frame-count and filename-prefix rewriting.
//!
//! A job stores the same logical node twice: once in the canonical graph
//! (inputs addressed by name) and once in the editor-facing UI mirror at
//! `extra_pnginfo.workflow.nodes` (values addressed by widget position).
//! The two carry no shared identifier, so the rewrite is applied to each
//! representation independently with the same transformation; agreement
//! follows from determinism, not from cross-referencing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::queue::{self, ALL_SECTIONS};

// ---------------------------------------------------------------------------
// Node classes and widget positions
// ---------------------------------------------------------------------------

/// Video-sizing latent node whose `length` input is the frame count.
pub const EMPTY_LATENT_VIDEO_CLASS: &str = "EmptyHunyuanLatentVideo";

/// Save nodes carrying a `filename_prefix` input.
pub const SAVE_CLASSES: &[&str] = &["SaveVideo", "SaveImage"];

/// Widget slot holding the frame length on the sizing node
/// (`widgets_values = [width, height, length, batch]`).
pub const LENGTH_WIDGET_INDEX: usize = 2;

/// Widget slot holding the filename prefix on save nodes.
pub const PREFIX_WIDGET_INDEX: usize = 0;

/// Frame count applied when the caller does not specify one.
pub const DEFAULT_FRAMES: i64 = 145;

/// Trailing `-NNNf` segment, optionally followed by an `NNNsteps` tail.
/// Compiled once, reused forever.
static FRAME_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+)f(\d+steps)?$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Per-representation update counts returned by [`reframe_document`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReframeSummary {
    /// Canonical graph nodes whose inputs were rewritten.
    pub graph_nodes_updated: usize,
    /// UI mirror nodes whose widget values were rewritten.
    pub ui_nodes_updated: usize,
}

// ---------------------------------------------------------------------------
// Prefix rewrite rule
// ---------------------------------------------------------------------------

/// Ensure `prefix` ends in a `-{frames}f` segment.
///
/// An existing trailing `-NNNf` has its digits replaced, preserving an
/// `NNNsteps` tail when present; otherwise the segment is appended.
/// Replace-vs-append is decided by match presence, which makes the rule
/// idempotent: rewriting its own output with the same `frames` changes
/// nothing.
pub fn rewrite_prefix(prefix: &str, frames: i64) -> String {
    if FRAME_SEGMENT_RE.is_match(prefix) {
        FRAME_SEGMENT_RE
            .replace(prefix, format!("-{frames}f$2"))
            .into_owned()
    } else {
        format!("{prefix}-{frames}f")
    }
}

// ---------------------------------------------------------------------------
// Document rewrite
// ---------------------------------------------------------------------------

/// Rewrite the frame count and frame-bearing filename prefixes everywhere
/// they occur, across all known queue sections.
///
/// Mutates `doc` in place; callers that need the original must clone first.
/// Applying the same `frames` a second time is a no-op.
pub fn reframe_document(doc: &mut Value, frames: i64) -> ReframeSummary {
    let mut summary = ReframeSummary::default();
    queue::for_each_job(doc, ALL_SECTIONS, |_, _, job| {
        if let Some(graph) = queue::job_graph_mut(job) {
            summary.graph_nodes_updated += reframe_graph(graph, frames);
        }
        if let Some(meta) = queue::job_metadata_mut(job) {
            summary.ui_nodes_updated += reframe_ui_mirror(meta, frames);
        }
    });
    summary
}

/// Canonical-graph pass: inputs addressed by name.
fn reframe_graph(graph: &mut Map<String, Value>, frames: i64) -> usize {
    let mut updated = 0;
    queue::for_each_node(graph, |_, node| {
        let is_sizing = queue::node_class(node) == Some(EMPTY_LATENT_VIDEO_CLASS);
        let is_save = queue::node_class(node).is_some_and(|c| SAVE_CLASSES.contains(&c));

        if is_sizing {
            // Force the length, creating `inputs` when absent. An `inputs`
            // that exists with a non-object shape is left alone.
            if let Some(inputs) = ensure_inputs(node) {
                inputs.insert("length".to_string(), json!(frames));
                updated += 1;
            }
        }

        if is_save {
            if let Some(prefix) = node
                .get_mut("inputs")
                .and_then(Value::as_object_mut)
                .and_then(|inputs| inputs.get_mut("filename_prefix"))
            {
                if let Some(rewritten) = prefix.as_str().map(|s| rewrite_prefix(s, frames)) {
                    *prefix = Value::String(rewritten);
                    updated += 1;
                }
            }
        }
    });
    updated
}

/// UI-mirror pass: values addressed by fixed widget position under
/// `extra_pnginfo.workflow.nodes`.
fn reframe_ui_mirror(meta: &mut Map<String, Value>, frames: i64) -> usize {
    let Some(nodes) = meta
        .get_mut("extra_pnginfo")
        .and_then(|info| info.get_mut("workflow"))
        .and_then(Value::as_object_mut)
        .and_then(|workflow| workflow.get_mut("nodes"))
        .and_then(Value::as_array_mut)
    else {
        return 0;
    };

    let mut updated = 0;
    for entry in nodes.iter_mut() {
        let Some(node) = entry.as_object_mut() else {
            continue;
        };
        let node_type = node.get("type").and_then(Value::as_str);
        let is_sizing = node_type == Some(EMPTY_LATENT_VIDEO_CLASS);
        let is_save = node_type.is_some_and(|t| SAVE_CLASSES.contains(&t));
        if !is_sizing && !is_save {
            continue;
        }

        let Some(widgets) = node.get_mut("widgets_values").and_then(Value::as_array_mut) else {
            continue;
        };

        if is_sizing && widgets.len() > LENGTH_WIDGET_INDEX {
            widgets[LENGTH_WIDGET_INDEX] = json!(frames);
            updated += 1;
        }

        if is_save {
            if let Some(first) = widgets.get_mut(PREFIX_WIDGET_INDEX) {
                if let Some(rewritten) = first.as_str().map(|s| rewrite_prefix(s, frames)) {
                    *first = Value::String(rewritten);
                    updated += 1;
                }
            }
        }
    }
    updated
}

/// The node's `inputs` object, created when absent.
fn ensure_inputs(node: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    node.entry("inputs")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
