//! Seed reassignment for sampler nodes across a saved queue.
//!
//! Walks the configured queue sections, finds sampler nodes with an
//! integer-coercible `inputs.seed`, and overwrites the seed from a
//! [`SeedSequence`]: fresh uniform draws in random mode, or an arithmetic
//! sequence in increment mode with a global or per-job counting scope.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::queue::{self, DEFAULT_RESEED_SECTIONS};

// ---------------------------------------------------------------------------
// Sampler classes
// ---------------------------------------------------------------------------

/// Node classes whose `inputs.seed` is subject to reassignment.
pub const SAMPLER_CLASSES: &[&str] = &[
    "KSampler",
    "KSamplerAdvanced",
    "KSampler (Efficient)",
    "KSamplerSDXL",
    "KSamplerTiled",
    "SamplerCustom",
];

/// Upper bound (inclusive) for randomly drawn seeds.
pub const MAX_RANDOM_SEED: i64 = 2_147_483_647;

// ---------------------------------------------------------------------------
// Modes and scopes
// ---------------------------------------------------------------------------

/// How new seed values are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReseedMode {
    /// Uniform draws from `[0, MAX_RANDOM_SEED]`.
    Random,
    /// A deterministic arithmetic sequence.
    Increment,
}

impl FromStr for ReseedMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "increment" => Ok(Self::Increment),
            other => Err(CoreError::InvalidArgument(format!(
                "Unknown reseed mode '{other}'. Must be one of: random, increment"
            ))),
        }
    }
}

/// Whether the increment counter spans the whole traversal or restarts at
/// each job boundary. Random mode ignores the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedScope {
    /// One counter shared across all sections and jobs, in traversal order.
    Global,
    /// The counter restarts at `start` for every job.
    Job,
}

impl FromStr for SeedScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "job" => Ok(Self::Job),
            other => Err(CoreError::InvalidArgument(format!(
                "Unknown seed scope '{other}'. Must be one of: global, job"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Options and summary
// ---------------------------------------------------------------------------

/// Configuration for [`reseed_document`].
#[derive(Debug, Clone)]
pub struct ReseedOptions {
    /// How new seeds are computed.
    pub mode: ReseedMode,
    /// First value of the increment sequence.
    pub start: i64,
    /// Distance between consecutive increment values.
    pub step: i64,
    /// Counting scope for increment mode.
    pub scope: SeedScope,
    /// Fixed PRNG seed for reproducible random mode. Unset draws from the
    /// operating system.
    pub rng_seed: Option<u64>,
    /// Queue sections to traverse, in order.
    pub sections: Vec<String>,
}

impl ReseedOptions {
    /// Options for `mode` with the standard defaults: start 0, step 1,
    /// global scope, OS-seeded PRNG, running + pending sections.
    pub fn new(mode: ReseedMode) -> Self {
        Self {
            mode,
            start: 0,
            step: 1,
            scope: SeedScope::Global,
            rng_seed: None,
            sections: DEFAULT_RESEED_SECTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Counters returned by [`reseed_document`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReseedSummary {
    /// Nodes that carried an eligible seed field, changed or not.
    pub nodes_touched: usize,
    /// Seed fields actually overwritten with a different value.
    pub seeds_changed: usize,
}

// ---------------------------------------------------------------------------
// Seed sequence state machine
// ---------------------------------------------------------------------------

/// Source of newly assigned seed values for one reseed call.
///
/// Increment mode is a counter whose reset behavior depends on the scope.
/// Random mode is a single PRNG shared across the whole traversal; it is
/// never reset at job boundaries.
pub enum SeedSequence {
    Increment {
        counter: i64,
        start: i64,
        step: i64,
        scope: SeedScope,
    },
    Random(StdRng),
}

impl SeedSequence {
    /// Build the sequence for one call from its options.
    pub fn new(options: &ReseedOptions) -> Self {
        match options.mode {
            ReseedMode::Increment => Self::Increment {
                counter: options.start,
                start: options.start,
                step: options.step,
                scope: options.scope,
            },
            ReseedMode::Random => {
                let rng = match options.rng_seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                Self::Random(rng)
            }
        }
    }

    /// Note a job boundary. Job-scoped increment counters restart here.
    pub fn begin_job(&mut self) {
        if let Self::Increment {
            counter,
            start,
            scope: SeedScope::Job,
            ..
        } = self
        {
            *counter = *start;
        }
    }

    /// The next seed value; advances the counter or draws from the PRNG.
    pub fn next_seed(&mut self) -> i64 {
        match self {
            Self::Increment { counter, step, .. } => {
                let value = *counter;
                *counter = counter.wrapping_add(*step);
                value
            }
            Self::Random(rng) => rng.random_range(0..=MAX_RANDOM_SEED),
        }
    }
}

// ---------------------------------------------------------------------------
// Document reseed
// ---------------------------------------------------------------------------

/// Reassign sampler seeds across the configured sections, in place.
///
/// Every eligible node consumes the next sequence value even when the write
/// turns out to be a no-op, so re-running an increment reseed over its own
/// output keeps advancing the sequence. `seeds_changed` counts real
/// overwrites only; `nodes_touched` counts every node with an eligible
/// field.
pub fn reseed_document(doc: &mut Value, options: &ReseedOptions) -> ReseedSummary {
    let sections: Vec<&str> = options.sections.iter().map(String::as_str).collect();
    let mut sequence = SeedSequence::new(options);
    let mut summary = ReseedSummary::default();

    queue::for_each_job(doc, &sections, |_, _, job| {
        sequence.begin_job();
        let Some(graph) = queue::job_graph_mut(job) else {
            return;
        };
        queue::for_each_node(graph, |_, node| {
            let Some(current) = eligible_seed(node) else {
                return;
            };
            summary.nodes_touched += 1;
            let new_seed = sequence.next_seed();
            if new_seed != current {
                if let Some(inputs) = node.get_mut("inputs").and_then(Value::as_object_mut) {
                    inputs.insert("seed".to_string(), json!(new_seed));
                    summary.seeds_changed += 1;
                }
            }
        });
    });

    summary
}

/// The current seed of an eligible node: a sampler class whose
/// `inputs.seed` coerces to an integer. Anything else is skipped and
/// uncounted.
fn eligible_seed(node: &Map<String, Value>) -> Option<i64> {
    let class = queue::node_class(node)?;
    if !SAMPLER_CLASSES.contains(&class) {
        return None;
    }
    node.get("inputs")
        .and_then(Value::as_object)?
        .get("seed")
        .and_then(coerce_int)
}

/// Best-effort integer coercion: JSON integers, finite in-range floats
/// (truncated), and strings holding a base-10 integer.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn sampler(seed: i64) -> Value {
        json!({
            "class_type": "KSampler",
            "inputs": { "seed": seed, "steps": 20, "cfg": 7.0 }
        })
    }

    fn job_with_samplers(seeds: &[i64]) -> Value {
        let mut graph = Map::new();
        for (i, &seed) in seeds.iter().enumerate() {
            graph.insert(format!("{}", i + 1), sampler(seed));
        }
        json!([0, "job", graph, {}])
    }

    fn graph_seeds(doc: &Value, section: &str, job: usize) -> Vec<i64> {
        let graph = doc[section][job][2].as_object().unwrap();
        let mut ids: Vec<_> = graph.keys().cloned().collect();
        ids.sort();
        ids.iter()
            .map(|id| graph[id]["inputs"]["seed"].as_i64().unwrap())
            .collect()
    }

    fn increment_options(start: i64, step: i64, scope: SeedScope) -> ReseedOptions {
        let mut options = ReseedOptions::new(ReseedMode::Increment);
        options.start = start;
        options.step = step;
        options.scope = scope;
        options
    }

    // -- Mode and scope parsing --

    #[test]
    fn mode_tokens_parse() {
        assert_eq!("random".parse::<ReseedMode>().unwrap(), ReseedMode::Random);
        assert_eq!(
            "increment".parse::<ReseedMode>().unwrap(),
            ReseedMode::Increment
        );
    }

    #[test]
    fn unknown_mode_is_invalid_argument() {
        assert_matches!(
            "bogus".parse::<ReseedMode>(),
            Err(CoreError::InvalidArgument(_))
        );
    }

    #[test]
    fn scope_tokens_parse() {
        assert_eq!("global".parse::<SeedScope>().unwrap(), SeedScope::Global);
        assert_eq!("job".parse::<SeedScope>().unwrap(), SeedScope::Job);
    }

    #[test]
    fn unknown_scope_is_invalid_argument() {
        assert_matches!(
            "section".parse::<SeedScope>(),
            Err(CoreError::InvalidArgument(_))
        );
    }

    // -- Increment sequences --

    #[test]
    fn global_scope_counts_across_jobs() {
        let mut doc = json!({
            "queue_running": [job_with_samplers(&[1, 2])],
            "queue_pending": [job_with_samplers(&[3, 4])],
        });
        let summary = reseed_document(&mut doc, &increment_options(10, 5, SeedScope::Global));
        assert_eq!(graph_seeds(&doc, "queue_running", 0), vec![10, 15]);
        assert_eq!(graph_seeds(&doc, "queue_pending", 0), vec![20, 25]);
        assert_eq!(summary.nodes_touched, 4);
        assert_eq!(summary.seeds_changed, 4);
    }

    #[test]
    fn job_scope_restarts_per_job() {
        let mut doc = json!({
            "queue_pending": [job_with_samplers(&[1, 2]), job_with_samplers(&[3, 4])],
        });
        reseed_document(&mut doc, &increment_options(10, 5, SeedScope::Job));
        assert_eq!(graph_seeds(&doc, "queue_pending", 0), vec![10, 15]);
        assert_eq!(graph_seeds(&doc, "queue_pending", 1), vec![10, 15]);
    }

    #[test]
    fn job_scope_restarts_across_sections_too() {
        // The reset is per job, not per section.
        let mut doc = json!({
            "queue_running": [job_with_samplers(&[1])],
            "queue_pending": [job_with_samplers(&[2])],
        });
        reseed_document(&mut doc, &increment_options(7, 1, SeedScope::Job));
        assert_eq!(graph_seeds(&doc, "queue_running", 0), vec![7]);
        assert_eq!(graph_seeds(&doc, "queue_pending", 0), vec![7]);
    }

    #[test]
    fn noop_write_advances_counter_but_counts_nothing_changed() {
        // First sampler already holds the first sequence value.
        let mut doc = json!({ "queue_pending": [job_with_samplers(&[10, 99])] });
        let summary = reseed_document(&mut doc, &increment_options(10, 5, SeedScope::Global));
        assert_eq!(graph_seeds(&doc, "queue_pending", 0), vec![10, 15]);
        assert_eq!(summary.nodes_touched, 2);
        assert_eq!(summary.seeds_changed, 1);
    }

    #[test]
    fn increment_rerun_is_not_idempotent_by_design() {
        let mut doc = json!({ "queue_pending": [job_with_samplers(&[0, 0])] });
        let options = increment_options(10, 5, SeedScope::Global);
        reseed_document(&mut doc, &options);
        assert_eq!(graph_seeds(&doc, "queue_pending", 0), vec![10, 15]);
        let summary = reseed_document(&mut doc, &options);
        // Values happen to land on the same sequence, so nothing changes,
        // but every node still consumed a sequence slot.
        assert_eq!(summary.nodes_touched, 2);
        assert_eq!(summary.seeds_changed, 0);
    }

    // -- Random mode --

    #[test]
    fn random_mode_is_deterministic_under_rng_seed() {
        let make_doc = || {
            json!({
                "queue_running": [job_with_samplers(&[1, 2, 3])],
                "queue_pending": [job_with_samplers(&[4, 5])],
            })
        };
        let mut options = ReseedOptions::new(ReseedMode::Random);
        options.rng_seed = Some(1234);

        let mut first = make_doc();
        let mut second = make_doc();
        reseed_document(&mut first, &options);
        reseed_document(&mut second, &options);
        assert_eq!(first, second);
    }

    #[test]
    fn random_seeds_stay_in_range() {
        let mut doc = json!({ "queue_pending": [job_with_samplers(&[9, 9, 9, 9, 9, 9, 9, 9])] });
        let mut options = ReseedOptions::new(ReseedMode::Random);
        options.rng_seed = Some(42);
        reseed_document(&mut doc, &options);
        for seed in graph_seeds(&doc, "queue_pending", 0) {
            assert!((0..=MAX_RANDOM_SEED).contains(&seed));
        }
    }

    #[test]
    fn random_prng_is_not_reset_per_job() {
        // One job with two samplers must draw two distinct stream positions;
        // with a per-job reset, two identical jobs would get identical draws
        // only if the stream restarted. Compare against the joined stream.
        let mut two_jobs = json!({
            "queue_pending": [job_with_samplers(&[1]), job_with_samplers(&[2])],
        });
        let mut one_job = json!({
            "queue_pending": [job_with_samplers(&[1, 2])],
        });
        let mut options = ReseedOptions::new(ReseedMode::Random);
        options.rng_seed = Some(7);
        reseed_document(&mut two_jobs, &options);
        reseed_document(&mut one_job, &options);

        let split: Vec<i64> = [
            graph_seeds(&two_jobs, "queue_pending", 0),
            graph_seeds(&two_jobs, "queue_pending", 1),
        ]
        .concat();
        let joined = graph_seeds(&one_job, "queue_pending", 0);
        assert_eq!(split, joined);
    }

    // -- Eligibility --

    #[test]
    fn all_sampler_classes_are_eligible() {
        for class in SAMPLER_CLASSES {
            let node = json!({ "class_type": class, "inputs": { "seed": 3 } });
            assert_eq!(eligible_seed(node.as_object().unwrap()), Some(3));
        }
    }

    #[test]
    fn non_sampler_nodes_untouched_and_uncounted() {
        let mut doc = json!({ "queue_pending": [[0, "j", {
            "1": { "class_type": "CLIPTextEncode", "inputs": { "seed": 5, "text": "hi" } },
            "2": sampler(8),
        }, {}]] });
        let summary = reseed_document(&mut doc, &increment_options(100, 1, SeedScope::Global));
        assert_eq!(doc["queue_pending"][0][2]["1"]["inputs"]["seed"], json!(5));
        assert_eq!(doc["queue_pending"][0][2]["2"]["inputs"]["seed"], json!(100));
        assert_eq!(summary.nodes_touched, 1);
    }

    #[test]
    fn sampler_without_seed_key_uncounted() {
        let mut doc = json!({ "queue_pending": [[0, "j", {
            "1": { "class_type": "KSampler", "inputs": { "steps": 20 } },
        }, {}]] });
        let summary = reseed_document(&mut doc, &increment_options(0, 1, SeedScope::Global));
        assert_eq!(summary.nodes_touched, 0);
        assert_eq!(summary.seeds_changed, 0);
    }

    #[test]
    fn non_coercible_seed_skipped() {
        let mut doc = json!({ "queue_pending": [[0, "j", {
            "1": { "class_type": "KSampler", "inputs": { "seed": ["3", 0] } },
            "2": { "class_type": "KSampler", "inputs": { "seed": "not a number" } },
        }, {}]] });
        let summary = reseed_document(&mut doc, &increment_options(0, 1, SeedScope::Global));
        assert_eq!(summary.nodes_touched, 0);
        assert_eq!(doc["queue_pending"][0][2]["1"]["inputs"]["seed"], json!(["3", 0]));
    }

    #[test]
    fn coercion_accepts_floats_and_numeric_strings() {
        assert_eq!(coerce_int(&json!(42)), Some(42));
        assert_eq!(coerce_int(&json!(4.9)), Some(4));
        assert_eq!(coerce_int(&json!("17")), Some(17));
        assert_eq!(coerce_int(&json!(" 17 ")), Some(17));
        assert_eq!(coerce_int(&json!("4.5")), None);
        assert_eq!(coerce_int(&json!(null)), None);
        assert_eq!(coerce_int(&json!(true)), None);
        assert_eq!(coerce_int(&json!(18_446_744_073_709_551_615u64)), None);
    }

    #[test]
    fn string_seed_rewritten_as_integer() {
        let mut doc = json!({ "queue_pending": [[0, "j", {
            "1": { "class_type": "KSampler", "inputs": { "seed": "41" } },
        }, {}]] });
        reseed_document(&mut doc, &increment_options(9, 1, SeedScope::Global));
        assert_eq!(doc["queue_pending"][0][2]["1"]["inputs"]["seed"], json!(9));
    }

    // -- Sections --

    #[test]
    fn default_sections_exclude_failed() {
        let mut doc = json!({
            "queue_pending": [job_with_samplers(&[1])],
            "queue_failed": [job_with_samplers(&[2])],
        });
        let options = increment_options(50, 1, SeedScope::Global);
        reseed_document(&mut doc, &options);
        assert_eq!(graph_seeds(&doc, "queue_pending", 0), vec![50]);
        assert_eq!(graph_seeds(&doc, "queue_failed", 0), vec![2]);
    }

    #[test]
    fn explicit_sections_narrow_traversal() {
        let mut doc = json!({
            "queue_running": [job_with_samplers(&[1])],
            "queue_pending": [job_with_samplers(&[2])],
        });
        let mut options = increment_options(50, 1, SeedScope::Global);
        options.sections = vec!["queue_pending".to_string()];
        reseed_document(&mut doc, &options);
        assert_eq!(graph_seeds(&doc, "queue_running", 0), vec![1]);
        assert_eq!(graph_seeds(&doc, "queue_pending", 0), vec![50]);
    }

    #[test]
    fn bare_node_map_jobs_are_reseeded() {
        let mut doc = json!({ "queue_pending": [{ "1": sampler(0) }] });
        reseed_document(&mut doc, &increment_options(3, 1, SeedScope::Global));
        assert_eq!(doc["queue_pending"][0]["1"]["inputs"]["seed"], json!(3));
    }

    // -- Sequence object --

    #[test]
    fn sequence_begin_job_is_noop_for_global_scope() {
        let mut sequence = SeedSequence::new(&increment_options(0, 2, SeedScope::Global));
        assert_eq!(sequence.next_seed(), 0);
        sequence.begin_job();
        assert_eq!(sequence.next_seed(), 2);
    }

    #[test]
    fn sequence_begin_job_restarts_job_scope() {
        let mut sequence = SeedSequence::new(&increment_options(5, 1, SeedScope::Job));
        assert_eq!(sequence.next_seed(), 5);
        assert_eq!(sequence.next_seed(), 6);
        sequence.begin_job();
        assert_eq!(sequence.next_seed(), 5);
    }
}
