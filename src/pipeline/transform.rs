//! Join-and-filter: USD facts enriched with filer and tag metadata.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{EnrichedFact, EnrichedTable, Fact, Submission, TagDefinition};
use crate::observability::metrics;

pub const DEFAULT_BATCH_ROWS: usize = 500_000;

/// How the facts table is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Load all of `num.txt` at once.
    InMemory,
    /// Stream `num.txt` in batches of at most `batch_rows` rows.
    Chunked { batch_rows: usize },
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::InMemory => "in_memory",
            Strategy::Chunked { .. } => "chunked",
        }
    }
}

/// Projected submission attributes.
#[derive(Debug, Clone)]
struct Filer {
    cik: String,
    name: Option<String>,
    form: String,
    filed: String,
}

/// Projected tag attributes.
#[derive(Debug, Clone)]
struct TagLabel {
    tlabel: Option<String>,
    doc: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Submissions keyed by `adsh` and tags keyed by `tag`, shared read-only
/// across every batch of a period.
#[derive(Debug, Default)]
pub struct ReferenceTables {
    submissions: HashMap<String, Filer>,
    tags: HashMap<String, TagLabel>,
}

impl ReferenceTables {
    /// Indexes both tables. The first submission per `adsh` wins; for tags
    /// the first definition carrying a label wins, so each fact joins to at
    /// most one tag row.
    pub fn new<S, T>(submissions: S, tags: T) -> Self
    where
        S: IntoIterator<Item = Submission>,
        T: IntoIterator<Item = TagDefinition>,
    {
        let mut subs = HashMap::new();
        for s in submissions {
            subs.entry(s.adsh).or_insert(Filer { cik: s.cik, name: s.name, form: s.form, filed: s.filed });
        }
        let mut tag_map: HashMap<String, TagLabel> = HashMap::new();
        for t in tags {
            let label = TagLabel { tlabel: t.tlabel, doc: t.doc };
            match tag_map.get_mut(&t.tag) {
                Some(existing) if present(&existing.tlabel).is_none() && present(&label.tlabel).is_some() => {
                    *existing = label;
                }
                Some(_) => {}
                None => {
                    tag_map.insert(t.tag, label);
                }
            }
        }
        Self { submissions: subs, tags: tag_map }
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub facts_read: usize,
    pub usd_facts: usize,
    pub unresolved_dropped: usize,
    pub rows_out: usize,
    pub batches: usize,
}

impl TransformStats {
    fn absorb(&mut self, other: TransformStats) {
        self.facts_read += other.facts_read;
        self.usd_facts += other.usd_facts;
        self.unresolved_dropped += other.unresolved_dropped;
        self.rows_out += other.rows_out;
        self.batches += other.batches;
    }
}

/// Filters one batch to USD, joins it, and drops unresolved rows.
pub fn join_batch(facts: &[Fact], refs: &ReferenceTables) -> (EnrichedTable, TransformStats) {
    let mut stats = TransformStats { facts_read: facts.len(), batches: 1, ..Default::default() };
    let mut rows = Vec::new();
    for fact in facts.iter().filter(|f| f.is_usd()) {
        stats.usd_facts += 1;
        let filer = refs.submissions.get(&fact.adsh);
        let tag = refs.tags.get(&fact.tag);
        let (Some(filer), Some(tag)) = (filer, tag) else {
            stats.unresolved_dropped += 1;
            continue;
        };
        let (Some(name), Some(tlabel)) = (present(&filer.name), present(&tag.tlabel)) else {
            stats.unresolved_dropped += 1;
            continue;
        };
        rows.push(EnrichedFact {
            adsh: fact.adsh.clone(),
            tag: fact.tag.clone(),
            ddate: fact.ddate,
            qtrs: fact.qtrs,
            value: fact.value,
            cik: filer.cik.clone(),
            name: name.to_string(),
            form: filer.form.clone(),
            filed: filer.filed.clone(),
            tlabel: tlabel.to_string(),
            doc: tag.doc.clone(),
        });
    }
    stats.rows_out = rows.len();
    (EnrichedTable::new(rows), stats)
}

/// Unchunked transform over fully loaded tables.
pub fn transform(facts: &[Fact], submissions: &[Submission], tags: &[TagDefinition]) -> EnrichedTable {
    let refs = ReferenceTables::new(submissions.iter().cloned(), tags.iter().cloned());
    join_batch(facts, &refs).0
}

/// Applies [`join_batch`] to each batch in order and concatenates the
/// results. The row set does not depend on where batch boundaries fall.
pub fn transform_chunked<I>(batches: I, refs: &ReferenceTables) -> Result<(EnrichedTable, TransformStats)>
where
    I: IntoIterator<Item = Result<Vec<Fact>>>,
{
    let mut parts = Vec::new();
    let mut totals = TransformStats::default();
    for (i, batch) in batches.into_iter().enumerate() {
        let batch = batch?;
        let (part, stats) = join_batch(&batch, refs);
        tracing::debug!(
            batch = i + 1,
            rows_in = stats.facts_read,
            rows_out = stats.rows_out,
            "Processed facts batch"
        );
        metrics::transform::batch_processed(stats.facts_read);
        totals.absorb(stats);
        parts.push(part);
    }
    Ok((EnrichedTable::concat(parts), totals))
}
