//! Fragmented, resumable retrieval: the identifier list is cut into
//! fixed-size fragments, each persisted as its own table. An existing fragment
//! file counts as done, so an interrupted run picks up where it stopped.

use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{GeneId, ResolutionOutcome};
use crate::error::KiraError;
use crate::genomejp::GenomeJpClient;
use crate::kegg::{KEGG_BATCH_LIMIT, KeggClient, fetch_entries};
use crate::locus::ManualReview;
use crate::neighbors::NeighborResolver;
use crate::record::{ProteinRecord, parse_kegg_entry, parse_uniprot_entry};
use crate::store::{FragmentLayout, ensure_dir};
use crate::table::{Table, combine_dir, write_table_atomic};
use crate::taxonomy::LazyTaxonomy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub complete: usize,
    pub incomplete: usize,
    pub error: usize,
}

impl Tally {
    pub fn add(&mut self, outcome: ResolutionOutcome) {
        match outcome {
            ResolutionOutcome::Complete => self.complete += 1,
            ResolutionOutcome::Incomplete => self.incomplete += 1,
            ResolutionOutcome::Error => self.error += 1,
        }
    }

    pub fn merge(&mut self, other: Tally) {
        self.complete += other.complete;
        self.incomplete += other.incomplete;
        self.error += other.error;
    }

    pub fn total(&self) -> usize {
        self.complete + self.incomplete + self.error
    }
}

/// What one worker call produced.
#[derive(Debug, Clone, Default)]
pub struct UnitOutput {
    pub records: Vec<ProteinRecord>,
    pub tally: Tally,
    pub manual_review: ManualReview,
}

/// A per-fragment job. `process` must be pure: no shared mutable state.
pub trait FragmentTask: Sync {
    /// Groups a fragment's identifiers into worker units.
    fn units(&self, ids: &[String]) -> Vec<Vec<String>> {
        ids.iter().map(|id| vec![id.clone()]).collect()
    }

    fn process(&self, unit: &[String]) -> UnitOutput;
}

/// Left-joins taxonomy onto a fragment's records before it is persisted.
pub trait TaxonomyJoin {
    fn join(&mut self, records: &mut [ProteinRecord]) -> Result<(), KiraError>;
}

impl<K: KeggClient + ?Sized> TaxonomyJoin for LazyTaxonomy<'_, K> {
    fn join(&mut self, records: &mut [ProteinRecord]) -> Result<(), KiraError> {
        self.join_available(records);
        Ok(())
    }
}

/// For sources whose records already carry their taxonomy.
pub struct NoTaxonomy;

impl TaxonomyJoin for NoTaxonomy {
    fn join(&mut self, _records: &mut [ProteinRecord]) -> Result<(), KiraError> {
        Ok(())
    }
}

pub struct NeighborTask<'a, K: KeggClient + ?Sized> {
    resolver: NeighborResolver<'a, K>,
}

impl<'a, K: KeggClient + ?Sized> NeighborTask<'a, K> {
    pub fn new(resolver: NeighborResolver<'a, K>) -> Self {
        Self { resolver }
    }
}

impl<K: KeggClient + ?Sized> FragmentTask for NeighborTask<'_, K> {
    fn process(&self, unit: &[String]) -> UnitOutput {
        let mut output = UnitOutput::default();
        for id in unit {
            match id.parse::<GeneId>() {
                Ok(gene) => {
                    let resolution = self.resolver.resolve(&gene);
                    output.tally.add(resolution.outcome);
                    output.manual_review.extend(resolution.manual_review);
                    output.records.extend(resolution.records);
                }
                Err(err) => {
                    warn!(id, error = %err, "unusable identifier");
                    output.tally.add(ResolutionOutcome::Error);
                    output.manual_review.push(id.clone());
                    output.records.push(ProteinRecord::placeholder(id));
                }
            }
        }
        output
    }
}

/// Plain KEGG entry retrieval, grouped by the remote batch limit.
pub struct KeggEntryTask<'a, K: KeggClient + ?Sized> {
    client: &'a K,
}

impl<'a, K: KeggClient + ?Sized> KeggEntryTask<'a, K> {
    pub fn new(client: &'a K) -> Self {
        Self { client }
    }
}

impl<K: KeggClient + ?Sized> FragmentTask for KeggEntryTask<'_, K> {
    fn units(&self, ids: &[String]) -> Vec<Vec<String>> {
        ids.chunks(KEGG_BATCH_LIMIT).map(<[String]>::to_vec).collect()
    }

    fn process(&self, unit: &[String]) -> UnitOutput {
        let mut output = UnitOutput::default();
        match fetch_entries(self.client, unit) {
            Ok(fetched) => {
                let answered = fetched.iter().filter(|item| item.is_requested()).count();
                output.tally.complete = answered;
                output.tally.incomplete = unit.len().saturating_sub(answered);
                output.records = fetched
                    .into_iter()
                    .map(|item| {
                        let org = item.requested.split_once(':').map(|(org, _)| org).unwrap_or("");
                        parse_kegg_entry(&item.entry.lines, None, org)
                    })
                    .collect();
            }
            Err(err) => {
                warn!(ids = ?unit, error = %err, "kegg batch failed");
                for id in unit {
                    output.tally.add(ResolutionOutcome::Error);
                    output.records.push(ProteinRecord {
                        reference: None,
                        ..ProteinRecord::placeholder(id)
                    });
                }
            }
        }
        output
    }
}

/// UniProt entries through Genome.jp, one request per identifier.
pub struct UniprotEntryTask<'a, G: GenomeJpClient + ?Sized> {
    client: &'a G,
}

impl<'a, G: GenomeJpClient + ?Sized> UniprotEntryTask<'a, G> {
    pub fn new(client: &'a G) -> Self {
        Self { client }
    }
}

impl<G: GenomeJpClient + ?Sized> FragmentTask for UniprotEntryTask<'_, G> {
    fn process(&self, unit: &[String]) -> UnitOutput {
        let mut output = UnitOutput::default();
        for id in unit {
            match self.client.uniprot_entry(id) {
                Ok(text) => {
                    output.tally.add(ResolutionOutcome::Complete);
                    output.records.push(parse_uniprot_entry(id, &text));
                }
                Err(err) => {
                    warn!(id, error = %err, "uniprot entry failed");
                    output.tally.add(ResolutionOutcome::Error);
                    output.records.push(ProteinRecord {
                        reference: None,
                        ..ProteinRecord::placeholder(id)
                    });
                }
            }
        }
        output
    }
}

/// Sequential processing or a fixed-size pool with a join barrier.
pub enum Workers {
    Sequential,
    Pool(ThreadPool),
}

impl Workers {
    pub fn new(threads: Option<usize>) -> Result<Self, KiraError> {
        match threads {
            None | Some(0) | Some(1) => Ok(Workers::Sequential),
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map(Workers::Pool)
                .map_err(|err| pool_error(threads, err)),
        }
    }

    /// Applies `f` to every item; output order follows input order.
    pub fn map<I, O, F>(&self, items: &[I], f: F) -> Vec<O>
    where
        I: Sync,
        O: Send,
        F: Fn(&I) -> O + Sync,
    {
        match self {
            Workers::Sequential => items.iter().map(f).collect(),
            Workers::Pool(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        }
    }
}

/// A pool that cannot be built is a bad worker setting, not an IO failure.
fn pool_error(threads: usize, err: impl std::fmt::Display) -> KiraError {
    KiraError::InvalidInput(format!("cannot start a pool of {threads} workers: {err}"))
}

#[derive(Debug, Clone, Serialize)]
pub struct FragmentRun {
    pub fragments_total: usize,
    pub fragments_written: usize,
    pub fragments_skipped: usize,
    pub tally: Tally,
    pub manual_review: ManualReview,
    #[serde(skip)]
    pub combined: Table,
}

/// Contiguous fragments of `size` identifiers, in input order.
pub fn partition(ids: &[String], size: usize) -> Vec<&[String]> {
    ids.chunks(size.max(1)).collect()
}

pub struct FragmentCoordinator {
    layout: FragmentLayout,
    fragment_size: usize,
    separator: u8,
    extension: String,
    workers: Workers,
}

impl FragmentCoordinator {
    pub fn new(
        layout: FragmentLayout,
        fragment_size: usize,
        separator: u8,
        extension: &str,
        workers: Workers,
    ) -> Self {
        Self {
            layout,
            fragment_size,
            separator,
            extension: extension.to_string(),
            workers,
        }
    }

    pub fn layout(&self) -> &FragmentLayout {
        &self.layout
    }

    pub fn run<T: FragmentTask>(
        &self,
        ids: &[String],
        task: &T,
        taxonomy: &mut dyn TaxonomyJoin,
        sink: &dyn ProgressSink,
    ) -> Result<FragmentRun, KiraError> {
        ensure_dir(&self.layout.dir)?;
        let fragments = partition(ids, self.fragment_size);
        let total = fragments.len();
        let mut run = FragmentRun {
            fragments_total: total,
            fragments_written: 0,
            fragments_skipped: 0,
            tally: Tally::default(),
            manual_review: ManualReview::new(),
            combined: Table::default(),
        };

        for (index, fragment) in fragments.into_iter().enumerate() {
            let number = index + 1;
            let path = self.layout.fragment_path(number, &self.extension);
            if path.as_std_path().exists() {
                info!(path = %path, "fragment exists, skipping");
                sink.event(ProgressEvent {
                    message: format!("phase=Store; fragment {number} of {total} already saved"),
                    elapsed: None,
                });
                run.fragments_skipped += 1;
                continue;
            }

            sink.event(ProgressEvent {
                message: format!(
                    "phase=Fetch; fragment {number} of {total} ({} ids)",
                    fragment.len()
                ),
                elapsed: None,
            });
            let start = std::time::Instant::now();
            let units = task.units(fragment);
            let outputs = self.workers.map(&units, |unit| task.process(unit));

            let mut records = Vec::new();
            for output in outputs {
                run.tally.merge(output.tally);
                run.manual_review.extend(output.manual_review);
                records.extend(output.records);
            }
            taxonomy.join(&mut records)?;

            let mut table = Table::from_records(&records);
            if table.headers().is_empty() {
                table = Table::new(["ID"]);
            }
            write_table_atomic(&table, &path, self.separator)?;
            run.fragments_written += 1;
            info!(path = %path, records = records.len(), ids = fragment.len(), "fragment saved");
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Store; fragment {number} of {total}: {} records for {} ids",
                    records.len(),
                    fragment.len()
                ),
                elapsed: Some(start.elapsed()),
            });
        }

        run.combined = combine_dir(&self.layout.dir, self.separator, &self.extension)?;
        Ok(run)
    }
}
