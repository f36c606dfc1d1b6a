//! Neighbor resolution: windows a reference gene, retrieves the candidates and
//! escalates the locus step until the window fills or the ladder runs out.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{GeneId, ResolutionOutcome};
use crate::error::KiraError;
use crate::kegg::{KeggClient, fetch_entries};
use crate::locus::{ManualReview, NeighborWindow, neighbor_window};
use crate::record::{ProteinRecord, parse_kegg_entry};

/// Some genomes number their genes in increments of 5 or 10.
pub const DEFAULT_STEP_LADDER: [u32; 3] = [1, 5, 10];

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub reference: String,
    pub outcome: ResolutionOutcome,
    /// Step of the window the records came from; `None` when nothing was fetched.
    pub step: Option<u32>,
    pub records: Vec<ProteinRecord>,
    pub manual_review: ManualReview,
}

impl Resolution {
    fn failed(reference: &str, manual_review: ManualReview) -> Self {
        Self {
            reference: reference.to_string(),
            outcome: ResolutionOutcome::Error,
            step: None,
            records: vec![ProteinRecord::placeholder(reference)],
            manual_review,
        }
    }
}

pub struct NeighborResolver<'a, K: KeggClient + ?Sized> {
    client: &'a K,
    radius: u32,
    steps: Vec<u32>,
}

impl<'a, K: KeggClient + ?Sized> NeighborResolver<'a, K> {
    pub fn new(client: &'a K, radius: u32) -> Self {
        Self::with_steps(client, radius, DEFAULT_STEP_LADDER.to_vec())
    }

    pub fn with_steps(client: &'a K, radius: u32, steps: Vec<u32>) -> Self {
        Self {
            client,
            radius,
            steps,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn expected(&self) -> usize {
        2 * self.radius as usize
    }

    /// Resolves one reference gene. Never fails: remote errors on every step
    /// turn into an `Error` outcome with a single placeholder record.
    pub fn resolve(&self, gene: &GeneId) -> Resolution {
        let reference = gene.as_str();
        let mut manual = ManualReview::new();
        if gene.has_numeric_locus() {
            manual.push(reference);
            return Resolution::failed(reference, manual);
        }

        let expected = self.expected();
        let mut best: Option<(u32, Vec<ProteinRecord>)> = None;
        let mut last_error: Option<KiraError> = None;

        for &step in &self.steps {
            let window = neighbor_window(reference, step, self.radius, &mut manual);
            if window.is_empty() {
                return Resolution::failed(reference, manual);
            }
            match self.fetch_window(gene, &window) {
                Ok(records) => {
                    let count = records.len();
                    debug!(reference, step, count, expected, "window fetched");
                    let improves = best
                        .as_ref()
                        .map(|(_, current)| count > current.len())
                        .unwrap_or(true);
                    if improves {
                        best = Some((step, records));
                    }
                    if count >= expected {
                        break;
                    }
                }
                Err(err) => {
                    warn!(reference, step, error = %err, "neighbor fetch failed");
                    last_error = Some(err);
                }
            }
        }

        let Some((step, mut records)) = best else {
            if let Some(err) = last_error {
                debug!(reference, error = %err, "all steps failed");
            }
            return Resolution::failed(reference, manual);
        };

        let outcome = classify(records.len(), self.radius);
        if records.is_empty() {
            debug!(reference, "no neighbor returned, keeping a placeholder row");
            records.push(ProteinRecord::placeholder(reference));
        }
        for record in records.iter_mut() {
            record.status = Some(outcome);
        }
        Resolution {
            reference: reference.to_string(),
            outcome,
            step: Some(step),
            records,
            manual_review: manual,
        }
    }

    fn fetch_window(
        &self,
        gene: &GeneId,
        window: &NeighborWindow,
    ) -> Result<Vec<ProteinRecord>, KiraError> {
        let fetched = fetch_entries(self.client, &window.ids())?;
        let records = fetched
            .into_iter()
            .map(|item| {
                let mut record =
                    parse_kegg_entry(&item.entry.lines, Some(gene.as_str()), gene.organism());
                record.offset = window.offset_of(&item.requested);
                record
            })
            .collect::<Vec<_>>();
        Ok(records)
    }
}

/// `Complete` iff exactly `2 * radius` neighbors were resolved.
pub fn classify(resolved: usize, radius: u32) -> ResolutionOutcome {
    if resolved == 2 * radius as usize {
        ResolutionOutcome::Complete
    } else {
        ResolutionOutcome::Incomplete
    }
}
