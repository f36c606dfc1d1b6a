use std::collections::HashMap;
use std::sync::Mutex;

use kira_gene_vicinity::domain::{GeneId, ResolutionOutcome};
use kira_gene_vicinity::error::KiraError;
use kira_gene_vicinity::kegg::KeggClient;
use kira_gene_vicinity::neighbors::NeighborResolver;

fn kegg_entry(id: &str, ko: &str) -> String {
    let (org, locus) = id.split_once(':').unwrap();
    format!(
        "ENTRY       {locus}           CDS       T00112\n\
         NAME        (GenBank) hypothetical protein\n\
         ORTHOLOGY   {ko}  uncharacterized protein\n\
         ORGANISM    {org}  Bacteroides thetaiotaomicron VPI-5482\n\
         AASEQ       10\n\
         \x20           MKTAYIAKQR\n\
         ///\n"
    )
}

#[derive(Default)]
struct MockKegg {
    genes: HashMap<String, String>,
    fail: bool,
    calls: Mutex<usize>,
}

impl MockKegg {
    fn with_loci(ids: &[&str]) -> Self {
        Self {
            genes: ids
                .iter()
                .map(|id| (id.to_string(), kegg_entry(id, "K00001")))
                .collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl KeggClient for MockKegg {
    fn get_entries(&self, ids: &[String]) -> Result<String, KiraError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(KiraError::KeggHttp("connection reset".to_string()));
        }
        Ok(ids.iter().filter_map(|id| self.genes.get(id)).cloned().collect())
    }

    fn find_genes(&self, _query: &str) -> Result<String, KiraError> {
        Ok(String::new())
    }

    fn list_organisms(&self) -> Result<String, KiraError> {
        Ok(String::new())
    }
}

fn gene(id: &str) -> GeneId {
    id.parse().unwrap()
}

#[test]
fn full_window_is_complete_on_first_step() {
    let kegg = MockKegg::with_loci(&["bth:BT_1040", "bth:BT_1041", "bth:BT_1043", "bth:BT_1044"]);
    let resolver = NeighborResolver::new(&kegg, 2);
    let resolution = resolver.resolve(&gene("bth:BT_1042"));

    assert_eq!(resolution.outcome, ResolutionOutcome::Complete);
    assert_eq!(resolution.step, Some(1));
    assert_eq!(resolution.records.len(), 4);
    assert_eq!(kegg.calls(), 1);

    let first = &resolution.records[0];
    assert_eq!(first.id, "bth:BT_1040");
    assert_eq!(first.reference.as_deref(), Some("bth:BT_1042"));
    assert_eq!(first.offset, Some(-2));
    assert_eq!(first.status, Some(ResolutionOutcome::Complete));
    assert_eq!(first.ko_id.as_deref(), Some("K00001"));
}

#[test]
fn sparse_numbering_escalates_the_step() {
    let kegg = MockKegg::with_loci(&["bth:BT_1030", "bth:BT_1035", "bth:BT_1045", "bth:BT_1050"]);
    let resolver = NeighborResolver::new(&kegg, 2);
    let resolution = resolver.resolve(&gene("bth:BT_1040"));

    assert_eq!(resolution.outcome, ResolutionOutcome::Complete);
    assert_eq!(resolution.step, Some(5));
    assert_eq!(kegg.calls(), 2);
    let offsets = resolution
        .records
        .iter()
        .map(|record| record.offset)
        .collect::<Vec<_>>();
    assert_eq!(offsets, vec![Some(-2), Some(-1), Some(1), Some(2)]);
}

#[test]
fn short_window_keeps_best_step_as_incomplete() {
    let kegg = MockKegg::with_loci(&["bth:BT_1041", "bth:BT_1043"]);
    let resolver = NeighborResolver::new(&kegg, 2);
    let resolution = resolver.resolve(&gene("bth:BT_1042"));

    assert_eq!(resolution.outcome, ResolutionOutcome::Incomplete);
    assert_eq!(resolution.step, Some(1));
    assert_eq!(resolution.records.len(), 2);
    assert_eq!(kegg.calls(), 3);
    assert!(
        resolution
            .records
            .iter()
            .all(|record| record.status == Some(ResolutionOutcome::Incomplete))
    );
}

#[test]
fn remote_failure_yields_placeholder() {
    let kegg = MockKegg {
        fail: true,
        ..MockKegg::default()
    };
    let resolver = NeighborResolver::new(&kegg, 2);
    let resolution = resolver.resolve(&gene("bth:BT_1042"));

    assert_eq!(resolution.outcome, ResolutionOutcome::Error);
    assert_eq!(resolution.step, None);
    assert_eq!(resolution.records.len(), 1);
    let placeholder = &resolution.records[0];
    assert_eq!(placeholder.id, "bth:BT_1042");
    assert_eq!(placeholder.reference.as_deref(), Some("bth:BT_1042"));
    assert_eq!(placeholder.status, Some(ResolutionOutcome::Error));
    assert!(resolution.manual_review.is_empty());
}

#[test]
fn empty_answers_keep_the_reference_as_incomplete() {
    let kegg = MockKegg::default();
    let resolver = NeighborResolver::new(&kegg, 2);
    let resolution = resolver.resolve(&gene("bth:BT_1010"));

    assert_eq!(resolution.outcome, ResolutionOutcome::Incomplete);
    assert_eq!(resolution.step, Some(1));
    assert_eq!(kegg.calls(), 3);
    assert_eq!(resolution.records.len(), 1);
    let placeholder = &resolution.records[0];
    assert_eq!(placeholder.id, "bth:BT_1010");
    assert_eq!(placeholder.reference.as_deref(), Some("bth:BT_1010"));
    assert_eq!(placeholder.status, Some(ResolutionOutcome::Incomplete));
}

#[test]
fn numeric_locus_is_not_fetched() {
    let kegg = MockKegg::default();
    let resolver = NeighborResolver::new(&kegg, 5);
    let resolution = resolver.resolve(&gene("hsa:7157"));

    assert_eq!(resolution.outcome, ResolutionOutcome::Error);
    assert!(resolution.manual_review.contains("hsa:7157"));
    assert_eq!(kegg.calls(), 0);
}

#[test]
fn custom_ladder_is_respected() {
    let kegg = MockKegg::with_loci(&["bth:BT_1020", "bth:BT_1060"]);
    let resolver = NeighborResolver::with_steps(&kegg, 1, vec![20]);
    let resolution = resolver.resolve(&gene("bth:BT_1040"));

    assert_eq!(resolution.outcome, ResolutionOutcome::Complete);
    assert_eq!(resolution.step, Some(20));
    assert_eq!(resolver.expected(), 2);
}
