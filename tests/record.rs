use std::fs;

use kira_gene_vicinity::domain::ResolutionOutcome;
use kira_gene_vicinity::kegg::split_entries;
use kira_gene_vicinity::record::{ProteinRecord, parse_kegg_entry, parse_uniprot_entry};

#[test]
fn parse_kegg_fixture_entry() {
    let raw = fs::read_to_string("tests/fixtures/kegg_bth_entries.txt").unwrap();
    let entries = split_entries(&raw);
    let record = parse_kegg_entry(&entries[0].lines, Some("bth:BT_1041"), "bth");

    assert_eq!(record.id, "bth:BT_1042");
    assert_eq!(record.reference.as_deref(), Some("bth:BT_1041"));
    assert_eq!(record.org_id.as_deref(), Some("bth"));
    assert_eq!(record.description.as_deref(), Some("SusD homolog"));
    assert_eq!(record.ko_id.as_deref(), Some("K21572"));
    assert_eq!(
        record.ko_definition.as_deref(),
        Some("starch-binding outer membrane protein, SusD/RagB family")
    );
    assert_eq!(
        record.organism.as_deref(),
        Some("Bacteroides thetaiotaomicron VPI-5482")
    );
    assert_eq!(record.domains.as_deref(), Some("SusD-like_3 SusD_RagB"));
    assert_eq!(record.domain_names(), vec!["SusD-like_3", "SusD_RagB"]);
    assert_eq!(record.ncbi.as_deref(), Some("NP_810955"));
    assert_eq!(record.uniprot.as_deref(), Some("Q8A8X3"));
    assert_eq!(record.length, Some(24));
    assert_eq!(record.sequence.as_deref(), Some("MKKIYLSAILLGSSLFFSCDDLLE"));
    assert!(!record.length_mismatch());
}

#[test]
fn nucleotide_block_is_not_read_as_protein() {
    let raw = fs::read_to_string("tests/fixtures/kegg_bth_entries.txt").unwrap();
    let entries = split_entries(&raw);
    let record = parse_kegg_entry(&entries[0].lines, None, "bth");
    assert!(!record.sequence.unwrap().contains("atg"));
}

#[test]
fn length_mismatch_keeps_record() {
    let lines = [
        "ENTRY       BT_0001           CDS       T00112",
        "AASEQ       30",
        "            MKTAYIAKQR",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect::<Vec<_>>();
    let record = parse_kegg_entry(&lines, None, "bth");
    assert_eq!(record.id, "bth:BT_0001");
    assert_eq!(record.length, Some(30));
    assert!(record.length_mismatch());
}

#[test]
fn entry_without_entry_line_keeps_org_code() {
    let lines = vec!["NAME        (RefSeq) thrL".to_string()];
    let record = parse_kegg_entry(&lines, None, "eco");
    assert_eq!(record.id, "eco");
    assert_eq!(record.description.as_deref(), Some("thrL"));
    assert_eq!(record.sequence, None);
}

#[test]
fn parse_uniprot_fixture_entry() {
    let text = fs::read_to_string("tests/fixtures/uniprot_Q8A1G2.txt").unwrap();
    let record = parse_uniprot_entry("Q8A1G2", &text);

    assert_eq!(record.id, "Q8A1G2");
    assert_eq!(record.length, Some(100));
    assert_eq!(
        record.organism.as_deref(),
        Some("Bacteroides thetaiotaomicron (strain ATCC 29148 / VPI-5482)")
    );
    assert_eq!(record.taxonomy.as_deref(), Some("Bacteria-Bacteroidota"));
    assert_eq!(record.kegg.as_deref(), Some("bth:BT_3042"));
    assert_eq!(record.domain_hits.len(), 2);
    assert_eq!(record.domain_hits[0].name.as_deref(), Some("BACON"));
    assert_eq!(record.domain_hits[0].start, Some(10));
    assert_eq!(record.domain_hits[0].end, Some(20));
    assert_eq!(record.domain_names(), vec!["BACON", "SusD_RagB"]);
    assert_eq!(record.sequence.as_ref().map(String::len), Some(100));
    assert!(!record.length_mismatch());
}

#[test]
fn placeholder_marks_error() {
    let record = ProteinRecord::placeholder("bth:BT_1042");
    assert_eq!(record.id, "bth:BT_1042");
    assert_eq!(record.reference.as_deref(), Some("bth:BT_1042"));
    assert_eq!(record.status, Some(ResolutionOutcome::Error));
    assert!(record.domain_names().is_empty());
}
