use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_gene_vicinity::domain::{
    ActionSet, Database, GeneId, KoId, ResolutionOutcome, RunInput, parse_database_list,
};
use kira_gene_vicinity::error::KiraError;

#[test]
fn parse_gene_id_valid() {
    let gene: GeneId = " bth:BT_1042 ".parse().unwrap();
    assert_eq!(gene.as_str(), "bth:BT_1042");
    assert_eq!(gene.organism(), "bth");
    assert_eq!(gene.locus(), "BT_1042");
}

#[test]
fn parse_gene_id_invalid() {
    for value in ["BT_1042", "bth:", ":BT_1042", "b-th:BT_1042", "bth:BT 1042"] {
        let err = value.parse::<GeneId>().unwrap_err();
        assert_matches!(err, KiraError::InvalidGeneId(_));
    }
}

#[test]
fn parse_ko_id() {
    let ko: KoId = "K21572".parse().unwrap();
    assert_eq!(ko.to_string(), "K21572");
    let err = "k21572".parse::<KoId>().unwrap_err();
    assert_matches!(err, KiraError::InvalidKoId(_));
}

#[test]
fn classify_orthology() {
    let input = RunInput::classify("K21572").unwrap();
    assert_matches!(input, RunInput::Orthology(_));
    assert_eq!(input.stem(), "K21572");
}

#[test]
fn classify_gene_list_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("sus_genes.txt")).unwrap();
    fs::write(&path, "bth:BT_1042\n").unwrap();

    let input = RunInput::classify(path.as_str()).unwrap();
    assert_eq!(input, RunInput::File(path));
    assert_eq!(input.stem(), "sus_genes");
}

#[test]
fn classify_explicit_genes() {
    let input = RunInput::classify("bth:BT_1042, bth:BT_3042").unwrap();
    let RunInput::Genes(genes) = &input else {
        panic!("expected genes");
    };
    assert_eq!(genes.len(), 2);
    assert_eq!(input.stem(), "genes");

    let single = RunInput::classify("bth:BT_1042").unwrap();
    assert_eq!(single.stem(), "bth_BT_1042");
}

#[test]
fn classify_rejects_unknown_input() {
    let err = RunInput::classify("not-a-gene").unwrap_err();
    assert_matches!(err, KiraError::InvalidInput(_));
}

#[test]
fn database_names() {
    assert_eq!("UniProt".parse::<Database>().unwrap(), Database::Uniprot);
    assert_eq!("Swiss-Prot".parse::<Database>().unwrap(), Database::Swissprot);
    assert_eq!("genes".parse::<Database>().unwrap(), Database::Kegg);
    assert_eq!(Database::Kegg.linkdb_name(), "genes");
    assert!(!Database::Pdb.supports_protein_data());
    assert_matches!("refseq".parse::<Database>(), Err(KiraError::InvalidDatabase(_)));
}

#[test]
fn database_list_dedups() {
    let list = parse_database_list("KEGG;uniprot,kegg;").unwrap();
    assert_eq!(list, vec![Database::Kegg, Database::Uniprot]);
    assert_matches!(parse_database_list(" ; "), Err(KiraError::InvalidDatabase(_)));
}

#[test]
fn action_letters() {
    let actions: ActionSet = "in".parse().unwrap();
    assert!(actions.ids && actions.neighbors);
    assert!(!actions.data && !actions.extract);
    assert!(actions.needs_id_list());

    let extract_only: ActionSet = "e".parse().unwrap();
    assert!(!extract_only.needs_id_list());

    assert_matches!("".parse::<ActionSet>(), Err(KiraError::InvalidAction(_)));
    assert_matches!("m".parse::<ActionSet>(), Err(KiraError::InvalidAction(_)));
}

#[test]
fn outcome_tags() {
    assert_eq!(ResolutionOutcome::Incomplete.to_string(), "incomplete");
    assert_eq!(
        "error".parse::<ResolutionOutcome>().unwrap(),
        ResolutionOutcome::Error
    );
}
