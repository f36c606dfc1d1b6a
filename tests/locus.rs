use assert_matches::assert_matches;

use kira_gene_vicinity::error::KiraError;
use kira_gene_vicinity::locus::{LocusTag, ManualReview, neighbor_window};

#[test]
fn underscore_suffix_sets_width() {
    let tag = LocusTag::parse("bth:BT_1042").unwrap();
    assert_eq!(tag.label(), "bth:BT_");
    assert_eq!(tag.index(), 1042);
    assert_eq!(tag.width(), 4);
    assert_eq!(tag.with_index(7), "bth:BT_0007");
}

#[test]
fn fixed_width_suffix_without_underscore() {
    let tag = LocusTag::parse("eco:b0002").unwrap();
    assert_eq!(tag.label(), "eco:b");
    assert_eq!(tag.index(), 2);
    assert_eq!(tag.with_index(10), "eco:b0010");
}

#[test]
fn non_numeric_suffix_is_rejected() {
    let err = LocusTag::parse("hsa:TP53").unwrap_err();
    assert_matches!(err, KiraError::InvalidLocusTag(_));
}

#[test]
fn window_is_ordered_and_skips_reference() {
    let mut manual = ManualReview::new();
    let window = neighbor_window("bth:BT_1042", 1, 2, &mut manual);
    assert_eq!(
        window.ids(),
        vec!["bth:BT_1040", "bth:BT_1041", "bth:BT_1043", "bth:BT_1044"]
    );
    assert_eq!(window.offset_of("bth:BT_1040"), Some(-2));
    assert_eq!(window.offset_of("BTH:bt_1044"), Some(2));
    assert_eq!(window.offset_of("bth:BT_1042"), None);
    assert!(manual.is_empty());
}

#[test]
fn step_scales_the_window() {
    let mut manual = ManualReview::new();
    let window = neighbor_window("bth:BT_1040", 5, 1, &mut manual);
    assert_eq!(window.ids(), vec!["bth:BT_1035", "bth:BT_1045"]);
    assert_eq!(window.step, 5);
}

#[test]
fn indices_below_zero_are_not_generated() {
    let mut manual = ManualReview::new();
    let window = neighbor_window("eco:b0001", 1, 3, &mut manual);
    assert_eq!(
        window.ids(),
        vec!["eco:b0000", "eco:b0002", "eco:b0003", "eco:b0004"]
    );
    assert_eq!(window.len(), 4);
}

#[test]
fn unparseable_gene_goes_to_manual_review() {
    let mut manual = ManualReview::new();
    let window = neighbor_window("hsa:TP53", 1, 5, &mut manual);
    assert!(window.is_empty());
    assert!(manual.contains("hsa:TP53"));
}

#[test]
fn manual_review_keeps_first_insertion() {
    let mut manual = ManualReview::new();
    manual.push("b");
    manual.push("a");
    manual.push("b");
    let mut other = ManualReview::new();
    other.push("a");
    other.push("c");
    manual.extend(other);
    assert_eq!(manual.ids(), &["b", "a", "c"]);
}

#[test]
fn fixed_width_window_covers_every_offset() {
    for (index, radius, step) in [(100u64, 2u32, 1u32), (500, 3, 5), (1000, 5, 10)] {
        let gene = format!("org:LOC{index:04}");
        let mut manual = ManualReview::new();
        let window = neighbor_window(&gene, step, radius, &mut manual);
        assert_eq!(window.len(), 2 * radius as usize);

        let generated = window
            .ids()
            .iter()
            .map(|id| LocusTag::parse(id).unwrap().index())
            .collect::<Vec<_>>();
        let expected = (-(radius as i64)..=radius as i64)
            .filter(|k| *k != 0)
            .map(|k| (index as i64 + k * step as i64) as u64)
            .collect::<Vec<_>>();
        assert_eq!(generated, expected);
        assert!(!window.ids().contains(&gene));
    }
}

#[test]
fn reference_loc0100_radius_two() {
    let mut manual = ManualReview::new();
    let window = neighbor_window("org:LOC0100", 1, 2, &mut manual);
    assert_eq!(
        window.ids(),
        vec!["org:LOC0098", "org:LOC0099", "org:LOC0101", "org:LOC0102"]
    );
    let offsets = window.neighbors.iter().map(|n| n.offset).collect::<Vec<_>>();
    assert_eq!(offsets, vec![-2, -1, 1, 2]);
}

#[test]
fn underscore_width_is_preserved() {
    let mut manual = ManualReview::new();
    assert_eq!(
        neighbor_window("sus:BACT_007", 1, 2, &mut manual).ids(),
        vec!["sus:BACT_005", "sus:BACT_006", "sus:BACT_008", "sus:BACT_009"]
    );
    assert_eq!(neighbor_window("org_7", 1, 1, &mut manual).ids(), vec!["org_6", "org_8"]);
}
