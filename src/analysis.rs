//! Post-processing of combined tables: domain extraction, FASTA output,
//! architecture counts and neighborhood labelling.

use std::collections::{BTreeMap, HashMap};
use std::fs;

use camino::Utf8Path;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::KiraError;
use crate::fs_util::write_atomic;
use crate::record::ProteinRecord;
use crate::table::Table;

/// Column holding group sizes in count tables.
pub const COUNT_COLUMN: &str = "Entries";

/// Keeps records carrying a domain named exactly `domain`.
pub fn filter_by_domain(records: Vec<ProteinRecord>, domain: &str) -> Vec<ProteinRecord> {
    records
        .into_iter()
        .filter(|record| record.domain_names().iter().any(|name| name == domain))
        .collect()
}

fn fasta_header(id: &str, record: &ProteinRecord) -> String {
    format!(
        ">{id} [{}] {}",
        record.organism.as_deref().unwrap_or(""),
        record.taxonomy.as_deref().unwrap_or("")
    )
}

/// Full-length sequences; records without a sequence are left out.
pub fn fasta(records: &[ProteinRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let Some(sequence) = record.sequence.as_deref().filter(|seq| !seq.is_empty()) else {
            continue;
        };
        out.push_str(&fasta_header(&record.id, record));
        out.push('\n');
        out.push_str(sequence);
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSlice {
    pub id: String,
    /// Slot label of the domain on its protein, e.g. `D2`.
    pub slot: String,
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub sequence: String,
}

/// Cuts every occurrence of `domain` out of its protein sequence. Coordinates
/// are 1-based and inclusive; hits outside the sequence are skipped.
pub fn domain_slices(records: &[ProteinRecord], domain: &str) -> Vec<DomainSlice> {
    let mut slices = Vec::new();
    for record in records {
        let Some(sequence) = record.sequence.as_deref() else {
            continue;
        };
        for (index, hit) in record.domain_hits.iter().enumerate() {
            if hit.name.as_deref() != Some(domain) {
                continue;
            }
            let (Some(start), Some(end)) = (hit.start, hit.end) else {
                continue;
            };
            let from = start.saturating_sub(1) as usize;
            let to = end as usize;
            match sequence.get(from..to).filter(|_| start >= 1 && start <= end) {
                Some(slice) => slices.push(DomainSlice {
                    id: record.id.clone(),
                    slot: format!("D{}", index + 1),
                    name: domain.to_string(),
                    start,
                    end,
                    sequence: slice.to_string(),
                }),
                None => warn!(id = %record.id, start, end, "domain outside sequence"),
            }
        }
    }
    slices
}

/// Domain slices as FASTA; ids carry the slot, e.g. `>P12345_D2`.
pub fn slice_fasta(slices: &[DomainSlice], records: &[ProteinRecord]) -> String {
    let by_id = records
        .iter()
        .map(|record| (record.id.as_str(), record))
        .collect::<HashMap<_, _>>();
    let mut out = String::new();
    for slice in slices {
        let id = format!("{}_{}", slice.id, slice.slot);
        match by_id.get(slice.id.as_str()) {
            Some(record) => out.push_str(&fasta_header(&id, record)),
            None => out.push_str(&format!(">{id} [] ")),
        }
        out.push('\n');
        out.push_str(&slice.sequence);
        out.push('\n');
    }
    out
}

pub fn slices_table(slices: &[DomainSlice]) -> Table {
    let mut table = Table::new(["ID", "Domain", "Name", "Start", "End", "Sequence"]);
    for slice in slices {
        table.push_row(vec![
            slice.id.clone(),
            slice.slot.clone(),
            slice.name.clone(),
            slice.start.to_string(),
            slice.end.to_string(),
            slice.sequence.clone(),
        ]);
    }
    table
}

/// ID, Organism, Taxonomy, Length and the domain names joined by `+`.
pub fn architecture_table(records: &[ProteinRecord]) -> Table {
    let mut table = Table::new(["ID", "Organism", "Taxonomy", "Length", "Domains"]);
    for record in records {
        table.push_row(vec![
            record.id.clone(),
            record.organism.clone().unwrap_or_default(),
            record.taxonomy.clone().unwrap_or_default(),
            record.length.map(|value| value.to_string()).unwrap_or_default(),
            record.domain_names().join("+"),
        ]);
    }
    table
}

/// Group sizes over `columns`, largest group first. Ties keep key order.
pub fn count_by(table: &Table, columns: &[&str]) -> Result<Table, KiraError> {
    let indices = columns
        .iter()
        .map(|column| {
            table.column_index(column).ok_or_else(|| KiraError::MissingColumn {
                column: column.to_string(),
                path: "count input".to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups = BTreeMap::<Vec<String>, usize>::new();
    for row in table.rows() {
        let key = indices.iter().map(|idx| row[*idx].clone()).collect();
        *groups.entry(key).or_default() += 1;
    }
    let mut counted = groups.into_iter().collect::<Vec<_>>();
    counted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out = Table::new(columns.iter().copied().chain([COUNT_COLUMN]));
    for (key, count) in counted {
        let mut row = key;
        row.push(count.to_string());
        out.push_row(row);
    }
    Ok(out)
}

pub fn write_fasta(path: &Utf8Path, text: &str) -> Result<(), KiraError> {
    write_atomic(path, text.as_bytes())
}

/// Label dictionaries for neighbor classification.
///
/// ```json
/// {
///   "ids": { "K21572": "SusD" },
///   "names": [["SusD", "SusD"], ["TonB", "SusC"]],
///   "domains": [["SusD_RagB", "SusD"]]
/// }
/// ```
///
/// `names` and `domains` are ordered; the first matching substring wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VicinityLabels {
    pub ids: HashMap<String, String>,
    pub names: Vec<(String, String)>,
    pub domains: Vec<(String, String)>,
}

impl VicinityLabels {
    pub fn load(path: &Utf8Path) -> Result<Self, KiraError> {
        let raw = fs::read_to_string(path.as_std_path())
            .map_err(|_| KiraError::ConfigRead(path.as_std_path().to_path_buf()))?;
        serde_json::from_str(&raw).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    /// KO match `<label>-ID`, then name match `<label>-N`, then domain match
    /// `<label>-D`.
    pub fn classify(&self, record: &ProteinRecord) -> Option<String> {
        if let Some(label) = record.ko_id.as_deref().and_then(|ko| self.ids.get(ko)) {
            return Some(format!("{label}-ID"));
        }
        if let Some(description) = record.description.as_deref() {
            if let Some((_, label)) = self.names.iter().find(|(name, _)| description.contains(name.as_str())) {
                return Some(format!("{label}-N"));
            }
        }
        if let Some(domains) = record.domains.as_deref() {
            if let Some((_, label)) = self.domains.iter().find(|(domain, _)| domains.contains(domain.as_str())) {
                return Some(format!("{label}-D"));
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VicinitySummary {
    pub table: Table,
    pub references: usize,
    /// References with at least one labelled neighbor.
    pub hits: usize,
}

/// One row per reference gene with a label cell for every offset in
/// `-radius..=radius` (0 excluded).
pub fn label_vicinity(records: &[ProteinRecord], radius: u32, labels: &VicinityLabels) -> VicinitySummary {
    let radius = radius as i32;
    let offsets = (-radius..=radius).filter(|offset| *offset != 0).collect::<Vec<_>>();
    let mut table = Table::new(
        std::iter::once("Ref".to_string()).chain(offsets.iter().map(|offset| offset.to_string())),
    );

    let mut order = Vec::<&str>::new();
    let mut grouped = HashMap::<&str, Vec<&ProteinRecord>>::new();
    for record in records {
        let reference = record.reference.as_deref().unwrap_or(record.id.as_str());
        grouped
            .entry(reference)
            .or_insert_with(|| {
                order.push(reference);
                Vec::new()
            })
            .push(record);
    }

    let mut hits = 0;
    for reference in &order {
        let mut row = vec![reference.to_string()];
        row.extend(std::iter::repeat_n(String::new(), offsets.len()));
        let mut hit = false;
        for record in &grouped[reference] {
            let Some(offset) = record.offset else {
                continue;
            };
            let Some(slot) = offsets.iter().position(|candidate| *candidate == offset) else {
                debug!(reference, offset, "offset outside radius");
                continue;
            };
            if let Some(label) = labels.classify(record) {
                row[slot + 1] = label;
                hit = true;
            }
        }
        if hit {
            hits += 1;
        }
        table.push_row(row);
    }

    VicinitySummary {
        table,
        references: order.len(),
        hits,
    }
}
