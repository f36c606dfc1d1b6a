//! Delimited tables: the in-memory shape every pipeline stage persists, plus
//! export/read/combine helpers over the `csv` crate.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::ResolutionOutcome;
use crate::error::KiraError;
use crate::fs_util::write_atomic;
use crate::record::{DomainHit, ProteinRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows shorter than the header are padded with empty cells.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows
            .get(row)
            .map(|row| row[idx].as_str())
            .filter(|value| !value.is_empty())
    }

    /// Appends `other`, adding its unseen columns at the end (column union).
    pub fn append(&mut self, other: Table) {
        let mapping = other
            .headers
            .iter()
            .map(|header| match self.column_index(header) {
                Some(idx) => idx,
                None => {
                    self.headers.push(header.clone());
                    for row in self.rows.iter_mut() {
                        row.push(String::new());
                    }
                    self.headers.len() - 1
                }
            })
            .collect::<Vec<_>>();
        for row in other.rows {
            let mut merged = vec![String::new(); self.headers.len()];
            for (value, idx) in row.into_iter().zip(mapping.iter()) {
                merged[*idx] = value;
            }
            self.rows.push(merged);
        }
    }

    /// Stable sort on the first column.
    pub fn sort_by_first_column(&mut self) {
        self.rows.sort_by(|a, b| a[0].cmp(&b[0]));
    }

    pub fn retain_rows<F: FnMut(&[String]) -> bool>(&mut self, mut keep: F) {
        self.rows.retain(|row| keep(row.as_slice()));
    }

    /// Removes columns without a single non-empty cell.
    pub fn drop_empty_columns(&mut self) {
        let keep = (0..self.headers.len())
            .map(|idx| self.rows.iter().any(|row| !row[idx].is_empty()))
            .collect::<Vec<_>>();
        let mut flags = keep.iter();
        self.headers.retain(|_| flags.next().copied().unwrap_or(false));
        for row in self.rows.iter_mut() {
            let mut flags = keep.iter();
            row.retain(|_| flags.next().copied().unwrap_or(false));
        }
    }

    /// Builds a table from records. A column is present only when at least one
    /// record populates it. Reference-tagged tables lead with `Ref`.
    pub fn from_records(records: &[ProteinRecord]) -> Self {
        let max_domains = records
            .iter()
            .map(|record| record.domain_hits.len())
            .max()
            .unwrap_or(0);
        let mut columns = RECORD_COLUMNS
            .iter()
            .filter(|column| records.iter().any(|record| column.value(record).is_some()))
            .map(|column| (column.name().to_string(), Some(*column), None))
            .collect::<Vec<(String, Option<RecordColumn>, Option<(usize, DomainField)>)>>();
        for index in 0..max_domains {
            for field in [DomainField::Name, DomainField::Start, DomainField::End] {
                columns.push((
                    format!("{}-D{}", field.prefix(), index + 1),
                    None,
                    Some((index, field)),
                ));
            }
        }

        let mut table = Table::new(columns.iter().map(|(name, _, _)| name.clone()));
        for record in records {
            let row = columns
                .iter()
                .map(|(_, column, domain)| match (column, domain) {
                    (Some(column), _) => column.value(record).unwrap_or_default(),
                    (None, Some((index, field))) => record
                        .domain_hits
                        .get(*index)
                        .and_then(|hit| field.value(hit))
                        .unwrap_or_default(),
                    (None, None) => String::new(),
                })
                .collect();
            table.push_row(row);
        }
        table
    }

    /// Inverse of [`Table::from_records`]; empty cells become absent fields.
    pub fn to_records(&self) -> Vec<ProteinRecord> {
        let mut domain_slots = Vec::<(usize, DomainField, usize)>::new();
        for (col, header) in self.headers.iter().enumerate() {
            for field in [DomainField::Name, DomainField::Start, DomainField::End] {
                let prefix = format!("{}-D", field.prefix());
                if let Some(number) = header.strip_prefix(&prefix) {
                    if let Ok(number) = number.parse::<usize>() {
                        if number >= 1 {
                            domain_slots.push((number - 1, field, col));
                        }
                    }
                }
            }
        }

        (0..self.rows.len())
            .map(|row| {
                let mut record = ProteinRecord::default();
                for column in RECORD_COLUMNS {
                    if let Some(value) = self.cell(row, column.name()) {
                        column.assign(&mut record, value);
                    }
                }
                for (index, field, col) in &domain_slots {
                    let value = self.rows[row][*col].as_str();
                    if value.is_empty() {
                        continue;
                    }
                    while record.domain_hits.len() <= *index {
                        record.domain_hits.push(DomainHit {
                            name: None,
                            start: None,
                            end: None,
                        });
                    }
                    field.assign(&mut record.domain_hits[*index], value);
                }
                record
                    .domain_hits
                    .retain(|hit| hit.name.is_some() || hit.start.is_some() || hit.end.is_some());
                record
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordColumn {
    Reference,
    Id,
    Offset,
    Status,
    OrgId,
    Organism,
    Taxonomy,
    KoId,
    KoDefinition,
    Description,
    Domains,
    Ncbi,
    Uniprot,
    Kegg,
    Length,
    Sequence,
}

const RECORD_COLUMNS: [RecordColumn; 16] = [
    RecordColumn::Reference,
    RecordColumn::Id,
    RecordColumn::Offset,
    RecordColumn::Status,
    RecordColumn::OrgId,
    RecordColumn::Organism,
    RecordColumn::Taxonomy,
    RecordColumn::KoId,
    RecordColumn::KoDefinition,
    RecordColumn::Description,
    RecordColumn::Domains,
    RecordColumn::Ncbi,
    RecordColumn::Uniprot,
    RecordColumn::Kegg,
    RecordColumn::Length,
    RecordColumn::Sequence,
];

impl RecordColumn {
    fn name(self) -> &'static str {
        match self {
            RecordColumn::Reference => "Ref",
            RecordColumn::Id => "ID",
            RecordColumn::Offset => "Pos",
            RecordColumn::Status => "Status",
            RecordColumn::OrgId => "orgID",
            RecordColumn::Organism => "Organism",
            RecordColumn::Taxonomy => "Taxonomy",
            RecordColumn::KoId => "KO-ID",
            RecordColumn::KoDefinition => "KO-Definition",
            RecordColumn::Description => "Description",
            RecordColumn::Domains => "Domains",
            RecordColumn::Ncbi => "NCBI",
            RecordColumn::Uniprot => "UniProt",
            RecordColumn::Kegg => "KEGG",
            RecordColumn::Length => "Length",
            RecordColumn::Sequence => "Sequence",
        }
    }

    fn value(self, record: &ProteinRecord) -> Option<String> {
        match self {
            RecordColumn::Reference => record.reference.clone(),
            RecordColumn::Id => Some(record.id.clone()),
            RecordColumn::Offset => record.offset.map(|value| value.to_string()),
            RecordColumn::Status => record.status.map(|value| value.to_string()),
            RecordColumn::OrgId => record.org_id.clone(),
            RecordColumn::Organism => record.organism.clone(),
            RecordColumn::Taxonomy => record.taxonomy.clone(),
            RecordColumn::KoId => record.ko_id.clone(),
            RecordColumn::KoDefinition => record.ko_definition.clone(),
            RecordColumn::Description => record.description.clone(),
            RecordColumn::Domains => record.domains.clone(),
            RecordColumn::Ncbi => record.ncbi.clone(),
            RecordColumn::Uniprot => record.uniprot.clone(),
            RecordColumn::Kegg => record.kegg.clone(),
            RecordColumn::Length => record.length.map(|value| value.to_string()),
            RecordColumn::Sequence => record.sequence.clone(),
        }
    }

    fn assign(self, record: &mut ProteinRecord, value: &str) {
        let text = Some(value.to_string());
        match self {
            RecordColumn::Reference => record.reference = text,
            RecordColumn::Id => record.id = value.to_string(),
            RecordColumn::Offset => record.offset = value.parse().ok(),
            RecordColumn::Status => record.status = value.parse::<ResolutionOutcome>().ok(),
            RecordColumn::OrgId => record.org_id = text,
            RecordColumn::Organism => record.organism = text,
            RecordColumn::Taxonomy => record.taxonomy = text,
            RecordColumn::KoId => record.ko_id = text,
            RecordColumn::KoDefinition => record.ko_definition = text,
            RecordColumn::Description => record.description = text,
            RecordColumn::Domains => record.domains = text,
            RecordColumn::Ncbi => record.ncbi = text,
            RecordColumn::Uniprot => record.uniprot = text,
            RecordColumn::Kegg => record.kegg = text,
            RecordColumn::Length => record.length = value.parse().ok(),
            RecordColumn::Sequence => record.sequence = text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainField {
    Name,
    Start,
    End,
}

impl DomainField {
    fn prefix(self) -> &'static str {
        match self {
            DomainField::Name => "Name",
            DomainField::Start => "Start",
            DomainField::End => "End",
        }
    }

    fn value(self, hit: &DomainHit) -> Option<String> {
        match self {
            DomainField::Name => hit.name.clone(),
            DomainField::Start => hit.start.map(|value| value.to_string()),
            DomainField::End => hit.end.map(|value| value.to_string()),
        }
    }

    fn assign(self, hit: &mut DomainHit, value: &str) {
        match self {
            DomainField::Name => hit.name = Some(value.to_string()),
            DomainField::Start => hit.start = value.parse().ok(),
            DomainField::End => hit.end = value.parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    #[default]
    Overwrite,
    Prompt,
}

/// Decides where a table goes when its target already exists.
pub trait OverwritePrompt {
    /// `Ok(path)` to write (possibly a replacement), `Ok(None)` to skip writing.
    fn resolve(&self, existing: &Utf8Path) -> Result<Option<Utf8PathBuf>, KiraError>;
}

/// Prompt used when no terminal is attached: always overwrite.
pub struct AlwaysOverwrite;

impl OverwritePrompt for AlwaysOverwrite {
    fn resolve(&self, existing: &Utf8Path) -> Result<Option<Utf8PathBuf>, KiraError> {
        Ok(Some(existing.to_path_buf()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub separator: u8,
    /// Includes the leading dot, e.g. `.csv`.
    pub extension: String,
    pub overwrite: OverwritePolicy,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            separator: b';',
            extension: ".csv".to_string(),
            overwrite: OverwritePolicy::Overwrite,
        }
    }
}

impl ExportOptions {
    pub fn path_for(&self, stem: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{stem}{}", self.extension))
    }
}

/// Writes `table` to `<stem><extension>` and returns the path written, or
/// `None` when the prompt declined.
pub fn export(
    table: &Table,
    stem: &Utf8Path,
    options: &ExportOptions,
    prompt: &dyn OverwritePrompt,
) -> Result<Option<Utf8PathBuf>, KiraError> {
    let mut path = options.path_for(stem);
    if options.overwrite == OverwritePolicy::Prompt {
        while path.as_std_path().exists() {
            match prompt.resolve(&path)? {
                Some(chosen) if chosen == path => break,
                Some(chosen) => path = chosen,
                None => return Ok(None),
            }
        }
    }
    write_table_atomic(table, &path, options.separator)?;
    info!(path = %path, rows = table.len(), "table saved");
    Ok(Some(path))
}

/// Serializes the whole table, then replaces `path` atomically.
pub fn write_table_atomic(table: &Table, path: &Utf8Path, separator: u8) -> Result<(), KiraError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(separator)
        .from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| KiraError::Table(err.to_string()))?;
    write_atomic(path, &bytes)
}

pub fn read_table(path: &Utf8Path, separator: u8) -> Result<Table, KiraError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .from_path(path.as_std_path())?;
    let headers = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

/// Numeric suffix of a fragment file name: `x_Protein_12.csv` -> 12.
pub fn fragment_number(file_name: &str, extension: &str) -> Option<usize> {
    file_name
        .strip_suffix(extension)?
        .rsplit_once('_')?
        .1
        .parse()
        .ok()
}

/// Concatenates every `*<extension>` table in `dir` (fragment order), then
/// sorts by the first column.
pub fn combine_dir(dir: &Utf8Path, separator: u8, extension: &str) -> Result<Table, KiraError> {
    let mut files = Vec::new();
    let entries =
        fs::read_dir(dir.as_std_path()).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        let Some(name) = path.file_name() else {
            continue;
        };
        if path.is_file() && name.ends_with(extension) {
            files.push((fragment_number(name, extension), name.to_string(), path.clone()));
        }
    }
    files.sort();

    let mut combined = Table::default();
    for (_, _, path) in files {
        let table = read_table(&path, separator)?;
        debug!(path = %path, rows = table.len(), "combining fragment");
        combined.append(table);
    }
    if !combined.headers.is_empty() {
        combined.sort_by_first_column();
    }
    Ok(combined)
}

/// Keeps every row of `right`, prefixed by the columns of the first `left` row
/// sharing its `key` value. Key columns must exist on both sides.
pub fn right_join(left: &Table, right: &Table, key: &str) -> Result<Table, KiraError> {
    let missing = |column: &str| KiraError::MissingColumn {
        column: column.to_string(),
        path: "joined table".to_string(),
    };
    let left_key = left.column_index(key).ok_or_else(|| missing(key))?;
    let right_key = right.column_index(key).ok_or_else(|| missing(key))?;

    let extra = right
        .headers
        .iter()
        .enumerate()
        .filter(|(_, header)| left.column_index(header).is_none())
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let mut joined = Table::new(
        left.headers
            .iter()
            .cloned()
            .chain(extra.iter().map(|idx| right.headers[*idx].clone())),
    );
    for row in &right.rows {
        let matched = left.rows.iter().find(|candidate| candidate[left_key] == row[right_key]);
        let mut merged = left
            .headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                match right.column_index(header).map(|col| row[col].as_str()) {
                    Some(value) if !value.is_empty() => value.to_string(),
                    _ => matched.map(|left_row| left_row[idx].clone()).unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();
        merged.extend(extra.iter().map(|idx| row[*idx].clone()));
        joined.push_row(merged);
    }
    Ok(joined)
}

/// Single-column table, used for identifier lists.
pub fn list_table(header: &str, values: &[String]) -> Table {
    let mut table = Table::new([header]);
    for value in values {
        table.push_row(vec![value.clone()]);
    }
    table
}
