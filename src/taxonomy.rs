use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::KiraError;
use crate::kegg::KeggClient;
use crate::record::ProteinRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganismInfo {
    pub name: String,
    pub lineage: Vec<String>,
}

impl OrganismInfo {
    /// First two lineage levels, e.g. `Prokaryotes-Bacteria`.
    pub fn taxonomy(&self) -> Option<String> {
        match self.lineage.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            [first, second, ..] => Some(format!("{first}-{second}")),
        }
    }
}

/// Organism code to organism name and lineage, as listed by KEGG.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyTable {
    by_org: HashMap<String, OrganismInfo>,
}

impl TaxonomyTable {
    /// Parses `list/organism`: `T-number<TAB>code<TAB>name<TAB>lineage`.
    pub fn parse(raw: &str) -> Self {
        let mut by_org = HashMap::new();
        for line in raw.lines() {
            let fields = line.split('\t').collect::<Vec<_>>();
            if fields.len() < 4 {
                continue;
            }
            let lineage = fields[3]
                .split(';')
                .map(str::trim)
                .filter(|level| !level.is_empty())
                .map(str::to_string)
                .collect();
            by_org.insert(
                fields[1].trim().to_string(),
                OrganismInfo {
                    name: fields[2].trim().to_string(),
                    lineage,
                },
            );
        }
        Self { by_org }
    }

    pub fn get(&self, org_id: &str) -> Option<&OrganismInfo> {
        self.by_org.get(org_id)
    }

    pub fn len(&self) -> usize {
        self.by_org.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_org.is_empty()
    }

    /// Left join on the organism code. Records keep their own organism name when
    /// they already have one.
    pub fn join(&self, records: &mut [ProteinRecord]) {
        for record in records.iter_mut() {
            let Some(info) = record.org_id.as_deref().and_then(|org| self.get(org)) else {
                continue;
            };
            if record.taxonomy.is_none() {
                record.taxonomy = info.taxonomy();
            }
            if record.organism.is_none() {
                record.organism = Some(info.name.clone());
            }
        }
    }
}

/// Fetches the organism table on first use and keeps it for the rest of the run.
/// A failed fetch is remembered: later joins leave taxonomy columns empty
/// instead of asking KEGG again.
pub struct LazyTaxonomy<'a, K: KeggClient + ?Sized> {
    client: &'a K,
    table: Option<TaxonomyTable>,
    unavailable: bool,
}

impl<'a, K: KeggClient + ?Sized> LazyTaxonomy<'a, K> {
    pub fn new(client: &'a K) -> Self {
        Self {
            client,
            table: None,
            unavailable: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    pub fn get(&mut self) -> Result<&TaxonomyTable, KiraError> {
        if self.table.is_none() {
            let raw = self.client.list_organisms()?;
            let table = TaxonomyTable::parse(&raw);
            info!(organisms = table.len(), "loaded KEGG organism table");
            self.table = Some(table);
        }
        self.table
            .as_ref()
            .ok_or_else(|| KiraError::DatasetNotFound("KEGG organism table".to_string()))
    }

    /// Like [`TaxonomyTable::join`], but a remote failure only leaves the
    /// taxonomy and organism columns unset.
    pub fn join_available(&mut self, records: &mut [ProteinRecord]) {
        if self.unavailable || records.iter().all(|record| record.org_id.is_none()) {
            return;
        }
        let loaded = self.get().map(|_| ());
        if let Err(err) = loaded {
            warn!(error = %err, "KEGG organism table unavailable, taxonomy left empty");
            self.unavailable = true;
            return;
        }
        if let Some(table) = &self.table {
            table.join(records);
        }
    }
}
