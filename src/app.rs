use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{
    VicinityLabels, architecture_table, count_by, domain_slices, fasta, filter_by_domain,
    label_vicinity, slice_fasta, slices_table, write_fasta,
};
use crate::config::RunConfig;
use crate::domain::{Database, RunInput};
use crate::error::KiraError;
use crate::fragment::{
    FragmentCoordinator, FragmentRun, KeggEntryTask, NeighborTask, NoTaxonomy, TaxonomyJoin,
    UniprotEntryTask, Workers,
};
use crate::fs_util::read_id_list;
use crate::genomejp::{GenomeJpClient, clean_hits, fetch_hit_lines};
use crate::kegg::{KeggClient, parse_gene_listing};
use crate::neighbors::NeighborResolver;
use crate::store::Store;
use crate::table::{OverwritePrompt, Table, export, list_table, read_table, right_join};
use crate::taxonomy::LazyTaxonomy;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Counts reported at the end of every fragmented job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub complete: usize,
    pub incomplete: usize,
    pub error: usize,
    pub manual_review: usize,
    pub fragments_total: usize,
    pub fragments_written: usize,
    pub fragments_skipped: usize,
}

impl RunReport {
    fn from_run(run: &FragmentRun) -> Self {
        Self {
            complete: run.tally.complete,
            incomplete: run.tally.incomplete,
            error: run.tally.error,
            manual_review: run.manual_review.len(),
            fragments_total: run.fragments_total,
            fragments_written: run.fragments_written,
            fragments_skipped: run.fragments_skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborOutput {
    pub report: RunReport,
    pub combined_path: Option<String>,
    pub manual_review_path: Option<String>,
    pub hit_list_path: Option<String>,
    /// References with at least one labelled neighbor, when labels were given.
    pub labelled_hits: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VicinityResult {
    pub generated_at: String,
    pub input: String,
    pub folder: String,
    pub identifiers: usize,
    pub list_path: Option<String>,
    pub neighbors: NeighborOutput,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractOutput {
    pub proteins: usize,
    pub domain_slices: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseResult {
    pub database: Database,
    pub input_path: Option<String>,
    pub identifiers: usize,
    pub data: Option<RunReport>,
    pub protein_path: Option<String>,
    pub neighbors: Option<NeighborOutput>,
    pub extract: Option<ExtractOutput>,
    pub notes: Vec<String>,
}

impl DatabaseResult {
    fn new(database: Database) -> Self {
        Self {
            database,
            input_path: None,
            identifiers: 0,
            data: None,
            protein_path: None,
            neighbors: None,
            extract: None,
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainResult {
    pub generated_at: String,
    pub name: String,
    pub folder: String,
    pub databases: Vec<DatabaseResult>,
}

pub struct App<K: KeggClient, G: GenomeJpClient> {
    kegg: K,
    genomejp: G,
}

impl<K: KeggClient, G: GenomeJpClient> App<K, G> {
    pub fn new(kegg: K, genomejp: G) -> Self {
        Self { kegg, genomejp }
    }

    pub fn kegg(&self) -> &K {
        &self.kegg
    }

    pub fn genomejp(&self) -> &G {
        &self.genomejp
    }

    /// Neighbor resolution for a KO id, a gene list file or explicit genes.
    pub fn vicinity(
        &self,
        input: RunInput,
        config: &RunConfig,
        prompt: &dyn OverwritePrompt,
        sink: &dyn ProgressSink,
    ) -> Result<VicinityResult, KiraError> {
        let stem = input.stem();
        let store = Store::new(
            config
                .folder
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(&stem)),
        );
        store.ensure_dirs()?;
        let options = config.export_options();

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; collecting identifiers for {stem}"),
            elapsed: None,
        });
        let mut list_path = None;
        let ids = match &input {
            RunInput::Orthology(ko) => {
                let ids = parse_gene_listing(&self.kegg.find_genes(ko.as_str())?);
                info!(ko = %ko, genes = ids.len(), "orthology genes listed");
                list_path = export(
                    &list_table("ID", &ids),
                    &store.input_stem(&format!("{stem}_List")),
                    &options,
                    prompt,
                )?
                .map(|path| path.to_string());
                ids
            }
            RunInput::File(path) => read_id_list(path)?,
            RunInput::Genes(genes) => genes.iter().map(|gene| gene.as_str().to_string()).collect(),
        };
        let ids = config.sample(ids);

        let mut taxonomy = LazyTaxonomy::new(&self.kegg);
        let neighbors =
            self.resolve_neighbors(&store, &stem, &ids, config, &mut taxonomy, prompt, sink)?;
        Ok(VicinityResult {
            generated_at: chrono::Utc::now().to_rfc3339(),
            input: stem,
            folder: store.root().to_string(),
            identifiers: ids.len(),
            list_path,
            neighbors,
        })
    }

    /// Hit list, protein data, neighbors and extraction for a domain or
    /// motif name, once per configured database.
    pub fn domain(
        &self,
        name: &str,
        config: &RunConfig,
        prompt: &dyn OverwritePrompt,
        sink: &dyn ProgressSink,
    ) -> Result<DomainResult, KiraError> {
        let store = Store::new(
            config
                .folder
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(name)),
        );
        store.ensure_dirs()?;
        let options = config.export_options();
        let mut taxonomy = LazyTaxonomy::new(&self.kegg);
        let mut databases = Vec::new();

        for &database in &config.databases {
            let file_name = format!("{name}_{database}");
            let mut result = DatabaseResult::new(database);

            let mut input_table = Table::default();
            if config.actions.needs_id_list() {
                let input_path = options.path_for(&store.input_stem(&file_name));
                let input_path = if input_path.as_std_path().exists() {
                    info!(path = %input_path, "reusing hit list");
                    Some(input_path)
                } else {
                    sink.event(ProgressEvent {
                        message: format!("phase=Fetch; {database} hits for {}:{name}", config.search_type),
                        elapsed: None,
                    });
                    let lines = fetch_hit_lines(&self.genomejp, database, &config.search_type, name)?;
                    let table = clean_hits(database, &lines);
                    if table.is_empty() {
                        None
                    } else {
                        export(&table, &store.input_stem(&file_name), &options, prompt)?
                    }
                };
                let Some(input_path) = input_path else {
                    result.notes.push("no hits".to_string());
                    databases.push(result);
                    continue;
                };
                input_table = read_table(&input_path, options.separator)?;
                result.input_path = Some(input_path.to_string());
            }

            let ids = if input_table.headers().is_empty() {
                Vec::new()
            } else {
                let column = input_table.column("ID").ok_or_else(|| KiraError::MissingColumn {
                    column: "ID".to_string(),
                    path: result.input_path.clone().unwrap_or_default(),
                })?;
                config.sample(
                    column
                        .into_iter()
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            };
            result.identifiers = ids.len();

            if !database.supports_protein_data() {
                result.notes.push("listed only".to_string());
                databases.push(result);
                continue;
            }

            if config.actions.data && !ids.is_empty() {
                let layout = store.fragment_layout(&format!("{file_name}_Protein"));
                let combined_stem = layout.combined_stem.clone();
                let coordinator = FragmentCoordinator::new(
                    layout,
                    config.fragment_size,
                    options.separator,
                    &options.extension,
                    Workers::new(config.workers)?,
                );
                let run = match database {
                    Database::Kegg => coordinator.run(
                        &ids,
                        &KeggEntryTask::new(&self.kegg),
                        &mut taxonomy,
                        sink,
                    )?,
                    _ => coordinator.run(
                        &ids,
                        &UniprotEntryTask::new(&self.genomejp),
                        &mut NoTaxonomy,
                        sink,
                    )?,
                };
                let merged = right_join(&input_table, &run.combined, "ID")?;
                result.protein_path =
                    export(&merged, &combined_stem, &options, prompt)?.map(|path| path.to_string());
                result.data = Some(RunReport::from_run(&run));
            }

            if config.actions.neighbors && database == Database::Kegg && !ids.is_empty() {
                result.neighbors = Some(self.resolve_neighbors(
                    &store,
                    &file_name,
                    &ids,
                    config,
                    &mut taxonomy,
                    prompt,
                    sink,
                )?);
            }

            if config.actions.extract {
                let protein_path =
                    options.path_for(&store.output_stem(&format!("{file_name}_Protein")));
                if protein_path.as_std_path().exists() {
                    sink.event(ProgressEvent {
                        message: format!("phase=Extract; {file_name}"),
                        elapsed: None,
                    });
                    let table = read_table(&protein_path, options.separator)?;
                    result.extract = Some(self.extract(&store, &file_name, name, &table, config, prompt)?);
                } else {
                    warn!(path = %protein_path, "no protein table to extract from");
                    result.notes.push("no protein table to extract from".to_string());
                }
            }

            databases.push(result);
        }

        Ok(DomainResult {
            generated_at: chrono::Utc::now().to_rfc3339(),
            name: name.to_string(),
            folder: store.root().to_string(),
            databases,
        })
    }

    fn resolve_neighbors(
        &self,
        store: &Store,
        stem: &str,
        ids: &[String],
        config: &RunConfig,
        taxonomy: &mut dyn TaxonomyJoin,
        prompt: &dyn OverwritePrompt,
        sink: &dyn ProgressSink,
    ) -> Result<NeighborOutput, KiraError> {
        let options = config.export_options();
        let layout = store.fragment_layout(&format!("{stem}_Neighbors"));
        let combined_stem = layout.combined_stem.clone();
        let coordinator = FragmentCoordinator::new(
            layout,
            config.fragment_size,
            options.separator,
            &options.extension,
            Workers::new(config.workers)?,
        );
        let task = NeighborTask::new(NeighborResolver::new(&self.kegg, config.radius));
        let run = coordinator.run(ids, &task, taxonomy, sink)?;
        let report = RunReport::from_run(&run);
        info!(
            complete = report.complete,
            incomplete = report.incomplete,
            error = report.error,
            manual = report.manual_review,
            "neighbors resolved"
        );

        let combined_path =
            export(&run.combined, &combined_stem, &options, prompt)?.map(|path| path.to_string());

        let manual_review_path = if run.manual_review.is_empty() {
            None
        } else {
            export(
                &list_table("ID", run.manual_review.ids()),
                &store.output_stem(&format!("{stem}_ManualReview")),
                &options,
                prompt,
            )?
            .map(|path| path.to_string())
        };

        let mut hit_list_path = None;
        let mut labelled_hits = None;
        if let Some(labels_path) = &config.labels {
            let labels = VicinityLabels::load(labels_path)?;
            let summary = label_vicinity(&run.combined.to_records(), config.radius, &labels);
            info!(hits = summary.hits, references = summary.references, "vicinity labelled");
            hit_list_path = export(
                &summary.table,
                &store.output_stem(&format!("{stem}_HitList")),
                &options,
                prompt,
            )?
            .map(|path| path.to_string());
            labelled_hits = Some(summary.hits);
        }

        Ok(NeighborOutput {
            report,
            combined_path,
            manual_review_path,
            hit_list_path,
            labelled_hits,
        })
    }

    fn extract(
        &self,
        store: &Store,
        file_name: &str,
        domain: &str,
        table: &Table,
        config: &RunConfig,
        prompt: &dyn OverwritePrompt,
    ) -> Result<ExtractOutput, KiraError> {
        let options = config.export_options();
        let base = store.output_stem(file_name);
        let by_domain = config.search_type == "pf";
        let mut records = table.to_records();
        if by_domain {
            records = filter_by_domain(records, domain);
        }
        let mut output = ExtractOutput {
            proteins: records.len(),
            ..ExtractOutput::default()
        };

        let fasta_path = Utf8PathBuf::from(format!("{base}.fasta"));
        write_fasta(&fasta_path, &fasta(&records))?;
        output.files.push(fasta_path.to_string());

        if by_domain {
            let slices = domain_slices(&records, domain);
            output.domain_slices = slices.len();
            let slice_path = Utf8PathBuf::from(format!("{base}_only.fasta"));
            write_fasta(&slice_path, &slice_fasta(&slices, &records))?;
            output.files.push(slice_path.to_string());
            if let Some(path) = export(
                &slices_table(&slices),
                &store.output_stem(&format!("{file_name}_Domain_Details")),
                &options,
                prompt,
            )? {
                output.files.push(path.to_string());
            }
        }

        let architecture = architecture_table(&records);
        let counts = [
            ("DomainArchitecture", None),
            ("CountDomains", Some(vec!["Domains"])),
            ("CountTax", Some(vec!["Taxonomy"])),
            ("CountOrganisms", Some(vec!["Taxonomy", "Organism"])),
        ];
        for (suffix, columns) in counts {
            let table = match columns {
                None => architecture.clone(),
                Some(columns) => count_by(&architecture, &columns)?,
            };
            if let Some(path) = export(
                &table,
                &store.output_stem(&format!("{file_name}_{suffix}")),
                &options,
                prompt,
            )? {
                output.files.push(path.to_string());
            }
        }
        Ok(output)
    }
}
