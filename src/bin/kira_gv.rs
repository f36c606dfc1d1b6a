use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_gene_vicinity::app::App;
use kira_gene_vicinity::config::{Config, ConfigLoader, DatabaseList, RunConfig};
use kira_gene_vicinity::domain::RunInput;
use kira_gene_vicinity::error::KiraError;
use kira_gene_vicinity::genomejp::GenomeJpHttpClient;
use kira_gene_vicinity::kegg::KeggHttpClient;
use kira_gene_vicinity::output::{
    JsonOutput, OutputMode, TerminalProgress, TerminalPrompt, print_domain_summary,
    print_vicinity_summary,
};
use kira_gene_vicinity::table::{AlwaysOverwrite, OverwritePolicy};
use kira_gene_vicinity::tui::Tui;

#[derive(Parser)]
#[command(name = "kira-gv")]
#[command(about = "Gene vicinity and domain miner for KEGG and Genome.jp")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// JSON config file (default: ./kira-gv.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve genomic neighbors of genes, a gene list file or a KO id")]
    Vicinity(VicinityArgs),
    #[command(about = "Collect, download and count proteins carrying a domain or motif")]
    Domain(DomainArgs),
}

#[derive(Args, Clone, Default)]
struct CommonArgs {
    /// Entries per fragment file
    #[arg(long = "clustersize", short = 'c')]
    cluster_size: Option<usize>,

    /// Extension of generated tables, e.g. .csv or .tsv
    #[arg(long = "filetype", short = 'f')]
    file_type: Option<String>,

    /// Column separator (`\t` or `tab` for tabs)
    #[arg(long = "separator", short = 's')]
    separator: Option<String>,

    /// Ask before overwriting existing files
    #[arg(long = "askoverwrite")]
    ask_overwrite: bool,

    /// Fetch with a pool of 10 workers
    #[arg(long, short = 'm')]
    multiprocess: bool,

    /// Explicit worker count (overrides --multiprocess)
    #[arg(long)]
    workers: Option<usize>,

    /// Parent folder of Input/ and Output/
    #[arg(long)]
    folder: Option<String>,

    /// Keep only the first N identifiers
    #[arg(long = "samplesize")]
    sample_size: Option<usize>,
}

#[derive(Args)]
struct VicinityArgs {
    /// KO id (K00001), gene list file, or org:locus identifiers
    input: String,

    /// Neighbors on each side of the reference gene
    #[arg(long = "range", short = 'r')]
    range: Option<u32>,

    /// JSON label dictionaries for neighbor classification
    #[arg(long)]
    labels: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct DomainArgs {
    /// Domain or motif name, e.g. BACON_2
    name: String,

    /// Stages: a=all, i=hit list, d=protein data, n=neighbors, e=extract
    #[arg(long, short = 'a')]
    action: Option<String>,

    /// Databases separated by `;`
    #[arg(long = "dblist")]
    db_list: Option<String>,

    /// Search type prefix of the name, e.g. pf or ps
    #[arg(long = "searchtype")]
    search_type: Option<String>,

    /// Neighbors on each side for the `n` stage
    #[arg(long = "range", short = 'r')]
    range: Option<u32>,

    #[arg(long)]
    labels: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

impl CommonArgs {
    fn layer(&self) -> Config {
        Config {
            fragment_size: self.cluster_size,
            separator: self.separator.clone(),
            extension: self.file_type.clone(),
            overwrite: self.ask_overwrite.then_some(OverwritePolicy::Prompt),
            workers: self.workers,
            multiprocess: self.multiprocess.then_some(true),
            folder: self.folder.clone(),
            sample_size: self.sample_size,
            ..Config::default()
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InvalidInput(_)
        | KiraError::InvalidGeneId(_)
        | KiraError::InvalidKoId(_)
        | KiraError::InvalidAction(_)
        | KiraError::InvalidDatabase(_)
        | KiraError::InvalidSeparator(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_) => 2,
        err if err.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let file_layer = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Vicinity(args) => {
            let cli_layer = Config {
                radius: args.range,
                labels: args.labels.clone(),
                ..args.common.layer()
            };
            let config = ConfigLoader::resolve_config(file_layer.layer(cli_layer))?;
            let input = RunInput::classify(&args.input)?;
            run_vicinity(input, config, output_mode)
        }
        Commands::Domain(args) => {
            let cli_layer = Config {
                radius: args.range,
                labels: args.labels.clone(),
                action: args.action.clone(),
                databases: args.db_list.clone().map(DatabaseList::Shorthand),
                search_type: args.search_type.clone(),
                ..args.common.layer()
            };
            let config = ConfigLoader::resolve_config(file_layer.layer(cli_layer))?;
            run_domain(args.name, config, output_mode)
        }
    }
}

fn build_app() -> miette::Result<App<KeggHttpClient, GenomeJpHttpClient>> {
    let kegg = KeggHttpClient::new()?;
    let genomejp = GenomeJpHttpClient::new()?;
    Ok(App::new(kegg, genomejp))
}

fn run_vicinity(input: RunInput, config: RunConfig, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app()?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.vicinity(input, &config, &AlwaysOverwrite, &JsonOutput)?;
            JsonOutput::print_vicinity(&result).into_diagnostic()?;
        }
        OutputMode::Interactive if config.overwrite == OverwritePolicy::Prompt => {
            let result = app.vicinity(input, &config, &TerminalPrompt, &TerminalProgress)?;
            print_vicinity_summary(&result);
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(format!("vicinity {}", input.stem()));
            let result = tui.run(move |sink| app.vicinity(input, &config, &AlwaysOverwrite, sink))?;
            print_vicinity_summary(&result);
        }
    }
    Ok(())
}

fn run_domain(name: String, config: RunConfig, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app()?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.domain(&name, &config, &AlwaysOverwrite, &JsonOutput)?;
            JsonOutput::print_domain(&result).into_diagnostic()?;
        }
        OutputMode::Interactive if config.overwrite == OverwritePolicy::Prompt => {
            let result = app.domain(&name, &config, &TerminalPrompt, &TerminalProgress)?;
            print_domain_summary(&result);
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(format!("domain {name}"));
            let result = tui.run(move |sink| app.domain(&name, &config, &AlwaysOverwrite, sink))?;
            print_domain_summary(&result);
        }
    }
    Ok(())
}
