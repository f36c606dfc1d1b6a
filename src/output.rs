use std::io::{self, BufRead, Write};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Stylize;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use serde::Serialize;

use crate::app::{DomainResult, NeighborOutput, ProgressEvent, ProgressSink, RunReport, VicinityResult};
use crate::error::KiraError;
use crate::table::OverwritePrompt;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_vicinity(result: &VicinityResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_domain(result: &DomainResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Line-per-event progress on stderr, used when the full-screen view is off.
pub struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        let message = event.message.trim();
        let message = message
            .split_once(';')
            .filter(|(prefix, _)| prefix.starts_with("phase="))
            .map(|(prefix, rest)| format!("{:<8} {}", prefix.trim_start_matches("phase="), rest.trim()))
            .unwrap_or_else(|| message.to_string());
        match event.elapsed {
            Some(elapsed) => eprintln!("{message} ({:.1}s)", elapsed.as_secs_f64()),
            None => eprintln!("{message}"),
        }
    }
}

pub fn print_vicinity_summary(result: &VicinityResult) {
    println!("{} {}", "Vicinity".cyan().bold(), result.input);
    println!("  folder       {}", result.folder);
    println!("  identifiers  {}", result.identifiers);
    if let Some(path) = &result.list_path {
        println!("  id list      {path}");
    }
    print_neighbor_output(&result.neighbors, "  ");
}

pub fn print_domain_summary(result: &DomainResult) {
    println!("{} {}", "Domain".cyan().bold(), result.name);
    println!("  folder  {}", result.folder);
    for db in &result.databases {
        println!("  {} ({} ids)", db.database.to_string().bold(), db.identifiers);
        if let Some(path) = &db.input_path {
            println!("    hit list     {path}");
        }
        if let Some(report) = &db.data {
            print_report(report, "    ");
        }
        if let Some(path) = &db.protein_path {
            println!("    proteins     {path}");
        }
        if let Some(neighbors) = &db.neighbors {
            println!("    neighbors");
            print_neighbor_output(neighbors, "      ");
        }
        if let Some(extract) = &db.extract {
            println!(
                "    extracted    {} proteins, {} domain slices",
                extract.proteins, extract.domain_slices
            );
            for file in &extract.files {
                println!("      {file}");
            }
        }
        for note in &db.notes {
            println!("    {}", note.as_str().dark_grey());
        }
    }
}

fn print_neighbor_output(output: &NeighborOutput, indent: &str) {
    print_report(&output.report, indent);
    if let Some(path) = &output.combined_path {
        println!("{indent}combined     {path}");
    }
    if let Some(path) = &output.manual_review_path {
        println!("{indent}manual       {}", path.as_str().yellow());
    }
    if let (Some(path), Some(hits)) = (&output.hit_list_path, output.labelled_hits) {
        println!("{indent}hit list     {path} ({hits} with labelled neighbors)");
    }
}

fn print_report(report: &RunReport, indent: &str) {
    println!(
        "{indent}complete {}  incomplete {}  error {}  manual review {}",
        report.complete.to_string().green(),
        report.incomplete.to_string().yellow(),
        report.error.to_string().red(),
        report.manual_review
    );
    println!(
        "{indent}fragments {} written, {} skipped of {}",
        report.fragments_written, report.fragments_skipped, report.fragments_total
    );
}

/// Asks on the terminal before replacing an existing file: `y` overwrites,
/// `n` asks for a different file name.
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_yes_no(&self) -> Result<bool, KiraError> {
        let io_err = |err: io::Error| KiraError::Filesystem(err.to_string());
        enable_raw_mode().map_err(io_err)?;
        let answer = loop {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => break Err(io_err(err)),
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => break Ok(true),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => break Ok(false),
                    _ => {}
                },
                Ok(_) => {}
                Err(err) => break Err(io_err(err)),
            }
        };
        disable_raw_mode().map_err(io_err)?;
        answer
    }
}

impl OverwritePrompt for TerminalPrompt {
    fn resolve(&self, existing: &Utf8Path) -> Result<Option<Utf8PathBuf>, KiraError> {
        eprint!("File {existing} already exists, replace it? (y/n) ");
        io::stderr().flush().ok();
        let replace = self.read_yes_no()?;
        eprintln!("{}", if replace { "y" } else { "n" });
        if replace {
            return Ok(Some(existing.to_path_buf()));
        }

        eprint!("Enter a new file name (empty to skip): ");
        io::stderr().flush().ok();
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let name = line.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let candidate = Utf8PathBuf::from(name);
        if candidate.is_absolute() || candidate.parent().is_some_and(|p| !p.as_str().is_empty()) {
            return Ok(Some(candidate));
        }
        // A bare name stays next to the original file.
        let parent = existing.parent().unwrap_or(Utf8Path::new("."));
        Ok(Some(parent.join(candidate)))
    }
}
