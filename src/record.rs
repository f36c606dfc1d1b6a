//! Protein records and the line-prefix parsers that build them from KEGG
//! flat entries and Genome.jp UniProt pages.

use serde::Serialize;
use tracing::debug;

use crate::domain::ResolutionOutcome;

/// One annotated domain with 1-based inclusive coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainHit {
    pub name: Option<String>,
    pub start: Option<u32>,
    pub end: Option<u32>,
}

/// A gene product. Every field except `id` is optional: absent means the
/// source did not provide it, not that it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProteinRecord {
    pub id: String,
    pub reference: Option<String>,
    pub offset: Option<i32>,
    pub status: Option<ResolutionOutcome>,
    pub org_id: Option<String>,
    pub organism: Option<String>,
    pub taxonomy: Option<String>,
    pub description: Option<String>,
    pub ko_id: Option<String>,
    pub ko_definition: Option<String>,
    pub domains: Option<String>,
    pub domain_hits: Vec<DomainHit>,
    pub ncbi: Option<String>,
    pub uniprot: Option<String>,
    pub kegg: Option<String>,
    pub length: Option<u32>,
    pub sequence: Option<String>,
}

impl ProteinRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Stand-in for a reference gene whose neighbors could not be retrieved.
    pub fn placeholder(reference: &str) -> Self {
        Self {
            id: reference.to_string(),
            reference: Some(reference.to_string()),
            status: Some(ResolutionOutcome::Error),
            ..Self::default()
        }
    }

    /// Domain names in sequence order: UniProt hits sorted by start, otherwise
    /// the whitespace-separated KEGG motif list.
    pub fn domain_names(&self) -> Vec<String> {
        if !self.domain_hits.is_empty() {
            let mut hits = self.domain_hits.iter().collect::<Vec<_>>();
            hits.sort_by_key(|hit| hit.start.unwrap_or(u32::MAX));
            return hits.iter().filter_map(|hit| hit.name.clone()).collect();
        }
        self.domains
            .as_deref()
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn length_mismatch(&self) -> bool {
        match (self.length, self.sequence.as_ref()) {
            (Some(length), Some(sequence)) => sequence.chars().count() != length as usize,
            _ => false,
        }
    }
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn after_first_word(line: &str) -> Option<&str> {
    line.split_once(' ').map(|(_, rest)| rest.trim())
}

fn strip_source_tag(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with('(') {
        if let Some((_, rest)) = trimmed.split_once(") ") {
            return rest.trim().to_string();
        }
    }
    trimmed.to_string()
}

fn value_after_tag(line: &str, tag: &str) -> Option<String> {
    line.split_once(tag)
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses one KEGG `get` entry (lines between `///` separators).
///
/// `org_id` is the organism code the entry was requested under; the record id
/// becomes `org_id:ENTRY`.
pub fn parse_kegg_entry(lines: &[String], reference: Option<&str>, org_id: &str) -> ProteinRecord {
    let mut record = ProteinRecord {
        id: org_id.to_string(),
        reference: reference.map(str::to_string),
        org_id: Some(org_id.to_string()),
        ..ProteinRecord::default()
    };
    let mut entry: Option<String> = None;
    let mut sequence: Option<String> = None;

    for raw in lines {
        let line = collapse_whitespace(raw);
        if line.is_empty() {
            continue;
        }
        if let Some(seq) = sequence.as_mut() {
            if line.starts_with("NTSEQ") || line.starts_with("///") {
                break;
            }
            seq.push_str(&line.replace(' ', ""));
            continue;
        }

        if line.starts_with("ENTRY") {
            entry = line.split(' ').nth(1).map(str::to_string);
        } else if line.starts_with("NAME") {
            record.description = after_first_word(&line).map(strip_source_tag);
        } else if line.starts_with("ORTHOLOGY") {
            if let Some(rest) = after_first_word(&line) {
                let mut parts = rest.splitn(2, ' ');
                record.ko_id = parts.next().map(str::to_string);
                record.ko_definition = parts.next().map(|value| value.trim().to_string());
            }
        } else if line.starts_with("ORGANISM") || line.starts_with("VIRUS") {
            record.organism = after_first_word(&line)
                .and_then(after_first_word)
                .map(str::to_string);
        } else if line.starts_with("MOTIF") {
            record.domains = after_first_word(&line)
                .map(|value| value.replace("Pfam:", "").trim().to_string())
                .filter(|value| !value.is_empty());
        } else if line.starts_with("AASEQ") {
            record.length = after_first_word(&line).and_then(|value| value.parse().ok());
            sequence = Some(String::new());
        } else if line.contains("NCBI-ProteinID:") {
            record.ncbi = value_after_tag(&line, "NCBI-ProteinID:");
        } else if line.contains("UniProt:") {
            record.uniprot = value_after_tag(&line, "UniProt:");
        }
    }

    if let Some(entry) = entry {
        record.id = format!("{org_id}:{entry}");
    }
    record.sequence = sequence;
    if record.length_mismatch() {
        debug!(id = %record.id, length = ?record.length, "advertised length differs from sequence");
    }
    record
}

/// Parses a UniProt flat entry as served (tag-stripped) by Genome.jp `up:<id>`.
pub fn parse_uniprot_entry(id: &str, text: &str) -> ProteinRecord {
    let mut record = ProteinRecord::new(id);
    let mut lineage = Vec::<String>::new();
    let mut sequence: Option<String> = None;
    let mut open_domain: Option<usize> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(seq) = sequence.as_mut() {
            if line.starts_with("//") {
                break;
            }
            seq.push_str(&line.replace(' ', ""));
            continue;
        }

        let (code, rest) = match line.split_once(char::is_whitespace) {
            Some((code, rest)) => (code, rest.trim()),
            None => (line, ""),
        };
        match code {
            "ID" => {
                record.length = rest
                    .rsplit_once(';')
                    .and_then(|(_, tail)| tail.split_whitespace().next())
                    .and_then(|value| value.parse().ok());
            }
            "OS" => {
                record.organism = Some(rest.replace('.', "").trim().to_string());
            }
            "OC" => {
                lineage.extend(
                    rest.replace('.', "")
                        .split(';')
                        .map(str::trim)
                        .filter(|level| !level.is_empty())
                        .map(str::to_string),
                );
            }
            "DR" if rest.starts_with("KEGG;") => {
                record.kegg = rest.split(';').nth(1).map(|value| value.trim().to_string());
            }
            "FT" => {
                if rest.starts_with("DOMAIN") {
                    let (start, end) = rest
                        .split_whitespace()
                        .last()
                        .and_then(|span| span.split_once(".."))
                        .map(|(start, end)| (parse_position(start), parse_position(end)))
                        .unwrap_or((None, None));
                    record.domain_hits.push(DomainHit {
                        name: None,
                        start,
                        end,
                    });
                    open_domain = Some(record.domain_hits.len() - 1);
                } else if let Some(index) = open_domain {
                    if let Some(note) = rest.strip_prefix("/note=") {
                        record.domain_hits[index].name =
                            Some(note.trim_matches('"').to_string());
                        open_domain = None;
                    }
                }
            }
            "SQ" => {
                sequence = Some(String::new());
            }
            _ => {}
        }
    }

    if !lineage.is_empty() {
        record.taxonomy = Some(if lineage.len() >= 2 {
            format!("{}-{}", lineage[0], lineage[1])
        } else {
            lineage.join("-")
        });
    }
    record.sequence = sequence;
    if record.length_mismatch() {
        debug!(id = %record.id, length = ?record.length, "advertised length differs from sequence");
    }
    record
}

fn parse_position(value: &str) -> Option<u32> {
    value
        .trim_matches(|ch: char| !ch.is_ascii_digit())
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_source_tag() {
        assert_eq!(strip_source_tag("(GenBank) SusD family"), "SusD family");
        assert_eq!(strip_source_tag("SusD family"), "SusD family");
    }

    #[test]
    fn domain_names_follow_start_order() {
        let mut record = ProteinRecord::new("x");
        record.domain_hits = vec![
            DomainHit {
                name: Some("B".to_string()),
                start: Some(90),
                end: Some(120),
            },
            DomainHit {
                name: Some("A".to_string()),
                start: Some(5),
                end: Some(40),
            },
        ];
        assert_eq!(record.domain_names(), vec!["A", "B"]);
    }
}
