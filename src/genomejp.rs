//! Genome.jp DBGET access: `get_linkdb` hit lists for a domain or motif, and
//! UniProt flat entries served under `entry/up:<id>`.

use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::domain::Database;
use crate::error::KiraError;
use crate::table::Table;

/// `get_linkdb` lists this many hits per page.
pub const LINKDB_PAGE_SIZE: usize = 1000;

pub trait GenomeJpClient: Send + Sync {
    /// Raw HTML of one `get_linkdb` page; `page` is 1-based.
    fn linkdb_page(
        &self,
        database: Database,
        search_type: &str,
        name: &str,
        page: usize,
    ) -> Result<String, KiraError>;
    /// Tag-stripped UniProt flat entry.
    fn uniprot_entry(&self, id: &str) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct GenomeJpHttpClient {
    client: Client,
    base_url: String,
}

impl GenomeJpHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_base_url("https://www.genome.jp")
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gv/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::GenomeJpHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| KiraError::GenomeJpHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn linkdb_url(&self, database: Database, search_type: &str, name: &str, page: usize) -> String {
        let db = database.linkdb_name();
        if page <= 1 {
            format!("{}/dbget-bin/get_linkdb?-t+{db}+{search_type}:{name}", self.base_url)
        } else {
            format!(
                "{}/dbget-bin/get_linkdb?-t+{db}+-p+{page}+{search_type}:{name}",
                self.base_url
            )
        }
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, KiraError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && matches!(status, 429 | 500 | 502 | 503 | 504) {
                        debug!(status, attempt, "genome.jp retry");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES
                        && (err.is_timeout() || err.is_connect() || err.is_request())
                    {
                        debug!(error = %err, attempt, "genome.jp retry");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::GenomeJpHttp(err.to_string()));
                }
            }
        }
    }

    fn get_text(&self, url: &str) -> Result<String, KiraError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Genome.jp request failed".to_string());
            return Err(KiraError::GenomeJpStatus {
                status: status.as_u16(),
                message,
            });
        }
        response
            .text()
            .map_err(|err| KiraError::GenomeJpHttp(err.to_string()))
    }
}

impl GenomeJpClient for GenomeJpHttpClient {
    fn linkdb_page(
        &self,
        database: Database,
        search_type: &str,
        name: &str,
        page: usize,
    ) -> Result<String, KiraError> {
        self.get_text(&self.linkdb_url(database, search_type, name, page))
    }

    fn uniprot_entry(&self, id: &str) -> Result<String, KiraError> {
        let html = self.get_text(&format!("{}/entry/up:{id}", self.base_url))?;
        Ok(strip_tags(&html))
    }
}

/// Removes HTML tags line by line; line structure is kept.
pub fn strip_tags(html: &str) -> String {
    let Ok(re) = Regex::new(r"<[^>]*>") else {
        return html.to_string();
    };
    html.lines()
        .map(|line| re.replace_all(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPage {
    /// Number of pages advertised by the `Hits:` line; 0 when absent.
    pub pages: usize,
    pub lines: Vec<String>,
}

/// Extracts hit lines from a `get_linkdb` page: everything between the dashed
/// separator and the `DBGET integrated` footer.
pub fn parse_link_page(html: &str) -> LinkPage {
    let text = strip_tags(html);
    let mut page = LinkPage::default();
    let mut in_list = false;
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if in_list {
            if line.starts_with("DBGET integrated") {
                break;
            }
            page.lines.push(line.to_string());
        } else if line.starts_with("Hits:") {
            let hits = line
                .split_whitespace()
                .nth(1)
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(0);
            page.pages = hits.div_ceil(LINKDB_PAGE_SIZE);
        } else if line.starts_with("----------") {
            in_list = true;
        }
    }
    page
}

/// Downloads every page of the hit list for `<search_type>:<name>`.
pub fn fetch_hit_lines<G: GenomeJpClient + ?Sized>(
    client: &G,
    database: Database,
    search_type: &str,
    name: &str,
) -> Result<Vec<String>, KiraError> {
    let first = parse_link_page(&client.linkdb_page(database, search_type, name, 1)?);
    let pages = first.pages.max(1);
    let mut lines = first.lines;
    for page in 2..=pages {
        let next = parse_link_page(&client.linkdb_page(database, search_type, name, page)?);
        debug!(%database, page, hits = next.lines.len(), "linkdb page");
        lines.extend(next.lines);
    }
    info!(%database, name, pages, hits = lines.len(), "hit list downloaded");
    Ok(lines)
}

/// Turns raw hit lines into the per-database input table.
pub fn clean_hits(database: Database, lines: &[String]) -> Table {
    match database {
        Database::Kegg => clean_kegg_hits(lines),
        Database::Uniprot | Database::Swissprot => clean_uniprot_hits(lines),
        Database::Pdb => clean_pdb_hits(lines),
    }
}

/// `eco:b0002 K12524 thrA; ... [EC:2.7.2.4 1.1.1.3]` into ID, KO ID, #EC,
/// Description. `no KO assigned | (GenBank) name` keeps only the description.
pub fn clean_kegg_hits(lines: &[String]) -> Table {
    let mut table = Table::new(["ID", "KO ID", "#EC", "Description"]);
    for line in lines {
        let Some((id, rest)) = line.trim().split_once(' ') else {
            continue;
        };
        let rest = rest.trim();
        let mut ko = String::new();
        let mut ec = String::new();
        let description;
        if rest.contains("no KO assigned") {
            description = rest
                .split('|')
                .nth(1)
                .and_then(|part| part.split_once(") ").map(|(_, name)| name))
                .unwrap_or("")
                .trim()
                .to_string();
        } else {
            let mut text = rest.split('|').next().unwrap_or("").trim();
            if let Some((head, tail)) = text.rsplit_once(" [EC:") {
                ec = tail.replace(']', "").trim().to_string();
                text = head;
            }
            match text.trim().split_once(' ') {
                Some((ko_id, name)) => {
                    ko = ko_id.to_string();
                    description = name.trim().to_string();
                }
                None => description = text.trim().to_string(),
            }
        }
        table.push_row(vec![id.to_string(), ko, ec, description]);
    }
    table
}

/// `A0A0H3 Full=SusD family protein {ECO:0000313|EMBL:AAO75726.1}` into ID,
/// Description and one column per cross-reference type. Lines without a
/// `Full=` name are dropped.
pub fn clean_uniprot_hits(lines: &[String]) -> Table {
    let mut table = Table::new(["ID", "Description"]);
    for line in lines {
        let Some((id, rest)) = line.trim().split_once(' ') else {
            continue;
        };
        let Some((_, named)) = rest.trim().split_once("Full=") else {
            continue;
        };
        let Some((description, refs)) = named.split_once(" {") else {
            continue;
        };
        let mut headers = vec!["ID".to_string(), "Description".to_string()];
        let mut cells = vec![id.to_string(), description.trim().to_string()];
        let refs = refs.split(',').next().unwrap_or("");
        let refs = refs.split('}').next().unwrap_or("");
        for reference in refs.split('|') {
            let reference = reference.trim();
            if reference.len() <= 10 {
                continue;
            }
            if let Some((kind, value)) = reference.split_once(':') {
                if headers.iter().any(|header| header == kind) {
                    continue;
                }
                headers.push(kind.to_string());
                cells.push(value.to_string());
            }
        }
        let mut row = Table::new(headers);
        row.push_row(cells);
        table.append(row);
    }
    table
}

pub fn clean_pdb_hits(lines: &[String]) -> Table {
    let mut table = Table::new(["ID", "Description"]);
    for line in lines {
        if let Some((id, description)) = line.trim().split_once(' ') {
            table.push_row(vec![id.to_string(), description.trim().to_string()]);
        }
    }
    table
}
