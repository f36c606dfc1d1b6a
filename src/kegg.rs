use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::error::KiraError;

/// KEGG `get` accepts at most this many identifiers per call.
pub const KEGG_BATCH_LIMIT: usize = 10;

/// Line separating consecutive entries in a KEGG flat-file response.
pub const ENTRY_TERMINATOR: &str = "///";

pub trait KeggClient: Send + Sync {
    /// Raw flat-file text for up to [`KEGG_BATCH_LIMIT`] identifiers.
    fn get_entries(&self, ids: &[String]) -> Result<String, KiraError>;
    /// Raw `find/genes/<query>` listing (`id<TAB>description` lines).
    fn find_genes(&self, query: &str) -> Result<String, KiraError>;
    /// Raw `list/organism` table.
    fn list_organisms(&self) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct KeggHttpClient {
    client: Client,
    base_url: String,
}

impl KeggHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_base_url("https://rest.kegg.jp")
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gv/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::KeggHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KiraError::KeggHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
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
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "kegg retry");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, "kegg retry");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::KeggHttp(err.to_string()));
                }
            }
        }
    }

    /// 404 from KEGG means "nothing matched" and is reported as an empty body.
    fn get_text(&self, url: &str) -> Result<String, KiraError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(String::new());
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "KEGG request failed".to_string());
            return Err(KiraError::KeggStatus {
                status: status.as_u16(),
                message,
            });
        }
        response
            .text()
            .map_err(|err| KiraError::KeggHttp(err.to_string()))
    }

    pub fn get_url(&self, ids: &[String]) -> String {
        format!("{}/get/{}", self.base_url, ids.join("+"))
    }
}

impl KeggClient for KeggHttpClient {
    fn get_entries(&self, ids: &[String]) -> Result<String, KiraError> {
        if ids.is_empty() {
            return Ok(String::new());
        }
        if ids.len() > KEGG_BATCH_LIMIT {
            return Err(KiraError::KeggHttp(format!(
                "batch of {} identifiers exceeds the limit of {KEGG_BATCH_LIMIT}",
                ids.len()
            )));
        }
        self.get_text(&self.get_url(ids))
    }

    fn find_genes(&self, query: &str) -> Result<String, KiraError> {
        self.get_text(&format!("{}/find/genes/{}", self.base_url, query))
    }

    fn list_organisms(&self) -> Result<String, KiraError> {
        self.get_text(&format!("{}/list/organism", self.base_url))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// One entry of a multi-entry flat-file response, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub lines: Vec<String>,
}

impl RawEntry {
    /// Locus named on the `ENTRY` line, e.g. `b0002`.
    pub fn entry_locus(&self) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.starts_with("ENTRY"))
            .and_then(|line| line.split_whitespace().nth(1))
    }
}

/// Splits a response on `///` lines. Trailing text without a terminator is kept
/// as a final entry if it contains anything besides whitespace.
pub fn split_entries(raw: &str) -> Vec<RawEntry> {
    let mut entries = Vec::new();
    let mut current = Vec::new();
    for line in raw.lines() {
        if line.starts_with(ENTRY_TERMINATOR) {
            entries.push(RawEntry {
                lines: std::mem::take(&mut current),
            });
        } else {
            current.push(line.to_string());
        }
    }
    if current.iter().any(|line| !line.trim().is_empty()) {
        entries.push(RawEntry { lines: current });
    }
    entries
}

/// A raw entry attached to the identifier that requested it. `requested` is
/// empty for an entry the remote sent beyond the requested identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedEntry {
    pub requested: String,
    pub entry: RawEntry,
}

impl FetchedEntry {
    pub fn is_requested(&self) -> bool {
        !self.requested.is_empty()
    }
}

/// Pairs entries with requested identifiers by the locus on their `ENTRY` line.
/// Entries lacking one take the next unmatched identifier in request order.
/// Every entry is returned; leftovers come last with an empty `requested`.
pub fn pair_entries(requested: &[String], entries: Vec<RawEntry>) -> Vec<FetchedEntry> {
    let mut taken = vec![false; requested.len()];
    let mut unnamed = Vec::new();
    let mut paired = Vec::new();
    let mut leftover = Vec::new();

    for entry in entries {
        let matched = entry.entry_locus().and_then(|locus| {
            requested.iter().enumerate().position(|(idx, id)| {
                !taken[idx] && locus_of(id).eq_ignore_ascii_case(locus)
            })
        });
        match matched {
            Some(idx) => {
                taken[idx] = true;
                paired.push((idx, entry));
            }
            None => unnamed.push(entry),
        }
    }
    for entry in unnamed {
        if let Some(idx) = taken.iter().position(|flag| !flag) {
            taken[idx] = true;
            paired.push((idx, entry));
        } else {
            leftover.push(entry);
        }
    }
    if !leftover.is_empty() {
        warn!(
            count = leftover.len(),
            requested = requested.len(),
            "entries beyond the requested identifiers"
        );
    }

    paired.sort_by_key(|(idx, _)| *idx);
    paired
        .into_iter()
        .map(|(idx, entry)| FetchedEntry {
            requested: requested[idx].clone(),
            entry,
        })
        .chain(leftover.into_iter().map(|entry| FetchedEntry {
            requested: String::new(),
            entry,
        }))
        .collect()
}

fn locus_of(id: &str) -> &str {
    id.split_once(':').map(|(_, locus)| locus).unwrap_or(id)
}

/// Retrieves entries for any number of identifiers, one remote call per group
/// of [`KEGG_BATCH_LIMIT`]. A failing group fails the whole call.
pub fn fetch_entries<K: KeggClient + ?Sized>(
    client: &K,
    ids: &[String],
) -> Result<Vec<FetchedEntry>, KiraError> {
    let mut fetched = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(KEGG_BATCH_LIMIT) {
        let raw = client.get_entries(chunk)?;
        let entries = split_entries(&raw);
        debug!(requested = chunk.len(), received = entries.len(), "kegg batch");
        fetched.extend(pair_entries(chunk, entries));
    }
    Ok(fetched)
}

/// Parses `find/genes` output into gene identifiers, in listing order.
pub fn parse_gene_listing(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_terminator() {
        let raw = "ENTRY a\nNAME x\n///\nENTRY b\n///\n";
        let entries = split_entries(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].entry_locus(), Some("b"));
    }

    #[test]
    fn empty_response_has_no_entries() {
        assert!(split_entries("").is_empty());
        assert!(split_entries("\n\n").is_empty());
    }
}
