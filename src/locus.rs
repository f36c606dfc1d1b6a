//! Locus-tag arithmetic: derives the identifiers of genes adjacent to a
//! reference gene from the numeric suffix of its locus tag.

use serde::Serialize;
use tracing::debug;

use crate::error::KiraError;

/// Width of the numeric suffix assumed for locus tags without an underscore.
pub const DEFAULT_SUFFIX_WIDTH: usize = 4;

/// A locus tag split into its label, numeric index and zero-pad width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusTag {
    label: String,
    index: u64,
    width: usize,
}

impl LocusTag {
    pub fn parse(id: &str) -> Result<Self, KiraError> {
        Self::parse_with_width(id, DEFAULT_SUFFIX_WIDTH)
    }

    /// `abc_007` splits at the last underscore (label `abc_`, width 3); any
    /// other identifier uses its last `fixed_width` characters as the index.
    pub fn parse_with_width(id: &str, fixed_width: usize) -> Result<Self, KiraError> {
        if let Some((head, suffix)) = id.rsplit_once('_') {
            if is_digits(suffix) {
                let index = suffix
                    .parse::<u64>()
                    .map_err(|_| KiraError::InvalidLocusTag(id.to_string()))?;
                return Ok(Self {
                    label: format!("{head}_"),
                    index,
                    width: suffix.len(),
                });
            }
        }

        let chars = id.chars().collect::<Vec<_>>();
        if fixed_width == 0 || chars.len() <= fixed_width {
            return Err(KiraError::InvalidLocusTag(id.to_string()));
        }
        let split = chars.len() - fixed_width;
        let suffix = chars[split..].iter().collect::<String>();
        if !is_digits(&suffix) {
            return Err(KiraError::InvalidLocusTag(id.to_string()));
        }
        let index = suffix
            .parse::<u64>()
            .map_err(|_| KiraError::InvalidLocusTag(id.to_string()))?;
        Ok(Self {
            label: chars[..split].iter().collect(),
            index,
            width: fixed_width,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn with_index(&self, index: u64) -> String {
        format!("{}{:0width$}", self.label, index, width = self.width)
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbor {
    pub id: String,
    pub offset: i32,
}

/// Candidate neighbors of one reference gene, ordered from `-radius` to `+radius`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborWindow {
    pub reference: String,
    pub step: u32,
    pub radius: u32,
    pub neighbors: Vec<Neighbor>,
}

impl NeighborWindow {
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.neighbors.iter().map(|n| n.id.clone()).collect()
    }

    pub fn offset_of(&self, id: &str) -> Option<i32> {
        self.neighbors
            .iter()
            .find(|n| n.id.eq_ignore_ascii_case(id))
            .map(|n| n.offset)
    }
}

/// Identifiers that need a human look; insertion-ordered, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManualReview {
    ids: Vec<String>,
}

impl ManualReview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn extend(&mut self, other: ManualReview) {
        for id in other.ids {
            self.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|item| item == id)
    }
}

/// Builds the window `index + k*step` for `k` in `-radius..=radius`, `k != 0`.
///
/// An identifier without a parseable suffix is pushed to `manual` and yields an
/// empty window. Indices that would fall below zero are not generated.
pub fn neighbor_window(
    gene: &str,
    step: u32,
    radius: u32,
    manual: &mut ManualReview,
) -> NeighborWindow {
    let mut window = NeighborWindow {
        reference: gene.to_string(),
        step,
        radius,
        neighbors: Vec::new(),
    };
    let tag = match LocusTag::parse(gene) {
        Ok(tag) => tag,
        Err(err) => {
            debug!(gene, error = %err, "routing to manual review");
            manual.push(gene);
            return window;
        }
    };

    let radius = i64::from(radius);
    let step = i64::from(step);
    let Ok(reference) = i64::try_from(tag.index()) else {
        manual.push(gene);
        return window;
    };
    for k in -radius..=radius {
        if k == 0 {
            continue;
        }
        let Some(index) = reference.checked_add(k * step) else {
            continue;
        };
        if index < 0 {
            continue;
        }
        window.neighbors.push(Neighbor {
            id: tag.with_index(index as u64),
            offset: k as i32,
        });
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_parse() {
        let tag = LocusTag::parse("org:LOC0100").unwrap();
        assert_eq!(tag.label(), "org:LOC0");
        assert_eq!(tag.index(), 100);
        assert_eq!(tag.width(), 4);
    }

    #[test]
    fn underscore_keeps_width() {
        let tag = LocusTag::parse("sus:BACT_007").unwrap();
        assert_eq!(tag.label(), "sus:BACT_");
        assert_eq!(tag.with_index(3), "sus:BACT_003");
    }

    #[test]
    fn short_identifier_is_rejected() {
        assert!(LocusTag::parse("a12").is_err());
    }
}
