use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::error::KiraError;

/// On-disk layout of one run:
///
/// ```text
/// <root>/Input/<stem><ext>
/// <root>/Output/<stem><ext>
/// <root>/Output/<stem>Fragments/<stem>_<N><ext>
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn input_dir(&self) -> Utf8PathBuf {
        self.root.join("Input")
    }

    pub fn output_dir(&self) -> Utf8PathBuf {
        self.root.join("Output")
    }

    pub fn input_stem(&self, name: &str) -> Utf8PathBuf {
        self.input_dir().join(name)
    }

    pub fn output_stem(&self, name: &str) -> Utf8PathBuf {
        self.output_dir().join(name)
    }

    pub fn fragment_layout(&self, name: &str) -> FragmentLayout {
        FragmentLayout {
            dir: self.output_dir().join(format!("{name}Fragments")),
            stem: name.to_string(),
            combined_stem: self.output_stem(name),
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), KiraError> {
        for dir in [self.input_dir(), self.output_dir()] {
            ensure_dir(&dir)?;
        }
        Ok(())
    }
}

/// Where the fragments of one fragmented job live and where they combine to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentLayout {
    pub dir: Utf8PathBuf,
    pub stem: String,
    pub combined_stem: Utf8PathBuf,
}

impl FragmentLayout {
    /// Path of fragment `number` (1-based).
    pub fn fragment_path(&self, number: usize, extension: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}_{number}{extension}", self.stem))
    }
}

pub fn ensure_dir(dir: &Utf8Path) -> Result<(), KiraError> {
    if dir.as_std_path().exists() {
        return Ok(());
    }
    fs::create_dir_all(dir.as_std_path()).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    info!(path = %dir, "created folder");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new("BACON_2");
        let layout = store.fragment_layout("BACON_2_kegg_Protein");
        assert!(layout.dir.ends_with("Output/BACON_2_kegg_ProteinFragments"));
        assert!(
            layout
                .fragment_path(3, ".csv")
                .ends_with("BACON_2_kegg_ProteinFragments/BACON_2_kegg_Protein_3.csv")
        );
        assert!(layout.combined_stem.ends_with("Output/BACON_2_kegg_Protein"));
    }
}
