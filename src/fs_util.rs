use std::fs;
use std::io::Write;

use camino::Utf8Path;

use crate::error::KiraError;

/// Writes through a temp file in the target directory, then renames over `path`.
/// Readers never observe a half-written file.
pub fn write_atomic(path: &Utf8Path, contents: &[u8]) -> Result<(), KiraError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".kira-gv")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.write_all(contents)
        .map_err(|err| KiraError::Filesystem(format!("write {path}: {err}")))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

/// One identifier per line. Blank lines and an `ID` header line are skipped;
/// only the first delimited field of each line is used.
pub fn read_id_list(path: &Utf8Path) -> Result<Vec<String>, KiraError> {
    let text = fs::read_to_string(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))?;
    Ok(text
        .lines()
        .filter_map(|line| {
            line.split([';', ',', '\t'])
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty() && *value != "ID")
                .map(str::to_string)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("ids.txt")).unwrap();
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn id_list_skips_header_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("ids.csv")).unwrap();
        fs::write(&path, "ID;Description\neco:b0002;thrA\n\nbth:BT_1042;SusD\n").unwrap();
        assert_eq!(read_id_list(&path).unwrap(), vec!["eco:b0002", "bth:BT_1042"]);
    }
}
