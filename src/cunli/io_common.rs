use crate::cunli::*;

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// The recall case a spreadsheet reports on, taken from its file name:
/// `表5-<label>.xlsx` becomes `<label>`.
pub fn recall_case_label(path: &Path, prefix: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = stem.trim();
    stem.strip_prefix(prefix).unwrap_or(stem).trim().to_string()
}

/// All the files matching the pattern, in sorted order.
pub fn list_input_files(pattern: &str) -> CunliResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in glob::glob(pattern).context(InvalidPatternSnafu { pattern })? {
        match entry {
            Ok(p) if p.is_file() => files.push(p),
            Ok(p) => debug!("list_input_files: skipping {:?}", p),
            Err(e) => warn!("list_input_files: cannot read {:?}", e),
        }
    }
    files.sort();
    info!("Found {} input files matching {}", files.len(), pattern);
    Ok(files)
}

pub fn write_json(path: &Path, js: &JSValue) -> CunliResult<()> {
    let p = path.display().to_string();
    let contents = serde_json::to_string_pretty(js).context(SerializingJsonSnafu { path: &p })?;
    fs::write(path, contents).context(WritingOutputSnafu { path: p })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        let p = Path::new("raw/表5-第11屆立法委員(臺北市第7選舉區)王鴻薇罷免案.xlsx");
        assert_eq!(
            recall_case_label(p, "表5-"),
            "第11屆立法委員(臺北市第7選舉區)王鴻薇罷免案"
        );
        assert_eq!(recall_case_label(Path::new("a/other.xlsx"), "表5-"), "other");
        assert_eq!(simplify_file_name(Path::new("a/b/c.xlsx")), "c.xlsx");
    }

    #[test]
    fn listing_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xlsx", "a.xlsx", "c.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("d.xlsx")).unwrap();
        let pattern = dir.path().join("*.xlsx").display().to_string();
        let files = list_input_files(&pattern).unwrap();
        let names: Vec<String> = files.iter().map(|p| simplify_file_name(p)).collect();
        assert_eq!(names, vec!["a.xlsx".to_string(), "b.xlsx".to_string()]);
        assert!(list_input_files("[").is_err());
    }
}
