use crate::cunli::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

pub const DEFAULT_INPUT_PATTERN: &str = "raw/*.xlsx";
pub const DEFAULT_REFERENCE_PATH: &str = "taiwan_basecode/cunli/geo/20250620.json";
pub const DEFAULT_OVERRIDES_PATH: &str = "missing_villcode_mapping.json";
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "docs/cunli_json";
pub const DEFAULT_FILE_LABEL_PREFIX: &str = "表5-";
pub const DEFAULT_HEADER_LABEL: &str = "行政區別";
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 10;
pub const DEFAULT_DATA_ROW_OFFSET: usize = 5;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CunliConfig {
    #[serde(rename = "inputPattern")]
    pub input_pattern: Option<String>,
    #[serde(rename = "referencePath")]
    pub reference_path: Option<String>,
    #[serde(rename = "overridesPath")]
    pub overrides_path: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "headerScanRows")]
    _header_scan_rows: Option<JSValue>,
    #[serde(rename = "headerLabels")]
    pub header_labels: Option<Vec<String>>,
    #[serde(rename = "dataRowOffset")]
    _data_row_offset: Option<JSValue>,
    #[serde(rename = "fileLabelPrefix")]
    pub file_label_prefix: Option<String>,
    pub corrections: Option<Vec<CorrectionConfig>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    pub villcode: String,
    pub kind: String,
    pub note: Option<String>,
}

impl CorrectionConfig {
    pub fn correction(&self) -> CunliResult<VoteCorrection> {
        let kind = match self.kind.as_str() {
            "swapAgreeDisagree" => CorrectionKind::SwapAgreeDisagree,
            x => return UnknownCorrectionSnafu { kind: x }.fail(),
        };
        Ok(VoteCorrection {
            villcode: self.villcode.trim().to_string(),
            kind,
        })
    }
}

/// How the spreadsheets are laid out.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetSettings {
    pub header_scan_rows: usize,
    pub header_labels: Vec<String>,
    pub data_row_offset: usize,
    pub file_label_prefix: String,
}

impl Default for SheetSettings {
    fn default() -> Self {
        SheetSettings {
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            header_labels: vec![DEFAULT_HEADER_LABEL.to_string()],
            data_row_offset: DEFAULT_DATA_ROW_OFFSET,
            file_label_prefix: DEFAULT_FILE_LABEL_PREFIX.to_string(),
        }
    }
}

/// The validated settings of a run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub input_pattern: String,
    pub reference_path: PathBuf,
    pub overrides_path: PathBuf,
    pub output_directory: PathBuf,
    pub sheet: SheetSettings,
    pub corrections: Vec<VoteCorrection>,
}

/// The corrections applied when the configuration does not list any.
pub fn default_corrections() -> Vec<VoteCorrection> {
    // 新北市永和區光復里: agree and disagree votes published swapped.
    vec![VoteCorrection {
        villcode: "65000040036".to_string(),
        kind: CorrectionKind::SwapAgreeDisagree,
    }]
}

impl CunliConfig {
    pub fn header_scan_rows(&self) -> CunliResult<usize> {
        match self._header_scan_rows {
            None => Ok(DEFAULT_HEADER_SCAN_ROWS),
            Some(_) => read_js_int(&self._header_scan_rows, "headerScanRows"),
        }
    }

    pub fn data_row_offset(&self) -> CunliResult<usize> {
        match self._data_row_offset {
            None => Ok(DEFAULT_DATA_ROW_OFFSET),
            Some(_) => read_js_int(&self._data_row_offset, "dataRowOffset"),
        }
    }

    /// Resolves the configuration against the directory it was read from.
    pub fn settings(&self, root: &Path) -> CunliResult<RunSettings> {
        let join = |p: &Option<String>, default: &str| -> PathBuf {
            root.join(p.clone().unwrap_or_else(|| default.to_string()))
        };
        let pattern = join(&self.input_pattern, DEFAULT_INPUT_PATTERN)
            .display()
            .to_string();

        let corrections = match &self.corrections {
            None => default_corrections(),
            Some(cs) => cs
                .iter()
                .map(|c| c.correction())
                .collect::<CunliResult<Vec<VoteCorrection>>>()?,
        };

        let header_labels = match &self.header_labels {
            Some(labels) if !labels.is_empty() => labels.clone(),
            _ => vec![DEFAULT_HEADER_LABEL.to_string()],
        };

        Ok(RunSettings {
            input_pattern: pattern,
            reference_path: join(&self.reference_path, DEFAULT_REFERENCE_PATH),
            overrides_path: join(&self.overrides_path, DEFAULT_OVERRIDES_PATH),
            output_directory: join(&self.output_directory, DEFAULT_OUTPUT_DIRECTORY),
            sheet: SheetSettings {
                header_scan_rows: self.header_scan_rows()?,
                header_labels,
                data_row_offset: self.data_row_offset()?,
                file_label_prefix: self
                    .file_label_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FILE_LABEL_PREFIX.to_string()),
            },
            corrections,
        })
    }
}

pub fn read_config(path: &str) -> CunliResult<CunliConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: CunliConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

fn read_js_int(x: &Option<JSValue>, field: &str) -> CunliResult<usize> {
    let res = match x {
        Some(JSValue::Number(n)) => n.as_u64().map(|x| x as usize),
        Some(JSValue::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    res.context(ParsingJsonNumberSnafu { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = CunliConfig::default().settings(Path::new("/data")).unwrap();
        assert_eq!(s.input_pattern, "/data/raw/*.xlsx");
        assert_eq!(s.output_directory, PathBuf::from("/data/docs/cunli_json"));
        assert_eq!(s.overrides_path, PathBuf::from("/data/missing_villcode_mapping.json"));
        assert_eq!(s.sheet, SheetSettings::default());
        assert_eq!(s.corrections, default_corrections());
    }

    #[test]
    fn parse_full_config() {
        let js = r#"{
            "inputPattern": "input/*.xlsx",
            "referencePath": "/geo/20240807.json",
            "outputDirectory": "out",
            "headerScanRows": "12",
            "headerLabels": ["行政區別", "村里別"],
            "dataRowOffset": 3,
            "corrections": []
        }"#;
        let c: CunliConfig = serde_json::from_str(js).unwrap();
        let s = c.settings(Path::new("cfg")).unwrap();
        assert_eq!(s.input_pattern, "cfg/input/*.xlsx");
        // Absolute paths are kept.
        assert_eq!(s.reference_path, PathBuf::from("/geo/20240807.json"));
        assert_eq!(s.sheet.header_scan_rows, 12);
        assert_eq!(s.sheet.data_row_offset, 3);
        assert_eq!(s.sheet.header_labels.len(), 2);
        assert!(s.corrections.is_empty());
    }

    #[test]
    fn bad_values() {
        let c: CunliConfig = serde_json::from_str(r#"{"dataRowOffset": "five"}"#).unwrap();
        assert!(c.settings(Path::new(".")).is_err());
        let c: CunliConfig = serde_json::from_str(
            r#"{"corrections": [{"villcode": "1", "kind": "dropVillage", "note": null}]}"#,
        )
        .unwrap();
        assert!(matches!(
            c.settings(Path::new(".")),
            Err(CunliError::UnknownCorrection { .. })
        ));
    }
}
