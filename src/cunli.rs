use log::{debug, error, info, warn};

use cunli_aggregate::*;
use snafu::prelude::*;

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::cunli::config_reader::*;
use crate::cunli::io_sheet::RowError;

pub mod config_reader;
pub mod emit;
pub mod io_common;
pub mod io_geo;
pub mod io_overrides;
pub mod io_sheet;

#[derive(Debug, Snafu)]
pub enum CunliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Could not find the header {labels:?} in the first {scanned} rows of {path}"))]
    HeaderNotFound {
        path: String,
        labels: Vec<String>,
        scanned: usize,
    },
    #[snafu(display("Error reading {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Expected a positive number for {field}"))]
    ParsingJsonNumber { field: String },
    #[snafu(display("Error serializing {path}"))]
    SerializingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid input pattern {pattern}"))]
    InvalidPattern {
        source: glob::PatternError,
        pattern: String,
    },
    #[snafu(display("No input file matches {pattern}"))]
    NoInputFiles { pattern: String },
    #[snafu(display("Unknown correction kind {kind:?}"))]
    UnknownCorrection { kind: String },
    #[snafu(display("Difference detected between the generated summary and {path}"))]
    SummaryMismatch { path: String },
}

pub type CunliResult<T> = Result<T, CunliError>;

/// The station rows of all the input files.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Extraction {
    pub files_found: usize,
    pub files_processed: usize,
    /// (file name, reason)
    pub skipped_files: Vec<(String, String)>,
    pub rows: Vec<StationRow>,
    pub rejected_rows: Vec<(String, RowError)>,
}

/// Reads the files one after the other. A file that cannot be read is reported and
/// skipped, it does not stop the run.
pub fn extract_files(files: &[PathBuf], settings: &SheetSettings) -> Extraction {
    let mut res = Extraction {
        files_found: files.len(),
        ..Extraction::default()
    };
    for path in files.iter() {
        let name = io_common::simplify_file_name(path);
        info!("Processing: {}", name);
        match io_sheet::read_sheet(path, settings) {
            Ok(sheet) => {
                info!(
                    "  Extracted {} records ({} rows skipped)",
                    sheet.rows.len(),
                    sheet.rejected.len()
                );
                res.files_processed += 1;
                res.rows.extend(sheet.rows);
                res.rejected_rows
                    .extend(sheet.rejected.into_iter().map(|e| (name.clone(), e)));
            }
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                res.skipped_files.push((name, e.to_string()));
            }
        }
    }
    info!("Total records extracted: {}", res.rows.len());
    res
}

/// The villages, resolved and corrected.
#[derive(PartialEq, Debug, Clone)]
pub struct Processed {
    pub villages: Vec<VillageRecord>,
    pub unresolved: Vec<VillageKey>,
    pub corrections_applied: Vec<String>,
    pub cases: Vec<CaseStats>,
}

pub fn process(
    rows: Vec<StationRow>,
    resolver: &CodeResolver,
    corrections: &[VoteCorrection],
) -> Processed {
    let mut villages = aggregate(rows);
    let unresolved = resolve_all(&mut villages, resolver);
    let corrections_applied = apply_corrections(&mut villages, corrections);
    let cases = case_statistics(&villages);
    Processed {
        villages,
        unresolved,
        corrections_applied,
        cases,
    }
}

/// The tally of a run, written to summary.json.
#[derive(PartialEq, Debug, Clone)]
pub struct RunReport {
    pub files_found: usize,
    pub files_processed: usize,
    pub skipped_files: Vec<(String, String)>,
    pub total_records: usize,
    pub skipped_rows: usize,
    pub total_cunli: usize,
    pub resolved_cunli: usize,
    pub villcode_files: usize,
    /// (code, village label) of the villages not written because their code was taken.
    pub duplicate_codes: Vec<(String, String)>,
    pub villcode_list: Vec<String>,
    /// "county_district_village" labels, one per village.
    pub cunli_list: Vec<String>,
    pub manual_mappings_loaded: usize,
    pub manual_mappings_applied: usize,
    pub corrections_applied: Vec<String>,
    /// (village, reason)
    pub unresolved: Vec<(VillageKey, String)>,
}

impl RunReport {
    pub fn new(
        extraction: &Extraction,
        processed: &Processed,
        emitted: &emit::EmitStats,
        manual_mappings_loaded: usize,
    ) -> RunReport {
        let villages = &processed.villages;
        let villcode_list: BTreeSet<String> = villages
            .iter()
            .filter_map(|v| v.resolution.as_ref())
            .flat_map(|r| r.all_villcodes())
            .collect();
        let cunli_list: BTreeSet<String> = villages.iter().map(|v| v.key.full_label()).collect();
        let unresolved = villages
            .iter()
            .filter_map(|v| match &v.resolution {
                Some(Resolution::Unresolved(e)) => Some((v.key.clone(), e.to_string())),
                _ => None,
            })
            .collect();
        RunReport {
            files_found: extraction.files_found,
            files_processed: extraction.files_processed,
            skipped_files: extraction.skipped_files.clone(),
            total_records: villages.iter().map(|v| v.records.len()).sum(),
            skipped_rows: extraction.rejected_rows.len(),
            total_cunli: villages.len(),
            resolved_cunli: villages.iter().filter(|v| v.villcode().is_some()).count(),
            villcode_files: emitted.village_files,
            duplicate_codes: emitted.duplicate_codes.clone(),
            villcode_list: villcode_list.into_iter().collect(),
            cunli_list: cunli_list.into_iter().collect(),
            manual_mappings_loaded,
            manual_mappings_applied: villages
                .iter()
                .filter(|v| v.resolution.as_ref().map(|r| r.is_manual()).unwrap_or(false))
                .count(),
            corrections_applied: processed.corrections_applied.clone(),
            unresolved,
        }
    }

    pub fn coverage_percentage(&self) -> f64 {
        percentage(self.resolved_cunli as u64, self.total_cunli as u64)
    }

    pub fn to_json(&self) -> JSValue {
        let skipped: Vec<JSValue> = self
            .skipped_files
            .iter()
            .map(|(file, reason)| json!({"file": file, "reason": reason}))
            .collect();
        let unresolved: Vec<JSValue> = self
            .unresolved
            .iter()
            .map(|(k, reason)| {
                json!({
                    "cunli": k.cunli(),
                    "county": k.county,
                    "district": k.district,
                    "village": k.village,
                    "reason": reason,
                })
            })
            .collect();
        let duplicates: Vec<JSValue> = self
            .duplicate_codes
            .iter()
            .map(|(code, label)| json!({"villcode": code, "cunli": label}))
            .collect();
        json!({
            "total_files_found": self.files_found,
            "total_files_processed": self.files_processed,
            "skipped_files": skipped,
            "total_records": self.total_records,
            "skipped_rows": self.skipped_rows,
            "total_cunli": self.total_cunli,
            "resolved_cunli": self.resolved_cunli,
            "unresolved_cunli": self.total_cunli - self.resolved_cunli,
            "coverage_percentage": self.coverage_percentage(),
            "villcode_files": self.villcode_files,
            "duplicate_villcodes": duplicates,
            "villcode_list": self.villcode_list,
            "cunli_list": self.cunli_list,
            "manual_mappings_loaded": self.manual_mappings_loaded,
            "manual_mappings_applied": self.manual_mappings_applied,
            "corrections_applied": self.corrections_applied,
            "unresolved": unresolved,
        })
    }

    pub fn log(&self) {
        info!(
            "Processed {} of {} files, {} records ({} rows skipped)",
            self.files_processed, self.files_found, self.total_records, self.skipped_rows
        );
        for (file, reason) in self.skipped_files.iter() {
            warn!("Skipped file {}: {}", file, reason);
        }
        info!(
            "{} villages, {} with VILLCODE ({}%), {} files written",
            self.total_cunli,
            self.resolved_cunli,
            self.coverage_percentage(),
            self.villcode_files
        );
        for (code, label) in self.duplicate_codes.iter() {
            warn!("Not written: {} resolves to {}, already used", label, code);
        }
        if !self.unresolved.is_empty() {
            warn!(
                "Could not find VILLCODE for {} villages",
                self.unresolved.len()
            );
            for (k, reason) in self.unresolved.iter().take(20) {
                warn!("  - {} ({})", k.full_label(), reason);
            }
        }
    }
}

pub fn run_conversion(settings: &RunSettings) -> CunliResult<RunReport> {
    debug!("run_conversion: {:?}", settings);
    let files = io_common::list_input_files(&settings.input_pattern)?;
    ensure!(
        !files.is_empty(),
        NoInputFilesSnafu {
            pattern: settings.input_pattern.clone()
        }
    );
    let extraction = extract_files(&files, &settings.sheet);

    let places = match io_geo::read_reference(&settings.reference_path) {
        Ok(places) => places,
        Err(e) => {
            error!("Cannot use the reference dataset, only manual codes will be used: {}", e);
            vec![]
        }
    };

    // An unreadable table is never rewritten.
    let overrides = match io_overrides::read_overrides(&settings.overrides_path) {
        Ok(entries) => Some(entries),
        Err(e) => {
            error!("Cannot use the manual VILLCODE table: {}", e);
            None
        }
    };
    let manual = io_overrides::manual_codes(overrides.as_deref().unwrap_or_default());
    let resolver = CodeResolver::new(&places, &manual);

    let processed = process(extraction.rows.clone(), &resolver, &settings.corrections);
    let emitted = emit::emit_villages(
        &settings.output_directory,
        &processed.villages,
        &processed.cases,
        &settings.overrides_path,
    )?;
    let report = RunReport::new(&extraction, &processed, &emitted, resolver.num_manual());
    write_report(&settings.output_directory, &report)?;

    if let Some(entries) = overrides {
        io_overrides::append_unresolved(&settings.overrides_path, &entries, &processed.unresolved)?;
    }

    report.log();
    Ok(report)
}

pub fn write_report(out_dir: &Path, report: &RunReport) -> CunliResult<()> {
    io_common::write_json(&out_dir.join(emit::SUMMARY_FILE), &report.to_json())
}

/// Checks the generated village summary against a reference copy.
pub fn compare_summary(out_dir: &Path, reference_path: &str) -> CunliResult<()> {
    let generated_path = out_dir.join(emit::CUNLI_SUMMARY_FILE);
    let generated = read_pretty(&generated_path.display().to_string())?;
    let reference = read_pretty(reference_path)?;
    if generated != reference {
        warn!("Found differences with the reference summary");
        print_diff(reference.as_str(), generated.as_str(), "\n");
        return SummaryMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("The summary matches {}", reference_path);
    Ok(())
}

// Re-formats a JSON file so that the comparison ignores whitespace and key order.
fn read_pretty(path: &str) -> CunliResult<String> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    serde_json::to_string_pretty(&js).context(SerializingJsonSnafu { path })
}
