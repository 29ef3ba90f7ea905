// Writing the output directory.
//
// All the documents are built as JSON values whose objects have sorted keys, so that
// running twice on the same input gives the same bytes.

use crate::cunli::{io_common::write_json, *};

pub const CUNLI_SUMMARY_FILE: &str = "cunli_summary.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const RECALL_CASES_FILE: &str = "recall_cases.json";

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct EmitStats {
    pub village_files: usize,
    /// (code, village label) of the villages that resolved to a code already used by an
    /// earlier village.
    pub duplicate_codes: Vec<(String, String)>,
}

fn station_to_json(r: &StationRecord) -> JSValue {
    json!({
        "polling_station": r.polling_station,
        "recall_case": r.recall_case,
        "agree_votes": r.agree_votes,
        "disagree_votes": r.disagree_votes,
        "valid_votes": r.valid_votes,
        "invalid_votes": r.invalid_votes,
        "total_voters": r.total_voters,
        "ballots_not_cast": r.ballots_not_cast,
        "ballots_issued": r.ballots_issued,
        "unused_ballots": r.unused_ballots,
        "eligible_voters": r.eligible_voters,
        "turnout_rate": r.turnout_rate,
    })
}

fn sum_fields_to_json(s: &SumFields) -> JSValue {
    json!({
        "agree_votes": s.agree_votes,
        "disagree_votes": s.disagree_votes,
        "valid_votes": s.valid_votes,
        "invalid_votes": s.invalid_votes,
        "total_voters": s.total_voters,
        "ballots_not_cast": s.ballots_not_cast,
        "ballots_issued": s.ballots_issued,
        "unused_ballots": s.unused_ballots,
        "eligible_voters": s.eligible_voters,
        "average_turnout_rate": s.average_turnout_rate,
        "weighted_turnout_rate": s.weighted_turnout_rate,
    })
}

// The identifying fields of a village, shared by the village documents and the summary.
fn village_header(v: &VillageRecord) -> JSMap<String, JSValue> {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    m.insert("cunli".to_string(), json!(v.cunli()));
    m.insert("county".to_string(), json!(v.key.county));
    m.insert("district".to_string(), json!(v.key.district));
    m.insert("village".to_string(), json!(v.key.village));
    m.insert("villcode".to_string(), json!(v.villcode()));
    m.insert("total_records".to_string(), json!(v.records.len()));
    m.insert("sum_fields".to_string(), sum_fields_to_json(&v.sum_fields));
    m
}

/// The full document of a village.
pub fn village_to_json(v: &VillageRecord) -> JSValue {
    let mut m = village_header(v);
    match &v.resolution {
        Some(Resolution::Reference(p)) => {
            m.insert("resolution".to_string(), json!("reference"));
            m.insert("countycode".to_string(), json!(p.countycode));
            m.insert("towncode".to_string(), json!(p.towncode));
            m.insert("countyname".to_string(), json!(p.countyname));
            m.insert("townname".to_string(), json!(p.townname));
            m.insert("villname".to_string(), json!(p.villname));
        }
        Some(Resolution::Manual(mc)) => {
            m.insert("resolution".to_string(), json!("manual"));
            let code = mc.primary();
            // VILLCODE: 5 digits of county, 3 of town, 3 of village.
            if code.len() == 11 && code.chars().all(|c| c.is_ascii_digit()) {
                m.insert("countycode".to_string(), json!(code[..5]));
                m.insert("towncode".to_string(), json!(code[..8]));
            }
            m.insert("countyname".to_string(), json!(v.key.county));
            m.insert("townname".to_string(), json!(v.key.district));
            m.insert("villname".to_string(), json!(v.key.village));
            if mc.villcodes.len() > 1 {
                m.insert("villcodes".to_string(), json!(mc.villcodes));
            }
        }
        Some(Resolution::Unresolved(_)) | None => {}
    }
    let records: Vec<JSValue> = v.records.iter().map(station_to_json).collect();
    m.insert("records".to_string(), JSValue::Array(records));
    JSValue::Object(m)
}

/// The summary of all the villages, without the station records.
///
/// Resolved villages are keyed by VILLCODE, the others by their
/// "county_district_village" label.
pub fn cunli_summary_to_json(villages: &[VillageRecord]) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    for v in villages.iter() {
        let key = match v.villcode() {
            Some(code) if !m.contains_key(code) => code.to_string(),
            Some(code) => {
                warn!(
                    "cunli_summary: code {} already used, filing {} under its name",
                    code,
                    v.key.full_label()
                );
                v.key.full_label()
            }
            None => v.key.full_label(),
        };
        m.insert(key, JSValue::Object(village_header(v)));
    }
    JSValue::Object(m)
}

pub fn case_stats_to_json(cases: &[CaseStats]) -> JSValue {
    let mut details: JSMap<String, JSValue> = JSMap::new();
    let mut mapping: JSMap<String, JSValue> = JSMap::new();
    let mut names: Vec<String> = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    for c in cases.iter() {
        names.push(c.display_name.clone());
        labels.push(c.recall_case.clone());
        mapping.insert(c.display_name.clone(), json!(c.recall_case));
        details.insert(
            c.display_name.clone(),
            json!({
                "agree_votes": c.agree_votes,
                "disagree_votes": c.disagree_votes,
                "valid_votes": c.valid_votes,
                "total_voters": c.total_voters,
                "eligible_voters": c.eligible_voters,
                "polling_stations": c.polling_stations,
                "villages": c.villages,
                "districts": c.districts,
                "village_codes": c.village_codes,
                "cunli_keys": c.cunli_keys,
                "agree_percentage": c.agree_percentage,
                "disagree_percentage": c.disagree_percentage,
                "turnout_rate": c.turnout_rate,
            }),
        );
    }
    names.sort();
    labels.sort();
    json!({
        "cases": names,
        "original_cases": labels,
        "case_mapping": mapping,
        "total_cases": cases.len(),
        "case_details": details,
    })
}

// Village documents are named by their code.
fn is_village_document(path: &Path) -> bool {
    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    let numeric_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    is_json && numeric_stem
}

/// Removes the files of a previous run: the village documents and the summaries.
/// Any other file is left alone, and so is the manual table.
pub fn prune_outputs(out_dir: &Path, protected: &Path) -> CunliResult<usize> {
    let p = out_dir.display().to_string();
    let protected = protected.canonicalize().ok();
    let mut removed = 0;
    for entry in fs::read_dir(out_dir).context(WritingOutputSnafu { path: &p })? {
        let path = entry.context(WritingOutputSnafu { path: &p })?.path();
        let name = io_common::simplify_file_name(&path);
        let generated = is_village_document(&path)
            || [CUNLI_SUMMARY_FILE, SUMMARY_FILE, RECALL_CASES_FILE].contains(&name.as_str());
        if !generated || !path.is_file() || path.canonicalize().ok() == protected {
            continue;
        }
        fs::remove_file(&path).context(WritingOutputSnafu {
            path: path.display().to_string(),
        })?;
        removed += 1;
    }
    debug!("prune_outputs: removed {} files from {}", removed, p);
    Ok(removed)
}

/// Writes the village documents, the village summary and the recall case statistics.
pub fn emit_villages(
    out_dir: &Path,
    villages: &[VillageRecord],
    cases: &[CaseStats],
    protected: &Path,
) -> CunliResult<EmitStats> {
    fs::create_dir_all(out_dir).context(WritingOutputSnafu {
        path: out_dir.display().to_string(),
    })?;
    prune_outputs(out_dir, protected)?;

    let mut stats = EmitStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    for v in villages.iter().filter(|v| !v.records.is_empty()) {
        let Some(code) = v.villcode() else {
            continue;
        };
        if !seen.insert(code.to_string()) {
            warn!(
                "emit_villages: {} resolves to {}, which is already written; skipping",
                v.key.full_label(),
                code
            );
            stats
                .duplicate_codes
                .push((code.to_string(), v.key.full_label()));
            continue;
        }
        write_json(&out_dir.join(format!("{}.json", code)), &village_to_json(v))?;
        stats.village_files += 1;
    }

    write_json(
        &out_dir.join(CUNLI_SUMMARY_FILE),
        &cunli_summary_to_json(villages),
    )?;
    info!(
        "Created {} with {} villages for fast map loading",
        CUNLI_SUMMARY_FILE,
        villages.len()
    );
    write_json(&out_dir.join(RECALL_CASES_FILE), &case_stats_to_json(cases))?;
    info!(
        "Created {} with {} recall cases",
        RECALL_CASES_FILE,
        cases.len()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(station: &str, agree: u64) -> StationRecord {
        StationRecord {
            polling_station: station.to_string(),
            recall_case: "case".to_string(),
            agree_votes: agree,
            disagree_votes: 1,
            valid_votes: agree + 1,
            invalid_votes: 0,
            total_voters: agree + 1,
            ballots_not_cast: 0,
            ballots_issued: agree + 1,
            unused_ballots: 0,
            eligible_voters: 10,
            turnout_rate: 50.0,
        }
    }

    fn village(name: &str, codes: &[&str]) -> VillageRecord {
        let mut v = VillageRecord::new(VillageKey::new("新北市", "永和區", name), record("1", 3));
        v.resolution = Some(
            match ManualCode::new(v.key.clone(), codes.iter().map(|c| c.to_string()).collect()) {
                Some(mc) => Resolution::Manual(mc),
                None => Resolution::Unresolved(ResolutionError::NotFound),
            },
        );
        v
    }

    #[test]
    fn village_documents() {
        assert!(is_village_document(Path::new("out/65000040036.json")));
        assert!(!is_village_document(Path::new("out/summary.json")));
        assert!(!is_village_document(Path::new("out/65000040036.txt")));
        assert!(!is_village_document(Path::new("out/.json")));
    }

    #[test]
    fn manual_document() {
        let v = village("新生里", &["65000040099", "65000040100"]);
        let js = village_to_json(&v);
        assert_eq!(js["villcode"], json!("65000040099"));
        assert_eq!(js["countycode"], json!("65000"));
        assert_eq!(js["villcodes"], json!(["65000040099", "65000040100"]));
        assert_eq!(js["records"][0]["agree_votes"], json!(3));
        assert_eq!(js["sum_fields"]["weighted_turnout_rate"], json!(40.0));
    }

    #[test]
    fn summary_keys() {
        let villages = vec![
            village("新生里", &["65000040099"]),
            village("舊生里", &["65000040099"]),
            village("無名里", &[]),
        ];
        let js = cunli_summary_to_json(&villages);
        let m = js.as_object().unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m["65000040099"]["village"], json!("新生里"));
        assert_eq!(m["新北市_永和區_舊生里"]["villcode"], json!("65000040099"));
        assert_eq!(m["新北市_永和區_無名里"]["villcode"], JSValue::Null);
    }

    #[test]
    fn duplicate_codes_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let villages = vec![
            village("新生里", &["65000040099"]),
            village("舊生里", &["65000040099"]),
        ];
        let stats = emit_villages(dir.path(), &villages, &[], &dir.path().join("m.json")).unwrap();
        assert_eq!(stats.village_files, 1);
        assert_eq!(
            stats.duplicate_codes,
            vec![(
                "65000040099".to_string(),
                "新北市_永和區_舊生里".to_string()
            )]
        );
        let doc: JSValue =
            serde_json::from_str(&fs::read_to_string(dir.path().join("65000040099.json")).unwrap())
                .unwrap();
        assert_eq!(doc["village"], json!("新生里"));
    }
}
