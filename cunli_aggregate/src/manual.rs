//! This is the long-form manual for `cunli_aggregate` and `cunlijson`.
//!
//! ## Input spreadsheets
//!
//! One Excel (.xlsx) file per recall case, as published by the Central Election Commission.
//! Only the first worksheet is read. The file name, without the `表5-` prefix and the extension,
//! is the recall case label, for example:
//!
//! `表5-第11屆立法委員(臺北市第7選舉區)王鴻薇罷免案各投開票所投開票結果表.xlsx`
//!
//! The county is derived from the label: `臺北市` in the example above. For mayor recalls
//! (`第4屆市長...罷免案`) the city in front of the term number is used.
//!
//! The header row is found by looking for the `行政區別` cell in the first 10 rows. The data starts
//! 5 rows below the header. In the data rows, the columns are:
//!
//! | column | content |
//! |--------|---------|
//! | 0 | district (only on the district rows) |
//! | 1 | village |
//! | 2 | polling station number |
//! | 3 | agree votes |
//! | 4 | disagree votes |
//! | 5 | valid votes |
//! | 6 | invalid votes |
//! | 7 | total voters |
//! | 8 | ballots not cast |
//! | 9 | ballots issued |
//! | 10 | unused ballots |
//! | 11 | eligible voters |
//! | 12 | turnout rate, in percent |
//!
//! A district row has a district and no village, and applies to the station rows below it.
//! A row with a village and a polling station is a station row. Any other row is ignored.
//!
//! A station row is rejected (and reported in the logs and in `summary.json`) when:
//! - no district row was seen before it
//! - one of the counts is missing, negative or not a whole number
//! - the turnout rate is not a number between 0 and 100
//!
//! Counts may be written with thousands separators (`1,234`). The turnout rate may carry a `%`.
//!
//! Names are normalized before anything else: full-width characters are converted to their
//! half-width form, surrounding whitespace is removed, and `臺` is written `台`.
//!
//! ## Reference dataset
//!
//! A GeoJSON feature collection with the `VILLCODE`, `COUNTYCODE`, `TOWNCODE`, `COUNTYNAME`,
//! `TOWNNAME` and `VILLNAME` properties on each feature. Features without a village name are
//! ignored. When the file cannot be read, the run continues with the manual table only.
//!
//! ## Manual table
//!
//! `missing_villcode_mapping.json` is a JSON array of entries:
//!
//! ```text
//! [
//!   {
//!     "cunli_key": "東區_關新里",
//!     "county": "新竹市",
//!     "district": "東區",
//!     "village": "關新里",
//!     "villcode": "10018010050",
//!     "note": "Please fill VILLCODE manually"
//!   }
//! ]
//! ```
//!
//! `villcode` may also be a list, for a village that now covers several official villages. The
//! first code of the list names the output file.
//!
//! An entry without a county (only `cunli_key`, or empty `county`) applies to the village of
//! that district and name in any county. An entry with the county takes precedence over it.
//!
//! A filled entry takes precedence over the reference dataset. After each run, the villages that
//! could not be resolved are appended with an empty `villcode`. Existing entries are never
//! modified or reordered, and the file is left alone when it cannot be parsed.
//!
//! ## Configuration file
//!
//! All the fields are optional. Relative paths are interpreted relative to the directory of the
//! configuration file.
//!
//! ```text
//! {
//!   "inputPattern": "raw/*.xlsx",
//!   "referencePath": "taiwan_basecode/cunli/geo/20250620.json",
//!   "overridesPath": "missing_villcode_mapping.json",
//!   "outputDirectory": "docs/cunli_json",
//!   "headerScanRows": 10,
//!   "headerLabels": ["行政區別"],
//!   "dataRowOffset": 5,
//!   "fileLabelPrefix": "表5-",
//!   "corrections": [
//!     {"villcode": "65000040036", "kind": "swapAgreeDisagree", "note": "published swapped"}
//!   ]
//! }
//! ```
//!
//! When `corrections` is absent, the correction of `65000040036` (新北市永和區光復里) is applied.
//! Pass an empty list to disable it.
//!
//! ## Outputs
//!
//! All in the output directory:
//! - `<VILLCODE>.json` one document per resolved village, with all its polling stations
//! - `cunli_summary.json` all the villages without their stations, keyed by VILLCODE (or by
//!   `county_district_village` for the unresolved ones)
//! - `recall_cases.json` the statistics of each recall case
//! - `summary.json` the tally of the run. `cunli_list` holds one `county_district_village`
//!   label per village; `duplicate_villcodes` lists the villages whose code was already used
//!   by an earlier village, and whose document was therefore not written
//!
//! The files of a previous run are removed first. Running twice on the same inputs produces the
//! same bytes.
