// Reading the spreadsheets of polling station results.
//
// Layout of the data rows, after a header block of several merged rows:
// district | village | station | agree | disagree | valid | invalid | total voters |
// not cast | issued | unused | eligible voters | turnout rate

use calamine::DataType;

use crate::cunli::{io_common::recall_case_label, *};

const DISTRICT_COL: usize = 0;
const VILLAGE_COL: usize = 1;
const STATION_COL: usize = 2;
const TURNOUT_COL: usize = 12;

const COUNT_COLUMNS: [&str; 9] = [
    "agree_votes",
    "disagree_votes",
    "valid_votes",
    "invalid_votes",
    "total_voters",
    "ballots_not_cast",
    "ballots_issued",
    "unused_ballots",
    "eligible_voters",
];

/// A station row that cannot be used.
#[derive(Debug, Clone, Snafu, PartialEq)]
pub enum RowError {
    #[snafu(display("line {lineno}: station row before any district row"))]
    MissingDistrict { lineno: u64 },
    #[snafu(display("line {lineno}: missing value for {column}"))]
    MissingField { lineno: u64, column: String },
    #[snafu(display("line {lineno}: {column} is not a number: {content}"))]
    NotANumber {
        lineno: u64,
        column: String,
        content: String,
    },
    #[snafu(display("line {lineno}: {column} is negative: {value}"))]
    NegativeCount {
        lineno: u64,
        column: String,
        value: String,
    },
    #[snafu(display("line {lineno}: turnout rate out of range: {value}"))]
    TurnoutOutOfRange { lineno: u64, value: f64 },
}

/// Where the data is located in a sheet.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct SheetLayout {
    pub header_row: usize,
    pub data_start: usize,
}

/// The content of one spreadsheet.
#[derive(PartialEq, Debug, Clone)]
pub struct SheetExtraction {
    pub recall_case: String,
    pub county: Option<String>,
    pub rows: Vec<StationRow>,
    pub rejected: Vec<RowError>,
}

/// Finds the header row within the first rows of the sheet.
pub fn locate_header(
    path: &str,
    rows: &[Vec<DataType>],
    settings: &SheetSettings,
) -> CunliResult<SheetLayout> {
    let labels: Vec<String> = settings
        .header_labels
        .iter()
        .map(|l| compact(l))
        .collect();
    for (idx, row) in rows.iter().take(settings.header_scan_rows).enumerate() {
        let cells: Vec<String> = row
            .iter()
            .filter_map(cell_text)
            .map(|s| compact(&s))
            .collect();
        if labels.iter().all(|l| cells.contains(l)) {
            debug!("locate_header: {}: header at row {}", path, idx);
            return Ok(SheetLayout {
                header_row: idx,
                data_start: idx + settings.data_row_offset,
            });
        }
    }
    HeaderNotFoundSnafu {
        path,
        labels: settings.header_labels.clone(),
        scanned: settings.header_scan_rows.min(rows.len()),
    }
    .fail()
}

/// Walks the data rows of a sheet, yielding the station rows and the rejected rows.
///
/// District rows (district name, no village) are consumed silently and apply to the
/// station rows that follow them.
pub struct StationRows<'a> {
    rows: std::iter::Enumerate<std::slice::Iter<'a, Vec<DataType>>>,
    offset: usize,
    recall_case: String,
    county: String,
    district: Option<String>,
}

impl<'a> StationRows<'a> {
    pub fn new(
        rows: &'a [Vec<DataType>],
        layout: SheetLayout,
        recall_case: &str,
        county: Option<&str>,
    ) -> StationRows<'a> {
        let offset = layout.data_start.min(rows.len());
        StationRows {
            rows: rows[offset..].iter().enumerate(),
            offset,
            recall_case: recall_case.to_string(),
            county: county.unwrap_or_default().to_string(),
            district: None,
        }
    }
}

impl<'a> Iterator for StationRows<'a> {
    type Item = Result<StationRow, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, row) in self.rows.by_ref() {
            // 1-based, as displayed by spreadsheet programs.
            let lineno = (self.offset + idx + 1) as u64;
            let district = row.get(DISTRICT_COL).and_then(cell_text);
            let village = row.get(VILLAGE_COL).and_then(cell_text);
            let station = row.get(STATION_COL).and_then(cell_text);
            match (district, village, station) {
                (Some(d), None, _) => {
                    debug!("StationRows: line {}: district {}", lineno, d);
                    self.district = Some(d);
                }
                (_, Some(village), Some(station)) => {
                    debug!("StationRows: line {}: {:?}", lineno, row);
                    return Some(station_row(
                        lineno,
                        row,
                        self.district.as_deref(),
                        &self.county,
                        &self.recall_case,
                        village,
                        station,
                    ));
                }
                _ => {}
            }
        }
        None
    }
}

fn station_row(
    lineno: u64,
    row: &[DataType],
    district: Option<&str>,
    county: &str,
    recall_case: &str,
    village: String,
    station: String,
) -> Result<StationRow, RowError> {
    let district = district.context(MissingDistrictSnafu { lineno })?;
    let mut counts = [0u64; 9];
    for (idx, column) in COUNT_COLUMNS.iter().enumerate() {
        counts[idx] = read_count(row.get(STATION_COL + 1 + idx), lineno, column)?;
    }
    let turnout_rate = read_rate(row.get(TURNOUT_COL), lineno)?;
    Ok(StationRow {
        key: VillageKey::new(county, district, &village),
        record: StationRecord {
            polling_station: station,
            recall_case: recall_case.to_string(),
            agree_votes: counts[0],
            disagree_votes: counts[1],
            valid_votes: counts[2],
            invalid_votes: counts[3],
            total_voters: counts[4],
            ballots_not_cast: counts[5],
            ballots_issued: counts[6],
            unused_ballots: counts[7],
            eligible_voters: counts[8],
            turnout_rate,
        },
    })
}

/// Extracts all the station rows of a sheet.
pub fn parse_sheet(
    path: &str,
    recall_case: &str,
    rows: &[Vec<DataType>],
    settings: &SheetSettings,
) -> CunliResult<SheetExtraction> {
    let layout = locate_header(path, rows, settings)?;
    let county = county_from_recall_case(recall_case);
    if county.is_none() {
        warn!(
            "parse_sheet: {}: cannot find the county of recall case {:?}",
            path, recall_case
        );
    }
    let mut res = SheetExtraction {
        recall_case: recall_case.to_string(),
        county: county.clone(),
        rows: Vec::new(),
        rejected: Vec::new(),
    };
    for r in StationRows::new(rows, layout, recall_case, county.as_deref()) {
        match r {
            Ok(row) => res.rows.push(row),
            Err(e) => {
                warn!("parse_sheet: {}: skipping row: {}", path, e);
                res.rejected.push(e);
            }
        }
    }
    Ok(res)
}

/// Reads the first worksheet of an Excel file.
pub fn read_sheet(path: &Path, settings: &SheetSettings) -> CunliResult<SheetExtraction> {
    let p = path.display().to_string();
    info!("Attempting to read spreadsheet {:?}", p);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: &p })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path: &p })?
        .context(OpeningExcelSnafu { path: &p })?;

    // Keep the column positions of the sheet even when its first columns are empty.
    let start_col = wrange.start().map(|(_, c)| c as usize).unwrap_or(0);
    let rows: Vec<Vec<DataType>> = wrange
        .rows()
        .map(|r| {
            std::iter::repeat(DataType::Empty)
                .take(start_col)
                .chain(r.iter().cloned())
                .collect()
        })
        .collect();

    let recall_case = recall_case_label(path, &settings.file_label_prefix);
    parse_sheet(&p, &recall_case, &rows, settings)
}

// Removes all the whitespace, header cells often contain line breaks or padding.
fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The text of a cell, if it is not blank.
fn cell_text(cell: &DataType) -> Option<String> {
    let s = match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        _ => "".to_string(),
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn read_count(cell: Option<&DataType>, lineno: u64, column: &str) -> Result<u64, RowError> {
    let content = || format!("{:?}", cell);
    let value: i64 = match cell {
        None | Some(DataType::Empty) => return MissingFieldSnafu { lineno, column }.fail(),
        Some(DataType::Int(i)) => *i,
        Some(DataType::Float(f)) if f.is_finite() && f.fract() == 0.0 => *f as i64,
        Some(DataType::String(s)) if s.trim().is_empty() => {
            return MissingFieldSnafu { lineno, column }.fail()
        }
        Some(DataType::String(s)) => s
            .trim()
            .replace(',', "")
            .parse::<i64>()
            .ok()
            .context(NotANumberSnafu {
                lineno,
                column,
                content: content(),
            })?,
        Some(_) => {
            return NotANumberSnafu {
                lineno,
                column,
                content: content(),
            }
            .fail()
        }
    };
    if value < 0 {
        return NegativeCountSnafu {
            lineno,
            column,
            value: value.to_string(),
        }
        .fail();
    }
    Ok(value as u64)
}

fn read_rate(cell: Option<&DataType>, lineno: u64) -> Result<f64, RowError> {
    let column = "turnout_rate";
    let value: f64 = match cell {
        None | Some(DataType::Empty) => return MissingFieldSnafu { lineno, column }.fail(),
        Some(DataType::Int(i)) => *i as f64,
        Some(DataType::Float(f)) => *f,
        Some(DataType::String(s)) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .context(NotANumberSnafu {
                lineno,
                column,
                content: s.clone(),
            })?,
        Some(x) => {
            return NotANumberSnafu {
                lineno,
                column,
                content: format!("{:?}", x),
            }
            .fail()
        }
    };
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return TurnoutOutOfRangeSnafu { lineno, value }.fail();
    }
    Ok(value)
}
