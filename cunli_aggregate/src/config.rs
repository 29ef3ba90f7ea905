// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The results of one polling station for one recall case.
#[derive(PartialEq, Debug, Clone)]
pub struct StationRecord {
    pub polling_station: String,
    pub recall_case: String,
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub invalid_votes: u64,
    pub total_voters: u64,
    pub ballots_not_cast: u64,
    pub ballots_issued: u64,
    pub unused_ballots: u64,
    pub eligible_voters: u64,
    /// Percentage, between 0 and 100.
    pub turnout_rate: f64,
}

/// The grouping key of a village.
///
/// All the fields are expected to be normalized with [crate::normalize_name].
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct VillageKey {
    pub county: String,
    pub district: String,
    pub village: String,
}

impl VillageKey {
    /// Builds a key, normalizing all the names.
    pub fn new(county: &str, district: &str, village: &str) -> VillageKey {
        VillageKey {
            county: crate::normalize_name(county),
            district: crate::normalize_name(district),
            village: crate::normalize_name(village),
        }
    }

    /// The composite label "district_village".
    pub fn cunli(&self) -> String {
        format!("{}_{}", self.district, self.village)
    }

    /// The composite label "county_district_village", unique across the country.
    pub fn full_label(&self) -> String {
        format!("{}_{}_{}", self.county, self.district, self.village)
    }
}

/// A station record, with the place it belongs to.
#[derive(PartialEq, Debug, Clone)]
pub struct StationRow {
    pub key: VillageKey,
    pub record: StationRecord,
}

// ********* Resolution ***********

/// An entry of the reference geographic dataset.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GeoPlace {
    pub villcode: String,
    pub countycode: String,
    pub towncode: String,
    pub countyname: String,
    pub townname: String,
    pub villname: String,
}

/// A manually filled mapping. It may cover several official villages when
/// they were merged into a single one.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ManualCode {
    pub key: VillageKey,
    /// Guaranteed to contain at least one code.
    pub villcodes: Vec<String>,
}

impl ManualCode {
    /// Returns None when no code was filled in.
    pub fn new(key: VillageKey, villcodes: Vec<String>) -> Option<ManualCode> {
        let villcodes: Vec<String> = villcodes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if villcodes.is_empty() {
            None
        } else {
            Some(ManualCode { key, villcodes })
        }
    }

    pub fn primary(&self) -> &str {
        &self.villcodes[0]
    }
}

/// Why a village did not get a code.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ResolutionError {
    /// The county could not be derived from the recall case.
    MissingCounty,
    /// No entry in the reference dataset.
    NotFound,
    /// Several distinct codes in the reference dataset.
    Ambiguous(Vec<String>),
}

impl Error for ResolutionError {}

impl Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionError::MissingCounty => write!(f, "county unknown"),
            ResolutionError::NotFound => write!(f, "no matching village in the reference data"),
            ResolutionError::Ambiguous(codes) => {
                write!(f, "ambiguous match: {}", codes.join(","))
            }
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Resolution {
    Manual(ManualCode),
    Reference(GeoPlace),
    Unresolved(ResolutionError),
}

impl Resolution {
    /// The code the village is filed under, if any.
    pub fn villcode(&self) -> Option<&str> {
        match self {
            Resolution::Manual(m) => Some(m.primary()),
            Resolution::Reference(p) => Some(p.villcode.as_str()),
            Resolution::Unresolved(_) => None,
        }
    }

    /// All the codes covered by this village.
    pub fn all_villcodes(&self) -> Vec<String> {
        match self {
            Resolution::Manual(m) => m.villcodes.clone(),
            Resolution::Reference(p) => vec![p.villcode.clone()],
            Resolution::Unresolved(_) => vec![],
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, Resolution::Manual(_))
    }
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone, Default)]
pub struct SumFields {
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub invalid_votes: u64,
    pub total_voters: u64,
    pub ballots_not_cast: u64,
    pub ballots_issued: u64,
    pub unused_ballots: u64,
    pub eligible_voters: u64,
    /// Unweighted mean of the station turnout rates.
    pub average_turnout_rate: f64,
    /// total_voters / eligible_voters, in percent, 2 decimals.
    pub weighted_turnout_rate: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct VillageRecord {
    pub key: VillageKey,
    pub resolution: Option<Resolution>,
    pub sum_fields: SumFields,
    pub records: Vec<StationRecord>,
    // Running total for the mean.
    pub(crate) turnout_sum: f64,
}

/// Corrections for known errors in the published data.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CorrectionKind {
    /// The agree and disagree columns were reported swapped.
    SwapAgreeDisagree,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteCorrection {
    pub villcode: String,
    pub kind: CorrectionKind,
}

/// Statistics for one recall case.
#[derive(PartialEq, Debug, Clone)]
pub struct CaseStats {
    pub recall_case: String,
    pub display_name: String,
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub total_voters: u64,
    pub eligible_voters: u64,
    pub polling_stations: u64,
    pub villages: u64,
    pub districts: u64,
    pub village_codes: Vec<String>,
    pub cunli_keys: Vec<String>,
    pub agree_percentage: f64,
    pub disagree_percentage: f64,
    pub turnout_rate: f64,
}
