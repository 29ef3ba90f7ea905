// The table of manually filled VILLCODEs.
//
// The file is a JSON array of entries. Entries with an empty villcode are the villages
// waiting to be filled in by hand; they are added by the runs that could not resolve them.

use crate::cunli::{io_common::write_json, *};

pub const FOLLOW_UP_NOTE: &str = "Please fill VILLCODE manually";

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideCode {
    One(String),
    /// Villages that were merged into one.
    Many(Vec<String>),
}

impl Default for OverrideCode {
    fn default() -> Self {
        OverrideCode::One("".to_string())
    }
}

impl OverrideCode {
    pub fn codes(&self) -> Vec<String> {
        match self {
            OverrideCode::One(s) => vec![s.clone()],
            OverrideCode::Many(l) => l.clone(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OverrideEntry {
    #[serde(default)]
    pub cunli_key: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub village: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub villcode: OverrideCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    // Anything else the editors put in an entry is kept as is.
    #[serde(flatten)]
    pub extra: JSMap<String, JSValue>,
}

impl OverrideEntry {
    pub fn for_follow_up(key: &VillageKey) -> OverrideEntry {
        OverrideEntry {
            cunli_key: key.cunli(),
            district: key.district.clone(),
            village: key.village.clone(),
            county: key.county.clone(),
            villcode: OverrideCode::default(),
            note: Some(FOLLOW_UP_NOTE.to_string()),
            extra: JSMap::new(),
        }
    }

    /// The village this entry is about. Older entries only carry the
    /// "district_village" label.
    pub fn key(&self) -> VillageKey {
        let mut parts = self.cunli_key.splitn(2, '_');
        let (d, v) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
        let district = if self.district.trim().is_empty() {
            d
        } else {
            self.district.as_str()
        };
        let village = if self.village.trim().is_empty() {
            v
        } else {
            self.village.as_str()
        };
        VillageKey::new(&self.county, district, village)
    }

    pub fn manual_code(&self) -> Option<ManualCode> {
        ManualCode::new(self.key(), self.villcode.codes())
    }
}

/// Reads the table. A missing file is an empty table.
pub fn read_overrides(path: &Path) -> CunliResult<Vec<OverrideEntry>> {
    let p = path.display().to_string();
    if !path.exists() {
        info!("No manual VILLCODE table at {:?}", p);
        return Ok(vec![]);
    }
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: &p })?;
    let entries: Vec<OverrideEntry> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: &p })?;
    Ok(entries)
}

pub fn manual_codes(entries: &[OverrideEntry]) -> Vec<ManualCode> {
    let res: Vec<ManualCode> = entries.iter().filter_map(|e| e.manual_code()).collect();
    info!("Loaded {} manual VILLCODE mappings", res.len());
    res
}

/// Adds the unresolved villages that are not in the table yet.
///
/// The existing entries are kept in place, whether they are filled or not.
/// The file is only written when there is something to add.
/// Returns the number of added entries.
pub fn append_unresolved(
    path: &Path,
    existing: &[OverrideEntry],
    unresolved: &[VillageKey],
) -> CunliResult<usize> {
    let mut known: HashSet<VillageKey> = existing.iter().map(|e| e.key()).collect();
    // Entries without a county stand for the village in any county.
    let any_county: HashSet<String> = known
        .iter()
        .filter(|k| k.county.is_empty())
        .map(|k| k.cunli())
        .collect();
    let mut entries: Vec<OverrideEntry> = existing.to_vec();
    for key in unresolved.iter() {
        if any_county.contains(&key.cunli()) {
            continue;
        }
        if known.insert(key.clone()) {
            entries.push(OverrideEntry::for_follow_up(key));
        }
    }
    let added = entries.len() - existing.len();
    if added == 0 {
        debug!("append_unresolved: nothing to add to {:?}", path);
        return Ok(0);
    }
    let js = serde_json::to_value(&entries).context(SerializingJsonSnafu {
        path: path.display().to_string(),
    })?;
    write_json(path, &js)?;
    info!(
        "Added {} villages to {:?} for manual completion ({} entries)",
        added,
        path,
        entries.len()
    );
    Ok(added)
}
