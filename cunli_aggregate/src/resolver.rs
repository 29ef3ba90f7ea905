use log::{debug, warn};
use std::collections::HashMap;

use crate::config::*;

/// Maps villages to their official code.
///
/// The manual table is consulted first and is never second-guessed. The reference
/// dataset is only used for the villages that are not in the manual table, and only
/// when it offers a single candidate.
#[derive(Debug, Clone, Default)]
pub struct CodeResolver {
    manual: HashMap<VillageKey, ManualCode>,
    // Entries without a county, by "district_village".
    manual_any_county: HashMap<String, ManualCode>,
    reference: HashMap<VillageKey, Vec<GeoPlace>>,
}

impl CodeResolver {
    pub fn new(places: &[GeoPlace], manual_codes: &[ManualCode]) -> CodeResolver {
        let mut reference: HashMap<VillageKey, Vec<GeoPlace>> = HashMap::new();
        for p in places.iter() {
            let key = VillageKey::new(&p.countyname, &p.townname, &p.villname);
            let candidates = reference.entry(key).or_default();
            // The same village may be listed several times.
            if !candidates.iter().any(|c| c.villcode == p.villcode) {
                candidates.push(p.clone());
            }
        }

        let mut manual: HashMap<VillageKey, ManualCode> = HashMap::new();
        for m in manual_codes.iter() {
            if let Some(previous) = manual.get(&m.key) {
                if previous.villcodes != m.villcodes {
                    warn!(
                        "CodeResolver: conflicting manual entries for {}: keeping {:?}, ignoring {:?}",
                        m.key.full_label(),
                        previous.villcodes,
                        m.villcodes
                    );
                }
                continue;
            }
            manual.insert(m.key.clone(), m.clone());
        }

        let mut manual_any_county: HashMap<String, ManualCode> = HashMap::new();
        for m in manual.values().filter(|m| m.key.county.is_empty()) {
            manual_any_county
                .entry(m.key.cunli())
                .or_insert_with(|| m.clone());
        }
        debug!(
            "CodeResolver: {} reference keys, {} manual entries ({} without county)",
            reference.len(),
            manual.len(),
            manual_any_county.len()
        );
        CodeResolver {
            manual,
            manual_any_county,
            reference,
        }
    }

    pub fn num_manual(&self) -> usize {
        self.manual.len()
    }

    pub fn resolve(&self, county: &str, district: &str, village: &str) -> Resolution {
        self.resolve_key(&VillageKey::new(county, district, village))
    }

    /// The key is expected to be normalized already.
    ///
    /// A manual entry without a county applies to the village of that district and
    /// name in any county, unless an entry with the county exists.
    pub fn resolve_key(&self, key: &VillageKey) -> Resolution {
        let manual = self
            .manual
            .get(key)
            .or_else(|| self.manual_any_county.get(&key.cunli()));
        if let Some(m) = manual {
            if let Some(Resolution::Reference(p)) = self.lookup_reference(key) {
                if p.villcode != m.primary() {
                    debug!(
                        "resolve: {}: manual code {} differs from reference code {}",
                        key.full_label(),
                        m.primary(),
                        p.villcode
                    );
                }
            }
            return Resolution::Manual(m.clone());
        }
        match self.lookup_reference(key) {
            Some(res) => res,
            None => Resolution::Unresolved(ResolutionError::MissingCounty),
        }
    }

    fn lookup_reference(&self, key: &VillageKey) -> Option<Resolution> {
        if key.county.is_empty() {
            return None;
        }
        let res = match self.reference.get(key).map(|v| v.as_slice()) {
            None | Some([]) => Resolution::Unresolved(ResolutionError::NotFound),
            Some([place]) => Resolution::Reference(place.clone()),
            Some(places) => {
                let mut codes: Vec<String> = places.iter().map(|p| p.villcode.clone()).collect();
                codes.sort();
                Resolution::Unresolved(ResolutionError::Ambiguous(codes))
            }
        };
        Some(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(code: &str, county: &str, town: &str, vill: &str) -> GeoPlace {
        GeoPlace {
            villcode: code.to_string(),
            countycode: code[..5].to_string(),
            towncode: code[..8].to_string(),
            countyname: county.to_string(),
            townname: town.to_string(),
            villname: vill.to_string(),
        }
    }

    fn manual(county: &str, district: &str, village: &str, codes: &[&str]) -> ManualCode {
        ManualCode::new(
            VillageKey::new(county, district, village),
            codes.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn reference_lookup_ignores_tai_variant() {
        let r = CodeResolver::new(&[place("63000020001", "臺北市", "信義區", "西村里")], &[]);
        let a = r.resolve("台北市", "信義區", "西村里");
        let b = r.resolve("臺北市", " 信義區", "西村里 ");
        assert_eq!(a.villcode(), Some("63000020001"));
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_listing_is_not_ambiguous() {
        let p = place("63000020001", "臺北市", "信義區", "西村里");
        let r = CodeResolver::new(&[p.clone(), p], &[]);
        assert_eq!(
            r.resolve("台北市", "信義區", "西村里").villcode(),
            Some("63000020001")
        );
    }

    #[test]
    fn ambiguous_and_missing() {
        let r = CodeResolver::new(
            &[
                place("10007010001", "彰化縣", "彰化市", "中正里"),
                place("10007010099", "彰化縣", "彰化市", "中正里"),
            ],
            &[],
        );
        assert_eq!(
            r.resolve("彰化縣", "彰化市", "中正里"),
            Resolution::Unresolved(ResolutionError::Ambiguous(vec![
                "10007010001".to_string(),
                "10007010099".to_string()
            ]))
        );
        assert_eq!(
            r.resolve("彰化縣", "彰化市", "不存在里"),
            Resolution::Unresolved(ResolutionError::NotFound)
        );
        assert_eq!(
            r.resolve("", "彰化市", "中正里"),
            Resolution::Unresolved(ResolutionError::MissingCounty)
        );
    }

    #[test]
    fn manual_entry_wins_and_is_stable() {
        let places = [place("65000040036", "新北市", "永和區", "光復里")];
        let before = CodeResolver::new(&places, &[]);
        let unresolved = before.resolve("新北市", "永和區", "新生里");
        assert_eq!(unresolved, before.resolve("新北市", "永和區", "新生里"));
        assert_eq!(unresolved.villcode(), None);

        let after = CodeResolver::new(
            &places,
            &[
                manual("新北市", "永和區", "新生里", &["65000040099"]),
                // Overrides the reference data as well.
                manual("新北市", "永和區", "光復里", &["65000040777"]),
            ],
        );
        for _ in 0..2 {
            let r = after.resolve("新北市", "永和區", "新生里");
            assert!(r.is_manual());
            assert_eq!(r.villcode(), Some("65000040099"));
            assert_eq!(
                after.resolve("新北市", "永和區", "光復里").villcode(),
                Some("65000040777")
            );
        }
    }

    #[test]
    fn manual_entry_without_county_applies_to_any_county() {
        let places = [place("10018010050", "新竹市", "東區", "關新里")];
        let r = CodeResolver::new(
            &places,
            &[
                manual("", "東區", "關新里", &["10018010050"]),
                manual("", "東區", "空白里", &["10018010099"]),
                manual("新竹市", "東區", "空白里", &["10018010077"]),
            ],
        );
        let res = r.resolve("新竹市", "東區", "關新里");
        assert!(res.is_manual());
        assert_eq!(res.villcode(), Some("10018010050"));
        assert_eq!(r.resolve("臺南市", "東區", "關新里").villcode(), Some("10018010050"));
        // An entry with the county takes precedence.
        assert_eq!(r.resolve("新竹市", "東區", "空白里").villcode(), Some("10018010077"));
        assert_eq!(r.resolve("嘉義市", "東區", "空白里").villcode(), Some("10018010099"));
    }

    #[test]
    fn manual_entry_without_county() {
        let r = CodeResolver::new(&[], &[manual("", "東區", "某里", &["1", "2"])]);
        let res = r.resolve("", "東區", "某里");
        assert_eq!(res.villcode(), Some("1"));
        assert_eq!(res.all_villcodes(), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn conflicting_manual_entries_keep_first() {
        let r = CodeResolver::new(
            &[],
            &[
                manual("新北市", "永和區", "新生里", &["1"]),
                manual("臺北市", "永和區", "新生里", &["1"]),
                manual("新北市", "永和區", "新生里", &["2"]),
            ],
        );
        assert_eq!(r.num_manual(), 2);
        assert_eq!(r.resolve("新北市", "永和區", "新生里").villcode(), Some("1"));
    }
}
