mod config;
pub mod manual;
mod normalize;
mod resolver;
use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use crate::config::*;
pub use crate::normalize::*;
pub use crate::resolver::CodeResolver;

impl SumFields {
    fn add(&mut self, r: &StationRecord) {
        self.agree_votes += r.agree_votes;
        self.disagree_votes += r.disagree_votes;
        self.valid_votes += r.valid_votes;
        self.invalid_votes += r.invalid_votes;
        self.total_voters += r.total_voters;
        self.ballots_not_cast += r.ballots_not_cast;
        self.ballots_issued += r.ballots_issued;
        self.unused_ballots += r.unused_ballots;
        self.eligible_voters += r.eligible_voters;
    }
}

impl VillageRecord {
    /// A new village, initialized with its first record.
    pub fn new(key: VillageKey, first: StationRecord) -> VillageRecord {
        let mut v = VillageRecord {
            key,
            resolution: None,
            sum_fields: SumFields::default(),
            records: Vec::new(),
            turnout_sum: 0.0,
        };
        v.push(first);
        v
    }

    /// Appends a record and updates the sums.
    pub fn push(&mut self, record: StationRecord) {
        self.sum_fields.add(&record);
        self.turnout_sum += record.turnout_rate;
        self.records.push(record);
        self.refresh_rates();
    }

    fn refresh_rates(&mut self) {
        // The mean of the station rates, not the rate of the totals.
        self.sum_fields.average_turnout_rate = if self.records.is_empty() {
            0.0
        } else {
            self.turnout_sum / self.records.len() as f64
        };
        self.sum_fields.weighted_turnout_rate =
            percentage(self.sum_fields.total_voters, self.sum_fields.eligible_voters);
    }

    /// Recomputes all the sums from the records.
    fn recompute(&mut self) {
        self.sum_fields = SumFields::default();
        self.turnout_sum = 0.0;
        for r in self.records.iter() {
            self.sum_fields.add(r);
            self.turnout_sum += r.turnout_rate;
        }
        self.refresh_rates();
    }

    pub fn cunli(&self) -> String {
        self.key.cunli()
    }

    pub fn villcode(&self) -> Option<&str> {
        self.resolution.as_ref().and_then(|r| r.villcode())
    }
}

/// Groups the station rows by village.
///
/// The villages are returned in the order in which they were first seen, and the
/// records of each village keep their input order.
pub fn aggregate(rows: Vec<StationRow>) -> Vec<VillageRecord> {
    info!("aggregate: processing {} station rows", rows.len());
    let mut index: HashMap<VillageKey, usize> = HashMap::new();
    let mut villages: Vec<VillageRecord> = Vec::new();
    for row in rows {
        match index.get(&row.key) {
            Some(&idx) => villages[idx].push(row.record),
            None => {
                index.insert(row.key.clone(), villages.len());
                villages.push(VillageRecord::new(row.key, row.record));
            }
        }
    }
    // Empty villages are never emitted.
    villages.retain(|v| !v.records.is_empty());
    info!("aggregate: {} villages", villages.len());
    villages
}

/// Attaches a resolution to every village.
///
/// Returns the villages that could not be resolved, in input order.
pub fn resolve_all(villages: &mut [VillageRecord], resolver: &CodeResolver) -> Vec<VillageKey> {
    let mut unresolved: Vec<VillageKey> = Vec::new();
    for v in villages.iter_mut() {
        let res = resolver.resolve_key(&v.key);
        if let Resolution::Unresolved(err) = &res {
            warn!("resolve_all: no VILLCODE for {}: {}", v.key.full_label(), err);
            unresolved.push(v.key.clone());
        } else {
            debug!(
                "resolve_all: {} -> {:?}",
                v.key.full_label(),
                res.villcode()
            );
        }
        v.resolution = Some(res);
    }
    unresolved
}

/// Applies the corrections to the resolved villages.
///
/// Returns the codes of the corrected villages.
pub fn apply_corrections(
    villages: &mut [VillageRecord],
    corrections: &[VoteCorrection],
) -> Vec<String> {
    let mut applied: Vec<String> = Vec::new();
    for c in corrections.iter() {
        for v in villages
            .iter_mut()
            .filter(|v| v.villcode() == Some(c.villcode.as_str()))
        {
            match c.kind {
                CorrectionKind::SwapAgreeDisagree => {
                    info!(
                        "apply_corrections: {} ({}): exchanging agree/disagree votes",
                        c.villcode,
                        v.key.full_label()
                    );
                    for r in v.records.iter_mut() {
                        std::mem::swap(&mut r.agree_votes, &mut r.disagree_votes);
                    }
                }
            }
            v.recompute();
            applied.push(c.villcode.clone());
        }
    }
    applied
}

/// Statistics per recall case, sorted by case label.
pub fn case_statistics(villages: &[VillageRecord]) -> Vec<CaseStats> {
    #[derive(Default)]
    struct Acc {
        stats: [u64; 6],
        villages: BTreeSet<String>,
        districts: BTreeSet<String>,
        codes: BTreeSet<String>,
    }

    let mut by_case: BTreeMap<String, Acc> = BTreeMap::new();
    for v in villages.iter() {
        let codes = v
            .resolution
            .as_ref()
            .map(|r| r.all_villcodes())
            .unwrap_or_default();
        for r in v.records.iter() {
            let acc = by_case.entry(r.recall_case.clone()).or_default();
            for (slot, x) in acc.stats.iter_mut().zip([
                r.agree_votes,
                r.disagree_votes,
                r.valid_votes,
                r.total_voters,
                r.eligible_voters,
                1,
            ]) {
                *slot += x;
            }
            acc.villages.insert(v.cunli());
            acc.districts.insert(v.key.district.clone());
            acc.codes.extend(codes.iter().cloned());
        }
    }

    by_case
        .into_iter()
        .map(|(recall_case, acc)| {
            let s = acc.stats;
            CaseStats {
                display_name: display_case_name(&recall_case),
                recall_case,
                agree_votes: s[0],
                disagree_votes: s[1],
                valid_votes: s[2],
                total_voters: s[3],
                eligible_voters: s[4],
                polling_stations: s[5],
                villages: acc.villages.len() as u64,
                districts: acc.districts.len() as u64,
                village_codes: acc.codes.into_iter().collect(),
                cunli_keys: acc.villages.into_iter().collect(),
                agree_percentage: percentage(s[0], s[2]),
                disagree_percentage: percentage(s[1], s[2]),
                turnout_rate: percentage(s[3], s[4]),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn station(
        case: &str,
        id: &str,
        agree: u64,
        disagree: u64,
        eligible: u64,
        turnout: f64,
    ) -> StationRecord {
        StationRecord {
            polling_station: id.to_string(),
            recall_case: case.to_string(),
            agree_votes: agree,
            disagree_votes: disagree,
            valid_votes: agree + disagree,
            invalid_votes: 1,
            total_voters: agree + disagree + 1,
            ballots_not_cast: 0,
            ballots_issued: agree + disagree + 1,
            unused_ballots: 3,
            eligible_voters: eligible,
            turnout_rate: turnout,
        }
    }

    fn row(county: &str, district: &str, village: &str, record: StationRecord) -> StationRow {
        StationRow {
            key: VillageKey::new(county, district, village),
            record,
        }
    }

    #[test]
    fn sums_and_mean() {
        init();
        let rows = vec![
            row("台北市", "信義區", "西村里", station("c", "001", 172, 395, 871, 65.56)),
            row("台北市", "信義區", "東村里", station("c", "002", 10, 20, 40, 77.5)),
            row("臺北市", "信義區", "西村里", station("c", "003", 519, 100, 1000, 62.0)),
        ];
        let villages = aggregate(rows);
        assert_eq!(villages.len(), 2);
        let v = &villages[0];
        assert_eq!(v.cunli(), "信義區_西村里");
        assert_eq!(v.key.county, "台北市");
        let ids: Vec<&str> = v.records.iter().map(|r| r.polling_station.as_str()).collect();
        assert_eq!(ids, vec!["001", "003"]);
        assert_eq!(v.sum_fields.agree_votes, 691);
        assert_eq!(
            v.sum_fields.valid_votes,
            v.records.iter().map(|r| r.valid_votes).sum::<u64>()
        );
        assert_eq!(v.sum_fields.eligible_voters, 1871);
        assert_eq!(v.sum_fields.unused_ballots, 6);
        assert!((v.sum_fields.average_turnout_rate - (65.56 + 62.0) / 2.0).abs() < 1e-9);
        assert_eq!(
            v.sum_fields.weighted_turnout_rate,
            percentage(v.sum_fields.total_voters, 1871)
        );
    }

    #[test]
    fn zero_eligible_voters() {
        let v = aggregate(vec![
            row("台北市", "信義區", "西村里", station("c", "1", 0, 0, 0, 0.0)),
            row("台北市", "信義區", "西村里", station("c", "2", 0, 0, 0, 0.0)),
        ]);
        assert_eq!(v[0].sum_fields.average_turnout_rate, 0.0);
        assert_eq!(v[0].sum_fields.weighted_turnout_rate, 0.0);
    }

    #[test]
    fn no_rows_no_villages() {
        assert!(aggregate(vec![]).is_empty());
    }

    #[test]
    fn resolution_and_corrections() {
        init();
        let mut villages = aggregate(vec![
            row("新北市", "永和區", "光復里", station("c", "1", 10, 30, 50, 80.0)),
            row("新北市", "永和區", "光復里", station("c", "2", 5, 7, 20, 65.0)),
            row("新北市", "永和區", "無名里", station("c", "3", 1, 1, 5, 60.0)),
        ]);
        let resolver = CodeResolver::new(
            &[GeoPlace {
                villcode: "65000040036".to_string(),
                countycode: "65000".to_string(),
                towncode: "65000040".to_string(),
                countyname: "新北市".to_string(),
                townname: "永和區".to_string(),
                villname: "光復里".to_string(),
            }],
            &[],
        );
        let unresolved = resolve_all(&mut villages, &resolver);
        assert_eq!(unresolved, vec![VillageKey::new("新北市", "永和區", "無名里")]);
        assert_eq!(villages[0].villcode(), Some("65000040036"));
        assert_eq!(villages[1].villcode(), None);

        let applied = apply_corrections(
            &mut villages,
            &[VoteCorrection {
                villcode: "65000040036".to_string(),
                kind: CorrectionKind::SwapAgreeDisagree,
            }],
        );
        assert_eq!(applied, vec!["65000040036".to_string()]);
        let v = &villages[0];
        assert_eq!(v.sum_fields.agree_votes, 37);
        assert_eq!(v.sum_fields.disagree_votes, 15);
        assert_eq!(v.records[0].agree_votes, 30);
        assert!((v.sum_fields.average_turnout_rate - 72.5).abs() < 1e-9);
        // The unresolved village is left alone.
        assert_eq!(villages[1].sum_fields.agree_votes, 1);
    }

    #[test]
    fn statistics_per_case() {
        let case_a = "第11屆立法委員(臺北市第7選舉區)王鴻薇罷免案各投開票所投開票結果表";
        let mut villages = aggregate(vec![
            row("台北市", "信義區", "西村里", station(case_a, "1", 10, 30, 50, 80.0)),
            row("台北市", "信義區", "東村里", station(case_a, "2", 20, 0, 100, 21.0)),
            row("台北市", "松山區", "東村里", station(case_a, "3", 0, 0, 0, 0.0)),
            row("新竹市", "東區", "某里", station("other", "4", 1, 2, 10, 40.0)),
        ]);
        let resolver = CodeResolver::new(
            &[],
            &[ManualCode::new(
                VillageKey::new("台北市", "信義區", "西村里"),
                vec!["2".to_string(), "1".to_string()],
            )
            .unwrap()],
        );
        resolve_all(&mut villages, &resolver);
        let stats = case_statistics(&villages);
        assert_eq!(stats.len(), 2);
        let a = &stats[1];
        assert_eq!(a.recall_case, case_a);
        assert_eq!(a.display_name, "立委王鴻薇罷免案(台北市第7選舉區)");
        assert_eq!(a.agree_votes, 30);
        assert_eq!(a.valid_votes, 60);
        assert_eq!(a.polling_stations, 3);
        assert_eq!(a.villages, 3);
        assert_eq!(a.districts, 2);
        assert_eq!(a.village_codes, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(a.agree_percentage, 50.0);
        assert_eq!(a.turnout_rate, percentage(63, 150));
        assert_eq!(stats[0].recall_case, "other");
    }
}
