use regex::Regex;
use std::sync::OnceLock;

/// Normalizes a place name so that the spellings found in the spreadsheets
/// and in the reference dataset compare equal:
/// - surrounding whitespace is removed
/// - 臺 is written 台
/// - full-width ASCII forms and the ideographic space become half-width
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '臺' => '台',
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn district_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)(市|縣)(?:第\d+)?選舉區\)").unwrap())
}

fn mayor_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+市)第\d+屆市長(\w+)罷免案").unwrap())
}

fn legislator_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"第\d+屆立法委員\(([^)]+)\)(\w+)罷免案").unwrap())
}

/// Finds the county (or city) a recall case takes place in.
///
/// Legislator recalls name their electoral district in parentheses, for example
/// `(臺北市第7選舉區)`. Mayor recalls name the city directly.
/// The returned name is normalized.
pub fn county_from_recall_case(recall_case: &str) -> Option<String> {
    let label = normalize_name(recall_case);
    if let Some(caps) = district_pattern().captures(&label) {
        return Some(normalize_name(&format!("{}{}", &caps[1], &caps[2])));
    }
    mayor_pattern()
        .captures(&label)
        .map(|caps| normalize_name(&caps[1]))
}

/// A short name for a recall case, suitable for a selection list.
pub fn display_case_name(recall_case: &str) -> String {
    let label = normalize_name(&recall_case.replace("各投開票所投開票結果表", ""));
    if let Some(caps) = mayor_pattern().captures(&label) {
        return format!("{}市長{}罷免案", &caps[1], &caps[2]);
    }
    if let Some(caps) = legislator_pattern().captures(&label) {
        return format!("立委{}罷免案({})", &caps[2], &caps[1]);
    }
    label
}

/// Rounds to 2 decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// A percentage, rounded to 2 decimals. Zero when the denominator is zero.
pub fn percentage(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        round2(num as f64 / denom as f64 * 100.0)
    }
}
