use serde::Serialize;

/// Integer percentage rounding used throughout the app:
/// `floor(x + 0.5)`, i.e. half-up on non-negative input.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Numeric value of one checklist cell. Numeric strings parse as-is;
/// categorical entries go through a fixed table; anything else counts as 0.
pub fn item_value(raw: &str) -> f64 {
    let t = raw.trim();
    if let Ok(v) = t.parse::<f64>() {
        if v.is_finite() && v >= 0.0 {
            return v;
        }
        return 0.0;
    }
    match t.to_ascii_uppercase().as_str() {
        "B" | "YA" => 3.0,
        "C" => 2.0,
        "K" => 1.0,
        "T" | "TIDAK" => 0.0,
        _ => 0.0,
    }
}

pub fn total_score<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().map(item_value).sum()
}

/// Percentage of a raw total against the instrument maximum.
/// Guarded: a zero or negative maximum yields 0.
pub fn percentage(total: f64, max_score: f64) -> i64 {
    if max_score <= 0.0 {
        return 0;
    }
    round_half_up(100.0 * total / max_score)
}

/// Composite score: average of already-computed percentages, rounded half-up.
/// Never a re-sum of raw scores across differently-scaled instruments.
pub fn composite_percentage(parts: &[i64]) -> i64 {
    if parts.is_empty() {
        return 0;
    }
    let sum: i64 = parts.iter().sum();
    round_half_up(sum as f64 / parts.len() as f64)
}

/// Ordered threshold lookup, highest threshold first; first entry whose
/// threshold the value meets wins. Tables must end with a 0 threshold so
/// every value resolves.
pub fn lookup_threshold<'a, T>(value: i64, table: &'a [(i64, T)]) -> &'a T {
    for (min, entry) in table {
        if value >= *min {
            return entry;
        }
    }
    // Unreachable for well-formed tables; fall back to the last band.
    &table[table.len() - 1].1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
    #[serde(rename = "Sangat Baik")]
    SangatBaik,
    #[serde(rename = "Baik")]
    Baik,
    #[serde(rename = "Cukup")]
    Cukup,
    #[serde(rename = "Kurang")]
    Kurang,
}

/// Qualitative band cut-offs. Deployment-configurable via settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandThresholds {
    pub sangat_baik: i64,
    pub baik: i64,
    pub cukup: i64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            sangat_baik: 91,
            baik: 81,
            cukup: 71,
        }
    }
}

impl BandThresholds {
    pub fn band(&self, percent: i64) -> Band {
        let table = [
            (self.sangat_baik, Band::SangatBaik),
            (self.baik, Band::Baik),
            (self.cukup, Band::Cukup),
            (0, Band::Kurang),
        ];
        *lookup_threshold(percent, &table)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub total_score: f64,
    pub percentage: i64,
    pub band: Band,
}

pub fn aggregate<'a, I>(values: I, max_score: f64, thresholds: &BandThresholds) -> AggregateResult
where
    I: IntoIterator<Item = &'a str>,
{
    let total = total_score(values);
    let percent = percentage(total, max_score);
    AggregateResult {
        total_score: total,
        percentage: percent,
        band: thresholds.band(percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorical_values_map_through_fixed_table() {
        assert_eq!(item_value("B"), 3.0);
        assert_eq!(item_value("c"), 2.0);
        assert_eq!(item_value("K"), 1.0);
        assert_eq!(item_value("T"), 0.0);
        assert_eq!(item_value("YA"), 3.0);
        assert_eq!(item_value("TIDAK"), 0.0);
        assert_eq!(item_value("unknown"), 0.0);
        assert_eq!(item_value("2"), 2.0);
        assert_eq!(item_value(" 4 "), 4.0);
        assert_eq!(item_value("-1"), 0.0);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(13.0, 26.0), 50);
        assert_eq!(percentage(25.0, 26.0), 96); // 96.15...
        assert_eq!(percentage(22.0, 48.0), 46); // 45.83...
        assert_eq!(percentage(11.0, 24.0), 46); // 45.833...
        assert_eq!(percentage(33.0, 46.0), 72); // 71.7...
    }

    #[test]
    fn percentage_guards_zero_max_and_empty_scores() {
        assert_eq!(percentage(0.0, 26.0), 0);
        assert_eq!(percentage(10.0, 0.0), 0);
        assert_eq!(total_score(std::iter::empty::<&str>()), 0.0);
    }

    #[test]
    fn band_lookup_is_monotonic_at_default_thresholds() {
        let t = BandThresholds::default();
        assert_eq!(t.band(100), Band::SangatBaik);
        assert_eq!(t.band(91), Band::SangatBaik);
        assert_eq!(t.band(90), Band::Baik);
        assert_eq!(t.band(81), Band::Baik);
        assert_eq!(t.band(80), Band::Cukup);
        assert_eq!(t.band(71), Band::Cukup);
        assert_eq!(t.band(70), Band::Kurang);
        assert_eq!(t.band(0), Band::Kurang);
    }

    #[test]
    fn composite_averages_percentages_not_raw_scores() {
        assert_eq!(composite_percentage(&[80, 70, 90, 60, 100]), 80);
        assert_eq!(composite_percentage(&[]), 0);
        // 83.5 rounds up under half-up.
        assert_eq!(composite_percentage(&[84, 83]), 84);
    }

    #[test]
    fn aggregate_over_empty_map_is_lowest_band() {
        let r = aggregate(
            std::iter::empty::<&str>(),
            26.0,
            &BandThresholds::default(),
        );
        assert_eq!(r.total_score, 0.0);
        assert_eq!(r.percentage, 0);
        assert_eq!(r.band, Band::Kurang);
    }

    #[test]
    fn custom_thresholds_move_band_edges() {
        let t = BandThresholds {
            sangat_baik: 86,
            baik: 76,
            cukup: 60,
        };
        assert_eq!(t.band(86), Band::SangatBaik);
        assert_eq!(t.band(85), Band::Baik);
        assert_eq!(t.band(60), Band::Cukup);
        assert_eq!(t.band(59), Band::Kurang);
    }
}
