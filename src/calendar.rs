use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const PLACEHOLDER: &str = "...";
const UNKNOWN_MONTH: &str = "???";

const MID_THRESHOLD: f64 = 0.4;
const LATE_THRESHOLD: f64 = 0.7;
// Absorbs binary representation error, e.g. 1.4 - 1.0 == 0.3999999999999999.
const FRACTION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineConfig {
    pub start_year: i32,
    pub start_month: i32,
    pub end_year: i32,
    pub end_month: i32,
}

impl TimelineConfig {
    pub fn new(start_year: i32, start_month: i32, end_year: i32, end_month: i32) -> Self {
        Self {
            start_year,
            start_month,
            end_year,
            end_month,
        }
    }

    pub fn for_year(year: i32) -> Self {
        Self::new(year, 1, year, 12)
    }

    /// Number of month columns; zero for reversed ranges.
    pub fn column_count(&self) -> usize {
        let count = (i64::from(self.end_year) - i64::from(self.start_year)) * 12
            + (i64::from(self.end_month) - i64::from(self.start_month))
            + 1;
        usize::try_from(count).unwrap_or(0)
    }

    pub fn shifted(&self, months: i32) -> Self {
        let (start_year, start_month) = add_months(self.start_year, self.start_month, months);
        let (end_year, end_month) = add_months(self.end_year, self.end_month, months);
        Self::new(start_year, start_month, end_year, end_month)
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self::for_year(Local::now().year())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineColumn {
    pub label: String,
    pub month: i32,
    pub year: i32,
}

pub fn build_timeline_columns(config: &TimelineConfig) -> Vec<TimelineColumn> {
    let total = config.column_count();
    let mut columns = Vec::with_capacity(total);
    let mut month = config.start_month;
    let mut year = config.start_year;

    for _ in 0..total {
        columns.push(TimelineColumn {
            label: format!("{} {:02}", month_name(i64::from(month)), year.rem_euclid(100)),
            month,
            year,
        });
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }

    columns
}

pub fn date_to_view_index(month: i32, year: i32, config: &TimelineConfig) -> i64 {
    (i64::from(year) - i64::from(config.start_year)) * 12
        + (i64::from(month) - i64::from(config.start_month))
        + 1
}

/// Fractional counterpart of [`date_to_view_index`]: `3.5` in the start
/// month's year sits halfway through the third column of a January start.
pub fn view_position(month: f64, year: i32, config: &TimelineConfig) -> f64 {
    let whole = month.floor();
    date_to_view_index(whole as i32, year, config) as f64 + (month - whole)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthPeriod {
    Early,
    Mid,
    Late,
}

impl MonthPeriod {
    pub fn classify(fraction: f64) -> Self {
        if fraction < MID_THRESHOLD - FRACTION_TOLERANCE {
            MonthPeriod::Early
        } else if fraction < LATE_THRESHOLD - FRACTION_TOLERANCE {
            MonthPeriod::Mid
        } else {
            MonthPeriod::Late
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MonthPeriod::Early => "Early",
            MonthPeriod::Mid => "Mid",
            MonthPeriod::Late => "Late",
        }
    }
}

pub fn format_fuzzy_date(value: f64, year: i32) -> String {
    if value == 0.0 || !value.is_finite() || year == 0 {
        return PLACEHOLDER.to_string();
    }

    let (month_index, fraction) = split_month(value);
    format!(
        "{} {} {}",
        MonthPeriod::classify(fraction).label(),
        month_name(month_index),
        year
    )
}

/// Fuzzy label for a fractional view index, using the timeline's own column
/// labels. Indices with no matching column fall back to the last column.
pub fn format_view_position(value: f64, columns: &[TimelineColumn]) -> String {
    if value == 0.0 || !value.is_finite() {
        return PLACEHOLDER.to_string();
    }

    let (view_index, fraction) = split_month(value);
    let column = usize::try_from(view_index - 1)
        .ok()
        .and_then(|index| columns.get(index))
        .or_else(|| columns.last());

    match column {
        Some(column) => format!("{} {}", MonthPeriod::classify(fraction).label(), column.label),
        None => PLACEHOLDER.to_string(),
    }
}

/// A calendar date as a fractional month: the 16th of a 31-day March is
/// roughly `3.48`.
pub fn calendar_position(date: NaiveDate) -> (f64, i32) {
    let days = f64::from(days_in_month(date.year(), date.month()));
    let month = f64::from(date.month()) + f64::from(date.day0()) / days;
    (month, date.year())
}

pub fn parse_year_month(input: &str) -> Result<(i32, i32), String> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", input.trim()), "%Y-%m-%d")
        .map_err(|err| format!("invalid month {input:?} (expected YYYY-MM): {err}"))?;
    Ok((date.year(), date.month() as i32))
}

pub fn month_name(month_index: i64) -> &'static str {
    usize::try_from(month_index - 1)
        .ok()
        .and_then(|index| MONTH_NAMES.get(index).copied())
        .unwrap_or(UNKNOWN_MONTH)
}

fn split_month(value: f64) -> (i64, f64) {
    let floor = value.floor();
    (floor as i64, value - floor)
}

fn add_months(year: i32, month: i32, delta: i32) -> (i32, i32) {
    let absolute = i64::from(year) * 12 + i64::from(month) - 1 + i64::from(delta);
    let year = absolute.div_euclid(12);
    let month = absolute.rem_euclid(12) + 1;
    (
        i32::try_from(year).unwrap_or(if year < 0 { i32::MIN } else { i32::MAX }),
        month as i32,
    )
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|date| date.pred_opt())
        .map(|date| date.day())
        .unwrap_or(30)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        TimelineConfig, build_timeline_columns, calendar_position, date_to_view_index,
        format_fuzzy_date, format_view_position, parse_year_month, view_position, MONTH_NAMES,
    };

    #[test]
    fn start_month_maps_to_one_and_steps_per_month() {
        let config = TimelineConfig::new(2025, 6, 2026, 6);
        assert_eq!(date_to_view_index(6, 2025, &config), 1);
        assert_eq!(date_to_view_index(12, 2025, &config), 7);
        assert_eq!(date_to_view_index(1, 2026, &config), 8);
        assert_eq!(date_to_view_index(6, 2026, &config), 13);
        assert_eq!(date_to_view_index(5, 2025, &config), 0);
        assert_eq!(date_to_view_index(1, 2025, &config), -4);
        assert_eq!(date_to_view_index(12, 2024, &config), -5);
    }

    #[test]
    fn consecutive_months_differ_by_one_across_year_rollovers() {
        let config = TimelineConfig::new(2024, 3, 2027, 2);
        let mut previous = None;
        for year in 2022..2030 {
            for month in 1..=12 {
                let index = date_to_view_index(month, year, &config);
                if let Some(previous) = previous {
                    assert_eq!(index, previous + 1, "{month}/{year}");
                }
                previous = Some(index);
            }
        }
    }

    #[test]
    fn out_of_range_months_are_plain_arithmetic() {
        let config = TimelineConfig::for_year(2025);
        assert_eq!(date_to_view_index(0, 2025, &config), 0);
        assert_eq!(date_to_view_index(13, 2025, &config), 13);
        assert_eq!(date_to_view_index(-1, 2025, &config), -1);
    }

    #[test]
    fn fractional_positions_follow_the_same_formula() {
        let config = TimelineConfig::for_year(2025);
        assert_eq!(view_position(3.5, 2025, &config), 3.5);
        assert_eq!(view_position(1.0, 2026, &config), 13.0);
    }

    #[test]
    fn builds_one_column_per_month_with_rollover() {
        let columns = build_timeline_columns(&TimelineConfig::new(2025, 11, 2026, 2));
        let labels = columns.iter().map(|column| column.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Nov 25", "Dec 25", "Jan 26", "Feb 26"]);
        assert_eq!(columns[2].month, 1);
        assert_eq!(columns[2].year, 2026);
    }

    #[test]
    fn column_count_matches_formula_or_is_empty() {
        let cases = [
            (TimelineConfig::for_year(2025), 12),
            (TimelineConfig::new(2024, 1, 2029, 12), 72),
            (TimelineConfig::new(2025, 5, 2025, 5), 1),
            (TimelineConfig::new(2025, 5, 2025, 4), 0),
            (TimelineConfig::new(2026, 1, 2025, 1), 0),
        ];
        for (config, expected) in cases {
            assert_eq!(build_timeline_columns(&config).len(), expected);
            assert_eq!(config.column_count(), expected);
        }
    }

    #[test]
    fn shifting_moves_both_ends() {
        let config = TimelineConfig::new(2025, 11, 2026, 2).shifted(3);
        assert_eq!(config, TimelineConfig::new(2026, 2, 2026, 5));
        let back = config.shifted(-14);
        assert_eq!(back, TimelineConfig::new(2024, 12, 2025, 3));
    }

    #[test]
    fn fuzzy_dates_for_whole_months() {
        assert_eq!(format_fuzzy_date(1.0, 2025), "Early Jan 2025");
        assert_eq!(format_fuzzy_date(12.0, 2025), "Early Dec 2025");
        assert_eq!(format_fuzzy_date(3.5, 2025), "Mid Mar 2025");
        assert_eq!(format_fuzzy_date(8.9, 2025), "Late Aug 2025");
        assert_eq!(format_fuzzy_date(12.9, 2027), "Late Dec 2027");
    }

    #[test]
    fn fuzzy_period_boundaries_hold_for_every_month() {
        for month in 1..=12 {
            let month_value = f64::from(month);
            assert!(format_fuzzy_date(month_value + 0.399, 2025).starts_with("Early"));
            assert!(format_fuzzy_date(month_value + 0.4, 2025).starts_with("Mid"));
            assert!(format_fuzzy_date(month_value + 0.699, 2025).starts_with("Mid"));
            assert!(format_fuzzy_date(month_value + 0.7, 2025).starts_with("Late"));
        }
        assert_eq!(format_fuzzy_date(5.39, 2025), "Early May 2025");
        assert_eq!(format_fuzzy_date(5.69, 2025), "Mid May 2025");
        assert_eq!(format_fuzzy_date(5.99, 2025), "Late May 2025");
    }

    #[test]
    fn fuzzy_placeholders() {
        assert_eq!(format_fuzzy_date(0.0, 2025), "...");
        assert_eq!(format_fuzzy_date(f64::NAN, 2025), "...");
        assert_eq!(format_fuzzy_date(f64::INFINITY, 2025), "...");
        assert_eq!(format_fuzzy_date(5.5, 0), "...");
        assert_eq!(format_fuzzy_date(0.0, 0), "...");
    }

    #[test]
    fn fuzzy_unknown_months() {
        assert_eq!(format_fuzzy_date(13.0, 2025), "Early ??? 2025");
        assert_eq!(format_fuzzy_date(100.0, 2025), "Early ??? 2025");
        assert_eq!(format_fuzzy_date(-1.0, 2025), "Early ??? 2025");
        // floor(-1.5) is -2, leaving a fraction of 0.5.
        assert_eq!(format_fuzzy_date(-1.5, 2025), "Mid ??? 2025");
        assert_eq!(format_fuzzy_date(0.5, 2025), "Mid ??? 2025");
    }

    #[test]
    fn view_positions_use_column_labels() {
        let columns = build_timeline_columns(&TimelineConfig::new(2025, 11, 2026, 2));
        assert_eq!(format_view_position(1.0, &columns), "Early Nov 25");
        assert_eq!(format_view_position(3.75, &columns), "Late Jan 26");
        assert_eq!(format_view_position(40.2, &columns), "Early Feb 26");
        assert_eq!(format_view_position(0.0, &columns), "...");
        assert_eq!(format_view_position(2.0, &[]), "...");
    }

    #[test]
    fn calendar_position_is_fraction_of_month() {
        let (month, year) = calendar_position(NaiveDate::from_ymd_opt(2026, 2, 15).expect("valid date"));
        assert_eq!(year, 2026);
        assert!((month - 2.5).abs() < 1e-9);
        let (month, _) = calendar_position(NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date"));
        assert_eq!(month, 3.0);
    }

    #[test]
    fn parses_year_month_arguments() {
        assert_eq!(parse_year_month("2026-03"), Ok((2026, 3)));
        assert_eq!(parse_year_month(" 2025-12 "), Ok((2025, 12)));
        assert!(parse_year_month("2026-13").is_err());
        assert!(parse_year_month("March").is_err());
    }

    #[test]
    fn month_table_is_complete() {
        assert_eq!(MONTH_NAMES.len(), 12);
        assert_eq!(MONTH_NAMES[0], "Jan");
        assert_eq!(MONTH_NAMES[11], "Dec");
    }
}
