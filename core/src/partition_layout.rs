//! Pure functions from export type to partition-window generation (C2, §4.2).

use crate::export_type::ExportType;
use crate::partition::{Granularity, Partition, PartitionValue};
use chrono::{Datelike, NaiveDate};

/// Generates the ordered sequence of partition values covering `[start, end]`
/// (inclusive on both ends, §9 Open Questions) for `export_type`'s
/// granularity. Returns an empty sequence — never an error — when
/// `start > end`.
pub fn window(export_type: ExportType, start: PartitionValue, end: PartitionValue) -> Vec<Partition> {
    if start > end {
        return Vec::new();
    }
    match export_type.granularity() {
        Granularity::Monthly => monthly_window(export_type, start, end),
        Granularity::Daily => daily_window(export_type, start, end),
    }
}

fn monthly_window(export_type: ExportType, start: PartitionValue, end: PartitionValue) -> Vec<Partition> {
    let (PartitionValue::Monthly { year: sy, month: sm }, PartitionValue::Monthly { year: ey, month: em }) =
        (start, end)
    else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut y = sy;
    let mut m = sm;
    loop {
        out.push(Partition::new(
            export_type,
            PartitionValue::Monthly { year: y, month: m },
        ));
        if y == ey && m == em {
            break;
        }
        if m == 12 {
            m = 1;
            y += 1;
        } else {
            m += 1;
        }
    }
    out
}

fn daily_window(export_type: ExportType, start: PartitionValue, end: PartitionValue) -> Vec<Partition> {
    let (
        PartitionValue::Daily { year: sy, month: sm, day: sd },
        PartitionValue::Daily { year: ey, month: em, day: ed },
    ) = (start, end)
    else {
        return Vec::new();
    };
    let Some(start_date) = NaiveDate::from_ymd_opt(sy as i32, sm as u32, sd as u32) else {
        return Vec::new();
    };
    let Some(end_date) = NaiveDate::from_ymd_opt(ey as i32, em as u32, ed as u32) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut date = start_date;
    while date <= end_date {
        out.push(Partition::new(
            export_type,
            PartitionValue::Daily {
                year: date.year() as u16,
                month: date.month() as u8,
                day: date.day() as u8,
            },
        ));
        date = date.succ_opt().expect("date range bounded by end_date");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Granularity;

    fn monthly(s: &str) -> PartitionValue {
        PartitionValue::parse(s, Granularity::Monthly).unwrap()
    }

    fn daily(s: &str) -> PartitionValue {
        PartitionValue::parse(s, Granularity::Daily).unwrap()
    }

    #[test]
    fn window_filter_scenario() {
        // Scenario 1 (§8): start=2025-05, end=2025-07 over a monthly export.
        let parts = window(ExportType::CurParquet, monthly("2025-05"), monthly("2025-07"));
        let values: Vec<String> = parts.iter().map(|p| p.value.to_string()).collect();
        assert_eq!(values, vec!["2025-05", "2025-06", "2025-07"]);
    }

    #[test]
    fn empty_when_start_after_end() {
        let parts = window(ExportType::CurParquet, monthly("2025-07"), monthly("2025-05"));
        assert!(parts.is_empty());
    }

    #[test]
    fn monthly_window_crosses_year_boundary() {
        let parts = window(ExportType::CurParquet, monthly("2024-11"), monthly("2025-02"));
        let values: Vec<String> = parts.iter().map(|p| p.value.to_string()).collect();
        assert_eq!(values, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
    }

    #[test]
    fn daily_window_is_inclusive() {
        let parts = window(ExportType::FocusDaily, daily("2025-05-30"), daily("2025-06-02"));
        let values: Vec<String> = parts.iter().map(|p| p.value.to_string()).collect();
        assert_eq!(
            values,
            vec!["2025-05-30", "2025-05-31", "2025-06-01", "2025-06-02"]
        );
    }

    #[test]
    fn single_day_window() {
        let parts = window(ExportType::FocusDaily, daily("2025-05-30"), daily("2025-05-30"));
        assert_eq!(parts.len(), 1);
    }
}
