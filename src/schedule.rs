use chrono::{Datelike, Duration, NaiveDate, Weekday};

#[derive(Debug, Clone)]
pub struct PlanSubject {
    pub subject_id: String,
    /// 1 or 2; anything else falls back to bucket 1.
    pub supervisor_bucket: i64,
}

#[derive(Debug, Clone)]
pub struct Visit {
    pub subject_id: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub supervisor: String,
}

fn skip_sunday(date: NaiveDate) -> NaiveDate {
    if date.weekday() == Weekday::Sun {
        date + Duration::days(1)
    } else {
        date
    }
}

fn next_visit_date(current: NaiveDate, start: NaiveDate, end: NaiveDate) -> NaiveDate {
    let mut next = skip_sunday(current + Duration::days(1));
    if next > end {
        next = skip_sunday(start);
    }
    next
}

/// Assign each subject the next available date in order: one subject per day,
/// Sundays skipped, wrapping back to the start date once the end date is
/// exceeded. No overlap detection and no per-day capacity; the range simply
/// cycles.
pub fn plan_visits(
    start: NaiveDate,
    end: NaiveDate,
    subjects: &[PlanSubject],
    time_slot: &str,
    supervisor1: &str,
    supervisor2: &str,
) -> Vec<Visit> {
    let mut out = Vec::with_capacity(subjects.len());
    let mut cursor = skip_sunday(start);
    for s in subjects {
        let supervisor = if s.supervisor_bucket == 2 {
            supervisor2
        } else {
            supervisor1
        };
        out.push(Visit {
            subject_id: s.subject_id.clone(),
            date: cursor,
            time_slot: time_slot.to_string(),
            supervisor: supervisor.to_string(),
        });
        cursor = next_visit_date(cursor, start, end);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subj(id: &str, bucket: i64) -> PlanSubject {
        PlanSubject {
            subject_id: id.to_string(),
            supervisor_bucket: bucket,
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn round_robin_over_mon_to_wed() {
        // 2025-09-01 is a Monday.
        let visits = plan_visits(
            d("2025-09-01"),
            d("2025-09-03"),
            &[subj("A", 1), subj("B", 1), subj("C", 2), subj("D", 1)],
            "07.30-09.30",
            "Kepala Sekolah",
            "Wakil Kurikulum",
        );
        assert_eq!(visits[0].date, d("2025-09-01"));
        assert_eq!(visits[1].date, d("2025-09-02"));
        assert_eq!(visits[2].date, d("2025-09-03"));
        // Fourth subject wraps to the start date.
        assert_eq!(visits[3].date, d("2025-09-01"));
        assert_eq!(visits[2].supervisor, "Wakil Kurikulum");
        assert_eq!(visits[3].supervisor, "Kepala Sekolah");
    }

    #[test]
    fn sunday_start_shifts_to_monday() {
        // 2025-09-07 is a Sunday.
        let visits = plan_visits(
            d("2025-09-07"),
            d("2025-09-13"),
            &[subj("A", 1)],
            "07.30-09.30",
            "KS",
            "WK",
        );
        assert_eq!(visits[0].date, d("2025-09-08"));
    }

    #[test]
    fn sunday_in_range_is_skipped() {
        // 2025-09-05 Fri, 06 Sat, 07 Sun, 08 Mon.
        let visits = plan_visits(
            d("2025-09-05"),
            d("2025-09-10"),
            &[subj("A", 1), subj("B", 1), subj("C", 1)],
            "07.30-09.30",
            "KS",
            "WK",
        );
        assert_eq!(visits[0].date, d("2025-09-05"));
        assert_eq!(visits[1].date, d("2025-09-06"));
        assert_eq!(visits[2].date, d("2025-09-08"));
    }

    #[test]
    fn wrap_also_skips_a_sunday_start() {
        // Range Sun 07 .. Mon 08: first visit Mon 08, second wraps to Mon 08.
        let visits = plan_visits(
            d("2025-09-07"),
            d("2025-09-08"),
            &[subj("A", 1), subj("B", 1)],
            "07.30-09.30",
            "KS",
            "WK",
        );
        assert_eq!(visits[0].date, d("2025-09-08"));
        assert_eq!(visits[1].date, d("2025-09-08"));
    }

    #[test]
    fn unknown_bucket_falls_back_to_bucket_one() {
        let visits = plan_visits(
            d("2025-09-01"),
            d("2025-09-05"),
            &[subj("A", 0)],
            "07.30-09.30",
            "KS",
            "WK",
        );
        assert_eq!(visits[0].supervisor, "KS");
    }
}
