use chrono::format::ParseErrorKind;
use chrono::{Datelike, DateTime, Duration, Local, LocalResult, NaiveDate, TimeZone};
use thiserror::Error;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateKeyError {
    #[error("Invalid date key '{0}': expected YYYY-MM-DD")]
    Malformed(String),
    #[error("Date key '{0}' is not a calendar date")]
    OutOfRange(String),
    #[error("Invalid month '{0}': expected YYYY-MM")]
    BadMonth(String),
}

/// Format a calendar date as its storage key (YYYY-MM-DD)
pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Key for the calendar day an instant falls on in its own time zone.
/// Never converts to UTC first: 23:30 on the 16th west of Greenwich is still the 16th.
pub fn local_date_key<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    format_date_key(instant.date_naive())
}

/// Parse a storage key back into the calendar date it names
pub fn parse_date_key(key: &str) -> Result<NaiveDate, DateKeyError> {
    NaiveDate::parse_from_str(key.trim(), DATE_KEY_FORMAT).map_err(|e| match e.kind() {
        ParseErrorKind::OutOfRange | ParseErrorKind::Impossible => {
            DateKeyError::OutOfRange(key.to_string())
        }
        _ => DateKeyError::Malformed(key.to_string()),
    })
}

/// Start of the given day in `tz`. Where midnight itself is skipped by a DST
/// jump the first existing instant of that day is returned.
pub fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest(),
    }
}

/// Today's key in the machine's local time zone
pub fn today_key() -> String {
    local_date_key(&Local::now())
}

/// Today's date in the machine's local time zone
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// One month of the calendar grid, weeks starting on Monday
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthView {
    year: i32,
    month: u32,
}

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

impl MonthView {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a `YYYY-MM` argument
    pub fn parse(arg: &str) -> Result<Self, DateKeyError> {
        let (y, m) = arg
            .trim()
            .split_once('-')
            .ok_or_else(|| DateKeyError::BadMonth(arg.to_string()))?;
        let year = y.parse::<i32>().map_err(|_| DateKeyError::BadMonth(arg.to_string()))?;
        let month = m.parse::<u32>().map_err(|_| DateKeyError::BadMonth(arg.to_string()))?;
        Self::new(year, month).ok_or_else(|| DateKeyError::BadMonth(arg.to_string()))
    }

    pub fn title(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days_in_month(&self) -> u32 {
        let next = self.next();
        match (self.first_day(), next.first_day()) {
            (Some(first), Some(following)) => (following - first).num_days() as u32,
            _ => 0,
        }
    }

    /// Grid rows of seven cells; cells outside the month are `None`
    pub fn weeks(&self) -> Vec<[Option<NaiveDate>; 7]> {
        let Some(first) = self.first_day() else {
            return Vec::new();
        };
        let lead = first.weekday().num_days_from_monday() as usize;

        let mut cells: Vec<Option<NaiveDate>> = vec![None; lead];
        cells.extend((0..self.days_in_month()).map(|offset| first.checked_add_signed(Duration::days(offset as i64))));
        while cells.len() % 7 != 0 {
            cells.push(None);
        }

        cells
            .chunks(7)
            .map(|chunk| {
                let mut week = [None; 7];
                week.copy_from_slice(chunk);
                week
            })
            .collect()
    }

    /// Plain-text grid. Days for which `marked` returns true get a `*`.
    pub fn render_text(&self, marked: impl Fn(&str) -> bool) -> String {
        let mut out = format!("{:^28}\n", self.title());
        out.push_str(" Mo  Tu  We  Th  Fr  Sa  Su\n");
        for week in self.weeks() {
            for cell in week {
                match cell {
                    Some(date) => {
                        let mark = if marked(&format_date_key(date)) { '*' } else { ' ' };
                        out.push_str(&format!("{:>3}{}", date.day(), mark));
                    }
                    None => out.push_str("    "),
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn keys_are_zero_padded() {
        assert_eq!(format_date_key(ymd(2025, 1, 5)), "2025-01-05");
        assert_eq!(parse_date_key("2025-01-05"), Ok(ymd(2025, 1, 5)));
    }

    #[test]
    fn round_trips_across_year_boundary() {
        for date in [ymd(2024, 12, 31), ymd(2025, 1, 1), ymd(2024, 2, 29), ymd(-1, 3, 1)] {
            assert_eq!(parse_date_key(&format_date_key(date)).unwrap(), date);
        }
    }

    #[test]
    fn late_evening_west_of_utc_keeps_its_local_day() {
        let west = FixedOffset::west_opt(6 * 3600).unwrap();
        let evening = west.with_ymd_and_hms(2025, 11, 16, 23, 30, 0).unwrap();
        assert_eq!(local_date_key(&evening), "2025-11-16");
        // The UTC rendering of the same instant is already the 17th.
        assert_eq!(local_date_key(&evening.with_timezone(&chrono::Utc)), "2025-11-17");
    }

    #[test]
    fn round_trips_through_midnight_on_dst_days() {
        use chrono_tz::{America, Australia, Europe};

        let cases = [
            (ymd(2025, 3, 9), America::New_York),
            (ymd(2025, 11, 2), America::New_York),
            (ymd(2025, 3, 30), Europe::Berlin),
            (ymd(2025, 10, 26), Europe::Berlin),
            (ymd(2025, 10, 5), Australia::Sydney),
        ];
        for (date, tz) in cases {
            let start = start_of_day(date, &tz).unwrap();
            assert_eq!(local_date_key(&start), format_date_key(date));
            assert_eq!(parse_date_key(&local_date_key(&start)).unwrap(), date);
        }
    }

    #[test]
    fn skipped_midnight_starts_at_first_valid_instant() {
        // Sao Paulo jumped from 00:00 to 01:00 on this day.
        let date = ymd(2018, 11, 4);
        let start = start_of_day(date, &chrono_tz::America::Sao_Paulo).unwrap();
        assert_eq!(start.hour(), 1);
        assert_eq!(local_date_key(&start), "2018-11-04");
    }

    #[test]
    fn host_zone_midnight_keeps_its_day() {
        // Depends on the host time zone; only exercises DST where the host has it.
        let date = ymd(2025, 3, 30);
        let start = start_of_day(date, &Local).unwrap();
        assert_eq!(local_date_key(&start), format_date_key(date));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(parse_date_key("2025-11"), Err(DateKeyError::Malformed(_))));
        assert!(matches!(parse_date_key("2025-xx-01"), Err(DateKeyError::Malformed(_))));
        assert!(matches!(parse_date_key("2025-02-30"), Err(DateKeyError::OutOfRange(_))));
    }

    #[test]
    fn month_navigation_wraps_years() {
        let dec = MonthView::new(2024, 12).unwrap();
        assert_eq!(dec.next(), MonthView::new(2025, 1).unwrap());
        assert_eq!(dec.next().prev(), dec);
        assert_eq!(MonthView::parse("2025-02").unwrap().days_in_month(), 28);
        assert!(MonthView::parse("2025-13").is_err());
    }

    #[test]
    fn grid_starts_on_monday() {
        // November 2025 starts on a Saturday.
        let weeks = MonthView::new(2025, 11).unwrap().weeks();
        assert_eq!(weeks[0][5], Some(ymd(2025, 11, 1)));
        assert!(weeks[0][..5].iter().all(Option::is_none));
        let days: usize = weeks.iter().map(|w| w.iter().flatten().count()).sum();
        assert_eq!(days, 30);
    }

    #[test]
    fn render_marks_days_with_data() {
        let text = MonthView::new(2025, 11).unwrap().render_text(|key| key == "2025-11-16");
        assert!(text.contains("November 2025"));
        assert!(text.contains(" 16*"));
        assert!(text.contains(" 17 "));
    }
}
