use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{PlanningEntry, date_key};

/// One slot in the 7-column month grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCell {
    /// Leading padding before the first day of the month
    Blank,
    Day(NaiveDate),
}

impl GridCell {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            GridCell::Blank => None,
            GridCell::Day(date) => Some(*date),
        }
    }
}

/// Number of days in a month (zero-based month index).
///
/// Computed as "day 0" of the following month, i.e. the day before its first,
/// which covers variable month lengths and leap Februaries.
pub fn days_in_month(year: i32, month0: u32) -> u32 {
    let (next_year, next_month0) = if month0 >= 11 { (year + 1, 0) } else { (year, month0 + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month0 + 1, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(0)
}

/// Weekday index (0..=6) of the first of the month, counted from `week_start`
pub fn first_weekday(year: i32, month0: u32, week_start: Weekday) -> u32 {
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .map(|first| weekday_offset(first.weekday(), week_start))
        .unwrap_or(0)
}

fn weekday_offset(day: Weekday, week_start: Weekday) -> u32 {
    (day.num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7
}

/// Build the padded month grid: leading blanks, then one cell per day
pub fn build_month_grid(year: i32, month0: u32, week_start: Weekday) -> Vec<GridCell> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month0 + 1, 1) else {
        return Vec::new();
    };
    let leading = first_weekday(year, month0, week_start) as usize;
    let days = days_in_month(year, month0);

    let mut cells = Vec::with_capacity(leading + days as usize);
    cells.extend(std::iter::repeat_n(GridCell::Blank, leading));
    cells.extend(
        first
            .iter_days()
            .take(days as usize)
            .map(GridCell::Day),
    );
    cells
}

/// Entries shown in a cell: those whose stored date string equals the cell's key
pub fn entries_for_cell<'a>(cell: &GridCell, entries: &'a [PlanningEntry]) -> Vec<&'a PlanningEntry> {
    match cell.date() {
        Some(date) => entries_for_date(date, entries),
        None => Vec::new(),
    }
}

pub fn entries_for_date<'a>(date: NaiveDate, entries: &'a [PlanningEntry]) -> Vec<&'a PlanningEntry> {
    let key = date_key(date);
    entries.iter().filter(|e| e.date() == key).collect()
}

/// Short weekday names rotated to begin at `week_start`
pub fn weekday_headers(week_start: Weekday) -> Vec<&'static str> {
    const NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let start = week_start.num_days_from_monday() as usize;
    (0..7).map(|i| NAMES[(start + i) % 7]).collect()
}

/// Sort by stored date, then by creation time. Stored dates are zero-padded
/// ISO keys, so string order is date order.
pub fn sort_by_date(entries: &mut [PlanningEntry]) {
    entries.sort_by(|a, b| {
        a.date()
            .cmp(b.date())
            .then_with(|| a.audit.created_at.cmp(&b.audit.created_at))
    });
}

/// The month currently being viewed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    pub year: i32,
    pub month0: u32,
}

impl MonthCursor {
    pub fn new(year: i32, month0: u32) -> Self {
        Self { year, month0: month0.min(11) }
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month0())
    }

    /// Move by `delta` months, rolling over year boundaries
    pub fn shift(self, delta: i32) -> Self {
        let total = self.year * 12 + self.month0 as i32 + delta;
        Self::new(total.div_euclid(12), total.rem_euclid(12) as u32)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month0 + 1, 1).unwrap_or_default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month0() == self.month0
    }

    /// Clamp a day-of-month into this month, e.g. the 31st onto the 30th
    pub fn clamp_day(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, days_in_month(self.year, self.month0));
        NaiveDate::from_ymd_opt(self.year, self.month0 + 1, day).unwrap_or_else(|| self.first_day())
    }

    /// "March 2025"
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }

    pub fn grid(&self, week_start: Weekday) -> Vec<GridCell> {
        build_month_grid(self.year, self.month0, week_start)
    }
}
