//! Calendar support: public holidays and timestamp decomposition.

pub mod holidays;

pub use holidays::*;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::domain::CalendarFeatures;

/// Decompose `timestamp` into the calendar features used for training.
pub fn calendar_features(timestamp: NaiveDateTime, calendar: &mut HolidayCalendar) -> CalendarFeatures {
    let date = timestamp.date();
    CalendarFeatures {
        year: date.year(),
        month: date.month(),
        day: date.day(),
        weekday: date.weekday().number_from_monday(),
        hour: timestamp.hour(),
        is_business_day: calendar.is_business_day(date),
        week: date.iso_week().week(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Country;
    use chrono::NaiveDate;

    #[test]
    fn decomposes_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(17, 45, 0)
            .unwrap();
        let mut cal = HolidayCalendar::new(Country::Es);
        let f = calendar_features(ts, &mut cal);
        assert_eq!((f.year, f.month, f.day, f.hour), (2024, 1, 1, 17));
        assert_eq!(f.weekday, 1);
        assert_eq!(f.week, 1);
        // New Year's Day.
        assert!(!f.is_business_day);
    }
}
