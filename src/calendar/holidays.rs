//! Public holiday sets per country and year.
//!
//! Holiday sets are small and deterministic, so each `(country, year)` pair is
//! computed once and memoized in `HolidayCalendar`.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::domain::Country;

/// Fixed-date national holidays in Spain, as `(month, day)`.
const ES_FIXED: [(u32, u32); 9] = [
    (1, 1),   // Año Nuevo
    (1, 6),   // Epifanía
    (5, 1),   // Fiesta del Trabajo
    (8, 15),  // Asunción
    (10, 12), // Fiesta Nacional
    (11, 1),  // Todos los Santos
    (12, 6),  // Constitución
    (12, 8),  // Inmaculada Concepción
    (12, 25), // Navidad
];

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Compute the public holidays of `country` in `year`.
pub fn public_holidays(country: Country, year: i32) -> BTreeSet<NaiveDate> {
    let mut out = BTreeSet::new();
    match country {
        Country::NoHolidays => {}
        Country::Es => {
            for (month, day) in ES_FIXED {
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                    out.insert(date);
                }
            }
            if let Some(good_friday) = easter_sunday(year).map(|d| d - Duration::days(2)) {
                out.insert(good_friday);
            }
        }
    }
    out
}

/// Business-day calendar for one country with a per-year holiday cache.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    country: Country,
    cache: HashMap<i32, BTreeSet<NaiveDate>>,
}

impl HolidayCalendar {
    pub fn new(country: Country) -> Self {
        Self {
            country,
            cache: HashMap::new(),
        }
    }

    /// Holidays for `year`, computed on first use.
    pub fn holidays(&mut self, year: i32) -> &BTreeSet<NaiveDate> {
        let country = self.country;
        self.cache
            .entry(year)
            .or_insert_with(|| public_holidays(country, year))
    }

    pub fn is_holiday(&mut self, date: NaiveDate) -> bool {
        self.holidays(date.year()).contains(&date)
    }

    /// Monday to Friday and not a public holiday.
    pub fn is_business_day(&mut self, date: NaiveDate) -> bool {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.is_holiday(date)
    }

    /// Number of years currently memoized.
    pub fn cached_years(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn easter_matches_known_dates() {
        assert_eq!(easter_sunday(2023), Some(date(2023, 4, 9)));
        assert_eq!(easter_sunday(2024), Some(date(2024, 3, 31)));
        assert_eq!(easter_sunday(2025), Some(date(2025, 4, 20)));
        assert_eq!(easter_sunday(2000), Some(date(2000, 4, 23)));
    }

    #[test]
    fn spain_includes_good_friday_and_fixed_dates() {
        let h = public_holidays(Country::Es, 2024);
        assert!(h.contains(&date(2024, 3, 29)));
        assert!(h.contains(&date(2024, 10, 12)));
        assert!(h.contains(&date(2024, 12, 25)));
        assert_eq!(h.len(), 10);
    }

    #[test]
    fn weekends_and_holidays_are_not_business_days() {
        let mut cal = HolidayCalendar::new(Country::Es);
        // Saturday and Sunday.
        assert!(!cal.is_business_day(date(2024, 3, 16)));
        assert!(!cal.is_business_day(date(2024, 3, 17)));
        // Thursday 2024-08-15 (Asunción).
        assert!(!cal.is_business_day(date(2024, 8, 15)));
        // Plain Tuesday.
        assert!(cal.is_business_day(date(2024, 3, 19)));
    }

    #[test]
    fn no_country_only_skips_weekends() {
        let mut cal = HolidayCalendar::new(Country::NoHolidays);
        assert!(cal.is_business_day(date(2024, 12, 25)));
        assert!(!cal.is_business_day(date(2024, 12, 28)));
    }

    #[test]
    fn holiday_sets_are_memoized_per_year() {
        let mut cal = HolidayCalendar::new(Country::Es);
        cal.is_business_day(date(2024, 1, 2));
        cal.is_business_day(date(2024, 6, 4));
        cal.is_business_day(date(2025, 1, 2));
        assert_eq!(cal.cached_years(), 2);
    }
}
