//! Billing period arithmetic. Every run invoices the calendar month before
//! the reference date.

use chrono::{Datelike, Days, NaiveDate};

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// Day 1 of the month before `reference`, rolling January back into December.
pub fn first_day_of_previous_month(reference: NaiveDate) -> NaiveDate {
    first_of_month(last_day_of_previous_month(reference))
}

/// The day before the 1st of `reference`'s month.
pub fn last_day_of_previous_month(reference: NaiveDate) -> NaiveDate {
    first_of_month(reference) - Days::new(1)
}

/// Full English month name and four-digit year, e.g. "March 2024".
pub fn month_and_year(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    pub fn previous_month(reference: NaiveDate) -> Self {
        BillingPeriod {
            start: first_day_of_previous_month(reference),
            end: last_day_of_previous_month(reference),
        }
    }

    pub fn label(&self) -> String {
        month_and_year(self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_day_wraps_into_previous_year() {
        assert_eq!(first_day_of_previous_month(date(2024, 1, 15)), date(2023, 12, 1));
        assert_eq!(first_day_of_previous_month(date(2024, 3, 31)), date(2024, 2, 1));
        assert_eq!(first_day_of_previous_month(date(2024, 12, 1)), date(2024, 11, 1));
    }

    #[test]
    fn last_day_handles_leap_years() {
        assert_eq!(last_day_of_previous_month(date(2024, 3, 10)), date(2024, 2, 29));
        assert_eq!(last_day_of_previous_month(date(2023, 3, 10)), date(2023, 2, 28));
        assert_eq!(last_day_of_previous_month(date(2024, 1, 1)), date(2023, 12, 31));
        assert_eq!(last_day_of_previous_month(date(2024, 5, 31)), date(2024, 4, 30));
    }

    #[test]
    fn every_day_of_a_leap_year_agrees_with_month_shift() {
        let mut day = date(2024, 1, 1);
        while day.year() == 2024 {
            let first = first_day_of_previous_month(day);
            assert_eq!(first.day(), 1);
            assert_eq!(first.month(), if day.month() == 1 { 12 } else { day.month() - 1 });

            let next_month = day.checked_add_months(Months::new(1)).unwrap();
            let expected = first_day_of_previous_month(next_month) - Days::new(1);
            assert_eq!(last_day_of_previous_month(day), expected);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn labels_use_full_month_name() {
        assert_eq!(month_and_year(date(2024, 7, 1)), "July 2024");
        assert_eq!(BillingPeriod::previous_month(date(2024, 3, 10)).label(), "February 2024");
    }
}
