use jiff::{
    civil::{date, Date, DateTime},
    ToSpan,
};
use std::error::Error;
use std::fmt;

/// A calendar month, no timezone attached.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Month(Date);

pub fn month(year: i16, month: i8) -> Month {
    Month::new(year, month)
}

impl Month {
    pub fn new(year: i16, month: i8) -> Month {
        Month(date(year, month, 1))
    }

    /// The month that contains this date.
    pub fn containing(day: Date) -> Month {
        Month(day.first_of_month())
    }

    pub fn start_date(&self) -> Date {
        self.0
    }

    pub fn end_date(&self) -> Date {
        self.0.last_of_month()
    }

    pub fn year(&self) -> i16 {
        self.0.year()
    }

    pub fn month(&self) -> i8 {
        self.0.month()
    }

    pub fn next(&self) -> Month {
        Month(self.0.saturating_add(1.month()))
    }

    /// All months from this one up to and including `end`.
    pub fn up_to(&self, end: &Month) -> Result<Vec<Month>, Box<dyn Error>> {
        if end < self {
            return Err(Box::from(format!(
                "End month {} is before start month {}",
                end, self
            )));
        }
        let mut out: Vec<Month> = Vec::new();
        let mut current = *self;
        while &current <= end {
            out.push(current);
            current = current.next();
        }
        Ok(out)
    }

    pub fn contains(&self, dt: &DateTime) -> bool {
        dt.date().first_of_month() == self.0
    }

    /// The 6-digit YYYYMM token used in published file names.
    pub fn yearmonth(&self) -> String {
        self.0.strftime("%Y%m").to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.strftime("%Y-%m"))
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    #[test]
    fn test_month() {
        let m = month(2023, 5);
        assert_eq!(m.start_date(), date(2023, 5, 1));
        assert_eq!(m.end_date(), date(2023, 5, 31));
        assert_eq!(m.next(), month(2023, 6));
        assert_eq!(month(2023, 12).next(), month(2024, 1));
        assert_eq!(m.yearmonth(), "202305");
        assert_eq!(format!("{}", m), "2023-05");
    }

    #[test]
    fn test_containing() {
        assert_eq!(Month::containing(date(2023, 5, 17)), month(2023, 5));
        assert_eq!(Month::containing(date(2024, 2, 29)), month(2024, 2));
    }

    #[test]
    fn test_contains() {
        let m = month(2023, 5);
        assert!(m.contains(&date(2023, 5, 1).at(0, 30, 0, 0)));
        assert!(m.contains(&date(2023, 5, 31).at(23, 30, 0, 0)));
        assert!(!m.contains(&date(2023, 6, 1).at(0, 0, 0, 0)));
    }

    #[test]
    fn test_up_to() {
        let months = month(2022, 11).up_to(&month(2023, 2)).unwrap();
        assert_eq!(
            months,
            vec![month(2022, 11), month(2022, 12), month(2023, 1), month(2023, 2)]
        );
        assert_eq!(month(2023, 5).up_to(&month(2023, 5)).unwrap().len(), 1);
        assert!(month(2023, 5).up_to(&month(2023, 4)).is_err());
    }
}
