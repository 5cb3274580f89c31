use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime, Time, UtcOffset};

use crate::ValidationError;

const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const EXCHANGE_DATE_DOTS: &[FormatItem<'static>] = format_description!("[day].[month].[year]");
const EXCHANGE_DATE_SLASHES: &[FormatItem<'static>] = format_description!("[day]/[month]/[year]");
const QUERY_DATE: &[FormatItem<'static>] = format_description!("[day],[month],[year]");
const CLOCK_CHANGE: Time = time::macros::time!(1:00);

/// Current calendar day on the exchange (Europe/Skopje).
pub fn exchange_today() -> Date {
    exchange_date_at(OffsetDateTime::now_utc())
}

/// Calendar day on the exchange at instant `now`.
pub fn exchange_date_at(now: OffsetDateTime) -> Date {
    now.to_offset(exchange_offset(now)).date()
}

/// Central European time: UTC+2 from 01:00 UTC on the last Sunday of March
/// until 01:00 UTC on the last Sunday of October, UTC+1 otherwise.
pub fn exchange_offset(now: OffsetDateTime) -> UtcOffset {
    let now = now.to_offset(UtcOffset::UTC);
    let switch = |month: Month| {
        Date::from_calendar_date(now.year(), month, 31)
            .map(|last| last_sunday_on_or_before(last).with_time(CLOCK_CHANGE).assume_utc())
    };

    let summer = match (switch(Month::March), switch(Month::October)) {
        (Ok(start), Ok(end)) => now >= start && now < end,
        _ => false,
    };
    let hours = if summer { 2 } else { 1 };
    UtcOffset::from_hms(hours, 0, 0).unwrap_or(UtcOffset::UTC)
}

fn last_sunday_on_or_before(day: Date) -> Date {
    let back = i64::from(day.weekday().number_days_from_sunday());
    day - Duration::days(back)
}

/// Parse a date cell as printed in the exchange's history table.
pub fn parse_exchange_date(value: &str) -> Result<Date, ValidationError> {
    let trimmed = value.trim();
    Date::parse(trimmed, EXCHANGE_DATE_DOTS)
        .or_else(|_| Date::parse(trimmed, EXCHANGE_DATE_SLASHES))
        .map_err(|_| ValidationError::InvalidExchangeDate {
            value: value.to_string(),
        })
}

pub fn parse_iso_date(value: &str) -> Result<Date, ValidationError> {
    Date::parse(value.trim(), ISO_DATE).map_err(|_| ValidationError::InvalidIsoDate {
        value: value.to_string(),
    })
}

/// `YYYY-MM-DD`, the storage representation.
pub fn format_iso_date(date: Date) -> String {
    // Formatting a four-digit-year date against a static description cannot fail.
    date.format(ISO_DATE)
        .unwrap_or_else(|_| format!("{}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

/// `DD,MM,YYYY`, as the history endpoint expects in its query string.
pub fn format_query_date(date: Date) -> String {
    date.format(QUERY_DATE)
        .unwrap_or_else(|_| format!("{:02},{:02},{}", date.day(), u8::from(date.month()), date.year()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn parses_dotted_and_slashed_exchange_dates() {
        assert_eq!(parse_exchange_date("05.03.2024"), Ok(date!(2024 - 03 - 05)));
        assert_eq!(parse_exchange_date("05/03/2024"), Ok(date!(2024 - 03 - 05)));
    }

    #[test]
    fn rejects_out_of_range_exchange_dates() {
        let err = parse_exchange_date("31.02.2024").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidExchangeDate { .. }));
    }

    #[test]
    fn exchange_day_runs_ahead_of_utc_before_midnight_utc() {
        assert_eq!(
            exchange_date_at(datetime!(2024-01-04 23:30 UTC)),
            date!(2024 - 01 - 05)
        );
        assert_eq!(
            exchange_date_at(datetime!(2024-07-04 22:15 UTC)),
            date!(2024 - 07 - 05)
        );
        assert_eq!(
            exchange_date_at(datetime!(2024-07-04 21:59 UTC)),
            date!(2024 - 07 - 04)
        );
    }

    #[test]
    fn summer_time_follows_last_sundays_of_march_and_october() {
        let winter = UtcOffset::from_hms(1, 0, 0).expect("offset");
        let summer = UtcOffset::from_hms(2, 0, 0).expect("offset");

        assert_eq!(exchange_offset(datetime!(2024-03-31 0:59 UTC)), winter);
        assert_eq!(exchange_offset(datetime!(2024-03-31 1:00 UTC)), summer);
        assert_eq!(exchange_offset(datetime!(2024-10-27 0:59 UTC)), summer);
        assert_eq!(exchange_offset(datetime!(2024-10-27 1:00 UTC)), winter);
        assert_eq!(exchange_offset(datetime!(2025-03-30 1:00 UTC)), summer);
    }

    #[test]
    fn formats_storage_and_query_dates() {
        let day = date!(2024 - 01 - 09);
        assert_eq!(format_iso_date(day), "2024-01-09");
        assert_eq!(format_query_date(day), "09,01,2024");
        assert_eq!(parse_iso_date("2024-01-09"), Ok(day));
    }
}
