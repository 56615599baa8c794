//! Historical bar parser
//!
//! Converts provider [`BarData`] payloads into typed [`Row`]s. Bar dates
//! arrive as local wall-clock strings and are re-expressed in the
//! instrument's timezone.

use crate::provider::{BarData, ProviderError, ProviderResult};
use crate::session::localize;
use crate::{BarSize, Row};
use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parser bound to one request's bar size and timezones
#[derive(Debug, Clone, Copy)]
pub struct RowParser {
    bar_size: BarSize,
    local_tz: Tz,
    contract_tz: Tz,
}

impl RowParser {
    /// Create a parser for bars of `bar_size`
    pub fn new(bar_size: BarSize, local_tz: Tz, contract_tz: Tz) -> Self {
        Self {
            bar_size,
            local_tz,
            contract_tz,
        }
    }

    /// Instrument timezone rows are expressed in
    pub fn contract_tz(&self) -> Tz {
        self.contract_tz
    }

    /// Parse one bar into a row
    ///
    /// # Errors
    /// Returns [`ProviderError::ParseError`] for an unreadable date or a
    /// non-finite value.
    pub fn parse(&self, bar: &BarData) -> ProviderResult<Row> {
        let date = bar.date.trim();
        let format = self.bar_size.row_date_format();

        let naive = match self.bar_size {
            BarSize::OneDay => NaiveDate::parse_from_str(date, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            _ => NaiveDateTime::parse_from_str(date, format).ok(),
        }
        .ok_or_else(|| {
            ProviderError::ParseError(format!("Invalid bar date '{date}', expected {format}"))
        })?;

        let timestamp = localize(self.local_tz, naive)
            .map_err(|e| ProviderError::ParseError(e.to_string()))?
            .with_timezone(&self.contract_tz);

        Ok(Row {
            timestamp,
            open: Self::parse_decimal(bar.open, "open")?,
            high: Self::parse_decimal(bar.high, "high")?,
            low: Self::parse_decimal(bar.low, "low")?,
            close: Self::parse_decimal(bar.close, "close")?,
            volume: bar.volume,
            bar_count: bar.bar_count,
            wap: Self::parse_decimal(bar.wap, "wap")?,
            has_gaps: bar.has_gaps,
        })
    }

    /// Shortest round-trip rendering of the value, so 115.0 stays "115"
    fn parse_decimal(value: f64, field: &str) -> ProviderResult<Decimal> {
        if !value.is_finite() {
            return Err(ProviderError::ParseError(format!("Invalid {field}: {value}")));
        }
        Decimal::from_str(&value.to_string())
            .map_err(|e| ProviderError::ParseError(format!("Invalid {field} {value}: {e}")))
    }
}
