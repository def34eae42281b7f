//! Accounting period rules.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::ledger::error::LedgerError;

/// Snapshot of a period.
#[derive(Debug, Clone)]
pub struct PeriodInfo {
    /// Period ID.
    pub id: Uuid,
    /// Period name, unique per ledger (e.g. "2026-03").
    pub name: String,
    /// First day of the period.
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive).
    pub end_date: NaiveDate,
    /// Whether the period has been closed.
    pub is_closed: bool,
}

impl PeriodInfo {
    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Stateless rules for periods.
pub struct PeriodRules;

impl PeriodRules {
    /// Validates that `start_date <= end_date`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` otherwise.
    pub fn validate_range(start_date: NaiveDate, end_date: NaiveDate) -> Result<(), LedgerError> {
        if start_date > end_date {
            return Err(LedgerError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(())
    }

    /// Checks if two inclusive date ranges overlap.
    #[must_use]
    pub fn ranges_overlap(
        a_start: NaiveDate,
        a_end: NaiveDate,
        b_start: NaiveDate,
        b_end: NaiveDate,
    ) -> bool {
        a_start <= b_end && a_end >= b_start
    }

    /// Validates a new period against the ledger's existing periods.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange`, `DuplicatePeriodName` or `PeriodOverlap`.
    pub fn validate_new(
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        existing: &[PeriodInfo],
    ) -> Result<(), LedgerError> {
        Self::validate_range(start_date, end_date)?;

        if existing.iter().any(|p| p.name == name) {
            return Err(LedgerError::DuplicatePeriodName(name.to_string()));
        }

        if let Some(other) = existing
            .iter()
            .find(|p| Self::ranges_overlap(start_date, end_date, p.start_date, p.end_date))
        {
            return Err(LedgerError::PeriodOverlap {
                name: other.name.clone(),
            });
        }

        Ok(())
    }

    /// Returns the closed period containing `date`, if any.
    #[must_use]
    pub fn closed_period_for(date: NaiveDate, periods: &[PeriodInfo]) -> Option<&PeriodInfo> {
        periods
            .iter()
            .find(|p| p.is_closed && p.contains_date(date))
    }

    /// Fails if `date` lies inside a closed period.
    ///
    /// # Errors
    ///
    /// Returns `PeriodClosed`.
    pub fn ensure_open(date: NaiveDate, periods: &[PeriodInfo]) -> Result<(), LedgerError> {
        match Self::closed_period_for(date, periods) {
            Some(period) => Err(LedgerError::PeriodClosed {
                date,
                period: period.name.clone(),
            }),
            None => Ok(()),
        }
    }
}
