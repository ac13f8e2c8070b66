//! Allocation engine for the shared-vehicle mileage log.
//!
//! The [`Ledger`] owns the two tables (trips and fuelings) as plain values.
//! Callers load it from a store, apply one operation, and save it back.
//! Every operation validates before it mutates, so a rejected call leaves
//! the ledger exactly as it was.

use chrono::NaiveDate;
use tracing::{debug, info};

mod fueling;
mod record;
mod report;

pub use fueling::{AUTO_SPLIT_COMMENT, SplitResult, split_first_spanning};
pub use record::{
    FUELING_COLUMNS, Fueling, RowError, TRIP_COLUMNS, Trip, format_date, parse_date,
};
pub use report::{BalanceGrid, balance_grid, total_distance_by_driver};

/// Errors returned when an entry conflicts with what is already recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The trip odometer does not exceed the last recorded trip odometer.
    InvalidDistance { previous: u64 },
    /// The fueling odometer does not exceed the last fueling odometer.
    OutOfOrderFueling { previous: u64 },
    /// The fueling odometer is beyond the last recorded trip.
    FuelingAheadOfTrips { last_trip: u64 },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InvalidDistance { previous } => {
                write!(f, "Kilometers must be greater than last entry ({previous})")
            }
            LedgerError::OutOfOrderFueling { previous } => {
                write!(
                    f,
                    "Kilometers must be greater than last fueling ({previous})"
                )
            }
            LedgerError::FuelingAheadOfTrips { last_trip } => write!(
                f,
                "Add trip first, then fueling! Kilometers are higher than last trip ({last_trip})"
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Trips and fuelings of one vehicle, both ordered by odometer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    trips: Vec<Trip>,
    fuelings: Vec<Fueling>,
}

impl Ledger {
    /// Builds a ledger from previously stored tables.
    ///
    /// Rows are kept in stored order; the tables are expected to already
    /// satisfy the ordering invariants.
    pub fn from_tables(trips: Vec<Trip>, fuelings: Vec<Fueling>) -> Self {
        Self { trips, fuelings }
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn fuelings(&self) -> &[Fueling] {
        &self.fuelings
    }

    /// Consumes the ledger, returning `(trips, fuelings)` for persistence.
    pub fn into_tables(self) -> (Vec<Trip>, Vec<Fueling>) {
        (self.trips, self.fuelings)
    }

    /// Odometer after the last trip in sequence order, or 0 without trips.
    pub fn last_odometer(&self) -> u64 {
        self.trips.last().map(|t| t.odometer_after).unwrap_or(0)
    }

    /// Highest odometer reached by any trip.
    pub fn max_trip_odometer(&self) -> u64 {
        self.trips
            .iter()
            .map(|t| t.odometer_after)
            .max()
            .unwrap_or(0)
    }

    /// Odometer of the last fueling, or 0 without fuelings.
    pub fn last_fueling_odometer(&self) -> u64 {
        self.fuelings.last().map(|f| f.odometer).unwrap_or(0)
    }

    /// Records a trip ending at `odometer_after`.
    ///
    /// The driven distance is derived from the previous trip's odometer.
    pub fn add_trip(
        &mut self,
        date: NaiveDate,
        driver: impl Into<String>,
        odometer_after: u64,
        comment: Option<String>,
        recorded_by: impl Into<String>,
    ) -> Result<Trip, LedgerError> {
        let previous = self.last_odometer();
        if odometer_after <= previous {
            debug!(odometer_after, previous, "Rejected trip");
            return Err(LedgerError::InvalidDistance { previous });
        }
        let trip = Trip {
            date,
            driver: driver.into(),
            odometer_after,
            distance: odometer_after - previous,
            comment: comment.filter(|c| !c.is_empty()),
            recorded_by: recorded_by.into(),
        };
        info!(
            driver = %trip.driver,
            odometer_after,
            distance = trip.distance,
            "Trip recorded"
        );
        self.trips.push(trip.clone());
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn first_trip_starts_at_zero() {
        let mut ledger = Ledger::default();
        let trip = ledger.add_trip(day(), "anna", 120, None, "anna").unwrap();
        assert_eq!(trip.distance, 120);
        assert_eq!(ledger.last_odometer(), 120);
    }

    #[test]
    fn distance_is_delta_to_previous_trip() {
        let mut ledger = Ledger::default();
        ledger.add_trip(day(), "anna", 100, None, "anna").unwrap();
        let trip = ledger
            .add_trip(day(), "ben", 175, Some("shopping".into()), "anna")
            .unwrap();
        assert_eq!(trip.distance, 75);
        assert_eq!(trip.recorded_by, "anna");
        assert_eq!(trip.comment.as_deref(), Some("shopping"));
    }

    #[test]
    fn non_increasing_odometer_is_rejected() {
        let mut ledger = Ledger::default();
        ledger.add_trip(day(), "anna", 100, None, "anna").unwrap();
        let before = ledger.clone();

        let err = ledger.add_trip(day(), "ben", 100, None, "ben").unwrap_err();
        assert_eq!(err, LedgerError::InvalidDistance { previous: 100 });
        let err = ledger.add_trip(day(), "ben", 40, None, "ben").unwrap_err();
        assert_eq!(err, LedgerError::InvalidDistance { previous: 100 });
        assert_eq!(ledger, before);
    }

    #[test]
    fn zero_odometer_on_empty_ledger_is_rejected() {
        let mut ledger = Ledger::default();
        let err = ledger.add_trip(day(), "anna", 0, None, "anna").unwrap_err();
        assert_eq!(err, LedgerError::InvalidDistance { previous: 0 });
        assert!(ledger.trips().is_empty());
    }

    #[test]
    fn empty_comment_is_dropped() {
        let mut ledger = Ledger::default();
        let trip = ledger
            .add_trip(day(), "anna", 10, Some(String::new()), "anna")
            .unwrap();
        assert_eq!(trip.comment, None);
    }

    #[test]
    fn error_messages_name_prior_value() {
        assert_eq!(
            LedgerError::InvalidDistance { previous: 42 }.to_string(),
            "Kilometers must be greater than last entry (42)"
        );
        assert!(
            LedgerError::FuelingAheadOfTrips { last_trip: 7 }
                .to_string()
                .ends_with("(7)")
        );
    }
}
