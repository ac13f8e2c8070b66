use chrono::NaiveDate;
use tracing::{debug, info};

use super::{Fueling, Ledger, LedgerError, Trip};

/// Comment placed on the first segment of a trip split by a fueling.
pub const AUTO_SPLIT_COMMENT: &str = "AUTOMATICALLY FUELED";

/// Effect of a fueling on the trip table.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitResult {
    /// No trip spanned the fueling odometer.
    Unchanged,
    /// `original` was replaced by `before` and `after`, meeting at the
    /// fueling odometer.
    Split {
        original: Trip,
        before: Trip,
        after: Trip,
    },
}

/// Returns the index of the trip that has to be split at `odometer`.
///
/// Only the first trip, in table order, whose range strictly contains
/// `odometer` is reported. With non-overlapping trips there is at most one;
/// if out-of-order entries ever produce more, later ones are left as they are.
pub fn split_first_spanning(trips: &[Trip], odometer: u64) -> Option<usize> {
    trips.iter().position(|t| t.spans(odometer))
}

fn split_trip(trip: &Trip, odometer: u64, split_by: &str) -> (Trip, Trip) {
    let start = trip.odometer_before();
    let before = Trip {
        date: trip.date,
        driver: trip.driver.clone(),
        odometer_after: odometer,
        distance: odometer - start,
        comment: Some(AUTO_SPLIT_COMMENT.to_string()),
        recorded_by: split_by.to_string(),
    };
    let after = Trip {
        odometer_after: trip.odometer_after,
        distance: trip.odometer_after - odometer,
        ..trip.clone()
    };
    (before, after)
}

impl Ledger {
    /// Records a fueling at `odometer` and splits the trip it falls into.
    ///
    /// The fueling must lie beyond the previous fueling and must not lie
    /// beyond the last recorded trip.
    ///
    /// `cost` and `volume` must be finite and non-negative. Callers check
    /// them at their input boundary; a negative or NaN cost would distort
    /// [`balance_grid`](super::balance_grid).
    pub fn add_fueling(
        &mut self,
        date: NaiveDate,
        fueler: impl Into<String>,
        odometer: u64,
        cost: f64,
        volume: Option<f64>,
        note: Option<String>,
    ) -> Result<(Fueling, SplitResult), LedgerError> {
        debug_assert!(
            cost.is_finite() && cost >= 0.0,
            "fueling cost must be finite and non-negative, got {cost}"
        );
        debug_assert!(
            volume.is_none_or(|v| v.is_finite() && v >= 0.0),
            "fueling volume must be finite and non-negative, got {volume:?}"
        );
        let previous = self.last_fueling_odometer();
        if odometer <= previous {
            debug!(odometer, previous, "Rejected fueling");
            return Err(LedgerError::OutOfOrderFueling { previous });
        }
        let last_trip = self.max_trip_odometer();
        if odometer > last_trip {
            debug!(odometer, last_trip, "Rejected fueling");
            return Err(LedgerError::FuelingAheadOfTrips { last_trip });
        }

        let fueling = Fueling {
            date,
            fueler: fueler.into(),
            odometer,
            cost,
            volume,
            note: note.filter(|n| !n.is_empty()),
            distance_since_last: odometer - previous,
        };
        info!(
            fueler = %fueling.fueler,
            odometer,
            cost,
            distance_since_last = fueling.distance_since_last,
            "Fueling recorded"
        );
        self.fuelings.push(fueling.clone());

        let split = match split_first_spanning(&self.trips, odometer) {
            Some(idx) => {
                let original = self.trips.remove(idx);
                let (before, after) = split_trip(&original, odometer, &fueling.fueler);
                self.trips.push(before.clone());
                self.trips.push(after.clone());
                self.trips.sort_by_key(|t| t.odometer_after);
                info!(
                    driver = %original.driver,
                    odometer,
                    before_km = before.distance,
                    after_km = after.distance,
                    "Split trip at fueling"
                );
                SplitResult::Split {
                    original,
                    before,
                    after,
                }
            }
            None => SplitResult::Unchanged,
        };
        Ok((fueling, split))
    }
}
