//! One load-mutate-save cycle against a [`TableStore`].

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::core::{Fueling, Ledger, LedgerError, SplitResult, Trip};
use crate::store::{BlobStore, StoreError, TableStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Ledger(LedgerError),
    Store(StoreError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Ledger(e) => write!(f, "{e}"),
            SessionError::Store(e) => write!(f, "failed to save: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Ledger(e) => Some(e),
            SessionError::Store(e) => Some(e),
        }
    }
}

impl From<LedgerError> for SessionError {
    fn from(e: LedgerError) -> Self {
        SessionError::Ledger(e)
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Store(e)
    }
}

/// A ledger loaded from a store, saved back after every change.
///
/// Saves are conditional on the versions seen at load time, so a
/// concurrent writer causes [`StoreError::Conflict`] instead of a lost
/// update. The in-memory ledger only reflects what was persisted.
pub struct LedgerSession<B: BlobStore> {
    store: TableStore<B>,
    ledger: Ledger,
    trips_version: Option<String>,
    fuelings_version: Option<String>,
}

impl<B: BlobStore> LedgerSession<B> {
    /// Loads both tables from `store`.
    pub fn open(store: TableStore<B>) -> Result<Self, StoreError> {
        let (ledger, trips_version, fuelings_version) = store.load_ledger()?;
        Ok(Self {
            store,
            ledger,
            trips_version,
            fuelings_version,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_store(self) -> TableStore<B> {
        self.store
    }

    /// Discards the in-memory state and loads both tables again.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let (ledger, trips_version, fuelings_version) = self.store.load_ledger()?;
        self.ledger = ledger;
        self.trips_version = trips_version;
        self.fuelings_version = fuelings_version;
        Ok(())
    }

    pub fn record_trip(
        &mut self,
        date: NaiveDate,
        driver: &str,
        odometer_after: u64,
        comment: Option<String>,
        recorded_by: &str,
    ) -> Result<Trip, SessionError> {
        let mut next = self.ledger.clone();
        let trip = next.add_trip(date, driver, odometer_after, comment, recorded_by)?;
        let version = self
            .store
            .save_trips(next.trips(), self.trips_version.as_deref())?;
        self.trips_version = Some(version);
        self.ledger = next;
        Ok(trip)
    }

    /// Records a fueling, saving the trip table first if a trip was split,
    /// then the fuel table.
    ///
    /// A stored split without its fueling keeps the segment distances and
    /// both segments fall in the same fueling interval, so the balances are
    /// unaffected. If the fuel table then fails to save, the session keeps
    /// the split trips without the new fueling, matching what is stored.
    pub fn record_fueling(
        &mut self,
        date: NaiveDate,
        fueler: &str,
        odometer: u64,
        cost: f64,
        volume: Option<f64>,
        note: Option<String>,
    ) -> Result<(Fueling, SplitResult), SessionError> {
        let mut next = self.ledger.clone();
        let (fueling, split) = next.add_fueling(date, fueler, odometer, cost, volume, note)?;

        if matches!(split, SplitResult::Split { .. }) {
            let version = self
                .store
                .save_trips(next.trips(), self.trips_version.as_deref())?;
            info!(odometer, "Saved split trips");
            self.trips_version = Some(version);
        }

        match self
            .store
            .save_fuelings(next.fuelings(), self.fuelings_version.as_deref())
        {
            Ok(version) => {
                self.fuelings_version = Some(version);
                self.ledger = next;
                Ok((fueling, split))
            }
            Err(e) => {
                if matches!(split, SplitResult::Split { .. }) {
                    warn!(odometer, error = %e, "Split trips saved but fueling was not");
                    let (trips, _) = next.into_tables();
                    self.ledger = Ledger::from_tables(trips, self.ledger.fuelings().to_vec());
                }
                Err(SessionError::Store(e))
            }
        }
    }
}
