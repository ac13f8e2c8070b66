use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info, warn};

use super::{BlobStore, StoreError};
use crate::core::{FUELING_COLUMNS, Fueling, Ledger, RowError, TRIP_COLUMNS, Trip};

/// A record that is stored as one CSV row under a fixed header.
pub trait TableRow: Sized {
    const COLUMNS: &'static [&'static str];

    fn to_row(&self) -> Vec<String>;
    fn from_row(row: &[String]) -> Result<Self, RowError>;
}

impl TableRow for Trip {
    const COLUMNS: &'static [&'static str] = &TRIP_COLUMNS;

    fn to_row(&self) -> Vec<String> {
        Trip::to_row(self)
    }

    fn from_row(row: &[String]) -> Result<Self, RowError> {
        Trip::from_row(row)
    }
}

impl TableRow for Fueling {
    const COLUMNS: &'static [&'static str] = &FUELING_COLUMNS;

    fn to_row(&self) -> Vec<String> {
        Fueling::to_row(self)
    }

    fn from_row(row: &[String]) -> Result<Self, RowError> {
        Fueling::from_row(row)
    }
}

/// Records read from a table together with the version they were read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    /// `None` when the table did not exist or could not be fetched.
    pub version: Option<String>,
}

impl<T> Loaded<T> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            version: None,
        }
    }
}

/// Stores the trip and fuel tables as CSV blobs.
pub struct TableStore<B> {
    backend: B,
    trips_path: String,
    fuelings_path: String,
}

impl<B: BlobStore> TableStore<B> {
    pub fn new(
        backend: B,
        trips_path: impl Into<String>,
        fuelings_path: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            trips_path: trips_path.into(),
            fuelings_path: fuelings_path.into(),
        }
    }

    pub fn load_trips(&self) -> Result<Loaded<Trip>, StoreError> {
        self.load(&self.trips_path)
    }

    pub fn load_fuelings(&self) -> Result<Loaded<Fueling>, StoreError> {
        self.load(&self.fuelings_path)
    }

    pub fn save_trips(
        &mut self,
        trips: &[Trip],
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        let path = self.trips_path.clone();
        self.save(&path, trips, expected_version)
    }

    pub fn save_fuelings(
        &mut self,
        fuelings: &[Fueling],
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        let path = self.fuelings_path.clone();
        self.save(&path, fuelings, expected_version)
    }

    /// Loads both tables into a [`Ledger`].
    ///
    /// Returns the ledger with the trip and fuel table versions.
    pub fn load_ledger(&self) -> Result<(Ledger, Option<String>, Option<String>), StoreError> {
        let trips = self.load_trips()?;
        let fuelings = self.load_fuelings()?;
        Ok((
            Ledger::from_tables(trips.records, fuelings.records),
            trips.version,
            fuelings.version,
        ))
    }

    /// Reads a table. A missing blob or an unreachable backend yields an
    /// empty table; content that cannot be parsed is an error.
    fn load<T: TableRow>(&self, path: &str) -> Result<Loaded<T>, StoreError> {
        let blob = match self.backend.get(path) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(path, "Table does not exist yet");
                return Ok(Loaded::empty());
            }
            Err(e) => {
                warn!(path, error = %e, "Failed to load table, starting empty");
                return Ok(Loaded::empty());
            }
        };
        let records = parse_table::<T>(&blob.content)
            .map_err(|e| StoreError::Malformed(format!("{path}: {e}")))?;
        info!(path, rows = records.len(), version = %blob.version, "Loaded table");
        Ok(Loaded {
            records,
            version: Some(blob.version),
        })
    }

    fn save<T: TableRow>(
        &mut self,
        path: &str,
        records: &[T],
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        let content = serialize_table(records)?;
        let version = self.backend.put(path, &content, expected_version)?;
        info!(path, rows = records.len(), version = %version, "Saved table");
        Ok(version)
    }
}

/// Serializes records as CSV text with a header row.
pub fn serialize_table<T: TableRow>(records: &[T]) -> Result<String, StoreError> {
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(T::COLUMNS)
        .map_err(|e| StoreError::Malformed(e.to_string()))?;
    for record in records {
        wtr.write_record(record.to_row())
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| StoreError::Malformed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Malformed(e.to_string()))
}

/// Parses CSV text written by [`serialize_table`].
///
/// Blank content is an empty table. The header must list `T::COLUMNS` in
/// order.
pub fn parse_table<T: TableRow>(content: &str) -> Result<Vec<T>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = rdr.headers().map_err(|e| e.to_string())?;
    if !headers.iter().map(str::trim).eq(T::COLUMNS.iter().copied()) {
        return Err(format!(
            "unexpected header {:?}, expected {:?}",
            headers.iter().collect::<Vec<_>>(),
            T::COLUMNS
        ));
    }
    let mut records = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let rec = result.map_err(|e| e.to_string())?;
        let row: Vec<String> = rec.iter().map(|s| s.to_string()).collect();
        let record = T::from_row(&row).map_err(|e| format!("row {}: {e}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Blob, MemoryStore};
    use chrono::NaiveDate;

    /// Holds blobs but cannot read them back.
    struct UnreadableStore(MemoryStore);

    impl BlobStore for UnreadableStore {
        fn get(&self, _path: &str) -> Result<Option<Blob>, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }

        fn put(
            &mut self,
            path: &str,
            content: &str,
            expected_version: Option<&str>,
        ) -> Result<String, StoreError> {
            self.0.put(path, content, expected_version)
        }
    }

    fn trip(odometer_after: u64, distance: u64, comment: Option<&str>) -> Trip {
        Trip {
            date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            driver: "anna".into(),
            odometer_after,
            distance,
            comment: comment.map(str::to_string),
            recorded_by: "anna".into(),
        }
    }

    #[test]
    fn serialized_table_starts_with_header() {
        let text = serialize_table(&[trip(10, 10, Some("to work, and back"))]).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Driver,Km After,Driven Km,Comment,User")
        );
        assert_eq!(
            lines.next(),
            Some("29.02.2024,anna,10,10,\"to work, and back\",anna")
        );
    }

    #[test]
    fn header_only_table_is_empty() {
        let text = serialize_table::<Fueling>(&[]).unwrap();
        assert_eq!(
            text.trim_end(),
            "Date,Fueler,Km,Euros,Liters,Note,Km since last fueling"
        );
        assert!(parse_table::<Fueling>(&text).unwrap().is_empty());
        assert!(parse_table::<Fueling>("").unwrap().is_empty());
    }

    #[test]
    fn wrong_header_is_rejected() {
        let err = parse_table::<Trip>("Date,Who\n01.01.2024,x\n").unwrap_err();
        assert!(err.contains("unexpected header"));
    }

    #[test]
    fn parse_reports_row_number() {
        let text = "Date,Driver,Km After,Driven Km,Comment,User\n\
                    01.01.2024,anna,10,10,,anna\n\
                    01.01.2024,ben,x,10,,ben\n";
        let err = parse_table::<Trip>(text).unwrap_err();
        assert!(err.starts_with("row 2:"), "{err}");
    }

    #[test]
    fn missing_tables_load_empty() {
        let store = TableStore::new(MemoryStore::new(), "trips.csv", "fuel.csv");
        let loaded = store.load_trips().unwrap();
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.version, None);
    }

    #[test]
    fn malformed_table_is_an_error() {
        let mut backend = MemoryStore::new();
        backend.put("trips.csv", "garbage\n1\n", None).unwrap();
        let store = TableStore::new(backend, "trips.csv", "fuel.csv");
        let err = store.load_trips().unwrap_err();
        assert!(matches!(err, StoreError::Malformed(msg) if msg.starts_with("trips.csv")));
    }

    #[test]
    fn saved_tables_load_back_with_version() {
        let mut store = TableStore::new(MemoryStore::new(), "trips.csv", "fuel.csv");
        let trips = vec![trip(100, 100, None), trip(150, 50, Some("x"))];
        let version = store.save_trips(&trips, None).unwrap();
        let loaded = store.load_trips().unwrap();
        assert_eq!(loaded.records, trips);
        assert_eq!(loaded.version, Some(version));
    }

    #[test]
    fn unreachable_table_loads_empty_but_is_not_overwritten() {
        let mut backend = MemoryStore::new();
        let stored = serialize_table(&[trip(100, 100, None)]).unwrap();
        backend.put("trips.csv", &stored, None).unwrap();
        let mut store = TableStore::new(UnreadableStore(backend), "trips.csv", "fuel.csv");

        let loaded = store.load_trips().unwrap();
        assert_eq!(loaded, Loaded::empty());

        let err = store.save_trips(&[], loaded.version.as_deref()).unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                path: "trips.csv".into()
            }
        );
        assert_eq!(store.backend.0.get("trips.csv").unwrap().unwrap().content, stored);
    }
}
