use std::collections::{BTreeMap, BTreeSet};

use super::{Fueling, Trip};

/// Sums driven kilometers per driver.
pub fn total_distance_by_driver(trips: &[Trip]) -> BTreeMap<String, u64> {
    trips.iter().fold(BTreeMap::new(), |mut acc, t| {
        *acc.entry(t.driver.clone()).or_insert(0) += t.distance;
        acc
    })
}

/// Fuel cost owed between people, keyed by `(debtor, creditor)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceGrid {
    owed: BTreeMap<(String, String), f64>,
}

/// Splits each fueling's cost among the drivers of its interval.
///
/// A fueling covers the trips ending in
/// `(odometer - distance_since_last, odometer]`. Each driver owes the fueler
/// `driver_km / interval_km * cost`. The fueler's own share is not recorded,
/// and an interval without driven kilometers contributes nothing.
pub fn balance_grid(trips: &[Trip], fuelings: &[Fueling]) -> BalanceGrid {
    let mut ordered: Vec<&Fueling> = fuelings.iter().collect();
    ordered.sort_by_key(|f| f.odometer);

    let mut grid = BalanceGrid::default();
    for fueling in ordered {
        let start = fueling.interval_start();
        let mut driver_km: BTreeMap<&str, u64> = BTreeMap::new();
        for trip in trips
            .iter()
            .filter(|t| t.odometer_after > start && t.odometer_after <= fueling.odometer)
        {
            *driver_km.entry(trip.driver.as_str()).or_insert(0) += trip.distance;
        }
        let interval_km: u64 = driver_km.values().sum();
        if interval_km == 0 {
            continue;
        }
        for (driver, km) in driver_km {
            if driver == fueling.fueler {
                continue;
            }
            let share = km as f64 / interval_km as f64 * fueling.cost;
            *grid
                .owed
                .entry((driver.to_string(), fueling.fueler.clone()))
                .or_insert(0.0) += share;
        }
    }
    grid
}

impl BalanceGrid {
    /// Amount `debtor` owes `creditor`, zero when nothing is recorded.
    pub fn owed(&self, debtor: &str, creditor: &str) -> f64 {
        self.owed
            .get(&(debtor.to_string(), creditor.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Iterates over `(debtor, creditor, amount)` entries.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.owed
            .iter()
            .map(|((d, c), amount)| (d.as_str(), c.as_str(), *amount))
    }

    /// People owing a non-zero amount to anyone.
    pub fn debtors(&self) -> BTreeSet<&str> {
        self.entries()
            .filter(|(_, _, amount)| *amount != 0.0)
            .map(|(d, _, _)| d)
            .collect()
    }

    /// People owed a non-zero amount by anyone.
    pub fn creditors(&self) -> BTreeSet<&str> {
        self.entries()
            .filter(|(_, _, amount)| *amount != 0.0)
            .map(|(_, c, _)| c)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.debtors().is_empty()
    }

    /// Net position per person; positive means the person is owed money.
    pub fn net_balances(&self) -> BTreeMap<String, f64> {
        let mut net = BTreeMap::new();
        for (debtor, creditor, amount) in self.entries() {
            *net.entry(debtor.to_string()).or_insert(0.0) -= amount;
            *net.entry(creditor.to_string()).or_insert(0.0) += amount;
        }
        net
    }

    /// Renders the grid as a text table with `"<name> owes"` rows and
    /// `"<name> gets"` columns. All-zero rows and columns are left out.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "Currently no balances.".to_string();
        }
        let debtors = self.debtors();
        let creditors = self.creditors();

        let row_labels: Vec<String> = debtors.iter().map(|d| format!("{d} owes")).collect();
        let label_width = row_labels.iter().map(|l| l.len()).max().unwrap_or(0);
        let columns: Vec<(&str, String)> = creditors
            .iter()
            .map(|c| (*c, format!("{c} gets")))
            .collect();

        let mut out = " ".repeat(label_width);
        for (_, header) in &columns {
            let width = header.len().max(8);
            out.push_str(&format!("  {header:>width$}"));
        }
        out.push('\n');
        for (debtor, label) in debtors.iter().zip(&row_labels) {
            out.push_str(&format!("{label:label_width$}"));
            for (creditor, header) in &columns {
                let width = header.len().max(8);
                let amount = self.owed(debtor, creditor);
                out.push_str(&format!("  {amount:>width$.2}"));
            }
            out.push('\n');
        }
        out
    }
}
