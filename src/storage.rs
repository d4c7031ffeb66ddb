use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use fs2::FileExt;
use rusqlite::{Connection, params};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{Backend, StorageSettings};
use crate::error::StorageError;
use crate::models::{DATE_FMT, Expense, NewExpense};

/// Append-only expense table keyed by an auto-assigned integer id.
///
/// `insert` is all-or-nothing per call and a no-op on an empty batch;
/// `load_all` returns rows in storage order; `delete` of an unknown id is
/// a no-op rather than an error.
pub trait ExpenseStore {
    fn insert(&mut self, records: &[NewExpense]) -> Result<(), StorageError>;
    fn load_all(&self) -> Result<Vec<Expense>, StorageError>;
    fn delete(&mut self, id: i64) -> Result<(), StorageError>;
}

/// Open the backend selected in settings.
pub fn open_store(settings: &StorageSettings) -> Result<Box<dyn ExpenseStore>, StorageError> {
    match settings.backend {
        Backend::Csv => Ok(Box::new(CsvStore::new(settings.csv_path.clone()))),
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(&settings.db_path)?)),
    }
}

/// Flat-file backend: one CSV with a header row, rewritten whole under an
/// exclusive lock on every mutation.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_rows(&self) -> Result<Vec<Expense>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        file.lock_shared()?;
        let mut reader = ReaderBuilder::new().from_reader(&file);
        let mut records = Vec::new();
        for row in reader.deserialize::<RawExpense>() {
            records.push(row?.into_record()?);
        }
        file.unlock()?;
        Ok(records)
    }

    fn write_rows(&self, records: &[Expense]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        file.set_len(0)?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(&file);
        for record in records {
            writer.serialize(RawExpense::from(record))?;
        }
        writer.flush()?;
        file.unlock()?;
        Ok(())
    }
}

impl ExpenseStore for CsvStore {
    fn insert(&mut self, records: &[NewExpense]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut all = self.read_rows()?;
        let mut next_id = all.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        for record in records {
            all.push(record.clone().assign_id(next_id));
            next_id += 1;
        }
        self.write_rows(&all)
    }

    fn load_all(&self) -> Result<Vec<Expense>, StorageError> {
        self.read_rows()
    }

    fn delete(&mut self, id: i64) -> Result<(), StorageError> {
        let mut all = self.read_rows()?;
        let before = all.len();
        all.retain(|r| r.id != id);
        if all.len() == before {
            return Ok(());
        }
        self.write_rows(&all)
    }
}

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    payment_method TEXT NOT NULL,
    expense_type TEXT NOT NULL,
    installment_index INTEGER,
    installment_total INTEGER
)";

/// Embedded-table backend over a single SQLite file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self { conn })
    }
}

impl ExpenseStore for SqliteStore {
    fn insert(&mut self, records: &[NewExpense]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO expenses (date, description, category, amount, \
                 payment_method, expense_type, installment_index, installment_total) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.date.format(DATE_FMT).to_string(),
                    record.description,
                    record.category.label(),
                    record.amount,
                    record.payment_method.label(),
                    record.expense_type.label(),
                    record.installment_index,
                    record.installment_total,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Expense>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, description, category, amount, payment_method, \
             expense_type, installment_index, installment_total \
             FROM expenses ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawExpense {
                id: row.get(0)?,
                date: row.get(1)?,
                description: row.get(2)?,
                category: row.get(3)?,
                amount: row.get(4)?,
                payment_method: row.get(5)?,
                expense_type: row.get(6)?,
                installment_index: row.get(7)?,
                installment_total: row.get(8)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn delete(&mut self, id: i64) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
        Ok(())
    }
}

/// Write a copy of the loaded records to a CSV file of the user's choosing.
pub fn export_csv(path: &Path, records: &[Expense]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
    for record in records {
        writer.serialize(RawExpense::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Wire form of a row: dates and enums as text, shared by both backends.
#[derive(serde::Deserialize, serde::Serialize)]
struct RawExpense {
    id: i64,
    date: String,
    description: String,
    category: String,
    amount: f64,
    payment_method: String,
    expense_type: String,
    installment_index: Option<u32>,
    installment_total: Option<u32>,
}

impl RawExpense {
    fn into_record(self) -> Result<Expense, StorageError> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FMT)
            .map_err(|_| StorageError::BadDate(self.date.clone()))?;
        Ok(Expense {
            id: self.id,
            date,
            description: self.description,
            category: parse_field("category", &self.category)?,
            amount: self.amount,
            payment_method: parse_field("payment method", &self.payment_method)?,
            expense_type: parse_field("expense type", &self.expense_type)?,
            installment_index: self.installment_index,
            installment_total: self.installment_total,
        })
    }
}

impl From<&Expense> for RawExpense {
    fn from(record: &Expense) -> Self {
        RawExpense {
            id: record.id,
            date: record.date.format(DATE_FMT).to_string(),
            description: record.description.clone(),
            category: record.category.label().to_string(),
            amount: record.amount,
            payment_method: record.payment_method.label().to_string(),
            expense_type: record.expense_type.label().to_string(),
            installment_index: record.installment_index,
            installment_total: record.installment_total,
        }
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, StorageError> {
    value.parse().map_err(|_| StorageError::BadField {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ExpenseType, PaymentMethod};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static TEST_DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn temp_csv_path() -> PathBuf {
        let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "expense_tracker_test_{}_{}",
            std::process::id(),
            seq
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("expenses.csv")
    }

    fn sample(description: &str, amount: f64) -> NewExpense {
        NewExpense {
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            description: description.to_string(),
            category: Category::Food,
            amount,
            payment_method: PaymentMethod::Credit,
            expense_type: ExpenseType::Variable,
            installment_index: Some(1),
            installment_total: Some(2),
        }
    }

    fn assert_round_trip(store: &mut dyn ExpenseStore) {
        let batch = vec![sample("lunch", 25.5), sample("market", 110.2)];
        store.insert(&batch).unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        for (new, stored) in batch.iter().zip(&loaded) {
            assert_eq!(&new.clone().assign_id(stored.id), stored);
        }
        assert_eq!(loaded[0].id + 1, loaded[1].id);
    }

    #[test]
    fn csv_round_trip() {
        let mut store = CsvStore::new(temp_csv_path());
        assert_round_trip(&mut store);
    }

    #[test]
    fn sqlite_round_trip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_round_trip(&mut store);
    }

    #[test]
    fn csv_reassigns_from_highest_surviving_id() {
        let mut store = CsvStore::new(temp_csv_path());
        store.insert(&[sample("a", 1.0), sample("b", 2.0)]).unwrap();
        store.delete(2).unwrap();
        store.insert(&[sample("c", 3.0)]).unwrap();
        let ids: Vec<i64> = store.load_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn empty_insert_is_a_no_op() {
        let mut store = CsvStore::new(temp_csv_path());
        store.insert(&[]).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        assert!(!store.path.exists());

        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert(&[]).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn deleting_missing_id_is_a_no_op() {
        let mut store = CsvStore::new(temp_csv_path());
        store.insert(&[sample("a", 1.0)]).unwrap();
        store.delete(42).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);

        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert(&[sample("a", 1.0)]).unwrap();
        store.delete(42).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn sqlite_delete_removes_only_the_given_id() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert(&[sample("a", 1.0), sample("b", 2.0)]).unwrap();
        store.delete(1).unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].description, "b");
    }
}
