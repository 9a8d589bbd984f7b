use crate::error::{StorageError, StorageResult, ValidationError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtData {
    pub id: i64,
    pub country: String,
    pub debt_amount: f64,
    pub gdp: Option<f64>,
    pub debt_to_gdp: Option<f64>,
    pub year: i64,
    pub source: Option<String>,
    pub created_at: String,
}

/// Debt row as submitted by the API or read from CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDebtData {
    pub country: String,
    pub debt_amount: f64,
    #[serde(default)]
    pub gdp: Option<f64>,
    pub year: i64,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicIndicator {
    pub id: i64,
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub country: Option<String>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEconomicIndicator {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Defaults to insertion time
    #[serde(default)]
    pub recorded_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtOwnership {
    pub id: i64,
    pub country: String,
    pub holder: String,
    pub amount: f64,
    pub percentage: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDebtOwnership {
    pub country: String,
    pub holder: String,
    pub amount: f64,
    #[serde(default)]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSource {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub active: bool,
    pub last_fetched: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApiSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

// ============================================================================
// VALIDATION
// ============================================================================

fn require_text(value: &str, what: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("{what} must not be empty")));
    }
    Ok(())
}

fn require_amount(value: f64, what: &str) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(format!("{what} must be a non-negative number")));
    }
    Ok(())
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.username, "username")?;
        if self.username.chars().any(char::is_whitespace) {
            return Err(ValidationError::new("username must not contain whitespace"));
        }
        Ok(())
    }
}

impl NewDebtData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.country, "country")?;
        require_amount(self.debt_amount, "debt_amount")?;
        if let Some(gdp) = self.gdp {
            require_amount(gdp, "gdp")?;
        }
        if !(1800..=2200).contains(&self.year) {
            return Err(ValidationError::new("year out of range"));
        }
        Ok(())
    }

    /// Debt as a percentage of GDP, when GDP is known and positive
    pub fn debt_to_gdp(&self) -> Option<f64> {
        self.gdp
            .filter(|gdp| *gdp > 0.0)
            .map(|gdp| self.debt_amount / gdp * 100.0)
    }
}

impl NewEconomicIndicator {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "name")?;
        if !self.value.is_finite() {
            return Err(ValidationError::new("value must be a finite number"));
        }
        Ok(())
    }
}

impl NewDebtOwnership {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.country, "country")?;
        require_text(&self.holder, "holder")?;
        require_amount(self.amount, "amount")?;
        if let Some(pct) = self.percentage {
            if !(0.0..=100.0).contains(&pct) {
                return Err(ValidationError::new("percentage must be between 0 and 100"));
            }
        }
        Ok(())
    }
}

impl NewApiSource {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "name")?;
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ValidationError::new("url must be http(s)"));
        }
        Ok(())
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> StorageResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            display_name TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS debt_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            country TEXT NOT NULL,
            debt_amount REAL NOT NULL,
            gdp REAL,
            debt_to_gdp REAL,
            year INTEGER NOT NULL,
            source TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS economic_indicators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            value REAL NOT NULL,
            unit TEXT,
            country TEXT,
            recorded_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS debt_ownership (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            country TEXT NOT NULL,
            holder TEXT NOT NULL,
            amount REAL NOT NULL,
            percentage REAL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS api_sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            url TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            last_fetched TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_debt_country ON debt_data(country);
        CREATE INDEX IF NOT EXISTS idx_indicator_name ON economic_indicators(name);
        CREATE INDEX IF NOT EXISTS idx_ownership_country ON debt_ownership(country);",
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn debt_from_row(row: &Row) -> rusqlite::Result<DebtData> {
    Ok(DebtData {
        id: row.get(0)?,
        country: row.get(1)?,
        debt_amount: row.get(2)?,
        gdp: row.get(3)?,
        debt_to_gdp: row.get(4)?,
        year: row.get(5)?,
        source: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn indicator_from_row(row: &Row) -> rusqlite::Result<EconomicIndicator> {
    Ok(EconomicIndicator {
        id: row.get(0)?,
        name: row.get(1)?,
        value: row.get(2)?,
        unit: row.get(3)?,
        country: row.get(4)?,
        recorded_at: row.get(5)?,
    })
}

fn ownership_from_row(row: &Row) -> rusqlite::Result<DebtOwnership> {
    Ok(DebtOwnership {
        id: row.get(0)?,
        country: row.get(1)?,
        holder: row.get(2)?,
        amount: row.get(3)?,
        percentage: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn source_from_row(row: &Row) -> rusqlite::Result<ApiSource> {
    Ok(ApiSource {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        active: row.get(3)?,
        last_fetched: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, username, display_name, created_at";
const DEBT_COLUMNS: &str = "id, country, debt_amount, gdp, debt_to_gdp, year, source, created_at";
const INDICATOR_COLUMNS: &str = "id, name, value, unit, country, recorded_at";
const OWNERSHIP_COLUMNS: &str = "id, country, holder, amount, percentage, created_at";
const SOURCE_COLUMNS: &str = "id, name, url, active, last_fetched";

// ============================================================================
// STORAGE
// ============================================================================

/// Optional relational storage.
///
/// Without a configured path the storage is disconnected: it never fails
/// to construct, and every query returns `StorageError::Unavailable`.
pub struct Storage {
    conn: Option<Connection>,
}

impl Storage {
    /// Open (and migrate) the database at `path`, or degrade when absent
    pub fn open(path: Option<&Path>) -> StorageResult<Self> {
        match path {
            Some(path) => {
                let conn = Connection::open(path)?;
                setup_database(&conn)?;
                info!(path = %path.display(), "database opened");
                Ok(Storage { conn: Some(conn) })
            }
            None => {
                warn!("no database configured; storage calls will fail until one is set");
                Ok(Self::disconnected())
            }
        }
    }

    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Storage { conn: Some(conn) })
    }

    pub fn disconnected() -> Self {
        Storage { conn: None }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&self) -> StorageResult<&Connection> {
        self.conn.as_ref().ok_or(StorageError::Unavailable)
    }

    fn select_all<T>(
        &self,
        sql: &str,
        arg: Option<&str>,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> StorageResult<Vec<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = match arg {
            Some(arg) => stmt.query_map([arg], map)?.collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    // ------------------------------------------------------------------------
    // users
    // ------------------------------------------------------------------------

    pub fn create_user(&self, new: &NewUser) -> StorageResult<User> {
        new.validate()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, display_name, created_at) VALUES (?1, ?2, ?3)",
            params![new.username, new.display_name, Utc::now().to_rfc3339()],
        )?;
        debug!(username = %new.username, "user created");
        self.get_user_by_username(&new.username)
    }

    pub fn list_users(&self) -> StorageResult<Vec<User>> {
        self.select_all(
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"),
            None,
            user_from_row,
        )
    }

    pub fn get_user_by_username(&self, username: &str) -> StorageResult<User> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            [username],
            user_from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(format!("user {username}")))
    }

    // ------------------------------------------------------------------------
    // debt_data
    // ------------------------------------------------------------------------

    pub fn insert_debt_data(&self, new: &NewDebtData) -> StorageResult<DebtData> {
        new.validate()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO debt_data (country, debt_amount, gdp, debt_to_gdp, year, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.country,
                new.debt_amount,
                new.gdp,
                new.debt_to_gdp(),
                new.year,
                new.source,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            &format!("SELECT {DEBT_COLUMNS} FROM debt_data WHERE id = ?1"),
            [id],
            debt_from_row,
        )?)
    }

    pub fn list_debt_data(&self) -> StorageResult<Vec<DebtData>> {
        self.select_all(
            &format!("SELECT {DEBT_COLUMNS} FROM debt_data ORDER BY year DESC, country"),
            None,
            debt_from_row,
        )
    }

    pub fn debt_data_by_country(&self, country: &str) -> StorageResult<Vec<DebtData>> {
        self.select_all(
            &format!(
                "SELECT {DEBT_COLUMNS} FROM debt_data WHERE country = ?1 COLLATE NOCASE ORDER BY year DESC"
            ),
            Some(country),
            debt_from_row,
        )
    }

    /// Insert every valid row, skipping (and logging) the rest
    pub fn import_debt_data(&self, rows: &[NewDebtData]) -> StorageResult<usize> {
        let mut inserted = 0;
        let mut skipped = 0;

        for row in rows {
            match self.insert_debt_data(row) {
                Ok(_) => inserted += 1,
                Err(StorageError::Invalid(e)) => {
                    warn!(country = %row.country, year = row.year, "skipping row: {}", e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(inserted, skipped, "debt data import finished");
        Ok(inserted)
    }

    // ------------------------------------------------------------------------
    // economic_indicators
    // ------------------------------------------------------------------------

    pub fn insert_indicator(&self, new: &NewEconomicIndicator) -> StorageResult<EconomicIndicator> {
        new.validate()?;
        let conn = self.conn()?;
        let recorded_at = new
            .recorded_at
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        conn.execute(
            "INSERT INTO economic_indicators (name, value, unit, country, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new.name, new.value, new.unit, new.country, recorded_at],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            &format!("SELECT {INDICATOR_COLUMNS} FROM economic_indicators WHERE id = ?1"),
            [id],
            indicator_from_row,
        )?)
    }

    pub fn list_indicators(&self) -> StorageResult<Vec<EconomicIndicator>> {
        self.select_all(
            &format!("SELECT {INDICATOR_COLUMNS} FROM economic_indicators ORDER BY recorded_at DESC"),
            None,
            indicator_from_row,
        )
    }

    pub fn indicators_by_name(&self, name: &str) -> StorageResult<Vec<EconomicIndicator>> {
        self.select_all(
            &format!(
                "SELECT {INDICATOR_COLUMNS} FROM economic_indicators WHERE name = ?1 ORDER BY recorded_at DESC"
            ),
            Some(name),
            indicator_from_row,
        )
    }

    // ------------------------------------------------------------------------
    // debt_ownership
    // ------------------------------------------------------------------------

    pub fn insert_ownership(&self, new: &NewDebtOwnership) -> StorageResult<DebtOwnership> {
        new.validate()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO debt_ownership (country, holder, amount, percentage, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new.country, new.holder, new.amount, new.percentage, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            &format!("SELECT {OWNERSHIP_COLUMNS} FROM debt_ownership WHERE id = ?1"),
            [id],
            ownership_from_row,
        )?)
    }

    pub fn list_ownership(&self) -> StorageResult<Vec<DebtOwnership>> {
        self.select_all(
            &format!("SELECT {OWNERSHIP_COLUMNS} FROM debt_ownership ORDER BY amount DESC"),
            None,
            ownership_from_row,
        )
    }

    pub fn ownership_by_country(&self, country: &str) -> StorageResult<Vec<DebtOwnership>> {
        self.select_all(
            &format!(
                "SELECT {OWNERSHIP_COLUMNS} FROM debt_ownership WHERE country = ?1 COLLATE NOCASE ORDER BY amount DESC"
            ),
            Some(country),
            ownership_from_row,
        )
    }

    // ------------------------------------------------------------------------
    // api_sources
    // ------------------------------------------------------------------------

    pub fn insert_api_source(&self, new: &NewApiSource) -> StorageResult<ApiSource> {
        new.validate()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO api_sources (name, url, active) VALUES (?1, ?2, ?3)",
            params![new.name, new.url, new.active],
        )?;
        self.get_api_source_by_name(&new.name)
    }

    pub fn list_api_sources(&self) -> StorageResult<Vec<ApiSource>> {
        self.select_all(
            &format!("SELECT {SOURCE_COLUMNS} FROM api_sources ORDER BY name"),
            None,
            source_from_row,
        )
    }

    pub fn get_api_source_by_name(&self, name: &str) -> StorageResult<ApiSource> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM api_sources WHERE name = ?1"),
            [name],
            source_from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(format!("api source {name}")))
    }

    /// Stamp `last_fetched` with the current time
    pub fn mark_source_fetched(&self, name: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE api_sources SET last_fetched = ?1 WHERE name = ?2",
            params![Utc::now().to_rfc3339(), name],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("api source {name}")));
        }
        Ok(())
    }
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// Read debt rows from a CSV with headers `country,debt_amount,gdp,year,source`
pub fn load_debt_csv(csv_path: &Path) -> StorageResult<Vec<NewDebtData>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: NewDebtData = result?;
        rows.push(row);
    }

    debug!(rows = rows.len(), path = %csv_path.display(), "loaded debt csv");
    Ok(rows)
}
