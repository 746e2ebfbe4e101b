//! Persistent SQLite store for receipts, recharges, cashouts and support tickets.
//!
//! Every table is append-only.

use rusqlite::{Connection, OptionalExtension, params};
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Errors from the record store.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// The database directory could not be created.
    Io(std::io::Error),
    /// A receipt with this URL is already stored.
    DuplicateReceipt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "database error: {}", e),
            Self::Io(e) => write!(f, "database directory error: {}", e),
            Self::DuplicateReceipt(id) => write!(f, "receipt already recorded: {}", id),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::DuplicateReceipt(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A verified cash-in. The id is the payment URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub id: String,
    pub sender_id: String,
    pub amount: f64,
    pub timestamp: String,
}

impl Receipt {
    pub fn new(url: &str, sender_id: &str, amount: f64) -> Self {
        Self {
            id: url.to_string(),
            sender_id: sender_id.to_string(),
            amount,
            timestamp: now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameRecharge {
    pub id: String,
    pub sender_id: String,
    pub game: String,
    pub username: String,
    pub amount: f64,
    pub cash_app: String,
    pub timestamp: String,
}

impl GameRecharge {
    pub fn new(sender_id: &str, game: &str, username: &str, amount: f64, cash_app: &str) -> Self {
        Self {
            id: new_id(),
            sender_id: sender_id.to_string(),
            game: game.to_string(),
            username: username.to_string(),
            amount,
            cash_app: cash_app.to_string(),
            timestamp: now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cashout {
    pub id: String,
    pub sender_id: String,
    pub game: String,
    pub username: String,
    pub amount: f64,
    pub points_remaining: f64,
    pub timestamp: String,
}

impl Cashout {
    pub fn new(sender_id: &str, game: &str, username: &str, amount: f64, points_remaining: f64) -> Self {
        Self {
            id: new_id(),
            sender_id: sender_id.to_string(),
            game: game.to_string(),
            username: username.to_string(),
            amount,
            points_remaining,
            timestamp: now(),
        }
    }
}

/// A support request. `status` exists in the schema but nothing assigns it.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportTicket {
    pub id: String,
    pub sender_id: String,
    pub summary: String,
    pub status: Option<String>,
    pub timestamp: String,
}

impl SupportTicket {
    pub fn new(sender_id: &str, summary: &str) -> Self {
        Self {
            id: new_id(),
            sender_id: sender_id.to_string(),
            summary: summary.to_string(),
            status: None,
            timestamp: now(),
        }
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub receipts: usize,
    pub recharges: usize,
    pub cashouts: usize,
    pub support_tickets: usize,
}

/// Persistent SQLite database for transaction records.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Self::from_connection(Connection::open(path)?)?;
        let counts = db.counts()?;
        info!(
            "Loaded database from {:?} ({} receipts, {} recharges, {} cashouts, {} tickets)",
            path, counts.receipts, counts.recharges, counts.cashouts, counts.support_tickets
        );
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS receipts (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                amount REAL NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS game_recharges (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                game TEXT NOT NULL,
                username TEXT NOT NULL,
                amount REAL NOT NULL,
                cash_app TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cashouts (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                game TEXT NOT NULL,
                username TEXT NOT NULL,
                amount REAL NOT NULL,
                points_remaining REAL NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS support_tickets (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                summary TEXT NOT NULL,
                status TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recharges_sender ON game_recharges(sender_id);
            CREATE INDEX IF NOT EXISTS idx_cashouts_sender ON cashouts(sender_id);
        "#,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ==================== RECEIPTS ====================

    pub fn receipt_exists(&self, id: &str) -> Result<bool, StoreError> {
        let found = self
            .conn()
            .query_row("SELECT 1 FROM receipts WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a receipt. Fails with `DuplicateReceipt` if the URL is already stored.
    pub fn insert_receipt(&self, receipt: &Receipt) -> Result<(), StoreError> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO receipts (id, sender_id, amount, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![receipt.id, receipt.sender_id, receipt.amount, receipt.timestamp],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateReceipt(receipt.id.clone()));
        }
        Ok(())
    }

    // ==================== RECHARGES ====================

    pub fn insert_recharge(&self, recharge: &GameRecharge) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO game_recharges (id, sender_id, game, username, amount, cash_app, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                recharge.id,
                recharge.sender_id,
                recharge.game,
                recharge.username,
                recharge.amount,
                recharge.cash_app,
                recharge.timestamp
            ],
        )?;
        Ok(())
    }

    /// Recharges for a sender, oldest first.
    pub fn recharges_for(&self, sender_id: &str) -> Result<Vec<GameRecharge>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, game, username, amount, cash_app, timestamp
             FROM game_recharges WHERE sender_id = ?1 ORDER BY timestamp ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![sender_id], |row| {
            Ok(GameRecharge {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                game: row.get(2)?,
                username: row.get(3)?,
                amount: row.get(4)?,
                cash_app: row.get(5)?,
                timestamp: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== CASHOUTS ====================

    pub fn insert_cashout(&self, cashout: &Cashout) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO cashouts (id, sender_id, game, username, amount, points_remaining, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                cashout.id,
                cashout.sender_id,
                cashout.game,
                cashout.username,
                cashout.amount,
                cashout.points_remaining,
                cashout.timestamp
            ],
        )?;
        Ok(())
    }

    /// Cashouts for a sender, oldest first.
    pub fn cashouts_for(&self, sender_id: &str) -> Result<Vec<Cashout>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, game, username, amount, points_remaining, timestamp
             FROM cashouts WHERE sender_id = ?1 ORDER BY timestamp ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![sender_id], |row| {
            Ok(Cashout {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                game: row.get(2)?,
                username: row.get(3)?,
                amount: row.get(4)?,
                points_remaining: row.get(5)?,
                timestamp: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== SUPPORT ====================

    pub fn insert_support_ticket(&self, ticket: &SupportTicket) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO support_tickets (id, sender_id, summary, status, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![ticket.id, ticket.sender_id, ticket.summary, ticket.status, ticket.timestamp],
        )?;
        Ok(())
    }

    pub fn counts(&self) -> Result<Counts, StoreError> {
        let conn = self.conn();
        let count = |table: &str| -> Result<usize, rusqlite::Error> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
        };
        Ok(Counts {
            receipts: count("receipts")?,
            recharges: count("game_recharges")?,
            cashouts: count("cashouts")?,
            support_tickets: count("support_tickets")?,
        })
    }
}
