use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params, params_from_iter};

use crate::model::PlayerRecord;

/// Read-only access to stored player snapshots.
///
/// Implementations stream records in storage order and never load the full
/// collection up front. An `Err` from the visitor or from the store aborts
/// the scan and is returned unchanged.
pub trait RecordSource {
    fn for_each_candidate(
        &self,
        codes: &[&str],
        visit: &mut dyn FnMut(PlayerRecord) -> Result<()>,
    ) -> Result<()>;

    fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>>;
}

/// Records held in memory, mostly for tests and benches.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub records: Vec<PlayerRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<PlayerRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for MemorySource {
    fn for_each_candidate(
        &self,
        codes: &[&str],
        visit: &mut dyn FnMut(PlayerRecord) -> Result<()>,
    ) -> Result<()> {
        for record in self.records.iter().filter(|r| r.plays_any(codes)) {
            visit(record.clone())?;
        }
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>> {
        Ok(self.records.iter().find(|r| r.name == name).cloned())
    }
}

/// One JSON document per line; blank lines are skipped.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

}

impl RecordSource for JsonLinesSource {
    fn for_each_candidate(
        &self,
        codes: &[&str],
        visit: &mut dyn FnMut(PlayerRecord) -> Result<()>,
    ) -> Result<()> {
        read_json_lines(&self.path, &mut |record| {
            if record.plays_any(codes) {
                visit(record)?;
            }
            Ok(true)
        })
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>> {
        let mut found = None;
        read_json_lines(&self.path, &mut |record| {
            if record.name == name {
                found = Some(record);
                return Ok(false);
            }
            Ok(true)
        })?;
        Ok(found)
    }
}

/// Visits each decoded line; the visitor returns `false` to stop early.
pub fn read_json_lines(
    path: &Path,
    visit: &mut dyn FnMut(PlayerRecord) -> Result<bool>,
) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("open player records {}", path.display()))?;
    let reader = BufReader::new(file);
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read {} line {}", path.display(), idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: PlayerRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("decode {} line {}", path.display(), idx + 1))?;
        if !visit(record)? {
            break;
        }
    }
    Ok(())
}

/// Player documents stored as JSON in SQLite, with a position index table.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Write-side handle for imports; creates the file and schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Query-side handle. Never creates anything; a missing file or schema is an error.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db {} read-only", path.display()))?;
        ensure_schema(&conn)
            .with_context(|| format!("players db {} is not initialised", path.display()))?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .context("count players")?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

impl RecordSource for SqliteSource {
    fn for_each_candidate(
        &self,
        codes: &[&str],
        visit: &mut dyn FnMut(PlayerRecord) -> Result<()>,
    ) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; codes.len()].join(", ");
        let sql = format!(
            "SELECT p.doc FROM players p
             WHERE EXISTS (
                SELECT 1 FROM player_positions pp
                WHERE pp.player_id = p.id AND pp.code IN ({placeholders})
             )
             ORDER BY p.id"
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare candidate query")?;
        let upper: Vec<String> = codes.iter().map(|c| c.trim().to_ascii_uppercase()).collect();
        let mut rows = stmt
            .query(params_from_iter(upper.iter()))
            .context("query candidates")?;
        while let Some(row) = rows.next().context("read candidate row")? {
            let doc: String = row.get(0).context("read candidate doc")?;
            let record: PlayerRecord =
                serde_json::from_str(&doc).context("decode stored player doc")?;
            visit(record)?;
        }
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc FROM players WHERE name = ?1 ORDER BY id LIMIT 1")
            .context("prepare name lookup")?;
        let mut rows = stmt.query(params![name]).context("query player by name")?;
        let Some(row) = rows.next().context("read player row")? else {
            return Ok(None);
        };
        let doc: String = row.get(0).context("read player doc")?;
        let record = serde_json::from_str(&doc).context("decode stored player doc")?;
        Ok(Some(record))
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            external_id TEXT NULL,
            doc TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_players_name ON players(name);
        CREATE INDEX IF NOT EXISTS idx_players_external_id ON players(external_id);

        CREATE TABLE IF NOT EXISTS player_positions (
            player_id INTEGER NOT NULL,
            code TEXT NOT NULL,
            PRIMARY KEY (player_id, code)
        );
        CREATE INDEX IF NOT EXISTS idx_player_positions_code ON player_positions(code);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    for table in ["players", "player_positions"] {
        let found: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .context("inspect sqlite schema")?;
        if found == 0 {
            bail!("missing table {table}");
        }
    }
    Ok(())
}

/// Inserts records, replacing earlier rows that share an external id.
pub fn import_records(
    conn: &mut Connection,
    records: impl IntoIterator<Item = PlayerRecord>,
) -> Result<usize> {
    let tx = conn.transaction().context("begin import")?;
    let now = Utc::now().to_rfc3339();
    let mut imported = 0usize;
    for record in records {
        upsert_record(&tx, &record, &now)?;
        imported += 1;
    }
    tx.commit().context("commit import")?;
    Ok(imported)
}

pub fn import_json_lines(conn: &mut Connection, path: &Path) -> Result<usize> {
    let mut records = Vec::new();
    read_json_lines(path, &mut |record| {
        records.push(record);
        Ok(true)
    })?;
    import_records(conn, records)
}

fn upsert_record(tx: &rusqlite::Transaction<'_>, record: &PlayerRecord, now: &str) -> Result<()> {
    if let Some(external_id) = record.external_id.as_deref() {
        tx.execute(
            "DELETE FROM player_positions WHERE player_id IN
                (SELECT id FROM players WHERE external_id = ?1)",
            params![external_id],
        )
        .context("clear stale positions")?;
        tx.execute(
            "DELETE FROM players WHERE external_id = ?1",
            params![external_id],
        )
        .context("clear stale player")?;
    }

    let doc = serde_json::to_string(record).context("encode player doc")?;
    tx.execute(
        "INSERT INTO players (name, external_id, doc, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![record.name, record.external_id, doc, now],
    )
    .with_context(|| format!("insert player {}", record.name))?;
    let player_id = tx.last_insert_rowid();

    for code in &record.positions {
        tx.execute(
            "INSERT OR IGNORE INTO player_positions (player_id, code) VALUES (?1, ?2)",
            params![player_id, code.trim().to_ascii_uppercase()],
        )
        .context("insert player position")?;
    }
    Ok(())
}
