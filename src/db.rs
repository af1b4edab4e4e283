use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params, Connection, ToSql};
use tracing::{info, warn};

use crate::extract::{BlockKind, Count, NormalizedRow};
use crate::pipeline::EntityResult;

/// Characters a spreadsheet refuses in sheet names, plus `"` for SQL quoting.
static ILLEGAL_SHEET_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:\[\]"]"#).unwrap());

/// Sheet name for an entity's block: cleaned, truncated name + `_` + block kind.
///
/// Two names sharing the same first `prefix_len` characters map to the same
/// sheet; the later one replaces the earlier one's rows.
pub fn sheet_name(entity: &str, kind: BlockKind, prefix_len: usize) -> String {
    let cleaned = ILLEGAL_SHEET_CHARS.replace_all(entity, "");
    let prefix: String = cleaned.trim().chars().take(prefix_len).collect();
    format!("{}_{}", prefix, kind.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub entity: String,
    pub kind: BlockKind,
    pub rows: Vec<NormalizedRow>,
}

/// In-memory aggregate for one run, keyed by sheet name in first-seen order.
pub struct AggregateWriter {
    prefix_len: usize,
    sheets: Vec<Sheet>,
    started_at: DateTime<Utc>,
    entities: usize,
    collisions: usize,
}

impl AggregateWriter {
    pub fn new(prefix_len: usize) -> Self {
        AggregateWriter {
            prefix_len,
            sheets: Vec::new(),
            started_at: Utc::now(),
            entities: 0,
            collisions: 0,
        }
    }

    pub fn add(&mut self, result: &EntityResult) {
        self.entities += 1;
        for block in result.blocks.iter() {
            self.insert(&result.entity.name, block.kind, block.rows.clone());
        }
    }

    fn insert(&mut self, entity: &str, kind: BlockKind, rows: Vec<NormalizedRow>) {
        let name = sheet_name(entity, kind, self.prefix_len);
        // Sheet names are case-insensitive in the container.
        match self.sheets.iter_mut().find(|s| s.name.eq_ignore_ascii_case(&name)) {
            Some(existing) => {
                warn!(
                    "Sheet {} of {:?} overwritten by {:?} (names collide after truncation)",
                    name, existing.entity, entity
                );
                self.collisions += 1;
                existing.entity = entity.to_string();
                existing.rows = rows;
            }
            None => self.sheets.push(Sheet {
                name,
                entity: entity.to_string(),
                kind,
                rows,
            }),
        }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Write every sheet to a fresh SQLite file at `path`, replacing it only
    /// once the whole artifact has been committed.
    pub fn persist(self, path: &Path) -> Result<()> {
        let tmp = tmp_path(path);
        if tmp.exists() {
            std::fs::remove_file(&tmp)
                .with_context(|| format!("Failed to clear {}", tmp.display()))?;
        }

        let mut conn = Connection::open(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        self.write_all(&mut conn)?;
        conn.close().map_err(|(_, e)| e)?;

        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move artifact to {}", path.display()))?;
        info!("Wrote {} sheets to {}", self.sheets.len(), path.display());
        Ok(())
    }

    fn write_all(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE _sheets (
                position   INTEGER PRIMARY KEY,
                sheet      TEXT UNIQUE NOT NULL,
                entity     TEXT NOT NULL,
                block_kind TEXT NOT NULL CHECK(block_kind IN ('series','geography','ranked_items')),
                row_count  INTEGER NOT NULL
            );
            CREATE TABLE _run (
                started_at  TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                entities    INTEGER NOT NULL,
                sheets      INTEGER NOT NULL,
                collisions  INTEGER NOT NULL
            );
            ",
        )?;

        for (position, sheet) in self.sheets.iter().enumerate() {
            let (label_col, count_col) = sheet.kind.columns();
            let count_type = match sheet.kind {
                BlockKind::Series => "INTEGER",
                _ => "TEXT",
            };
            tx.execute_batch(&format!(
                "CREATE TABLE {} (position INTEGER PRIMARY KEY, {} TEXT NOT NULL, {} {});",
                quote_ident(&sheet.name),
                label_col,
                count_col,
                count_type
            ))?;

            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO {} (position, {}, {}) VALUES (?1, ?2, ?3)",
                    quote_ident(&sheet.name),
                    label_col,
                    count_col
                ))?;
                for (i, row) in sheet.rows.iter().enumerate() {
                    stmt.execute(params![i as i64, row.label, row.count])?;
                }
            }

            tx.execute(
                "INSERT INTO _sheets (position, sheet, entity, block_kind, row_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    position as i64,
                    sheet.name,
                    sheet.entity,
                    sheet.kind.as_str(),
                    sheet.rows.len() as i64
                ],
            )?;
        }

        tx.execute(
            "INSERT INTO _run (started_at, finished_at, entities, sheets, collisions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.started_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                self.entities as i64,
                self.sheets.len() as i64,
                self.collisions as i64
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

impl ToSql for Count {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Count::Number(n) => ToSqlOutput::Owned(Value::Integer(*n as i64)),
            Count::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

// ── Reading an artifact ──

pub fn open(path: &Path) -> Result<Connection> {
    if !path.exists() {
        anyhow::bail!("No artifact at {}. Run 'run' first.", path.display());
    }
    Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct SheetInfo {
    pub sheet: String,
    pub entity: String,
    pub kind: BlockKind,
    pub row_count: i64,
}

/// Sheets in the order they were first written.
pub fn fetch_sheets(conn: &Connection) -> Result<Vec<SheetInfo>> {
    let mut stmt = conn.prepare(
        "SELECT sheet, entity, block_kind, row_count FROM _sheets ORDER BY position",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(sheet, entity, kind, row_count)| {
            let kind = BlockKind::parse(&kind)
                .ok_or_else(|| anyhow::anyhow!("Unknown block kind {:?} for {}", kind, sheet))?;
            Ok(SheetInfo {
                sheet,
                entity,
                kind,
                row_count,
            })
        })
        .collect()
}

pub fn fetch_rows(conn: &Connection, sheet: &SheetInfo) -> Result<Vec<NormalizedRow>> {
    let (label_col, count_col) = sheet.kind.columns();
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, {} FROM {} ORDER BY position",
        label_col,
        count_col,
        quote_ident(&sheet.sheet)
    ))?;
    let rows = stmt
        .query_map([], |row| {
            let label: String = row.get(0)?;
            let count = match row.get_ref(1)? {
                ValueRef::Integer(n) => Count::Number(n.max(0) as u64),
                ValueRef::Null => Count::Text(String::new()),
                other => Count::Text(other.as_str().unwrap_or_default().to_string()),
            };
            Ok(NormalizedRow { label, count })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct RunInfo {
    pub started_at: String,
    pub finished_at: String,
    pub entities: i64,
    pub sheets: i64,
    pub collisions: i64,
}

pub fn fetch_run(conn: &Connection) -> Result<RunInfo> {
    let info = conn.query_row(
        "SELECT started_at, finished_at, entities, sheets, collisions FROM _run LIMIT 1",
        [],
        |row| {
            Ok(RunInfo {
                started_at: row.get(0)?,
                finished_at: row.get(1)?,
                entities: row.get(2)?,
                sheets: row.get(3)?,
                collisions: row.get(4)?,
            })
        },
    )?;
    Ok(info)
}
