//! SQLite output database
//!
//! Handles:
//! - files (one row per archive entry, decoded extra-field metadata)
//! - xattrs (decoded extended attributes, raw bytes alongside)
//! - mtypes / ftypes (deduplicated MIME and file-type labels)
//! - localtime / utc views joining all of the above

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, ToSql};
use serde::Serialize;
use std::path::Path;

use crate::extra::AttributeValue;

/// Output database connection
pub struct Database {
    conn: Connection,
}

// ============================================================================
// Data Types
// ============================================================================

/// One archive entry as stored in `files`
///
/// Decoded fields are None when the entry's extra field failed to decode;
/// `error` then holds the reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryRecord {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub full_path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: Option<u32>,
    pub atime: Option<u32>,
    pub ctime: Option<u32>,
    pub btime: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub inode: Option<u64>,
    pub device: Option<u32>,
    pub protection_class: Option<u32>,
    pub attribute_count: u32,
    pub offset: u64,
    pub mime_id: Option<i64>,
    pub type_id: Option<i64>,
    pub error: Option<String>,
}

/// One row of `xattrs`
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRecord {
    pub id: i64,
    pub entry_id: i64,
    pub key: String,
    /// TEXT for decoded values, BLOB when nothing could interpret the bytes
    pub value: Value,
    pub raw: Vec<u8>,
}

impl AttributeRecord {
    pub fn value_text(&self) -> Option<&str> {
        match &self.value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Label dedup tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelTable {
    Mime,
    Type,
}

impl LabelTable {
    fn table(&self) -> &'static str {
        match self {
            LabelTable::Mime => "mtypes",
            LabelTable::Type => "ftypes",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            LabelTable::Mime => "MIME",
            LabelTable::Type => "Type",
        }
    }
}

impl ToSql for AttributeValue {
    fn to_sql(&self) -> SqlResult<ToSqlOutput<'_>> {
        Ok(match self {
            AttributeValue::Raw(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
            other => ToSqlOutput::Owned(Value::Text(other.to_string())),
        })
    }
}

// ============================================================================
// Database Implementation
// ============================================================================

impl Database {
    /// Open (or create) the database at the given path and create the schema
    pub fn open(db_path: &Path) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// In-memory database, mainly for tests
    pub fn open_in_memory() -> SqlResult<Self> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Create all tables and views if they don't exist
    fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute_batch(r#"
            -- Archive entries
            CREATE TABLE IF NOT EXISTS files (
                ID INTEGER PRIMARY KEY,
                Name TEXT,
                Path TEXT,
                FullPath TEXT,
                isDir INTEGER,
                Size INTEGER,
                Mtime INTEGER,
                Atime INTEGER,
                Ctime INTEGER,
                Btime INTEGER,
                UID INTEGER,
                GID INTEGER,
                iNode INTEGER,
                DevID INTEGER,
                DP INTEGER,
                XCount INTEGER,
                MIME INTEGER,
                Type INTEGER,
                Offset INTEGER,
                Error TEXT
            );

            -- Extended attributes (Raw is always the undecoded bytes)
            CREATE TABLE IF NOT EXISTS xattrs (
                ID INTEGER PRIMARY KEY AUTOINCREMENT,
                FileID INTEGER,
                Key TEXT,
                Value TEXT,
                Raw BLOB,
                FOREIGN KEY (FileID) REFERENCES files(ID)
            );

            -- Deduplicated labels
            CREATE TABLE IF NOT EXISTS mtypes (
                ID INTEGER PRIMARY KEY AUTOINCREMENT,
                MIME TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS ftypes (
                ID INTEGER PRIMARY KEY AUTOINCREMENT,
                Type TEXT NOT NULL UNIQUE
            );

            CREATE INDEX IF NOT EXISTS idx_xattrs_file ON xattrs(FileID);

            CREATE VIEW IF NOT EXISTS localtime AS
                SELECT
                    files.ID,
                    Name,
                    Path,
                    FullPath,
                    isDir,
                    Size,
                    datetime(Mtime, 'unixepoch', 'localtime') AS Mtime,
                    datetime(Atime, 'unixepoch', 'localtime') AS Atime,
                    datetime(Ctime, 'unixepoch', 'localtime') AS Ctime,
                    datetime(Btime, 'unixepoch', 'localtime') AS Btime,
                    UID,
                    GID,
                    iNode,
                    DevID AS DeviceID,
                    DP,
                    mtypes.MIME,
                    ftypes.Type,
                    XCount AS ExtraAttrs,
                    Offset AS ZipOffset,
                    Key AS XattrKey,
                    Value AS XattrValue,
                    Raw,
                    Error
                FROM files
                LEFT JOIN xattrs ON files.ID = xattrs.FileID
                LEFT JOIN mtypes ON files.MIME = mtypes.ID
                LEFT JOIN ftypes ON files.Type = ftypes.ID;

            CREATE VIEW IF NOT EXISTS utc AS
                SELECT
                    files.ID,
                    Name,
                    Path,
                    FullPath,
                    isDir,
                    Size,
                    datetime(Mtime, 'unixepoch') AS Mtime,
                    datetime(Atime, 'unixepoch') AS Atime,
                    datetime(Ctime, 'unixepoch') AS Ctime,
                    datetime(Btime, 'unixepoch') AS Btime,
                    UID,
                    GID,
                    iNode,
                    DevID AS DeviceID,
                    DP,
                    mtypes.MIME,
                    ftypes.Type,
                    XCount AS ExtraAttrs,
                    Offset AS ZipOffset,
                    Key AS XattrKey,
                    Value AS XattrValue,
                    Raw,
                    Error
                FROM files
                LEFT JOIN xattrs ON files.ID = xattrs.FileID
                LEFT JOIN mtypes ON files.MIME = mtypes.ID
                LEFT JOIN ftypes ON files.Type = ftypes.ID;
        "#)?;

        Ok(())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Start a write batch
    pub fn begin(&self) -> SqlResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Commit the open batch, if any
    pub fn commit(&self) -> SqlResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    // ========================================================================
    // Entry Operations
    // ========================================================================

    pub fn insert_entry(&self, entry: &EntryRecord) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO files (ID, Name, Path, FullPath, isDir, Size, Mtime, Atime, Ctime, Btime,
                UID, GID, iNode, DevID, DP, XCount, Offset, MIME, Type, Error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                entry.id, entry.name, entry.path, entry.full_path, entry.is_dir, entry.size as i64,
                entry.mtime, entry.atime, entry.ctime, entry.btime,
                entry.uid, entry.gid,
                // Bit pattern preserved for inode numbers above i64::MAX
                entry.inode.map(|v| v as i64),
                entry.device, entry.protection_class, entry.attribute_count,
                entry.offset as i64, entry.mime_id, entry.type_id, entry.error
            ],
        )?;
        Ok(())
    }

    pub fn entry(&self, id: i64) -> SqlResult<Option<EntryRecord>> {
        self.conn
            .query_row(
                "SELECT ID, Name, Path, FullPath, isDir, Size, Mtime, Atime, Ctime, Btime,
                    UID, GID, iNode, DevID, DP, XCount, Offset, MIME, Type, Error
                 FROM files WHERE ID = ?1",
                params![id],
                |row| {
                    Ok(EntryRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        path: row.get(2)?,
                        full_path: row.get(3)?,
                        is_dir: row.get(4)?,
                        size: row.get::<_, i64>(5)? as u64,
                        mtime: row.get(6)?,
                        atime: row.get(7)?,
                        ctime: row.get(8)?,
                        btime: row.get(9)?,
                        uid: row.get(10)?,
                        gid: row.get(11)?,
                        inode: row.get::<_, Option<i64>>(12)?.map(|v| v as u64),
                        device: row.get(13)?,
                        protection_class: row.get(14)?,
                        attribute_count: row.get(15)?,
                        offset: row.get::<_, i64>(16)? as u64,
                        mime_id: row.get(17)?,
                        type_id: row.get(18)?,
                        error: row.get(19)?,
                    })
                },
            )
            .optional()
    }

    pub fn entry_count(&self) -> SqlResult<i64> {
        self.conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
    }

    // ========================================================================
    // Attribute Operations
    // ========================================================================

    pub fn insert_attribute(&self, entry_id: i64, key: &str, value: &AttributeValue, raw: &[u8]) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO xattrs (FileID, Key, Value, Raw) VALUES (?1, ?2, ?3, ?4)",
            params![entry_id, key, value, raw],
        )?;
        Ok(())
    }

    pub fn attributes_for(&self, entry_id: i64) -> SqlResult<Vec<AttributeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT ID, FileID, Key, Value, Raw FROM xattrs WHERE FileID = ?1 ORDER BY ID",
        )?;

        let rows = stmt.query_map(params![entry_id], |row| {
            Ok(AttributeRecord {
                id: row.get(0)?,
                entry_id: row.get(1)?,
                key: row.get(2)?,
                value: row.get(3)?,
                raw: row.get(4)?,
            })
        })?;

        rows.collect()
    }

    pub fn attribute_count(&self) -> SqlResult<i64> {
        self.conn.query_row("SELECT COUNT(*) FROM xattrs", [], |row| row.get(0))
    }

    /// Entries whose XCount disagrees with their stored attribute rows
    pub fn count_mismatches(&self) -> SqlResult<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM files
             WHERE XCount != (SELECT COUNT(*) FROM xattrs WHERE xattrs.FileID = files.ID)",
            [],
            |row| row.get(0),
        )
    }

    // ========================================================================
    // Label Operations
    // ========================================================================

    pub fn find_label(&self, table: LabelTable, label: &str) -> SqlResult<Option<i64>> {
        let sql = format!("SELECT ID FROM {} WHERE {} = ?1", table.table(), table.column());
        self.conn
            .query_row(&sql, params![label], |row| row.get(0))
            .optional()
    }

    /// Return the label's ID, inserting it on first sighting
    pub fn lookup_or_insert_label(&self, table: LabelTable, label: &str) -> SqlResult<i64> {
        if let Some(id) = self.find_label(table, label)? {
            return Ok(id);
        }
        let sql = format!("INSERT INTO {} ({}) VALUES (?1)", table.table(), table.column());
        self.conn.execute(&sql, params![label])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn labels(&self, table: LabelTable) -> SqlResult<Vec<(i64, String)>> {
        let sql = format!("SELECT ID, {} FROM {} ORDER BY ID", table.column(), table.table());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    pub fn label_count(&self, table: LabelTable) -> SqlResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table());
        self.conn.query_row(&sql, [], |row| row.get(0))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entry(id: i64) -> EntryRecord {
        EntryRecord {
            id,
            name: "IMG_0001.HEIC".into(),
            path: "private/var/mobile/Media/DCIM/100APPLE".into(),
            full_path: "private/var/mobile/Media/DCIM/100APPLE/IMG_0001.HEIC".into(),
            is_dir: false,
            size: 1_234_567,
            mtime: Some(1_600_000_000),
            atime: Some(1_600_000_001),
            ctime: Some(1_600_000_002),
            btime: Some(1_500_000_000),
            uid: Some(501),
            gid: Some(501),
            inode: Some(u64::MAX - 1),
            device: Some(16_777_220),
            protection_class: Some(3),
            attribute_count: 0,
            offset: 4096,
            ..Default::default()
        }
    }

    #[test]
    fn test_entry_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let entry = sample_entry(0);
        db.insert_entry(&entry).unwrap();

        assert_eq!(db.entry(0).unwrap(), Some(entry));
        assert_eq!(db.entry(1).unwrap(), None);
        assert_eq!(db.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_attribute_values_text_and_blob() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entry(&EntryRecord { attribute_count: 2, ..sample_entry(7) }).unwrap();
        db.insert_attribute(7, "com.apple.clen", &AttributeValue::Unsigned(42), &42u64.to_le_bytes())
            .unwrap();
        db.insert_attribute(7, "com.apple.bin", &AttributeValue::Raw(vec![0xFF, 0x00]), &[0xFF, 0x00])
            .unwrap();

        let attrs = db.attributes_for(7).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].value_text(), Some("42"));
        assert_eq!(attrs[0].raw, 42u64.to_le_bytes());
        assert_eq!(attrs[1].value, Value::Blob(vec![0xFF, 0x00]));
        assert_eq!(db.count_mismatches().unwrap(), 0);
    }

    #[test]
    fn test_label_dedup() {
        let db = Database::open_in_memory().unwrap();
        let a = db.lookup_or_insert_label(LabelTable::Mime, "image/jpeg").unwrap();
        let b = db.lookup_or_insert_label(LabelTable::Mime, "text/plain").unwrap();
        let c = db.lookup_or_insert_label(LabelTable::Mime, "image/jpeg").unwrap();

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(db.label_count(LabelTable::Mime).unwrap(), 2);
        // Tables are independent
        assert_eq!(db.find_label(LabelTable::Type, "image/jpeg").unwrap(), None);
    }

    #[test]
    fn test_views_render_timestamps() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entry(&sample_entry(0)).unwrap();

        let (mtime, offset): (String, i64) = db
            .connection()
            .query_row("SELECT Mtime, ZipOffset FROM utc WHERE ID = 0", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(mtime, "2020-09-13 12:26:40");
        assert_eq!(offset, 4096);

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM localtime", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_batches_persist_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.db");
        {
            let db = Database::open(&path).unwrap();
            db.begin().unwrap();
            db.insert_entry(&sample_entry(0)).unwrap();
            db.commit().unwrap();
            // Committing twice is harmless
            db.commit().unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.entry_count().unwrap(), 1);
    }
}
