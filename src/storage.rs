//! Annotated-result storage.
//!
//! Confirmed detection results are persisted as one losslessly encoded PNG
//! blob per row, append-only, and read back only for display or export. The
//! store is deliberately narrow: append one row, enumerate all rows in table
//! order. There is no update, no delete, and no index beyond row order.
//!
//! Single-row inserts are atomic; a failed append leaves no partial row.
//! Enumeration re-reads from the start of the table on every call and decodes
//! lazily, so one corrupt blob is surfaced for that row alone and the rest of
//! the rows still decode.

use std::io::Cursor;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OpenFlags};

use crate::error::AppError;
use crate::frame::Frame;

/// Identifier of one stored row (rowid in table order).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRef(pub i64);

impl std::fmt::Display for RowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}", self.0)
    }
}

pub trait ResultStore {
    /// Losslessly encode the image and append it as one row.
    fn append(&mut self, frame: &Frame) -> Result<RowRef>;

    /// Enumerate all stored rows from the start of the table. Each call
    /// re-reads; there is no partial-iteration resumption guarantee.
    fn list(&self) -> Result<StoredImageIter>;
}

/// Lazy per-row decoding over fetched blobs. Decode failures are per-item.
pub struct StoredImageIter {
    rows: std::vec::IntoIter<(i64, Vec<u8>)>,
}

impl Iterator for StoredImageIter {
    type Item = (RowRef, Result<Frame>);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, blob) = self.rows.next()?;
        Some((RowRef(id), decode_image(&blob)))
    }
}

/// Encode a frame to PNG bytes. PNG is lossless for RGB8, so a stored image
/// decodes back to pixel-identical content.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    frame
        .to_rgb_image()
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| AppError::Persistence(format!("encode image: {}", e)))?;
    Ok(buf.into_inner())
}

/// Decode a stored blob back into a frame.
pub fn decode_image(blob: &[u8]) -> Result<Frame> {
    let decoded = image::load_from_memory(blob)
        .map_err(|e| AppError::Decode(format!("stored image is not decodable: {}", e)))?;
    Ok(Frame::from_rgb_image(decoded.to_rgb8()))
}

/// Unique shared in-memory database URI, for tests and ephemeral runs.
pub fn shared_memory_uri() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!(
        "file:pavewatch_{}_{}?mode=memory&cache=shared",
        std::process::id(),
        n
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    let conn = if db_path.starts_with("file:") {
        Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
    } else {
        Connection::open(db_path)
    };
    conn.map_err(|e| anyhow::Error::new(AppError::Persistence(format!("open {}: {}", db_path, e))))
}

/// SQLite-backed store, one table of PNG blobs.
pub struct SqliteResultStore {
    conn: Connection,
    db_path: String,
}

impl SqliteResultStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let db_path = if db_path == ":memory:" {
            shared_memory_uri()
        } else {
            db_path.to_string()
        };
        let conn = open_db_connection(&db_path)?;
        let store = Self { conn, db_path };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS annotated_images (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created_at INTEGER NOT NULL,
              format TEXT NOT NULL,
              image BLOB NOT NULL
            );
            "#,
            )
            .map_err(|e| anyhow!(AppError::Persistence(format!("ensure schema: {}", e))))?;
        Ok(())
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

impl ResultStore for SqliteResultStore {
    fn append(&mut self, frame: &Frame) -> Result<RowRef> {
        let blob = encode_png(frame)?;
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.conn
            .execute(
                "INSERT INTO annotated_images(created_at, format, image) VALUES (?1, ?2, ?3)",
                params![created_at, "png", blob],
            )
            .map_err(|e| anyhow!(AppError::Persistence(format!("append image: {}", e))))?;
        Ok(RowRef(self.conn.last_insert_rowid()))
    }

    fn list(&self) -> Result<StoredImageIter> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, image FROM annotated_images ORDER BY id ASC")
            .map_err(|e| anyhow!(AppError::Persistence(format!("read images: {}", e))))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| anyhow!(AppError::Persistence(format!("read images: {}", e))))?;

        let mut fetched = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| anyhow!(AppError::Persistence(format!("read images: {}", e))))?
        {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            fetched.push((id, blob));
        }
        Ok(StoredImageIter {
            rows: fetched.into_iter(),
        })
    }
}

/// In-memory store with the same contract, used by tests.
pub struct InMemoryResultStore {
    rows: Vec<(i64, Vec<u8>)>,
    next_id: i64,
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Inject a raw blob, bypassing encoding. Tests use this to plant
    /// corrupt rows.
    pub fn push_raw(&mut self, blob: Vec<u8>) -> RowRef {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push((id, blob));
        RowRef(id)
    }
}

impl ResultStore for InMemoryResultStore {
    fn append(&mut self, frame: &Frame) -> Result<RowRef> {
        let blob = encode_png(frame)?;
        Ok(self.push_raw(blob))
    }

    fn list(&self) -> Result<StoredImageIter> {
        Ok(StoredImageIter {
            rows: self.rows.clone().into_iter(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame() -> Frame {
        let data: Vec<u8> = (0..(16 * 12 * 3)).map(|i| (i % 251) as u8).collect();
        Frame::new(data, 16, 12).unwrap()
    }

    #[test]
    fn append_then_list_round_trips_pixel_identical() {
        let mut store = InMemoryResultStore::new();
        let frame = gradient_frame();
        let row = store.append(&frame).unwrap();

        let items: Vec<_> = store.list().unwrap().collect();
        assert_eq!(items.len(), 1);
        let (row_ref, decoded) = &items[0];
        assert_eq!(*row_ref, row);
        assert_eq!(decoded.as_ref().unwrap(), &frame);
    }

    #[test]
    fn corrupt_row_is_surfaced_without_aborting_the_rest() {
        let mut store = InMemoryResultStore::new();
        store.append(&gradient_frame()).unwrap();
        store.push_raw(vec![0xde, 0xad, 0xbe, 0xef]);
        store.append(&gradient_frame()).unwrap();

        let items: Vec<_> = store.list().unwrap().collect();
        assert_eq!(items.len(), 3);
        assert!(items[0].1.is_ok());
        assert!(items[1].1.is_err());
        assert!(items[2].1.is_ok());
    }

    #[test]
    fn list_restarts_from_the_beginning_each_call() {
        let mut store = InMemoryResultStore::new();
        store.append(&gradient_frame()).unwrap();

        let first: Vec<_> = store.list().unwrap().collect();
        let second: Vec<_> = store.list().unwrap().collect();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].0, second[0].0);
    }

    #[test]
    fn sqlite_store_round_trips_through_shared_memory() {
        let mut store = SqliteResultStore::open(":memory:").unwrap();
        let frame = gradient_frame();
        store.append(&frame).unwrap();
        store.append(&frame).unwrap();

        let items: Vec<_> = store.list().unwrap().collect();
        assert_eq!(items.len(), 2);
        for (_, decoded) in items {
            assert_eq!(decoded.unwrap(), frame);
        }
    }
}
