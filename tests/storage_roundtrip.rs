//! Result-store behavior across both implementations: lossless round trips,
//! restartable enumeration, and per-row decode failure reporting.

use pavewatch::{Frame, InMemoryResultStore, ResultStore, SqliteResultStore};
use rusqlite::{params, Connection};

fn gradient_frame(seed: u8) -> Frame {
    let data: Vec<u8> = (0..(32u32 * 24 * 3))
        .map(|i| (i as u8).wrapping_mul(3).wrapping_add(seed))
        .collect();
    Frame::new(data, 32, 24).unwrap()
}

#[test]
fn sqlite_append_then_list_round_trips_pixel_identical() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gallery.db");
    let mut store = SqliteResultStore::open(db_path.to_str().unwrap()).unwrap();

    let first = gradient_frame(0);
    let last = gradient_frame(9);
    store.append(&first).unwrap();
    store.append(&last).unwrap();

    let items: Vec<_> = store.list().unwrap().collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].1.as_ref().unwrap(), &first);
    assert_eq!(items[1].1.as_ref().unwrap(), &last);

    // Row order is table order.
    assert!(items[0].0 .0 < items[1].0 .0);
}

#[test]
fn sqlite_rows_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gallery.db");
    let frame = gradient_frame(4);

    {
        let mut store = SqliteResultStore::open(db_path.to_str().unwrap()).unwrap();
        store.append(&frame).unwrap();
    }

    let store = SqliteResultStore::open(db_path.to_str().unwrap()).unwrap();
    let items: Vec<_> = store.list().unwrap().collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].1.as_ref().unwrap(), &frame);
}

#[test]
fn corrupt_sqlite_row_is_surfaced_per_row_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gallery.db");
    let mut store = SqliteResultStore::open(db_path.to_str().unwrap()).unwrap();

    store.append(&gradient_frame(1)).unwrap();

    // Plant a blob that is not a decodable image, writing through a second
    // connection the way external tooling could.
    let conn = Connection::open(&db_path).unwrap();
    conn.execute(
        "INSERT INTO annotated_images(created_at, format, image) VALUES (?1, ?2, ?3)",
        params![0i64, "png", vec![0u8, 1, 2, 3]],
    )
    .unwrap();

    store.append(&gradient_frame(2)).unwrap();

    let items: Vec<_> = store.list().unwrap().collect();
    assert_eq!(items.len(), 3);
    assert!(items[0].1.is_ok());
    assert!(items[1].1.is_err());
    assert!(items[2].1.is_ok());

    let err = format!("{:#}", items[1].1.as_ref().unwrap_err());
    assert!(err.contains("DECODE"), "unexpected error chain: {err}");
}

#[test]
fn list_is_restartable_from_the_beginning() {
    let mut store = InMemoryResultStore::new();
    store.append(&gradient_frame(0)).unwrap();
    store.append(&gradient_frame(1)).unwrap();

    let mut first_pass = store.list().unwrap();
    // Abandon the first pass partway through.
    let _ = first_pass.next();

    let second_pass: Vec<_> = store.list().unwrap().collect();
    assert_eq!(second_pass.len(), 2);
    assert_eq!(second_pass[0].0 .0, 1);
}

#[test]
fn in_memory_and_sqlite_stores_agree_on_content() {
    let frame = gradient_frame(6);

    let mut memory = InMemoryResultStore::new();
    memory.append(&frame).unwrap();
    let mut sqlite = SqliteResultStore::open(":memory:").unwrap();
    sqlite.append(&frame).unwrap();

    let from_memory = memory.list().unwrap().next().unwrap().1.unwrap();
    let from_sqlite = sqlite.list().unwrap().next().unwrap().1.unwrap();
    assert_eq!(from_memory, from_sqlite);
    assert_eq!(from_memory, frame);
}
