use feedsift::db;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");

    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();

    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    db::load_sqlite_vec();
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert!(!report.sqlite_vec_version.is_empty());
    assert_eq!(report.message_count, 0);
    assert_eq!(report.pending_message_count, 0);
    assert_eq!(report.reference_count, 0);
    assert_eq!(report.score_count, 0);
}

#[test]
fn health_check_counts_pending_and_categories() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("health.db")).unwrap();
    conn.execute_batch(
        "INSERT INTO messages (id, content) VALUES (1, 'a'), (2, 'b');",
    )
    .unwrap();
    for (id, topic) in [(1, "solvency"), (2, "solvency"), (3, "cyberattack")] {
        conn.execute(
            "INSERT INTO reference_items (id, topic, industry, content, embedding) \
             VALUES (?1, ?2, 'finance_blockchain', 'x', ?3)",
            rusqlite::params![id, topic, db::embedding_to_bytes(&[1.0, 0.0])],
        )
        .unwrap();
    }

    let report = db::check_database_health(&conn).unwrap();
    assert_eq!(report.message_count, 2);
    assert_eq!(report.pending_message_count, 2);
    assert_eq!(report.reference_count, 3);
    assert_eq!(report.category_count, 2);
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("test.db");

    let conn = db::open_database(&db_path).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn foreign_keys_are_enforced() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("fk.db")).unwrap();

    let orphan = conn.execute(
        "INSERT INTO feed_sightings (timestamp, message_id, source) VALUES ('2026-01-01T00:00:00+00:00', 42, 'feed')",
        [],
    );
    assert!(orphan.is_err());
}
