//! Loader tests against a live Postgres. Run with
//! `DATABASE_URL=... cargo test -p tradewinds-store -- --ignored`.

use sqlx::Row as _;

use tradewinds_core::Row;
use tradewinds_store::{IngestStore, PgStore};

async fn connect() -> Option<PgStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    PgStore::connect(&url, 2).await.ok()
}

#[tokio::test]
#[ignore]
async fn bulk_upsert_is_idempotent_and_last_write_wins() {
    let Some(store) = connect().await else {
        eprintln!("Postgres unavailable; skipping");
        return;
    };
    sqlx::query("DROP TABLE IF EXISTS upsert_test")
        .execute(store.pool())
        .await
        .unwrap();
    sqlx::query("CREATE TABLE upsert_test (id INT PRIMARY KEY, val TEXT)")
        .execute(store.pool())
        .await
        .unwrap();

    let session = store.session().await.unwrap();
    let keys = vec!["id".to_string()];

    session
        .loader()
        .upsert("upsert_test", &[Row::new().set("id", 1).set("val", "a")], &keys)
        .await
        .unwrap();
    session
        .loader()
        .upsert("upsert_test", &[Row::new().set("id", 1).set("val", "b")], &keys)
        .await
        .unwrap();
    // Re-applying the identical row must not raise.
    session
        .loader()
        .upsert("upsert_test", &[Row::new().set("id", 1).set("val", "b")], &keys)
        .await
        .unwrap();

    let row = sqlx::query("SELECT val FROM upsert_test WHERE id=1")
        .fetch_one(store.pool())
        .await
        .unwrap();
    let val: String = row.get("val");
    assert_eq!(val, "b");

    let count = sqlx::query("SELECT COUNT(*) AS n FROM upsert_test")
        .fetch_one(store.pool())
        .await
        .unwrap();
    let n: i64 = count.get("n");
    assert_eq!(n, 1);
}
