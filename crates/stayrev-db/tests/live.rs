//! Live integration tests for stayrev-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/stayrev-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::NaiveDate;
use stayrev_core::{
    Category, HasReply, NormalizedReview, Photo, ReviewStatus, Sentiment, REVIEW_SOURCE,
};
use stayrev_db::{
    complete_ingestion_run, count_processed_reviews, create_ingestion_run,
    delete_all_processed_reviews, fail_ingestion_run, fetch_raw_reviews, get_ingestion_run,
    list_ingestion_runs, list_processed_reviews, replace_processed_reviews, start_ingestion_run,
    DbError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_raw_review(pool: &sqlx::PgPool, review_id: i64, source_ref: Option<&str>) {
    sqlx::query(
        "INSERT INTO reviews \
             (review_id, source_ref, title, score, positive_txt, negative_txt, \
              posted_date, num_of_nights, traveler_type, room_name, raw_review) \
         VALUES ($1, $2, 'Nice stay', 8.5, 'Great staff', 'Noisy street', \
                 '2024-07-01 10:00:00', 2, 'Couple', 'Double Room', 'Anna Germany')",
    )
    .bind(review_id)
    .bind(source_ref)
    .execute(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_raw_review failed for {review_id}: {e}"));
}

async fn insert_legacy_photo(pool: &sqlx::PgPool, legacy_key: i64, src: &str) {
    sqlx::query("INSERT INTO review_photos (review_id, src, alt) VALUES ($1, $2, '')")
        .bind(legacy_key)
        .bind(src)
        .execute(pool)
        .await
        .unwrap_or_else(|e| panic!("insert_legacy_photo failed for {legacy_key}: {e}"));
}

fn make_review(raw_id: i64, photos: usize) -> NormalizedReview {
    NormalizedReview {
        id: format!("REV-{raw_id:06}"),
        platform_review_id: Some(format!("BK-{raw_id}")),
        rating: 4,
        user_name: "Anna".to_string(),
        reviewer_name: "Anna".to_string(),
        text: "Great staff. Noisy street.".to_string(),
        review_text: "Great staff. Noisy street.".to_string(),
        summary: Some("Friendly staff, some street noise.".to_string()),
        sentiment: Sentiment::Positive,
        language: "English".to_string(),
        categories: vec![Category::Staff, Category::Noise],
        key_phrases: vec![
            "friendly staff".to_string(),
            "street noise".to_string(),
            "good breakfast".to_string(),
        ],
        photos: (0..photos)
            .map(|i| Photo {
                src: format!("https://cdn.example/{raw_id}/{i}.jpg"),
                alt: String::new(),
            })
            .collect(),
        source: REVIEW_SOURCE.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 6, 20),
        status: ReviewStatus::Replied,
        reply_status: ReviewStatus::Replied,
        has_reply: HasReply::Yes,
        first_seen: NaiveDate::from_ymd_opt(2024, 7, 1).and_then(|d| d.and_hms_opt(9, 0, 0)),
        last_updated: NaiveDate::from_ymd_opt(2024, 7, 1).and_then(|d| d.and_hms_opt(12, 0, 0)),
        scraped_at: NaiveDate::from_ymd_opt(2024, 7, 1).and_then(|d| d.and_hms_opt(18, 0, 0)),
    }
}

async fn orphan_photo_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM processed_review_photos p \
         LEFT JOIN processed_reviews r ON r.id = p.review_id \
         WHERE r.id IS NULL",
    )
    .fetch_one(pool)
    .await
    .expect("orphan count failed")
}

// ---------------------------------------------------------------------------
// Section 1: Ingestion run lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingestion_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_ingestion_run(&pool, "cli")
        .await
        .expect("create_ingestion_run failed");
    assert_eq!(run.status, "queued");
    assert!(run.started_at.is_none());

    start_ingestion_run(&pool, run.id)
        .await
        .expect("start_ingestion_run failed");
    complete_ingestion_run(&pool, run.id, 12, 11)
        .await
        .expect("complete_ingestion_run failed");

    let fetched = get_ingestion_run(&pool, run.id)
        .await
        .expect("get_ingestion_run failed");
    assert_eq!(fetched.status, "succeeded");
    assert!(fetched.started_at.is_some());
    assert!(fetched.completed_at.is_some());
    assert_eq!(fetched.raw_count, 12);
    assert_eq!(fetched.records_processed, 11);
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingestion_run_lifecycle_queued_to_failed(pool: sqlx::PgPool) {
    let run = create_ingestion_run(&pool, "cli").await.expect("create failed");
    start_ingestion_run(&pool, run.id).await.expect("start failed");
    fail_ingestion_run(&pool, run.id, "model returned malformed JSON")
        .await
        .expect("fail failed");

    let fetched = get_ingestion_run(&pool, run.id).await.expect("get failed");
    assert_eq!(fetched.status, "failed");
    assert!(fetched.completed_at.is_some());
    assert_eq!(
        fetched.error_message.as_deref(),
        Some("model returned malformed JSON")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingestion_run_cannot_complete_from_queued(pool: sqlx::PgPool) {
    let run = create_ingestion_run(&pool, "cli").await.expect("create failed");
    let err = complete_ingestion_run(&pool, run.id, 1, 1)
        .await
        .expect_err("completing a queued run should fail");
    assert!(matches!(
        err,
        DbError::InvalidRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingestion_run_get_unknown_is_not_found(pool: sqlx::PgPool) {
    let err = get_ingestion_run(&pool, 999_999)
        .await
        .expect_err("unknown run should not be found");
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_ingestion_runs_returns_newest_first(pool: sqlx::PgPool) {
    let first = create_ingestion_run(&pool, "cli").await.expect("create failed");
    let second = create_ingestion_run(&pool, "api").await.expect("create failed");

    let runs = list_ingestion_runs(&pool, 10).await.expect("list failed");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second.id);
    assert_eq!(runs[1].id, first.id);
}

// ---------------------------------------------------------------------------
// Section 2: Raw review fetch and photo correlation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn fetch_raw_reviews_attaches_correlated_photos(pool: sqlx::PgPool) {
    insert_raw_review(&pool, 2, Some("BK-102")).await;
    insert_raw_review(&pool, 1, Some("BK-101")).await;
    insert_raw_review(&pool, 3, Some("BK103")).await;
    insert_raw_review(&pool, 4, None).await;

    insert_legacy_photo(&pool, 101, "a.jpg").await;
    insert_legacy_photo(&pool, 101, "b.jpg").await;
    insert_legacy_photo(&pool, 102, "c.jpg").await;
    insert_legacy_photo(&pool, 103, "never-attached.jpg").await;

    let reviews = fetch_raw_reviews(&pool).await.expect("fetch failed");

    let ids: Vec<i64> = reviews.iter().map(|r| r.review_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4], "ordered by review_id");

    let srcs = |i: usize| -> Vec<&str> {
        reviews[i].photo.iter().map(|p| p.src.as_str()).collect()
    };
    assert_eq!(srcs(0), vec!["a.jpg", "b.jpg"]);
    assert_eq!(srcs(1), vec!["c.jpg"]);
    assert!(srcs(2).is_empty(), "missing delimiter yields no photos");
    assert!(srcs(3).is_empty(), "absent cross-reference yields no photos");

    assert!((reviews[0].score - 8.5).abs() < f64::EPSILON);
    assert_eq!(reviews[0].num_of_nights, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn fetch_raw_reviews_on_empty_table_is_empty(pool: sqlx::PgPool) {
    let reviews = fetch_raw_reviews(&pool).await.expect("fetch failed");
    assert!(reviews.is_empty());
}

// ---------------------------------------------------------------------------
// Section 3: Normalized store replace
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn replace_stores_exactly_the_batch(pool: sqlx::PgPool) {
    let batch = vec![make_review(3, 2), make_review(1, 0), make_review(2, 1)];

    let inserted = replace_processed_reviews(&pool, &batch)
        .await
        .expect("replace failed");
    assert_eq!(inserted, 3);
    assert_eq!(count_processed_reviews(&pool).await.expect("count failed"), 3);
    assert_eq!(orphan_photo_count(&pool).await, 0);

    let stored = list_processed_reviews(&pool).await.expect("list failed");
    assert_eq!(stored, batch, "round trip preserves order and fields");
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_replace_discards_previous_batch(pool: sqlx::PgPool) {
    replace_processed_reviews(&pool, &[make_review(1, 2), make_review(2, 2)])
        .await
        .expect("first replace failed");
    replace_processed_reviews(&pool, &[make_review(9, 1)])
        .await
        .expect("second replace failed");

    let stored = list_processed_reviews(&pool).await.expect("list failed");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "REV-000009");
    assert_eq!(stored[0].photos.len(), 1);
    assert_eq!(orphan_photo_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn replace_with_empty_batch_clears_store(pool: sqlx::PgPool) {
    replace_processed_reviews(&pool, &[make_review(1, 1)])
        .await
        .expect("seed failed");

    let inserted = replace_processed_reviews(&pool, &[])
        .await
        .expect("empty replace failed");
    assert_eq!(inserted, 0);
    assert_eq!(count_processed_reviews(&pool).await.expect("count failed"), 0);
    assert_eq!(orphan_photo_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_ids_fail_and_keep_previous_batch(pool: sqlx::PgPool) {
    replace_processed_reviews(&pool, &[make_review(1, 1)])
        .await
        .expect("seed failed");

    let err = replace_processed_reviews(&pool, &[make_review(5, 0), make_review(5, 0)])
        .await
        .expect_err("duplicate ids must violate the primary key");
    assert!(matches!(err, DbError::Sqlx(_)));

    let stored = list_processed_reviews(&pool).await.expect("list failed");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "REV-000001");
    assert_eq!(stored[0].photos.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn corrupted_array_columns_read_back_empty(pool: sqlx::PgPool) {
    replace_processed_reviews(&pool, &[make_review(1, 0)])
        .await
        .expect("seed failed");
    sqlx::query("UPDATE processed_reviews SET categories = 'Staff;Noise', key_phrases = NULL")
        .execute(&pool)
        .await
        .expect("corrupt update failed");

    let stored = list_processed_reviews(&pool).await.expect("list failed");
    assert!(stored[0].categories.is_empty());
    assert!(stored[0].key_phrases.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_all_removes_reviews_and_photos(pool: sqlx::PgPool) {
    replace_processed_reviews(&pool, &[make_review(1, 3), make_review(2, 0)])
        .await
        .expect("seed failed");

    let deleted = delete_all_processed_reviews(&pool)
        .await
        .expect("delete failed");
    assert_eq!(deleted, 2);

    let photos = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM processed_review_photos")
        .fetch_one(&pool)
        .await
        .expect("photo count failed");
    assert_eq!(photos, 0);
}
