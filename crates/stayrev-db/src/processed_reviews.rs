//! Database operations for the normalized review store
//! (`processed_reviews` and `processed_review_photos`).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::PgPool;
use stayrev_core::{
    Category, HasReply, NormalizedReview, Photo, ReviewStatus, Sentiment, MAX_CATEGORIES,
};

use crate::codec::{decode_string_list, encode_string_list};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `processed_reviews` table.
///
/// `categories` and `key_phrases` hold JSON-encoded arrays and are decoded
/// leniently by [`ProcessedReviewRow::into_review`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessedReviewRow {
    pub id: String,
    pub batch_position: i32,
    pub platform_review_id: Option<String>,
    pub rating: i16,
    pub user_name: String,
    pub reviewer_name: String,
    pub review_text: String,
    pub summary: Option<String>,
    pub sentiment: String,
    pub language: String,
    pub categories: Option<String>,
    pub key_phrases: Option<String>,
    pub source: String,
    pub stay_date: Option<NaiveDate>,
    pub status: String,
    pub reply_status: String,
    pub has_reply: String,
    pub first_seen: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
    pub scraped_at: Option<NaiveDateTime>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessedPhotoRow {
    review_id: String,
    src: String,
    alt: String,
}

impl ProcessedReviewRow {
    /// Convert a stored row back into a [`NormalizedReview`].
    ///
    /// Unknown enum labels fall back to their defaults and `hasReply` is
    /// re-derived from `status`, so a hand-edited row still reads back in a
    /// consistent shape.
    #[must_use]
    pub fn into_review(self, photos: Vec<Photo>) -> NormalizedReview {
        let status = ReviewStatus::parse(&self.status).unwrap_or_default();
        let categories = decode_string_list(self.categories.as_deref())
            .iter()
            .filter_map(|tag| Category::parse(tag))
            .take(MAX_CATEGORIES)
            .collect();

        NormalizedReview {
            id: self.id,
            platform_review_id: self.platform_review_id,
            rating: u8::try_from(self.rating.clamp(1, 5)).unwrap_or(1),
            user_name: self.user_name,
            reviewer_name: self.reviewer_name,
            text: self.review_text.clone(),
            review_text: self.review_text,
            summary: self.summary,
            sentiment: Sentiment::parse(&self.sentiment).unwrap_or_default(),
            language: self.language,
            categories,
            key_phrases: decode_string_list(self.key_phrases.as_deref()),
            photos,
            source: self.source,
            date: self.stay_date,
            status,
            reply_status: status,
            has_reply: HasReply::from(status),
            first_seen: self.first_seen,
            last_updated: self.last_updated,
            scraped_at: self.scraped_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Replace the whole normalized store with `reviews`.
///
/// Deletes every photo association and review, then bulk-inserts the new
/// batch in the given order, all inside one transaction. Duplicate ids in
/// `reviews` violate the primary key; the insert error is returned and the
/// transaction rolls back, leaving the previous batch in place.
///
/// Returns the number of review rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
#[allow(clippy::too_many_lines)]
pub async fn replace_processed_reviews(
    pool: &PgPool,
    reviews: &[NormalizedReview],
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM processed_review_photos")
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM processed_reviews")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if reviews.is_empty() {
        tx.commit().await?;
        tracing::info!(deleted, "normalized store cleared; empty batch");
        return Ok(0);
    }

    let n = reviews.len();
    let mut ids: Vec<String> = Vec::with_capacity(n);
    let mut positions: Vec<i32> = Vec::with_capacity(n);
    let mut platform_ids: Vec<Option<String>> = Vec::with_capacity(n);
    let mut ratings: Vec<i16> = Vec::with_capacity(n);
    let mut user_names: Vec<String> = Vec::with_capacity(n);
    let mut reviewer_names: Vec<String> = Vec::with_capacity(n);
    let mut texts: Vec<String> = Vec::with_capacity(n);
    let mut summaries: Vec<Option<String>> = Vec::with_capacity(n);
    let mut sentiments: Vec<&str> = Vec::with_capacity(n);
    let mut languages: Vec<String> = Vec::with_capacity(n);
    let mut categories: Vec<String> = Vec::with_capacity(n);
    let mut key_phrases: Vec<String> = Vec::with_capacity(n);
    let mut sources: Vec<String> = Vec::with_capacity(n);
    let mut stay_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(n);
    let mut statuses: Vec<&str> = Vec::with_capacity(n);
    let mut reply_statuses: Vec<&str> = Vec::with_capacity(n);
    let mut has_replies: Vec<&str> = Vec::with_capacity(n);
    let mut first_seens: Vec<Option<NaiveDateTime>> = Vec::with_capacity(n);
    let mut last_updateds: Vec<Option<NaiveDateTime>> = Vec::with_capacity(n);
    let mut scraped_ats: Vec<Option<NaiveDateTime>> = Vec::with_capacity(n);

    let mut photo_review_ids: Vec<String> = Vec::new();
    let mut photo_positions: Vec<i32> = Vec::new();
    let mut photo_srcs: Vec<String> = Vec::new();
    let mut photo_alts: Vec<String> = Vec::new();

    for (position, review) in reviews.iter().enumerate() {
        let category_labels: Vec<&str> = review.categories.iter().map(|c| c.as_str()).collect();

        ids.push(review.id.clone());
        positions.push(i32::try_from(position).unwrap_or(i32::MAX));
        platform_ids.push(review.platform_review_id.clone());
        ratings.push(i16::from(review.rating));
        user_names.push(review.user_name.clone());
        reviewer_names.push(review.reviewer_name.clone());
        texts.push(review.review_text.clone());
        summaries.push(review.summary.clone());
        sentiments.push(review.sentiment.as_str());
        languages.push(review.language.clone());
        categories.push(encode_string_list(&category_labels));
        key_phrases.push(encode_string_list(&review.key_phrases));
        sources.push(review.source.clone());
        stay_dates.push(review.date);
        statuses.push(review.status.as_str());
        reply_statuses.push(review.reply_status.as_str());
        has_replies.push(review.has_reply.as_str());
        first_seens.push(review.first_seen);
        last_updateds.push(review.last_updated);
        scraped_ats.push(review.scraped_at);

        for (photo_position, photo) in review.photos.iter().enumerate() {
            photo_review_ids.push(review.id.clone());
            photo_positions.push(i32::try_from(photo_position).unwrap_or(i32::MAX));
            photo_srcs.push(photo.src.clone());
            photo_alts.push(photo.alt.clone());
        }
    }

    let inserted = sqlx::query(
        "INSERT INTO processed_reviews \
             (id, batch_position, platform_review_id, rating, user_name, reviewer_name, \
              review_text, summary, sentiment, language, categories, key_phrases, source, \
              stay_date, status, reply_status, has_reply, first_seen, last_updated, scraped_at) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::int4[], $3::text[], $4::int2[], $5::text[], $6::text[], \
              $7::text[], $8::text[], $9::text[], $10::text[], $11::text[], $12::text[], \
              $13::text[], $14::date[], $15::text[], $16::text[], $17::text[], \
              $18::timestamp[], $19::timestamp[], $20::timestamp[])",
    )
    .bind(&ids)
    .bind(&positions)
    .bind(&platform_ids)
    .bind(&ratings)
    .bind(&user_names)
    .bind(&reviewer_names)
    .bind(&texts)
    .bind(&summaries)
    .bind(&sentiments)
    .bind(&languages)
    .bind(&categories)
    .bind(&key_phrases)
    .bind(&sources)
    .bind(&stay_dates)
    .bind(&statuses)
    .bind(&reply_statuses)
    .bind(&has_replies)
    .bind(&first_seens)
    .bind(&last_updateds)
    .bind(&scraped_ats)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if !photo_review_ids.is_empty() {
        sqlx::query(
            "INSERT INTO processed_review_photos (review_id, position, src, alt) \
             SELECT * FROM UNNEST($1::text[], $2::int4[], $3::text[], $4::text[])",
        )
        .bind(&photo_review_ids)
        .bind(&photo_positions)
        .bind(&photo_srcs)
        .bind(&photo_alts)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        deleted,
        inserted,
        photos = photo_review_ids.len(),
        "replaced normalized review store"
    );

    Ok(inserted)
}

/// List every normalized review in ingestion order, with photos attached.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_processed_reviews(pool: &PgPool) -> Result<Vec<NormalizedReview>, DbError> {
    let rows = sqlx::query_as::<_, ProcessedReviewRow>(
        "SELECT id, batch_position, platform_review_id, rating, user_name, reviewer_name, \
                review_text, summary, sentiment, language, categories, key_phrases, source, \
                stay_date, status, reply_status, has_reply, first_seen, last_updated, \
                scraped_at, created_at \
         FROM processed_reviews \
         ORDER BY batch_position, id",
    )
    .fetch_all(pool)
    .await?;

    let photo_rows = sqlx::query_as::<_, ProcessedPhotoRow>(
        "SELECT review_id, src, alt \
         FROM processed_review_photos \
         ORDER BY review_id, position, id",
    )
    .fetch_all(pool)
    .await?;

    let mut photos_by_review: HashMap<String, Vec<Photo>> = HashMap::new();
    for row in photo_rows {
        photos_by_review
            .entry(row.review_id)
            .or_default()
            .push(Photo {
                src: row.src,
                alt: row.alt,
            });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let photos = photos_by_review.remove(&row.id).unwrap_or_default();
            row.into_review(photos)
        })
        .collect())
}

/// Count rows in the normalized store.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_processed_reviews(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM processed_reviews")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete every normalized review and photo association.
///
/// Returns the number of review rows deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either delete or the commit fails.
pub async fn delete_all_processed_reviews(pool: &PgPool) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM processed_review_photos")
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM processed_reviews")
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(deleted)
}
