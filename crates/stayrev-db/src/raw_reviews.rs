//! Read side of the scraper's `reviews` and `review_photos` tables.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use stayrev_core::{Photo, RawReview};

use crate::photos::CorrelationTable;
use crate::DbError;

/// A row from the scraper's `reviews` table. Every column except the key is
/// nullable.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawReviewRow {
    pub review_id: i64,
    pub source_ref: Option<String>,
    pub title: Option<String>,
    pub score: Option<Decimal>,
    pub positive_txt: Option<String>,
    pub negative_txt: Option<String>,
    pub posted_date: Option<NaiveDateTime>,
    pub reviewer_stay_date: Option<NaiveDate>,
    pub num_of_nights: Option<i32>,
    pub traveler_type: Option<String>,
    pub room_name: Option<String>,
    pub raw_review: Option<String>,
}

impl From<RawReviewRow> for RawReview {
    fn from(row: RawReviewRow) -> Self {
        Self {
            review_id: row.review_id,
            source_ref: row.source_ref.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            score: row.score.and_then(|s| s.to_f64()).unwrap_or(0.0),
            positive_txt: row.positive_txt.unwrap_or_default(),
            negative_txt: row.negative_txt.unwrap_or_default(),
            posted_date: row.posted_date,
            reviewer_stay_date: row.reviewer_stay_date,
            num_of_nights: row.num_of_nights.unwrap_or(0),
            traveler_type: row.traveler_type.unwrap_or_default(),
            room_name: row.room_name.unwrap_or_default(),
            raw_review: row.raw_review.unwrap_or_default(),
            photo: Vec::new(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LegacyPhotoRow {
    review_id: i64,
    src: Option<String>,
    alt: Option<String>,
}

/// Fetch every raw review, ordered by `review_id`, with correlated photos.
///
/// Photos are fetched in a single query for all legacy keys recovered from the
/// batch. Reviews whose cross-reference cannot be parsed get an empty list.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails; no partial batch is
/// returned.
pub async fn fetch_raw_reviews(pool: &PgPool) -> Result<Vec<RawReview>, DbError> {
    let rows = sqlx::query_as::<_, RawReviewRow>(
        "SELECT review_id, source_ref, title, score, positive_txt, negative_txt, \
                posted_date, reviewer_stay_date, num_of_nights, traveler_type, \
                room_name, raw_review \
         FROM reviews \
         ORDER BY review_id",
    )
    .fetch_all(pool)
    .await?;

    let mut reviews: Vec<RawReview> = rows.into_iter().map(RawReview::from).collect();
    let table = CorrelationTable::build(&reviews);
    let keys = table.legacy_keys();

    if keys.is_empty() {
        tracing::debug!(reviews = reviews.len(), "no photo cross-references to resolve");
        return Ok(reviews);
    }

    let photo_rows = sqlx::query_as::<_, LegacyPhotoRow>(
        "SELECT review_id, src, alt \
         FROM review_photos \
         WHERE review_id = ANY($1) \
         ORDER BY review_id, id",
    )
    .bind(&keys)
    .fetch_all(pool)
    .await?;

    let photos = photo_rows.into_iter().map(|row| {
        (
            row.review_id,
            Photo {
                src: row.src.unwrap_or_default(),
                alt: row.alt.unwrap_or_default(),
            },
        )
    });
    let attached = table.attach(&mut reviews, photos);

    tracing::info!(
        reviews = reviews.len(),
        legacy_keys = keys.len(),
        photos = attached,
        "fetched raw reviews"
    );

    Ok(reviews)
}
