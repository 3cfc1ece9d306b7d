//! Review domain types: raw scraped rows and the canonical normalized record.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Constant `source` label carried by every normalized review.
pub const REVIEW_SOURCE: &str = "Booking.com";

/// Maximum number of category tags on a normalized review.
pub const MAX_CATEGORIES: usize = 3;
/// Minimum key-phrase count for a non-empty key-phrase list.
pub const MIN_KEY_PHRASES: usize = 3;
/// Maximum key-phrase count.
pub const MAX_KEY_PHRASES: usize = 5;

const SYSTEM_ID_PREFIX: &str = "REV-";
const PLATFORM_ID_PREFIX: &str = "BK-";

/// A photo attached to a review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

/// A review row as scraped from the booking site, with its correlated photos.
///
/// Field names serialize in the scraper's snake_case so the analysis payload
/// matches the source schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
    pub review_id: i64,
    /// Semi-structured cross-reference such as `"BK-101"`; empty when absent.
    pub source_ref: String,
    pub title: String,
    /// Score on the site's 0-10 scale. Missing scores are stored as `0.0`.
    pub score: f64,
    pub positive_txt: String,
    pub negative_txt: String,
    pub posted_date: Option<NaiveDateTime>,
    pub reviewer_stay_date: Option<NaiveDate>,
    pub num_of_nights: i32,
    pub traveler_type: String,
    pub room_name: String,
    pub raw_review: String,
    pub photo: Vec<Photo>,
}

impl RawReview {
    /// Canonical id of the normalized review derived from this row.
    #[must_use]
    pub fn system_id(&self) -> String {
        system_review_id(self.review_id)
    }

    /// Title, positive and negative text joined into one narrative,
    /// skipping empty parts.
    #[must_use]
    pub fn combined_text(&self) -> String {
        [&self.title, &self.positive_txt, &self.negative_txt]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Best-effort reviewer name: the first word of the unstructured blob.
    #[must_use]
    pub fn leading_name(&self) -> Option<&str> {
        self.raw_review.split_whitespace().next()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    /// Case-insensitive parse of a sentiment label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

/// Reply workflow state of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReviewStatus {
    #[default]
    Pending,
    Replied,
}

impl ReviewStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "Pending",
            ReviewStatus::Replied => "Replied",
        }
    }

    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ReviewStatus::Pending),
            "replied" => Some(ReviewStatus::Replied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HasReply {
    Yes,
    No,
}

impl HasReply {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HasReply::Yes => "Yes",
            HasReply::No => "No",
        }
    }
}

impl From<ReviewStatus> for HasReply {
    fn from(status: ReviewStatus) -> Self {
        match status {
            ReviewStatus::Replied => HasReply::Yes,
            ReviewStatus::Pending => HasReply::No,
        }
    }
}

/// Controlled vocabulary for review category tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Cleanliness,
    Staff,
    Location,
    Facilities,
    Comfort,
    Value,
    Noise,
    Food,
    Privacy,
    WiFi,
    #[serde(rename = "Room Size")]
    RoomSize,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Cleanliness,
        Category::Staff,
        Category::Location,
        Category::Facilities,
        Category::Comfort,
        Category::Value,
        Category::Noise,
        Category::Food,
        Category::Privacy,
        Category::WiFi,
        Category::RoomSize,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Cleanliness => "Cleanliness",
            Category::Staff => "Staff",
            Category::Location => "Location",
            Category::Facilities => "Facilities",
            Category::Comfort => "Comfort",
            Category::Value => "Value",
            Category::Noise => "Noise",
            Category::Food => "Food",
            Category::Privacy => "Privacy",
            Category::WiFi => "WiFi",
            Category::RoomSize => "Room Size",
        }
    }

    /// Match a tag against the vocabulary, ignoring case, spaces, hyphens
    /// and underscores (`"wi-fi"`, `"room_size"` both resolve).
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let key = fold_tag(tag);
        Self::ALL
            .into_iter()
            .find(|category| fold_tag(category.as_str()) == key)
    }
}

fn fold_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The canonical review record produced by the analysis pipeline.
///
/// Serializes in camelCase, the shape consumed by the review dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReview {
    pub id: String,
    pub platform_review_id: Option<String>,
    pub rating: u8,
    pub user_name: String,
    pub reviewer_name: String,
    pub text: String,
    pub review_text: String,
    pub summary: Option<String>,
    pub sentiment: Sentiment,
    pub language: String,
    pub categories: Vec<Category>,
    pub key_phrases: Vec<String>,
    #[serde(rename = "images", default)]
    pub photos: Vec<Photo>,
    pub source: String,
    #[serde(with = "crate::dates::stay_date", default)]
    pub date: Option<NaiveDate>,
    pub status: ReviewStatus,
    pub reply_status: ReviewStatus,
    pub has_reply: HasReply,
    #[serde(with = "crate::dates::system_timestamp", default)]
    pub first_seen: Option<NaiveDateTime>,
    #[serde(with = "crate::dates::system_timestamp", default)]
    pub last_updated: Option<NaiveDateTime>,
    #[serde(with = "crate::dates::system_timestamp", default)]
    pub scraped_at: Option<NaiveDateTime>,
}

/// System id of the normalized review derived from a raw id: `REV-000101`.
#[must_use]
pub fn system_review_id(raw_id: i64) -> String {
    format!("{SYSTEM_ID_PREFIX}{raw_id:06}")
}

/// Booking-platform id derived from a raw id: `BK-101`.
#[must_use]
pub fn platform_review_id(raw_id: i64) -> String {
    format!("{PLATFORM_ID_PREFIX}{raw_id}")
}

/// Recover the trailing numeric segment of a `PREFIX-123` identifier.
///
/// Returns `None` when there is no `-` delimiter or the trailing segment is
/// not made only of ASCII digits.
#[must_use]
pub fn parse_prefixed_id(reference: &str) -> Option<i64> {
    let (_, tail) = reference.trim().rsplit_once('-')?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// Convert a 0-10 site score into a 1-5 star rating.
///
/// Halves the score, rounds half away from zero and clamps to `[1, 5]`, so a
/// zero or missing score still yields one star.
#[must_use]
pub fn rating_from_score(score: f64) -> u8 {
    if !score.is_finite() {
        return 1;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let stars = (score / 2.0).round().clamp(1.0, 5.0) as u8;
    stars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(review_id: i64) -> RawReview {
        RawReview {
            review_id,
            source_ref: format!("BK-{review_id}"),
            title: "Lovely stay".to_string(),
            score: 9.0,
            positive_txt: "Great staff".to_string(),
            negative_txt: String::new(),
            posted_date: None,
            reviewer_stay_date: None,
            num_of_nights: 2,
            traveler_type: "Couple".to_string(),
            room_name: "Double Room".to_string(),
            raw_review: "Prem IndiaDouble Room".to_string(),
            photo: vec![],
        }
    }

    #[test]
    fn rating_examples() {
        assert_eq!(rating_from_score(10.0), 5);
        assert_eq!(rating_from_score(9.0), 5);
        assert_eq!(rating_from_score(8.0), 4);
        assert_eq!(rating_from_score(5.0), 3);
        assert_eq!(rating_from_score(4.9), 2);
        assert_eq!(rating_from_score(0.0), 1);
    }

    #[test]
    fn rating_is_monotonic_and_bounded() {
        let mut previous = 0;
        for tenths in 0..=100 {
            let rating = rating_from_score(f64::from(tenths) / 10.0);
            assert!((1..=5).contains(&rating), "rating {rating} out of range");
            assert!(rating >= previous, "rating decreased at score {tenths}/10");
            previous = rating;
        }
    }

    #[test]
    fn rating_clamps_out_of_range_and_nan() {
        assert_eq!(rating_from_score(-3.0), 1);
        assert_eq!(rating_from_score(42.0), 5);
        assert_eq!(rating_from_score(f64::NAN), 1);
    }

    #[test]
    fn system_id_is_zero_padded() {
        assert_eq!(system_review_id(101), "REV-000101");
        assert_eq!(system_review_id(1_234_567), "REV-1234567");
        assert_eq!(platform_review_id(101), "BK-101");
    }

    #[test]
    fn parse_prefixed_id_reads_trailing_segment() {
        assert_eq!(parse_prefixed_id("BK-101"), Some(101));
        assert_eq!(parse_prefixed_id("REV-000101"), Some(101));
        assert_eq!(parse_prefixed_id("A-B-7"), Some(7));
    }

    #[test]
    fn parse_prefixed_id_rejects_malformed_references() {
        assert_eq!(parse_prefixed_id("BK101"), None);
        assert_eq!(parse_prefixed_id("BK-"), None);
        assert_eq!(parse_prefixed_id("BK-12a"), None);
        assert_eq!(parse_prefixed_id("BK-+5"), None);
        assert_eq!(parse_prefixed_id(""), None);
    }

    #[test]
    fn system_id_round_trips_through_prefixed_parse() {
        for id in [0, 7, 101, 999_999, 10_000_000] {
            assert_eq!(parse_prefixed_id(&system_review_id(id)), Some(id));
        }
    }

    #[test]
    fn has_reply_follows_status() {
        assert_eq!(HasReply::from(ReviewStatus::Replied), HasReply::Yes);
        assert_eq!(HasReply::from(ReviewStatus::Pending), HasReply::No);
    }

    #[test]
    fn category_parse_is_lenient_about_case_and_separators() {
        assert_eq!(Category::parse("wifi"), Some(Category::WiFi));
        assert_eq!(Category::parse("Wi-Fi"), Some(Category::WiFi));
        assert_eq!(Category::parse("room size"), Some(Category::RoomSize));
        assert_eq!(Category::parse("STAFF"), Some(Category::Staff));
        assert_eq!(Category::parse("Parking"), None);
    }

    #[test]
    fn category_serializes_with_display_names() {
        let json = serde_json::to_string(&[Category::RoomSize, Category::WiFi]).unwrap();
        assert_eq!(json, r#"["Room Size","WiFi"]"#);
    }

    #[test]
    fn combined_text_skips_empty_parts() {
        let review = raw(1);
        assert_eq!(review.combined_text(), "Lovely stay Great staff");
    }

    #[test]
    fn leading_name_takes_first_word() {
        assert_eq!(raw(1).leading_name(), Some("Prem"));
    }

    #[test]
    fn raw_review_serializes_snake_case_payload() {
        let value = serde_json::to_value(raw(5)).unwrap();
        assert_eq!(value["review_id"], 5);
        assert_eq!(value["positive_txt"], "Great staff");
        assert!(value["photo"].as_array().unwrap().is_empty());
    }
}
