//! Photo correlation between raw reviews and the legacy `review_photos` table.
//!
//! Photos are keyed by a legacy integer recovered from each review's
//! `source_ref` (`"BK-101"` -> `101`). The correlation table is built once per
//! batch so that the join stays linear in the number of reviews and photos.

use std::collections::HashMap;

use stayrev_core::{parse_prefixed_id, Photo, RawReview};

/// Recover the legacy photo key from a review cross-reference.
///
/// Returns `None` (and the review simply gets no photos) when the reference
/// has no `-` delimiter or a non-numeric trailing segment.
#[must_use]
pub fn parse_legacy_key(source_ref: &str) -> Option<i64> {
    let key = parse_prefixed_id(source_ref);
    if key.is_none() && !source_ref.trim().is_empty() {
        tracing::debug!(source_ref, "unparseable photo cross-reference; no photos attached");
    }
    key
}

/// Bidirectional lookup between legacy photo keys and normalized review ids
/// for one batch.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    by_legacy_key: HashMap<i64, Vec<String>>,
    by_review_id: HashMap<String, usize>,
}

impl CorrelationTable {
    #[must_use]
    pub fn build(reviews: &[RawReview]) -> Self {
        let mut table = Self::default();
        for (index, review) in reviews.iter().enumerate() {
            let review_id = review.system_id();
            if let Some(key) = parse_legacy_key(&review.source_ref) {
                table
                    .by_legacy_key
                    .entry(key)
                    .or_default()
                    .push(review_id.clone());
            }
            table.by_review_id.insert(review_id, index);
        }
        table
    }

    /// Distinct legacy keys to bulk-fetch photos for, in ascending order.
    #[must_use]
    pub fn legacy_keys(&self) -> Vec<i64> {
        let mut keys: Vec<i64> = self.by_legacy_key.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Normalized review ids whose cross-reference resolves to `legacy_key`.
    #[must_use]
    pub fn review_ids_for(&self, legacy_key: i64) -> &[String] {
        self.by_legacy_key
            .get(&legacy_key)
            .map_or(&[], Vec::as_slice)
    }

    /// Position of a normalized review id in the batch the table was built from.
    #[must_use]
    pub fn index_of(&self, review_id: &str) -> Option<usize> {
        self.by_review_id.get(review_id).copied()
    }

    /// Group `(legacy_key, photo)` pairs by destination normalized review id,
    /// preserving photo order. Photos whose key no review references are dropped.
    pub fn group<I>(&self, photos: I) -> HashMap<String, Vec<Photo>>
    where
        I: IntoIterator<Item = (i64, Photo)>,
    {
        let mut grouped: HashMap<String, Vec<Photo>> = HashMap::new();
        for (key, photo) in photos {
            for review_id in self.review_ids_for(key) {
                grouped
                    .entry(review_id.clone())
                    .or_default()
                    .push(photo.clone());
            }
        }
        grouped
    }

    /// Replace every review's photo list with its correlated photos.
    ///
    /// Reviews with no resolvable photos end up with an empty list. Returns
    /// the number of photos attached.
    pub fn attach<I>(&self, reviews: &mut [RawReview], photos: I) -> usize
    where
        I: IntoIterator<Item = (i64, Photo)>,
    {
        for review in reviews.iter_mut() {
            review.photo.clear();
        }

        let mut attached = 0;
        for (review_id, group) in self.group(photos) {
            if let Some(index) = self.index_of(&review_id) {
                attached += group.len();
                reviews[index].photo = group;
            }
        }
        attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(review_id: i64, source_ref: &str) -> RawReview {
        RawReview {
            review_id,
            source_ref: source_ref.to_string(),
            title: String::new(),
            score: 8.0,
            positive_txt: String::new(),
            negative_txt: String::new(),
            posted_date: None,
            reviewer_stay_date: None,
            num_of_nights: 1,
            traveler_type: String::new(),
            room_name: String::new(),
            raw_review: String::new(),
            photo: vec![],
        }
    }

    fn photo(src: &str) -> Photo {
        Photo {
            src: src.to_string(),
            alt: String::new(),
        }
    }

    #[test]
    fn parse_legacy_key_examples() {
        assert_eq!(parse_legacy_key("BK-101"), Some(101));
        assert_eq!(parse_legacy_key("BK101"), None);
        assert_eq!(parse_legacy_key("BK-abc"), None);
        assert_eq!(parse_legacy_key(""), None);
    }

    #[test]
    fn review_is_associated_with_exactly_its_legacy_photos() {
        let mut reviews = vec![raw(1, "BK-101"), raw(2, "BK-102")];
        let table = CorrelationTable::build(&reviews);
        assert_eq!(table.legacy_keys(), vec![101, 102]);

        let attached = table.attach(
            &mut reviews,
            vec![
                (101, photo("a.jpg")),
                (102, photo("b.jpg")),
                (101, photo("c.jpg")),
            ],
        );

        assert_eq!(attached, 3);
        assert_eq!(reviews[0].photo, vec![photo("a.jpg"), photo("c.jpg")]);
        assert_eq!(reviews[1].photo, vec![photo("b.jpg")]);
    }

    #[test]
    fn missing_delimiter_yields_no_photos() {
        let mut reviews = vec![raw(1, "BK101"), raw(2, "BK-101")];
        let table = CorrelationTable::build(&reviews);
        assert_eq!(table.legacy_keys(), vec![101]);

        table.attach(&mut reviews, vec![(101, photo("a.jpg"))]);

        assert!(reviews[0].photo.is_empty());
        assert_eq!(reviews[1].photo.len(), 1);
    }

    #[test]
    fn unreferenced_photos_are_dropped() {
        let mut reviews = vec![raw(1, "BK-1")];
        let table = CorrelationTable::build(&reviews);
        let attached = table.attach(&mut reviews, vec![(999, photo("orphan.jpg"))]);
        assert_eq!(attached, 0);
        assert!(reviews[0].photo.is_empty());
    }

    #[test]
    fn attach_clears_stale_photo_lists() {
        let mut reviews = vec![raw(1, "garbage")];
        reviews[0].photo.push(photo("stale.jpg"));
        let table = CorrelationTable::build(&reviews);
        table.attach(&mut reviews, Vec::new());
        assert!(reviews[0].photo.is_empty());
    }

    #[test]
    fn group_is_keyed_by_normalized_id() {
        let reviews = vec![raw(7, "BK-70")];
        let table = CorrelationTable::build(&reviews);
        let grouped = table.group(vec![(70, photo("x.jpg"))]);
        assert_eq!(grouped.get("REV-000007"), Some(&vec![photo("x.jpg")]));
        assert_eq!(table.index_of("REV-000007"), Some(0));
    }
}
