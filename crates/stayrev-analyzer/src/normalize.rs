//! Validation and mapping of model output into [`NormalizedReview`]s.
//!
//! Every record is checked field by field and all violations are collected
//! before deciding the outcome. Only identity problems are fatal: a record
//! whose `id` cannot be tied back to a raw review cannot be trusted with any
//! of its other fields. Everything else is defaulted from the raw review (or
//! a fixed default) and reported as [`Severity::Recovered`].
//!
//! The result covers every raw review: one the model left out is mapped from
//! the raw review alone and appended after the model's own records.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::{Map, Value};
use stayrev_core::dates::{
    at_time_of_day, parse_stay_date, parse_system_timestamp, FIRST_SEEN_TIME, LAST_UPDATED_TIME,
    SCRAPED_AT_TIME,
};
use stayrev_core::{
    parse_prefixed_id, platform_review_id, rating_from_score, Category, HasReply,
    NormalizedReview, RawReview, ReviewStatus, Sentiment, MAX_CATEGORIES, MAX_KEY_PHRASES,
    MIN_KEY_PHRASES, REVIEW_SOURCE,
};

use crate::error::AnalyzerError;

const DEFAULT_LANGUAGE: &str = "English";
const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The record cannot be mapped; the whole batch is rejected.
    Fatal,
    /// The field was replaced by a derived or default value.
    Recovered,
}

/// One contract violation found in a model output record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Position of the record in the model output. Records filled in for
    /// omitted raw reviews are numbered after the last output record.
    pub index: usize,
    pub field: &'static str,
    pub reason: String,
    pub severity: Severity,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {} field `{}`: {}", self.index, self.field, self.reason)
    }
}

/// Mapped records plus the recovered issues found while mapping them.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub reviews: Vec<NormalizedReview>,
    pub issues: Vec<FieldIssue>,
}

/// Map model output records onto the canonical schema.
///
/// Records keep their output order. Duplicate ids are passed through
/// untouched; the store's primary key rejects them at write time.
///
/// # Errors
///
/// Returns [`AnalyzerError::Schema`] carrying every issue found (fatal and
/// recovered) if any record has a missing, unparseable or unknown `id`.
pub fn normalize_batch(
    records: Vec<Map<String, Value>>,
    raws: &[RawReview],
) -> Result<NormalizedBatch, AnalyzerError> {
    let by_id: HashMap<i64, &RawReview> = raws.iter().map(|r| (r.review_id, r)).collect();

    let output_len = records.len();
    let mut issues = Vec::new();
    let mut reviews = Vec::with_capacity(output_len.max(raws.len()));
    let mut seen: HashSet<i64> = HashSet::with_capacity(records.len());
    let mut fatal = false;

    for (index, record) in records.into_iter().enumerate() {
        let mut fields = Fields {
            record: &record,
            index,
            issues: &mut issues,
        };

        let Some(raw) = fields.resolve_raw(&by_id) else {
            fatal = true;
            continue;
        };
        if !seen.insert(raw.review_id) {
            tracing::warn!(index, review_id = raw.review_id, "duplicate id in model output");
        }
        reviews.push(fields.map(raw));
    }

    if fatal {
        return Err(AnalyzerError::Schema { issues });
    }

    let empty = Map::new();
    let omitted = raws.iter().filter(|r| !seen.contains(&r.review_id));
    for (offset, raw) in omitted.enumerate() {
        let mut fields = Fields {
            record: &empty,
            index: output_len + offset,
            issues: &mut issues,
        };
        fields.recovered(
            "id",
            format!("{} missing from model output; mapped from raw review", raw.review_id),
        );
        reviews.push(fields.map(raw));
    }
    for issue in &issues {
        tracing::warn!(
            index = issue.index,
            field = issue.field,
            reason = %issue.reason,
            "recovered field in model output"
        );
    }

    Ok(NormalizedBatch { reviews, issues })
}

/// Recover a raw review id from an `id` value.
///
/// Accepts an integer, a numeric string, or a prefixed string such as
/// `"BK-101"` or `"REV-000101"`.
#[must_use]
pub fn parse_record_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| parse_prefixed_id(s))
        }
        _ => None,
    }
}

struct Fields<'a> {
    record: &'a Map<String, Value>,
    index: usize,
    issues: &'a mut Vec<FieldIssue>,
}

impl<'a> Fields<'a> {
    fn issue(&mut self, field: &'static str, severity: Severity, reason: impl Into<String>) {
        self.issues.push(FieldIssue {
            index: self.index,
            field,
            reason: reason.into(),
            severity,
        });
    }

    fn recovered(&mut self, field: &'static str, reason: impl Into<String>) {
        self.issue(field, Severity::Recovered, reason);
    }

    /// Present and not null.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.record.get(field).filter(|v| !v.is_null())
    }

    fn resolve_raw<'r>(&mut self, by_id: &HashMap<i64, &'r RawReview>) -> Option<&'r RawReview> {
        let Some(value) = self.get("id") else {
            self.issue("id", Severity::Fatal, "missing");
            return None;
        };
        let Some(id) = parse_record_id(value) else {
            self.issue("id", Severity::Fatal, format!("unparseable value {value}"));
            return None;
        };
        let Some(raw) = by_id.get(&id).copied() else {
            self.issue("id", Severity::Fatal, format!("{id} is not in the raw batch"));
            return None;
        };
        Some(raw)
    }

    /// A non-empty trimmed string, recording an issue when present but not
    /// a usable string.
    fn string(&mut self, field: &'static str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::String(_) => None,
            other => {
                self.recovered(field, format!("expected a string, found {other}"));
                None
            }
        }
    }

    /// First usable string among `fields`.
    fn first_string(&mut self, fields: &[&'static str]) -> Option<String> {
        fields.iter().find_map(|&f| self.string(f))
    }

    fn string_list(&mut self, field: &'static str) -> Vec<String> {
        match self.get(field) {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.trim().to_owned()),
                        other => self.recovered(field, format!("dropped non-string element {other}")),
                    }
                }
                out
            }
            Some(other) => {
                self.recovered(field, format!("expected an array, found {other}"));
                Vec::new()
            }
        }
    }

    fn map(&mut self, raw: &RawReview) -> NormalizedReview {
        let display_name = self.display_name(raw);
        let text = self.narrative(raw);
        let status = self.status();

        NormalizedReview {
            id: raw.system_id(),
            platform_review_id: Some(self.platform_id(raw)),
            rating: self.rating(raw),
            user_name: display_name.clone(),
            reviewer_name: display_name,
            text: text.clone(),
            review_text: text,
            summary: self.string("summary"),
            sentiment: self.sentiment(),
            language: self
                .string("language")
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned()),
            categories: self.categories(),
            key_phrases: self.key_phrases(),
            photos: raw.photo.clone(),
            source: self.source(),
            date: self.stay_date(raw),
            status,
            reply_status: self.reply_status(status),
            has_reply: self.has_reply(status),
            first_seen: self.timestamp("firstSeen", raw, FIRST_SEEN_TIME),
            last_updated: self.timestamp("lastUpdated", raw, LAST_UPDATED_TIME),
            scraped_at: self.timestamp("scrapedAt", raw, SCRAPED_AT_TIME),
        }
    }

    fn platform_id(&mut self, raw: &RawReview) -> String {
        let derived = platform_review_id(raw.review_id);
        if let Some(given) = self.string("platformReviewId") {
            if given != derived {
                self.recovered("platformReviewId", format!("{given:?} replaced by {derived:?}"));
            }
        }
        derived
    }

    // The raw score is authoritative; the model's arithmetic is only checked.
    fn rating(&mut self, raw: &RawReview) -> u8 {
        let derived = rating_from_score(raw.score);
        if let Some(given) = self.get("rating") {
            if given.as_u64() != Some(u64::from(derived)) {
                tracing::debug!(
                    index = self.index,
                    given = %given,
                    derived,
                    "model rating differs from score-derived rating"
                );
            }
        }
        derived
    }

    fn display_name(&mut self, raw: &RawReview) -> String {
        if let Some(name) = self.first_string(&["reviewerName", "userName"]) {
            return name;
        }
        let fallback = raw.leading_name().unwrap_or(ANONYMOUS).to_owned();
        self.recovered("userName", format!("missing; using {fallback:?}"));
        fallback
    }

    fn narrative(&mut self, raw: &RawReview) -> String {
        if let Some(text) = self.first_string(&["reviewText", "text"]) {
            return text;
        }
        self.recovered("text", "missing; combined from raw title and texts");
        raw.combined_text()
    }

    fn sentiment(&mut self) -> Sentiment {
        match self.string("sentiment") {
            Some(label) => Sentiment::parse(&label).unwrap_or_else(|| {
                self.recovered("sentiment", format!("unknown label {label:?}"));
                Sentiment::default()
            }),
            None => {
                self.recovered("sentiment", "missing");
                Sentiment::default()
            }
        }
    }

    fn categories(&mut self) -> Vec<Category> {
        let tags = self.string_list("categories");
        let mut out: Vec<Category> = Vec::with_capacity(MAX_CATEGORIES);
        for tag in tags {
            match Category::parse(&tag) {
                Some(category) if !out.contains(&category) => out.push(category),
                Some(_) => {}
                None => self.recovered("categories", format!("dropped unknown tag {tag:?}")),
            }
        }
        if out.len() > MAX_CATEGORIES {
            self.recovered(
                "categories",
                format!("{} categories truncated to {MAX_CATEGORIES}", out.len()),
            );
            out.truncate(MAX_CATEGORIES);
        }
        out
    }

    fn key_phrases(&mut self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out: Vec<String> = self
            .string_list("keyPhrases")
            .into_iter()
            .filter(|p| !p.is_empty())
            .filter(|p| seen.insert(p.to_lowercase()))
            .collect();

        if !out.is_empty() && out.len() < MIN_KEY_PHRASES {
            self.recovered(
                "keyPhrases",
                format!("only {} usable phrase(s); list cleared", out.len()),
            );
            out.clear();
        } else if out.len() > MAX_KEY_PHRASES {
            self.recovered(
                "keyPhrases",
                format!("{} phrases truncated to {MAX_KEY_PHRASES}", out.len()),
            );
            out.truncate(MAX_KEY_PHRASES);
        }
        out
    }

    fn source(&mut self) -> String {
        if let Some(given) = self.string("source") {
            if given != REVIEW_SOURCE {
                self.recovered("source", format!("{given:?} replaced by {REVIEW_SOURCE:?}"));
            }
        }
        REVIEW_SOURCE.to_owned()
    }

    fn stay_date(&mut self, raw: &RawReview) -> Option<chrono::NaiveDate> {
        if let Some(given) = self.string("date") {
            if let Some(date) = parse_stay_date(&given) {
                return Some(date);
            }
            self.recovered("date", format!("unparseable date {given:?}; using raw stay date"));
        }
        raw.reviewer_stay_date
    }

    fn status(&mut self) -> ReviewStatus {
        match self.string("status") {
            Some(label) => ReviewStatus::parse(&label).unwrap_or_else(|| {
                self.recovered("status", format!("unknown status {label:?}"));
                ReviewStatus::default()
            }),
            None => ReviewStatus::default(),
        }
    }

    fn reply_status(&mut self, status: ReviewStatus) -> ReviewStatus {
        if let Some(label) = self.string("replyStatus") {
            if ReviewStatus::parse(&label) != Some(status) {
                self.recovered("replyStatus", format!("{label:?} does not mirror status"));
            }
        }
        status
    }

    fn has_reply(&mut self, status: ReviewStatus) -> HasReply {
        let derived = HasReply::from(status);
        if let Some(label) = self.string("hasReply") {
            if !label.eq_ignore_ascii_case(derived.as_str()) {
                self.recovered(
                    "hasReply",
                    format!("{label:?} inconsistent with status {}", status.as_str()),
                );
            }
        }
        derived
    }

    fn timestamp(
        &mut self,
        field: &'static str,
        raw: &RawReview,
        time_of_day: (u32, u32),
    ) -> Option<chrono::NaiveDateTime> {
        if let Some(given) = self.string(field) {
            if let Some(ts) = parse_system_timestamp(&given) {
                return Some(ts);
            }
            self.recovered(field, format!("unparseable timestamp {given:?}; derived from posted date"));
        }
        raw.posted_date.map(|posted| at_time_of_day(posted, time_of_day))
    }
}
