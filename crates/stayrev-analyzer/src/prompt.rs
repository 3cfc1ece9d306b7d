//! Prompt construction for the review analysis call.
//!
//! The whole batch is serialized into a single prompt. There is no chunking:
//! very large batches can exceed the model's context window, in which case
//! the service rejects the request with an API error.

use stayrev_core::{Category, RawReview};

/// Version of the output contract described by [`PROMPT_TEMPLATE`].
///
/// Bump this whenever the output shape in the template changes, together
/// with the validation rules in [`crate::normalize`].
pub const RESPONSE_SCHEMA_VERSION: u32 = 2;

const PAYLOAD_MARKER: &str = "{{REVIEWS_JSON}}";
const CATEGORY_MARKER: &str = "{{CATEGORIES}}";
const VERSION_MARKER: &str = "{{SCHEMA_VERSION}}";

const PROMPT_TEMPLATE: &str = r#"Role: You are a review data processor and sentiment analyst for a hotel reputation management system.

Task: You will receive a JSON array of raw hotel reviews scraped from Booking.com. Parse, clean and restructure every review into the output format below. Return exactly one output object per input review.

Transformation rules (output schema version {{SCHEMA_VERSION}}):

id: Use the original integer review_id unchanged.

platformReviewId: "BK-" followed by the review_id, e.g. "BK-101".

rating: The input score is out of 10. Convert it to a 1-5 star rating (score / 2, rounded to the nearest integer, never below 1).

userName and reviewerName: The input has no name field. Extract the reviewer's name from the start of raw_review (usually the first word, e.g. "Prem IndiaDouble Room..." gives "Prem"). Use the same value for both fields. Use "Anonymous" if no name can be found.

text and reviewText: Combine title, positive_txt and negative_txt into a single coherent paragraph. Skip parts that are empty. Use the same value for both fields.

summary: One short sentence summarizing the review.

sentiment: Analyze the combined text and the score. Output exactly one of "Positive", "Neutral", "Negative".

language: The language the review is written in, e.g. "English".

categories: Tag the review with at most 3 categories taken only from this list: {{CATEGORIES}}.

keyPhrases: 3 to 5 short phrases taken from the review text. Use an empty array if the text is too short.

source: Always "Booking.com".

date: Format reviewer_stay_date as "MMM DD, YYYY" (e.g. "Sep 01, 2025"). Use null if it is missing.

status: Always "Pending". replyStatus: same value as status. hasReply: "Yes" if status is "Replied", otherwise "No".

firstSeen, lastUpdated, scrapedAt: Based on the date part of posted_date, formatted as "Month DD, YYYY at hh:mm AM/PM" at 09:00 AM, 12:00 PM and 06:00 PM respectively (e.g. "September 01, 2025 at 09:00 AM"). Use null if posted_date is missing.

Do not output images; photos are attached separately.

Input data: {{REVIEWS_JSON}}

Output format: Return only a valid JSON array, with no commentary, where each object has exactly this structure:

[
  {
    "id": 101,
    "platformReviewId": "BK-101",
    "rating": 4,
    "userName": "Extracted Name",
    "reviewerName": "Extracted Name",
    "text": "The combined review text...",
    "reviewText": "The combined review text...",
    "summary": "One sentence summary.",
    "sentiment": "Positive",
    "language": "English",
    "categories": ["Staff", "Location"],
    "keyPhrases": ["friendly staff", "great location", "quiet room"],
    "source": "Booking.com",
    "date": "Sep 01, 2025",
    "status": "Pending",
    "replyStatus": "Pending",
    "hasReply": "No",
    "firstSeen": "September 01, 2025 at 09:00 AM",
    "lastUpdated": "September 01, 2025 at 12:00 PM",
    "scrapedAt": "September 01, 2025 at 06:00 PM"
  }
]
"#;

/// Serialize the batch as a JSON array carrying every raw field, photos
/// included.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if serialization fails.
pub fn build_payload(reviews: &[RawReview]) -> Result<String, serde_json::Error> {
    serde_json::to_string(reviews)
}

/// Build the full analysis prompt for a batch.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if the payload cannot be serialized.
pub fn build_prompt(reviews: &[RawReview]) -> Result<String, serde_json::Error> {
    let payload = build_payload(reviews)?;
    Ok(render(&payload))
}

fn render(payload: &str) -> String {
    let categories = serde_json::Value::from(
        Category::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>(),
    )
    .to_string();

    // Payload goes last so marker-looking text inside reviews is not expanded.
    PROMPT_TEMPLATE
        .replace(VERSION_MARKER, &RESPONSE_SCHEMA_VERSION.to_string())
        .replace(CATEGORY_MARKER, &categories)
        .replace(PAYLOAD_MARKER, payload)
}
