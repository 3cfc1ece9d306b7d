//! Read-only views over the normalized store and ingestion runs.

use clap::Subcommand;
use stayrev_core::NormalizedReview;

/// Sub-commands available under `reviews`.
#[derive(Debug, Subcommand)]
pub enum ReviewCommands {
    /// Print the number of stored normalized reviews
    Count,
    /// List stored normalized reviews in batch order
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub(crate) async fn run_reviews(pool: &sqlx::PgPool, command: ReviewCommands) -> anyhow::Result<()> {
    match command {
        ReviewCommands::Count => {
            let count = stayrev_db::count_processed_reviews(pool).await?;
            println!("{count} normalized reviews");
        }
        ReviewCommands::List { limit } => {
            let reviews = stayrev_db::list_processed_reviews(pool).await?;
            if reviews.is_empty() {
                println!("no normalized reviews stored");
                return Ok(());
            }
            println!("| ID | Rating | Sentiment | Reviewer | Photos | Summary |");
            println!("|----|--------|-----------|----------|--------|---------|");
            for review in reviews.iter().take(limit) {
                println!("{}", review_row(review));
            }
        }
    }
    Ok(())
}

fn review_row(review: &NormalizedReview) -> String {
    let summary = review
        .summary
        .as_deref()
        .unwrap_or("\u{2014}")
        .replace('|', "\\|");
    format!(
        "| {} | {} | {} | {} | {} | {summary} |",
        review.id,
        review.rating,
        review.sentiment.as_str(),
        review.reviewer_name.replace('|', "\\|"),
        review.photos.len(),
    )
}

pub(crate) async fn run_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = stayrev_db::list_ingestion_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no ingestion runs recorded");
        return Ok(());
    }
    println!("| Run | Status | Trigger | Raw | Processed | Created | Error |");
    println!("|-----|--------|---------|-----|-----------|---------|-------|");
    for run in &runs {
        println!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            run.id,
            run.status,
            run.trigger_source,
            run.raw_count,
            run.records_processed,
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.error_message.as_deref().unwrap_or("\u{2014}"),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use stayrev_core::{HasReply, ReviewStatus, Sentiment};

    use super::*;

    #[test]
    fn review_row_escapes_pipes_and_dashes_missing_summary() {
        let review = NormalizedReview {
            id: "REV-000101".to_string(),
            platform_review_id: None,
            rating: 5,
            user_name: "A|B".to_string(),
            reviewer_name: "A|B".to_string(),
            text: "x".to_string(),
            review_text: "x".to_string(),
            summary: None,
            sentiment: Sentiment::Positive,
            language: "English".to_string(),
            categories: Vec::new(),
            key_phrases: Vec::new(),
            photos: Vec::new(),
            source: "Booking.com".to_string(),
            date: None,
            status: ReviewStatus::Pending,
            reply_status: ReviewStatus::Pending,
            has_reply: HasReply::No,
            first_seen: None,
            last_updated: None,
            scraped_at: None,
        };
        assert_eq!(
            review_row(&review),
            "| REV-000101 | 5 | Positive | A\\|B | 0 | \u{2014} |"
        );
    }
}
