//! The `ingest` command: raw reviews in, normalized store and artifact out.

use std::path::Path;

use stayrev_analyzer::{analyze_batch, build_prompt, GeminiClient};
use stayrev_core::{AppConfig, NormalizedReview};

use crate::fail_run_best_effort;

/// Run one full ingestion pass.
///
/// Fetches every raw review with its photos, asks the model to normalize the
/// batch, replaces the normalized store and writes the JSON artifact. The run
/// is tracked in `ingestion_runs`; any failure after the run is created marks
/// it failed before the error is returned.
///
/// With `dry_run` the raw batch is fetched (and the prompt saved when
/// `save_prompt` is given) but the model is not called and nothing is written.
/// An empty raw table aborts the same way: no run is recorded and the stored
/// batch is left untouched.
///
/// # Errors
///
/// Returns an error if the raw fetch fails, `GEMINI_API_KEY` is unset, the
/// model call or mapping fails, or the store write fails. A failed write
/// leaves the previously stored batch in place.
pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    dry_run: bool,
    save_prompt: Option<&Path>,
    artifact_path: &Path,
) -> anyhow::Result<()> {
    let raws = stayrev_db::fetch_raw_reviews(pool).await?;
    let with_photos = raws.iter().filter(|r| !r.photo.is_empty()).count();
    tracing::info!(
        raw_reviews = raws.len(),
        with_photos,
        "fetched raw reviews"
    );

    if let Some(path) = save_prompt {
        let prompt = build_prompt(&raws)?;
        std::fs::write(path, prompt)?;
        println!("saved prompt to {}", path.display());
    }

    if dry_run {
        println!(
            "dry-run: would analyze {} raw reviews ({with_photos} with photos)",
            raws.len()
        );
        return Ok(());
    }

    if raws.is_empty() {
        tracing::warn!("no raw reviews found; aborting ingest");
        println!("no raw reviews found; normalized store left unchanged");
        return Ok(());
    }

    let api_key = config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set; cannot run ingest"))?;
    let client = GeminiClient::with_base_url(
        api_key,
        &config.analysis_model,
        config.analysis_timeout_secs,
        &config.gemini_base_url,
    )
    .map_err(|e| anyhow::anyhow!("failed to build Gemini client: {e}"))?;

    let run = stayrev_db::create_ingestion_run(pool, "cli").await?;
    if let Err(e) = stayrev_db::start_ingestion_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }

    let result: anyhow::Result<u64> = async {
        let batch = analyze_batch(&client, &raws).await?;
        for issue in &batch.issues {
            tracing::warn!(
                index = issue.index,
                field = issue.field,
                reason = %issue.reason,
                "recovered field issue"
            );
        }

        let stored = stayrev_db::replace_processed_reviews(pool, &batch.reviews).await?;
        write_artifact(artifact_path, &batch.reviews)?;
        Ok(stored)
    }
    .await;

    match result {
        Ok(stored) => {
            let raw_count = i32::try_from(raws.len()).unwrap_or(i32::MAX);
            let processed = i32::try_from(stored).unwrap_or(i32::MAX);
            if let Err(err) =
                stayrev_db::complete_ingestion_run(pool, run.id, raw_count, processed).await
            {
                fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
                return Err(err.into());
            }
            println!(
                "ingested {stored} normalized reviews from {} raw reviews; artifact at {}",
                raws.len(),
                artifact_path.display()
            );
            Ok(())
        }
        Err(err) => {
            fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
            Err(err)
        }
    }
}

/// Write the normalized batch as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns an error if serialization or the file write fails.
pub(crate) fn write_artifact(path: &Path, reviews: &[NormalizedReview]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(reviews)?;
    std::fs::write(path, json)?;
    tracing::info!(
        path = %path.display(),
        reviews = reviews.len(),
        "wrote review artifact"
    );
    Ok(())
}
