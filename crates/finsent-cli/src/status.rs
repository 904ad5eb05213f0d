//! The `status` command.

use sqlx::SqlitePool;

/// Show the most recent model runs, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_status(pool: &SqlitePool, limit: i64) -> anyhow::Result<()> {
    let runs = finsent_db::list_model_runs(pool, limit.max(1)).await?;

    if runs.is_empty() {
        println!("no model runs found; run `finsent run` first");
        return Ok(());
    }

    println!(
        "{:<7}{:<22}{:<11}{:<11}{:<18}{:<8}{:<10}ERROR",
        "RUN", "MODEL", "KIND", "STATUS", "STARTED", "SCORED", "UNSCORED"
    );
    for run in &runs {
        let started = run.started_at.map_or_else(
            || "\u{2014}".to_string(),
            |at| at.format("%Y-%m-%d %H:%M").to_string(),
        );
        println!(
            "{:<7}{:<22}{:<11}{:<11}{:<18}{:<8}{:<10}{}",
            run.id,
            run.model_name,
            run.model_kind,
            run.status,
            started,
            run.articles_scored,
            run.articles_unscored,
            run.error_message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
