//! Server-rendered HTML dashboard at `/`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use finsent_analysis::is_company_name;
use finsent_db::{DbError, ModelSentimentSummaryRow, SentimentListRow, TopEntitiesFilter};

use crate::api::AppState;

const RECENT_ARTICLES: i64 = 50;
/// ORG rows scanned before the company filter is applied.
const COMPANY_SCAN_LIMIT: i64 = 200;
const TOP_COMPANIES: usize = 15;

/// Articles with per-model sentiment, keyed by article id.
struct ArticleView {
    title: String,
    url: String,
    source_name: Option<String>,
    published_at: String,
    labels: BTreeMap<String, (String, f64)>,
}

pub(crate) async fn index(State(state): State<AppState>) -> Response {
    match load(&state).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "dashboard query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h1>dashboard unavailable</h1>".to_string()),
            )
                .into_response()
        }
    }
}

async fn load(state: &AppState) -> Result<String, DbError> {
    let summary = finsent_db::sentiment_summary_by_model(&state.pool).await?;
    let recent = finsent_db::list_recent_article_sentiment(&state.pool, RECENT_ARTICLES).await?;
    let entities = finsent_db::top_entities(
        &state.pool,
        TopEntitiesFilter {
            model_name: None,
            entity_type: Some("ORG"),
        },
        COMPANY_SCAN_LIMIT,
    )
    .await?;
    let companies: Vec<(String, i64)> = entities
        .into_iter()
        .filter(|row| is_company_name(&row.entity_text))
        .take(TOP_COMPANIES)
        .map(|row| (row.entity_text, row.article_count))
        .collect();

    Ok(render(&summary, &recent, &companies))
}

fn render(
    summary: &[ModelSentimentSummaryRow],
    recent: &[SentimentListRow],
    companies: &[(String, i64)],
) -> String {
    let models: Vec<&str> = summary.iter().map(|row| row.model_name.as_str()).collect();
    let articles = group_by_article(recent);

    let mut html = String::from(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <title>Financial news sentiment</title>\
         <style>body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;margin-bottom:2em}\
         td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
         .positive{color:#1a7f37}.negative{color:#cf222e}.neutral{color:#57606a}</style>\
         </head><body>\n<h1>Financial news sentiment</h1>\n",
    );

    html.push_str("<h2>Label distribution by model</h2>\n");
    if summary.is_empty() {
        html.push_str("<p>No results yet. Run <code>finsent run</code> to populate.</p>\n");
    } else {
        html.push_str(
            "<table><tr><th>Model</th><th>Articles</th><th>Mean score</th>\
             <th>Positive</th><th>Negative</th><th>Neutral</th></tr>\n",
        );
        for row in summary {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{:+.3}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&row.model_name),
                row.article_count,
                row.mean_signed_score,
                row.positive_count,
                row.negative_count,
                row.neutral_count
            );
        }
        html.push_str("</table>\n");
    }

    if !companies.is_empty() {
        html.push_str("<h2>Most mentioned companies</h2>\n<table><tr><th>Company</th><th>Articles</th></tr>\n");
        for (name, count) in companies {
            let _ = writeln!(html, "<tr><td>{}</td><td>{count}</td></tr>", escape(name));
        }
        html.push_str("</table>\n");
    }

    if !articles.is_empty() {
        html.push_str("<h2>Latest analyzed articles</h2>\n<table><tr><th>Published</th><th>Source</th><th>Title</th>");
        for model in &models {
            let _ = write!(html, "<th>{}</th>", escape(model));
        }
        html.push_str("</tr>\n");
        for article in &articles {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td>",
                escape(&article.published_at),
                escape(article.source_name.as_deref().unwrap_or("")),
                escape(&article.url),
                escape(&article.title)
            );
            for model in &models {
                match article.labels.get(*model) {
                    Some((label, confidence)) => {
                        let _ = write!(
                            html,
                            "<td class=\"{0}\">{0} ({confidence:.2})</td>",
                            escape(label)
                        );
                    }
                    None => html.push_str("<td></td>"),
                }
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body></html>\n");
    html
}

/// Collapses per-model rows into one view per article, keeping the query's
/// newest-first order.
fn group_by_article(rows: &[SentimentListRow]) -> Vec<ArticleView> {
    let mut order: Vec<i64> = Vec::new();
    let mut views: BTreeMap<i64, ArticleView> = BTreeMap::new();
    for row in rows {
        let view = views.entry(row.article_id).or_insert_with(|| {
            order.push(row.article_id);
            ArticleView {
                title: row.title.clone(),
                url: row.url.clone(),
                source_name: row.source_name.clone(),
                published_at: row.published_at.format("%Y-%m-%d %H:%M").to_string(),
                labels: BTreeMap::new(),
            }
        });
        view.labels
            .insert(row.model_name.clone(), (row.label.clone(), row.confidence));
    }
    order
        .into_iter()
        .filter_map(|id| views.remove(&id))
        .collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
