mod config;
mod error;
mod models;
mod services;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, rejection::JsonRejection},
    http::header,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
};
use error::AppError;
use models::{ChapterSpec, MovieQuery, RecommendRequest, RecommendResponse};
use services::{
    aggregator,
    embedding::EmbeddingClient,
    llm::{Completion, LLMClient},
    movies::{self, MovieDatabase, OmdbClient},
    recommender::{self, Preferences},
    summarizer::Summarizer,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
const MISSING_SUMMARY_INPUT: &str = "Please upload a PDF file and specify chapter page ranges.";

#[derive(Clone)]
struct AppState {
    config: Arc<config::Config>,
    llm_client: Arc<LLMClient>,
    embedding_client: Arc<EmbeddingClient>,
    movie_client: Arc<OmdbClient>,
}

impl AppState {
    fn new(config: config::Config) -> anyhow::Result<Self> {
        Ok(AppState {
            llm_client: Arc::new(LLMClient::new(&config.llm)?),
            embedding_client: Arc::new(EmbeddingClient::new(&config.embedding)?),
            movie_client: Arc::new(OmdbClient::new(
                &config.movie_api_url,
                config.movie_api_key.clone(),
            )?),
            config: Arc::new(config),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = config::Config::from_env()?;
    std::fs::create_dir_all(&config.output_dir)?;
    tracing::info!("Writing job output under {}", config.output_dir.display());

    let bind_addr = config.bind_addr.clone();
    let app = app(AppState::new(config)?);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/summarize", post(summarize))
        .route("/download/:job_id", get(download))
        .route("/recommend", post(recommend))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn summarize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut pdf_bytes: Option<Vec<u8>> = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::MissingInput(format!("malformed upload: {}", e)))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        if name == "pdf_file" {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::MissingInput(format!("failed to read upload: {}", e)))?;
            if !data.is_empty() {
                pdf_bytes = Some(data.to_vec());
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::MissingInput(format!("failed to read field {}: {}", name, e)))?;
            fields.insert(name, value);
        }
    }

    let Some(pdf_bytes) = pdf_bytes else {
        return Err(AppError::MissingInput(MISSING_SUMMARY_INPUT.to_string()));
    };
    let specs = chapter_specs(&fields)?;
    if specs.is_empty() {
        return Err(AppError::MissingInput(MISSING_SUMMARY_INPUT.to_string()));
    }

    let summarizer = Summarizer {
        embedder: state.embedding_client.as_ref(),
        llm: state.llm_client.as_ref(),
        retrieval: &state.config.retrieval,
    };
    let job = summarizer
        .process_pdf(pdf_bytes, &specs, &state.config.output_dir)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "chapter_count": job.chapter_count,
        "combined_summary": job.combined,
        "download_url": format!("/download/{}", job.job_id)
    })))
}

/// Reads `chapter_count` and `start_page_N`/`end_page_N` form fields into
/// `Chapter N` specs. Every chapter needs a start page; a missing end
/// defaults to the start page.
fn chapter_specs(fields: &HashMap<String, String>) -> Result<Vec<ChapterSpec>, AppError> {
    let count = match form_number(fields, "chapter_count")? {
        Some(count) => count,
        None => return Ok(Vec::new()),
    };
    // each chapter carries its own start field, so a larger count cannot be satisfied
    if count > fields.len() {
        return Err(AppError::MissingInput(format!(
            "chapter_count is {} but only {} form fields were sent; give a start page for every chapter",
            count,
            fields.len()
        )));
    }

    (1..=count)
        .map(|n| -> Result<ChapterSpec, AppError> {
            let start_key = format!("start_page_{}", n);
            let start = form_number(fields, &start_key)?
                .ok_or_else(|| AppError::MissingInput(format!("{} is required", start_key)))?;
            let end = form_number(fields, &format!("end_page_{}", n))?.unwrap_or(start);
            Ok(ChapterSpec::numbered(n, start, end))
        })
        .collect()
}

fn form_number(fields: &HashMap<String, String>, key: &str) -> Result<Option<usize>, AppError> {
    match fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::MissingInput(format!("{} must be a whole number, got {:?}", key, raw))),
    }
}

async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound(format!("No summary found for job {}", job_id));
    let path = aggregator::combined_path(&state.config.output_dir, &job_id).ok_or_else(not_found)?;

    let contents = match tokio::fs::read(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", aggregator::COMBINED_FILE_NAME),
            ),
        ],
        contents,
    ))
}

async fn recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        AppError::MissingInput(format!(
            "Please enter a movie title and release year. ({})",
            rejection.body_text()
        ))
    })?;

    let response = recommend_movie(
        state.movie_client.as_ref(),
        state.llm_client.as_ref(),
        request,
    )
    .await?;
    Ok(Json(response))
}

/// Resolves the movie, then asks the model once. An unresolved movie returns
/// before any model call.
async fn recommend_movie<D: MovieDatabase, L: Completion>(
    db: &D,
    llm: &L,
    request: RecommendRequest,
) -> Result<RecommendResponse, AppError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::MissingInput("Please enter a movie title.".to_string()));
    }

    let query = MovieQuery {
        title: title.to_string(),
        year: request.year,
    };
    let movie = movies::resolve_movie(db, &query)
        .await
        .map_err(AppError::Upstream)?
        .ok_or_else(|| AppError::NotFound("Movie not found.".to_string()))?;
    tracing::info!(id = %movie.id, title = %movie.title, "Resolved movie");

    let prefs = Preferences::parse(&request.preferences);
    let recommendation = recommender::recommend(llm, &movie, &prefs).await;
    let (recommendations, error) = match recommendation.outcome {
        Ok(text) => (Some(text), None),
        Err(message) => (None, Some(message)),
    };

    Ok(RecommendResponse {
        success: error.is_none(),
        movie,
        prompt: recommendation.prompt,
        recommendations,
        error,
        year_range: prefs.year_range,
    })
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Pagewise</title>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; max-width: 900px; }
        .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
        label { display: block; margin: 8px 0 4px; }
        pre { background-color: #f5f5f5; padding: 12px; white-space: pre-wrap; }
        .error { color: #b00020; }
    </style>
</head>
<body>
    <h1>Book Summarizer with Chapters</h1>
    <div class="info-box">
        <form id="summarize-form">
            <label>Upload a PDF file</label>
            <input type="file" name="pdf_file" accept="application/pdf">
            <label>Enter the number of chapters in the book:</label>
            <input type="number" name="chapter_count" id="chapter-count" min="1" step="1" value="1">
            <div id="chapter-ranges"></div>
            <p><button type="submit">Process and Summarize</button></p>
        </form>
        <div id="summary-result"></div>
    </div>

    <h1>Movie Recommendations</h1>
    <div class="info-box">
        <form id="recommend-form">
            <label>Movie title</label>
            <input type="text" name="title">
            <label>Release year</label>
            <input type="number" name="year" min="1870" step="1" value="2010">
            <label>Preferences (what you liked, content restrictions, year range)</label>
            <textarea name="preferences" rows="3" cols="60"></textarea>
            <p><button type="submit">Recommend</button></p>
        </form>
        <div id="recommend-result"></div>
    </div>

    <script>
        const countInput = document.getElementById('chapter-count');
        const ranges = document.getElementById('chapter-ranges');
        function renderRanges() {
            const n = Math.max(1, parseInt(countInput.value || '1', 10));
            ranges.innerHTML = '<p>Specify the page range for each chapter:</p>';
            for (let i = 1; i <= n; i++) {
                ranges.innerHTML +=
                    `<label>Chapter ${i}: start page <input type="number" name="start_page_${i}" min="1" value="1">` +
                    ` end page <input type="number" name="end_page_${i}" min="1" value="1"></label>`;
            }
        }
        countInput.addEventListener('change', renderRanges);
        renderRanges();

        function show(target, text, isError) {
            const el = document.getElementById(target);
            el.innerHTML = '';
            const pre = document.createElement('pre');
            if (isError) pre.className = 'error';
            pre.textContent = text;
            el.appendChild(pre);
            return el;
        }

        document.getElementById('summarize-form').addEventListener('submit', async (e) => {
            e.preventDefault();
            show('summary-result', 'Processing...', false);
            const res = await fetch('/summarize', { method: 'POST', body: new FormData(e.target) });
            const body = await res.json();
            if (!body.success) { show('summary-result', body.error, true); return; }
            const el = show('summary-result', body.combined_summary, false);
            const link = document.createElement('a');
            link.href = body.download_url;
            link.textContent = 'Download Combined Summary';
            el.prepend(link);
        });

        document.getElementById('recommend-form').addEventListener('submit', async (e) => {
            e.preventDefault();
            const form = new FormData(e.target);
            show('recommend-result', 'Searching...', false);
            const res = await fetch('/recommend', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({
                    title: form.get('title'),
                    year: parseInt(form.get('year'), 10),
                    preferences: form.get('preferences') || ''
                })
            });
            const body = await res.json();
            if (!body.success) { show('recommend-result', body.error, true); return; }
            show('recommend-result', body.recommendations, false);
        });
    </script>
</body>
</html>
"#;
