//! Movie lookup against an OMDb-compatible API.

use crate::models::{MovieHit, MovieQuery, MovieRecord};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::future::Future;

pub trait MovieDatabase {
    fn search(&self, title: &str) -> impl Future<Output = Result<Vec<MovieHit>>> + Send;
    fn fetch(&self, id: &str) -> impl Future<Output = Result<MovieRecord>> + Send;
}

/// Searches by title and returns the first hit whose year equals the
/// requested year exactly, fully fetched. `None` when nothing matches.
pub async fn resolve_movie<D: MovieDatabase>(db: &D, query: &MovieQuery) -> Result<Option<MovieRecord>> {
    let hits = db.search(&query.title).await?;
    tracing::debug!(title = %query.title, hits = hits.len(), "movie search finished");

    match hits.into_iter().find(|hit| hit.year == Some(query.year)) {
        Some(hit) => Ok(Some(db.fetch(&hit.id).await?)),
        None => Ok(None),
    }
}

pub struct OmdbClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl OmdbClient {
    pub fn new(api_url: &str, api_key: Option<String>) -> Result<Self> {
        if api_key.is_none() {
            tracing::warn!("MOVIE_API_KEY is not set; movie lookups will likely be rejected");
        }
        Ok(OmdbClient {
            client: reqwest::Client::builder()
                .build()
                .context("failed to build movie database HTTP client")?,
            api_url: api_url.to_string(),
            api_key,
        })
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let mut request_builder = self.client.get(&self.api_url).query(params);
        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.query(&[("apikey", api_key.as_str())]);
        }
        let response = request_builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.api_url))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("movie database request failed ({}): {}", status, body);
        }
        serde_json::from_str(&body).context("failed to parse movie database response")
    }
}

impl MovieDatabase for OmdbClient {
    async fn search(&self, title: &str) -> Result<Vec<MovieHit>> {
        let response: OmdbSearch = self.get(&search_params(title)).await?;
        response.into_hits()
    }

    async fn fetch(&self, id: &str) -> Result<MovieRecord> {
        let full: OmdbTitle = self.get(&[("i", id), ("plot", "full")]).await?;
        let short: OmdbTitle = self.get(&[("i", id), ("plot", "short")]).await?;
        full.into_record(short.plot)
    }
}

/// Title search across all kinds (movies, series, episodes). OMDb pages
/// results, and only the first page of ten is scanned.
fn search_params(title: &str) -> [(&'static str, &str); 1] {
    [("s", title)]
}

#[derive(Debug, Deserialize)]
struct OmdbSearch {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbSearchItem>,
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchItem {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "imdbID")]
    imdb_id: String,
}

impl OmdbSearch {
    fn into_hits(self) -> Result<Vec<MovieHit>> {
        if self.response != "True" {
            let error = self.error.unwrap_or_default();
            // OMDb reports an empty search as an error
            if error.eq_ignore_ascii_case("Movie not found!") {
                return Ok(Vec::new());
            }
            anyhow::bail!("movie database error: {}", error);
        }
        Ok(self
            .search
            .into_iter()
            .map(|item| MovieHit {
                id: item.imdb_id,
                year: parse_year(&item.year),
                title: item.title,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct OmdbTitle {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Country")]
    country: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "imdbRating")]
    rating: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
}

impl OmdbTitle {
    fn into_record(self, short_plot: Option<String>) -> Result<MovieRecord> {
        if self.response != "True" {
            anyhow::bail!("movie database error: {}", self.error.unwrap_or_default());
        }
        Ok(MovieRecord {
            id: self.imdb_id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            year: self.year.as_deref().and_then(parse_year),
            country: present(self.country),
            synopsis: present(self.plot),
            plots: present(short_plot).into_iter().collect(),
            rating: present(self.rating).and_then(|r| r.parse().ok()),
            genres: present(self.genre)
                .map(|g| {
                    g.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

/// OMDb fills unknown fields with "N/A".
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v.trim() != "N/A")
}

/// Reads the leading four-digit year, so "2010" and "2010–2012" both give 2010.
fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().get(..4)?.parse().ok()
}
