use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A user-requested chapter: a name and an inclusive, 1-based page range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpec {
    pub name: String,
    pub start_page: usize,
    pub end_page: usize,
}

impl ChapterSpec {
    pub fn numbered(number: usize, start_page: usize, end_page: usize) -> Self {
        ChapterSpec {
            name: format!("Chapter {}", number),
            start_page,
            end_page,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub name: String,
    pub page_range: (usize, usize),
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub chapter_name: String,
    pub text: String,
}

/// Outcome of one summarization run.
#[derive(Debug, Serialize)]
pub struct SummaryJob {
    pub job_id: String,
    pub combined: String,
    pub directory: PathBuf,
    pub chapter_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieQuery {
    pub title: String,
    pub year: i32,
}

/// One row of a title search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieHit {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub country: Option<String>,
    pub synopsis: Option<String>,
    pub plots: Vec<String>,
    pub rating: Option<f32>,
    pub genres: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub title: String,
    pub year: i32,
    #[serde(default)]
    pub preferences: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub success: bool,
    pub movie: MovieRecord,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub year_range: Option<(i32, i32)>,
}
