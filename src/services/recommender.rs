use crate::models::MovieRecord;
use crate::services::llm::Completion;
use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_CONTENT_RESTRICTIONS: &str =
    "No explicit sexual content, graphic violence or hateful material.";

const SYNOPSIS_TEMPLATE: &str = "You are a film expert who recommends movies.
A viewer enjoyed the movie \"{title}\".
Synopsis: {storyline}
Rating: {rating}
Genres: {genres}
Content restrictions: {content_restrictions}

Recommend five movies with a similar story, tone and genre. For each, give the title, the release year and one sentence on why it fits.";

const PLOT_TEMPLATE: &str = "You are a film expert who recommends movies.
A viewer enjoyed the movie \"{title}\".
Plot: {storyline}
Rating: {rating}
Genres: {genres}
Content restrictions: {content_restrictions}

Recommend five movies with a similar plot, tone and genre. For each, give the title, the release year and one sentence on why it fits.";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid placeholder regex"));

static YEAR_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*(?:-|–|to)\s*(\d{4})").expect("valid year range regex"));

/// Best-effort reading of the free-text preferences box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    /// Lowercased copy of what the user typed.
    pub text: String,
    pub liked: bool,
    pub content_restrictions: bool,
    pub mentions_year_range: bool,
    pub year_range: Option<(i32, i32)>,
}

impl Preferences {
    pub fn parse(raw: &str) -> Self {
        let text = raw.to_lowercase();
        let mentions_year_range = text.contains("year range");
        let year_range = if mentions_year_range {
            YEAR_RANGE.captures(&text).and_then(|caps| {
                let from = caps[1].parse().ok()?;
                let to = caps[2].parse().ok()?;
                Some((from, to))
            })
        } else {
            None
        };

        Preferences {
            liked: text.contains("liked"),
            content_restrictions: text.contains("content restrictions"),
            mentions_year_range,
            year_range,
            text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Synopsis,
    Plot,
}

/// Values substituted into a recommendation template.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptFields {
    pub kind: TemplateKind,
    pub title: String,
    pub storyline: String,
    pub rating: String,
    pub genres: String,
    pub content_restrictions: String,
}

impl PromptFields {
    pub fn new(movie: &MovieRecord, prefs: &Preferences) -> Self {
        let (kind, official) = match &movie.synopsis {
            Some(synopsis) => (TemplateKind::Synopsis, synopsis.clone()),
            None => (
                TemplateKind::Plot,
                movie.plots.first().cloned().unwrap_or_default(),
            ),
        };

        let storyline = if prefs.liked { prefs.text.clone() } else { official };
        let content_restrictions = if prefs.content_restrictions {
            prefs.text.clone()
        } else {
            DEFAULT_CONTENT_RESTRICTIONS.to_string()
        };

        PromptFields {
            kind,
            title: movie.title.clone(),
            storyline,
            rating: movie
                .rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unrated".to_string()),
            genres: movie
                .genres
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            content_restrictions,
        }
    }

    pub fn render(&self) -> String {
        let template = match self.kind {
            TemplateKind::Synopsis => SYNOPSIS_TEMPLATE,
            TemplateKind::Plot => PLOT_TEMPLATE,
        };
        // Single pass: substituted values are never scanned again
        PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures| match &caps[1] {
                "title" => self.title.clone(),
                "storyline" => self.storyline.clone(),
                "rating" => self.rating.clone(),
                "genres" => self.genres.clone(),
                "content_restrictions" => self.content_restrictions.clone(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

pub struct Recommendation {
    pub prompt: String,
    /// The model's answer, or the error message from the failed call.
    pub outcome: Result<String, String>,
}

/// Renders the prompt and asks the model once. Failures are caught and
/// reported as their message.
pub async fn recommend<L: Completion>(llm: &L, movie: &MovieRecord, prefs: &Preferences) -> Recommendation {
    let prompt = PromptFields::new(movie, prefs).render();
    let outcome = match llm.complete(&prompt).await {
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::warn!("recommendation request failed: {:#}", e);
            Err(format!("{:#}", e))
        }
    };
    Recommendation { prompt, outcome }
}
