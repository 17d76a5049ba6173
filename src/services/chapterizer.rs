use crate::error::AppError;
use crate::models::{Chapter, ChapterSpec};
use anyhow::Context;
use lopdf::Document;
use std::path::{Path, PathBuf};

/// Parses a PDF and returns the text of each page, in page order.
pub fn load_pages(pdf_bytes: &[u8]) -> Result<Vec<String>, AppError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| AppError::InvalidDocument(format!("failed to read PDF: {}", e)))?;

    let pages: Vec<String> = doc
        .get_pages()
        .keys()
        .map(|&page_num| {
            doc.extract_text(&[page_num]).unwrap_or_else(|e| {
                tracing::warn!("no text extracted from page {}: {}", page_num, e);
                String::new()
            })
        })
        .collect();

    tracing::info!("Loaded {} pages from PDF", pages.len());
    Ok(pages)
}

/// Slices page texts into chapters. Each chapter is the in-order
/// concatenation of pages `start_page..=end_page` (1-based).
///
/// Ranges are not checked up front; the first page outside the document
/// aborts the whole extraction.
pub fn slice_chapters(pages: &[String], specs: &[ChapterSpec]) -> Result<Vec<Chapter>, AppError> {
    specs
        .iter()
        .map(|spec| -> Result<Chapter, AppError> {
            let mut text = String::new();
            for page in spec.start_page..=spec.end_page {
                let page_text = page
                    .checked_sub(1)
                    .and_then(|idx| pages.get(idx))
                    .ok_or(AppError::PageOutOfRange {
                        page,
                        page_count: pages.len(),
                    })?;
                text.push_str(page_text);
            }
            Ok(Chapter {
                name: spec.name.clone(),
                page_range: (spec.start_page, spec.end_page),
                text,
            })
        })
        .collect()
}

/// Writes each chapter's raw text to `<dir>/<name>.txt`.
pub fn write_chapter_files(dir: &Path, chapters: &[Chapter]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    chapters
        .iter()
        .map(|chapter| -> anyhow::Result<PathBuf> {
            let path = dir.join(format!("{}.txt", file_stem(&chapter.name)));
            std::fs::write(&path, &chapter.text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim().trim_start_matches('.').to_string();
    if stem.is_empty() {
        "chapter".to_string()
    } else {
        stem
    }
}
