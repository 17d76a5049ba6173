use crate::config::RetrievalConfig;
use crate::error::AppError;
use crate::models::{Chapter, ChapterSpec, Summary, SummaryJob};
use crate::services::aggregator;
use crate::services::chapterizer;
use crate::services::embedding::Embedder;
use crate::services::index::ChapterIndex;
use crate::services::llm::Completion;
use std::path::Path;

pub const RETRIEVAL_QUERY: &str = "Extract key concepts and rules with examples";

const SUMMARY_TEMPLATE: &str = "
You are a skilled book summarizer. Your task is to:
1. Extract key concepts and rules mentioned in the book.
2. Explain each concept with clear examples.

Write in plain language, suitable for a general audience, and focus on presenting the chapter's essence in a concise and clear manner.
<Context>
{context}
</Context>
";

pub fn render_summary_prompt(context: &str) -> String {
    SUMMARY_TEMPLATE.replace("{context}", context)
}

pub struct Summarizer<'a, E, L> {
    pub embedder: &'a E,
    pub llm: &'a L,
    pub retrieval: &'a RetrievalConfig,
}

impl<E: Embedder, L: Completion> Summarizer<'_, E, L> {
    /// Full run: extract chapters, summarize each in order, write the
    /// combined file into a fresh job directory under `output_dir`.
    ///
    /// Any failure aborts the run; no partial combined file is written.
    pub async fn process_pdf(
        &self,
        pdf_bytes: Vec<u8>,
        specs: &[ChapterSpec],
        output_dir: &Path,
    ) -> Result<SummaryJob, AppError> {
        // PDF parsing is CPU-bound; keep it off the async workers
        let pages = tokio::task::spawn_blocking(move || chapterizer::load_pages(&pdf_bytes))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;
        self.process_pages(&pages, specs, output_dir).await
    }

    pub async fn process_pages(
        &self,
        pages: &[String],
        specs: &[ChapterSpec],
        output_dir: &Path,
    ) -> Result<SummaryJob, AppError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let directory = output_dir.join(&job_id);

        let chapters = chapterizer::slice_chapters(pages, specs)?;
        chapterizer::write_chapter_files(&directory, &chapters).map_err(AppError::Internal)?;

        let mut summaries = Vec::with_capacity(chapters.len());
        for chapter in &chapters {
            tracing::info!("Processing {}...", chapter.name);
            summaries.push(self.summarize_chapter(chapter).await?);
        }

        let combined = aggregator::combine_summaries(&summaries);
        let path = aggregator::write_combined(&directory, &combined).map_err(AppError::Internal)?;
        tracing::info!(job_id = %job_id, path = %path.display(), "Summarization complete");

        Ok(SummaryJob {
            job_id,
            combined,
            directory,
            chapter_count: summaries.len(),
        })
    }

    pub async fn summarize_chapter(&self, chapter: &Chapter) -> Result<Summary, AppError> {
        let index = ChapterIndex::build(&chapter.text, self.retrieval, self.embedder)
            .await
            .map_err(AppError::Upstream)?;
        let passages = index
            .search(RETRIEVAL_QUERY, self.retrieval.top_k, self.embedder)
            .await
            .map_err(AppError::Upstream)?;

        tracing::debug!(
            chapter = %chapter.name,
            indexed = index.len(),
            retrieved = passages.len(),
            "retrieved chapter context"
        );

        let prompt = render_summary_prompt(&passages.join(" "));
        let text = self
            .llm
            .complete(&prompt)
            .await
            .map_err(AppError::Upstream)?;

        Ok(Summary {
            chapter_name: chapter.name.clone(),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::Mutex;

    struct ConstantEmbedder;

    impl Embedder for ConstantEmbedder {
        async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Echoes the context block back and records every prompt.
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
        fail_on_call: Option<usize>,
    }

    impl RecordingLlm {
        fn new() -> Self {
            RecordingLlm {
                prompts: Mutex::new(Vec::new()),
                fail_on_call: None,
            }
        }
    }

    impl Completion for RecordingLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            if self.fail_on_call == Some(prompts.len()) {
                anyhow::bail!("rate limited");
            }
            let context = prompt
                .split("<Context>\n")
                .nth(1)
                .and_then(|rest| rest.split("\n</Context>").next())
                .unwrap_or_default();
            Ok(format!("summary of {}", context))
        }
    }

    fn chapter(name: &str, text: &str) -> Chapter {
        Chapter {
            name: name.to_string(),
            page_range: (1, 1),
            text: text.to_string(),
        }
    }

    #[test]
    fn template_wraps_context() {
        let prompt = render_summary_prompt("the text");
        assert!(prompt.contains("You are a skilled book summarizer."));
        assert!(prompt.contains("<Context>\nthe text\n</Context>"));
    }

    #[tokio::test]
    async fn whole_chapter_reaches_the_model() {
        let retrieval = RetrievalConfig::default();
        let llm = RecordingLlm::new();
        let summarizer = Summarizer {
            embedder: &ConstantEmbedder,
            llm: &llm,
            retrieval: &retrieval,
        };

        let summary = summarizer
            .summarize_chapter(&chapter("Chapter 1", "Rule one: be kind."))
            .await
            .unwrap();

        assert_eq!(summary.chapter_name, "Chapter 1");
        assert_eq!(summary.text, "summary of Rule one: be kind.");
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chunked_passages_are_joined_with_spaces() {
        let retrieval = RetrievalConfig {
            chunk_size: Some(2),
            chunk_overlap: 0,
            top_k: 4,
        };
        let llm = RecordingLlm::new();
        let summarizer = Summarizer {
            embedder: &ConstantEmbedder,
            llm: &llm,
            retrieval: &retrieval,
        };

        let summary = summarizer
            .summarize_chapter(&chapter("Chapter 1", "a b c d e"))
            .await
            .unwrap();
        // equal scores keep passage order
        assert_eq!(summary.text, "summary of a b c d e");
    }

    #[tokio::test]
    async fn model_failure_is_an_upstream_error() {
        let retrieval = RetrievalConfig::default();
        let llm = RecordingLlm {
            prompts: Mutex::new(Vec::new()),
            fail_on_call: Some(1),
        };
        let summarizer = Summarizer {
            embedder: &ConstantEmbedder,
            llm: &llm,
            retrieval: &retrieval,
        };

        let err = summarizer
            .summarize_chapter(&chapter("Chapter 1", "text"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn three_chapter_job_writes_ordered_blocks() {
        let retrieval = RetrievalConfig::default();
        let llm = RecordingLlm::new();
        let summarizer = Summarizer {
            embedder: &ConstantEmbedder,
            llm: &llm,
            retrieval: &retrieval,
        };
        let out = tempfile::tempdir().unwrap();
        let pages: Vec<String> = (1..=6).map(|i| format!("p{} ", i)).collect();
        let specs = vec![
            ChapterSpec::numbered(1, 1, 2),
            ChapterSpec::numbered(2, 3, 4),
            ChapterSpec::numbered(3, 5, 6),
        ];

        let job = summarizer
            .process_pages(&pages, &specs, out.path())
            .await
            .unwrap();

        assert_eq!(job.chapter_count, 3);
        assert_eq!(job.directory, out.path().join(&job.job_id));
        assert_eq!(
            job.combined,
            "Chapter 1:\nsummary of p1 p2 \n\nChapter 2:\nsummary of p3 p4 \n\nChapter 3:\nsummary of p5 p6 "
        );

        let on_disk = std::fs::read_to_string(job.directory.join(aggregator::COMBINED_FILE_NAME)).unwrap();
        assert_eq!(on_disk, job.combined);
        assert_eq!(
            std::fs::read_to_string(job.directory.join("Chapter 2.txt")).unwrap(),
            "p3 p4 "
        );
    }

    #[tokio::test]
    async fn failure_midway_writes_no_combined_file() {
        let retrieval = RetrievalConfig::default();
        let llm = RecordingLlm {
            prompts: Mutex::new(Vec::new()),
            fail_on_call: Some(2),
        };
        let summarizer = Summarizer {
            embedder: &ConstantEmbedder,
            llm: &llm,
            retrieval: &retrieval,
        };
        let out = tempfile::tempdir().unwrap();
        let pages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let specs = vec![
            ChapterSpec::numbered(1, 1, 1),
            ChapterSpec::numbered(2, 2, 2),
            ChapterSpec::numbered(3, 3, 3),
        ];

        let err = summarizer
            .process_pages(&pages, &specs, out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert_eq!(llm.prompts.lock().unwrap().len(), 2);

        let job_dirs: Vec<_> = std::fs::read_dir(out.path()).unwrap().collect();
        assert_eq!(job_dirs.len(), 1);
        let job_dir = job_dirs[0].as_ref().unwrap().path();
        assert!(!job_dir.join(aggregator::COMBINED_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn out_of_range_page_aborts_before_any_model_call() {
        let retrieval = RetrievalConfig::default();
        let llm = RecordingLlm::new();
        let summarizer = Summarizer {
            embedder: &ConstantEmbedder,
            llm: &llm,
            retrieval: &retrieval,
        };
        let out = tempfile::tempdir().unwrap();
        let pages = vec!["only page".to_string()];

        let err = summarizer
            .process_pages(&pages, &[ChapterSpec::numbered(1, 1, 2)], out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PageOutOfRange { page: 2, page_count: 1 }));
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_pdf_never_calls_the_model() {
        let retrieval = RetrievalConfig::default();
        let llm = RecordingLlm::new();
        let summarizer = Summarizer {
            embedder: &ConstantEmbedder,
            llm: &llm,
            retrieval: &retrieval,
        };
        let out = tempfile::tempdir().unwrap();

        let err = summarizer
            .process_pdf(b"%PDF-garbage".to_vec(), &[ChapterSpec::numbered(1, 1, 1)], out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidDocument(_)));
        assert!(llm.prompts.lock().unwrap().is_empty());
    }
}
