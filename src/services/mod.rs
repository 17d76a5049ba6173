pub mod aggregator;
pub mod chapterizer;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod movies;
pub mod recommender;
pub mod summarizer;
