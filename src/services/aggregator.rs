use crate::models::Summary;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const COMBINED_FILE_NAME: &str = "combined_summary.txt";

/// Joins summaries as `<chapter>:\n<summary>` blocks separated by a blank line.
pub fn combine_summaries(summaries: &[Summary]) -> String {
    summaries
        .iter()
        .map(|s| format!("{}:\n{}", s.chapter_name, s.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn write_combined(dir: &Path, combined: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(COMBINED_FILE_NAME);
    std::fs::write(&path, combined)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Location of a job's combined summary. Only well-formed job ids resolve,
/// so a request can never escape `output_dir`.
pub fn combined_path(output_dir: &Path, job_id: &str) -> Option<PathBuf> {
    let id = Uuid::parse_str(job_id).ok()?;
    Some(
        output_dir
            .join(id.hyphenated().to_string())
            .join(COMBINED_FILE_NAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, text: &str) -> Summary {
        Summary {
            chapter_name: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn blocks_keep_input_order() {
        let combined = combine_summaries(&[
            summary("Chapter 1", "first"),
            summary("Chapter 2", "second"),
            summary("Chapter 3", "third"),
        ]);
        assert_eq!(
            combined,
            "Chapter 1:\nfirst\n\nChapter 2:\nsecond\n\nChapter 3:\nthird"
        );
    }

    #[test]
    fn nothing_to_combine() {
        assert_eq!(combine_summaries(&[]), "");
    }

    #[test]
    fn combined_file_round_trips_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let text = "Capítulo 1:\nrésumé — 要約";
        let path = write_combined(&dir.path().join("job"), text).unwrap();
        assert!(path.ends_with(COMBINED_FILE_NAME));
        assert_eq!(std::fs::read_to_string(path).unwrap(), text);
    }

    #[test]
    fn only_uuids_resolve_to_paths() {
        let root = Path::new("/srv/out");
        assert!(combined_path(root, "../../etc/passwd").is_none());

        let id = Uuid::new_v4().to_string();
        let path = combined_path(root, &id).unwrap();
        assert_eq!(path, root.join(&id).join(COMBINED_FILE_NAME));
    }
}
