//! Directory-level orchestration
//!
//! Runs the [`Pipeline`] over every matching file in a directory, writing to
//! `<output_dir>/<model>/<file name>`. A file whose output already exists is
//! skipped; since outputs are only ever renamed into place once complete, an
//! existing output is a finished one. A failing file is logged and recorded,
//! and the batch moves on to the next.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::embed::Embedder;
use crate::pipeline::{Pipeline, PipelineError};
use crate::{Error, Result};

/// Where to read from and write to, and which files to pick up.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// File extension to match, without the leading dot
    pub extension: String,
    /// Reprocess files whose output already exists
    pub overwrite: bool,
}

impl BatchConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            extension: "json".to_string(),
            overwrite: false,
        }
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = extension.as_ref().trim_start_matches('.').to_string();
        self
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files written, with their record counts
    pub processed: Vec<(PathBuf, usize)>,
    /// Files whose output already existed
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<PipelineError>,
    /// The run stopped early on a cancellation request
    pub cancelled: bool,
}

impl BatchReport {
    /// Total records written across all processed files.
    pub fn records(&self) -> usize {
        self.processed.iter().map(|(_, count)| count).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Lists files in `dir` (not recursively) with the given extension, sorted by name.
pub fn list_inputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Output location for `input`: `<output_dir>/<model>/<file name>`.
///
/// Only the last segment of a hub-style model name (`org/model`) is used.
pub fn output_path(output_dir: &Path, model_name: &str, input: &Path) -> Result<PathBuf> {
    let file_name = input.file_name().ok_or_else(|| {
        Error::InvalidInput(format!("input path {} has no file name", input.display()))
    })?;
    let model_dir = model_name.rsplit('/').next().unwrap_or(model_name);
    Ok(output_dir.join(model_dir).join(file_name))
}

/// Processes every matching file in `config.input_dir`.
///
/// Fails only if the input directory cannot be listed; per-file failures are
/// collected in [`BatchReport::failed`].
pub fn run_batch<E: Embedder + ?Sized>(
    pipeline: &Pipeline,
    config: &BatchConfig,
    embedder: &mut E,
) -> Result<BatchReport> {
    let inputs = list_inputs(&config.input_dir, &config.extension)?;
    info!(
        dir = %config.input_dir.display(),
        files = inputs.len(),
        model = embedder.model_name(),
        fields = %pipeline.spec(),
        "starting batch"
    );

    let mut report = BatchReport::default();
    for (index, input) in inputs.iter().enumerate() {
        if pipeline.cancel_token().is_cancelled() {
            report.cancelled = true;
            break;
        }

        let output = output_path(&config.output_dir, embedder.model_name(), input)?;
        if !config.overwrite && output.exists() {
            info!(input = %input.display(), output = %output.display(), "output exists, skipping");
            report.skipped.push(input.clone());
            continue;
        }

        info!(file = index + 1, of = inputs.len(), input = %input.display(), "processing");
        match pipeline.process_file(input, &output, embedder) {
            Ok(count) => report.processed.push((input.clone(), count)),
            Err(err) if matches!(err.source, Error::Cancelled) => {
                warn!(input = %input.display(), "cancelled");
                report.cancelled = true;
                break;
            }
            Err(err) => {
                warn!(error = %err, cause = %err.source, "file failed, continuing");
                report.failed.push(err);
            }
        }
    }

    info!(
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        records = report.records(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.JSON", "c.txt", "d.json.bak"] {
            fs::write(dir.path().join(name), "[]").unwrap();
        }
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let inputs = list_inputs(dir.path(), "json").unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json"]);
    }

    #[test]
    fn test_output_path_uses_model_leaf() {
        let path = output_path(
            Path::new("output"),
            "sentence-transformers/all-MiniLM-L6-v2",
            Path::new("/data/docs/part-1.json"),
        )
        .unwrap();
        assert_eq!(path, Path::new("output/all-MiniLM-L6-v2/part-1.json"));

        let path = output_path(Path::new("out"), "stub", Path::new("x.json")).unwrap();
        assert_eq!(path, Path::new("out/stub/x.json"));
    }

    #[test]
    fn test_output_path_requires_file_name() {
        assert!(matches!(
            output_path(Path::new("out"), "stub", Path::new("/")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_extension_normalised() {
        let config = BatchConfig::new("in", "out").with_extension(".jsonl");
        assert_eq!(config.extension, "jsonl");
        assert!(!config.overwrite);
    }

    #[test]
    fn test_report_totals() {
        let report = BatchReport {
            processed: vec![(PathBuf::from("a"), 2), (PathBuf::from("b"), 5)],
            ..BatchReport::default()
        };
        assert_eq!(report.records(), 7);
        assert!(report.is_success());
    }
}
