//! Per-file processing
//!
//! Drives parse -> accumulate -> enrich -> serialize in lockstep, one record
//! at a time. Output goes to a temporary file beside the destination and is
//! renamed into place only after the closing bracket is written, so a reader
//! never sees a half-written array.
//!
//! # Usage
//!
//! ```ignore
//! use docvec_lib::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new("contents".parse()?);
//! let count = pipeline.process_file(input, output, &mut embedder)?;
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use crate::embed::Embedder;
use crate::enrich::{Enricher, EnrichmentSpec};
use crate::json::{ArrayWriter, StreamParser};
use crate::record::RecordAccumulator;
use crate::{Error, Result};

/// Shared flag used to stop processing between records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A failure while processing one file.
#[derive(Debug, Error)]
#[error("failed to process {} after {records_written} records", .path.display())]
pub struct PipelineError {
    /// Input file being processed
    pub path: PathBuf,
    /// Records serialized before the failure; none of them were kept
    pub records_written: usize,
    #[source]
    pub source: Error,
}

/// The record transformation applied to every file of a run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    spec: EnrichmentSpec,
    cancel: CancelToken,
}

impl Pipeline {
    #[must_use]
    pub fn new(spec: EnrichmentSpec) -> Self {
        Self {
            spec,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally controlled cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn spec(&self) -> &EnrichmentSpec {
        &self.spec
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Transforms one document from `reader` into `writer`.
    ///
    /// Returns the number of records written. On error the writer holds an
    /// unterminated array and must be discarded.
    pub fn process_stream<R, W, E>(
        &self,
        reader: R,
        writer: W,
        embedder: &mut E,
    ) -> Result<usize>
    where
        R: Read,
        W: Write,
        E: Embedder + ?Sized,
    {
        let mut written = 0;
        self.drive(reader, writer, embedder, &mut written)?;
        Ok(written)
    }

    /// Transforms the document at `input` into a new document at `output`.
    ///
    /// Parent directories of `output` are created as needed. An existing
    /// `output` is replaced only when the whole document succeeds.
    pub fn process_file<E: Embedder + ?Sized>(
        &self,
        input: &Path,
        output: &Path,
        embedder: &mut E,
    ) -> std::result::Result<usize, PipelineError> {
        let started = Instant::now();
        info!(input = %input.display(), output = %output.display(), "processing file");

        let mut written = 0;
        match self.write_atomically(input, output, embedder, &mut written) {
            Ok(()) => {
                info!(
                    input = %input.display(),
                    records = written,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "file complete"
                );
                Ok(written)
            }
            Err(source) => Err(PipelineError {
                path: input.to_path_buf(),
                records_written: written,
                source,
            }),
        }
    }

    fn write_atomically<E: Embedder + ?Sized>(
        &self,
        input: &Path,
        output: &Path,
        embedder: &mut E,
        written: &mut usize,
    ) -> Result<()> {
        let reader = BufReader::new(File::open(input)?);

        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let partial = tempfile::Builder::new()
            .prefix(".docvec-")
            .suffix(".partial")
            .tempfile_in(dir)?;

        // dropping `partial` on any error path removes the temp file
        let mut sink = BufWriter::new(partial);
        self.drive(reader, &mut sink, embedder, written)?;
        let partial = sink.into_inner().map_err(|e| e.into_error())?;
        partial.as_file().sync_all()?;
        partial.persist(output).map_err(|e| e.error)?;
        Ok(())
    }

    fn drive<R, W, E>(
        &self,
        reader: R,
        writer: W,
        embedder: &mut E,
        written: &mut usize,
    ) -> Result<()>
    where
        R: Read,
        W: Write,
        E: Embedder + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut enricher = Enricher::new(&self.spec, embedder);
        let mut out = ArrayWriter::new(writer);

        out.open()?;
        let mut records = RecordAccumulator::new(|record| {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let record = enricher.enrich(record)?;
            out.write_record(&record)?;
            *written = out.written();
            debug!(record = *written, "record written");
            Ok(())
        });
        StreamParser::new(reader).parse(&mut records)?;
        out.close()?;
        Ok(())
    }
}

/// Transforms the document at `input` into `output` with a one-off pipeline.
pub fn process_file<E: Embedder + ?Sized>(
    input: &Path,
    output: &Path,
    spec: &EnrichmentSpec,
    embedder: &mut E,
) -> std::result::Result<usize, PipelineError> {
    Pipeline::new(spec.clone()).process_file(input, output, embedder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::StubEmbedder;
    use pretty_assertions::assert_eq;

    fn run(pipeline: &Pipeline, input: &str, embedder: &mut StubEmbedder) -> Result<String> {
        let mut out = Vec::new();
        pipeline.process_stream(input.as_bytes(), &mut out, embedder)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn contents() -> Pipeline {
        Pipeline::new("contents".parse().unwrap())
    }

    #[test]
    fn test_empty_array_gives_empty_array() {
        let mut embedder = StubEmbedder::new();
        assert_eq!(run(&contents(), "[]", &mut embedder).unwrap(), "[]");
        assert_eq!(embedder.calls, 0);
    }

    #[test]
    fn test_single_record() {
        let mut embedder = StubEmbedder::new();
        let out = run(&contents(), r#"[{"id":"1","contents":"hello"}]"#, &mut embedder).unwrap();

        assert_eq!(out, r#"[{"id":"1","contents":[5.0,532.0,104.0]}]"#);
    }

    #[test]
    fn test_counts_and_order() {
        let input = r#"[{"id":"a","contents":"x"},{"id":"b","contents":"y"},{"id":"c","contents":"z"}]"#;
        let mut out = Vec::new();
        let mut embedder = StubEmbedder::new();
        let count = contents()
            .process_stream(input.as_bytes(), &mut out, &mut embedder)
            .unwrap();

        assert_eq!(count, 3);
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let ids: Vec<&str> = parsed
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_literals_survive_untouched() {
        let mut embedder = StubEmbedder::new();
        let out = run(
            &contents(),
            r#"[{"contents":"a","rank":1.50,"big":12345678901234567890,"flag":true,"x":null}]"#,
            &mut embedder,
        )
        .unwrap();

        assert_eq!(
            out,
            r#"[{"contents":[1.0,97.0,97.0],"rank":1.50,"big":12345678901234567890,"flag":true,"x":null}]"#
        );
    }

    #[test]
    fn test_cancelled_before_first_record() {
        let cancel = CancelToken::new();
        let pipeline = contents().with_cancel(cancel.clone());
        cancel.cancel();

        let mut embedder = StubEmbedder::new();
        assert!(matches!(
            run(&pipeline, r#"[{"contents":"a"}]"#, &mut embedder),
            Err(Error::Cancelled)
        ));
        assert_eq!(embedder.calls, 0);
    }

    #[test]
    fn test_missing_field_aborts() {
        let mut embedder = StubEmbedder::new();
        assert!(matches!(
            run(&contents(), r#"[{"contents":"a"},{"id":"2"}]"#, &mut embedder),
            Err(Error::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn test_process_file_reports_path_and_progress() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out").join("in.json");
        fs::write(&input, r#"[{"contents":"a"},{"contents":"boom"}]"#).unwrap();

        let mut embedder = StubEmbedder::failing_on("boom");
        let err = contents()
            .process_file(&input, &output, &mut embedder)
            .unwrap_err();

        assert_eq!(err.path, input);
        assert_eq!(err.records_written, 1);
        assert!(matches!(err.source, Error::Enrichment { .. }));
        assert!(!output.exists());
        let leftovers: Vec<_> = fs::read_dir(output.parent().unwrap()).unwrap().collect();
        assert!(leftovers.is_empty(), "temporary file left behind");
    }

    #[test]
    fn test_failure_message_names_cause_once() {
        let err = PipelineError {
            path: PathBuf::from("docs/a.json"),
            records_written: 2,
            source: Error::Cancelled,
        };

        assert_eq!(err.to_string(), "failed to process docs/a.json after 2 records");
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_free_function_matches_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        fs::write(&input, r#"[{"id":"1","contents":"hello"}]"#).unwrap();

        let spec: EnrichmentSpec = "contents".parse().unwrap();
        let mut embedder = StubEmbedder::new();
        let count = process_file(&input, &output, &spec, &mut embedder).unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            r#"[{"id":"1","contents":[5.0,532.0,104.0]}]"#
        );
    }
}
