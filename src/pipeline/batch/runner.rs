use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use super::progress::ProgressTracker;
use super::reader::Report;
use super::writer::{write_checkpoint, OutputLayout};
use super::BatchError;
use crate::pipeline::labeling::{LabelSource, LabeledReport, ReportLabeler};

/// Batch-level settings.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub output_path: PathBuf,
    pub layout: OutputLayout,
    /// Rows per checkpoint. Must be at least 1.
    pub chunk_size: usize,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows labeled in this run.
    pub labeled: usize,
    /// Rows carried over from an earlier output.
    pub carried_over: usize,
    /// Rows skipped because their id was already labeled.
    pub skipped: usize,
    pub fallbacks: usize,
    pub overrides: usize,
    pub need_check: usize,
    pub checkpoints: usize,
    pub elapsed: Duration,
}

/// Drives a `ReportLabeler` over the input, chunk by chunk, rewriting the
/// full accumulated result set after every chunk.
pub struct BatchRunner<'a> {
    labeler: &'a ReportLabeler,
    config: BatchConfig,
}

impl<'a> BatchRunner<'a> {
    pub fn new(labeler: &'a ReportLabeler, config: BatchConfig) -> Self {
        Self { labeler, config }
    }

    /// Label `reports`. `previous` holds rows from an earlier run (resume);
    /// reports whose id is already among them are skipped, and the previous
    /// rows are kept at the head of every checkpoint.
    pub fn run(&self, reports: &[Report], previous: Vec<LabeledReport>) -> Result<RunSummary, BatchError> {
        let chunk_size = self.config.chunk_size.max(1);
        let done: HashSet<&str> = previous.iter().map(|r| r.id.as_str()).collect();
        let pending: Vec<&Report> = reports
            .iter()
            .filter(|r| !done.contains(r.id.as_str()))
            .collect();

        let mut summary = RunSummary {
            carried_over: previous.len(),
            skipped: reports.len() - pending.len(),
            ..Default::default()
        };
        drop(done);

        let mut results = previous;
        let mut tracker = ProgressTracker::new(pending.len(), chunk_size);

        tracing::info!(
            total = reports.len(),
            pending = pending.len(),
            skipped = summary.skipped,
            chunk_size,
            chunks = tracker.total_chunks(),
            model = %self.labeler.model_name(),
            "Starting batch labeling"
        );

        for (idx, chunk) in pending.chunks(chunk_size).enumerate() {
            tracing::info!(
                chunk = idx + 1,
                chunks = tracker.total_chunks(),
                rows = chunk.len(),
                "Processing chunk"
            );

            for report in chunk {
                let labeled = self.labeler.label(&report.id, report.text.as_deref());
                tally(&mut summary, &labeled);
                results.push(labeled);
            }

            write_checkpoint(&self.config.output_path, &self.config.layout, &results)?;
            summary.checkpoints += 1;

            let progress = tracker.chunk_done(chunk.len());
            tracing::info!(
                output = %self.config.output_path.display(),
                saved_rows = results.len(),
                percent = %format!("{:.1}", progress.percent),
                eta_min = %format!("{:.1}", progress.remaining.as_secs_f64() / 60.0),
                eta_at = %progress.estimated_finish().format("%H:%M:%S"),
                "Checkpoint saved"
            );
        }

        summary.elapsed = tracker.elapsed();
        tracing::info!(
            labeled = summary.labeled,
            fallbacks = summary.fallbacks,
            overrides = summary.overrides,
            need_check = summary.need_check,
            elapsed_secs = summary.elapsed.as_secs(),
            "Labeling complete"
        );
        Ok(summary)
    }
}

fn tally(summary: &mut RunSummary, labeled: &LabeledReport) {
    summary.labeled += 1;
    match labeled.source {
        Some(LabelSource::Fallback) => summary.fallbacks += 1,
        Some(LabelSource::Override(_)) => summary.overrides += 1,
        _ => {}
    }
    if labeled.classification.need_check {
        summary.need_check += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::labeling::{Classification, MockChatClient, RetryPolicy};

    const L45_ANSWER: &str = r#"{"L1/2":false,"L2/3":false,"L3/4":false,"L4/5":true,"L5/S1":false,"need_check":false}"#;

    fn labeler(client: MockChatClient) -> ReportLabeler {
        ReportLabeler::new(
            Box::new(client),
            "llama3",
            RetryPolicy {
                max_retries: 1,
                backoff: Duration::ZERO,
            },
        )
    }

    fn reports(n: usize) -> Vec<Report> {
        (0..n)
            .map(|i| Report {
                id: format!("P{i}"),
                text: Some(format!("L4/5 moderate stenosis, case {i}.")),
            })
            .collect()
    }

    fn config(dir: &tempfile::TempDir, chunk_size: usize) -> BatchConfig {
        BatchConfig {
            output_path: dir.path().join("out.csv"),
            layout: OutputLayout {
                id_column: "id".into(),
                include_source: true,
            },
            chunk_size,
        }
    }

    #[test]
    fn writes_one_checkpoint_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let labeler = labeler(MockChatClient::new(L45_ANSWER));
        let runner = BatchRunner::new(&labeler, config(&dir, 2));
        let summary = runner.run(&reports(5), Vec::new()).unwrap();

        assert_eq!(summary.labeled, 5);
        assert_eq!(summary.checkpoints, 3);
        let text = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn resume_skips_labeled_ids_and_keeps_their_rows() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockChatClient::new(L45_ANSWER);
        let labeler = labeler(client);
        let previous = vec![LabeledReport {
            id: "P0".into(),
            classification: Classification::SAFE_DEFAULT,
            source: None,
        }];
        let runner = BatchRunner::new(&labeler, config(&dir, 10));
        let summary = runner.run(&reports(3), previous).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.carried_over, 1);
        assert_eq!(summary.labeled, 2);
        let text = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("P0,false,false,false,false,false,true,"));
    }

    #[test]
    fn counts_fallbacks_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let labeler = labeler(MockChatClient::new("no json"));
        let input = vec![
            Report {
                id: "a".into(),
                text: Some("Severe L5/S1 stenosis.".into()),
            },
            Report {
                id: "b".into(),
                text: Some("Unremarkable.".into()),
            },
        ];
        let summary = BatchRunner::new(&labeler, config(&dir, 200))
            .run(&input, Vec::new())
            .unwrap();
        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.overrides, 1);
        assert_eq!(summary.need_check, 1);
    }

    #[test]
    fn nothing_pending_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let labeler = labeler(MockChatClient::new(L45_ANSWER));
        let summary = BatchRunner::new(&labeler, config(&dir, 5))
            .run(&[], Vec::new())
            .unwrap();
        assert_eq!(summary.checkpoints, 0);
        assert!(!dir.path().join("out.csv").exists());
    }
}
