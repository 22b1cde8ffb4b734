//! Per-chunk progress and ETA.
//!
//! The estimate is the running average of elapsed time per completed chunk,
//! multiplied by the chunks still to go. Advisory only.

use std::time::{Duration, Instant};

/// Snapshot reported after a chunk completes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// 1-based index of the chunk just completed.
    pub chunk: usize,
    pub total_chunks: usize,
    pub processed_rows: usize,
    pub total_rows: usize,
    pub percent: f64,
    pub remaining: Duration,
}

impl ProgressSnapshot {
    /// Wall-clock time the run is expected to finish, in local time.
    pub fn estimated_finish(&self) -> chrono::DateTime<chrono::Local> {
        let remaining = chrono::Duration::from_std(self.remaining).unwrap_or(chrono::Duration::zero());
        chrono::Local::now() + remaining
    }
}

pub struct ProgressTracker {
    total_rows: usize,
    total_chunks: usize,
    processed_rows: usize,
    completed_chunks: usize,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total_rows: usize, chunk_size: usize) -> Self {
        Self {
            total_rows,
            total_chunks: chunk_count(total_rows, chunk_size),
            processed_rows: 0,
            completed_chunks: 0,
            started: Instant::now(),
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// Record a finished chunk of `rows` rows and report progress.
    pub fn chunk_done(&mut self, rows: usize) -> ProgressSnapshot {
        self.processed_rows += rows;
        self.completed_chunks += 1;
        snapshot(
            self.completed_chunks,
            self.total_chunks,
            self.processed_rows,
            self.total_rows,
            self.started.elapsed(),
        )
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Number of chunks needed to cover `total_rows`.
pub fn chunk_count(total_rows: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    total_rows.div_ceil(chunk_size)
}

/// Pure progress arithmetic, separated from the clock for testing.
pub fn snapshot(
    completed_chunks: usize,
    total_chunks: usize,
    processed_rows: usize,
    total_rows: usize,
    elapsed: Duration,
) -> ProgressSnapshot {
    let percent = if total_rows == 0 {
        100.0
    } else {
        processed_rows as f64 / total_rows as f64 * 100.0
    };

    let remaining_chunks = total_chunks.saturating_sub(completed_chunks);
    let remaining = if completed_chunks == 0 {
        Duration::ZERO
    } else {
        let per_chunk = elapsed.div_f64(completed_chunks as f64);
        per_chunk.mul_f64(remaining_chunks as f64)
    };

    ProgressSnapshot {
        chunk: completed_chunks,
        total_chunks,
        processed_rows,
        total_rows,
        percent,
        remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(chunk_count(0, 200), 0);
        assert_eq!(chunk_count(1, 200), 1);
        assert_eq!(chunk_count(200, 200), 1);
        assert_eq!(chunk_count(201, 200), 2);
        assert_eq!(chunk_count(5, 0), 0);
    }

    #[test]
    fn eta_uses_average_chunk_time() {
        let s = snapshot(2, 5, 400, 1000, Duration::from_secs(60));
        assert!((s.percent - 40.0).abs() < f64::EPSILON);
        assert_eq!(s.remaining, Duration::from_secs(90));
    }

    #[test]
    fn last_chunk_has_no_remaining_time() {
        let s = snapshot(3, 3, 450, 450, Duration::from_secs(30));
        assert_eq!(s.remaining, Duration::ZERO);
        assert!((s.percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tracker_accumulates_rows() {
        let mut tracker = ProgressTracker::new(5, 2);
        assert_eq!(tracker.total_chunks(), 3);
        tracker.chunk_done(2);
        tracker.chunk_done(2);
        let s = tracker.chunk_done(1);
        assert_eq!(s.chunk, 3);
        assert_eq!(s.processed_rows, 5);
        assert_eq!(s.remaining, Duration::ZERO);
    }

    #[test]
    fn estimated_finish_is_not_in_the_past() {
        let s = snapshot(1, 2, 1, 2, Duration::from_secs(10));
        assert!(s.estimated_finish() >= chrono::Local::now() - chrono::Duration::seconds(1));
    }
}
