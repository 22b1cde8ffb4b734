pub mod labeling; // Per-report normalize → prompt → model → validate → override
pub mod batch; // Chunked input/output with checkpoints
