use std::sync::Arc;

use crate::broadcast::{RunProgressBroadcaster, RunProgressEvent};

use super::RunReport;

/// Events emitted by the orchestrator during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        job_id: String,
        file_name: String,
        processed: usize,
        total: usize,
        chunk_count: usize,
    },
    ChunkMerged {
        job_id: String,
        file_name: String,
        /// 1-based.
        chunk: usize,
        chunk_count: usize,
        processed: usize,
        total: usize,
        tokens_used: u64,
    },
    Settled {
        file_name: String,
        report: RunReport,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and headless use.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges orchestrator events to a [`RunProgressBroadcaster`].
pub struct BroadcastProgress {
    broadcaster: RunProgressBroadcaster,
}

impl BroadcastProgress {
    pub fn new(broadcaster: RunProgressBroadcaster) -> Arc<Self> {
        Arc::new(Self { broadcaster })
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let event = match event {
            ProgressEvent::Started {
                job_id,
                file_name,
                processed,
                total,
                chunk_count,
            } => RunProgressEvent::started(&job_id, &file_name, processed, total, chunk_count),
            ProgressEvent::ChunkMerged {
                job_id,
                file_name,
                chunk,
                chunk_count,
                processed,
                total,
                tokens_used,
            } => RunProgressEvent::chunk_merged(
                &job_id,
                &file_name,
                chunk,
                chunk_count,
                processed,
                total,
                tokens_used,
            ),
            ProgressEvent::Settled { file_name, report } => {
                RunProgressEvent::settled(&file_name, &report)
            }
        };
        self.broadcaster.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RunPhase;

    #[test]
    fn test_broadcast_progress_forwards_events() {
        let broadcaster = RunProgressBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let reporter = BroadcastProgress::new(broadcaster);

        reporter.report(ProgressEvent::Started {
            job_id: "j".into(),
            file_name: "a.csv".into(),
            processed: 0,
            total: 20,
            chunk_count: 2,
        });
        reporter.report(ProgressEvent::ChunkMerged {
            job_id: "j".into(),
            file_name: "a.csv".into(),
            chunk: 1,
            chunk_count: 2,
            processed: 15,
            total: 20,
            tokens_used: 100,
        });

        assert_eq!(rx.try_recv().unwrap().phase, RunPhase::Started);
        let merged = rx.try_recv().unwrap();
        assert_eq!(merged.chunk, Some(1));
        assert_eq!(merged.processed, 15);
    }
}
