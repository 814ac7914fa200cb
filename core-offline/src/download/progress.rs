//! Progress bookkeeping for a single transfer.

use core_runtime::events::DownloadProgress;

/// Turns byte counts into progress updates.
///
/// With a known total, updates are whole percentages emitted only when the
/// value changes, so the sequence is strictly increasing and never exceeds
/// 100. Without a total, every chunk yields the running byte count.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    received: u64,
    last_percent: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            received: 0,
            last_percent: None,
        }
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// Initial update, `0%` when the total is known.
    pub fn start(&mut self) -> Option<DownloadProgress> {
        self.total?;
        self.emit_percent(0)
    }

    /// Records `bytes` more and returns an update if one is due.
    pub fn advance(&mut self, bytes: u64) -> Option<DownloadProgress> {
        self.received = self.received.saturating_add(bytes);

        match self.total {
            Some(total) => {
                let percent = percent_of(self.received, total);
                self.emit_percent(percent)
            }
            None => Some(DownloadProgress::Indeterminate {
                bytes_downloaded: self.received,
            }),
        }
    }

    /// Final `100%` for a known total, if not already reported.
    pub fn finish(&mut self) -> Option<DownloadProgress> {
        self.total?;
        self.emit_percent(100)
    }

    fn emit_percent(&mut self, percent: u8) -> Option<DownloadProgress> {
        if self.last_percent.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(DownloadProgress::Percent { percent })
    }
}

fn percent_of(received: u64, total: u64) -> u8 {
    if total == 0 || received >= total {
        return 100;
    }
    ((received as u128 * 100) / total as u128) as u8
}
