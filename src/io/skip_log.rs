use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the per-folder skip log.
pub(crate) const SKIP_LOG_NAME: &str = "skipped.log";

/// Destination for "this post was not downloaded, and here is why" records.
pub(crate) trait SkipSink {
    fn record(&mut self, post_id: &str, reason: &str) -> io::Result<()>;
}

/// Append-only text log living in a download folder.
///
/// Lines are never deduplicated, so running the same search twice repeats every complaint.
#[derive(Debug, Clone)]
pub(crate) struct SkipLog {
    path: PathBuf,
}

impl SkipLog {
    /// Creates a log at `<folder>/skipped.log`. The file itself appears on the first record.
    pub(crate) fn in_folder(folder: &Path) -> Self {
        Self {
            path: folder.join(SKIP_LOG_NAME),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

pub(crate) fn format_line(post_id: &str, reason: &str) -> String {
    format!("[{post_id}] Skipped: {reason}")
}

impl SkipSink for SkipLog {
    fn record(&mut self, post_id: &str, reason: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", format_line(post_id, reason))?;
        debug!("{}", format_line(post_id, reason));
        Ok(())
    }
}

/// Keeps skip records in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemorySkipLog {
    pub(crate) lines: Vec<String>,
}

#[cfg(test)]
impl SkipSink for MemorySkipLog {
    fn record(&mut self, post_id: &str, reason: &str) -> io::Result<()> {
        self.lines.push(format_line(post_id, reason));
        Ok(())
    }
}
