//! The skip-if-cached, remove-if-corrupt, fetch-once rules shared by both platforms.

use std::fs::{metadata, remove_file};
use std::io;
use std::path::Path;

use crate::io::skip_log::SkipSink;
use crate::sender::FetchError;

/// Minimum size of a downloaded image or attachment.
pub(crate) const MIN_FILE_SIZE: u64 = 10 * 1024;

/// Minimum size of a generated `post.txt`.
pub(crate) const MIN_TEXT_SIZE: u64 = 512;

/// What happened to one unit of work (a post, or a post and all of its attachments).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DownloadOutcome {
    New,
    Cached,
    Corrupted,
    Failed,
    SkippedNoSource,
}

/// Running count of outcomes for one download pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) new: usize,
    pub(crate) cached: usize,
    pub(crate) skipped: usize,
    pub(crate) corrupted: usize,
    pub(crate) failed: usize,
}

impl Tally {
    pub(crate) fn add(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::New => self.new += 1,
            DownloadOutcome::Cached => self.cached += 1,
            DownloadOutcome::SkippedNoSource => self.skipped += 1,
            DownloadOutcome::Corrupted => self.corrupted += 1,
            DownloadOutcome::Failed => self.failed += 1,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.new + self.cached + self.skipped + self.corrupted + self.failed
    }

    /// Whether anything was written to the skip log during the pass.
    pub(crate) fn has_complaints(&self) -> bool {
        self.skipped + self.corrupted + self.failed > 0
    }
}

/// Posts gathered by a paginated fetch.
#[derive(Debug)]
pub(crate) struct Grabbed<T> {
    pub(crate) posts: Vec<T>,
    /// Set when a request failed and the listing stopped early.
    pub(crate) interrupted: bool,
}

impl<T> Default for Grabbed<T> {
    fn default() -> Self {
        Self {
            posts: Vec::new(),
            interrupted: false,
        }
    }
}

/// One file the engine is asked to make present and valid.
pub(crate) struct FileJob<'a> {
    /// Post the file belongs to, used for skip log lines.
    pub(crate) post_id: &'a str,
    /// Short name used in skip reasons, e.g. `file` or an attachment name.
    pub(crate) label: &'a str,
    pub(crate) dest: &'a Path,
    pub(crate) min_size: u64,
}

impl FileJob<'_> {
    fn too_small_reason(&self) -> String {
        if self.min_size == MIN_TEXT_SIZE {
            format!("{} too small (<{})", self.label, human_size(self.min_size))
        } else {
            format!("{} corrupted (<{})", self.label, human_size(self.min_size))
        }
    }
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{bytes}B")
    }
}

/// Size of `path`, or `None` when nothing is there.
fn existing_size(path: &Path) -> io::Result<Option<u64>> {
    match metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Makes sure `job.dest` is either absent or at least `job.min_size` bytes.
///
/// A valid existing file is `Cached` with no fetch. An undersized one is removed and fetched
/// once more. A fresh fetch that comes back undersized is removed and reported `Corrupted`;
/// a fetch that errors is `Failed`, except when it was repairing an undersized file, which
/// counts as `Corrupted`. Every non-success is written to `sink`.
///
/// Only local I/O around the fetch (metadata, removal, the skip log) can return `Err`.
pub(crate) fn fetch_with_policy<F>(
    job: &FileJob<'_>,
    sink: &mut dyn SkipSink,
    fetch: F,
) -> io::Result<DownloadOutcome>
where
    F: FnOnce(&Path) -> Result<(), FetchError>,
{
    let repairing = match existing_size(job.dest)? {
        Some(size) if size >= job.min_size => {
            trace!("{} already present ({size} bytes)", job.dest.display());
            return Ok(DownloadOutcome::Cached);
        }
        Some(size) => {
            debug!(
                "{} is only {size} bytes, removing and fetching again",
                job.dest.display()
            );
            remove_file(job.dest)?;
            true
        }
        None => false,
    };

    if let Err(err) = fetch(job.dest) {
        warn!("Post {}: {} failed: {err}", job.post_id, job.label);
        remove_if_present(job.dest)?;
        sink.record(job.post_id, &format!("{} download error ({err})", job.label))?;
        if repairing {
            sink.record(job.post_id, &job.too_small_reason())?;
            return Ok(DownloadOutcome::Corrupted);
        }
        return Ok(DownloadOutcome::Failed);
    }

    match existing_size(job.dest)? {
        Some(size) if size >= job.min_size => Ok(DownloadOutcome::New),
        _ => {
            warn!("Post {}: {} came back under {} bytes", job.post_id, job.label, job.min_size);
            remove_if_present(job.dest)?;
            sink.record(job.post_id, &job.too_small_reason())?;
            Ok(DownloadOutcome::Corrupted)
        }
    }
}
