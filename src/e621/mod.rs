use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use crate::download::{fetch_with_policy, DownloadOutcome, FileJob, Grabbed, Tally, MIN_FILE_SIZE};
use crate::e621::entries::PostEntry;
use crate::e621::grabber::Grabber;
use crate::e621::query::SearchConfig;
use crate::io::directory::DownloadLayout;
use crate::io::locale::Messages;
use crate::io::skip_log::{SkipLog, SkipSink};
use crate::io::Config;
use crate::sender::HttpClient;
use crate::tui::{download_bar, print_summary};

pub(crate) mod entries;
pub(crate) mod grabber;
pub(crate) mod query;

/// What a finished tag search left behind.
#[derive(Debug)]
pub(crate) struct SearchReport {
    pub(crate) query: String,
    pub(crate) folder: PathBuf,
    pub(crate) tally: Tally,
    pub(crate) interrupted: bool,
}

/// Runs tag searches against e621 and downloads their posts, one file per post.
pub(crate) struct E621WebConnector<'a> {
    /// Sender carrying the user's credentials.
    client: &'a dyn HttpClient,
    base_url: String,
    layout: DownloadLayout,
}

impl<'a> E621WebConnector<'a> {
    pub(crate) fn new(client: &'a dyn HttpClient, config: &Config) -> Self {
        Self {
            client,
            base_url: config.e621_base_url().to_string(),
            layout: DownloadLayout::new(config.download_directory()),
        }
    }

    /// Folder that a search for `query` downloads into.
    pub(crate) fn folder_for(&self, query: &str) -> PathBuf {
        self.layout.e621_folder(query)
    }

    /// Fetches every page of `search`, bounded by its page limit.
    pub(crate) fn grab(&self, search: &SearchConfig) -> Grabbed<PostEntry> {
        Grabber::new(self.client, &self.base_url).grab_posts(&search.query(), search.max_pages())
    }

    /// Applies the download policy to a single post's file.
    pub(crate) fn download_post(
        &self,
        post: &PostEntry,
        folder: &Path,
        sink: &mut dyn SkipSink,
    ) -> io::Result<DownloadOutcome> {
        let post_id = post.id.to_string();
        let Some(url) = post.file.url.as_deref() else {
            debug!("Post {post_id} has no file url");
            sink.record(&post_id, "missing url")?;
            return Ok(DownloadOutcome::SkippedNoSource);
        };

        let dest = folder.join(post.file_name());
        let job = FileJob {
            post_id: &post_id,
            label: "file",
            dest: &dest,
            min_size: MIN_FILE_SIZE,
        };

        fetch_with_policy(&job, sink, |path| {
            self.client.download(url, path).map(|_| ())
        })
    }

    /// Downloads every post in order and counts the outcomes.
    pub(crate) fn download_posts(
        &self,
        posts: &[PostEntry],
        folder: &Path,
        sink: &mut dyn SkipSink,
        progress: &ProgressBar,
    ) -> io::Result<Tally> {
        let mut tally = Tally::default();
        for post in posts {
            progress.set_message(post.file_name());
            tally.add(self.download_post(post, folder, sink)?);
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(tally)
    }

    /// Search, fetch every page, download everything, and print the summary.
    pub(crate) fn run(&self, search: &SearchConfig, messages: &Messages) -> Result<SearchReport> {
        let query = search.query();
        let folder = self.folder_for(&query);
        create_dir_all(&folder)
            .with_context(|| format!("Failed to create download folder {}", folder.display()))?;
        let mut skip_log = SkipLog::in_folder(&folder);

        println!("\n{} {query}", messages.get("query"));
        println!("{}", messages.get("fetching"));
        let grabbed = self.grab(search);
        if grabbed.interrupted {
            println!("{}", messages.get("partial_result"));
        }
        println!("{} {}\n", messages.get("found_posts"), grabbed.posts.len());

        let progress = download_bar(grabbed.posts.len(), messages.get("downloading"));
        let tally = self
            .download_posts(&grabbed.posts, &folder, &mut skip_log, &progress)
            .with_context(|| format!("Download into {} stopped", folder.display()))?;

        info!(
            "Finished \"{query}\": {} new, {} cached, {} skipped, {} corrupted, {} failed",
            tally.new, tally.cached, tally.skipped, tally.corrupted, tally.failed
        );
        print_summary(messages, &tally, skip_log.path());

        Ok(SearchReport {
            query,
            folder,
            tally,
            interrupted: grabbed.interrupted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::skip_log::MemorySkipLog;
    use crate::sender::fake::{FakeClient, Reply};
    use std::fs::{metadata, read_dir, write};
    use tempfile::tempdir;

    fn post(id: i64, url: Option<&str>) -> PostEntry {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "file": { "url": url, "ext": "png" }
        }))
        .unwrap()
    }

    fn connector(client: &FakeClient) -> E621WebConnector<'_> {
        E621WebConnector::new(client, &Config::default())
    }

    #[test]
    fn folder_comes_from_query() {
        let client = FakeClient::new();
        assert_eq!(
            connector(&client).folder_for("fox -cub rating:s"),
            Path::new("downloads/e621/fox_notcub_ratings")
        );
    }

    #[test]
    fn post_without_url_is_skipped_not_failed() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new();
        let mut log = MemorySkipLog::default();

        let outcome = connector(&client)
            .download_post(&post(5, None), dir.path(), &mut log)
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::SkippedNoSource);
        assert_eq!(log.lines, vec!["[5] Skipped: missing url"]);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn second_pass_downloads_nothing_new() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new()
            .reply("https://static/1.png", Reply::Bytes(20 * 1024))
            .reply("https://static/2.png", Reply::Bytes(30 * 1024))
            .reply("https://static/3.png", Reply::Bytes(64));
        let posts = vec![
            post(1, Some("https://static/1.png")),
            post(2, Some("https://static/2.png")),
            post(3, Some("https://static/3.png")),
            post(4, Some("https://static/missing.png")),
        ];
        let e621 = connector(&client);
        let mut log = MemorySkipLog::default();

        let first = e621
            .download_posts(&posts, dir.path(), &mut log, &ProgressBar::hidden())
            .unwrap();
        let files_after_first: Vec<_> = read_dir(dir.path()).unwrap().collect();
        let second = e621
            .download_posts(&posts, dir.path(), &mut log, &ProgressBar::hidden())
            .unwrap();

        assert_eq!((first.new, first.corrupted, first.failed), (2, 1, 1));
        assert_eq!((second.new, second.cached), (0, 2));
        assert_eq!(read_dir(dir.path()).unwrap().count(), files_after_first.len());
    }

    #[test]
    fn no_undersized_file_survives_a_pass() {
        let dir = tempdir().unwrap();
        write(dir.path().join("8.png"), b"truncated").unwrap();
        let client = FakeClient::new()
            .reply("https://static/8.png", Reply::Status(500))
            .reply("https://static/9.png", Reply::Bytes(100));
        let posts = vec![
            post(8, Some("https://static/8.png")),
            post(9, Some("https://static/9.png")),
        ];
        let mut log = MemorySkipLog::default();

        let tally = connector(&client)
            .download_posts(&posts, dir.path(), &mut log, &ProgressBar::hidden())
            .unwrap();

        assert_eq!(tally.corrupted, 2);
        for entry in read_dir(dir.path()).unwrap() {
            assert!(metadata(entry.unwrap().path()).unwrap().len() >= MIN_FILE_SIZE);
        }
    }
}
