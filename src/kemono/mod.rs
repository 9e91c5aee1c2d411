use std::fs::{create_dir_all, write};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use crate::download::{
    fetch_with_policy, DownloadOutcome, FileJob, Grabbed, Tally, MIN_FILE_SIZE, MIN_TEXT_SIZE,
};
use crate::io::directory::{sanitize_file_name, DownloadLayout};
use crate::io::locale::Messages;
use crate::io::skip_log::{SkipLog, SkipSink};
use crate::io::Config;
use crate::kemono::entries::{Attachment, KemonoPost};
use crate::kemono::grabber::Grabber;
use crate::sender::HttpClient;
use crate::tui::{download_bar, print_summary};

pub(crate) mod entries;
pub(crate) mod grabber;

/// Name of the text artifact written for every post.
pub(crate) const TEXT_NAME: &str = "post.txt";

/// Name an attachment is saved under in its post folder. Never the text artifact's name.
fn attachment_file_name(attachment: &Attachment) -> String {
    let name = sanitize_file_name(attachment.display_name());
    if name.eq_ignore_ascii_case(TEXT_NAME) {
        format!("attachment_{name}")
    } else {
        name
    }
}

/// What to do with a post's remaining attachments once one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttachmentFailurePolicy {
    /// Give up on the rest of the post. The post reports the failing attachment's outcome.
    AbortPost,
    /// Keep going; the post still reports the first failure.
    Continue,
}

impl AttachmentFailurePolicy {
    pub(crate) fn from_config(config: &Config) -> Self {
        if config.abort_post_on_attachment_failure() {
            AttachmentFailurePolicy::AbortPost
        } else {
            AttachmentFailurePolicy::Continue
        }
    }
}

/// Downloads a creator's posts from the aggregation site: a text file per post plus its attachments.
pub(crate) struct KemonoConnector<'a> {
    client: &'a dyn HttpClient,
    base_url: String,
    layout: DownloadLayout,
    page_delay: Duration,
    attachment_delay: Duration,
    max_pages: u32,
    policy: AttachmentFailurePolicy,
}

impl<'a> KemonoConnector<'a> {
    pub(crate) fn new(client: &'a dyn HttpClient, config: &Config) -> Self {
        Self {
            client,
            base_url: config.kemono_base_url().trim_end_matches('/').to_string(),
            layout: DownloadLayout::new(config.download_directory()),
            page_delay: config.kemono_page_delay(),
            attachment_delay: config.kemono_attachment_delay(),
            max_pages: config.kemono_max_pages(),
            policy: AttachmentFailurePolicy::from_config(config),
        }
    }

    pub(crate) fn folder_for(&self, service: &str, author_id: &str) -> PathBuf {
        self.layout.kemono_folder(service, author_id)
    }

    /// Public page of a creator, shown when their listing comes back empty.
    pub(crate) fn author_url(&self, service: &str, author_id: &str) -> String {
        format!("{}/{service}/user/{author_id}", self.base_url)
    }

    pub(crate) fn post_url(&self, post: &KemonoPost) -> String {
        format!("{}/post/{}", self.author_url(&post.service, &post.user), post.id)
    }

    /// Title, body and canonical link, separated by blank lines.
    pub(crate) fn text_body(&self, post: &KemonoPost) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            post.title,
            post.content.as_deref().unwrap_or_default(),
            self.post_url(post)
        )
    }

    pub(crate) fn grab(&self, service: &str, author_id: &str) -> Grabbed<KemonoPost> {
        Grabber::new(self.client, &self.base_url, self.page_delay, self.max_pages)
            .grab_posts(service, author_id)
    }

    fn download_attachment(&self, url: &str, dest: &Path) -> Result<(), crate::sender::FetchError> {
        self.client.download(url, dest)?;
        sleep(self.attachment_delay);
        Ok(())
    }

    /// Writes `post.txt` and every attachment for one post into `<folder>/<post id>/`.
    ///
    /// The post is `New` if anything was written, `Cached` if everything was already there.
    /// A text failure ends the post immediately; attachment failures follow the configured
    /// [AttachmentFailurePolicy].
    pub(crate) fn download_post(
        &self,
        post: &KemonoPost,
        folder: &Path,
        sink: &mut dyn SkipSink,
    ) -> io::Result<DownloadOutcome> {
        let post_folder = folder.join(sanitize_file_name(&post.id));
        create_dir_all(&post_folder)?;

        let text_path = post_folder.join(TEXT_NAME);
        let body = self.text_body(post);
        let text_job = FileJob {
            post_id: &post.id,
            label: TEXT_NAME,
            dest: &text_path,
            min_size: MIN_TEXT_SIZE,
        };
        let text = fetch_with_policy(&text_job, sink, |path| {
            write(path, body.as_bytes())?;
            Ok(())
        })?;
        if matches!(text, DownloadOutcome::Corrupted | DownloadOutcome::Failed) {
            return Ok(text);
        }

        let mut wrote_any = text == DownloadOutcome::New;
        let mut first_failure = None;
        for attachment in &post.attachments {
            let name = attachment_file_name(attachment);
            let dest = post_folder.join(&name);
            let url = format!("{}/data{}", self.base_url, attachment.path);
            let job = FileJob {
                post_id: &post.id,
                label: &name,
                dest: &dest,
                min_size: MIN_FILE_SIZE,
            };

            match fetch_with_policy(&job, sink, |path| self.download_attachment(&url, path))? {
                DownloadOutcome::New => wrote_any = true,
                DownloadOutcome::Cached | DownloadOutcome::SkippedNoSource => {}
                failure => {
                    if self.policy == AttachmentFailurePolicy::AbortPost {
                        debug!("Post {}: abandoning remaining attachments after {name}", post.id);
                        return Ok(failure);
                    }
                    first_failure.get_or_insert(failure);
                }
            }
        }

        if let Some(failure) = first_failure {
            return Ok(failure);
        }
        Ok(if wrote_any {
            DownloadOutcome::New
        } else {
            DownloadOutcome::Cached
        })
    }

    pub(crate) fn download_posts(
        &self,
        posts: &[KemonoPost],
        folder: &Path,
        sink: &mut dyn SkipSink,
        progress: &ProgressBar,
    ) -> io::Result<Tally> {
        let mut tally = Tally::default();
        for post in posts {
            progress.set_message(post.id.clone());
            tally.add(self.download_post(post, folder, sink)?);
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(tally)
    }

    /// Fetch every post of `author_id` on `service`, download them all, and print the summary.
    ///
    /// Returns `None` when the creator has no posts to download.
    pub(crate) fn run(&self, service: &str, author_id: &str, messages: &Messages) -> Result<Option<Tally>> {
        println!("\n{service} -> {author_id}");
        println!("{}", messages.get("fetching"));
        let grabbed = self.grab(service, author_id);
        if grabbed.interrupted {
            println!("{}", messages.get("partial_result"));
        }

        if grabbed.posts.is_empty() {
            println!("{}", messages.get("no_posts"));
            println!("{} {}", messages.get("check_url"), self.author_url(service, author_id));
            return Ok(None);
        }

        let folder = self.folder_for(service, author_id);
        create_dir_all(&folder)
            .with_context(|| format!("Failed to create download folder {}", folder.display()))?;
        let mut skip_log = SkipLog::in_folder(&folder);
        println!("{} {}\n", messages.get("found_posts"), grabbed.posts.len());

        let progress = download_bar(grabbed.posts.len(), messages.get("downloading"));
        let tally = self
            .download_posts(&grabbed.posts, &folder, &mut skip_log, &progress)
            .with_context(|| format!("Download into {} stopped", folder.display()))?;

        info!(
            "Finished {service}/{author_id}: {} new, {} cached, {} corrupted, {} failed",
            tally.new, tally.cached, tally.corrupted, tally.failed
        );
        print_summary(messages, &tally, skip_log.path());
        Ok(Some(tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::skip_log::MemorySkipLog;
    use crate::sender::fake::{FakeClient, Reply};
    use serde_json::json;
    use std::fs::{metadata, read_to_string};
    use tempfile::tempdir;

    const BASE: &str = "https://kemono.su";

    fn post(content: &str, attachments: serde_json::Value) -> KemonoPost {
        serde_json::from_value(json!({
            "id": "p1",
            "service": "patreon",
            "user": "77",
            "title": "Title",
            "content": content,
            "attachments": attachments,
        }))
        .unwrap()
    }

    fn connector<'a>(client: &'a FakeClient, policy: AttachmentFailurePolicy) -> KemonoConnector<'a> {
        let mut connector = KemonoConnector::new(client, &Config::default());
        connector.attachment_delay = Duration::ZERO;
        connector.page_delay = Duration::ZERO;
        connector.policy = policy;
        connector
    }

    fn long_text() -> String {
        "lorem ipsum ".repeat(60)
    }

    #[test]
    fn text_body_has_title_content_and_link() {
        let client = FakeClient::new();
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);

        assert_eq!(
            kemono.text_body(&post("Body", json!([]))),
            "Title\n\nBody\n\nhttps://kemono.su/patreon/user/77/post/p1"
        );
    }

    #[test]
    fn text_only_post_is_new_then_cached() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new();
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);
        let post = post(&long_text(), json!([]));
        let mut log = MemorySkipLog::default();

        let first = kemono.download_post(&post, dir.path(), &mut log).unwrap();
        let second = kemono.download_post(&post, dir.path(), &mut log).unwrap();

        assert_eq!(first, DownloadOutcome::New);
        assert_eq!(second, DownloadOutcome::Cached);
        let text = read_to_string(dir.path().join("p1").join(TEXT_NAME)).unwrap();
        assert!(text.starts_with("Title\n\nlorem ipsum"));
        assert!(log.lines.is_empty());
    }

    #[test]
    fn short_text_is_removed_and_logged() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new().reply(&format!("{BASE}/data/a/b.png"), Reply::Bytes(20 * 1024));
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);
        let mut log = MemorySkipLog::default();

        let outcome = kemono
            .download_post(&post("short", json!([{"name": "b.png", "path": "/a/b.png"}])), dir.path(), &mut log)
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Corrupted);
        assert!(!dir.path().join("p1").join(TEXT_NAME).exists());
        assert_eq!(log.lines, vec!["[p1] Skipped: post.txt too small (<512B)"]);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn attachments_are_fetched_from_data_path() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new()
            .reply(&format!("{BASE}/data/a/one.png"), Reply::Bytes(20 * 1024))
            .reply(&format!("{BASE}/data/a/two.zip"), Reply::Bytes(40 * 1024));
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);
        let post = post(
            &long_text(),
            json!([
                {"name": "one.png", "path": "/a/one.png"},
                {"name": "two.zip", "path": "/a/two.zip"}
            ]),
        );
        let mut log = MemorySkipLog::default();

        let first = kemono.download_post(&post, dir.path(), &mut log).unwrap();
        let second = kemono.download_post(&post, dir.path(), &mut log).unwrap();

        assert_eq!(first, DownloadOutcome::New);
        assert_eq!(second, DownloadOutcome::Cached);
        assert_eq!(metadata(dir.path().join("p1/two.zip")).unwrap().len(), 40 * 1024);
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn failed_attachment_abandons_its_siblings() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new()
            .reply(&format!("{BASE}/data/a/one.png"), Reply::Status(500))
            .reply(&format!("{BASE}/data/a/two.png"), Reply::Bytes(20 * 1024));
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);
        let post = post(
            &long_text(),
            json!([
                {"name": "one.png", "path": "/a/one.png"},
                {"name": "two.png", "path": "/a/two.png"}
            ]),
        );
        let mut log = MemorySkipLog::default();

        let outcome = kemono.download_post(&post, dir.path(), &mut log).unwrap();

        assert_eq!(outcome, DownloadOutcome::Failed);
        assert!(!dir.path().join("p1/two.png").exists());
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn continue_policy_fetches_siblings_but_reports_failure() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new()
            .reply(&format!("{BASE}/data/a/one.png"), Reply::Bytes(10))
            .reply(&format!("{BASE}/data/a/two.png"), Reply::Bytes(20 * 1024));
        let kemono = connector(&client, AttachmentFailurePolicy::Continue);
        let post = post(
            &long_text(),
            json!([
                {"name": "one.png", "path": "/a/one.png"},
                {"name": "two.png", "path": "/a/two.png"}
            ]),
        );
        let mut log = MemorySkipLog::default();

        let outcome = kemono.download_post(&post, dir.path(), &mut log).unwrap();

        assert_eq!(outcome, DownloadOutcome::Corrupted);
        assert!(dir.path().join("p1/two.png").exists());
        assert!(!dir.path().join("p1/one.png").exists());
        assert_eq!(log.lines, vec!["[p1] Skipped: one.png corrupted (<10KB)"]);
    }

    #[test]
    fn attachment_named_like_the_text_file_keeps_both() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new().reply(&format!("{BASE}/data/a/post.txt"), Reply::Bytes(20 * 1024));
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);
        let post = post(&long_text(), json!([{"name": "post.txt", "path": "/a/post.txt"}]));
        let mut log = MemorySkipLog::default();

        let outcome = kemono.download_post(&post, dir.path(), &mut log).unwrap();

        assert_eq!(outcome, DownloadOutcome::New);
        let text = read_to_string(dir.path().join("p1").join(TEXT_NAME)).unwrap();
        assert!(text.starts_with("Title\n\nlorem ipsum"));
        assert_eq!(metadata(dir.path().join("p1/attachment_post.txt")).unwrap().len(), 20 * 1024);
        assert!(log.lines.is_empty());
    }

    #[test]
    fn unnamed_attachment_is_saved_as_file() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new().reply(&format!("{BASE}/data/x/y"), Reply::Bytes(11 * 1024));
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);
        let mut log = MemorySkipLog::default();

        kemono
            .download_post(&post(&long_text(), json!([{"path": "/x/y"}])), dir.path(), &mut log)
            .unwrap();

        assert!(dir.path().join("p1/file").exists());
    }

    #[test]
    fn download_posts_tallies_per_post() {
        let dir = tempdir().unwrap();
        let client = FakeClient::new();
        let kemono = connector(&client, AttachmentFailurePolicy::AbortPost);
        let mut ok = post(&long_text(), json!([]));
        ok.id = "ok".into();
        let mut broken = post("tiny", json!([]));
        broken.id = "broken".into();
        let mut log = MemorySkipLog::default();

        let tally = kemono
            .download_posts(&[ok, broken], dir.path(), &mut log, &ProgressBar::hidden())
            .unwrap();

        assert_eq!((tally.new, tally.corrupted), (1, 1));
    }
}
