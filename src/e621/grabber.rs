use std::time::Duration;

use crate::download::Grabbed;
use crate::e621::entries::{PostEntry, PostPage};
use crate::sender::{build_url, get_json, FetchError, HttpClient};

/// Page size requested from `posts.json`; a shorter page is the last one.
pub(crate) const POST_LIMIT: usize = 320;

const PAGE_TIMEOUT: Duration = Duration::from_secs(20);

/// Pages through `posts.json` for one query.
pub(crate) struct Grabber<'a> {
    client: &'a dyn HttpClient,
    base_url: &'a str,
}

impl<'a> Grabber<'a> {
    pub(crate) fn new(client: &'a dyn HttpClient, base_url: &'a str) -> Self {
        Self { client, base_url }
    }

    fn page(&self, query: &str, page: u32) -> Result<Vec<PostEntry>, FetchError> {
        let url = build_url(
            self.base_url,
            "/posts.json",
            &[
                ("tags", query.to_string()),
                ("limit", POST_LIMIT.to_string()),
                ("page", page.to_string()),
            ],
        )?;
        let page: PostPage = get_json(self.client, &url, PAGE_TIMEOUT)?;
        Ok(page.posts)
    }

    /// Collects every post for `query`, reading at most `max_pages` pages.
    ///
    /// Stops at the first empty or short page. A failed request ends the listing and keeps
    /// whatever was already gathered.
    pub(crate) fn grab_posts(&self, query: &str, max_pages: u32) -> Grabbed<PostEntry> {
        let mut grabbed = Grabbed::default();

        for page in 1..=max_pages.max(1) {
            let batch = match self.page(query, page) {
                Ok(batch) => batch,
                Err(err) => {
                    error!("Failed to fetch page {page} of \"{query}\": {err}");
                    grabbed.interrupted = true;
                    break;
                }
            };

            let count = batch.len();
            trace!("Page {page} of \"{query}\" returned {count} posts");
            grabbed.posts.extend(batch);
            if count < POST_LIMIT {
                break;
            }
        }

        info!("Grabbed {} posts for \"{query}\"", grabbed.posts.len());
        grabbed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::fake::{FakeClient, Reply};
    use serde_json::json;

    const BASE: &str = "https://e621.test";

    fn page_url(query: &str, page: u32) -> String {
        build_url(
            BASE,
            "/posts.json",
            &[
                ("tags", query.to_string()),
                ("limit", POST_LIMIT.to_string()),
                ("page", page.to_string()),
            ],
        )
        .unwrap()
    }

    fn posts(start: i64, count: usize) -> serde_json::Value {
        let posts: Vec<_> = (0..count as i64)
            .map(|i| json!({"id": start + i, "file": {"url": format!("https://static/{}.png", start + i), "ext": "png"}}))
            .collect();
        json!({ "posts": posts })
    }

    #[test]
    fn short_page_ends_listing() {
        let client = FakeClient::new()
            .json(&page_url("fox", 1), posts(0, POST_LIMIT))
            .json(&page_url("fox", 2), posts(1000, 5));

        let grabbed = Grabber::new(&client, BASE).grab_posts("fox", 10);

        assert_eq!(grabbed.posts.len(), POST_LIMIT + 5);
        assert!(!grabbed.interrupted);
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn empty_page_ends_listing() {
        let client = FakeClient::new()
            .json(&page_url("fox", 1), posts(0, POST_LIMIT))
            .json(&page_url("fox", 2), json!({"posts": []}));

        let grabbed = Grabber::new(&client, BASE).grab_posts("fox", 10);

        assert_eq!(grabbed.posts.len(), POST_LIMIT);
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn stops_at_max_pages_even_when_pages_stay_full() {
        let mut client = FakeClient::new();
        for page in 1..=5 {
            client = client.json(&page_url("fox", page), posts(page as i64 * 1000, POST_LIMIT));
        }

        let grabbed = Grabber::new(&client, BASE).grab_posts("fox", 3);

        assert_eq!(grabbed.posts.len(), 3 * POST_LIMIT);
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn failed_page_keeps_what_was_gathered() {
        let client = FakeClient::new()
            .json(&page_url("fox", 1), posts(0, POST_LIMIT))
            .reply(&page_url("fox", 2), Reply::Status(502));

        let grabbed = Grabber::new(&client, BASE).grab_posts("fox", 10);

        assert_eq!(grabbed.posts.len(), POST_LIMIT);
        assert!(grabbed.interrupted);
    }

    #[test]
    fn rejected_query_yields_nothing() {
        let client = FakeClient::new().reply(&page_url("bad::tag", 1), Reply::Status(422));

        let grabbed = Grabber::new(&client, BASE).grab_posts("bad::tag", 3);

        assert!(grabbed.posts.is_empty());
        assert_eq!(client.call_count(), 1);
    }
}
