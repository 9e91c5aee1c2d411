use std::thread::sleep;
use std::time::Duration;

use crate::download::Grabbed;
use crate::kemono::entries::KemonoPost;
use crate::sender::{build_url, get_json, FetchError, HttpClient};

/// Offset step between creator pages.
pub(crate) const BATCH_SIZE: usize = 50;

const PAGE_TIMEOUT: Duration = Duration::from_secs(20);

/// Walks a creator's post listing by offset.
pub(crate) struct Grabber<'a> {
    client: &'a dyn HttpClient,
    base_url: &'a str,
    /// Sleep after every successful page.
    pacing: Duration,
    max_pages: u32,
}

impl<'a> Grabber<'a> {
    pub(crate) fn new(client: &'a dyn HttpClient, base_url: &'a str, pacing: Duration, max_pages: u32) -> Self {
        Self {
            client,
            base_url,
            pacing,
            max_pages: max_pages.max(1),
        }
    }

    pub(crate) fn page_url(base_url: &str, service: &str, author_id: &str, offset: usize) -> Result<String, FetchError> {
        build_url(
            base_url,
            &format!("/api/v1/{service}/user/{author_id}"),
            &[("o", offset.to_string())],
        )
    }

    /// Collects every post of `author_id` on `service`.
    ///
    /// Ends on the first empty batch. A failed request ends the listing early and keeps what
    /// was gathered.
    pub(crate) fn grab_posts(&self, service: &str, author_id: &str) -> Grabbed<KemonoPost> {
        let mut grabbed = Grabbed::default();
        let mut offset = 0;

        for _ in 0..self.max_pages {
            let batch: Vec<KemonoPost> = match Self::page_url(self.base_url, service, author_id, offset)
                .and_then(|url| get_json(self.client, &url, PAGE_TIMEOUT))
            {
                Ok(batch) => batch,
                Err(err) => {
                    error!("Error loading posts for {service}/{author_id} at offset {offset}: {err}");
                    grabbed.interrupted = true;
                    break;
                }
            };

            if batch.is_empty() {
                break;
            }

            trace!("Offset {offset} of {service}/{author_id} returned {} posts", batch.len());
            grabbed.posts.extend(batch);
            offset += BATCH_SIZE;
            sleep(self.pacing);
        }

        info!("Grabbed {} posts for {service}/{author_id}", grabbed.posts.len());
        grabbed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::fake::{FakeClient, Reply};
    use serde_json::json;

    const BASE: &str = "https://kemono.test";

    fn url(offset: usize) -> String {
        Grabber::page_url(BASE, "patreon", "77", offset).unwrap()
    }

    fn batch(start: usize, count: usize) -> serde_json::Value {
        let posts: Vec<_> = (start..start + count)
            .map(|i| json!({"id": i.to_string(), "service": "patreon", "user": "77", "title": format!("post {i}")}))
            .collect();
        json!(posts)
    }

    #[test]
    fn page_url_uses_offset_parameter() {
        assert_eq!(url(100), "https://kemono.test/api/v1/patreon/user/77?o=100");
    }

    #[test]
    fn walks_offsets_until_empty_batch() {
        let client = FakeClient::new()
            .json(&url(0), batch(0, BATCH_SIZE))
            .json(&url(50), batch(50, 12))
            .json(&url(100), json!([]));

        let grabbed = Grabber::new(&client, BASE, Duration::ZERO, 100).grab_posts("patreon", "77");

        assert_eq!(grabbed.posts.len(), BATCH_SIZE + 12);
        assert!(!grabbed.interrupted);
        assert_eq!(client.call_count(), 3);
        assert_eq!(grabbed.posts[50].id, "50");
    }

    #[test]
    fn failure_keeps_earlier_batches() {
        let client = FakeClient::new()
            .json(&url(0), batch(0, BATCH_SIZE))
            .reply(&url(50), Reply::Status(429));

        let grabbed = Grabber::new(&client, BASE, Duration::ZERO, 100).grab_posts("patreon", "77");

        assert_eq!(grabbed.posts.len(), BATCH_SIZE);
        assert!(grabbed.interrupted);
    }

    #[test]
    fn page_bound_stops_an_endless_listing() {
        let mut client = FakeClient::new();
        for page in 0..10 {
            client = client.json(&url(page * BATCH_SIZE), batch(page * BATCH_SIZE, BATCH_SIZE));
        }

        let grabbed = Grabber::new(&client, BASE, Duration::ZERO, 4).grab_posts("patreon", "77");

        assert_eq!(client.call_count(), 4);
        assert_eq!(grabbed.posts.len(), 4 * BATCH_SIZE);
    }
}
