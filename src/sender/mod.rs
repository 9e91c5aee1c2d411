use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every way a single request can go wrong. None of these ever escape an orchestrator.
#[derive(Error, Debug)]
pub(crate) enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two operations the downloaders need from the network.
pub(crate) trait HttpClient {
    /// Issues a GET and returns the body as text. Non-2xx responses are errors.
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;

    /// Issues a GET and streams the body into `dest`, returning the number of bytes written.
    ///
    /// There is no deadline on the whole transfer, only on each wait for more bytes.
    /// A failed transfer may leave a partial file behind; callers own the cleanup.
    fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Fetches `url` and decodes the body as JSON.
pub(crate) fn get_json<T: DeserializeOwned>(
    client: &dyn HttpClient,
    url: &str,
    timeout: Duration,
) -> Result<T, FetchError> {
    let body = client.get_text(url, timeout)?;
    serde_json::from_str(&body).map_err(|source| FetchError::Parse {
        url: url.to_string(),
        source,
    })
}

/// Joins `base` and `path`, then appends `params` as an encoded query string.
pub(crate) fn build_url(base: &str, path: &str, params: &[(&str, String)]) -> Result<String, FetchError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    let url = if params.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, params.iter().map(|(k, v)| (*k, v.as_str())))
    };

    url.map(String::from)
        .map_err(|e| FetchError::InvalidUrl(format!("{raw} ({e})")))
}

/// Credentials attached to every request as HTTP Basic auth.
#[derive(Clone)]
struct BasicAuth {
    username: String,
    api_key: String,
}

/// Blocking request sender used against both platforms.
#[derive(Clone)]
pub(crate) struct RequestSender {
    client: Client,
    auth: Option<BasicAuth>,
}

impl RequestSender {
    /// Creates a sender whose User-Agent names the tool and the operator.
    ///
    /// # Arguments
    ///
    /// * `operator`: Who is running the tool. The e621 API requires this in the User-Agent.
    /// * `read_timeout`: Longest a file download may wait for its headers or for the next
    ///   chunk of body. A transfer that keeps making progress is never cut off.
    pub(crate) fn new(operator: &str, read_timeout: Duration) -> Result<Self, FetchError> {
        // The blocking client applies this per read, unlike a request timeout which also
        // bounds the whole body.
        let client = Client::builder()
            .user_agent(Self::user_agent(operator))
            .connect_timeout(Duration::from_secs(10))
            .timeout(read_timeout)
            .build()?;

        Ok(Self { client, auth: None })
    }

    /// Attaches Basic credentials to every request made by this sender.
    pub(crate) fn with_basic_auth(mut self, username: &str, api_key: &str) -> Self {
        self.auth = Some(BasicAuth {
            username: username.to_string(),
            api_key: api_key.to_string(),
        });
        self
    }

    pub(crate) fn user_agent(operator: &str) -> String {
        format!("{NAME}/{VERSION} (by {operator})")
    }

    /// `deadline` bounds the whole exchange; without one only the client's read timeout applies.
    fn send(&self, url: &str, deadline: Option<Duration>) -> Result<reqwest::blocking::Response, FetchError> {
        let mut request = self.client.get(url);
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.api_key));
        }

        trace!("GET {url}");
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

impl HttpClient for RequestSender {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        Ok(self.send(url, Some(timeout))?.text()?)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.send(url, None)?;
        let mut file = File::create(dest)?;
        let written = response.copy_to(&mut file)?;
        debug!("Wrote {written} bytes to {}", dest.display());
        Ok(written)
    }
}
