use std::fs::{read_to_string, write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Error};
use dialoguer::Input;
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};

pub(crate) mod directory;
pub(crate) mod locale;
pub(crate) mod skip_log;

/// Name of the configuration file.
pub(crate) const CONFIG_NAME: &str = "config.json";

/// Name of the e621 credential file.
pub(crate) const LOGIN_NAME: &str = ".auth_e621.json";

/// Config that is used to do general setup.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Config {
    /// Root of the download tree; each platform gets its own folder below it.
    #[serde(default = "default_download_directory")]
    download_directory: String,
    #[serde(rename = "e621BaseUrl", default = "default_e621_base_url")]
    e621_base_url: String,
    #[serde(default = "default_kemono_base_url")]
    kemono_base_url: String,
    /// Page count used when the page prompt isn't a positive number.
    #[serde(default = "default_pages")]
    default_pages: u32,
    /// Page bound for tag searches started from an author lookup.
    #[serde(default = "default_author_pages")]
    author_pages: u32,
    #[serde(default = "default_kemono_page_delay_ms")]
    kemono_page_delay_ms: u64,
    #[serde(default = "default_kemono_attachment_delay_ms")]
    kemono_attachment_delay_ms: u64,
    /// Upper bound on creator pages, in case the site never returns an empty batch.
    #[serde(default = "default_kemono_max_pages")]
    kemono_max_pages: u32,
    #[serde(default = "default_file_timeout_secs")]
    file_timeout_secs: u64,
    /// Stop downloading a post's remaining attachments once one of them fails.
    #[serde(default = "default_abort_post_on_attachment_failure")]
    abort_post_on_attachment_failure: bool,
}

fn default_download_directory() -> String { String::from("downloads") }
fn default_e621_base_url() -> String { String::from("https://e621.net") }
fn default_kemono_base_url() -> String { String::from("https://kemono.su") }
fn default_pages() -> u32 { 3 }
fn default_author_pages() -> u32 { 9999 }
fn default_kemono_page_delay_ms() -> u64 { 200 }
fn default_kemono_attachment_delay_ms() -> u64 { 100 }
fn default_kemono_max_pages() -> u32 { 1000 }
fn default_file_timeout_secs() -> u64 { 20 }
fn default_abort_post_on_attachment_failure() -> bool { true }

impl Config {
    pub(crate) fn download_directory(&self) -> &Path {
        Path::new(&self.download_directory)
    }

    pub(crate) fn e621_base_url(&self) -> &str {
        &self.e621_base_url
    }

    pub(crate) fn kemono_base_url(&self) -> &str {
        &self.kemono_base_url
    }

    pub(crate) fn default_pages(&self) -> u32 {
        self.default_pages.max(1)
    }

    pub(crate) fn author_pages(&self) -> u32 {
        self.author_pages.max(1)
    }

    pub(crate) fn kemono_page_delay(&self) -> Duration {
        Duration::from_millis(self.kemono_page_delay_ms)
    }

    pub(crate) fn kemono_attachment_delay(&self) -> Duration {
        Duration::from_millis(self.kemono_attachment_delay_ms)
    }

    pub(crate) fn kemono_max_pages(&self) -> u32 {
        self.kemono_max_pages.max(1)
    }

    pub(crate) fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    pub(crate) fn abort_post_on_attachment_failure(&self) -> bool {
        self.abort_post_on_attachment_failure
    }

    /// Loads the config at `path`, writing the defaults there first if it doesn't exist.
    pub(crate) fn load_or_create(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            trace!("{}: does not exist!", path.display());
            info!("Creating config file...");
            let json = to_string_pretty(&Config::default())?;
            write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        }

        let contents = read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            download_directory: default_download_directory(),
            e621_base_url: default_e621_base_url(),
            kemono_base_url: default_kemono_base_url(),
            default_pages: default_pages(),
            author_pages: default_author_pages(),
            kemono_page_delay_ms: default_kemono_page_delay_ms(),
            kemono_attachment_delay_ms: default_kemono_attachment_delay_ms(),
            kemono_max_pages: default_kemono_max_pages(),
            file_timeout_secs: default_file_timeout_secs(),
            abort_post_on_attachment_failure: default_abort_post_on_attachment_failure(),
        }
    }
}

/// `Login` holds the e621 API credentials. Loaded once per run and never changed afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Login {
    username: String,
    api_key: String,
}

impl Login {
    pub(crate) fn new(username: &str, api_key: &str) -> Self {
        Login {
            username: username.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub(crate) fn username(&self) -> &str {
        &self.username
    }

    /// The API key, treated like a password.
    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Anything able to hand out e621 credentials.
pub(crate) trait CredentialProvider {
    fn login(&self) -> Result<Login, Error>;
}

/// Reads credentials from a JSON file, asking for them and saving them on first use.
pub(crate) struct LoginFile {
    path: PathBuf,
}

impl LoginFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<Login, Error> {
        let contents = read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        from_str(&contents).with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Writes `login` to the credential file in plain text.
    pub(crate) fn save(&self, login: &Login) -> Result<(), Error> {
        write(&self.path, to_string_pretty(login)?)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!("The login file was created.");
        Ok(())
    }

    fn prompt() -> Result<Login, Error> {
        println!("\ne621 API credentials:");
        println!("https://e621.net/users/home (scroll to bottom)");
        let username: String = Input::new().with_prompt("Username").interact_text()?;
        let api_key: String = Input::new().with_prompt("API Key").interact_text()?;
        Ok(Login::new(username.trim(), api_key.trim()))
    }
}

impl CredentialProvider for LoginFile {
    fn login(&self) -> Result<Login, Error> {
        if self.path.exists() {
            return self.read();
        }

        let login = Self::prompt()?;
        self.save(&login)?;
        Ok(login)
    }
}
