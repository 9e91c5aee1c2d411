//! Figures out which platforms host an author.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::e621::entries::TagSearchResponse;
use crate::kemono::entries::CreatorEntry;
use crate::sender::{build_url, get_json, HttpClient};

const TAG_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const CREATOR_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(20);

/// Result of asking one platform about an author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Existence<T> {
    Found(T),
    NotFound,
    /// The platform couldn't be asked; the reason is for the user, the author may well exist.
    CheckFailed(String),
}

impl<T> Existence<T> {
    pub(crate) fn found(&self) -> Option<&T> {
        match self {
            Existence::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// A creator on the aggregation site, with every service they're registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KemonoAuthor {
    pub(crate) id: String,
    pub(crate) name: String,
    /// Distinct, sorted.
    pub(crate) services: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Platform {
    E621,
    Kemono,
}

impl Platform {
    pub(crate) fn host(self) -> &'static str {
        match self {
            Platform::E621 => "e621.net",
            Platform::Kemono => "kemono.su",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host())
    }
}

impl AsRef<str> for Platform {
    fn as_ref(&self) -> &str {
        self.host()
    }
}

/// Both platforms' answers for one author.
#[derive(Debug, Clone)]
pub(crate) struct Resolution {
    pub(crate) e621: Existence<String>,
    pub(crate) kemono: Existence<KemonoAuthor>,
}

impl Resolution {
    /// Platforms the author was found on, e621 first.
    pub(crate) fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.e621.found().is_some() {
            platforms.push(Platform::E621);
        }
        if self.kemono.found().is_some() {
            platforms.push(Platform::Kemono);
        }
        platforms
    }

    /// Platforms that couldn't be checked, with the reason.
    pub(crate) fn failures(&self) -> Vec<(Platform, &str)> {
        let mut failures = Vec::new();
        if let Existence::CheckFailed(reason) = &self.e621 {
            failures.push((Platform::E621, reason.as_str()));
        }
        if let Existence::CheckFailed(reason) = &self.kemono {
            failures.push((Platform::Kemono, reason.as_str()));
        }
        failures
    }
}

/// Looks an author up on both platforms. Each check is independent.
pub(crate) struct AuthorResolver<'a> {
    e621: &'a dyn HttpClient,
    e621_base: &'a str,
    kemono: &'a dyn HttpClient,
    kemono_base: &'a str,
}

impl<'a> AuthorResolver<'a> {
    pub(crate) fn new(
        e621: &'a dyn HttpClient,
        e621_base: &'a str,
        kemono: &'a dyn HttpClient,
        kemono_base: &'a str,
    ) -> Self {
        Self {
            e621,
            e621_base,
            kemono,
            kemono_base,
        }
    }

    pub(crate) fn resolve(&self, author: &str) -> Resolution {
        Resolution {
            e621: self.check_e621(author),
            kemono: self.check_kemono(author),
        }
    }

    /// An author exists on e621 when a tag with exactly that name (case-sensitive) exists.
    pub(crate) fn check_e621(&self, author: &str) -> Existence<String> {
        let url = match build_url(
            self.e621_base,
            "/tags.json",
            &[("search[name_matches]", author.to_string())],
        ) {
            Ok(url) => url,
            Err(err) => return Existence::CheckFailed(err.to_string()),
        };

        match get_json::<TagSearchResponse>(self.e621, &url, TAG_CHECK_TIMEOUT) {
            Ok(response) => {
                match response.into_tags().into_iter().find(|tag| tag.name == author) {
                    Some(tag) => {
                        debug!("e621 tag \"{}\" has {} posts", tag.name, tag.post_count);
                        Existence::Found(tag.name)
                    }
                    None => Existence::NotFound,
                }
            }
            Err(err) => {
                warn!("Could not check e621 for \"{author}\": {err}");
                Existence::CheckFailed(err.to_string())
            }
        }
    }

    /// Matches the creator directory by name (any case) or exact id, then gathers every
    /// service registered under the matched id.
    pub(crate) fn check_kemono(&self, author: &str) -> Existence<KemonoAuthor> {
        let creators: Vec<CreatorEntry> = match build_url(self.kemono_base, "/api/v1/creators/", &[])
            .and_then(|url| get_json(self.kemono, &url, CREATOR_DIRECTORY_TIMEOUT))
        {
            Ok(creators) => creators,
            Err(err) => {
                warn!("Failed to fetch creators list: {err}");
                return Existence::CheckFailed(err.to_string());
            }
        };
        trace!("Creator directory has {} entries", creators.len());

        let wanted = author.to_lowercase();
        let Some(matched) = creators
            .iter()
            .find(|c| c.name.to_lowercase() == wanted || c.id == author)
        else {
            return Existence::NotFound;
        };

        let services: BTreeSet<&str> = creators
            .iter()
            .filter(|c| c.id == matched.id)
            .map(|c| c.service.as_str())
            .collect();

        Existence::Found(KemonoAuthor {
            id: matched.id.clone(),
            name: matched.name.clone(),
            services: services.into_iter().map(String::from).collect(),
        })
    }
}
