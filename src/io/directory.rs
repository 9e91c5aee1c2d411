use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Characters that can't appear in a file name on at least one supported OS.
    static ref RESERVED_CHARS: Regex = Regex::new(r#"[/\\?:*<>"|\x00-\x1f]"#).unwrap();
}

/// Folder for a tag search: colons dropped, `-` spelled out as `not`, whitespace runs joined by `_`.
///
/// `"fox -cub rating:s"` becomes `"fox_notcub_ratings"`.
pub(crate) fn tag_folder_name(query: &str) -> String {
    query
        .replace(':', "")
        .replace('-', "not")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Makes a remote-supplied name safe to use as a single path component.
pub(crate) fn sanitize_file_name(name: &str) -> String {
    let cleaned = RESERVED_CHARS.replace_all(name.trim(), "_");
    match cleaned.as_ref() {
        "" | "." | ".." => String::from("file"),
        other => other.to_string(),
    }
}

/// Where each platform's downloads land.
#[derive(Debug, Clone)]
pub(crate) struct DownloadLayout {
    root: PathBuf,
}

impl DownloadLayout {
    pub(crate) fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// `<root>/e621/<sanitized query>`
    pub(crate) fn e621_folder(&self, query: &str) -> PathBuf {
        self.root.join("e621").join(tag_folder_name(query))
    }

    /// `<root>/kemono/<service>/<author id>`
    pub(crate) fn kemono_folder(&self, service: &str, author_id: &str) -> PathBuf {
        self.root
            .join("kemono")
            .join(sanitize_file_name(service))
            .join(sanitize_file_name(author_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_folder_name_matches_query_shape() {
        assert_eq!(tag_folder_name("fox -cub rating:s"), "fox_notcub_ratings");
        assert_eq!(tag_folder_name("  wolf   solo "), "wolf_solo");
        assert_eq!(tag_folder_name("hi-res"), "hinotres");
    }

    #[test]
    fn sanitize_strips_path_tricks() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("a:b?.png"), "a_b_.png");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name("   "), "file");
    }

    #[test]
    fn layout_places_platforms_under_root() {
        let layout = DownloadLayout::new(Path::new("downloads"));
        assert_eq!(
            layout.e621_folder("fox -cub"),
            Path::new("downloads/e621/fox_notcub")
        );
        assert_eq!(
            layout.kemono_folder("patreon", "12345"),
            Path::new("downloads/kemono/patreon/12345")
        );
    }
}
