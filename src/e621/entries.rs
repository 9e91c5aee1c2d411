use serde::Deserialize;

/// A tag returned by `tags.json`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TagEntry {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) post_count: i64,
}

/// `tags.json` answers with a bare array, or `{"tags": []}` when nothing matches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TagSearchResponse {
    List(Vec<TagEntry>),
    Wrapped { tags: Vec<TagEntry> },
}

impl TagSearchResponse {
    pub(crate) fn into_tags(self) -> Vec<TagEntry> {
        match self {
            TagSearchResponse::List(tags) | TagSearchResponse::Wrapped { tags } => tags,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileEntry {
    /// Absent for posts hidden from anonymous or unprivileged users.
    pub(crate) url: Option<String>,
    #[serde(default = "default_ext")]
    pub(crate) ext: String,
}

fn default_ext() -> String {
    String::from("jpg")
}

impl Default for FileEntry {
    fn default() -> Self {
        FileEntry {
            url: None,
            ext: default_ext(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PostEntry {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) file: FileEntry,
}

impl PostEntry {
    pub(crate) fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.file.ext)
    }
}

/// Body of `posts.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct PostPage {
    #[serde(default)]
    pub(crate) posts: Vec<PostEntry>,
}
