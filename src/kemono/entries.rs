use serde::{Deserialize, Deserializer};

/// One row of the creator directory. The same id shows up once per service.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatorEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) service: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Attachment {
    #[serde(default)]
    pub(crate) name: Option<String>,
    pub(crate) path: String,
}

impl Attachment {
    /// The name to save under, `file` when the site gave none.
    pub(crate) fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "file",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KemonoPost {
    #[serde(deserialize_with = "string_or_number")]
    pub(crate) id: String,
    pub(crate) service: String,
    #[serde(deserialize_with = "string_or_number")]
    pub(crate) user: String,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) attachments: Vec<Attachment>,
}

/// Some services number their ids, others don't; both end up as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
