/// Content rating filter. At most one is applied to a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Rating {
    #[default]
    None,
    Safe,
    Questionable,
    Explicit,
}

impl Rating {
    /// Maps the rating menu: `1` safe, `2` questionable, `3` explicit, anything else none.
    pub(crate) fn from_choice(choice: &str) -> Self {
        match choice.trim() {
            "1" => Rating::Safe,
            "2" => Rating::Questionable,
            "3" => Rating::Explicit,
            _ => Rating::None,
        }
    }

    pub(crate) fn token(self) -> &'static str {
        match self {
            Rating::None => "",
            Rating::Safe => "rating:s",
            Rating::Questionable => "rating:q",
            Rating::Explicit => "rating:e",
        }
    }
}

/// Everything needed to run one tag search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchConfig {
    base_tag: String,
    exclude_tags: Vec<String>,
    rating: Rating,
    max_pages: u32,
}

impl SearchConfig {
    /// Duplicate exclusions are dropped, keeping the first occurrence. `max_pages` is at least 1.
    pub(crate) fn new<I, S>(base_tag: &str, exclude_tags: I, rating: Rating, max_pages: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for tag in exclude_tags.into_iter().map(Into::into) {
            if !tag.is_empty() && !unique.contains(&tag) {
                unique.push(tag);
            }
        }

        Self {
            base_tag: base_tag.to_string(),
            exclude_tags: unique,
            rating,
            max_pages: max_pages.max(1),
        }
    }

    pub(crate) fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Builds the tag query sent to `posts.json`.
    ///
    /// Tags are not validated; the API gets them verbatim.
    pub(crate) fn query(&self) -> String {
        let mut tags: Vec<String> = self.base_tag.split_whitespace().map(String::from).collect();
        tags.extend(self.exclude_tags.iter().map(|tag| format!("-{tag}")));
        if !self.rating.token().is_empty() {
            tags.push(self.rating.token().to_string());
        }
        tags.join(" ")
    }
}

/// Parses the page count prompt, using `fallback` for anything that isn't a positive number.
pub(crate) fn parse_pages(input: &str, fallback: u32) -> u32 {
    match input.trim().parse::<u32>() {
        Ok(pages) if pages >= 1 => pages,
        _ => fallback,
    }
}
