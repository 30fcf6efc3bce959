use crate::feed::FeedEntry;

pub const ENTRY_SEPARATOR: &str = "\n\n---\n\n";
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";
pub const CHARS_PER_TOKEN: usize = 4;
pub const DEFAULT_MAX_TOKENS: usize = 16_000;

/// Upper bound on the size of the aggregated document, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBudget {
    max_chars: usize,
}

impl ContentBudget {
    /// Rough conversion: one token is about four characters.
    pub fn from_tokens(max_tokens: usize) -> Self {
        Self::from_chars(max_tokens.saturating_mul(CHARS_PER_TOKEN))
    }

    pub fn from_chars(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }
}

pub fn render_entry(entry: &FeedEntry) -> String {
    format!("Title: {}\n\n{}", entry.title, entry.body)
}

/// Joins entries in feed order and applies the budget, if any.
pub fn aggregate(entries: &[FeedEntry], budget: Option<ContentBudget>) -> String {
    let combined = entries
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR);

    match budget {
        Some(budget) => truncate(&combined, budget),
        None => combined,
    }
}

/// Hard cut at the character bound, ignoring word and entry boundaries.
/// Applying the same budget twice gives the same string.
pub fn truncate(text: &str, budget: ContentBudget) -> String {
    match text.char_indices().nth(budget.max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => text.to_string(),
    }
}
