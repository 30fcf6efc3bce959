use crate::error::{AppError, AppResult};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes content and answers questions about it.";

pub const DEFAULT_USER_TEMPLATE: &str = "Here is content from an RSS feed:\n\n{content}\n\nFirst, provide a brief summary of this content. Then, answer this question about it: {question}";

/// System instruction plus user-message template, each independently
/// overridable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            user: DEFAULT_USER_TEMPLATE.to_string(),
        }
    }
}

/// The two strings sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn new(system: Option<String>, user: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            system: system.unwrap_or(defaults.system),
            user: user.unwrap_or(defaults.user),
        }
    }

    pub fn build(&self, content: &str, question: &str) -> AppResult<Prompt> {
        let user = substitute(&self.user, &[("content", content), ("question", question)])?;
        Ok(Prompt {
            system: self.system.clone(),
            user,
        })
    }
}

/// Replaces `{name}` placeholders in one pass. Substituted values are copied
/// as-is, so braces inside them are never expanded. `{{` and `}}` escape.
pub fn substitute(template: &str, values: &[(&str, &str)]) -> AppResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let rest = &template[start + 1..];
                let end = rest.find('}').ok_or_else(|| {
                    AppError::Template(format!("unclosed placeholder at offset {start}"))
                })?;
                let name = &rest[..end];
                let value = values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| AppError::Template(format!("unknown placeholder {{{name}}}")))?;
                out.push_str(value);

                let close = start + 1 + end;
                for (i, _) in chars.by_ref() {
                    if i == close {
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
