use std::io::{self, Write};

use crate::answer::StructuredAnswer;

pub trait Renderer {
    fn render(&self, answer: &StructuredAnswer, out: &mut dyn Write) -> io::Result<()>;
}

/// Headed sections for a human reader. Headings are bold when `styled`.
pub struct TerminalRenderer {
    pub styled: bool,
}

impl TerminalRenderer {
    fn heading(&self, out: &mut dyn Write, title: &str) -> io::Result<()> {
        if self.styled {
            writeln!(out, "\x1b[1;36m{title}\x1b[0m")
        } else {
            writeln!(out, "{title}")
        }
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, answer: &StructuredAnswer, out: &mut dyn Write) -> io::Result<()> {
        let sections = [
            ("Summary", &answer.summary),
            ("Answer", &answer.answer),
            ("Tone", &answer.tone),
        ];
        for (i, (title, text)) in sections.iter().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            self.heading(out, title)?;
            writeln!(out, "{}", text.trim())?;
        }
        out.flush()
    }
}

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, answer: &StructuredAnswer, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, answer)?;
        writeln!(out)?;
        out.flush()
    }
}
