//! Line-oriented text assembly for CQL libraries

use std::fmt::Write;

/// A named expression definition ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// `//` comment lines written above the definition
    pub comments: Vec<String>,
    /// Expression text, possibly multi-line
    pub body: String,
}

#[derive(Debug, Default)]
pub struct CqlWriter {
    out: String,
}

impl CqlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    pub fn comment(&mut self, text: &str) {
        let _ = writeln!(self.out, "// {}", text);
    }

    /// Block comment; `*/` inside the text is defused
    pub fn block_comment<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        self.out.push_str("/*\n");
        for line in lines {
            let _ = writeln!(self.out, " * {}", line.replace("*/", "* /"));
        }
        self.out.push_str(" */\n");
    }

    pub fn define(&mut self, definition: &Definition) {
        self.blank();
        for comment in &definition.comments {
            self.comment(comment);
        }
        let _ = writeln!(self.out, "define {}:", crate::naming::quoted(&definition.name));
        for line in definition.body.lines() {
            let _ = writeln!(self.out, "  {}", line);
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}
