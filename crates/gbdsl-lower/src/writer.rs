//! Line-oriented text writer with indentation and line counting.

const INDENT: &str = "    ";

/// Accumulates emitted C source one line at a time.
#[derive(Debug, Clone, Default)]
pub struct CodeWriter {
    buf: String,
    indent: usize,
    lines: u32,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.buf.push_str(INDENT);
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
        self.lines += 1;
    }

    /// Write every line of a multi-line block, re-indented.
    pub fn lines(&mut self, text: &str) {
        for l in text.lines() {
            self.line(l);
        }
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    /// `header {` and indent.
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(format!("{} {{", header.as_ref()));
        self.indent += 1;
    }

    /// Dedent and `}`.
    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Dedent and write `text`, e.g. `} else {` or `};`.
    pub fn close_with(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// `} else {`-style continuation: dedent, write, indent again.
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.close_with(text);
        self.indent += 1;
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.indent
    }

    /// 1-based number of the next line to be written.
    pub fn current_line(&self) -> u32 {
        self.lines + 1
    }

    pub fn line_count(&self) -> u32 {
        self.lines
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
