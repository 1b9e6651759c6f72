//! Indented line writer for generated C++

const INDENT: &str = "    ";

/// Accumulates lines of generated code with brace-block indentation
#[derive(Debug, Default)]
pub struct CodeWriter {
    buffer: String,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buffer.push_str(INDENT);
            }
            self.buffer.push_str(text);
        }
        self.buffer.push('\n');
    }

    /// `{` on its own line, then indent
    pub fn open_block(&mut self) {
        self.line("{");
        self.depth += 1;
    }

    /// Dedent, then `}` on its own line
    pub fn close_block(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    /// `head` followed by an opened block
    pub fn block_start(&mut self, head: impl AsRef<str>) {
        self.line(head);
        self.open_block();
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_indent() {
        let mut w = CodeWriter::new();
        w.block_start("namespace a");
        w.line("struct B;");
        w.open_block();
        w.line("int c;");
        w.close_block();
        w.line("");
        w.close_block();
        assert_eq!(w.depth(), 0);
        assert_eq!(
            w.finish(),
            "namespace a\n{\n    struct B;\n    {\n        int c;\n    }\n\n}\n"
        );
    }

    #[test]
    fn test_unbalanced_close_does_not_underflow() {
        let mut w = CodeWriter::new();
        w.close_block();
        assert_eq!(w.finish(), "}\n");
    }
}
