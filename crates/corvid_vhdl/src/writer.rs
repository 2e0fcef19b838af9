//! Line-oriented text output with indentation.

/// Accumulates VHDL source one line at a time.
#[derive(Debug, Clone)]
pub(crate) struct Writer {
    out: String,
    unit: String,
    level: usize,
}

impl Writer {
    pub fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            unit: " ".repeat(indent),
            level: 0,
        }
    }

    /// Writes one line at the current indentation. Empty lines carry no
    /// trailing whitespace.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.level {
                self.out.push_str(&self.unit);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lines_are_indented() {
        let mut w = Writer::new(2);
        w.line("begin");
        w.indent();
        w.line("x <= y;");
        w.line("");
        w.dedent();
        w.dedent();
        w.line("end;");
        assert_eq!(w.finish(), "begin\n  x <= y;\n\nend;\n");
    }
}
