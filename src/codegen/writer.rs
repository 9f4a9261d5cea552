/// Column trailing comments are right-aligned to, when the line is shorter.
const COMMENT_COLUMN: usize = 40;

pub struct Writer {
    output: String,
    indent_unit: &'static str,
    comment_prefix: &'static str,
    depth: usize,
    lines: usize,
    /// Line count at each open block, to detect blocks left empty.
    blocks: Vec<usize>,
}

impl Writer {
    pub fn new(indent_unit: &'static str, comment_prefix: &'static str) -> Self {
        Self {
            output: String::new(),
            indent_unit,
            comment_prefix,
            depth: 0,
            lines: 0,
            blocks: Vec::new(),
        }
    }

    pub fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.output.push_str(self.indent_unit);
        }
        self.output.push_str(text);
        self.output.push('\n');
        self.lines += 1;
    }

    pub fn line_with_comment(&mut self, text: &str, comment: &str) {
        let width = self.depth * self.indent_unit.len() + text.len();
        let padding = COMMENT_COLUMN.saturating_sub(width).max(1);
        let line = format!("{text}{}{} {comment}", " ".repeat(padding), self.comment_prefix);
        self.line(&line);
    }

    pub fn comment(&mut self, comment: &str) {
        let line = format!("{} {comment}", self.comment_prefix);
        self.line(&line);
    }

    /// Writes at column zero regardless of the current depth.
    pub fn label(&mut self, text: &str) {
        let depth = std::mem::take(&mut self.depth);
        self.line(text);
        self.depth = depth;
    }

    pub fn blank(&mut self) {
        self.output.push('\n');
    }

    /// Appends pre-formatted text verbatim.
    pub fn raw(&mut self, text: &str) {
        self.output.push_str(text);
        self.lines += text.lines().count();
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn open_block(&mut self) {
        self.blocks.push(self.lines);
        self.indent();
    }

    /// Closes the innermost block, writing `filler` first if it stayed empty.
    pub fn close_block(&mut self, filler: &str) {
        if self.blocks.pop() == Some(self.lines) {
            self.line(filler);
        }
        self.dedent();
    }

    pub fn finish(self) -> String {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_comments_and_fills_empty_blocks() {
        let mut writer = Writer::new("    ", "#");
        writer.line("while True:");
        writer.open_block();
        writer.line_with_comment("t0 = 1", "spill");
        writer.line("if t0:");
        writer.open_block();
        writer.close_block("pass");
        writer.close_block("pass");
        writer.label("done");

        let text = writer.finish();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[1].find('#'), Some(COMMENT_COLUMN));
        assert!(lines[1].starts_with("    t0 = 1 "));
        assert_eq!(lines[3], "        pass");
        assert_eq!(lines[4], "done");
    }
}
