/// Destination for printed source text.
pub trait OutputSink {
    fn print(&mut self, text: &str);
    fn println(&mut self);
}

impl OutputSink for String {
    fn print(&mut self, text: &str) {
        self.push_str(text);
    }

    fn println(&mut self) {
        self.push('\n');
    }
}

/// Indentation-aware writer over an [`OutputSink`].
pub struct Output<'a> {
    sink: &'a mut dyn OutputSink,
    indent_width: usize,
    level: usize,
    line_start: bool,
}

impl<'a> Output<'a> {
    pub fn new(sink: &'a mut dyn OutputSink, indent_width: usize) -> Self {
        Self {
            sink,
            indent_width,
            level: 0,
            line_start: true,
        }
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn print(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.line_start {
            let pad = " ".repeat(self.level * self.indent_width);
            self.sink.print(&pad);
            self.line_start = false;
        }
        self.sink.print(text);
    }

    pub fn println(&mut self) {
        self.sink.println();
        self.line_start = true;
    }
}
