//! Terminal widgets a remote adapter can drive

/// A terminal emulator surface fed with raw pane bytes
pub trait TerminalWidget {
    /// Feed bytes as the pane wrote them
    fn write(&mut self, data: &[u8]);

    /// Clear all state, keeping the size
    fn reset(&mut self);

    fn resize(&mut self, cols: u16, rows: u16);

    /// Current size as `(cols, rows)`
    fn size(&self) -> (u16, u16);
}

const SCROLLBACK: usize = 1000;

/// In-memory widget backed by a `vt100` parser
pub struct Vt100Widget {
    parser: vt100::Parser,
}

impl Vt100Widget {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            parser: vt100::Parser::new(rows, cols, SCROLLBACK),
        }
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    /// Visible text, rows joined with `\n`
    pub fn contents(&self) -> String {
        self.parser.screen().contents()
    }
}

impl Default for Vt100Widget {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl TerminalWidget for Vt100Widget {
    fn write(&mut self, data: &[u8]) {
        self.parser.process(data);
    }

    fn reset(&mut self) {
        let (rows, cols) = self.parser.screen().size();
        self.parser = vt100::Parser::new(rows, cols, SCROLLBACK);
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.parser.set_size(rows, cols);
    }

    fn size(&self) -> (u16, u16) {
        let (rows, cols) = self.parser.screen().size();
        (cols, rows)
    }
}
