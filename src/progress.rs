use std::io::Write;

/// Move the cursor up one line and clear it
const CURSOR_UP: &str = "\x1b[A\x1b[K";

/// Receives extraction progress notifications
pub trait Progress {
    /// Called once before the first layer
    fn start(&mut self, total: usize);
    /// Called before layer `index` (1-based) of `total` is extracted
    fn layer(&mut self, index: usize, total: usize, id: &str);
    /// Called after the last layer
    fn finish(&mut self);
}

/// Writes `Extracting ... (i/total)` lines, rewriting the previous line in place
/// when the output is a terminal.
pub struct LineProgress<W: Write> {
    out: W,
    rewrite: bool,
}

impl<W: Write> LineProgress<W> {
    pub fn new(out: W, rewrite: bool) -> Self {
        LineProgress { out, rewrite }
    }

    fn line(&mut self, replace: bool, text: &str) {
        // Progress is cosmetic; a closed stdout must not fail the extraction
        if replace && self.rewrite {
            let _ = write!(self.out, "{}", CURSOR_UP);
        }
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Progress for LineProgress<W> {
    fn start(&mut self, total: usize) {
        self.line(false, &format!("Extracting ... (0/{})", total));
    }

    fn layer(&mut self, index: usize, total: usize, _id: &str) {
        self.line(true, &format!("Extracting ... ({}/{})", index, total));
    }

    fn finish(&mut self) {
        self.line(true, "Extract done");
    }
}
