use gdk_api::GameSurface;
use std::io::Write;

/// Shows a game on standard output
pub struct TerminalSurface<W: Write> {
    out: W,
    title: Option<String>,
}

impl TerminalSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out, title: None }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> GameSurface for TerminalSurface<W> {
    fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
        let _ = writeln!(self.out, "🎮 {title}");
        let _ = writeln!(self.out, "{}", "=".repeat(60));
    }

    fn show(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}
