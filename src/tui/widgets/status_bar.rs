use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::tui::widgets::color::Palette;
use crate::tui::widgets::truncate;

const SEPARATOR: &str = " • ";
const MORE: &str = "...";

/// Join as many hints as fit in `width`, ending with "..." when some were dropped
pub fn fit_hints(hints: &[String], width: usize) -> String {
    let mut text = String::new();
    for (i, hint) in hints.iter().enumerate() {
        let extra = if i == 0 { 0 } else { SEPARATOR.chars().count() };
        if text.chars().count() + extra + hint.chars().count() > width {
            if text.is_empty() {
                return truncate(hint, width);
            }
            if text.chars().count() + MORE.len() > width {
                text = text.chars().take(width.saturating_sub(MORE.len())).collect();
            }
            text.push_str(MORE);
            return text;
        }
        if i > 0 {
            text.push_str(SEPARATOR);
        }
        text.push_str(hint);
    }
    text
}

/// One-line bar: the timed message when set, key hints otherwise
pub fn render_status_bar(f: &mut Frame, area: Rect, message: Option<&str>, key_hints: &[String], palette: &Palette) {
    let width = area.width as usize;
    let (content, style) = match message {
        Some(msg) => (
            truncate(msg, width),
            Style::default()
                .fg(palette.highlight_fg)
                .bg(palette.highlight_bg)
                .add_modifier(Modifier::BOLD),
        ),
        None => (fit_hints(key_hints, width), Style::default().fg(palette.fg).bg(palette.bg)),
    };
    f.render_widget(Paragraph::new(content).style(style), area);
}
