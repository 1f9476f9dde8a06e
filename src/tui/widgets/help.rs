use ratatui::layout::{Alignment, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::config::KeyBindings;
use crate::tui::widgets::color::Palette;
use crate::tui::widgets::popup_area;
use crate::utils::format_key_binding_for_display as key;

pub fn render_help(f: &mut Frame, area: Rect, bindings: &KeyBindings, palette: &Palette) {
    let popup = popup_area(area, 60, 80);
    f.render_widget(Clear, popup);

    let style = Style::default().fg(palette.fg).bg(palette.bg);
    let paragraph = Paragraph::new(build_help_text(bindings))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help - Key Bindings")
                .title_alignment(Alignment::Center)
                .style(style),
        )
        .style(style)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, popup);
}

fn build_help_text(b: &KeyBindings) -> String {
    let mut text = String::from("Calendar:\n");
    text.push_str("  ←↓↑→ / hjkl: Move between days\n");
    text.push_str("  Tab: Cycle entries on the selected day\n");
    text.push_str(&format!("  {} / {}: Previous / next month\n", key(&b.prev_month), key(&b.next_month)));
    text.push_str(&format!("  {}: Jump to today\n", key(&b.today)));
    text.push_str(&format!("  {}: Switch calendar / list view\n", key(&b.toggle_view)));
    text.push('\n');

    text.push_str("Content:\n");
    text.push_str(&format!("  {}: New content on the selected day\n", key(&b.new)));
    text.push_str(&format!("  {}: New content idea (any type)\n", key(&b.new_any)));
    text.push_str(&format!("  {}: Plan monthly blog\n", key(&b.plan_blog)));
    text.push_str(&format!("  {}: Edit selected entry\n", key(&b.edit)));
    text.push_str(&format!("  {}: Delete selected entry\n", key(&b.delete)));
    text.push('\n');

    text.push_str("Form:\n");
    text.push_str("  Tab / Shift+Tab: Next / previous field\n");
    text.push_str("  Space / ←→: Change business, type or status\n");
    text.push_str(&format!("  {}: Save\n", key(&b.save)));
    text.push_str(&format!("  {}: Compress and attach image from path\n", key(&b.attach_image)));
    text.push_str(&format!("  {}: Remove image\n", key(&b.remove_image)));
    text.push_str("  Esc: Close without saving\n");
    text.push('\n');

    text.push_str("General:\n");
    text.push_str(&format!("  {}: Show/hide help\n", key(&b.help)));
    text.push_str(&format!("  {}: Quit\n", key(&b.quit)));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text_follows_bindings() {
        let mut bindings = KeyBindings::default();
        bindings.plan_blog = "p".to_string();
        let text = build_help_text(&bindings);
        assert!(text.contains("p: Plan monthly blog"));
        assert!(text.contains(&format!("{}: Save", key(&bindings.save))));
    }
}
