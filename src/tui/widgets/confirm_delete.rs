use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::tui::widgets::color::Palette;
use crate::tui::widgets::popup_area;

pub const OPTIONS: [&str; 2] = ["Delete", "Cancel"];

pub fn render_confirm_delete(f: &mut Frame, area: Rect, title: &str, selection: usize, palette: &Palette) {
    let popup = popup_area(area, 50, 40);
    f.render_widget(Clear, popup);

    let base = Style::default().fg(palette.fg).bg(palette.bg);
    let mut lines = vec![
        Line::from(Span::styled("Are you sure you want to delete this content?", base)),
        Line::from(""),
        Line::from(Span::styled(title.to_string(), base.add_modifier(Modifier::BOLD))),
        Line::from(""),
    ];

    for (index, option) in OPTIONS.iter().enumerate() {
        let (prefix, style) = if index == selection {
            ("> ", Style::default().fg(palette.highlight_fg).bg(palette.highlight_bg))
        } else {
            ("  ", base)
        };
        lines.push(Line::from(Span::styled(format!("{}{}", prefix, option), style)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "↑↓ choose • Enter confirm • Esc cancel",
        base.add_modifier(Modifier::DIM),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Delete Content")
                .title_alignment(Alignment::Center)
                .style(base),
        )
        .style(base)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);
    f.render_widget(paragraph, popup);
}
