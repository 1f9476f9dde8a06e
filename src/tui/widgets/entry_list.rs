use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use crate::models::PlanningEntry;
use crate::tui::widgets::calendar_view::thumbnail_marker;
use crate::tui::widgets::color::{parse_color, Palette};
use crate::tui::widgets::truncate;

const PREVIEW_LINES: usize = 2;

/// Word-wrap `content` into at most `max_lines` lines of `width` chars.
/// A cut preview ends with an ellipsis.
pub fn content_preview(content: &str, width: usize, max_lines: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut truncated = false;

    for word in content.split_whitespace() {
        let needed = if current.is_empty() { word.chars().count() } else { current.chars().count() + 1 + word.chars().count() };
        if needed <= width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if lines.len() == max_lines {
            truncated = true;
            break;
        }
        current = truncate(word, width);
    }
    if !truncated && !current.is_empty() {
        if lines.len() < max_lines {
            lines.push(current);
        } else {
            truncated = true;
        }
    }
    if truncated {
        if let Some(last) = lines.last_mut() {
            let cut = truncate(&format!("{}…", last), width);
            *last = if cut.ends_with('…') { cut } else { format!("{}…", cut) };
        }
    }
    lines
}

fn entry_item(entry: &PlanningEntry, width: usize, palette: &Palette) -> ListItem<'static> {
    let fields = &entry.fields;
    let base = Style::default().fg(palette.fg);
    let accent = base.fg(parse_color(fields.business.theme()));

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("{} {}", fields.business.icon(), fields.business.label()), accent.add_modifier(Modifier::BOLD)),
            Span::styled(format!("  {}", fields.date), base.add_modifier(Modifier::DIM)),
        ]),
        Line::from(Span::styled(
            truncate(entry.title().unwrap_or("Untitled Post"), width),
            base.add_modifier(Modifier::BOLD),
        )),
    ];

    let preview = content_preview(fields.content.as_deref().unwrap_or(""), width, PREVIEW_LINES);
    if preview.is_empty() {
        lines.push(Line::from(Span::styled("No notes", base.add_modifier(Modifier::DIM | Modifier::ITALIC))));
    } else {
        lines.extend(preview.into_iter().map(|l| Line::from(Span::styled(l, base))));
    }

    let mut badges = vec![Span::styled(
        format!("[{} {}]", fields.post_type.icon(), fields.post_type.badge()),
        base.fg(parse_color(fields.post_type.color())),
    )];
    if let Some(status) = fields.status {
        badges.push(Span::raw(" "));
        badges.push(Span::styled(format!("[{}]", status.label()), base.fg(parse_color(status.color()))));
    }
    badges.push(Span::styled(thumbnail_marker(entry), base));
    lines.push(Line::from(badges));
    lines.push(Line::from(""));

    ListItem::new(Text::from(lines))
}

pub fn render_entry_list(
    f: &mut Frame,
    area: Rect,
    entries: &[PlanningEntry],
    list_state: &mut ListState,
    palette: &Palette,
) {
    let base = Style::default().fg(palette.fg).bg(palette.bg);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("All Content ({})", entries.len()))
        .style(base);

    if entries.is_empty() {
        let text = vec![
            Line::from(""),
            Line::from(Span::styled("No content yet", base.add_modifier(Modifier::BOLD))),
            Line::from("Start planning your content strategy by adding your first idea."),
        ];
        let paragraph = Paragraph::new(text).block(block).alignment(Alignment::Center);
        f.render_widget(paragraph, area);
        return;
    }

    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = entries.iter().map(|e| entry_item(e, width, palette)).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(palette.highlight_bg).fg(palette.highlight_fg))
        .highlight_symbol("▌");
    f.render_stateful_widget(list, area, list_state);
}
