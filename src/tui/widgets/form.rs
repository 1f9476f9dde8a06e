use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};
use ratatui::Frame;

use crate::config::KeyBindings;
use crate::models::{Business, PostType, Status};
use crate::tui::app::{EntryForm, FormField};
use crate::tui::widgets::color::{parse_color, Palette};
use crate::tui::widgets::editor::Editor;
use crate::tui::widgets::popup_area;
use crate::utils::format_key_binding_for_display;

const LABEL_WIDTH: u16 = 15;
const NOTES_HEIGHT: u16 = 5;

/// Approximate decoded size of a base64 data URL, in KB
fn data_url_kb(data_url: &str) -> usize {
    let payload = data_url.split_once(',').map(|(_, p)| p).unwrap_or(data_url);
    (payload.len() * 3 / 4).div_ceil(1024)
}

/// One-line summary of the image slot
pub fn image_summary(form: &EntryForm) -> String {
    if let Some(job) = &form.image_job {
        let name = job.source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        return format!("Compressing {}...", name);
    }
    match &form.draft.image_data {
        Some(data) => format!("Attached JPEG (~{} KB)", data_url_kb(data)),
        None => "None".to_string(),
    }
}

/// Border color follows the business being edited
pub fn accent_color(form: &EntryForm) -> Color {
    parse_color(form.draft.business.theme())
}

/// Visible slice of a single-line editor and the cursor column inside it
fn single_line_view(editor: &Editor, width: usize) -> (String, usize) {
    let line = editor.lines.get(editor.cursor_line).map(String::as_str).unwrap_or("");
    let width = width.max(1);
    let start = (editor.cursor_col + 1).saturating_sub(width);
    let visible: String = line.chars().skip(start).take(width).collect();
    (visible, editor.cursor_col - start)
}

fn choice_spans<T: Copy + PartialEq>(
    options: &[T],
    selected: T,
    label: impl Fn(T) -> String,
    active: bool,
    palette: &Palette,
) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for option in options {
        let text = format!(" {} ", label(*option));
        let style = if *option == selected {
            let style = Style::default().add_modifier(Modifier::BOLD);
            if active {
                style.fg(palette.highlight_fg).bg(palette.highlight_bg)
            } else {
                style.add_modifier(Modifier::REVERSED)
            }
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        spans.push(Span::styled(text, style));
        spans.push(Span::raw(" "));
    }
    spans
}

fn label_span(field: FormField, active: bool, palette: &Palette) -> Span<'static> {
    let marker = if active { "▸ " } else { "  " };
    let style = if active {
        Style::default().fg(palette.today_fg).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.fg)
    };
    Span::styled(format!("{}{}", marker, field.label()), style)
}

pub fn render_form(f: &mut Frame, area: Rect, form: &mut EntryForm, bindings: &KeyBindings, palette: &Palette) {
    let popup = popup_area(area, 80, 90);
    if popup.width < LABEL_WIDTH + 10 || popup.height < 8 {
        return;
    }
    f.render_widget(Clear, popup);

    let title = if form.is_dirty() {
        format!(" {} * ", form.title())
    } else {
        format!(" {} ", form.title())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(accent_color(form)))
        .style(Style::default().fg(palette.fg).bg(palette.bg));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let [fields_area, footer_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
    let rows = Layout::vertical([
        Constraint::Length(1), // Business
        Constraint::Length(1), // Date
        Constraint::Length(1), // Type
        Constraint::Length(1), // Status
        Constraint::Length(1), // Title
        Constraint::Length(NOTES_HEIGHT),
        Constraint::Length(2), // Image summary + path
        Constraint::Length(1), // Link
        Constraint::Min(0),
    ])
    .split(fields_area);

    let mut cursor = None;
    for (field, row) in FormField::ALL.iter().zip(rows.iter()) {
        let active = form.current_field == *field;
        let [label_area, value_area] =
            Layout::horizontal([Constraint::Length(LABEL_WIDTH), Constraint::Min(1)]).areas(*row);
        f.render_widget(Paragraph::new(label_span(*field, active, palette)), label_area);

        let draft = &form.draft;
        let value: Option<Line> = match field {
            FormField::Business => Some(Line::from(choice_spans(
                &Business::ALL,
                draft.business,
                |b| format!("{} {}", b.icon(), b.label()),
                active,
                palette,
            ))),
            FormField::Type => {
                let mut spans = choice_spans(
                    &PostType::ALL,
                    draft.post_type,
                    |t| format!("{} {}", t.icon(), t.label()),
                    active,
                    palette,
                );
                if form.origin.type_locked() {
                    spans.push(Span::styled("(fixed)", Style::default().add_modifier(Modifier::DIM)));
                }
                Some(Line::from(spans))
            }
            FormField::Status => Some(Line::from(choice_spans(
                &Status::ALL,
                draft.status,
                |s| s.label().to_string(),
                active,
                palette,
            ))),
            _ => None,
        };
        if let Some(line) = value {
            f.render_widget(Paragraph::new(line), value_area);
            continue;
        }

        match field {
            FormField::Content => {
                let height = value_area.height as usize;
                form.content.update_scroll(height);
                let editor = &form.content;
                let total = editor.lines.len();
                let [text_area, bar_area] =
                    Layout::horizontal([Constraint::Min(1), Constraint::Length(1)]).areas(value_area);
                let lines: Vec<Line> = editor.visible_lines(height).iter().map(|l| Line::from(l.clone())).collect();
                let style = if active { Style::default().add_modifier(Modifier::UNDERLINED) } else { Style::default() };
                f.render_widget(Paragraph::new(lines).style(style), text_area);
                if total > height {
                    let mut state = ScrollbarState::new(total)
                        .viewport_content_length(height)
                        .position(editor.scroll_offset);
                    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                        .begin_symbol(Some("↑"))
                        .end_symbol(Some("↓"));
                    f.render_stateful_widget(scrollbar, bar_area, &mut state);
                }
                if active {
                    cursor = editor.cursor_screen_pos(text_area);
                }
            }
            FormField::ImagePath => {
                let [summary_area, path_area] =
                    Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(value_area);
                let mut summary = image_summary(form);
                if form.draft.image_data.is_some() && !form.external_link.text().trim().is_empty() {
                    summary.push_str("  (shown instead of link)");
                }
                f.render_widget(
                    Paragraph::new(summary).style(Style::default().add_modifier(Modifier::ITALIC)),
                    summary_area,
                );
                if let Some(pos) = render_single_line(f, path_area, &form.image_path, active, "path to PNG/JPEG") {
                    cursor = Some(pos);
                }
            }
            FormField::Date | FormField::Title | FormField::ExternalLink => {
                let (editor, placeholder) = match field {
                    FormField::Date => (&form.date, "YYYY-MM-DD"),
                    FormField::Title => (&form.title, "Untitled"),
                    _ => (&form.external_link, "https://"),
                };
                if let Some(pos) = render_single_line(f, value_area, editor, active, placeholder) {
                    cursor = Some(pos);
                }
            }
            _ => {}
        }
    }

    let hints = format!(
        "Tab: next field • Space/←→: change • {}: save • {}: attach • {}: remove image • Esc: close",
        format_key_binding_for_display(&bindings.save),
        format_key_binding_for_display(&bindings.attach_image),
        format_key_binding_for_display(&bindings.remove_image),
    );
    f.render_widget(
        Paragraph::new(hints).style(Style::default().add_modifier(Modifier::DIM)),
        footer_area,
    );

    if let Some((x, y)) = cursor {
        f.set_cursor_position((x, y));
    }
}

fn render_single_line(f: &mut Frame, area: Rect, editor: &Editor, active: bool, placeholder: &str) -> Option<(u16, u16)> {
    let (visible, col) = single_line_view(editor, area.width as usize);
    let paragraph = if visible.is_empty() && !active {
        Paragraph::new(Span::styled(placeholder.to_string(), Style::default().add_modifier(Modifier::DIM)))
    } else {
        let style = if active { Style::default().add_modifier(Modifier::UNDERLINED) } else { Style::default() };
        Paragraph::new(Span::styled(visible, style))
    };
    f.render_widget(paragraph, area);
    active.then(|| (area.x + col as u16, area.y))
}
