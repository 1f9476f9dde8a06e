use ratatui::layout::{Alignment, Constraint, Layout as RatatuiLayout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::models::Business;
use crate::tui::app::{App, Mode, ViewMode};
use crate::tui::widgets::{
    calendar_view::render_calendar,
    color::{parse_color, Palette},
    confirm_delete::render_confirm_delete,
    entry_list::render_entry_list,
    form::render_form,
    help::render_help,
    status_bar::render_status_bar,
};
use crate::tui::Layout;
use crate::utils::format_key_binding_for_display as key;

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let palette = Palette::from_theme(&app.config.get_active_theme());
    let base = Style::default().fg(palette.fg).bg(palette.bg);

    let who = app.services.identity().map(|i| i.display().to_string());
    let title = match who {
        Some(name) => format!(" Content Calendar · {} ", name),
        None => " Content Calendar ".to_string(),
    };
    let outer = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_alignment(Alignment::Center)
        .style(base);
    f.render_widget(outer, f.area());

    if app.is_loading() {
        render_loading(f, app, layout, &palette);
    } else {
        render_header(f, app, layout, &palette);
        match app.ui.view {
            ViewMode::Calendar => render_calendar(f, layout.main_area, app, &palette),
            ViewMode::List => {
                let entries = app.entries.as_deref().unwrap_or(&[]);
                render_entry_list(f, layout.main_area, entries, &mut app.ui.list_state, &palette);
            }
        }
    }

    match app.ui.mode {
        Mode::Form => {
            if let Some(form) = app.form.entry_form.as_mut() {
                render_form(f, f.area(), form, &app.config.key_bindings, &palette);
            }
        }
        Mode::ConfirmDelete => {
            let title = app
                .modals
                .delete_confirmation
                .as_ref()
                .and_then(|id| app.all_entries().iter().find(|e| &e.id == id))
                .map(|e| e.title().unwrap_or("Untitled").to_string())
                .unwrap_or_default();
            render_confirm_delete(f, f.area(), &title, app.modals.delete_modal_selection, &palette);
        }
        Mode::Help => render_help(f, f.area(), &app.config.key_bindings, &palette),
        Mode::View => {}
    }

    let hints = key_hints(app);
    render_status_bar(f, layout.status_area, app.status.message.as_deref(), &hints, &palette);
}

fn render_loading(f: &mut Frame, app: &App, layout: &Layout, palette: &Palette) {
    let base = Style::default().fg(palette.fg).bg(palette.bg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("Connecting...", base.add_modifier(Modifier::BOLD))),
    ];
    if let Some(error) = &app.auth_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(error.clone(), base.fg(palette.today_fg))));
        lines.push(Line::from("Pass a valid --token or set auth_token in the config."));
    }
    let area = layout.header_area.union(layout.main_area);
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center).style(base), area);
}

fn render_header(f: &mut Frame, app: &App, layout: &Layout, palette: &Palette) {
    let base = Style::default().fg(palette.fg).bg(palette.bg);
    let [left, right] =
        RatatuiLayout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).areas(layout.header_area);

    let heading = match app.ui.view {
        ViewMode::Calendar => app.ui.month.label(),
        ViewMode::List => "All Content".to_string(),
    };
    let mut spans = vec![Span::styled(heading, base.add_modifier(Modifier::BOLD))];
    spans.push(Span::styled(format!("  [{}]", app.ui.view.label()), base.add_modifier(Modifier::DIM)));
    f.render_widget(Paragraph::new(Line::from(spans)), left);

    let mut legend = Vec::new();
    for business in Business::ALL {
        legend.push(Span::styled(
            format!("{} {}  ", business.icon(), business.label()),
            base.fg(parse_color(business.theme())),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(legend)).alignment(Alignment::Right), right);
}

fn key_hints(app: &App) -> Vec<String> {
    let b = &app.config.key_bindings;
    match app.ui.mode {
        Mode::Help => vec![format!("Esc or {}: Exit help", key(&b.help))],
        Mode::ConfirmDelete => vec!["Enter: Confirm".to_string(), "Esc: Cancel".to_string()],
        Mode::Form => vec![
            "Tab: Next field".to_string(),
            format!("{}: Save", key(&b.save)),
            "Esc: Close".to_string(),
        ],
        Mode::View if app.is_loading() => vec![format!("{}: Quit", key(&b.quit))],
        Mode::View => {
            let mut hints = vec![
                format!("{}: Quit", key(&b.quit)),
                format!("{}: New", key(&b.new)),
                format!("{}: New idea", key(&b.new_any)),
                format!("{}: Plan blog", key(&b.plan_blog)),
                format!("{}: Edit", key(&b.edit)),
                format!("{}: Delete", key(&b.delete)),
                format!("{}: View", key(&b.toggle_view)),
            ];
            if app.ui.view == ViewMode::Calendar {
                hints.push(format!("{}/{}: Month", key(&b.prev_month), key(&b.next_month)));
                hints.push(format!("{}: Today", key(&b.today)));
            }
            hints.push(format!("{}: Help", key(&b.help)));
            hints
        }
    }
}
