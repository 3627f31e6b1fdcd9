use chrono::{DateTime, Local, Timelike};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::config::{AppConfig, ThemeConfig};
use crate::db::{Note, Notebook, UNTITLED};

pub const NOTE_TEXT_PLACEHOLDER: &str = "Add your note...";
pub const EMPTY_NOTES: &str = "No notes";
pub const EMPTY_NOTEBOOKS: &str = "No notebooks";

/// "Just now", "5 min ago", "3 hour ago", "2 day ago".
pub fn relative_age(posted_on: i64, now: i64) -> String {
    let minute = now.saturating_sub(posted_on).max(0) / 1000 / 60;
    let hour = minute / 60;
    let day = hour / 24;

    if minute < 1 {
        "Just now".to_string()
    } else if minute < 60 {
        format!("{} min ago", minute)
    } else if hour < 24 {
        format!("{} hour ago", hour)
    } else {
        format!("{} day ago", day)
    }
}

pub fn greeting(hour: u32) -> String {
    let part = match hour {
        0..=4 => "Night",
        5..=11 => "Morning",
        12..=14 => "Noon",
        15..=16 => "Afternoon",
        17..=19 => "Evening",
        _ => "Night",
    };
    format!("Good {}", part)
}

/// Formats like "Fri, Oct 16 2026".
pub fn date_label(now: DateTime<Local>) -> String {
    now.format("%a, %b %d %Y").to_string()
}

/// Flattens note text to one line and cuts it at `max_chars`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

/// UI-side mirror of what the store returned last.
///
/// Rebuildable at any time from the store; the only state it owns outright
/// is which notebook is active and which card is selected.
#[derive(Debug, Default)]
pub struct ViewState {
    notebooks: Vec<Notebook>,
    active_notebook_id: Option<String>,
    panel_title: String,
    notes: Vec<Note>,
    notes_state: ListState,
}

impl ViewState {
    pub fn notebooks(&self) -> &[Notebook] {
        &self.notebooks
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn panel_title(&self) -> &str {
        &self.panel_title
    }

    pub fn active_notebook_id(&self) -> Option<&str> {
        self.active_notebook_id.as_deref()
    }

    pub fn is_active(&self, notebook_id: &str) -> bool {
        self.active_notebook_id.as_deref() == Some(notebook_id)
    }

    pub fn can_create_note(&self) -> bool {
        !self.notebooks.is_empty()
    }

    /// Makes `notebook_id` the active entry. Whatever was active before stops
    /// being active because there is only one remembered id.
    pub fn activate(&mut self, notebook_id: &str) -> bool {
        match self.notebooks.iter().find(|nb| nb.id == notebook_id) {
            Some(nb) => {
                self.panel_title = nb.name.clone();
                self.active_notebook_id = Some(nb.id.clone());
                true
            }
            None => false,
        }
    }

    /// Id of the entry `delta` steps away from the active one, clamped to the list.
    pub fn neighbor_notebook(&self, delta: i32) -> Option<String> {
        if self.notebooks.is_empty() {
            return None;
        }
        let current = self
            .active_notebook_id
            .as_deref()
            .and_then(|id| self.notebooks.iter().position(|nb| nb.id == id));
        let next = match current {
            Some(i) => (i as i32 + delta).clamp(0, self.notebooks.len() as i32 - 1) as usize,
            None => 0,
        };
        Some(self.notebooks[next].id.clone())
    }

    pub fn notebooks_loaded(&mut self, notebooks: Vec<Notebook>) {
        self.notebooks = notebooks;
        self.active_notebook_id = None;
        self.panel_title.clear();
        self.notes.clear();
        self.notes_state.select(None);
        if let Some(first) = self.notebooks.first().map(|nb| nb.id.clone()) {
            self.activate(&first);
        }
    }

    pub fn notebook_created(&mut self, notebook: Notebook) {
        let id = notebook.id.clone();
        self.notebooks.push(notebook);
        self.activate(&id);
        self.notes_loaded(Vec::new());
    }

    pub fn notebook_renamed(&mut self, notebook: Notebook) {
        let id = notebook.id.clone();
        if let Some(slot) = self.notebooks.iter_mut().find(|nb| nb.id == id) {
            *slot = notebook;
        }
        self.activate(&id);
    }

    /// Drops the entry and returns the sibling that should become active:
    /// the next one, else the previous one. With no siblings left the panel
    /// is cleared.
    pub fn notebook_deleted(&mut self, notebook_id: &str) -> Option<String> {
        let index = self.notebooks.iter().position(|nb| nb.id == notebook_id)?;
        let sibling = self
            .notebooks
            .get(index + 1)
            .or_else(|| index.checked_sub(1).and_then(|i| self.notebooks.get(i)))
            .map(|nb| nb.id.clone());

        self.notebooks.remove(index);
        if self.is_active(notebook_id) {
            self.active_notebook_id = None;
        }

        if sibling.is_none() {
            self.active_notebook_id = None;
            self.panel_title.clear();
            self.notes.clear();
            self.notes_state.select(None);
        }
        sibling
    }

    pub fn notes_loaded(&mut self, notes: Vec<Note>) {
        self.notes = notes;
        self.notes_state
            .select(if self.notes.is_empty() { None } else { Some(0) });
    }

    pub fn note_created(&mut self, note: Note) {
        self.notes.insert(0, note);
        self.notes_state.select(Some(0));
    }

    pub fn note_updated(&mut self, note: Note) {
        if let Some(slot) = self.notes.iter_mut().find(|n| n.id == note.id) {
            *slot = note;
        }
    }

    pub fn note_deleted(&mut self, note_id: &str, remaining: Vec<Note>) {
        debug_assert!(remaining.iter().all(|n| n.id != note_id));
        let selected = self.notes_state.selected().unwrap_or(0);
        self.notes = remaining;
        if self.notes.is_empty() {
            self.notes_state.select(None);
        } else {
            self.notes_state
                .select(Some(selected.min(self.notes.len() - 1)));
        }
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.notes_state.selected().and_then(|i| self.notes.get(i))
    }

    pub fn move_note_selection(&mut self, delta: i32) {
        if self.notes.is_empty() {
            return;
        }
        let i = match self.notes_state.selected() {
            Some(i) => (i as i32 + delta).clamp(0, self.notes.len() as i32 - 1) as usize,
            None => 0,
        };
        self.notes_state.select(Some(i));
    }
}

pub fn notebook_item(notebook: &Notebook, active: bool, theme: &ThemeConfig) -> ListItem<'static> {
    let (marker, style) = if active {
        (
            "● ",
            Style::default()
                .fg(theme.active_notebook)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        ("  ", Style::default().fg(theme.foreground))
    };
    ListItem::new(Line::from(vec![
        Span::styled(marker, style),
        Span::styled(notebook.name.clone(), style),
    ]))
}

pub fn note_card(
    note: &Note,
    now: i64,
    preview_chars: usize,
    theme: &ThemeConfig,
) -> ListItem<'static> {
    let muted = Style::default().fg(theme.muted);

    let title = if note.title.trim().is_empty() {
        Span::styled(format!(" {}", UNTITLED), muted.add_modifier(Modifier::ITALIC))
    } else {
        Span::styled(
            format!(" {}", preview(&note.title, preview_chars)),
            Style::default()
                .fg(theme.foreground)
                .add_modifier(Modifier::BOLD),
        )
    };

    let body = if note.text.trim().is_empty() {
        Span::styled(format!("   {}", NOTE_TEXT_PLACEHOLDER), muted.add_modifier(Modifier::ITALIC))
    } else {
        Span::styled(
            format!("   {}", preview(&note.text, preview_chars)),
            Style::default().fg(theme.foreground),
        )
    };

    ListItem::new(vec![
        Line::from(title),
        Line::from(body),
        Line::from(Span::styled(
            format!("   {}", relative_age(note.posted_on, now)),
            muted,
        )),
        Line::from(""),
    ])
}

fn border_style(theme: &ThemeConfig, focused: bool) -> Style {
    Style::default().fg(if focused {
        theme.border_active
    } else {
        theme.border_inactive
    })
}

pub fn render_header(f: &mut Frame, area: Rect, now: DateTime<Local>, config: &AppConfig) {
    let theme = &config.theme;
    let mut lines = Vec::new();
    if config.general.show_greeting {
        lines.push(Line::from(Span::styled(
            greeting(now.hour()),
            Style::default()
                .fg(theme.greeting)
                .add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(Span::styled(
        date_label(now),
        Style::default().fg(theme.header),
    )));

    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

pub fn render_sidebar(
    f: &mut Frame,
    area: Rect,
    view: &ViewState,
    theme: &ThemeConfig,
    focused: bool,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Notebooks ")
        .border_style(border_style(theme, focused));

    if view.notebooks().is_empty() {
        let p = Paragraph::new(format!("\n{}\n\n a: New notebook", EMPTY_NOTEBOOKS))
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.muted));
        f.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = view
        .notebooks()
        .iter()
        .map(|nb| notebook_item(nb, view.is_active(&nb.id), theme))
        .collect();

    let mut state = ListState::default();
    state.select(
        view.active_notebook_id()
            .and_then(|id| view.notebooks().iter().position(|nb| nb.id == id)),
    );

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(theme.selection_bg)
            .add_modifier(Modifier::BOLD),
    );
    f.render_stateful_widget(list, area, &mut state);
}

pub fn render_note_panel(
    f: &mut Frame,
    area: Rect,
    view: &mut ViewState,
    config: &AppConfig,
    now: i64,
    focused: bool,
) {
    let theme = &config.theme;
    let title = if view.panel_title().is_empty() {
        " Notes ".to_string()
    } else {
        format!(" {} ", view.panel_title())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style(theme, focused));

    if view.active_notebook_id().is_none() {
        f.render_widget(block, area);
        return;
    }

    if view.notes().is_empty() {
        let inner = block.inner(area);
        f.render_widget(block, area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(40),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(inner);
        let placeholder = Paragraph::new(vec![
            Line::from(Span::styled(
                EMPTY_NOTES,
                Style::default().fg(theme.muted).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "n: New note",
                Style::default().fg(theme.muted),
            )),
        ])
        .alignment(Alignment::Center);
        f.render_widget(placeholder, rows[1]);
        return;
    }

    let preview_chars = config.general.card_preview_chars;
    let items: Vec<ListItem> = view
        .notes()
        .iter()
        .map(|n| note_card(n, now, preview_chars, theme))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(theme.selection_bg)
                .fg(theme.selection_fg),
        )
        .highlight_symbol(">");
    f.render_stateful_widget(list, area, &mut view.notes_state);
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
pub(crate) fn buffer_text(buffer: &ratatui::buffer::Buffer) -> String {
    let width = buffer.area.width as usize;
    buffer
        .content()
        .chunks(width)
        .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
