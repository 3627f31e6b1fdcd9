//! Overlay dialogs: the note editor, delete confirmation and the notebook
//! name field.
//!
//! A modal never talks to the store. When the user submits, it hands back the
//! action registered through [`Modal::on_submit`] together with the collected
//! value, and the caller decides what to do with it.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use tui_textarea::TextArea;

use crate::config::ThemeConfig;
use crate::db::{Note, NoteInput, UNTITLED};
use crate::error::StoreError;
use crate::view::{centered_rect, NOTE_TEXT_PLACEHOLDER};

/// What a key press did to a modal.
#[derive(Debug, PartialEq, Eq)]
pub enum ModalEvent<A, V> {
    /// Still open, nothing to act on.
    Pending,
    /// The user submitted. The modal stays open until the caller closes it.
    Submitted(A, V),
    /// Closed without submitting.
    Cancelled,
}

pub trait Modal {
    type Action: Clone;
    type Value;

    fn open(&mut self);
    fn close(&mut self);
    fn is_open(&self) -> bool;

    /// Registers what should happen when the modal is submitted.
    fn on_submit(&mut self, action: Self::Action);

    fn handle_key(&mut self, key: KeyEvent) -> ModalEvent<Self::Action, Self::Value>;

    fn render(&mut self, f: &mut Frame, area: Rect, theme: &ThemeConfig);

    /// Closes the modal if it is open. Returns whether anything changed.
    fn escape(&mut self) -> bool {
        if self.is_open() {
            self.close();
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteSubmit {
    Create { notebook_id: String },
    Update { note_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteField {
    Title,
    Text,
}

pub struct NoteModal<'a> {
    open: bool,
    title: TextArea<'a>,
    text: TextArea<'a>,
    field: NoteField,
    time_label: String,
    submit_enabled: bool,
    action: Option<NoteSubmit>,
}

impl<'a> NoteModal<'a> {
    /// A blank editor for a new note.
    pub fn new() -> Self {
        let mut modal = Self {
            open: false,
            title: TextArea::default(),
            text: TextArea::default(),
            field: NoteField::Title,
            time_label: String::new(),
            submit_enabled: false,
            action: None,
        };
        modal.title.set_placeholder_text(UNTITLED);
        modal.text.set_placeholder_text(NOTE_TEXT_PLACEHOLDER);
        modal
    }

    /// An editor filled with an existing note. `time_label` goes in the footer.
    pub fn with_note(note: &Note, time_label: String) -> Self {
        let mut modal = Self::new();
        modal.title = TextArea::from(note.title.lines());
        modal.title.set_placeholder_text(UNTITLED);
        modal.title.move_cursor(tui_textarea::CursorMove::End);
        modal.text = TextArea::from(note.text.split('\n'));
        modal.text.set_placeholder_text(NOTE_TEXT_PLACEHOLDER);
        modal.text.move_cursor(tui_textarea::CursorMove::Bottom);
        modal.text.move_cursor(tui_textarea::CursorMove::End);
        modal.time_label = time_label;
        modal.refresh_submit();
        modal
    }

    pub fn input(&self) -> NoteInput {
        NoteInput {
            title: self.title.lines().join(" "),
            text: self.text.lines().join("\n"),
        }
    }

    /// Checks the fields; both blank is the only rejected state.
    pub fn validated_input(&self) -> Result<NoteInput, StoreError> {
        let input = self.input();
        if input.is_blank() {
            Err(StoreError::EmptyInput)
        } else {
            Ok(input)
        }
    }

    pub fn is_submit_enabled(&self) -> bool {
        self.submit_enabled
    }

    pub fn insert_str(&mut self, text: &str) {
        match self.field {
            NoteField::Title => {
                self.title.insert_str(text.replace(['\r', '\n'], " "));
            }
            NoteField::Text => {
                self.text.insert_str(text.replace('\r', ""));
            }
        }
        self.refresh_submit();
    }

    fn refresh_submit(&mut self) {
        self.submit_enabled = self.validated_input().is_ok();
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            NoteField::Title => NoteField::Text,
            NoteField::Text => NoteField::Title,
        };
    }

    fn submit(&self) -> ModalEvent<NoteSubmit, NoteInput> {
        match (&self.action, self.validated_input()) {
            (Some(action), Ok(input)) if self.is_submit_enabled() => {
                ModalEvent::Submitted(action.clone(), input)
            }
            _ => ModalEvent::Pending,
        }
    }
}

impl Default for NoteModal<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Modal for NoteModal<'a> {
    type Action = NoteSubmit;
    type Value = NoteInput;

    fn open(&mut self) {
        self.open = true;
        self.field = NoteField::Title;
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn on_submit(&mut self, action: NoteSubmit) {
        self.action = Some(action);
    }

    fn handle_key(&mut self, key: KeyEvent) -> ModalEvent<NoteSubmit, NoteInput> {
        if !self.open {
            return ModalEvent::Pending;
        }
        match key.code {
            KeyCode::Esc => {
                self.escape();
                ModalEvent::Cancelled
            }
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => self.submit(),
            KeyCode::Tab | KeyCode::BackTab => {
                self.toggle_field();
                ModalEvent::Pending
            }
            KeyCode::Enter if self.field == NoteField::Title => {
                self.field = NoteField::Text;
                ModalEvent::Pending
            }
            _ => {
                let changed = match self.field {
                    NoteField::Title => self.title.input(key),
                    NoteField::Text => self.text.input(key),
                };
                if changed {
                    self.refresh_submit();
                }
                ModalEvent::Pending
            }
        }
    }

    fn render(&mut self, f: &mut Frame, area: Rect, theme: &ThemeConfig) {
        if !self.open {
            return;
        }
        let area = centered_rect(70, 70, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(if matches!(self.action, Some(NoteSubmit::Update { .. })) {
                " Edit Note "
            } else {
                " New Note "
            })
            .border_style(Style::default().fg(theme.border_active));
        let inner = block.inner(area);

        f.render_widget(Clear, area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(inner);

        let (title_border, text_border) = match self.field {
            NoteField::Title => (theme.border_active, theme.border_inactive),
            NoteField::Text => (theme.border_inactive, theme.border_active),
        };
        self.title.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Title ")
                .border_style(Style::default().fg(title_border)),
        );
        self.text.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Note ")
                .border_style(Style::default().fg(text_border)),
        );
        let cursor = Style::default().add_modifier(Modifier::REVERSED);
        let (title_cursor, text_cursor) = match self.field {
            NoteField::Title => (cursor, Style::default()),
            NoteField::Text => (Style::default(), cursor),
        };
        self.title.set_cursor_style(title_cursor);
        self.text.set_cursor_style(text_cursor);
        self.title.set_cursor_line_style(Style::default());
        self.text.set_cursor_line_style(Style::default());

        f.render_widget(&self.title, chunks[0]);
        f.render_widget(&self.text, chunks[1]);

        let save_style = if self.is_submit_enabled() {
            Style::default()
                .fg(theme.border_active)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(theme.disabled)
                .add_modifier(Modifier::DIM)
        };
        let footer = Line::from(vec![
            Span::styled(
                format!(" {} ", self.time_label),
                Style::default().fg(theme.muted),
            ),
            Span::raw("  "),
            Span::styled("[Ctrl+S] Save", save_style),
            Span::styled("  [Esc] Close ", Style::default().fg(theme.muted)),
        ]);
        f.render_widget(
            Paragraph::new(footer).alignment(Alignment::Right),
            chunks[2],
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Notebook { notebook_id: String },
    Note { notebook_id: String, note_id: String },
}

/// "Are you sure you want to delete ...?" with Delete / Cancel.
pub struct DeleteConfirmModal {
    open: bool,
    subject: String,
    action: Option<DeleteTarget>,
}

impl DeleteConfirmModal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            open: false,
            subject: subject.into(),
            action: None,
        }
    }

    fn answer(&mut self, confirmed: bool) -> ModalEvent<DeleteTarget, bool> {
        match &self.action {
            Some(target) => ModalEvent::Submitted(target.clone(), confirmed),
            None => {
                self.close();
                ModalEvent::Cancelled
            }
        }
    }
}

impl Modal for DeleteConfirmModal {
    type Action = DeleteTarget;
    /// Whether the user confirmed.
    type Value = bool;

    fn open(&mut self) {
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn on_submit(&mut self, action: DeleteTarget) {
        self.action = Some(action);
    }

    fn handle_key(&mut self, key: KeyEvent) -> ModalEvent<DeleteTarget, bool> {
        if !self.open {
            return ModalEvent::Pending;
        }
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => self.answer(true),
            KeyCode::Char('n') | KeyCode::Char('N') => self.answer(false),
            KeyCode::Esc => {
                self.escape();
                ModalEvent::Cancelled
            }
            _ => ModalEvent::Pending,
        }
    }

    fn render(&mut self, f: &mut Frame, area: Rect, theme: &ThemeConfig) {
        if !self.open {
            return;
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Delete? ")
            .border_style(Style::default().fg(theme.danger));

        let text = vec![
            Line::from(""),
            Line::from("Are you sure you want to delete"),
            Line::from(Span::styled(
                format!("\"{}\"?", self.subject),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("[n] Cancel", Style::default().fg(theme.muted)),
                Span::raw("    "),
                Span::styled(
                    "[y] Delete",
                    Style::default()
                        .fg(theme.danger)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
        ];
        let p = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center);

        let confirm_area = centered_rect(50, 40, area);
        f.render_widget(Clear, confirm_area);
        f.render_widget(p, confirm_area);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSubmit {
    CreateNotebook,
    RenameNotebook { notebook_id: String },
}

/// Single-line field for a notebook name. Enter submits.
pub struct NameFieldModal<'a> {
    open: bool,
    field: TextArea<'a>,
    action: Option<NameSubmit>,
}

impl<'a> NameFieldModal<'a> {
    pub fn new(initial: &str) -> Self {
        let mut field = TextArea::from([initial.to_string()]);
        field.move_cursor(tui_textarea::CursorMove::End);
        field.set_placeholder_text(UNTITLED);
        Self {
            open: false,
            field,
            action: None,
        }
    }

    pub fn value(&self) -> String {
        self.field.lines().join(" ")
    }

    pub fn insert_str(&mut self, text: &str) {
        self.field.insert_str(text.replace(['\r', '\n'], " "));
    }
}

impl<'a> Modal for NameFieldModal<'a> {
    type Action = NameSubmit;
    type Value = String;

    fn open(&mut self) {
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn on_submit(&mut self, action: NameSubmit) {
        self.action = Some(action);
    }

    fn handle_key(&mut self, key: KeyEvent) -> ModalEvent<NameSubmit, String> {
        if !self.open {
            return ModalEvent::Pending;
        }
        match key.code {
            KeyCode::Esc => {
                self.escape();
                ModalEvent::Cancelled
            }
            KeyCode::Enter => match &self.action {
                Some(action) => ModalEvent::Submitted(action.clone(), self.value()),
                None => ModalEvent::Pending,
            },
            _ => {
                self.field.input(key);
                ModalEvent::Pending
            }
        }
    }

    fn render(&mut self, f: &mut Frame, area: Rect, theme: &ThemeConfig) {
        if !self.open {
            return;
        }
        let title = match self.action {
            Some(NameSubmit::RenameNotebook { .. }) => " Rename Notebook ",
            _ => " New Notebook ",
        };
        self.field.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(" Enter: Save  •  Esc: Cancel ")
                .border_style(Style::default().fg(theme.border_active)),
        );
        self.field.set_cursor_line_style(Style::default());

        let area = centered_rect(50, 20, area);
        let area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height: 3,
        };
        f.render_widget(Clear, area);
        f.render_widget(&self.field, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str<M: Modal>(modal: &mut M, s: &str) {
        for c in s.chars() {
            modal.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn ctrl_s() -> KeyEvent {
        KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)
    }

    fn note() -> Note {
        Note {
            id: "n1".to_string(),
            notebook_id: "nb".to_string(),
            title: "Title".to_string(),
            text: "line one\nline two".to_string(),
            posted_on: 0,
        }
    }

    #[test]
    fn save_is_disabled_until_a_field_has_text() {
        let mut modal = NoteModal::new();
        modal.open();
        modal.on_submit(NoteSubmit::Create {
            notebook_id: "nb".to_string(),
        });
        assert!(!modal.is_submit_enabled());
        assert_eq!(modal.handle_key(ctrl_s()), ModalEvent::Pending);

        type_str(&mut modal, "x");
        assert!(modal.is_submit_enabled());

        modal.handle_key(key(KeyCode::Backspace));
        assert!(!modal.is_submit_enabled());

        modal.handle_key(key(KeyCode::Tab));
        type_str(&mut modal, "body");
        assert!(modal.is_submit_enabled());
    }

    #[test]
    fn submit_hands_back_action_and_fields() {
        let mut modal = NoteModal::new();
        modal.open();
        modal.on_submit(NoteSubmit::Create {
            notebook_id: "nb".to_string(),
        });
        type_str(&mut modal, "A");
        modal.handle_key(key(KeyCode::Enter));
        type_str(&mut modal, "B");

        assert_eq!(
            modal.handle_key(ctrl_s()),
            ModalEvent::Submitted(
                NoteSubmit::Create {
                    notebook_id: "nb".to_string()
                },
                NoteInput {
                    title: "A".to_string(),
                    text: "B".to_string()
                }
            )
        );
        assert!(modal.is_open());
    }

    #[test]
    fn blank_input_is_rejected() {
        let modal = NoteModal::new();
        assert!(matches!(
            modal.validated_input(),
            Err(StoreError::EmptyInput)
        ));
    }

    #[test]
    fn escape_closes_without_submitting() {
        let mut modal = NoteModal::new();
        modal.open();
        modal.on_submit(NoteSubmit::Create {
            notebook_id: "nb".to_string(),
        });
        type_str(&mut modal, "draft");
        assert_eq!(modal.handle_key(key(KeyCode::Esc)), ModalEvent::Cancelled);
        assert!(!modal.is_open());
    }

    #[test]
    fn escape_on_closed_modal_is_a_no_op() {
        let mut modal = NoteModal::new();
        assert!(!modal.escape());
        assert!(!modal.is_open());

        modal.open();
        assert!(modal.escape());
        assert!(!modal.is_open());
    }

    #[test]
    fn editing_existing_note_starts_enabled() {
        let modal = NoteModal::with_note(&note(), "5 min ago".to_string());
        assert!(modal.is_submit_enabled());
        assert_eq!(
            modal.input(),
            NoteInput {
                title: "Title".to_string(),
                text: "line one\nline two".to_string()
            }
        );
    }

    #[test]
    fn trailing_newline_survives_the_editor() {
        let mut note = note();
        note.text = "line\n".to_string();
        let modal = NoteModal::with_note(&note, String::new());
        assert_eq!(modal.input().text, "line\n");
    }

    #[test]
    fn paste_into_title_stays_on_one_line() {
        let mut modal = NoteModal::new();
        modal.open();
        modal.insert_str("two\nlines");
        assert_eq!(modal.input().title, "two lines");
        assert!(modal.is_submit_enabled());
    }

    #[test]
    fn delete_confirm_reports_answer() {
        let target = DeleteTarget::Note {
            notebook_id: "nb".to_string(),
            note_id: "n1".to_string(),
        };
        let mut modal = DeleteConfirmModal::new("Title");
        modal.open();
        modal.on_submit(target.clone());

        assert_eq!(
            modal.handle_key(key(KeyCode::Char('y'))),
            ModalEvent::Submitted(target.clone(), true)
        );
        assert_eq!(
            modal.handle_key(key(KeyCode::Char('n'))),
            ModalEvent::Submitted(target, false)
        );
        assert_eq!(modal.handle_key(key(KeyCode::Esc)), ModalEvent::Cancelled);
        assert!(!modal.is_open());
    }

    #[test]
    fn name_field_submits_on_enter() {
        let mut modal = NameFieldModal::new("Wor");
        modal.open();
        modal.on_submit(NameSubmit::RenameNotebook {
            notebook_id: "nb".to_string(),
        });
        type_str(&mut modal, "k");
        assert_eq!(
            modal.handle_key(key(KeyCode::Enter)),
            ModalEvent::Submitted(
                NameSubmit::RenameNotebook {
                    notebook_id: "nb".to_string()
                },
                "Work".to_string()
            )
        );
    }

    #[test]
    fn closed_modal_ignores_keys() {
        let mut modal = NameFieldModal::new("");
        modal.on_submit(NameSubmit::CreateNotebook);
        assert_eq!(modal.handle_key(key(KeyCode::Enter)), ModalEvent::Pending);
    }
}
