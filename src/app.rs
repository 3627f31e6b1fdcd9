use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::{debug, info, warn};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Wrap},
    Frame, Terminal,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

use crate::config::{self, AppConfig};
use crate::db::{NoteInput, NotePatch, Store};
use crate::error::StoreError;
use crate::modal::{
    DeleteConfirmModal, DeleteTarget, Modal, ModalEvent, NameFieldModal, NameSubmit, NoteModal,
    NoteSubmit,
};
use crate::view::{self, relative_age, ViewState};

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Focus {
    Sidebar,
    Notes,
}

#[derive(Debug)]
enum Message {
    Key(KeyEvent),
    Paste(String),
    Resize,
    Tick,
}

/// The one overlay that may be on screen.
pub enum ActiveModal<'a> {
    Note(NoteModal<'a>),
    Delete(DeleteConfirmModal),
    Name(NameFieldModal<'a>),
}

impl ActiveModal<'_> {
    fn is_open(&self) -> bool {
        match self {
            ActiveModal::Note(m) => m.is_open(),
            ActiveModal::Delete(m) => m.is_open(),
            ActiveModal::Name(m) => m.is_open(),
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Wires key presses to store calls and feeds the results into the view.
pub struct App<'a> {
    store: Store,
    config: AppConfig,
    data_dir: PathBuf,
    view: ViewState,
    focus: Focus,
    modal: Option<ActiveModal<'a>>,
    status: Option<String>,
    clipboard: Option<arboard::Clipboard>,
}

impl<'a> App<'a> {
    pub fn new(store: Store, config: AppConfig, data_dir: PathBuf) -> Result<Self> {
        let focus = if config.general.sidebar_visible {
            Focus::Sidebar
        } else {
            Focus::Notes
        };
        let mut app = Self {
            store,
            config,
            data_dir,
            view: ViewState::default(),
            focus,
            modal: None,
            status: None,
            clipboard: None,
        };
        app.render_existing_notebooks()?;
        app.render_existing_notes()?;
        Ok(app)
    }

    fn render_existing_notebooks(&mut self) -> Result<()> {
        let notebooks = self.store.list_notebooks()?;
        info!("Loaded {} notebooks", notebooks.len());
        self.view.notebooks_loaded(notebooks);
        Ok(())
    }

    fn render_existing_notes(&mut self) -> Result<()> {
        if let Some(id) = self.view.active_notebook_id().map(str::to_string) {
            let notes = self.store.list_notes(&id)?;
            self.view.notes_loaded(notes);
        }
        Ok(())
    }

    /// Logs a failed store call and surfaces it in the footer. The app keeps going.
    ///
    /// A dangling id means the view drifted from the store, so it is rebuilt.
    fn report(&mut self, action: &str, err: StoreError) {
        warn!("{} failed: {}", action, err);
        let stale = err.is_not_found();
        self.status = Some(format!("{} failed: {}", action, err));
        if stale {
            if let Err(e) = self.reload() {
                warn!("Reloading view failed: {}", e);
            }
        }
    }

    /// Rebuilds the view from the store, keeping the active notebook if it still exists.
    pub fn reload(&mut self) -> Result<()> {
        let active = self.view.active_notebook_id().map(str::to_string);
        self.render_existing_notebooks()?;
        if let Some(id) = active {
            self.view.activate(&id);
        }
        self.render_existing_notes()?;
        if self.view.active_notebook_id().is_none() {
            self.focus = self.notebook_focus();
        }
        Ok(())
    }

    /// Where focus goes when there is no note to look at. A hidden sidebar
    /// never takes focus.
    fn notebook_focus(&self) -> Focus {
        if self.config.general.sidebar_visible {
            Focus::Sidebar
        } else {
            Focus::Notes
        }
    }

    pub fn activate_notebook(&mut self, notebook_id: &str) {
        if !self.view.activate(notebook_id) {
            return;
        }
        match self.store.list_notes(notebook_id) {
            Ok(notes) => self.view.notes_loaded(notes),
            Err(e) => self.report("Loading notes", e),
        }
    }

    pub fn create_notebook(&mut self, name: &str) -> bool {
        match self.store.create_notebook(name) {
            Ok(notebook) => {
                info!("Notebook {:?} created", notebook.name);
                self.view.notebook_created(notebook);
                true
            }
            Err(e) => {
                self.report("Creating notebook", e);
                false
            }
        }
    }

    pub fn rename_notebook(&mut self, notebook_id: &str, name: &str) -> bool {
        match self.store.rename_notebook(notebook_id, name) {
            Ok(notebook) => {
                self.view.notebook_renamed(notebook);
                true
            }
            Err(e) => {
                self.report("Renaming notebook", e);
                false
            }
        }
    }

    pub fn delete_notebook(&mut self, notebook_id: &str) {
        if let Err(e) = self.store.delete_notebook(notebook_id) {
            self.report("Deleting notebook", e);
            return;
        }
        info!("Notebook {} deleted", notebook_id);
        match self.view.notebook_deleted(notebook_id) {
            Some(sibling) => self.activate_notebook(&sibling),
            None => self.focus = self.notebook_focus(),
        }
    }

    pub fn create_note(&mut self, notebook_id: &str, input: NoteInput) -> bool {
        match self.store.create_note(notebook_id, input) {
            Ok(note) => {
                if self.view.is_active(notebook_id) {
                    self.view.note_created(note);
                }
                true
            }
            Err(e) => {
                self.report("Creating note", e);
                false
            }
        }
    }

    pub fn update_note(&mut self, note_id: &str, patch: NotePatch) -> bool {
        match self.store.update_note(note_id, patch) {
            Ok(note) => {
                self.view.note_updated(note);
                true
            }
            Err(e) => {
                self.report("Saving note", e);
                false
            }
        }
    }

    pub fn delete_note(&mut self, notebook_id: &str, note_id: &str) {
        match self.store.delete_note(notebook_id, note_id) {
            Ok(remaining) => self.view.note_deleted(note_id, remaining),
            Err(e) => self.report("Deleting note", e),
        }
    }

    fn open_name_field(&mut self, initial: &str, action: NameSubmit) {
        let mut modal = NameFieldModal::new(initial);
        modal.on_submit(action);
        modal.open();
        self.modal = Some(ActiveModal::Name(modal));
    }

    fn open_new_note(&mut self) {
        if !self.view.can_create_note() {
            debug!("Note creation is disabled without notebooks");
            return;
        }
        let Some(notebook_id) = self.view.active_notebook_id().map(str::to_string) else {
            return;
        };
        let mut modal = NoteModal::new();
        modal.on_submit(NoteSubmit::Create { notebook_id });
        modal.open();
        self.modal = Some(ActiveModal::Note(modal));
    }

    fn open_selected_note(&mut self) {
        let Some(note_id) = self.view.selected_note().map(|n| n.id.clone()) else {
            return;
        };
        let note = match self.store.find_note(&note_id) {
            Ok(note) => note,
            Err(e) => return self.report("Opening note", e),
        };
        let mut modal = NoteModal::with_note(&note, relative_age(note.posted_on, now_millis()));
        modal.on_submit(NoteSubmit::Update { note_id: note.id });
        modal.open();
        self.modal = Some(ActiveModal::Note(modal));
    }

    fn confirm_delete(&mut self, subject: String, target: DeleteTarget) {
        let mut modal = DeleteConfirmModal::new(subject);
        modal.on_submit(target);
        modal.open();
        self.modal = Some(ActiveModal::Delete(modal));
    }

    fn copy_selected_note(&mut self) {
        let Some(note) = self.view.selected_note() else {
            return;
        };
        let content = if note.text.is_empty() {
            note.title.clone()
        } else {
            format!("{}\n\n{}", note.title, note.text)
        };
        if self.clipboard.is_none() {
            self.clipboard = arboard::Clipboard::new().ok();
        }
        match self.clipboard.as_mut().map(|cb| cb.set_text(content)) {
            Some(Ok(())) => self.status = Some("Copied note to clipboard".to_string()),
            Some(Err(e)) => {
                warn!("Clipboard write failed: {}", e);
                self.status = Some("Clipboard unavailable".to_string());
            }
            None => self.status = Some("Clipboard unavailable".to_string()),
        }
    }

    fn toggle_sidebar(&mut self) {
        let general = &mut self.config.general;
        general.sidebar_visible = !general.sidebar_visible;
        if !general.sidebar_visible {
            self.focus = Focus::Notes;
        }
        if let Err(e) = config::save_config(&self.data_dir, &self.config) {
            warn!("Failed to persist sidebar setting: {}", e);
        }
    }

    /// Returns `true` when the app should quit.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if let Some(modal) = self.modal.take() {
            self.handle_modal_key(modal, key);
            return false;
        }

        self.status = None;
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('n') => self.open_new_note(),
            KeyCode::Char('b') => self.toggle_sidebar(),
            _ => match self.focus {
                Focus::Sidebar if self.config.general.sidebar_visible => {
                    self.handle_sidebar_key(key)
                }
                Focus::Sidebar | Focus::Notes => self.handle_notes_key(key),
            },
        }
        false
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(id) = self.view.neighbor_notebook(1) {
                    self.activate_notebook(&id);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(id) = self.view.neighbor_notebook(-1) {
                    self.activate_notebook(&id);
                }
            }
            KeyCode::Char('a') => self.open_name_field("", NameSubmit::CreateNotebook),
            KeyCode::Char('r') => {
                let Some(id) = self.view.active_notebook_id().map(str::to_string) else {
                    return;
                };
                match self.store.find_notebook(&id) {
                    Ok(notebook) => self.open_name_field(
                        &notebook.name,
                        NameSubmit::RenameNotebook { notebook_id: id },
                    ),
                    Err(e) => self.report("Renaming notebook", e),
                }
            }
            KeyCode::Char('d') => {
                let Some(id) = self.view.active_notebook_id().map(str::to_string) else {
                    return;
                };
                let name = self.view.panel_title().to_string();
                self.confirm_delete(name, DeleteTarget::Notebook { notebook_id: id });
            }
            KeyCode::Tab | KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
                if self.view.active_notebook_id().is_some() {
                    self.focus = Focus::Notes;
                }
            }
            _ => {}
        }
    }

    fn handle_notes_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.view.move_note_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.view.move_note_selection(-1),
            KeyCode::Enter => self.open_selected_note(),
            KeyCode::Char('y') => self.copy_selected_note(),
            KeyCode::Char('d') => {
                let Some(note) = self.view.selected_note() else {
                    return;
                };
                let subject = if note.title.is_empty() {
                    crate::db::UNTITLED.to_string()
                } else {
                    note.title.clone()
                };
                let target = DeleteTarget::Note {
                    notebook_id: note.notebook_id.clone(),
                    note_id: note.id.clone(),
                };
                self.confirm_delete(subject, target);
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => {
                if self.config.general.sidebar_visible {
                    self.focus = Focus::Sidebar;
                }
            }
            _ => {}
        }
    }

    fn handle_modal_key(&mut self, modal: ActiveModal<'a>, key: KeyEvent) {
        match modal {
            ActiveModal::Note(mut m) => match m.handle_key(key) {
                ModalEvent::Submitted(action, input) => {
                    let saved = match action {
                        NoteSubmit::Create { notebook_id } => self.create_note(&notebook_id, input),
                        NoteSubmit::Update { note_id } => self.update_note(&note_id, input.into()),
                    };
                    if saved {
                        m.close();
                    }
                    self.keep_if_open(ActiveModal::Note(m));
                }
                ModalEvent::Pending | ModalEvent::Cancelled => {
                    self.keep_if_open(ActiveModal::Note(m))
                }
            },
            ActiveModal::Delete(mut m) => {
                if let ModalEvent::Submitted(target, confirmed) = m.handle_key(key) {
                    if confirmed {
                        match target {
                            DeleteTarget::Notebook { notebook_id } => {
                                self.delete_notebook(&notebook_id)
                            }
                            DeleteTarget::Note {
                                notebook_id,
                                note_id,
                            } => self.delete_note(&notebook_id, &note_id),
                        }
                    }
                    m.close();
                }
                self.keep_if_open(ActiveModal::Delete(m));
            }
            ActiveModal::Name(mut m) => {
                if let ModalEvent::Submitted(action, name) = m.handle_key(key) {
                    let saved = match action {
                        NameSubmit::CreateNotebook => self.create_notebook(&name),
                        NameSubmit::RenameNotebook { notebook_id } => {
                            self.rename_notebook(&notebook_id, &name)
                        }
                    };
                    if saved {
                        m.close();
                    }
                }
                self.keep_if_open(ActiveModal::Name(m));
            }
        }
    }

    fn keep_if_open(&mut self, modal: ActiveModal<'a>) {
        if modal.is_open() {
            self.modal = Some(modal);
        }
    }

    fn handle_paste(&mut self, text: &str) {
        match self.modal.as_mut() {
            Some(ActiveModal::Note(m)) => m.insert_str(text),
            Some(ActiveModal::Name(m)) => m.insert_str(text),
            _ => {}
        }
    }

    fn update(&mut self, msg: Message) -> bool {
        match msg {
            Message::Key(key) => {
                if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    return self.handle_key_event(key);
                }
            }
            Message::Paste(text) => self.handle_paste(&text),
            Message::Resize | Message::Tick => {}
        }
        false
    }

    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let mut tick = time::interval(Duration::from_secs(self.config.general.tick_seconds.max(1)));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _input_handle = std::thread::spawn(move || {
            while let Ok(evt) = event::read() {
                if tx.send(evt).is_err() {
                    break;
                }
            }
        });

        loop {
            terminal.draw(|f| self.ui(f))?;

            let mut messages = Vec::new();
            tokio::select! {
                Some(event) = rx.recv() => {
                    let process_event = |e| match e {
                        Event::Key(key) => Some(Message::Key(key)),
                        Event::Paste(text) => Some(Message::Paste(text)),
                        Event::Resize(_, _) => Some(Message::Resize),
                        _ => None,
                    };
                    if let Some(m) = process_event(event) {
                        messages.push(m);
                    }
                    while let Ok(e) = rx.try_recv() {
                        if let Some(m) = process_event(e) {
                            messages.push(m);
                        }
                    }
                }
                _ = tick.tick() => messages.push(Message::Tick),
            }

            for msg in messages {
                if self.update(msg) {
                    info!("Quit requested");
                    return Ok(());
                }
            }
        }
    }

    pub fn ui(&mut self, f: &mut Frame) {
        let theme = self.config.theme.clone();
        let header_height = if self.config.general.show_greeting { 3 } else { 2 };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header_height),
                Constraint::Min(1),
                Constraint::Length(2),
            ])
            .split(f.area());

        f.render_widget(
            Block::default().style(Style::default().bg(theme.background).fg(theme.foreground)),
            f.area(),
        );
        view::render_header(f, chunks[0], Local::now(), &self.config);

        let notes_area = if self.config.general.sidebar_visible {
            let main_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
                .split(chunks[1]);
            view::render_sidebar(
                f,
                main_chunks[0],
                &self.view,
                &theme,
                self.focus == Focus::Sidebar && self.modal.is_none(),
            );
            main_chunks[1]
        } else {
            chunks[1]
        };

        view::render_note_panel(
            f,
            notes_area,
            &mut self.view,
            &self.config,
            now_millis(),
            self.focus == Focus::Notes && self.modal.is_none(),
        );

        match self.modal.as_mut() {
            Some(ActiveModal::Note(m)) => m.render(f, chunks[1], &theme),
            Some(ActiveModal::Delete(m)) => m.render(f, chunks[1], &theme),
            Some(ActiveModal::Name(m)) => m.render(f, chunks[1], &theme),
            None => {}
        }

        f.render_widget(
            Paragraph::new(self.help_line()).wrap(Wrap { trim: true }),
            chunks[2],
        );
    }

    fn help_line(&self) -> Line<'static> {
        let theme = &self.config.theme;
        let hint = Style::default().fg(theme.border_inactive);

        if let Some(status) = &self.status {
            return Line::from(Span::styled(
                format!(" {} ", status),
                Style::default().fg(theme.danger).add_modifier(Modifier::BOLD),
            ));
        }

        let focus = match self.focus {
            Focus::Sidebar if !self.config.general.sidebar_visible => Focus::Notes,
            focus => focus,
        };
        let text = match (&self.modal, focus) {
            (Some(ActiveModal::Note(_)), _) => {
                " Tab: Switch Field  •  Ctrl+S: Save  •  Esc: Close "
            }
            (Some(ActiveModal::Delete(_)), _) => " y: Delete  •  n/Esc: Cancel ",
            (Some(ActiveModal::Name(_)), _) => " Enter: Save  •  Esc: Cancel ",
            (None, Focus::Sidebar) => {
                " j/k: Switch  •  a: New notebook  •  r: Rename  •  d: Delete  •  Tab: Notes  •  b: Sidebar  •  q: Quit "
            }
            (None, Focus::Notes) => {
                " j/k: Move  •  Enter: Open  •  d: Delete  •  y: Copy  •  Tab: Notebooks  •  b: Sidebar  •  q: Quit "
            }
        };

        let mut spans = vec![Span::styled(text.to_string(), hint)];
        if self.modal.is_none() {
            let new_note = if self.view.can_create_note() {
                Span::styled(" n: New note ", hint)
            } else {
                Span::styled(
                    " n: New note (disabled) ",
                    Style::default()
                        .fg(theme.disabled)
                        .add_modifier(Modifier::DIM | Modifier::CROSSED_OUT),
                )
            };
            spans.insert(0, new_note);
        }
        Line::from(spans)
    }
}

#[cfg(test)]
impl<'a> App<'a> {
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn modal(&self) -> Option<&ActiveModal<'a>> {
        self.modal.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{buffer_text, EMPTY_NOTES};
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;
    use tempfile::{tempdir, TempDir};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key_event(key(code));
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn save(app: &mut App) {
        app.handle_key_event(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
    }

    fn app() -> (App<'static>, TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let app = App::new(store, AppConfig::default(), dir.path().to_path_buf()).unwrap();
        (app, dir)
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| app.ui(f)).unwrap();
        buffer_text(terminal.backend().buffer())
    }

    fn add_notebook(app: &mut App, name: &str) {
        press(app, KeyCode::Char('a'));
        type_str(app, name);
        press(app, KeyCode::Enter);
    }

    fn add_note(app: &mut App, title: &str, text: &str) {
        press(app, KeyCode::Char('n'));
        type_str(app, title);
        press(app, KeyCode::Tab);
        type_str(app, text);
        save(app);
    }

    #[test]
    fn note_creation_disabled_without_notebooks() {
        let (mut app, _dir) = app();
        assert!(!app.view().can_create_note());

        press(&mut app, KeyCode::Char('n'));
        assert!(app.modal().is_none());
        assert!(screen(&mut app).contains("New note (disabled)"));
    }

    #[test]
    fn notebook_field_creates_and_activates() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "Work");
        add_notebook(&mut app, "");

        let view = app.view();
        assert_eq!(view.notebooks().len(), 2);
        assert_eq!(view.notebooks()[1].name, "Untitled");
        assert!(view.is_active(&view.notebooks()[1].id));
        assert!(!view.is_active(&view.notebooks()[0].id));
        assert!(app.modal().is_none());
        assert!(view.can_create_note());
    }

    #[test]
    fn work_scenario_through_the_ui() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "Work");
        add_note(&mut app, "A", "B");
        assert!(app.modal().is_none());

        let work_id = app.view().active_notebook_id().unwrap().to_string();
        let notes = app.store.list_notes(&work_id).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!((notes[0].title.as_str(), notes[0].text.as_str()), ("A", "B"));
        assert_eq!(app.view().notes(), notes.as_slice());

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus(), Focus::Notes);
        press(&mut app, KeyCode::Char('d'));
        assert!(matches!(app.modal(), Some(ActiveModal::Delete(_))));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.modal().is_none());

        assert!(app.store.list_notes(&work_id).unwrap().is_empty());
        assert!(app.view().notes().is_empty());
        assert!(screen(&mut app).contains(EMPTY_NOTES));
    }

    #[test]
    fn blank_note_cannot_be_saved() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "Work");
        press(&mut app, KeyCode::Char('n'));
        save(&mut app);

        assert!(matches!(app.modal(), Some(ActiveModal::Note(_))));
        let id = app.view().active_notebook_id().unwrap().to_string();
        assert!(app.store.list_notes(&id).unwrap().is_empty());

        press(&mut app, KeyCode::Esc);
        assert!(app.modal().is_none());
    }

    #[test]
    fn newest_note_is_shown_first() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "Work");
        add_note(&mut app, "first", "");
        add_note(&mut app, "second", "");

        let titles: Vec<&str> = app.view().notes().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[test]
    fn editing_a_note_updates_card_in_place() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "Work");
        add_note(&mut app, "keep", "x");
        add_note(&mut app, "old", "body");

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Enter);
        for _ in 0.."old".len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_str(&mut app, "new");
        save(&mut app);

        assert!(app.modal().is_none());
        let notes = app.view().notes();
        assert_eq!(notes[0].title, "new");
        assert_eq!(notes[0].text, "body");
        assert_eq!(notes[1].title, "keep");
        assert_eq!(app.store.find_note(&notes[0].id).unwrap().title, "new");
    }

    #[test]
    fn switching_notebooks_loads_their_notes() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "A");
        add_note(&mut app, "in a", "");
        add_notebook(&mut app, "B");
        assert!(app.view().notes().is_empty());

        press(&mut app, KeyCode::Char('k'));
        assert_eq!(app.view().panel_title(), "A");
        assert_eq!(app.view().notes()[0].title, "in a");
        let a_id = app.view().notebooks()[0].id.clone();
        let b_id = app.view().notebooks()[1].id.clone();
        assert!(app.view().is_active(&a_id));
        assert!(!app.view().is_active(&b_id));
    }

    #[test]
    fn rename_keeps_notebook_active() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "Wrok");
        press(&mut app, KeyCode::Char('r'));
        for _ in 0..4 {
            press(&mut app, KeyCode::Backspace);
        }
        type_str(&mut app, "Work");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.view().panel_title(), "Work");
        assert_eq!(app.store.list_notebooks().unwrap()[0].name, "Work");
    }

    #[test]
    fn deleting_last_notebook_disables_note_creation() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "A");
        add_notebook(&mut app, "B");
        add_note(&mut app, "gone", "");

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.view().panel_title(), "A");

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.view().notebooks().len(), 1);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.view().notebooks().is_empty());
        assert!(app.view().active_notebook_id().is_none());
        assert!(!app.view().can_create_note());
        assert!(app.store.list_notebooks().unwrap().is_empty());
    }

    #[test]
    fn escape_with_nothing_open_does_nothing() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "A");
        assert!(!app.handle_key_event(key(KeyCode::Esc)));
        assert!(app.modal().is_none());
        assert_eq!(app.view().notebooks().len(), 1);
    }

    #[test]
    fn view_is_rebuilt_from_store_on_startup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.db");
        {
            let store = Store::open(&path).unwrap();
            let nb = store.create_notebook("Kept").unwrap();
            store
                .create_note(
                    &nb.id,
                    NoteInput {
                        title: "t".to_string(),
                        text: String::new(),
                    },
                )
                .unwrap();
            store.create_notebook("Second").unwrap();
        }

        let app = App::new(
            Store::open(&path).unwrap(),
            AppConfig::default(),
            dir.path().to_path_buf(),
        )
        .unwrap();
        assert_eq!(app.view().panel_title(), "Kept");
        assert_eq!(app.view().notes().len(), 1);
    }

    #[test]
    fn store_failures_are_reported_not_fatal() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "A");
        let id = app.view().active_notebook_id().unwrap().to_string();
        app.store.delete_notebook(&id).unwrap();

        app.create_note(
            &id,
            NoteInput {
                title: "x".to_string(),
                text: String::new(),
            },
        );
        assert!(app.status().unwrap().contains("not found"));
        assert!(app.view().notebooks().is_empty());
        assert!(!app.view().can_create_note());
    }

    #[test]
    fn external_changes_show_up_after_reload() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "A");
        let id = app.view().active_notebook_id().unwrap().to_string();
        app.store.create_notebook("From elsewhere").unwrap();
        app.store
            .create_note(
                &id,
                NoteInput {
                    title: "added".to_string(),
                    text: String::new(),
                },
            )
            .unwrap();

        app.reload().unwrap();
        assert_eq!(app.view().notebooks().len(), 2);
        assert!(app.view().is_active(&id));
        assert_eq!(app.view().notes()[0].title, "added");
    }

    #[test]
    fn sidebar_toggle_moves_focus_and_persists() {
        let (mut app, dir) = app();
        press(&mut app, KeyCode::Char('b'));
        assert_eq!(app.focus(), Focus::Notes);
        assert!(!config::load_config(dir.path()).general.sidebar_visible);
    }

    #[test]
    fn hidden_sidebar_keeps_notebook_keys_inert() {
        let dir = tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        store.create_notebook("A").unwrap();
        store.create_notebook("B").unwrap();
        let mut config = AppConfig::default();
        config.general.sidebar_visible = false;

        let mut app = App::new(store, config, dir.path().to_path_buf()).unwrap();
        assert_eq!(app.focus(), Focus::Notes);
        assert!(!screen(&mut app).contains("a: New notebook"));

        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.view().panel_title(), "A");
        press(&mut app, KeyCode::Char('d'));
        assert!(app.modal().is_none());
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus(), Focus::Notes);
    }

    #[test]
    fn reopened_note_saves_back_unchanged() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "Work");
        let id = app.view().active_notebook_id().unwrap().to_string();
        let text = "line\n\nmore\n";
        app.create_note(
            &id,
            NoteInput {
                title: "t".to_string(),
                text: text.to_string(),
            },
        );

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.modal(), Some(ActiveModal::Note(_))));
        save(&mut app);

        assert!(app.modal().is_none());
        assert_eq!(app.store.list_notes(&id).unwrap()[0].text, text);
    }

    #[test]
    fn failed_rename_keeps_name_field_open() {
        let (mut app, _dir) = app();
        add_notebook(&mut app, "A");
        let id = app.view().active_notebook_id().unwrap().to_string();

        press(&mut app, KeyCode::Char('r'));
        type_str(&mut app, "x");
        app.store.delete_notebook(&id).unwrap();
        press(&mut app, KeyCode::Enter);

        assert!(app.status().unwrap().contains("not found"));
        assert!(matches!(app.modal(), Some(ActiveModal::Name(_))));
    }

    #[test]
    fn q_quits() {
        let (mut app, _dir) = app();
        assert!(app.handle_key_event(key(KeyCode::Char('q'))));
    }
}
