use crate::service::NoteService;
use crate::service::query::FilterCriteria;
use crate::storage::note::{ProblemNote, RatingTier};
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::path::PathBuf;

const APP_TITLE: &str = "cfnotes - Problem Notebook";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    List,
    Detail,
    Form,
    Filter,
    DeleteConfirm,
    Import,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Link,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Text,
    Rating,
    Tags,
}

/// Work that suspends (network, disk). Queued by a key press and awaited by
/// the event loop before the next key is read, so only one runs at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Save {
        editing_id: Option<String>,
        link: String,
        notes: String,
    },
    Refresh(String),
    Delete(String),
    Export,
    Import(PathBuf),
}

pub struct App {
    pub service: NoteService,
    pub export_dir: PathBuf,
    pub mode: AppMode,
    pub selected_index: usize,
    /// Record shown in the detail view
    pub current_id: Option<String>,
    /// Record being edited in the form; `None` while adding
    pub editing_id: Option<String>,
    pub link_input: String,
    pub notes_input: String,
    pub form_field: FormField,
    pub search_input: String,
    pub rating_input: String,
    pub tags_input: String,
    pub filter_field: FilterField,
    pub input_buffer: String,
    /// Whether a cancelled delete goes back to the detail view
    pub confirm_from_detail: bool,
    pub pending: Option<PendingAction>,
    pub should_quit: bool,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(service: NoteService, export_dir: PathBuf) -> Self {
        App {
            service,
            export_dir,
            mode: AppMode::List,
            selected_index: 0,
            current_id: None,
            editing_id: None,
            link_input: String::new(),
            notes_input: String::new(),
            form_field: FormField::Link,
            search_input: String::new(),
            rating_input: String::new(),
            tags_input: String::new(),
            filter_field: FilterField::Text,
            input_buffer: String::new(),
            confirm_from_detail: false,
            pending: None,
            should_quit: false,
            status_message: None,
        }
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::from_inputs(&self.search_input, &self.rating_input, &self.tags_input)
    }

    /// Records currently shown in the list
    pub fn visible(&self) -> Vec<&ProblemNote> {
        self.service.search(&self.criteria())
    }

    fn selected(&self) -> Option<&ProblemNote> {
        self.visible().get(self.selected_index).copied()
    }

    fn current(&self) -> Option<&ProblemNote> {
        self.current_id.as_deref().and_then(|id| self.service.get_note(id))
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        if self.selected_index >= len {
            self.selected_index = len.saturating_sub(1);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        if self.is_busy() {
            return;
        }
        // Any key dismisses the last status
        self.status_message = None;
        match self.mode {
            AppMode::List => self.handle_list_key(key),
            AppMode::Detail => self.handle_detail_key(key),
            AppMode::Form => self.handle_form_key(key, modifiers),
            AppMode::Filter => self.handle_filter_key(key),
            AppMode::DeleteConfirm => self.handle_delete_confirm_key(key),
            AppMode::Import => self.handle_import_key(key),
            AppMode::Help => self.handle_help_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                if self.criteria().is_empty() {
                    self.should_quit = true;
                } else {
                    self.clear_filters();
                }
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => {
                self.mode = AppMode::Filter;
                self.filter_field = FilterField::Text;
            }
            KeyCode::Char('f') => {
                self.mode = AppMode::Filter;
                self.filter_field = FilterField::Rating;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let max_index = self.visible().len().saturating_sub(1);
                if self.selected_index < max_index {
                    self.selected_index += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_index = self.selected_index.saturating_sub(1);
            }
            KeyCode::Char('n') | KeyCode::Char('a') => self.open_form(None),
            KeyCode::Char('e') => {
                if let Some(id) = self.selected().map(|note| note.id.clone()) {
                    self.open_form(Some(id));
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected().map(|note| note.id.clone()) {
                    self.current_id = Some(id);
                    self.confirm_from_detail = false;
                    self.mode = AppMode::DeleteConfirm;
                }
            }
            KeyCode::Char('x') => self.pending = Some(PendingAction::Export),
            KeyCode::Char('i') => {
                self.input_buffer.clear();
                self.mode = AppMode::Import;
            }
            KeyCode::Char('?') => self.mode = AppMode::Help,
            KeyCode::Enter => {
                if let Some(id) = self.selected().map(|note| note.id.clone()) {
                    self.current_id = Some(id);
                    self.mode = AppMode::Detail;
                }
            }
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Char('b') => self.show_list(),
            KeyCode::Char('e') => self.open_form(self.current_id.clone()),
            KeyCode::Char('r') => {
                if let Some(id) = self.current_id.clone() {
                    self.pending = Some(PendingAction::Refresh(id));
                }
            }
            KeyCode::Char('d') => {
                if self.current_id.is_some() {
                    self.confirm_from_detail = true;
                    self.mode = AppMode::DeleteConfirm;
                }
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        match key {
            KeyCode::Esc => self.cancel_form(),
            KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => {
                // Ctrl+S to save
                let link = self.link_input.trim().to_string();
                if link.is_empty() {
                    self.status_message = Some("✗ A problem link is required".to_string());
                    self.form_field = FormField::Link;
                    return;
                }
                self.pending = Some(PendingAction::Save {
                    editing_id: self.editing_id.clone(),
                    link,
                    notes: self.notes_input.clone(),
                });
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.form_field = match self.form_field {
                    FormField::Link => FormField::Notes,
                    FormField::Notes => FormField::Link,
                };
            }
            KeyCode::Enter => match self.form_field {
                FormField::Link => self.form_field = FormField::Notes,
                FormField::Notes => self.notes_input.push('\n'),
            },
            KeyCode::Char(c) => self.form_input_mut().push(c),
            KeyCode::Backspace => {
                self.form_input_mut().pop();
            }
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.clear_filters();
                self.mode = AppMode::List;
            }
            KeyCode::Enter => self.mode = AppMode::List,
            KeyCode::Tab => {
                self.filter_field = match self.filter_field {
                    FilterField::Text => FilterField::Rating,
                    FilterField::Rating => FilterField::Tags,
                    FilterField::Tags => FilterField::Text,
                };
            }
            KeyCode::BackTab => {
                self.filter_field = match self.filter_field {
                    FilterField::Text => FilterField::Tags,
                    FilterField::Rating => FilterField::Text,
                    FilterField::Tags => FilterField::Rating,
                };
            }
            KeyCode::Char(c) => {
                self.filter_input_mut().push(c);
                self.selected_index = 0;
            }
            KeyCode::Backspace => {
                self.filter_input_mut().pop();
                self.selected_index = 0;
            }
            _ => {}
        }
    }

    fn handle_delete_confirm_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Some(id) = self.current_id.clone() {
                    self.pending = Some(PendingAction::Delete(id));
                }
            }
            KeyCode::Esc | KeyCode::Char('n') => {
                if self.confirm_from_detail {
                    self.mode = AppMode::Detail;
                } else {
                    self.show_list();
                }
            }
            _ => {}
        }
    }

    fn handle_import_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.input_buffer.clear();
                self.mode = AppMode::List;
            }
            KeyCode::Enter => {
                let path = self.input_buffer.trim().to_string();
                if !path.is_empty() {
                    self.pending = Some(PendingAction::Import(PathBuf::from(path)));
                }
            }
            KeyCode::Char(c) => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            _ => {}
        }
    }

    fn handle_help_key(&mut self, key: KeyCode) {
        if let KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') = key {
            self.mode = AppMode::List;
        }
    }

    fn open_form(&mut self, editing_id: Option<String>) {
        match editing_id.as_deref().and_then(|id| self.service.get_note(id)) {
            Some(note) => {
                self.link_input = note.link.clone();
                self.notes_input = note.notes.clone();
            }
            None => {
                self.link_input.clear();
                self.notes_input.clear();
            }
        }
        self.editing_id = editing_id;
        self.form_field = FormField::Link;
        self.mode = AppMode::Form;
    }

    fn cancel_form(&mut self) {
        self.editing_id = None;
        if self.current().is_some() {
            self.mode = AppMode::Detail;
        } else {
            self.show_list();
        }
    }

    fn show_list(&mut self) {
        self.mode = AppMode::List;
        self.current_id = None;
        self.editing_id = None;
        self.clamp_selection();
    }

    fn clear_filters(&mut self) {
        self.search_input.clear();
        self.rating_input.clear();
        self.tags_input.clear();
        self.selected_index = 0;
    }

    fn form_input_mut(&mut self) -> &mut String {
        match self.form_field {
            FormField::Link => &mut self.link_input,
            FormField::Notes => &mut self.notes_input,
        }
    }

    fn filter_input_mut(&mut self) -> &mut String {
        match self.filter_field {
            FilterField::Text => &mut self.search_input,
            FilterField::Rating => &mut self.rating_input,
            FilterField::Tags => &mut self.tags_input,
        }
    }

    /// Run the queued action to completion.
    pub async fn run_pending(&mut self) {
        let Some(action) = self.pending.take() else {
            return;
        };

        match action {
            PendingAction::Save { editing_id, link, notes } => self.save(editing_id, link, notes).await,
            PendingAction::Refresh(id) => match self.service.refresh_metadata(&id).await {
                Ok(Some(note)) if note.is_resolved() => {
                    self.status_message = Some(format!("✓ Refreshed: {}", note.display_name()));
                }
                Ok(Some(_)) => {
                    self.status_message = Some("ℹ No metadata found for this link".to_string());
                }
                Ok(None) => self.show_list(),
                Err(e) => self.report_error("Refresh failed", e),
            },
            PendingAction::Delete(id) => {
                match self.service.delete_note(&id).await {
                    Ok(_) => self.status_message = Some("✓ Note deleted".to_string()),
                    Err(e) => self.report_error("Delete failed", e),
                }
                self.show_list();
            }
            PendingAction::Export => match self.service.export_to_dir(&self.export_dir).await {
                Ok(path) => self.status_message = Some(format!("✓ Exported to {}", path.display())),
                Err(e) => self.report_error("Export failed", e),
            },
            PendingAction::Import(path) => {
                match self.service.import_from_file(&path).await {
                    Ok(report) => {
                        self.status_message = Some(if report.skipped > 0 {
                            format!("✓ Imported {} notes ({} skipped)", report.imported, report.skipped)
                        } else {
                            format!("✓ Imported {} notes", report.imported)
                        });
                    }
                    Err(e) => self.report_error("Error importing file", e),
                }
                self.input_buffer.clear();
                self.show_list();
            }
        }
    }

    async fn save(&mut self, editing_id: Option<String>, link: String, notes: String) {
        let result = match editing_id.as_deref() {
            Some(id) => self.service.update_note(id, link, notes).await,
            None => self.service.create_note(link, notes).await.map(Some),
        };

        match result {
            Ok(Some(note)) => {
                self.status_message = Some(format!("✓ Saved: {}", note.display_name()));
                let edited_from_detail = editing_id.is_some() && self.current_id == editing_id;
                self.editing_id = None;
                if edited_from_detail {
                    self.mode = AppMode::Detail;
                } else {
                    self.selected_index = 0;
                    self.show_list();
                }
            }
            // Edited record vanished in the meantime.
            Ok(None) => self.show_list(),
            Err(e) => self.report_error("Save failed", e),
        }
    }

    fn report_error(&mut self, what: &str, error: impl std::fmt::Display) {
        tracing::error!(error = %error, "{}", what);
        self.status_message = Some(format!("✗ {}: {}", what, error));
    }

    pub fn render(&self, frame: &mut Frame) {
        match self.mode {
            AppMode::List => self.render_list(frame),
            AppMode::Detail => self.render_detail(frame),
            AppMode::Form => self.render_form(frame),
            AppMode::Filter => self.render_list(frame),
            AppMode::DeleteConfirm => self.render_delete_confirm(frame),
            AppMode::Import => self.render_import(frame),
            AppMode::Help => self.render_help(frame),
        }
    }

    fn render_title(&self, frame: &mut Frame, area: Rect, suffix: Option<String>) {
        let title_text = match suffix {
            Some(suffix) => format!("{} ({})", APP_TITLE, suffix),
            None => APP_TITLE.to_string(),
        };
        let title = Paragraph::new(title_text)
            .block(Block::default().borders(Borders::ALL).title("cfnotes"))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(title, area);
    }

    /// Bottom bar: busy/status message when there is one, key help otherwise.
    fn render_footer(&self, frame: &mut Frame, area: Rect, help_text: &str) {
        if let Some(action) = &self.pending {
            let busy = match action {
                PendingAction::Save { .. } => "⏳ Saving...",
                PendingAction::Refresh(_) => "⏳ Looking up problem...",
                PendingAction::Delete(_) => "⏳ Deleting...",
                PendingAction::Export => "⏳ Exporting...",
                PendingAction::Import(_) => "⏳ Importing...",
            };
            let status = Paragraph::new(busy)
                .block(Block::default().borders(Borders::ALL).title("Status"))
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(status, area);
            return;
        }

        if let Some(ref message) = self.status_message {
            let status_color = if message.starts_with('✓') {
                Color::Green
            } else if message.starts_with('✗') {
                Color::Red
            } else {
                Color::Yellow
            };
            let status = Paragraph::new(message.as_str())
                .block(Block::default().borders(Borders::ALL).title("Status"))
                .style(Style::default().fg(status_color));
            frame.render_widget(status, area);
            return;
        }

        let help = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, area);
    }

    fn render_list(&self, frame: &mut Frame) {
        let filter_height = if self.mode == AppMode::Filter { 3 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(filter_height),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let criteria = self.criteria();
        let suffix = (!criteria.is_empty()).then(|| describe_criteria(&criteria));
        self.render_title(frame, chunks[0], suffix);

        if self.mode == AppMode::Filter {
            self.render_filter_panel(frame, chunks[1]);
        }

        let visible = self.visible();
        if visible.is_empty() {
            let message = if self.service.notes().is_empty() {
                "No problems saved yet. Press n to add one."
            } else {
                "No matches found."
            };
            let empty = Paragraph::new(message)
                .block(Block::default().borders(Borders::ALL).title("Problems"))
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true });
            frame.render_widget(empty, chunks[2]);
        } else {
            let items: Vec<ListItem> = visible
                .iter()
                .enumerate()
                .map(|(i, note)| self.list_item(note, i == self.selected_index))
                .collect();

            let mut state = ratatui::widgets::ListState::default();
            state.select(Some(self.selected_index));

            let list_title = if criteria.is_empty() {
                format!("Problems ({})", visible.len())
            } else {
                format!("Problems ({} of {})", visible.len(), self.service.notes().len())
            };
            let list = List::new(items)
                .block(Block::default().borders(Borders::ALL).title(list_title))
                .highlight_style(Style::default().bg(Color::DarkGray));
            frame.render_stateful_widget(list, chunks[2], &mut state);
        }

        let help_text = if self.mode == AppMode::Filter {
            "Tab: next field | type to filter | Enter: keep filter | Esc: clear filter"
        } else {
            "j/k: navigate | Enter: view | n: new | e: edit | d: delete | /: search | f: filter | x: export | i: import | ?: help | q: quit"
        };
        self.render_footer(frame, chunks[3], help_text);
    }

    fn list_item<'a>(&self, note: &'a ProblemNote, is_selected: bool) -> ListItem<'a> {
        let mut lines = Vec::new();

        let (marker, title_style) = if is_selected {
            ("▶ ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        } else {
            ("  ", Style::default().fg(Color::White))
        };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Cyan)),
            Span::styled(note.display_name(), title_style),
        ]));

        let mut meta = vec![Span::raw("  ")];
        if let Some(rating) = note.rating {
            meta.push(rating_badge(rating, note.rating_tier()));
            meta.push(Span::raw(" "));
        }
        if note.is_resolved() {
            meta.push(Span::styled(note.link.as_str(), Style::default().fg(Color::DarkGray)));
        }
        if meta.len() > 1 {
            lines.push(Line::from(meta));
        }

        if let Some(tags) = note.tags.as_ref().filter(|t| !t.is_empty()) {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(format!("[{}]", tags.join("] [")), Style::default().fg(Color::Blue)),
            ]));
        }

        // Preview line (first line of notes, truncated)
        let preview = note.notes.lines().next().unwrap_or("").trim();
        if !preview.is_empty() {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(truncate(preview, 70), Style::default().fg(Color::Gray)),
            ]));
        }
        lines.push(Line::default());

        ListItem::new(lines)
    }

    fn render_filter_panel(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(20), Constraint::Percentage(30)])
            .split(area);

        let fields = [
            (FilterField::Text, "🔍 Search", &self.search_input),
            (FilterField::Rating, "Rating", &self.rating_input),
            (FilterField::Tags, "Tags (a, b)", &self.tags_input),
        ];
        for (i, (field, label, value)) in fields.into_iter().enumerate() {
            let style = if field == self.filter_field {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let input = Paragraph::new(value.as_str())
                .block(Block::default().borders(Borders::ALL).title(label).border_style(style))
                .style(Style::default().fg(Color::White));
            frame.render_widget(input, columns[i]);
        }
    }

    fn render_detail(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.render_title(frame, chunks[0], None);

        if let Some(note) = self.current() {
            let mut lines: Vec<Line> = Vec::new();

            let mut meta = Vec::new();
            if let Some(rating) = note.rating {
                meta.push(rating_badge(rating, note.rating_tier()));
                meta.push(Span::raw("  "));
            }
            if let (Some(contest), Some(index)) = (&note.contest_id, &note.index) {
                meta.push(Span::styled(
                    format!("Contest {} · Problem {}", contest, index.to_uppercase()),
                    Style::default().fg(Color::Cyan),
                ));
                meta.push(Span::raw("  "));
            }
            meta.push(Span::styled(format!("📅 {}", format_date(&note.date)), Style::default().fg(Color::DarkGray)));
            lines.push(Line::from(meta));

            lines.push(Line::from(vec![
                Span::styled("🔗 ", Style::default().fg(Color::Cyan)),
                Span::styled(note.link.as_str(), Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED)),
            ]));

            if let Some(tags) = note.tags.as_ref().filter(|t| !t.is_empty()) {
                let mut tag_spans = vec![Span::styled("🏷️  ", Style::default().fg(Color::Cyan))];
                for (i, tag) in tags.iter().enumerate() {
                    if i > 0 {
                        tag_spans.push(Span::raw(" "));
                    }
                    tag_spans.push(Span::styled(
                        format!("[{}]", tag),
                        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                    ));
                }
                lines.push(Line::from(tag_spans));
            }
            lines.push(Line::default());

            if note.notes.trim().is_empty() {
                lines.push(Line::from(Span::styled("(no notes)", Style::default().fg(Color::DarkGray))));
            } else {
                for line in note.notes.lines() {
                    lines.push(Line::from(Span::styled(line, Style::default().fg(Color::White))));
                }
            }

            let content = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(note.display_name()))
                .wrap(Wrap { trim: false });
            frame.render_widget(content, chunks[1]);
        }

        self.render_footer(frame, chunks[2], "e: edit | r: refresh metadata | d: delete | Esc: back");
    }

    fn render_form(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let heading = if self.editing_id.is_some() { "Edit Problem" } else { "Add Problem" };
        self.render_title(frame, chunks[0], Some(heading.to_string()));

        let active = Style::default().fg(Color::Yellow);
        let inactive = Style::default().fg(Color::DarkGray);

        let link = Paragraph::new(self.link_input.as_str())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Problem link")
                    .border_style(if self.form_field == FormField::Link { active } else { inactive }),
            )
            .style(Style::default().fg(Color::White));
        frame.render_widget(link, chunks[1]);

        let char_count = self.notes_input.chars().count();
        let line_count = self.notes_input.lines().count();
        let notes = Paragraph::new(self.notes_input.as_str())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Notes ({} chars, {} lines)", char_count, line_count))
                    .border_style(if self.form_field == FormField::Notes { active } else { inactive }),
            )
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::White));
        frame.render_widget(notes, chunks[2]);

        self.render_footer(frame, chunks[3], "Tab: switch field | Ctrl+S: save | Esc: cancel");
    }

    fn render_delete_confirm(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.render_title(frame, chunks[0], None);

        let message = match self.current() {
            Some(note) => format!(
                "Delete this note?\n\n{}\n\nPress Enter/y to confirm, Esc/n to cancel",
                note.display_name()
            ),
            None => "Delete note?".to_string(),
        };
        let confirm = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title("Confirm Delete"))
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Red));
        frame.render_widget(confirm, chunks[1]);

        self.render_footer(frame, chunks[2], "Enter/y: confirm | Esc/n: cancel");
    }

    fn render_import(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.render_title(frame, chunks[0], None);

        let input = Paragraph::new(format!("📂 {}", self.input_buffer))
            .block(Block::default().borders(Borders::ALL).title("Import backup file (path)"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(input, chunks[1]);

        let hint = Paragraph::new(
            "Expects a JSON array of notes, as written by export.\n\
             Notes with a known id are updated, new ids are added, entries without id or link are skipped.",
        )
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(hint, chunks[2]);

        self.render_footer(frame, chunks[3], "Enter: import | Esc: cancel");
    }

    fn render_help(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.render_title(frame, chunks[0], None);

        let help_text = r#"📖 Keyboard Shortcuts

LIST:
  j / ↓          Navigate down
  k / ↑          Navigate up
  Enter          View selected problem
  n              Add problem
  e              Edit selected problem
  d              Delete selected problem
  /              Search text
  f              Filter by rating / tags
  x              Export backup
  i              Import backup
  Esc            Clear filters (or quit)
  q              Quit

DETAIL:
  e              Edit
  r              Look up metadata again
  d              Delete
  Esc            Back to list

FORM:
  Tab            Switch between link and notes
  Ctrl+S         Save
  Esc            Cancel

FILTER:
  Tab            Next field (search, rating, tags)
  Tags           Comma separated, every tag must match
  Enter          Keep filter
  Esc            Clear filter
"#;

        let help_para = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Keyboard Shortcuts"))
            .style(Style::default().fg(Color::White));
        frame.render_widget(help_para, chunks[1]);

        self.render_footer(frame, chunks[2], "Esc: back");
    }
}

fn tier_color(tier: RatingTier) -> Color {
    match tier {
        RatingTier::Gray => Color::Gray,
        RatingTier::Green => Color::Green,
        RatingTier::Cyan => Color::Cyan,
        RatingTier::Blue => Color::Blue,
        RatingTier::Violet => Color::Magenta,
        RatingTier::Orange => Color::Rgb(255, 140, 0),
        RatingTier::Red => Color::Red,
    }
}

fn rating_badge(rating: i64, tier: RatingTier) -> Span<'static> {
    Span::styled(
        format!(" {} ", rating),
        Style::default()
            .fg(Color::Black)
            .bg(tier_color(tier))
            .add_modifier(Modifier::BOLD),
    )
}

fn describe_criteria(criteria: &FilterCriteria) -> String {
    let mut parts = Vec::new();
    if !criteria.text.is_empty() {
        parts.push(format!("search: {}", criteria.text));
    }
    if let Some(rating) = &criteria.rating_equals {
        parts.push(format!("rating: {}", rating));
    }
    if !criteria.tags_all_of.is_empty() {
        parts.push(format!("tags: {}", criteria.tags_all_of.join(" & ")));
    }
    parts.join(", ")
}

fn format_date(raw: &str) -> String {
    match crate::storage::note::parse_date(raw) {
        Some(date) => date.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string(),
        None => raw.split('T').next().unwrap_or("").to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::codeforces::ProblemDescriptor;
    use crate::service::resolver::Resolver;
    use crate::service::resolver::tests::StubProvider;
    use crate::storage::kv::MemoryStore;
    use std::sync::Arc;

    async fn app() -> App {
        let provider = Arc::new(StubProvider::with_problems(vec![ProblemDescriptor {
            index: "A".to_string(),
            name: "Theatre Square".to_string(),
            rating: Some(1000),
            tags: Some(vec!["math".to_string()]),
        }]));
        let service = NoteService::load(Arc::new(MemoryStore::new()), Resolver::new(provider))
            .await
            .unwrap();
        App::new(service, std::env::temp_dir())
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    fn ctrl_s(app: &mut App) {
        app.handle_key(KeyCode::Char('s'), KeyModifiers::CONTROL);
    }

    #[tokio::test]
    async fn test_add_problem_through_form() {
        let mut app = app().await;
        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE);
        assert_eq!(app.mode, AppMode::Form);

        type_text(&mut app, "https://codeforces.com/contest/1/problem/A");
        app.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        type_text(&mut app, "ceil");
        ctrl_s(&mut app);
        assert!(app.is_busy());

        // Keys are ignored while the save is in flight.
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(app.mode, AppMode::Form);

        app.run_pending().await;
        assert!(!app.is_busy());
        assert_eq!(app.mode, AppMode::List);
        assert_eq!(app.service.notes().len(), 1);
        assert_eq!(app.service.notes()[0].display_name(), "Theatre Square");
        assert_eq!(app.service.notes()[0].notes, "ceil");
    }

    #[tokio::test]
    async fn test_empty_link_is_not_saved() {
        let mut app = app().await;
        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE);
        ctrl_s(&mut app);
        assert!(!app.is_busy());
        assert!(app.status_message.as_deref().unwrap().starts_with('✗'));
    }

    #[tokio::test]
    async fn test_edit_from_detail_returns_to_detail() {
        let mut app = app().await;
        app.service
            .create_note("https://example.com/p".to_string(), "first".to_string())
            .await
            .unwrap();

        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(app.mode, AppMode::Detail);
        app.handle_key(KeyCode::Char('e'), KeyModifiers::NONE);
        assert_eq!(app.mode, AppMode::Form);
        assert_eq!(app.link_input, "https://example.com/p");

        app.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        type_text(&mut app, "!");
        ctrl_s(&mut app);
        app.run_pending().await;

        assert_eq!(app.mode, AppMode::Detail);
        assert_eq!(app.service.notes()[0].notes, "first!");
    }

    #[tokio::test]
    async fn test_filter_narrows_visible_list() {
        let mut app = app().await;
        app.service
            .create_note("https://codeforces.com/contest/1/problem/A".to_string(), String::new())
            .await
            .unwrap();
        app.service
            .create_note("https://example.com/other".to_string(), String::new())
            .await
            .unwrap();
        assert_eq!(app.visible().len(), 2);

        app.handle_key(KeyCode::Char('f'), KeyModifiers::NONE);
        type_text(&mut app, "1000");
        assert_eq!(app.visible().len(), 1);
        app.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        type_text(&mut app, "graphs");
        assert!(app.visible().is_empty());

        app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(app.mode, AppMode::List);
        assert_eq!(app.visible().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_with_confirmation() {
        let mut app = app().await;
        app.service
            .create_note("https://example.com/p".to_string(), String::new())
            .await
            .unwrap();

        app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE);
        assert_eq!(app.mode, AppMode::DeleteConfirm);
        app.handle_key(KeyCode::Char('y'), KeyModifiers::NONE);
        app.run_pending().await;

        assert_eq!(app.mode, AppMode::List);
        assert!(app.service.notes().is_empty());
    }

    #[tokio::test]
    async fn test_import_missing_file_reports_error() {
        let mut app = app().await;
        app.handle_key(KeyCode::Char('i'), KeyModifiers::NONE);
        type_text(&mut app, "/definitely/not/here.json");
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        app.run_pending().await;

        assert_eq!(app.mode, AppMode::List);
        assert!(app.status_message.as_deref().unwrap().starts_with("✗ Error importing file"));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "ééé...");
    }
}
