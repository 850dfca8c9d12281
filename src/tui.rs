use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;

use crate::cover_letter::{fetch_or_absent, Source};
use crate::form::{FormController, SubmitDecision};
use crate::mailer::EmailJsMailer;
use crate::models::{CoverLetter, Field, JobPosting};
use crate::notify::{NoticeKind, Notifier, Toasts};
use crate::submit::spawn_submission;

const TICK: Duration = Duration::from_millis(100);
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];
const LOADING_PLACEHOLDER: &str = "Loading cover letter...";

/// Results of background work, applied on the UI thread.
#[derive(Debug)]
enum AppEvent {
    CoverLetter(Option<CoverLetter>),
    Submitted(Result<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Input(Field),
    Apply,
}

impl Focus {
    const RING: [Focus; 4] = [
        Focus::Input(Field::CompanyEmail),
        Focus::Input(Field::CvUrl),
        Focus::Input(Field::CoverLetterText),
        Focus::Apply,
    ];

    fn index(self) -> usize {
        Self::RING.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::RING[(self.index() + 1) % Self::RING.len()]
    }

    fn prev(self) -> Self {
        Self::RING[(self.index() + Self::RING.len() - 1) % Self::RING.len()]
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    None,
    Submit,
    Quit,
}

struct AppState {
    form: FormController,
    focus: Focus,
    letter_loading: bool,
    toasts: Toasts,
    spinner: usize,
}

impl AppState {
    fn new(job: JobPosting) -> Self {
        Self {
            form: FormController::new(job),
            focus: Focus::Input(Field::CompanyEmail),
            letter_loading: true,
            toasts: Toasts::new(),
            spinner: 0,
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::CoverLetter(letter) => {
                self.letter_loading = false;
                self.form.prefill(letter);
            }
            AppEvent::Submitted(outcome) => {
                let notice = self.form.finish_submit(outcome);
                self.toasts.notify(notice);
            }
        }
    }

    fn editable(&self, field: Field) -> bool {
        !(field == Field::CoverLetterText && self.letter_loading)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::Char('c') if ctrl => return Action::Quit,
            KeyCode::Char('s') if ctrl => return Action::Submit,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            _ => {}
        }

        match (self.focus, key.code) {
            (Focus::Apply, KeyCode::Enter) => Action::Submit,
            (Focus::Input(Field::CoverLetterText), KeyCode::Enter) => {
                self.edit(Field::CoverLetterText, |s| s.push('\n'));
                Action::None
            }
            (Focus::Input(_), KeyCode::Enter) => {
                self.focus = self.focus.next();
                Action::None
            }
            (Focus::Input(field), KeyCode::Backspace) => {
                self.edit(field, |s| {
                    s.pop();
                });
                Action::None
            }
            (Focus::Input(field), KeyCode::Char(c)) if !ctrl => {
                self.edit(field, |s| s.push(c));
                Action::None
            }
            _ => Action::None,
        }
    }

    fn edit(&mut self, field: Field, f: impl FnOnce(&mut String)) {
        if self.editable(field) {
            self.form.edit(field, f);
        }
    }

    /// Starts a submission. Returns the params to deliver when validation passed.
    fn submit(&mut self) -> Option<crate::submit::TemplateParams> {
        match self.form.begin_submit() {
            SubmitDecision::Send(params) => Some(params),
            SubmitDecision::Rejected => {
                if let Some(field) = Field::ALL
                    .into_iter()
                    .find(|f| self.form.errors().get(*f).is_some())
                {
                    self.focus = Focus::Input(field);
                }
                None
            }
            SubmitDecision::Ignored => None,
        }
    }
}

/// Leaves raw mode and the alternate screen when dropped, on every exit path.
struct TerminalGuard {
    restore: fn(),
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        Self::setup(
            enable_raw_mode,
            || stdout().execute(EnterAlternateScreen).map(|_| ()),
            restore_terminal,
        )
    }

    fn setup(
        raw_mode: impl FnOnce() -> io::Result<()>,
        alternate_screen: impl FnOnce() -> io::Result<()>,
        restore: fn(),
    ) -> Result<Self> {
        raw_mode().context("Failed to enable raw mode")?;
        let guard = Self { restore };
        alternate_screen().context("Failed to enter alternate screen")?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        (self.restore)();
    }
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = stdout().execute(LeaveAlternateScreen);
}

pub fn run_form(job: JobPosting, source: Source, mailer: EmailJsMailer) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let (tx, rx) = mpsc::unbounded_channel();
    let mailer = Arc::new(mailer);

    info!(job_key = %job.key, "starting application form");
    let fetch_tx = tx.clone();
    let job_key = job.key.clone();
    runtime.spawn(async move {
        let letter = fetch_or_absent(&source, &job_key).await;
        let _ = fetch_tx.send(AppEvent::CoverLetter(letter));
    });

    let mut state = AppState::new(job);

    let guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, rx, |state, params| {
        spawn_submission(
            runtime.handle(),
            mailer.clone(),
            params,
            tx.clone(),
            AppEvent::Submitted,
        );
        state.spinner = 0;
    });

    drop(guard);

    runtime.shutdown_background();
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    mut rx: UnboundedReceiver<AppEvent>,
    mut send: impl FnMut(&mut AppState, crate::submit::TemplateParams),
) -> Result<()> {
    loop {
        while let Ok(event) = rx.try_recv() {
            state.apply_event(event);
        }

        terminal.draw(|frame| draw(frame, state, Instant::now()))?;

        if !event::poll(TICK)? {
            state.spinner = state.spinner.wrapping_add(1);
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.handle_key(key) {
                Action::Quit => break,
                Action::Submit => {
                    if let Some(params) = state.submit() {
                        send(state, params);
                    }
                }
                Action::None => {}
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &mut AppState, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let title = Paragraph::new(Line::from(Span::styled(
        format!("Apply for {}", state.form.job().title),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(title, chunks[0]);

    draw_input(frame, state, Field::CompanyEmail, chunks[1]);
    draw_error(frame, state, Field::CompanyEmail, chunks[2]);
    draw_input(frame, state, Field::CvUrl, chunks[3]);
    draw_error(frame, state, Field::CvUrl, chunks[4]);
    draw_letter(frame, state, chunks[5]);
    draw_error(frame, state, Field::CoverLetterText, chunks[6]);
    draw_apply(frame, state, chunks[7]);

    let help = Paragraph::new(" Tab:next field  Enter:next/apply  Ctrl-S:apply  Esc:quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[8]);

    draw_toasts(frame, state, now);
}

fn input_block(state: &AppState, field: Field, title: &'static str) -> Block<'static> {
    let border = if state.focus == Focus::Input(field) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).border_style(border).title(title)
}

fn draw_input(frame: &mut Frame, state: &AppState, field: Field, area: Rect) {
    let title = match field {
        Field::CompanyEmail => " Company email ",
        Field::CvUrl => " CV URL (Google Drive, Dropbox, etc.) ",
        Field::CoverLetterText => " Cover letter ",
    };
    let value = state.form.draft().get(field);
    let inner_width = area.width.saturating_sub(2) as usize;
    // Keep the tail visible when the value is wider than the box
    let shown: String = {
        let count = value.chars().count();
        value.chars().skip(count.saturating_sub(inner_width.saturating_sub(1))).collect()
    };
    let cursor_x = shown.chars().count() as u16;

    let widget = Paragraph::new(shown).block(input_block(state, field, title));
    frame.render_widget(widget, area);

    if state.focus == Focus::Input(field) && !state.form.is_submitting() {
        frame.set_cursor_position((area.x + 1 + cursor_x, area.y + 1));
    }
}

fn draw_letter(frame: &mut Frame, state: &AppState, area: Rect) {
    let block = input_block(state, Field::CoverLetterText, " Cover letter ");

    if state.letter_loading {
        let placeholder = Paragraph::new(Span::styled(
            LOADING_PLACEHOLDER,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let width = area.width.saturating_sub(2).max(1) as usize;
    let height = area.height.saturating_sub(2) as usize;
    let (lines, cursor) = letter_lines(&state.form.draft().cover_letter_text, width, height);

    let visible: Vec<Line> = lines.into_iter().map(Line::from).collect();
    frame.render_widget(Paragraph::new(visible).block(block), area);

    if state.focus == Focus::Input(Field::CoverLetterText) && !state.form.is_submitting() {
        frame.set_cursor_position((area.x + 1 + cursor.0, area.y + 1 + cursor.1));
    }
}

/// Wraps the letter to `width` and returns the visible tail plus the cursor
/// position at the end of the text, relative to the box interior.
fn letter_lines(text: &str, width: usize, height: usize) -> (Vec<String>, (u16, u16)) {
    let mut lines: Vec<String> = textwrap::wrap(text, width)
        .into_iter()
        .map(|l| l.into_owned())
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }

    // Wrapping drops trailing spaces; the cursor still has to move past them.
    let raw_last = text.rsplit('\n').next().unwrap_or("");
    let trailing = |s: &str| s.chars().rev().take_while(|c| *c == ' ').count();
    let last = lines.last().map(String::as_str).unwrap_or("");
    let mut column =
        last.chars().count() + trailing(raw_last).saturating_sub(trailing(last));
    if column >= width {
        lines.push(String::new());
        column = 0;
    }

    let skip = lines.len().saturating_sub(height);
    let row = (lines.len() - skip).saturating_sub(1);
    let visible = lines.into_iter().skip(skip).collect();
    (visible, (column as u16, row as u16))
}

fn draw_error(frame: &mut Frame, state: &AppState, field: Field, area: Rect) {
    if let Some(message) = state.form.error_message(field) {
        let line = Paragraph::new(Span::styled(
            format!(" {}", message),
            Style::default().fg(Color::Red),
        ));
        frame.render_widget(line, area);
    }
}

fn draw_apply(frame: &mut Frame, state: &AppState, area: Rect) {
    let area = Rect { width: area.width.min(24), ..area };
    let (label, style) = if state.form.is_submitting() {
        (
            format!("{} Sending...", SPINNER[state.spinner % SPINNER.len()]),
            Style::default().fg(Color::DarkGray),
        )
    } else if state.focus == Focus::Apply {
        (
            "Apply".to_string(),
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    } else {
        ("Apply".to_string(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    };

    let button = Paragraph::new(label)
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL).border_style(style));
    frame.render_widget(button, area);
}

fn draw_toasts(frame: &mut Frame, state: &mut AppState, now: Instant) {
    let screen = frame.area();
    let mut y = screen.y + 1;
    for notice in state.toasts.visible(now) {
        let width = (notice.message.chars().count() as u16 + 4).min(screen.width);
        let area = Rect {
            x: screen.right().saturating_sub(width + 1),
            y,
            width,
            height: 3,
        };
        if area.bottom() > screen.bottom() {
            break;
        }
        let color = match notice.kind {
            NoticeKind::Success => Color::Green,
            NoticeKind::Error => Color::Red,
        };
        let toast = Paragraph::new(notice.message.as_str())
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)));
        frame.render_widget(Clear, area);
        frame.render_widget(toast, area);
        y += 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormState, FAILED_MESSAGE, SENT_MESSAGE};
    use anyhow::anyhow;
    use ratatui::backend::TestBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEMPLATE: &str = "Dear hiring team, please find my application below.";

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(state: &mut AppState, s: &str) {
        for c in s.chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn rendered(state: &mut AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(90, 36)).unwrap();
        terminal.draw(|f| draw(f, state, Instant::now())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn loaded_state() -> AppState {
        let mut state = AppState::new(JobPosting::default());
        state.apply_event(AppEvent::CoverLetter(Some(CoverLetter { text: TEMPLATE.to_string() })));
        state
    }

    #[test]
    fn test_focus_ring_wraps() {
        assert_eq!(Focus::Apply.next(), Focus::Input(Field::CompanyEmail));
        assert_eq!(Focus::Input(Field::CompanyEmail).prev(), Focus::Apply);
    }

    #[test]
    fn test_typing_fills_focused_field() {
        let mut state = loaded_state();
        type_str(&mut state, "hr@acme.com");
        state.handle_key(key(KeyCode::Enter));
        type_str(&mut state, "https://x.io/cvv");
        state.handle_key(key(KeyCode::Backspace));

        assert_eq!(state.form.draft().company_email, "hr@acme.com");
        assert_eq!(state.form.draft().cv_url, "https://x.io/cv");
    }

    #[test]
    fn test_enter_in_letter_inserts_newline() {
        let mut state = loaded_state();
        state.focus = Focus::Input(Field::CoverLetterText);
        state.handle_key(key(KeyCode::Enter));
        assert_eq!(state.form.draft().cover_letter_text, format!("{}\n", TEMPLATE));
    }

    #[test]
    fn test_letter_is_not_editable_while_loading() {
        let mut state = AppState::new(JobPosting::default());
        state.focus = Focus::Input(Field::CoverLetterText);
        type_str(&mut state, "abc");
        assert_eq!(state.form.draft().cover_letter_text, "");
    }

    #[test]
    fn test_submit_keys() {
        let mut state = loaded_state();
        assert_eq!(state.handle_key(ctrl('s')), Action::Submit);
        assert_eq!(state.handle_key(key(KeyCode::Esc)), Action::Quit);
        state.focus = Focus::Apply;
        assert_eq!(state.handle_key(key(KeyCode::Enter)), Action::Submit);
    }

    #[test]
    fn test_rejected_submit_focuses_first_invalid_field() {
        let mut state = loaded_state();
        type_str(&mut state, "hr@acme.com");
        state.focus = Focus::Apply;

        assert!(state.submit().is_none());
        assert_eq!(state.focus, Focus::Input(Field::CvUrl));
        assert!(rendered(&mut state).contains("CV URL is required"));
    }

    #[test]
    fn test_second_submit_while_sending_is_ignored() {
        let mut state = loaded_state();
        type_str(&mut state, "hr@acme.com");
        state.handle_key(key(KeyCode::Tab));
        type_str(&mut state, "https://drive.google.com/x");

        assert!(state.submit().is_some());
        assert!(state.submit().is_none());
        assert!(rendered(&mut state).contains("Sending..."));
    }

    #[test]
    fn test_placeholder_shown_while_loading() {
        let mut state = AppState::new(JobPosting::default());
        assert!(rendered(&mut state).contains(LOADING_PLACEHOLDER));

        let mut state = loaded_state();
        let screen = rendered(&mut state);
        assert!(!screen.contains(LOADING_PLACEHOLDER));
        assert!(screen.contains("Dear hiring team"));
        assert!(screen.contains("Apply for C++ Software Engineer"));
    }

    #[test]
    fn test_letter_cursor_follows_trailing_space() {
        let (lines, cursor) = letter_lines("Dear team", 20, 5);
        assert_eq!(lines, vec!["Dear team"]);
        assert_eq!(cursor, (9, 0));

        let (lines, cursor) = letter_lines("Dear team ", 20, 5);
        assert_eq!(lines, vec!["Dear team"]);
        assert_eq!(cursor, (10, 0));

        let (_, cursor) = letter_lines("Dear team\nI  ", 20, 5);
        assert_eq!(cursor, (3, 1));
    }

    #[test]
    fn test_letter_cursor_moves_to_next_row_when_line_is_full() {
        let (lines, cursor) = letter_lines("abcdefghij ", 10, 5);
        assert_eq!(lines, vec!["abcdefghij", ""]);
        assert_eq!(cursor, (0, 1));
    }

    #[test]
    fn test_letter_scrolls_to_keep_cursor_visible() {
        let (lines, cursor) = letter_lines("one\ntwo\nthree\nfour", 20, 2);
        assert_eq!(lines, vec!["three", "four"]);
        assert_eq!(cursor, (4, 1));
    }

    #[test]
    fn test_rendered_cursor_moves_after_typed_space() {
        let mut state = AppState::new(JobPosting::default());
        state.apply_event(AppEvent::CoverLetter(None));
        state.focus = Focus::Input(Field::CoverLetterText);
        type_str(&mut state, "Dear ");

        let mut terminal = Terminal::new(TestBackend::new(90, 36)).unwrap();
        terminal.draw(|f| draw(f, &mut state, Instant::now())).unwrap();
        // The letter box starts on row 10; its interior is one cell in.
        let cursor = terminal.get_cursor_position().unwrap();
        assert_eq!(cursor, Position::new(1 + 5, 10 + 1));
    }

    static RESTORED_ON_FAILURE: AtomicUsize = AtomicUsize::new(0);
    static RESTORED_ON_DROP: AtomicUsize = AtomicUsize::new(0);
    static RESTORED_WITHOUT_RAW: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn test_terminal_restored_when_alternate_screen_fails() {
        let result = TerminalGuard::setup(
            || Ok(()),
            || Err(io::Error::other("no tty")),
            || {
                RESTORED_ON_FAILURE.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(result.is_err());
        assert_eq!(RESTORED_ON_FAILURE.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_terminal_restored_once_when_guard_drops() {
        let guard = TerminalGuard::setup(
            || Ok(()),
            || Ok(()),
            || {
                RESTORED_ON_DROP.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        assert_eq!(RESTORED_ON_DROP.load(Ordering::SeqCst), 0);
        drop(guard);
        assert_eq!(RESTORED_ON_DROP.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nothing_to_restore_when_raw_mode_fails() {
        let result = TerminalGuard::setup(
            || Err(io::Error::other("not a terminal")),
            || Ok(()),
            || {
                RESTORED_WITHOUT_RAW.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(result.is_err());
        assert_eq!(RESTORED_WITHOUT_RAW.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submission_outcomes_show_toasts() {
        let mut state = loaded_state();
        type_str(&mut state, "hr@acme.com");
        state.handle_key(key(KeyCode::Tab));
        type_str(&mut state, "https://drive.google.com/x");

        state.submit();
        state.apply_event(AppEvent::Submitted(Err(anyhow!("503"))));
        assert_eq!(state.form.state(), FormState::Idle);
        assert_eq!(state.form.draft().company_email, "hr@acme.com");
        assert!(rendered(&mut state).contains(FAILED_MESSAGE));

        state.submit();
        state.apply_event(AppEvent::Submitted(Ok(())));
        assert_eq!(state.form.draft().company_email, "");
        assert_eq!(state.form.draft().cover_letter_text, TEMPLATE);
        assert!(rendered(&mut state).contains(SENT_MESSAGE));
    }
}
