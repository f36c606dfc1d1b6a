use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::KiraError;

const EVENTS_MAX: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Resolve,
    Fetch,
    Store,
    Extract,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Resolve => "Resolve",
            Phase::Fetch => "Fetch",
            Phase::Store => "Store",
            Phase::Extract => "Extract",
        }
    }
}

#[derive(Debug)]
struct RunState {
    status: String,
    phase: Phase,
    fragment: Option<(usize, usize)>,
    fragments_written: usize,
    fragments_skipped: usize,
    events: VecDeque<String>,
    started: Instant,
    active: bool,
}

/// Full-screen progress view for one run. The job runs on a worker thread and
/// reports through [`ProgressSink`]; `q` or Esc aborts the view.
pub struct Tui {
    title: String,
    state: Arc<Mutex<RunState>>,
}

struct TuiProgress {
    state: Arc<Mutex<RunState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some((phase, payload)) = parse_phase(&message) {
                state.phase = phase;
                state.status = payload.to_string();
                if let Some(position) = parse_fragment(payload) {
                    state.fragment = Some(position);
                }
                if phase == Phase::Store {
                    if payload.contains("already saved") {
                        state.fragments_skipped += 1;
                    } else if payload.contains("records for") {
                        state.fragments_written += 1;
                    }
                }
            } else {
                state.status = message.clone();
            }
            let line = match event.elapsed {
                Some(elapsed) => format!("[{}] {message} ({:.1}s)", timestamp(), elapsed.as_secs_f64()),
                None => format!("[{}] {message}", timestamp()),
            };
            push_event(&mut state.events, line);
        }
    }
}

impl Tui {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: Arc::new(Mutex::new(RunState {
                status: "starting".to_string(),
                phase: Phase::Resolve,
                fragment: None,
                fragments_written: 0,
                fragments_skipped: 0,
                events: VecDeque::new(),
                started: Instant::now(),
                active: false,
            })),
        }
    }

    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, KiraError> + Send + 'static,
        R: Send + 'static,
    {
        self.set_active(true);

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_run(frame, &self.title, &state, tick))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                self.restore()?;
                handle.join().ok();
                return result.map_err(miette::Report::new);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind == KeyEventKind::Press
                        && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                    {
                        break;
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }

        self.restore()?;
        Err(miette::Report::msg(
            "aborted; completed fragments are kept and skipped on the next run",
        ))
    }

    fn restore(&self) -> miette::Result<()> {
        self.set_active(false);
        disable_raw_mode().into_diagnostic()?;
        io::stdout().execute(LeaveAlternateScreen).into_diagnostic()?;
        Ok(())
    }

    fn set_active(&self, active: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
            if active {
                state.started = Instant::now();
            }
        }
    }
}

fn draw_run(frame: &mut ratatui::Frame, title: &str, state: &RunState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let hb = if tick % 2 == 0 { "*" } else { " " };
    let header = Paragraph::new(vec![Line::from(vec![
        Span::styled(
            "KIRA-GV",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw(format!("   {title}   ")),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ])])
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let phase_color = if state.active { Color::Cyan } else { Color::Green };
    let (bar, fragment_label) = match state.fragment {
        Some((current, total)) => (
            progress_bar(current, total),
            format!(" fragment {current}/{total}"),
        ),
        None => (progress_bar(0, 1), String::new()),
    };
    let status = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Phase: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:<8}", state.phase.label()),
                Style::default().fg(phase_color),
            ),
            Span::raw(bar),
            Span::raw(fragment_label),
        ]),
        Line::from(vec![
            Span::styled("Fragments: ", Style::default().fg(Color::Gray)),
            Span::raw(format!(
                "{} written, {} skipped",
                state.fragments_written, state.fragments_skipped
            )),
        ]),
        Line::from(vec![
            Span::styled("Elapsed: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}s", state.started.elapsed().as_secs())),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.clone()),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("STATUS / PROGRESS"),
    )
    .wrap(Wrap { trim: true });
    frame.render_widget(status, chunks[1]);

    let events = state
        .events
        .iter()
        .rev()
        .map(|event| Line::from(event.clone()))
        .collect::<Vec<_>>();
    let log = Paragraph::new(events)
        .block(Block::default().borders(Borders::ALL).title("Recent events"))
        .wrap(Wrap { trim: true });
    frame.render_widget(log, chunks[2]);

    let footer = Paragraph::new(Line::from(Span::styled(
        "q / Esc: leave (finished fragments stay on disk)",
        Style::default().fg(Color::Gray),
    )));
    frame.render_widget(footer, chunks[3]);
}

fn progress_bar(current: usize, total: usize) -> String {
    let width = 20;
    let filled = if total == 0 { 0 } else { (current.min(total) * width) / total };
    let mut out = String::from("[");
    for i in 0..width {
        out.push(if i < filled { '#' } else { '.' });
    }
    out.push(']');
    out
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    for phase in [Phase::Resolve, Phase::Fetch, Phase::Store, Phase::Extract] {
        let prefix = format!("phase={};", phase.label());
        if let Some(rest) = message.strip_prefix(prefix.as_str()) {
            return Some((phase, rest.trim()));
        }
    }
    None
}

/// `fragment 3 of 12 ...` -> (3, 12)
fn parse_fragment(payload: &str) -> Option<(usize, usize)> {
    let rest = payload.split("fragment ").nth(1)?;
    let mut words = rest.split_whitespace();
    let current = words.next()?.trim_end_matches(':').parse().ok()?;
    if words.next()? != "of" {
        return None;
    }
    let total = words.next()?.trim_end_matches(':').parse().ok()?;
    Some((current, total))
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    let mins = (secs / 60) % 60;
    let hours = (secs / 3600) % 24;
    let seconds = secs % 60;
    format!("{hours:02}:{mins:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_position_from_message() {
        assert_eq!(parse_fragment("fragment 3 of 12 (100 ids)"), Some((3, 12)));
        assert_eq!(parse_fragment("fragment 2 of 4: 40 records for 4 ids"), Some((2, 4)));
        assert_eq!(parse_fragment("collecting identifiers"), None);
    }

    #[test]
    fn phase_prefix_parsed() {
        let (phase, rest) = parse_phase("phase=Store; fragment 1 of 2 already saved").unwrap();
        assert_eq!(phase, Phase::Store);
        assert_eq!(rest, "fragment 1 of 2 already saved");
    }
}
