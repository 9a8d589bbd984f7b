use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use quantum_trust::{
    convert, format_currency, format_magnitude, format_units, parse_amount,
    scarcity_reflection_index, trust_units, CoherenceOscillator, DashboardConfig, Gate,
    MockOperationRecord, OperationLog, OperationSimulator, OperationStatus, SettleQueue,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(250);

/// Amount used by the overview when nothing is typed
const DEFAULT_AMOUNT: f64 = 1_000_000.0;

/// Headline debt figures shown on the overview
const DEBT_FIGURES: [(&str, f64); 4] = [
    ("US federal debt", 3.4e13),
    ("Global public debt", 9.7e13),
    ("Global total debt", 3.07e14),
    ("Derivatives notional", 6.1e14),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Conversion,
    Operations,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Conversion,
            Page::Conversion => Page::Operations,
            Page::Operations => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Operations,
            Page::Conversion => Page::Overview,
            Page::Operations => Page::Conversion,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Conversion => "Conversion",
            Page::Operations => "Operations",
        }
    }
}

/// Mock actions bound to keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Mine,
    Bridge,
    Nullify,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Mine => "mine",
            Action::Bridge => "bridge",
            Action::Nullify => "nullify",
        }
    }
}

pub struct App {
    pub current_page: Page,
    pub log: OperationLog,
    pub log_state: TableState,
    pub simulator: OperationSimulator,
    pub pending: SettleQueue,
    pub gate: Gate,
    pub amount_input: String,
    pub coherence: CoherenceOscillator,
    pub pulse: CoherenceOscillator,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: &DashboardConfig) -> Self {
        Self::with_simulator(
            OperationSimulator::new(config.success_rate),
            config.coherence_base,
            config.log_window,
            config.settle_delay,
        )
    }

    pub fn with_simulator(
        simulator: OperationSimulator,
        coherence_base: f64,
        log_window: usize,
        settle_delay: Duration,
    ) -> Self {
        Self {
            current_page: Page::Overview,
            log: OperationLog::new(log_window),
            log_state: TableState::default(),
            simulator,
            pending: SettleQueue::new(settle_delay),
            gate: Gate::default(),
            amount_input: String::new(),
            coherence: CoherenceOscillator::coherence(coherence_base),
            pulse: CoherenceOscillator::pulse(coherence_base),
            status_message: None,
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn cycle_gate(&mut self) {
        self.gate = self.gate.next();
        self.status_message = Some(format!("Switched to {}", self.gate));
    }

    pub fn push_char(&mut self, c: char) {
        if c.is_ascii_digit() || (c == '.' && !self.amount_input.contains('.')) {
            self.amount_input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.amount_input.pop();
    }

    /// Parsed input; `None` disables the mock actions
    pub fn amount(&self) -> Option<f64> {
        parse_amount(&self.amount_input)
    }

    /// Append a pending mock record for `action`. Returns None when the amount is unusable.
    pub fn perform(&mut self, action: Action) -> Option<&MockOperationRecord> {
        self.perform_at(action, Utc::now().timestamp_millis(), Instant::now())
    }

    pub fn perform_at(&mut self, action: Action, millis: i64, now: Instant) -> Option<&MockOperationRecord> {
        let Some(amount) = self.amount() else {
            self.status_message = Some("Enter an amount first".to_string());
            return None;
        };

        let coherence = self.coherence.sample_at(millis);
        let (value, unit) = match action {
            Action::Mine => (trust_units(amount, coherence), "TU"),
            Action::Bridge => (
                convert(amount, "BTC", "TU", &self.gate.rate_table(), coherence),
                "TU",
            ),
            Action::Nullify => (amount, "USD"),
        };

        let record = if self.pending.delay().is_zero() {
            self.simulator.simulate(action.kind(), value, unit)
        } else {
            let record = self.simulator.begin(action.kind(), value, unit);
            self.pending.schedule(record.id.clone(), now);
            record
        };
        self.status_message = Some(format!(
            "{} {} -> {}",
            record.kind,
            format_units(record.amount, &record.unit),
            record.status
        ));
        self.log.push(record);
        self.log_state.select(Some(0));
        self.log.latest()
    }

    /// Roll outcomes for pending records whose delay has elapsed
    pub fn settle_due(&mut self, now: Instant) -> usize {
        let mut settled = 0;
        for id in self.pending.take_due(now) {
            let status = self.simulator.outcome();
            // records pushed out of the window are dropped silently
            if self.log.settle(&id, status) {
                self.status_message = Some(format!("{} -> {}", id, status));
                settled += 1;
            }
        }
        settled
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
        self.pending.clear();
        self.log_state.select(None);
        self.status_message = Some("Operation log cleared".to_string());
    }

    /// (pair, rate, converted) for the active gate and amount
    pub fn conversion_rows(&self, coherence: f64) -> Vec<(String, f64, f64)> {
        let amount = self.amount().unwrap_or(1.0);
        let table = self.gate.rate_table();

        table
            .entries()
            .into_iter()
            .filter_map(|(key, rate)| {
                let (from, to) = key.split_once('_')?;
                Some((key.to_string(), rate, convert(amount, from, to, &table, coherence)))
            })
            .collect()
    }

    pub fn next(&mut self) {
        let len = self.log.len();
        if len == 0 {
            return;
        }
        let i = match self.log_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.log_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.log.len();
        if len == 0 {
            return;
        }
        let i = match self.log_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.log_state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        app.settle_due(Instant::now());
        terminal.draw(|f| ui(f, app))?;

        // Redraw on every tick so the oscillating values stay live
        if !event::poll(TICK)? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    app.previous_page();
                } else {
                    app.next_page();
                }
            }
            KeyCode::BackTab => app.previous_page(),
            KeyCode::Char('m') => {
                app.perform(Action::Mine);
            }
            KeyCode::Char('b') => {
                app.perform(Action::Bridge);
            }
            KeyCode::Char('n') => {
                app.perform(Action::Nullify);
            }
            KeyCode::Char('x') => app.clear_log(),
            KeyCode::Char('g') => app.cycle_gate(),
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => app.push_char(c),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let millis = Utc::now().timestamp_millis();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app, millis);

    match app.current_page {
        Page::Overview => render_overview(f, chunks[1], app, millis),
        Page::Conversion => render_conversion(f, chunks[1], app, millis),
        Page::Operations => render_operations(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App, millis: i64) {
    let pages = [Page::Overview, Page::Conversion, Page::Operations];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Coherence: {:.4}", app.coherence.sample_at(millis)),
        Style::default().fg(Color::Magenta),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.gate.label(),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn metric_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("  {:<24}", label)),
        Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])
}

fn render_overview(f: &mut Frame, area: Rect, app: &App, millis: i64) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let coherence = app.coherence.sample_at(millis);
    let amount = app.amount().unwrap_or(DEFAULT_AMOUNT);

    let metrics = vec![
        Line::from(""),
        metric_line("Quantum coherence", format!("{:.6}", coherence), Color::Magenta),
        metric_line("Pulse", format!("{:.4}", app.pulse.sample_at(millis)), Color::Magenta),
        Line::from(""),
        metric_line("Input amount", format_currency(amount), Color::White),
        metric_line("Scarcity Reflection Index", format!("{}", scarcity_reflection_index(amount)), Color::Cyan),
        metric_line("Trust units", format_units(trust_units(amount, coherence), "TU"), Color::Green),
        metric_line("Trust capacity", format_magnitude(f64::INFINITY), Color::Green),
        Line::from(""),
        metric_line("Pending ops", app.log.count_by_status(OperationStatus::Pending).to_string(), Color::Yellow),
        metric_line("Succeeded ops", app.log.count_by_status(OperationStatus::Success).to_string(), Color::Green),
        metric_line("Failed ops", app.log.count_by_status(OperationStatus::Error).to_string(), Color::Red),
        metric_line("Trust units settled", format_units(app.log.total_amount("TU"), "TU"), Color::Green),
    ];

    let left = Paragraph::new(metrics).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Live Metrics "),
    );
    f.render_widget(left, columns[0]);

    let mut debt_lines = vec![Line::from("")];
    debt_lines.extend(
        DEBT_FIGURES
            .iter()
            .map(|(label, value)| metric_line(label, format_currency(*value), Color::Red)),
    );

    let right = Paragraph::new(debt_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Debt Monitor "),
    );
    f.render_widget(right, columns[1]);
}

fn render_conversion(f: &mut Frame, area: Rect, app: &App, millis: i64) {
    let coherence = app.coherence.sample_at(millis);

    let header_cells = ["Pair", "Rate", "Converted"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.conversion_rows(coherence).into_iter().map(|(pair, rate, converted)| {
        let to = pair.split_once('_').map(|(_, to)| to.to_string()).unwrap_or_default();
        Row::new(vec![
            Cell::from(pair),
            Cell::from(format!("{:.4}", rate)),
            Cell::from(format_units(converted, &to)).style(Style::default().fg(Color::Green)),
        ])
        .height(1)
    });

    let amount_label = if app.amount_input.is_empty() {
        "1".to_string()
    } else {
        app.amount_input.clone()
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(24),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {} - amount {} × coherence {:.4} ", app.gate, amount_label, coherence)),
    );

    f.render_widget(table, area);
}

fn status_color(status: OperationStatus) -> Color {
    match status {
        OperationStatus::Pending => Color::Yellow,
        OperationStatus::Success => Color::Green,
        OperationStatus::Error => Color::Red,
    }
}

fn render_operations(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Time", "ID", "Kind", "Amount", "Status"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.log.iter().map(|record| {
        let color = status_color(record.status);
        Row::new(vec![
            Cell::from(record.timestamp.format("%H:%M:%S").to_string()),
            Cell::from(record.id.clone()),
            Cell::from(record.kind.clone()),
            Cell::from(format_units(record.amount, &record.unit)),
            Cell::from(record.status.as_str()).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(34),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Operations ({}/{}) ", app.log.len(), app.log.capacity())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.log_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let input = if app.amount_input.is_empty() { "-" } else { app.amount_input.as_str() };

    let mut status_spans = vec![Span::styled(
        format!(" Amount: {} ", input),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.status_message {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(message.clone(), Style::default().fg(Color::Green)));
    }

    for (key, label, color) in [
        ("m", " Mine", Color::Yellow),
        ("b", " Bridge", Color::Yellow),
        ("n", " Nullify", Color::Yellow),
        ("g", " Gate", Color::Yellow),
        ("x", " Clear", Color::Yellow),
        ("Tab", " Page", Color::Yellow),
        ("q", " Quit", Color::Red),
    ] {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, Style::default().fg(color)));
        status_spans.push(Span::raw(label));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(1);

    fn app(success_rate: f64) -> App {
        App::with_simulator(OperationSimulator::seeded(1, success_rate), 1.0, 3, DELAY)
    }

    #[test]
    fn test_actions_need_an_amount() {
        let mut app = app(1.0);
        assert!(app.perform_at(Action::Mine, 0, Instant::now()).is_none());
        assert!(app.log.is_empty());
        assert!(app.pending.is_empty());
        assert!(app.status_message.is_some());
    }

    #[test]
    fn test_bridge_converts_through_gate() {
        let mut app = app(1.0);
        app.push_char('2');
        let now = Instant::now();

        // coherence at t=0 equals the base (1.0)
        let record = app.perform_at(Action::Bridge, 0, now).unwrap();
        assert_eq!(record.unit, "TU");
        assert_eq!(record.amount, 226.0);
        assert_eq!(record.status, OperationStatus::Pending);
    }

    #[test]
    fn test_pending_action_settles_after_delay() {
        let mut app = app(1.0);
        app.push_char('2');
        let now = Instant::now();
        let id = app.perform_at(Action::Bridge, 0, now).unwrap().id.clone();

        assert_eq!(app.settle_due(now), 0);
        assert_eq!(app.log.count_by_status(OperationStatus::Pending), 1);

        assert_eq!(app.settle_due(now + DELAY), 1);
        let record = app.log.get(&id).unwrap();
        assert_eq!(record.status, OperationStatus::Success);
        assert_eq!(app.log.len(), 1);
        assert_eq!(app.log.total_amount("TU"), 226.0);
    }

    #[test]
    fn test_zero_delay_settles_on_the_spot() {
        let mut app = App::with_simulator(OperationSimulator::seeded(1, 0.0), 1.0, 3, Duration::ZERO);
        app.push_char('1');

        let record = app.perform_at(Action::Nullify, 0, Instant::now()).unwrap();
        assert_eq!(record.status, OperationStatus::Error);
        assert!(app.pending.is_empty());
    }

    #[test]
    fn test_log_window_respected() {
        let mut app = app(0.0);
        app.push_char('5');
        let now = Instant::now();
        for _ in 0..5 {
            app.perform_at(Action::Nullify, 0, now);
        }
        assert_eq!(app.log.len(), 3);

        // the two oldest fell out of the window before settling
        assert_eq!(app.settle_due(now + DELAY), 3);
        assert_eq!(app.log.count_by_status(OperationStatus::Error), 3);

        app.perform_at(Action::Nullify, 0, now);
        app.clear_log();
        assert!(app.log.is_empty());
        assert!(app.pending.is_empty());
        assert_eq!(app.log_state.selected(), None);
    }

    #[test]
    fn test_amount_editing() {
        let mut app = app(1.0);
        for c in ['1', '.', '5', '.', 'x'] {
            app.push_char(c);
        }
        assert_eq!(app.amount_input, "1.5");
        assert_eq!(app.amount(), Some(1.5));

        app.backspace();
        app.backspace();
        app.backspace();
        assert_eq!(app.amount(), None);
    }

    #[test]
    fn test_gate_cycle_changes_rows() {
        let mut app = app(1.0);
        let before = app.conversion_rows(1.0);
        app.cycle_gate();
        let after = app.conversion_rows(1.0);

        assert_eq!(app.gate, Gate::Gate144);
        assert_ne!(before, after);
        assert!(after.iter().any(|(pair, rate, _)| pair == "BTC_TU" && *rate == 144.0));
    }

    #[test]
    fn test_page_cycle() {
        let mut app = app(1.0);
        app.next_page();
        assert_eq!(app.current_page, Page::Conversion);
        app.previous_page();
        app.previous_page();
        assert_eq!(app.current_page, Page::Operations);
    }
}
