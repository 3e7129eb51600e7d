mod help;
mod render;

use crate::cli::Cli;
use crate::engine::{ingest, AnalysisEngine};
use crate::flow::{Action, AppState, AppStatus};
use crate::model::{tier_details, AnalysisParams, SessionEvent, TierId, TIERS};
use crate::notify::Notifier;
use crate::orchestrator::{self, SessionDeps, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame, Terminal,
};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Which input field currently receives keystrokes in the initial screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Provider,
    Budget,
    Services,
    Document,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Provider => Field::Budget,
            Field::Budget => Field::Services,
            Field::Services => Field::Document,
            Field::Document => Field::Provider,
        }
    }
}

struct UiState {
    app: AppState,
    info: String,

    // Initial-screen form buffers.
    focus: Field,
    provider: String,
    budget: String,
    services: String,
    document_input: String,

    // Payment/analysis progress.
    payment_message: String,
    progress: u8,
    progress_message: String,

    // Completed-report view.
    report_view: Vec<Line<'static>>,
    report_scroll: u16,
    email_mode: bool,
    email_input: String,

    show_help: bool,
    /// False until the first controller snapshot arrives.
    bootstrapped: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            app: AppState::default(),
            info: String::new(),
            focus: Field::Provider,
            provider: String::new(),
            budget: String::new(),
            services: String::new(),
            document_input: String::new(),
            payment_message: String::new(),
            progress: 0,
            progress_message: String::new(),
            report_view: Vec::new(),
            report_scroll: 0,
            email_mode: false,
            email_input: String::new(),
            show_help: false,
            bootstrapped: false,
        }
    }
}

impl UiState {
    fn fill_form_from(&mut self, params: Option<&AnalysisParams>) {
        match params {
            Some(p) => {
                self.provider = p.provider.clone();
                self.budget = p.budget.clone();
                self.services = p.services.clone();
            }
            None => {
                self.provider.clear();
                self.budget.clear();
                self.services.clear();
            }
        }
        self.document_input.clear();
        self.focus = Field::Provider;
    }

    fn focused_buffer(&mut self) -> &mut String {
        match self.focus {
            Field::Provider => &mut self.provider,
            Field::Budget => &mut self.budget,
            Field::Services => &mut self.services,
            Field::Document => &mut self.document_input,
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = crate::cli::build_config(&args);
    let storage = Arc::new(crate::cli::build_storage(&args));
    let engine = Arc::new(AnalysisEngine::new(cfg.clone(), args.api_key.clone())?);
    let notifier = Notifier::new(cfg.email_endpoint.clone(), cfg.share_endpoint.clone());

    // Seed the session from CLI arguments and remembered parameters.
    let mut initial = AppState::default();
    initial.selected_tier = args.tier;
    initial.last_params = storage.load_last_params();
    if !args.documents.is_empty() {
        match ingest::load_documents(&args.documents) {
            Ok(docs) => initial.documents = docs,
            Err(e) => {
                initial.status = AppStatus::Error;
                initial.error_message = e.to_string();
            }
        }
    }

    // Unbounded channels avoid backpressure between the controller and UI.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let deps = SessionDeps {
        engine,
        storage,
        notifier,
        cfg,
        initial,
    };

    // TUI runs in a dedicated thread to keep blocking I/O out of the runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(event_rx, cmd_tx));

    let res = orchestrator::run_controller(deps, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain controller events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if k.modifiers == KeyModifiers::CONTROL && k.code == KeyCode::Char('c') {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
                if handle_key(&mut state, k.code, &cmd_tx) {
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

fn apply_event(state: &mut UiState, ev: SessionEvent) {
    match ev {
        SessionEvent::State(app) => {
            let prev = state.app.status;
            let app = *app;
            if !state.bootstrapped {
                state.bootstrapped = true;
                if app.status == AppStatus::Initial {
                    state.fill_form_from(app.last_params.as_ref());
                }
            } else if app.status == AppStatus::Initial && prev != AppStatus::Initial {
                state.fill_form_from(app.last_params.as_ref());
                state.payment_message.clear();
                state.progress = 0;
                state.report_scroll = 0;
                state.email_mode = false;
                state.email_input.clear();
            }
            if app.status == AppStatus::Complete && prev != AppStatus::Complete {
                let sections = crate::report::sectionize(&app.analysis_result);
                state.report_view = render::report_lines(&app.analysis_result, &sections);
                state.report_scroll = 0;
            }
            if app.status == AppStatus::AwaitingPaymentConfirmation {
                state.payment_message.clear();
            }
            state.app = app;
        }
        SessionEvent::Info(msg) => {
            if state.app.status == AppStatus::AwaitingPaymentConfirmation {
                state.payment_message = msg;
            } else {
                state.info = msg;
            }
        }
        SessionEvent::Progress { percent, message } => {
            state.progress = percent;
            state.progress_message = message;
        }
    }
}

/// Handle one keypress. Returns true when the UI should exit.
fn handle_key(state: &mut UiState, code: KeyCode, cmd_tx: &UnboundedSender<UiCommand>) -> bool {
    if state.show_help {
        state.show_help = false;
        return false;
    }

    match state.app.status {
        AppStatus::Initial => handle_key_initial(state, code, cmd_tx),
        AppStatus::PendingPayment => match code {
            KeyCode::Enter => {
                let _ = cmd_tx.send(UiCommand::Dispatch(Action::ProceedToPayment));
                false
            }
            KeyCode::Esc => {
                let _ = cmd_tx.send(UiCommand::Dispatch(Action::CancelPayment));
                false
            }
            KeyCode::Char('q') => {
                let _ = cmd_tx.send(UiCommand::Quit);
                true
            }
            KeyCode::Char('?') => {
                state.show_help = true;
                false
            }
            _ => false,
        },
        AppStatus::AwaitingPaymentConfirmation | AppStatus::Analyzing => match code {
            KeyCode::Char('q') => {
                let _ = cmd_tx.send(UiCommand::Quit);
                true
            }
            _ => false,
        },
        AppStatus::Complete => handle_key_complete(state, code, cmd_tx),
        AppStatus::Error => match code {
            // Same meanings as on the report screen: r reruns with the form
            // pre-filled, n starts over from scratch.
            KeyCode::Char('r') => {
                let _ = cmd_tx.send(UiCommand::Dispatch(Action::Rerun));
                false
            }
            KeyCode::Char('n') => {
                let _ = cmd_tx.send(UiCommand::Dispatch(Action::Reset));
                false
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                let _ = cmd_tx.send(UiCommand::Quit);
                true
            }
            KeyCode::Char('?') => {
                state.show_help = true;
                false
            }
            _ => false,
        },
    }
}

fn handle_key_initial(
    state: &mut UiState,
    code: KeyCode,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> bool {
    match code {
        KeyCode::Esc => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return true;
        }
        KeyCode::Tab => state.focus = state.focus.next(),
        KeyCode::Left | KeyCode::Right => {
            // Cycle the selected tier; arrows are unused by the text fields.
            let ids: Vec<TierId> = TIERS.iter().map(|t| t.id).collect();
            let current = state
                .app
                .selected_tier
                .and_then(|id| ids.iter().position(|t| *t == id));
            let next = match (current, code) {
                (Some(i), KeyCode::Right) => (i + 1) % ids.len(),
                (Some(i), KeyCode::Left) => (i + ids.len() - 1) % ids.len(),
                _ => 0,
            };
            let _ = cmd_tx.send(UiCommand::Dispatch(Action::SelectTier(ids[next])));
        }
        KeyCode::Enter => {
            if state.focus == Field::Document {
                add_document(state, cmd_tx);
            } else {
                submit_parameters(state, cmd_tx);
            }
        }
        KeyCode::Backspace => {
            state.focused_buffer().pop();
        }
        KeyCode::Char(c) => {
            state.focused_buffer().push(c);
        }
        _ => {}
    }
    false
}

fn add_document(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    let path = state.document_input.trim().to_string();
    if path.is_empty() {
        state.info = "Type a file path, then press Enter to add it.".into();
        return;
    }
    match ingest::load_documents(&[std::path::PathBuf::from(&path)]) {
        Ok(mut docs) => {
            let mut all = state.app.documents.clone();
            all.append(&mut docs);
            state.info = format!("Added {path}");
            state.document_input.clear();
            let _ = cmd_tx.send(UiCommand::Dispatch(Action::SetDocuments(all)));
        }
        Err(e) => {
            // Ingestion failures surface through the error screen, matching
            // the analysis-time failure route.
            let _ = cmd_tx.send(UiCommand::Dispatch(Action::AnalysisFailed {
                message: e.to_string(),
            }));
        }
    }
}

fn submit_parameters(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    if state.provider.trim().is_empty()
        || state.budget.trim().is_empty()
        || state.services.trim().is_empty()
    {
        state.info = "Provider, budget and services are all required.".into();
        return;
    }
    let params = AnalysisParams {
        provider: state.provider.trim().to_string(),
        budget: state.budget.trim().to_string(),
        services: state.services.trim().to_string(),
    };
    let _ = cmd_tx.send(UiCommand::Dispatch(Action::SubmitParameters(params)));
}

fn handle_key_complete(
    state: &mut UiState,
    code: KeyCode,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> bool {
    if state.email_mode {
        match code {
            KeyCode::Esc => {
                state.email_mode = false;
                state.email_input.clear();
            }
            KeyCode::Enter => {
                let to = state.email_input.trim().to_string();
                match crate::notify::validate_email(&to) {
                    Ok(()) => {
                        let _ = cmd_tx.send(UiCommand::EmailReport(to));
                        state.email_mode = false;
                        state.email_input.clear();
                    }
                    Err(msg) => state.info = msg,
                }
            }
            KeyCode::Backspace => {
                state.email_input.pop();
            }
            KeyCode::Char(c) => state.email_input.push(c),
            _ => {}
        }
        return false;
    }

    match code {
        KeyCode::Up => state.report_scroll = state.report_scroll.saturating_sub(1),
        KeyCode::Down => {
            let max = state.report_view.len().saturating_sub(1) as u16;
            state.report_scroll = state.report_scroll.saturating_add(1).min(max);
        }
        KeyCode::PageUp => state.report_scroll = state.report_scroll.saturating_sub(10),
        KeyCode::PageDown => {
            let max = state.report_view.len().saturating_sub(1) as u16;
            state.report_scroll = state.report_scroll.saturating_add(10).min(max);
        }
        KeyCode::Char('s') => {
            let _ = cmd_tx.send(UiCommand::SaveReport);
        }
        KeyCode::Char('e') => {
            state.email_mode = true;
            state.email_input.clear();
        }
        KeyCode::Char('l') => {
            let _ = cmd_tx.send(UiCommand::ShareReport);
        }
        KeyCode::Char('y') => match copy_to_clipboard(&state.app.analysis_result) {
            Ok(()) => state.info = "Report copied to clipboard.".into(),
            Err(e) => state.info = format!("Clipboard copy failed: {e:#}"),
        },
        KeyCode::Char('r') => {
            let _ = cmd_tx.send(UiCommand::Dispatch(Action::Rerun));
        }
        KeyCode::Char('n') => {
            let _ = cmd_tx.send(UiCommand::Dispatch(Action::Reset));
        }
        KeyCode::Char('?') => state.show_help = true,
        KeyCode::Char('q') => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return true;
        }
        _ => {}
    }
    false
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("open clipboard")?;
    clipboard.set_text(text.to_string()).context("set clipboard")?;
    Ok(())
}

fn draw(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(area);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "OptimaCloud Anomaly Assistant",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  —  upload your cloud billing document to detect cost leaks"),
    ]))
    .block(Block::default().borders(Borders::ALL))
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    if state.show_help {
        help::draw_help(chunks[1], f);
    } else {
        match state.app.status {
            AppStatus::Initial => draw_initial(chunks[1], f, state),
            AppStatus::PendingPayment => draw_pending_payment(chunks[1], f, state),
            AppStatus::AwaitingPaymentConfirmation => draw_awaiting(chunks[1], f, state),
            AppStatus::Analyzing => draw_analyzing(chunks[1], f, state),
            AppStatus::Complete => draw_complete(chunks[1], f, state),
            AppStatus::Error => draw_error(chunks[1], f, state),
        }
    }

    let hints = match state.app.status {
        AppStatus::Initial => "Tab fields · ←/→ plan · Enter submit/add · Esc quit",
        AppStatus::PendingPayment => "Enter proceed · Esc cancel · q quit",
        AppStatus::AwaitingPaymentConfirmation | AppStatus::Analyzing => "q quit",
        AppStatus::Complete => {
            "↑/↓ scroll · s save · e email · l share · y copy · r rerun · n new · q quit"
        }
        AppStatus::Error => "r rerun · n new · q quit",
    };
    let footer = Paragraph::new(vec![Line::from(vec![
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
        Span::raw("   "),
        Span::styled(state.info.clone(), Style::default().fg(Color::Yellow)),
    ])])
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);
}

fn input_block<'a>(title: &'a str, focused: bool) -> Block<'a> {
    let style = if focused {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn draw_initial(area: Rect, f: &mut Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    // Step 1: pricing tiers as side-by-side cards.
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(34),
            Constraint::Percentage(33),
        ])
        .split(rows[0]);
    for (i, tier) in TIERS.iter().enumerate() {
        let selected = state.app.selected_tier == Some(tier.id);
        let border = if selected {
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let title = if i == 0 { "Step 1: Choose Your Plan" } else { "" };
        let card = Paragraph::new(vec![
            Line::from(Span::styled(
                tier.name,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(tier.price, Style::default().fg(Color::Green))),
            Line::from(Span::styled(
                tier.description,
                Style::default().fg(Color::Gray),
            )),
        ])
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title),
        );
        f.render_widget(card, cards[i]);
    }

    // Step 2: documents added so far.
    let doc_lines: Vec<Line> = if state.app.documents.is_empty() {
        vec![Line::from(Span::styled(
            "No documents yet. Supports: CSV, PDF, PNG, JPG",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        state
            .app
            .documents
            .iter()
            .map(|d| {
                Line::from(format!(
                    "{} — {:.2} KB ({})",
                    d.name,
                    d.size as f64 / 1024.0,
                    d.mime_type
                ))
            })
            .collect()
    };
    let docs = Paragraph::new(doc_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Step 2: Billing Documents"),
    );
    f.render_widget(docs, rows[1]);

    let doc_input = Paragraph::new(state.document_input.as_str()).block(input_block(
        "Add document (path, Enter to add)",
        state.focus == Field::Document,
    ));
    f.render_widget(doc_input, rows[2]);

    // Step 3: analysis parameters.
    let provider = Paragraph::new(state.provider.as_str()).block(input_block(
        "Cloud Provider(s), e.g. AWS, GCP, Azure",
        state.focus == Field::Provider,
    ));
    f.render_widget(provider, rows[3]);
    let budget = Paragraph::new(state.budget.as_str()).block(input_block(
        "Expected Monthly Budget, e.g. $5,000 - $7,000",
        state.focus == Field::Budget,
    ));
    f.render_widget(budget, rows[4]);
    let services = Paragraph::new(state.services.as_str()).block(input_block(
        "Core Services in Use, e.g. EC2, S3, RDS",
        state.focus == Field::Services,
    ));
    f.render_widget(services, rows[5]);
}

fn draw_pending_payment(area: Rect, f: &mut Frame, state: &UiState) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Confirm Your Analysis",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    if let Some(id) = state.app.selected_tier {
        let tier = tier_details(id);
        lines.push(Line::from(format!("You've selected: {}", tier.name)));
        lines.push(Line::from(Span::styled(
            tier.price,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(
        "Press Enter to proceed to the payment gateway, or Esc to go back.",
    ));
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, centered(area, 60, 9));
}

fn draw_awaiting(area: Rect, f: &mut Frame, state: &UiState) {
    let lines = vec![
        Line::from(Span::styled(
            "Confirming Your Payment",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(state.payment_message.clone()),
    ];
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, centered(area, 64, 7));
}

fn draw_analyzing(area: Rect, f: &mut Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(centered(area, 64, 8));

    let label = Paragraph::new(vec![
        Line::from(Span::styled(
            "Payment Confirmed",
            Style::default().fg(Color::Green),
        )),
        Line::from(state.progress_message.clone()),
    ])
    .alignment(Alignment::Center);
    f.render_widget(label, rows[0]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Blue))
        .percent(state.progress as u16);
    f.render_widget(gauge, rows[1]);
}

fn draw_complete(area: Rect, f: &mut Frame, state: &UiState) {
    let report = Paragraph::new(state.report_view.clone())
        .scroll((state.report_scroll, 0))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Anomaly Report"));
    f.render_widget(report, area);

    if state.email_mode {
        let popup = centered(area, 50, 3);
        let input = Paragraph::new(state.email_input.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title("Email report to (Enter to send, Esc to cancel)"),
        );
        f.render_widget(ratatui::widgets::Clear, popup);
        f.render_widget(input, popup);
    }
}

fn draw_error(area: Rect, f: &mut Frame, state: &UiState) {
    let lines = vec![
        Line::from(Span::styled(
            "Analysis Failed",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(state.app.error_message.clone()),
        Line::default(),
        Line::from("Press r to try again, or n to start fresh."),
    ];
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(p, centered(area, 64, 9));
}

/// Center a fixed-size box inside the given area.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(w)) / 2,
        y: area.y + (area.height.saturating_sub(h)) / 2,
        width: w,
        height: h,
    }
}
