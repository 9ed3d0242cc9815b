use crate::{
    chain::ContractCall,
    client::{
        AppSnapshot,
        SigningPrompt,
        kind_label,
    },
    panels::{
        GrabButton,
        OwnerField,
        short_address,
    },
    units,
    view_state::{
        ConnectionState,
        ViewState,
    },
};
use alloy::primitives::{
    Address,
    U256,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Connect,
    Disconnect,
    SwitchNetwork,
    DismissErrors,
    DismissGrab,
    CreatePacket,
    Grab,
    InitOwner,
    Reset,
    Approve,
    Decline,
    FormInput(char),
    FormBackspace,
    FormNextField,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
}

pub type InputEventReceiver = EventStream;

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(Ok(event)) => Ok(event),
        Some(Err(err)) => Err(err.into()),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(
    state: &mut UiState,
    snap: &AppSnapshot,
    event: Event,
) -> Option<UserEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            interpret_key(state, snap, key)
        }
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

/// Modals capture input first, then global keys, then the keys of the current
/// screen.
pub fn interpret_key(
    state: &mut UiState,
    snap: &AppSnapshot,
    key: KeyEvent,
) -> Option<UserEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    if state.mode == Mode::QuitModal {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }
    if snap.prompt.is_some() {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(UserEvent::Approve),
            KeyCode::Char('n') | KeyCode::Esc => Some(UserEvent::Decline),
            _ => None,
        };
    }
    if snap.grab_result.is_some() {
        return match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => Some(UserEvent::DismissGrab),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            return Some(UserEvent::Redraw);
        }
        KeyCode::Char('x') if !snap.errors.is_empty() => {
            return Some(UserEvent::DismissErrors);
        }
        KeyCode::Char('c') if snap.connection == ConnectionState::Disconnected => {
            return Some(UserEvent::Connect);
        }
        KeyCode::Char('d') if snap.connection != ConnectionState::Disconnected => {
            return Some(UserEvent::Disconnect);
        }
        KeyCode::Char('n') => return Some(UserEvent::SwitchNetwork),
        _ => {}
    }

    match snap.view {
        ViewState::OwnerPanel => match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => Some(UserEvent::FormInput(c)),
            KeyCode::Backspace => Some(UserEvent::FormBackspace),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                Some(UserEvent::FormNextField)
            }
            KeyCode::Enter => Some(UserEvent::CreatePacket),
            KeyCode::Char('r') => Some(UserEvent::Reset),
            _ => None,
        },
        ViewState::ParticipantPanel => match key.code {
            KeyCode::Char('g') | KeyCode::Enter => Some(UserEvent::Grab),
            _ => None,
        },
        ViewState::Uninitialized => match key.code {
            KeyCode::Char('i') | KeyCode::Enter => Some(UserEvent::InitOwner),
            _ => None,
        },
        ViewState::Exhausted => match key.code {
            KeyCode::Char('r') | KeyCode::Enter => Some(UserEvent::Reset),
            _ => None,
        },
        ViewState::Loading | ViewState::Disconnected | ViewState::RoleLoading => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // wallet header
            Constraint::Min(10),   // current screen
            Constraint::Length(6), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet_panel(f, chunks[0], snap);
    match snap.view {
        ViewState::Loading => draw_message(f, chunks[1], "Lucky Money", &["Loading..."]),
        ViewState::Disconnected => draw_disconnected(f, chunks[1], snap),
        ViewState::RoleLoading => {
            draw_message(f, chunks[1], "Lucky Money", &["Resolving account..."])
        }
        ViewState::Exhausted => draw_exhausted(f, chunks[1], snap),
        ViewState::Uninitialized => draw_uninitialized(f, chunks[1], snap),
        ViewState::OwnerPanel => draw_owner_panel(f, chunks[1], snap),
        ViewState::ParticipantPanel => draw_participant_panel(f, chunks[1], snap),
    }
    draw_status(f, chunks[2], snap);
    draw_help(f, chunks[3], snap);
    draw_modals(f, state, snap);
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let account = snap
        .account
        .as_ref()
        .map(short_address)
        .unwrap_or_else(|| "-".to_string());
    let chain_id = snap
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string());
    let lines = vec![
        Line::from(format!(
            "Account: {account} | Balance: {}",
            native_balance_text(snap.native_balance)
        )),
        Line::from(format!(
            "Network: {} ({chain_id}) | Contract: {} | Owner: {} | {}",
            snap.network,
            short_address(&snap.contract),
            owner_text(snap.owner),
            connection_text(snap.connection)
        )),
    ];
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn native_balance_text(balance: Option<U256>) -> String {
    match balance {
        Some(wei) => format!("{} ETH", units::format_ether_fixed(wei, 4)),
        None => "Loading...".to_string(),
    }
}

fn owner_text(owner: Option<Address>) -> String {
    match owner {
        None => "-".to_string(),
        Some(owner) if owner == Address::ZERO => "none".to_string(),
        Some(owner) => short_address(&owner),
    }
}

fn connection_text(connection: ConnectionState) -> &'static str {
    match connection {
        ConnectionState::Disconnected => "Disconnected",
        ConnectionState::Connecting => "Connecting...",
        ConnectionState::Connected => "Connected",
    }
}

fn ether_text(value: Option<U256>) -> String {
    value
        .map(|wei| format!("{} ETH", units::format_ether(wei)))
        .unwrap_or_else(|| "-".to_string())
}

fn count_text(value: Option<U256>) -> String {
    value
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn draw_message(f: &mut Frame, area: Rect, title: &str, lines: &[&str]) {
    let lines: Vec<Line> = lines.iter().map(|l| Line::from(l.to_string())).collect();
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(widget, area);
}

fn draw_disconnected(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let hint = match snap.connection {
        ConnectionState::Connecting => "Connecting...",
        _ => "Press c to connect your wallet",
    };
    draw_message(f, area, "Lucky Money", &[
        "Connect your wallet to grab a red packet",
        "",
        hint,
    ]);
}

fn action_text(busy: bool, idle: &'static str) -> &'static str {
    if busy { "Processing..." } else { idle }
}

fn draw_exhausted(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    draw_message(f, area, "Lucky Money", &[
        "Red Packets Exhausted",
        "",
        "Every packet of this round has been grabbed.",
        "",
        action_text(snap.landing_busy, "[r] Start New Round"),
    ]);
}

fn draw_uninitialized(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    draw_message(f, area, "Lucky Money", &[
        "No Owner Yet",
        "",
        "The contract has no owner. Claim it to start handing out red packets.",
        "",
        action_text(snap.landing_busy, "[i] Become Owner & Start"),
    ]);
}

fn draw_owner_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let form = &snap.owner_form;
    let field_style = |field: OwnerField| {
        if form.focus == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    let submit = if snap.owner_busy {
        "Processing..."
    } else if form.can_submit(false) {
        "[Enter] Create Red Packet"
    } else {
        "Fill in both fields to create"
    };
    let mut lines = vec![
        Line::styled(
            format!("Total Amount (ETH): {}", form.amount),
            field_style(OwnerField::Amount),
        ),
        Line::styled(
            format!("Number of Packets:  {}", form.count),
            field_style(OwnerField::Count),
        ),
        Line::from(""),
        Line::from(submit),
    ];
    if let Some(err) = &form.error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "Remaining Balance: {}",
        ether_text(snap.balance)
    )));
    lines.push(Line::from(format!(
        "Remaining Packets: {}",
        count_text(snap.remaining_count)
    )));
    lines.push(Line::from(action_text(snap.owner_busy, "[r] Reset round")));
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Owner Dashboard"));
    f.render_widget(widget, cols[0]);

    draw_history(f, cols[1], snap);
}

fn draw_history(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Recent Grabs");
    if snap.history.is_empty() {
        let widget = Paragraph::new("No records yet")
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(widget, area);
        return;
    }
    let items: Vec<ListItem> = snap
        .history
        .iter()
        .map(|record| {
            ListItem::new(format!(
                "{}  +{} ETH",
                short_address(&record.to),
                units::format_ether(record.amount)
            ))
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn draw_participant_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let button = match snap.grab_button {
        GrabButton::Open => Line::styled(
            "[g] Grab a Red Packet",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        GrabButton::SoldOut => Line::styled("Sold Out", Style::default().fg(Color::DarkGray)),
        GrabButton::Processing => Line::styled("Processing...", Style::default().fg(Color::Yellow)),
    };
    let lines = vec![
        Line::from(format!(
            "Remaining Packets: {}",
            count_text(snap.remaining_count)
        )),
        Line::from(format!("Pool Balance: {}", ether_text(snap.balance))),
        Line::from(""),
        button,
    ];
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Red Packet"));
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            lines.push(Line::from(snap.status.clone()));
        }
        for tx in &snap.pending {
            let line = match tx.hash {
                Some(hash) => format!("Pending: {} {hash}", kind_label(tx.kind)),
                None => format!("Signing: {}", kind_label(tx.kind)),
            };
            lines.push(Line::from(line));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Errors (x to dismiss)"),
            )
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(widget, area);
}

fn help_text(snap: &AppSnapshot) -> String {
    let screen = match snap.view {
        ViewState::OwnerPanel => "digits type | Tab field | Enter create | r reset | ",
        ViewState::ParticipantPanel => "g grab | ",
        ViewState::Uninitialized => "i become owner | ",
        ViewState::Exhausted => "r new round | ",
        ViewState::Loading | ViewState::Disconnected | ViewState::RoleLoading => "",
    };
    let session = match snap.connection {
        ConnectionState::Disconnected => "c connect",
        _ => "d disconnect",
    };
    format!("{screen}{session} | n switch network | q quit")
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let help = Paragraph::new(help_text(snap))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

pub fn describe_call(call: &ContractCall) -> String {
    match call {
        ContractCall::InitOwner { owner } => format!("initOwner({})", short_address(owner)),
        ContractCall::Reset => "reset()".to_string(),
        ContractCall::CreateLuckyMoney { count, amount } => format!(
            "createLuckyMoney({count} packets, {} ETH) paying {} ETH",
            units::format_ether(*amount),
            units::format_ether(call.value())
        ),
        ContractCall::GiveOutMoney { recipient } => {
            format!("giveOutMoney({})", short_address(recipient))
        }
    }
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    if let Some(prompt) = &snap.prompt {
        draw_prompt_modal(f, prompt);
    } else if let Some(result) = &snap.grab_result {
        let area = centered_rect(50, 30, f.area());
        f.render_widget(Clear, area);
        let lines = vec![
            Line::from("Congratulations!"),
            Line::from(""),
            Line::styled(
                format!("You grabbed {} ETH", units::format_ether(result.amount)),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Line::from(""),
            Line::from("Enter to close"),
        ];
        let widget = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Red Packet"));
        f.render_widget(widget, area);
    }
    if state.mode == Mode::QuitModal {
        let area = centered_rect(40, 20, f.area());
        f.render_widget(Clear, area);
        let widget = Paragraph::new("Quit Lucky Money? (y/n)")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Quit"));
        f.render_widget(widget, area);
    }
}

fn draw_prompt_modal(f: &mut Frame, prompt: &SigningPrompt) {
    let area = centered_rect(70, 30, f.area());
    f.render_widget(Clear, area);
    let lines = vec![
        Line::from(format!("{}?", kind_label(prompt.call.kind()))),
        Line::from(""),
        Line::from(describe_call(&prompt.call)),
        Line::from(""),
        Line::from("y sign and send | n cancel"),
    ];
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Confirm Transaction"));
    f.render_widget(widget, area);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
