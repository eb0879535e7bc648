//! Interactive picker: a terminal front end driving a [`SearchSession`].

use std::io::{self, Stderr};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::config::PickerKeys;
use crate::lookup::{Geocoder, PlaceSearch};
use crate::resolver::ResolvedTimeZone;
use crate::selection::NavKey;
use crate::session::{SearchSession, SessionCallbacks, SessionUpdate};

use super::draw::{self, PickerView};
use super::keys;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Collects what the session reports back to the picker.
#[derive(Debug, Default)]
pub struct PickerCallbacks {
    resolved: Option<ResolvedTimeZone>,
    last_error: Option<String>,
    dismissed: bool,
}

impl SessionCallbacks for PickerCallbacks {
    fn on_resolved(&mut self, resolved: ResolvedTimeZone) {
        self.resolved = Some(resolved);
    }

    fn on_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn on_dismiss_requested(&mut self) {
        self.dismissed = true;
    }
}

/// What a key press means to the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Cancel,
    Navigate(NavKey),
    /// Anything else goes to the line editor
    Edit,
}

pub fn action_for(key: &KeyEvent, bindings: &PickerKeys) -> PickerAction {
    if keys::is_interrupt(key) || keys::matches_any(key, &bindings.cancel) {
        PickerAction::Cancel
    } else if keys::matches_any(key, &bindings.confirm) {
        PickerAction::Navigate(NavKey::Enter)
    } else if keys::matches_any(key, &bindings.up) {
        PickerAction::Navigate(NavKey::Up)
    } else if keys::matches_any(key, &bindings.down) {
        PickerAction::Navigate(NavKey::Down)
    } else {
        PickerAction::Edit
    }
}

enum Step {
    Terminal(Event),
    Session(Option<SessionUpdate>),
    InputClosed,
}

/// Run the picker until a zone is resolved or the user cancels.
pub async fn run<P, G>(
    session: SearchSession<P, G, PickerCallbacks>,
    bindings: &PickerKeys,
    initial: Option<String>,
) -> Result<Option<ResolvedTimeZone>>
where
    P: PlaceSearch + 'static,
    G: Geocoder + 'static,
{
    enable_raw_mode()?;
    let mut stderr = io::stderr();
    stderr.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stderr);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, session, bindings, initial).await;

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn event_loop<P, G>(
    terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    mut session: SearchSession<P, G, PickerCallbacks>,
    bindings: &PickerKeys,
    initial: Option<String>,
) -> Result<Option<ResolvedTimeZone>>
where
    P: PlaceSearch + 'static,
    G: Geocoder + 'static,
{
    let (tx, mut events) = mpsc::unbounded_channel();
    spawn_event_reader(tx);

    let mut input = Input::default();
    if let Some(query) = initial.filter(|q| !q.trim().is_empty()) {
        input = Input::new(query.clone());
        session.set_query(query);
    }
    let mut status: Option<String> = None;

    loop {
        let view = PickerView {
            input: &input,
            candidates: session.candidates(),
            cursor: session.cursor(),
            resolving: session.resolving(),
            status: status.as_deref(),
        };
        draw::render(terminal, &view)?;

        let step = next_step(&mut events, &mut session).await;
        match step {
            Step::Terminal(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                match action_for(&key, bindings) {
                    PickerAction::Cancel => {
                        session.close();
                        break;
                    }
                    PickerAction::Navigate(nav) => {
                        session.handle_key(nav);
                    }
                    PickerAction::Edit => {
                        if let Some(change) = input.handle_event(&Event::Key(key)) {
                            if change.value {
                                status = None;
                                session.set_query(input.value());
                            }
                        }
                    }
                }
            }
            Step::Terminal(_) => {}
            Step::Session(Some(SessionUpdate::Failed)) => {
                status = session.callbacks().last_error.clone();
            }
            Step::Session(Some(_)) => {}
            Step::Session(None) | Step::InputClosed => break,
        }

        if !session.is_open() {
            break;
        }
    }

    let callbacks = session.into_callbacks();
    Ok(callbacks
        .resolved
        .filter(|_| callbacks.dismissed))
}

async fn next_step<P, G>(
    events: &mut UnboundedReceiver<Event>,
    session: &mut SearchSession<P, G, PickerCallbacks>,
) -> Step
where
    P: PlaceSearch + 'static,
    G: Geocoder + 'static,
{
    tokio::select! {
        event = events.recv() => match event {
            Some(event) => Step::Terminal(event),
            None => Step::InputClosed,
        },
        update = session.next() => Step::Session(update),
    }
}

/// Forward terminal events from a blocking reader thread. The thread stops
/// once the receiving side is gone.
fn spawn_event_reader(tx: UnboundedSender<Event>) {
    thread::spawn(move || loop {
        match event::poll(POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to read terminal event");
                    break;
                }
            },
            Ok(false) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to poll terminal events");
                break;
            }
        }
    });
}
