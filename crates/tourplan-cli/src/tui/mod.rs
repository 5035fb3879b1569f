pub mod app;
pub mod dialog;
pub mod ui;

use std::future::Future;
use std::io;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio_stream::StreamExt;

use crate::tui::app::{App, Pending};

/// Restore the terminal to its original state. Called on normal exit and
/// from the panic hook.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
}

pub async fn launch(app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    // Terminal setup
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut events = EventStream::new();

    let result = run_loop(&mut terminal, app, &mut events).await;

    restore_terminal();

    result
}

/// Resolves with the pending request's output, or never if there is none.
fn settle<T>(slot: &mut Option<Pending<T>>) -> impl Future<Output = T> + '_ {
    async move {
        match slot {
            Some(request) => request.await,
            None => std::future::pending().await,
        }
    }
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &mut EventStream,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut spinner_interval = tokio::time::interval(std::time::Duration::from_millis(530));
    spinner_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        if app.should_quit {
            break;
        }

        tokio::select! {
            Some(Ok(event)) = events.next() => {
                match event {
                    Event::Key(key) => {
                        app.handle_key(key);
                    }
                    Event::Mouse(mouse) => {
                        app.handle_mouse(mouse);
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }

            reply = settle(&mut app.chat_request) => {
                app.finish_chat(reply);
            }

            reply = settle(&mut app.map_request) => {
                app.finish_map(reply);
            }

            _ = spinner_interval.tick() => {
                if app.is_busy() {
                    app.toggle_spinner();
                }
            }
        }
    }
    Ok(())
}
