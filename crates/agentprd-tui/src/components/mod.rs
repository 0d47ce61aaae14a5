use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::action::Action;
use crate::state::AppState;

pub mod input_bar;
pub mod messages;
pub mod status_bar;

pub use input_bar::InputBar;
pub use messages::MessagesPane;
pub use status_bar::StatusBar;

/// A region of the screen. Components read the shared state and answer
/// key presses with actions; only the app mutates the state.
pub trait Component {
    fn handle_key_event(&mut self, key: KeyEvent, state: &AppState) -> Option<Action> {
        let _ = (key, state);
        None
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState);
}
