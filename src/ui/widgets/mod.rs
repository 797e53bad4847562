pub mod cloud;
pub mod report;

use ratatui::{layout::Rect, Frame};

/// A self-contained area of the screen.
pub trait Panel {
    fn title(&self) -> &str;

    fn render(&self, frame: &mut Frame, area: Rect, focused: bool);
}
