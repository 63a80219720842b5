use ratatui::Frame;
use ratatui::layout::Rect;

/// A piece of the screen.
///
/// Components get their data as props (struct fields), may borrow
/// persistent state mutably (scroll offsets, layout caches), and draw
/// themselves into a `Rect`.
///
/// `render` takes `&mut self` so a component can update that borrowed
/// state during the render pass, the same way ratatui's `StatefulWidget`
/// works.
pub trait Component {
    fn render(&mut self, frame: &mut Frame, area: Rect);
}

/// A component that reacts to terminal input.
pub trait EventHandler {
    /// The higher-level event this component emits.
    type Event;

    /// Handle a low-level `TuiEvent`, optionally producing a higher-level one.
    fn handle_event(&mut self, event: &super::event::TuiEvent) -> Option<Self::Event>;
}
