//! Input routing
//!
//! Native window events are turned into selection events tagged with the
//! display they happened on. Only the primary mouse button takes part in
//! selection; key codes are passed through as GLFW reports them.
//!
//! Routing happens inside `poll_events`, on the executor thread. Callbacks
//! therefore must not call back into the renderer (see the executor's
//! caller contract).

use glfw::{Action, MouseButton, WindowEvent};
use regionshot_types::Rect;

/// Mouse press/release callback: display index and display rectangle
pub type MouseCallback = Box<dyn FnMut(usize, Rect) + Send>;

/// Key callback: release flag, display index, native key code
pub type KeyCallback = Box<dyn FnMut(bool, usize, i32) + Send>;

/// A selection-relevant input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    MousePress { index: usize, rect: Rect },
    MouseRelease { index: usize, rect: Rect },
    Key { release: bool, index: usize, key: i32 },
}

/// Translate a native event from window `index`.
///
/// Returns `None` for everything the selector does not route: other mouse
/// buttons, cursor motion, focus changes and so on.
pub fn translate(index: usize, rect: Rect, event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::MouseButton(MouseButton::Button1, Action::Press, _) => {
            Some(InputEvent::MousePress { index, rect })
        }
        WindowEvent::MouseButton(MouseButton::Button1, Action::Release, _) => {
            Some(InputEvent::MouseRelease { index, rect })
        }
        // Repeats count as presses
        WindowEvent::Key(key, _, action, _) => Some(InputEvent::Key {
            release: *action == Action::Release,
            index,
            key: *key as i32,
        }),
        _ => None,
    }
}

/// Registered selection callbacks, at most one of each kind.
#[derive(Default)]
pub struct InputRouter {
    press: Option<MouseCallback>,
    release: Option<MouseCallback>,
    key: Option<KeyCallback>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the press callback
    pub fn set_mouse_press(&mut self, callback: MouseCallback) {
        self.press = Some(callback);
    }

    /// Replace the release callback
    pub fn set_mouse_release(&mut self, callback: MouseCallback) {
        self.release = Some(callback);
    }

    /// Replace the key callback
    pub fn set_key(&mut self, callback: KeyCallback) {
        self.key = Some(callback);
    }

    /// Whether any callback is registered
    pub fn is_armed(&self) -> bool {
        self.press.is_some() || self.release.is_some() || self.key.is_some()
    }

    /// Invoke the matching callback. Returns false if none is registered.
    pub fn dispatch(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::MousePress { index, rect } => match self.press.as_mut() {
                Some(cb) => {
                    cb(index, rect);
                    true
                }
                None => false,
            },
            InputEvent::MouseRelease { index, rect } => match self.release.as_mut() {
                Some(cb) => {
                    cb(index, rect);
                    true
                }
                None => false,
            },
            InputEvent::Key {
                release,
                index,
                key,
            } => match self.key.as_mut() {
                Some(cb) => {
                    cb(release, index, key);
                    true
                }
                None => false,
            },
        }
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod input_tests;
