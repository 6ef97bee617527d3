//! Window management
//!
//! One undecorated, always-on-top fullscreen window per display, all created
//! through GLFW on the executor thread. The first window owns the GL context;
//! the rest share it, so textures and programs created once are visible in
//! every window.

use glfw::{
    Context as _, Glfw, GlfwReceiver, Monitor, OpenGlProfileHint, WindowEvent, WindowHint,
    WindowMode,
};
use regionshot_types::{MonitorBinding, Rect};
use tracing::{debug, info, warn};

use crate::displays::{MonitorInfo, describe_monitors, match_monitors};
use crate::error::RendererError;
use crate::input::{InputEvent, translate};

#[cfg(target_os = "macos")]
pub mod macos;

/// Start GLFW on the current thread
pub(crate) fn init_glfw() -> Result<Glfw, RendererError> {
    let glfw =
        glfw::init(log_glfw_error).map_err(|e| RendererError::GlfwInit(format!("{:?}", e)))?;
    info!(version = %glfw::get_version_string(), "GLFW initialized");
    Ok(glfw)
}

fn log_glfw_error(error: glfw::Error, description: String) {
    warn!(?error, %description, "GLFW error");
}

/// Monitors GLFW currently reports, primary first
pub(crate) fn list_monitors(glfw: &mut Glfw) -> Vec<MonitorInfo> {
    glfw.with_connected_monitors(|_, monitors| {
        let monitors: Vec<&Monitor> = monitors.iter().map(|m| &**m).collect();
        describe_monitors(&monitors)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Overlay windows
// ─────────────────────────────────────────────────────────────────────────────

/// A fullscreen window covering one display
pub(crate) struct OverlayWindow {
    window: glfw::PWindow,
    events: GlfwReceiver<(f64, WindowEvent)>,
    index: usize,
    rect: Rect,
}

impl OverlayWindow {
    pub(crate) fn window_mut(&mut self) -> &mut glfw::PWindow {
        &mut self.window
    }

    pub(crate) fn make_current(&mut self) {
        self.window.make_current();
    }

    pub(crate) fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    pub(crate) fn framebuffer_size(&self) -> (i32, i32) {
        self.window.get_framebuffer_size()
    }

    pub(crate) fn set_should_close(&mut self, value: bool) {
        self.window.set_should_close(value);
    }

    pub(crate) fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Selection events queued since the last poll
    pub(crate) fn drain_events(&self) -> Vec<InputEvent> {
        glfw::flush_messages(&self.events)
            .filter_map(|(_, event)| translate(self.index, self.rect, &event))
            .collect()
    }
}

fn apply_window_hints(glfw: &mut Glfw) {
    glfw.default_window_hints();
    glfw.window_hint(WindowHint::ContextVersion(3, 3));
    glfw.window_hint(WindowHint::OpenGlProfile(OpenGlProfileHint::Core));
    glfw.window_hint(WindowHint::OpenGlForwardCompat(true));
    glfw.window_hint(WindowHint::CenterCursor(false));
    glfw.window_hint(WindowHint::Decorated(false));
    glfw.window_hint(WindowHint::FocusOnShow(true));
    glfw.window_hint(WindowHint::Floating(true));
    glfw.window_hint(WindowHint::AutoIconify(false));
    glfw.window_hint(WindowHint::Resizable(false));
}

/// Create one window per display, in display order.
///
/// Every display must have a monitor at its origin. On failure the windows
/// created so far are destroyed before returning.
pub(crate) fn create_windows(
    glfw: &mut Glfw,
    displays: &[Rect],
    title: &str,
    binding: MonitorBinding,
) -> Result<Vec<OverlayWindow>, RendererError> {
    let binding = binding.resolve();

    glfw.with_connected_monitors(|ctx, monitors| -> Result<Vec<OverlayWindow>, RendererError> {
        let monitors: Vec<&Monitor> = monitors.iter().map(|m| &**m).collect();
        let origins: Vec<(i32, i32)> = monitors.iter().map(|m| m.get_pos()).collect();
        let mapping = match_monitors(displays, &origins)?;

        let mut windows: Vec<OverlayWindow> = Vec::with_capacity(displays.len());
        for (index, rect) in displays.iter().copied().enumerate() {
            let monitor = monitors[mapping[index]];
            apply_window_hints(ctx);

            let mode = match binding {
                MonitorBinding::RebindAfterCreation => WindowMode::Windowed,
                _ => WindowMode::FullScreen(monitor),
            };
            let created = match windows.first() {
                None => ctx.create_window(rect.width, rect.height, title, mode),
                Some(first) => first.window.create_shared(rect.width, rect.height, title, mode),
            };
            let Some((mut window, events)) = created else {
                destroy_windows(windows);
                return Err(RendererError::WindowCreation { index });
            };

            window.make_current();
            if binding == MonitorBinding::RebindAfterCreation {
                let refresh_rate = monitor.get_video_mode().map(|m| m.refresh_rate);
                window.set_monitor(
                    WindowMode::FullScreen(monitor),
                    0,
                    0,
                    rect.width,
                    rect.height,
                    refresh_rate,
                );
            }
            window.set_mouse_button_polling(true);
            window.set_key_polling(true);

            debug!(
                display = index,
                %rect,
                monitor = mapping[index],
                ?binding,
                "created overlay window"
            );
            windows.push(OverlayWindow {
                window,
                events,
                index,
                rect,
            });
        }
        Ok(windows)
    })
}

/// Destroy windows, each with its own context current
pub(crate) fn destroy_windows(windows: Vec<OverlayWindow>) {
    // Shared windows go first; the context owner is destroyed last
    for mut overlay in windows.into_iter().rev() {
        overlay.make_current();
        debug!(display = overlay.index, "destroying overlay window");
        drop(overlay);
    }
    glfw::make_context_current(None);
}
