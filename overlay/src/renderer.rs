//! Region selection renderer
//!
//! [`OpenGlRenderer`] is the public face of the overlay. Every method is a
//! blocking round trip to the executor thread, where [`GlState`] owns GLFW,
//! the windows and every GL object. A session is the set of windows and
//! textures created by one `init_displays` call and torn down by
//! `destroy_all`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glfw::Glfw;
use regionshot_types::{RawImage, Rect, SelectorConfig};
use tracing::{debug, info};

use crate::crash::CrashReporter;
use crate::displays::MonitorInfo;
use crate::error::RendererError;
use crate::executor::Executor;
use crate::input::{InputRouter, KeyCallback, MouseCallback};
use crate::pipeline::{ShaderProgram, draw_fullscreen_quad, load_gl};
use crate::platform::{self, OverlayWindow};
use crate::texture::{GpuTexture, Texture};

/// Texture ids are unique for the whole process, so a handle from an old
/// session (or another renderer) never aliases a live texture.
static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

// ─────────────────────────────────────────────────────────────────────────────
// Session (executor thread only)
// ─────────────────────────────────────────────────────────────────────────────

struct Session {
    displays: Vec<Rect>,
    windows: Vec<OverlayWindow>,
    darker: Vec<RawImage>,
    normal: Vec<GpuTexture>,
    program: ShaderProgram,
    gl: glow::Context,
    /// Darker textures handed out and not yet released
    textures: HashMap<u64, GpuTexture>,
}

impl Session {
    /// Make a session context current for non-drawing GL work.
    ///
    /// All windows share one context, so any of them will do.
    fn make_current(&mut self) {
        if let Some(first) = self.windows.first_mut() {
            first.make_current();
        }
    }

    fn check_index(&self, index: usize) -> Result<(), RendererError> {
        if index < self.displays.len() {
            Ok(())
        } else {
            Err(RendererError::InvalidDisplay {
                index,
                count: self.displays.len(),
            })
        }
    }

    fn texture(&self, id: u64) -> Result<&GpuTexture, RendererError> {
        self.textures
            .get(&id)
            .ok_or(RendererError::StaleTexture(id))
    }

    fn destroy(mut self) {
        self.make_current();
        let outstanding = self.textures.len();
        for (_, texture) in self.textures.drain() {
            texture.delete(&self.gl);
        }
        for texture in self.normal.drain(..) {
            texture.delete(&self.gl);
        }
        self.program.delete(&self.gl);
        platform::destroy_windows(self.windows);
        info!(
            displays = self.displays.len(),
            outstanding_textures = outstanding,
            "region selection session destroyed"
        );
    }
}

/// Load GL from the first window and create the objects every window shares.
///
/// Anything created before a failure is deleted again.
fn create_gpu_resources(
    windows: &mut [OverlayWindow],
    normal: &[RawImage],
    smooth: bool,
) -> Result<(glow::Context, ShaderProgram, Vec<GpuTexture>), RendererError> {
    let first = windows.first_mut().ok_or(RendererError::NoDisplays)?;
    let gl = load_gl(first.window_mut())?;
    let program = ShaderProgram::new(&gl)?;

    let mut textures = Vec::with_capacity(normal.len());
    for image in normal {
        match GpuTexture::upload(&gl, image, smooth) {
            Ok(texture) => textures.push(texture),
            Err(e) => {
                for texture in textures {
                    texture.delete(&gl);
                }
                program.delete(&gl);
                return Err(e);
            }
        }
    }
    Ok((gl, program, textures))
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything that must stay on the executor thread
pub(crate) struct GlState {
    glfw: Glfw,
    config: SelectorConfig,
    session: Option<Session>,
    router: InputRouter,
}

impl GlState {
    pub(crate) fn new(config: SelectorConfig) -> Result<Self, RendererError> {
        Ok(Self {
            glfw: platform::init_glfw()?,
            config,
            session: None,
            router: InputRouter::new(),
        })
    }

    fn session(&self) -> Result<&Session, RendererError> {
        self.session.as_ref().ok_or(RendererError::NoSession)
    }

    /// The session with its context current
    fn session_current(&mut self) -> Result<&mut Session, RendererError> {
        let session = self.session.as_mut().ok_or(RendererError::NoSession)?;
        session.make_current();
        Ok(session)
    }

    fn init_session(
        &mut self,
        displays: Vec<Rect>,
        darker: Vec<RawImage>,
        normal: Vec<RawImage>,
    ) -> Result<(), RendererError> {
        self.destroy_session();

        if displays.is_empty() {
            return Err(RendererError::NoDisplays);
        }
        if darker.len() != displays.len() || normal.len() != displays.len() {
            return Err(RendererError::DisplayCountMismatch {
                displays: displays.len(),
                darker: darker.len(),
                normal: normal.len(),
            });
        }

        let mut windows = platform::create_windows(
            &mut self.glfw,
            &displays,
            &self.config.window_title,
            self.config.monitor_binding,
        )?;
        let (gl, program, normal) =
            match create_gpu_resources(&mut windows, &normal, self.config.smooth) {
                Ok(resources) => resources,
                Err(e) => {
                    platform::destroy_windows(windows);
                    return Err(e);
                }
            };

        info!(displays = displays.len(), "region selection session started");
        self.session = Some(Session {
            displays,
            windows,
            darker,
            normal,
            program,
            gl,
            textures: HashMap::new(),
        });
        Ok(())
    }

    fn destroy_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.destroy();
        }
    }

    fn poll_events(&mut self) {
        self.glfw.poll_events();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let armed = self.router.is_armed();
        for window in &session.windows {
            for event in window.drain_events() {
                if !armed {
                    continue;
                }
                if !self.router.dispatch(event) {
                    debug!(?event, "no callback registered");
                }
            }
        }
    }

    fn request_close(&mut self) -> Result<(), RendererError> {
        let session = self.session.as_mut().ok_or(RendererError::NoSession)?;
        if let Some(first) = session.windows.first_mut() {
            first.set_should_close(true);
        }
        Ok(())
    }

    fn window_should_close(&self, index: usize) -> Result<bool, RendererError> {
        let session = self.session()?;
        session.check_index(index)?;
        Ok(session.windows[index].should_close())
    }

    fn darker_texture(&mut self, index: usize) -> Result<u64, RendererError> {
        let smooth = self.config.smooth;
        let session = self.session_current()?;
        session.check_index(index)?;

        let texture = GpuTexture::upload(&session.gl, &session.darker[index], smooth)?;
        let id = NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
        session.textures.insert(id, texture);
        debug!(display = index, texture = id, "created darker texture");
        Ok(id)
    }

    fn normal_pixels(
        &mut self,
        index: usize,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RendererError> {
        let session = self.session_current()?;
        session.check_index(index)?;
        session.normal[index].read(&session.gl, left, top, width, height)
    }

    fn render(&mut self, index: usize, texture: u64) -> Result<(), RendererError> {
        let clear_color = self.config.clear_color;
        let session = self.session.as_mut().ok_or(RendererError::NoSession)?;
        session.check_index(index)?;
        let raw = session.texture(texture)?.raw();

        let window = &mut session.windows[index];
        window.make_current();
        draw_fullscreen_quad(
            &session.gl,
            &session.program,
            raw,
            window.framebuffer_size(),
            clear_color,
        )?;
        window.swap_buffers();
        Ok(())
    }

    pub(crate) fn bind_texture(&mut self, id: u64) -> Result<(), RendererError> {
        let session = self.session_current()?;
        session.texture(id)?.bind(&session.gl);
        Ok(())
    }

    pub(crate) fn unbind_texture(&mut self, id: u64) -> Result<(), RendererError> {
        let session = self.session_current()?;
        session.texture(id)?;
        GpuTexture::unbind(&session.gl);
        Ok(())
    }

    pub(crate) fn write_texture(
        &mut self,
        id: u64,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), RendererError> {
        let session = self.session_current()?;
        session
            .texture(id)?
            .write(&session.gl, x, y, width, height, pixels)
    }

    pub(crate) fn read_texture(
        &mut self,
        id: u64,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RendererError> {
        let session = self.session_current()?;
        session
            .texture(id)?
            .read(&session.gl, left, top, width, height)
    }

    pub(crate) fn texture_size(&self, id: u64) -> Result<(u32, u32), RendererError> {
        Ok(self.session()?.texture(id)?.size())
    }

    /// Delete a darker texture whose handle was dropped.
    ///
    /// Textures from a destroyed session were already deleted with it.
    pub(crate) fn release_texture(&mut self, id: u64) {
        let Ok(session) = self.session_current() else {
            return;
        };
        if let Some(texture) = session.textures.remove(&id) {
            texture.delete(&session.gl);
            debug!(texture = id, "released darker texture");
        }
    }
}

impl Drop for GlState {
    fn drop(&mut self) {
        self.destroy_session();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public renderer
// ─────────────────────────────────────────────────────────────────────────────

/// Operations a region selection backend provides
pub trait RegionRenderer {
    type Texture;

    /// Open one fullscreen window per display. `darker` and `normal` hold one
    /// image per display, in display order.
    fn init_displays(
        &self,
        displays: Vec<Rect>,
        darker: Vec<RawImage>,
        normal: Vec<RawImage>,
    ) -> Result<(), RendererError>;

    fn set_mouse_press_callback(&self, callback: MouseCallback) -> Result<(), RendererError>;
    fn set_mouse_release_callback(&self, callback: MouseCallback) -> Result<(), RendererError>;
    fn set_key_callback(&self, callback: KeyCallback) -> Result<(), RendererError>;

    /// Pump native events; callbacks run inside this call
    fn poll_events(&self) -> Result<(), RendererError>;

    fn darker_texture(&self, index: usize) -> Result<Self::Texture, RendererError>;

    fn normal_texture_pixels(
        &self,
        index: usize,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RendererError>;

    /// Draw one frame of `texture` to display `index`
    fn render_texture(&self, index: usize, texture: &Self::Texture) -> Result<(), RendererError>;

    /// Ask the first window to close
    fn request_close(&self) -> Result<(), RendererError>;
    fn window_should_close(&self, index: usize) -> Result<bool, RendererError>;

    /// Tear down the session. Does nothing when there is none.
    fn destroy_all(&self) -> Result<(), RendererError>;
}

/// OpenGL 3.3 renderer backed by GLFW windows
pub struct OpenGlRenderer {
    executor: Executor<GlState>,
    crash: Arc<dyn CrashReporter>,
}

impl OpenGlRenderer {
    /// Start the renderer on a dedicated thread.
    ///
    /// Not usable on macOS, where windows must live on the process main
    /// thread; use [`OpenGlRenderer::init_on_current`] there.
    pub fn init(
        config: SelectorConfig,
        crash: Arc<dyn CrashReporter>,
    ) -> Result<Self, RendererError> {
        match Executor::spawn("regionshot-gl", move || GlState::new(config)) {
            Ok(executor) => Ok(Self { executor, crash }),
            Err(e) => {
                crash.capture(&e);
                Err(e)
            }
        }
    }

    /// Run the renderer on the calling thread and `app` on a new one.
    ///
    /// Returns `app`'s result once it has finished and dropped the renderer.
    pub fn init_on_current<A, R>(
        config: SelectorConfig,
        crash: Arc<dyn CrashReporter>,
        app: A,
    ) -> Result<R, RendererError>
    where
        A: FnOnce(OpenGlRenderer) -> R + Send + 'static,
        R: Send + 'static,
    {
        let app_crash = Arc::clone(&crash);
        let result = Executor::run_on_current(
            move || GlState::new(config),
            move |executor| {
                app(OpenGlRenderer {
                    executor,
                    crash: app_crash,
                })
            },
        );
        if let Err(e) = &result {
            crash.capture(e);
        }
        result
    }

    /// Run `job` on the executor and report fatal failures
    fn run<R, F>(&self, job: F) -> Result<R, RendererError>
    where
        F: FnOnce(&mut GlState) -> Result<R, RendererError> + Send + 'static,
        R: Send + 'static,
    {
        let result = match self.executor.exec(job) {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            if e.is_fatal() {
                self.crash.capture(e);
            }
        }
        result
    }

    /// Monitors currently connected, primary first
    pub fn monitors(&self) -> Result<Vec<MonitorInfo>, RendererError> {
        self.run(|state| Ok(platform::list_monitors(&mut state.glfw)))
    }

    /// Displays of the current session, empty without one
    pub fn displays(&self) -> Result<Vec<Rect>, RendererError> {
        self.run(|state| {
            Ok(state
                .session
                .as_ref()
                .map(|s| s.displays.clone())
                .unwrap_or_default())
        })
    }

    pub fn display_count(&self) -> Result<usize, RendererError> {
        self.run(|state| Ok(state.session.as_ref().map_or(0, |s| s.displays.len())))
    }
}

impl RegionRenderer for OpenGlRenderer {
    type Texture = Texture;

    fn init_displays(
        &self,
        displays: Vec<Rect>,
        darker: Vec<RawImage>,
        normal: Vec<RawImage>,
    ) -> Result<(), RendererError> {
        self.run(move |state| state.init_session(displays, darker, normal))
    }

    fn set_mouse_press_callback(&self, callback: MouseCallback) -> Result<(), RendererError> {
        self.run(move |state| {
            state.router.set_mouse_press(callback);
            Ok(())
        })
    }

    fn set_mouse_release_callback(&self, callback: MouseCallback) -> Result<(), RendererError> {
        self.run(move |state| {
            state.router.set_mouse_release(callback);
            Ok(())
        })
    }

    fn set_key_callback(&self, callback: KeyCallback) -> Result<(), RendererError> {
        self.run(move |state| {
            state.router.set_key(callback);
            Ok(())
        })
    }

    fn poll_events(&self) -> Result<(), RendererError> {
        self.run(|state| {
            state.poll_events();
            Ok(())
        })
    }

    fn darker_texture(&self, index: usize) -> Result<Texture, RendererError> {
        let id = self.run(move |state| state.darker_texture(index))?;
        Ok(Texture::new(id, self.executor.handle().downgrade()))
    }

    fn normal_texture_pixels(
        &self,
        index: usize,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RendererError> {
        self.run(move |state| state.normal_pixels(index, left, top, width, height))
    }

    fn render_texture(&self, index: usize, texture: &Texture) -> Result<(), RendererError> {
        let id = texture.id();
        self.run(move |state| state.render(index, id))
    }

    fn request_close(&self) -> Result<(), RendererError> {
        self.run(|state| state.request_close())
    }

    fn window_should_close(&self, index: usize) -> Result<bool, RendererError> {
        self.run(move |state| state.window_should_close(index))
    }

    fn destroy_all(&self) -> Result<(), RendererError> {
        self.run(|state| {
            state.destroy_session();
            Ok(())
        })
    }
}
