//! Texture management
//!
//! Each display has two images: the darker backdrop and the normal
//! screenshot. The normal one lives on the GPU for the whole session; the
//! darker one stays in CPU memory and a fresh GPU texture is made from it
//! whenever the caller asks (once per activation, not per frame).
//!
//! Callers never see GL names. They get a [`Texture`] handle whose methods
//! are blocking round trips to the executor. Dropping the handle releases
//! the GPU texture; anything still outstanding is released with the session.
//!
//! Pixels are RGBA8 with image row 0 stored as texture row 0. Reads and
//! writes use the same addressing, so writing a rectangle and reading it
//! back returns the same bytes.

use glow::HasContext;
use regionshot_types::{RawImage, rgba_len};
use tracing::debug;

use crate::error::RendererError;
use crate::executor::{ExecutorError, MainThread, WeakMainThread};
use crate::renderer::GlState;

/// Whether `width`x`height` at `left`,`top` fits in a texture of the given size
fn region_in_bounds(
    texture_width: u32,
    texture_height: u32,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
) -> bool {
    left.checked_add(width).is_some_and(|right| right <= texture_width)
        && top.checked_add(height).is_some_and(|bottom| bottom <= texture_height)
}

/// A texture resident on the GPU, owned by the session
pub(crate) struct GpuTexture {
    raw: glow::NativeTexture,
    width: u32,
    height: u32,
}

impl GpuTexture {
    /// Upload an image as a new texture
    pub(crate) fn upload(
        gl: &glow::Context,
        image: &RawImage,
        smooth: bool,
    ) -> Result<Self, RendererError> {
        let filter = (if smooth { glow::LINEAR } else { glow::NEAREST }) as i32;

        // SAFETY: called on the executor thread with a session context current;
        // the pixel slice matches width * height * 4 (checked by RawImage).
        let raw = unsafe {
            let raw = gl.create_texture().map_err(RendererError::Gpu)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                image.width() as i32,
                image.height() as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(image.pixels())),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
            raw
        };

        debug!(
            width = image.width(),
            height = image.height(),
            "uploaded texture"
        );
        Ok(Self {
            raw,
            width: image.width(),
            height: image.height(),
        })
    }

    pub(crate) fn raw(&self) -> glow::NativeTexture {
        self.raw
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn bind(&self, gl: &glow::Context) {
        // SAFETY: executor thread, session context current
        unsafe { gl.bind_texture(glow::TEXTURE_2D, Some(self.raw)) }
    }

    pub(crate) fn unbind(gl: &glow::Context) {
        // SAFETY: executor thread, session context current
        unsafe { gl.bind_texture(glow::TEXTURE_2D, None) }
    }

    /// Check that a rectangle lies inside the texture
    fn check_region(
        &self,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<(), RendererError> {
        if region_in_bounds(self.width, self.height, left, top, width, height) {
            Ok(())
        } else {
            Err(RendererError::OutOfBounds {
                left,
                top,
                width,
                height,
                texture_width: self.width,
                texture_height: self.height,
            })
        }
    }

    /// Replace a sub-rectangle of the texture
    pub(crate) fn write(
        &self,
        gl: &glow::Context,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), RendererError> {
        let expected = rgba_len(width, height);
        if pixels.len() != expected {
            return Err(RendererError::InvalidPixelBuffer {
                expected,
                actual: pixels.len(),
            });
        }
        self.check_region(x, y, width, height)?;

        // SAFETY: region and buffer length validated above
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.raw));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                x as i32,
                y as i32,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    /// Read back a sub-rectangle of the texture.
    ///
    /// The texture is attached to a temporary framebuffer which is deleted
    /// before returning.
    pub(crate) fn read(
        &self,
        gl: &glow::Context,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RendererError> {
        self.check_region(left, top, width, height)?;
        let mut pixels = vec![0u8; rgba_len(width, height)];

        // SAFETY: region validated above; the buffer holds width * height RGBA pixels
        unsafe {
            let framebuffer = gl.create_framebuffer().map_err(RendererError::Gpu)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(self.raw));
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(self.raw),
                0,
            );
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.read_pixels(
                left as i32,
                top as i32,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(pixels.as_mut_slice())),
            );
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            gl.delete_framebuffer(framebuffer);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(pixels)
    }

    pub(crate) fn delete(self, gl: &glow::Context) {
        // SAFETY: the texture is owned by this value and not bound anywhere else
        unsafe { gl.delete_texture(self.raw) }
    }
}

/// Opaque handle to a texture owned by the renderer.
///
/// Every method runs on the executor and blocks until done; any thread may
/// call them, except from inside an input callback. The handle does not keep
/// the renderer alive: once it is gone, methods fail with a disconnected
/// executor error.
pub struct Texture {
    id: u64,
    executor: WeakMainThread<GlState>,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture").field("id", &self.id).finish()
    }
}

impl Texture {
    pub(crate) fn new(id: u64, executor: WeakMainThread<GlState>) -> Self {
        Self { id, executor }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn executor(&self) -> Result<MainThread<GlState>, RendererError> {
        self.executor
            .upgrade()
            .ok_or(RendererError::Executor(ExecutorError::Disconnected))
    }

    /// Bind the texture for drawing or pixel operations
    pub fn begin(&self) -> Result<(), RendererError> {
        let id = self.id;
        self.executor()?.exec(move |state| state.bind_texture(id))?
    }

    /// Unbind the texture
    pub fn end(&self) -> Result<(), RendererError> {
        let id = self.id;
        self.executor()?.exec(move |state| state.unbind_texture(id))?
    }

    /// Overwrite a `width` x `height` RGBA rectangle at (`x`, `y`)
    pub fn set_pixels(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), RendererError> {
        let expected = rgba_len(width, height);
        if pixels.len() != expected {
            return Err(RendererError::InvalidPixelBuffer {
                expected,
                actual: pixels.len(),
            });
        }
        let id = self.id;
        let pixels = pixels.to_vec();
        self.executor()?
            .exec(move |state| state.write_texture(id, x, y, width, height, &pixels))?
    }

    /// Read back a rectangle of RGBA pixels, rows top to bottom
    pub fn pixels(
        &self,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RendererError> {
        let id = self.id;
        self.executor()?
            .exec(move |state| state.read_texture(id, left, top, width, height))?
    }

    /// Texture dimensions in pixels
    pub fn width_height(&self) -> Result<(u32, u32), RendererError> {
        let id = self.id;
        self.executor()?.exec(move |state| state.texture_size(id))?
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        // Queued, not waited on: the handle may be dropped on the executor thread
        if let Some(executor) = self.executor.upgrade() {
            let id = self.id;
            let _ = executor.post(move |state| state.release_texture(id));
        }
    }
}
