//! Demo selection session
//!
//! Stands in for a capture backend: every display gets a generated test
//! pattern as its screenshot and a darkened copy as the backdrop. Pressing
//! the mouse on a display shows the undimmed screenshot there until the
//! button is released. Escape closes the overlay.

use std::sync::mpsc;
use std::time::Duration;

use regionshot_overlay::{OpenGlRenderer, RegionRenderer, RendererError, Texture};
use regionshot_types::{ImageError, RawImage, Rect, rgba_len};
use thiserror::Error;
use tracing::{debug, info};

/// GLFW key code for Escape
const KEY_ESCAPE: i32 = 256;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Checkerboard cell size in pixels
const PATTERN_CELL: u32 = 64;

const PALETTE: [[u8; 3]; 4] = [
    [66, 135, 245],
    [245, 166, 35],
    [76, 175, 80],
    [171, 71, 188],
];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Renderer(#[from] RendererError),

    #[error("failed to build test image")]
    Image(#[from] ImageError),
}

/// Input forwarded from renderer callbacks to the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionEvent {
    Press { index: usize, rect: Rect },
    Release { index: usize, rect: Rect },
    Quit,
}

/// A checkerboard in one palette colour per display
pub fn test_pattern(width: u32, height: u32, index: usize) -> Result<RawImage, ImageError> {
    let [r, g, b] = PALETTE[index % PALETTE.len()];
    let mut pixels = Vec::with_capacity(rgba_len(width, height));
    for y in 0..height {
        for x in 0..width {
            if (x / PATTERN_CELL + y / PATTERN_CELL) % 2 == 0 {
                pixels.extend_from_slice(&[r, g, b, 255]);
            } else {
                pixels.extend_from_slice(&[r / 2, g / 2, b / 2, 255]);
            }
        }
    }
    RawImage::new(width, height, pixels)
}

/// Displays to cover: the configured layout, or every connected monitor
pub fn resolve_displays(
    renderer: &OpenGlRenderer,
    configured: &[Rect],
) -> Result<Vec<Rect>, RendererError> {
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }
    // Monitors without a current video mode report a zero size
    Ok(renderer
        .monitors()?
        .iter()
        .map(|m| m.rect())
        .filter(|r| !r.is_empty())
        .collect())
}

fn register_callbacks(
    renderer: &OpenGlRenderer,
    tx: mpsc::Sender<SelectionEvent>,
) -> Result<(), RendererError> {
    let press_tx = tx.clone();
    renderer.set_mouse_press_callback(Box::new(move |index, rect| {
        let _ = press_tx.send(SelectionEvent::Press { index, rect });
    }))?;
    let release_tx = tx.clone();
    renderer.set_mouse_release_callback(Box::new(move |index, rect| {
        let _ = release_tx.send(SelectionEvent::Release { index, rect });
    }))?;
    renderer.set_key_callback(Box::new(move |release, index, key| {
        debug!(release, display = index, key, "key");
        if !release && key == KEY_ESCAPE {
            let _ = tx.send(SelectionEvent::Quit);
        }
    }))
}

/// Copy display `index`'s screenshot into its backdrop texture
fn show_preview(
    renderer: &OpenGlRenderer,
    texture: &Texture,
    index: usize,
) -> Result<(), RendererError> {
    let (width, height) = texture.width_height()?;
    let pixels = renderer.normal_texture_pixels(index, 0, 0, width, height)?;
    texture.begin()?;
    texture.set_pixels(0, 0, width, height, &pixels)?;
    texture.end()
}

/// Run one selection session until a window is asked to close
pub fn run(
    renderer: &OpenGlRenderer,
    displays: Vec<Rect>,
    dim_factor: f32,
) -> Result<(), SessionError> {
    let mut normal = Vec::with_capacity(displays.len());
    let mut darker = Vec::with_capacity(displays.len());
    for (index, display) in displays.iter().enumerate() {
        let image = test_pattern(display.width, display.height, index)?;
        darker.push(image.darkened(dim_factor));
        normal.push(image);
    }

    renderer.init_displays(displays.clone(), darker, normal)?;
    info!(displays = displays.len(), "selection overlay shown");

    let (tx, rx) = mpsc::channel();
    register_callbacks(renderer, tx)?;

    let mut textures = (0..displays.len())
        .map(|index| renderer.darker_texture(index))
        .collect::<Result<Vec<_>, _>>()?;

    'frames: loop {
        renderer.poll_events()?;
        for event in rx.try_iter() {
            match event {
                SelectionEvent::Press { index, rect } => {
                    info!(display = index, %rect, "selection started");
                    show_preview(renderer, &textures[index], index)?;
                }
                SelectionEvent::Release { index, rect } => {
                    info!(display = index, %rect, "selection finished");
                    // Fresh backdrop; the old texture is released on drop
                    textures[index] = renderer.darker_texture(index)?;
                }
                SelectionEvent::Quit => renderer.request_close()?,
            }
        }

        for (index, texture) in textures.iter().enumerate() {
            renderer.render_texture(index, texture)?;
        }
        for index in 0..displays.len() {
            if renderer.window_should_close(index)? {
                break 'frames;
            }
        }
        std::thread::sleep(FRAME_INTERVAL);
    }

    drop(textures);
    renderer.destroy_all()?;
    info!("selection overlay closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_alternates_cells() {
        let image = test_pattern(PATTERN_CELL * 2, PATTERN_CELL, 0).unwrap();
        let [r, g, b] = PALETTE[0];
        assert_eq!(image.pixel(0, 0), Some([r, g, b, 255]));
        assert_eq!(image.pixel(PATTERN_CELL, 0), Some([r / 2, g / 2, b / 2, 255]));
        assert_eq!(image.pixel(PATTERN_CELL - 1, PATTERN_CELL - 1), Some([r, g, b, 255]));
    }

    #[test]
    fn test_pattern_colour_per_display() {
        let first = test_pattern(4, 4, 1).unwrap();
        let wrapped = test_pattern(4, 4, 1 + PALETTE.len()).unwrap();
        assert_eq!(first, wrapped);
        assert_ne!(first, test_pattern(4, 4, 2).unwrap());
    }

    #[test]
    fn test_pattern_rejects_empty() {
        assert!(matches!(
            test_pattern(0, 10, 0),
            Err(ImageError::Empty { .. })
        ));
    }
}
