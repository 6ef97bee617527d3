//! Session tests against real GLFW windows
//!
//! These need a display server and an OpenGL 3.3 driver, so they are marked
//! #[ignore]. Run with: cargo test -p regionshot-overlay -- --ignored

use std::sync::{Arc, Mutex, MutexGuard};

use regionshot_overlay::{
    CrashReporter, OpenGlRenderer, RawImage, Rect, RegionRenderer, RendererError, SelectorConfig,
};

/// GLFW is not thread-safe; one renderer at a time
static GL_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
    GL_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Renderer whose crash reports are collected as strings
fn renderer() -> (OpenGlRenderer, Arc<Mutex<Vec<String>>>) {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let crash: Arc<dyn CrashReporter> =
        Arc::new(move |e: &RendererError| sink.lock().unwrap().push(e.to_string()));
    let renderer =
        OpenGlRenderer::init(SelectorConfig::default(), crash).expect("renderer should start");
    (renderer, reported)
}

fn primary_display(renderer: &OpenGlRenderer) -> Rect {
    let monitors = renderer.monitors().expect("monitors");
    monitors.first().expect("at least one monitor").rect()
}

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RawImage {
    RawImage::solid(width, height, rgba).unwrap()
}

#[test]
#[ignore = "requires a display and OpenGL 3.3"]
fn two_side_by_side_displays() {
    let _guard = lock();
    let (renderer, _) = renderer();

    let displays = vec![
        Rect::new(0, 0, 1920, 1080),
        Rect::new(1920, 0, 1920, 1080),
    ];
    let origins: Vec<(i32, i32)> = renderer
        .monitors()
        .unwrap()
        .iter()
        .map(|m| (m.x, m.y))
        .collect();
    if regionshot_overlay::match_monitors(&displays, &origins).is_err() {
        eprintln!("skipping: needs two 1920x1080 monitors side by side");
        return;
    }

    let red = [200, 0, 0, 255];
    let darker = vec![solid(1920, 1080, [20, 20, 20, 255]), solid(1920, 1080, [30, 30, 30, 255])];
    let normal = vec![solid(1920, 1080, red), solid(1920, 1080, [0, 0, 200, 255])];
    renderer.init_displays(displays.clone(), darker, normal).unwrap();

    assert_eq!(renderer.display_count().unwrap(), 2);
    assert_eq!(renderer.displays().unwrap(), displays);

    let pixels = renderer.normal_texture_pixels(0, 0, 0, 1920, 1080).unwrap();
    assert_eq!(pixels.len(), 1920 * 1080 * 4);
    assert!(pixels.chunks_exact(4).all(|p| p == red));

    let texture = renderer.darker_texture(1).unwrap();
    assert_eq!(texture.width_height().unwrap(), (1920, 1080));

    renderer.destroy_all().unwrap();
}

#[test]
#[ignore = "requires a display and OpenGL 3.3"]
fn texture_pixels_round_trip() {
    let _guard = lock();
    let (renderer, reported) = renderer();
    let display = primary_display(&renderer);

    // Red encodes the column and green the row
    let gradient: Vec<u8> = (0..48u32)
        .flat_map(|y| (0..64u32).flat_map(move |x| [x as u8 * 4, y as u8 * 5, 150, 255]))
        .collect();
    let normal = RawImage::new(64, 48, gradient).unwrap();
    renderer
        .init_displays(
            vec![display],
            vec![solid(64, 48, [10, 10, 10, 255])],
            vec![normal.clone()],
        )
        .unwrap();

    // Rows come back top to bottom, as uploaded
    assert_eq!(
        renderer.normal_texture_pixels(0, 3, 7, 10, 4).unwrap(),
        normal.crop(3, 7, 10, 4).unwrap()
    );

    let texture = renderer.darker_texture(0).unwrap();
    assert_eq!(texture.width_height().unwrap(), (64, 48));

    // Distinct bytes per pixel so row or channel swaps show up
    let (w, h) = (5u32, 3u32);
    let patch: Vec<u8> = (0..w * h * 4).map(|i| (i * 7 % 251) as u8).collect();
    texture.begin().unwrap();
    texture.set_pixels(2, 4, w, h, &patch).unwrap();
    texture.end().unwrap();
    assert_eq!(texture.pixels(2, 4, w, h).unwrap(), patch);

    // Untouched pixels keep the uploaded colour
    assert_eq!(texture.pixels(0, 0, 1, 1).unwrap(), vec![10, 10, 10, 255]);

    for _ in 0..3 {
        renderer.poll_events().unwrap();
        renderer.render_texture(0, &texture).unwrap();
    }
    assert!(!renderer.window_should_close(0).unwrap());
    renderer.request_close().unwrap();
    assert!(renderer.window_should_close(0).unwrap());

    renderer.destroy_all().unwrap();
    assert!(reported.lock().unwrap().is_empty());
}

#[test]
#[ignore = "requires a display and OpenGL 3.3"]
fn caller_mistakes_are_not_reported() {
    let _guard = lock();
    let (renderer, reported) = renderer();
    let display = primary_display(&renderer);

    assert!(matches!(
        renderer.darker_texture(0),
        Err(RendererError::NoSession)
    ));

    renderer
        .init_displays(
            vec![display],
            vec![solid(16, 16, [0, 0, 0, 255])],
            vec![solid(16, 16, [255, 255, 255, 255])],
        )
        .unwrap();

    assert!(matches!(
        renderer.normal_texture_pixels(0, 10, 10, 8, 8),
        Err(RendererError::OutOfBounds { .. })
    ));
    assert!(matches!(
        renderer.normal_texture_pixels(3, 0, 0, 1, 1),
        Err(RendererError::InvalidDisplay { index: 3, count: 1 })
    ));

    let texture = renderer.darker_texture(0).unwrap();
    assert!(matches!(
        texture.set_pixels(0, 0, 2, 2, &[0u8; 15]),
        Err(RendererError::InvalidPixelBuffer {
            expected: 16,
            actual: 15
        })
    ));

    renderer.destroy_all().unwrap();
    assert!(reported.lock().unwrap().is_empty());
}

#[test]
#[ignore = "requires a display and OpenGL 3.3"]
fn missing_monitor_fails_before_any_window() {
    let _guard = lock();
    let (renderer, reported) = renderer();
    let display = primary_display(&renderer);

    let displays = vec![
        display,
        Rect::new(-100_000, -100_000, 800, 600),
        Rect::new(100_000, 0, 800, 600),
    ];
    let images = |n| (0..n).map(|_| solid(8, 8, [0, 0, 0, 255])).collect::<Vec<_>>();

    let result = renderer.init_displays(displays, images(3), images(3));
    assert!(matches!(
        result,
        Err(RendererError::MonitorMismatch {
            index: 1,
            x: -100_000,
            y: -100_000
        })
    ));
    assert_eq!(renderer.display_count().unwrap(), 0);
    assert_eq!(reported.lock().unwrap().len(), 1);
}

#[test]
#[ignore = "requires a display and OpenGL 3.3"]
fn image_count_mismatch_is_fatal() {
    let _guard = lock();
    let (renderer, reported) = renderer();
    let display = primary_display(&renderer);

    let result = renderer.init_displays(
        vec![display],
        vec![solid(8, 8, [0, 0, 0, 255])],
        Vec::new(),
    );
    assert!(matches!(
        result,
        Err(RendererError::DisplayCountMismatch {
            displays: 1,
            darker: 1,
            normal: 0
        })
    ));
    assert_eq!(reported.lock().unwrap().len(), 1);
}

#[test]
#[ignore = "requires a display and OpenGL 3.3"]
fn repeated_init_and_destroy() {
    let _guard = lock();
    let (renderer, _) = renderer();
    let display = primary_display(&renderer);

    let mut old_texture = None;
    for cycle in 0..5u8 {
        renderer
            .init_displays(
                vec![display],
                vec![solid(32, 32, [cycle, 0, 0, 255])],
                vec![solid(32, 32, [0, cycle, 0, 255])],
            )
            .unwrap();
        assert_eq!(
            renderer.normal_texture_pixels(0, 0, 0, 1, 1).unwrap(),
            vec![0, cycle, 0, 255]
        );

        // A handle from the previous session no longer resolves
        if let Some(texture) = old_texture.take() {
            assert!(matches!(
                renderer.render_texture(0, &texture),
                Err(RendererError::StaleTexture(_))
            ));
        }
        let texture = renderer.darker_texture(0).unwrap();
        renderer.render_texture(0, &texture).unwrap();
        old_texture = Some(texture);

        renderer.destroy_all().unwrap();
        renderer.destroy_all().unwrap();
        assert_eq!(renderer.display_count().unwrap(), 0);
    }

    // Dropping a stale handle is harmless
    drop(old_texture);
    renderer.poll_events().unwrap();
}

#[test]
#[ignore = "requires a display and OpenGL 3.3"]
fn handles_outliving_the_renderer_disconnect() {
    let _guard = lock();
    let (renderer, _) = renderer();
    let display = primary_display(&renderer);

    renderer
        .init_displays(
            vec![display],
            vec![solid(4, 4, [0, 0, 0, 255])],
            vec![solid(4, 4, [0, 0, 0, 255])],
        )
        .unwrap();
    let texture = renderer.darker_texture(0).unwrap();
    drop(renderer);

    assert!(matches!(
        texture.width_height(),
        Err(RendererError::Executor(_))
    ));
}
