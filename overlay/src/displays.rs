//! Display enumeration
//!
//! Captured displays arrive as plain rectangles in capture order. GLFW
//! reports its monitors in its own order. The two are reconciled by the
//! monitor's position: a display belongs to the monitor whose origin equals
//! the display's minimum corner. No fuzzy matching, a near miss would put an
//! overlay on the wrong screen.

use regionshot_types::Rect;
use tracing::debug;

use crate::error::RendererError;

/// Information about a connected monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Human-readable name reported by the window system
    pub name: String,
    /// X position of the monitor in virtual screen space
    pub x: i32,
    /// Y position of the monitor in virtual screen space
    pub y: i32,
    /// Width of the current video mode in pixels
    pub width: u32,
    /// Height of the current video mode in pixels
    pub height: u32,
    pub refresh_rate: u32,
    /// GLFW always lists the primary monitor first
    pub is_primary: bool,
}

impl MonitorInfo {
    /// Bounds of this monitor as a display rectangle
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Describe the monitors GLFW currently knows about
pub(crate) fn describe_monitors(monitors: &[&glfw::Monitor]) -> Vec<MonitorInfo> {
    monitors
        .iter()
        .enumerate()
        .map(|(i, monitor)| {
            let (x, y) = monitor.get_pos();
            let mode = monitor.get_video_mode();
            MonitorInfo {
                name: monitor
                    .get_name()
                    .unwrap_or_else(|| format!("Monitor {}", i + 1)),
                x,
                y,
                width: mode.as_ref().map(|m| m.width).unwrap_or(0),
                height: mode.as_ref().map(|m| m.height).unwrap_or(0),
                refresh_rate: mode.as_ref().map(|m| m.refresh_rate).unwrap_or(0),
                is_primary: i == 0,
            }
        })
        .collect()
}

/// Map every display to the index of the monitor at its origin.
///
/// The result is aligned with `displays`. Fails on the first display without
/// a monitor at its origin.
pub fn match_monitors(
    displays: &[Rect],
    monitor_origins: &[(i32, i32)],
) -> Result<Vec<usize>, RendererError> {
    displays
        .iter()
        .enumerate()
        .map(|(index, display)| {
            let origin = display.min();
            let monitor = monitor_origins
                .iter()
                .position(|&o| o == origin)
                .ok_or(RendererError::MonitorMismatch {
                    index,
                    x: origin.0,
                    y: origin.1,
                })?;
            debug!(display = index, monitor, x = origin.0, y = origin.1, "matched monitor");
            Ok(monitor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_in_display_order() {
        let displays = [
            Rect::new(1920, 0, 1920, 1080),
            Rect::new(0, 0, 1920, 1080),
        ];
        let monitors = [(0, 0), (1920, 0)];
        assert_eq!(match_monitors(&displays, &monitors).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_negative_origins() {
        let displays = [
            Rect::new(0, 0, 2560, 1440),
            Rect::new(-1280, -200, 1280, 1024),
        ];
        let monitors = [(-1280, -200), (0, 0)];
        assert_eq!(match_monitors(&displays, &monitors).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_extra_monitors_are_ignored() {
        let displays = [Rect::new(0, 0, 1920, 1080)];
        let monitors = [(3840, 0), (1920, 0), (0, 0)];
        assert_eq!(match_monitors(&displays, &monitors).unwrap(), vec![2]);
    }

    #[test]
    fn test_first_missing_display_fails() {
        let displays = [
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1920, 1080),
            Rect::new(3840, 0, 1920, 1080),
        ];
        // Second display has no monitor; third is also missing but never reached
        let monitors = [(0, 0)];
        match match_monitors(&displays, &monitors) {
            Err(RendererError::MonitorMismatch { index, x, y }) => {
                assert_eq!((index, x, y), (1, 1920, 0));
            }
            other => panic!("expected monitor mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_near_miss_is_not_a_match() {
        let displays = [Rect::new(1920, 0, 1920, 1080)];
        let monitors = [(1919, 0), (1920, 1)];
        assert!(matches!(
            match_monitors(&displays, &monitors),
            Err(RendererError::MonitorMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_monitor_info_rect() {
        let info = MonitorInfo {
            name: "DP-1".to_string(),
            x: -1920,
            y: 0,
            width: 1920,
            height: 1200,
            refresh_rate: 60,
            is_primary: false,
        };
        assert_eq!(info.rect(), Rect::new(-1920, 0, 1920, 1200));
    }
}
