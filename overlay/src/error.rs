//! Error types for the region selector renderer

use thiserror::Error;

use crate::executor::ExecutorError;

/// Errors from the overlay renderer
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("failed to initialize GLFW: {0}")]
    GlfwInit(String),

    #[error("failed to load OpenGL functions: {0}")]
    GlLoader(String),

    #[error("no monitor found at the origin of display {index} ({x}, {y})")]
    MonitorMismatch { index: usize, x: i32, y: i32 },

    #[error("no displays to select from")]
    NoDisplays,

    #[error("got {displays} displays but {darker} darker and {normal} normal images")]
    DisplayCountMismatch {
        displays: usize,
        darker: usize,
        normal: usize,
    },

    #[error("failed to create window for display {index}")]
    WindowCreation { index: usize },

    #[error("failed to compile {stage} shader: {log}")]
    ShaderCompile { stage: &'static str, log: String },

    #[error("failed to link shader program: {0}")]
    ShaderLink(String),

    #[error("GPU resource allocation failed: {0}")]
    Gpu(String),

    #[error("no region selection session is active")]
    NoSession,

    #[error("display index {index} out of range ({count} displays)")]
    InvalidDisplay { index: usize, count: usize },

    #[error(
        "rectangle {left},{top} {width}x{height} is outside the {texture_width}x{texture_height} texture"
    )]
    OutOfBounds {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        texture_width: u32,
        texture_height: u32,
    },

    #[error("pixel buffer is {actual} bytes, expected {expected}")]
    InvalidPixelBuffer { expected: usize, actual: usize },

    #[error("texture {0} does not belong to the active session")]
    StaleTexture(u64),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl RendererError {
    /// Whether the overlay cannot continue after this error.
    ///
    /// Fatal errors are sent to the crash reporter; the host is expected to
    /// abort. The rest are caller mistakes and leave the session usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RendererError::NoSession
                | RendererError::InvalidDisplay { .. }
                | RendererError::OutOfBounds { .. }
                | RendererError::InvalidPixelBuffer { .. }
                | RendererError::StaleTexture(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(RendererError::GlfwInit("Internal".into()).is_fatal());
        assert!(RendererError::MonitorMismatch { index: 0, x: 0, y: 0 }.is_fatal());
        assert!(
            RendererError::ShaderCompile {
                stage: "vertex",
                log: String::new()
            }
            .is_fatal()
        );
        assert!(RendererError::Executor(ExecutorError::Disconnected).is_fatal());

        assert!(!RendererError::NoSession.is_fatal());
        assert!(!RendererError::InvalidDisplay { index: 3, count: 2 }.is_fatal());
        assert!(!RendererError::StaleTexture(9).is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = RendererError::MonitorMismatch {
            index: 2,
            x: 3840,
            y: 0,
        };
        assert_eq!(
            err.to_string(),
            "no monitor found at the origin of display 2 (3840, 0)"
        );
        assert_eq!(
            RendererError::from(ExecutorError::Disconnected).to_string(),
            "executor thread is no longer running"
        );
    }
}
