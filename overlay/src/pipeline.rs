//! Shader and draw pipeline
//!
//! One program is compiled per session and shared by every window through
//! the shared GL context. Each frame draws a single textured quad covering
//! the whole window. The quad's vertex array and buffer are created and
//! deleted within the frame; vertex arrays are per-context objects, so they
//! cannot be shared between windows anyway.

use glow::HasContext;
use tracing::debug;

use crate::error::RendererError;

const VERTEX_SHADER: &str = r#"#version 330 core

in vec2 position;
in vec2 tex_coord;

out vec2 frag_tex_coord;

void main() {
    gl_Position = vec4(position, 0.0, 1.0);
    frag_tex_coord = tex_coord;
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 330 core

in vec2 frag_tex_coord;

out vec4 color;

uniform sampler2D screenshot;

void main() {
    color = texture(screenshot, frag_tex_coord);
}
"#;

const POSITION_ATTRIB: u32 = 0;
const TEX_COORD_ATTRIB: u32 = 1;

/// Two triangles covering normalized device coordinates.
///
/// Each vertex is `x, y, u, v`. The v axis is flipped because texture row 0
/// holds the top image row while NDC y = -1 is the bottom of the window.
pub(crate) const QUAD_VERTICES: [f32; 24] = [
    -1.0, -1.0, 0.0, 1.0, //
    1.0, -1.0, 1.0, 1.0, //
    1.0, 1.0, 1.0, 0.0, //
    -1.0, -1.0, 0.0, 1.0, //
    1.0, 1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, 0.0, //
];

const FLOATS_PER_VERTEX: i32 = 4;
const VERTEX_COUNT: i32 = 6;

/// Load GL function pointers from the window whose context is current.
///
/// Fails if the context does not provide the functions the pipeline needs.
pub(crate) fn load_gl(window: &mut glfw::PWindow) -> Result<glow::Context, RendererError> {
    use glfw::Context as _;

    window.make_current();
    for required in ["glCreateShader", "glGenVertexArrays", "glTexSubImage2D"] {
        if window.get_proc_address(required).is_null() {
            return Err(RendererError::GlLoader(format!("missing {}", required)));
        }
    }

    // SAFETY: the window's context is current on this thread and stays
    // alive (shared by every window) for as long as the returned context is used.
    let gl = unsafe {
        glow::Context::from_loader_function(|s| window.get_proc_address(s) as *const _)
    };

    let version = gl.version();
    if version.major < 3 || (version.major == 3 && version.minor < 3) {
        return Err(RendererError::GlLoader(format!(
            "OpenGL 3.3 required, context is {}.{}",
            version.major, version.minor
        )));
    }
    debug!(
        major = version.major,
        minor = version.minor,
        vendor = %version.vendor_info,
        "loaded OpenGL"
    );
    Ok(gl)
}

fn compile_shader(
    gl: &glow::Context,
    kind: u32,
    stage: &'static str,
    source: &str,
) -> Result<glow::NativeShader, RendererError> {
    // SAFETY: executor thread, session context current
    unsafe {
        let shader = gl.create_shader(kind).map_err(RendererError::Gpu)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(RendererError::ShaderCompile { stage, log });
        }
        Ok(shader)
    }
}

/// The shared textured-quad program
pub(crate) struct ShaderProgram {
    raw: glow::NativeProgram,
}

impl ShaderProgram {
    pub(crate) fn new(gl: &glow::Context) -> Result<Self, RendererError> {
        let vertex = compile_shader(gl, glow::VERTEX_SHADER, "vertex", VERTEX_SHADER)?;
        let fragment = match compile_shader(gl, glow::FRAGMENT_SHADER, "fragment", FRAGMENT_SHADER)
        {
            Ok(fragment) => fragment,
            Err(e) => {
                // SAFETY: vertex was created above and is not attached
                unsafe { gl.delete_shader(vertex) };
                return Err(e);
            }
        };

        // SAFETY: executor thread, session context current; both shaders compiled
        unsafe {
            let program = match gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    gl.delete_shader(vertex);
                    gl.delete_shader(fragment);
                    return Err(RendererError::Gpu(e));
                }
            };
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.bind_attrib_location(program, POSITION_ATTRIB, "position");
            gl.bind_attrib_location(program, TEX_COORD_ATTRIB, "tex_coord");
            gl.link_program(program);

            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);

            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(RendererError::ShaderLink(log));
            }

            gl.use_program(Some(program));
            let sampler = gl.get_uniform_location(program, "screenshot");
            gl.uniform_1_i32(sampler.as_ref(), 0);
            gl.use_program(None);

            debug!("compiled overlay shader program");
            Ok(Self { raw: program })
        }
    }

    pub(crate) fn delete(self, gl: &glow::Context) {
        // SAFETY: program is owned by this value and no longer in use
        unsafe { gl.delete_program(self.raw) }
    }
}

/// Draw `texture` over the whole window whose context is current.
///
/// Clears to `clear_color`, draws the quad and leaves nothing bound. The
/// caller swaps buffers.
pub(crate) fn draw_fullscreen_quad(
    gl: &glow::Context,
    program: &ShaderProgram,
    texture: glow::NativeTexture,
    framebuffer_size: (i32, i32),
    clear_color: [f32; 4],
) -> Result<(), RendererError> {
    // SAFETY: executor thread, target window's context current; the vertex
    // buffer holds exactly VERTEX_COUNT vertices of FLOATS_PER_VERTEX floats.
    unsafe {
        let vertex_array = gl.create_vertex_array().map_err(RendererError::Gpu)?;
        let buffer = match gl.create_buffer() {
            Ok(buffer) => buffer,
            Err(e) => {
                gl.delete_vertex_array(vertex_array);
                return Err(RendererError::Gpu(e));
            }
        };

        gl.bind_vertex_array(Some(vertex_array));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice::<f32, u8>(&QUAD_VERTICES),
            glow::STATIC_DRAW,
        );
        let stride = FLOATS_PER_VERTEX * std::mem::size_of::<f32>() as i32;
        gl.enable_vertex_attrib_array(POSITION_ATTRIB);
        gl.vertex_attrib_pointer_f32(POSITION_ATTRIB, 2, glow::FLOAT, false, stride, 0);
        gl.enable_vertex_attrib_array(TEX_COORD_ATTRIB);
        gl.vertex_attrib_pointer_f32(
            TEX_COORD_ATTRIB,
            2,
            glow::FLOAT,
            false,
            stride,
            2 * std::mem::size_of::<f32>() as i32,
        );

        let (width, height) = framebuffer_size;
        gl.viewport(0, 0, width, height);
        let [r, g, b, a] = clear_color;
        gl.clear_color(r, g, b, a);
        gl.clear(glow::COLOR_BUFFER_BIT);

        gl.use_program(Some(program.raw));
        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.draw_arrays(glow::TRIANGLES, 0, VERTEX_COUNT);
        gl.bind_texture(glow::TEXTURE_2D, None);
        gl.use_program(None);

        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);
        gl.delete_buffer(buffer);
        gl.delete_vertex_array(vertex_array);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices() -> Vec<[f32; 4]> {
        QUAD_VERTICES
            .chunks_exact(FLOATS_PER_VERTEX as usize)
            .map(|v| [v[0], v[1], v[2], v[3]])
            .collect()
    }

    #[test]
    fn test_quad_covers_ndc() {
        let verts = vertices();
        assert_eq!(verts.len(), VERTEX_COUNT as usize);
        for corner in [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]] {
            assert!(verts.iter().any(|v| v[0] == corner[0] && v[1] == corner[1]));
        }
    }

    #[test]
    fn test_quad_is_upright() {
        // Top of the window samples texture row 0 (top of the image)
        for v in vertices() {
            let expected_u = (v[0] + 1.0) / 2.0;
            let expected_v = (1.0 - v[1]) / 2.0;
            assert_eq!(v[2], expected_u);
            assert_eq!(v[3], expected_v);
        }
    }

    #[test]
    fn test_triangles_are_counter_clockwise() {
        let verts = vertices();
        for tri in verts.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
            assert!(area > 0.0);
        }
    }
}
