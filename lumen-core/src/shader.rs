/// Compiled shader programs and the names of their variables
use std::fs;
use std::path::Path;

use crate::context::{GraphicsContext, ProgramHandle, ShaderHandle, ShaderStage};
use crate::error::{RenderError, Result, ShaderError};

/// A fixed-size uniform array of light structs, e.g. `light_data[N].position`
///
/// The per-slot variable names are built once, so drawing never formats them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightArray {
    array: String,
    slots: Vec<(String, String)>,
}

impl LightArray {
    /// An array whose structs have `position` and `color` fields.
    pub fn new(array: impl Into<String>, capacity: usize) -> Self {
        Self::build(array.into(), "position", "color", capacity)
    }

    pub fn with_fields(self, position: impl Into<String>, color: impl Into<String>) -> Self {
        let capacity = self.capacity();
        Self::build(self.array, &position.into(), &color.into(), capacity)
    }

    fn build(array: String, position: &str, color: &str, capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|slot| {
                (
                    format!("{array}[{slot}].{position}"),
                    format!("{array}[{slot}].{color}"),
                )
            })
            .collect();
        Self { array, slots }
    }

    pub fn array(&self) -> &str {
        &self.array
    }

    /// Compiled-in length of the array
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// `None` when `slot` is past the end of the array.
    pub fn position_variable(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).map(|(position, _)| position.as_str())
    }

    pub fn color_variable(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).map(|(_, color)| color.as_str())
    }
}

/// Logical role to variable name table. Position and the three matrices are
/// required; every other role is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderVariables {
    pub position: String,
    pub model: String,
    pub view: String,
    pub projection: String,
    pub color: Option<String>,
    pub normal: Option<String>,
    pub uv: Option<String>,
    pub sampler: Option<String>,
    pub lights: Option<LightArray>,
}

impl ShaderVariables {
    pub fn new(
        position: impl Into<String>,
        model: impl Into<String>,
        view: impl Into<String>,
        projection: impl Into<String>,
    ) -> Self {
        Self {
            position: position.into(),
            model: model.into(),
            view: view.into(),
            projection: projection.into(),
            color: None,
            normal: None,
            uv: None,
            sampler: None,
            lights: None,
        }
    }

    pub fn with_color(mut self, name: impl Into<String>) -> Self {
        self.color = Some(name.into());
        self
    }

    pub fn with_normal(mut self, name: impl Into<String>) -> Self {
        self.normal = Some(name.into());
        self
    }

    pub fn with_uv(mut self, name: impl Into<String>) -> Self {
        self.uv = Some(name.into());
        self
    }

    pub fn with_sampler(mut self, name: impl Into<String>) -> Self {
        self.sampler = Some(name.into());
        self
    }

    pub fn with_lights(mut self, lights: LightArray) -> Self {
        self.lights = Some(lights);
        self
    }
}

/// A linked GPU program. Shared read-only by every object drawn with it.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    variables: ShaderVariables,
}

impl ShaderProgram {
    /// Compiles both stages and links them. The intermediate shader objects
    /// are deleted whether or not linking succeeds.
    pub fn new(
        ctx: &mut dyn GraphicsContext,
        vertex_source: &str,
        fragment_source: &str,
        variables: ShaderVariables,
    ) -> Result<Self> {
        let vertex = compile(ctx, ShaderStage::Vertex, vertex_source)?;
        let fragment = match compile(ctx, ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                ctx.delete_shader(vertex);
                return Err(err);
            }
        };

        let linked = ctx.link_program(&[vertex, fragment]);
        ctx.delete_shader(vertex);
        ctx.delete_shader(fragment);
        let handle = linked.map_err(|log| ShaderError::Link { log })?;

        log::info!("linked shader program {handle:?}");
        Ok(Self { handle, variables })
    }

    /// Reads both stage sources from disk, then behaves like [`ShaderProgram::new`].
    pub fn from_files(
        ctx: &mut dyn GraphicsContext,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        variables: ShaderVariables,
    ) -> Result<Self> {
        let vertex_source = read_source(vertex_path.as_ref())?;
        let fragment_source = read_source(fragment_path.as_ref())?;
        Self::new(ctx, &vertex_source, &fragment_source, variables)
    }

    pub fn use_program(&self, ctx: &mut dyn GraphicsContext) {
        ctx.use_program(self.handle);
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn variables(&self) -> &ShaderVariables {
        &self.variables
    }

    pub fn release(self, ctx: &mut dyn GraphicsContext) {
        log::debug!("deleting shader program {:?}", self.handle);
        ctx.delete_program(self.handle);
    }
}

fn compile(ctx: &mut dyn GraphicsContext, stage: ShaderStage, source: &str) -> Result<ShaderHandle> {
    ctx.compile_shader(stage, source)
        .map_err(|log| RenderError::from(ShaderError::Compile { stage, log }))
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| {
        RenderError::from(ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Call, HeadlessContext};

    const VERTEX: &str = "void main() { gl_Position = vec4(position, 1.0); }";
    const FRAGMENT: &str = "void main() { color = vec4(1.0); }";

    fn variables() -> ShaderVariables {
        ShaderVariables::new("position", "model_mat", "view_mat", "proj_mat")
    }

    #[test]
    fn test_light_variable_names() {
        let lights = LightArray::new("light_data", 4);
        assert_eq!(lights.position_variable(1), Some("light_data[1].position"));
        assert_eq!(lights.color_variable(3), Some("light_data[3].color"));
        assert_eq!(lights.position_variable(4), None);

        let custom = LightArray::new("lights", 2).with_fields("pos", "rgb");
        assert_eq!(custom.color_variable(0), Some("lights[0].rgb"));
        assert_eq!(custom.capacity(), 2);
        assert_eq!(custom.array(), "lights");
    }

    #[test]
    fn test_link_deletes_intermediate_shaders() {
        let mut ctx = HeadlessContext::new();
        let program = ShaderProgram::new(&mut ctx, VERTEX, FRAGMENT, variables()).unwrap();
        assert_eq!(ctx.live_resources(), 1);

        program.use_program(&mut ctx);
        assert_eq!(ctx.calls().last(), Some(&Call::UseProgram(program.handle())));

        program.release(&mut ctx);
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn test_compile_error_names_the_stage() {
        let mut ctx = HeadlessContext::new();
        let broken = "#error missing semicolon\nvoid main() {}";
        match ShaderProgram::new(&mut ctx, VERTEX, broken, variables()) {
            Err(RenderError::Shader(ShaderError::Compile { stage, log })) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("#error"));
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn test_link_error_carries_the_log() {
        let mut ctx = HeadlessContext::new();
        let err = ShaderProgram::new(&mut ctx, "void vert() {}", FRAGMENT, variables()).unwrap_err();
        match err {
            RenderError::Shader(ShaderError::Link { log }) => assert!(log.contains("vertex")),
            other => panic!("expected link error, got {other:?}"),
        }
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn test_missing_source_file() {
        let mut ctx = HeadlessContext::new();
        let err = ShaderProgram::from_files(
            &mut ctx,
            "/nonexistent/shader.vert",
            "/nonexistent/shader.frag",
            variables(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Shader(ShaderError::Io { .. })));
    }
}
