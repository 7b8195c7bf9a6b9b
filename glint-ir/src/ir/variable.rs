//! Variables: uniforms, shader inputs/outputs, globals, and locals.

use crate::ir::entities::Type;
use crate::ir::instructions::ConstVec;

/// Storage class of a variable.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VariableMode {
    /// Vertex attribute / varying read by this stage.
    ShaderIn,
    /// Varying / fragment result written by this stage.
    ShaderOut,
    /// Shader-wide global.
    Global,
    /// Function-local.
    Local,
    /// Uniform.
    Uniform,
}

/// Interpolation qualifier for shader inputs and outputs.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Interpolation {
    /// No qualifier; the stage default applies.
    #[default]
    None,
    /// `smooth`.
    Smooth,
    /// `flat`.
    Flat,
    /// `noperspective`.
    NoPerspective,
}

/// Layout qualifier for the fragment depth output.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum DepthLayout {
    /// No depth layout is specified.
    #[default]
    None,
    /// `depth_any`.
    Any,
    /// `depth_greater`.
    Greater,
    /// `depth_less`.
    Less,
    /// `depth_unchanged`.
    Unchanged,
}

/// Image format and access qualifiers.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImageQualifiers {
    /// `readonly`.
    pub read_only: bool,
    /// `writeonly`.
    pub write_only: bool,
    /// `coherent`.
    pub coherent: bool,
    /// `volatile`.
    pub volatile: bool,
    /// `restrict`.
    pub restrict: bool,
    /// Internal format if specified explicitly, otherwise 0.
    pub format: u32,
}

/// Where an atomic counter lives.
#[derive(Copy, Clone, Debug, Default)]
pub struct AtomicLocation {
    /// Backing buffer index.
    pub buffer_index: u32,
    /// Byte offset within the buffer.
    pub offset: u32,
}

/// Description of built-in state backing a built-in uniform.
#[derive(Copy, Clone, Debug)]
pub struct StateSlot {
    /// Driver state tokens identifying the value.
    pub tokens: [i32; 5],
    /// Swizzle applied when reading the state.
    pub swizzle: i32,
}

/// Value of a constant initializer. Scalars and vectors use `value`;
/// arrays and structs nest through `elements`.
#[derive(Clone, Debug, Default)]
pub struct ConstantInit {
    /// Up to a matrix worth of component bits.
    pub value: [ConstVec; 4],
    /// Per-element / per-field initializers for aggregates.
    pub elements: Vec<ConstantInit>,
}

/// Layout and qualifier state carried by a variable.
///
/// Most of these fields are set by the front-end and only carried through
/// the middle-end for the benefit of the linker and back-end.
#[derive(Clone, Debug, Default)]
pub struct VariableQualifiers {
    /// Declared `const`, a shader input, or a uniform.
    pub read_only: bool,
    /// `centroid`.
    pub centroid: bool,
    /// `sample`.
    pub sample: bool,
    /// `invariant`.
    pub invariant: bool,
    /// Interpolation mode for shader inputs / outputs.
    pub interpolation: Interpolation,
    /// Fragment coordinate convention: origin at upper left.
    pub origin_upper_left: bool,
    /// Fragment coordinate convention: pixel centers at integers.
    pub pixel_center_integer: bool,
    /// The location was set in the shader and may not be reassigned.
    pub explicit_location: bool,
    /// The dual-source blend index was set in the shader.
    pub explicit_index: bool,
    /// The binding was set in the shader.
    pub explicit_binding: bool,
    /// Layout qualifier for `gl_FragDepth`.
    pub depth_layout: DepthLayout,
    /// Storage slot of the base of this variable; -1 when unassigned.
    pub location: i32,
    /// Output index for dual source blending.
    pub index: i32,
    /// Initial binding point for a sampler or UBO.
    pub binding: i32,
    /// Location an atomic counter is stored at.
    pub atomic: AtomicLocation,
    /// Image qualifiers.
    pub image: ImageQualifiers,
    /// Highest element accessed with a constant array index.
    pub max_array_access: u32,
}

/// A uniform, shader input, shader output, global, or local.
pub struct VariableData {
    /// Declared name.
    pub name: String,
    /// Declared type.
    pub ty: Type,
    /// Storage class.
    pub mode: VariableMode,
    /// Layout and qualifier state.
    pub qualifiers: VariableQualifiers,
    /// Built-in state backing this uniform; empty otherwise.
    pub state_slots: Vec<StateSlot>,
    /// Constant initializer, if the declaration had one.
    pub constant_initializer: Option<ConstantInit>,
}

impl VariableData {
    /// A variable with default qualifiers.
    pub fn new(name: &str, ty: Type, mode: VariableMode) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mode,
            qualifiers: VariableQualifiers {
                read_only: matches!(
                    mode,
                    VariableMode::ShaderIn | VariableMode::Uniform
                ),
                location: -1,
                index: -1,
                binding: -1,
                ..Default::default()
            },
            state_slots: Vec::new(),
            constant_initializer: None,
        }
    }
}
