//! Instruction variants and their operand types.
//!
//! Values flow through two kinds of storage: mutable registers (read through
//! [`Src`], written through [`Dest`], each optionally array-indexed with at
//! most one level of indirection) and immutable SSA values. ALU operands
//! additionally carry swizzles and modifiers. Variables are never named
//! directly by instructions; they are reached through [`Deref`] chains.
//!
//! Every discriminated object here is a tagged variant matched exhaustively;
//! there are no downcasts.

use crate::ir::entities::{Block, Inst, Overload, Reg, Type, Value, Variable};
use crate::ir::intrinsics::Intrinsic;
use crate::ir::opcodes::Opcode;
use glint_entity::packed_option::PackedOption;
use smallvec::SmallVec;

/// A register reference with optional array indexing.
///
/// `base_offset` selects the starting array element; `indirect`, when
/// present, adds a dynamically computed element index on top. An indirect
/// index is itself a [`Src`] and must not be indirect in turn.
#[derive(Clone, Debug)]
pub struct RegRef {
    /// The referenced register.
    pub reg: Reg,
    /// Dynamic array index, if any.
    pub indirect: Option<Box<Src>>,
    /// Constant array offset.
    pub base_offset: u32,
}

impl RegRef {
    /// A direct reference to the whole register.
    pub fn direct(reg: Reg) -> Self {
        Self {
            reg,
            indirect: None,
            base_offset: 0,
        }
    }
}

/// An instruction source operand.
#[derive(Clone, Debug)]
pub enum Src {
    /// Read of an SSA value.
    Ssa(Value),
    /// Read of a register.
    Reg(RegRef),
}

impl Src {
    /// A direct register read.
    pub fn reg(reg: Reg) -> Self {
        Self::Reg(RegRef::direct(reg))
    }

    /// A register read at a dynamic array index.
    pub fn reg_indirect(reg: Reg, indirect: Src, base_offset: u32) -> Self {
        Self::Reg(RegRef {
            reg,
            indirect: Some(Box::new(indirect)),
            base_offset,
        })
    }

    /// An SSA value read.
    pub fn ssa(value: Value) -> Self {
        Self::Ssa(value)
    }
}

/// An instruction destination operand.
#[derive(Clone, Debug)]
pub enum Dest {
    /// Definition of an SSA value.
    Ssa(Value),
    /// Write to a register.
    Reg(RegRef),
}

impl Dest {
    /// A direct register write.
    pub fn reg(reg: Reg) -> Self {
        Self::Reg(RegRef::direct(reg))
    }

    /// A register write at a dynamic array index.
    pub fn reg_indirect(reg: Reg, indirect: Src, base_offset: u32) -> Self {
        Self::Reg(RegRef {
            reg,
            indirect: Some(Box::new(indirect)),
            base_offset,
        })
    }

    /// An SSA definition.
    pub fn ssa(value: Value) -> Self {
        Self::Ssa(value)
    }
}

/// An ALU source: a [`Src`] plus swizzle and input modifiers.
#[derive(Clone, Debug)]
pub struct AluSrc {
    /// The underlying source.
    pub src: Src,
    /// Two's-complement / sign-bit negation, applied after `abs`.
    pub negate: bool,
    /// Clear the sign bit; only meaningful for float-interpreted inputs.
    pub abs: bool,
    /// For each written component, which component of the source to read.
    /// Entries not selected by the write mask are ignored.
    pub swizzle: [u8; 4],
}

impl AluSrc {
    /// Wrap a source with the identity swizzle and no modifiers.
    pub fn new(src: Src) -> Self {
        Self {
            src,
            negate: false,
            abs: false,
            swizzle: [0, 1, 2, 3],
        }
    }

    /// A plain register read.
    pub fn reg(reg: Reg) -> Self {
        Self::new(Src::reg(reg))
    }

    /// A plain SSA read.
    pub fn ssa(value: Value) -> Self {
        Self::new(Src::ssa(value))
    }

    /// Replace the swizzle.
    pub fn swizzled(mut self, swizzle: [u8; 4]) -> Self {
        self.swizzle = swizzle;
        self
    }
}

/// An ALU destination: a [`Dest`] plus output modifiers.
#[derive(Clone, Debug)]
pub struct AluDest {
    /// The underlying destination.
    pub dest: Dest,
    /// Clamp the result to [0.0, 1.0]; float outputs only.
    pub saturate: bool,
    /// Which of the destination's components are written. Ignored for SSA
    /// destinations.
    pub write_mask: u8,
}

impl AluDest {
    /// Wrap a destination with all components written and no saturation.
    pub fn new(dest: Dest) -> Self {
        Self {
            dest,
            saturate: false,
            write_mask: 0xf,
        }
    }

    /// A plain register write.
    pub fn reg(reg: Reg) -> Self {
        Self::new(Dest::reg(reg))
    }

    /// A plain SSA definition.
    pub fn ssa(value: Value) -> Self {
        Self::new(Dest::ssa(value))
    }

    /// Replace the write mask.
    pub fn masked(mut self, write_mask: u8) -> Self {
        debug_assert!(write_mask <= 0xf);
        self.write_mask = write_mask;
        self
    }
}

/// One link in a deref chain.
#[derive(Clone, Debug)]
pub enum DerefLink {
    /// Index into an array. `ty` is the array's element type.
    Array {
        /// Element index.
        index: Src,
        /// Type this link produces.
        ty: Type,
    },
    /// Select a struct field by name. `ty` is the field's type.
    Struct {
        /// Field name.
        field: String,
        /// Type this link produces.
        ty: Type,
    },
}

impl DerefLink {
    /// The type produced by applying this link.
    pub fn ty(&self) -> Type {
        match self {
            Self::Array { ty, .. } | Self::Struct { ty, .. } => *ty,
        }
    }
}

/// A variable-rooted access chain: the variable itself, then zero or more
/// array-index or struct-field links. Each link records the type it
/// produces, which the validator checks against the type system.
#[derive(Clone, Debug)]
pub struct Deref {
    /// The root variable.
    pub var: Variable,
    /// The root's type, which must equal the variable's declared type.
    pub var_type: Type,
    /// The access links, outermost first.
    pub chain: Vec<DerefLink>,
}

impl Deref {
    /// A whole-variable deref with no links.
    pub fn var(var: Variable, var_type: Type) -> Self {
        Self {
            var,
            var_type,
            chain: Vec::new(),
        }
    }

    /// The type of the accessed location: the last link's type, or the
    /// variable's own type for a bare deref.
    pub fn result_type(&self) -> Type {
        self.chain.last().map(|l| l.ty()).unwrap_or(self.var_type)
    }
}

/// A four-lane immediate stored as raw 32-bit patterns.
///
/// The interpretation (float, signed, unsigned) belongs to the consuming
/// opcode, so the lanes are kept as bits and reinterpreted on access.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct ConstVec {
    bits: [u32; 4],
}

impl ConstVec {
    /// Build from raw bit patterns.
    pub fn from_bits(bits: [u32; 4]) -> Self {
        Self { bits }
    }

    /// Build from four floats.
    pub fn from_f32(v: [f32; 4]) -> Self {
        Self {
            bits: v.map(f32::to_bits),
        }
    }

    /// Build from four signed integers.
    pub fn from_i32(v: [i32; 4]) -> Self {
        Self {
            bits: v.map(|x| x as u32),
        }
    }

    /// Build from four unsigned integers.
    pub fn from_u32(v: [u32; 4]) -> Self {
        Self { bits: v }
    }

    /// Splat a single unsigned value across lane 0, zeroing the rest.
    pub fn scalar_u32(x: u32) -> Self {
        Self {
            bits: [x, 0, 0, 0],
        }
    }

    /// Splat a single signed value across lane 0, zeroing the rest.
    pub fn scalar_i32(x: i32) -> Self {
        Self::scalar_u32(x as u32)
    }

    /// Lane `i` as raw bits.
    pub fn u(self, i: usize) -> u32 {
        self.bits[i]
    }

    /// Lane `i` as a signed integer.
    pub fn i(self, i: usize) -> i32 {
        self.bits[i] as i32
    }

    /// Lane `i` as a float.
    pub fn f(self, i: usize) -> f32 {
        f32::from_bits(self.bits[i])
    }
}

/// The immediate payload of a `load_const`.
#[derive(Clone, Debug)]
pub enum ConstValue {
    /// A single immediate vector.
    Vector(ConstVec),
    /// An immediate array of vectors, stored into consecutive array
    /// elements of a register destination.
    Array(Vec<ConstVec>),
}

/// The three jump kinds.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum JumpKind {
    /// Return from the function; jumps to the implementation's end block.
    Return,
    /// Exit the innermost enclosing loop.
    Break,
    /// Re-enter the innermost enclosing loop's header.
    Continue,
}

/// One incoming edge of a phi.
#[derive(Clone, Debug)]
pub struct PhiSrc {
    /// The predecessor block this source is taken from.
    pub pred: Block,
    /// The value selected when control arrives from `pred`.
    pub src: Src,
}

/// Texture instruction kinds.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TexKind {
    /// Implicit-LOD sample.
    Tex,
    /// Sample with an LOD bias source.
    TexBias,
    /// Sample with an explicit LOD source.
    TexLod,
    /// Texel fetch with integer coordinates.
    TexFetch,
}

/// The role of one texture instruction source. No two sources of one
/// instruction may share a role.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TexSrcKind {
    /// Texture coordinate.
    Coord,
    /// Projective divisor.
    Projector,
    /// Shadow comparator.
    Comparator,
    /// Constant texel offset.
    Offset,
    /// LOD bias.
    Bias,
    /// Explicit LOD.
    Lod,
}

/// One texture instruction source with its role.
#[derive(Clone, Debug)]
pub struct TexSrc {
    /// What this source means to the sampler.
    pub kind: TexSrcKind,
    /// The value itself.
    pub src: Src,
}

/// An ALU instruction: an opcode, one destination, and as many sources as
/// the opcode's arity.
#[derive(Clone, Debug)]
pub struct AluInstr {
    /// The opcode.
    pub op: Opcode,
    /// Destination with output modifiers.
    pub dest: AluDest,
    /// Sources with swizzles and input modifiers; length equals the
    /// opcode's arity.
    pub srcs: SmallVec<[AluSrc; 4]>,
    /// Optional predicate; the write only happens where it is true.
    pub predicate: Option<Src>,
}

/// A call to a function overload. Arguments and results travel through
/// variables, not registers.
#[derive(Clone, Debug)]
pub struct CallInstr {
    /// The callee signature.
    pub callee: Overload,
    /// One variable per parameter, in signature order.
    pub params: SmallVec<[Variable; 4]>,
    /// Variable receiving the return value; absent for void callees.
    pub return_var: Option<Variable>,
    /// Optional predicate.
    pub predicate: Option<Src>,
}

/// An intrinsic instruction. Operand counts and widths are dictated by the
/// intrinsic's table row.
#[derive(Clone, Debug)]
pub struct IntrinsicInstr {
    /// Which intrinsic.
    pub op: Intrinsic,
    /// Register/SSA inputs.
    pub reg_inputs: SmallVec<[Src; 4]>,
    /// Register/SSA outputs.
    pub reg_outputs: SmallVec<[Dest; 2]>,
    /// Variable operands.
    pub variables: SmallVec<[Deref; 2]>,
    /// 32-bit constant index, present iff the table says so.
    pub const_index: Option<u32>,
    /// Optional predicate.
    pub predicate: Option<Src>,
}

/// An immediate load.
#[derive(Clone, Debug)]
pub struct LoadConstInstr {
    /// The immediate payload.
    pub value: ConstValue,
    /// Where it lands.
    pub dest: Dest,
    /// Optional predicate.
    pub predicate: Option<Src>,
}

/// A jump: `return`, `break`, or `continue`. Always the last instruction of
/// its block.
#[derive(Clone, Debug)]
pub struct JumpInstr {
    /// Which jump.
    pub kind: JumpKind,
}

/// Defines an SSA value in an undefined state.
#[derive(Clone, Debug)]
pub struct SsaUndefInstr {
    /// The defined value.
    pub def: Value,
}

/// A phi: selects a value according to the predecessor control arrived
/// from. Phis appear before all non-phi instructions of their block, and
/// carry one source per predecessor.
#[derive(Clone, Debug)]
pub struct PhiInstr {
    /// The merged destination.
    pub dest: Dest,
    /// One source per predecessor block.
    pub srcs: SmallVec<[PhiSrc; 2]>,
}

/// A texture sampling instruction.
#[derive(Clone, Debug)]
pub struct TexInstr {
    /// The sampling operation.
    pub kind: TexKind,
    /// Destination for the sampled texel.
    pub dest: Dest,
    /// Typed sources; at most one per [`TexSrcKind`].
    pub srcs: SmallVec<[TexSrc; 4]>,
    /// The sampler being read, if resolved to a variable.
    pub sampler: Option<Deref>,
    /// Optional predicate.
    pub predicate: Option<Src>,
}

/// The tagged union of all instruction variants.
#[derive(Clone, Debug)]
pub enum InstData {
    /// ALU operation.
    Alu(AluInstr),
    /// Function call.
    Call(CallInstr),
    /// Intrinsic.
    Intrinsic(IntrinsicInstr),
    /// Immediate load.
    LoadConst(LoadConstInstr),
    /// Jump.
    Jump(JumpInstr),
    /// Undefined SSA definition.
    SsaUndef(SsaUndefInstr),
    /// Phi.
    Phi(PhiInstr),
    /// Texture sample.
    Tex(TexInstr),
}

impl InstData {
    /// Is this a jump?
    pub fn is_jump(&self) -> bool {
        matches!(self, Self::Jump(_))
    }

    /// Is this a phi?
    pub fn is_phi(&self) -> bool {
        matches!(self, Self::Phi(_))
    }
}

/// An instruction together with its position bookkeeping: the block it
/// currently lives in, if any.
pub struct InstNode {
    /// The instruction payload.
    pub data: InstData,
    /// Owning block; none while the instruction is detached.
    pub block: PackedOption<Block>,
}

impl InstNode {
    /// A detached instruction.
    pub fn new(data: InstData) -> Self {
        Self {
            data,
            block: None.into(),
        }
    }
}

/// An SSA value definition: its width, where it is defined, and a debug
/// name.
pub struct ValueData {
    /// Number of components, 1–4.
    pub num_components: u8,
    /// The defining instruction; none until the value is attached to a
    /// destination.
    pub parent_inst: PackedOption<Inst>,
    /// Only for debug purposes, may be empty.
    pub name: Option<String>,
}
