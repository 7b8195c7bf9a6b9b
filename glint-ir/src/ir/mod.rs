//! Representation of shader IR: entities, types, instructions, functions,
//! and the shader container that owns them all.

pub mod entities;
pub mod function;
pub mod instructions;
pub mod intrinsics;
pub mod opcodes;
pub mod register;
pub mod shader;
pub mod types;
pub mod variable;

pub use crate::ir::entities::{
    Block, CfNode, FuncImpl, Function, IfNode, Inst, LoopNode, Overload, Reg, Type, Value, Variable,
};
pub use crate::ir::function::{
    BlockData, FunctionData, IfData, ImplData, LoopData, OverloadData, Param, ParamMode,
};
pub use crate::ir::instructions::{
    AluDest, AluInstr, AluSrc, CallInstr, ConstValue, ConstVec, Deref, DerefLink, Dest, InstData,
    InstNode, IntrinsicInstr, JumpInstr, JumpKind, LoadConstInstr, PhiInstr, PhiSrc, RegRef, Src,
    SsaUndefInstr, TexInstr, TexKind, TexSrc, TexSrcKind, ValueData,
};
pub use crate::ir::intrinsics::{Intrinsic, IntrinsicFlags, IntrinsicInfo, INTRINSIC_INFO};
pub use crate::ir::opcodes::{OpInfo, Opcode, OPCODE_INFO};
pub use crate::ir::register::RegisterData;
pub use crate::ir::shader::Shader;
pub use crate::ir::types::{ScalarKind, SamplerDim, StructField, TypeData, TypeStore};
pub use crate::ir::variable::{
    ConstantInit, DepthLayout, Interpolation, StateSlot, VariableData, VariableMode,
    VariableQualifiers,
};
