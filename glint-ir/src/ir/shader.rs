//! The shader: root container and arena for the whole IR.

use crate::ir::entities::{
    Block, CfNode, FuncImpl, Function, IfNode, Inst, LoopNode, Overload, Reg, Type, Value, Variable,
};
use crate::ir::function::{
    BlockData, FunctionData, ImplData, IfData, LoopData, OverloadData, Param,
};
use crate::ir::instructions::{
    AluDest, AluInstr, AluSrc, CallInstr, ConstValue, Deref, Dest, InstData, InstNode,
    IntrinsicInstr, JumpInstr, JumpKind, LoadConstInstr, PhiInstr, PhiSrc, Src, SsaUndefInstr,
    TexInstr, TexKind, TexSrc, ValueData,
};
use crate::ir::intrinsics::Intrinsic;
use crate::ir::opcodes::Opcode;
use crate::ir::register::RegisterData;
use crate::ir::types::TypeStore;
use crate::ir::variable::{VariableData, VariableMode};
use core::ops::{Index, IndexMut};
use glint_entity::PrimaryMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// The root IR container.
///
/// The shader owns every object of the IR in per-class tables and acts as
/// the arena: objects are created by the factory methods below, unlinked on
/// removal, and only truly freed when the shader is dropped. All structural
/// mutation takes `&mut Shader`, which is what serializes passes.
pub struct Shader {
    /// The type interner.
    pub types: TypeStore,

    /// Uniform variables by declared name.
    pub uniforms: FxHashMap<String, Variable>,
    /// Shader inputs by declared name.
    pub inputs: FxHashMap<String, Variable>,
    /// Shader outputs by declared name.
    pub outputs: FxHashMap<String, Variable>,
    /// Shader globals by declared name.
    pub globals: FxHashMap<String, Variable>,

    /// All functions, in creation order.
    pub functions: PrimaryMap<Function, FunctionData>,
    /// Shader-wide registers, in creation order.
    pub global_regs: Vec<Reg>,
    /// Allocation counter for global register indices.
    reg_alloc: u32,

    overloads: PrimaryMap<Overload, OverloadData>,
    impls: PrimaryMap<FuncImpl, ImplData>,
    blocks: PrimaryMap<Block, BlockData>,
    ifs: PrimaryMap<IfNode, IfData>,
    loops: PrimaryMap<LoopNode, LoopData>,
    insts: PrimaryMap<Inst, InstNode>,
    values: PrimaryMap<Value, ValueData>,
    registers: PrimaryMap<Reg, RegisterData>,
    variables: PrimaryMap<Variable, VariableData>,
}

impl Shader {
    /// Create an empty shader.
    pub fn new() -> Self {
        Self {
            types: TypeStore::new(),
            uniforms: FxHashMap::default(),
            inputs: FxHashMap::default(),
            outputs: FxHashMap::default(),
            globals: FxHashMap::default(),
            functions: PrimaryMap::new(),
            global_regs: Vec::new(),
            reg_alloc: 0,
            overloads: PrimaryMap::new(),
            impls: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            ifs: PrimaryMap::new(),
            loops: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            values: PrimaryMap::new(),
            registers: PrimaryMap::new(),
            variables: PrimaryMap::new(),
        }
    }

    /// Create a function with the given name.
    pub fn create_function(&mut self, name: &str) -> Function {
        self.functions.push(FunctionData {
            name: name.to_string(),
            overloads: Vec::new(),
        })
    }

    /// Create a new overload of `function`, initially only declared. The
    /// return type starts out void.
    pub fn create_overload(&mut self, function: Function) -> Overload {
        let overload = self.overloads.push(OverloadData {
            function,
            params: Vec::new(),
            return_type: self.types.void(),
            imp: None,
        });
        self.functions[function].overloads.push(overload);
        overload
    }

    /// Append a parameter to an overload's signature.
    ///
    /// Only valid while the overload has no implementation yet.
    pub fn append_param(&mut self, overload: Overload, param: Param) {
        assert!(
            self.overloads[overload].imp.is_none(),
            "cannot change the signature of an implemented overload"
        );
        self.overloads[overload].params.push(param);
    }

    /// Set an overload's return type.
    ///
    /// Only valid while the overload has no implementation yet.
    pub fn set_return_type(&mut self, overload: Overload, ty: Type) {
        assert!(
            self.overloads[overload].imp.is_none(),
            "cannot change the signature of an implemented overload"
        );
        self.overloads[overload].return_type = ty;
    }

    /// Materialize the body of `overload`, which must not have one yet.
    ///
    /// The fresh implementation has `start_block` as its only body node and
    /// `end_block` held separately; control initially falls straight
    /// through from start to end.
    pub fn create_impl(&mut self, overload: Overload) -> FuncImpl {
        assert!(
            self.overloads[overload].imp.is_none(),
            "{} already has an implementation",
            overload
        );

        let imp = self.impls.next_key();
        let start_block = self.create_block();
        let end_block = self.create_block();
        self.blocks[start_block].parent = Some(CfNode::Impl(imp));
        self.blocks[end_block].parent = Some(CfNode::Impl(imp));

        self.blocks[start_block].successors[0] = end_block.into();
        self.blocks[end_block].predecessors.insert(start_block);

        let pushed = self.impls.push(ImplData {
            overload,
            body: vec![CfNode::Block(start_block)],
            start_block,
            end_block,
            locals: Vec::new(),
            params: Vec::new(),
            return_var: None,
            registers: Vec::new(),
            reg_alloc: 0,
        });
        debug_assert_eq!(pushed, imp);

        self.overloads[overload].imp = Some(imp);
        imp
    }

    /// Create a detached empty block.
    pub fn create_block(&mut self) -> Block {
        self.blocks.push(BlockData::new())
    }

    /// Create a detached `if` node with the given condition.
    ///
    /// Both branch lists start out holding one empty block. The condition's
    /// register use is recorded when the node is inserted into the tree.
    pub fn create_if(&mut self, condition: Src) -> IfNode {
        let node = self.ifs.next_key();
        let then_block = self.create_block();
        let else_block = self.create_block();
        self.blocks[then_block].parent = Some(CfNode::If(node));
        self.blocks[else_block].parent = Some(CfNode::If(node));

        let pushed = self.ifs.push(IfData {
            parent: None,
            condition,
            then_list: vec![CfNode::Block(then_block)],
            else_list: vec![CfNode::Block(else_block)],
        });
        debug_assert_eq!(pushed, node);
        node
    }

    /// Create a detached `loop` node.
    ///
    /// The body starts out holding one empty block whose single successor is
    /// itself: the back-edge exists from the moment of creation.
    pub fn create_loop(&mut self) -> LoopNode {
        let node = self.loops.next_key();
        let body_block = self.create_block();
        self.blocks[body_block].parent = Some(CfNode::Loop(node));
        self.blocks[body_block].successors[0] = body_block.into();
        self.blocks[body_block].predecessors.insert(body_block);

        let pushed = self.loops.push(LoopData {
            parent: None,
            body: vec![CfNode::Block(body_block)],
        });
        debug_assert_eq!(pushed, node);
        node
    }

    /// Create a shader-wide register.
    pub fn create_global_reg(&mut self) -> Reg {
        let index = self.reg_alloc;
        self.reg_alloc += 1;
        let reg = self.registers.push(RegisterData::new(index, true));
        self.global_regs.push(reg);
        reg
    }

    /// Create a register local to `imp`.
    pub fn create_local_reg(&mut self, imp: FuncImpl) -> Reg {
        let index = self.impls[imp].reg_alloc;
        self.impls[imp].reg_alloc += 1;
        let reg = self.registers.push(RegisterData::new(index, false));
        self.impls[imp].registers.push(reg);
        reg
    }

    /// Create a uniform, shader input, shader output, or global variable and
    /// enter it in the corresponding by-name table.
    pub fn create_shader_variable(
        &mut self,
        mode: VariableMode,
        name: &str,
        ty: Type,
    ) -> Variable {
        let var = self.variables.push(VariableData::new(name, ty, mode));
        let table = match mode {
            VariableMode::Uniform => &mut self.uniforms,
            VariableMode::ShaderIn => &mut self.inputs,
            VariableMode::ShaderOut => &mut self.outputs,
            VariableMode::Global => &mut self.globals,
            VariableMode::Local => panic!("local variables belong to a function impl"),
        };
        let prev = table.insert(name.to_string(), var);
        assert!(prev.is_none(), "duplicate shader variable \"{}\"", name);
        var
    }

    /// Create a variable local to `imp`.
    pub fn create_local_variable(&mut self, imp: FuncImpl, name: &str, ty: Type) -> Variable {
        let var = self
            .variables
            .push(VariableData::new(name, ty, VariableMode::Local));
        self.impls[imp].locals.push(var);
        var
    }

    /// Create a local variable backing the next parameter of `imp`'s
    /// signature. A parameter variable is also a local.
    pub fn create_param_variable(&mut self, imp: FuncImpl, name: &str, ty: Type) -> Variable {
        let var = self.create_local_variable(imp, name, ty);
        self.impls[imp].params.push(var);
        var
    }

    /// Create the local variable holding `imp`'s return value and register
    /// it as such.
    pub fn create_return_variable(&mut self, imp: FuncImpl, name: &str, ty: Type) -> Variable {
        let var = self.create_local_variable(imp, name, ty);
        assert!(
            self.impls[imp].return_var.is_none(),
            "{} already has a return variable",
            imp
        );
        self.impls[imp].return_var = Some(var);
        var
    }

    /// Create a detached SSA value of the given width.
    pub fn create_ssa_value(&mut self, num_components: u8) -> Value {
        assert!(
            (1..=4).contains(&num_components),
            "SSA width {} out of range",
            num_components
        );
        self.values.push(ValueData {
            num_components,
            parent_inst: None.into(),
            name: None,
        })
    }

    fn create_inst(&mut self, data: InstData) -> Inst {
        let inst = self.insts.push(InstNode::new(data));
        self.attach_ssa_defs(inst);
        inst
    }

    /// Record `inst` as the defining instruction of every SSA destination it
    /// carries. Each SSA value can be attached only once.
    fn attach_ssa_defs(&mut self, inst: Inst) {
        fn note(dest: &Dest, out: &mut SmallVec<[Value; 2]>) {
            if let Dest::Ssa(value) = dest {
                out.push(*value);
            }
        }

        let mut defined: SmallVec<[Value; 2]> = SmallVec::new();
        match &self.insts[inst].data {
            InstData::Alu(alu) => note(&alu.dest.dest, &mut defined),
            InstData::Intrinsic(intr) => {
                for dest in &intr.reg_outputs {
                    note(dest, &mut defined);
                }
            }
            InstData::LoadConst(lc) => note(&lc.dest, &mut defined),
            InstData::Phi(phi) => note(&phi.dest, &mut defined),
            InstData::Tex(tex) => note(&tex.dest, &mut defined),
            InstData::SsaUndef(undef) => defined.push(undef.def),
            InstData::Call(_) | InstData::Jump(_) => {}
        }
        for value in defined {
            assert!(
                self.values[value].parent_inst.is_none(),
                "{} is already defined by {}",
                value,
                self.values[value].parent_inst.unwrap()
            );
            self.values[value].parent_inst = inst.into();
        }
    }

    /// Create a detached ALU instruction. `srcs` must match the opcode's
    /// arity.
    pub fn alu_instr(&mut self, op: Opcode, dest: AluDest, srcs: Vec<AluSrc>) -> Inst {
        assert_eq!(
            srcs.len(),
            op.num_inputs(),
            "{} expects {} sources",
            op,
            op.num_inputs()
        );
        self.create_inst(InstData::Alu(AluInstr {
            op,
            dest,
            srcs: srcs.into(),
            predicate: None,
        }))
    }

    /// Create a detached call instruction. Parameter count must match the
    /// callee's signature.
    pub fn call_instr(
        &mut self,
        callee: Overload,
        params: Vec<Variable>,
        return_var: Option<Variable>,
    ) -> Inst {
        assert_eq!(
            params.len(),
            self.overloads[callee].params.len(),
            "{} expects {} parameters",
            callee,
            self.overloads[callee].params.len()
        );
        self.create_inst(InstData::Call(CallInstr {
            callee,
            params: params.into(),
            return_var,
            predicate: None,
        }))
    }

    /// Create a detached intrinsic instruction. Operand counts must match
    /// the intrinsic's table row.
    pub fn intrinsic_instr(
        &mut self,
        op: Intrinsic,
        reg_inputs: Vec<Src>,
        reg_outputs: Vec<Dest>,
        variables: Vec<Deref>,
        const_index: Option<u32>,
    ) -> Inst {
        let info = op.info();
        assert_eq!(reg_inputs.len(), info.num_reg_inputs as usize, "{}", op);
        assert_eq!(reg_outputs.len(), info.num_reg_outputs as usize, "{}", op);
        assert_eq!(variables.len(), info.num_variables as usize, "{}", op);
        assert_eq!(
            const_index.is_some(),
            info.has_const_index,
            "{} constant index mismatch",
            op
        );
        self.create_inst(InstData::Intrinsic(IntrinsicInstr {
            op,
            reg_inputs: reg_inputs.into(),
            reg_outputs: reg_outputs.into(),
            variables: variables.into(),
            const_index,
            predicate: None,
        }))
    }

    /// Create a detached immediate load.
    pub fn load_const_instr(&mut self, value: ConstValue, dest: Dest) -> Inst {
        self.create_inst(InstData::LoadConst(LoadConstInstr {
            value,
            dest,
            predicate: None,
        }))
    }

    /// Create a detached jump.
    pub fn jump_instr(&mut self, kind: JumpKind) -> Inst {
        self.create_inst(InstData::Jump(JumpInstr { kind }))
    }

    /// Create a detached undefined-SSA instruction, returning it together
    /// with the value it defines.
    pub fn ssa_undef_instr(&mut self, num_components: u8) -> (Inst, Value) {
        let def = self.create_ssa_value(num_components);
        let inst = self.create_inst(InstData::SsaUndef(SsaUndefInstr { def }));
        (inst, def)
    }

    /// Create a detached phi.
    pub fn phi_instr(&mut self, dest: Dest, srcs: Vec<PhiSrc>) -> Inst {
        self.create_inst(InstData::Phi(PhiInstr {
            dest,
            srcs: srcs.into(),
        }))
    }

    /// Create a detached texture instruction.
    pub fn tex_instr(
        &mut self,
        kind: TexKind,
        dest: Dest,
        srcs: Vec<TexSrc>,
        sampler: Option<Deref>,
    ) -> Inst {
        self.create_inst(InstData::Tex(TexInstr {
            kind,
            dest,
            srcs: srcs.into(),
            sampler,
            predicate: None,
        }))
    }

    /// Attach a predicate to a detached instruction.
    ///
    /// Must happen before insertion so the predicate participates in use
    /// bookkeeping. Jumps, phis, and undefined-SSA instructions cannot be
    /// predicated.
    pub fn set_predicate(&mut self, inst: Inst, pred: Src) {
        assert!(
            self.insts[inst].block.is_none(),
            "predicate must be set before {} is inserted",
            inst
        );
        let slot = match &mut self.insts[inst].data {
            InstData::Alu(alu) => &mut alu.predicate,
            InstData::Call(call) => &mut call.predicate,
            InstData::Intrinsic(intr) => &mut intr.predicate,
            InstData::LoadConst(lc) => &mut lc.predicate,
            InstData::Tex(tex) => &mut tex.predicate,
            InstData::Jump(_) | InstData::SsaUndef(_) | InstData::Phi(_) => {
                panic!("{} cannot be predicated", inst)
            }
        };
        *slot = Some(pred);
    }
}

impl Default for Shader {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! shader_index {
    ($key:ty, $table:ident, $value:ty) => {
        impl Index<$key> for Shader {
            type Output = $value;

            fn index(&self, k: $key) -> &$value {
                &self.$table[k]
            }
        }

        impl IndexMut<$key> for Shader {
            fn index_mut(&mut self, k: $key) -> &mut $value {
                &mut self.$table[k]
            }
        }
    };
}

shader_index!(Function, functions, FunctionData);
shader_index!(Overload, overloads, OverloadData);
shader_index!(FuncImpl, impls, ImplData);
shader_index!(Block, blocks, BlockData);
shader_index!(IfNode, ifs, IfData);
shader_index!(LoopNode, loops, LoopData);
shader_index!(Inst, insts, InstNode);
shader_index!(Value, values, ValueData);
shader_index!(Reg, registers, RegisterData);
shader_index!(Variable, variables, VariableData);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::entities::CfNode;

    #[test]
    fn fresh_impl_shape() {
        let mut shader = Shader::new();
        let func = shader.create_function("main");
        let overload = shader.create_overload(func);
        let imp = shader.create_impl(overload);

        let start = shader[imp].start_block;
        let end = shader[imp].end_block;
        assert_eq!(shader[imp].body, vec![CfNode::Block(start)]);
        assert_eq!(shader[start].successors[0].expand(), Some(end));
        assert!(shader[start].successors[1].is_none());
        assert!(shader[end].predecessors.contains(&start));
        assert!(shader[end].instrs.is_empty());
    }

    #[test]
    fn fresh_loop_has_back_edge() {
        let mut shader = Shader::new();
        let lp = shader.create_loop();
        let header = shader[lp].body[0].unwrap_block();
        assert_eq!(shader[header].successors[0].expand(), Some(header));
        assert!(shader[header].predecessors.contains(&header));
    }

    #[test]
    #[should_panic(expected = "already has an implementation")]
    fn double_impl_refused() {
        let mut shader = Shader::new();
        let func = shader.create_function("main");
        let overload = shader.create_overload(func);
        shader.create_impl(overload);
        shader.create_impl(overload);
    }

    #[test]
    fn register_indices_per_scope() {
        let mut shader = Shader::new();
        let func = shader.create_function("main");
        let overload = shader.create_overload(func);
        let imp = shader.create_impl(overload);

        let g0 = shader.create_global_reg();
        let g1 = shader.create_global_reg();
        let l0 = shader.create_local_reg(imp);
        let l1 = shader.create_local_reg(imp);

        assert_eq!(shader[g0].index, 0);
        assert_eq!(shader[g1].index, 1);
        assert_eq!(shader[l0].index, 0);
        assert_eq!(shader[l1].index, 1);
        assert!(shader[g0].is_global);
        assert!(!shader[l0].is_global);
        assert_eq!(shader.global_regs, vec![g0, g1]);
        assert_eq!(shader[imp].registers, vec![l0, l1]);
    }

    #[test]
    #[should_panic(expected = "expects 2 sources")]
    fn alu_arity_checked() {
        let mut shader = Shader::new();
        let reg = shader.create_global_reg();
        shader.alu_instr(Opcode::Iadd, AluDest::reg(reg), vec![AluSrc::reg(reg)]);
    }
}
