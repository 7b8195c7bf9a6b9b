//! The structural validator.
//!
//! Walks an entire shader and checks every structural, referential, and
//! bookkeeping invariant the builder is supposed to maintain. Any failure is
//! a bug in the compiler, not a user diagnostic, so failures abort via
//! `panic!` with a message naming the violated invariant.
//!
//! Register bookkeeping is verified by reconstruction: the validator builds
//! its own use/def/if-use multisets while walking and requires exact
//! equality with the stored ones afterwards, so both missing and stale
//! entries are caught.

use crate::ir::entities::{Block, CfNode, FuncImpl, IfNode, Inst, LoopNode, Reg, Value, Variable};
use crate::ir::function::Param;
use crate::ir::instructions::{
    AluDest, AluInstr, AluSrc, CallInstr, ConstValue, Deref, DerefLink, Dest, InstData,
    IntrinsicInstr, LoadConstInstr, PhiInstr, RegRef, Src, TexInstr,
};
use crate::ir::variable::VariableMode;
use crate::ir::Shader;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Validate every invariant of `shader`, panicking on the first violation.
pub fn validate_shader(shader: &Shader) {
    log::debug!("validating shader");
    let mut state = Validator::new(shader);

    for (name, &var) in shader
        .uniforms
        .iter()
        .chain(shader.inputs.iter())
        .chain(shader.outputs.iter())
        .chain(shader.globals.iter())
    {
        assert_eq!(
            &shader[var].name, name,
            "variable table key does not match the variable's name"
        );
        state.validate_var_decl(var, true);
    }

    for &reg in &shader.global_regs {
        state.prevalidate_reg_decl(reg, None);
    }

    for (func, data) in shader.functions.iter() {
        for &overload in &data.overloads {
            assert_eq!(
                shader[overload].function, func,
                "{} does not point back to {}",
                overload, func
            );
            if let Some(imp) = shader[overload].imp {
                state.validate_impl(imp);
            }
        }
    }

    for &reg in &shader.global_regs {
        state.postvalidate_reg_decl(reg);
    }
}

/// Expected bookkeeping for one register, rebuilt during the walk.
struct RegState {
    uses: BTreeMap<Inst, u32>,
    defs: BTreeMap<Inst, u32>,
    if_uses: BTreeMap<IfNode, u32>,
    /// The implementation owning the register; `None` for globals.
    where_defined: Option<FuncImpl>,
}

impl RegState {
    fn new(where_defined: Option<FuncImpl>) -> Self {
        Self {
            uses: BTreeMap::new(),
            defs: BTreeMap::new(),
            if_uses: BTreeMap::new(),
            where_defined,
        }
    }
}

struct Validator<'a> {
    shader: &'a Shader,
    regs: FxHashMap<Reg, RegState>,
    ssa_defs: FxHashMap<Value, FuncImpl>,
    var_defs: FxHashMap<Variable, FuncImpl>,
    /// The instruction currently being validated.
    inst: Inst,
    /// The block currently being validated.
    block: Block,
    /// The expected parent of the node currently being visited.
    parent: CfNode,
    /// The implementation currently being validated.
    imp: FuncImpl,
}

impl<'a> Validator<'a> {
    fn new(shader: &'a Shader) -> Self {
        Self {
            shader,
            regs: FxHashMap::default(),
            ssa_defs: FxHashMap::default(),
            var_defs: FxHashMap::default(),
            inst: Inst::from_u32(0),
            block: Block::from_u32(0),
            parent: CfNode::Impl(FuncImpl::from_u32(0)),
            imp: FuncImpl::from_u32(0),
        }
    }

    // ------------------------------------------------------------------
    // Declarations.

    fn validate_var_decl(&mut self, var: Variable, is_global: bool) {
        let shader = self.shader;
        assert_ne!(
            is_global,
            shader[var].mode == VariableMode::Local,
            "{} has the wrong mode for its scope",
            var
        );
        if !is_global {
            self.var_defs.insert(var, self.imp);
        }
    }

    fn prevalidate_reg_decl(&mut self, reg: Reg, where_defined: Option<FuncImpl>) {
        let shader = self.shader;
        assert_eq!(
            shader[reg].is_global,
            where_defined.is_none(),
            "{} has the wrong scope flag",
            reg
        );
        assert!(
            (1..=4).contains(&shader[reg].num_components),
            "{} has {} components",
            reg,
            shader[reg].num_components
        );
        let prev = self.regs.insert(reg, RegState::new(where_defined));
        assert!(prev.is_none(), "{} declared twice", reg);
    }

    fn postvalidate_reg_decl(&mut self, reg: Reg) {
        let shader = self.shader;
        let reg_state = &self.regs[&reg];
        assert!(
            shader[reg].uses == reg_state.uses,
            "stale entries in {}'s uses",
            reg
        );
        assert!(
            shader[reg].defs == reg_state.defs,
            "stale entries in {}'s defs",
            reg
        );
        assert!(
            shader[reg].if_uses == reg_state.if_uses,
            "stale entries in {}'s if_uses",
            reg
        );
    }

    // ------------------------------------------------------------------
    // Function implementations.

    fn validate_impl(&mut self, imp: FuncImpl) {
        let shader = self.shader;
        let data = &shader[imp];

        assert_eq!(
            shader[data.overload].imp,
            Some(imp),
            "{} does not point back to {}",
            data.overload,
            imp
        );

        let sig: &[Param] = &shader[data.overload].params;
        assert_eq!(
            data.params.len(),
            sig.len(),
            "{} has the wrong number of parameter variables",
            imp
        );
        for (var, param) in data.params.iter().zip(sig) {
            assert_eq!(
                shader[*var].ty, param.ty,
                "parameter variable {} does not match the signature",
                var
            );
        }

        let return_type = shader[data.overload].return_type;
        match data.return_var {
            None => assert!(
                shader.types.is_void(return_type),
                "{} returns a value but has no return variable",
                imp
            ),
            Some(var) => assert_eq!(
                shader[var].ty, return_type,
                "return variable type does not match the signature"
            ),
        }

        assert!(
            shader[data.end_block].instrs.is_empty(),
            "end block of {} is not empty",
            imp
        );
        assert!(
            shader[data.end_block].successors[0].is_none()
                && shader[data.end_block].successors[1].is_none(),
            "end block of {} has successors",
            imp
        );
        assert_eq!(
            shader[data.end_block].parent,
            Some(CfNode::Impl(imp)),
            "end block of {} has the wrong parent",
            imp
        );
        assert_eq!(
            data.body.first(),
            Some(&CfNode::Block(data.start_block)),
            "start block of {} is not the first body node",
            imp
        );

        self.imp = imp;
        self.parent = CfNode::Impl(imp);

        for &var in &data.locals {
            self.validate_var_decl(var, false);
        }
        for &reg in &data.registers {
            self.prevalidate_reg_decl(reg, Some(imp));
        }

        self.validate_cf_list(&data.body, CfNode::Impl(imp));

        for &reg in &data.registers {
            self.postvalidate_reg_decl(reg);
        }
    }

    // ------------------------------------------------------------------
    // Control flow.

    fn validate_cf_list(&mut self, nodes: &[CfNode], parent: CfNode) {
        assert!(!nodes.is_empty(), "control-flow list under {} is empty", parent);
        for pair in nodes.windows(2) {
            assert!(
                !(pair[0].is_block() && pair[1].is_block()),
                "{} and {} are adjacent blocks",
                pair[0],
                pair[1]
            );
        }
        let old_parent = self.parent;
        self.parent = parent;
        for &node in nodes {
            self.validate_cf_node(node);
        }
        self.parent = old_parent;
    }

    fn validate_cf_node(&mut self, node: CfNode) {
        assert_eq!(
            self.shader.cf_parent(node),
            Some(self.parent),
            "{} has the wrong parent",
            node
        );
        match node {
            CfNode::Block(block) => self.validate_block(block),
            CfNode::If(iff) => self.validate_if(iff),
            CfNode::Loop(lp) => self.validate_loop(lp),
            CfNode::Impl(_) => panic!("a function node inside a control-flow list"),
        }
    }

    fn validate_block(&mut self, block: Block) {
        let shader = self.shader;
        self.block = block;

        let instrs = &shader[block].instrs;
        for (i, &inst) in instrs.iter().enumerate() {
            if shader[inst].data.is_phi() {
                assert!(
                    i == 0 || shader[instrs[i - 1]].data.is_phi(),
                    "phi {} does not precede all non-phi instructions",
                    inst
                );
            }
            if shader[inst].data.is_jump() {
                assert_eq!(
                    i,
                    instrs.len() - 1,
                    "jump {} is not the last instruction of {}",
                    inst,
                    block
                );
            }
            self.validate_instr(inst);
        }

        assert!(
            shader[block].successors[0].is_some(),
            "{} has no successors",
            block
        );

        for slot in 0..2 {
            if let Some(succ) = shader[block].successors[slot].expand() {
                assert!(
                    shader[succ].predecessors.contains(&block),
                    "{} missing from {}'s predecessors",
                    block,
                    succ
                );
                self.validate_phi_srcs(block, succ);
            }
        }
        for &pred in &shader[block].predecessors {
            assert!(
                shader[pred].successors.iter().any(|s| s.expand() == Some(block)),
                "{} missing from {}'s successors",
                block,
                pred
            );
        }

        if instrs
            .last()
            .is_some_and(|&inst| shader[inst].data.is_jump())
        {
            assert!(
                shader[block].successors[1].is_none(),
                "jump block {} has two successors",
                block
            );
        }
    }

    fn validate_if(&mut self, iff: IfNode) {
        let shader = self.shader;

        let prev = shader
            .cf_prev(CfNode::If(iff))
            .unwrap_or_else(|| panic!("{} has no preceding node", iff));
        let prev_block = prev.unwrap_block();
        let first_then = shader[iff].then_list[0].unwrap_block();
        let first_else = shader[iff].else_list[0].unwrap_block();
        assert_eq!(
            shader[prev_block].successors[0].expand(),
            Some(first_then),
            "{} does not branch into {}'s then list",
            prev_block,
            iff
        );
        assert_eq!(
            shader[prev_block].successors[1].expand(),
            Some(first_else),
            "{} does not branch into {}'s else list",
            prev_block,
            iff
        );

        let next = shader
            .cf_next(CfNode::If(iff))
            .unwrap_or_else(|| panic!("{} has no following node", iff));
        assert!(next.is_block(), "{} is not followed by a block", iff);

        self.validate_if_condition(iff);

        self.validate_cf_list(&shader[iff].then_list, CfNode::If(iff));
        self.validate_cf_list(&shader[iff].else_list, CfNode::If(iff));
    }

    /// The condition is a source owned by the `if` node rather than by an
    /// instruction; its register read is tracked in `if_uses`.
    fn validate_if_condition(&mut self, iff: IfNode) {
        let shader = self.shader;
        match &shader[iff].condition {
            Src::Ssa(value) => self.validate_ssa_use(*value),
            Src::Reg(reg_ref) => {
                let reg = reg_ref.reg;
                assert!(
                    shader[reg].if_uses.contains_key(&iff),
                    "condition use of {} not in {}'s if_uses",
                    iff,
                    reg
                );
                let reg_state = self
                    .regs
                    .get_mut(&reg)
                    .unwrap_or_else(|| panic!("{} is not declared", reg));
                *reg_state.if_uses.entry(iff).or_insert(0) += 1;
                if !shader[reg].is_global {
                    assert_eq!(
                        reg_state.where_defined,
                        Some(self.imp),
                        "using a register declared in a different function"
                    );
                }
                self.check_reg_bounds(reg_ref);
            }
        }
    }

    fn validate_loop(&mut self, lp: LoopNode) {
        let shader = self.shader;

        let prev = shader
            .cf_prev(CfNode::Loop(lp))
            .unwrap_or_else(|| panic!("{} has no preceding node", lp));
        let prev_block = prev.unwrap_block();
        let header = shader[lp].body[0].unwrap_block();
        assert_eq!(
            shader[prev_block].successors[0].expand(),
            Some(header),
            "{} does not fall into {}'s header",
            prev_block,
            lp
        );
        assert!(
            shader[prev_block].successors[1].is_none(),
            "{} branches around {}",
            prev_block,
            lp
        );

        let next = shader
            .cf_next(CfNode::Loop(lp))
            .unwrap_or_else(|| panic!("{} has no following node", lp));
        assert!(next.is_block(), "{} is not followed by a block", lp);

        self.validate_cf_list(&shader[lp].body, CfNode::Loop(lp));
    }

    // ------------------------------------------------------------------
    // Instructions.

    fn validate_instr(&mut self, inst: Inst) {
        let shader = self.shader;
        assert_eq!(
            shader[inst].block.expand(),
            Some(self.block),
            "{} does not point back to {}",
            inst,
            self.block
        );
        self.inst = inst;

        match &shader[inst].data {
            InstData::Alu(alu) => self.validate_alu(alu),
            InstData::Call(call) => self.validate_call(call),
            InstData::Intrinsic(intr) => self.validate_intrinsic(intr),
            InstData::LoadConst(lc) => self.validate_load_const(lc),
            InstData::Jump(_) => {}
            InstData::SsaUndef(undef) => self.validate_ssa_def(undef.def),
            InstData::Phi(phi) => self.validate_phi(phi),
            InstData::Tex(tex) => self.validate_tex(tex),
        }
    }

    fn validate_alu(&mut self, alu: &AluInstr) {
        assert_eq!(
            alu.srcs.len(),
            alu.op.num_inputs(),
            "{} has the wrong number of sources",
            alu.op
        );
        self.validate_alu_dest(&alu.dest);
        for src in &alu.srcs {
            self.validate_alu_src(src);
        }
        if let Some(pred) = &alu.predicate {
            self.validate_src(pred);
        }
    }

    fn validate_alu_dest(&mut self, dest: &AluDest) {
        let shader = self.shader;
        let dest_size = match &dest.dest {
            Dest::Ssa(value) => shader[*value].num_components,
            Dest::Reg(reg_ref) => shader[reg_ref.reg].num_components,
        };
        // The write mask may not name components the destination lacks.
        assert!(
            dest.write_mask & !((1u8 << dest_size) - 1) == 0,
            "write mask {:#06b} writes outside a {}-component destination",
            dest.write_mask,
            dest_size
        );
        self.validate_dest(&dest.dest);
    }

    fn validate_alu_src(&mut self, src: &AluSrc) {
        for &component in &src.swizzle {
            assert!(component < 4, "swizzle component {} out of range", component);
        }
        self.validate_src(&src.src);
    }

    fn validate_call(&mut self, call: &CallInstr) {
        let shader = self.shader;
        let callee = &shader[call.callee];

        match call.return_var {
            None => assert!(
                shader.types.is_void(callee.return_type),
                "call to non-void {} has no return variable",
                call.callee
            ),
            Some(var) => {
                assert_eq!(
                    shader[var].ty, callee.return_type,
                    "return variable type does not match {}",
                    call.callee
                );
                self.validate_var_use(var);
            }
        }

        assert_eq!(
            call.params.len(),
            callee.params.len(),
            "call passes the wrong number of parameters to {}",
            call.callee
        );
        for (var, param) in call.params.iter().zip(&callee.params) {
            assert_eq!(
                shader[*var].ty, param.ty,
                "parameter {} does not match {}'s signature",
                var, call.callee
            );
            self.validate_var_use(*var);
        }

        if let Some(pred) = &call.predicate {
            self.validate_src(pred);
        }
    }

    fn validate_intrinsic(&mut self, intr: &IntrinsicInstr) {
        let info = intr.op.info();
        assert_eq!(
            intr.reg_inputs.len(),
            info.num_reg_inputs as usize,
            "{} has the wrong number of register inputs",
            intr.op
        );
        assert_eq!(
            intr.reg_outputs.len(),
            info.num_reg_outputs as usize,
            "{} has the wrong number of register outputs",
            intr.op
        );
        assert_eq!(
            intr.variables.len(),
            info.num_variables as usize,
            "{} has the wrong number of variable operands",
            intr.op
        );
        assert_eq!(
            intr.const_index.is_some(),
            info.has_const_index,
            "{} constant index mismatch",
            intr.op
        );

        for src in &intr.reg_inputs {
            self.validate_src(src);
        }
        for dest in &intr.reg_outputs {
            self.validate_dest(dest);
        }
        for deref in &intr.variables {
            self.validate_deref(deref);
        }
        if let Some(pred) = &intr.predicate {
            self.validate_src(pred);
        }
    }

    fn validate_load_const(&mut self, lc: &LoadConstInstr) {
        let shader = self.shader;
        self.validate_dest(&lc.dest);

        if let ConstValue::Array(elems) = &lc.value {
            match &lc.dest {
                Dest::Ssa(_) => panic!("array immediate with an SSA destination"),
                Dest::Reg(reg_ref) => {
                    assert!(
                        reg_ref.base_offset as usize + elems.len()
                            <= shader[reg_ref.reg].num_array_elems as usize,
                        "array immediate overruns {}",
                        reg_ref.reg
                    );
                }
            }
        }

        if let Some(pred) = &lc.predicate {
            self.validate_src(pred);
        }
    }

    fn validate_phi(&mut self, phi: &PhiInstr) {
        // Sources are validated lazily from the predecessor side, so an SSA
        // source is only checked once its defining block has been seen.
        self.validate_dest(&phi.dest);
        assert_eq!(
            phi.srcs.len(),
            self.shader[self.block].predecessors.len(),
            "phi source count does not match {}'s predecessor count",
            self.block
        );
    }

    fn validate_phi_srcs(&mut self, block: Block, succ: Block) {
        let shader = self.shader;
        let old_inst = self.inst;
        for &inst in &shader[succ].instrs {
            let phi = match &shader[inst].data {
                InstData::Phi(phi) => phi,
                _ => break,
            };
            let src = phi
                .srcs
                .iter()
                .find(|src| src.pred == block)
                .unwrap_or_else(|| panic!("{} has no source for predecessor {}", inst, block));
            self.inst = inst;
            self.validate_src(&src.src);
        }
        self.inst = old_inst;
    }

    fn validate_tex(&mut self, tex: &TexInstr) {
        let shader = self.shader;
        self.validate_dest(&tex.dest);

        let mut seen = [false; 6];
        for src in &tex.srcs {
            let slot = src.kind as usize;
            assert!(
                !seen[slot],
                "duplicate {:?} source on a texture instruction",
                src.kind
            );
            seen[slot] = true;
            self.validate_src(&src.src);
        }

        if let Some(sampler) = &tex.sampler {
            self.validate_deref(sampler);
            assert!(
                shader.types.is_sampler(sampler.result_type()),
                "texture sampler deref does not end in a sampler type"
            );
        }

        if let Some(pred) = &tex.predicate {
            self.validate_src(pred);
        }
    }

    // ------------------------------------------------------------------
    // Operands.

    fn validate_src(&mut self, src: &Src) {
        match src {
            Src::Ssa(value) => self.validate_ssa_use(*value),
            Src::Reg(reg_ref) => self.validate_reg_src(reg_ref),
        }
    }

    fn validate_reg_src(&mut self, reg_ref: &RegRef) {
        let shader = self.shader;
        let reg = reg_ref.reg;

        assert!(
            shader[reg].uses.contains_key(&self.inst),
            "use not in {}'s uses",
            reg
        );
        let inst = self.inst;
        let reg_state = self
            .regs
            .get_mut(&reg)
            .unwrap_or_else(|| panic!("{} is not declared", reg));
        *reg_state.uses.entry(inst).or_insert(0) += 1;

        if !shader[reg].is_global {
            assert_eq!(
                reg_state.where_defined,
                Some(self.imp),
                "using a register declared in a different function"
            );
        }

        self.check_reg_bounds(reg_ref);
        if let Some(indirect) = &reg_ref.indirect {
            self.validate_indirect(indirect);
        }
    }

    fn validate_reg_dest(&mut self, reg_ref: &RegRef) {
        let shader = self.shader;
        let reg = reg_ref.reg;

        assert!(
            shader[reg].defs.contains_key(&self.inst),
            "definition not in {}'s defs",
            reg
        );
        let inst = self.inst;
        let reg_state = self
            .regs
            .get_mut(&reg)
            .unwrap_or_else(|| panic!("{} is not declared", reg));
        *reg_state.defs.entry(inst).or_insert(0) += 1;

        if !shader[reg].is_global {
            assert_eq!(
                reg_state.where_defined,
                Some(self.imp),
                "writing to a register declared in a different function"
            );
        }

        self.check_reg_bounds(reg_ref);
        if let Some(indirect) = &reg_ref.indirect {
            self.validate_indirect(indirect);
        }
    }

    fn check_reg_bounds(&self, reg_ref: &RegRef) {
        let shader = self.shader;
        let reg = reg_ref.reg;
        assert!(
            shader[reg].num_array_elems == 0
                || reg_ref.base_offset < shader[reg].num_array_elems,
            "definitely out-of-bounds array access of {}",
            reg
        );
        if reg_ref.indirect.is_some() {
            assert!(
                shader[reg].num_array_elems != 0,
                "indirect access of non-array {}",
                reg
            );
        }
    }

    fn validate_indirect(&mut self, indirect: &Src) {
        if let Src::Reg(inner) = indirect {
            assert!(
                inner.indirect.is_none(),
                "only one level of indirection allowed"
            );
        }
        self.validate_src(indirect);
    }

    fn validate_ssa_use(&mut self, value: Value) {
        let imp = *self
            .ssa_defs
            .get(&value)
            .unwrap_or_else(|| panic!("use of undefined SSA value {}", value));
        assert_eq!(
            imp, self.imp,
            "using an SSA value defined in a different function"
        );
    }

    fn validate_ssa_def(&mut self, value: Value) {
        let shader = self.shader;
        assert!(
            (1..=4).contains(&shader[value].num_components),
            "{} has {} components",
            value,
            shader[value].num_components
        );
        assert_eq!(
            shader[value].parent_inst.expand(),
            Some(self.inst),
            "{} does not point back to its defining instruction",
            value
        );
        let prev = self.ssa_defs.insert(value, self.imp);
        assert!(prev.is_none(), "{} is defined twice", value);
    }

    fn validate_dest(&mut self, dest: &Dest) {
        match dest {
            Dest::Ssa(value) => self.validate_ssa_def(*value),
            Dest::Reg(reg_ref) => self.validate_reg_dest(reg_ref),
        }
    }

    // ------------------------------------------------------------------
    // Variables and derefs.

    fn validate_var_use(&mut self, var: Variable) {
        let shader = self.shader;
        if shader[var].mode == VariableMode::Local {
            let imp = *self
                .var_defs
                .get(&var)
                .unwrap_or_else(|| panic!("use of undeclared local {}", var));
            assert_eq!(
                imp, self.imp,
                "using a local variable declared in a different function"
            );
        }
    }

    fn validate_deref(&mut self, deref: &Deref) {
        let shader = self.shader;
        assert_eq!(
            deref.var_type, shader[deref.var].ty,
            "deref root type does not match {}",
            deref.var
        );
        self.validate_var_use(deref.var);

        let mut ty = deref.var_type;
        for link in &deref.chain {
            match link {
                DerefLink::Array { ty: link_ty, .. } => {
                    let elem = shader
                        .types
                        .array_element(ty)
                        .unwrap_or_else(|| panic!("array deref of a non-array type"));
                    assert_eq!(*link_ty, elem, "array deref link has the wrong type");
                    ty = elem;
                }
                DerefLink::Struct { field, ty: link_ty } => {
                    let field_ty = shader
                        .types
                        .struct_field(ty, field)
                        .unwrap_or_else(|| panic!("struct deref of missing field \"{}\"", field));
                    assert_eq!(*link_ty, field_ty, "struct deref link has the wrong type");
                    ty = field_ty;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CfList;
    use crate::ir::function::{Param, ParamMode};
    use crate::ir::instructions::{AluSrc, ConstVec, PhiSrc, TexKind, TexSrc, TexSrcKind};
    use crate::ir::opcodes::Opcode;
    use crate::ir::types::SamplerDim;
    use crate::ir::Intrinsic;

    fn empty_main(shader: &mut Shader) -> FuncImpl {
        let func = shader.create_function("main");
        let overload = shader.create_overload(func);
        shader.create_impl(overload)
    }

    fn scalar_reg(shader: &mut Shader, imp: FuncImpl) -> Reg {
        let reg = shader.create_local_reg(imp);
        shader[reg].num_components = 1;
        reg
    }

    #[test]
    #[should_panic(expected = "writes outside")]
    fn oversized_write_mask_caught() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let reg = scalar_reg(&mut shader, imp);

        // Default write mask is 0b1111; the destination has one component.
        let mov = shader.alu_instr(
            Opcode::Mov,
            crate::ir::AluDest::reg(reg),
            vec![AluSrc::reg(reg)],
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), mov);
        validate_shader(&shader);
    }

    #[test]
    #[should_panic(expected = "stale entries")]
    fn direct_bookkeeping_mutation_caught() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let reg = scalar_reg(&mut shader, imp);
        let bogus = shader.jump_instr(crate::ir::JumpKind::Return);
        shader[reg].uses.insert(bogus, 1);
        validate_shader(&shader);
    }

    #[test]
    #[should_panic(expected = "stale entries")]
    fn local_register_cross_function_caught() {
        let mut shader = Shader::new();
        let imp_a = empty_main(&mut shader);
        let func_b = shader.create_function("other");
        let overload_b = shader.create_overload(func_b);
        let imp_b = shader.create_impl(overload_b);

        // A register local to the first function, written from the second.
        let reg = scalar_reg(&mut shader, imp_a);
        let store = shader.load_const_instr(
            crate::ir::ConstValue::Vector(ConstVec::scalar_u32(1)),
            Dest::reg(reg),
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp_b), store);
        validate_shader(&shader);
    }

    #[test]
    #[should_panic(expected = "definition not in")]
    fn bypassing_the_builder_caught() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let reg = scalar_reg(&mut shader, imp);
        let start = shader[imp].start_block;

        let store = shader.load_const_instr(
            crate::ir::ConstValue::Vector(ConstVec::scalar_u32(1)),
            Dest::reg(reg),
        );
        // Splicing the instruction in by hand skips the def bookkeeping.
        shader[store].block = start.into();
        shader[start].instrs.push(store);
        validate_shader(&shader);
    }

    #[test]
    #[should_panic(expected = "array deref of a non-array type")]
    fn bad_deref_chain_caught() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let float = shader.types.float();
        let var = shader.create_local_variable(imp, "x", float);
        let deref = Deref {
            var,
            var_type: float,
            chain: vec![DerefLink::Array {
                index: Src::Ssa(shader.create_ssa_value(1)),
                ty: float,
            }],
        };

        let out = scalar_reg(&mut shader, imp);
        let load = shader.intrinsic_instr(
            Intrinsic::LoadVarVec1,
            vec![],
            vec![Dest::reg(out)],
            vec![deref],
            None,
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), load);
        validate_shader(&shader);
    }

    #[test]
    #[should_panic(expected = "signature")]
    fn call_type_mismatch_caught() {
        let mut shader = Shader::new();

        let callee_fn = shader.create_function("helper");
        let callee = shader.create_overload(callee_fn);
        let float = shader.types.float();
        shader.append_param(callee, Param { mode: ParamMode::In, ty: float });

        let imp = empty_main(&mut shader);
        let int = shader.types.int();
        let arg = shader.create_local_variable(imp, "arg", int);
        let call = shader.call_instr(callee, vec![arg], None);
        shader.instr_insert_after_cf_list(CfList::Body(imp), call);
        validate_shader(&shader);
    }

    #[test]
    fn variable_load_validates() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let vec4 = shader.types.vec(4);
        let var = shader.create_local_variable(imp, "color", vec4);
        let result = shader.create_ssa_value(4);
        let load = shader.intrinsic_instr(
            Intrinsic::LoadVarVec4,
            vec![],
            vec![Dest::ssa(result)],
            vec![Deref::var(var, vec4)],
            None,
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), load);
        validate_shader(&shader);
    }

    #[test]
    fn phi_in_diamond_validates() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let start = shader[imp].start_block;

        let cond = scalar_reg(&mut shader, imp);
        let set_cond = shader.load_const_instr(
            crate::ir::ConstValue::Vector(ConstVec::scalar_u32(1)),
            Dest::reg(cond),
        );
        shader.instr_insert_after_block(start, set_cond);

        let iff = shader.create_if(Src::reg(cond));
        shader.cf_node_insert_end(CfList::Body(imp), CfNode::If(iff));

        let a = scalar_reg(&mut shader, imp);
        let set_a = shader.load_const_instr(
            crate::ir::ConstValue::Vector(ConstVec::scalar_u32(2)),
            Dest::reg(a),
        );
        shader.instr_insert_after_cf_list(CfList::Then(iff), set_a);

        let b = scalar_reg(&mut shader, imp);
        let set_b = shader.load_const_instr(
            crate::ir::ConstValue::Vector(ConstVec::scalar_u32(3)),
            Dest::reg(b),
        );
        shader.instr_insert_after_cf_list(CfList::Else(iff), set_b);

        let then_block = shader[iff].then_list[0].unwrap_block();
        let else_block = shader[iff].else_list[0].unwrap_block();
        let merge = shader
            .cf_next(CfNode::If(iff))
            .unwrap()
            .unwrap_block();

        let merged = scalar_reg(&mut shader, imp);
        let phi = shader.phi_instr(
            Dest::reg(merged),
            vec![
                PhiSrc { pred: then_block, src: Src::reg(a) },
                PhiSrc { pred: else_block, src: Src::reg(b) },
            ],
        );
        shader.instr_insert_before_block(merge, phi);

        validate_shader(&shader);
        assert_eq!(shader[a].uses.get(&phi), Some(&1));
        assert_eq!(shader[merged].defs.get(&phi), Some(&1));
    }

    #[test]
    #[should_panic(expected = "no source for predecessor")]
    fn phi_missing_source_caught() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let cond = scalar_reg(&mut shader, imp);
        let set_cond = shader.load_const_instr(
            crate::ir::ConstValue::Vector(ConstVec::scalar_u32(1)),
            Dest::reg(cond),
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), set_cond);

        let iff = shader.create_if(Src::reg(cond));
        shader.cf_node_insert_end(CfList::Body(imp), CfNode::If(iff));

        let then_block = shader[iff].then_list[0].unwrap_block();
        let merge = shader.cf_next(CfNode::If(iff)).unwrap().unwrap_block();

        let a = scalar_reg(&mut shader, imp);
        let merged = scalar_reg(&mut shader, imp);
        let phi = shader.phi_instr(
            Dest::reg(merged),
            vec![PhiSrc { pred: then_block, src: Src::reg(a) }],
        );
        shader.instr_insert_before_block(merge, phi);
        validate_shader(&shader);
    }

    #[test]
    fn predicated_instruction_validates() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let pred = scalar_reg(&mut shader, imp);
        let set_pred = shader.load_const_instr(
            crate::ir::ConstValue::Vector(ConstVec::scalar_u32(1)),
            Dest::reg(pred),
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), set_pred);

        let out = scalar_reg(&mut shader, imp);
        let mov = shader.alu_instr(
            Opcode::Mov,
            crate::ir::AluDest::reg(out).masked(0x1),
            vec![AluSrc::reg(pred)],
        );
        shader.set_predicate(mov, Src::reg(pred));
        shader.instr_insert_after_cf_list(CfList::Body(imp), mov);

        validate_shader(&shader);
        // One read as a source, one as the predicate.
        assert_eq!(shader[pred].uses.get(&mov), Some(&2));
    }

    #[test]
    fn texture_sample_validates() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let sampler_ty = shader.types.sampler(SamplerDim::D2, false);
        let sampler = shader.create_shader_variable(
            crate::ir::VariableMode::Uniform,
            "diffuse_map",
            sampler_ty,
        );

        let (coord_inst, coord) = shader.ssa_undef_instr(2);
        shader.instr_insert_after_cf_list(CfList::Body(imp), coord_inst);

        let texel = shader.create_ssa_value(4);
        let tex = shader.tex_instr(
            TexKind::Tex,
            Dest::ssa(texel),
            vec![TexSrc { kind: TexSrcKind::Coord, src: Src::ssa(coord) }],
            Some(Deref::var(sampler, sampler_ty)),
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), tex);

        validate_shader(&shader);
    }

    #[test]
    #[should_panic(expected = "duplicate")]
    fn duplicate_tex_source_caught() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let (coord_inst, coord) = shader.ssa_undef_instr(2);
        shader.instr_insert_after_cf_list(CfList::Body(imp), coord_inst);

        let texel = shader.create_ssa_value(4);
        let tex = shader.tex_instr(
            TexKind::Tex,
            Dest::ssa(texel),
            vec![
                TexSrc { kind: TexSrcKind::Coord, src: Src::ssa(coord) },
                TexSrc { kind: TexSrcKind::Coord, src: Src::ssa(coord) },
            ],
            None,
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), tex);
        validate_shader(&shader);
    }
}
