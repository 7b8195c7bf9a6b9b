//! End-to-end construction scenarios: build small shaders through the
//! builder API and check the control-flow graph and bookkeeping that result.

use glint_ir::builder::CfList;
use glint_ir::ir::{
    AluDest, AluSrc, Block, CfNode, ConstValue, ConstVec, Dest, FuncImpl, IfNode, JumpKind,
    LoopNode, Opcode, Reg, Shader, Src,
};
use glint_ir::validate_shader;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn empty_main(shader: &mut Shader) -> FuncImpl {
    let func = shader.create_function("main");
    let overload = shader.create_overload(func);
    shader.create_impl(overload)
}

fn scalar_reg(shader: &mut Shader, imp: FuncImpl, name: &str) -> Reg {
    let reg = shader.create_local_reg(imp);
    shader[reg].num_components = 1;
    shader[reg].name = Some(name.to_string());
    reg
}

fn load_scalar(shader: &mut Shader, imp: FuncImpl, reg: Reg, value: u32) {
    let inst = shader.load_const_instr(
        ConstValue::Vector(ConstVec::scalar_u32(value)),
        Dest::reg(reg),
    );
    shader.instr_insert_after_cf_list(CfList::Body(imp), inst);
}

#[test]
fn empty_function() {
    init_logging();
    let mut shader = Shader::new();
    let imp = empty_main(&mut shader);

    validate_shader(&shader);

    let start = shader[imp].start_block;
    let end = shader[imp].end_block;
    assert_eq!(shader[imp].body.len(), 1);
    assert_eq!(shader[imp].body[0], CfNode::Block(start));
    assert_eq!(shader[start].successors[0].expand(), Some(end));
    assert!(shader[start].successors[1].is_none());
    assert_eq!(
        shader[end].predecessors.iter().copied().collect::<Vec<_>>(),
        vec![start]
    );
}

/// Build `main` containing `loop { if (r) { break; } }` with `r` loaded from
/// an all-ones constant before the loop. Returns the pieces the assertions
/// need.
fn build_loop_with_break(shader: &mut Shader) -> (FuncImpl, LoopNode, IfNode, Reg) {
    let imp = empty_main(shader);

    let r = scalar_reg(shader, imp, "r");
    load_scalar(shader, imp, r, 0xffff_ffff);

    let lp = shader.create_loop();
    shader.cf_node_insert_end(CfList::Body(imp), CfNode::Loop(lp));

    let iff = shader.create_if(Src::reg(r));
    shader.cf_node_insert_end(CfList::LoopBody(lp), CfNode::If(iff));

    let brk = shader.jump_instr(JumpKind::Break);
    shader.instr_insert_after_cf_list(CfList::Then(iff), brk);

    (imp, lp, iff, r)
}

#[test]
fn loop_with_break() {
    init_logging();
    let mut shader = Shader::new();
    let (imp, lp, iff, r) = build_loop_with_break(&mut shader);

    validate_shader(&shader);

    // The block ending the then list exits to the block after the loop.
    let after_loop = shader[imp].body[2].unwrap_block();
    let then_tail = shader[iff].then_list.last().unwrap().unwrap_block();
    assert_eq!(shader[then_tail].successors[0].expand(), Some(after_loop));
    assert!(shader[then_tail].successors[1].is_none());
    assert!(shader[after_loop].predecessors.contains(&then_tail));

    // The back-edge runs from the loop's tail block to its header.
    let header = shader[lp].body[0].unwrap_block();
    let loop_tail = shader[lp].body.last().unwrap().unwrap_block();
    assert_eq!(shader[loop_tail].successors[0].expand(), Some(header));
    assert!(shader[header].predecessors.contains(&loop_tail));

    // The condition reads the register through the if.
    assert_eq!(shader[r].if_uses.get(&iff), Some(&1));
    assert_eq!(shader[r].total_defs(), 1);
}

/// Build the counted loop:
///
/// ```text
/// length = 5; one = 1; index = 0;
/// loop {
///     cmp = ige index, length;
///     if (cmp) { break; }
///     index = iadd index, one;
/// }
/// ```
fn build_counted_loop(shader: &mut Shader) -> (FuncImpl, Reg, Reg) {
    let imp = empty_main(shader);

    let length = scalar_reg(shader, imp, "length");
    load_scalar(shader, imp, length, 5);
    let one = scalar_reg(shader, imp, "one");
    load_scalar(shader, imp, one, 1);
    let index = scalar_reg(shader, imp, "index");
    load_scalar(shader, imp, index, 0);

    let lp = shader.create_loop();
    shader.cf_node_insert_end(CfList::Body(imp), CfNode::Loop(lp));

    let cmp = scalar_reg(shader, imp, "cmp");
    let compare = shader.alu_instr(
        Opcode::Ige,
        AluDest::reg(cmp).masked(0x1),
        vec![AluSrc::reg(index), AluSrc::reg(length)],
    );
    shader.instr_insert_after_cf_list(CfList::LoopBody(lp), compare);

    let iff = shader.create_if(Src::reg(cmp));
    shader.cf_node_insert_end(CfList::LoopBody(lp), CfNode::If(iff));
    let brk = shader.jump_instr(JumpKind::Break);
    shader.instr_insert_after_cf_list(CfList::Then(iff), brk);

    let incr = shader.alu_instr(
        Opcode::Iadd,
        AluDest::reg(index).masked(0x1),
        vec![AluSrc::reg(index), AluSrc::reg(one)],
    );
    shader.instr_insert_after_cf_list(CfList::LoopBody(lp), incr);

    (imp, cmp, index)
}

#[test]
fn counted_loop() {
    init_logging();
    let mut shader = Shader::new();
    let (_imp, cmp, index) = build_counted_loop(&mut shader);

    validate_shader(&shader);

    // The compare result is written once and read only by the if.
    assert_eq!(shader[cmp].total_defs(), 1);
    assert_eq!(shader[cmp].total_uses(), 0);
    assert_eq!(shader[cmp].if_uses.len(), 1);

    // The induction register: initial load plus the increment write; read
    // by the compare and the increment.
    assert_eq!(shader[index].total_defs(), 2);
    assert_eq!(shader[index].total_uses(), 2);
}

#[test]
fn remove_break_then_if() {
    init_logging();
    let mut shader = Shader::new();
    let (imp, lp, iff, r) = build_loop_with_break(&mut shader);

    let then_tail = shader[iff].then_list.last().unwrap().unwrap_block();
    let brk = shader[then_tail].last_instr().unwrap();
    let after_loop = shader[imp].body[2].unwrap_block();

    // Removing the jump does not restore the block's successors: the edge
    // to the after-loop block is left in place for the caller to repair,
    // and the shader is still structurally valid.
    shader.instr_remove(brk);
    validate_shader(&shader);
    assert_eq!(shader[then_tail].successors[0].expand(), Some(after_loop));

    // Removing the if stitches its flanking blocks back together, which
    // restores the loop's self back-edge.
    shader.cf_node_remove(CfNode::If(iff));
    validate_shader(&shader);

    assert_eq!(shader[lp].body.len(), 1);
    let header = shader[lp].body[0].unwrap_block();
    assert_eq!(shader[header].successors[0].expand(), Some(header));
    assert!(shader[header].predecessors.contains(&header));
    assert!(shader[r].if_uses.is_empty());
}

#[test]
fn global_register_shared_across_impls() {
    init_logging();
    let mut shader = Shader::new();

    let func_a = shader.create_function("write_side");
    let overload_a = shader.create_overload(func_a);
    let imp_a = shader.create_impl(overload_a);

    let func_b = shader.create_function("read_side");
    let overload_b = shader.create_overload(func_b);
    let imp_b = shader.create_impl(overload_b);

    let g = shader.create_global_reg();
    shader[g].num_components = 1;

    let store = shader.load_const_instr(
        ConstValue::Vector(ConstVec::scalar_u32(7)),
        Dest::reg(g),
    );
    shader.instr_insert_after_cf_list(CfList::Body(imp_a), store);

    let out = shader.create_local_reg(imp_b);
    shader[out].num_components = 1;
    let read = shader.alu_instr(
        Opcode::Mov,
        AluDest::reg(out).masked(0x1),
        vec![AluSrc::reg(g)],
    );
    shader.instr_insert_after_cf_list(CfList::Body(imp_b), read);

    validate_shader(&shader);
    assert!(shader[g].is_global);
    assert_eq!(shader[g].total_defs(), 1);
    assert_eq!(shader[g].total_uses(), 1);
}

#[test]
#[should_panic(expected = "using an SSA value defined in a different function")]
fn cross_impl_ssa_rejected() {
    init_logging();
    let mut shader = Shader::new();

    let func_a = shader.create_function("def_side");
    let overload_a = shader.create_overload(func_a);
    let imp_a = shader.create_impl(overload_a);

    let func_b = shader.create_function("use_side");
    let overload_b = shader.create_overload(func_b);
    let imp_b = shader.create_impl(overload_b);

    let (undef, value) = shader.ssa_undef_instr(1);
    shader.instr_insert_after_cf_list(CfList::Body(imp_a), undef);

    let out = shader.create_local_reg(imp_b);
    shader[out].num_components = 1;
    let read = shader.alu_instr(
        Opcode::Mov,
        AluDest::reg(out).masked(0x1),
        vec![AluSrc::ssa(value)],
    );
    shader.instr_insert_after_cf_list(CfList::Body(imp_b), read);

    validate_shader(&shader);
}

#[test]
fn validation_is_idempotent() {
    init_logging();
    let mut shader = Shader::new();
    build_counted_loop(&mut shader);
    validate_shader(&shader);
    validate_shader(&shader);
}

/// The same operation sequence in two independent shaders produces the same
/// graph: handle allocation is deterministic, so the structures compare
/// equal index for index.
#[test]
fn construction_is_deterministic() {
    init_logging();
    let mut first = Shader::new();
    let (imp_a, _, _) = build_counted_loop(&mut first);
    let mut second = Shader::new();
    let (imp_b, _, _) = build_counted_loop(&mut second);

    assert_eq!(imp_a, imp_b);
    assert_eq!(first[imp_a].body, second[imp_b].body);

    fn blocks_of(shader: &Shader, body: &[CfNode]) -> Vec<Block> {
        body.iter()
            .filter_map(|node| match node {
                CfNode::Block(block) => Some(*block),
                _ => None,
            })
            .collect()
    }

    let first_blocks = blocks_of(&first, &first[imp_a].body);
    let second_blocks = blocks_of(&second, &second[imp_b].body);
    assert_eq!(first_blocks, second_blocks);
    for (&a, &b) in first_blocks.iter().zip(&second_blocks) {
        assert_eq!(
            first[a].successors[0].expand(),
            second[b].successors[0].expand()
        );
        assert_eq!(
            first[a].successors[1].expand(),
            second[b].successors[1].expand()
        );
        assert_eq!(first[a].predecessors, second[b].predecessors);
        assert_eq!(first[a].instrs, second[b].instrs);
    }
}

/// `insert_after(n, x); remove(x)` leaves the shader structurally identical:
/// removing the only non-block node between two blocks stitches them back
/// into one with the union of instructions and the downstream successors.
#[test]
fn insert_remove_round_trip() {
    init_logging();
    let mut shader = Shader::new();
    let imp = empty_main(&mut shader);
    let start = shader[imp].start_block;
    let end = shader[imp].end_block;

    let r = scalar_reg(&mut shader, imp, "r");
    load_scalar(&mut shader, imp, r, 1);
    validate_shader(&shader);

    let iff = shader.create_if(Src::reg(r));
    shader.cf_node_insert_after(CfNode::Block(start), CfNode::If(iff));
    validate_shader(&shader);

    shader.cf_node_remove(CfNode::If(iff));
    validate_shader(&shader);

    assert_eq!(shader[imp].body.len(), 1);
    assert_eq!(shader[imp].body[0], CfNode::Block(start));
    assert_eq!(shader[start].successors[0].expand(), Some(end));
    assert!(shader[start].successors[1].is_none());
    assert_eq!(shader[start].instrs.len(), 1);
}
