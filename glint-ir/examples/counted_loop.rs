//! Builds a counted loop through the builder API and validates it.
//!
//! ```text
//! length = 5; one = 1; index = 0;
//! loop {
//!     cmp = ige index, length;
//!     if (cmp) { break; }
//!     index = iadd index, one;
//! }
//! ```

use glint_ir::builder::CfList;
use glint_ir::ir::{
    AluDest, AluSrc, CfNode, ConstValue, ConstVec, Dest, FuncImpl, JumpKind, Opcode, Reg, Shader,
    Src,
};
use glint_ir::validate_shader;

fn scalar(shader: &mut Shader, imp: FuncImpl, name: &str, value: u32) -> Reg {
    let reg = shader.create_local_reg(imp);
    shader[reg].num_components = 1;
    shader[reg].name = Some(name.to_string());
    let init = shader.load_const_instr(
        ConstValue::Vector(ConstVec::scalar_u32(value)),
        Dest::reg(reg),
    );
    shader.instr_insert_after_cf_list(CfList::Body(imp), init);
    reg
}

fn main() {
    env_logger::init();

    let mut shader = Shader::new();
    let func = shader.create_function("main");
    let overload = shader.create_overload(func);
    let imp = shader.create_impl(overload);

    let length = scalar(&mut shader, imp, "length", 5);
    let one = scalar(&mut shader, imp, "one", 1);
    let index = scalar(&mut shader, imp, "index", 0);

    let lp = shader.create_loop();
    shader.cf_node_insert_end(CfList::Body(imp), CfNode::Loop(lp));

    let cmp = shader.create_local_reg(imp);
    shader[cmp].num_components = 1;
    shader[cmp].name = Some("cmp".to_string());
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

    validate_shader(&shader);

    let header = shader[lp].body[0].unwrap_block();
    println!("loop header {} has {} predecessors", header, shader[header].predecessors.len());
    println!("{} defs: {}, uses: {}", index, shader[index].total_defs(), shader[index].total_uses());
    println!("shader validated");
}
