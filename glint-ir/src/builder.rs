//! Structural mutation of the IR.
//!
//! These are the only sanctioned ways to insert, remove, or rearrange
//! control-flow nodes and instructions. Every operation leaves the
//! structured tree and the block-level control-flow graph consistent with
//! each other:
//!
//! 1. each then list, else list, and loop body holds at least one node;
//! 2. every `if` and `loop` has a block immediately before and after it in
//!    its list;
//! 3. no two blocks are adjacent in the same list;
//! 4. a block holds at most one jump, and only as its last instruction;
//! 5. successor arrays and predecessor sets mirror each other exactly.
//!
//! Invariant 2 exists so later passes always have a place to insert code,
//! and it eliminates critical edges from the graph.
//!
//! Instruction insertion and removal additionally maintain the use/def
//! bookkeeping on every referenced register, including indirect index
//! operands and predicates. Removing a jump instruction does *not* restore
//! the block's successor edges; the caller owns that repair.

use crate::ir::entities::{Block, CfNode, FuncImpl, IfNode, Inst, LoopNode, Reg};
use crate::ir::instructions::{Dest, InstData, JumpKind, Src};
use crate::ir::register::{multiset_add, multiset_remove};
use crate::ir::Shader;
use smallvec::SmallVec;

/// Addresses one of the four kinds of control-flow node lists.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CfList {
    /// A function implementation's top-level body.
    Body(FuncImpl),
    /// The then list of an `if`.
    Then(IfNode),
    /// The else list of an `if`.
    Else(IfNode),
    /// A loop's body.
    LoopBody(LoopNode),
}

/// A register operand occurrence collected from an instruction.
enum RegOp {
    Use(Reg),
    Def(Reg),
}

impl Shader {
    // ------------------------------------------------------------------
    // Control-flow tree navigation.

    fn cf_list_nodes(&self, list: CfList) -> &Vec<CfNode> {
        match list {
            CfList::Body(imp) => &self[imp].body,
            CfList::Then(node) => &self[node].then_list,
            CfList::Else(node) => &self[node].else_list,
            CfList::LoopBody(node) => &self[node].body,
        }
    }

    fn cf_list_nodes_mut(&mut self, list: CfList) -> &mut Vec<CfNode> {
        match list {
            CfList::Body(imp) => &mut self[imp].body,
            CfList::Then(node) => &mut self[node].then_list,
            CfList::Else(node) => &mut self[node].else_list,
            CfList::LoopBody(node) => &mut self[node].body,
        }
    }

    /// The node owning `list` in the structured tree.
    fn cf_list_owner(&self, list: CfList) -> CfNode {
        match list {
            CfList::Body(imp) => CfNode::Impl(imp),
            CfList::Then(node) | CfList::Else(node) => CfNode::If(node),
            CfList::LoopBody(node) => CfNode::Loop(node),
        }
    }

    /// The parent of `node` in the structured tree.
    pub fn cf_parent(&self, node: CfNode) -> Option<CfNode> {
        match node {
            CfNode::Block(block) => self[block].parent,
            CfNode::If(n) => self[n].parent,
            CfNode::Loop(n) => self[n].parent,
            CfNode::Impl(_) => None,
        }
    }

    fn set_cf_parent(&mut self, node: CfNode, parent: Option<CfNode>) {
        match node {
            CfNode::Block(block) => self[block].parent = parent,
            CfNode::If(n) => self[n].parent = parent,
            CfNode::Loop(n) => self[n].parent = parent,
            CfNode::Impl(_) => panic!("a function node has no parent"),
        }
    }

    /// The list containing `node`.
    ///
    /// Panics for detached nodes, function nodes, and the held-out
    /// start/end blocks of an implementation that are not part of a list.
    fn containing_list(&self, node: CfNode) -> CfList {
        let parent = self
            .cf_parent(node)
            .unwrap_or_else(|| panic!("{} is not in a control-flow list", node));
        match parent {
            CfNode::Impl(imp) => CfList::Body(imp),
            CfNode::Loop(lp) => CfList::LoopBody(lp),
            CfNode::If(iff) => {
                if self[iff].then_list.contains(&node) {
                    CfList::Then(iff)
                } else {
                    debug_assert!(self[iff].else_list.contains(&node));
                    CfList::Else(iff)
                }
            }
            CfNode::Block(_) => panic!("a block cannot own a control-flow list"),
        }
    }

    fn cf_position(&self, node: CfNode) -> (CfList, usize) {
        let list = self.containing_list(node);
        let pos = self
            .cf_list_nodes(list)
            .iter()
            .position(|&n| n == node)
            .unwrap_or_else(|| panic!("{} missing from its parent list", node));
        (list, pos)
    }

    /// The node following `node` in its list.
    pub fn cf_next(&self, node: CfNode) -> Option<CfNode> {
        let (list, pos) = self.cf_position(node);
        self.cf_list_nodes(list).get(pos + 1).copied()
    }

    /// The node preceding `node` in its list.
    pub fn cf_prev(&self, node: CfNode) -> Option<CfNode> {
        let (list, pos) = self.cf_position(node);
        pos.checked_sub(1)
            .map(|prev| self.cf_list_nodes(list)[prev])
    }

    /// The innermost loop enclosing `node`, walking up the structured tree.
    pub fn nearest_loop(&self, node: CfNode) -> LoopNode {
        let mut node = node;
        loop {
            if let CfNode::Loop(lp) = node {
                return lp;
            }
            node = self
                .cf_parent(node)
                .unwrap_or_else(|| panic!("no enclosing loop"));
        }
    }

    /// The function implementation whose tree contains `node`.
    pub fn containing_impl(&self, node: CfNode) -> FuncImpl {
        let mut node = node;
        loop {
            if let CfNode::Impl(imp) = node {
                return imp;
            }
            node = self
                .cf_parent(node)
                .unwrap_or_else(|| panic!("{} is not part of a function", node));
        }
    }

    // ------------------------------------------------------------------
    // CFG edge maintenance.

    fn link_blocks(&mut self, pred: Block, succ1: Option<Block>, succ2: Option<Block>) {
        debug_assert!(
            succ1.is_some() || succ2.is_none(),
            "successor slot 1 without slot 0"
        );
        self[pred].successors[0] = succ1.into();
        self[pred].successors[1] = succ2.into();
        if let Some(s) = succ1 {
            self[s].predecessors.insert(pred);
        }
        if let Some(s) = succ2 {
            self[s].predecessors.insert(pred);
        }
    }

    fn unlink_blocks(&mut self, pred: Block, succ: Block) {
        if self[pred].successors[0].expand() == Some(succ) {
            self[pred].successors[0] = self[pred].successors[1];
            self[pred].successors[1] = None.into();
        } else {
            assert_eq!(
                self[pred].successors[1].expand(),
                Some(succ),
                "{} is not a successor of {}",
                succ,
                pred
            );
            self[pred].successors[1] = None.into();
        }
        // The same block may still occupy the other slot; only drop the
        // predecessor entry once no slot names it.
        if self[pred].successors[0].expand() != Some(succ) {
            let was_pred = self[succ].predecessors.remove(&pred);
            assert!(was_pred, "{} missing from {}'s predecessors", pred, succ);
        }
    }

    fn unlink_block_successors(&mut self, block: Block) {
        while let Some(succ) = self[block].successors[0].expand() {
            self.unlink_blocks(block, succ);
        }
    }

    /// Replace the edge `pred -> from` with `pred -> to`, preserving the
    /// successor slot it occupies.
    fn replace_successor(&mut self, pred: Block, from: Block, to: Block) {
        let mut replaced = false;
        for slot in 0..2 {
            if self[pred].successors[slot].expand() == Some(from) {
                self[pred].successors[slot] = to.into();
                replaced = true;
            }
        }
        assert!(replaced, "{} is not a successor of {}", from, pred);
        self[from].predecessors.remove(&pred);
        self[to].predecessors.insert(pred);
    }

    /// Move `source`'s successors onto `dest`, leaving `source` with none.
    fn move_successors(&mut self, source: Block, dest: Block) {
        let succ1 = self[source].successors[0].expand();
        let succ2 = self[source].successors[1].expand();
        self.unlink_block_successors(source);
        self.unlink_block_successors(dest);
        self.link_blocks(dest, succ1, succ2);
    }

    /// Link a block to the non-block node following it: into both branch
    /// heads of an `if`, or into a loop's header.
    fn link_block_to_non_block(&mut self, block: Block, node: CfNode) {
        match node {
            CfNode::If(iff) => {
                let first_then = self[iff].then_list[0].unwrap_block();
                let first_else = self[iff].else_list[0].unwrap_block();
                self.unlink_block_successors(block);
                self.link_blocks(block, Some(first_then), Some(first_else));
            }
            CfNode::Loop(lp) => {
                let header = self[lp].body[0].unwrap_block();
                self.unlink_block_successors(block);
                self.link_blocks(block, Some(header), None);
            }
            _ => panic!("{} is not an if or loop", node),
        }
    }

    /// Link a non-block node to the block following it.
    ///
    /// For an `if` this rewires the tail block of each branch onto `block`,
    /// unless that tail ends in a jump, which is respected. For a loop
    /// nothing is rewired: break targets inside the body are assumed to
    /// already point where they should, so this is only valid for
    /// freshly-created loops.
    fn link_non_block_to_block(&mut self, node: CfNode, block: Block) {
        match node {
            CfNode::If(iff) => {
                for list in [CfList::Then(iff), CfList::Else(iff)] {
                    let last = self.cf_list_nodes(list).last().copied();
                    let last_block = last.expect("branch list is empty").unwrap_block();
                    if !self.block_ends_in_jump(last_block) {
                        self.unlink_block_successors(last_block);
                        self.link_blocks(last_block, Some(block), None);
                    }
                }
            }
            CfNode::Loop(_) => {}
            _ => panic!("{} is not an if or loop", node),
        }
    }

    fn block_ends_in_jump(&self, block: Block) -> bool {
        self[block]
            .last_instr()
            .is_some_and(|inst| self[inst].data.is_jump())
    }

    // ------------------------------------------------------------------
    // Block splitting and stitching.

    /// Insert an empty block before `block` and rewire every predecessor of
    /// `block` onto it. Does not link the two halves; the caller attaches a
    /// non-block node between them.
    fn split_block_beginning(&mut self, block: Block) -> Block {
        let new_block = self.create_block();
        let (list, pos) = self.cf_position(CfNode::Block(block));
        self.cf_list_nodes_mut(list).insert(pos, CfNode::Block(new_block));
        self[new_block].parent = self[block].parent;

        let preds: SmallVec<[Block; 4]> = self[block].predecessors.iter().copied().collect();
        for pred in preds {
            self.replace_successor(pred, block, new_block);
        }
        new_block
    }

    /// Insert an empty block after `block` and move `block`'s successors to
    /// it. Does not link the two halves.
    fn split_block_end(&mut self, block: Block) -> Block {
        let new_block = self.create_block();
        let (list, pos) = self.cf_position(CfNode::Block(block));
        self.cf_list_nodes_mut(list)
            .insert(pos + 1, CfNode::Block(new_block));
        self[new_block].parent = self[block].parent;

        self.move_successors(block, new_block);
        new_block
    }

    /// Collapse `after` into `before`: `before` keeps its own predecessors,
    /// takes over `after`'s successors and instructions, and `after` is
    /// unlinked from its list.
    fn stitch_blocks(&mut self, before: Block, after: Block) {
        log::trace!("stitching {} into {}", after, before);
        self.move_successors(after, before);

        let moved = std::mem::take(&mut self[after].instrs);
        for &inst in &moved {
            self[inst].block = before.into();
        }
        self[before].instrs.extend(moved);

        let (list, pos) = self.cf_position(CfNode::Block(after));
        self.cf_list_nodes_mut(list).remove(pos);
        self[after].parent = None;
    }

    // ------------------------------------------------------------------
    // Jump handling.

    /// Recompute `block`'s successors after a jump became its last
    /// instruction.
    fn handle_jump(&mut self, block: Block) {
        let last = self[block].last_instr().expect("block has no instructions");
        let kind = match &self[last].data {
            InstData::Jump(jump) => jump.kind,
            _ => panic!("{} does not end in a jump", block),
        };

        self.unlink_block_successors(block);

        match kind {
            JumpKind::Break => {
                let lp = self.nearest_loop(CfNode::Block(block));
                let after = self
                    .cf_next(CfNode::Loop(lp))
                    .expect("loop has no following node")
                    .unwrap_block();
                self.link_blocks(block, Some(after), None);
            }
            JumpKind::Continue => {
                let lp = self.nearest_loop(CfNode::Block(block));
                let header = self[lp].body[0].unwrap_block();
                self.link_blocks(block, Some(header), None);
            }
            JumpKind::Return => {
                let imp = self.containing_impl(CfNode::Block(block));
                let end = self[imp].end_block;
                self.link_blocks(block, Some(end), None);
            }
        }
    }

    // ------------------------------------------------------------------
    // Control-flow node insertion.

    /// Insert `new` immediately after `node`.
    pub fn cf_node_insert_after(&mut self, node: CfNode, new: CfNode) {
        log::trace!("inserting {} after {}", new, node);
        self.assert_detached(new);
        match new {
            CfNode::Block(after_block) => {
                let has_jump = self.block_ends_in_jump(after_block);
                if let CfNode::Block(block) = node {
                    self.merge_block_at_end(block, after_block, has_jump);
                } else {
                    // By invariant 2 a block follows every non-block node;
                    // merging after `node` is merging into that block's head.
                    let next = self
                        .cf_next(node)
                        .expect("non-block node has no following block")
                        .unwrap_block();
                    self.merge_block_at_start(next, after_block, has_jump);
                }
            }
            _ => {
                if let CfNode::Block(block) = node {
                    self.insert_non_block_after_block(block, new);
                } else {
                    let next = self
                        .cf_next(node)
                        .expect("non-block node has no following block")
                        .unwrap_block();
                    self.insert_non_block_before_block(new, next);
                }
            }
        }
    }

    /// Insert `new` immediately before `node`.
    pub fn cf_node_insert_before(&mut self, node: CfNode, new: CfNode) {
        log::trace!("inserting {} before {}", new, node);
        self.assert_detached(new);
        match new {
            CfNode::Block(before_block) => {
                let has_jump = self.block_ends_in_jump(before_block);
                if let CfNode::Block(block) = node {
                    self.merge_block_at_start(block, before_block, has_jump);
                } else {
                    let prev = self
                        .cf_prev(node)
                        .expect("non-block node has no preceding block")
                        .unwrap_block();
                    self.merge_block_at_end(prev, before_block, has_jump);
                }
            }
            _ => {
                if let CfNode::Block(block) = node {
                    self.insert_non_block_before_block(new, block);
                } else {
                    let prev = self
                        .cf_prev(node)
                        .expect("non-block node has no preceding block")
                        .unwrap_block();
                    self.insert_non_block_after_block(prev, new);
                }
            }
        }
    }

    /// Insert `new` at the beginning of `list`.
    pub fn cf_node_insert_begin(&mut self, list: CfList, new: CfNode) {
        let first = *self
            .cf_list_nodes(list)
            .first()
            .expect("control-flow list is empty");
        self.cf_node_insert_before(first, new);
    }

    /// Insert `new` at the end of `list`.
    pub fn cf_node_insert_end(&mut self, list: CfList, new: CfNode) {
        let last = *self
            .cf_list_nodes(list)
            .last()
            .expect("control-flow list is empty");
        self.cf_node_insert_after(last, new);
    }

    fn assert_detached(&self, new: CfNode) {
        match new {
            CfNode::Impl(_) => panic!("a function node cannot be inserted"),
            _ => assert!(
                self.cf_parent(new).is_none(),
                "{} is already in the tree",
                new
            ),
        }
    }

    /// Merge the detached block `merged` into the end of `block`.
    fn merge_block_at_end(&mut self, block: Block, merged: Block, has_jump: bool) {
        debug_assert!(
            self[merged].instrs.is_empty() || !self.block_ends_in_jump(block),
            "{} already ends in a jump",
            block
        );
        let moved = std::mem::take(&mut self[merged].instrs);
        for &inst in &moved {
            self[inst].block = block.into();
        }
        self[block].instrs.extend(moved);

        if has_jump {
            self.handle_jump(block);
        }
    }

    /// Merge the detached block `merged` into the start of `block`.
    fn merge_block_at_start(&mut self, block: Block, merged: Block, has_jump: bool) {
        // A jump can only land at the end of a block, so a jump-carrying
        // block may only be merged into an empty one.
        assert!(
            !has_jump || self[block].instrs.is_empty(),
            "cannot merge a jump into the middle of {}",
            block
        );
        let mut moved = std::mem::take(&mut self[merged].instrs);
        for &inst in &moved {
            self[inst].block = block.into();
        }
        moved.extend(std::mem::take(&mut self[block].instrs));
        self[block].instrs = moved;

        if has_jump {
            self.handle_jump(block);
        }
    }

    /// Splice `node` between two adjacent blocks and link all three.
    fn insert_non_block(&mut self, before: Block, node: CfNode, after: Block) {
        let (list, pos) = self.cf_position(CfNode::Block(before));
        debug_assert_eq!(self.cf_list_nodes(list)[pos + 1], CfNode::Block(after));
        self.cf_list_nodes_mut(list).insert(pos + 1, node);
        let owner = self.cf_list_owner(list);
        self.set_cf_parent(node, Some(owner));

        if let CfNode::If(iff) = node {
            self.add_if_condition_use(iff);
        }

        self.link_block_to_non_block(before, node);
        self.link_non_block_to_block(node, after);
    }

    fn insert_non_block_after_block(&mut self, block: Block, node: CfNode) {
        let new_block = self.split_block_end(block);
        self.insert_non_block(block, node, new_block);
    }

    fn insert_non_block_before_block(&mut self, node: CfNode, block: Block) {
        let new_block = self.split_block_beginning(block);
        self.insert_non_block(new_block, node, block);
    }

    // ------------------------------------------------------------------
    // Control-flow node removal.

    /// Remove `node` from the tree.
    ///
    /// Blocks are structural padding between non-block nodes, so removing a
    /// block only empties it of instructions. Removing an `if` or `loop`
    /// unlinks it and stitches the two blocks that flanked it. Instructions
    /// inside a removed node are not individually removed; a caller that
    /// leaves register references behind will be caught by the validator.
    pub fn cf_node_remove(&mut self, node: CfNode) {
        log::trace!("removing {}", node);
        match node {
            CfNode::Block(block) => {
                let cleared = std::mem::take(&mut self[block].instrs);
                for inst in cleared {
                    self[inst].block = None.into();
                }
            }
            CfNode::Impl(_) => panic!("a function node cannot be removed"),
            _ => {
                let before = self
                    .cf_prev(node)
                    .expect("non-block node has no preceding block")
                    .unwrap_block();
                let after = self
                    .cf_next(node)
                    .expect("non-block node has no following block")
                    .unwrap_block();

                let (list, pos) = self.cf_position(node);
                self.cf_list_nodes_mut(list).remove(pos);
                self.set_cf_parent(node, None);

                if let CfNode::If(iff) = node {
                    self.remove_if_condition_use(iff);
                }

                self.stitch_blocks(before, after);
            }
        }
    }

    fn add_if_condition_use(&mut self, iff: IfNode) {
        if let Src::Reg(reg_ref) = &self[iff].condition {
            let reg = reg_ref.reg;
            multiset_add(&mut self[reg].if_uses, iff);
        }
    }

    fn remove_if_condition_use(&mut self, iff: IfNode) {
        if let Src::Reg(reg_ref) = &self[iff].condition {
            let reg = reg_ref.reg;
            multiset_remove(&mut self[reg].if_uses, &iff);
        }
    }

    // ------------------------------------------------------------------
    // Instruction insertion and removal.

    fn collect_src(src: &Src, out: &mut SmallVec<[RegOp; 8]>) {
        if let Src::Reg(reg_ref) = src {
            out.push(RegOp::Use(reg_ref.reg));
            if let Some(indirect) = &reg_ref.indirect {
                Self::collect_src(indirect, out);
            }
        }
    }

    fn collect_dest(dest: &Dest, out: &mut SmallVec<[RegOp; 8]>) {
        if let Dest::Reg(reg_ref) = dest {
            out.push(RegOp::Def(reg_ref.reg));
            if let Some(indirect) = &reg_ref.indirect {
                Self::collect_src(indirect, out);
            }
        }
    }

    /// Every register occurrence of `inst`, in a fixed order. Used
    /// symmetrically by the add and remove paths so bookkeeping cannot
    /// drift between them.
    fn collect_reg_ops(&self, inst: Inst) -> SmallVec<[RegOp; 8]> {
        let mut ops = SmallVec::new();
        let collect_pred = |pred: &Option<Src>, out: &mut SmallVec<[RegOp; 8]>| {
            if let Some(src) = pred {
                Self::collect_src(src, out);
            }
        };
        match &self[inst].data {
            InstData::Alu(alu) => {
                Self::collect_dest(&alu.dest.dest, &mut ops);
                for src in &alu.srcs {
                    Self::collect_src(&src.src, &mut ops);
                }
                collect_pred(&alu.predicate, &mut ops);
            }
            InstData::Call(call) => {
                collect_pred(&call.predicate, &mut ops);
            }
            InstData::Intrinsic(intr) => {
                for src in &intr.reg_inputs {
                    Self::collect_src(src, &mut ops);
                }
                for dest in &intr.reg_outputs {
                    Self::collect_dest(dest, &mut ops);
                }
                collect_pred(&intr.predicate, &mut ops);
            }
            InstData::LoadConst(lc) => {
                Self::collect_dest(&lc.dest, &mut ops);
                collect_pred(&lc.predicate, &mut ops);
            }
            InstData::Phi(phi) => {
                Self::collect_dest(&phi.dest, &mut ops);
                for src in &phi.srcs {
                    Self::collect_src(&src.src, &mut ops);
                }
            }
            InstData::Tex(tex) => {
                Self::collect_dest(&tex.dest, &mut ops);
                for src in &tex.srcs {
                    Self::collect_src(&src.src, &mut ops);
                }
                collect_pred(&tex.predicate, &mut ops);
            }
            InstData::Jump(_) | InstData::SsaUndef(_) => {}
        }
        ops
    }

    fn add_defs_uses(&mut self, inst: Inst) {
        for op in self.collect_reg_ops(inst) {
            match op {
                RegOp::Use(reg) => multiset_add(&mut self[reg].uses, inst),
                RegOp::Def(reg) => multiset_add(&mut self[reg].defs, inst),
            }
        }
    }

    fn remove_defs_uses(&mut self, inst: Inst) {
        for op in self.collect_reg_ops(inst) {
            match op {
                RegOp::Use(reg) => multiset_remove(&mut self[reg].uses, &inst),
                RegOp::Def(reg) => multiset_remove(&mut self[reg].defs, &inst),
            }
        }
    }

    fn insert_instr_at(&mut self, block: Block, pos: usize, new: Inst) {
        assert!(
            self[new].block.is_none(),
            "{} is already inserted",
            new
        );
        self[new].block = block.into();
        self[block].instrs.insert(pos, new);
        self.add_defs_uses(new);

        if self[new].data.is_jump() {
            assert_eq!(
                self[block].last_instr(),
                Some(new),
                "a jump must be the last instruction of {}",
                block
            );
            assert!(
                !self[block].instrs[..pos]
                    .iter()
                    .any(|&i| self[i].data.is_jump()),
                "{} already contains a jump",
                block
            );
            self.handle_jump(block);
        } else {
            debug_assert!(
                !self[block].instrs[..pos]
                    .iter()
                    .any(|&i| self[i].data.is_jump()),
                "inserting {} after a jump in {}",
                new,
                block
            );
        }
    }

    /// Insert `new` before `anchor` in `anchor`'s block.
    pub fn instr_insert_before(&mut self, anchor: Inst, new: Inst) {
        let block = self[anchor].block.expand().expect("anchor is not inserted");
        let pos = self.instr_position(block, anchor);
        self.insert_instr_at(block, pos, new);
    }

    /// Insert `new` after `anchor` in `anchor`'s block.
    pub fn instr_insert_after(&mut self, anchor: Inst, new: Inst) {
        let block = self[anchor].block.expand().expect("anchor is not inserted");
        let pos = self.instr_position(block, anchor);
        self.insert_instr_at(block, pos + 1, new);
    }

    fn instr_position(&self, block: Block, inst: Inst) -> usize {
        self[block]
            .instrs
            .iter()
            .position(|&i| i == inst)
            .unwrap_or_else(|| panic!("{} missing from {}", inst, block))
    }

    /// Insert `new` as the first instruction of `block`.
    pub fn instr_insert_before_block(&mut self, block: Block, new: Inst) {
        self.insert_instr_at(block, 0, new);
    }

    /// Insert `new` as the last instruction of `block`.
    pub fn instr_insert_after_block(&mut self, block: Block, new: Inst) {
        let pos = self[block].instrs.len();
        self.insert_instr_at(block, pos, new);
    }

    /// Insert `new` just before `node` in execution order: at the head of a
    /// block node, or at the tail of the block preceding a non-block node.
    pub fn instr_insert_before_cf(&mut self, node: CfNode, new: Inst) {
        match node {
            CfNode::Block(block) => self.instr_insert_before_block(block, new),
            _ => {
                let prev = self
                    .cf_prev(node)
                    .expect("non-block node has no preceding block")
                    .unwrap_block();
                self.instr_insert_after_block(prev, new);
            }
        }
    }

    /// Insert `new` just after `node` in execution order: at the tail of a
    /// block node, or at the head of the block following a non-block node.
    pub fn instr_insert_after_cf(&mut self, node: CfNode, new: Inst) {
        match node {
            CfNode::Block(block) => self.instr_insert_after_block(block, new),
            _ => {
                let next = self
                    .cf_next(node)
                    .expect("non-block node has no following block")
                    .unwrap_block();
                self.instr_insert_before_block(next, new);
            }
        }
    }

    /// Insert `new` before everything in `list`.
    pub fn instr_insert_before_cf_list(&mut self, list: CfList, new: Inst) {
        let first = *self
            .cf_list_nodes(list)
            .first()
            .expect("control-flow list is empty");
        self.instr_insert_before_cf(first, new);
    }

    /// Insert `new` after everything in `list`.
    pub fn instr_insert_after_cf_list(&mut self, list: CfList, new: Inst) {
        let last = *self
            .cf_list_nodes(list)
            .last()
            .expect("control-flow list is empty");
        self.instr_insert_after_cf(last, new);
    }

    /// Remove `inst` from its block and drop its register bookkeeping.
    ///
    /// If `inst` is a jump, the block's successor edges are left as they
    /// are; restoring them is the caller's responsibility.
    pub fn instr_remove(&mut self, inst: Inst) {
        let block = self[inst].block.take().expect("instruction is not inserted");
        let pos = self.instr_position(block, inst);
        self[block].instrs.remove(pos);
        self.remove_defs_uses(inst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instructions::{AluDest, AluSrc, ConstValue, ConstVec};
    use crate::ir::opcodes::Opcode;
    use crate::ir::Shader;

    fn empty_main(shader: &mut Shader) -> FuncImpl {
        let func = shader.create_function("main");
        let overload = shader.create_overload(func);
        shader.create_impl(overload)
    }

    #[test]
    fn loop_insertion_splits_around() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let start = shader[imp].start_block;
        let end = shader[imp].end_block;

        let lp = shader.create_loop();
        shader.cf_node_insert_end(CfList::Body(imp), CfNode::Loop(lp));

        // start, loop, tail.
        let body = shader[imp].body.clone();
        assert_eq!(body.len(), 3);
        assert_eq!(body[0], CfNode::Block(start));
        assert_eq!(body[1], CfNode::Loop(lp));
        let tail = body[2].unwrap_block();

        let header = shader[lp].body[0].unwrap_block();
        assert_eq!(shader[start].successors[0].expand(), Some(header));
        assert!(shader[start].successors[1].is_none());
        assert_eq!(shader[header].successors[0].expand(), Some(header));
        assert_eq!(shader[tail].successors[0].expand(), Some(end));
        assert!(shader[end].predecessors.contains(&tail));
    }

    #[test]
    fn if_insertion_links_both_branches() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let start = shader[imp].start_block;

        let cond = shader.create_local_reg(imp);
        shader[cond].num_components = 1;
        let iff = shader.create_if(Src::reg(cond));
        shader.cf_node_insert_end(CfList::Body(imp), CfNode::If(iff));

        let body = shader[imp].body.clone();
        assert_eq!(body.len(), 3);
        let tail = body[2].unwrap_block();
        let then_block = shader[iff].then_list[0].unwrap_block();
        let else_block = shader[iff].else_list[0].unwrap_block();

        assert_eq!(shader[start].successors[0].expand(), Some(then_block));
        assert_eq!(shader[start].successors[1].expand(), Some(else_block));
        assert_eq!(shader[then_block].successors[0].expand(), Some(tail));
        assert_eq!(shader[else_block].successors[0].expand(), Some(tail));
        assert!(shader[tail].predecessors.contains(&then_block));
        assert!(shader[tail].predecessors.contains(&else_block));

        // Condition use was recorded against the register.
        assert_eq!(shader[cond].if_uses.get(&iff), Some(&1));
    }

    #[test]
    fn insert_then_remove_restores_structure() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let start = shader[imp].start_block;
        let end = shader[imp].end_block;

        let cond = shader.create_local_reg(imp);
        shader[cond].num_components = 1;
        let iff = shader.create_if(Src::reg(cond));
        shader.cf_node_insert_end(CfList::Body(imp), CfNode::If(iff));
        shader.cf_node_remove(CfNode::If(iff));

        // Stitched back to a single block falling through to the end.
        assert_eq!(shader[imp].body.len(), 1);
        assert_eq!(shader[imp].body[0], CfNode::Block(start));
        assert_eq!(shader[start].successors[0].expand(), Some(end));
        assert!(shader[start].successors[1].is_none());
        assert_eq!(shader[end].predecessors.len(), 1);
        assert!(shader[cond].if_uses.is_empty());
    }

    #[test]
    fn jump_insertion_repairs_edges() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let end = shader[imp].end_block;

        let jump = shader.jump_instr(JumpKind::Return);
        shader.instr_insert_after_cf_list(CfList::Body(imp), jump);

        let start = shader[imp].start_block;
        assert_eq!(shader[start].successors[0].expand(), Some(end));
        assert!(shader[start].successors[1].is_none());
        assert_eq!(shader[start].instrs, vec![jump]);
    }

    #[test]
    #[should_panic(expected = "already contains a jump")]
    fn second_jump_refused() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let first = shader.jump_instr(JumpKind::Return);
        shader.instr_insert_after_cf_list(CfList::Body(imp), first);
        let second = shader.jump_instr(JumpKind::Return);
        shader.instr_insert_after_cf_list(CfList::Body(imp), second);
    }

    #[test]
    fn use_def_bookkeeping_round_trips() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let a = shader.create_local_reg(imp);
        shader[a].num_components = 1;
        let b = shader.create_local_reg(imp);
        shader[b].num_components = 1;

        let init = shader.load_const_instr(
            ConstValue::Vector(ConstVec::scalar_i32(7)),
            crate::ir::Dest::reg(a),
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), init);

        // b = a + a: two uses of the same register from one instruction.
        let add = shader.alu_instr(
            Opcode::Iadd,
            AluDest::reg(b),
            vec![AluSrc::reg(a), AluSrc::reg(a)],
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), add);

        assert_eq!(shader[a].defs.get(&init), Some(&1));
        assert_eq!(shader[a].uses.get(&add), Some(&2));
        assert_eq!(shader[b].defs.get(&add), Some(&1));

        shader.instr_remove(add);
        assert!(shader[a].uses.is_empty());
        assert!(shader[b].defs.is_empty());
        assert_eq!(shader[a].defs.get(&init), Some(&1));

        shader.instr_remove(init);
        assert!(shader[a].defs.is_empty());
    }

    #[test]
    fn indirect_operands_tracked_symmetrically() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);

        let arr = shader.create_local_reg(imp);
        shader[arr].num_components = 1;
        shader[arr].num_array_elems = 8;
        let idx = shader.create_local_reg(imp);
        shader[idx].num_components = 1;
        let out = shader.create_local_reg(imp);
        shader[out].num_components = 1;

        let mov = shader.alu_instr(
            Opcode::Mov,
            AluDest::reg(out),
            vec![AluSrc::new(Src::reg_indirect(arr, Src::reg(idx), 0))],
        );
        shader.instr_insert_after_cf_list(CfList::Body(imp), mov);

        assert_eq!(shader[arr].uses.get(&mov), Some(&1));
        assert_eq!(shader[idx].uses.get(&mov), Some(&1));

        shader.instr_remove(mov);
        assert!(shader[arr].uses.is_empty());
        assert!(shader[idx].uses.is_empty(), "indirect use must be removed");
    }

    #[test]
    fn block_removal_only_empties() {
        let mut shader = Shader::new();
        let imp = empty_main(&mut shader);
        let start = shader[imp].start_block;

        let jump = shader.jump_instr(JumpKind::Return);
        shader.instr_insert_after_block(start, jump);
        shader.cf_node_remove(CfNode::Block(start));

        assert_eq!(shader[imp].body.len(), 1);
        assert!(shader[start].instrs.is_empty());
        assert!(shader[jump].block.is_none());
    }
}
