//! Shader IR entity references.
//!
//! Objects in the IR reference each other freely: instructions name the
//! registers they touch, blocks name their successor blocks, and control-flow
//! nodes name their parents. These references are not Rust references — both
//! because the graphs involved are cyclic and because 64-bit pointers take up
//! a lot of space. Instead, every object class gets a typed `u32` index into
//! a table owned by the [`Shader`](super::Shader), which acts as the arena
//! for the whole IR.
//!
//! All entity references implement `Display` in the textual IR format.

use core::fmt;
use glint_entity::entity_impl;

/// An opaque reference to a function: one name with one or more overloads.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Function(u32);
entity_impl!(Function, "fn");

/// An opaque reference to one signature of a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Overload(u32);
entity_impl!(Overload, "sig");

/// An opaque reference to the body of a function overload.
///
/// A `FuncImpl` is also the root node of its body's control-flow tree; see
/// [`CfNode::Impl`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncImpl(u32);
entity_impl!(FuncImpl, "impl");

/// An opaque reference to a basic block: the leaf of the control-flow tree
/// and the node of the control-flow graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// An opaque reference to an `if` control-flow node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IfNode(u32);
entity_impl!(IfNode, "if");

/// An opaque reference to a `loop` control-flow node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopNode(u32);
entity_impl!(LoopNode, "loop");

/// An opaque reference to an instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// An opaque reference to an SSA value: an immutable value produced by
/// exactly one instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value, "v");

/// An opaque reference to a register: a mutable value store of 1–4
/// components, optionally with an array dimension.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(u32);
entity_impl!(Reg, "r");

/// An opaque reference to a variable: a uniform, shader input, shader
/// output, global, or function local.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(u32);
entity_impl!(Variable, "var");

/// An opaque reference to an interned type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);
entity_impl!(Type, "ty");

/// A reference to any node of the structured control-flow tree.
///
/// The tree is composed of four node classes: basic blocks at the leaves,
/// `if` and `loop` nodes in the middle, and the function implementation at
/// the root. `CfNode` is the tagged handle passed around by the builder;
/// pattern matching replaces the downcasts a pointer-based representation
/// would need.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum CfNode {
    /// A basic block.
    Block(Block),
    /// An `if` node with its two branch lists.
    If(IfNode),
    /// A `loop` node with its body list.
    Loop(LoopNode),
    /// A function implementation; only ever the root, never inside a list.
    Impl(FuncImpl),
}

impl CfNode {
    /// Is this node a basic block?
    pub fn is_block(self) -> bool {
        matches!(self, Self::Block(_))
    }

    /// Return the block this node refers to, or panic.
    ///
    /// Several builder paths are only reachable when an invariant guarantees
    /// the node is a block; this is the checked downcast they use.
    #[track_caller]
    pub fn unwrap_block(self) -> Block {
        match self {
            Self::Block(block) => block,
            node => panic!("expected a block, got {}", node),
        }
    }
}

impl fmt::Display for CfNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Block(r) => r.fmt(f),
            Self::If(r) => r.fmt(f),
            Self::Loop(r) => r.fmt(f),
            Self::Impl(r) => r.fmt(f),
        }
    }
}

impl fmt::Debug for CfNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

impl From<Block> for CfNode {
    fn from(r: Block) -> Self {
        Self::Block(r)
    }
}

impl From<IfNode> for CfNode {
    fn from(r: IfNode) -> Self {
        Self::If(r)
    }
}

impl From<LoopNode> for CfNode {
    fn from(r: LoopNode) -> Self {
        Self::Loop(r)
    }
}

impl From<FuncImpl> for CfNode {
    fn from(r: FuncImpl) -> Self {
        Self::Impl(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_entity::packed_option::PackedOption;
    use glint_entity::EntityRef;

    #[test]
    fn display() {
        assert_eq!(Block::new(0).to_string(), "block0");
        assert_eq!(Value::new(12).to_string(), "v12");
        assert_eq!(Reg::new(3).to_string(), "r3");
        assert_eq!(CfNode::Loop(LoopNode::new(1)).to_string(), "loop1");
    }

    #[test]
    fn memory() {
        use core::mem;
        assert_eq!(
            mem::size_of::<Block>(),
            mem::size_of::<PackedOption<Block>>()
        );
    }
}
