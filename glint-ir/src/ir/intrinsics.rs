//! The intrinsic table.
//!
//! Intrinsics are the opaque operations the ALU table cannot express:
//! variable loads and stores, reads of shader inputs, uniforms and uniform
//! blocks, and writes of shader outputs. Each intrinsic is described by one
//! [`IntrinsicInfo`] row giving the shapes of its register inputs and
//! outputs, how many variable (deref) operands it takes, whether it carries a
//! 32-bit constant index, and its optimization flags.

use bitflags::bitflags;
use core::fmt;

bitflags! {
    /// Optimization-relevant properties of an intrinsic.
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct IntrinsicFlags: u8 {
        /// The instruction can be dropped if its results are unused.
        const CAN_ELIMINATE = 0x1;
        /// The instruction can be moved across unrelated instructions.
        /// Implies `CAN_ELIMINATE`.
        const CAN_REORDER = 0x2;
    }
}

/// Static description of one intrinsic.
pub struct IntrinsicInfo {
    /// Lower-case intrinsic name.
    pub name: &'static str,
    /// Number of register/SSA inputs.
    pub num_reg_inputs: u8,
    /// Component count of each register input.
    pub reg_input_components: [u8; 4],
    /// Number of register/SSA outputs.
    pub num_reg_outputs: u8,
    /// Component count of each register output.
    pub reg_output_components: [u8; 2],
    /// Number of variable (deref) operands.
    pub num_variables: u8,
    /// Does the instruction carry a 32-bit constant index?
    pub has_const_index: bool,
    /// Optimization flags.
    pub flags: IntrinsicFlags,
}

macro_rules! intrinsics {
    ($( $variant:ident = $name:literal, $ins:expr, $in_comps:expr, $outs:expr,
        $out_comps:expr, $vars:expr, $const_index:expr, $flags:expr; )*) => {
        /// An intrinsic operation.
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        #[allow(missing_docs)]
        pub enum Intrinsic {
            $( $variant, )*
        }

        /// Total number of intrinsics.
        pub const INTRINSIC_COUNT: usize = [ $( $name ),* ].len();

        /// Static description of every intrinsic, indexed by the enum tag.
        pub static INTRINSIC_INFO: [IntrinsicInfo; INTRINSIC_COUNT] = [
            $(
                IntrinsicInfo {
                    name: $name,
                    num_reg_inputs: $ins,
                    reg_input_components: $in_comps,
                    num_reg_outputs: $outs,
                    reg_output_components: $out_comps,
                    num_variables: $vars,
                    has_const_index: $const_index,
                    flags: $flags,
                },
            )*
        ];
    };
}

const NONE: IntrinsicFlags = IntrinsicFlags::empty();
const ELIM: IntrinsicFlags = IntrinsicFlags::CAN_ELIMINATE;
const RELOAD: IntrinsicFlags = IntrinsicFlags::CAN_ELIMINATE.union(IntrinsicFlags::CAN_REORDER);

intrinsics! {
    // Variable access. The width-suffixed forms exist because the table is
    // static: the destination width must be readable from the row alone.
    LoadVarVec1 = "load_var_vec1", 0, [0, 0, 0, 0], 1, [1, 0], 1, false, ELIM;
    LoadVarVec2 = "load_var_vec2", 0, [0, 0, 0, 0], 1, [2, 0], 1, false, ELIM;
    LoadVarVec3 = "load_var_vec3", 0, [0, 0, 0, 0], 1, [3, 0], 1, false, ELIM;
    LoadVarVec4 = "load_var_vec4", 0, [0, 0, 0, 0], 1, [4, 0], 1, false, ELIM;
    StoreVarVec1 = "store_var_vec1", 1, [1, 0, 0, 0], 0, [0, 0], 1, false, NONE;
    StoreVarVec2 = "store_var_vec2", 1, [2, 0, 0, 0], 0, [0, 0], 1, false, NONE;
    StoreVarVec3 = "store_var_vec3", 1, [3, 0, 0, 0], 0, [0, 0], 1, false, NONE;
    StoreVarVec4 = "store_var_vec4", 1, [4, 0, 0, 0], 0, [0, 0], 1, false, NONE;
    CopyVar = "copy_var", 0, [0, 0, 0, 0], 0, [0, 0], 2, false, NONE;

    // Memory loads: one scalar offset input, one vec4 result. Read-only
    // memory is reorderable.
    LoadUniform = "load_uniform", 1, [1, 0, 0, 0], 1, [4, 0], 0, false, RELOAD;
    LoadUbo = "load_ubo", 1, [1, 0, 0, 0], 1, [4, 0], 0, true, RELOAD;
    LoadInput = "load_input", 1, [1, 0, 0, 0], 1, [4, 0], 0, false, RELOAD;

    // Output store: scalar offset plus a vec4 value.
    StoreOutput = "store_output", 2, [1, 4, 0, 0], 0, [0, 0], 0, false, NONE;
}

impl Intrinsic {
    /// Look up this intrinsic's static description.
    pub fn info(self) -> &'static IntrinsicInfo {
        &INTRINSIC_INFO[self as usize]
    }

    /// Can instructions with this intrinsic be dropped when unused?
    pub fn can_eliminate(self) -> bool {
        self.info().flags.contains(IntrinsicFlags::CAN_ELIMINATE)
    }

    /// Can instructions with this intrinsic move across unrelated ones?
    pub fn can_reorder(self) -> bool {
        self.info().flags.contains(IntrinsicFlags::CAN_REORDER)
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_implies_eliminate() {
        for info in &INTRINSIC_INFO {
            if info.flags.contains(IntrinsicFlags::CAN_REORDER) {
                assert!(
                    info.flags.contains(IntrinsicFlags::CAN_ELIMINATE),
                    "{} is reorderable but not eliminable",
                    info.name
                );
            }
        }
    }

    #[test]
    fn shapes() {
        let load = Intrinsic::LoadVarVec3.info();
        assert_eq!(load.num_reg_inputs, 0);
        assert_eq!(load.num_reg_outputs, 1);
        assert_eq!(load.reg_output_components[0], 3);
        assert_eq!(load.num_variables, 1);

        let store = Intrinsic::StoreOutput.info();
        assert_eq!(store.num_reg_inputs, 2);
        assert_eq!(store.reg_input_components[0], 1);
        assert_eq!(store.reg_input_components[1], 4);
        assert!(!store.flags.contains(IntrinsicFlags::CAN_ELIMINATE));

        assert!(Intrinsic::LoadUbo.info().has_const_index);
        assert!(Intrinsic::LoadUniform.can_reorder());
        assert!(!Intrinsic::StoreVarVec2.can_eliminate());
    }
}
