//! The ALU opcode table.
//!
//! Every ALU opcode is described by one [`OpInfo`] row: its arity, whether it
//! operates per-component, and its explicit output/input widths when it does
//! not. The enumeration is closed; adding an opcode is a table change, not a
//! schema change, and the `opcodes!` macro keeps the enum and the table from
//! drifting apart.
//!
//! Width interpretation: if `per_component` is set, the operation runs
//! independently on each component selected by the destination write mask,
//! sourcing the correspondingly swizzled component of each input. If it is
//! not set, `output_size` components are written and input `i` is read as
//! `input_sizes[i]` components. A nonzero `input_sizes[i]` on a
//! per-component opcode pins that one operand to a fixed width (the
//! conditional-select shapes use this); a zero entry on a horizontal opcode
//! makes that operand follow the per-component rule.

use core::fmt;

/// Static description of one ALU opcode.
pub struct OpInfo {
    /// Lower-case opcode mnemonic.
    pub name: &'static str,
    /// Number of input operands, 1–4.
    pub num_inputs: u8,
    /// Does the operation run independently per written component?
    pub per_component: bool,
    /// Components written when not per-component.
    pub output_size: u8,
    /// Components read per input when not per-component; 0 entries follow
    /// per-component semantics.
    pub input_sizes: [u8; 4],
}

macro_rules! opcodes {
    ($( $variant:ident = $name:literal, $num_inputs:expr, $per_comp:expr, $out:expr, $sizes:expr; )*) => {
        /// An ALU opcode.
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        #[allow(missing_docs)]
        pub enum Opcode {
            $( $variant, )*
        }

        /// Total number of opcodes.
        pub const OPCODE_COUNT: usize = [ $( $name ),* ].len();

        /// Static description of every opcode, indexed by the enum tag.
        pub static OPCODE_INFO: [OpInfo; OPCODE_COUNT] = [
            $(
                OpInfo {
                    name: $name,
                    num_inputs: $num_inputs,
                    per_component: $per_comp,
                    output_size: $out,
                    input_sizes: $sizes,
                },
            )*
        ];
    };
}

opcodes! {
    // Unary, per-component.
    Mov = "mov", 1, true, 0, [0, 0, 0, 0];

    Inot = "inot", 1, true, 0, [0, 0, 0, 0]; // invert every bit of the integer
    Fnot = "fnot", 1, true, 0, [0, 0, 0, 0]; // (src == 0.0) ? 1.0 : 0.0
    Fneg = "fneg", 1, true, 0, [0, 0, 0, 0];
    Ineg = "ineg", 1, true, 0, [0, 0, 0, 0];
    Fabs = "fabs", 1, true, 0, [0, 0, 0, 0];
    Iabs = "iabs", 1, true, 0, [0, 0, 0, 0];
    Fsign = "fsign", 1, true, 0, [0, 0, 0, 0];
    Isign = "isign", 1, true, 0, [0, 0, 0, 0];
    Frcp = "frcp", 1, true, 0, [0, 0, 0, 0];
    Frsq = "frsq", 1, true, 0, [0, 0, 0, 0];
    Fsqrt = "fsqrt", 1, true, 0, [0, 0, 0, 0];
    Fexp = "fexp", 1, true, 0, [0, 0, 0, 0]; // e^x
    Flog = "flog", 1, true, 0, [0, 0, 0, 0]; // log base e
    Fexp2 = "fexp2", 1, true, 0, [0, 0, 0, 0];
    Flog2 = "flog2", 1, true, 0, [0, 0, 0, 0];
    F2i = "f2i", 1, true, 0, [0, 0, 0, 0];
    F2u = "f2u", 1, true, 0, [0, 0, 0, 0];
    I2f = "i2f", 1, true, 0, [0, 0, 0, 0];
    F2b = "f2b", 1, true, 0, [0, 0, 0, 0];
    B2f = "b2f", 1, true, 0, [0, 0, 0, 0];
    I2b = "i2b", 1, true, 0, [0, 0, 0, 0];
    U2f = "u2f", 1, true, 0, [0, 0, 0, 0];

    // Horizontal reductions: ~0 (b*) or 1.0 (f*) when any/all components
    // of the input are nonzero.
    Bany2 = "bany2", 1, false, 1, [2, 0, 0, 0];
    Bany3 = "bany3", 1, false, 1, [3, 0, 0, 0];
    Bany4 = "bany4", 1, false, 1, [4, 0, 0, 0];
    Ball2 = "ball2", 1, false, 1, [2, 0, 0, 0];
    Ball3 = "ball3", 1, false, 1, [3, 0, 0, 0];
    Ball4 = "ball4", 1, false, 1, [4, 0, 0, 0];
    Fany2 = "fany2", 1, false, 1, [2, 0, 0, 0];
    Fany3 = "fany3", 1, false, 1, [3, 0, 0, 0];
    Fany4 = "fany4", 1, false, 1, [4, 0, 0, 0];
    Fall2 = "fall2", 1, false, 1, [2, 0, 0, 0];
    Fall3 = "fall3", 1, false, 1, [3, 0, 0, 0];
    Fall4 = "fall4", 1, false, 1, [4, 0, 0, 0];

    // Rounding.
    Ftrunc = "ftrunc", 1, true, 0, [0, 0, 0, 0];
    Fceil = "fceil", 1, true, 0, [0, 0, 0, 0];
    Ffloor = "ffloor", 1, true, 0, [0, 0, 0, 0];
    Ffract = "ffract", 1, true, 0, [0, 0, 0, 0];
    FroundEven = "fround_even", 1, true, 0, [0, 0, 0, 0];

    // Trigonometry.
    Fsin = "fsin", 1, true, 0, [0, 0, 0, 0];
    Fcos = "fcos", 1, true, 0, [0, 0, 0, 0];

    // Partial derivatives.
    Fddx = "fddx", 1, true, 0, [0, 0, 0, 0];
    Fddy = "fddy", 1, true, 0, [0, 0, 0, 0];

    // Floating point pack and unpack.
    PackSnorm2x16 = "pack_snorm_2x16", 1, false, 1, [2, 0, 0, 0];
    PackSnorm4x8 = "pack_snorm_4x8", 1, false, 1, [4, 0, 0, 0];
    PackUnorm2x16 = "pack_unorm_2x16", 1, false, 1, [2, 0, 0, 0];
    PackUnorm4x8 = "pack_unorm_4x8", 1, false, 1, [4, 0, 0, 0];
    PackHalf2x16 = "pack_half_2x16", 1, false, 1, [2, 0, 0, 0];
    UnpackSnorm2x16 = "unpack_snorm_2x16", 1, false, 2, [1, 0, 0, 0];
    UnpackSnorm4x8 = "unpack_snorm_4x8", 1, false, 4, [1, 0, 0, 0];
    UnpackUnorm2x16 = "unpack_unorm_2x16", 1, false, 2, [1, 0, 0, 0];
    UnpackUnorm4x8 = "unpack_unorm_4x8", 1, false, 4, [1, 0, 0, 0];
    UnpackHalf2x16 = "unpack_half_2x16", 1, false, 2, [1, 0, 0, 0];
    UnpackHalf2x16SplitX = "unpack_half_2x16_split_x", 1, false, 1, [1, 0, 0, 0];
    UnpackHalf2x16SplitY = "unpack_half_2x16_split_y", 1, false, 1, [1, 0, 0, 0];

    // Bit operations.
    BitfieldReverse = "bitfield_reverse", 1, true, 0, [0, 0, 0, 0];
    BitCount = "bit_count", 1, true, 0, [0, 0, 0, 0];
    FindMsb = "find_msb", 1, true, 0, [0, 0, 0, 0];
    FindLsb = "find_lsb", 1, true, 0, [0, 0, 0, 0];

    // Noise over 2-4 component coordinates, producing 1-4 components.
    Fnoise1_2 = "fnoise1_2", 1, false, 1, [2, 0, 0, 0];
    Fnoise1_3 = "fnoise1_3", 1, false, 1, [3, 0, 0, 0];
    Fnoise1_4 = "fnoise1_4", 1, false, 1, [4, 0, 0, 0];
    Fnoise2_2 = "fnoise2_2", 1, false, 2, [2, 0, 0, 0];
    Fnoise2_3 = "fnoise2_3", 1, false, 2, [3, 0, 0, 0];
    Fnoise2_4 = "fnoise2_4", 1, false, 2, [4, 0, 0, 0];
    Fnoise3_2 = "fnoise3_2", 1, false, 3, [2, 0, 0, 0];
    Fnoise3_3 = "fnoise3_3", 1, false, 3, [3, 0, 0, 0];
    Fnoise3_4 = "fnoise3_4", 1, false, 3, [4, 0, 0, 0];
    Fnoise4_2 = "fnoise4_2", 1, false, 4, [2, 0, 0, 0];
    Fnoise4_3 = "fnoise4_3", 1, false, 4, [3, 0, 0, 0];
    Fnoise4_4 = "fnoise4_4", 1, false, 4, [4, 0, 0, 0];

    // Binary arithmetic.
    Fadd = "fadd", 2, true, 0, [0, 0, 0, 0];
    Iadd = "iadd", 2, true, 0, [0, 0, 0, 0];
    Fsub = "fsub", 2, true, 0, [0, 0, 0, 0];
    Isub = "isub", 2, true, 0, [0, 0, 0, 0];
    Fmul = "fmul", 2, true, 0, [0, 0, 0, 0];
    Imul = "imul", 2, true, 0, [0, 0, 0, 0]; // low 32 bits of signed/unsigned multiply
    ImulHigh = "imul_high", 2, true, 0, [0, 0, 0, 0];
    UmulHigh = "umul_high", 2, true, 0, [0, 0, 0, 0];
    Fdiv = "fdiv", 2, true, 0, [0, 0, 0, 0];
    Idiv = "idiv", 2, true, 0, [0, 0, 0, 0];
    Udiv = "udiv", 2, true, 0, [0, 0, 0, 0];
    UaddCarry = "uadd_carry", 2, true, 0, [0, 0, 0, 0];
    UsubBorrow = "usub_borrow", 2, true, 0, [0, 0, 0, 0];
    Fmod = "fmod", 2, true, 0, [0, 0, 0, 0];

    // Comparisons producing a boolean (0 or ~0).
    Flt = "flt", 2, true, 0, [0, 0, 0, 0];
    Fge = "fge", 2, true, 0, [0, 0, 0, 0];
    Feq = "feq", 2, true, 0, [0, 0, 0, 0];
    Fne = "fne", 2, true, 0, [0, 0, 0, 0];
    Ilt = "ilt", 2, true, 0, [0, 0, 0, 0];
    Ige = "ige", 2, true, 0, [0, 0, 0, 0];
    Ieq = "ieq", 2, true, 0, [0, 0, 0, 0];
    Ine = "ine", 2, true, 0, [0, 0, 0, 0];
    Ult = "ult", 2, true, 0, [0, 0, 0, 0];
    Uge = "uge", 2, true, 0, [0, 0, 0, 0];

    // Comparisons for integer-less hardware, producing 1.0 or 0.0.
    Slt = "slt", 2, true, 0, [0, 0, 0, 0];
    Sge = "sge", 2, true, 0, [0, 0, 0, 0];
    Seq = "seq", 2, true, 0, [0, 0, 0, 0];
    Sne = "sne", 2, true, 0, [0, 0, 0, 0];

    // Shifts.
    Ishl = "ishl", 2, true, 0, [0, 0, 0, 0];
    Ishr = "ishr", 2, true, 0, [0, 0, 0, 0];
    Ushr = "ushr", 2, true, 0, [0, 0, 0, 0];

    // Bitwise logic, doubling as boolean logic on integer hardware.
    Iand = "iand", 2, true, 0, [0, 0, 0, 0];
    Ior = "ior", 2, true, 0, [0, 0, 0, 0];
    Ixor = "ixor", 2, true, 0, [0, 0, 0, 0];

    // Floating point logic: (src != 0.0) truth, 1.0/0.0 result.
    Fand = "fand", 2, true, 0, [0, 0, 0, 0];
    For = "for", 2, true, 0, [0, 0, 0, 0];
    Fxor = "fxor", 2, true, 0, [0, 0, 0, 0];

    Fdot2 = "fdot2", 2, false, 1, [2, 2, 0, 0];
    Fdot3 = "fdot3", 2, false, 1, [3, 3, 0, 0];
    Fdot4 = "fdot4", 2, false, 1, [4, 4, 0, 0];

    Fmin = "fmin", 2, true, 0, [0, 0, 0, 0];
    Imin = "imin", 2, true, 0, [0, 0, 0, 0];
    Fmax = "fmax", 2, true, 0, [0, 0, 0, 0];
    Imax = "imax", 2, true, 0, [0, 0, 0, 0];
    Umax = "umax", 2, true, 0, [0, 0, 0, 0];

    Fpow = "fpow", 2, true, 0, [0, 0, 0, 0];

    PackHalf2x16Split = "pack_half_2x16_split", 2, false, 1, [1, 1, 0, 0];

    Bfm = "bfm", 2, true, 0, [0, 0, 0, 0];
    Ldexp = "ldexp", 2, true, 0, [0, 0, 0, 0];

    // Combines the first component of each input into a 2-component vector.
    Vec2 = "vec2", 2, false, 2, [1, 1, 0, 0];

    // Ternary.
    Ffma = "ffma", 3, true, 0, [0, 0, 0, 0];
    Flrp = "flrp", 3, true, 0, [0, 0, 0, 0];

    // Conditional select: ?: operating per-component, with a pinned
    // single-component condition. Float-bool and integer-bool variants.
    Fcsel = "fcsel", 3, true, 0, [1, 0, 0, 0];
    Icsel = "icsel", 3, true, 0, [1, 0, 0, 0];

    Bfi = "bfi", 3, true, 0, [0, 0, 0, 0];

    FvectorInsert = "fvector_insert", 3, true, 0, [0, 1, 1, 0];
    IvectorInsert = "ivector_insert", 3, true, 0, [0, 1, 1, 0];

    // Combines the first component of each input into a 3-component vector.
    Vec3 = "vec3", 3, false, 3, [1, 1, 1, 0];

    // Quaternary.
    BitfieldInsert = "bitfield_insert", 4, true, 0, [0, 0, 0, 0];

    // Combines the first component of each input into a 4-component vector.
    Vec4 = "vec4", 4, false, 4, [1, 1, 1, 1];
}

impl Opcode {
    /// Look up this opcode's static description.
    pub fn info(self) -> &'static OpInfo {
        &OPCODE_INFO[self as usize]
    }

    /// Number of input operands.
    pub fn num_inputs(self) -> usize {
        self.info().num_inputs as usize
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.info().name)
    }
}
