//! The glint shader intermediate representation.
//!
//! This crate defines the program representation shared by the middle-end of
//! a shader compiler: the [`ir::Shader`] container with its functions,
//! variables, registers, and instructions; the builder operations that
//! mutate the structured control-flow tree while keeping the basic-block
//! control-flow graph consistent with it; and the validator that checks
//! every structural invariant after mutation.
//!
//! The representation is single-owner and single-threaded: all mutation goes
//! through `&mut Shader`, and invariant violations are compiler bugs that
//! abort the process rather than errors that are reported to users.

#![deny(missing_docs)]

pub use glint_entity as entity;

pub mod builder;
pub mod ir;
pub mod validate;

pub use crate::validate::validate_shader;
