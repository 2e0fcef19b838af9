//! The frontend: host programs to prepared trees.
//!
//! The host parser produces an [`ast`]; architectures describe entities in
//! a [`Design`]. [`prepare_design`] walks every synthesizable context with
//! the [`lower::Lowerer`], executing compile-time host code and recording
//! hardware operations as [`prepared`] nodes.

pub mod ast;
pub mod definition;
pub mod design;
pub mod heap;
pub mod intrinsics;
pub mod lower;
pub mod prepare;
pub mod prepared;
pub mod value;

pub use design::{
    BlockDeclId, ContextDecl, Design, EntityAttrs, EntityDeclId, InstanceDecl, PortBinding,
};
pub use heap::{FunctionId, Heap};
pub use intrinsics::{Intrinsic, IntrinsicRegistry};
pub use prepare::{prepare_design, PreparedBlock, PreparedContext, PreparedDesign, PreparedEntity};
pub use prepared::{
    FlowFlags, HookId, MergedId, Node, NodeId, NodeKind, PreparedTree, SelectCase,
};
pub use value::{HostValue, TypeExpr};
