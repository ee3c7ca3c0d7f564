//! Host type model for the assembled-type pipeline.
//!
//! This crate holds everything the pipeline core treats as an external
//! collaborator: finished [`RuntimeType`]s, [`MutableType`]s under
//! construction, the small [`Expr`] language used by type initializers, and
//! the backend SPI ([`CodeEmitter`], [`GeneratedCodeFlusher`],
//! [`MutableTypeFactory`], [`ConstructorDelegateFactory`]) together with
//! in-memory reference implementations.

pub mod ctor;
pub mod emit;
pub mod expr;
pub mod factory;
pub mod mutable;
pub mod runtime_type;
pub mod value;

pub use ctor::{
    ConstructorCall, ConstructorDelegateFactory, ConstructorLookupError,
    DefaultConstructorDelegateFactory, DelegateShape, Instance, InvocationError,
};
pub use emit::{
    CodeBackend, CodeEmitter, EmitError, EmitErrorKind, FlushedModule, GeneratedCodeFlusher,
    ModuleEmitter, ModuleManifest,
};
pub use expr::{EvalEnv, EvalError, Expr, FlatValue, NewExpr, StaticType, ValueConstructor};
pub use factory::{DefaultMutableTypeFactory, MutableTypeFactory};
pub use mutable::{
    ArenaId, FieldDecl, MethodDecl, MutableType, MutableTypeArena, MutableTypeId, TypeRef,
};
pub use runtime_type::{
    ConstructorSignature, CustomAttribute, RuntimeType, RuntimeTypeBuilder, TypeAttributes,
    TypeKey, TypeOrigin, Visibility,
};
pub use value::{OpaqueValue, Value, ValueKind};
