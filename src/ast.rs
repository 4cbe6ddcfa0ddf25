//! # Webql - Abstract Syntax Tree
//!
//! The AST is the compiler's working representation between parsing and
//! translation. It is an arena of [`WebqlNode`]s owned by a [`WebqlQuery`];
//! analysis passes attach scopes and semantics through side tables keyed by
//! [`NodeId`], never by mutating the nodes.
//!
//! ## Submodules
//!
//! - **[expressions]** - node shapes (literal, reference, member access,
//!   block, operation, anonymous object, type conversion)
//! - **[operators]** - the operator enum, its categories and arities
//! - **[query]** - the node arena with parent back-links
//! - **[builder]** - CST -> AST lowering
//!
//! ## Shape of a query
//!
//! ```text
//! { $filter: { age: { $greaterEquals: 18 } } }
//! ```
//!
//! builds
//!
//! ```text
//! Block
//! └─ Operation $filter
//!    ├─ Reference $                    (the source)
//!    └─ Operation $greaterEquals      (the element predicate)
//!       ├─ MemberAccess .age
//!       │  └─ Reference $             (the element)
//!       └─ Literal 18
//! ```

pub mod builder;
pub mod expressions;
pub mod operators;
pub mod query;

pub use builder::AstBuilder;
pub use expressions::{ExprKind, LiteralKind, NodeId, WebqlNode};
pub use operators::{Arity, OperatorCategory, WebqlOperator};
pub use query::WebqlQuery;
