//! Lexical scopes and symbol tables.
//!
//! Scopes form a tree mirroring the query's nesting: the root scope owns the
//! source symbol, and every lambda operand of a collection operator opens a
//! child scope owning that lambda's element symbol. Both symbols are named
//! `$`; an inner element shadows the outer source through ordinary
//! innermost-first resolution.
//!
//! A scope's table is seeded with a shallow copy of its parent's entries at
//! creation time, and lookups that miss locally still walk the live parent
//! chain — so declarations made in an ancestor after the child was created
//! remain visible, while the child's own entries always win.

use std::collections::{HashMap, HashSet};

use crate::ast::{ExprKind, NodeId, WebqlOperator};
use crate::error::SemanticError;
use crate::semantics::{Compilation, SemanticAnalyzer};
use crate::types::WebqlType;

pub type ScopeId = usize;

/// Why a scope exists, for diagnostics and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Filtering,
    Projection,
    Aggregation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// The root queryable the compilation runs against
    Source,
    /// The implicit per-element iteration variable of a lambda
    Element,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub identifier: String,
    pub kind: SymbolKind,
    pub declared_type: WebqlType,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
    /// Identifiers declared directly in this scope (as opposed to seeded
    /// from the parent); only these participate in the redeclaration check.
    local: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree { scopes: Vec::new() }
    }

    pub fn create(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let symbols = parent
            .map(|id| self.scopes[id].symbols.clone())
            .unwrap_or_default();
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent,
            kind,
            symbols,
            local: HashSet::new(),
        });
        id
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope].kind
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope].parent
    }

    /// Declares a symbol in `scope`. Shadowing an ancestor's symbol is fine;
    /// redeclaring within the same scope is not.
    pub fn declare(&mut self, scope: ScopeId, symbol: Symbol) -> Result<(), SemanticError> {
        let entry = &mut self.scopes[scope];
        if !entry.local.insert(symbol.identifier.clone()) {
            return Err(SemanticError::SymbolAlreadyDeclared {
                identifier: symbol.identifier,
            });
        }
        entry.symbols.insert(symbol.identifier.clone(), symbol);
        Ok(())
    }

    /// Innermost-first resolution: the scope's own table (seeded entries
    /// included), then the live parent chain.
    pub fn resolve(&self, scope: ScopeId, identifier: &str) -> Option<&Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = &self.scopes[id];
            if let Some(symbol) = entry.symbols.get(identifier) {
                return Some(symbol);
            }
            current = entry.parent;
        }
        None
    }
}

/// Two-pass binder: attach scopes to scope-introducing nodes, then declare
/// the source and element symbols. Element types come from the semantic
/// analyzer, invoked on each collection operator's source operand — legal
/// because symbols are declared in pre-order, so everything the source
/// expression references is already bound.
pub struct Binder;

impl Binder {
    pub fn bind(
        compilation: &mut Compilation,
        analyzer: &SemanticAnalyzer,
    ) -> Result<(), SemanticError> {
        let root = compilation.query().root();
        let root_scope = compilation.scopes_mut().create(None, ScopeKind::Root);
        compilation.attach_scope(root, root_scope, false);
        Self::bind_scopes(compilation, root, root_scope);

        let source_type = compilation.source_type().clone();
        compilation.scopes_mut().declare(
            root_scope,
            Symbol {
                identifier: "$".to_string(),
                kind: SymbolKind::Source,
                declared_type: source_type,
            },
        )?;
        Self::declare_symbols(compilation, analyzer, root)
    }

    fn bind_scopes(compilation: &mut Compilation, node: NodeId, enclosing: ScopeId) {
        let kind = compilation.query().node(node).kind.clone();
        match kind {
            ExprKind::Operation { operator, operands } => {
                let lambda = operator.lambda_operand();
                for (index, operand) in operands.iter().enumerate() {
                    let scope = if lambda == Some(index) {
                        let created = compilation
                            .scopes_mut()
                            .create(Some(enclosing), scope_kind_of(operator));
                        compilation.attach_scope(*operand, created, false);
                        created
                    } else {
                        enclosing
                    };
                    Self::bind_scopes(compilation, *operand, scope);
                }
            }
            ExprKind::AnonymousObject { properties } => {
                let created = compilation
                    .scopes_mut()
                    .create(Some(enclosing), ScopeKind::Projection);
                compilation.attach_scope(node, created, false);
                for (_, property) in properties {
                    Self::bind_scopes(compilation, property, created);
                }
            }
            other => {
                for child in other.children() {
                    Self::bind_scopes(compilation, child, enclosing);
                }
            }
        }
    }

    fn declare_symbols(
        compilation: &mut Compilation,
        analyzer: &SemanticAnalyzer,
        node: NodeId,
    ) -> Result<(), SemanticError> {
        let kind = compilation.query().node(node).kind.clone();
        let (operator, operands) = match kind {
            ExprKind::Operation { operator, operands } => (operator, operands),
            other => {
                for child in other.children() {
                    Self::declare_symbols(compilation, analyzer, child)?;
                }
                return Ok(());
            }
        };
        let lambda = operator.lambda_operand();
        // Malformed operand counts are an arity error for the analyzer to
        // report; there is no lambda to bind here.
        let Some(lambda) = lambda.filter(|index| *index < operands.len()) else {
            for operand in operands {
                Self::declare_symbols(compilation, analyzer, operand)?;
            }
            return Ok(());
        };

        // Source operands first: an explicit source may itself contain
        // lambdas whose symbols must exist before it can be typed.
        for operand in &operands[..lambda] {
            Self::declare_symbols(compilation, analyzer, *operand)?;
        }

        let source = operands[0];
        let source_semantics = analyzer.semantics(compilation, source)?;
        let element_type = source_semantics
            .result_type
            .element_type()
            .cloned()
            .ok_or_else(|| SemanticError::NotQueryable {
                found: source_semantics.result_type.to_string(),
                span: compilation.query().span(source),
            })?;

        let scope = compilation.scope_of(operands[lambda]);
        compilation.scopes_mut().declare(
            scope,
            Symbol {
                identifier: "$".to_string(),
                kind: SymbolKind::Element,
                declared_type: element_type,
            },
        )?;

        for operand in &operands[lambda..] {
            Self::declare_symbols(compilation, analyzer, *operand)?;
        }
        Ok(())
    }
}

fn scope_kind_of(operator: WebqlOperator) -> ScopeKind {
    use WebqlOperator::*;
    match operator {
        Filter => ScopeKind::Filtering,
        Select | SelectMany => ScopeKind::Projection,
        _ => ScopeKind::Aggregation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(identifier: &str, kind: SymbolKind, declared_type: WebqlType) -> Symbol {
        Symbol {
            identifier: identifier.to_string(),
            kind,
            declared_type,
        }
    }

    #[test]
    fn inner_element_shadows_outer_source() {
        let mut tree = ScopeTree::new();
        let root = tree.create(None, ScopeKind::Root);
        tree.declare(root, symbol("$", SymbolKind::Source, WebqlType::queryable(WebqlType::Int)))
            .unwrap();
        let inner = tree.create(Some(root), ScopeKind::Filtering);
        tree.declare(inner, symbol("$", SymbolKind::Element, WebqlType::Int))
            .unwrap();

        assert_eq!(tree.resolve(inner, "$").unwrap().kind, SymbolKind::Element);
        assert_eq!(tree.resolve(root, "$").unwrap().kind, SymbolKind::Source);
    }

    #[test]
    fn redeclaring_in_the_same_scope_fails() {
        let mut tree = ScopeTree::new();
        let root = tree.create(None, ScopeKind::Root);
        tree.declare(root, symbol("$", SymbolKind::Source, WebqlType::Int))
            .unwrap();
        let err = tree
            .declare(root, symbol("$", SymbolKind::Source, WebqlType::Int))
            .unwrap_err();
        assert!(matches!(err, SemanticError::SymbolAlreadyDeclared { .. }));
    }

    #[test]
    fn late_parent_declarations_stay_visible_through_the_live_walk() {
        let mut tree = ScopeTree::new();
        let root = tree.create(None, ScopeKind::Root);
        let child = tree.create(Some(root), ScopeKind::Projection);
        // declared after the child was created
        tree.declare(root, symbol("$", SymbolKind::Source, WebqlType::Bool))
            .unwrap();
        assert_eq!(tree.resolve(child, "$").unwrap().kind, SymbolKind::Source);
    }
}
