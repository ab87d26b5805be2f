//! Lexical scope tree.
//!
//! Scopes own the free type variables introduced while checking their body.
//! A generalization at the close of a scope quantifies exactly the free
//! variables still owned by that scope or one of its descendants.

use cranelift_entity::PrimaryMap;
use indexmap::IndexMap;

use cairn_core::Symbol;

use crate::refs::{ScopeId, TypeId};

/// A lexical binding environment.
#[derive(Clone, Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub depth: u32,
    /// Names introduced in this scope, in declaration order.
    pub bindings: IndexMap<Symbol, TypeId>,
}

/// Tree of lexical scopes rooted at a single module scope.
#[derive(Clone, Debug)]
pub struct ScopeTree {
    scopes: PrimaryMap<ScopeId, Scope>,
    root: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Create a tree containing only the root scope.
    pub fn new() -> Self {
        let mut scopes = PrimaryMap::new();
        let root = scopes.push(Scope {
            parent: None,
            children: Vec::new(),
            depth: 0,
            bindings: IndexMap::new(),
        });
        Self { scopes, root }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn get(&self, scope: ScopeId) -> &Scope {
        &self.scopes[scope]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Open a new scope nested inside `parent`.
    pub fn push_child(&mut self, parent: ScopeId) -> ScopeId {
        let depth = self.scopes[parent].depth + 1;
        let child = self.scopes.push(Scope {
            parent: Some(parent),
            children: Vec::new(),
            depth,
            bindings: IndexMap::new(),
        });
        self.scopes[parent].children.push(child);
        child
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope].parent
    }

    pub fn depth(&self, scope: ScopeId) -> u32 {
        self.scopes[scope].depth
    }

    /// Introduce `name` in `scope`, shadowing any outer binding.
    pub fn bind(&mut self, scope: ScopeId, name: Symbol, ty: TypeId) {
        self.scopes[scope].bindings.insert(name, ty);
    }

    /// Whether `scope` is `ancestor` or nested somewhere inside it.
    pub fn is_descendant_of(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let target_depth = self.scopes[ancestor].depth;
        let mut current = scope;
        while self.scopes[current].depth > target_depth {
            match self.scopes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        current == ancestor
    }

    /// Innermost scope enclosing both `a` and `b`.
    pub fn common_ancestor(&self, mut a: ScopeId, mut b: ScopeId) -> ScopeId {
        while self.scopes[a].depth > self.scopes[b].depth {
            a = self.scopes[a].parent.unwrap_or(self.root);
        }
        while self.scopes[b].depth > self.scopes[a].depth {
            b = self.scopes[b].parent.unwrap_or(self.root);
        }
        while a != b {
            a = self.scopes[a].parent.unwrap_or(self.root);
            b = self.scopes[b].parent.unwrap_or(self.root);
        }
        a
    }

    /// Scopes in pre-order, root first.
    pub fn iter_preorder(&self) -> impl Iterator<Item = ScopeId> + '_ {
        let mut stack = vec![self.root];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.scopes[next].children.iter().rev().copied());
            Some(next)
        })
    }
}
