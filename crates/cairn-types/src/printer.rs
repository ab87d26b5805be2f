//! Text rendering of types and the scope tree.
//!
//! Types print in a compact surface syntax:
//!
//! ```text
//! <a>(a, ...number) -> a
//! { name: string, next: 'b }
//! ```
//!
//! Free variables print with a leading quote, generics without one. Names
//! are assigned in first-appearance order and stay stable for the lifetime
//! of one [`TypePrinter`], so a whole scope dump shares one naming.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::arena::{FunctionType, TypeArena, TypeData, TypePackData};
use crate::refs::{Handle, TypeId, TypePackId};
use crate::scope::ScopeTree;

/// Stateful printer that names variables consistently across calls.
pub struct TypePrinter<'a> {
    arena: &'a TypeArena,
    names: HashMap<Handle, String>,
    next_name: usize,
}

impl<'a> TypePrinter<'a> {
    pub fn new(arena: &'a TypeArena) -> Self {
        Self {
            arena,
            names: HashMap::new(),
            next_name: 0,
        }
    }

    pub fn type_to_string(&mut self, ty: TypeId) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty)
            .expect("fmt::Write to String never fails");
        out
    }

    pub fn pack_to_string(&mut self, pack: TypePackId) -> String {
        let mut out = String::new();
        self.write_pack(&mut out, pack, true)
            .expect("fmt::Write to String never fails");
        out
    }

    pub fn handle_to_string(&mut self, handle: Handle) -> String {
        match handle {
            Handle::Type(ty) => self.type_to_string(ty),
            Handle::Pack(pack) => self.pack_to_string(pack),
        }
    }

    fn name_of(&mut self, handle: Handle) -> &str {
        let next = &mut self.next_name;
        self.names.entry(handle).or_insert_with(|| {
            let n = *next;
            *next += 1;
            let letter = (b'a' + (n % 26) as u8) as char;
            match n / 26 {
                0 => letter.to_string(),
                round => format!("{letter}{round}"),
            }
        })
    }

    fn write_type(&mut self, f: &mut impl Write, ty: TypeId) -> fmt::Result {
        let arena = self.arena;
        let ty = arena.follow(ty);
        match arena.get(ty) {
            TypeData::Free { .. } => write!(f, "'{}", self.name_of(Handle::Type(ty))),
            TypeData::Generic { .. } => write!(f, "{}", self.name_of(Handle::Type(ty))),
            TypeData::Blocked => write!(f, "*blocked*"),
            TypeData::Error => write!(f, "*error*"),
            TypeData::Primitive(primitive) => write!(f, "{primitive}"),
            TypeData::Function(func) => self.write_function(f, func),
            TypeData::Table { props } => {
                if props.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, (name, &prop)) in props.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: ")?;
                    self.write_type(f, prop)?;
                }
                write!(f, " }}")
            }
            TypeData::Bound(_) => unreachable!("follow never stops on a bound type"),
        }
    }

    fn write_function(&mut self, f: &mut impl Write, func: &FunctionType) -> fmt::Result {
        if !func.generics.is_empty() || !func.generic_packs.is_empty() {
            write!(f, "<")?;
            let mut first = true;
            for &generic in &func.generics {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "{}", self.name_of(Handle::Type(generic)))?;
            }
            for &generic in &func.generic_packs {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "{}...", self.name_of(Handle::Pack(generic)))?;
            }
            write!(f, ">")?;
        }
        self.write_pack(f, func.params, true)?;
        write!(f, " -> ")?;
        self.write_pack(f, func.returns, false)
    }

    /// Write a pack. Packs of exactly one type print bare unless
    /// `parenthesize` is set.
    fn write_pack(
        &mut self,
        f: &mut impl Write,
        pack: TypePackId,
        parenthesize: bool,
    ) -> fmt::Result {
        let (head, tail) = self.flatten(pack);
        if !parenthesize && head.len() == 1 && tail.is_none() {
            return self.write_type(f, head[0]);
        }
        write!(f, "(")?;
        for (i, &ty) in head.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.write_type(f, ty)?;
        }
        if let Some(tail) = tail {
            if !head.is_empty() {
                write!(f, ", ")?;
            }
            self.write_tail(f, tail)?;
        }
        write!(f, ")")
    }

    fn write_tail(&mut self, f: &mut impl Write, tail: TypePackId) -> fmt::Result {
        let arena = self.arena;
        match arena.get_pack(tail) {
            TypePackData::Variadic(elem) => {
                write!(f, "...")?;
                self.write_type(f, *elem)
            }
            TypePackData::Free { .. } => write!(f, "'{}...", self.name_of(Handle::Pack(tail))),
            TypePackData::Generic { .. } => write!(f, "{}...", self.name_of(Handle::Pack(tail))),
            TypePackData::List { .. } | TypePackData::Bound(_) => {
                unreachable!("flatten only yields non-list tails")
            }
        }
    }

    fn flatten(&self, pack: TypePackId) -> (Vec<TypeId>, Option<TypePackId>) {
        let mut head = Vec::new();
        let mut current = Some(self.arena.follow_pack(pack));
        while let Some(pack) = current {
            match self.arena.get_pack(pack) {
                TypePackData::List { head: items, tail } => {
                    head.extend(items.iter().copied());
                    current = tail.map(|tail| self.arena.follow_pack(tail));
                }
                _ => return (head, Some(pack)),
            }
        }
        (head, None)
    }
}

/// Render a single type with fresh variable naming.
pub fn print_type(arena: &TypeArena, ty: TypeId) -> String {
    TypePrinter::new(arena).type_to_string(ty)
}

/// Render the scope tree with the current type of every binding.
///
/// ```text
/// scope0
///   id: <a>(a) -> a
///   scope1
///     x: 'b
/// ```
pub fn dump_scopes(scopes: &ScopeTree, arena: &TypeArena) -> String {
    let mut printer = TypePrinter::new(arena);
    let mut lines = Vec::new();
    for scope in scopes.iter_preorder() {
        let data = scopes.get(scope);
        let indent = "  ".repeat(data.depth as usize);
        lines.push(format!("{indent}{scope}"));
        for (name, &ty) in &data.bindings {
            lines.push(format!("{indent}  {name}: {}", printer.type_to_string(ty)));
        }
    }
    lines.join("\n")
}
