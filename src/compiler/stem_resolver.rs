//! The stem resolver.
//!
//! A binding is keyed by its STEM, not the full identifier: `na`, `nes`
//! and `nae` are three views of the one stem `n`. Declaring through one
//! suffix sets the declared type; referencing through another recomputes
//! a cast on every access. The cast is never cached and the binding is
//! never mutated by a read.
//!
//! Scopes form a stack. A block scope can read through to enclosing
//! scopes; a function or lambda scope is opaque and sees only its own
//! parameters plus explicitly copy-captured stems.

use crate::compiler::compiler_errors::{CompileError, CompilerMessages};
use crate::compiler::datatypes::TypeTag;
use crate::compiler::lir::nodes::LocalId;
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::runtime::cast::cast;
use crate::compiler::runtime::value::Value;
use crate::compiler::string_interning::StringId;
use crate::settings::MINIMUM_LIKELY_BINDINGS;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct Binding {
    pub declared: TypeTag,
    pub slot: LocalId,

    // The binding's value when it is statically known. Only trusted in
    // straight-line code; inside any loop or branch body the resolver
    // stops producing and recording constants.
    pub constant: Option<Value>,
}

/// What a reference resolves to. When the binding's value is statically
/// known, `constant` holds it already cast to the requested tag; the
/// lowering engine may fold it. The (slot, declared, requested) triple
/// is always present so a runtime cast call can be emitted instead.
#[derive(Debug, Clone)]
pub struct ResolvedReference {
    pub slot: LocalId,
    pub declared: TypeTag,
    pub requested: TypeTag,
    pub constant: Option<Value>,
}

/// Lists and structs are mutated in place through their slot (`insero`,
/// field writes, callee mutation of a by-reference argument), so a
/// recorded copy would go stale on the first write. Only immutable
/// values may fold.
fn foldable_constant(constant: Option<Value>) -> Option<Value> {
    match constant {
        Some(Value::List(_)) | Some(Value::Struct(_)) => None,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Block,
    // Lookup never reads past this scope
    Function,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    bindings: FxHashMap<StringId, Binding>,
}

#[derive(Debug)]
pub struct StemResolver {
    scopes: Vec<Scope>,

    // Depth of enclosing loop/branch bodies. While non-zero, constants
    // are neither recorded nor returned: a value assigned in one
    // iteration must not fold into the next.
    dynamic_depth: u32,
}

impl Default for StemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl StemResolver {
    pub fn new() -> Self {
        let mut resolver = StemResolver {
            scopes: Vec::new(),
            dynamic_depth: 0,
        };
        resolver.enter_scope();
        resolver
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope {
            kind: ScopeKind::Block,
            bindings: FxHashMap::with_capacity_and_hasher(
                MINIMUM_LIKELY_BINDINGS,
                Default::default(),
            ),
        });
    }

    /// Open an opaque function/lambda scope. `captures` are the
    /// copy-captured bindings: snapshots taken now, visible inside, with
    /// no link back to the originals.
    pub fn enter_function_scope(&mut self, captures: Vec<(StringId, Binding)>) {
        let mut bindings = FxHashMap::with_capacity_and_hasher(
            MINIMUM_LIKELY_BINDINGS + captures.len(),
            Default::default(),
        );
        for (stem, binding) in captures {
            bindings.insert(stem, binding);
        }
        self.scopes.push(Scope {
            kind: ScopeKind::Function,
            bindings,
        });
    }

    /// Close the innermost scope, returning its bindings so the caller
    /// can emit frees for the heap values it still owns.
    pub fn exit_scope(&mut self) -> Vec<(StringId, Binding)> {
        match self.scopes.pop() {
            Some(scope) => scope.bindings.into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn enter_dynamic_region(&mut self) {
        self.dynamic_depth += 1;
    }

    pub fn exit_dynamic_region(&mut self) {
        self.dynamic_depth = self.dynamic_depth.saturating_sub(1);
    }

    fn in_dynamic_region(&self) -> bool {
        self.dynamic_depth > 0
    }

    /// `:=` binds (or rebinds) the stem in the CURRENT scope. An outer
    /// binding of the same stem is shadowed, never touched.
    pub fn declare(
        &mut self,
        stem: StringId,
        declared: TypeTag,
        slot: LocalId,
        constant: Option<Value>,
    ) {
        let constant = if self.in_dynamic_region() {
            None
        } else {
            foldable_constant(constant)
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(
                stem,
                Binding {
                    declared,
                    slot,
                    constant,
                },
            );
        }
    }

    /// `=` finds the nearest visible binding and records its new value
    /// (or that it is now dynamic). The declared type and slot stay.
    pub fn assign(&mut self, stem: StringId, constant: Option<Value>) -> Option<&Binding> {
        let constant = if self.in_dynamic_region() {
            None
        } else {
            foldable_constant(constant)
        };
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.bindings.get_mut(&stem) {
                binding.constant = constant;
                return Some(binding);
            }
            if scope.kind == ScopeKind::Function {
                break;
            }
        }
        None
    }

    /// Read-only lookup without a requested cast (used by `=` to learn
    /// the declared type before lowering the right-hand side).
    pub fn lookup(&self, stem: StringId) -> Option<&Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.bindings.get(&stem) {
                return Some(binding);
            }
            if scope.kind == ScopeKind::Function {
                break;
            }
        }
        None
    }

    /// Cast-on-reference. Finds the nearest visible binding and, when its
    /// value is statically known, recomputes `cast(value, requested)` for
    /// THIS access. A failed constant cast is reported as a compile-time
    /// type error rather than deferred to runtime.
    pub fn reference(
        &self,
        stem: StringId,
        requested: TypeTag,
        location: TextLocation,
        messages: &mut CompilerMessages,
    ) -> Option<ResolvedReference> {
        let binding = self.lookup(stem)?;

        let constant = if self.in_dynamic_region() {
            None
        } else {
            match &binding.constant {
                Some(value) => match cast(value, requested) {
                    Ok(cast_value) => Some(cast_value),
                    Err(fault) => {
                        messages
                            .errors
                            .push(CompileError::new_type_error(fault.to_string(), location));
                        None
                    }
                },
                None => None,
            }
        };

        Some(ResolvedReference {
            slot: binding.slot,
            declared: binding.declared,
            requested,
            constant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::string_interning::StringTable;

    fn loc() -> TextLocation {
        TextLocation::default()
    }

    #[test]
    fn cast_on_reference_recomputes_every_access() {
        let mut table = StringTable::new();
        let n = table.intern("n");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        // na := 5
        resolver.declare(n, TypeTag::Int, LocalId::from_u32(0), Some(Value::Int(5)));

        // nes reads "5"
        let as_string = resolver
            .reference(n, TypeTag::String, loc(), &mut messages)
            .unwrap();
        assert_eq!(as_string.declared, TypeTag::Int);
        assert_eq!(as_string.constant, Some(Value::String("5".to_string())));

        // nes := "7" replaces the binding's type AND value
        resolver.declare(
            n,
            TypeTag::String,
            LocalId::from_u32(1),
            Some(Value::String("7".to_string())),
        );

        // na now reads 7 through a fresh cast
        let as_int = resolver
            .reference(n, TypeTag::Int, loc(), &mut messages)
            .unwrap();
        assert_eq!(as_int.declared, TypeTag::String);
        assert_eq!(as_int.constant, Some(Value::Int(7)));
        assert!(!messages.has_errors());
    }

    #[test]
    fn reference_does_not_mutate_the_binding() {
        let mut table = StringTable::new();
        let n = table.intern("n");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        resolver.declare(n, TypeTag::Int, LocalId::from_u32(0), Some(Value::Int(5)));
        resolver
            .reference(n, TypeTag::String, loc(), &mut messages)
            .unwrap();

        let binding = resolver.lookup(n).unwrap();
        assert_eq!(binding.declared, TypeTag::Int);
        assert_eq!(binding.constant, Some(Value::Int(5)));
    }

    #[test]
    fn inner_scope_shadows_without_mutating_outer() {
        let mut table = StringTable::new();
        let x = table.intern("x");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        resolver.declare(x, TypeTag::Int, LocalId::from_u32(0), Some(Value::Int(1)));
        resolver.enter_scope();
        resolver.declare(
            x,
            TypeTag::String,
            LocalId::from_u32(1),
            Some(Value::String("intus".to_string())),
        );

        let inner = resolver
            .reference(x, TypeTag::String, loc(), &mut messages)
            .unwrap();
        assert_eq!(inner.constant, Some(Value::String("intus".to_string())));

        resolver.exit_scope();
        let outer = resolver
            .reference(x, TypeTag::Int, loc(), &mut messages)
            .unwrap();
        assert_eq!(outer.constant, Some(Value::Int(1)));
        assert_eq!(outer.declared, TypeTag::Int);
    }

    #[test]
    fn assignment_writes_through_to_the_nearest_binding() {
        let mut table = StringTable::new();
        let x = table.intern("x");
        let mut resolver = StemResolver::new();

        resolver.declare(x, TypeTag::Int, LocalId::from_u32(0), Some(Value::Int(1)));
        resolver.enter_scope();
        // x = 9 inside a block with no local x hits the outer binding
        resolver.assign(x, Some(Value::Int(9)));
        resolver.exit_scope();

        let binding = resolver.lookup(x).unwrap();
        assert_eq!(binding.constant, Some(Value::Int(9)));
        assert_eq!(binding.declared, TypeTag::Int);
    }

    #[test]
    fn function_scopes_see_only_captures() {
        let mut table = StringTable::new();
        let x = table.intern("x");
        let y = table.intern("y");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        resolver.declare(x, TypeTag::Int, LocalId::from_u32(0), Some(Value::Int(1)));
        resolver.declare(y, TypeTag::Int, LocalId::from_u32(1), Some(Value::Int(2)));

        let captured = resolver.lookup(x).cloned().unwrap();
        resolver.enter_function_scope(vec![(x, captured)]);

        assert!(resolver
            .reference(x, TypeTag::Int, loc(), &mut messages)
            .is_some());
        assert!(resolver
            .reference(y, TypeTag::Int, loc(), &mut messages)
            .is_none());

        resolver.exit_scope();
        assert!(resolver
            .reference(y, TypeTag::Int, loc(), &mut messages)
            .is_some());
    }

    #[test]
    fn captures_are_snapshots_not_references() {
        let mut table = StringTable::new();
        let x = table.intern("x");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        resolver.declare(x, TypeTag::Int, LocalId::from_u32(0), Some(Value::Int(1)));
        let captured = resolver.lookup(x).cloned().unwrap();
        resolver.enter_function_scope(vec![(x, captured)]);

        // Writing inside the lambda touches the snapshot only
        resolver.assign(x, Some(Value::Int(99)));
        resolver.exit_scope();

        let outer = resolver
            .reference(x, TypeTag::Int, loc(), &mut messages)
            .unwrap();
        assert_eq!(outer.constant, Some(Value::Int(1)));
    }

    #[test]
    fn dynamic_regions_suppress_constants() {
        let mut table = StringTable::new();
        let x = table.intern("x");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        resolver.declare(x, TypeTag::Int, LocalId::from_u32(0), Some(Value::Int(1)));
        resolver.enter_dynamic_region();

        let inside = resolver
            .reference(x, TypeTag::Int, loc(), &mut messages)
            .unwrap();
        assert_eq!(inside.constant, None);

        resolver.assign(x, Some(Value::Int(5)));
        resolver.exit_dynamic_region();

        // The loop may or may not have run; the value is unknown now
        let after = resolver
            .reference(x, TypeTag::Int, loc(), &mut messages)
            .unwrap();
        assert_eq!(after.constant, None);
    }

    #[test]
    fn mutable_aggregates_are_never_recorded_as_constants() {
        use crate::compiler::runtime::collections::ListValue;

        let mut table = StringTable::new();
        let list = table.intern("list");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        let value = Value::List(
            ListValue::from_values(TypeTag::Int, vec![Value::Int(1), Value::Int(2)]).unwrap(),
        );
        resolver.declare(list, TypeTag::IntList, LocalId::from_u32(0), Some(value));

        // A later insero would mutate the slot, so every read must go
        // through the slot rather than a folded copy
        let reference = resolver
            .reference(list, TypeTag::IntList, loc(), &mut messages)
            .unwrap();
        assert_eq!(reference.constant, None);
        assert_eq!(reference.slot, LocalId::from_u32(0));
        assert!(!messages.has_errors());
    }

    #[test]
    fn constant_cast_failure_is_a_compile_error() {
        let mut table = StringTable::new();
        let s = table.intern("verbum");
        let mut resolver = StemResolver::new();
        let mut messages = CompilerMessages::new();

        resolver.declare(
            s,
            TypeTag::String,
            LocalId::from_u32(0),
            Some(Value::String("salve".to_string())),
        );
        let reference = resolver
            .reference(s, TypeTag::Int, loc(), &mut messages)
            .unwrap();
        assert_eq!(reference.constant, None);
        assert!(messages.has_errors());
    }
}
