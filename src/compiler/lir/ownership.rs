//! Scope-end memory management.
//!
//! There is no refcounting in generated programs. Every heap value
//! (list, string, struct) is owned by the scope that created it, tracked
//! on a per-scope drop list. When the scope closes, the lowering engine
//! emits one explicit `Free` per surviving entry, newest first.
//! Ownership is TRANSFERRED out of the drop list when the value is
//! returned or stored into a binding (the receiving slot takes over);
//! closures copy-capture, so capture never transfers anything.

use crate::compiler::datatypes::TypeTag;
use crate::compiler::lir::build_lir::FunctionBuilder;
use crate::compiler::lir::nodes::{Inst, LocalId, Operand};

impl FunctionBuilder {
    pub(super) fn enter_drop_scope(&mut self) {
        self.drop_scopes.push(Vec::new());
    }

    /// Track a freshly created heap value. Non-heap tags are ignored so
    /// call sites don't need to check first.
    pub(super) fn register_heap(&mut self, local: LocalId, tag: TypeTag) {
        if !tag.is_heap() {
            return;
        }
        if let Some(scope) = self.drop_scopes.last_mut() {
            scope.push((local, tag));
        }
    }

    /// Ownership moved out (returned, or stored into a binding slot that
    /// now tracks it). Removes the local from every open scope.
    pub(super) fn transfer_ownership(&mut self, local: LocalId) {
        for scope in &mut self.drop_scopes {
            scope.retain(|(tracked, _)| *tracked != local);
        }
    }

    pub(super) fn transfer_operand(&mut self, operand: &Operand) {
        if let Operand::Local(local) = operand {
            self.transfer_ownership(*local);
        }
    }

    /// Close the innermost scope: emit a `Free` for everything it still
    /// owns, newest first.
    pub(super) fn exit_drop_scope(&mut self) {
        let Some(scope) = self.drop_scopes.pop() else {
            return;
        };
        for (local, tag) in scope.into_iter().rev() {
            self.emit(Inst::Free { target: local, tag });
        }
    }

    pub(super) fn drop_scope_depth(&self) -> usize {
        self.drop_scopes.len()
    }

    /// `frange`/`perge` leave every scope between the jump and the loop
    /// at once; their heap values are freed here without popping the
    /// scopes, since lowering continues inside them after the jump.
    pub(super) fn emit_frees_down_to(&mut self, depth: usize) {
        let frees: Vec<(LocalId, TypeTag)> = self
            .drop_scopes
            .iter()
            .skip(depth)
            .rev()
            .flat_map(|scope| scope.iter().rev().copied())
            .collect();
        for (local, tag) in frees {
            self.emit(Inst::Free { target: local, tag });
        }
    }

    /// A `redeo` unwinds every open scope of the function at once. The
    /// returned value (if it is a tracked local) must survive, so it is
    /// skipped here; the scopes themselves stay open because sibling
    /// branches after the return still lower against them.
    pub(super) fn emit_frees_for_return(&mut self, keep: Option<LocalId>) {
        let frees: Vec<(LocalId, TypeTag)> = self
            .drop_scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev().copied())
            .filter(|(local, _)| Some(*local) != keep)
            .collect();
        for (local, tag) in frees {
            self.emit(Inst::Free { target: local, tag });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::datatypes::TypeTag;
    use crate::compiler::lir::build_lir::FunctionBuilder;
    use crate::compiler::lir::nodes::{FunctionId, Inst};

    fn builder() -> FunctionBuilder {
        FunctionBuilder::new(FunctionId::from_u32(0), "main", Vec::new(), None, 0)
    }

    #[test]
    fn scope_exit_frees_untransferred_heap_values_newest_first() {
        let mut f = builder();
        f.enter_drop_scope();
        let a = f.new_local();
        let b = f.new_local();
        f.register_heap(a, TypeTag::IntList);
        f.register_heap(b, TypeTag::String);
        f.exit_drop_scope();

        assert_eq!(
            f.body,
            vec![
                Inst::Free {
                    target: b,
                    tag: TypeTag::String
                },
                Inst::Free {
                    target: a,
                    tag: TypeTag::IntList
                },
            ]
        );
    }

    #[test]
    fn transferred_values_are_not_freed() {
        let mut f = builder();
        f.enter_drop_scope();
        let a = f.new_local();
        f.register_heap(a, TypeTag::StringList);
        f.transfer_ownership(a);
        f.exit_drop_scope();
        assert!(f.body.is_empty());
    }

    #[test]
    fn non_heap_tags_are_never_tracked() {
        let mut f = builder();
        f.enter_drop_scope();
        let a = f.new_local();
        f.register_heap(a, TypeTag::Int);
        f.exit_drop_scope();
        assert!(f.body.is_empty());
    }

    #[test]
    fn return_unwinds_all_scopes_but_keeps_the_result() {
        let mut f = builder();
        f.enter_drop_scope();
        let outer = f.new_local();
        f.register_heap(outer, TypeTag::String);
        f.enter_drop_scope();
        let inner = f.new_local();
        f.register_heap(inner, TypeTag::IntList);

        f.emit_frees_for_return(Some(inner));
        assert_eq!(
            f.body,
            vec![Inst::Free {
                target: outer,
                tag: TypeTag::String
            }]
        );
    }
}
