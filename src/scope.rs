use crate::expr::{DataType, EvalErrType, Val};
use rustc_hash::FxHashMap;
use std::rc::Rc;

pub type ScopeId = usize;

/// The global scope is always the bottom of the arena.
pub const GLOBAL_SCOPE: ScopeId = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// `None` for callables, which are never assignable.
    pub ty: Option<DataType>,
    /// `None` until the variable is first assigned.
    pub value: Option<Val>,
    pub mutable: bool,
}

#[derive(Debug, Default)]
struct Scope {
    slots: FxHashMap<Rc<str>, Slot>,
    parent: Option<ScopeId>,
}

/// Scopes live in one arena and are pushed and popped in stack order.
/// A scope's parent is not necessarily the scope below it: function
/// bodies hang off the global scope directly.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            scopes: vec![Scope::default()],
            current: GLOBAL_SCOPE,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Enters a new scope under `parent`. Returns the scope to restore in `pop_scope`.
    pub fn push_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            slots: Default::default(),
            parent: Some(parent),
        });
        let previous = self.current;
        self.current = self.scopes.len() - 1;
        tracing::trace!(scope = self.current, parent, "entered scope");
        previous
    }

    pub fn pop_scope(&mut self, previous: ScopeId) {
        debug_assert!(self.scopes.len() > 1, "popped the global scope");
        debug_assert_eq!(self.current, self.scopes.len() - 1);
        self.scopes.pop();
        self.current = previous;
    }

    pub fn declare(
        &mut self,
        id: Rc<str>,
        ty: Option<DataType>,
        value: Option<Val>,
        mutable: bool,
    ) -> Result<(), EvalErrType> {
        let slots = &mut self.scopes[self.current].slots;
        if slots.contains_key(&id) {
            return Err(EvalErrType::AlreadyDeclared(id));
        }
        slots.insert(id, Slot { ty, value, mutable });
        Ok(())
    }

    /// Binds an immutable callable in the global scope, replacing any
    /// earlier binding of `id`.
    pub fn define_global(&mut self, id: Rc<str>, val: Val) {
        let slot = Slot {
            ty: None,
            value: Some(val),
            mutable: false,
        };
        self.scopes[GLOBAL_SCOPE].slots.insert(id, slot);
    }

    fn resolve(&self, id: &str) -> Option<ScopeId> {
        let mut cur = Some(self.current);
        while let Some(scope) = cur {
            if self.scopes[scope].slots.contains_key(id) {
                return Some(scope);
            }
            cur = self.scopes[scope].parent;
        }
        None
    }

    pub fn lookup(&self, id: &str) -> Option<&Slot> {
        self.resolve(id).and_then(|scope| self.scopes[scope].slots.get(id))
    }

    pub fn get(&self, id: &str) -> Result<Val, EvalErrType> {
        match self.lookup(id) {
            Some(Slot { value: Some(val), .. }) => Ok(val.clone()),
            Some(Slot { value: None, .. }) => Err(EvalErrType::Uninitialized(id.into())),
            None => Err(EvalErrType::UndefinedVariable(id.into())),
        }
    }

    pub fn get_global(&self, id: &str) -> Option<Val> {
        self.scopes[GLOBAL_SCOPE]
            .slots
            .get(id)
            .and_then(|slot| slot.value.clone())
    }

    pub fn assign(&mut self, id: &str, val: Val) -> Result<(), EvalErrType> {
        let scope = self
            .resolve(id)
            .ok_or_else(|| EvalErrType::UndefinedVariable(id.into()))?;
        let Some(slot) = self.scopes[scope].slots.get_mut(id) else {
            return Err(EvalErrType::UndefinedVariable(id.into()));
        };

        if !slot.mutable {
            return Err(EvalErrType::Immutable(id.into()));
        }

        let ty = slot.ty;
        match ty {
            Some(ty) if val.data_type() == Some(ty) => {
                slot.value = Some(val);
                Ok(())
            }
            Some(ty) => Err(EvalErrType::AssignMismatch {
                name: id.into(),
                value: val.repr(),
                found: val.type_name(),
                expected: ty,
            }),
            None => Err(EvalErrType::Immutable(id.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int_slot(env: &mut Environment, id: &str, x: i64) {
        env.declare(id.into(), Some(DataType::Int), Some(Val::Int(x)), true)
            .unwrap();
    }

    #[test]
    fn redeclare_in_same_scope_fails() {
        let mut env = Environment::new();
        int_slot(&mut env, "x", 1);
        assert_eq!(
            env.declare("x".into(), Some(DataType::Int), None, true),
            Err(EvalErrType::AlreadyDeclared("x".into()))
        );
    }

    #[test]
    fn shadowing_is_scoped() {
        let mut env = Environment::new();
        int_slot(&mut env, "x", 1);
        let previous = env.push_scope(env.current());
        int_slot(&mut env, "x", 2);
        assert_eq!(env.get("x"), Ok(Val::Int(2)));
        env.pop_scope(previous);
        assert_eq!(env.get("x"), Ok(Val::Int(1)));
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn assignment_reaches_enclosing_scope() {
        let mut env = Environment::new();
        int_slot(&mut env, "x", 1);
        let previous = env.push_scope(env.current());
        env.assign("x", Val::Int(7)).unwrap();
        env.pop_scope(previous);
        assert_eq!(env.get_global("x"), Some(Val::Int(7)));
    }

    #[test]
    fn function_scope_skips_caller_locals() {
        let mut env = Environment::new();
        let outer = env.push_scope(GLOBAL_SCOPE);
        int_slot(&mut env, "local", 1);
        let caller = env.push_scope(GLOBAL_SCOPE);
        assert_eq!(env.get("local"), Err(EvalErrType::UndefinedVariable("local".into())));
        env.pop_scope(caller);
        assert_eq!(env.get("local"), Ok(Val::Int(1)));
        env.pop_scope(outer);
    }

    #[test]
    fn assign_checks_mutability_before_type() {
        let mut env = Environment::new();
        env.declare("k".into(), Some(DataType::Int), Some(Val::Int(1)), false)
            .unwrap();
        assert_eq!(
            env.assign("k", Val::Bool(true)),
            Err(EvalErrType::Immutable("k".into()))
        );
    }

    #[test]
    fn assign_type_mismatch_keeps_value() {
        let mut env = Environment::new();
        int_slot(&mut env, "x", 3);
        let err = env.assign("x", Val::Float(3.5)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch: cannot assign value 3.5 (TIPIK) to variable 'x' of type NUMERO."
        );
        assert_eq!(env.get("x"), Ok(Val::Int(3)));
    }

    #[test]
    fn global_callables_are_read_only() {
        let mut env = Environment::new();
        env.define_global("clock".into(), Val::Int(0));
        env.define_global("clock".into(), Val::Int(1));
        assert_eq!(env.get("clock"), Ok(Val::Int(1)));
        assert_eq!(
            env.assign("clock", Val::Int(2)),
            Err(EvalErrType::Immutable("clock".into()))
        );
    }

    #[test]
    fn unassigned_and_undefined() {
        let mut env = Environment::new();
        env.declare("c".into(), Some(DataType::Char), None, true).unwrap();
        assert_eq!(env.get("c"), Err(EvalErrType::Uninitialized("c".into())));
        assert_eq!(env.get("nope"), Err(EvalErrType::UndefinedVariable("nope".into())));
        env.assign("c", Val::Char('z')).unwrap();
        assert_eq!(env.get("c"), Ok(Val::Char('z')));
    }
}
