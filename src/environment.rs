use std::collections::HashMap;

use crate::ast::FunctionDef;
use crate::value::{ArrayRef, AwkArray, Value};

/// Special built-in variables that remain reachable without qualification
/// from inside a namespace.
const SPECIAL_VARIABLES: &[&str] = &[
    "FS", "RS", "OFS", "ORS", "NR", "NF", "FNR", "FILENAME", "SUBSEP", "CONVFMT", "OFMT",
    "RSTART", "RLENGTH", "ARGC", "ARGV", "ENVIRON", "IGNORECASE", "RT", "FPAT", "TEXTDOMAIN",
    "SYMTAB", "FUNCTAB",
];

pub fn is_special_variable(name: &str) -> bool {
    SPECIAL_VARIABLES.contains(&name)
}

/// Resolve a possibly namespace-qualified name to the spelling a lookup
/// should use: a qualified name whose tail is a special built-in falls
/// back to the global unqualified entry.
pub fn effective_name(name: &str) -> &str {
    if let Some(pos) = name.rfind("::") {
        let tail = &name[pos + 2..];
        if is_special_variable(tail) {
            return tail;
        }
    }
    name
}

/// Runtime name bindings: one global map plus a stack of function-local
/// scopes, and the user/builtin function tables.
pub struct Environment<'p> {
    globals: HashMap<String, Value>,
    scopes: Vec<HashMap<String, Value>>,
    functions: HashMap<String, &'p FunctionDef>,
}

impl<'p> Environment<'p> {
    pub fn new() -> Self {
        let mut env = Self {
            globals: HashMap::new(),
            scopes: Vec::new(),
            functions: HashMap::new(),
        };
        env.init_special_variables();
        env.load_environ();
        env
    }

    fn init_special_variables(&mut self) {
        let g = &mut self.globals;
        g.insert("FS".into(), Value::str(" "));
        g.insert("OFS".into(), Value::str(" "));
        g.insert("RS".into(), Value::str("\n"));
        g.insert("ORS".into(), Value::str("\n"));
        g.insert("NR".into(), Value::num(0.0));
        g.insert("NF".into(), Value::num(0.0));
        g.insert("FNR".into(), Value::num(0.0));
        g.insert("FILENAME".into(), Value::str(""));
        g.insert("SUBSEP".into(), Value::str("\u{1c}"));
        g.insert("CONVFMT".into(), Value::str("%.6g"));
        g.insert("OFMT".into(), Value::str("%.6g"));
        g.insert("RSTART".into(), Value::num(0.0));
        g.insert("RLENGTH".into(), Value::num(-1.0));
        g.insert("IGNORECASE".into(), Value::num(0.0));
        g.insert("RT".into(), Value::str(""));
        g.insert("FPAT".into(), Value::str(""));
        g.insert("TEXTDOMAIN".into(), Value::str("messages"));
        g.insert("ARGC".into(), Value::num(0.0));
    }

    fn load_environ(&mut self) {
        let mut map = AwkArray::new();
        for (name, value) in std::env::vars() {
            map.insert(name, Value::from_input(value));
        }
        self.globals.insert(
            "ENVIRON".into(),
            Value::Array(std::rc::Rc::new(std::cell::RefCell::new(map))),
        );
    }

    /// Populate ARGC/ARGV from the command line file list (ARGV[0] is
    /// the interpreter name).
    pub fn set_argv(&mut self, args: &[String]) {
        self.globals
            .insert("ARGC".into(), Value::num(args.len() as f64));
        let mut map = AwkArray::new();
        for (i, arg) in args.iter().enumerate() {
            map.insert(i.to_string(), Value::from_input(arg.clone()));
        }
        self.globals.insert(
            "ARGV".into(),
            Value::Array(std::rc::Rc::new(std::cell::RefCell::new(map))),
        );
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Look a name up: innermost local scope outwards, then globals.
    pub fn get(&self, name: &str) -> Value {
        if let Some(local) = self.local_name(name) {
            for scope in self.scopes.iter().rev() {
                if let Some(v) = scope.get(local) {
                    return v.clone();
                }
            }
        }
        let name = self.resolve_global(name);
        self.globals.get(name).cloned().unwrap_or(Value::Uninitialized)
    }

    /// Write a name: an existing local is updated in place, anything
    /// else lands in the global map.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(local) = self.local_name(name) {
            let local = local.to_string();
            for scope in self.scopes.iter_mut().rev() {
                if let Some(slot) = scope.get_mut(&local) {
                    *slot = value;
                    return;
                }
            }
        }
        let name = self.resolve_global(name).to_string();
        self.globals.insert(name, value);
    }

    /// Remove a value, leaving Uninitialized behind. Used by the
    /// in-place string append path to avoid copying large strings.
    pub fn take(&mut self, name: &str) -> Value {
        if let Some(local) = self.local_name(name) {
            let local = local.to_string();
            for scope in self.scopes.iter_mut().rev() {
                if let Some(slot) = scope.get_mut(&local) {
                    return std::mem::take(slot);
                }
            }
        }
        let name = self.resolve_global(name).to_string();
        match self.globals.get_mut(&name) {
            Some(slot) => std::mem::take(slot),
            None => Value::Uninitialized,
        }
    }

    /// Spelling under which `name` is bound in the local scopes, if
    /// any. Function parameters are stored unqualified, so a
    /// namespace-qualified reference falls back to its tail.
    fn local_name<'n>(&self, name: &'n str) -> Option<&'n str> {
        if self.scopes.iter().rev().any(|s| s.contains_key(name)) {
            return Some(name);
        }
        if let Some(pos) = name.rfind("::") {
            let tail = &name[pos + 2..];
            if self.scopes.iter().rev().any(|s| s.contains_key(tail)) {
                return Some(tail);
            }
        }
        None
    }

    fn resolve_global<'n>(&self, name: &'n str) -> &'n str {
        if self.globals.contains_key(name) {
            return name;
        }
        effective_name(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.local_name(name).is_some()
            || self.globals.contains_key(self.resolve_global(name))
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.local_name(name).is_some()
    }

    /// Deletion only ever acts on the global map.
    pub fn delete_global(&mut self, name: &str) {
        self.globals.remove(name);
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.globals.get(name).cloned().unwrap_or(Value::Uninitialized)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn global_names(&self) -> Vec<String> {
        self.globals.keys().cloned().collect()
    }

    /// Shared handle to the array bound to `name`, creating an empty
    /// array in the binding's scope if needed. A scalar binding is
    /// replaced; becoming an array discards prior content.
    pub fn array_handle(&mut self, name: &str) -> ArrayRef {
        if let Some(local) = self.local_name(name) {
            let local = local.to_string();
            for scope in self.scopes.iter_mut().rev() {
                if let Some(slot) = scope.get_mut(&local) {
                    return handle_from_slot(slot);
                }
            }
        }
        let key = self.resolve_global(name).to_string();
        let slot = self.globals.entry(key).or_insert(Value::Uninitialized);
        handle_from_slot(slot)
    }

    /// Same lookup as `array_handle`, but without creating anything.
    pub fn existing_array(&self, name: &str) -> Option<ArrayRef> {
        if let Some(local) = self.local_name(name) {
            for scope in self.scopes.iter().rev() {
                if let Some(v) = scope.get(local) {
                    return v.array().cloned();
                }
            }
        }
        self.globals
            .get(self.resolve_global(name))
            .and_then(|v| v.array().cloned())
    }

    // ------------------------------------------------------------------
    // Function scopes
    // ------------------------------------------------------------------

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn define_local(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        } else {
            self.globals.insert(name.to_string(), value);
        }
    }

    // ------------------------------------------------------------------
    // Function tables
    // ------------------------------------------------------------------

    /// Register a user function; a redefinition silently wins.
    pub fn register_function(&mut self, func: &'p FunctionDef) {
        self.functions.insert(func.name.clone(), func);
    }

    pub fn function(&self, name: &str) -> Option<&'p FunctionDef> {
        self.functions.get(name).copied()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

impl Default for Environment<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_from_slot(slot: &mut Value) -> ArrayRef {
    if let Value::Array(map) = slot {
        return map.clone();
    }
    let fresh = Value::new_array();
    let handle = fresh.array().unwrap().clone();
    *slot = fresh;
    handle
}
