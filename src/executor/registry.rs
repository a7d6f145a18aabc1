//! Action registry.
//!
//! A collaborator implementing [`ActionSurface`] exposes its operations into an
//! [`ActionTable`] once, at construction. Lookups by `(name, argument count)`
//! are memoized in a two-level cache (`name -> count -> candidates`) that only
//! grows, so a given key always yields the same candidate list.

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::error::ActionError;
use super::types::{SemanticType, Value};

pub type ActionResult = Result<Option<Value>, ActionError>;
pub type ActionFuture = BoxFuture<'static, ActionResult>;
pub type ActionFn = Arc<dyn Fn(ActionCall) -> ActionFuture + Send + Sync>;

/// The collaborator object backing the action catalog.
///
/// Implementations register every public operation into the table; handlers
/// typically capture a clone of `self`. Operations may be invoked concurrently
/// from several loops.
pub trait ActionSurface: Send + Sync + 'static {
    fn expose(self: Arc<Self>, table: &mut ActionTable);
}

/// A declared positional parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub ty: SemanticType,
    /// Used when the caller supplies fewer arguments than declared.
    pub default: Option<Value>,
}

/// Metadata plus handler for one concrete operation.
#[derive(Clone)]
pub struct ActionDescriptor {
    pub name: String,
    pub params: Vec<Param>,
    /// Element type of a trailing variadic parameter.
    pub variadic: Option<SemanticType>,
    /// Receives the run's cancellation signal automatically.
    pub cancellable: bool,
    handler: ActionFn,
}

impl ActionDescriptor {
    /// Declared positional parameter count (variadic tail and cancellation slot excluded).
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Parameters without a declared default.
    pub fn required(&self) -> usize {
        self.params.iter().take_while(|p| p.default.is_none()).count()
    }

    /// Whether `count` raw arguments can bind to this operation.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required() && (count <= self.arity() || self.variadic.is_some())
    }

    /// A true zero-parameter operation, usable as a bare-word alias.
    pub fn is_nullary(&self) -> bool {
        self.params.is_empty() && self.variadic.is_none()
    }

    pub(crate) fn call(&self, call: ActionCall) -> ActionFuture {
        (self.handler)(call)
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("variadic", &self.variadic)
            .field("cancellable", &self.cancellable)
            .finish_non_exhaustive()
    }
}

/// Arguments handed to an operation's handler.
#[derive(Debug, Clone, Default)]
pub struct ActionCall {
    pub args: Vec<Value>,
    /// Values packed into the variadic tail.
    pub rest: Vec<Value>,
    /// Set when the descriptor is cancellable.
    pub cancel: Option<CancellationToken>,
}

impl ActionCall {
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn i32(&self, index: usize) -> Result<i32, ActionError> {
        self.int(index, "Int32")
    }

    pub fn u32(&self, index: usize) -> Result<u32, ActionError> {
        self.int(index, "UInt32")
    }

    pub fn handle(&self, index: usize) -> Result<isize, ActionError> {
        self.int(index, "Handle")
    }

    /// Enumeration ordinal.
    pub fn ordinal(&self, index: usize) -> Result<i64, ActionError> {
        self.int(index, "enumeration")
    }

    pub fn f64(&self, index: usize) -> Result<f64, ActionError> {
        self.arg(index)
            .and_then(Value::as_f64)
            .ok_or(ActionError::BadArgument {
                index,
                expected: "Float64",
            })
    }

    pub fn bool(&self, index: usize) -> Result<bool, ActionError> {
        self.arg(index)
            .and_then(Value::as_bool)
            .ok_or(ActionError::BadArgument {
                index,
                expected: "Bool",
            })
    }

    /// Text argument; `Absent` reads as the empty string.
    pub fn text(&self, index: usize) -> &str {
        self.arg(index).and_then(Value::as_str).unwrap_or_default()
    }

    /// Cancellation signal, or a token that is never cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone().unwrap_or_else(CancellationToken::new)
    }

    fn int<T: TryFrom<i64>>(&self, index: usize, expected: &'static str) -> Result<T, ActionError> {
        self.arg(index)
            .and_then(Value::as_i64)
            .and_then(|v| T::try_from(v).ok())
            .ok_or(ActionError::BadArgument { index, expected })
    }
}

/// Registration target for an [`ActionSurface`].
#[derive(Default)]
pub struct ActionTable {
    entries: Vec<ActionDescriptor>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start declaring an operation named `name`.
    pub fn add(&mut self, name: impl Into<String>) -> DescriptorBuilder<'_> {
        DescriptorBuilder {
            table: self,
            name: name.into(),
            params: Vec::new(),
            variadic: None,
            cancellable: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fluent declaration of one operation, finished by [`DescriptorBuilder::handler`].
pub struct DescriptorBuilder<'a> {
    table: &'a mut ActionTable,
    name: String,
    params: Vec<Param>,
    variadic: Option<SemanticType>,
    cancellable: bool,
}

impl DescriptorBuilder<'_> {
    pub fn param(mut self, name: &'static str, ty: SemanticType) -> Self {
        self.params.push(Param {
            name,
            ty,
            default: None,
        });
        self
    }

    /// A parameter with a declared default.
    pub fn optional(mut self, name: &'static str, ty: SemanticType, default: Value) -> Self {
        self.params.push(Param {
            name,
            ty,
            default: Some(default),
        });
        self
    }

    pub fn variadic(mut self, ty: SemanticType) -> Self {
        self.variadic = Some(ty);
        self
    }

    pub fn cancellable(mut self) -> Self {
        self.cancellable = true;
        self
    }

    pub fn handler<F, Fut>(self, f: F)
    where
        F: Fn(ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let handler: ActionFn = Arc::new(move |call| f(call).boxed());
        self.table.entries.push(ActionDescriptor {
            name: self.name,
            params: self.params,
            variadic: self.variadic,
            cancellable: self.cancellable,
            handler,
        });
    }
}

type Candidates = Arc<[Arc<ActionDescriptor>]>;

/// Name/arity lookup over a collaborator's operations.
pub struct Registry {
    by_name: HashMap<String, Vec<Arc<ActionDescriptor>>>,
    cache: RwLock<HashMap<String, HashMap<usize, Candidates>>>,
}

impl Registry {
    /// Collect the collaborator's operations. Runs once; lookups never rescan it.
    pub fn build<S: ActionSurface>(surface: Arc<S>) -> Self {
        let mut table = ActionTable::new();
        surface.expose(&mut table);
        Self::from_table(table)
    }

    pub fn from_table(table: ActionTable) -> Self {
        let mut by_name: HashMap<String, Vec<Arc<ActionDescriptor>>> = HashMap::new();
        for descriptor in table.entries {
            trace!(
                target: "scriptbot::registry",
                name = %descriptor.name,
                arity = descriptor.arity(),
                variadic = descriptor.variadic.is_some(),
                "Registered action"
            );
            by_name
                .entry(descriptor.name.clone())
                .or_default()
                .push(Arc::new(descriptor));
        }
        debug!(
            target: "scriptbot::registry",
            names = by_name.len(),
            "Action registry built"
        );
        Self {
            by_name,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Candidates for `name` that can bind `arg_count` arguments, in registration order.
    /// Empty when nothing matches.
    pub fn resolve_candidates(&self, name: &str, arg_count: usize) -> Candidates {
        if let Some(hit) = self
            .cache
            .read()
            .get(name)
            .and_then(|by_count| by_count.get(&arg_count))
        {
            return hit.clone();
        }

        let found: Candidates = self
            .by_name
            .get(name)
            .map(|all| {
                all.iter()
                    .filter(|d| d.accepts(arg_count))
                    .cloned()
                    .collect()
            })
            .unwrap_or_else(|| Arc::from(Vec::new()));

        // A racing writer may have inserted first; keep whichever landed.
        self.cache
            .write()
            .entry(name.to_string())
            .or_default()
            .entry(arg_count)
            .or_insert(found)
            .clone()
    }

    /// The zero-parameter operation `name` names, if any.
    pub fn nullary(&self, name: &str) -> Option<Arc<ActionDescriptor>> {
        // Most literals name nothing; keep them out of the cache.
        if !self.contains(name) {
            return None;
        }
        self.resolve_candidates(name, 0)
            .iter()
            .find(|d| d.is_nullary())
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ActionTable {
        let mut t = ActionTable::new();
        t.add("X")
            .param("a", SemanticType::Text)
            .handler(|_| async { Ok(None) });
        t.add("X")
            .param("a", SemanticType::Int32)
            .param("b", SemanticType::Int32)
            .param("c", SemanticType::Int32)
            .handler(|_| async { Ok(None) });
        t.add("Opt")
            .param("a", SemanticType::Int32)
            .optional("b", SemanticType::Int32, Value::Int32(5))
            .handler(|_| async { Ok(None) });
        t.add("Log")
            .variadic(SemanticType::Text)
            .handler(|_| async { Ok(None) });
        t.add("Now").handler(|_| async { Ok(Some(Value::Int32(1))) });
        t
    }

    #[test]
    fn test_candidates_by_arity() {
        let reg = Registry::from_table(table());
        assert_eq!(reg.resolve_candidates("X", 1).len(), 1);
        assert_eq!(reg.resolve_candidates("X", 3).len(), 1);
        assert!(reg.resolve_candidates("X", 2).is_empty());
        assert!(reg.resolve_candidates("Missing", 0).is_empty());
    }

    #[test]
    fn test_defaults_and_variadic_widen_accepted_counts() {
        let reg = Registry::from_table(table());
        assert!(reg.resolve_candidates("Opt", 0).is_empty());
        assert_eq!(reg.resolve_candidates("Opt", 1).len(), 1);
        assert_eq!(reg.resolve_candidates("Opt", 2).len(), 1);
        assert!(reg.resolve_candidates("Opt", 3).is_empty());
        assert_eq!(reg.resolve_candidates("Log", 0).len(), 1);
        assert_eq!(reg.resolve_candidates("Log", 9).len(), 1);
    }

    #[test]
    fn test_lookups_are_stable() {
        let reg = Registry::from_table(table());
        let first = reg.resolve_candidates("X", 3);
        let second = reg.resolve_candidates("X", 3);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_nullary_alias() {
        let reg = Registry::from_table(table());
        assert!(reg.nullary("Now").is_some());
        // Variadic with zero arguments is not an alias.
        assert!(reg.nullary("Log").is_none());
        assert!(reg.nullary("X").is_none());
    }

    #[test]
    fn test_action_call_accessors() {
        let call = ActionCall {
            args: vec![Value::Int32(-3), Value::Absent, Value::text("hi")],
            ..Default::default()
        };
        assert_eq!(call.i32(0).unwrap(), -3);
        assert!(call.u32(0).is_err());
        assert_eq!(call.text(1), "");
        assert_eq!(call.text(2), "hi");
        assert!(!call.cancel_token().is_cancelled());
    }
}
