//! Step resolution and invocation.
//!
//! Protocol for one step:
//! 1. Arguments are expanded left to right. A bracket expression is invoked
//!    (depth-first) and replaced by its result's text, or an empty token if it
//!    returned nothing. A literal naming a zero-parameter action is invoked and
//!    replaced the same way.
//! 2. Candidates for `(name, count)` come from the registry. If none exist and
//!    more than one token was given, all tokens are joined with single spaces
//!    and the lookup is retried with one argument.
//! 3. Candidates are tried in registration order; the first whose parameters all
//!    coerce is invoked. Missing trailing arguments take declared defaults, extra
//!    ones fill a variadic tail, and a cancellation slot gets the run's token.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::coerce::{CoercionFailure, coerce};
use super::error::InvocationError;
use super::registry::{ActionCall, ActionDescriptor, Registry};
use super::types::Value;
use crate::script::{Arg, Step};

pub type InvocationResult = Result<Option<Value>, InvocationError>;

/// Resolves steps against a [`Registry`] and invokes them.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<Registry>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Invoke `step`, resolving nested steps first. Returns the step's value, if any.
    pub fn invoke<'a>(
        &'a self,
        step: &'a Step,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, InvocationResult> {
        async move {
            let tokens = self.expand_args(step, cancel).await?;
            self.dispatch(&step.action, tokens, cancel).await
        }
        .boxed()
    }

    async fn expand_args(
        &self,
        step: &Step,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, InvocationError> {
        let mut tokens = Vec::with_capacity(step.args.len());
        for arg in &step.args {
            let token = match arg {
                Arg::Nested(inner) => {
                    trace!(
                        target: "scriptbot::resolver",
                        outer = %step.action, inner = %inner.action,
                        "Resolving nested step"
                    );
                    self.invoke(inner, cancel).await?
                }
                Arg::Literal(text) => match self.registry.nullary(text) {
                    Some(alias) => {
                        trace!(target: "scriptbot::resolver", alias = %text, "Resolving bare-word action");
                        self.call(&alias, ActionCall::default(), cancel).await?
                    }
                    None => {
                        tokens.push(text.clone());
                        continue;
                    }
                },
            };
            tokens.push(token.map(|v| v.to_token()).unwrap_or_default());
        }
        Ok(tokens)
    }

    async fn dispatch(
        &self,
        name: &str,
        tokens: Vec<String>,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        let arg_count = tokens.len();
        let mut candidates = self.registry.resolve_candidates(name, arg_count);
        let mut tokens = tokens;

        if candidates.is_empty() && arg_count > 1 {
            let joined = tokens.join(" ");
            debug!(
                target: "scriptbot::resolver",
                action = %name, arg_count, joined = %joined,
                "No overload for argument count; collapsing into one text argument"
            );
            candidates = self.registry.resolve_candidates(name, 1);
            tokens = vec![joined];
        }

        let mut last_failure = None;
        for descriptor in candidates.iter() {
            match bind(descriptor, &tokens) {
                Ok(call) => return self.call(descriptor, call, cancel).await,
                Err(failure) => {
                    trace!(
                        target: "scriptbot::resolver",
                        action = %name, error = %failure,
                        "Candidate rejected"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        Err(InvocationError::Unresolved {
            name: name.to_string(),
            arg_count,
            last_failure,
        })
    }

    async fn call(
        &self,
        descriptor: &ActionDescriptor,
        mut call: ActionCall,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        if cancel.is_cancelled() {
            return Err(InvocationError::Cancelled {
                name: descriptor.name.clone(),
            });
        }
        if descriptor.cancellable {
            call.cancel = Some(cancel.clone());
        }
        trace!(
            target: "scriptbot::resolver",
            action = %descriptor.name,
            args = call.args.len(),
            rest = call.rest.len(),
            "Invoking action"
        );
        descriptor
            .call(call)
            .await
            .map_err(|e| InvocationError::from_action(&descriptor.name, e))
    }
}

/// Coerce `tokens` against `descriptor`'s parameters.
fn bind(descriptor: &ActionDescriptor, tokens: &[String]) -> Result<ActionCall, CoercionFailure> {
    let mut args = Vec::with_capacity(descriptor.arity());
    for (i, param) in descriptor.params.iter().enumerate() {
        let value = match tokens.get(i) {
            Some(token) => coerce(token, param.ty)?,
            None => param.default.clone().unwrap_or_else(|| param.ty.zero()),
        };
        args.push(value);
    }

    let rest = match descriptor.variadic {
        Some(ty) => tokens
            .iter()
            .skip(descriptor.arity())
            .map(|t| coerce(t, ty))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ActionCall {
        args,
        rest,
        cancel: None,
    })
}
