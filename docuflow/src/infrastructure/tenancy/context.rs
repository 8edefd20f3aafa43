// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Context
//!
//! Task-local stack tracking the "current tenant" across call frames. Every
//! operation that touches tenant data runs inside a binding; tenant-scoped
//! repositories call [`TenantContext::require`] and fail loudly with
//! `MissingTenantContext` when no binding is present.
//!
//! ## Binding styles
//!
//! - [`TenantContext::run`] - scoped acquisition around a future. The
//!   binding is pushed for exactly the lifetime of the future and restored
//!   on every exit path, including errors and cancellation, because the
//!   task-local scope unwinds with the future. Nested `run` calls shadow
//!   and then restore the outer binding.
//! - [`TenantContext::scope`] + [`TenantContext::bind`] /
//!   [`TenantContext::unbind`] - explicit begin/end for long-running
//!   handlers (queue workers, request middleware) that rebind per unit of
//!   work inside one installed scope.
//!
//! The binding is task-local, never process-global: work units crossing a
//! process boundary carry `tenant_id` explicitly and rebind on arrival.

use std::cell::RefCell;
use std::future::Future;

use docuflow_domain::{EngineError, Tenant};

tokio::task_local! {
    static TENANT_STACK: RefCell<Vec<Tenant>>;
}

/// Process-local tenant binding operations.
pub struct TenantContext;

impl TenantContext {
    /// The current binding on this task, if any.
    pub fn current() -> Option<Tenant> {
        TENANT_STACK
            .try_with(|stack| stack.borrow().last().cloned())
            .ok()
            .flatten()
    }

    /// The current binding, or `MissingTenantContext` naming the caller.
    pub fn require(operation: &str) -> Result<Tenant, EngineError> {
        Self::current().ok_or_else(|| {
            EngineError::missing_tenant_context(format!(
                "{} invoked without a tenant binding",
                operation
            ))
        })
    }

    /// Runs a future with `tenant` bound, restoring the outer binding (or
    /// absence of one) afterwards on all exit paths.
    pub async fn run<F, T>(tenant: Tenant, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        // A nested scope carries the parent stack plus the new binding, so
        // the outer scope is untouched regardless of how `fut` exits.
        let mut stack = TENANT_STACK
            .try_with(|s| s.borrow().clone())
            .unwrap_or_default();
        stack.push(tenant);
        TENANT_STACK.scope(RefCell::new(stack), fut).await
    }

    /// Installs an empty binding stack for a long-running handler. `bind`
    /// and `unbind` only work inside an installed scope.
    pub async fn scope<F, T>(fut: F) -> T
    where
        F: Future<Output = T>,
    {
        TENANT_STACK.scope(RefCell::new(Vec::new()), fut).await
    }

    /// Pushes a binding inside an installed scope.
    pub fn bind(tenant: Tenant) -> Result<(), EngineError> {
        TENANT_STACK
            .try_with(|stack| stack.borrow_mut().push(tenant))
            .map_err(|_| {
                EngineError::missing_tenant_context(
                    "bind called outside an installed tenant scope",
                )
            })
    }

    /// Pops the innermost binding inside an installed scope.
    pub fn unbind() -> Option<Tenant> {
        TENANT_STACK
            .try_with(|stack| stack.borrow_mut().pop())
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(slug: &str) -> Tenant {
        Tenant::new(slug.into(), format!("{slug}@tenants.test")).unwrap()
    }

    #[tokio::test]
    async fn no_binding_outside_a_scope() {
        assert!(TenantContext::current().is_none());
        let err = TenantContext::require("campaign list").unwrap_err();
        assert!(matches!(err, EngineError::MissingTenantContext(_)));
    }

    #[tokio::test]
    async fn run_binds_and_restores() {
        let a = tenant("acme");
        let slug = TenantContext::run(a.clone(), async {
            TenantContext::current().unwrap().slug().to_string()
        })
        .await;
        assert_eq!(slug, "acme");
        assert!(TenantContext::current().is_none());
    }

    #[tokio::test]
    async fn nested_run_restores_the_outer_binding() {
        let outer = tenant("outer");
        let inner = tenant("inner");
        TenantContext::run(outer, async {
            assert_eq!(TenantContext::current().unwrap().slug(), "outer");
            TenantContext::run(inner, async {
                assert_eq!(TenantContext::current().unwrap().slug(), "inner");
            })
            .await;
            assert_eq!(TenantContext::current().unwrap().slug(), "outer");
        })
        .await;
    }

    #[tokio::test]
    async fn run_restores_even_when_the_future_errors() {
        let a = tenant("acme");
        let result: Result<(), EngineError> = TenantContext::run(a, async {
            Err(EngineError::internal_error("boom"))
        })
        .await;
        assert!(result.is_err());
        assert!(TenantContext::current().is_none());
    }

    #[tokio::test]
    async fn bind_requires_an_installed_scope() {
        assert!(TenantContext::bind(tenant("acme")).is_err());
        TenantContext::scope(async {
            TenantContext::bind(tenant("acme")).unwrap();
            assert_eq!(TenantContext::current().unwrap().slug(), "acme");
            let popped = TenantContext::unbind().unwrap();
            assert_eq!(popped.slug(), "acme");
            assert!(TenantContext::current().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn bindings_do_not_leak_across_tasks() {
        let a = tenant("acme");
        TenantContext::run(a, async {
            let other_task = tokio::spawn(async { TenantContext::current().is_none() });
            assert!(other_task.await.unwrap());
        })
        .await;
    }
}
