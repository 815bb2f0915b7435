//! Execution router ("diamond" facet dispatcher)
//!
//! Simulates an upgradeable-contract call-routing mechanism: named facets
//! bind opaque selectors to handlers, a routing table maps each selector to
//! exactly one facet, and dispatch resolves selector -> facet -> handler.
//!
//! Registration is last-writer-wins with no conflict detection. That is the
//! routing contract being simulated, not an oversight; a `cut` can freely
//! re-point selectors at another facet.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouterError {
    /// No facet is registered for the selector at all.
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    /// The routing table points at a facet that lacks an implementation for
    /// the selector. Distinct from `SelectorNotFound` so a misconfigured cut
    /// can be told apart from a missing registration.
    #[error("facet {facet} has no handler for selector {selector}")]
    HandlerMissing { selector: String, facet: String },
    #[error("handler rejected call to {selector}: {reason}")]
    HandlerRejected { selector: String, reason: String },
}

/// Receipt returned by every successful dispatch, standing in for a
/// settlement acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub status: String,
    /// Opaque execution reference, attached to the resulting ledger entry.
    pub reference: String,
}

impl ExecutionReceipt {
    fn new(status: impl Into<String>) -> Self {
        ExecutionReceipt {
            status: status.into(),
            reference: format!("0x{}", Uuid::new_v4().simple()),
        }
    }
}

/// A named group of selector-bound operation implementations.
#[async_trait]
pub trait Facet: Send + Sync {
    fn name(&self) -> &'static str;
    fn selectors(&self) -> &'static [&'static str];

    /// Handle one selector. `None` means this facet has no implementation
    /// for it (surfaced by the router as `HandlerMissing`).
    async fn invoke(&self, selector: &str, args: &Value)
    -> Option<Result<ExecutionReceipt, String>>;
}

/// Registry mapping selectors to facets, with a single dispatch entry point.
pub struct ExecutionRouter {
    facets: DashMap<String, Arc<dyn Facet>>,
    /// selector -> facet name
    routes: DashMap<String, String>,
}

impl ExecutionRouter {
    pub fn new() -> Self {
        ExecutionRouter {
            facets: DashMap::new(),
            routes: DashMap::new(),
        }
    }

    /// Router with the built-in facet set installed.
    pub fn with_default_facets() -> Self {
        let router = Self::new();
        router.register(Arc::new(TradingFacet));
        router.register(Arc::new(RiskFacet));
        router.register(Arc::new(ZkVerifierFacet));
        router
    }

    /// Install a facet and route all of its selectors to it. A selector
    /// already owned by another facet is silently re-pointed (last
    /// registration wins).
    pub fn register(&self, facet: Arc<dyn Facet>) {
        let name = facet.name();
        tracing::info!(facet = name, "registering facet");
        for selector in facet.selectors() {
            self.routes.insert((*selector).to_string(), name.to_string());
        }
        self.facets.insert(name.to_string(), facet);
    }

    /// Re-point selectors at an already-registered facet, last-writer-wins.
    pub fn cut(&self, facet_name: &str, selectors: &[&str]) {
        tracing::info!(facet = facet_name, ?selectors, "executing cut");
        for selector in selectors {
            self.routes
                .insert((*selector).to_string(), facet_name.to_string());
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    /// Route one call to its handler. Stands in for a remote settlement
    /// call, so the signature is async even though the simulation resolves
    /// immediately; no timeout or retry is applied here.
    pub async fn dispatch(
        &self,
        selector: &str,
        args: &Value,
    ) -> Result<ExecutionReceipt, RouterError> {
        let facet_name = self
            .routes
            .get(selector)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RouterError::SelectorNotFound(selector.to_string()))?;

        let facet = self
            .facets
            .get(&facet_name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RouterError::HandlerMissing {
                selector: selector.to_string(),
                facet: facet_name.clone(),
            })?;

        tracing::debug!(selector, facet = %facet_name, "delegating dispatch");
        match facet.invoke(selector, args).await {
            Some(Ok(receipt)) => Ok(receipt),
            Some(Err(reason)) => Err(RouterError::HandlerRejected {
                selector: selector.to_string(),
                reason,
            }),
            None => Err(RouterError::HandlerMissing {
                selector: selector.to_string(),
                facet: facet_name,
            }),
        }
    }
}

impl Default for ExecutionRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens and closes positions against the simulated settlement layer.
pub struct TradingFacet;

#[async_trait]
impl Facet for TradingFacet {
    fn name(&self) -> &'static str {
        "TradingFacet"
    }

    fn selectors(&self) -> &'static [&'static str] {
        &["executeTrade", "closePosition"]
    }

    async fn invoke(
        &self,
        selector: &str,
        args: &Value,
    ) -> Option<Result<ExecutionReceipt, String>> {
        match selector {
            "executeTrade" => {
                for field in ["symbol", "side", "price", "size"] {
                    if args.get(field).is_none() {
                        return Some(Err(format!("missing field {field}")));
                    }
                }
                Some(Ok(ExecutionReceipt::new("Executed")))
            }
            "closePosition" => {
                for field in ["id", "exitPrice"] {
                    if args.get(field).is_none() {
                        return Some(Err(format!("missing field {field}")));
                    }
                }
                Some(Ok(ExecutionReceipt::new("Closed")))
            }
            _ => None,
        }
    }
}

/// Exposure checks. The simulation always reports safe.
pub struct RiskFacet;

#[async_trait]
impl Facet for RiskFacet {
    fn name(&self) -> &'static str {
        "RiskFacet"
    }

    fn selectors(&self) -> &'static [&'static str] {
        &["checkRisk"]
    }

    async fn invoke(
        &self,
        selector: &str,
        _args: &Value,
    ) -> Option<Result<ExecutionReceipt, String>> {
        match selector {
            "checkRisk" => Some(Ok(ExecutionReceipt::new("Safe"))),
            _ => None,
        }
    }
}

/// Proof verification stub; the real system routes this to an on-chain
/// verifier, here it always accepts.
pub struct ZkVerifierFacet;

#[async_trait]
impl Facet for ZkVerifierFacet {
    fn name(&self) -> &'static str {
        "ZkVerifierFacet"
    }

    fn selectors(&self) -> &'static [&'static str] {
        &["verifyProof"]
    }

    async fn invoke(
        &self,
        selector: &str,
        _args: &Value,
    ) -> Option<Result<ExecutionReceipt, String>> {
        match selector {
            "verifyProof" => Some(Ok(ExecutionReceipt::new("Verified"))),
            _ => None,
        }
    }
}
