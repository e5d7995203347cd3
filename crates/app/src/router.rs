//! Entity router — folds the aggregation strategies over the shrinking set of
//! unclaimed addresses.
//!
//! Two paths exist. When the catalog carries com-object bindings, structured
//! mapping runs first and everything it leaves goes through the fallback
//! sweep. Otherwise the naming/topology heuristics run in a fixed order.

use std::collections::HashSet;

use knxha_domain::catalog::Catalog;
use knxha_domain::dpt::DptNormalizer;
use knxha_domain::entity::HaEntities;
use knxha_domain::record::RawAddress;
use knxha_domain::snapshot::ClassifyOptions;

use crate::classify::{
    AddressBlocks, CoverGrouping, FallbackClassifier, LaPattern, Strategy, StrategyContext,
    StrategyOutcome, StructuredMapping, SwitchPairing,
};

/// Applies strategy precedence and post-filters to one catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityRouter {
    options: ClassifyOptions,
}

/// Unclaimed addresses, in catalog order.
struct Remaining<'a> {
    addresses: Vec<&'a RawAddress>,
}

impl<'a> Remaining<'a> {
    fn new(catalog: &'a Catalog) -> Self {
        Self {
            addresses: catalog.addresses.iter().collect(),
        }
    }

    fn run(
        &mut self,
        strategy: &dyn Strategy,
        ctx: &StrategyContext<'_>,
        entities: &mut HaEntities,
    ) -> usize {
        let outcome = strategy.apply(ctx, &self.addresses);
        self.absorb(strategy.name(), outcome, entities)
    }

    fn absorb(&mut self, name: &str, outcome: StrategyOutcome, entities: &mut HaEntities) -> usize {
        let produced = outcome.entities.len();
        tracing::debug!(
            strategy = name,
            entities = produced,
            consumed = outcome.consumed.len(),
            "strategy applied"
        );
        let consumed: HashSet<&str> = outcome.consumed.iter().map(String::as_str).collect();
        self.addresses.retain(|a| !consumed.contains(a.id.as_str()));
        entities.extend(outcome.entities);
        produced
    }
}

impl EntityRouter {
    #[must_use]
    pub fn new(options: ClassifyOptions) -> Self {
        Self { options }
    }

    /// Classify `catalog` into Home Assistant entities.
    ///
    /// The result is rebuilt from scratch on every call.
    #[tracing::instrument(skip_all, fields(addresses = catalog.addresses.len()))]
    #[must_use]
    pub fn route(&self, catalog: &Catalog, dpts: &DptNormalizer) -> HaEntities {
        let ctx = StrategyContext::new(catalog, dpts);
        let mut remaining = Remaining::new(catalog);
        let mut entities = HaEntities::new();

        let structured = catalog.has_bindings() && {
            let outcome = StructuredMapping.apply(&ctx, &remaining.addresses);
            if outcome.entities.is_empty() {
                false
            } else {
                remaining.absorb(StructuredMapping.name(), outcome, &mut entities);
                true
            }
        };

        if !structured {
            let link_driven = LaPattern::link_driven();
            let by_name = LaPattern::by_name();
            let mut precedence: Vec<&dyn Strategy> = Vec::with_capacity(3);
            if ctx.has_links() {
                precedence.push(&link_driven);
            }
            precedence.push(&AddressBlocks);
            precedence.push(&by_name);
            for strategy in precedence {
                if remaining.run(strategy, &ctx, &mut entities) > 0 {
                    break;
                }
            }
            remaining.run(&SwitchPairing, &ctx, &mut entities);
            remaining.run(&CoverGrouping, &ctx, &mut entities);
        }

        remaining.run(&FallbackClassifier, &ctx, &mut entities);

        if self.options.drop_reserve {
            let before = entities.len();
            entities.retain(|e| !e.name().trim().eq_ignore_ascii_case("reserve"));
            tracing::debug!(dropped = before - entities.len(), "reserve entities dropped");
        }

        tracing::info!(
            entities = entities.len(),
            structured,
            "classification finished"
        );
        entities
    }
}
