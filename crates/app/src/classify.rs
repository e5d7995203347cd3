//! Aggregation strategies — group raw addresses into Home Assistant entities.
//!
//! Each strategy sees only the addresses left unclaimed by the strategies
//! before it and reports which ids it consumed. The [`router`](crate::router)
//! decides the order.

pub mod address;
pub mod cover;
pub mod fallback;
pub mod la_pattern;
pub mod naming;
pub mod structured;
pub mod switch;

use std::collections::{BTreeSet, HashMap};

use knxha_domain::catalog::Catalog;
use knxha_domain::dpt::{Dpt, DptFamily, DptNormalizer};
use knxha_domain::entity::MappedEntity;
use knxha_domain::record::{Link, RawAddress};

pub use address::AddressBlocks;
pub use cover::CoverGrouping;
pub use fallback::FallbackClassifier;
pub use la_pattern::LaPattern;
pub use structured::StructuredMapping;
pub use switch::SwitchPairing;

/// Read-only inputs shared by every strategy of one classification run.
pub struct StrategyContext<'a> {
    pub catalog: &'a Catalog,
    pub dpts: &'a DptNormalizer,
    links: HashMap<&'a str, Vec<&'a Link>>,
}

impl<'a> StrategyContext<'a> {
    #[must_use]
    pub fn new(catalog: &'a Catalog, dpts: &'a DptNormalizer) -> Self {
        Self {
            catalog,
            dpts,
            links: catalog.links_by_address(),
        }
    }

    /// Links targeting `address_id`, in scan order.
    #[must_use]
    pub fn links_for(&self, address_id: &str) -> &[&'a Link] {
        self.links.get(address_id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has_links(&self) -> bool {
        !self.catalog.links.is_empty()
    }

    /// Declared datapoint type of an address.
    #[must_use]
    pub fn dpt(&self, address: &RawAddress) -> Option<Dpt> {
        address.dpt.as_deref().and_then(|raw| self.dpts.dpt(raw))
    }

    #[must_use]
    pub fn family(&self, address: &RawAddress) -> Option<DptFamily> {
        self.dpt(address).map(Dpt::family)
    }
}

/// What one strategy produced.
#[derive(Debug, Default)]
pub struct StrategyOutcome {
    pub entities: Vec<MappedEntity>,
    /// Every id claimed, including ids of groups that produced no entity.
    pub consumed: BTreeSet<String>,
}

impl StrategyOutcome {
    /// Record an entity and claim the ids it was built from.
    pub fn push(&mut self, entity: MappedEntity) {
        self.consumed.extend(entity.ids.iter().cloned());
        self.entities.push(entity);
    }

    pub fn consume(&mut self, id: &str) {
        self.consumed.insert(id.to_string());
    }
}

/// One aggregation pass over the remaining addresses.
pub trait Strategy {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Classify as much of `remaining` as this strategy understands.
    ///
    /// Implementations must only emit and consume ids present in `remaining`.
    fn apply(&self, ctx: &StrategyContext<'_>, remaining: &[&RawAddress]) -> StrategyOutcome;
}
