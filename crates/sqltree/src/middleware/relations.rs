use super::types::{Middleware, RelationProvider};
use crate::relation::{Relation, RelationRegistry};

/// Carries relation declarations into the executor.
///
/// The executor merges every provider's registry when the pipeline is
/// composed; `QueryTree::with` and lazy relations both resolve against it.
#[derive(Debug, Clone, Default)]
pub struct RelationMiddleware {
    registry: RelationRegistry,
}

impl RelationMiddleware {
    pub fn new(registry: RelationRegistry) -> Self {
        Self { registry }
    }

    /// Declare `relation` on `owner`.
    pub fn relation(mut self, owner: impl Into<String>, relation: Relation) -> Self {
        self.registry.insert(owner, relation);
        self
    }
}

impl Middleware for RelationMiddleware {
    fn name(&self) -> &str {
        "relations"
    }

    fn as_relations(&self) -> Option<&dyn RelationProvider> {
        Some(self)
    }
}

impl RelationProvider for RelationMiddleware {
    fn relations(&self) -> &RelationRegistry {
        &self.registry
    }
}
