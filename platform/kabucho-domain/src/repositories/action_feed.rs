use crate::errors::FeedError;
use crate::value_objects::corporate_action::CorporateAction;

/// Source of split/consolidation notices. A malformed or unreachable
/// source must surface as an error; returning an empty set for a broken
/// page would let the pipeline adjust against a silently stale registry.
pub trait CorporateActionFeed {
    fn refresh(&self) -> Result<Vec<CorporateAction>, FeedError>;
}
