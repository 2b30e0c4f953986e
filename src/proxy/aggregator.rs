//! Grouping of probe outcomes for reporting

use crate::proxy::models::{ProbeOutcome, ResultSet};

/// Drop dead proxies and group the rest by protocol family, keeping their order
pub fn aggregate<I>(outcomes: I) -> ResultSet
where
    I: IntoIterator<Item = Option<ProbeOutcome>>,
{
    let mut results = ResultSet::new();
    for outcome in outcomes.into_iter().flatten() {
        results.push(outcome);
    }
    results
}
