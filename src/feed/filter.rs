// Filter engine: (signals, criteria) -> visible subset

use crate::types::{ActionFilter, FilterCriteria, SessionFilter, Signal};

/// Compiled form of [`FilterCriteria`] with the search term lower-cased once
struct Predicate<'a> {
    needle: Option<String>,
    criteria: &'a FilterCriteria,
}

impl<'a> Predicate<'a> {
    fn new(criteria: &'a FilterCriteria) -> Self {
        let needle = (!criteria.search_term.is_empty()).then(|| criteria.search_term.to_lowercase());
        Predicate { needle, criteria }
    }

    fn matches(&self, signal: &Signal) -> bool {
        let pair_ok = match &self.needle {
            Some(needle) => signal.pair.to_lowercase().contains(needle.as_str()),
            None => true,
        };

        let action_ok = match self.criteria.action {
            ActionFilter::All => true,
            ActionFilter::Only(action) => signal.action == action,
        };

        let session_ok = match self.criteria.session {
            SessionFilter::All => true,
            SessionFilter::Only(session) => signal.session == session,
        };

        pair_ok && action_ok && session_ok
    }
}

impl FilterCriteria {
    pub fn matches(&self, signal: &Signal) -> bool {
        Predicate::new(self).matches(signal)
    }
}

/// Signals satisfying every constraint in `criteria`, in their input order.
pub fn visible(signals: &[Signal], criteria: &FilterCriteria) -> Vec<Signal> {
    if criteria.is_unconstrained() {
        return signals.to_vec();
    }

    let predicate = Predicate::new(criteria);
    signals
        .iter()
        .filter(|signal| predicate.matches(signal))
        .cloned()
        .collect()
}
