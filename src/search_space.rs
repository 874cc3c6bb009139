//! Search-space computation across a study's trial history.

use std::collections::BTreeSet;

use crate::distribution::SearchSpace;
use crate::trial::FrozenTrial;
use crate::types::TrialState;

/// Incrementally computes the intersection of parameter spaces across a
/// study's trials.
///
/// Finished trials are folded into a cached intersection, so repeated calls
/// only visit trials appended since the previous call. Waiting and running
/// trials hold the watermark back until they finish.
#[derive(Clone, Debug)]
pub struct IntersectionSearchSpace {
    include_pruned: bool,
    cached_trial_number: Option<usize>,
    search_space: Option<SearchSpace>,
}

impl IntersectionSearchSpace {
    /// Creates an empty intersection calculator.
    #[must_use]
    pub fn new(include_pruned: bool) -> Self {
        Self {
            include_pruned,
            cached_trial_number: None,
            search_space: None,
        }
    }

    /// Intersects the distributions of all relevant trials and returns the
    /// result keyed by parameter name.
    pub fn calculate(&mut self, trials: &[FrozenTrial]) -> SearchSpace {
        let mut next_cached = None;
        for trial in trials.iter().rev() {
            if !self.state_of_interest(trial.state) {
                continue;
            }

            if next_cached.is_none() {
                next_cached = Some(trial.number + 1);
            }

            if self
                .cached_trial_number
                .is_some_and(|cached| cached > trial.number)
            {
                break;
            }

            if !trial.state.is_finished() {
                next_cached = Some(trial.number);
                continue;
            }

            match &mut self.search_space {
                None => self.search_space = Some(trial.distributions.clone()),
                Some(space) => {
                    space.retain(|name, dist| {
                        trial.distributions.get(name).is_some_and(|d| *d == *dist)
                    });
                }
            }
        }

        self.cached_trial_number = next_cached;
        self.search_space.clone().unwrap_or_default()
    }

    fn state_of_interest(&self, state: TrialState) -> bool {
        matches!(
            state,
            TrialState::Complete | TrialState::Waiting | TrialState::Running
        ) || (self.include_pruned && state == TrialState::Pruned)
    }
}

/// Disjoint parameter subspaces maintained by partition refinement.
///
/// Each call to [`SearchSpaceGroup::add_distributions`] splits every existing
/// subspace into the part shared with the new trial and the part unique to it,
/// then appends any parameters seen for the first time as their own subspace.
#[derive(Clone, Debug, Default)]
pub struct SearchSpaceGroup {
    search_spaces: Vec<SearchSpace>,
}

impl SearchSpaceGroup {
    /// Creates a group with no subspaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current disjoint subspaces, oldest split first.
    #[must_use]
    pub fn search_spaces(&self) -> &[SearchSpace] {
        &self.search_spaces
    }

    /// Refines the partition against the keys of `distributions`.
    pub fn add_distributions(&mut self, distributions: &SearchSpace) {
        let mut dist_keys: BTreeSet<&str> = distributions.keys().map(String::as_str).collect();
        let mut next_spaces = Vec::new();

        for space in &self.search_spaces {
            let mut intersect = SearchSpace::new();
            let mut left = SearchSpace::new();
            for (key, dist) in space {
                if dist_keys.contains(key.as_str()) {
                    intersect.insert(key.clone(), dist.clone());
                } else {
                    left.insert(key.clone(), dist.clone());
                }
            }
            if !intersect.is_empty() {
                next_spaces.push(intersect);
            }
            if !left.is_empty() {
                next_spaces.push(left);
            }
            for key in space.keys() {
                dist_keys.remove(key.as_str());
            }
        }

        let mut right = SearchSpace::new();
        for key in dist_keys {
            if let Some(dist) = distributions.get(key) {
                right.insert(key.to_owned(), dist.clone());
            }
        }
        if !right.is_empty() {
            next_spaces.push(right);
        }

        self.search_spaces = next_spaces;
    }
}

/// Splits the parameters of finished trials into disjoint groups of names
/// that always occur together.
#[derive(Clone, Debug)]
pub struct GroupDecomposedSearchSpace {
    include_pruned: bool,
    group: SearchSpaceGroup,
}

impl GroupDecomposedSearchSpace {
    /// Creates an empty decomposition.
    #[must_use]
    pub fn new(include_pruned: bool) -> Self {
        Self {
            include_pruned,
            group: SearchSpaceGroup::new(),
        }
    }

    /// Folds every finished trial's distributions into the group and returns
    /// the refined partition.
    pub fn calculate(&mut self, trials: &[FrozenTrial]) -> SearchSpaceGroup {
        for trial in trials {
            let of_interest = trial.state == TrialState::Complete
                || (self.include_pruned && trial.state == TrialState::Pruned);
            if !of_interest {
                continue;
            }
            self.group.add_distributions(&trial.distributions);
        }
        self.group.clone()
    }
}
