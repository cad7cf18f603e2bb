//! Ordered chain of filters processed in series

use super::filter::{Filter, FilterKind, FilterParameters};
use super::params;
use crate::domain::audio::{AudioBuffer, ProcessSpec};
use crate::domain::params::ParameterStore;
use tracing::{debug, trace};

/// Ordered, mutable sequence of filters
///
/// Order decides processing; the summed response does not depend on it.
/// Adding or removing filters must not race with `process`; callers on the
/// audio thread only use [`apply_parameters`](Self::apply_parameters),
/// which never allocates.
#[derive(Debug, Clone)]
pub struct FilterChain {
    filters: Vec<Filter>,
    spec: ProcessSpec,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::with_capacity(params::DEFAULT_FILTER_SLOTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            filters: Vec::with_capacity(capacity),
            spec: ProcessSpec::default(),
        }
    }

    /// Build one filter per slot of the store, in slot order
    pub fn from_store(store: &ParameterStore) -> Self {
        let mut chain = Self::with_capacity(store.num_slots());
        for index in 0..store.num_slots() {
            if let Some(params) = store.snapshot(index) {
                chain.push(Filter::with_parameters(params));
            }
        }
        chain
    }

    fn push(&mut self, mut filter: Filter) -> usize {
        filter.prepare(&self.spec);
        self.filters.push(filter);
        self.filters.len() - 1
    }

    /// Append a filter with default parameters, returns its index
    pub fn add_filter(&mut self, kind: FilterKind) -> usize {
        let index = self.push(Filter::new(kind));
        trace!(index, %kind, "Filter added");
        index
    }

    /// Append a filter built from explicit parameters
    pub fn add_filter_with(&mut self, params: FilterParameters) -> usize {
        self.push(Filter::with_parameters(params))
    }

    /// Remove and return the filter at `index`; out of range is a no-op
    pub fn remove_filter(&mut self, index: usize) -> Option<Filter> {
        if index >= self.filters.len() {
            return None;
        }
        trace!(index, "Filter removed");
        Some(self.filters.remove(index))
    }

    pub fn remove_all(&mut self) {
        self.filters.clear();
    }

    pub fn filter(&self, index: usize) -> Option<&Filter> {
        self.filters.get(index)
    }

    pub fn filter_mut(&mut self, index: usize) -> Option<&mut Filter> {
        self.filters.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Run every enabled filter in order
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        for filter in self.filters.iter_mut().filter(|f| f.is_enabled()) {
            filter.process(buffer);
        }
    }

    pub fn prepare(&mut self, spec: &ProcessSpec) {
        debug!(
            sample_rate = spec.sample_rate,
            max_block_size = spec.max_block_size,
            filters = self.filters.len(),
            "Preparing filter chain"
        );
        self.spec = *spec;
        for filter in &mut self.filters {
            filter.prepare(spec);
        }
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    pub fn update_all_coefficients(&mut self, sample_rate: f64) {
        self.spec.sample_rate = sample_rate;
        for filter in &mut self.filters {
            filter.update_coefficients(sample_rate);
        }
    }

    /// Sum of the enabled filters' responses in dB; 0 dB when none are
    pub fn total_frequency_response(&self, frequency: f32) -> f32 {
        self.filters
            .iter()
            .filter(|f| f.is_enabled())
            .map(|f| f.frequency_response(frequency))
            .sum()
    }

    /// Parameter snapshot of every filter, in order
    pub fn parameters(&self) -> Vec<FilterParameters> {
        self.filters.iter().map(Filter::parameters).collect()
    }

    /// Replace the kind of one filter by rebuilding the chain
    ///
    /// Every filter is reconstructed in place, keeping its position and its
    /// frequency, gain, Q, slope and enabled state. Delay state is cleared.
    /// Returns `false` for an unknown index.
    pub fn change_filter_kind(&mut self, index: usize, kind: FilterKind) -> bool {
        if index >= self.filters.len() {
            return false;
        }

        self.rebuild(|i, current| {
            if i == index {
                FilterParameters { kind, ..current }
            } else {
                current
            }
        });
        trace!(index, %kind, "Filter kind changed");
        true
    }

    /// Synchronize the chain with a parameter store, once per block
    ///
    /// If any slot's type differs from the filter at that position the whole
    /// chain is rebuilt from the store; otherwise each filter takes its
    /// slot's values and recomputes only if something changed. Filters
    /// without a slot keep their parameters. Returns `true` on rebuild.
    pub fn apply_parameters(&mut self, store: &ParameterStore) -> bool {
        let kind_changed = self
            .filters
            .iter()
            .enumerate()
            .any(|(i, f)| store.slot(i).is_some_and(|slot| slot.kind() != f.kind()));

        if kind_changed {
            self.rebuild(|i, current| store.snapshot(i).unwrap_or(current));
            trace!("Filter chain rebuilt from parameter store");
            return true;
        }

        for (i, filter) in self.filters.iter_mut().enumerate() {
            if let Some(params) = store.snapshot(i) {
                filter.set_parameters(params);
            }
        }
        false
    }

    fn rebuild(&mut self, next: impl Fn(usize, FilterParameters) -> FilterParameters) {
        let spec = self.spec;
        for (i, filter) in self.filters.iter_mut().enumerate() {
            let params = next(i, filter.parameters());
            *filter = Filter::with_parameters(params);
            filter.prepare(&spec);
        }
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}
