use std::collections::HashMap;

/// Memoized base-2 log likelihoods for one alignment.
///
/// Entries are never invalidated: a modified alignment is a new model with its own
/// cache.
#[derive(Debug, Default, Clone)]
pub struct LikelihoodCache {
    paired: HashMap<(usize, usize), f64>,
    single: HashMap<usize, f64>,
}

impl LikelihoodCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_paired(&mut self, pos5: usize, pos3: usize, log_likelihood: f64) {
        self.paired.insert((pos5, pos3), log_likelihood);
    }

    pub fn paired(&self, pos5: usize, pos3: usize) -> Option<f64> {
        self.paired.get(&(pos5, pos3)).copied()
    }

    pub fn insert_single(&mut self, position: usize, log_likelihood: f64) {
        self.single.insert(position, log_likelihood);
    }

    pub fn single(&self, position: usize) -> Option<f64> {
        self.single.get(&position).copied()
    }

    pub fn len(&self) -> usize {
        self.paired.len() + self.single.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paired.is_empty() && self.single.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_entries_are_keyed_by_ordered_columns() {
        let mut cache = LikelihoodCache::new();
        cache.insert_paired(2, 9, -3.5);
        assert_eq!(cache.paired(2, 9), Some(-3.5));
        assert_eq!(cache.paired(9, 2), None);
        assert_eq!(cache.single(2), None);
    }

    #[test]
    fn len_counts_both_kinds() {
        let mut cache = LikelihoodCache::new();
        assert!(cache.is_empty());
        cache.insert_paired(0, 5, -1.0);
        cache.insert_single(0, -2.0);
        cache.insert_single(0, -2.5);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.single(0), Some(-2.5));
    }
}
