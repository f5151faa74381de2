use super::candidate::Candidate;
use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct HallOfFameEntry {
    pub candidate: Candidate,
    pub fitness: f64,
    pub generation: usize,
    pub fingerprint: String, // for deduplication
}

/// Best candidates ever evaluated, one per structure, ascending by fitness
pub struct HallOfFame {
    entries: Vec<HallOfFameEntry>,
    max_size: usize,
    seen_fingerprints: HashSet<String>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size,
            seen_fingerprints: HashSet::new(),
        }
    }

    /// Offers an evaluated candidate. A structure already present is only
    /// replaced when the new evaluation beats it.
    pub fn try_add(&mut self, candidate: &Candidate, fitness: f64, generation: usize) -> bool {
        if fitness.is_nan() || self.max_size == 0 {
            return false;
        }

        let fingerprint = candidate.fingerprint();
        if self.seen_fingerprints.contains(fingerprint) {
            let Some(existing) = self.entries.iter_mut().find(|e| e.fingerprint == fingerprint) else {
                return false;
            };
            if fitness >= existing.fitness {
                return false;
            }
            existing.candidate = candidate.clone();
            existing.fitness = fitness;
            existing.generation = generation;
        } else {
            self.entries.push(HallOfFameEntry {
                candidate: candidate.clone(),
                fitness,
                generation,
                fingerprint: fingerprint.to_string(),
            });
            self.seen_fingerprints.insert(fingerprint.to_string());
        }

        self.sort_and_trim();
        self.seen_fingerprints.contains(fingerprint)
    }

    fn sort_and_trim(&mut self) {
        self.entries.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        while self.entries.len() > self.max_size {
            if let Some(removed) = self.entries.pop() {
                self.seen_fingerprints.remove(&removed.fingerprint);
            }
        }
    }

    pub fn get_all(&self) -> &[HallOfFameEntry] {
        &self.entries
    }

    pub fn get_top_n(&self, n: usize) -> &[HallOfFameEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn best(&self) -> Option<&HallOfFameEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Op, Topology};

    fn candidate(units: usize) -> Candidate {
        Candidate::new(Topology::sequential(vec![4], vec![("out", Op::Dense { units })]).unwrap())
    }

    #[test]
    fn test_sorted_ascending_and_trimmed() {
        let mut hof = HallOfFame::new(2);
        assert!(hof.try_add(&candidate(1), 0.9, 0));
        assert!(hof.try_add(&candidate(2), 0.1, 0));
        assert!(hof.try_add(&candidate(3), 0.5, 1));
        assert!(!hof.try_add(&candidate(4), 2.0, 1));

        let fitness: Vec<f64> = hof.get_all().iter().map(|e| e.fitness).collect();
        assert_eq!(fitness, vec![0.1, 0.5]);
        assert_eq!(hof.get_top_n(5).len(), 2);
    }

    #[test]
    fn test_same_structure_keeps_best_evaluation() {
        let mut hof = HallOfFame::new(5);
        assert!(hof.try_add(&candidate(3), 0.4, 0));
        assert!(!hof.try_add(&candidate(3), 0.6, 1));
        assert!(hof.try_add(&candidate(3), 0.2, 2));
        assert_eq!(hof.len(), 1);
        assert_eq!(hof.best().map(|e| (e.fitness, e.generation)), Some((0.2, 2)));
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut hof = HallOfFame::new(3);
        assert!(!hof.try_add(&candidate(1), f64::NAN, 0));
        assert!(hof.is_empty());
    }
}
