use super::{Selected, Selection};
use crate::types::FitnessRecord;

/// Best first; ties keep their original order
#[derive(Debug, Clone, Copy, Default)]
pub struct Elite;

impl<C: Clone> Selection<C> for Elite {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|a, b| records[*a].fitness.total_cmp(&records[*b].fitness));
        Box::new(order.into_iter().map(move |i| Ok(records[i].candidate.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ties_are_stable() {
        let records = vec![
            FitnessRecord::new(1.0, "a"),
            FitnessRecord::new(0.5, "b"),
            FitnessRecord::new(1.0, "c"),
        ];
        let order: Vec<&str> = Elite.select(&records).map(Result::unwrap).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}
