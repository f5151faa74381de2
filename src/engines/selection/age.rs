use super::{KeyFn, Selected, Selection};
use crate::types::FitnessRecord;
use log::info;
use std::collections::{HashMap, HashSet};

/// Keeps structures from surviving forever.
///
/// A key's age counts the calls in which this selection emitted it. Records
/// whose key has reached `max_age` are withheld from the source before it
/// runs, and their age is forgotten so a later reappearance starts fresh.
/// Ages of keys absent from the incoming records are dropped. When every
/// record has aged out at once, all of them run again as fresh individuals.
pub struct FixedAge<C, S> {
    source: S,
    max_age: usize,
    key: KeyFn<C>,
    ages: HashMap<String, usize>,
    eligible: Vec<FitnessRecord<C>>,
}

impl<C, S> FixedAge<C, S> {
    pub fn new(source: S, max_age: usize, key: KeyFn<C>) -> Self {
        Self {
            source,
            max_age,
            key,
            ages: HashMap::new(),
            eligible: Vec::new(),
        }
    }

    pub fn age(&self, key: &str) -> usize {
        self.ages.get(key).copied().unwrap_or(0)
    }

    pub fn tracked(&self) -> usize {
        self.ages.len()
    }
}

impl<C, S> Selection<C> for FixedAge<C, S>
where
    C: Clone + Send,
    S: Selection<C>,
{
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        let keys: Vec<String> = records.iter().map(|r| (self.key)(&r.candidate)).collect();
        let present: HashSet<&str> = keys.iter().map(String::as_str).collect();
        self.ages.retain(|key, _| present.contains(key.as_str()));

        let expired: HashSet<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|key| self.ages.get(*key).is_some_and(|age| *age >= self.max_age))
            .collect();
        for key in &expired {
            info!("aged out after {} generations: {}", self.max_age, key);
            self.ages.remove(*key);
        }
        if !present.is_empty() && expired.len() == present.len() {
            info!(
                "all {} structures aged out together, their ages restart",
                present.len()
            );
            self.eligible = records.to_vec();
        } else {
            self.eligible = records
                .iter()
                .zip(&keys)
                .filter(|(_, key)| !expired.contains(key.as_str()))
                .map(|(record, _)| record.clone())
                .collect();
        }

        let Self {
            source,
            key,
            ages,
            eligible,
            ..
        } = self;
        let key = &**key;
        let mut bumped: HashSet<String> = HashSet::new();
        Box::new(source.select(eligible.as_slice()).inspect(move |item| {
            if let Ok(candidate) = item {
                let k = key(candidate);
                if bumped.insert(k.clone()) {
                    *ages.entry(k).or_insert(0) += 1;
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::selection::{Elite, SelectionExt};

    #[test]
    fn test_stale_keys_are_pruned() {
        let mut aged = Elite.fixed_age(3, |c: &String| c.clone());
        let first = vec![FitnessRecord::new(1.0, "x".to_string())];
        aged.select(&first).for_each(drop);
        assert_eq!(aged.age("x"), 1);

        let second = vec![FitnessRecord::new(1.0, "y".to_string())];
        aged.select(&second).for_each(drop);
        assert_eq!(aged.tracked(), 1);
        assert_eq!(aged.age("x"), 0);
    }

    #[test]
    fn test_unselected_records_do_not_age() {
        let mut aged = Elite.limit(1).fixed_age(2, |c: &String| c.clone());
        let records = vec![
            FitnessRecord::new(1.0, "best".to_string()),
            FitnessRecord::new(2.0, "rest".to_string()),
        ];
        aged.select(&records).for_each(drop);
        assert_eq!(aged.age("best"), 1);
        assert_eq!(aged.age("rest"), 0);
    }

    #[test]
    fn test_population_aging_out_at_once_starts_over() {
        let mut aged = Elite.fixed_age(1, |c: &String| c.clone());
        let records = vec![
            FitnessRecord::new(1.0, "x".to_string()),
            FitnessRecord::new(2.0, "y".to_string()),
        ];
        aged.select(&records).for_each(drop);
        let again: Vec<String> = aged.select(&records).map(Result::unwrap).collect();
        assert_eq!(again, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(aged.age("x"), 1);
    }
}
