use std::collections::{BTreeSet, HashMap, HashSet};

use immich_core::Person;

use super::SyncRule;

/// Lookup of configured person terms (ids or display names) to catalog ids.
#[derive(Debug, Default, Clone)]
pub struct PeopleDirectory {
    ids: HashSet<String>,
    by_name: HashMap<String, String>,
}

impl PeopleDirectory {
    pub fn new(people: &[Person]) -> Self {
        let mut directory = Self::default();
        for person in people {
            directory.ids.insert(person.id.clone());
            let name = normalize_name(&person.name);
            if !name.is_empty() {
                directory
                    .by_name
                    .entry(name)
                    .or_insert_with(|| person.id.clone());
            }
        }
        directory
    }

    /// Exact id first, then a case-insensitive display name.
    pub fn resolve(&self, term: &str) -> Option<&str> {
        if let Some(id) = self.ids.get(term) {
            return Some(id.as_str());
        }
        self.by_name.get(&normalize_name(term)).map(String::as_str)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Rewrites people filters to catalog ids and returns, per rule, the configured
/// terms that no asset in the snapshot carries. Unresolved terms stay verbatim so
/// they keep matching nothing.
pub fn resolve_people(
    rules: &mut [SyncRule],
    directory: Option<&PeopleDirectory>,
    catalog_people: &HashSet<String>,
) -> Vec<Vec<String>> {
    rules
        .iter_mut()
        .map(|rule| {
            let mut unmatched = BTreeSet::new();
            for filter in &mut rule.filters {
                let Some(ids) = filter.people_ids_mut() else {
                    continue;
                };
                let resolved = ids
                    .iter()
                    .map(|term| {
                        let id = directory
                            .and_then(|directory| directory.resolve(term))
                            .unwrap_or(term.as_str())
                            .to_string();
                        if !catalog_people.contains(&id) {
                            unmatched.insert(term.clone());
                        }
                        id
                    })
                    .collect();
                *ids = resolved;
            }
            unmatched.into_iter().collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Filter, PeopleMatch, PeopleOperator};

    fn person(id: &str, name: &str) -> Person {
        Person {
            id: id.into(),
            name: name.into(),
        }
    }

    fn people_rule(terms: &[&str]) -> SyncRule {
        SyncRule {
            name: "Family".into(),
            filters: vec![Filter::People(PeopleMatch::Set {
                operator: PeopleOperator::And,
                ids: terms.iter().map(|t| t.to_string()).collect(),
            })],
        }
    }

    #[test]
    fn resolves_ids_before_names() {
        let directory = PeopleDirectory::new(&[
            person("uuid-a", "Alice"),
            person("uuid-b", "uuid-a"),
            person("uuid-c", ""),
        ]);

        assert_eq!(directory.resolve("uuid-a"), Some("uuid-a"));
        assert_eq!(directory.resolve("  alice "), Some("uuid-a"));
        assert_eq!(directory.resolve("uuid-c"), Some("uuid-c"));
        assert_eq!(directory.resolve("Bob"), None);
    }

    #[test]
    fn rewrites_names_and_reports_unmatched_terms() {
        let directory = PeopleDirectory::new(&[person("uuid-a", "Alice"), person("uuid-z", "Zed")]);
        let catalog: HashSet<String> = ["uuid-a".to_string()].into();
        let mut rules = vec![people_rule(&["Alice", "Bob", "Zed"])];

        let unmatched = resolve_people(&mut rules, Some(&directory), &catalog);

        let ids = rules[0].filters[0].people_ids().unwrap();
        let expected: BTreeSet<String> = ["uuid-a", "Bob", "uuid-z"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ids, &expected);
        assert_eq!(unmatched, vec![vec!["Bob".to_string(), "Zed".to_string()]]);
    }

    #[test]
    fn without_directory_terms_are_treated_as_ids() {
        let catalog: HashSet<String> = ["uuid-a".to_string()].into();
        let mut rules = vec![
            people_rule(&["uuid-a"]),
            SyncRule {
                name: "Things".into(),
                filters: vec![Filter::People(PeopleMatch::Nobody)],
            },
        ];

        let unmatched = resolve_people(&mut rules, None, &catalog);

        assert_eq!(unmatched, vec![Vec::<String>::new(), Vec::new()]);
        assert_eq!(rules[1].filters[0], Filter::People(PeopleMatch::Nobody));
    }
}
