//! Type matcher
//!
//! Selects the visualizer rule for a concrete type name. Every pattern of
//! every loaded rule is tried structurally; a successful match scores the
//! number of literal tokens in the pattern, the highest score wins and ties
//! go to the rule declared first.

pub mod names;
pub mod template;

pub use names::normalize_type_name;
pub use template::{TemplateError, TemplateType};

use log::debug;
use thiserror::Error;

use crate::document::{DocumentStore, RuleId};

/// No visualizer applies; the host falls back to its default formatting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No visualizer matches '{type_name}'")]
pub struct NoMatch {
    pub type_name: String,
}

/// Outcome of a successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: RuleId,
    pub score: u32,
    /// Concrete text of each argument matched by `*`, in order (`$T1..`)
    pub wildcards: Vec<String>,
}

pub struct TypeMatcher<'s> {
    store: &'s DocumentStore,
}

impl<'s> TypeMatcher<'s> {
    pub fn new(store: &'s DocumentStore) -> Self {
        Self { store }
    }

    /// Best rule for a concrete type name
    pub fn best_match(&self, type_name: &str) -> Result<RuleMatch, NoMatch> {
        let no_match = || NoMatch {
            type_name: type_name.to_string(),
        };

        let concrete = match TemplateType::parse(type_name) {
            Ok(concrete) => concrete,
            Err(e) => {
                debug!("Unmatchable type name: {}", e);
                return Err(no_match());
            }
        };
        self.best_match_parsed(&concrete).ok_or_else(no_match)
    }

    pub fn best_match_parsed(&self, concrete: &TemplateType) -> Option<RuleMatch> {
        let mut best: Option<RuleMatch> = None;

        for (id, rule) in self.store.rules() {
            let mut rule_best: Option<RuleMatch> = None;
            for pattern in &rule.patterns {
                let mut wildcards = Vec::new();
                if !matches(pattern, concrete, &mut wildcards) {
                    continue;
                }
                let score = pattern.literal_count();
                if rule_best.as_ref().map_or(true, |b| score > b.score) {
                    rule_best = Some(RuleMatch {
                        rule: id,
                        score,
                        wildcards,
                    });
                }
            }

            // Strictly greater: the earliest rule keeps a tie
            if let Some(candidate) = rule_best {
                if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                    best = Some(candidate);
                }
            }
        }

        if let Some(found) = &best {
            debug!(
                "Matched '{}' to rule {:?} (score {})",
                concrete, found.rule, found.score
            );
        }
        best
    }
}

/// Structural match of `pattern` against `concrete`, recording wildcard
/// captures in normalized spelling
pub fn matches(pattern: &TemplateType, concrete: &TemplateType, wildcards: &mut Vec<String>) -> bool {
    if pattern.is_wildcard() {
        wildcards.push(concrete.to_string());
        return true;
    }

    if pattern.name != concrete.name {
        return false;
    }
    let mark = wildcards.len();
    let matched = matches_args(&pattern.args, &concrete.args, wildcards)
        && match (&pattern.nested, &concrete.nested) {
            (None, None) => true,
            (Some(p), Some(c)) => matches(p, c, wildcards),
            _ => false,
        };
    if !matched {
        wildcards.truncate(mark);
    }
    matched
}

fn matches_args(patterns: &[TemplateType], concrete: &[TemplateType], wildcards: &mut Vec<String>) -> bool {
    let Some((first, rest)) = patterns.split_first() else {
        return concrete.is_empty();
    };

    let mark = wildcards.len();

    if first.is_variadic() {
        // Shortest expansion first, backtracking as needed
        for taken in 0..=concrete.len() {
            if matches_args(rest, &concrete[taken..], wildcards) {
                return true;
            }
            wildcards.truncate(mark);
        }
        return false;
    }

    let Some((head, tail)) = concrete.split_first() else {
        return false;
    };
    if matches(first, head, wildcards) && matches_args(rest, tail, wildcards) {
        return true;
    }
    wildcards.truncate(mark);
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(xml: &str) -> DocumentStore {
        let mut store = DocumentStore::new();
        store.load_str(xml, "test.natvis").unwrap();
        store
    }

    fn rules(patterns: &[&str]) -> DocumentStore {
        let types: String = patterns
            .iter()
            .map(|p| format!("<Type Name=\"{}\"><DisplayString>{}</DisplayString></Type>", p, p))
            .collect();
        store(&format!("<AutoVisualizer>{}</AutoVisualizer>", types))
    }

    fn matched_rule(store: &DocumentStore, name: &str) -> Option<usize> {
        TypeMatcher::new(store).best_match(name).ok().map(|m| m.rule.rule)
    }

    #[test]
    fn test_wildcard_matches_single_argument() {
        let store = rules(&["Vector&lt;*&gt;"]);
        assert_eq!(matched_rule(&store, "Vector<int>"), Some(0));
        assert_eq!(matched_rule(&store, "Vector<std::string>"), Some(0));
        assert_eq!(matched_rule(&store, "Map<int,int>"), None);
        assert_eq!(matched_rule(&store, "Vector<int, int>"), None);
        assert_eq!(matched_rule(&store, "Vector"), None);
    }

    #[test]
    fn test_specificity_beats_declaration_order() {
        let store = rules(&["Map&lt;*,*&gt;", "Map&lt;int,*&gt;", "Map&lt;int,int&gt;"]);
        let found = TypeMatcher::new(&store).best_match("Map<int, int>").unwrap();
        assert_eq!(found.rule.rule, 2);
        assert_eq!(found.score, 3);
        assert!(found.wildcards.is_empty());

        assert_eq!(matched_rule(&store, "Map<int, char>"), Some(1));
        assert_eq!(matched_rule(&store, "Map<char, int>"), Some(0));
    }

    #[test]
    fn test_tie_goes_to_first_declared() {
        let store = rules(&["Pair&lt;int,*&gt;", "Pair&lt;*,int&gt;"]);
        assert_eq!(matched_rule(&store, "Pair<int,int>"), Some(0));
    }

    #[test]
    fn test_matching_is_deterministic() {
        let store = rules(&["Vector&lt;*&gt;", "Vector&lt;int&gt;", "Vector&lt;...&gt;"]);
        let matcher = TypeMatcher::new(&store);
        let first = matcher.best_match("Vector<int>").unwrap();
        for _ in 0..10 {
            assert_eq!(matcher.best_match("Vector<int>").unwrap(), first);
        }
        assert_eq!(first.rule.rule, 1);
    }

    #[test]
    fn test_wildcard_captures() {
        let store = rules(&["Map&lt;*,Vector&lt;*&gt;&gt;"]);
        let found = TypeMatcher::new(&store)
            .best_match("Map<const char *, Vector<Point>>")
            .unwrap();
        assert_eq!(found.wildcards, vec!["const char*", "Point"]);
    }

    #[test]
    fn test_captures_use_normalized_spelling() {
        let store = rules(&["Holder&lt;*&gt;"]);
        let found = TypeMatcher::new(&store)
            .best_match("Holder<Pair<int, std::map<int, char> > >")
            .unwrap();
        assert_eq!(found.wildcards, vec![normalize_type_name("Pair<int, std::map<int, char> >")]);
        assert_eq!(found.wildcards, vec!["Pair<int,std::map<int,char>>"]);
    }

    #[test]
    fn test_nested_type_patterns() {
        let store = rules(&["Outer&lt;*&gt;::Inner", "Outer&lt;*&gt;::Inner&lt;*&gt;"]);
        let matcher = TypeMatcher::new(&store);

        let found = matcher.best_match("Outer<int>::Inner").unwrap();
        assert_eq!(found.rule.rule, 0);
        assert_eq!(found.wildcards, vec!["int"]);

        let found = matcher.best_match("Outer<int>::Inner<char>").unwrap();
        assert_eq!(found.rule.rule, 1);
        assert_eq!(found.wildcards, vec!["int", "char"]);

        assert_eq!(matched_rule(&store, "Outer<int>"), None);
        assert_eq!(matched_rule(&store, "Outer<int>::Other"), None);
    }

    #[test]
    fn test_variadic_positions() {
        let store = rules(&["Tuple&lt;...&gt;"]);
        assert_eq!(matched_rule(&store, "Tuple<int>"), Some(0));
        assert_eq!(matched_rule(&store, "Tuple<int,char,float>"), Some(0));

        let store = rules(&["Variant&lt;int,...&gt;"]);
        assert_eq!(matched_rule(&store, "Variant<int>"), Some(0));
        assert_eq!(matched_rule(&store, "Variant<int,char>"), Some(0));
        assert_eq!(matched_rule(&store, "Variant<char,int>"), None);

        let store = rules(&["Fn&lt;...,int&gt;"]);
        assert_eq!(matched_rule(&store, "Fn<char,char,int>"), Some(0));
        assert_eq!(matched_rule(&store, "Fn<int,char>"), None);

        let store = rules(&["Mid&lt;int,...,char&gt;"]);
        assert_eq!(matched_rule(&store, "Mid<int,char>"), Some(0));
        assert_eq!(matched_rule(&store, "Mid<int,bool,bool,char>"), Some(0));
    }

    #[test]
    fn test_variadic_backtracking_keeps_captures_consistent() {
        let store = rules(&["T&lt;...,*,int&gt;"]);
        let found = TypeMatcher::new(&store).best_match("T<a,b,c,int>").unwrap();
        assert_eq!(found.wildcards, vec!["c"]);
    }

    #[test]
    fn test_alternative_type_patterns() {
        let store = store(
            r#"<AutoVisualizer>
                <Type Name="Vec&lt;*&gt;">
                    <AlternativeType Name="SmallVec&lt;*,*&gt;"/>
                    <DisplayString>vec</DisplayString>
                </Type>
            </AutoVisualizer>"#,
        );
        assert_eq!(matched_rule(&store, "SmallVec<int,4>"), Some(0));
        assert_eq!(matched_rule(&store, "Vec<int>"), Some(0));
    }

    #[test]
    fn test_earlier_document_wins_tie() {
        let mut store = DocumentStore::new();
        let xml = r#"<AutoVisualizer><Type Name="Point"><DisplayString>p</DisplayString></Type></AutoVisualizer>"#;
        store.load_str(xml, "first.natvis").unwrap();
        store.load_str(xml, "second.natvis").unwrap();

        let found = TypeMatcher::new(&store).best_match("Point").unwrap();
        assert_eq!(found.rule.document, 0);
    }

    #[test]
    fn test_unparsable_name_is_no_match() {
        let store = rules(&["Vector&lt;*&gt;"]);
        let err = TypeMatcher::new(&store).best_match("Vector<").unwrap_err();
        assert_eq!(err.type_name, "Vector<");
    }
}
