//! Required status check contexts.
//!
//! The merged set for a repository is the union of four sources:
//!
//! 1. contexts the existing rule already requires
//! 2. the configured baseline (`required_status_check_contexts`)
//! 3. the contexts of the first tag rule whose prefix matches the refspec
//! 4. the contexts configured for the repository's language
//!
//! Tag rules are an ordered list evaluated first-match-wins: with prefixes
//! `["v1", "v1.2"]` the refspec `v1.2.0` selects `v1`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use warden_core::{DeployerConfig, TagContextEntry};

/// A `refspec starts with prefix` predicate and the contexts it contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRule {
    pub prefix: String,
    pub contexts: Vec<String>,
}

impl TagRule {
    pub fn matches(&self, refspec: &str) -> bool {
        refspec.starts_with(&self.prefix)
    }
}

impl From<&TagContextEntry> for TagRule {
    fn from(entry: &TagContextEntry) -> Self {
        Self {
            prefix: entry.prefix.clone(),
            contexts: entry.contexts.clone(),
        }
    }
}

/// Deduplicated, sorted set of required status check contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequiredStatusCheckSet(BTreeSet<String>);

impl RequiredStatusCheckSet {
    pub fn contains(&self, context: &str) -> bool {
        self.0.contains(context)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// True when `contexts` names exactly this set, in any order.
    pub fn same_as(&self, contexts: &[String]) -> bool {
        contexts.iter().cloned().collect::<BTreeSet<_>>() == self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    fn extend<'a>(&mut self, contexts: impl IntoIterator<Item = &'a String>) {
        self.0.extend(contexts.into_iter().cloned());
    }
}

impl<S: Into<String>> FromIterator<S> for RequiredStatusCheckSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for RequiredStatusCheckSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        f.write_str(&joined)
    }
}

/// The configured sources of required contexts, independent of any
/// particular repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPolicy {
    pub baseline: Vec<String>,
    pub tag_rules: Vec<TagRule>,
    pub language_contexts: BTreeMap<String, Vec<String>>,
}

impl ContextPolicy {
    pub fn from_config(config: &DeployerConfig) -> Self {
        Self {
            baseline: config.required_status_check_contexts.clone(),
            tag_rules: config.default_tag_status_context.iter().map(TagRule::from).collect(),
            language_contexts: config.default_language_context.clone(),
        }
    }

    /// First tag rule whose prefix matches `refspec`. No refspec, no match.
    pub fn tag_rule(&self, refspec: Option<&str>) -> Option<&TagRule> {
        let refspec = refspec?;
        self.tag_rules.iter().find(|rule| rule.matches(refspec))
    }

    /// Contexts bound to `language`; empty for an unknown or absent language.
    pub fn language(&self, language: Option<&str>) -> &[String] {
        let Some(language) = language else {
            return &[];
        };
        match self.language_contexts.get(language) {
            Some(contexts) => contexts,
            None => {
                tracing::warn!(language, "no status check contexts configured for language");
                &[]
            }
        }
    }

    /// Union of `existing`, the baseline, the matched tag rule and the
    /// language contexts.
    pub fn merge(
        &self,
        existing: &[String],
        refspec: Option<&str>,
        language: Option<&str>,
    ) -> RequiredStatusCheckSet {
        let mut set = RequiredStatusCheckSet::default();
        set.extend(existing);
        set.extend(&self.baseline);
        if let Some(rule) = self.tag_rule(refspec) {
            tracing::debug!(prefix = %rule.prefix, "tag rule matched");
            set.extend(&rule.contexts);
        }
        set.extend(self.language(language));
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn policy() -> ContextPolicy {
        ContextPolicy {
            baseline: strings(&["B"]),
            tag_rules: vec![
                TagRule { prefix: "v1".into(), contexts: strings(&["C"]) },
                TagRule { prefix: "v1.2".into(), contexts: strings(&["C2"]) },
            ],
            language_contexts: [("go".to_string(), strings(&["D"]))].into_iter().collect(),
        }
    }

    #[test]
    fn union_of_all_four_sources() {
        let merged = policy().merge(&strings(&["A"]), Some("v1.0.0"), Some("go"));
        assert_eq!(merged.to_vec(), strings(&["A", "B", "C", "D"]));
    }

    #[test]
    fn union_ignores_input_order_and_duplicates() {
        let merged = policy().merge(&strings(&["D", "A", "B"]), Some("v1.0.0"), Some("go"));
        assert_eq!(merged.to_vec(), strings(&["A", "B", "C", "D"]));
    }

    #[test]
    fn first_declared_prefix_wins() {
        let p = policy();
        let rule = p.tag_rule(Some("v1.2.0")).expect("match");
        assert_eq!(rule.prefix, "v1");
        assert!(!p.merge(&[], Some("v1.2.0"), None).contains("C2"));
    }

    #[rstest]
    #[case::no_refspec(None)]
    #[case::no_match(Some("main"))]
    fn no_tag_contribution(#[case] refspec: Option<&str>) {
        let merged = policy().merge(&[], refspec, None);
        assert_eq!(merged.to_vec(), strings(&["B"]));
    }

    #[rstest]
    #[case::absent(None)]
    #[case::unknown(Some("cobol"))]
    fn missing_language_still_applies_tag_rule(#[case] language: Option<&str>) {
        let merged = policy().merge(&[], Some("v1.0.0"), language);
        assert_eq!(merged.to_vec(), strings(&["B", "C"]));
    }

    #[test]
    fn policy_keeps_config_declaration_order() {
        let config = DeployerConfig {
            default_tag_status_context: vec![
                TagContextEntry { prefix: "v2".into(), contexts: strings(&["x"]) },
                TagContextEntry { prefix: "v".into(), contexts: strings(&["y"]) },
            ],
            ..DeployerConfig::default()
        };
        let p = ContextPolicy::from_config(&config);
        assert_eq!(p.tag_rule(Some("v2.1")).map(|r| r.prefix.as_str()), Some("v2"));
        assert_eq!(p.tag_rule(Some("v3.0")).map(|r| r.prefix.as_str()), Some("v"));
    }

    #[test]
    fn same_as_ignores_order() {
        let set: RequiredStatusCheckSet = ["a", "b"].into_iter().collect();
        assert!(set.same_as(&strings(&["b", "a"])));
        assert!(!set.same_as(&strings(&["a"])));
        assert_eq!(set.to_string(), "a, b");
    }
}
