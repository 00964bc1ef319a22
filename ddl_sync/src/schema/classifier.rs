//! Keyword classification
//!
//! Maps the DDL keyword phrases recognized in migration scripts to an object
//! type and a disposition. Rules are evaluated top to bottom and the first
//! match wins, so a phrase must come before any shorter phrase it starts with
//! ("create package body" before "create package").

use crate::schema::types::{Disposition, ObjectType};

/// Result of classifying a keyword phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub object_type: ObjectType,
    pub disposition: Disposition,
}

/// A recognized keyword phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordRule {
    /// Lower-case words separated by single spaces
    pub phrase: &'static str,
    pub classification: Classification,
}

impl KeywordRule {
    const fn new(phrase: &'static str, object_type: ObjectType, disposition: Disposition) -> Self {
        Self {
            phrase,
            classification: Classification {
                object_type,
                disposition,
            },
        }
    }

    /// Number of words in the phrase
    pub fn width(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// Whether the phrase matches the words starting at `words[0]`
    pub fn matches(&self, words: &[&str]) -> bool {
        let mut words = words.iter();
        self.phrase
            .split(' ')
            .all(|expected| words.next() == Some(&expected))
    }
}

use Disposition::{Added, Dropped};
use ObjectType::*;

/// The keyword vocabulary, most specific first
pub const RULES: &[KeywordRule] = &[
    KeywordRule::new("create package body", PackageBody, Added),
    KeywordRule::new("replace package body", PackageBody, Added),
    KeywordRule::new("drop package body", PackageBody, Dropped),
    KeywordRule::new("create package", PackageSpec, Added),
    KeywordRule::new("replace package", PackageSpec, Added),
    KeywordRule::new("drop package", PackageSpec, Dropped),
    KeywordRule::new("package", PackageSpec, Added),
    KeywordRule::new("create view", View, Added),
    KeywordRule::new("replace view", View, Added),
    KeywordRule::new("drop view", View, Dropped),
    KeywordRule::new("create force view", View, Added),
    KeywordRule::new("replace force view", View, Added),
    KeywordRule::new("create table", Table, Added),
    KeywordRule::new("alter table", Table, Added),
    KeywordRule::new("drop table", Table, Dropped),
    KeywordRule::new("create index", Index, Added),
    KeywordRule::new("create unique index", Index, Added),
    KeywordRule::new("drop index", Index, Dropped),
    KeywordRule::new("create trigger", Trigger, Added),
    KeywordRule::new("replace trigger", Trigger, Added),
    KeywordRule::new("drop trigger", Trigger, Dropped),
    KeywordRule::new("alter trigger", Trigger, Added),
    KeywordRule::new("create sequence", Sequence, Added),
    KeywordRule::new("drop sequence", Sequence, Dropped),
    KeywordRule::new("comment on table", Comment, Added),
    KeywordRule::new("comment on column", Comment, Added),
];

/// Classify a keyword phrase.
///
/// Case and inner whitespace are ignored. Returns `None` for phrases outside
/// the vocabulary.
pub fn classify(phrase: &str) -> Option<Classification> {
    let words: Vec<String> = phrase
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    RULES
        .iter()
        .find(|rule| rule.width() == words.len() && rule.matches(&words))
        .map(|rule| rule.classification)
}

/// Find the first rule matching at the start of `words`
pub fn match_at(words: &[&str]) -> Option<&'static KeywordRule> {
    RULES.iter().find(|rule| rule.matches(words))
}

/// Names that are artifacts of the ambiguous "package body" boundary
pub fn is_false_positive_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("body")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("create package body", PackageBody, Added)]
    #[case("Replace  Package BODY", PackageBody, Added)]
    #[case("drop package body", PackageBody, Dropped)]
    #[case("create package", PackageSpec, Added)]
    #[case("drop package", PackageSpec, Dropped)]
    #[case("package", PackageSpec, Added)]
    #[case("create force view", View, Added)]
    #[case("drop view", View, Dropped)]
    #[case("alter table", Table, Added)]
    #[case("drop table", Table, Dropped)]
    #[case("create unique index", Index, Added)]
    #[case("alter trigger", Trigger, Added)]
    #[case("drop sequence", Sequence, Dropped)]
    #[case("comment on table", Comment, Added)]
    #[case("comment on column", Comment, Added)]
    fn test_classify(
        #[case] phrase: &str,
        #[case] object_type: ObjectType,
        #[case] disposition: Disposition,
    ) {
        assert_eq!(
            classify(phrase),
            Some(Classification {
                object_type,
                disposition
            })
        );
    }

    #[rstest]
    #[case("create function")]
    #[case("table")]
    #[case("")]
    fn test_classify_unknown(#[case] phrase: &str) {
        assert_eq!(classify(phrase), None);
    }

    #[test]
    fn test_package_body_wins_over_package() {
        let rule = match_at(&["create", "package", "body", "foo"]).unwrap();
        assert_eq!(rule.phrase, "create package body");

        let rule = match_at(&["create", "package", "foo"]).unwrap();
        assert_eq!(rule.phrase, "create package");
    }

    #[test]
    fn test_longer_phrases_precede_their_prefixes() {
        for (i, earlier) in RULES.iter().enumerate() {
            for later in &RULES[i + 1..] {
                let shadowed = later.width() > earlier.width()
                    && later.phrase.starts_with(&format!("{} ", earlier.phrase));
                assert!(
                    !shadowed,
                    "\"{}\" is shadowed by \"{}\"",
                    later.phrase, earlier.phrase
                );
            }
        }
    }

    #[test]
    fn test_body_is_a_false_positive() {
        assert!(is_false_positive_name("body"));
        assert!(is_false_positive_name("BODY"));
        assert!(!is_false_positive_name("bodyguard"));
    }
}
