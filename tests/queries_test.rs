//! Camel-case matching properties of the query algebra.

use lucerna::error::Result;
use lucerna::query::queries::Queries;
use lucerna::query::query::{Query, QueryKind, QueryOptions};
use lucerna::query::term::Term;
use regex::Regex;

const IDENTIFIERS: &[&str] = &[
    "NullPointerException",
    "nullPointerException",
    "NoPermissionError",
    "NumberFormatException",
    "NullPointer",
    "NPE",
    "IllegalStateException",
];

fn anchored(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{pattern})$")).unwrap()
}

fn matching(pattern: &str, candidates: &[&'static str]) -> Vec<&'static str> {
    let regex = anchored(pattern);
    candidates
        .iter()
        .copied()
        .filter(|candidate| regex.is_match(candidate))
        .collect()
}

#[test]
fn test_camel_case_abbreviation() -> Result<()> {
    let pattern = Queries::create_camel_case_regexp("NPE", None, None, true)?;
    assert_eq!(
        matching(&pattern, IDENTIFIERS),
        vec!["NullPointerException", "NoPermissionError", "NPE"]
    );

    let pattern = Queries::create_camel_case_regexp("NuPo", None, None, true)?;
    assert_eq!(
        matching(&pattern, IDENTIFIERS),
        vec!["NullPointerException", "NullPointer"]
    );
    Ok(())
}

#[test]
fn test_case_insensitive_camel_case() -> Result<()> {
    let pattern = Queries::create_camel_case_regexp("NPE", None, None, false)?;
    let lowered: Vec<String> = IDENTIFIERS.iter().map(|id| id.to_lowercase()).collect();
    let regex = anchored(&pattern);

    assert!(regex.is_match("nullpointerexception"));
    assert!(regex.is_match("npe"));
    assert!(regex.is_match("nullpointer"));
    assert!(!regex.is_match("numberformatexception"));
    assert!(!regex.is_match("illegalstateexception"));
    assert_eq!(lowered.iter().filter(|id| regex.is_match(id)).count(), 5);
    Ok(())
}

#[test]
fn test_camel_case_query_matches_terms() -> Result<()> {
    let query = Queries::create_query(
        "name",
        "name_ci",
        "NPE",
        QueryKind::CamelCase,
        &QueryOptions::default(),
    )?;
    assert!(matches!(query, Query::Regexp { .. }));
    assert_eq!(query.field(), "name");
    assert!(query.matches(&Term::new("name", "NullPointerException")));
    assert!(!query.matches(&Term::new("name", "nullPointerException")));
    assert!(!query.matches(&Term::new("other", "NullPointerException")));

    let query = Queries::create_query(
        "name",
        "name_ci",
        "NPE",
        QueryKind::CaseInsensitiveCamelCase,
        &QueryOptions::default(),
    )?;
    assert_eq!(query.field(), "name_ci");
    assert!(query.matches(&Term::new("name_ci", "nullpointerexception")));
    Ok(())
}

#[test]
fn test_is_camel_case_alternating_patterns() -> Result<()> {
    assert!(Queries::is_camel_case("NullPointer", None, None)?);
    assert!(!Queries::is_camel_case("Null", None, None)?);

    // Switching patterns recompiles the cached expression.
    assert!(Queries::is_camel_case("_null_pointer", Some("_"), Some("[a-z]"))?);
    assert!(!Queries::is_camel_case("NullPointer", Some("_"), Some("[a-z]"))?);
    assert!(Queries::is_camel_case("NullPointer", None, None)?);
    Ok(())
}
