//! The query algebra: `(field, value, kind)` to [`Query`].
//!
//! # Camel-case queries
//!
//! A camel-case value such as `"NPE"` is split before every separator (by
//! default an upper-case letter) into the tokens `N`, `P`, `E`. Each token
//! becomes a literal followed by any number of "part" characters (by default
//! lower-case letters, digits, `_`, `.` and `$`); the last token is followed
//! by `.*`. The result matches `NullPointerException`.
//!
//! ```
//! use lucerna::query::queries::Queries;
//!
//! let pattern = Queries::create_camel_case_regexp("NPE", None, None, true).unwrap();
//! let regex = regex::Regex::new(&format!("^(?:{pattern})$")).unwrap();
//!
//! assert!(regex.is_match("NullPointerException"));
//! assert!(!regex.is_match("nullPointerException"));
//! ```
//!
//! # Empty values
//!
//! `Prefix`, `CaseInsensitivePrefix` and `CaseInsensitiveCamelCase` treat an
//! empty value as "the field is present". `CamelCase`, `Regexp` and
//! `CaseInsensitiveRegexp` reject it. The camel-case pair is asymmetric on
//! purpose: existing callers rely on both behaviors.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;

use crate::document::selector::FieldSelector;
use crate::error::{LucernaError, Result};
use crate::query::query::{Query, QueryKind, QueryOptions};

/// Default camel-case separator: an upper-case letter.
pub const DEFAULT_CAMEL_CASE_SEPARATOR: &str = r"\p{Lu}";

/// Default camel-case part: lower-case letters, digits, `_`, `.` and `$`.
pub const DEFAULT_CAMEL_CASE_PART: &str = r"\p{Ll}|\p{Nd}|_|\.|\$";

lazy_static! {
    static ref DEFAULT_SEPARATOR_REGEX: Regex = Regex::new(DEFAULT_CAMEL_CASE_SEPARATOR)
        .expect("default camel-case separator is a valid pattern");
    static ref CAMEL_CASE_CACHE: Mutex<Option<CachedCamelCasePattern>> = Mutex::new(None);
}

/// The last pattern used by [`Queries::is_camel_case`].
struct CachedCamelCasePattern {
    separator: String,
    part: String,
    regex: Regex,
}

/// Factory for backend-neutral queries.
pub struct Queries;

impl Queries {
    /// Build the query for `value` matched against `field` with `kind`.
    ///
    /// Case-insensitive kinds read `ci_field`, which is expected to hold
    /// lower-cased values.
    pub fn create_query(
        field: &str,
        ci_field: &str,
        value: &str,
        kind: QueryKind,
        options: &QueryOptions,
    ) -> Result<Query> {
        let separator = options.camel_case_separator.as_deref();
        let part = options.camel_case_part.as_deref();

        match kind {
            QueryKind::Exact => Ok(Query::term(field, value)),
            QueryKind::Prefix => Ok(Query::prefix(field, value)),
            QueryKind::CaseInsensitivePrefix => {
                Ok(Query::prefix(ci_field, value.to_lowercase()))
            }
            QueryKind::CamelCase => {
                if value.is_empty() {
                    return Err(LucernaError::invalid_argument(
                        "camel-case query requires a non-empty value",
                    ));
                }
                let pattern = Self::create_camel_case_regexp(value, separator, part, true)?;
                Query::regexp(field, pattern, true)
            }
            QueryKind::CaseInsensitiveCamelCase => {
                if value.is_empty() {
                    return Ok(Query::prefix(ci_field, ""));
                }
                let pattern = Self::create_camel_case_regexp(value, separator, part, false)?;
                Query::regexp(ci_field, pattern, false)
            }
            QueryKind::Regexp => {
                if value.is_empty() {
                    return Err(LucernaError::invalid_argument(
                        "regexp query requires a non-empty value",
                    ));
                }
                Query::regexp(field, value, true)
            }
            QueryKind::CaseInsensitiveRegexp => {
                if value.is_empty() {
                    return Err(LucernaError::invalid_argument(
                        "regexp query requires a non-empty value",
                    ));
                }
                Query::regexp(ci_field, value, false)
            }
        }
    }

    /// Compile a camel-case abbreviation into a regular expression.
    ///
    /// `separator` and `part` override [`DEFAULT_CAMEL_CASE_SEPARATOR`] and
    /// [`DEFAULT_CAMEL_CASE_PART`]. When `case_sensitive` is false the
    /// literal tokens are lower-cased. The returned pattern is not anchored.
    pub fn create_camel_case_regexp(
        value: &str,
        separator: Option<&str>,
        part: Option<&str>,
        case_sensitive: bool,
    ) -> Result<String> {
        let custom_separator;
        let separator_regex: &Regex = match separator {
            Some(pattern) => {
                custom_separator = Regex::new(pattern)?;
                &custom_separator
            }
            None => &DEFAULT_SEPARATOR_REGEX,
        };
        let part = part.unwrap_or(DEFAULT_CAMEL_CASE_PART);

        let mut pattern = String::new();
        let mut last = 0;
        loop {
            // A hump is at least one character long.
            let from = value[last..]
                .chars()
                .next()
                .map_or(value.len(), |c| last + c.len_utf8());
            let next = if from < value.len() {
                separator_regex.find_at(value, from).map(|m| m.start())
            } else {
                None
            };

            let token = &value[last..next.unwrap_or(value.len())];
            if case_sensitive {
                pattern.push_str(&regex::escape(token));
            } else {
                pattern.push_str(&regex::escape(&token.to_lowercase()));
            }

            match next {
                Some(index) => {
                    pattern.push_str("(?:");
                    pattern.push_str(part);
                    pattern.push_str(")*");
                    last = index;
                }
                None => {
                    pattern.push_str(".*");
                    break;
                }
            }
        }

        Ok(pattern)
    }

    /// Whether `value` looks like a camel-case identifier with at least two humps.
    ///
    /// The compiled pattern is cached for the most recent separator/part pair.
    pub fn is_camel_case(value: &str, separator: Option<&str>, part: Option<&str>) -> Result<bool> {
        let separator = separator.unwrap_or(DEFAULT_CAMEL_CASE_SEPARATOR);
        let part = part.unwrap_or(DEFAULT_CAMEL_CASE_PART);

        let mut cache = CAMEL_CASE_CACHE.lock();
        let stale = match cache.as_ref() {
            Some(cached) => cached.separator != separator || cached.part != part,
            None => true,
        };
        if stale {
            let regex = Regex::new(&format!("^(?:(?:{separator})(?:{part})*){{2,}}$"))?;
            *cache = Some(CachedCamelCasePattern {
                separator: separator.to_string(),
                part: part.to_string(),
                regex,
            });
        }

        Ok(cache
            .as_ref()
            .is_some_and(|cached| cached.regex.is_match(value)))
    }

    /// Build a field selector loading only `fields` (all fields when empty).
    pub fn field_selector<I, S>(fields: I) -> FieldSelector
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSelector::of(fields)
    }
}
