//! Token taxonomy
//!
//! Token categories are dotted paths rooted at `Token`
//! (`Token.Literal.String.Double`). The target dialect only knows flat rule
//! names, so every category maps to its path with `.` replaced by `_`.
//! The parent chain is kept for attribute fallback in the style pass.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the root category
pub const ROOT: &str = "Token";

/// A hierarchical token category
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenType {
    path: String,
}

/// A token category name that is not a dotted identifier path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid token category '{0}'")]
pub struct InvalidTokenType(pub String);

impl TokenType {
    /// The root category `Token`
    pub fn root() -> Self {
        TokenType {
            path: ROOT.to_string(),
        }
    }

    /// The generic fallback category `Token.Text`
    pub fn text() -> Self {
        TokenType {
            path: format!("{}.Text", ROOT),
        }
    }

    /// Parse a category; `Keyword.Reserved` is rooted at `Token`
    pub fn new(name: &str) -> Result<Self, InvalidTokenType> {
        let name = name.trim();
        let valid = !name.is_empty()
            && name.split('.').all(|part| {
                part.chars().next().is_some_and(|c| c.is_alphabetic())
                    && part.chars().all(|c| c.is_alphanumeric() || c == '_')
            });
        if !valid {
            return Err(InvalidTokenType(name.to_string()));
        }
        let path = if name == ROOT || name.starts_with("Token.") {
            name.to_string()
        } else {
            format!("{}.{}", ROOT, name)
        };
        Ok(TokenType { path })
    }

    /// The dotted path, e.g. `Token.Keyword`
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// A direct child category
    pub fn child(&self, name: &str) -> TokenType {
        TokenType::new(&format!("{}.{}", self, name)).unwrap_or_else(|_| self.clone())
    }

    /// The flat rule name used in output files, e.g. `Token_Keyword`
    pub fn rule_name(&self) -> String {
        self.path.replace('.', "_")
    }

    /// The enclosing category, `None` for the root
    pub fn parent(&self) -> Option<TokenType> {
        self.path.rsplit_once('.').map(|(parent, _)| TokenType {
            path: parent.to_string(),
        })
    }

    /// This category followed by each ancestor up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = TokenType> {
        std::iter::successors(Some(self.clone()), TokenType::parent)
    }

    /// Whether `self` is `other` or one of its descendants
    pub fn is_within(&self, other: &TokenType) -> bool {
        self.path == other.path
            || (self.path.starts_with(&other.path)
                && self.path[other.path.len()..].starts_with('.'))
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for TokenType {
    type Err = InvalidTokenType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenType::new(s)
    }
}

impl TryFrom<String> for TokenType {
    type Error = InvalidTokenType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TokenType::new(&value)
    }
}

impl From<TokenType> for String {
    fn from(token: TokenType) -> Self {
        token.path
    }
}

/// Attribute lookup over the category tree
///
/// A category without its own value inherits the nearest ancestor's.
#[derive(Debug, Clone)]
pub struct Taxonomy<V> {
    values: BTreeMap<TokenType, V>,
}

impl<V> Default for Taxonomy<V> {
    fn default() -> Self {
        Taxonomy {
            values: BTreeMap::new(),
        }
    }
}

impl<V> Taxonomy<V> {
    /// Create an empty taxonomy
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a value to a category
    pub fn insert(&mut self, token: TokenType, value: V) {
        self.values.insert(token, value);
    }

    /// The value set on exactly this category
    pub fn get(&self, token: &TokenType) -> Option<&V> {
        self.values.get(token)
    }

    /// The value of this category or its nearest ancestor that has one
    /// accepted by `usable`
    pub fn lookup_with(&self, token: &TokenType, usable: impl Fn(&V) -> bool) -> Option<&V> {
        token
            .ancestors()
            .find_map(|t| self.values.get(&t).filter(|v| usable(v)))
    }

    /// The value of this category or its nearest ancestor
    pub fn lookup(&self, token: &TokenType) -> Option<&V> {
        self.lookup_with(token, |_| true)
    }

    /// Categories in sorted order with their own values
    pub fn iter(&self) -> impl Iterator<Item = (&TokenType, &V)> {
        self.values.iter()
    }

    /// Number of categories with a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no category has a value
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<V> FromIterator<(TokenType, V)> for Taxonomy<V> {
    fn from_iter<I: IntoIterator<Item = (TokenType, V)>>(iter: I) -> Self {
        Taxonomy {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> TokenType {
        TokenType::new(s).unwrap()
    }

    #[test]
    fn test_rooting_shorthand() {
        assert_eq!(tok("Keyword.Reserved").as_str(), "Token.Keyword.Reserved");
        assert_eq!(tok("Token.Keyword").as_str(), "Token.Keyword");
        assert_eq!(tok("Token"), TokenType::root());
    }

    #[test]
    fn test_rule_name() {
        assert_eq!(tok("Literal.String.Double").rule_name(), "Token_Literal_String_Double");
        assert_eq!(TokenType::text().rule_name(), "Token_Text");
    }

    #[test]
    fn test_parent_chain() {
        let names: Vec<String> = tok("Name.Builtin.Pseudo")
            .ancestors()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Token.Name.Builtin.Pseudo",
                "Token.Name.Builtin",
                "Token.Name",
                "Token",
            ]
        );
        assert_eq!(TokenType::root().parent(), None);
    }

    #[test]
    fn test_is_within() {
        assert!(tok("Name.Builtin").is_within(&tok("Name")));
        assert!(tok("Name").is_within(&tok("Name")));
        assert!(!tok("NameSpace").is_within(&tok("Name")));
    }

    #[test]
    fn test_invalid_names() {
        assert!(TokenType::new("").is_err());
        assert!(TokenType::new("Keyword..Type").is_err());
        assert!(TokenType::new("Key word").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let token: TokenType = serde_json::from_str("\"Comment.Single\"").unwrap();
        assert_eq!(token.as_str(), "Token.Comment.Single");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"Token.Comment.Single\"");
        assert!(serde_json::from_str::<TokenType>("\"1bad\"").is_err());
    }

    #[test]
    fn test_taxonomy_fallback() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert(tok("Name"), "#ffffff");
        taxonomy.insert(tok("Name.Builtin"), "");
        assert_eq!(taxonomy.lookup(&tok("Name.Function")), Some(&"#ffffff"));
        assert_eq!(taxonomy.lookup(&tok("Name.Builtin")), Some(&""));
        assert_eq!(
            taxonomy.lookup_with(&tok("Name.Builtin.Pseudo"), |v| !v.is_empty()),
            Some(&"#ffffff")
        );
        assert_eq!(taxonomy.lookup(&tok("Keyword")), None);
    }
}
