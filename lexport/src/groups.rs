//! Capture group bookkeeping
//!
//! This module tracks the capture groups of a pattern:
//! - The registry assigns indices while parsing and resolves group names
//! - Top-level group discovery aligns group-bound tokens with sub-patterns
//! - Renumbering keeps indices dense after normalization copies or
//!   introduces groups

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::Expr;

/// Information about a capture group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    /// The index of the group (1-based for compatibility with \1, \2, etc.)
    pub index: u32,
    /// The name of the group (if it's a named group)
    pub name: Option<String>,
}

/// Registry for tracking capture groups
#[derive(Debug, Clone)]
pub struct GroupRegistry {
    groups: Vec<GroupInfo>,
    name_to_index: HashMap<String, u32>,
    next_index: u32,
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        GroupRegistry {
            groups: Vec::new(),
            name_to_index: HashMap::new(),
            next_index: 1, // Groups are 1-indexed
        }
    }

    /// Register a new capture group and return its index
    ///
    /// # Errors
    /// Returns an error if the name is already in use
    pub fn register_group(&mut self, name: Option<String>) -> Result<u32, GroupRegistryError> {
        if let Some(group_name) = &name {
            if self.name_to_index.contains_key(group_name) {
                return Err(GroupRegistryError::DuplicateGroupName(group_name.clone()));
            }
            self.name_to_index.insert(group_name.clone(), self.next_index);
        }
        let index = self.next_index;
        self.next_index += 1;
        self.groups.push(GroupInfo { index, name });
        Ok(index)
    }

    /// Get group info by index
    pub fn get_by_index(&self, index: u32) -> Option<&GroupInfo> {
        self.groups.iter().find(|g| g.index == index)
    }

    /// Get group index by name
    pub fn get_by_name(&self, name: &str) -> Option<u32> {
        self.name_to_index.get(name).copied()
    }

    /// Get the total number of capture groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Resolve a group reference written as a number or a name
    pub fn resolve(&self, reference: &str) -> Result<u32, GroupRegistryError> {
        match reference.parse::<u32>() {
            Ok(num) => self.validate_backref_number(num),
            Err(_) => self
                .get_by_name(reference)
                .ok_or_else(|| GroupRegistryError::UndefinedBackreference(reference.to_string())),
        }
    }

    /// Validate that a backreference number refers to an opened group
    pub fn validate_backref_number(&self, num: u32) -> Result<u32, GroupRegistryError> {
        if num == 0 || num >= self.next_index {
            Err(GroupRegistryError::InvalidBackreference(num))
        } else {
            Ok(num)
        }
    }
}

/// Errors that can occur in the group registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroupRegistryError {
    /// A group name is used more than once
    #[error("duplicate group name: {0}")]
    DuplicateGroupName(String),
    /// A backreference refers to a non-existent group
    #[error("undefined backreference: {0}")]
    UndefinedBackreference(String),
    /// A backreference number is invalid
    #[error("invalid backreference number: {0}")]
    InvalidBackreference(u32),
}

/// The capture groups not nested inside another capture group, in order
pub fn top_level_groups(expr: &Expr) -> Vec<&Expr> {
    let mut found = Vec::new();
    collect_top_level(expr, &mut found);
    found
}

fn collect_top_level<'a>(expr: &'a Expr, found: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Group { .. } => found.push(expr),
        Expr::Sequence(items) | Expr::Alternation(items) => {
            for item in items {
                collect_top_level(item, found);
            }
        }
        Expr::Quantified { expr, .. }
        | Expr::NonCapturingGroup(expr)
        | Expr::Lookahead(expr)
        | Expr::NegativeLookahead(expr)
        | Expr::Lookbehind(expr)
        | Expr::NegativeLookbehind(expr) => collect_top_level(expr, found),
        Expr::Conditional { yes, no, .. } => {
            collect_top_level(yes, found);
            collect_top_level(no, found);
        }
        _ => {}
    }
}

/// One line per top-level group: index and pattern text
pub fn group_breakdown(expr: &Expr) -> Vec<String> {
    top_level_groups(expr)
        .into_iter()
        .enumerate()
        .map(|(i, group)| format!("group {}: {}", i + 1, group))
        .collect()
}

/// Renumber capture groups densely in order of their opening parenthesis
///
/// Backreferences are remapped to the most recent copy of the group they
/// named, so each expanded alternative refers to its own copy.
pub fn renumber_groups(expr: &mut Expr) {
    let mut next = 1;
    let mut mapping = HashMap::new();
    renumber(expr, &mut next, &mut mapping);
}

fn renumber(expr: &mut Expr, next: &mut u32, mapping: &mut HashMap<u32, u32>) {
    match expr {
        Expr::Group { index, expr, .. } => {
            mapping.insert(*index, *next);
            *index = *next;
            *next += 1;
            renumber(expr, next, mapping);
        }
        Expr::Backreference(n) => {
            if let Some(mapped) = mapping.get(n) {
                *n = *mapped;
            }
        }
        Expr::Sequence(items) | Expr::Alternation(items) => {
            for item in items {
                renumber(item, next, mapping);
            }
        }
        Expr::Quantified { expr, .. }
        | Expr::NonCapturingGroup(expr)
        | Expr::Lookahead(expr)
        | Expr::NegativeLookahead(expr)
        | Expr::Lookbehind(expr)
        | Expr::NegativeLookbehind(expr) => renumber(expr, next, mapping),
        Expr::Conditional { yes, no, .. } => {
            renumber(yes, next, mapping);
            renumber(no, next, mapping);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_register_groups() {
        let mut registry = GroupRegistry::new();
        let idx1 = registry.register_group(Some("first".to_string())).unwrap();
        let idx2 = registry.register_group(None).unwrap();
        assert_eq!(idx1, 1);
        assert_eq!(idx2, 2);
        assert_eq!(registry.group_count(), 2);
        assert_eq!(registry.get_by_name("first"), Some(1));
        assert_eq!(registry.get_by_index(2).unwrap().name, None);
    }

    #[test]
    fn test_duplicate_name_error() {
        let mut registry = GroupRegistry::new();
        registry.register_group(Some("name".to_string())).unwrap();
        assert!(matches!(
            registry.register_group(Some("name".to_string())),
            Err(GroupRegistryError::DuplicateGroupName(_))
        ));
    }

    #[test]
    fn test_resolve_references() {
        let mut registry = GroupRegistry::new();
        registry.register_group(Some("quote".to_string())).unwrap();
        registry.register_group(None).unwrap();
        assert_eq!(registry.resolve("quote").unwrap(), 1);
        assert_eq!(registry.resolve("2").unwrap(), 2);
        assert!(matches!(
            registry.resolve("3"),
            Err(GroupRegistryError::InvalidBackreference(3))
        ));
        assert!(matches!(
            registry.resolve("missing"),
            Err(GroupRegistryError::UndefinedBackreference(_))
        ));
    }

    #[test]
    fn test_top_level_groups_skip_nested() {
        let expr = parse(r"(a(b))(?:(c))x").unwrap();
        let groups: Vec<String> = top_level_groups(&expr)
            .into_iter()
            .map(|g| g.to_string())
            .collect();
        assert_eq!(groups, vec!["(a(b))", "(c)"]);
    }

    #[test]
    fn test_group_breakdown() {
        let expr = parse(r"(\w+)(\s*)").unwrap();
        assert_eq!(
            group_breakdown(&expr),
            vec!["group 1: (\\w+)".to_string(), "group 2: (\\s*)".to_string()]
        );
    }

    #[test]
    fn test_renumber_groups() {
        let mut expr = Expr::sequence(vec![
            Expr::group(4, Expr::literal('a')),
            Expr::group(4, Expr::literal('a')),
            Expr::Backreference(4),
        ]);
        renumber_groups(&mut expr);
        assert_eq!(
            expr,
            Expr::sequence(vec![
                Expr::group(1, Expr::literal('a')),
                Expr::group(2, Expr::literal('a')),
                Expr::Backreference(2),
            ])
        );
    }
}
