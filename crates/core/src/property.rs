use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// An ordered, non-empty list of property names.
///
/// Order is significant: two lists naming the same properties in a different
/// order are different lists and index different column layouts.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PropertyList(Vec<String>);

impl PropertyList {
    pub fn new<I, S>(names: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(CoreError::EmptyPropertyList);
        }
        for (position, name) in names.iter().enumerate() {
            if names[..position].contains(name) {
                return Err(CoreError::DuplicateProperty(name.clone()));
            }
        }
        Ok(Self(names))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for the `len`/`is_empty` pairing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when `self` begins with every name of `prefix`, in order.
    pub fn starts_with(&self, prefix: &PropertyList) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl TryFrom<Vec<String>> for PropertyList {
    type Error = CoreError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<PropertyList> for Vec<String> {
    fn from(list: PropertyList) -> Self {
        list.0
    }
}

impl fmt::Debug for PropertyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for PropertyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{'{}'}}", self.0.join("', '"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> PropertyList {
        PropertyList::new(names.iter().copied()).unwrap()
    }

    #[test]
    fn rejects_empty_list() {
        let empty: [&str; 0] = [];
        assert_eq!(PropertyList::new(empty), Err(CoreError::EmptyPropertyList));
    }

    #[test]
    fn rejects_repeated_name() {
        let result = PropertyList::new(["A", "B", "A"]);
        assert_eq!(result, Err(CoreError::DuplicateProperty("A".into())));
    }

    #[test]
    fn prefix_is_order_sensitive() {
        let xy = list(&["X", "Y"]);
        assert!(xy.starts_with(&list(&["X"])));
        assert!(xy.starts_with(&xy));
        assert!(!xy.starts_with(&list(&["Y"])));
        assert!(!xy.starts_with(&list(&["Y", "X"])));
        assert!(!list(&["X"]).starts_with(&xy));
    }

    #[test]
    fn display_quotes_names() {
        assert_eq!(list(&["X", "Y"]).to_string(), "{'X', 'Y'}");
    }

    #[test]
    fn deserialize_enforces_invariants() {
        let bytes = rmp_serde::to_vec(&Vec::<String>::new()).unwrap();
        let result: Result<PropertyList, _> = rmp_serde::from_slice(&bytes);
        assert!(result.is_err());

        let bytes = rmp_serde::to_vec(&list(&["B_Id"])).unwrap();
        let decoded: PropertyList = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, list(&["B_Id"]));
    }
}
