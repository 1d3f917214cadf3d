//! Field references: opaque, composable paths into an entity.

use std::fmt;

/// Separator used when composing the name of an embedded composite field.
const SUBFIELD_SEPARATOR: &str = "_";

/// An opaque path identifying an entity field.
///
/// A `Field` is the vocabulary all constraints are written in. It is an
/// immutable value: equal paths are interchangeable keys, and a reference can
/// be shared freely between threads. No schema validation happens at this
/// layer; a path unknown to the backend surfaces as a backend error at
/// execution time.
///
/// # Examples
///
/// ```
/// use polystore::schema::Field;
///
/// let name = Field::named("name");
/// assert_eq!(name.to_string(), "name");
///
/// // Embedded composite: the composite's own column is prefixed.
/// let address = Field::named("address");
/// let zip = address.inner(&Field::named("zip"));
/// assert_eq!(zip.to_string(), "address_zip");
///
/// // Joined entity: the referencing field becomes the parent.
/// let customer = Field::named("customer");
/// let customer_name = customer.join(&Field::named("name"));
/// assert_eq!(customer_name.to_string(), "customer.name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    parent: Option<Box<Field>>,
}

impl Field {
    /// Creates a root field with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            parent: None,
        }
    }

    /// Returns the path to a field inside an embedded composite.
    ///
    /// The composed name is `self.name + "_" + inner.name`; the parent chain
    /// of `self` is retained unchanged.
    pub fn inner(&self, inner: &Field) -> Field {
        Field {
            name: format!("{}{}{}", self.name, SUBFIELD_SEPARATOR, inner.name),
            parent: self.parent.clone(),
        }
    }

    /// Returns the path to a field of an entity reached via this reference
    /// field.
    ///
    /// `self` is kept as the parent so that backends which resolve joins can
    /// tell the referencing field apart from the target field.
    pub fn join(&self, other: &Field) -> Field {
        Field {
            name: other.name.clone(),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// The unqualified name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The referencing field this path was joined through, if any.
    pub fn parent(&self) -> Option<&Field> {
        self.parent.as_deref()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}.{}", parent, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_named_renders_plain_name() {
        assert_eq!(Field::named("price").to_string(), "price");
    }

    #[test]
    fn test_inner_composes_with_underscore() {
        let address = Field::named("address");
        let zip = address.inner(&Field::named("zip"));
        assert_eq!(zip.name(), "address_zip");
        assert!(zip.parent().is_none());
    }

    #[test]
    fn test_inner_keeps_parent_chain() {
        let order = Field::named("order");
        let address = order.join(&Field::named("address"));
        let zip = address.inner(&Field::named("zip"));
        assert_eq!(zip.to_string(), "order.address_zip");
    }

    #[test]
    fn test_join_renders_dotted_path() {
        let customer = Field::named("customer");
        let name = customer.join(&Field::named("name"));
        assert_eq!(name.to_string(), "customer.name");
        assert_eq!(name.parent(), Some(&Field::named("customer")));
    }

    #[test]
    fn test_join_chains() {
        let order = Field::named("order");
        let customer = order.join(&Field::named("customer"));
        let name = customer.join(&Field::named("name"));
        assert_eq!(name.to_string(), "order.customer.name");
    }

    #[test]
    fn test_equal_paths_are_interchangeable_keys() {
        let a = Field::named("customer").join(&Field::named("name"));
        let b = Field::named("customer").join(&Field::named("name"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
