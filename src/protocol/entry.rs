//! Directory entries and attributes

/// A named attribute with one or more values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute description (name), matched case-insensitively
    pub name: String,

    /// Attribute values, in insertion order
    pub values: Vec<String>,
}

impl Attribute {
    /// Create an attribute with a single value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }

    /// Create an attribute with multiple values
    pub fn with_values(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this attribute contains the given value (exact match)
    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// A directory entry: a DN plus a set of attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Distinguished name of the entry
    pub dn: String,

    /// Attributes, in insertion order
    pub attributes: Vec<Attribute>,
}

impl Entry {
    /// Create an entry with no attributes
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Create an entry with the given attributes
    pub fn with_attributes(dn: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Look up an attribute by name (case-insensitive)
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Whether the entry has an attribute with the given name
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Whether the entry has the given value for the named attribute
    pub fn has_attribute_value(&self, name: &str, value: &str) -> bool {
        self.attribute(name).is_some_and(|a| a.has_value(value))
    }

    /// Add a value to the named attribute, creating it if absent
    pub fn add_attribute_value(&mut self, name: &str, value: impl Into<String>) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(attr) => attr.values.push(value.into()),
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    /// Whether `other` is a subset of this entry: same DN, and every
    /// attribute value of `other` is present here. This entry may carry
    /// additional attributes and values.
    pub fn is_superset_of(&self, other: &Entry) -> bool {
        if !self.dn.eq_ignore_ascii_case(&other.dn) {
            return false;
        }

        other.attributes.iter().all(|attr| {
            attr.values
                .iter()
                .all(|value| self.has_attribute_value(&attr.name, value))
        })
    }
}
