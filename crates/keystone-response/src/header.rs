use bytes::Bytes;

/// An HTTP header as a name-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A case-insensitive collection of HTTP headers.
///
/// [`insert`](HeaderMap::insert) is last-write-wins: it replaces every
/// existing value for the name. Multi-value headers (e.g. `Set-Cookie`)
/// are added with [`append`](HeaderMap::append) and survive wire encoding
/// as separate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<Header>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Set `name` to `value`, dropping any previous values for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|h| !h.name.eq_ignore_ascii_case(&name));
        self.entries.push(Header::new(name, value));
    }

    /// Add a value for `name`, keeping existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Header::new(name, value));
    }

    /// Set `name` only if no value is present. Returns the value in effect.
    pub fn set_default(&mut self, name: &str, value: impl Into<String>) -> &str {
        let idx = match self
            .entries
            .iter()
            .position(|h| h.name.eq_ignore_ascii_case(name))
        {
            Some(idx) => idx,
            None => {
                self.entries.push(Header::new(name, value));
                self.entries.len() - 1
            }
        };
        &self.entries[idx].value
    }

    /// Get the first header value matching `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Get all header values matching `name` (case-insensitive).
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Remove every value for `name`. Returns `true` if anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|h| !h.name.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Header> {
        self.entries
    }

    /// Encode as the ordered byte-pair list carried by a start frame.
    ///
    /// Names are lower-cased; every entry (including repeated names) is
    /// emitted in insertion order.
    pub fn to_wire(&self) -> Vec<(Bytes, Bytes)> {
        self.entries
            .iter()
            .map(|h| {
                (
                    Bytes::from(h.name.to_ascii_lowercase()),
                    Bytes::copy_from_slice(h.value.as_bytes()),
                )
            })
            .collect()
    }
}

impl FromIterator<Header> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        let mut map = Self::new();
        for h in iter {
            map.insert(h.name, h.value);
        }
        map
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}
