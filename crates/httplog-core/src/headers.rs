//! Case-insensitive, ordered header multi-map

use http::HeaderMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A header name that compares case-insensitively but keeps its spelling
#[derive(Clone)]
struct HeaderKey(String);

impl HeaderKey {
    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for HeaderKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for HeaderKey {}

impl PartialOrd for HeaderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeaderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl fmt::Debug for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Headers of a logged message
///
/// Keys are ordered and matched case-insensitively, values keep their
/// insertion order. The map is a plain value: filters take it by value and
/// return the rewritten copy.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: BTreeMap<HeaderKey, Vec<String>>,
}

impl HttpHeaders {
    /// Create an empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the headers of an `http` message.
    ///
    /// `http` stores names in lowercase; they are copied in canonical form
    /// (`content-type` becomes `Content-Type`). Values that are not valid
    /// UTF-8 are decoded lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            headers.append(
                canonical_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        headers
    }

    /// Return a copy with `name` set to the given values
    pub fn with<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.set(name, values);
        self
    }

    /// Replace all values of `name`
    pub fn set<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = HeaderKey(name.into());
        self.entries.remove(&key);
        self.entries
            .insert(key, values.into_iter().map(Into::into).collect());
    }

    /// Append a value to `name`, keeping existing values
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(HeaderKey(name.into()))
            .or_default()
            .push(value.into());
    }

    /// All values of a header
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .get(&HeaderKey(name.to_string()))
            .map(Vec::as_slice)
    }

    /// The first value of a header
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Check whether a header is present
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&HeaderKey(name.to_string()))
    }

    /// Remove a header, returning its values
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(&HeaderKey(name.to_string()))
    }

    /// Keep only the headers matching the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &[String]) -> bool) {
        self.entries.retain(|key, values| keep(&key.0, values));
    }

    /// Rewrite every value in place
    pub fn map_values(mut self, mut f: impl FnMut(&str, &str) -> String) -> Self {
        for (key, values) in self.entries.iter_mut() {
            for value in values.iter_mut() {
                *value = f(&key.0, value);
            }
        }
        self
    }

    /// Iterate over headers in case-insensitive name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.0.as_str(), values.as_slice()))
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether there are no headers
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Debug for HttpHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<N, V> FromIterator<(N, V)> for HttpHeaders
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}
