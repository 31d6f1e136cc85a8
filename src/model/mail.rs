//! Decoded mail types.

/// Ordered header list as it appears in the document.
///
/// Names keep their spelling as delivered; lookups are case-insensitive and
/// return the first matching value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping document order.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of `name`, in document order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Mutable access to the value of the most recently pushed header.
    pub(crate) fn last_value_mut(&mut self) -> Option<&mut String> {
        self.entries.last_mut().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A mail document after decoding: headers plus the selected plain-text body.
///
/// Created once per file event and dropped when the pipeline is done with it.
#[derive(Debug, Clone, Default)]
pub struct DecodedMail {
    /// Top-level headers of the message.
    pub headers: Headers,

    /// First `text/plain` part of a multipart message, transfer-decoded.
    /// Empty for single-part messages or when no such part exists.
    pub plain_body: String,
}

impl DecodedMail {
    /// First value of a top-level header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive_and_first_wins() {
        let mut headers = Headers::new();
        headers.push("X-Phabricator-Stamps", "first");
        headers.push("x-phabricator-stamps", "second");
        assert_eq!(headers.get("X-PHABRICATOR-STAMPS"), Some("first"));
        assert_eq!(
            headers.get_all("x-phabricator-stamps").collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert_eq!(headers.get("Subject"), None);
    }
}
