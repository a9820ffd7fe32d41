use std::fmt;

/// Ordered path segments of a dotted configuration key. The dotted rendering
/// is always `segments.join(".")`, so a segment containing a literal `.`
/// cannot be told apart from a nested path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(key: &str) -> Self {
        if key.is_empty() {
            return Self::root();
        }

        Self {
            segments: key.split('.').map(str::to_owned).collect(),
        }
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_owned());
        Self { segments }
    }

    /// Full dotted key for `segment` appended to this path.
    pub fn join(&self, segment: &str) -> String {
        if self.segments.is_empty() {
            segment.to_owned()
        } else {
            format!("{self}.{segment}")
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for KeyPath {
    fn from(key: &str) -> Self {
        Self::parse(key)
    }
}

/// True when `key` equals `prefix` or extends it past a `.` boundary.
pub(crate) fn key_has_prefix(key: &str, prefix: &str) -> bool {
    match key.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}
