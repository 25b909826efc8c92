use std::fmt;
use std::sync::Arc;

/// Names the [`BatchFetcher`](crate::BatchFetcher) that owns a [`Key`].
///
/// Namespaces are static strings so that a gateway can declare them as
/// constants next to the fetcher they belong to and hand them out freely;
/// the type is `Copy` and comparisons are by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(&'static str);

impl Namespace {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Opaque identifier within a namespace.
///
/// Covers the id shapes backends actually key on: integer surrogate keys,
/// textual ids (UUIDs, usernames), and raw bytes for composite or binary
/// keys. Payloads are reference counted so keys stay cheap to clone into
/// batches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RawId {
    Int(i64),
    Text(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl From<i64> for RawId {
    fn from(id: i64) -> Self {
        RawId::Int(id)
    }
}

impl From<i32> for RawId {
    fn from(id: i32) -> Self {
        RawId::Int(id.into())
    }
}

impl From<u32> for RawId {
    fn from(id: u32) -> Self {
        RawId::Int(id.into())
    }
}

impl From<&str> for RawId {
    fn from(id: &str) -> Self {
        RawId::Text(Arc::from(id))
    }
}

impl From<String> for RawId {
    fn from(id: String) -> Self {
        RawId::Text(Arc::from(id))
    }
}

impl From<Arc<str>> for RawId {
    fn from(id: Arc<str>) -> Self {
        RawId::Text(id)
    }
}

impl From<Vec<u8>> for RawId {
    fn from(id: Vec<u8>) -> Self {
        RawId::Bytes(Arc::from(id))
    }
}

impl From<&[u8]> for RawId {
    fn from(id: &[u8]) -> Self {
        RawId::Bytes(Arc::from(id))
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Int(id) => write!(f, "{id}"),
            RawId::Text(id) => f.write_str(id),
            RawId::Bytes(id) => {
                for byte in id.iter() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Identity of a single unit of data to fetch.
///
/// Two keys are equal iff their namespace and raw id are equal; hashing is
/// consistent with equality. Keys are created by resolvers at call time,
/// immutable, and discarded when the owning request completes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    namespace: Namespace,
    raw_id: RawId,
}

impl Key {
    pub fn new(namespace: Namespace, raw_id: impl Into<RawId>) -> Self {
        Self { namespace, raw_id: raw_id.into() }
    }

    pub fn int(namespace: Namespace, id: i64) -> Self {
        Self::new(namespace, id)
    }

    pub fn text(namespace: Namespace, id: impl Into<String>) -> Self {
        Self::new(namespace, id.into())
    }

    pub fn bytes(namespace: Namespace, id: impl Into<Vec<u8>>) -> Self {
        Self::new(namespace, id.into())
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn raw_id(&self) -> &RawId {
        &self.raw_id
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.raw_id)
    }
}
