/// A single query value in a [`Query`] layer.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    /// Removes the key from everything merged so far.
    Absent,
    /// Keeps the key with an empty value (`key=`).
    Null,
    /// Replaces any previous value for the key.
    Text(String),
    /// Appends one occurrence of the key per element.
    List(Vec<String>),
    /// Structured value, sent as compact JSON text.
    Json(serde_json::Value),
}

impl QueryValue {
    /// Builds a list value from anything string-like.
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

macro_rules! impl_display_query_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    Self::Text(value.to_string())
                }
            }
        )*
    };
}

impl_display_query_value!(bool, i32, i64, u32, u64, usize, f64);

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        Self::list(values)
    }
}

impl<const N: usize> From<[&str; N]> for QueryValue {
    fn from(values: [&str; N]) -> Self {
        Self::list(values)
    }
}

impl From<serde_json::Value> for QueryValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => Self::Null,
            Json::String(text) => Self::Text(text),
            Json::Bool(_) | Json::Number(_) => Self::Text(value.to_string()),
            Json::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Json::String(text) => text,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Json::Object(_) => Self::Json(value),
        }
    }
}

/// Ordered query layer: client defaults or call-level overrides.
///
/// Entries are applied in insertion order when layers are merged, so the
/// same key may appear more than once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query(Vec<(String, QueryValue)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry to the layer.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.0.push((key.into(), value.into()));
    }

    /// Appends every entry of `other` after the entries of this layer.
    pub fn extend(&mut self, other: &Query) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Query
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl From<()> for Query {
    fn from(_: ()) -> Self {
        Self::default()
    }
}
