/// An inbound push notification. Never stored; lives for one broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    pub uri: String,
    /// Branches updated by the push, in the order the sender listed them.
    /// May be empty.
    pub branches: Vec<String>,
}

impl Notification {
    pub fn new<I, S>(uri: impl Into<String>, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uri: uri.into(),
            branches: branches.into_iter().map(Into::into).collect(),
        }
    }
}
