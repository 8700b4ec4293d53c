use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-native assistant message carried through the conversation
/// untouched.
///
/// Function calling protocols usually require the assistant message that
/// requested the tools to be replayed verbatim before the tool results. The
/// provider wraps its own message type in an `OpaqueMessage`, the core keeps
/// it in the conversation, and the provider unwraps it again with
/// [`OpaqueMessage::to_raw`] when the next request is serialized.
///
/// Two opaque messages are equal when their ids are equal.
#[derive(Clone)]
pub struct OpaqueMessage {
    id: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueMessage {
    /// Wraps `value`, identified by `id`.
    ///
    /// The id should be unique within one conversation.
    #[inline]
    pub fn new<ID, T>(id: ID, value: T) -> Self
    where
        ID: Into<Arc<str>>,
        T: Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            value: Arc::new(value),
        }
    }

    /// Returns the message id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the wrapped value if it has type `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.id).finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
