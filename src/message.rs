/// A structured record as stored by message buckets.
///
/// Only the identity fields are modelled here; how a tree is laid out inside
/// a bucket is up to the bucket implementation registered for this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageTree {
    pub domain: String,
    pub hostname: String,
    pub ip_address: String,
    pub message_id: String,
    pub parent_message_id: Option<String>,
    pub root_message_id: Option<String>,
    pub thread_name: String,
    /// Encoded message body
    pub payload: Vec<u8>,
}

impl MessageTree {
    pub fn new(domain: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            message_id: message_id.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if this tree starts a new call chain.
    pub fn is_root(&self) -> bool {
        self.parent_message_id.is_none()
    }
}
