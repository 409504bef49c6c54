use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::object::{ContentHash, ObjectNode};

use super::description::ShareDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    /// Created, content not settled yet
    #[default]
    Draft,
    /// Content settled and being delivered
    Sharing,
    /// Content fully present locally
    Complete,
    Error,
}

/// A peer a share is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub public_key: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Contact {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecipient {
    public_key: String,
    notified: bool,
}

impl ShareRecipient {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            notified: false,
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn notified(&self) -> bool {
        self.notified
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShareError {
    #[error("share {0} is already published")]
    AlreadyPublished(Uuid),
    #[error("share {0} has no content")]
    NoContent(Uuid),
    #[error("share {0} has no recipient {1}")]
    RecipientNotFound(Uuid, String),
}

/**
 * Shares
 * ======
 * A share wraps one directory (the wrapper) whose children are the
 *  shared items, plus the people it is addressed to.
 * Lifecycle:
 *  - created as a Draft
 *  - content set, recipients attached, status moves to Sharing
 *  - published: the hash of its description is assigned exactly once
 *  - each recipient is marked notified as delivery succeeds
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    id: Uuid,
    title: String,
    description: String,
    #[serde(default)]
    author: Option<String>,
    content: Option<ObjectNode>,
    recipients: BTreeMap<String, ShareRecipient>,
    status: ShareStatus,
    hash: Option<ContentHash>,
    #[serde(default)]
    favorite: bool,
    created_at: DateTime<Utc>,
}

impl Share {
    pub fn create(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            author: None,
            content: None,
            recipients: BTreeMap::new(),
            status: ShareStatus::Draft,
            hash: None,
            favorite: false,
            created_at: Utc::now(),
        }
    }

    /// A share received from someone else, rebuilt from its
    ///  published description
    pub fn from_description(hash: ContentHash, description: ShareDescription) -> Self {
        let mut share = Self::create(description.title, description.description);
        share.author = description.author;
        share.content = Some(ObjectNode::directory(description.content));
        share.status = ShareStatus::Sharing;
        share.hash = Some(hash);
        share
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn content(&self) -> Option<&ObjectNode> {
        self.content.as_ref()
    }

    pub fn recipients(&self) -> &BTreeMap<String, ShareRecipient> {
        &self.recipients
    }

    pub fn status(&self) -> ShareStatus {
        self.status
    }

    pub fn hash(&self) -> Option<&ContentHash> {
        self.hash.as_ref()
    }

    pub fn favorite(&self) -> bool {
        self.favorite
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_author(&mut self, author: Option<String>) {
        self.author = author;
    }

    pub fn take_content(&mut self) -> Option<ObjectNode> {
        self.content.take()
    }

    pub fn set_content(&mut self, content: ObjectNode) {
        self.content = Some(content);
    }

    pub fn set_status(&mut self, status: ShareStatus) {
        self.status = status;
    }

    /// Attach a recipient. Re-adding a known key keeps its notified flag.
    pub fn add_recipient(&mut self, public_key: impl Into<String>) {
        let public_key = public_key.into();
        self.recipients
            .entry(public_key.clone())
            .or_insert_with(|| ShareRecipient::new(public_key));
    }

    pub fn set_hash(&mut self, hash: ContentHash) -> Result<(), ShareError> {
        if self.hash.is_some() {
            return Err(ShareError::AlreadyPublished(self.id));
        }
        self.hash = Some(hash);
        Ok(())
    }

    pub fn mark_notified(&mut self, public_key: &str) -> Result<(), ShareError> {
        let recipient = self
            .recipients
            .get_mut(public_key)
            .ok_or_else(|| ShareError::RecipientNotFound(self.id, public_key.to_string()))?;
        recipient.notified = true;
        Ok(())
    }

    pub fn toggle_favorite(&mut self) {
        self.favorite = !self.favorite;
    }

    /// The form of this share that gets published
    pub fn to_description(&self) -> Result<ShareDescription, ShareError> {
        let content = self.content.as_ref().ok_or(ShareError::NoContent(self.id))?;
        Ok(ShareDescription {
            title: self.title.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            content: content.hash().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut share = Share::create("t", "d");
        assert_eq!(share.status(), ShareStatus::Draft);
        assert!(share.hash().is_none());
        assert_eq!(share.to_description(), Err(ShareError::NoContent(share.id())));

        share.set_content(ObjectNode::directory(ContentHash::of(b"wrapper")));
        share.add_recipient("alice");
        share.add_recipient("bob");
        share.set_status(ShareStatus::Sharing);

        share.set_hash(ContentHash::of(b"published")).unwrap();
        assert!(share.set_hash(ContentHash::of(b"again")).is_err());

        share.mark_notified("bob").unwrap();
        assert!(!share.recipients()["alice"].notified());
        assert!(share.recipients()["bob"].notified());
        assert!(share.mark_notified("carol").is_err());

        // re-adding does not reset delivery state
        share.add_recipient("bob");
        assert!(share.recipients()["bob"].notified());
    }

    #[test]
    fn test_from_description() {
        let description = ShareDescription {
            title: "album".into(),
            description: "summer".into(),
            author: Some("alice".into()),
            content: ContentHash::of(b"wrapper"),
        };
        let hash = ContentHash::of(b"desc");
        let share = Share::from_description(hash.clone(), description);
        assert_eq!(share.title(), "album");
        assert_eq!(share.author(), Some("alice"));
        assert_eq!(share.hash(), Some(&hash));
        assert_eq!(
            share.content().map(|c| c.hash().clone()),
            Some(ContentHash::of(b"wrapper"))
        );
    }
}
