//! Conversation store collaborator.

use crate::types::ConversationItem;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Paging parameters for [`ConversationStore::list_items`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub order: Order,
    /// Only return items after this item id (in the requested order).
    pub after: Option<String>,
}

impl ListParams {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn after(mut self, item_id: impl Into<String>) -> Self {
        self.after = Some(item_id.into());
        self
    }
}

/// Append-only conversation history keyed by conversation id.
///
/// Append ordering is caller-serialized per conversation id; implementations need not
/// coordinate concurrent appends to the same conversation.
#[async_trait]
pub trait ConversationStore: Send + Sync + std::fmt::Debug {
    async fn create_conversation(&self, metadata: Map<String, Value>) -> Result<String>;

    async fn list_items(&self, conversation_id: &str, params: ListParams)
        -> Result<Vec<ConversationItem>>;

    /// Append items, returning them with their assigned ids.
    async fn create_items(
        &self,
        conversation_id: &str,
        items: Vec<ConversationItem>,
    ) -> Result<Vec<ConversationItem>>;

    async fn delete_item(&self, conversation_id: &str, item_id: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
struct Conversation {
    #[allow(dead_code)]
    metadata: Map<String, Value>,
    items: Vec<ConversationItem>,
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown(conversation_id: &str) -> Error {
    Error::validation_with_context(
        format!("conversation '{}' not found", conversation_id),
        ErrorContext::new()
            .with_field_path("conversation_id")
            .with_source("conversation_store"),
    )
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create_conversation(&self, metadata: Map<String, Value>) -> Result<String> {
        let id = format!("conv_{}", uuid::Uuid::new_v4().simple());
        self.conversations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id.clone(),
                Conversation {
                    metadata,
                    items: Vec::new(),
                },
            );
        Ok(id)
    }

    async fn list_items(
        &self,
        conversation_id: &str,
        params: ListParams,
    ) -> Result<Vec<ConversationItem>> {
        let conversations = self.conversations.read().unwrap_or_else(|e| e.into_inner());
        let conv = conversations
            .get(conversation_id)
            .ok_or_else(|| unknown(conversation_id))?;

        let mut items: Vec<ConversationItem> = conv.items.clone();
        if params.order == Order::Desc {
            items.reverse();
        }
        if let Some(after) = params.after.as_deref() {
            if let Some(pos) = items.iter().position(|i| i.id.as_deref() == Some(after)) {
                items.drain(..=pos);
            }
        }
        if let Some(limit) = params.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn create_items(
        &self,
        conversation_id: &str,
        items: Vec<ConversationItem>,
    ) -> Result<Vec<ConversationItem>> {
        let mut conversations = self.conversations.write().unwrap_or_else(|e| e.into_inner());
        let conv = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| unknown(conversation_id))?;
        let stored: Vec<ConversationItem> = items
            .into_iter()
            .map(|mut item| {
                if item.id.is_none() {
                    item.id = Some(format!("item_{}", uuid::Uuid::new_v4().simple()));
                }
                item
            })
            .collect();
        conv.items.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn delete_item(&self, conversation_id: &str, item_id: &str) -> Result<bool> {
        let mut conversations = self.conversations.write().unwrap_or_else(|e| e.into_inner());
        let conv = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| unknown(conversation_id))?;
        let before = conv.items.len();
        conv.items.retain(|i| i.id.as_deref() != Some(item_id));
        Ok(conv.items.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_list_delete() {
        let store = InMemoryConversationStore::new();
        let id = store.create_conversation(Map::new()).await.unwrap();
        let stored = store
            .create_items(
                &id,
                vec![
                    ConversationItem::user("one"),
                    ConversationItem::assistant("two"),
                    ConversationItem::tool_result("call_1", "three"),
                ],
            )
            .await
            .unwrap();
        assert!(stored.iter().all(|i| i.id.is_some()));

        let all = store.list_items(&id, ListParams::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        let first_id = all[0].id.clone().unwrap();

        let page = store
            .list_items(&id, ListParams::default().after(first_id.clone()).limit(1))
            .await
            .unwrap();
        assert_eq!(page[0].text(), "two");

        let desc = store
            .list_items(&id, ListParams::default().order(Order::Desc))
            .await
            .unwrap();
        assert_eq!(desc[0].text(), "three");

        assert!(store.delete_item(&id, &first_id).await.unwrap());
        assert!(!store.delete_item(&id, &first_id).await.unwrap());
        assert!(store.list_items("conv_missing", ListParams::default()).await.is_err());
    }
}
