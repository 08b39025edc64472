//! In-memory conversation store with soft deletion and recency-bucketed
//! history queries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, derive_title};

/// 历史查询单次返回的会话数量上限
const HISTORY_LIMIT: usize = 100;

/// 单个会话的完整存储形态
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 软删除标记 置位后对历史查询不可见
    pub deleted_at: Option<DateTime<Utc>>,
    pub messages: Vec<ChatMessage>,
}

/// 历史查询返回的会话视图
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}

/// 按本地日界分桶的历史列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBuckets {
    pub today: Vec<ConversationView>,
    pub yesterday: Vec<ConversationView>,
    pub previous_seven_days: Vec<ConversationView>,
    pub older: Vec<ConversationView>,
}

#[derive(Debug, Default)]
struct RepositoryState {
    conversations: HashMap<String, ConversationRecord>,
}

/// Process-local conversation store shared by all gateway handlers.
///
/// Handlers clone the handle freely. Lock scope stays inside each method,
/// so no guard is ever held across an await point.
#[derive(Debug, Clone, Default)]
pub struct ChatRepository {
    inner: Arc<Mutex<RepositoryState>>,
}

enum HistoryBucket {
    Today,
    Yesterday,
    PreviousSevenDays,
    Older,
}

/// 以本地日历日为界分桶 时钟轻微超前的时间戳归入今天
fn bucket_for(updated_at: DateTime<Utc>, now: DateTime<Local>) -> HistoryBucket {
    let updated_local = updated_at.with_timezone(&now.timezone());
    let days = (now.date_naive() - updated_local.date_naive()).num_days();
    match days {
        d if d <= 0 => HistoryBucket::Today,
        1 => HistoryBucket::Yesterday,
        2..=7 => HistoryBucket::PreviousSevenDays,
        _ => HistoryBucket::Older,
    }
}

impl ChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RepositoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a message, creating its conversation on first
    /// contact.
    ///
    /// Replaying a save is idempotent: a message whose id already exists in
    /// the conversation has its content replaced in place rather than being
    /// appended again. The conversation title is seeded from the first
    /// message saved into it.
    pub fn upsert_message(&self, message: ChatMessage) {
        let now = Utc::now();
        let mut state = self.state();
        let record = state
            .conversations
            .entry(message.conversation_id.clone())
            .or_insert_with(|| ConversationRecord {
                id: message.conversation_id.clone(),
                title: derive_title(&message.content),
                created_at: now,
                updated_at: now,
                deleted_at: None,
                messages: Vec::new(),
            });
        match record
            .messages
            .iter()
            .position(|existing| existing.id == message.id)
        {
            Some(index) => record.messages[index] = message,
            None => record.messages.push(message),
        }
        record.updated_at = now;
    }

    /// Snapshot of non-deleted conversations, most recently updated first,
    /// bucketed by local calendar day and capped at [`HISTORY_LIMIT`].
    pub fn history(&self, now: DateTime<Local>) -> HistoryBuckets {
        let state = self.state();
        let mut records: Vec<&ConversationRecord> = state
            .conversations
            .values()
            .filter(|record| record.deleted_at.is_none())
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut buckets = HistoryBuckets::default();
        for record in records.into_iter().take(HISTORY_LIMIT) {
            let view = ConversationView {
                id: record.id.clone(),
                title: record.title.clone(),
                messages: record.messages.clone(),
                updated_at: record.updated_at,
            };
            match bucket_for(record.updated_at, now) {
                HistoryBucket::Today => buckets.today.push(view),
                HistoryBucket::Yesterday => buckets.yesterday.push(view),
                HistoryBucket::PreviousSevenDays => buckets.previous_seven_days.push(view),
                HistoryBucket::Older => buckets.older.push(view),
            }
        }
        buckets
    }

    /// 软删除 不存在或已删除时返回 false
    pub fn soft_delete(&self, conversation_id: &str) -> bool {
        let now = Utc::now();
        let mut state = self.state();
        match state.conversations.get_mut(conversation_id) {
            Some(record) if record.deleted_at.is_none() => {
                record.deleted_at = Some(now);
                record.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// 重命名 已删除的会话视同不存在
    pub fn rename(&self, conversation_id: &str, title: &str) -> bool {
        let now = Utc::now();
        let mut state = self.state();
        match state.conversations.get_mut(conversation_id) {
            Some(record) if record.deleted_at.is_none() => {
                record.title = title.to_string();
                record.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// 读取单个会话的完整记录 含已软删除的
    pub fn conversation(&self, conversation_id: &str) -> Option<ConversationRecord> {
        self.state().conversations.get(conversation_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::types::{Role, TITLE_MAX_CHARS};

    fn message(id: &str, conversation: &str, role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            conversation_id: conversation.to_string(),
            role,
            content: content.to_string(),
            model: "gpt-4o".to_string(),
            timestamp: Utc::now(),
            images: Vec::new(),
        }
    }

    fn backdate(repository: &ChatRepository, conversation_id: &str, updated_at: DateTime<Utc>) {
        let mut state = repository.state();
        if let Some(record) = state.conversations.get_mut(conversation_id) {
            record.updated_at = updated_at;
        }
    }

    #[test]
    fn first_save_creates_conversation_and_seeds_title() {
        let repository = ChatRepository::new();
        let long_content = "t".repeat(250);
        repository.upsert_message(message("m1", "c1", Role::User, &long_content));

        let record = repository.conversation("c1").expect("record");
        assert_eq!(record.title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(record.messages.len(), 1);
        assert!(record.deleted_at.is_none());
    }

    #[test]
    fn replayed_save_overwrites_in_place() {
        let repository = ChatRepository::new();
        repository.upsert_message(message("m1", "c1", Role::User, "hello"));
        repository.upsert_message(message("m2", "c1", Role::Assistant, "partial"));
        repository.upsert_message(message("m2", "c1", Role::Assistant, "full answer"));

        let record = repository.conversation("c1").expect("record");
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.messages[1].content, "full answer");
        // 标题保持首条消息的种子不随后续消息改变
        assert_eq!(record.title, "hello");
    }

    #[test]
    fn buckets_follow_local_day_boundaries() {
        let now = Local::now();
        let as_utc = |days_back: i64| (now - Duration::days(days_back)).with_timezone(&Utc);

        assert!(matches!(bucket_for(as_utc(0), now), HistoryBucket::Today));
        assert!(matches!(
            bucket_for(as_utc(1), now),
            HistoryBucket::Yesterday
        ));
        assert!(matches!(
            bucket_for(as_utc(2), now),
            HistoryBucket::PreviousSevenDays
        ));
        assert!(matches!(
            bucket_for(as_utc(7), now),
            HistoryBucket::PreviousSevenDays
        ));
        assert!(matches!(bucket_for(as_utc(8), now), HistoryBucket::Older));
        assert!(matches!(bucket_for(as_utc(-1), now), HistoryBucket::Today));
    }

    #[test]
    fn history_excludes_deleted_and_sorts_recent_first() {
        let repository = ChatRepository::new();
        repository.upsert_message(message("m1", "c-old", Role::User, "old"));
        repository.upsert_message(message("m2", "c-new", Role::User, "new"));
        repository.upsert_message(message("m3", "c-gone", Role::User, "gone"));

        let now = Local::now();
        backdate(&repository, "c-old", (now - Duration::days(3)).with_timezone(&Utc));
        assert!(repository.soft_delete("c-gone"));

        let buckets = repository.history(now);
        assert_eq!(buckets.today.len(), 1);
        assert_eq!(buckets.today[0].id, "c-new");
        assert_eq!(buckets.previous_seven_days.len(), 1);
        assert_eq!(buckets.previous_seven_days[0].id, "c-old");
        assert!(buckets.yesterday.is_empty());
        assert!(buckets.older.is_empty());
    }

    #[test]
    fn soft_delete_returns_false_when_missing_or_repeated() {
        let repository = ChatRepository::new();
        assert!(!repository.soft_delete("absent"));

        repository.upsert_message(message("m1", "c1", Role::User, "hi"));
        assert!(repository.soft_delete("c1"));
        assert!(!repository.soft_delete("c1"));
    }

    #[test]
    fn rename_ignores_deleted_conversations() {
        let repository = ChatRepository::new();
        assert!(!repository.rename("absent", "title"));

        repository.upsert_message(message("m1", "c1", Role::User, "hi"));
        assert!(repository.rename("c1", "renamed"));
        assert_eq!(repository.conversation("c1").expect("record").title, "renamed");

        repository.soft_delete("c1");
        assert!(!repository.rename("c1", "again"));
    }

    #[test]
    fn history_caps_at_limit() {
        let repository = ChatRepository::new();
        let now = Local::now();
        for index in 0..(HISTORY_LIMIT + 3) {
            let conversation = format!("c{index}");
            repository.upsert_message(message("m1", &conversation, Role::User, "hi"));
            backdate(
                &repository,
                &conversation,
                (now - Duration::minutes(index as i64)).with_timezone(&Utc),
            );
        }

        let buckets = repository.history(now);
        let ids: Vec<&str> = buckets
            .today
            .iter()
            .chain(&buckets.yesterday)
            .chain(&buckets.previous_seven_days)
            .chain(&buckets.older)
            .map(|view| view.id.as_str())
            .collect();
        assert_eq!(ids.len(), HISTORY_LIMIT);
        // 按更新时间保留最近的 淘汰最旧的
        assert!(ids.contains(&"c0"));
        let oldest = format!("c{}", HISTORY_LIMIT + 2);
        assert!(!ids.contains(&oldest.as_str()));
    }

    #[test]
    fn history_wire_format_uses_camel_case_buckets() {
        let repository = ChatRepository::new();
        repository.upsert_message(message("m1", "c1", Role::User, "hi"));
        let now = Local::now();
        backdate(&repository, "c1", (now - Duration::days(3)).with_timezone(&Utc));

        let wire = serde_json::to_value(repository.history(now)).expect("serialize");
        let bucket = wire
            .get("previousSevenDays")
            .and_then(|value| value.as_array())
            .expect("camelCase bucket");
        assert_eq!(bucket.len(), 1);
        assert!(bucket[0].get("updatedAt").is_some());
        assert_eq!(bucket[0]["messages"][0]["chatId"], "c1");
    }
}
