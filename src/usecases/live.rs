//! Realtime plumbing: a broadcast change feed and incrementally maintained
//! collection caches.
//!
//! Services apply each committed mutation to their cache (upsert/remove by id)
//! and publish it on the feed, instead of refetching whole tables on change.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Questions,
    Answers,
    Announcements,
    Profiles,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Questions => "questions",
            Table::Answers => "answers",
            Table::Announcements => "announcements",
            Table::Profiles => "profiles",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One committed row change, as seen by subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub id: String,
    /// New row for insert/update, absent for delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn row<T: Serialize>(table: Table, kind: ChangeKind, id: &str, record: &T) -> Self {
        Self {
            table,
            kind,
            id: id.to_string(),
            record: serde_json::to_value(record).ok(),
        }
    }

    pub fn deleted(table: Table, id: &str) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            id: id.to_string(),
            record: None,
        }
    }
}

/// Fan-out of change events to any number of subscribers.
///
/// Slow subscribers lag and lose events; they are expected to resync.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        debug!(table = event.table.as_str(), id = %event.id, kind = ?event.kind, "change published");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

/// Row identity and revision, used to order concurrent cache writes.
pub trait Versioned {
    fn key(&self) -> &str;
    fn version(&self) -> i64;
}

impl Versioned for crate::domain::Question {
    fn key(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

impl Versioned for crate::domain::Announcement {
    fn key(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

/// Deleted ids remembered per collection. A late write can only come from a
/// request already in flight at delete time, so the oldest are dropped first.
pub const TOMBSTONE_LIMIT: usize = 4096;

struct Rows<T> {
    items: Vec<T>,
    /// Ids removed from the collection. Ids are never reused.
    removed: HashSet<String>,
    /// Removal order, oldest first; bounded by `tombstone_limit`.
    removed_order: VecDeque<String>,
}

/// Ordered in-memory copy of a table, updated row by row.
///
/// Invariants: an upsert never replaces a row with an older version, and a
/// removed id is never resurrected by a late upsert.
pub struct LiveCollection<T> {
    rows: RwLock<Rows<T>>,
    order: fn(&T, &T) -> Ordering,
    tombstone_limit: usize,
}

impl<T: Versioned + Clone> LiveCollection<T> {
    pub fn new(order: fn(&T, &T) -> Ordering) -> Self {
        Self::with_tombstone_limit(order, TOMBSTONE_LIMIT)
    }

    pub fn with_tombstone_limit(order: fn(&T, &T) -> Ordering, limit: usize) -> Self {
        Self {
            rows: RwLock::new(Rows {
                items: Vec::new(),
                removed: HashSet::new(),
                removed_order: VecDeque::new(),
            }),
            order,
            tombstone_limit: limit.max(1),
        }
    }

    /// Replace the contents with a fresh load from storage.
    pub async fn replace_all(&self, mut items: Vec<T>) {
        let mut rows = self.rows.write().await;
        items.retain(|item| !rows.removed.contains(item.key()));
        items.sort_by(self.order);
        rows.items = items;
    }

    /// Insert or replace by id. Returns false when the write was stale.
    pub async fn upsert(&self, item: T) -> bool {
        let mut rows = self.rows.write().await;
        if rows.removed.contains(item.key()) {
            return false;
        }
        let existing = rows.items.iter().position(|r| r.key() == item.key());
        match existing {
            Some(idx) if rows.items[idx].version() > item.version() => return false,
            Some(idx) => rows.items[idx] = item,
            None => rows.items.push(item),
        }
        rows.items.sort_by(self.order);
        true
    }

    /// Remove by id. Returns true if the row was present.
    pub async fn remove(&self, id: &str) -> bool {
        let mut rows = self.rows.write().await;
        if rows.removed.insert(id.to_string()) {
            rows.removed_order.push_back(id.to_string());
            while rows.removed_order.len() > self.tombstone_limit {
                if let Some(oldest) = rows.removed_order.pop_front() {
                    rows.removed.remove(&oldest);
                }
            }
        }
        let before = rows.items.len();
        rows.items.retain(|r| r.key() != id);
        rows.items.len() != before
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        let rows = self.rows.read().await;
        rows.items.iter().find(|r| r.key() == id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<T> {
        self.rows.read().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        version: i64,
        rank: i64,
    }

    impl Versioned for Row {
        fn key(&self) -> &str {
            &self.id
        }

        fn version(&self) -> i64 {
            self.version
        }
    }

    fn row(id: &str, version: i64, rank: i64) -> Row {
        Row {
            id: id.to_string(),
            version,
            rank,
        }
    }

    fn by_rank(a: &Row, b: &Row) -> Ordering {
        a.rank.cmp(&b.rank)
    }

    #[tokio::test]
    async fn test_upsert_keeps_order() {
        let live = LiveCollection::<Row>::new(by_rank);
        live.upsert(row("b", 1, 2)).await;
        live.upsert(row("a", 1, 1)).await;
        live.upsert(row("c", 1, 3)).await;

        let ids: Vec<String> = live.snapshot().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stale_upsert_is_ignored() {
        let live = LiveCollection::<Row>::new(by_rank);
        assert!(live.upsert(row("a", 3, 1)).await);
        assert!(!live.upsert(row("a", 2, 9)).await);
        assert_eq!(live.get("a").await.unwrap().version, 3);
        assert!(live.upsert(row("a", 4, 9)).await);
        assert_eq!(live.get("a").await.unwrap().rank, 9);
    }

    #[tokio::test]
    async fn test_removed_row_is_not_resurrected() {
        let live = LiveCollection::<Row>::new(by_rank);
        live.upsert(row("a", 1, 1)).await;
        assert!(live.remove("a").await);
        assert!(!live.upsert(row("a", 5, 1)).await);
        assert_eq!(live.len().await, 0);

        live.replace_all(vec![row("a", 6, 1), row("b", 1, 2)]).await;
        assert_eq!(live.snapshot().await, vec![row("b", 1, 2)]);
    }

    #[tokio::test]
    async fn test_tombstones_are_bounded() {
        let live = LiveCollection::<Row>::with_tombstone_limit(by_rank, 2);
        for id in ["a", "b", "c"] {
            live.upsert(row(id, 1, 1)).await;
            live.remove(id).await;
        }
        // Removing twice does not take an extra slot.
        live.remove("c").await;

        assert!(live.upsert(row("a", 2, 1)).await);
        assert!(!live.upsert(row("b", 2, 1)).await);
        assert!(!live.upsert(row("c", 2, 1)).await);
        assert_eq!(live.rows.read().await.removed.len(), 2);
    }

    #[tokio::test]
    async fn test_feed_fans_out_to_subscribers() {
        let feed = ChangeFeed::new(8);
        assert_eq!(feed.publish(ChangeEvent::deleted(Table::Questions, "q1")), 0);

        let mut first = feed.subscribe();
        let mut second = feed.subscribe();
        let sent = feed.publish(ChangeEvent::row(
            Table::Questions,
            ChangeKind::Insert,
            "q2",
            &serde_json::json!({"id": "q2"}),
        ));
        assert_eq!(sent, 2);

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.id, "q2");
        assert_eq!(b.kind, ChangeKind::Insert);
        assert_eq!(a.record.unwrap()["id"], "q2");
    }
}
