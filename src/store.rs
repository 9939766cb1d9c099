//! 任务列表与 ID 分配
//!
//! `TaskStore` 持有内存中的任务序列（按插入顺序）以及分配器状态：
//! 下一个新 ID `next_id` 和回收队列 `deleted_ids`（先回收先复用）。
//! 每次变更后都会把完整状态作为一条 JSON 记录写回存储。
//!
//! 持久化格式：
//!
//! ```text
//! { "tasks": [{ "id": 1, "description": "...", "completed": false }],
//!   "nextId": 2,
//!   "deletedIds": [] }
//! ```

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TaskError};
use crate::storage::KeyValueStore;

/// 任务记录所在的存储 key
pub const STORAGE_KEY: &str = "tasks";

/// 任务数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// 完成状态的显示文本
    pub fn status_label(&self) -> &'static str {
        if self.completed {
            "Completed"
        } else {
            "Not Completed"
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.id, self.description, self.status_label())
    }
}

/// 写盘时的记录结构
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState<'a> {
    tasks: &'a [Task],
    next_id: u32,
    deleted_ids: &'a VecDeque<u32>,
}

/// 从记录中恢复出的状态
#[derive(Debug, Default, PartialEq)]
struct RestoredState {
    tasks: Vec<Task>,
    next_id: u32,
    deleted_ids: VecDeque<u32>,
}

/// 没有持久化 nextId 时，从任务列表推算；最大 ID 已到 u32 上限时返回 `None`
fn fresh_next_id(tasks: &[Task]) -> Option<u32> {
    match tasks.iter().map(|t| t.id).max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

/// 解析持久化记录，任何损坏都降级为空列表而不是报错
fn decode_state(raw: &str) -> RestoredState {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "persisted tasks are not valid JSON, starting empty");
            return RestoredState {
                next_id: 1,
                ..Default::default()
            };
        }
    };

    let mut tasks = match value.get("tasks") {
        Some(list @ Value::Array(_)) => match Vec::<Task>::deserialize(list) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "persisted task list is malformed, resetting");
                Vec::new()
            }
        },
        other => {
            tracing::warn!(found = ?other, "persisted tasks is not an array, resetting");
            Vec::new()
        }
    };

    // nextId 只在缺失（或无效）时推算，否则原样采用
    let persisted_next_id = value
        .get("nextId")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n >= 1);
    let next_id = match persisted_next_id {
        Some(n) => n,
        None => fresh_next_id(&tasks).unwrap_or_else(|| {
            tracing::warn!("persisted task ids exhaust the id space, resetting");
            tasks.clear();
            1
        }),
    };

    let deleted_ids = value
        .get("deletedIds")
        .and_then(|v| VecDeque::<u32>::deserialize(v).ok())
        .unwrap_or_default();

    RestoredState {
        tasks,
        next_id,
        deleted_ids,
    }
}

/// 任务仓库
#[derive(Debug)]
pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    tasks: Vec<Task>,
    next_id: u32,
    deleted_ids: VecDeque<u32>,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// 从存储加载；记录不存在时得到空仓库
    ///
    /// 只有存储本身读失败才返回错误，记录内容损坏会被容忍。
    pub fn load(storage: S) -> Result<Self> {
        let state = match storage.get(STORAGE_KEY)? {
            Some(raw) => decode_state(&raw),
            None => RestoredState {
                next_id: 1,
                ..Default::default()
            },
        };

        tracing::debug!(
            tasks = state.tasks.len(),
            next_id = state.next_id,
            reclaimed = state.deleted_ids.len(),
            "loaded task store"
        );

        Ok(Self {
            storage,
            tasks: state.tasks,
            next_id: state.next_id,
            deleted_ids: state.deleted_ids,
        })
    }

    /// 添加任务，返回分配的 ID
    ///
    /// 优先复用回收队列头部的 ID，否则取 `next_id` 并递增。
    pub fn add(&mut self, description: impl Into<String>) -> Result<u32> {
        let id = match self.deleted_ids.pop_front() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id = id
                    .checked_add(1)
                    .ok_or_else(|| TaskError::invalid_data("id space exhausted"))?;
                id
            }
        };

        self.tasks.push(Task {
            id,
            description: description.into(),
            completed: false,
        });
        tracing::debug!(id, "added task");

        self.save()?;
        Ok(id)
    }

    /// 全部任务（插入顺序）
    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// 切换完成状态，返回切换后的状态
    pub fn toggle(&mut self, id: u32) -> Result<bool> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;
        task.completed = !task.completed;
        let completed = task.completed;
        tracing::debug!(id, completed, "toggled task");

        self.save()?;
        Ok(completed)
    }

    /// 删除任务，ID 进入回收队列尾部
    pub fn remove(&mut self, id: u32) -> Result<Task> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;
        let task = self.tasks.remove(index);
        self.deleted_ids.push_back(id);
        tracing::debug!(id, "removed task");

        self.save()?;
        Ok(task)
    }

    /// 修改任务描述（空描述由调用方拦截）
    pub fn rename(&mut self, id: u32, description: impl Into<String>) -> Result<()> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;
        task.description = description.into();
        tracing::debug!(id, "renamed task");

        self.save()
    }

    /// 大小写不敏感的子串搜索，保持原顺序
    pub fn search(&self, query: &str) -> Vec<&Task> {
        let needle = query.to_lowercase();
        self.tasks
            .iter()
            .filter(|t| t.description.to_lowercase().contains(&needle))
            .collect()
    }

    #[cfg(test)]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// 回收队列（队首最先被复用）
    #[cfg(test)]
    pub fn deleted_ids(&self) -> &VecDeque<u32> {
        &self.deleted_ids
    }

    #[cfg(test)]
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// 把任务列表、nextId、回收队列作为一条记录整体写回
    fn save(&mut self) -> Result<()> {
        let record = PersistedState {
            tasks: &self.tasks,
            next_id: self.next_id,
            deleted_ids: &self.deleted_ids,
        };
        let json = serde_json::to_string(&record)?;
        self.storage.set(STORAGE_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    fn empty_store() -> TaskStore<MemoryStore> {
        TaskStore::load(MemoryStore::new()).unwrap()
    }

    fn store_with(raw: &str) -> TaskStore<MemoryStore> {
        let mut storage = MemoryStore::new();
        storage.set(STORAGE_KEY, raw).unwrap();
        TaskStore::load(storage).unwrap()
    }

    #[test]
    fn test_empty_load() {
        let store = empty_store();
        assert!(store.list().is_empty());
        assert_eq!(store.next_id(), 1);
        assert!(store.deleted_ids().is_empty());
    }

    #[test]
    fn test_add_assigns_id_and_not_completed() {
        let mut store = empty_store();
        let id = store.add("Write report").unwrap();

        assert_eq!(id, 1);
        let task = store.get(id).unwrap();
        assert_eq!(task.description, "Write report");
        assert!(!task.completed);
        assert_eq!(task.to_string(), "1: Write report - Not Completed");
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_removed_id_is_reused_first() {
        let mut store = empty_store();
        store.add("a").unwrap();
        store.add("b").unwrap();
        store.add("c").unwrap();

        store.remove(2).unwrap();
        assert_eq!(store.deleted_ids(), &VecDeque::from([2]));

        assert_eq!(store.add("d").unwrap(), 2);
        assert_eq!(store.add("e").unwrap(), 4);
        assert_eq!(store.next_id(), 5);

        let ids: Vec<u32> = store.list().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_reclaim_queue_is_fifo() {
        let mut store = empty_store();
        for d in ["a", "b", "c"] {
            store.add(d).unwrap();
        }
        store.remove(3).unwrap();
        store.remove(1).unwrap();

        assert_eq!(store.add("x").unwrap(), 3);
        assert_eq!(store.add("y").unwrap(), 1);
        assert_eq!(store.add("z").unwrap(), 4);
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut store = empty_store();
        let id = store.add("Toggle me").unwrap();

        assert!(store.toggle(id).unwrap());
        assert_eq!(store.get(id).unwrap().to_string(), "1: Toggle me - Completed");
        assert!(!store.toggle(id).unwrap());
        assert!(!store.get(id).unwrap().completed);
    }

    #[test]
    fn test_missing_id_leaves_store_unchanged() {
        let mut store = empty_store();

        let err = store.toggle(999).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No task found with ID 999.");
        assert!(store.remove(999).unwrap_err().is_not_found());
        assert!(store.rename(999, "x").unwrap_err().is_not_found());

        assert!(store.list().is_empty());
        assert!(store.deleted_ids().is_empty());
        assert_eq!(store.next_id(), 1);
        // 未变更就不写盘
        assert_eq!(store.into_storage().get(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_rename() {
        let mut store = empty_store();
        let id = store.add("old").unwrap();
        store.rename(id, "new").unwrap();
        assert_eq!(store.get(id).unwrap().description, "new");
    }

    #[test]
    fn test_search_case_insensitive_in_order() {
        let mut store = empty_store();
        store.add("Buy Milk").unwrap();
        store.add("Walk dog").unwrap();
        store.add("milkshake recipe").unwrap();

        let hits: Vec<u32> = store.search("milk").iter().map(|t| t.id).collect();
        assert_eq!(hits, vec![1, 3]);
        assert!(store.search("MILK").len() == 2);
        assert!(store.search("cat").is_empty());
    }

    #[test]
    fn test_every_mutation_persists() {
        let mut store = empty_store();
        store.add("a").unwrap();
        store.add("b").unwrap();
        store.toggle(1).unwrap();
        store.remove(2).unwrap();
        store.rename(1, "renamed").unwrap();

        let raw = store.into_storage().get(STORAGE_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "tasks": [{ "id": 1, "description": "renamed", "completed": true }],
                "nextId": 3,
                "deletedIds": [2]
            })
        );
    }

    #[test]
    fn test_round_trip() {
        let mut store = empty_store();
        store.add("one").unwrap();
        store.add("two").unwrap();
        store.add("three").unwrap();
        store.toggle(3).unwrap();
        store.remove(1).unwrap();

        let tasks = store.list().to_vec();
        let next_id = store.next_id();
        let deleted = store.deleted_ids().clone();

        let reloaded = TaskStore::load(store.into_storage()).unwrap();
        assert_eq!(reloaded.list(), tasks.as_slice());
        assert_eq!(reloaded.next_id(), next_id);
        assert_eq!(reloaded.deleted_ids(), &deleted);
    }

    #[test]
    fn test_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = TaskStore::load(FileStore::new(dir.path())).unwrap();
        store.add("persist me").unwrap();
        store.add("and me").unwrap();
        store.remove(1).unwrap();
        drop(store);

        let mut store = TaskStore::load(FileStore::new(dir.path())).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.add("reused").unwrap(), 1);
    }

    #[test]
    fn test_persisted_next_id_is_trusted() {
        let store = store_with(
            r#"{"tasks":[{"id":7,"description":"x","completed":false}],"nextId":3,"deletedIds":[]}"#,
        );
        assert_eq!(store.next_id(), 3);
    }

    #[test]
    fn test_missing_next_id_is_recomputed() {
        let store = store_with(
            r#"{"tasks":[{"id":4,"description":"a","completed":false},{"id":9,"description":"b","completed":true}]}"#,
        );
        assert_eq!(store.next_id(), 10);
        assert!(store.deleted_ids().is_empty());
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_non_array_tasks_resets_list() {
        let store = store_with(r#"{"tasks":"oops","nextId":5,"deletedIds":[2]}"#);
        assert!(store.list().is_empty());
        assert_eq!(store.next_id(), 5);
        assert_eq!(store.deleted_ids(), &VecDeque::from([2]));
    }

    #[test]
    fn test_garbage_record_is_tolerated() {
        let store = store_with("not json at all");
        assert!(store.list().is_empty());
        assert_eq!(store.next_id(), 1);

        let store = store_with(r#"{"tasks":[{"id":"x"}]}"#);
        assert!(store.list().is_empty());
        assert_eq!(store.next_id(), 1);
    }

    #[test]
    fn test_add_fails_cleanly_when_id_space_exhausted() {
        let mut store = store_with(r#"{"tasks":[],"nextId":4294967295,"deletedIds":[]}"#);
        assert_eq!(store.next_id(), u32::MAX);

        let err = store.add("x").unwrap_err();
        assert!(matches!(err, TaskError::InvalidData(_)));
        assert!(store.list().is_empty());
        assert_eq!(store.next_id(), u32::MAX);
        // 记录未被改写
        let raw = store.into_storage().get(STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains("4294967295"));
    }

    #[test]
    fn test_add_still_reuses_ids_when_counter_exhausted() {
        let mut store = store_with(r#"{"tasks":[],"nextId":4294967295,"deletedIds":[3]}"#);
        assert_eq!(store.add("reused").unwrap(), 3);
        assert!(store.add("fresh").is_err());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_max_task_id_without_next_id_is_tolerated() {
        let store = store_with(
            r#"{"tasks":[{"id":4294967295,"description":"edge","completed":false}]}"#,
        );
        assert!(store.list().is_empty());
        assert_eq!(store.next_id(), 1);
    }
}
