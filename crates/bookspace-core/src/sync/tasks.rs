//! Shared task store: optimistic mutation with rollback.
//!
//! Tasks bypass the debounced workspace push entirely. Every mutation is
//! applied to the local list first so the UI never waits on the network,
//! then written through immediately; a failed write undoes the local
//! change and surfaces the error. Live snapshots from the remote replace
//! the list wholesale.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::gateway::CollectionGateway;
use crate::error::Result;
use crate::models::{Task, UserId};

/// Handle to the workspace-wide task collection.
#[derive(Clone)]
pub struct TaskStore {
    gateway: CollectionGateway,
    owner: UserId,
    tasks: Arc<watch::Sender<Vec<Task>>>,
}

impl TaskStore {
    #[must_use]
    pub fn new(gateway: CollectionGateway, owner: UserId) -> Self {
        let (tasks, _) = watch::channel(Vec::new());
        Self {
            gateway,
            owner,
            tasks: Arc::new(tasks),
        }
    }

    /// The signed-in user this store mutates on behalf of.
    #[must_use]
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Fetch the full task list from the remote store.
    pub async fn load(&self) -> Result<()> {
        let tasks = self.gateway.load_tasks().await?;
        self.tasks.send_replace(tasks);
        Ok(())
    }

    /// A point-in-time copy of the task list.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }

    /// Watch task list replacements.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Vec<Task>> {
        self.tasks.subscribe()
    }

    /// Create a task. It appears in the local list before the remote
    /// write; a failed write removes it again.
    pub async fn create(&self, mut task: Task) -> Result<Task> {
        let now = self.gateway.server_time_millis();
        if task.created_at == 0 {
            task.created_at = now;
        }
        task.updated_at = now;
        let creator = task.created_by.clone();
        task.normalize_sharing(&creator);

        self.tasks.send_modify(|list| list.push(task.clone()));
        if let Err(error) = self.gateway.save_task(&task).await {
            let id = task.id.clone();
            self.tasks.send_modify(|list| list.retain(|item| item.id != id));
            return Err(error);
        }
        Ok(task)
    }

    /// Replace a task with an edited copy. Sharing is recomputed and
    /// `updatedAt` restamped; a failed write restores the previous copy.
    pub async fn update(&self, mut task: Task) -> Result<Task> {
        task.updated_at = self.gateway.server_time_millis();
        let creator = task.created_by.clone();
        task.normalize_sharing(&creator);

        let mut previous = None;
        self.tasks.send_modify(|list| {
            if let Some(slot) = list.iter_mut().find(|item| item.id == task.id) {
                previous = Some(std::mem::replace(slot, task.clone()));
            } else {
                list.push(task.clone());
            }
        });
        if let Err(error) = self.gateway.save_task(&task).await {
            let id = task.id.clone();
            self.tasks.send_modify(|list| match previous {
                Some(previous) => {
                    if let Some(slot) = list.iter_mut().find(|item| item.id == id) {
                        *slot = previous;
                    }
                }
                None => list.retain(|item| item.id != id),
            });
            return Err(error);
        }
        Ok(task)
    }

    /// Hard-delete by id. Unlike the entity collections there is no
    /// tombstone; a failed remote delete puts the task back.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut removed = None;
        self.tasks.send_modify(|list| {
            if let Some(index) = list.iter().position(|item| item.id == id) {
                removed = Some((index, list.remove(index)));
            }
        });
        let Some((index, task)) = removed else {
            return Ok(());
        };

        if let Err(error) = self.gateway.delete_task(&task).await {
            self.tasks.send_modify(|list| {
                let index = index.min(list.len());
                list.insert(index, task);
            });
            return Err(error);
        }
        Ok(())
    }

    /// Replace the list with a remote snapshot; a no-op when unchanged.
    pub fn apply_remote(&self, tasks: Vec<Task>) {
        self.tasks.send_if_modified(|list| {
            if *list == tasks {
                false
            } else {
                *list = tasks;
                true
            }
        });
    }

    /// Start live snapshot intake from the remote store.
    pub async fn subscribe(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.gateway.subscribe_tasks(tx).await?;
        let store = self.clone();
        tokio::spawn(async move {
            while let Some(tasks) = rx.recv().await {
                store.apply_remote(tasks);
            }
            tracing::debug!("task intake ended");
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::models::TaskStatus;
    use crate::remote::{MemoryRemote, RemoteStore as _};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn store() -> (Arc<MemoryRemote>, TaskStore) {
        let remote = Arc::new(MemoryRemote::new());
        let gateway = CollectionGateway::new(
            Arc::<MemoryRemote>::clone(&remote),
            SyncConfig::for_workspace("acme"),
        );
        (remote, TaskStore::new(gateway, UserId::from("u1")))
    }

    #[tokio::test]
    async fn create_persists_and_appears_locally() {
        let (remote, tasks) = store();
        remote.set_server_time(1_000);

        let task = tasks
            .create(Task::new(UserId::from("u1"), "Llamar a Ana", 0))
            .await
            .unwrap();

        assert_eq!(task.created_at, 1_000);
        assert_eq!(task.updated_at, 1_000);
        assert_eq!(task.shared_with, vec![UserId::from("u1")]);
        assert_eq!(tasks.tasks().len(), 1);

        let docs = remote.documents("tasks");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, format!("u1_{}", task.id));
    }

    #[tokio::test]
    async fn update_recomputes_sharing_and_restamps() {
        let (remote, tasks) = store();
        remote.set_server_time(1_000);
        let mut task = tasks
            .create(Task::new(UserId::from("u1"), "Preparar propuesta", 0))
            .await
            .unwrap();

        remote.set_server_time(2_000);
        task.status = TaskStatus::Done;
        task.assignees = vec![UserId::from("u2")];
        let updated = tasks.update(task).await.unwrap();

        assert_eq!(updated.updated_at, 2_000);
        assert_eq!(
            updated.shared_with,
            vec![UserId::from("u1"), UserId::from("u2")]
        );
        assert_eq!(tasks.tasks()[0].status, TaskStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_rolls_back_local_list() {
        let (remote, tasks) = store();
        remote.fail_next_writes(3, true);

        let result = tasks
            .create(Task::new(UserId::from("u1"), "nunca llega", 0))
            .await;

        assert!(result.is_err());
        assert!(tasks.tasks().is_empty());
        assert!(remote.documents("tasks").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delete_restores_the_task() {
        let (remote, tasks) = store();
        let task = tasks
            .create(Task::new(UserId::from("u1"), "persistente", 0))
            .await
            .unwrap();

        remote.fail_next_writes(3, true);
        assert!(tasks.remove(&task.id).await.is_err());

        assert_eq!(tasks.tasks().len(), 1);
        assert_eq!(remote.documents("tasks").len(), 1);
    }

    #[tokio::test]
    async fn delete_is_a_hard_remove() {
        let (remote, tasks) = store();
        let task = tasks
            .create(Task::new(UserId::from("u1"), "efímera", 0))
            .await
            .unwrap();

        tasks.remove(&task.id).await.unwrap();
        assert!(tasks.tasks().is_empty());
        assert!(remote.documents("tasks").is_empty());

        // Unknown ids are a no-op, not an error.
        tasks.remove("missing").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_replaces_the_list() {
        let (remote, tasks) = store();
        tasks.subscribe().await.unwrap();

        let other = Task::new(UserId::from("u2"), "Revisar factura", 5);
        remote
            .upsert_document(
                "tasks",
                &format!("u2_{}", other.id),
                other.to_map().unwrap(),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let list = tasks.tasks();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "Revisar factura");
        assert_eq!(list[0].created_by, UserId::from("u2"));
    }
}
