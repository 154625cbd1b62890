//! Per-connection subscription registry and the rules for who may
//! subscribe to what.

use std::collections::HashMap;

use uuid::Uuid;

use foodlink_types::events::{ChangeEvent, EventFilter, RowFilter, Table};
use foodlink_types::models::{Role, VolunteerTask};

/// The authenticated user behind a gateway connection.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub table: Table,
    pub event: EventFilter,
    pub filter: Option<RowFilter>,
}

impl Subscription {
    pub fn matches(&self, change: &ChangeEvent) -> bool {
        self.table == change.table
            && self.event.accepts(change.kind)
            && self.filter.as_ref().is_none_or(|f| f.matches(&change.record))
    }
}

/// Subscriptions keyed by the client-chosen id.
#[derive(Debug, Default)]
pub struct Subscriptions {
    by_id: HashMap<String, Subscription>,
}

impl Subscriptions {
    /// Insert, replacing any subscription with the same id.
    pub fn insert(&mut self, id: String, sub: Subscription) {
        self.by_id.insert(id, sub);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.by_id.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Ids of every subscription the change should be delivered to.
    pub fn matching(&self, change: &ChangeEvent) -> Vec<String> {
        let mut ids: Vec<String> = self
            .by_id
            .iter()
            .filter(|(_, sub)| sub.matches(change))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Drop the chat subscriptions scoped to `task` once `user_id` no longer
    /// takes part in it. Returns the dropped ids.
    pub fn revoke_chat(&mut self, task: &VolunteerTask, user_id: Uuid) -> Vec<String> {
        if task.is_participant(user_id) {
            return Vec::new();
        }
        let mut revoked: Vec<String> = self
            .by_id
            .iter()
            .filter(|(_, sub)| {
                sub.table == Table::ChatMessages && chat_task_id(sub.filter.as_ref()) == Some(task.id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        revoked.sort();
        for id in &revoked {
            self.by_id.remove(id);
        }
        revoked
    }
}

/// Task id a chat subscription is scoped to, if the filter names one.
pub fn chat_task_id(filter: Option<&RowFilter>) -> Option<Uuid> {
    filter
        .filter(|f| f.column == "task_id")
        .and_then(|f| f.value.parse().ok())
}

/// Decide whether `who` may open the subscription. `task` is the task named by
/// a chat subscription's filter, looked up by the caller.
pub fn authorize(
    who: &Identity,
    table: Table,
    filter: Option<&RowFilter>,
    task: Option<&VolunteerTask>,
) -> Result<(), String> {
    match table {
        Table::ChatMessages => {
            if chat_task_id(filter).is_none() {
                return Err("chat_messages subscriptions must filter on task_id".into());
            }
            match task {
                Some(task) if task.is_participant(who.user_id) => Ok(()),
                Some(_) => Err("not a participant in this task".into()),
                None => Err("task not found".into()),
            }
        }
        Table::NgoVerifications => {
            let own = filter
                .is_some_and(|f| f.column == "user_id" && f.value == who.user_id.to_string());
            if who.role == Role::Admin || own {
                Ok(())
            } else {
                Err("only admins may watch other organisations' verifications".into())
            }
        }
        _ => Ok(()),
    }
}
