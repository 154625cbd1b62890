use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Notification, Role};

/// Tables exposed on the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Donations,
    VolunteerTasks,
    ChatMessages,
    Ratings,
    Wishlists,
    NgoVerifications,
    Profiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    #[serde(rename = "*")]
    All,
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

impl EventFilter {
    pub fn accepts(self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (EventFilter::All, _)
                | (EventFilter::Insert, ChangeKind::Insert)
                | (EventFilter::Update, ChangeKind::Update)
                | (EventFilter::Delete, ChangeKind::Delete)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("filter must look like column=eq.value")]
    Malformed,
    #[error("unsupported filter operator '{0}', only eq is supported")]
    UnsupportedOperator(String),
}

/// Row-level filter in `column=eq.value` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn equals(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let (column, rest) = raw.split_once('=').ok_or(FilterError::Malformed)?;
        let (op, value) = rest.split_once('.').ok_or(FilterError::Malformed)?;

        if column.is_empty() || value.is_empty() {
            return Err(FilterError::Malformed);
        }
        if op != "eq" {
            return Err(FilterError::UnsupportedOperator(op.to_string()));
        }

        Ok(Self::equals(column, value))
    }

    /// Compare against a serialized row. Scalars are compared by their text form.
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        match record.get(&self.column) {
            Some(serde_json::Value::String(s)) => *s == self.value,
            Some(serde_json::Value::Number(n)) => n.to_string() == self.value,
            Some(serde_json::Value::Bool(b)) => b.to_string() == self.value,
            _ => false,
        }
    }
}

impl TryFrom<String> for RowFilter {
    type Error = FilterError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        RowFilter::parse(&raw)
    }
}

impl From<RowFilter> for String {
    fn from(filter: RowFilter) -> Self {
        format!("{}=eq.{}", filter.column, filter.value)
    }
}

/// A committed row change, published by the API after every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: serde_json::Value,
}

impl ChangeEvent {
    pub fn new<T: Serialize>(table: Table, kind: ChangeKind, row: &T) -> Self {
        Self {
            table,
            kind,
            record: serde_json::to_value(row).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, role: Role },

    /// A subscription was registered (or replaced)
    Subscribed { id: String },

    /// A subscription was refused
    SubscriptionRejected { id: String, reason: String },

    /// A row matching one of the client's subscriptions changed
    Change {
        subscription: String,
        table: Table,
        kind: ChangeKind,
        record: serde_json::Value,
    },

    /// A notification was created for this user
    Notification(Notification),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Listen for changes on a table, optionally narrowed by a row filter
    Subscribe {
        id: String,
        table: Table,
        #[serde(default = "default_event_filter")]
        event: EventFilter,
        #[serde(default)]
        filter: Option<RowFilter>,
    },

    /// Drop a subscription by id
    Unsubscribe { id: String },
}

fn default_event_filter() -> EventFilter {
    EventFilter::All
}
