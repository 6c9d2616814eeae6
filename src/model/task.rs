use chrono::{DateTime, FixedOffset, Utc};
use rocket::{
    serde::json::{serde_json, Value},
    FromFormField,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        fields::{iso_time, Timestamps},
        ownership::{Named, Owned, Ownership},
        store::Document,
    },
};

/// Tasks flip between these two states; neither is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Done,
    #[default]
    #[serde(other)]
    Pending,
}

impl TaskStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Done,
            Self::Done => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Meeting,
    Visit,
    Content,
    Event,
    #[default]
    #[serde(other)]
    Other,
}

/// A scheduled campaign activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao", default)]
    pub description: String,
    #[serde(rename = "tipo", default)]
    pub kind: TaskKind,
    /// Local date, `DD/MM/YYYY`.
    #[serde(rename = "data", default)]
    pub date: String,
    /// Local time, `HH:MM`.
    #[serde(default)]
    pub time: String,
    #[serde(default, with = "iso_time", skip_serializing_if = "Option::is_none")]
    pub full_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(flatten)]
    pub owner: Ownership,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

impl Document for Task {
    const COLLECTION: &'static str = "tarefas";
}

impl Owned for Task {
    fn ownership(&self) -> &Ownership {
        &self.owner
    }
}

impl Named for Task {
    const NAME: &'static str = "Task";
}

impl Task {
    /// Pending and scheduled before `now`. Unscheduled tasks are never overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.full_date.is_some_and(|at| at < now)
    }
}

/// Task fields as submitted by the app.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskForm {
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: Option<TaskKind>,
    pub full_date: Option<DateTime<Utc>>,
}

/// The stored shape of a task update.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskPatch {
    #[serde(rename = "titulo", skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "descricao", skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "tipo", skip_serializing_if = "Option::is_none")]
    kind: Option<TaskKind>,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(with = "iso_time", skip_serializing_if = "Option::is_none")]
    full_date: Option<DateTime<Utc>>,
    #[serde(with = "iso_time")]
    updated_at: Option<DateTime<Utc>>,
}

/// Local date and time of an instant, as shown in the app.
fn local_date_time(at: DateTime<Utc>, tz: FixedOffset) -> (String, String) {
    let local = at.with_timezone(&tz);
    (
        local.format("%d/%m/%Y").to_string(),
        local.format("%H:%M").to_string(),
    )
}

impl TaskForm {
    fn normalize(mut self) -> Result<Self> {
        if let Some(title) = &mut self.title {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err(Error::bad_request("Task title cannot be empty"));
            }
        }
        if let Some(description) = &mut self.description {
            *description = description.trim().to_string();
        }
        Ok(self)
    }

    /// A new pending task. The title is required.
    pub fn into_task(self, owner: Ownership, tz: FixedOffset, now: DateTime<Utc>) -> Result<Task> {
        let form = self.normalize()?;
        let title = form
            .title
            .ok_or_else(|| Error::bad_request("Task title is required"))?;
        let (date, time) = match form.full_date {
            Some(at) => local_date_time(at, tz),
            None => Default::default(),
        };
        Ok(Task {
            title,
            description: form.description.unwrap_or_default(),
            kind: form.kind.unwrap_or_default(),
            date,
            time,
            full_date: form.full_date,
            status: TaskStatus::Pending,
            owner,
            stamps: Timestamps::created(now),
        })
    }

    /// The fields to merge into an existing task. Rescheduling rewrites the
    /// displayed date and time too.
    pub fn into_patch(self, tz: FixedOffset, now: DateTime<Utc>) -> Result<Value> {
        let form = self.normalize()?;
        let (date, time) = form.full_date.map(|at| local_date_time(at, tz)).unzip();
        let patch = TaskPatch {
            title: form.title,
            description: form.description,
            kind: form.kind,
            date,
            time,
            full_date: form.full_date,
            updated_at: Some(now),
        };
        Ok(serde_json::to_value(patch)?)
    }
}

/// A remark left on a task, stored under `tarefas/{task}/comentarios`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub text: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, with = "iso_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Document for Comment {
    const COLLECTION: &'static str = "comentarios";
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn into_comment(self, user_id: &str, user_name: &str, now: DateTime<Utc>) -> Result<Comment> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(Error::bad_request("Comment cannot be empty"));
        }
        Ok(Comment {
            text: text.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            created_at: Some(now),
        })
    }
}
