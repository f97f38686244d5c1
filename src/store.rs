//! Collaborator seams: where projects live and who the user is.
//!
//! Implementations are plain blocking calls. Async callers move them onto a
//! blocking thread (see `server.rs`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::TrackerResult;
use crate::types::{Invite, InviteStatus, Phase, Project, ProjectMode, SkillLevel, Task, TaskStatus, User};

/// Upper bound on `Identity::search_users` results.
pub const SEARCH_LIMIT: usize = 10;

/// Row-level fields for a new project. Members, phases and tasks are written
/// separately.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub name: String,
    pub description: String,
    pub repo_url: Option<String>,
    pub owner_id: String,
    pub mode: Option<ProjectMode>,
    pub skill_level: Option<SkillLevel>,
}

/// Partial task update. `None` leaves a field as it is.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    /// Replaces the status and its submission in one write.
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

pub trait Store {
    fn fetch_projects_for_user(&self, user_id: &str) -> TrackerResult<Vec<Project>>;

    fn fetch_project(&self, project_id: &str) -> TrackerResult<Option<Project>>;

    fn create_project(&mut self, spec: &ProjectSpec) -> TrackerResult<Project>;

    /// Adding an existing member is not an error.
    fn add_member(&mut self, project_id: &str, user_id: &str) -> TrackerResult<()>;

    fn add_phase(&mut self, project_id: &str, title: &str) -> TrackerResult<Phase>;

    /// Stores `task` under `phase_id`, returning it as persisted.
    fn add_task(&mut self, phase_id: &str, task: &Task) -> TrackerResult<Task>;

    fn update_task(&mut self, task_id: &str, update: &TaskUpdate) -> TrackerResult<()>;

    /// Deleting an absent task is not an error.
    fn delete_task(&mut self, task_id: &str) -> TrackerResult<()>;

    /// Fails with `Duplicate` when a pending invite for the same project and
    /// invitee already exists.
    fn create_invite(&mut self, project_id: &str, inviter_id: &str, invitee_id: &str) -> TrackerResult<Invite>;

    fn update_invite_status(&mut self, invite_id: &str, status: InviteStatus) -> TrackerResult<()>;

    fn fetch_invite(&self, invite_id: &str) -> TrackerResult<Option<Invite>>;

    /// Every invite on record for a project, any status.
    fn invites_for_project(&self, project_id: &str) -> TrackerResult<Vec<Invite>>;

    fn pending_invites_for_user(&self, user_id: &str) -> TrackerResult<Vec<Invite>>;
}

pub trait Identity {
    fn current_user(&self) -> TrackerResult<Option<User>>;

    fn fetch_user(&self, user_id: &str) -> TrackerResult<Option<User>>;

    /// Case-insensitive substring match on the username, at most
    /// [`SEARCH_LIMIT`] results.
    fn search_users(&self, query: &str) -> TrackerResult<Vec<User>>;
}

/// Everything the tracker needs from its backend.
pub trait Backend: Store + Identity + Send {}

impl<T: Store + Identity + Send> Backend for T {}
