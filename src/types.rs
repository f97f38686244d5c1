use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub fn default_avatar_url(username: &str) -> String {
    let name = if username.is_empty() { "User" } else { username };
    format!("https://ui-avatars.com/api/?name={name}&background=random")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
    /// Consecutive-day activity count, maintained outside this crate.
    #[serde(default)]
    pub streak: u32,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: id.into(),
            avatar_url: default_avatar_url(&username),
            username,
            streak: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ProjectMode {
    #[serde(rename = "Learn & Develop")]
    LearnAndDevelop,
    #[serde(rename = "Direct Develop")]
    DirectDevelop,
}

impl ProjectMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectMode::LearnAndDevelop => "Learn & Develop",
            ProjectMode::DirectDevelop => "Direct Develop",
        }
    }
}

impl fmt::Display for ProjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "learn & develop" | "learn_and_develop" | "learn" => Ok(ProjectMode::LearnAndDevelop),
            "direct develop" | "direct_develop" | "direct" => Ok(ProjectMode::DirectDevelop),
            _ => Err(format!("Unknown project mode: {s}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    /// Used with direct-develop projects.
    #[serde(rename = "None")]
    Unspecified,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
            SkillLevel::Unspecified => "None",
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            "none" | "" => Ok(SkillLevel::Unspecified),
            _ => Err(format!("Unknown skill level: {s}")),
        }
    }
}

/// Proof-of-work recorded when a task is submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Submission {
    /// RFC 3339 timestamp.
    pub completed_at: String,
    #[serde(default)]
    pub proof_image_ref: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub description: String,
    /// Free-text "any backlogs?" answer; non-empty means an unresolved blocker.
    #[serde(default)]
    pub blocker_note: String,
}

/// Task state. Completion metadata only exists on `Completed`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Backlog,
    Completed(Submission),
}

impl TaskStatus {
    /// Label used by the hosted backend and shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Backlog => "Backlog",
            TaskStatus::Completed(_) => "Completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed(_))
    }

    pub fn submission(&self) -> Option<&Submission> {
        match self {
            TaskStatus::Completed(submission) => Some(submission),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The statuses a task can be moved to directly; `Completed` requires a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    Pending,
    InProgress,
    Backlog,
}

impl From<WorkState> for TaskStatus {
    fn from(state: WorkState) -> Self {
        match state {
            WorkState::Pending => TaskStatus::Pending,
            WorkState::InProgress => TaskStatus::InProgress,
            WorkState::Backlog => TaskStatus::Backlog,
        }
    }
}

impl FromStr for WorkState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "pending" => Ok(WorkState::Pending),
            "in progress" => Ok(WorkState::InProgress),
            "backlog" => Ok(WorkState::Backlog),
            _ => Err(format!("Unknown task status: {s}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub assignee_id: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl Task {
    /// Backlog status and a non-empty blocker note are independent signals;
    /// either one marks the task.
    pub fn has_blocker(&self) -> bool {
        match &self.status {
            TaskStatus::Backlog => true,
            TaskStatus::Completed(submission) => !submission.blocker_note.is_empty(),
            _ => false,
        }
    }
}

/// Input for adding a task by hand.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to the project owner.
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Phase {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Presentation hint only.
    #[serde(default)]
    pub expanded: bool,
}

impl Phase {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tasks: Vec::new(),
            expanded: true,
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub repo_url: Option<String>,
    pub owner_id: String,
    /// Always contains the owner.
    #[serde(default)]
    pub members: Vec<User>,
    pub created_at: String,
    #[serde(default)]
    pub mode: Option<ProjectMode>,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Project {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.id == user_id)
    }

    pub fn member(&self, user_id: &str) -> Option<&User> {
        self.members.iter().find(|m| m.id == user_id)
    }

    /// Adds `user` unless already present. Returns whether the member set changed.
    pub fn add_member(&mut self, user: User) -> bool {
        if self.is_member(&user.id) {
            return false;
        }
        self.members.push(user);
        true
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases.iter().flat_map(|phase| phase.tasks.iter())
    }

    pub fn phase(&self, phase_id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == phase_id)
    }

    pub fn phase_mut(&mut self, phase_id: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.id == phase_id)
    }

    /// Finds a task and the phase holding it.
    pub fn locate_task(&self, task_id: &str) -> Option<(&Phase, &Task)> {
        self.phases
            .iter()
            .find_map(|phase| phase.task(task_id).map(|task| (phase, task)))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteStatus::Pending)
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "declined" => Ok(InviteStatus::Declined),
            _ => Err(format!("Unknown invite status: {s}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Invite {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub inviter_id: String,
    pub inviter_name: String,
    pub invitee_id: String,
    #[serde(default)]
    pub status: InviteStatus,
}
