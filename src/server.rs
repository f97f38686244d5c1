use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use rmcp::{
    ErrorData, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{TrackerError, TrackerResult};
use crate::lifecycle::SubmissionInput;
use crate::tracker::{NewProject, Tracker};
use crate::types::{ProjectMode, SkillLevel, TaskDraft, WorkState};

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct ProjectArgs {
    pub project_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct DraftPlanArgs {
    pub description: String,
    #[serde(default)]
    pub mode: Option<ProjectMode>,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    /// Members besides the signed-in user, in prompt order.
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct AddPhaseArgs {
    pub project_id: String,
    pub title: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct AddTaskArgs {
    pub project_id: String,
    pub phase_id: String,
    #[serde(flatten)]
    pub task: TaskDraft,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct TaskArgs {
    pub project_id: String,
    pub task_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct TaskStatusArgs {
    pub project_id: String,
    pub task_id: String,
    pub status: WorkState,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SubmitTaskArgs {
    pub project_id: String,
    pub task_id: String,
    #[serde(flatten)]
    pub submission: SubmissionInput,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchArgs {
    pub project_id: String,
    pub query: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct SendInviteArgs {
    pub project_id: String,
    pub invitee_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct InviteArgs {
    pub invite_id: String,
}

impl From<TrackerError> for ErrorData {
    fn from(err: TrackerError) -> Self {
        let message = err.to_string();
        match &err {
            TrackerError::NotFound { kind, id } => ErrorData::resource_not_found(
                message,
                Some(json!({ "kind": kind.to_string(), "id": id })),
            ),
            TrackerError::PartialWrite { project_id, .. } => {
                ErrorData::internal_error(message, Some(json!({ "project_id": project_id })))
            }
            e if e.is_caller_error() => ErrorData::invalid_params(message, None),
            _ => ErrorData::internal_error(message, None),
        }
    }
}

fn json_result(value: impl Serialize) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::json(value)?]))
}

#[derive(Clone)]
pub struct TrackerServer {
    tracker: Arc<Mutex<Tracker>>,
    tool_router: ToolRouter<TrackerServer>,
}

#[tool_router]
impl TrackerServer {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            tool_router: Self::tool_router(),
        }
    }

    /// Runs a tracker operation on the blocking pool; backends do plain
    /// blocking I/O.
    async fn run<T, F>(&self, op: F) -> Result<T, ErrorData>
    where
        T: Send + 'static,
        F: FnOnce(&mut Tracker) -> TrackerResult<T> + Send + 'static,
    {
        let tracker = Arc::clone(&self.tracker);
        tokio::task::spawn_blocking(move || {
            let mut guard = tracker.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut guard)
        })
        .await
        .map_err(|e| ErrorData::internal_error(format!("tracker task failed: {e}"), None))?
        .map_err(ErrorData::from)
    }

    #[tool(description = "List the signed-in user's projects with progress, member count and streak")]
    async fn list_projects(&self) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(|t| t.dashboard()).await?)
    }

    #[tool(description = "Get a project with its phases, tasks, progress and per-phase breakdown")]
    async fn get_project(&self, Parameters(args): Parameters<ProjectArgs>) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(move |t| t.project_details(&args.project_id)).await?)
    }

    #[tool(description = "Create a project owned by the signed-in user, optionally with drafted phases")]
    async fn create_project(&self, Parameters(args): Parameters<NewProject>) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(move |t| t.create_project(args)).await?)
    }

    #[tool(description = "Draft a first project plan with AI without saving it")]
    async fn draft_project_plan(
        &self,
        Parameters(args): Parameters<DraftPlanArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let drafts = self
            .run(move |t| t.draft_project_plan(&args.description, args.mode, args.skill_level, &args.member_ids))
            .await?;
        json_result(drafts)
    }

    #[tool(description = "Draft the next phase of a project with AI and append it")]
    async fn draft_next_phase(&self, Parameters(args): Parameters<ProjectArgs>) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(move |t| t.draft_next_phase(&args.project_id)).await?)
    }

    #[tool(description = "Add an empty phase to a project")]
    async fn add_phase(&self, Parameters(args): Parameters<AddPhaseArgs>) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(move |t| t.add_phase(&args.project_id, &args.title)).await?)
    }

    #[tool(description = "Add a pending task to a phase; the assignee defaults to the project owner")]
    async fn add_task(&self, Parameters(args): Parameters<AddTaskArgs>) -> Result<CallToolResult, ErrorData> {
        json_result(
            self.run(move |t| t.add_task(&args.project_id, &args.phase_id, args.task))
                .await?,
        )
    }

    #[tool(description = "Delete a task; deleting a missing task is not an error")]
    async fn delete_task(&self, Parameters(args): Parameters<TaskArgs>) -> Result<CallToolResult, ErrorData> {
        let task_id = args.task_id.clone();
        let deleted = self.run(move |t| t.delete_task(&args.project_id, &args.task_id)).await?;
        json_result(json!({ "task_id": task_id, "deleted": deleted }))
    }

    #[tool(description = "Move a task to pending, in_progress or backlog")]
    async fn update_task_status(
        &self,
        Parameters(args): Parameters<TaskStatusArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        json_result(
            self.run(move |t| t.set_task_status(&args.project_id, &args.task_id, args.status))
                .await?,
        )
    }

    #[tool(description = "Complete a task with its proof-of-work submission")]
    async fn submit_task(&self, Parameters(args): Parameters<SubmitTaskArgs>) -> Result<CallToolResult, ErrorData> {
        json_result(
            self.run(move |t| t.submit_task(&args.project_id, &args.task_id, args.submission))
                .await?,
        )
    }

    #[tool(description = "Search users to invite; current members are left out")]
    async fn search_invitees(&self, Parameters(args): Parameters<SearchArgs>) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(move |t| t.search_invitees(&args.project_id, &args.query)).await?)
    }

    #[tool(description = "Invite a user to a project")]
    async fn send_invite(&self, Parameters(args): Parameters<SendInviteArgs>) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(move |t| t.send_invite(&args.project_id, &args.invitee_id)).await?)
    }

    #[tool(description = "List pending invites addressed to the signed-in user")]
    async fn list_invites(&self) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(|t| t.pending_invites()).await?)
    }

    #[tool(description = "Accept an invite and join its project")]
    async fn accept_invite(&self, Parameters(args): Parameters<InviteArgs>) -> Result<CallToolResult, ErrorData> {
        let invite_id = args.invite_id.clone();
        let response = self.run(move |t| t.accept_invite(&args.invite_id)).await?;
        json_result(json!({ "invite_id": invite_id, "response": response }))
    }

    #[tool(description = "Decline an invite")]
    async fn decline_invite(&self, Parameters(args): Parameters<InviteArgs>) -> Result<CallToolResult, ErrorData> {
        let invite_id = args.invite_id.clone();
        let response = self.run(move |t| t.decline_invite(&args.invite_id)).await?;
        json_result(json!({ "invite_id": invite_id, "response": response }))
    }

    #[tool(description = "Completed and backlog totals, activity for the last 7 days and pending invites")]
    async fn profile_stats(&self) -> Result<CallToolResult, ErrorData> {
        json_result(self.run(|t| t.profile_stats(&Local::now())).await?)
    }
}

#[tool_handler]
impl ServerHandler for TrackerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "DevStreak project tracker: plan phases, track tasks, submit proof of work and manage invites"
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;

    fn server() -> TrackerServer {
        let mut store = FileStore::in_memory();
        let alex = store.create_user("alex_dev").unwrap();
        TrackerServer::new(Tracker::new(store.with_current_user(alex.id)))
    }

    #[test]
    fn errors_map_to_protocol_codes() {
        let err = ErrorData::from(TrackerError::not_found(crate::error::EntityKind::Task, "t9"));
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
        assert_eq!(err.message, "task not found: t9");

        let err = ErrorData::from(TrackerError::Duplicate("already invited".to_string()));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let err = ErrorData::from(TrackerError::upstream("gemini", "HTTP 429"));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn tools_run_against_the_tracker() {
        let server = server();
        assert!(server.get_info().capabilities.tools.is_some());

        let project = server
            .run(|t| {
                t.create_project(NewProject {
                    name: "Shop".to_string(),
                    description: "A store".to_string(),
                    ..Default::default()
                })
            })
            .await
            .unwrap();
        let summaries = server.run(|t| t.dashboard()).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, project.id);

        let missing = server
            .get_project(Parameters(ProjectArgs {
                project_id: "nope".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(missing.code, ErrorCode::RESOURCE_NOT_FOUND);

        let no_ai = server
            .draft_next_phase(Parameters(ProjectArgs {
                project_id: project.id.clone(),
            }))
            .await
            .unwrap_err();
        assert_eq!(no_ai.code, ErrorCode::INVALID_PARAMS);

        assert!(server.list_projects().await.is_ok());
    }

    #[test]
    fn task_arguments_flatten_the_draft() {
        let args: AddTaskArgs = serde_json::from_value(json!({
            "project_id": "p1",
            "phase_id": "ph1",
            "title": "Auth",
        }))
        .unwrap();
        assert_eq!(args.task.title, "Auth");
        assert_eq!(args.task.assignee_id, None);

        let args: TaskStatusArgs = serde_json::from_value(json!({
            "project_id": "p1",
            "task_id": "t1",
            "status": "in_progress",
        }))
        .unwrap();
        assert_eq!(args.status, WorkState::InProgress);
    }
}
