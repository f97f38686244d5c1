//! AI-assisted phase planning: prompts, response parsing, and turning drafts
//! into tasks for a concrete team.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::LazyLock;

use crate::error::{TrackerError, TrackerResult};
use crate::lifecycle::new_id;
use crate::types::{Project, ProjectMode, SkillLevel, Task, TaskStatus, User};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("code fence pattern"));

pub const FIRST_PHASE_PROMPT: &str = r#"You are an expert Project Manager and Technical Tech Lead.
Your goal is to break down a software project idea into concrete, actionable phases and tasks.

Context:
- Mode: {mode} (If 'Learn & Develop', focus on educational steps first. If 'Direct Develop', focus on shipping features).
- Skill Level: {skill} (Adjust technical complexity).
- Team Members (by index): {members}.

Requirements:
- Create ONLY the FIRST PHASE (e.g., "Month 1" or "Phase 1: MVP Core"). Do NOT generate the whole project at once.
- Inside this phase, list specific tasks.
- Assign tasks effectively among the team members available using their index.
- Return PURE JSON matching the schema."#;

pub const NEXT_PHASE_PROMPT: &str = r#"You are an expert Project Manager.
The project has already completed these phases: {existing}.

Context:
- Mode: {mode}
- Skill Level: {skill}
- Team Members: {members}

Requirements:
- Generate ONLY the NEXT single phase (e.g., if "Month 1" is done, generate "Month 2").
- Provide concrete tasks for this next phase.
- Return PURE JSON array containing just this one new phase object."#;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Position in the member list; 0 is the owner.
    #[serde(default, alias = "assignee_index")]
    pub assignee_index: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PhaseDraft {
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<DraftTask>,
}

/// Everything a drafter is told about the project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftRequest {
    pub description: String,
    pub mode: ProjectMode,
    pub skill_level: SkillLevel,
    /// Usernames, owner first.
    pub members: Vec<String>,
    /// Titles of phases already planned. Empty asks for the first phase.
    pub existing_phases: Vec<String>,
}

impl DraftRequest {
    pub fn new(
        description: impl Into<String>,
        mode: Option<ProjectMode>,
        skill_level: Option<SkillLevel>,
        members: &[User],
    ) -> Self {
        Self {
            description: description.into(),
            mode: mode.unwrap_or(ProjectMode::DirectDevelop),
            skill_level: skill_level.unwrap_or(SkillLevel::Unspecified),
            members: members.iter().map(|m| m.username.clone()).collect(),
            existing_phases: Vec::new(),
        }
    }

    /// Request for the phase after the ones `project` already has.
    pub fn next_phase_for(project: &Project) -> Self {
        let members = owner_first(project);
        let mut request = Self::new(project.description.clone(), project.mode, project.skill_level, &members);
        request.existing_phases = project.phases.iter().map(|p| p.title.clone()).collect();
        request
    }

    pub fn is_first_phase(&self) -> bool {
        self.existing_phases.is_empty()
    }

    fn member_list(&self) -> String {
        self.members
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{i}: {name}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn system_instruction(&self) -> String {
        let template = if self.is_first_phase() {
            FIRST_PHASE_PROMPT
        } else {
            NEXT_PHASE_PROMPT
        };
        template
            .replace("{existing}", &self.existing_phases.join(", "))
            .replace("{mode}", self.mode.as_str())
            .replace("{skill}", self.skill_level.as_str())
            .replace("{members}", &self.member_list())
    }

    pub fn prompt(&self) -> String {
        if self.is_first_phase() {
            format!("Project Description: {}", self.description)
        } else {
            format!("Project Description: {}. Generate the next phase.", self.description)
        }
    }
}

/// Seam for the generative-AI collaborator.
pub trait PhaseDrafter: Send {
    fn name(&self) -> &str;

    fn draft(&self, request: &DraftRequest) -> TrackerResult<Vec<PhaseDraft>>;
}

/// Schema the model is asked to answer with: an array of phases.
pub fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING", "description": "e.g., 'Month 1: Foundation' or 'Phase 1: Setup'" },
                "tasks": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": { "type": "STRING" },
                            "description": { "type": "STRING" },
                            "assigneeIndex": {
                                "type": "INTEGER",
                                "description": "Index of the member in the provided members list to assign this task to. 0 for owner."
                            }
                        },
                        "required": ["title", "description", "assigneeIndex"]
                    }
                }
            },
            "required": ["title", "tasks"]
        }
    })
}

/// Parses model output into phase drafts. Accepts a bare array, a single
/// phase object, or either wrapped in a Markdown code fence. Phases and tasks
/// without a title are dropped.
pub fn parse_phase_drafts(text: &str) -> TrackerResult<Vec<PhaseDraft>> {
    let body = CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();
    if body.is_empty() {
        return Err(TrackerError::upstream("drafting", "empty response"));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| TrackerError::upstream("drafting", format!("response is not JSON: {e}")))?;
    let drafts: Vec<PhaseDraft> = match value {
        Value::Array(_) => serde_json::from_value::<Vec<PhaseDraft>>(value),
        Value::Object(_) => serde_json::from_value::<PhaseDraft>(value).map(|draft| vec![draft]),
        other => {
            return Err(TrackerError::upstream(
                "drafting",
                format!("expected a phase list, got {other}"),
            ));
        }
    }
    .map_err(|e| TrackerError::upstream("drafting", format!("unexpected phase shape: {e}")))?;

    Ok(drafts
        .into_iter()
        .filter(|phase| !phase.title.trim().is_empty())
        .map(|mut phase| {
            phase.title = phase.title.trim().to_string();
            phase.tasks.retain(|t| !t.title.trim().is_empty());
            phase
        })
        .collect())
}

/// Members in prompt order: owner first, then the rest as stored.
pub fn owner_first(project: &Project) -> Vec<User> {
    let mut members: Vec<User> = project
        .members
        .iter()
        .filter(|m| m.id == project.owner_id)
        .cloned()
        .collect();
    members.extend(project.members.iter().filter(|m| m.id != project.owner_id).cloned());
    members
}

/// Resolves a drafted assignee index; anything out of range goes to the owner.
pub fn assignee_for(index: i64, members: &[User], owner_id: &str) -> String {
    usize::try_from(index)
        .ok()
        .and_then(|i| members.get(i))
        .map(|m| m.id.clone())
        .unwrap_or_else(|| owner_id.to_string())
}

/// A drafted phase with concrete pending tasks, ready to be stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedPhase {
    pub title: String,
    pub tasks: Vec<Task>,
}

pub fn plan_phases(drafts: &[PhaseDraft], members: &[User], owner_id: &str) -> Vec<PlannedPhase> {
    drafts
        .iter()
        .map(|phase| PlannedPhase {
            title: phase.title.clone(),
            tasks: phase
                .tasks
                .iter()
                .map(|t| Task {
                    id: new_id(),
                    title: t.title.trim().to_string(),
                    description: t.description.clone(),
                    status: TaskStatus::Pending,
                    assignee_id: assignee_for(t.assignee_index, members, owner_id),
                    due_date: None,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn team() -> Vec<User> {
        vec![User::new("u1", "alex_dev"), User::new("u2", "sarah_code")]
    }

    #[test]
    fn first_phase_prompt_lists_members_by_index() {
        let request = DraftRequest::new(
            "A habit tracker",
            Some(ProjectMode::LearnAndDevelop),
            Some(SkillLevel::Beginner),
            &team(),
        );
        let instruction = request.system_instruction();
        assert!(instruction.contains("Mode: Learn & Develop"));
        assert!(instruction.contains("Skill Level: Beginner"));
        assert!(instruction.contains("0: alex_dev, 1: sarah_code"));
        assert!(instruction.contains("ONLY the FIRST PHASE"));
        assert_eq!(request.prompt(), "Project Description: A habit tracker");
    }

    #[test]
    fn next_phase_prompt_names_existing_phases() {
        let mut project = Project {
            id: "p1".to_string(),
            name: "Shop".to_string(),
            description: "A store".to_string(),
            repo_url: None,
            owner_id: "u1".to_string(),
            members: vec![User::new("u2", "sarah_code"), User::new("u1", "alex_dev")],
            created_at: "2026-10-01T00:00:00Z".to_string(),
            mode: None,
            skill_level: None,
            streak: 0,
            phases: Vec::new(),
        };
        project.phases.push(Phase::new("ph1", "Month 1"));

        let request = DraftRequest::next_phase_for(&project);
        assert_eq!(request.members, vec!["alex_dev", "sarah_code"]);
        assert_eq!(request.mode, ProjectMode::DirectDevelop);
        let instruction = request.system_instruction();
        assert!(instruction.contains("already completed these phases: Month 1."));
        assert!(instruction.contains("Skill Level: None"));
        assert!(request.prompt().ends_with("Generate the next phase."));
    }

    #[test]
    fn parses_fenced_arrays_and_single_objects() {
        let fenced = "Here you go:\n```json\n[{\"title\": \"Month 1\", \"tasks\": [{\"title\": \"Setup\", \"description\": \"repo\", \"assigneeIndex\": 1}]}]\n```";
        let drafts = parse_phase_drafts(fenced).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].tasks[0].assignee_index, 1);

        let single = r#"{"title": " Month 2 ", "tasks": [{"title": ""}, {"title": "Deploy"}]}"#;
        let drafts = parse_phase_drafts(single).unwrap();
        assert_eq!(drafts[0].title, "Month 2");
        assert_eq!(drafts[0].tasks.len(), 1);
        assert_eq!(drafts[0].tasks[0].assignee_index, 0);
    }

    #[test]
    fn rejects_non_json_answers() {
        assert!(matches!(
            parse_phase_drafts("I cannot help with that"),
            Err(TrackerError::Upstream { service: "drafting", .. })
        ));
        assert!(parse_phase_drafts("   ").is_err());
        assert!(parse_phase_drafts("42").is_err());
    }

    #[test]
    fn out_of_range_assignees_fall_back_to_owner() {
        let members = team();
        assert_eq!(assignee_for(1, &members, "u1"), "u2");
        assert_eq!(assignee_for(7, &members, "u1"), "u1");
        assert_eq!(assignee_for(-1, &members, "u1"), "u1");
    }

    #[test]
    fn planned_tasks_are_pending_with_fresh_ids() {
        let drafts = vec![PhaseDraft {
            title: "Month 1".to_string(),
            tasks: vec![
                DraftTask { title: "Setup".to_string(), description: String::new(), assignee_index: 1 },
                DraftTask { title: "Auth".to_string(), description: String::new(), assignee_index: 3 },
            ],
        }];
        let planned = plan_phases(&drafts, &team(), "u1");
        let tasks = &planned[0].tasks;
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(tasks[0].assignee_id, "u2");
        assert_eq!(tasks[1].assignee_id, "u1");
        assert_ne!(tasks[0].id, tasks[1].id);
    }
}
