//! Invite state machine: `Pending -> Accepted | Declined`, both terminal.

use serde::Serialize;

use crate::error::{TrackerError, TrackerResult};
use crate::types::{Invite, InviteStatus, Project, User};

/// What an accept or decline call actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// The invite moved out of `Pending`.
    Changed,
    /// The invite was already in the requested state.
    Unchanged,
}

/// Checks that `inviter_id` may invite `invitee_id` to `project`, given the
/// invites already on record for it.
pub fn check_new_invite(
    project: &Project,
    inviter_id: &str,
    invitee_id: &str,
    existing: &[Invite],
) -> TrackerResult<()> {
    if invitee_id.trim().is_empty() {
        return Err(TrackerError::missing_field("invitee"));
    }
    if !project.is_member(inviter_id) {
        return Err(TrackerError::Validation(format!(
            "only members of {} can send invites",
            project.name
        )));
    }
    if project.is_member(invitee_id) {
        return Err(TrackerError::Duplicate(format!(
            "{invitee_id} is already a member of {}",
            project.name
        )));
    }
    let pending = existing.iter().any(|invite| {
        invite.project_id == project.id
            && invite.invitee_id == invitee_id
            && invite.status == InviteStatus::Pending
    });
    if pending {
        return Err(TrackerError::Duplicate(format!(
            "{invitee_id} already has a pending invite to {}",
            project.name
        )));
    }
    Ok(())
}

fn respond(invite: &mut Invite, target: InviteStatus) -> TrackerResult<Response> {
    match invite.status {
        InviteStatus::Pending => {
            invite.status = target;
            Ok(Response::Changed)
        }
        current if current == target => Ok(Response::Unchanged),
        current => Err(TrackerError::InvalidState(format!(
            "invite {} is already {current}",
            invite.id
        ))),
    }
}

/// Only the invitee may answer an invite.
pub fn check_responder(invite: &Invite, user_id: &str) -> TrackerResult<()> {
    if invite.invitee_id == user_id {
        Ok(())
    } else {
        Err(TrackerError::Validation(format!(
            "invite {} is addressed to another user",
            invite.id
        )))
    }
}

/// Marks the invite accepted. Accepting twice is a no-op; accepting a
/// declined invite is an error.
pub fn accept(invite: &mut Invite) -> TrackerResult<Response> {
    respond(invite, InviteStatus::Accepted)
}

pub fn decline(invite: &mut Invite) -> TrackerResult<Response> {
    respond(invite, InviteStatus::Declined)
}

/// Accepts `invite` and grants `invitee` membership of `project`.
/// Membership is added at most once.
pub fn accept_into(invite: &mut Invite, project: &mut Project, invitee: User) -> TrackerResult<Response> {
    if invite.project_id != project.id || invite.invitee_id != invitee.id {
        return Err(TrackerError::Validation(format!(
            "invite {} does not match project {} and user {}",
            invite.id, project.id, invitee.id
        )));
    }
    let response = accept(invite)?;
    project.add_member(invitee);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: "p1".to_string(),
            name: "Shop".to_string(),
            description: "A store".to_string(),
            repo_url: None,
            owner_id: "u1".to_string(),
            members: vec![User::new("u1", "alex_dev")],
            created_at: "2026-10-01T00:00:00Z".to_string(),
            mode: None,
            skill_level: None,
            streak: 0,
            phases: Vec::new(),
        }
    }

    fn invite() -> Invite {
        Invite {
            id: "i1".to_string(),
            project_id: "p1".to_string(),
            project_name: "Shop".to_string(),
            inviter_id: "u1".to_string(),
            inviter_name: "alex_dev".to_string(),
            invitee_id: "u2".to_string(),
            status: InviteStatus::Pending,
        }
    }

    #[test]
    fn accept_grants_membership_once() {
        let mut p = project();
        let mut i = invite();
        let invitee = User::new("u2", "sarah_code");

        assert_eq!(accept_into(&mut i, &mut p, invitee.clone()).unwrap(), Response::Changed);
        assert_eq!(i.status, InviteStatus::Accepted);
        assert!(p.is_member("u2"));

        assert_eq!(accept_into(&mut i, &mut p, invitee).unwrap(), Response::Unchanged);
        assert_eq!(p.members.iter().filter(|m| m.id == "u2").count(), 1);
    }

    #[test]
    fn terminal_states_do_not_flip() {
        let mut i = invite();
        assert_eq!(decline(&mut i).unwrap(), Response::Changed);
        assert_eq!(decline(&mut i).unwrap(), Response::Unchanged);
        assert!(matches!(accept(&mut i), Err(TrackerError::InvalidState(_))));
        assert_eq!(i.status, InviteStatus::Declined);

        let mut j = invite();
        accept(&mut j).unwrap();
        assert!(matches!(decline(&mut j), Err(TrackerError::InvalidState(_))));
    }

    #[test]
    fn declining_leaves_members_alone() {
        let p = project();
        let before = p.members.clone();
        let mut i = invite();
        decline(&mut i).unwrap();
        assert_eq!(p.members, before);
    }

    #[test]
    fn new_invites_reject_members_and_repeats() {
        let p = project();
        assert!(check_new_invite(&p, "u1", "u2", &[]).is_ok());
        assert!(matches!(
            check_new_invite(&p, "u1", "u1", &[]),
            Err(TrackerError::Duplicate(_))
        ));
        assert!(matches!(
            check_new_invite(&p, "u1", "u2", &[invite()]),
            Err(TrackerError::Duplicate(_))
        ));
        assert!(matches!(
            check_new_invite(&p, "u3", "u2", &[]),
            Err(TrackerError::Validation(_))
        ));

        let mut declined = invite();
        declined.status = InviteStatus::Declined;
        assert!(check_new_invite(&p, "u1", "u2", &[declined]).is_ok());
    }

    #[test]
    fn only_the_invitee_answers() {
        let i = invite();
        assert!(check_responder(&i, "u2").is_ok());
        assert!(check_responder(&i, "u1").is_err());
    }
}
