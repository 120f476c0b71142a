//! Who is asking, and what they may see.

use resourcecore_types::{ProjectId, ResourceOwner, Username, Workspace};
use serde::{Deserialize, Serialize};

/// The authenticated caller of a manager operation.
///
/// Authentication happens elsewhere; the manager trusts the actor it is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// The calling user.
    pub username: Username,
    /// The project the caller is acting in, if any.
    pub project: Option<ProjectId>,
}

impl Actor {
    /// An actor working in their personal workspace.
    pub const fn personal(username: Username) -> Self {
        Self {
            username,
            project: None,
        }
    }

    /// An actor working inside a project.
    pub const fn in_project(username: Username, project: ProjectId) -> Self {
        Self {
            username,
            project: Some(project),
        }
    }

    /// The owner recorded on resources this actor creates.
    pub fn owner(&self) -> ResourceOwner {
        ResourceOwner::new(self.username.clone(), self.project.clone())
    }

    /// The workspace this actor is acting in.
    pub fn workspace(&self) -> Workspace {
        self.owner().workspace()
    }
}

/// Decides whether an actor may see a resource.
///
/// Resources an actor cannot see are reported as not found, never as
/// forbidden. Any `Fn(&Actor, &ResourceOwner) -> bool` is a policy.
pub trait AccessPolicy: Send + Sync {
    /// Whether `actor` may read and modify a resource owned by `owner`.
    fn can_access(&self, actor: &Actor, owner: &ResourceOwner) -> bool;
}

/// Visibility follows workspaces: project members see project resources and
/// users see their own personal resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkspaceScoped;

impl AccessPolicy for WorkspaceScoped {
    fn can_access(&self, actor: &Actor, owner: &ResourceOwner) -> bool {
        actor.workspace() == owner.workspace()
    }
}

impl<F> AccessPolicy for F
where
    F: Fn(&Actor, &ResourceOwner) -> bool + Send + Sync,
{
    fn can_access(&self, actor: &Actor, owner: &ResourceOwner) -> bool {
        self(actor, owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> Username {
        Username::try_new(name).unwrap()
    }

    fn project(id: &str) -> ProjectId {
        ProjectId::try_new(id).unwrap()
    }

    #[test]
    fn project_resources_are_visible_to_the_project_only() {
        let owner = Actor::in_project(user("alice"), project("p1")).owner();

        let member = Actor::in_project(user("bob"), project("p1"));
        let other_project = Actor::in_project(user("alice"), project("p2"));

        assert!(WorkspaceScoped.can_access(&member, &owner));
        assert!(!WorkspaceScoped.can_access(&other_project, &owner));
        assert!(!WorkspaceScoped.can_access(&Actor::personal(user("alice")), &owner));
    }

    #[test]
    fn personal_resources_are_visible_to_their_creator_only() {
        let owner = Actor::personal(user("alice")).owner();

        assert!(WorkspaceScoped.can_access(&Actor::personal(user("alice")), &owner));
        assert!(!WorkspaceScoped.can_access(&Actor::personal(user("bob")), &owner));
    }

    #[test]
    fn closures_are_policies() {
        let admins_only = |actor: &Actor, _: &ResourceOwner| actor.username.as_ref() == "admin";
        let owner = Actor::personal(user("alice")).owner();

        assert!(admins_only.can_access(&Actor::personal(user("admin")), &owner));
        assert!(!admins_only.can_access(&Actor::personal(user("alice")), &owner));
    }
}
