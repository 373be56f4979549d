//! Role-based access to CMS collections.
//!
//! Every admin handler asks [`is_allowed`] before touching the store, so the
//! role matrix lives in exactly one place.

use crate::store::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Pages,
    Jobs,
    Media,
    Forms,
    Users,
    Settings,
    Theme,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Pages => "pages",
            Resource::Jobs => "jobs",
            Resource::Media => "media",
            Resource::Forms => "forms",
            Resource::Users => "users",
            Resource::Settings => "settings",
            Resource::Theme => "theme",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
}

pub fn is_allowed(role: Role, resource: Resource, action: Action) -> bool {
    match (role, resource) {
        (Role::Admin, _) => true,
        (_, Resource::Users) => false,
        (Role::Editor, _) => true,
        (Role::JobsManager, Resource::Jobs | Resource::Theme) => true,
        (Role::JobsManager, _) => action == Action::Read,
    }
}
