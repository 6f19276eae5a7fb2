use std::fmt;
use serde::{Serialize, Deserialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
         Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    JuniorManager,
    Controller,
    Technician,
    CallCenter,
    /// Anybody who is not staff
    Client,
}

impl Role {
    pub const ALL: &'static [Role] =
        &[ Role::Admin,
           Role::Manager,
           Role::JuniorManager,
           Role::Controller,
           Role::Technician,
           Role::CallCenter,
           Role::Client ];

    /// Roles that triage and dispatch requests
    pub const DISPATCHERS: &'static [Role] =
        &[ Role::Admin,
           Role::Manager,
           Role::JuniorManager,
           Role::Controller ];

    pub const fn id(self) -> &'static str {
        match self {
            Role::Admin         => "admin",
            Role::Manager       => "manager",
            Role::JuniorManager => "junior_manager",
            Role::Controller    => "controller",
            Role::Technician    => "technician",
            Role::CallCenter    => "call_center",
            Role::Client        => "client",
        }
    }

    pub const fn human_name(self) -> &'static str {
        match self {
            Role::Admin         => "Administrator",
            Role::Manager       => "Manager",
            Role::JuniorManager => "Junior manager",
            Role::Controller    => "Controller",
            Role::Technician    => "Technician",
            Role::CallCenter    => "Call center operator",
            Role::Client        => "Client",
        }
    }

    pub fn from_id(id: &str) -> Option<Role> {
        Role::ALL.iter().copied().find(|r| r.id() == id)
    }

    pub const fn is_staff(self) -> bool {
        !matches!(self, Role::Client)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.human_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id() {
        assert_eq!(Some(Role::JuniorManager), Role::from_id("junior_manager"));
        assert_eq!(None,                      Role::from_id("junior manager"));
        assert_eq!(None,                      Role::from_id(""));
    }

    #[test]
    fn test_serde_uses_ids() {
        for role in Role::ALL.iter().copied() {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(format!("\"{}\"", role.id()), json);
        }
    }
}
