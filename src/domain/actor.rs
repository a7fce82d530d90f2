use serde::{Deserialize, Serialize};

pub type UserId = u64;

/// The two marketplace roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Mentee,
}

/// Authenticated caller identity.
///
/// Issued by the external auth collaborator and passed explicitly into
/// every operation; the service layer holds no ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn mentor(id: UserId) -> Self {
        Self {
            id,
            role: Role::Mentor,
        }
    }

    pub fn mentee(id: UserId) -> Self {
        Self {
            id,
            role: Role::Mentee,
        }
    }

    pub fn is_mentor(&self) -> bool {
        self.role == Role::Mentor
    }

    pub fn is_mentee(&self) -> bool {
        self.role == Role::Mentee
    }
}
