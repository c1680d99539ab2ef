use serde::{Deserialize, Serialize};

use crate::core::domain::entity::user::user::UnvalidatedCreateUserInput;

/// Body of `POST /users` and of a saga action call.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateUserWebInput {
    pub id: i32,
    pub name: String,
    pub email: String,
}

impl From<CreateUserWebInput> for UnvalidatedCreateUserInput {
    fn from(value: CreateUserWebInput) -> Self {
        let CreateUserWebInput { id, name, email } = value;
        Self { id, name, email }
    }
}

/// Compensation only needs the id; coordinators resend the whole action
/// payload, and unknown fields are ignored.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserIdWebInput {
    pub id: i32,
}
