pub mod branch_query;
pub mod create_user_web_input;
