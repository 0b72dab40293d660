pub mod admin;
pub mod auth;
pub mod briefs;
pub mod documents;
pub mod health;
pub mod policies;
pub mod storage;
