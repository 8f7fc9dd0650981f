pub mod attachments;
pub mod auth;
pub mod camps;
pub mod health;
pub mod notifications;
pub mod visits;
pub mod webhook;
