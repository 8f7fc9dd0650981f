pub mod auth;
pub mod chat_link;
pub mod notify;
pub mod telegram;
pub mod visits;
