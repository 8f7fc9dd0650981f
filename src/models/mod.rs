pub mod attachment;
pub mod auth;
pub mod camp;
pub mod consultation;
pub mod notification;
pub mod user;
pub mod visit;
pub mod visitor;
