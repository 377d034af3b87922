//! 数据模型模块

pub mod auth;
pub mod event;
pub mod task;
pub mod user;
