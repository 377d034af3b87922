//! Race weekend API
//! 认证核心（密码哈希、JWT 会话令牌、按用户固定窗口限流）与比赛周末任务管理

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
