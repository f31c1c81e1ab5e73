// ==========================================
// 排班换班系统 - API 层
// ==========================================
// 职责: 面向外部 HTTP 层的业务接口与实现
// ==========================================

pub mod exchange_api;
pub mod exchange_api_impl;

pub use exchange_api::{DecideResponse, ExchangeApi};
pub use exchange_api_impl::ExchangeApiImpl;
