// ==========================================
// 排班换班系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 换班撮合与审批引擎 (HTTP/认证/报表由外部层负责)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 数据库 schema
pub mod schema;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    MatchEvent, MatchState, OfferEvent, OfferState, RequestEvent, RequestState, Role,
    ValidationDecision,
};

// 领域实体
pub use domain::{AssignmentSlot, ExchangeRequest, MatchRecord, Offer, ShiftType, Validation};

// 引擎
pub use engine::{
    DecisionOutcome, ExchangeError, ExchangeResult, MatchCreated, MatchCreator, OfferManager,
    RequestManager, ValidationEngine, VisibilityTracker,
};

// API
pub use api::{DecideResponse, ExchangeApi, ExchangeApiImpl};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "排班换班系统";

// ==========================================
// 预编译检查
// ==========================================
