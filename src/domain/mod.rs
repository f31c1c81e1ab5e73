// ==========================================
// 排班换班系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、状态类型与状态机迁移表
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod exchange;
pub mod shift;
pub mod types;

// 重导出核心类型
pub use exchange::{ExchangeRequest, MatchRecord, Offer, Validation};
pub use shift::{
    AssignmentSlot, ShiftType, FREE_SHIFT_CODE, PLACEHOLDER_SHIFT_CODE, PLACEHOLDER_SHIFT_DATE,
};
pub use types::{
    MatchEvent, MatchState, OfferEvent, OfferState, RequestEvent, RequestState, Role,
    ValidationDecision,
};
