// ==========================================
// 排班换班系统 - 引擎层
// ==========================================
// 职责: 实现换班业务规则, 组合仓储完成单一/复合操作
// 红线: 复合操作 (撮合创建 / 审批+换班) 必须单事务,
//       简单操作各自自动提交
// ==========================================

pub mod error;
pub mod match_creator;
pub mod offer_manager;
pub mod request_manager;
pub mod swap_executor;
pub mod validation_engine;
pub mod visibility;

// 重导出核心引擎
pub use error::{ExchangeError, ExchangeResult};
pub use match_creator::{MatchCreated, MatchCreator};
pub use offer_manager::OfferManager;
pub use request_manager::RequestManager;
pub use swap_executor::execute_swap_in;
pub use validation_engine::{DecisionOutcome, ValidationEngine};
pub use visibility::VisibilityTracker;
