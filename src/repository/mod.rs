// ==========================================
// 排班换班系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口, 屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化, 防止 SQL 注入
// ==========================================

pub mod calendar_repo;
pub mod error;
pub mod match_repo;
pub mod offer_repo;
pub mod request_repo;
pub mod validation_repo;

// 重导出核心仓储
pub use calendar_repo::CalendarRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use match_repo::{
    MatchContext, MatchHistoryRow, MatchRepository, MatchRole, MatchSnapshot, PendingMatchRow,
};
pub use offer_repo::{OfferRepository, VisibleOfferRow};
pub use request_repo::{ActiveRequestRow, ReceivedRequestRow, RequestRepository};
pub use validation_repo::{ValidationHistoryRow, ValidationRepository};
