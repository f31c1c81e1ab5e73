// ==========================================
// 排班换班系统 - 引擎层错误类型
// ==========================================
// 分层: 仓储层错误 (约束/SQL) 在这里翻译为业务语义;
//       唯一约束 → Conflict, 外键 → ForeignKeyViolation
// 约定: DataInconsistency / Internal 永不吞掉, 必须中止所在事务
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum ExchangeError {
    // ===== 实体定位 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("无权操作: {entity} id={id} 不属于员工 {worker_id}")]
    NotOwned {
        entity: &'static str,
        id: i64,
        worker_id: i64,
    },

    // ===== 状态规则 =====
    #[error("该班次分配已有活跃的换班申请: assignment_id={assignment_id}")]
    AlreadyActive { assignment_id: i64 },

    #[error("申请已失活, 不可操作: request_id={request_id}")]
    NotActive { request_id: i64 },

    #[error("申请已有应答, 不可撤回: request_id={request_id}")]
    HasOffers { request_id: i64 },

    #[error("非法的状态迁移: {entity} from={from} event={event}")]
    InvalidState {
        entity: &'static str,
        from: String,
        event: String,
    },

    #[error("撮合已被裁决: match_id={match_id}")]
    AlreadyDecided { match_id: i64 },

    // ===== 约束冲突 =====
    #[error("{0}")]
    Conflict(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 数据异常 =====
    #[error("数据不一致: {0}")]
    DataInconsistency(String),

    #[error("换班所需的分配数据缺失: assignment_id={assignment_id}")]
    MissingAssignmentData { assignment_id: i64 },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    Internal(String),
}

// 仓储层错误归类翻译
impl From<RepositoryError> for ExchangeError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg) => ExchangeError::Conflict(msg),
            RepositoryError::ForeignKeyViolation(msg) => ExchangeError::ForeignKeyViolation(msg),
            RepositoryError::InvalidStateValue { column, value } => {
                ExchangeError::DataInconsistency(format!("状态列取值非法: {}={}", column, value))
            }
            other => ExchangeError::Internal(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ExchangeResult<T> = Result<T, ExchangeError>;
