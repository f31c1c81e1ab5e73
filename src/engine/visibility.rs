// ==========================================
// VisibilityTracker - 已读标记管理
// ==========================================
// 红线: 已读标记只是通知提示, 永不参与业务状态迁移判断
// ==========================================

use crate::domain::types::Role;
use crate::engine::error::ExchangeResult;
use crate::repository::match_repo::MatchRepository;
use crate::repository::request_repo::RequestRepository;
use crate::repository::validation_repo::ValidationRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct VisibilityTracker {
    requests: RequestRepository,
    matches: MatchRepository,
    validations: ValidationRepository,
}

impl VisibilityTracker {
    /// 创建新的 VisibilityTracker 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            requests: RequestRepository::new(conn.clone()),
            matches: MatchRepository::new(conn.clone()),
            validations: ValidationRepository::new(conn),
        }
    }

    /// 受让人把一条收到申请标为已读 (upsert)
    pub fn mark_request_seen(&self, receiver_id: i64, request_id: i64) -> ExchangeResult<()> {
        self.requests.mark_request_seen(receiver_id, request_id)?;
        Ok(())
    }

    /// 按角色把撮合标为已读
    ///
    /// - 协调员/管理员: 待审批撮合的 seen_by_coordinator 置 1
    /// - 普通员工: 作为申请人与作为受让人的撮合分别置 1
    pub fn mark_matches_seen(&self, worker_id: i64, role: Role) -> ExchangeResult<usize> {
        if role.is_supervisor() {
            return Ok(self.matches.mark_pending_seen_by_coordinator()?);
        }

        let as_sender = self.matches.mark_seen_as_sender(worker_id)?;
        let as_receiver = self.matches.mark_seen_as_receiver(worker_id)?;
        Ok(as_sender + as_receiver)
    }

    /// 协调员把全部审批记录标为已读
    pub fn mark_validations_seen(&self) -> ExchangeResult<usize> {
        Ok(self.validations.mark_all_seen()?)
    }

    /// 统计协调员未读的审批记录
    pub fn count_unseen_validations(&self) -> ExchangeResult<i64> {
        Ok(self.validations.count_unseen()?)
    }
}
