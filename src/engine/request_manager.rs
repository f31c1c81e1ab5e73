// ==========================================
// RequestManager - 换班申请管理
// ==========================================
// 职责: 申请的创建/撤回/过期与申请侧读模型
// 红线: 副作用只落在 request 行, 不级联改其他实体
// ==========================================

use crate::domain::types::RequestEvent;
use crate::engine::error::{ExchangeError, ExchangeResult};
use crate::repository::calendar_repo;
use crate::repository::request_repo::{ActiveRequestRow, ReceivedRequestRow, RequestRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct RequestManager {
    conn: Arc<Mutex<Connection>>,
    requests: RequestRepository,
}

impl RequestManager {
    /// 创建新的 RequestManager 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            requests: RequestRepository::new(conn.clone()),
            conn,
        }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> ExchangeResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ExchangeError::Internal(format!("锁获取失败: {}", e)))
    }

    /// 创建换班申请
    ///
    /// # 校验
    /// - 分配必须属于申请人 (NotOwned)
    /// - 同一分配上不得已有活跃申请 (AlreadyActive)
    ///
    /// # 返回
    /// - Ok(request_id): 新申请 id, 初始状态 PENDING
    pub fn create_request(&self, worker_id: i64, assignment_id: i64) -> ExchangeResult<i64> {
        let owned = {
            let conn = self.get_conn()?;
            calendar_repo::assignment_belongs_to_in(&conn, assignment_id, worker_id)?
        };
        if !owned {
            return Err(ExchangeError::NotOwned {
                entity: "shift_assignment",
                id: assignment_id,
                worker_id,
            });
        }

        if self.requests.has_active_request_for_assignment(assignment_id)? {
            return Err(ExchangeError::AlreadyActive { assignment_id });
        }

        let request_id = self.requests.insert_request(worker_id, assignment_id)?;

        tracing::info!(
            "换班申请已创建: request_id={}, worker_id={}, assignment_id={}",
            request_id,
            worker_id,
            assignment_id
        );
        Ok(request_id)
    }

    /// 撤回换班申请
    ///
    /// 仅在还没有任何应答时允许 (HasOffers 否则);
    /// 成功后置 CANCELLED 并失活
    pub fn cancel_request(&self, worker_id: i64, request_id: i64) -> ExchangeResult<()> {
        let request = self
            .requests
            .find_by_id(request_id)?
            .ok_or(ExchangeError::NotFound {
                entity: "request",
                id: request_id,
            })?;

        if request.requester_id != worker_id {
            return Err(ExchangeError::NotOwned {
                entity: "request",
                id: request_id,
                worker_id,
            });
        }
        if !request.is_active {
            return Err(ExchangeError::NotActive { request_id });
        }
        if request.state.apply(RequestEvent::Cancel).is_none() {
            return Err(ExchangeError::InvalidState {
                entity: "request",
                from: request.state.to_db_str().to_string(),
                event: format!("{:?}", RequestEvent::Cancel),
            });
        }
        if self.requests.count_offers(request_id)? > 0 {
            return Err(ExchangeError::HasOffers { request_id });
        }

        self.requests.set_cancelled(request_id)?;

        tracing::info!("换班申请已撤回: request_id={}, worker_id={}", request_id, worker_id);
        Ok(())
    }

    /// 统计员工已过期的发出申请
    pub fn count_expired(&self, worker_id: i64) -> ExchangeResult<i64> {
        Ok(self.requests.count_expired_sent(worker_id)?)
    }

    /// 申请人视角: 活跃且尚未撮合的申请列表
    pub fn active_requests(&self, worker_id: i64) -> ExchangeResult<Vec<ActiveRequestRow>> {
        Ok(self.requests.active_requests(worker_id)?)
    }

    /// 受让人视角: 可应答的收到申请列表
    pub fn received_requests(&self, receiver_id: i64) -> ExchangeResult<Vec<ReceivedRequestRow>> {
        Ok(self.requests.received_requests(receiver_id)?)
    }

    /// 统计受让人从未读过的新收到申请
    pub fn count_new_received(&self, receiver_id: i64) -> ExchangeResult<i64> {
        Ok(self.requests.count_new_received(receiver_id)?)
    }

    /// 统计受让人视角下已过期的收到申请
    pub fn count_expired_received(&self, receiver_id: i64) -> ExchangeResult<i64> {
        Ok(self.requests.count_expired_received(receiver_id)?)
    }

    /// 批量过期目标班次日期已过的申请
    ///
    /// 核心不含定时器, 由外部调度任务调用; today 由调用方给出, 便于测试
    pub fn expire_by_past_shift_date(&self, today: NaiveDate) -> ExchangeResult<usize> {
        let count = self.requests.expire_by_past_shift_date(today)?;
        if count > 0 {
            tracing::info!("批量过期申请: {} 条, 截止 {}", count, today);
        }
        Ok(count)
    }
}
