// ==========================================
// OfferManager - 换班应答管理
// ==========================================
// 职责: 应答创建/过期清理与应答侧读模型
// 口径: “过期 → 清理”流水线在读路径按需执行, 不走后台调度
// ==========================================

use crate::engine::error::{ExchangeError, ExchangeResult};
use crate::repository::calendar_repo;
use crate::repository::error::RepositoryError;
use crate::repository::offer_repo::{OfferRepository, VisibleOfferRow};
use crate::repository::request_repo::RequestRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct OfferManager {
    conn: Arc<Mutex<Connection>>,
    offers: OfferRepository,
    requests: RequestRepository,
}

impl OfferManager {
    /// 创建新的 OfferManager 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            offers: OfferRepository::new(conn.clone()),
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

    /// 创建应答, 并在父申请仍为 PENDING 时把它推进到 ANSWERED
    ///
    /// # 校验
    /// - 所押分配必须属于应答人 (NotOwned)
    /// - 同一分配不得同时押在多个存活换班里 (Conflict)
    /// - 同一申请只许应答一次: UNIQUE(request_id, offerer_id) 兜底,
    ///   冲突翻译为“你已应答过该申请”
    ///
    /// # 返回
    /// - Ok(offer_id): 新应答 id, 初始状态 PENDING
    pub fn create_offer(
        &self,
        request_id: i64,
        offerer_id: i64,
        offered_assignment_id: i64,
    ) -> ExchangeResult<i64> {
        let owned = {
            let conn = self.get_conn()?;
            calendar_repo::assignment_belongs_to_in(&conn, offered_assignment_id, offerer_id)?
        };
        if !owned {
            return Err(ExchangeError::NotOwned {
                entity: "shift_assignment",
                id: offered_assignment_id,
                worker_id: offerer_id,
            });
        }

        // 防止同一分配被重复押出 (非终态应答只许一条)
        let pledged = self.offers.assignments_already_offered(offerer_id)?;
        if pledged.contains(&offered_assignment_id) {
            return Err(ExchangeError::Conflict(
                "该班次分配已押在其他换班申请上".to_string(),
            ));
        }

        let offer_id = self
            .offers
            .insert_offer(request_id, offerer_id, offered_assignment_id)
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    ExchangeError::Conflict("你已应答过该申请".to_string())
                }
                other => other.into(),
            })?;

        // 父申请 PENDING → ANSWERED (仅在仍 PENDING 且活跃时, 并发下空转无害)
        self.requests.mark_answered_if_pending(request_id)?;

        tracing::info!(
            "换班应答已创建: offer_id={}, request_id={}, offerer_id={}",
            offer_id,
            request_id,
            offerer_id
        );
        Ok(offer_id)
    }

    /// 申请人视角: 名下活跃未撮合申请的全部待选应答
    pub fn list_visible_offers(&self, requester_id: i64) -> ExchangeResult<Vec<VisibleOfferRow>> {
        Ok(self.offers.visible_offers(requester_id)?)
    }

    /// 员工已押出的分配 id 集合 (API 层用它阻止重复押出)
    pub fn assignments_already_offered(&self, worker_id: i64) -> ExchangeResult<Vec<i64>> {
        Ok(self.offers.assignments_already_offered(worker_id)?)
    }

    /// 批量置已读, 返回尝试标记的条数 (仅 UI 提示)
    pub fn mark_offers_seen(
        &self,
        offer_ids: &[i64],
        requester_id: i64,
    ) -> ExchangeResult<usize> {
        Ok(self.offers.mark_offers_seen(offer_ids, requester_id)?)
    }

    /// 过期 → 清理流水线 (读路径按需调用)
    ///
    /// 1) 所押班次日期已到/已过的 PENDING 应答置 EXPIRED
    /// 2) 父申请仍存活的 EXPIRED 应答删除, 释放重新应答的资格
    ///
    /// # 返回
    /// - Ok((expired, purged)): 两步各自处理的条数
    pub fn expire_and_purge(
        &self,
        worker_id: i64,
        today: NaiveDate,
    ) -> ExchangeResult<(usize, usize)> {
        let expired = self.offers.expire_by_past_shift_date(worker_id, today)?;
        let purged = self.offers.purge_expired_if_request_still_live(worker_id)?;
        if expired > 0 || purged > 0 {
            tracing::debug!(
                "应答过期清理: worker_id={}, expired={}, purged={}",
                worker_id,
                expired,
                purged
            );
        }
        Ok((expired, purged))
    }

    /// 统计员工已过期的应答
    pub fn count_expired(&self, worker_id: i64) -> ExchangeResult<i64> {
        Ok(self.offers.count_expired(worker_id)?)
    }
}
