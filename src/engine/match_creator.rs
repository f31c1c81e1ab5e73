// ==========================================
// MatchCreator - 撮合创建
// ==========================================
// 红线: 五步序列必须在同一个事务内落库 —
//       获胜标记 / 落选标记 / 快照 / 撮合插入 / 申请关闭
//       任一步失败整体回滚, 不得留下“有获胜应答却没有撮合”的中间态
// ==========================================

use crate::domain::types::{OfferEvent, RequestEvent, RequestState};
use crate::engine::error::{ExchangeError, ExchangeResult};
use crate::repository::match_repo::{insert_match_in, snapshot_for_match_in};
use crate::repository::offer_repo::{
    find_offer_in, mark_offer_selected_in, mark_other_offers_not_selected_in,
};
use crate::repository::request_repo::{find_request_in, set_request_state_in};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 撮合创建结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCreated {
    pub match_id: i64,
    pub request_id: i64,
    pub receiver_id: i64,
}

pub struct MatchCreator {
    conn: Arc<Mutex<Connection>>,
}

impl MatchCreator {
    /// 创建新的 MatchCreator 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 把一条应答提升为撮合
    ///
    /// # 流程 (单事务)
    /// 1. 解析获胜应答 → 受让人 (NotFound)
    /// 2. 获胜应答置 SELECTED, 同申请其余 PENDING 应答置 NOT_SELECTED
    /// 3. 读取双方换班前 (日期, 班次编码) 快照 (落空视为数据不一致, 不重试)
    /// 4. 插入 PENDING_VALIDATION 撮合, 三个已读标记全 0
    /// 5. 申请置 MATCHED (关闭)
    ///
    /// 申请已关闭/已撤回时第二次调用在状态机检查处失败 (InvalidState)
    pub fn create_match(
        &self,
        request_id: i64,
        winning_offer_id: i64,
    ) -> ExchangeResult<MatchCreated> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ExchangeError::Internal(format!("锁获取失败: {}", e)))?;
        let tx = conn
            .transaction()
            .map_err(|e| ExchangeError::Internal(format!("事务开启失败: {}", e)))?;

        // 1. 解析获胜应答 (必须属于该申请)
        let offer = find_offer_in(&tx, winning_offer_id)?.filter(|o| o.request_id == request_id);
        let offer = offer.ok_or(ExchangeError::NotFound {
            entity: "offer",
            id: winning_offer_id,
        })?;

        let request = find_request_in(&tx, request_id)?.ok_or(ExchangeError::NotFound {
            entity: "request",
            id: request_id,
        })?;

        // 状态机检查: 申请可撮合, 应答可选中
        if request.state.apply(RequestEvent::Match).is_none() {
            return Err(ExchangeError::InvalidState {
                entity: "request",
                from: request.state.to_db_str().to_string(),
                event: format!("{:?}", RequestEvent::Match),
            });
        }
        if offer.state.apply(OfferEvent::Select).is_none() {
            return Err(ExchangeError::InvalidState {
                entity: "offer",
                from: offer.state.to_db_str().to_string(),
                event: format!("{:?}", OfferEvent::Select),
            });
        }

        // 2. 获胜/落选标记
        mark_offer_selected_in(&tx, winning_offer_id)?;
        mark_other_offers_not_selected_in(&tx, request_id, winning_offer_id)?;

        // 3. 换班前快照 (在换班执行前冻结双方的日期与班次编码)
        let snapshot = snapshot_for_match_in(&tx, request_id, offer.offerer_id)?.ok_or_else(|| {
            ExchangeError::DataInconsistency(format!(
                "撮合快照读取落空: request_id={}, receiver_id={}",
                request_id, offer.offerer_id
            ))
        })?;

        // 4. 插入撮合
        let match_id = insert_match_in(&tx, request_id, offer.offerer_id, &snapshot)?;

        // 5. 关闭申请
        set_request_state_in(&tx, request_id, RequestState::Matched)?;

        tx.commit()
            .map_err(|e| ExchangeError::Internal(format!("事务提交失败: {}", e)))?;

        tracing::info!(
            "撮合已创建: match_id={}, request_id={}, receiver_id={}",
            match_id,
            request_id,
            offer.offerer_id
        );

        Ok(MatchCreated {
            match_id,
            request_id,
            receiver_id: offer.offerer_id,
        })
    }
}
