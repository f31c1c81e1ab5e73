// ==========================================
// ValidationEngine - 撮合审批状态机
// ==========================================
// 迁移: PENDING_VALIDATION --approve--> VALIDATED
//       PENDING_VALIDATION --reject--> REJECTED   (两者皆终态)
// 红线: decide 全程单事务; 任一步失败整体回滚,
//       调用方看不到半截撮合/审批状态
// ==========================================

use crate::domain::types::{RequestEvent, RequestState, ValidationDecision};
use crate::engine::error::{ExchangeError, ExchangeResult};
use crate::engine::swap_executor::execute_swap_in;
use crate::repository::match_repo::{
    load_match_context_in, match_state_in, set_match_decided_in,
};
use crate::repository::request_repo::{find_request_in, set_request_state_in};
use crate::repository::validation_repo::upsert_decision_in;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 审批结果: 外部审计日志所需的最小上下文
///
/// 换班不动分配行 id, before/after 一致, 因此只需给出双方分配 id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub match_id: i64,
    pub validation_id: i64,
    pub request_id: i64,
    pub requester_id: i64,
    pub receiver_id: i64,
    pub requester_assignment_id: i64,
    pub receiver_assignment_id: i64,
    pub decision: ValidationDecision,
}

pub struct ValidationEngine {
    conn: Arc<Mutex<Connection>>,
}

impl ValidationEngine {
    /// 创建新的 ValidationEngine 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 裁决撮合 (通过/驳回)
    ///
    /// # 流程 (单事务)
    /// 1. 读取最小上下文 (MatchNotFound → 中止, 此时还未写任何东西)
    /// 2. 状态机检查: 撮合必须仍是 PENDING_VALIDATION (AlreadyDecided 否则)
    /// 3. upsert 审批记录 (每撮合至多一行, 重复裁决只改既有行)
    /// 4. 撮合写入终态并清零三个已读标记
    /// 5. 通过 → 在同一事务内执行四格换班;
    ///    驳回 → 父申请置 REJECTED
    /// 6. 提交; 任何错误走回滚
    pub fn decide(
        &self,
        match_id: i64,
        admin_id: i64,
        decision: ValidationDecision,
        comment: Option<&str>,
    ) -> ExchangeResult<DecisionOutcome> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ExchangeError::Internal(format!("锁获取失败: {}", e)))?;
        let tx = conn
            .transaction()
            .map_err(|e| ExchangeError::Internal(format!("事务开启失败: {}", e)))?;

        // 1. 最小上下文
        let ctx = load_match_context_in(&tx, match_id)?.ok_or(ExchangeError::NotFound {
            entity: "match",
            id: match_id,
        })?;

        // 2. 状态机检查
        let state = match_state_in(&tx, match_id)?.ok_or(ExchangeError::NotFound {
            entity: "match",
            id: match_id,
        })?;
        let target = state
            .apply(decision.as_match_event())
            .ok_or(ExchangeError::AlreadyDecided { match_id })?;

        // 3. 审批记录 upsert
        let validation_id = upsert_decision_in(&tx, match_id, admin_id, decision, comment)?;

        // 4. 撮合写入终态
        //    WHERE 仍要求 PENDING_VALIDATION, 0 行说明被并发裁决抢先
        let changed = set_match_decided_in(&tx, match_id, target)?;
        if changed == 0 {
            return Err(ExchangeError::AlreadyDecided { match_id });
        }

        // 5. 裁决副作用
        match decision {
            ValidationDecision::Approved => {
                execute_swap_in(&tx, &ctx)?;
            }
            ValidationDecision::Rejected => {
                let request =
                    find_request_in(&tx, ctx.request_id)?.ok_or(ExchangeError::NotFound {
                        entity: "request",
                        id: ctx.request_id,
                    })?;
                if request.state.apply(RequestEvent::Reject).is_none() {
                    return Err(ExchangeError::DataInconsistency(format!(
                        "待审批撮合的父申请状态异常: request_id={}, state={}",
                        ctx.request_id,
                        request.state
                    )));
                }
                set_request_state_in(&tx, ctx.request_id, RequestState::Rejected)?;
            }
        }

        // 6. 提交
        tx.commit()
            .map_err(|e| ExchangeError::Internal(format!("事务提交失败: {}", e)))?;

        tracing::info!(
            "撮合已裁决: match_id={}, decision={}, admin_id={}, target={}",
            match_id,
            decision,
            admin_id,
            target.to_db_str()
        );

        Ok(DecisionOutcome {
            match_id,
            validation_id,
            request_id: ctx.request_id,
            requester_id: ctx.requester_id,
            receiver_id: ctx.receiver_id,
            requester_assignment_id: ctx.requester_assignment_id,
            receiver_assignment_id: ctx.receiver_assignment_id,
            decision,
        })
    }
}
