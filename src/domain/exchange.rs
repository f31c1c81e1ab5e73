// ==========================================
// 排班换班系统 - 换班业务实体
// ==========================================
// 申请(Request) → 应答(Offer) → 撮合(Match) → 审批(Validation)
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::{MatchState, OfferState, RequestState, ValidationDecision};

/// 换班申请: 申请人声明想让出自己的一次班次分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub request_id: i64,
    pub requester_id: i64,
    pub assignment_id: i64,
    pub state: RequestState,
    pub is_active: bool,
    pub created_at: String,
}

/// 应答: 另一员工押上自己的一次分配作为交换
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: i64,
    pub request_id: i64,
    pub offerer_id: i64,
    pub offered_assignment_id: i64,
    pub state: OfferState,
    pub is_winning: bool,
    pub seen_by_requester: bool,
    pub created_at: String,
}

/// 撮合结果: 申请与获胜应答的配对, 含换班前快照
///
/// 快照列在创建时写入一次, 换班执行后不再变更,
/// 保证历史页面在真实排班被改写后仍可读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: i64,
    pub request_id: i64,
    pub receiver_id: i64,
    pub state: MatchState,
    pub requester_date: NaiveDate,
    pub requester_code: String,
    pub receiver_date: NaiveDate,
    pub receiver_code: String,
    pub seen_by_sender: bool,
    pub seen_by_receiver: bool,
    pub seen_by_coordinator: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// 审批记录: 每个撮合至多一行, 重复裁决走更新
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub validation_id: i64,
    pub match_id: i64,
    pub admin_id: i64,
    pub decision: ValidationDecision,
    pub comment: Option<String>,
    pub decided_at: String,
    pub seen_by_coordinator: bool,
}
