// ==========================================
// 排班换班系统 - 领域类型定义
// ==========================================
// 红线: 状态机走显式迁移表, 非法迁移返回 None 由引擎层拒绝,
//       不依赖 SQL WHERE 条件静默空转
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 角色 (Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Worker,        // 普通员工
    Coordinator,   // 协调员
    Administrator, // 管理员
}

impl Role {
    /// 是否具备审批/看板视角（协调员与管理员同权）
    pub fn is_supervisor(&self) -> bool {
        matches!(self, Role::Coordinator | Role::Administrator)
    }

    /// 从字符串解析角色
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "WORKER" => Some(Role::Worker),
            "COORDINATOR" => Some(Role::Coordinator),
            "ADMINISTRATOR" => Some(Role::Administrator),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::Worker => "WORKER",
            Role::Coordinator => "COORDINATOR",
            Role::Administrator => "ADMINISTRATOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 申请状态 (Request State)
// ==========================================
// MATCHED 即原系统的“已撮合关闭”; REJECTED 由审批驳回回写
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Pending,   // 等待应答
    Answered,  // 已有应答
    Matched,   // 已撮合, 申请关闭
    Cancelled, // 申请人撤回
    Expired,   // 目标班次日期已过
    Rejected,  // 撮合被审批驳回
}

/// 申请状态机事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    Answer, // 收到首条应答
    Match,  // 选中获胜应答
    Cancel, // 申请人撤回
    Expire, // 日期过期
    Reject, // 审批驳回
}

impl RequestState {
    /// 迁移表: 返回目标状态, 非法迁移返回 None
    pub fn apply(self, event: RequestEvent) -> Option<RequestState> {
        use RequestEvent::*;
        use RequestState::*;
        match (self, event) {
            (Pending, Answer) => Some(Answered),
            (Pending, Match) | (Answered, Match) => Some(Matched),
            (Pending, Cancel) | (Answered, Cancel) => Some(Cancelled),
            (Pending, Expire) | (Answered, Expire) => Some(Expired),
            (Matched, Reject) => Some(Rejected),
            _ => None,
        }
    }

    /// 申请是否还接受新应答
    pub fn accepts_offers(&self) -> bool {
        matches!(self, RequestState::Pending | RequestState::Answered)
    }

    /// 从字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(RequestState::Pending),
            "ANSWERED" => Some(RequestState::Answered),
            "MATCHED" => Some(RequestState::Matched),
            "CANCELLED" => Some(RequestState::Cancelled),
            "EXPIRED" => Some(RequestState::Expired),
            "REJECTED" => Some(RequestState::Rejected),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "PENDING",
            RequestState::Answered => "ANSWERED",
            RequestState::Matched => "MATCHED",
            RequestState::Cancelled => "CANCELLED",
            RequestState::Expired => "EXPIRED",
            RequestState::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 应答状态 (Offer State)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferState {
    Pending,     // 等待申请人选择
    Selected,    // 被选为获胜应答
    NotSelected, // 同申请下的落选应答
    Cancelled,   // 应答人撤回
    Expired,     // 所押班次日期已过
}

/// 应答状态机事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferEvent {
    Select,  // 选为获胜
    Discard, // 落选
    Cancel,  // 撤回
    Expire,  // 日期过期
}

impl OfferState {
    /// 迁移表: 返回目标状态, 非法迁移返回 None
    pub fn apply(self, event: OfferEvent) -> Option<OfferState> {
        use OfferEvent::*;
        use OfferState::*;
        match (self, event) {
            (Pending, Select) => Some(Selected),
            (Pending, Discard) => Some(NotSelected),
            (Pending, Cancel) => Some(Cancelled),
            (Pending, Expire) => Some(Expired),
            _ => None,
        }
    }

    /// 终态判定: 终态应答不再占用所押的班次分配
    /// (SELECTED/NOT_SELECTED 仍计入占用, 防止同一分配被重复押出)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferState::Cancelled | OfferState::Expired)
    }

    /// 从字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(OfferState::Pending),
            "SELECTED" => Some(OfferState::Selected),
            "NOT_SELECTED" => Some(OfferState::NotSelected),
            "CANCELLED" => Some(OfferState::Cancelled),
            "EXPIRED" => Some(OfferState::Expired),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OfferState::Pending => "PENDING",
            OfferState::Selected => "SELECTED",
            OfferState::NotSelected => "NOT_SELECTED",
            OfferState::Cancelled => "CANCELLED",
            OfferState::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for OfferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 撮合状态 (Match State)
// ==========================================
// EXPIRED 仅存在于读模型: 由外部定时任务批量写入, 核心不产生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    PendingValidation, // 等待审批
    Validated,         // 审批通过, 已执行换班
    Rejected,          // 审批驳回
    Expired,           // 超时未审批
}

/// 撮合状态机事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    Approve, // 审批通过
    Reject,  // 审批驳回
}

impl MatchState {
    /// 迁移表: 两个裁决迁移都是终态
    pub fn apply(self, event: MatchEvent) -> Option<MatchState> {
        use MatchEvent::*;
        use MatchState::*;
        match (self, event) {
            (PendingValidation, Approve) => Some(Validated),
            (PendingValidation, Reject) => Some(Rejected),
            _ => None,
        }
    }

    /// 从字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING_VALIDATION" => Some(MatchState::PendingValidation),
            "VALIDATED" => Some(MatchState::Validated),
            "REJECTED" => Some(MatchState::Rejected),
            "EXPIRED" => Some(MatchState::Expired),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MatchState::PendingValidation => "PENDING_VALIDATION",
            MatchState::Validated => "VALIDATED",
            MatchState::Rejected => "REJECTED",
            MatchState::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 审批裁决 (Validation Decision)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationDecision {
    Approved, // 通过
    Rejected, // 驳回
}

impl ValidationDecision {
    /// 裁决对应的撮合状态机事件
    pub fn as_match_event(&self) -> MatchEvent {
        match self {
            ValidationDecision::Approved => MatchEvent::Approve,
            ValidationDecision::Rejected => MatchEvent::Reject,
        }
    }

    /// 从字符串解析裁决
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "APPROVED" => Some(ValidationDecision::Approved),
            "REJECTED" => Some(ValidationDecision::Rejected),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ValidationDecision::Approved => "APPROVED",
            ValidationDecision::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ValidationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_transitions() {
        assert_eq!(
            RequestState::Pending.apply(RequestEvent::Answer),
            Some(RequestState::Answered)
        );
        assert_eq!(
            RequestState::Answered.apply(RequestEvent::Match),
            Some(RequestState::Matched)
        );
        assert_eq!(
            RequestState::Matched.apply(RequestEvent::Reject),
            Some(RequestState::Rejected)
        );
        // 已关闭的申请不可再撮合
        assert_eq!(RequestState::Matched.apply(RequestEvent::Match), None);
        assert_eq!(RequestState::Cancelled.apply(RequestEvent::Answer), None);
    }

    #[test]
    fn test_offer_transitions() {
        assert_eq!(
            OfferState::Pending.apply(OfferEvent::Select),
            Some(OfferState::Selected)
        );
        // 已落选的应答不可再被选中
        assert_eq!(OfferState::NotSelected.apply(OfferEvent::Select), None);
        assert!(OfferState::Expired.is_terminal());
        assert!(!OfferState::Selected.is_terminal());
    }

    #[test]
    fn test_match_transitions_are_terminal() {
        assert_eq!(
            MatchState::PendingValidation.apply(MatchEvent::Approve),
            Some(MatchState::Validated)
        );
        assert_eq!(MatchState::Validated.apply(MatchEvent::Approve), None);
        assert_eq!(MatchState::Validated.apply(MatchEvent::Reject), None);
        assert_eq!(MatchState::Rejected.apply(MatchEvent::Approve), None);
    }

    #[test]
    fn test_db_str_round_trip() {
        for s in [
            RequestState::Pending,
            RequestState::Answered,
            RequestState::Matched,
            RequestState::Cancelled,
            RequestState::Expired,
            RequestState::Rejected,
        ] {
            assert_eq!(RequestState::from_db_str(s.to_db_str()), Some(s));
        }
        assert_eq!(RequestState::from_db_str("CONTESTADA"), None);
    }
}
