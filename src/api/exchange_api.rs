// ==========================================
// 排班换班系统 - ExchangeApi Trait 定义
// ==========================================
// 职责: 面向外部 HTTP 层的统一业务接口
// 约定: 认证/授权在外部完成, 这里以参数形式接收调用者身份;
//       审批接口返回 ok+message, 绝不暴露半截状态
// ==========================================

use crate::domain::shift::AssignmentSlot;
use crate::domain::types::{Role, ValidationDecision};
use crate::engine::match_creator::MatchCreated;
use crate::engine::validation_engine::DecisionOutcome;
use crate::repository::match_repo::{MatchHistoryRow, PendingMatchRow};
use crate::repository::offer_repo::VisibleOfferRow;
use crate::repository::request_repo::{ActiveRequestRow, ReceivedRequestRow};
use crate::repository::validation_repo::ValidationHistoryRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 审批接口的响应
///
/// ok=false 时 message 给出用户可读原因;
/// outcome 只在成功时给出, 供外部审计日志落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideResponse {
    pub ok: bool,
    pub message: String,
    pub outcome: Option<DecisionOutcome>,
}

/// ExchangeApi trait
///
/// 覆盖换班生命周期的全部操作:
/// - 日历读视图 (月历 / 休班日)
/// - 申请: 创建 / 撤回 / 列表 / 过期
/// - 应答: 创建 / 列表 / 过期清理
/// - 撮合: 创建 / 历史 / 待审批队列
/// - 审批: 裁决 (通过时在同一事务内执行换班)
/// - 已读标记与角标计数
pub trait ExchangeApi: Send + Sync {
    // ==========================================
    // 日历
    // ==========================================

    /// 员工某年某月的班次分配 (月历渲染)
    fn assignments_for_worker_in_month(
        &self,
        worker_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<AssignmentSlot>, String>;

    /// 员工某年某月的休班日期
    fn free_dates_for_worker(
        &self,
        worker_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<NaiveDate>, String>;

    // ==========================================
    // 申请
    // ==========================================

    /// 创建换班申请, 返回 request_id
    fn create_request(&self, worker_id: i64, assignment_id: i64) -> Result<i64, String>;

    /// 撤回换班申请 (只允许在没有任何应答时)
    fn cancel_request(&self, worker_id: i64, request_id: i64) -> Result<(), String>;

    /// 申请人视角: 活跃且尚未撮合的申请列表
    fn active_requests(&self, worker_id: i64) -> Result<Vec<ActiveRequestRow>, String>;

    /// 受让人视角: 可应答的收到申请列表
    fn received_requests(&self, receiver_id: i64) -> Result<Vec<ReceivedRequestRow>, String>;

    /// 受让人把一条收到申请标为已读
    fn mark_request_seen(&self, receiver_id: i64, request_id: i64) -> Result<(), String>;

    /// 角标: 从未读过的新收到申请数
    fn count_new_received_requests(&self, receiver_id: i64) -> Result<i64, String>;

    /// 角标: 已过期的发出申请数
    fn count_expired_sent_requests(&self, worker_id: i64) -> Result<i64, String>;

    /// 角标: 受让人视角下已过期的收到申请数
    fn count_expired_received_requests(&self, receiver_id: i64) -> Result<i64, String>;

    /// 批量过期目标班次日期已过的申请 (外部调度任务调用)
    fn expire_requests(&self) -> Result<usize, String>;

    // ==========================================
    // 应答
    // ==========================================

    /// 创建应答, 返回 offer_id
    fn create_offer(
        &self,
        request_id: i64,
        offerer_id: i64,
        offered_assignment_id: i64,
    ) -> Result<i64, String>;

    /// 申请人视角: 名下活跃申请的全部待选应答
    fn list_visible_offers(&self, requester_id: i64) -> Result<Vec<VisibleOfferRow>, String>;

    /// 员工已押出的分配 id 集合 (阻止重复押出)
    fn assignments_already_offered(&self, worker_id: i64) -> Result<Vec<i64>, String>;

    /// 批量把应答置已读, 返回尝试标记的条数
    fn mark_offers_seen(&self, offer_ids: &[i64], requester_id: i64) -> Result<usize, String>;

    /// 应答过期 → 清理流水线 (读路径按需调用), 返回 (expired, purged)
    fn expire_and_purge_offers(&self, worker_id: i64) -> Result<(usize, usize), String>;

    /// 角标: 已过期的应答数
    fn count_expired_offers(&self, worker_id: i64) -> Result<i64, String>;

    // ==========================================
    // 撮合
    // ==========================================

    /// 把一条应答提升为撮合 (单事务), 返回撮合与参与方 id
    fn create_match(&self, request_id: i64, winning_offer_id: i64)
        -> Result<MatchCreated, String>;

    /// 员工视角: 参与过的全部撮合历史
    fn match_history(&self, worker_id: i64) -> Result<Vec<MatchHistoryRow>, String>;

    /// 协调员工作队列: 待审批撮合
    fn matches_pending_validation(&self) -> Result<Vec<PendingMatchRow>, String>;

    /// 按角色把撮合标为已读
    fn mark_matches_seen(&self, worker_id: i64, role: Role) -> Result<usize, String>;

    // ==========================================
    // 审批
    // ==========================================

    /// 裁决撮合; 通过时在同一事务内执行四格换班
    ///
    /// 永远返回 DecideResponse: ok=false 携带用户可读原因,
    /// 数据库半截状态不可能出现 (整体回滚)
    fn decide_match(
        &self,
        match_id: i64,
        admin_id: i64,
        decision: ValidationDecision,
        comment: Option<&str>,
    ) -> Result<DecideResponse, String>;

    /// 审批历史 (已裁决撮合全集)
    fn validation_history(&self) -> Result<Vec<ValidationHistoryRow>, String>;

    /// 角标: 协调员未读的审批记录数
    fn count_unseen_validations(&self) -> Result<i64, String>;

    /// 协调员把全部审批记录标为已读
    fn mark_validations_seen(&self) -> Result<usize, String>;
}
