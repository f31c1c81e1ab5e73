// ==========================================
// 排班换班系统 - ExchangeApi 实现
// ==========================================
// 职责: 组装仓储与引擎, 把引擎错误降级为面向调用方的字符串;
//       审批失败归一为 ok=false, 不向外抛半截状态
// ==========================================

use crate::api::exchange_api::{DecideResponse, ExchangeApi};
use crate::db::open_sqlite_connection;
use crate::domain::shift::AssignmentSlot;
use crate::domain::types::{Role, ValidationDecision};
use crate::engine::error::ExchangeError;
use crate::engine::match_creator::{MatchCreated, MatchCreator};
use crate::engine::offer_manager::OfferManager;
use crate::engine::request_manager::RequestManager;
use crate::engine::validation_engine::ValidationEngine;
use crate::engine::visibility::VisibilityTracker;
use crate::repository::calendar_repo::CalendarRepository;
use crate::repository::match_repo::{MatchHistoryRow, MatchRepository, PendingMatchRow};
use crate::repository::offer_repo::VisibleOfferRow;
use crate::repository::request_repo::{ActiveRequestRow, ReceivedRequestRow};
use crate::repository::validation_repo::{ValidationHistoryRow, ValidationRepository};
use crate::schema::init_schema;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct ExchangeApiImpl {
    calendar: CalendarRepository,
    requests: RequestManager,
    offers: OfferManager,
    match_creator: MatchCreator,
    validation_engine: ValidationEngine,
    visibility: VisibilityTracker,
    matches: MatchRepository,
    validations: ValidationRepository,
}

impl ExchangeApiImpl {
    /// 打开数据库并初始化 schema, 组装全部引擎
    pub fn new(db_path: &str) -> Result<Self, String> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| format!("数据库打开失败: {}", e))?;
        init_schema(&conn).map_err(|e| format!("schema 初始化失败: {}", e))?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 基于既有连接组装 (测试/嵌入用)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            calendar: CalendarRepository::new(conn.clone()),
            requests: RequestManager::new(conn.clone()),
            offers: OfferManager::new(conn.clone()),
            match_creator: MatchCreator::new(conn.clone()),
            validation_engine: ValidationEngine::new(conn.clone()),
            visibility: VisibilityTracker::new(conn.clone()),
            matches: MatchRepository::new(conn.clone()),
            validations: ValidationRepository::new(conn),
        }
    }

    /// 过期判定基准日 (本地日期)
    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

impl ExchangeApi for ExchangeApiImpl {
    // ==========================================
    // 日历
    // ==========================================

    fn assignments_for_worker_in_month(
        &self,
        worker_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<AssignmentSlot>, String> {
        self.calendar
            .assignments_for_worker_in_month(worker_id, year, month)
            .map_err(|e| e.to_string())
    }

    fn free_dates_for_worker(
        &self,
        worker_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<NaiveDate>, String> {
        self.calendar
            .free_dates_for_worker(worker_id, year, month)
            .map_err(|e| e.to_string())
    }

    // ==========================================
    // 申请
    // ==========================================

    fn create_request(&self, worker_id: i64, assignment_id: i64) -> Result<i64, String> {
        self.requests
            .create_request(worker_id, assignment_id)
            .map_err(|e| e.to_string())
    }

    fn cancel_request(&self, worker_id: i64, request_id: i64) -> Result<(), String> {
        self.requests
            .cancel_request(worker_id, request_id)
            .map_err(|e| e.to_string())
    }

    fn active_requests(&self, worker_id: i64) -> Result<Vec<ActiveRequestRow>, String> {
        self.requests
            .active_requests(worker_id)
            .map_err(|e| e.to_string())
    }

    fn received_requests(&self, receiver_id: i64) -> Result<Vec<ReceivedRequestRow>, String> {
        // 读路径按需执行过期→清理流水线 (无后台调度)
        self.offers
            .expire_and_purge(receiver_id, Self::today())
            .map_err(|e| e.to_string())?;

        self.requests
            .received_requests(receiver_id)
            .map_err(|e| e.to_string())
    }

    fn mark_request_seen(&self, receiver_id: i64, request_id: i64) -> Result<(), String> {
        self.visibility
            .mark_request_seen(receiver_id, request_id)
            .map_err(|e| e.to_string())
    }

    fn count_new_received_requests(&self, receiver_id: i64) -> Result<i64, String> {
        self.requests
            .count_new_received(receiver_id)
            .map_err(|e| e.to_string())
    }

    fn count_expired_sent_requests(&self, worker_id: i64) -> Result<i64, String> {
        self.requests
            .count_expired(worker_id)
            .map_err(|e| e.to_string())
    }

    fn count_expired_received_requests(&self, receiver_id: i64) -> Result<i64, String> {
        self.requests
            .count_expired_received(receiver_id)
            .map_err(|e| e.to_string())
    }

    fn expire_requests(&self) -> Result<usize, String> {
        self.requests
            .expire_by_past_shift_date(Self::today())
            .map_err(|e| e.to_string())
    }

    // ==========================================
    // 应答
    // ==========================================

    fn create_offer(
        &self,
        request_id: i64,
        offerer_id: i64,
        offered_assignment_id: i64,
    ) -> Result<i64, String> {
        self.offers
            .create_offer(request_id, offerer_id, offered_assignment_id)
            .map_err(|e| e.to_string())
    }

    fn list_visible_offers(&self, requester_id: i64) -> Result<Vec<VisibleOfferRow>, String> {
        self.offers
            .list_visible_offers(requester_id)
            .map_err(|e| e.to_string())
    }

    fn assignments_already_offered(&self, worker_id: i64) -> Result<Vec<i64>, String> {
        self.offers
            .assignments_already_offered(worker_id)
            .map_err(|e| e.to_string())
    }

    fn mark_offers_seen(&self, offer_ids: &[i64], requester_id: i64) -> Result<usize, String> {
        self.offers
            .mark_offers_seen(offer_ids, requester_id)
            .map_err(|e| e.to_string())
    }

    fn expire_and_purge_offers(&self, worker_id: i64) -> Result<(usize, usize), String> {
        self.offers
            .expire_and_purge(worker_id, Self::today())
            .map_err(|e| e.to_string())
    }

    fn count_expired_offers(&self, worker_id: i64) -> Result<i64, String> {
        self.offers
            .count_expired(worker_id)
            .map_err(|e| e.to_string())
    }

    // ==========================================
    // 撮合
    // ==========================================

    fn create_match(
        &self,
        request_id: i64,
        winning_offer_id: i64,
    ) -> Result<MatchCreated, String> {
        self.match_creator
            .create_match(request_id, winning_offer_id)
            .map_err(|e| e.to_string())
    }

    fn match_history(&self, worker_id: i64) -> Result<Vec<MatchHistoryRow>, String> {
        self.matches
            .match_history(worker_id)
            .map_err(|e| e.to_string())
    }

    fn matches_pending_validation(&self) -> Result<Vec<PendingMatchRow>, String> {
        self.matches.pending_validation().map_err(|e| e.to_string())
    }

    fn mark_matches_seen(&self, worker_id: i64, role: Role) -> Result<usize, String> {
        self.visibility
            .mark_matches_seen(worker_id, role)
            .map_err(|e| e.to_string())
    }

    // ==========================================
    // 审批
    // ==========================================

    fn decide_match(
        &self,
        match_id: i64,
        admin_id: i64,
        decision: ValidationDecision,
        comment: Option<&str>,
    ) -> Result<DecideResponse, String> {
        match self
            .validation_engine
            .decide(match_id, admin_id, decision, comment)
        {
            Ok(outcome) => Ok(DecideResponse {
                ok: true,
                message: match decision {
                    ValidationDecision::Approved => "撮合已通过, 换班已执行".to_string(),
                    ValidationDecision::Rejected => "撮合已驳回".to_string(),
                },
                outcome: Some(outcome),
            }),
            // 业务原因: 给出可读提示
            Err(e @ ExchangeError::NotFound { .. })
            | Err(e @ ExchangeError::AlreadyDecided { .. }) => Ok(DecideResponse {
                ok: false,
                message: e.to_string(),
                outcome: None,
            }),
            // 其余失败已整体回滚, 归一为内部错误
            Err(e) => {
                tracing::error!("撮合裁决失败, 事务已回滚: match_id={}, err={}", match_id, e);
                Ok(DecideResponse {
                    ok: false,
                    message: "内部错误, 操作未生效".to_string(),
                    outcome: None,
                })
            }
        }
    }

    fn validation_history(&self) -> Result<Vec<ValidationHistoryRow>, String> {
        self.validations
            .validation_history()
            .map_err(|e| e.to_string())
    }

    fn count_unseen_validations(&self) -> Result<i64, String> {
        self.visibility
            .count_unseen_validations()
            .map_err(|e| e.to_string())
    }

    fn mark_validations_seen(&self) -> Result<usize, String> {
        self.visibility
            .mark_validations_seen()
            .map_err(|e| e.to_string())
    }
}
