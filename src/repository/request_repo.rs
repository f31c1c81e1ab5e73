// ==========================================
// RequestRepository - 换班申请仓储
// ==========================================
// 红线: Repository 不含业务逻辑, 归属/状态检查由引擎层组合
// ==========================================

use crate::domain::exchange::ExchangeRequest;
use crate::domain::shift::FREE_SHIFT_CODE;
use crate::domain::types::{OfferState, RequestState};
use crate::repository::calendar_repo::parse_date_col;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 申请人视角的活跃申请行（含目标班次的日期与编码）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRequestRow {
    pub request_id: i64,
    pub state: RequestState,
    pub created_at: String,
    pub assignment_id: i64,
    pub shift_date: NaiveDate,
    pub code: String,
    pub shift_name: String,
}

/// 受让人视角的收到申请行
///
/// 口径:
/// - 只展示受让人当天休班 (L) 的申请
/// - 排除自己的申请与已撮合的申请
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedRequestRow {
    pub request_id: i64,
    pub requester_id: i64,
    pub requester_username: String,
    pub created_at: String,
    pub shift_date: NaiveDate,
    pub code: String,
    pub shift_name: String,
    /// 该受让人是否已读
    pub seen: bool,
    /// 该受让人已提交的应答（如有）
    pub my_offer_id: Option<i64>,
    pub my_offer_state: Option<OfferState>,
    /// 是否已有效应答（应答存在且未撤回/未过期）
    pub answered: bool,
}

pub struct RequestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RequestRepository {
    /// 创建新的 RequestRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入申请 (初始状态 PENDING, is_active=1), 返回 request_id
    pub fn insert_request(&self, requester_id: i64, assignment_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO request (requester_id, assignment_id) VALUES (?1, ?2)",
            params![requester_id, assignment_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 id 查询申请
    pub fn find_by_id(&self, request_id: i64) -> RepositoryResult<Option<ExchangeRequest>> {
        let conn = self.get_conn()?;
        find_request_in(&conn, request_id)
    }

    /// 某分配上是否已有活跃申请
    pub fn has_active_request_for_assignment(&self, assignment_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let existing: Option<i64> = conn
            .query_row(
                r#"SELECT request_id
                   FROM request
                   WHERE assignment_id = ?1 AND is_active = 1
                   LIMIT 1"#,
                params![assignment_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.is_some())
    }

    /// 统计申请下的应答条数（撤回前置检查）
    pub fn count_offers(&self, request_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM offer WHERE request_id = ?1",
            params![request_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 撤回申请: 置 CANCELLED 并失活
    pub fn set_cancelled(&self, request_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"UPDATE request
               SET state = ?1, is_active = 0
               WHERE request_id = ?2"#,
            params![RequestState::Cancelled.to_db_str(), request_id],
        )?;
        Ok(())
    }

    /// 收到首条应答时把申请 PENDING → ANSWERED
    ///
    /// 条件写死在 WHERE 里, 并发下重复调用是无害空转
    pub fn mark_answered_if_pending(&self, request_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"UPDATE request
               SET state = ?1
               WHERE request_id = ?2
                 AND state = ?3
                 AND is_active = 1"#,
            params![
                RequestState::Answered.to_db_str(),
                request_id,
                RequestState::Pending.to_db_str()
            ],
        )?;
        Ok(())
    }

    /// 统计某员工已过期的发出申请
    pub fn count_expired_sent(&self, requester_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*)
               FROM request
               WHERE requester_id = ?1 AND state = ?2"#,
            params![requester_id, RequestState::Expired.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 申请人视角: 活跃且尚未撮合的申请列表
    pub fn active_requests(&self, requester_id: i64) -> RepositoryResult<Vec<ActiveRequestRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT r.request_id, r.state, r.created_at, r.assignment_id,
                      s.shift_date, st.code, st.name
               FROM request r
               JOIN shift_assignment sa ON sa.assignment_id = r.assignment_id
               JOIN shift s ON s.shift_id = sa.shift_id
               JOIN shift_type st ON st.shift_type_id = s.shift_type_id
               LEFT JOIN match_record m ON m.request_id = r.request_id
               WHERE r.requester_id = ?1
                 AND r.is_active = 1
                 AND m.match_id IS NULL
               ORDER BY s.shift_date ASC, r.created_at DESC"#,
        )?;

        let rows = stmt
            .query_map(params![requester_id], |row| {
                Ok(ActiveRequestRow {
                    request_id: row.get(0)?,
                    state: parse_request_state(row.get::<_, String>(1)?, 1)?,
                    created_at: row.get(2)?,
                    assignment_id: row.get(3)?,
                    shift_date: parse_date_col(row.get::<_, String>(4)?, 4)?,
                    code: row.get(5)?,
                    shift_name: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<ActiveRequestRow>, _>>()?;

        Ok(rows)
    }

    /// 受让人视角: 可应答的收到申请列表
    ///
    /// 口径与原系统一致:
    /// - 排除自己的申请
    /// - 排除已撮合的申请
    /// - 只展示受让人当天休班 (L) 的申请
    /// - 带上该受让人的已读标记与已提交应答
    pub fn received_requests(&self, receiver_id: i64) -> RepositoryResult<Vec<ReceivedRequestRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT r.request_id, r.requester_id, w.username, r.created_at,
                      s.shift_date, st.code, st.name,
                      IFNULL(rr.seen, 0) AS seen,
                      o.offer_id, o.state
               FROM request r
               JOIN worker w ON w.worker_id = r.requester_id
               JOIN shift_assignment sa ON sa.assignment_id = r.assignment_id
               JOIN shift s ON s.shift_id = sa.shift_id
               JOIN shift_type st ON st.shift_type_id = s.shift_type_id
               LEFT JOIN request_receipt rr
                         ON rr.request_id = r.request_id AND rr.receiver_id = ?1
               LEFT JOIN offer o
                         ON o.request_id = r.request_id AND o.offerer_id = ?1
               LEFT JOIN match_record m ON m.request_id = r.request_id
               WHERE r.is_active = 1
                 AND r.requester_id <> ?1
                 AND m.match_id IS NULL
                 AND r.state IN ('PENDING', 'ANSWERED', 'EXPIRED')
                 AND EXISTS (
                     SELECT 1
                     FROM shift_assignment sar
                     JOIN shift sr ON sr.shift_id = sar.shift_id
                     JOIN shift_type stc ON stc.shift_type_id = sr.shift_type_id
                     WHERE sar.worker_id = ?1
                       AND sr.shift_date = s.shift_date
                       AND stc.code = ?2
                 )
               ORDER BY s.shift_date ASC, r.created_at DESC"#,
        )?;

        let rows = stmt
            .query_map(params![receiver_id, FREE_SHIFT_CODE], |row| {
                let my_offer_state = row
                    .get::<_, Option<String>>(9)?
                    .map(|raw| parse_offer_state(raw, 9))
                    .transpose()?;
                let my_offer_id: Option<i64> = row.get(8)?;
                let answered = matches!(
                    my_offer_state,
                    Some(state) if !state.is_terminal()
                );
                Ok(ReceivedRequestRow {
                    request_id: row.get(0)?,
                    requester_id: row.get(1)?,
                    requester_username: row.get(2)?,
                    created_at: row.get(3)?,
                    shift_date: parse_date_col(row.get::<_, String>(4)?, 4)?,
                    code: row.get(5)?,
                    shift_name: row.get(6)?,
                    seen: row.get::<_, i64>(7)? == 1,
                    my_offer_id,
                    my_offer_state,
                    answered,
                })
            })?
            .collect::<Result<Vec<ReceivedRequestRow>, _>>()?;

        Ok(rows)
    }

    /// 统计受让人从未读过的新收到申请（角标用）
    pub fn count_new_received(&self, receiver_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*)
               FROM request r
               JOIN shift_assignment sa ON sa.assignment_id = r.assignment_id
               JOIN shift s ON s.shift_id = sa.shift_id
               LEFT JOIN request_receipt rr
                         ON rr.request_id = r.request_id AND rr.receiver_id = ?1
               WHERE r.is_active = 1
                 AND r.state = ?2
                 AND r.requester_id <> ?1
                 AND rr.request_id IS NULL
                 AND EXISTS (
                     SELECT 1
                     FROM shift_assignment sar
                     JOIN shift sr ON sr.shift_id = sar.shift_id
                     JOIN shift_type stc ON stc.shift_type_id = sr.shift_type_id
                     WHERE sar.worker_id = ?1
                       AND sr.shift_date = s.shift_date
                       AND stc.code = ?3
                 )"#,
            params![
                receiver_id,
                RequestState::Pending.to_db_str(),
                FREE_SHIFT_CODE
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 统计受让人视角下已过期的收到申请
    /// (只计其看过或应答过的, 口径与原系统一致)
    pub fn count_expired_received(&self, receiver_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(DISTINCT r.request_id)
               FROM request r
               LEFT JOIN request_receipt rr
                         ON rr.request_id = r.request_id AND rr.receiver_id = ?1
               LEFT JOIN offer o
                         ON o.request_id = r.request_id AND o.offerer_id = ?1
               LEFT JOIN match_record m ON m.request_id = r.request_id
               WHERE r.state = ?2
                 AND r.requester_id <> ?1
                 AND m.match_id IS NULL
                 AND (rr.request_id IS NOT NULL OR o.offer_id IS NOT NULL)"#,
            params![receiver_id, RequestState::Expired.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 标记收到申请为已读 (按受让人维度 upsert)
    pub fn mark_request_seen(&self, receiver_id: i64, request_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO request_receipt (request_id, receiver_id, seen, seen_at)
               VALUES (?1, ?2, 1, datetime('now'))
               ON CONFLICT(request_id, receiver_id)
               DO UPDATE SET seen = 1, seen_at = datetime('now')"#,
            params![request_id, receiver_id],
        )?;
        Ok(())
    }

    /// 批量过期: 目标班次日期已到/已过的活跃申请 → EXPIRED 并失活
    ///
    /// 核心不含定时器, 由外部调度任务或读路径按需调用
    pub fn expire_by_past_shift_date(&self, today: NaiveDate) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let today_str = today.format("%Y-%m-%d").to_string();
        let count = conn.execute(
            r#"UPDATE request
               SET state = ?1, is_active = 0
               WHERE is_active = 1
                 AND state IN (?2, ?3)
                 AND assignment_id IN (
                     SELECT sa.assignment_id
                     FROM shift_assignment sa
                     JOIN shift s ON s.shift_id = sa.shift_id
                     WHERE s.shift_date <= ?4
                 )"#,
            params![
                RequestState::Expired.to_db_str(),
                RequestState::Pending.to_db_str(),
                RequestState::Answered.to_db_str(),
                today_str
            ],
        )?;
        Ok(count)
    }
}

// ==========================================
// 事务内函数
// ==========================================

/// 按 id 查询申请 (事务内可用)
pub fn find_request_in(
    conn: &Connection,
    request_id: i64,
) -> RepositoryResult<Option<ExchangeRequest>> {
    let req = conn
        .query_row(
            r#"SELECT request_id, requester_id, assignment_id, state, is_active, created_at
               FROM request
               WHERE request_id = ?1
               LIMIT 1"#,
            params![request_id],
            |row| {
                Ok(ExchangeRequest {
                    request_id: row.get(0)?,
                    requester_id: row.get(1)?,
                    assignment_id: row.get(2)?,
                    state: parse_request_state(row.get::<_, String>(3)?, 3)?,
                    is_active: row.get::<_, i64>(4)? == 1,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(req)
}

/// 改写申请状态 (撮合关闭 / 审批驳回时在事务内调用)
pub fn set_request_state_in(
    conn: &Connection,
    request_id: i64,
    state: RequestState,
) -> RepositoryResult<()> {
    conn.execute(
        "UPDATE request SET state = ?1 WHERE request_id = ?2",
        params![state.to_db_str(), request_id],
    )?;
    Ok(())
}

/// 解析申请状态列
pub(crate) fn parse_request_state(raw: String, idx: usize) -> rusqlite::Result<RequestState> {
    RequestState::from_db_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("非法申请状态: {}", raw).into(),
        )
    })
}

/// 解析应答状态列
pub(crate) fn parse_offer_state(raw: String, idx: usize) -> rusqlite::Result<OfferState> {
    OfferState::from_db_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("非法应答状态: {}", raw).into(),
        )
    })
}
