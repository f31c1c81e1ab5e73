// ==========================================
// MatchRepository - 撮合仓储
// ==========================================
// 红线: 快照列只在 insert 时写入, 任何 UPDATE 不得触碰,
//       历史页面靠它在换班执行后仍可回放
// ==========================================

use crate::domain::exchange::MatchRecord;
use crate::domain::types::{MatchState, ValidationDecision};
use crate::repository::calendar_repo::parse_date_col;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 员工在某个撮合中的身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRole {
    Sender,   // 申请人一方
    Receiver, // 获胜应答人一方
}

/// 员工视角的撮合历史行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchHistoryRow {
    pub match_id: i64,
    pub state: MatchState,
    pub created_at: String,
    pub updated_at: String,
    pub sender_username: String,
    pub receiver_username: String,
    /// 审批信息 (未裁决时为 None)
    pub validation_decision: Option<ValidationDecision>,
    pub validation_decided_at: Option<String>,
    pub validation_comment: Option<String>,
    /// 换班前快照
    pub requester_date: NaiveDate,
    pub requester_code: String,
    pub receiver_date: NaiveDate,
    pub receiver_code: String,
    pub seen_by_sender: bool,
    pub seen_by_receiver: bool,
    /// 当前员工在该撮合中的身份
    pub my_role: MatchRole,
}

/// 协调员工作队列行 (待审批撮合)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMatchRow {
    pub match_id: i64,
    pub state: MatchState,
    pub created_at: String,
    pub request_id: i64,
    pub requester_id: i64,
    pub receiver_id: i64,
    pub sender_username: String,
    pub receiver_username: String,
    pub requester_date: NaiveDate,
    pub requester_code: String,
    pub receiver_date: NaiveDate,
    pub receiver_code: String,
    pub seen_by_coordinator: bool,
}

/// 换班前快照 (撮合创建时一次性读出)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    pub requester_date: NaiveDate,
    pub requester_code: String,
    pub receiver_date: NaiveDate,
    pub receiver_code: String,
}

/// 审批/换班所需的最小上下文
///
/// receiver_assignment_id 经获胜应答回连定位,
/// 申请側分配直接挂在 request 上
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext {
    pub match_id: i64,
    pub request_id: i64,
    pub requester_id: i64,
    pub receiver_id: i64,
    pub requester_assignment_id: i64,
    pub receiver_assignment_id: i64,
}

pub struct MatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MatchRepository {
    /// 创建新的 MatchRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按 id 查询撮合
    pub fn find_by_id(&self, match_id: i64) -> RepositoryResult<Option<MatchRecord>> {
        let conn = self.get_conn()?;
        let rec = conn
            .query_row(
                r#"SELECT match_id, request_id, receiver_id, state,
                          requester_date, requester_code, receiver_date, receiver_code,
                          seen_by_sender, seen_by_receiver, seen_by_coordinator,
                          created_at, updated_at
                   FROM match_record
                   WHERE match_id = ?1
                   LIMIT 1"#,
                params![match_id],
                |row| {
                    Ok(MatchRecord {
                        match_id: row.get(0)?,
                        request_id: row.get(1)?,
                        receiver_id: row.get(2)?,
                        state: parse_match_state(row.get::<_, String>(3)?, 3)?,
                        requester_date: parse_date_col(row.get::<_, String>(4)?, 4)?,
                        requester_code: row.get(5)?,
                        receiver_date: parse_date_col(row.get::<_, String>(6)?, 6)?,
                        receiver_code: row.get(7)?,
                        seen_by_sender: row.get::<_, i64>(8)? == 1,
                        seen_by_receiver: row.get::<_, i64>(9)? == 1,
                        seen_by_coordinator: row.get::<_, i64>(10)? == 1,
                        created_at: row.get(11)?,
                        updated_at: row.get(12)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    /// 员工视角: 参与过的全部撮合, 按最近活动排序
    pub fn match_history(&self, worker_id: i64) -> RepositoryResult<Vec<MatchHistoryRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT m.match_id, m.state, m.created_at, m.updated_at,
                      ws.username, wr.username,
                      v.decision, v.decided_at, v.comment,
                      m.requester_date, m.requester_code,
                      m.receiver_date, m.receiver_code,
                      m.seen_by_sender, m.seen_by_receiver,
                      CASE WHEN r.requester_id = ?1 THEN 'SENDER' ELSE 'RECEIVER' END
               FROM match_record m
               JOIN request r ON r.request_id = m.request_id
               JOIN worker ws ON ws.worker_id = r.requester_id
               JOIN worker wr ON wr.worker_id = m.receiver_id
               LEFT JOIN validation v ON v.match_id = m.match_id
               WHERE r.requester_id = ?1 OR m.receiver_id = ?1
               ORDER BY m.updated_at DESC, m.created_at DESC"#,
        )?;

        let rows = stmt
            .query_map(params![worker_id], |row| {
                let decision = row
                    .get::<_, Option<String>>(6)?
                    .map(|raw| parse_decision(raw, 6))
                    .transpose()?;
                let role_raw: String = row.get(15)?;
                Ok(MatchHistoryRow {
                    match_id: row.get(0)?,
                    state: parse_match_state(row.get::<_, String>(1)?, 1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                    sender_username: row.get(4)?,
                    receiver_username: row.get(5)?,
                    validation_decision: decision,
                    validation_decided_at: row.get(7)?,
                    validation_comment: row.get(8)?,
                    requester_date: parse_date_col(row.get::<_, String>(9)?, 9)?,
                    requester_code: row.get(10)?,
                    receiver_date: parse_date_col(row.get::<_, String>(11)?, 11)?,
                    receiver_code: row.get(12)?,
                    seen_by_sender: row.get::<_, i64>(13)? == 1,
                    seen_by_receiver: row.get::<_, i64>(14)? == 1,
                    my_role: if role_raw == "SENDER" {
                        MatchRole::Sender
                    } else {
                        MatchRole::Receiver
                    },
                })
            })?
            .collect::<Result<Vec<MatchHistoryRow>, _>>()?;

        Ok(rows)
    }

    /// 协调员工作队列: 待审批撮合
    pub fn pending_validation(&self) -> RepositoryResult<Vec<PendingMatchRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT m.match_id, m.state, m.created_at,
                      r.request_id, r.requester_id, m.receiver_id,
                      ws.username, wr.username,
                      m.requester_date, m.requester_code,
                      m.receiver_date, m.receiver_code,
                      m.seen_by_coordinator
               FROM match_record m
               JOIN request r ON r.request_id = m.request_id
               JOIN worker ws ON ws.worker_id = r.requester_id
               JOIN worker wr ON wr.worker_id = m.receiver_id
               WHERE m.state = ?1
               ORDER BY m.created_at DESC"#,
        )?;

        let rows = stmt
            .query_map(params![MatchState::PendingValidation.to_db_str()], |row| {
                Ok(PendingMatchRow {
                    match_id: row.get(0)?,
                    state: parse_match_state(row.get::<_, String>(1)?, 1)?,
                    created_at: row.get(2)?,
                    request_id: row.get(3)?,
                    requester_id: row.get(4)?,
                    receiver_id: row.get(5)?,
                    sender_username: row.get(6)?,
                    receiver_username: row.get(7)?,
                    requester_date: parse_date_col(row.get::<_, String>(8)?, 8)?,
                    requester_code: row.get(9)?,
                    receiver_date: parse_date_col(row.get::<_, String>(10)?, 10)?,
                    receiver_code: row.get(11)?,
                    seen_by_coordinator: row.get::<_, i64>(12)? == 1,
                })
            })?
            .collect::<Result<Vec<PendingMatchRow>, _>>()?;

        Ok(rows)
    }

    /// 协调员视角: 待审批撮合置已读
    pub fn mark_pending_seen_by_coordinator(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            r#"UPDATE match_record
               SET seen_by_coordinator = 1
               WHERE state = ?1 AND seen_by_coordinator = 0"#,
            params![MatchState::PendingValidation.to_db_str()],
        )?;
        Ok(count)
    }

    /// 申请人视角: 自己申请产生的撮合置已读
    pub fn mark_seen_as_sender(&self, worker_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            r#"UPDATE match_record
               SET seen_by_sender = 1
               WHERE seen_by_sender = 0
                 AND request_id IN (
                     SELECT request_id FROM request WHERE requester_id = ?1
                 )"#,
            params![worker_id],
        )?;
        Ok(count)
    }

    /// 应答人视角: 自己作为受让方的撮合置已读
    pub fn mark_seen_as_receiver(&self, worker_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            r#"UPDATE match_record
               SET seen_by_receiver = 1
               WHERE seen_by_receiver = 0
                 AND receiver_id = ?1"#,
            params![worker_id],
        )?;
        Ok(count)
    }
}

// ==========================================
// 事务内函数 (撮合创建 / 审批流程用)
// ==========================================

/// 读取换班前快照: 申请侧与获胜应答侧的 (日期, 班次编码)
///
/// join 落空说明上游数据已不一致, 由引擎层按致命错误处理, 不重试
pub fn snapshot_for_match_in(
    conn: &Connection,
    request_id: i64,
    receiver_id: i64,
) -> RepositoryResult<Option<MatchSnapshot>> {
    let snapshot = conn
        .query_row(
            r#"SELECT se.shift_date, ste.code, sr.shift_date, str_.code
               FROM request req
               JOIN shift_assignment sae ON sae.assignment_id = req.assignment_id
               JOIN shift se ON se.shift_id = sae.shift_id
               JOIN shift_type ste ON ste.shift_type_id = se.shift_type_id
               JOIN offer o ON o.request_id = req.request_id AND o.offerer_id = ?2
               JOIN shift_assignment sar ON sar.assignment_id = o.offered_assignment_id
               JOIN shift sr ON sr.shift_id = sar.shift_id
               JOIN shift_type str_ ON str_.shift_type_id = sr.shift_type_id
               WHERE req.request_id = ?1
               LIMIT 1"#,
            params![request_id, receiver_id],
            |row| {
                Ok(MatchSnapshot {
                    requester_date: parse_date_col(row.get::<_, String>(0)?, 0)?,
                    requester_code: row.get(1)?,
                    receiver_date: parse_date_col(row.get::<_, String>(2)?, 2)?,
                    receiver_code: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(snapshot)
}

/// 插入撮合 (初始 PENDING_VALIDATION, 三个已读标记全 0), 返回 match_id
pub fn insert_match_in(
    conn: &Connection,
    request_id: i64,
    receiver_id: i64,
    snapshot: &MatchSnapshot,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO match_record
           (request_id, receiver_id, state,
            requester_date, requester_code, receiver_date, receiver_code,
            seen_by_sender, seen_by_receiver, seen_by_coordinator)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 0)"#,
        params![
            request_id,
            receiver_id,
            MatchState::PendingValidation.to_db_str(),
            snapshot.requester_date.format("%Y-%m-%d").to_string(),
            snapshot.requester_code,
            snapshot.receiver_date.format("%Y-%m-%d").to_string(),
            snapshot.receiver_code,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 读取审批/换班所需的最小上下文
pub fn load_match_context_in(
    conn: &Connection,
    match_id: i64,
) -> RepositoryResult<Option<MatchContext>> {
    let ctx = conn
        .query_row(
            r#"SELECT m.match_id, m.request_id, r.requester_id, m.receiver_id,
                      r.assignment_id, o.offered_assignment_id
               FROM match_record m
               JOIN request r ON r.request_id = m.request_id
               JOIN offer o ON o.request_id = r.request_id
                           AND o.offerer_id = m.receiver_id
               WHERE m.match_id = ?1
               LIMIT 1"#,
            params![match_id],
            |row| {
                Ok(MatchContext {
                    match_id: row.get(0)?,
                    request_id: row.get(1)?,
                    requester_id: row.get(2)?,
                    receiver_id: row.get(3)?,
                    requester_assignment_id: row.get(4)?,
                    receiver_assignment_id: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(ctx)
}

/// 读取撮合当前状态 (事务内, 审批前置检查)
pub fn match_state_in(conn: &Connection, match_id: i64) -> RepositoryResult<Option<MatchState>> {
    let state = conn
        .query_row(
            "SELECT state FROM match_record WHERE match_id = ?1 LIMIT 1",
            params![match_id],
            |row| parse_match_state(row.get::<_, String>(0)?, 0),
        )
        .optional()?;
    Ok(state)
}

/// 把撮合写入裁决终态并清零三个已读标记 (各方重新收到未读通知)
///
/// WHERE 仍要求 PENDING_VALIDATION, 与引擎层的状态机检查双保险;
/// 返回受影响行数, 0 说明撮合已被并发裁决
pub fn set_match_decided_in(
    conn: &Connection,
    match_id: i64,
    state: MatchState,
) -> RepositoryResult<usize> {
    let count = conn.execute(
        r#"UPDATE match_record
           SET state = ?1,
               seen_by_sender = 0,
               seen_by_receiver = 0,
               seen_by_coordinator = 0,
               updated_at = datetime('now')
           WHERE match_id = ?2
             AND state = ?3"#,
        params![
            state.to_db_str(),
            match_id,
            MatchState::PendingValidation.to_db_str()
        ],
    )?;
    Ok(count)
}

/// 解析撮合状态列
pub(crate) fn parse_match_state(raw: String, idx: usize) -> rusqlite::Result<MatchState> {
    MatchState::from_db_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("非法撮合状态: {}", raw).into(),
        )
    })
}

/// 解析审批裁决列
pub(crate) fn parse_decision(raw: String, idx: usize) -> rusqlite::Result<ValidationDecision> {
    ValidationDecision::from_db_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("非法审批裁决: {}", raw).into(),
        )
    })
}
