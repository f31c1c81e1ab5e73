// ==========================================
// ValidationRepository - 审批记录仓储
// ==========================================
// 约束: validation.match_id UNIQUE, 重复裁决走 ON CONFLICT 更新,
//       永远不产生第二行
// ==========================================

use crate::domain::exchange::Validation;
use crate::domain::types::{MatchState, ValidationDecision};
use crate::repository::calendar_repo::parse_date_col;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::match_repo::{parse_decision, parse_match_state};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 审批历史行 (已裁决撮合 + 审批人 + 快照)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationHistoryRow {
    pub match_id: i64,
    pub match_state: MatchState,
    pub match_created_at: String,
    pub sender_username: String,
    pub receiver_username: String,
    /// 审批人用户名 (账号已删除时为 None)
    pub admin_username: Option<String>,
    pub decision: ValidationDecision,
    pub decided_at: String,
    pub comment: Option<String>,
    pub seen_by_coordinator: bool,
    pub requester_date: NaiveDate,
    pub requester_code: String,
    pub receiver_date: NaiveDate,
    pub receiver_code: String,
}

pub struct ValidationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ValidationRepository {
    /// 创建新的 ValidationRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按撮合 id 查询审批记录 (每撮合至多一行)
    pub fn find_by_match(&self, match_id: i64) -> RepositoryResult<Option<Validation>> {
        let conn = self.get_conn()?;
        let validation = conn
            .query_row(
                r#"SELECT validation_id, match_id, admin_id, decision, comment,
                          decided_at, seen_by_coordinator
                   FROM validation
                   WHERE match_id = ?1
                   LIMIT 1"#,
                params![match_id],
                |row| {
                    Ok(Validation {
                        validation_id: row.get(0)?,
                        match_id: row.get(1)?,
                        admin_id: row.get(2)?,
                        decision: parse_decision(row.get::<_, String>(3)?, 3)?,
                        comment: row.get(4)?,
                        decided_at: row.get(5)?,
                        seen_by_coordinator: row.get::<_, i64>(6)? == 1,
                    })
                },
            )
            .optional()?;
        Ok(validation)
    }

    /// 审批历史: 已裁决 (或超时) 的撮合全集
    pub fn validation_history(&self) -> RepositoryResult<Vec<ValidationHistoryRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT m.match_id, m.state, m.created_at,
                      ws.username, wr.username, wa.username,
                      v.decision, v.decided_at, v.comment, v.seen_by_coordinator,
                      m.requester_date, m.requester_code,
                      m.receiver_date, m.receiver_code
               FROM match_record m
               JOIN request r ON r.request_id = m.request_id
               JOIN worker ws ON ws.worker_id = r.requester_id
               JOIN worker wr ON wr.worker_id = m.receiver_id
               JOIN validation v ON v.match_id = m.match_id
               LEFT JOIN worker wa ON wa.worker_id = v.admin_id
               WHERE m.state IN (?1, ?2, ?3)
               ORDER BY v.decided_at DESC"#,
        )?;

        let rows = stmt
            .query_map(
                params![
                    MatchState::Validated.to_db_str(),
                    MatchState::Rejected.to_db_str(),
                    MatchState::Expired.to_db_str()
                ],
                |row| {
                    Ok(ValidationHistoryRow {
                        match_id: row.get(0)?,
                        match_state: parse_match_state(row.get::<_, String>(1)?, 1)?,
                        match_created_at: row.get(2)?,
                        sender_username: row.get(3)?,
                        receiver_username: row.get(4)?,
                        admin_username: row.get(5)?,
                        decision: parse_decision(row.get::<_, String>(6)?, 6)?,
                        decided_at: row.get(7)?,
                        comment: row.get(8)?,
                        seen_by_coordinator: row.get::<_, i64>(9)? == 1,
                        requester_date: parse_date_col(row.get::<_, String>(10)?, 10)?,
                        requester_code: row.get(11)?,
                        receiver_date: parse_date_col(row.get::<_, String>(12)?, 12)?,
                        receiver_code: row.get(13)?,
                    })
                },
            )?
            .collect::<Result<Vec<ValidationHistoryRow>, _>>()?;

        Ok(rows)
    }

    /// 统计协调员未读的审批记录 (角标用)
    pub fn count_unseen(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*)
               FROM validation
               WHERE seen_by_coordinator = 0"#,
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 全部审批记录置已读 (协调员进入历史页时调用)
    pub fn mark_all_seen(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            r#"UPDATE validation
               SET seen_by_coordinator = 1
               WHERE seen_by_coordinator = 0"#,
            [],
        )?;
        Ok(count)
    }
}

// ==========================================
// 事务内函数 (审批流程用)
// ==========================================

/// 写入/更新某撮合的审批记录, 返回 validation_id
///
/// ON CONFLICT(match_id) 把“每个撮合至多一行”交给约束本身,
/// 重复裁决只改既有行; seen_by_coordinator 清零让记录重新变为未读
pub fn upsert_decision_in(
    conn: &Connection,
    match_id: i64,
    admin_id: i64,
    decision: ValidationDecision,
    comment: Option<&str>,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO validation (match_id, admin_id, decision, comment, seen_by_coordinator)
           VALUES (?1, ?2, ?3, ?4, 0)
           ON CONFLICT(match_id)
           DO UPDATE SET decision = excluded.decision,
                         admin_id = excluded.admin_id,
                         comment = excluded.comment,
                         decided_at = datetime('now'),
                         seen_by_coordinator = 0"#,
        params![match_id, admin_id, decision.to_db_str(), comment],
    )?;

    let id: i64 = conn.query_row(
        "SELECT validation_id FROM validation WHERE match_id = ?1",
        params![match_id],
        |row| row.get(0),
    )?;
    Ok(id)
}
