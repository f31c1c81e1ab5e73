// ==========================================
// OfferRepository - 换班应答仓储
// ==========================================
// 约束: UNIQUE(request_id, offerer_id) 兜底“同一申请只许应答一次”,
//       冲突由引擎层翻译为业务提示
// ==========================================

use crate::domain::exchange::Offer;
use crate::domain::types::{OfferState, RequestState};
use crate::repository::calendar_repo::parse_date_col;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::request_repo::parse_offer_state;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 申请人视角的待选应答行（含应答人身份与所押班次）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibleOfferRow {
    pub request_id: i64,
    pub offer_id: i64,
    pub state: OfferState,
    pub seen_by_requester: bool,
    pub is_winning: bool,
    pub created_at: String,
    pub offerer_id: i64,
    pub offerer_username: String,
    pub shift_date: NaiveDate,
    pub code: String,
    pub shift_name: String,
}

pub struct OfferRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OfferRepository {
    /// 创建新的 OfferRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入应答 (初始状态 PENDING), 返回 offer_id
    ///
    /// 重复应答触发 UNIQUE(request_id, offerer_id),
    /// id 不存在触发 FOREIGN KEY, 均由错误映射归类
    pub fn insert_offer(
        &self,
        request_id: i64,
        offerer_id: i64,
        offered_assignment_id: i64,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO offer (request_id, offerer_id, offered_assignment_id)
               VALUES (?1, ?2, ?3)"#,
            params![request_id, offerer_id, offered_assignment_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 id 查询应答
    pub fn find_by_id(&self, offer_id: i64) -> RepositoryResult<Option<Offer>> {
        let conn = self.get_conn()?;
        find_offer_in(&conn, offer_id)
    }

    /// 申请人视角: 活跃未撮合申请下的全部 PENDING 应答
    pub fn visible_offers(&self, requester_id: i64) -> RepositoryResult<Vec<VisibleOfferRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT o.request_id, o.offer_id, o.state, o.seen_by_requester,
                      o.is_winning, o.created_at,
                      o.offerer_id, w.username,
                      s.shift_date, st.code, st.name
               FROM request r
               JOIN offer o ON o.request_id = r.request_id
               JOIN worker w ON w.worker_id = o.offerer_id
               JOIN shift_assignment sa ON sa.assignment_id = o.offered_assignment_id
               JOIN shift s ON s.shift_id = sa.shift_id
               JOIN shift_type st ON st.shift_type_id = s.shift_type_id
               LEFT JOIN match_record m ON m.request_id = r.request_id
               WHERE r.requester_id = ?1
                 AND r.is_active = 1
                 AND m.match_id IS NULL
                 AND o.state = ?2
               ORDER BY o.request_id ASC, o.created_at DESC"#,
        )?;

        let rows = stmt
            .query_map(
                params![requester_id, OfferState::Pending.to_db_str()],
                |row| {
                    Ok(VisibleOfferRow {
                        request_id: row.get(0)?,
                        offer_id: row.get(1)?,
                        state: parse_offer_state(row.get::<_, String>(2)?, 2)?,
                        seen_by_requester: row.get::<_, i64>(3)? == 1,
                        is_winning: row.get::<_, i64>(4)? == 1,
                        created_at: row.get(5)?,
                        offerer_id: row.get(6)?,
                        offerer_username: row.get(7)?,
                        shift_date: parse_date_col(row.get::<_, String>(8)?, 8)?,
                        code: row.get(9)?,
                        shift_name: row.get(10)?,
                    })
                },
            )?
            .collect::<Result<Vec<VisibleOfferRow>, _>>()?;

        Ok(rows)
    }

    /// 员工已押出的分配 id 集合 (去重)
    ///
    /// 口径: 应答未到终态 (未撤回/未过期) 且父申请仍存活,
    /// 用于阻止同一分配被重复押到多个换班里
    pub fn assignments_already_offered(&self, worker_id: i64) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT DISTINCT o.offered_assignment_id
               FROM offer o
               JOIN request r ON r.request_id = o.request_id
               WHERE o.offerer_id = ?1
                 AND o.state NOT IN (?2, ?3)
                 AND r.is_active = 1
                 AND r.state IN (?4, ?5)"#,
        )?;

        let ids = stmt
            .query_map(
                params![
                    worker_id,
                    OfferState::Cancelled.to_db_str(),
                    OfferState::Expired.to_db_str(),
                    RequestState::Pending.to_db_str(),
                    RequestState::Answered.to_db_str()
                ],
                |row| row.get::<_, i64>(0),
            )?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    /// 批量置已读 (只动属于该申请人且未读的应答)
    ///
    /// 归属过滤直接写进 UPDATE, 不单独做权限检查;
    /// 返回“尝试标记”的条数, 仅作 UI 提示, 不保证全部落库
    pub fn mark_offers_seen(
        &self,
        offer_ids: &[i64],
        requester_id: i64,
    ) -> RepositoryResult<usize> {
        if offer_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.get_conn()?;

        let placeholders = offer_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            r#"UPDATE offer
               SET seen_by_requester = 1
               WHERE offer_id IN ({})
                 AND seen_by_requester = 0
                 AND request_id IN (
                     SELECT request_id FROM request WHERE requester_id = ?
                 )"#,
            placeholders
        );

        let mut values: Vec<Value> = offer_ids.iter().map(|id| Value::from(*id)).collect();
        values.push(Value::from(requester_id));

        conn.execute(&sql, params_from_iter(values))?;
        Ok(offer_ids.len())
    }

    /// 批量过期: 所押班次日期已到/已过的 PENDING 应答 → EXPIRED
    /// (只处理父申请仍存活的, 读路径按需调用)
    pub fn expire_by_past_shift_date(
        &self,
        worker_id: i64,
        today: NaiveDate,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let today_str = today.format("%Y-%m-%d").to_string();

        let count = conn.execute(
            r#"UPDATE offer
               SET state = ?1
               WHERE offerer_id = ?2
                 AND state = ?3
                 AND request_id IN (
                     SELECT request_id FROM request
                     WHERE is_active = 1 AND state IN (?4, ?5)
                 )
                 AND offered_assignment_id IN (
                     SELECT sa.assignment_id
                     FROM shift_assignment sa
                     JOIN shift s ON s.shift_id = sa.shift_id
                     WHERE s.shift_date <= ?6
                 )"#,
            params![
                OfferState::Expired.to_db_str(),
                worker_id,
                OfferState::Pending.to_db_str(),
                RequestState::Pending.to_db_str(),
                RequestState::Answered.to_db_str(),
                today_str
            ],
        )?;
        Ok(count)
    }

    /// 清理已过期应答: 父申请仍存活时删除, 释放该员工重新应答的资格
    pub fn purge_expired_if_request_still_live(&self, worker_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            r#"DELETE FROM offer
               WHERE offerer_id = ?1
                 AND state = ?2
                 AND request_id IN (
                     SELECT request_id FROM request
                     WHERE is_active = 1 AND state IN (?3, ?4)
                 )"#,
            params![
                worker_id,
                OfferState::Expired.to_db_str(),
                RequestState::Pending.to_db_str(),
                RequestState::Answered.to_db_str()
            ],
        )?;
        Ok(count)
    }

    /// 统计某员工已过期的应答
    pub fn count_expired(&self, worker_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*)
               FROM offer
               WHERE offerer_id = ?1 AND state = ?2"#,
            params![worker_id, OfferState::Expired.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ==========================================
// 事务内函数 (撮合流程用)
// ==========================================

/// 按 id 查询应答 (事务内可用)
pub fn find_offer_in(conn: &Connection, offer_id: i64) -> RepositoryResult<Option<Offer>> {
    let offer = conn
        .query_row(
            r#"SELECT offer_id, request_id, offerer_id, offered_assignment_id,
                      state, is_winning, seen_by_requester, created_at
               FROM offer
               WHERE offer_id = ?1
               LIMIT 1"#,
            params![offer_id],
            map_offer_row,
        )
        .optional()?;
    Ok(offer)
}

/// 把获胜应答置 SELECTED + is_winning
pub fn mark_offer_selected_in(conn: &Connection, offer_id: i64) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE offer
           SET state = ?1, is_winning = 1
           WHERE offer_id = ?2"#,
        params![OfferState::Selected.to_db_str(), offer_id],
    )?;
    Ok(())
}

/// 同一申请下其余 PENDING 应答置 NOT_SELECTED, 保证只留一条获胜
/// (已撤回/已过期的应答不回改, 终态不可逆)
pub fn mark_other_offers_not_selected_in(
    conn: &Connection,
    request_id: i64,
    winning_offer_id: i64,
) -> RepositoryResult<usize> {
    let count = conn.execute(
        r#"UPDATE offer
           SET state = ?1, is_winning = 0
           WHERE request_id = ?2
             AND offer_id <> ?3
             AND state = ?4"#,
        params![
            OfferState::NotSelected.to_db_str(),
            request_id,
            winning_offer_id,
            OfferState::Pending.to_db_str()
        ],
    )?;
    Ok(count)
}

/// 映射数据库行到 Offer 对象
fn map_offer_row(row: &rusqlite::Row) -> rusqlite::Result<Offer> {
    Ok(Offer {
        offer_id: row.get(0)?,
        request_id: row.get(1)?,
        offerer_id: row.get(2)?,
        offered_assignment_id: row.get(3)?,
        state: parse_offer_state(row.get::<_, String>(4)?, 4)?,
        is_winning: row.get::<_, i64>(5)? == 1,
        seen_by_requester: row.get::<_, i64>(6)? == 1,
        created_at: row.get(7)?,
    })
}
