// ==========================================
// CalendarRepository - 排班日历仓储
// ==========================================
// 红线: 目录 get-or-create 必须走 INSERT OR IGNORE + SELECT,
//       由 UNIQUE 约束兜底, 不做 select-then-branch
// 红线: 换班不删除分配行, 只把 shift_id 重新指向
// ==========================================

use crate::domain::shift::{
    AssignmentSlot, ShiftType, FREE_SHIFT_CODE, PLACEHOLDER_SHIFT_CODE, PLACEHOLDER_SHIFT_DATE,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct CalendarRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CalendarRepository {
    /// 创建新的 CalendarRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询员工某年某月的全部班次分配（月历渲染用）
    pub fn assignments_for_worker_in_month(
        &self,
        worker_id: i64,
        year: i32,
        month: u32,
    ) -> RepositoryResult<Vec<AssignmentSlot>> {
        let (from, to) = month_bounds(year, month)?;
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT sa.assignment_id, sa.worker_id, sa.shift_id,
                      s.shift_date, st.shift_type_id, st.code, st.name
               FROM shift_assignment sa
               JOIN shift s ON s.shift_id = sa.shift_id
               JOIN shift_type st ON st.shift_type_id = s.shift_type_id
               WHERE sa.worker_id = ?1
                 AND s.shift_date >= ?2
                 AND s.shift_date < ?3
               ORDER BY s.shift_date ASC"#,
        )?;

        let slots = stmt
            .query_map(params![worker_id, from, to], map_slot_row)?
            .collect::<Result<Vec<AssignmentSlot>, _>>()?;

        Ok(slots)
    }

    /// 查询员工某年某月的休班日期（code = L）
    ///
    /// 用途:
    /// - 收到申请列表的“当天是否有空”过滤
    /// - 前端日历的空闲日高亮
    pub fn free_dates_for_worker(
        &self,
        worker_id: i64,
        year: i32,
        month: u32,
    ) -> RepositoryResult<Vec<NaiveDate>> {
        let (from, to) = month_bounds(year, month)?;
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT s.shift_date
               FROM shift_assignment sa
               JOIN shift s ON s.shift_id = sa.shift_id
               JOIN shift_type st ON st.shift_type_id = s.shift_type_id
               WHERE sa.worker_id = ?1
                 AND st.code = ?2
                 AND s.shift_date >= ?3
                 AND s.shift_date < ?4
               ORDER BY s.shift_date ASC"#,
        )?;

        let dates = stmt
            .query_map(params![worker_id, FREE_SHIFT_CODE, from, to], |row| {
                parse_date_col(row.get::<_, String>(0)?, 0)
            })?
            .collect::<Result<Vec<NaiveDate>, _>>()?;

        Ok(dates)
    }

    /// 获取或创建某日期的休班 Shift, 返回 shift_id
    pub fn get_or_create_free_shift(&self, date: NaiveDate) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        get_or_create_free_shift_in(&conn, date)
    }

    /// 获取或创建占位 Shift, 返回 shift_id
    pub fn get_or_create_placeholder_shift(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        get_or_create_placeholder_shift_in(&conn)
    }

    /// 给员工在某日期上指定班次（upsert, 见 set_assignment_in）
    pub fn set_assignment(
        &self,
        worker_id: i64,
        date: NaiveDate,
        shift_id: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        set_assignment_in(&conn, worker_id, date, shift_id)
    }

    /// 读取单条分配连同日期与班次编码
    pub fn assignment_slot(&self, assignment_id: i64) -> RepositoryResult<Option<AssignmentSlot>> {
        let conn = self.get_conn()?;
        assignment_slot_in(&conn, assignment_id)
    }

    /// 班次类型目录全集 (外部层渲染图例/下拉用)
    pub fn list_shift_types(&self) -> RepositoryResult<Vec<ShiftType>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT shift_type_id, name, code FROM shift_type ORDER BY shift_type_id ASC",
        )?;
        let types = stmt
            .query_map([], |row| {
                Ok(ShiftType {
                    shift_type_id: row.get(0)?,
                    name: row.get(1)?,
                    code: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<ShiftType>, _>>()?;
        Ok(types)
    }
}

// ==========================================
// 事务内函数 (供复合操作在同一个 Transaction 里调用)
// ==========================================
// rusqlite 的 Transaction 解引用为 Connection,
// 这些函数同时服务于自动提交路径与事务路径

/// 获取或创建班次类型目录项, 返回 shift_type_id
///
/// INSERT OR IGNORE 由 shift_type.code 的 UNIQUE 约束兜底,
/// 并发重复调用只会落一行
pub fn get_or_create_shift_type_in(
    conn: &Connection,
    code: &str,
    name: &str,
) -> RepositoryResult<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO shift_type (name, code) VALUES (?1, ?2)",
        params![name, code],
    )?;

    let id: i64 = conn.query_row(
        "SELECT shift_type_id FROM shift_type WHERE code = ?1",
        params![code],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// 获取或创建某日期的休班 Shift, 返回 shift_id
///
/// UNIQUE(shift_type_id, shift_date) 兜底, 与类型目录同样免竞态
pub fn get_or_create_free_shift_in(conn: &Connection, date: NaiveDate) -> RepositoryResult<i64> {
    let type_id = get_or_create_shift_type_in(conn, FREE_SHIFT_CODE, "休班")?;
    let date_str = date.format("%Y-%m-%d").to_string();

    conn.execute(
        "INSERT OR IGNORE INTO shift (shift_type_id, shift_date) VALUES (?1, ?2)",
        params![type_id, date_str],
    )?;

    let id: i64 = conn.query_row(
        "SELECT shift_id FROM shift WHERE shift_type_id = ?1 AND shift_date = ?2",
        params![type_id, date_str],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// 获取或创建占位 Shift (TMP @ 1900-01-01), 返回 shift_id
pub fn get_or_create_placeholder_shift_in(conn: &Connection) -> RepositoryResult<i64> {
    let type_id = get_or_create_shift_type_in(conn, PLACEHOLDER_SHIFT_CODE, "占位")?;

    conn.execute(
        "INSERT OR IGNORE INTO shift (shift_type_id, shift_date) VALUES (?1, ?2)",
        params![type_id, PLACEHOLDER_SHIFT_DATE],
    )?;

    let id: i64 = conn.query_row(
        "SELECT shift_id FROM shift WHERE shift_type_id = ?1 AND shift_date = ?2",
        params![type_id, PLACEHOLDER_SHIFT_DATE],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// 给员工在某日期上指定班次
///
/// 策略:
/// - 该员工当天已有分配行 → 只把 shift_id 重新指向（不删行）
/// - 当天没有分配行 → 插入新行
///
/// (worker, 日期) 的唯一性由这里的 upsert 保证, 日期存在 shift 表上,
/// 无法用单表键约束
pub fn set_assignment_in(
    conn: &Connection,
    worker_id: i64,
    date: NaiveDate,
    shift_id: i64,
) -> RepositoryResult<()> {
    let date_str = date.format("%Y-%m-%d").to_string();

    let existing: Option<i64> = conn
        .query_row(
            r#"SELECT sa.assignment_id
               FROM shift_assignment sa
               JOIN shift s ON s.shift_id = sa.shift_id
               WHERE sa.worker_id = ?1 AND s.shift_date = ?2
               LIMIT 1"#,
            params![worker_id, date_str],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(assignment_id) => {
            conn.execute(
                "UPDATE shift_assignment SET shift_id = ?1 WHERE assignment_id = ?2",
                params![shift_id, assignment_id],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO shift_assignment (worker_id, shift_id) VALUES (?1, ?2)",
                params![worker_id, shift_id],
            )?;
        }
    }

    Ok(())
}

/// 读取单条分配连同日期与班次编码 (换班前置读取用)
pub fn assignment_slot_in(
    conn: &Connection,
    assignment_id: i64,
) -> RepositoryResult<Option<AssignmentSlot>> {
    let slot = conn
        .query_row(
            r#"SELECT sa.assignment_id, sa.worker_id, sa.shift_id,
                      s.shift_date, st.shift_type_id, st.code, st.name
               FROM shift_assignment sa
               JOIN shift s ON s.shift_id = sa.shift_id
               JOIN shift_type st ON st.shift_type_id = s.shift_type_id
               WHERE sa.assignment_id = ?1
               LIMIT 1"#,
            params![assignment_id],
            map_slot_row,
        )
        .optional()?;
    Ok(slot)
}

/// 分配是否属于该员工
pub fn assignment_belongs_to_in(
    conn: &Connection,
    assignment_id: i64,
    worker_id: i64,
) -> RepositoryResult<bool> {
    let owned: Option<i64> = conn
        .query_row(
            r#"SELECT assignment_id
               FROM shift_assignment
               WHERE assignment_id = ?1 AND worker_id = ?2
               LIMIT 1"#,
            params![assignment_id, worker_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owned.is_some())
}

/// 映射数据库行到 AssignmentSlot
fn map_slot_row(row: &rusqlite::Row) -> rusqlite::Result<AssignmentSlot> {
    Ok(AssignmentSlot {
        assignment_id: row.get(0)?,
        worker_id: row.get(1)?,
        shift_id: row.get(2)?,
        shift_date: parse_date_col(row.get::<_, String>(3)?, 3)?,
        shift_type_id: row.get(4)?,
        code: row.get(5)?,
        shift_name: row.get(6)?,
    })
}

/// 解析 YYYY-MM-DD 文本列
pub(crate) fn parse_date_col(raw: String, idx: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 计算 [月初, 下月初) 的日期边界字符串
fn month_bounds(year: i32, month: u32) -> RepositoryResult<(String, String)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        RepositoryError::InternalError(format!("非法年月: {}-{}", year, month))
    })?;
    let to = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| RepositoryError::InternalError(format!("非法年月: {}-{}", year, month)))?;

    Ok((
        from.format("%Y-%m-%d").to_string(),
        to.format("%Y-%m-%d").to_string(),
    ))
}
