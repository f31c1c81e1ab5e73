// ==========================================
// 排班换班系统 - 班次实体
// ==========================================
// Shift 表示“某日期上某类型班”这一概念, 与具体员工无关;
// ShiftAssignment 才是“某员工某天上该班”
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 休班 (Libre) 的目录编码
pub const FREE_SHIFT_CODE: &str = "L";
/// 占位班次的目录编码（预留给多步换班的中转位）
pub const PLACEHOLDER_SHIFT_CODE: &str = "TMP";
/// 占位班次固定挂在这一天, 不参与任何真实排班
pub const PLACEHOLDER_SHIFT_DATE: &str = "1900-01-01";

/// 班次类型目录项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftType {
    pub shift_type_id: i64,
    pub name: String,
    /// 短编码, 如 "M"=早班, "T"=午班, "N"=夜班, "L"=休
    pub code: String,
}

/// 日历读模型: 一条分配连同其日期与班次编码
///
/// shift / shift_assignment 行不单独成实体对外暴露,
/// 统一以这一 join 视图流转, id 以整数传递
///
/// 说明:
/// - 月历渲染与换班快照都用这一结构, 避免调用方再发 N 次 join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSlot {
    pub assignment_id: i64,
    pub worker_id: i64,
    pub shift_id: i64,
    pub shift_date: NaiveDate,
    pub shift_type_id: i64,
    pub code: String,
    pub shift_name: String,
}
