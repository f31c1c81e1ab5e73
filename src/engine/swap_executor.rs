// ==========================================
// SwapExecutor - 换班执行
// ==========================================
// 语义: 按日期交换班次类型, 不交换分配行 id —
//       分配行只被重新指向, 不新增也不删除 (upsert 除外)
// 红线: 只改 shift / shift_assignment, 不碰申请/应答/撮合/审批;
//       必须在审批事务内整体执行
// ==========================================

use crate::engine::error::{ExchangeError, ExchangeResult};
use crate::repository::calendar_repo::{
    assignment_slot_in, get_or_create_free_shift_in, set_assignment_in,
};
use crate::repository::match_repo::MatchContext;
use rusqlite::Connection;

/// 执行四格换班 (调用方事务内)
///
/// # 流程
/// 1. 读双方当前 (班次, 日期); 任一侧落空 → MissingAssignmentData, 事务中止
/// 2. 为双方日期各自 get-or-create 休班 Shift (日期相同时是同一行)
/// 3. 四次分配 upsert:
///    - 申请人 @ 自己原日期 → 休班
///    - 申请人 @ 受让人原日期 → 受让人原班次
///    - 受让人 @ 自己原日期 → 休班
///    - 受让人 @ 申请人原日期 → 申请人原班次
///
/// 四个目标 (员工, 日期) 两两不同, 顺序无语义, 但要么全做要么全不做
pub fn execute_swap_in(conn: &Connection, ctx: &MatchContext) -> ExchangeResult<()> {
    // 1. 读双方当前班次与日期
    let requester_slot = assignment_slot_in(conn, ctx.requester_assignment_id)?.ok_or(
        ExchangeError::MissingAssignmentData {
            assignment_id: ctx.requester_assignment_id,
        },
    )?;
    let receiver_slot = assignment_slot_in(conn, ctx.receiver_assignment_id)?.ok_or(
        ExchangeError::MissingAssignmentData {
            assignment_id: ctx.receiver_assignment_id,
        },
    )?;

    // 2. 双方日期各自保证休班 Shift 存在
    let free_for_requester = get_or_create_free_shift_in(conn, requester_slot.shift_date)?;
    let free_for_receiver = get_or_create_free_shift_in(conn, receiver_slot.shift_date)?;

    // 3. 四格 upsert
    set_assignment_in(conn, ctx.requester_id, requester_slot.shift_date, free_for_requester)?;
    set_assignment_in(conn, ctx.requester_id, receiver_slot.shift_date, receiver_slot.shift_id)?;
    set_assignment_in(conn, ctx.receiver_id, receiver_slot.shift_date, free_for_receiver)?;
    set_assignment_in(conn, ctx.receiver_id, requester_slot.shift_date, requester_slot.shift_id)?;

    tracing::info!(
        "换班已执行: requester {} ({} {}) ↔ receiver {} ({} {})",
        ctx.requester_id,
        requester_slot.shift_date,
        requester_slot.code,
        ctx.receiver_id,
        receiver_slot.shift_date,
        receiver_slot.code
    );

    Ok(())
}
