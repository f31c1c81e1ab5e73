// ==========================================
// 排班换班系统 - 数据库 Schema 初始化
// ==========================================
// 职责: 以幂等方式建表（CREATE TABLE IF NOT EXISTS）
// 约束: 所有 get-or-create 查找键必须有 UNIQUE 约束兜底,
//       防止 select-then-insert 竞态产生重复目录行
// ==========================================

use rusqlite::Connection;

/// 初始化数据库 schema（幂等）
///
/// # 说明
/// - 日期列统一存 ISO-8601 文本（YYYY-MM-DD），支持字符串比较
/// - 布尔列统一存 INTEGER 0/1
/// - 状态列存 SCREAMING_SNAKE_CASE 文本，与 `domain::types` 的 to_db_str 对齐
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- 员工表（认证/口令由外部登录层负责，这里只保留外键所需字段）
        CREATE TABLE IF NOT EXISTS worker (
            worker_id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            role TEXT NOT NULL DEFAULT 'WORKER',
            is_active INTEGER NOT NULL DEFAULT 1
        );

        -- 班次类型目录（M=早班, T=午班, N=夜班, L=休, TMP=占位）
        CREATE TABLE IF NOT EXISTS shift_type (
            shift_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE
        );

        -- 班次: “某日期上某类型班”这一概念, 与具体员工无关
        CREATE TABLE IF NOT EXISTS shift (
            shift_id INTEGER PRIMARY KEY AUTOINCREMENT,
            shift_type_id INTEGER NOT NULL REFERENCES shift_type(shift_type_id),
            shift_date TEXT NOT NULL,
            UNIQUE(shift_type_id, shift_date)
        );

        -- 班次分配: 员工在某日期上某班
        -- (worker, 日期) 唯一性由应用层 set_assignment 的 upsert 保证,
        -- 因为日期存在 shift 表上, 无法直接建键
        CREATE TABLE IF NOT EXISTS shift_assignment (
            assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            worker_id INTEGER NOT NULL REFERENCES worker(worker_id),
            shift_id INTEGER NOT NULL REFERENCES shift(shift_id)
        );

        CREATE INDEX IF NOT EXISTS idx_assignment_worker
            ON shift_assignment(worker_id);

        -- 换班申请
        CREATE TABLE IF NOT EXISTS request (
            request_id INTEGER PRIMARY KEY AUTOINCREMENT,
            requester_id INTEGER NOT NULL REFERENCES worker(worker_id),
            assignment_id INTEGER NOT NULL REFERENCES shift_assignment(assignment_id),
            state TEXT NOT NULL DEFAULT 'PENDING',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_request_assignment
            ON request(assignment_id);

        -- 应答: 受让人以自己的一次班次分配换取申请人的分配
        CREATE TABLE IF NOT EXISTS offer (
            offer_id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id INTEGER NOT NULL REFERENCES request(request_id),
            offerer_id INTEGER NOT NULL REFERENCES worker(worker_id),
            offered_assignment_id INTEGER NOT NULL REFERENCES shift_assignment(assignment_id),
            state TEXT NOT NULL DEFAULT 'PENDING',
            is_winning INTEGER NOT NULL DEFAULT 0,
            seen_by_requester INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(request_id, offerer_id)
        );

        -- 撮合结果: 一张申请与一条获胜应答的配对, 等待协调员审批
        -- 快照列在创建时写入一次, 之后不再变更
        CREATE TABLE IF NOT EXISTS match_record (
            match_id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id INTEGER NOT NULL REFERENCES request(request_id),
            receiver_id INTEGER NOT NULL REFERENCES worker(worker_id),
            state TEXT NOT NULL DEFAULT 'PENDING_VALIDATION',
            requester_date TEXT NOT NULL,
            requester_code TEXT NOT NULL,
            receiver_date TEXT NOT NULL,
            receiver_code TEXT NOT NULL,
            seen_by_sender INTEGER NOT NULL DEFAULT 0,
            seen_by_receiver INTEGER NOT NULL DEFAULT 0,
            seen_by_coordinator INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_match_request
            ON match_record(request_id);

        -- 审批记录: 每个 match 至多一行, 重复裁决走 UPDATE
        CREATE TABLE IF NOT EXISTS validation (
            validation_id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL UNIQUE REFERENCES match_record(match_id),
            admin_id INTEGER NOT NULL REFERENCES worker(worker_id),
            decision TEXT NOT NULL,
            comment TEXT,
            decided_at TEXT NOT NULL DEFAULT (datetime('now')),
            seen_by_coordinator INTEGER NOT NULL DEFAULT 0
        );

        -- 收到申请的已读标记（按受让人维度, 与业务状态解耦）
        CREATE TABLE IF NOT EXISTS request_receipt (
            request_id INTEGER NOT NULL REFERENCES request(request_id),
            receiver_id INTEGER NOT NULL REFERENCES worker(worker_id),
            seen INTEGER NOT NULL DEFAULT 0,
            seen_at TEXT,
            PRIMARY KEY (request_id, receiver_id)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [crate::db::CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
