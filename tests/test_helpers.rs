// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、排班种子数据等功能
// ==========================================

use rusqlite::{params, Connection};
use shift_exchange::db::configure_sqlite_connection;
use shift_exchange::schema::init_schema;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_test_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开一条应用统一 PRAGMA 的测试连接
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开共享连接 (引擎/仓储用)
pub fn shared_connection(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    Ok(Arc::new(Mutex::new(open_test_connection(db_path)?)))
}

/// 插入测试员工
///
/// - 1: worker1 (WORKER)
/// - 2: worker2 (WORKER)
/// - 3: worker3 (WORKER)
/// - 9: coord (COORDINATOR)
pub fn seed_workers(conn: &Connection) -> Result<(), Box<dyn Error>> {
    conn.execute_batch(
        r#"
        INSERT OR IGNORE INTO worker (worker_id, username, role) VALUES
            (1, 'worker1', 'WORKER'),
            (2, 'worker2', 'WORKER'),
            (3, 'worker3', 'WORKER'),
            (9, 'coord', 'COORDINATOR');
        "#,
    )?;
    Ok(())
}

/// 插入班次类型目录 (M/T/N/L)
pub fn seed_shift_types(conn: &Connection) -> Result<(), Box<dyn Error>> {
    conn.execute_batch(
        r#"
        INSERT OR IGNORE INTO shift_type (name, code) VALUES
            ('早班', 'M'),
            ('午班', 'T'),
            ('夜班', 'N'),
            ('休班', 'L');
        "#,
    )?;
    Ok(())
}

/// 给员工在某日期种一条班次分配, 返回 assignment_id
///
/// shift 行按 (类型, 日期) get-or-create, 与正式路径同一口径
pub fn seed_assignment(
    conn: &Connection,
    worker_id: i64,
    date: &str,
    code: &str,
) -> Result<i64, Box<dyn Error>> {
    let type_id: i64 = conn.query_row(
        "SELECT shift_type_id FROM shift_type WHERE code = ?1",
        params![code],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO shift (shift_type_id, shift_date) VALUES (?1, ?2)",
        params![type_id, date],
    )?;
    let shift_id: i64 = conn.query_row(
        "SELECT shift_id FROM shift WHERE shift_type_id = ?1 AND shift_date = ?2",
        params![type_id, date],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO shift_assignment (worker_id, shift_id) VALUES (?1, ?2)",
        params![worker_id, shift_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 查询员工在某日期的班次编码 (换班断言用)
pub fn shift_code_on(
    conn: &Connection,
    worker_id: i64,
    date: &str,
) -> Result<Option<String>, Box<dyn Error>> {
    let mut stmt = conn.prepare(
        r#"SELECT st.code
           FROM shift_assignment sa
           JOIN shift s ON s.shift_id = sa.shift_id
           JOIN shift_type st ON st.shift_type_id = s.shift_type_id
           WHERE sa.worker_id = ?1 AND s.shift_date = ?2
           LIMIT 1"#,
    )?;
    let mut rows = stmt.query(params![worker_id, date])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// 统计某表行数
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64, Box<dyn Error>> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}
