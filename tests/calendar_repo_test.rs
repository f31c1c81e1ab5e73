// ==========================================
// CalendarRepository 集成测试
// ==========================================
// 测试目标: 月历读视图 + 目录 get-or-create 幂等 + 分配 upsert
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use rusqlite::Connection;
use shift_exchange::db::configure_sqlite_connection;
use shift_exchange::logging;
use shift_exchange::repository::calendar_repo::{
    get_or_create_free_shift_in, get_or_create_placeholder_shift_in, set_assignment_in,
};
use shift_exchange::repository::CalendarRepository;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn test_month_view_and_free_dates() {
    logging::init_test();

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    test_helpers::seed_workers(&conn).expect("Failed to seed workers");
    test_helpers::seed_shift_types(&conn).expect("Failed to seed shift types");

    test_helpers::seed_assignment(&conn, 1, "2025-01-05", "M").unwrap();
    test_helpers::seed_assignment(&conn, 1, "2025-01-06", "L").unwrap();
    test_helpers::seed_assignment(&conn, 1, "2025-01-07", "N").unwrap();
    // 别的月份不应出现在一月视图里
    test_helpers::seed_assignment(&conn, 1, "2025-02-01", "M").unwrap();
    drop(conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let repo = CalendarRepository::new(shared);

    let slots = repo
        .assignments_for_worker_in_month(1, 2025, 1)
        .expect("月历查询应该成功");
    assert_eq!(slots.len(), 3, "一月应该只有 3 条分配");
    assert_eq!(slots[0].shift_date, date("2025-01-05"));
    assert_eq!(slots[0].code, "M");
    assert_eq!(slots[2].code, "N");

    let free = repo.free_dates_for_worker(1, 2025, 1).expect("休班日查询应该成功");
    assert_eq!(free, vec![date("2025-01-06")]);

    let types = repo.list_shift_types().expect("目录查询应该成功");
    let codes: Vec<&str> = types.iter().map(|t| t.code.as_str()).collect();
    assert_eq!(codes, vec!["M", "T", "N", "L"]);
}

#[test]
fn test_get_or_create_free_shift_is_idempotent() {
    logging::init_test();

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");

    let d = date("2025-03-10");
    let first = get_or_create_free_shift_in(&conn, d).expect("首次创建应该成功");
    let second = get_or_create_free_shift_in(&conn, d).expect("重复调用应该成功");
    assert_eq!(first, second, "同一日期的休班 Shift 必须只有一行");

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM shift s JOIN shift_type st ON st.shift_type_id = s.shift_type_id \
             WHERE st.code = 'L' AND s.shift_date = '2025-03-10'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);

    // 占位班次同样幂等
    let tmp_first = get_or_create_placeholder_shift_in(&conn).expect("占位创建应该成功");
    let tmp_second = get_or_create_placeholder_shift_in(&conn).expect("重复调用应该成功");
    assert_eq!(tmp_first, tmp_second, "占位 Shift 必须只有一行");
}

#[test]
fn test_get_or_create_free_shift_concurrent() {
    logging::init_test();

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");

    // 多连接并发对同一日期 get-or-create, UNIQUE 约束兜底只落一行
    let mut handles = Vec::new();
    for _ in 0..4 {
        let path = db_path.clone();
        handles.push(std::thread::spawn(move || {
            let conn = Connection::open(&path).expect("Failed to open db");
            configure_sqlite_connection(&conn).expect("Failed to configure");
            get_or_create_free_shift_in(&conn, date("2025-06-01")).expect("并发创建应该成功")
        }));
    }

    let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]), "所有线程必须拿到同一个 shift_id");

    let conn = test_helpers::open_test_connection(&db_path).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM shift s JOIN shift_type st ON st.shift_type_id = s.shift_type_id \
             WHERE st.code = 'L' AND s.shift_date = '2025-06-01'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1, "并发下也只允许一行");
}

#[test]
fn test_set_assignment_repoints_instead_of_inserting() {
    logging::init_test();

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    test_helpers::seed_workers(&conn).expect("Failed to seed workers");
    test_helpers::seed_shift_types(&conn).expect("Failed to seed shift types");

    let assignment_id = test_helpers::seed_assignment(&conn, 1, "2025-01-05", "M").unwrap();
    let before = test_helpers::count_rows(&conn, "shift_assignment").unwrap();

    // 同日期再 set → 原行被重新指向, 不新增
    let free_id = get_or_create_free_shift_in(&conn, date("2025-01-05")).unwrap();
    set_assignment_in(&conn, 1, date("2025-01-05"), free_id).expect("upsert 应该成功");

    let after = test_helpers::count_rows(&conn, "shift_assignment").unwrap();
    assert_eq!(before, after, "已有分配只允许改指向");
    assert_eq!(
        test_helpers::shift_code_on(&conn, 1, "2025-01-05").unwrap(),
        Some("L".to_string())
    );

    let still_same: i64 = conn
        .query_row(
            "SELECT assignment_id FROM shift_assignment sa JOIN shift s ON s.shift_id = sa.shift_id \
             WHERE sa.worker_id = 1 AND s.shift_date = '2025-01-05'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(still_same, assignment_id, "assignment_id 不变");

    // 没有分配的日期 → 插入新行
    set_assignment_in(&conn, 1, date("2025-01-09"), free_id).expect("插入应该成功");
    let after_insert = test_helpers::count_rows(&conn, "shift_assignment").unwrap();
    assert_eq!(after_insert, after + 1);
}
