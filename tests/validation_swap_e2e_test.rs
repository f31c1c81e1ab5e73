// ==========================================
// 审批 + 换班 端到端测试
// ==========================================
// 测试目标: 申请 → 应答 → 撮合 → 审批 → 四格换班 全链路,
//           审批记录 upsert 唯一性, 以及失败时的整体回滚
// ==========================================

mod test_helpers;

use rusqlite::{params, Connection};
use shift_exchange::api::{ExchangeApi, ExchangeApiImpl};
use shift_exchange::logging;
use shift_exchange::repository::ValidationRepository;
use shift_exchange::{Role, ValidationDecision};

/// 完整排班种子: 双方在对方的日期上都休班
///
/// - worker1: 01-05 早班(M), 01-08 休(L)
/// - worker2: 01-08 午班(T), 01-05 休(L)
fn seed_scenario(conn: &Connection) -> (i64, i64) {
    test_helpers::seed_workers(conn).expect("Failed to seed workers");
    test_helpers::seed_shift_types(conn).expect("Failed to seed shift types");

    let a1 = test_helpers::seed_assignment(conn, 1, "2025-01-05", "M").unwrap();
    test_helpers::seed_assignment(conn, 1, "2025-01-08", "L").unwrap();
    let a2 = test_helpers::seed_assignment(conn, 2, "2025-01-08", "T").unwrap();
    test_helpers::seed_assignment(conn, 2, "2025-01-05", "L").unwrap();
    (a1, a2)
}

#[test]
fn test_full_exchange_scenario_approved() {
    logging::init_test();

    println!("\n=== 测试：完整换班流程 (审批通过) ===");

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    let (a1, a2) = seed_scenario(&conn);
    println!("✓ 步骤 1: 排班种子已就绪");

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let api = ExchangeApiImpl::from_connection(shared);

    // worker1 发起申请
    let request_id = api.create_request(1, a1).expect("创建申请应该成功");
    println!("✓ 步骤 2: 申请已创建 request_id={}", request_id);

    // worker2 应答
    let offer_id = api.create_offer(request_id, 2, a2).expect("应答应该成功");
    println!("✓ 步骤 3: 应答已创建 offer_id={}", offer_id);

    // worker1 选中应答 → 撮合
    let created = api.create_match(request_id, offer_id).expect("撮合应该成功");
    println!("✓ 步骤 4: 撮合已创建 match_id={}", created.match_id);

    // 协调员审批通过
    let assignments_before = test_helpers::count_rows(&conn, "shift_assignment").unwrap();
    let response = api
        .decide_match(created.match_id, 9, ValidationDecision::Approved, Some("同意"))
        .expect("审批调用应该成功");
    assert!(response.ok, "审批应该通过: {}", response.message);
    println!("✓ 步骤 5: 审批已通过");

    let outcome = response.outcome.expect("成功时必须带审计上下文");
    assert_eq!(outcome.match_id, created.match_id);
    assert_eq!(outcome.requester_id, 1);
    assert_eq!(outcome.receiver_id, 2);
    assert_eq!(outcome.requester_assignment_id, a1);
    assert_eq!(outcome.receiver_assignment_id, a2);

    // 四格结果: 双方班次对调, 各自原日期变休
    assert_eq!(test_helpers::shift_code_on(&conn, 1, "2025-01-05").unwrap().as_deref(), Some("L"));
    assert_eq!(test_helpers::shift_code_on(&conn, 1, "2025-01-08").unwrap().as_deref(), Some("T"));
    assert_eq!(test_helpers::shift_code_on(&conn, 2, "2025-01-08").unwrap().as_deref(), Some("L"));
    assert_eq!(test_helpers::shift_code_on(&conn, 2, "2025-01-05").unwrap().as_deref(), Some("M"));
    println!("✓ 步骤 6: 四格换班结果正确");

    // 分配行只被重新指向, 总行数不变
    let assignments_after = test_helpers::count_rows(&conn, "shift_assignment").unwrap();
    assert_eq!(assignments_before, assignments_after, "换班不得增删分配行");

    // 终态: 撮合 VALIDATED, 申请 MATCHED, 审批 APPROVED
    let match_state: String = conn
        .query_row(
            "SELECT state FROM match_record WHERE match_id = ?1",
            params![created.match_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(match_state, "VALIDATED");

    let request_state: String = conn
        .query_row(
            "SELECT state FROM request WHERE request_id = ?1",
            params![request_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(request_state, "MATCHED");

    let (decision, comment): (String, Option<String>) = conn
        .query_row(
            "SELECT decision, comment FROM validation WHERE match_id = ?1",
            params![created.match_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(decision, "APPROVED");
    assert_eq!(comment.as_deref(), Some("同意"));

    // 快照保持换班前的值, 历史仍可回放
    let history = api.match_history(1).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].requester_code, "M");
    assert_eq!(history[0].receiver_code, "T");

    println!("\n=== 测试通过：完整换班流程验证成功 ===\n");
}

#[test]
fn test_decide_twice_keeps_single_validation_row() {
    logging::init_test();

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    let (a1, a2) = seed_scenario(&conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let api = ExchangeApiImpl::from_connection(shared);

    let request_id = api.create_request(1, a1).unwrap();
    let offer_id = api.create_offer(request_id, 2, a2).unwrap();
    let created = api.create_match(request_id, offer_id).unwrap();

    let first = api
        .decide_match(created.match_id, 9, ValidationDecision::Rejected, None)
        .unwrap();
    assert!(first.ok);

    // 第二次裁决 (换方向) → 已裁决, 拒绝
    let second = api
        .decide_match(created.match_id, 9, ValidationDecision::Approved, None)
        .unwrap();
    assert!(!second.ok, "重复裁决必须失败");
    assert!(second.message.contains("已被裁决"), "提示应可读: {}", second.message);

    // 审批行恰好一条, 保持首次裁决
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM validation WHERE match_id = ?1",
            params![created.match_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1, "每个撮合至多一行审批");

    let validations = ValidationRepository::new(test_helpers::shared_connection(&db_path).unwrap());
    let row = validations
        .find_by_match(created.match_id)
        .unwrap()
        .expect("审批记录应该存在");
    assert_eq!(row.decision, ValidationDecision::Rejected);
    assert_eq!(row.admin_id, 9);

    // 驳回不动排班
    assert_eq!(test_helpers::shift_code_on(&conn, 1, "2025-01-05").unwrap().as_deref(), Some("M"));
    assert_eq!(test_helpers::shift_code_on(&conn, 2, "2025-01-08").unwrap().as_deref(), Some("T"));

    // 驳回回写父申请
    let request_state: String = conn
        .query_row(
            "SELECT state FROM request WHERE request_id = ?1",
            params![request_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(request_state, "REJECTED");
}

#[test]
fn test_decide_rolls_back_when_swap_fails() {
    logging::init_test();

    println!("\n=== 测试：换班中途失败 → 整体回滚 ===");

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    let (a1, a2) = seed_scenario(&conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let api = ExchangeApiImpl::from_connection(shared);

    let request_id = api.create_request(1, a1).unwrap();
    let offer_id = api.create_offer(request_id, 2, a2).unwrap();
    let created = api.create_match(request_id, offer_id).unwrap();

    // 蓄意破坏: 绕过外键 (裸连接默认不开 PRAGMA) 删掉受让方的分配行,
    // 模拟上游数据损坏, 让换班第二步读取落空
    let raw = Connection::open(&db_path).expect("Failed to open raw connection");
    // 本环境的 bundled SQLite 以 SQLITE_DEFAULT_FOREIGN_KEYS=1 编译, 每条连接默认开启外键;
    // 显式关闭以恢复"裸连接绕过外键"的前提
    raw.execute_batch("PRAGMA foreign_keys = OFF;")
        .expect("关闭外键应该成功");
    raw.execute(
        "DELETE FROM shift_assignment WHERE assignment_id = ?1",
        params![a2],
    )
    .expect("裸连接删除应该成功");
    drop(raw);
    println!("✓ 步骤 1: 受让方分配行已被破坏");

    let response = api
        .decide_match(created.match_id, 9, ValidationDecision::Approved, None)
        .unwrap();
    assert!(!response.ok, "换班数据缺失时审批必须失败");
    println!("✓ 步骤 2: 审批失败并返回 ok=false");

    // 整体回滚: 撮合仍待审批, 没有审批行, 申请人排班未动
    let match_state: String = conn
        .query_row(
            "SELECT state FROM match_record WHERE match_id = ?1",
            params![created.match_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(match_state, "PENDING_VALIDATION", "撮合必须停留在待审批");

    let validation_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM validation WHERE match_id = ?1",
            params![created.match_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(validation_count, 0, "审批行不得落库");

    assert_eq!(test_helpers::shift_code_on(&conn, 1, "2025-01-05").unwrap().as_deref(), Some("M"));
    println!("✓ 步骤 3: 无任何半截状态\n");
}

#[test]
fn test_decide_missing_match_is_readable_failure() {
    logging::init_test();

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    seed_scenario(&conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let api = ExchangeApiImpl::from_connection(shared);

    let response = api
        .decide_match(424242, 9, ValidationDecision::Approved, None)
        .unwrap();
    assert!(!response.ok);
    assert!(response.message.contains("未找到"), "提示应可读: {}", response.message);
}

#[test]
fn test_seen_flags_reset_after_decision() {
    logging::init_test();

    let (_tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    let (a1, a2) = seed_scenario(&conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let api = ExchangeApiImpl::from_connection(shared);

    let request_id = api.create_request(1, a1).unwrap();
    let offer_id = api.create_offer(request_id, 2, a2).unwrap();
    let created = api.create_match(request_id, offer_id).unwrap();

    // 裁决前各方先读过
    api.mark_matches_seen(9, Role::Coordinator).unwrap();
    api.mark_matches_seen(1, Role::Worker).unwrap();
    api.mark_matches_seen(2, Role::Worker).unwrap();

    let seen_sum: i64 = conn
        .query_row(
            "SELECT seen_by_sender + seen_by_receiver + seen_by_coordinator \
             FROM match_record WHERE match_id = ?1",
            params![created.match_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(seen_sum, 3, "三方都已读");

    // 裁决后三个已读标记清零 → 各方重新收到未读通知
    api.decide_match(created.match_id, 9, ValidationDecision::Approved, None)
        .unwrap();

    let seen_sum: i64 = conn
        .query_row(
            "SELECT seen_by_sender + seen_by_receiver + seen_by_coordinator \
             FROM match_record WHERE match_id = ?1",
            params![created.match_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(seen_sum, 0, "裁决重置全部已读标记");
}
