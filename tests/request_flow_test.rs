// ==========================================
// RequestManager 集成测试
// ==========================================
// 测试目标: 申请创建/撤回的归属与唯一性规则, 过期流水线
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use shift_exchange::engine::{ExchangeError, OfferManager, RequestManager};
use shift_exchange::logging;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn setup() -> (tempfile::NamedTempFile, String) {
    logging::init_test();
    let (tmp, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    test_helpers::seed_workers(&conn).expect("Failed to seed workers");
    test_helpers::seed_shift_types(&conn).expect("Failed to seed shift types");
    drop(conn);
    (tmp, db_path)
}

#[test]
fn test_create_request_rules() {
    let (_tmp, db_path) = setup();
    let conn = test_helpers::open_test_connection(&db_path).unwrap();
    let a1 = test_helpers::seed_assignment(&conn, 1, "2025-01-05", "M").unwrap();
    drop(conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let manager = RequestManager::new(shared);

    // 不是自己的分配 → NotOwned
    let err = manager.create_request(2, a1).unwrap_err();
    assert!(matches!(err, ExchangeError::NotOwned { .. }), "应该拒绝别人的分配: {}", err);

    // 正常创建
    let request_id = manager.create_request(1, a1).expect("创建申请应该成功");
    assert!(request_id > 0);

    // 同一分配第二次 → AlreadyActive
    let err = manager.create_request(1, a1).unwrap_err();
    assert!(
        matches!(err, ExchangeError::AlreadyActive { assignment_id } if assignment_id == a1),
        "同一分配只允许一条活跃申请: {}",
        err
    );

    let rows = manager.active_requests(1).expect("列表查询应该成功");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].request_id, request_id);
    assert_eq!(rows[0].code, "M");
}

#[test]
fn test_cancel_request_rules() {
    let (_tmp, db_path) = setup();
    let conn = test_helpers::open_test_connection(&db_path).unwrap();
    let a1 = test_helpers::seed_assignment(&conn, 1, "2025-01-05", "M").unwrap();
    let a2 = test_helpers::seed_assignment(&conn, 2, "2025-01-08", "T").unwrap();
    drop(conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let manager = RequestManager::new(shared.clone());
    let offers = OfferManager::new(shared);

    let request_id = manager.create_request(1, a1).unwrap();

    // 不存在 → NotFound
    let err = manager.cancel_request(1, 999).unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound { .. }));

    // 别人不能撤回
    let err = manager.cancel_request(2, request_id).unwrap_err();
    assert!(matches!(err, ExchangeError::NotOwned { .. }));

    // 有应答后不可撤回
    offers.create_offer(request_id, 2, a2).expect("应答应该成功");
    let err = manager.cancel_request(1, request_id).unwrap_err();
    assert!(
        matches!(err, ExchangeError::HasOffers { request_id: r } if r == request_id),
        "有应答的申请不可撤回: {}",
        err
    );
}

#[test]
fn test_cancel_without_offers() {
    let (_tmp, db_path) = setup();
    let conn = test_helpers::open_test_connection(&db_path).unwrap();
    let a1 = test_helpers::seed_assignment(&conn, 1, "2025-01-05", "M").unwrap();
    drop(conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let manager = RequestManager::new(shared);

    let request_id = manager.create_request(1, a1).unwrap();
    manager.cancel_request(1, request_id).expect("无应答时撤回应该成功");

    // 撤回后失活 → 不可重复撤回
    let err = manager.cancel_request(1, request_id).unwrap_err();
    assert!(matches!(err, ExchangeError::NotActive { .. }));

    // 撤回释放了分配 → 允许重新申请
    manager.create_request(1, a1).expect("撤回后应该可以重新申请");
}

#[test]
fn test_expire_requests_by_past_shift_date() {
    let (_tmp, db_path) = setup();
    let conn = test_helpers::open_test_connection(&db_path).unwrap();
    let past = test_helpers::seed_assignment(&conn, 1, "2025-01-05", "M").unwrap();
    let future = test_helpers::seed_assignment(&conn, 1, "2025-12-31", "N").unwrap();
    drop(conn);

    let shared = test_helpers::shared_connection(&db_path).unwrap();
    let manager = RequestManager::new(shared);

    let past_req = manager.create_request(1, past).unwrap();
    let future_req = manager.create_request(1, future).unwrap();

    // 以 2025-06-01 为基准日: 01-05 过期, 12-31 保留
    let expired = manager.expire_by_past_shift_date(date("2025-06-01")).unwrap();
    assert_eq!(expired, 1, "只有日期已过的申请过期");

    assert_eq!(manager.count_expired(1).unwrap(), 1);

    let rows = manager.active_requests(1).unwrap();
    assert_eq!(rows.len(), 1, "过期申请退出活跃列表");
    assert_eq!(rows[0].request_id, future_req);

    // 过期释放了分配 → 允许重新申请
    manager.create_request(1, past).expect("过期后应该可以重新申请");
    let _ = past_req;
}
