// ==========================================
// 投产台账集成测试
// ==========================================
// 测试目标: 投产入账精度、撤销精确回滚、异常不产生部分修改
// ==========================================


use coil_slitting::logging;
use coil_slitting::ApiError;
use test_helpers::{full_coil_plan, memory_state, test_coil, test_demand};

// ==========================================
// 测试用例
// ==========================================

#[test]
fn test_execute_standard_thickness() {
    logging::init_test();
    let state = memory_state();

    let coil = test_coil("MC-001", 0.8, 1250.0, 5000.0);
    let coil_id = coil.coil_id.clone();
    state.inventory_api.import_coils(vec![coil]).unwrap();
    state
        .inventory_api
        .import_demand_lines(vec![test_demand("D1", 312.0, 0.8, -1000.0)])
        .unwrap();

    let receipt = state
        .ledger_api
        .execute_plan(&full_coil_plan("D1", 5000.0), &coil_id)
        .unwrap();

    // floor(5000 × 1248/1250 / 10) = 499 件,抵扣 4990kg
    assert_eq!(receipt.total_pieces, 499);
    assert_eq!(receipt.record.impacts.len(), 1);
    assert_eq!(receipt.record.impacts[0].weight_deducted_kg, 4990.0);
    assert_eq!(receipt.coil_remaining_kg, 0.0);
    assert_eq!(receipt.record.total_consumed_kg, 5000.0);

    let demand = state.inventory_api.get_demand_line("D1").unwrap();
    assert_eq!(demand.balance_kg, 3990.0);

    let coil = state.inventory_api.get_coil(&coil_id).unwrap();
    assert_eq!(coil.remaining_weight_kg, 0.0);
    assert!(coil.last_used_at.is_some());

    assert_eq!(state.ledger_api.list_records(None).unwrap().len(), 1);
    assert!(receipt.summary().contains("499"));
}

#[test]
fn test_execute_thicker_coil_uses_adjusted_quota() {
    let state = memory_state();

    // 钢卷 1.0mm,物料标准厚度 0.8mm → 实际定额 12.5kg
    let coil = test_coil("MC-002", 1.0, 1250.0, 5000.0);
    let coil_id = coil.coil_id.clone();
    state.inventory_api.import_coils(vec![coil]).unwrap();
    state
        .inventory_api
        .import_demand_lines(vec![test_demand("D1", 312.0, 0.8, -1000.0)])
        .unwrap();

    let receipt = state
        .ledger_api
        .execute_plan(&full_coil_plan("D1", 5000.0), &coil_id)
        .unwrap();

    assert_eq!(receipt.total_pieces, 399);
    assert_eq!(receipt.record.impacts[0].weight_deducted_kg, 3990.0);
    let demand = state.inventory_api.get_demand_line("D1").unwrap();
    assert_eq!(demand.balance_kg, 2990.0);
}

#[test]
fn test_execute_then_revoke_restores_state() {
    let state = memory_state();

    let coil = test_coil("MC-003", 0.8, 1250.0, 6000.0);
    let coil_id = coil.coil_id.clone();
    state.inventory_api.import_coils(vec![coil]).unwrap();
    state
        .inventory_api
        .import_demand_lines(vec![
            test_demand("D1", 312.0, 0.8, -1234.56),
            test_demand("D2", 250.0, 0.8, -800.0),
        ])
        .unwrap();

    let receipt = state
        .ledger_api
        .execute_plan(&full_coil_plan("D1", 1500.0), &coil_id)
        .unwrap();
    assert_eq!(receipt.coil_remaining_kg, 4500.0);

    let outcome = state.ledger_api.revoke(&receipt.record).unwrap();
    assert!(outcome.coil_restored);
    assert_eq!(outcome.restored_impacts, 1);
    assert!(outcome.skipped_demand_ids.is_empty());

    let coil = state.inventory_api.get_coil(&coil_id).unwrap();
    assert!((coil.remaining_weight_kg - 6000.0).abs() < 0.01);
    let d1 = state.inventory_api.get_demand_line("D1").unwrap();
    assert!((d1.balance_kg - (-1234.56)).abs() < 0.01);
    let d2 = state.inventory_api.get_demand_line("D2").unwrap();
    assert_eq!(d2.balance_kg, -800.0);

    assert!(state.ledger_api.list_records(None).unwrap().is_empty());
    assert!(matches!(
        state.ledger_api.revoke_record(&receipt.record.record_id),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_repeated_cycles_are_stable() {
    let state = memory_state();

    let coil = test_coil("MC-004", 0.8, 1250.0, 9000.0);
    let coil_id = coil.coil_id.clone();
    state.inventory_api.import_coils(vec![coil]).unwrap();
    state
        .inventory_api
        .import_demand_lines(vec![test_demand("D1", 312.0, 0.8, -3333.33)])
        .unwrap();

    for _ in 0..5 {
        let receipt = state
            .ledger_api
            .execute_plan(&full_coil_plan("D1", 1234.5), &coil_id)
            .unwrap();
        state.ledger_api.revoke_record(&receipt.record.record_id).unwrap();
    }

    let coil = state.inventory_api.get_coil(&coil_id).unwrap();
    assert!((coil.remaining_weight_kg - 9000.0).abs() < 0.01);
    let d1 = state.inventory_api.get_demand_line("D1").unwrap();
    assert!((d1.balance_kg - (-3333.33)).abs() < 0.01);
}

#[test]
fn test_revoke_after_coil_deleted() {
    let state = memory_state();

    let coil = test_coil("MC-005", 0.8, 1250.0, 5000.0);
    let coil_id = coil.coil_id.clone();
    state.inventory_api.import_coils(vec![coil]).unwrap();
    state
        .inventory_api
        .import_demand_lines(vec![test_demand("D1", 312.0, 0.8, -1000.0)])
        .unwrap();

    let receipt = state
        .ledger_api
        .execute_plan(&full_coil_plan("D1", 5000.0), &coil_id)
        .unwrap();
    state.inventory_api.delete_coil(&coil_id).unwrap();

    let outcome = state.ledger_api.revoke_record(&receipt.record.record_id).unwrap();
    assert!(!outcome.coil_restored);
    assert_eq!(outcome.restored_weight_kg, 0.0);
    assert_eq!(outcome.restored_impacts, 1);
    assert!(outcome.summary().contains("跳过"));

    let d1 = state.inventory_api.get_demand_line("D1").unwrap();
    assert_eq!(d1.balance_kg, -1000.0);
    assert!(state.ledger_api.list_records(None).unwrap().is_empty());
}

#[test]
fn test_revoke_after_demand_deleted() {
    let state = memory_state();

    let coil = test_coil("MC-006", 0.8, 1250.0, 5000.0);
    let coil_id = coil.coil_id.clone();
    state.inventory_api.import_coils(vec![coil]).unwrap();
    state
        .inventory_api
        .import_demand_lines(vec![test_demand("D1", 312.0, 0.8, -1000.0)])
        .unwrap();

    let receipt = state
        .ledger_api
        .execute_plan(&full_coil_plan("D1", 2000.0), &coil_id)
        .unwrap();
    state.inventory_api.delete_demand_line("D1").unwrap();

    let outcome = state.ledger_api.revoke_record(&receipt.record.record_id).unwrap();
    assert!(outcome.coil_restored);
    assert_eq!(outcome.skipped_demand_ids, vec!["D1".to_string()]);
    assert_eq!(state.inventory_api.get_coil(&coil_id).unwrap().remaining_weight_kg, 5000.0);
}

#[test]
fn test_invalid_plan_leaves_state_untouched() {
    let state = memory_state();

    let coil = test_coil("MC-007", 0.8, 1250.0, 1000.0);
    let coil_id = coil.coil_id.clone();
    state.inventory_api.import_coils(vec![coil]).unwrap();
    state
        .inventory_api
        .import_demand_lines(vec![test_demand("D1", 312.0, 0.8, -1000.0)])
        .unwrap();

    // 方案总重超过钢卷剩余
    let result = state.ledger_api.execute_plan(&full_coil_plan("D1", 5000.0), &coil_id);
    assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));

    // 分段为空
    let mut empty = full_coil_plan("D1", 500.0);
    empty.segments.clear();
    assert!(matches!(
        state.ledger_api.execute_plan(&empty, &coil_id),
        Err(ApiError::InvalidInput(_))
    ));

    // 钢卷不存在
    assert!(matches!(
        state.ledger_api.execute_plan(&full_coil_plan("D1", 500.0), "missing"),
        Err(ApiError::NotFound(_))
    ));

    assert_eq!(state.inventory_api.get_coil(&coil_id).unwrap().remaining_weight_kg, 1000.0);
    assert_eq!(state.inventory_api.get_demand_line("D1").unwrap().balance_kg, -1000.0);
    assert!(state.ledger_api.list_records(None).unwrap().is_empty());
}

#[test]
fn test_ledger_persists_in_file_database() {
    let (_temp_file, db_path) = test_helpers::create_test_db().expect("Failed to create test db");

    let coil = test_coil("MC-008", 0.8, 1250.0, 5000.0);
    let coil_id = coil.coil_id.clone();
    let record_id = {
        let state = coil_slitting::AppState::new(db_path.clone()).unwrap();
        state.inventory_api.import_coils(vec![coil]).unwrap();
        state
            .inventory_api
            .import_demand_lines(vec![test_demand("D1", 312.0, 0.8, -1000.0)])
            .unwrap();
        state
            .ledger_api
            .execute_plan(&full_coil_plan("D1", 2500.0), &coil_id)
            .unwrap()
            .record
            .record_id
    };

    // 重新打开文件库,撤销仍可精确回放
    let state = coil_slitting::AppState::new(db_path).unwrap();
    let record = state.ledger_api.get_record(&record_id).unwrap();
    assert_eq!(record.segments.len(), 1);
    state.ledger_api.revoke(&record).unwrap();

    assert_eq!(state.inventory_api.get_coil(&coil_id).unwrap().remaining_weight_kg, 5000.0);
    assert_eq!(state.inventory_api.get_demand_line("D1").unwrap().balance_kg, -1000.0);
}
