// ==========================================
// 定制件编号服务测试
// ==========================================
// 职责: 验证 700 系列取号的唯一性、递增性与目录注册
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use rust_decimal::Decimal;
use sink_cto::domain::configuration::SelectionValue;
use sink_cto::engine::CustomPartNumberingService;
use std::str::FromStr;
use std::thread;
use test_helpers::{draft_order_with_config, sales, selections_scenario_a, setup_env};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ==========================================
// 测试1: 场景C - 非标挂板铸造定制件
// ==========================================

#[test]
fn test_custom_pegboard_mints_sequential_number() {
    let env = setup_env();
    let mut selections = selections_scenario_a();
    selections.insert(
        "pegboard_spec".to_string(),
        SelectionValue::Text("PEG-30X20".to_string()),
    );
    let (_order_id, item_id, _config_id) = draft_order_with_config(&env, selections);

    let result = env.config_api.generate_bom(&item_id, &sales()).unwrap();

    // 恰好一行定制件
    assert_eq!(result.custom_parts_count, 1);
    let lines = env.config_api.list_bom_lines(&result.bom_id).unwrap();
    let custom_lines: Vec<_> = lines.iter().filter(|l| l.is_custom).collect();
    assert_eq!(custom_lines.len(), 1);

    // 序列从 1000 起, 首个号是 700-1000
    let custom = custom_lines[0];
    assert_eq!(custom.component_id, "700-1000");
    assert_eq!(custom.unit_cost, dec("85.00"));

    // 已注册为一等目录零件
    let part = env.catalog_repo.find_part("700-1000").unwrap().unwrap();
    assert!(part.is_custom);
    assert_eq!(part.category_code, "PEGBOARD");
    assert_eq!(part.spec_code, "PEG-30X20");

    // 铸造有单独的审计事件
    assert_eq!(env.action_log_repo.count_by_type("MintCustomPart").unwrap(), 1);
}

// ==========================================
// 测试2: 标准规格直接解析, 不铸造
// ==========================================

#[test]
fn test_standard_pegboard_resolves_without_minting() {
    let env = setup_env();
    let mut selections = selections_scenario_a();
    selections.insert(
        "pegboard_spec".to_string(),
        SelectionValue::Text("PEG-24X18".to_string()),
    );
    let (_order_id, item_id, _config_id) = draft_order_with_config(&env, selections);

    let result = env.config_api.generate_bom(&item_id, &sales()).unwrap();

    assert_eq!(result.custom_parts_count, 0);
    let lines = env.config_api.list_bom_lines(&result.bom_id).unwrap();
    let peg = lines.iter().find(|l| l.component_id == "PEG-24X18").unwrap();
    assert!(!peg.is_custom);
    assert_eq!(peg.unit_cost, dec("35.00"));

    // 序列没有被消耗
    assert_eq!(env.series_repo.peek_next_value("CUSTOM_PART").unwrap(), 1000);
}

// ==========================================
// 测试3: 已铸造的定制件按标准路径复用
// ==========================================

#[test]
fn test_minted_part_resolves_on_regeneration() {
    let env = setup_env();
    let mut selections = selections_scenario_a();
    selections.insert(
        "pegboard_spec".to_string(),
        SelectionValue::Text("PEG-30X20".to_string()),
    );
    let (_order_id, item_id, _config_id) = draft_order_with_config(&env, selections);

    let first = env.config_api.generate_bom(&item_id, &sales()).unwrap();
    let after_first = env.series_repo.peek_next_value("CUSTOM_PART").unwrap();

    // 重新生成: 同规格选件命中已注册定制件, 不再取号
    let second = env.config_api.generate_bom(&item_id, &sales()).unwrap();
    let after_second = env.series_repo.peek_next_value("CUSTOM_PART").unwrap();

    assert_eq!(after_first, 1001);
    assert_eq!(after_second, 1001, "复用已铸造定制件不应消耗序列");

    let first_custom: Vec<_> = env
        .config_api
        .list_bom_lines(&first.bom_id)
        .unwrap()
        .into_iter()
        .filter(|l| l.is_custom)
        .collect();
    let second_custom: Vec<_> = env
        .config_api
        .list_bom_lines(&second.bom_id)
        .unwrap()
        .into_iter()
        .filter(|l| l.is_custom)
        .collect();
    assert_eq!(first_custom[0].component_id, second_custom[0].component_id);
    assert_eq!(second.custom_parts_count, 1);
}

// ==========================================
// 测试4: 顺序取号严格递增
// ==========================================

#[test]
fn test_sequential_minting_is_strictly_increasing() {
    let env = setup_env();
    let service = CustomPartNumberingService::new(env.conn.clone());

    let mut numbers = Vec::new();
    for i in 0..5 {
        let part = service
            .mint(
                "PEGBOARD",
                &format!("PEG-CUSTOM-{}", i),
                "定制挂板",
                dec("85.00"),
                dec("4.5"),
                "tester",
            )
            .unwrap();
        numbers.push(part.part_no);
    }

    assert_eq!(
        numbers,
        vec!["700-1000", "700-1001", "700-1002", "700-1003", "700-1004"]
    );
}

// ==========================================
// 测试5: 并发取号全部唯一
// ==========================================

#[test]
fn test_concurrent_minting_never_duplicates() {
    let env = setup_env();
    let thread_count = 10;
    let mut handles = vec![];

    for i in 0..thread_count {
        let conn = env.conn.clone();
        let handle = thread::spawn(move || {
            let service = CustomPartNumberingService::new(conn);
            service
                .mint(
                    "PEGBOARD",
                    &format!("PEG-THREAD-{}", i),
                    "定制挂板",
                    Decimal::from(85),
                    Decimal::from(4),
                    "tester",
                )
                .map(|p| p.part_no)
        });
        handles.push(handle);
    }

    let mut numbers: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    // 全部唯一
    let total = numbers.len();
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), total, "并发取号不允许重号");

    // 序列推进了 thread_count 个
    assert_eq!(
        env.series_repo.peek_next_value("CUSTOM_PART").unwrap(),
        1000 + thread_count as i64
    );

    // 每个号都已注册为目录零件, 不会被复用给其他零件
    for no in &numbers {
        let part = env.catalog_repo.find_part(no).unwrap();
        assert!(part.is_some(), "{} 应已注册", no);
    }
}
