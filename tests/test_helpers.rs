// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、目录/规则种子数据、API 装配
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use sink_cto::config::{write_kv, SynthesisSettings};
use sink_cto::domain::catalog::{Assembly, AssemblyComponent, Category, Part};
use sink_cto::domain::configuration::{ConfigurationRule, RulePredicate, SelectionValue, Selections};
use sink_cto::domain::types::{Actor, ActorRole, ComponentType, RuleKind, RuleScope};
use sink_cto::engine::{
    BomOrchestrator, BomSynthesizer, ConfigurationValidator, OrderLifecycleManager,
    RecordingEventSink,
};
use sink_cto::repository::{
    ActionLogRepository, BomRepository, CatalogRepository, ConfigurationRepository,
    NumberSeriesRepository, OrderRepository, RuleRepository,
};
use sink_cto::api::{ConfigurationApi, OrderApi};
use sink_cto::db;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 目标装配: 60寸定制水槽工作台
pub const BENCH_ASSEMBLY: &str = "ASM-SINKBENCH-60";
/// 嵌套子装配: 下水组件
pub const DRAIN_KIT: &str = "ASM-DRAIN-KIT";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件 (需要保持存活)
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// 插入水槽工作台目录种子数据
///
/// 结构 (均自 2020-01-01 生效, 开放截止):
/// - ASM-SINKBENCH-60
///   1. P-FRAME-SS   × 1          (不锈钢框架, 200.00 / 15kg)
///   2. P-BASIN-STD  × 2, 损耗 5% (标准水槽盆, 120.00 / 8kg)
///   3. P-FAUCET-STD × 1          (龙头, 60.00 / 1.2kg)
///   4. ASM-DRAIN-KIT × 1         (嵌套子装配, 整行计价 45.00 / 2.5kg)
///   5. P-LIFTER-KIT × 1          (选配, option_code=lifter, 150.00 / 5kg)
/// - 标准沥水挂板 PEG-24X18 只通过选件绑定解析, 不挂目录边
pub fn seed_catalog(catalog_repo: &CatalogRepository) -> Result<(), Box<dyn Error>> {
    for (code, name) in [
        ("SINK_BENCH", "水槽工作台"),
        ("HARDWARE", "五金件"),
        ("BASIN", "水槽盆"),
        ("PEGBOARD", "沥水挂板"),
    ] {
        catalog_repo.insert_category(&Category {
            category_code: code.to_string(),
            category_name: name.to_string(),
            created_at: now(),
        })?;
    }

    catalog_repo.insert_assembly(&Assembly {
        assembly_id: BENCH_ASSEMBLY.to_string(),
        assembly_name: "60寸定制水槽工作台".to_string(),
        category_code: "SINK_BENCH".to_string(),
        unit_cost: Decimal::ZERO,
        unit_weight: Decimal::ZERO,
        created_at: now(),
    })?;

    catalog_repo.insert_assembly(&Assembly {
        assembly_id: DRAIN_KIT.to_string(),
        assembly_name: "下水组件".to_string(),
        category_code: "HARDWARE".to_string(),
        unit_cost: dec("45.00"),
        unit_weight: dec("2.5"),
        created_at: now(),
    })?;

    let parts = [
        ("P-FRAME-SS", "不锈钢框架", "HARDWARE", "FRAME-60", "200.00", "15"),
        ("P-BASIN-STD", "标准水槽盆", "BASIN", "BASIN-STD", "120.00", "8"),
        ("P-FAUCET-STD", "标准龙头", "HARDWARE", "FAUCET-STD", "60.00", "1.2"),
        ("P-LIFTER-KIT", "升降组件", "HARDWARE", "LIFTER-KIT", "150.00", "5"),
        ("PEG-24X18", "标准沥水挂板 24x18", "PEGBOARD", "PEG-24X18", "35.00", "3"),
    ];
    for (no, name, cat, spec, cost, weight) in parts {
        catalog_repo.insert_part(&Part {
            part_no: no.to_string(),
            part_name: name.to_string(),
            category_code: cat.to_string(),
            spec_code: spec.to_string(),
            unit_cost: dec(cost),
            unit_weight: dec(weight),
            is_custom: false,
            created_at: now(),
        })?;
    }

    let effective_from = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let edges = [
        // (component_id, type, qty, waste, optional, option_code, sort)
        ("P-FRAME-SS", ComponentType::Part, "1", "0", false, None, 1),
        ("P-BASIN-STD", ComponentType::Part, "2", "0.05", false, None, 2),
        ("P-FAUCET-STD", ComponentType::Part, "1", "0", false, None, 3),
        (DRAIN_KIT, ComponentType::Assembly, "1", "0", false, None, 4),
        ("P-LIFTER-KIT", ComponentType::Part, "1", "0", true, Some("lifter"), 5),
    ];
    for (component_id, component_type, qty, waste, optional, option_code, sort_no) in edges {
        catalog_repo.insert_component(&AssemblyComponent {
            assembly_id: BENCH_ASSEMBLY.to_string(),
            component_id: component_id.to_string(),
            component_type,
            base_quantity: dec(qty),
            waste_factor: dec(waste),
            is_optional: optional,
            option_code: option_code.map(str::to_string),
            substitute_group: None,
            effective_from,
            effective_to: None,
            sort_no,
        })?;
    }

    Ok(())
}

/// 插入配置规则种子数据
///
/// - 必选项 basin_count (品类作用域, 优先级最靠前)
/// - 长度边界 [12, 120] (阻断)
/// - 盆数边界 [1, 3] (阻断)
/// - 升降架与盆数互斥 (阻断)
/// - 长度超过 96 的加价提示 (非阻断)
pub fn seed_rules(rule_repo: &RuleRepository) -> Result<(), Box<dyn Error>> {
    let rules = vec![
        ConfigurationRule {
            rule_id: "R-004".to_string(),
            rule_name: "basin-count-required".to_string(),
            kind: RuleKind::Validation,
            scope: RuleScope::Category("SINK_BENCH".to_string()),
            priority: 5,
            is_blocking: true,
            predicate: RulePredicate::RequiredOption {
                option_code: "basin_count".to_string(),
            },
            message: "必须指定水槽盆数".to_string(),
        },
        ConfigurationRule {
            rule_id: "R-001".to_string(),
            rule_name: "sink-length-bounds".to_string(),
            kind: RuleKind::Validation,
            scope: RuleScope::Assembly(BENCH_ASSEMBLY.to_string()),
            priority: 10,
            is_blocking: true,
            predicate: RulePredicate::DimensionRange {
                option_code: "sink_length_in".to_string(),
                min: Decimal::from(12),
                max: Decimal::from(120),
            },
            message: "台面长度必须在 12~120 英寸之间".to_string(),
        },
        ConfigurationRule {
            rule_id: "R-002".to_string(),
            rule_name: "basin-count-bounds".to_string(),
            kind: RuleKind::Validation,
            scope: RuleScope::Assembly(BENCH_ASSEMBLY.to_string()),
            priority: 20,
            is_blocking: true,
            predicate: RulePredicate::CountRange {
                option_code: "basin_count".to_string(),
                min: 1,
                max: 3,
            },
            message: "水槽盆数必须在 1~3 之间".to_string(),
        },
        ConfigurationRule {
            rule_id: "R-003".to_string(),
            rule_name: "lifter-basin-compat".to_string(),
            kind: RuleKind::Compatibility,
            scope: RuleScope::Assembly(BENCH_ASSEMBLY.to_string()),
            priority: 30,
            is_blocking: true,
            predicate: RulePredicate::FeatureConflict {
                feature_code: "lifter".to_string(),
                other_option: "basin_count".to_string(),
                max_allowed: Decimal::from(2),
            },
            message: "升降架与超过 2 个水槽盆不兼容".to_string(),
        },
        ConfigurationRule {
            rule_id: "R-005".to_string(),
            rule_name: "long-bench-surcharge".to_string(),
            kind: RuleKind::Pricing,
            scope: RuleScope::Assembly(BENCH_ASSEMBLY.to_string()),
            priority: 40,
            is_blocking: false,
            predicate: RulePredicate::DimensionRange {
                option_code: "sink_length_in".to_string(),
                min: Decimal::from(12),
                max: Decimal::from(96),
            },
            message: "超长台面需要额外加价".to_string(),
        },
    ];

    for rule in &rules {
        rule_repo.insert(rule)?;
    }
    Ok(())
}

/// 插入引擎参数与编号序列种子数据
pub fn seed_settings(conn: &Connection) -> Result<(), Box<dyn Error>> {
    write_kv(conn, "custom_part_unit_cost", "85.00")?;
    write_kv(conn, "custom_part_unit_weight", "4.5")?;
    write_kv(
        conn,
        "component_options",
        r#"[{"option_code":"pegboard_spec","category_code":"PEGBOARD"}]"#,
    )?;
    conn.execute(
        r#"INSERT OR IGNORE INTO number_series (series_code, prefix, pad_width, next_value)
           VALUES ('CUSTOM_PART', '700', 4, 1000)"#,
        [],
    )?;
    Ok(())
}

// ==========================================
// TestEnv - 测试环境装配
// ==========================================
pub struct TestEnv {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub catalog_repo: Arc<CatalogRepository>,
    pub config_repo: Arc<ConfigurationRepository>,
    pub rule_repo: Arc<RuleRepository>,
    pub bom_repo: Arc<BomRepository>,
    pub order_repo: Arc<OrderRepository>,
    pub series_repo: Arc<NumberSeriesRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub event_sink: Arc<RecordingEventSink>,
    pub order_api: Arc<OrderApi>,
    pub config_api: Arc<ConfigurationApi>,
}

/// 创建完整测试环境 (含目录/规则/参数种子数据)
pub fn setup_env() -> TestEnv {
    let (temp_file, db_path) = create_test_db().unwrap();

    let raw_conn = db::open_sqlite_connection(&db_path).unwrap();
    let conn = Arc::new(Mutex::new(raw_conn));

    let catalog_repo = Arc::new(CatalogRepository::new(conn.clone()));
    let config_repo = Arc::new(ConfigurationRepository::new(conn.clone()));
    let rule_repo = Arc::new(RuleRepository::new(conn.clone()));
    let bom_repo = Arc::new(BomRepository::new(conn.clone()));
    let order_repo = Arc::new(OrderRepository::new(conn.clone()));
    let series_repo = Arc::new(NumberSeriesRepository::new(conn.clone()));
    let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

    seed_catalog(&catalog_repo).unwrap();
    seed_rules(&rule_repo).unwrap();
    {
        let guard = conn.lock().unwrap();
        seed_settings(&guard).unwrap();
    }

    let settings = {
        let guard = conn.lock().unwrap();
        SynthesisSettings::load(&guard).unwrap()
    };

    let event_sink = Arc::new(RecordingEventSink::new());
    let validator = Arc::new(ConfigurationValidator::new(conn.clone()));
    let synthesizer = BomSynthesizer::new(settings);
    let orchestrator = Arc::new(BomOrchestrator::new(conn.clone(), synthesizer));
    let lifecycle = Arc::new(OrderLifecycleManager::new(
        conn.clone(),
        event_sink.clone(),
    ));

    let order_api = Arc::new(OrderApi::new(
        order_repo.clone(),
        action_log_repo.clone(),
        lifecycle,
    ));
    let config_api = Arc::new(ConfigurationApi::new(
        conn.clone(),
        bom_repo.clone(),
        validator,
        orchestrator,
    ));

    TestEnv {
        _temp_file: temp_file,
        db_path,
        conn,
        catalog_repo,
        config_repo,
        rule_repo,
        bom_repo,
        order_repo,
        series_repo,
        action_log_repo,
        event_sink,
        order_api,
        config_api,
    }
}

// ==========================================
// 常用构造
// ==========================================

/// 场景A选项集: 2盆, 48寸, 不带定制挂板
pub fn selections_scenario_a() -> Selections {
    let mut s = Selections::new();
    s.insert(
        "basin_count".to_string(),
        SelectionValue::Number(Decimal::from(2)),
    );
    s.insert(
        "sink_length_in".to_string(),
        SelectionValue::Number(Decimal::from(48)),
    );
    s
}

/// 销售角色操作人
pub fn sales() -> Actor {
    Actor::new("sales_01", ActorRole::Sales)
}

/// 管理员操作人
pub fn admin() -> Actor {
    Actor::new("admin_01", ActorRole::Admin)
}

/// 建订单+订单项+配置, 返回 (order_id, order_item_id, configuration_id)
pub fn draft_order_with_config(env: &TestEnv, selections: Selections) -> (String, String, String) {
    let order_id = env
        .order_api
        .create_order(&format!("SO-{}", uuid::Uuid::new_v4()), &sales())
        .unwrap();
    let order_item_id = env
        .order_api
        .add_order_item(&order_id, BENCH_ASSEMBLY)
        .unwrap();
    let configuration_id = env
        .config_api
        .create_configuration(&order_item_id, selections, &sales())
        .unwrap();
    (order_id, order_item_id, configuration_id)
}

/// 统计配置名下各状态的 BOM 数量
pub fn count_boms(env: &TestEnv, configuration_id: &str, status: Option<&str>) -> i64 {
    let conn = env.conn.lock().unwrap();
    match status {
        Some(s) => conn
            .query_row(
                "SELECT COUNT(*) FROM bom WHERE configuration_id = ? AND status = ?",
                rusqlite::params![configuration_id, s],
                |row| row.get(0),
            )
            .unwrap(),
        None => conn
            .query_row(
                "SELECT COUNT(*) FROM bom WHERE configuration_id = ?",
                rusqlite::params![configuration_id],
                |row| row.get(0),
            )
            .unwrap(),
    }
}
