// ==========================================
// 订单生命周期引擎测试
// ==========================================
// 职责: 验证迁移表、权限表、副作用、历史行与拒绝语义
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use sink_cto::api::ApiError;
use sink_cto::domain::types::{Actor, ActorRole, OrderPhase, ProductionStatus};
use sink_cto::engine::OrderEventType;
use test_helpers::{draft_order_with_config, sales, selections_scenario_a, setup_env};

fn actor(name: &str, role: ActorRole) -> Actor {
    Actor::new(name, role)
}

/// 把订单从 Draft 推进到指定阶段 (带正确角色)
fn advance_to(env: &test_helpers::TestEnv, order_id: &str, target: OrderPhase) {
    let steps = [
        (OrderPhase::Configuration, ActorRole::Sales),
        (OrderPhase::Approval, ActorRole::Engineering),
        (OrderPhase::Production, ActorRole::Planner),
        (OrderPhase::QualityControl, ActorRole::Production),
        (OrderPhase::Packaging, ActorRole::Quality),
        (OrderPhase::Shipping, ActorRole::Logistics),
        (OrderPhase::Delivered, ActorRole::Logistics),
    ];
    for (phase, role) in steps {
        env.order_api
            .transition_phase(order_id, phase, &actor("walker", role), None)
            .unwrap();
        if phase == target {
            return;
        }
    }
}

// ==========================================
// 测试1: 完整正向流
// ==========================================

#[test]
fn test_full_forward_walk() {
    let env = setup_env();
    let (order_id, item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());
    env.config_api.generate_bom(&item_id, &sales()).unwrap();

    advance_to(&env, &order_id, OrderPhase::Delivered);

    let order = env.order_api.get_order(&order_id).unwrap();
    assert_eq!(order.current_phase, OrderPhase::Delivered);
    assert!(order.actual_delivery_date.is_some(), "交付时间必须盖章");

    // 7 次迁移 = 7 行不可变历史
    let history = env.order_api.list_status_history(&order_id).unwrap();
    assert_eq!(history.len(), 7);
    assert_eq!(history[0].from_phase, OrderPhase::Draft);
    assert_eq!(history[0].to_phase, OrderPhase::Configuration);
    assert_eq!(history[6].to_phase, OrderPhase::Delivered);
    assert!(history.iter().all(|h| h.duration_in_prior_phase_s >= 0));

    // 审计事件逐笔落库
    assert_eq!(
        env.action_log_repo.count_by_type("PhaseTransition").unwrap(),
        7
    );
}

// ==========================================
// 测试2: 跳阶段直达被拒, 不留历史
// ==========================================

#[test]
fn test_skipping_transition_rejected_without_history() {
    let env = setup_env();
    let (order_id, _item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());

    let err = env
        .order_api
        .transition_phase(
            &order_id,
            OrderPhase::Production,
            &actor("p1", ActorRole::Planner),
            None,
        )
        .unwrap_err();

    match err {
        ApiError::InvalidTransition { from, to } => {
            assert_eq!(from, OrderPhase::Draft);
            assert_eq!(to, OrderPhase::Production);
        }
        other => panic!("期望 InvalidTransition, 实际 {:?}", other),
    }

    // 状态与历史都未被触碰
    let order = env.order_api.get_order(&order_id).unwrap();
    assert_eq!(order.current_phase, OrderPhase::Draft);
    assert!(env.order_api.list_status_history(&order_id).unwrap().is_empty());
}

// ==========================================
// 测试3: 场景E - 质检放行无权限被拒
// ==========================================

#[test]
fn test_unauthorized_qc_release_rejected() {
    let env = setup_env();
    let (order_id, item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());
    env.config_api.generate_bom(&item_id, &sales()).unwrap();
    advance_to(&env, &order_id, OrderPhase::QualityControl);
    let history_before = env.order_api.list_status_history(&order_id).unwrap().len();

    // 物流角色不具备质检放行权限
    let err = env
        .order_api
        .transition_phase(
            &order_id,
            OrderPhase::Packaging,
            &actor("l1", ActorRole::Logistics),
            None,
        )
        .unwrap_err();

    match err {
        ApiError::AuthorizationError { role, .. } => assert_eq!(role, ActorRole::Logistics),
        other => panic!("期望 AuthorizationError, 实际 {:?}", other),
    }

    let order = env.order_api.get_order(&order_id).unwrap();
    assert_eq!(order.current_phase, OrderPhase::QualityControl);
    assert_eq!(
        env.order_api.list_status_history(&order_id).unwrap().len(),
        history_before,
        "被拒迁移不得追加历史行"
    );
}

// ==========================================
// 测试4: 返工边 - 质检退回生产
// ==========================================

#[test]
fn test_rework_back_to_production() {
    let env = setup_env();
    let (order_id, item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());
    env.config_api.generate_bom(&item_id, &sales()).unwrap();
    advance_to(&env, &order_id, OrderPhase::QualityControl);

    env.order_api
        .transition_phase(
            &order_id,
            OrderPhase::Production,
            &actor("q1", ActorRole::Quality),
            Some("表面划伤返工".to_string()),
        )
        .unwrap();

    let order = env.order_api.get_order(&order_id).unwrap();
    assert_eq!(order.current_phase, OrderPhase::Production);

    let history = env.order_api.list_status_history(&order_id).unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.from_phase, OrderPhase::QualityControl);
    assert_eq!(last.to_phase, OrderPhase::Production);
    assert_eq!(last.reason.as_deref(), Some("表面划伤返工"));
}

// ==========================================
// 测试5: 挂起与恢复
// ==========================================

#[test]
fn test_on_hold_suspend_and_resume() {
    let env = setup_env();
    let (order_id, item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());
    env.config_api.generate_bom(&item_id, &sales()).unwrap();
    advance_to(&env, &order_id, OrderPhase::Production);

    // 挂起
    env.order_api
        .transition_phase(
            &order_id,
            OrderPhase::OnHold,
            &actor("p1", ActorRole::Planner),
            Some("客户暂停".to_string()),
        )
        .unwrap();
    let held = env.order_api.get_order(&order_id).unwrap();
    assert_eq!(held.current_phase, OrderPhase::OnHold);
    assert_eq!(held.held_from_phase, Some(OrderPhase::Production));

    // 不能恢复到别的阶段
    let err = env
        .order_api
        .transition_phase(
            &order_id,
            OrderPhase::Packaging,
            &actor("q1", ActorRole::Quality),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidTransition { .. }));

    // 恢复到挂起前阶段
    env.order_api
        .transition_phase(
            &order_id,
            OrderPhase::Production,
            &actor("p1", ActorRole::Planner),
            Some("恢复生产".to_string()),
        )
        .unwrap();
    let resumed = env.order_api.get_order(&order_id).unwrap();
    assert_eq!(resumed.current_phase, OrderPhase::Production);
    assert_eq!(resumed.held_from_phase, None);
}

// ==========================================
// 测试6: 取消是终态
// ==========================================

#[test]
fn test_cancel_is_terminal() {
    let env = setup_env();
    let (order_id, _item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());

    env.order_api
        .transition_phase(
            &order_id,
            OrderPhase::Cancelled,
            &sales(),
            Some("客户撤单".to_string()),
        )
        .unwrap();

    let err = env
        .order_api
        .transition_phase(&order_id, OrderPhase::Configuration, &sales(), None)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidTransition { .. }));
}

// ==========================================
// 测试7: 副作用 - 进生产/进质检各发一次事件
// ==========================================

#[test]
fn test_side_effects_fire_exactly_once() {
    let env = setup_env();
    let (order_id, item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());
    let bom = env.config_api.generate_bom(&item_id, &sales()).unwrap();

    advance_to(&env, &order_id, OrderPhase::Production);

    let production_events: Vec<_> = env
        .event_sink
        .recorded()
        .into_iter()
        .filter(|e| e.event_type == OrderEventType::EnteredProduction)
        .collect();
    assert_eq!(production_events.len(), 1, "生产任务事件只发一次");
    assert_eq!(production_events[0].order_item_id, item_id);
    assert_eq!(
        production_events[0].active_bom_id.as_deref(),
        Some(bom.bom_id.as_str()),
        "事件必须携带激活 BOM 引用"
    );

    // 订单项已下达
    let item = env.order_api.get_order_item(&item_id).unwrap();
    assert_eq!(item.production_status, ProductionStatus::Released);

    // 进质检发清单事件
    env.order_api
        .transition_phase(
            &order_id,
            OrderPhase::QualityControl,
            &actor("w1", ActorRole::Production),
            None,
        )
        .unwrap();
    let qc_events: Vec<_> = env
        .event_sink
        .recorded()
        .into_iter()
        .filter(|e| e.event_type == OrderEventType::EnteredQualityControl)
        .collect();
    assert_eq!(qc_events.len(), 1);
}

// ==========================================
// 测试8: 被拒迁移不触发副作用
// ==========================================

#[test]
fn test_rejected_transition_fires_no_events() {
    let env = setup_env();
    let (order_id, _item_id, _config_id) = draft_order_with_config(&env, selections_scenario_a());

    // Draft 直达 Production 被拒
    let _ = env
        .order_api
        .transition_phase(
            &order_id,
            OrderPhase::Production,
            &actor("p1", ActorRole::Planner),
            None,
        )
        .unwrap_err();

    assert!(env.event_sink.recorded().is_empty(), "被拒迁移不得发事件");
}
