// ==========================================
// 定制水槽订单系统 - BOM 合成引擎
// ==========================================
// 职责: 把已校验配置的目标装配展开为带成本的扁平行项
// 红线: 头/行/合计/定制件注册共用调用方事务, 任一步失败整体回滚
// 红线: 展开前必须显式环检测, 不得假设目录图无环
// 展开深度: 单层, 嵌套装配作为单行计价, 不递归展开其子件
// ==========================================

use crate::config::settings::SynthesisSettings;
use crate::domain::bom::{Bom, BomLineItem, BomResult};
use crate::domain::configuration::Configuration;
use crate::domain::types::{BomStatus, ComponentType};
use crate::engine::error::EngineResult;
use crate::engine::numbering::CustomPartNumberingService;
use crate::repository::{BomRepository, CatalogRepository, RepositoryError};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

// ==========================================
// BomSynthesizer - BOM 合成引擎
// ==========================================
pub struct BomSynthesizer {
    settings: SynthesisSettings,
}

impl BomSynthesizer {
    /// 创建新的合成引擎实例
    pub fn new(settings: SynthesisSettings) -> Self {
        Self { settings }
    }

    /// 引擎参数
    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// 事务内生成 BOM
    ///
    /// # 前置条件 (由编排器保证)
    /// - 配置当前校验通过
    /// - 所属订单处于可变更阶段, 或管理员覆盖
    ///
    /// # 流程
    /// 1. 装配存在性检查 + 环检测
    /// 2. 建 DRAFT 状态的 BOM 头
    /// 3. 逐目录边计算 adjusted_quantity / extended_cost 并累计合计
    /// 4. 选件解析: 无目录匹配的选件铸造定制件 (同事务)
    /// 5. 行按目录顺序在前、选件行在后, 行号稳定
    /// 6. 回写合计与生成耗时
    ///
    /// 提交由调用方负责; 任何失败向上传播, 整个工作单元回滚
    pub fn generate_tx(
        &self,
        conn: &Connection,
        config: &Configuration,
        actor: &str,
        as_of: NaiveDate,
    ) -> EngineResult<BomResult> {
        let start = std::time::Instant::now();

        debug!(
            configuration_id = %config.configuration_id,
            assembly_id = %config.assembly_id,
            "开始 BOM 合成"
        );

        // ==========================================
        // 步骤1: 装配检查 + 环检测
        // ==========================================
        if CatalogRepository::find_assembly_tx(conn, &config.assembly_id)?.is_none() {
            return Err(RepositoryError::NotFound {
                entity: "Assembly".to_string(),
                id: config.assembly_id.clone(),
            }
            .into());
        }
        Self::assert_acyclic(conn, &config.assembly_id, as_of)?;

        // ==========================================
        // 步骤2: 建 BOM 头 (DRAFT)
        // ==========================================
        let bom_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();
        let mut bom = Bom {
            bom_id: bom_id.clone(),
            configuration_id: config.configuration_id.clone(),
            assembly_id: config.assembly_id.clone(),
            status: BomStatus::Draft,
            total_parts: 0,
            custom_parts_count: 0,
            total_cost: Decimal::ZERO,
            total_weight: Decimal::ZERO,
            generation_time_ms: 0,
            created_by: actor.to_string(),
            created_at: now,
        };
        BomRepository::insert_header_tx(conn, &bom)?;

        // ==========================================
        // 步骤3: 目录边展开 (单层)
        // ==========================================
        let components = CatalogRepository::expand_tx(conn, &config.assembly_id, as_of)?;

        let mut lines: Vec<BomLineItem> = Vec::new();
        let mut total_cost = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;
        let mut line_no = 0;

        for component in &components {
            // 选配边: 只有对应开关选项被选中时才进入 BOM;
            // 没有开关选项的选配边没有被选中的途径, 一律跳过
            if component.is_optional {
                let selected = component
                    .option_code
                    .as_deref()
                    .map(|code| config.flag(code))
                    .unwrap_or(false);
                if !selected {
                    debug!(
                        component_id = %component.component_id,
                        "选配组件未选中, 跳过"
                    );
                    continue;
                }
            }

            if component.base_quantity <= Decimal::ZERO {
                return Err(RepositoryError::DataIntegrity(format!(
                    "目录边用量非法: {} → {} base_quantity={}",
                    component.assembly_id, component.component_id, component.base_quantity
                ))
                .into());
            }

            let unit = CatalogRepository::unit_cost_tx(
                conn,
                &component.component_id,
                component.component_type,
            )?
            .ok_or_else(|| {
                RepositoryError::DataIntegrity(format!(
                    "组件缺少成本记录: {} ({})",
                    component.component_id, component.component_type
                ))
            })?;

            let adjusted = component.adjusted_quantity();
            let extended = adjusted * unit.cost;

            line_no += 1;
            lines.push(BomLineItem {
                bom_id: bom_id.clone(),
                line_no,
                component_id: component.component_id.clone(),
                component_type: component.component_type,
                base_quantity: component.base_quantity,
                waste_factor: component.waste_factor,
                adjusted_quantity: adjusted,
                unit_cost: unit.cost,
                extended_cost: extended,
                is_custom: false,
            });

            total_cost += extended;
            total_weight += adjusted * unit.weight;
        }

        // ==========================================
        // 步骤4: 选件解析 (目录行之后, 行号续排)
        // ==========================================
        let mut custom_count = 0;

        for binding in &self.settings.component_options {
            let spec = match config.text(&binding.option_code) {
                Some(spec) => spec.to_string(),
                None => continue,
            };

            let (part_no, unit_cost, unit_weight, is_custom) =
                match CatalogRepository::find_part_by_spec_tx(conn, &binding.category_code, &spec)? {
                    Some(part) => {
                        // 已有目录零件 (含此前铸造的定制件): 与标准件同路径解析
                        (part.part_no, part.unit_cost, part.unit_weight, part.is_custom)
                    }
                    None => {
                        // 无目录匹配: 铸造定制件, 跳过目录成本查询
                        let part = CustomPartNumberingService::mint_tx(
                            conn,
                            &binding.category_code,
                            &spec,
                            &format!("定制 {} {}", binding.category_code, spec),
                            self.settings.custom_part_unit_cost,
                            self.settings.custom_part_unit_weight,
                            actor,
                        )?;
                        info!(
                            part_no = %part.part_no,
                            option_code = %binding.option_code,
                            spec = %spec,
                            "选件无目录匹配, 已铸造定制件"
                        );
                        (part.part_no, part.unit_cost, part.unit_weight, true)
                    }
                };

            let quantity = Decimal::ONE;
            let extended = quantity * unit_cost;

            line_no += 1;
            if is_custom {
                custom_count += 1;
            }
            lines.push(BomLineItem {
                bom_id: bom_id.clone(),
                line_no,
                component_id: part_no,
                component_type: ComponentType::Part,
                base_quantity: quantity,
                waste_factor: Decimal::ZERO,
                adjusted_quantity: quantity,
                unit_cost,
                extended_cost: extended,
                is_custom,
            });

            total_cost += extended;
            total_weight += quantity * unit_weight;
        }

        // ==========================================
        // 步骤5: 行落库
        // ==========================================
        BomRepository::insert_lines_tx(conn, &lines)?;

        // ==========================================
        // 步骤6: 回写合计与耗时
        // ==========================================
        let generation_time_ms = start.elapsed().as_millis() as i64;
        bom.total_parts = lines.len() as i32;
        bom.custom_parts_count = custom_count;
        bom.total_cost = total_cost;
        bom.total_weight = total_weight;
        bom.generation_time_ms = generation_time_ms;
        BomRepository::update_totals_tx(conn, &bom)?;

        info!(
            bom_id = %bom_id,
            total_parts = bom.total_parts,
            custom_parts_count = bom.custom_parts_count,
            total_cost = %bom.total_cost,
            generation_time_ms,
            "BOM 合成完成"
        );

        Ok(BomResult {
            bom_id,
            total_parts: bom.total_parts,
            custom_parts_count: bom.custom_parts_count,
            total_cost: bom.total_cost,
            total_weight: bom.total_weight,
            generation_time_ms,
        })
    }

    /// 装配图环检测 (DFS, visited/in-progress 双标记)
    ///
    /// 沿传递闭包检查以 root 为起点可达的装配边, 检出环即判
    /// 数据完整性错误: 即便单层展开用不到更深的边, 坏图也要尽早失败
    fn assert_acyclic(conn: &Connection, root: &str, as_of: NaiveDate) -> EngineResult<()> {
        let edges = CatalogRepository::assembly_edges_tx(conn, as_of)?;

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for (parent, child) in &edges {
            adjacency.entry(parent.as_str()).or_default().push(child);
        }

        // 0=未访问 1=在栈上 2=已完成
        let mut marks: HashMap<&str, u8> = HashMap::new();
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        marks.insert(root, 1);

        while let Some((node, next_child)) = stack.pop() {
            let children = adjacency.get(node).map(|v| v.as_slice()).unwrap_or(&[]);
            if next_child < children.len() {
                stack.push((node, next_child + 1));
                let child = children[next_child];
                match marks.get(child).copied().unwrap_or(0) {
                    1 => {
                        return Err(RepositoryError::DataIntegrity(format!(
                            "装配图存在环: {} → {}",
                            node, child
                        ))
                        .into());
                    }
                    0 => {
                        marks.insert(child, 1);
                        stack.push((child, 0));
                    }
                    _ => {}
                }
            } else {
                marks.insert(node, 2);
            }
        }

        Ok(())
    }
}
