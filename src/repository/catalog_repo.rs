// ==========================================
// 定制水槽订单系统 - 产品目录仓储
// ==========================================
// 消费方视角: expand / unit_cost 是只读的、按生效日期过滤的目录契约
// 红线: Repository 不含业务逻辑 (环检测在引擎层)
// ==========================================

use crate::domain::catalog::{Assembly, AssemblyComponent, Category, Part, UnitCost};
use crate::domain::types::ComponentType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{date_col, datetime_col, decimal_col, DATETIME_FMT, DATE_FMT};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository - 目录仓储
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    /// 创建新的CatalogRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入 (目录维护 / 定制件注册)
    // ==========================================

    /// 插入品类
    pub fn insert_category(&self, category: &Category) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO category (category_code, category_name, created_at)
               VALUES (?, ?, ?)"#,
            params![
                &category.category_code,
                &category.category_name,
                &category.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 插入装配件
    pub fn insert_assembly(&self, assembly: &Assembly) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO assembly (
                assembly_id, assembly_name, category_code, unit_cost, unit_weight, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &assembly.assembly_id,
                &assembly.assembly_name,
                &assembly.category_code,
                &assembly.unit_cost.to_string(),
                &assembly.unit_weight.to_string(),
                &assembly.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 插入零件
    pub fn insert_part(&self, part: &Part) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_part_tx(&conn, part)
    }

    /// 插入零件 (事务内)
    ///
    /// 定制件注册走此入口, 与 BOM 生成同一工作单元提交
    pub fn insert_part_tx(conn: &Connection, part: &Part) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO part (
                part_no, part_name, category_code, spec_code,
                unit_cost, unit_weight, is_custom, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &part.part_no,
                &part.part_name,
                &part.category_code,
                &part.spec_code,
                &part.unit_cost.to_string(),
                &part.unit_weight.to_string(),
                if part.is_custom { 1 } else { 0 },
                &part.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 插入装配组成边
    pub fn insert_component(&self, component: &AssemblyComponent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO assembly_component (
                assembly_id, component_id, component_type, base_quantity, waste_factor,
                is_optional, option_code, substitute_group,
                effective_from, effective_to, sort_no
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &component.assembly_id,
                &component.component_id,
                component.component_type.to_db_str(),
                &component.base_quantity.to_string(),
                &component.waste_factor.to_string(),
                if component.is_optional { 1 } else { 0 },
                &component.option_code,
                &component.substitute_group,
                &component.effective_from.format(DATE_FMT).to_string(),
                &component
                    .effective_to
                    .map(|d| d.format(DATE_FMT).to_string()),
                &component.sort_no,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 读取 (消费契约)
    // ==========================================

    /// 按ID查询装配件
    pub fn find_assembly(&self, assembly_id: &str) -> RepositoryResult<Option<Assembly>> {
        let conn = self.get_conn()?;
        Self::find_assembly_tx(&conn, assembly_id)
    }

    /// 按ID查询装配件 (事务内)
    pub fn find_assembly_tx(
        conn: &Connection,
        assembly_id: &str,
    ) -> RepositoryResult<Option<Assembly>> {
        match conn.query_row(
            r#"SELECT assembly_id, assembly_name, category_code, unit_cost, unit_weight, created_at
               FROM assembly
               WHERE assembly_id = ?"#,
            params![assembly_id],
            Self::map_assembly_row,
        ) {
            Ok(assembly) => Ok(Some(assembly)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 展开装配的直接组成 (仅返回生效窗口覆盖 as_of 的边, 按目录顺序)
    pub fn expand(
        &self,
        assembly_id: &str,
        as_of: NaiveDate,
    ) -> RepositoryResult<Vec<AssemblyComponent>> {
        let conn = self.get_conn()?;
        Self::expand_tx(&conn, assembly_id, as_of)
    }

    /// 展开装配的直接组成 (事务内)
    pub fn expand_tx(
        conn: &Connection,
        assembly_id: &str,
        as_of: NaiveDate,
    ) -> RepositoryResult<Vec<AssemblyComponent>> {
        let as_of_s = as_of.format(DATE_FMT).to_string();
        let mut stmt = conn.prepare(
            r#"SELECT assembly_id, component_id, component_type, base_quantity, waste_factor,
                      is_optional, option_code, substitute_group,
                      effective_from, effective_to, sort_no
               FROM assembly_component
               WHERE assembly_id = ?
                 AND effective_from <= ?
                 AND (effective_to IS NULL OR effective_to >= ?)
               ORDER BY sort_no, component_id"#,
        )?;

        let components = stmt
            .query_map(params![assembly_id, &as_of_s, &as_of_s], |row| {
                Self::map_component_row(row)
            })?
            .collect::<Result<Vec<AssemblyComponent>, _>>()?;

        Ok(components)
    }

    /// 查询组件单价/单重
    pub fn unit_cost(
        &self,
        component_id: &str,
        component_type: ComponentType,
    ) -> RepositoryResult<Option<UnitCost>> {
        let conn = self.get_conn()?;
        Self::unit_cost_tx(&conn, component_id, component_type)
    }

    /// 查询组件单价/单重 (事务内)
    pub fn unit_cost_tx(
        conn: &Connection,
        component_id: &str,
        component_type: ComponentType,
    ) -> RepositoryResult<Option<UnitCost>> {
        let sql = match component_type {
            ComponentType::Part => "SELECT unit_cost, unit_weight FROM part WHERE part_no = ?",
            ComponentType::Assembly => {
                "SELECT unit_cost, unit_weight FROM assembly WHERE assembly_id = ?"
            }
        };

        match conn.query_row(sql, params![component_id], |row| {
            Ok(UnitCost {
                cost: decimal_col(0, row.get::<_, String>(0)?)?,
                weight: decimal_col(1, row.get::<_, String>(1)?)?,
            })
        }) {
            Ok(cost) => Ok(Some(cost)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按品类+规格代码查零件 (选件到标准件的解析)
    pub fn find_part_by_spec(
        &self,
        category_code: &str,
        spec_code: &str,
    ) -> RepositoryResult<Option<Part>> {
        let conn = self.get_conn()?;
        Self::find_part_by_spec_tx(&conn, category_code, spec_code)
    }

    /// 按品类+规格代码查零件 (事务内)
    pub fn find_part_by_spec_tx(
        conn: &Connection,
        category_code: &str,
        spec_code: &str,
    ) -> RepositoryResult<Option<Part>> {
        match conn.query_row(
            r#"SELECT part_no, part_name, category_code, spec_code,
                      unit_cost, unit_weight, is_custom, created_at
               FROM part
               WHERE category_code = ? AND spec_code = ?"#,
            params![category_code, spec_code],
            Self::map_part_row,
        ) {
            Ok(part) => Ok(Some(part)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按零件号查零件
    pub fn find_part(&self, part_no: &str) -> RepositoryResult<Option<Part>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            r#"SELECT part_no, part_name, category_code, spec_code,
                      unit_cost, unit_weight, is_custom, created_at
               FROM part
               WHERE part_no = ?"#,
            params![part_no],
            Self::map_part_row,
        ) {
            Ok(part) => Ok(Some(part)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 取装配→装配的全部生效边 (供引擎做环检测)
    ///
    /// 返回 (父装配, 子装配) 对
    pub fn assembly_edges_tx(
        conn: &Connection,
        as_of: NaiveDate,
    ) -> RepositoryResult<Vec<(String, String)>> {
        let as_of_s = as_of.format(DATE_FMT).to_string();
        let mut stmt = conn.prepare(
            r#"SELECT assembly_id, component_id
               FROM assembly_component
               WHERE component_type = 'ASSEMBLY'
                 AND effective_from <= ?
                 AND (effective_to IS NULL OR effective_to >= ?)"#,
        )?;

        let edges = stmt
            .query_map(params![&as_of_s, &as_of_s], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<(String, String)>, _>>()?;

        Ok(edges)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_assembly_row(row: &rusqlite::Row) -> rusqlite::Result<Assembly> {
        Ok(Assembly {
            assembly_id: row.get(0)?,
            assembly_name: row.get(1)?,
            category_code: row.get(2)?,
            unit_cost: decimal_col(3, row.get::<_, String>(3)?)?,
            unit_weight: decimal_col(4, row.get::<_, String>(4)?)?,
            created_at: datetime_col(5, row.get::<_, String>(5)?)?,
        })
    }

    fn map_part_row(row: &rusqlite::Row) -> rusqlite::Result<Part> {
        Ok(Part {
            part_no: row.get(0)?,
            part_name: row.get(1)?,
            category_code: row.get(2)?,
            spec_code: row.get(3)?,
            unit_cost: decimal_col(4, row.get::<_, String>(4)?)?,
            unit_weight: decimal_col(5, row.get::<_, String>(5)?)?,
            is_custom: row.get::<_, i32>(6)? == 1,
            created_at: datetime_col(7, row.get::<_, String>(7)?)?,
        })
    }

    fn map_component_row(row: &rusqlite::Row) -> rusqlite::Result<AssemblyComponent> {
        let component_type_s: String = row.get(2)?;
        let component_type = ComponentType::from_str(&component_type_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("未知组件类型: {}", component_type_s).into(),
            )
        })?;

        Ok(AssemblyComponent {
            assembly_id: row.get(0)?,
            component_id: row.get(1)?,
            component_type,
            base_quantity: decimal_col(3, row.get::<_, String>(3)?)?,
            waste_factor: decimal_col(4, row.get::<_, String>(4)?)?,
            is_optional: row.get::<_, i32>(5)? == 1,
            option_code: row.get(6)?,
            substitute_group: row.get(7)?,
            effective_from: date_col(8, row.get::<_, String>(8)?)?,
            effective_to: row
                .get::<_, Option<String>>(9)?
                .map(|s| date_col(9, s))
                .transpose()?,
            sort_no: row.get(10)?,
        })
    }
}
