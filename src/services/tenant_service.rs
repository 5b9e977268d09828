//! services/tenant_service.rs
//! Lectura de tenants y actualización de su sesión de WhatsApp.

use sqlx::{Pool, Sqlite};

use crate::errors::{AppError, AppResult};
use crate::models::tenant_model::TenantRecord;

const TENANT_COLUMNS: &str = r#"
    id, business_name, plan, api_token, waha_session_name, waha_status, created_at
"#;

#[derive(Clone, Debug)]
pub struct TenantService {
    db_pool: Pool<Sqlite>,
}

impl TenantService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        TenantService { db_pool }
    }

    pub async fn get_tenant(&self, tenant_id: &str) -> AppResult<TenantRecord> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1");
        sqlx::query_as::<_, TenantRecord>(&sql)
            .bind(tenant_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tenant {}", tenant_id)))
    }

    /// Resuelve el token bearer al tenant dueño. `None` si no existe.
    pub async fn find_by_token(&self, api_token: &str) -> AppResult<Option<TenantRecord>> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE api_token = ?1");
        let tenant = sqlx::query_as::<_, TenantRecord>(&sql)
            .bind(api_token)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(tenant)
    }

    /// Guarda nombre y estado de la sesión. `None` en el nombre deja el actual.
    pub async fn update_session(
        &self,
        tenant_id: &str,
        session_name: Option<&str>,
        status: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE tenants
            SET waha_session_name = COALESCE(?2, waha_session_name),
                waha_status = ?3
            WHERE id = ?1
            "#,
        )
        .bind(tenant_id)
        .bind(session_name)
        .bind(status)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    /// Los tenants se dan de alta fuera de este servicio; esto es para tests.
    #[cfg(test)]
    pub async fn insert_tenant(
        &self,
        business_name: &str,
        plan: crate::models::tenant_model::Plan,
        session_name: Option<&str>,
    ) -> AppResult<TenantRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let token = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO tenants (id, business_name, plan, api_token, waha_session_name, waha_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)
            "#,
        )
        .bind(&id)
        .bind(business_name)
        .bind(plan)
        .bind(&token)
        .bind(session_name)
        .bind(chrono::Utc::now())
        .execute(&self.db_pool)
        .await?;
        self.get_tenant(&id).await
    }
}
