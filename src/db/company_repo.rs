// src/db/company_repo.rs

use sqlx::PgPool;

use crate::{common::error::AppError, models::auth::Company};

// Lookups ligados à sessão: as empresas que o ERP libera para cada usuário
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Substitui a lista de empresas do usuário pela que veio do ERP.
    pub async fn replace_for_user(&self, erp_uid: i64, companies: &[Company]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_companies WHERE erp_uid = $1")
            .bind(erp_uid)
            .execute(&mut *tx)
            .await?;

        for company in companies {
            sqlx::query("INSERT INTO user_companies (erp_uid, id, name) VALUES ($1, $2, $3)")
                .bind(erp_uid)
                .bind(company.id)
                .bind(&company.name)
                .execute(&mut *tx)
                .await?;
        }

        // Se qualquer insert falhar, o drop do tx faz o rollback
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_user(&self, erp_uid: i64) -> Result<Vec<Company>, AppError> {
        let companies = sqlx::query_as::<_, Company>(
            "SELECT id, name FROM user_companies WHERE erp_uid = $1 ORDER BY name",
        )
        .bind(erp_uid)
        .fetch_all(&self.pool)
        .await?;

        Ok(companies)
    }
}
