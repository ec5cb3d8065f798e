// src/erp/client.rs

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    common::error::AppError,
    erp::xmlrpc::{self, Value},
    models::{auth::Company, project::PartnerRef},
};

/// Credenciais do ERP guardadas na sessão (cookie criptografado).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpCredentials {
    pub uid: i64,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ErpUser {
    pub name: String,
    pub company_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct ErpProject {
    pub id: i64,
    pub name: String,
    pub company: Option<(i64, String)>,
    pub client: Option<(i64, String)>,
}

const PARTNER_LIMIT: i64 = 80;

// Cliente XML-RPC explícito (sem singleton): construído no AppState e passado adiante.
#[derive(Clone)]
pub struct ErpClient {
    base_url: String,
    database: String,
    agent: ureq::Agent,
}

impl ErpClient {
    pub fn new(base_url: &str, database: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, AppError> {
        let url = format!("{}/xmlrpc/2/{}", self.base_url, endpoint);
        let body = xmlrpc::encode_call(method, &params);
        let agent = self.agent.clone();

        // O ureq é bloqueante: roda fora do runtime assíncrono.
        let response = tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .set("Content-Type", "text/xml")
                .send_string(&body)
                .map_err(|e| AppError::ErpError(e.to_string()))?
                .into_string()
                .map_err(|e| AppError::ErpError(e.to_string()))
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de chamada ao ERP: {}", e))??;

        xmlrpc::decode_response(&response).map_err(|e| AppError::ErpError(e.to_string()))
    }

    async fn execute_kw(
        &self,
        credentials: &ErpCredentials,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Value, AppError> {
        self.call(
            "object",
            "execute_kw",
            vec![
                Value::from(self.database.as_str()),
                Value::Int(credentials.uid),
                Value::from(credentials.password.as_str()),
                Value::from(model),
                Value::from(method),
                Value::Array(args),
                Value::Struct(kwargs),
            ],
        )
        .await
    }

    /// Devolve o uid do usuário, ou None se o ERP recusar as credenciais.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Option<i64>, AppError> {
        let result = self
            .call(
                "common",
                "authenticate",
                vec![
                    Value::from(self.database.as_str()),
                    Value::from(login),
                    Value::from(password),
                    Value::Struct(BTreeMap::new()),
                ],
            )
            .await?;

        Ok(result.as_i64().filter(|uid| *uid > 0))
    }

    pub async fn user_profile(&self, credentials: &ErpCredentials) -> Result<ErpUser, AppError> {
        let records = self
            .execute_kw(
                credentials,
                "res.users",
                "read",
                vec![Value::from(vec![credentials.uid])],
                fields(&["name", "company_ids"]),
            )
            .await?;

        let record = records
            .as_array()
            .and_then(|r| r.first())
            .ok_or_else(|| AppError::ErpError("usuário não retornado pelo ERP".into()))?;

        Ok(ErpUser {
            name: record
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            company_ids: record.get("company_ids").map(Value::ids).unwrap_or_default(),
        })
    }

    pub async fn companies(
        &self,
        credentials: &ErpCredentials,
        ids: &[i64],
    ) -> Result<Vec<Company>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = self
            .execute_kw(
                credentials,
                "res.company",
                "read",
                vec![Value::from(ids.to_vec())],
                fields(&["name"]),
            )
            .await?;

        Ok(id_name_pairs(&records)
            .map(|(id, name)| Company { id, name })
            .collect())
    }

    /// Fornecedores (empresas) do ERP, com filtro opcional por nome.
    pub async fn partners(
        &self,
        credentials: &ErpCredentials,
        search: Option<&str>,
    ) -> Result<Vec<PartnerRef>, AppError> {
        let mut domain = vec![Value::from(vec![
            Value::from("is_company"),
            Value::from("="),
            Value::Bool(true),
        ])];
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            domain.push(Value::from(vec!["name", "ilike", term]));
        }

        let mut kwargs = fields(&["name"]);
        kwargs.insert("limit".into(), Value::Int(PARTNER_LIMIT));
        kwargs.insert("order".into(), Value::from("name"));

        let records = self
            .execute_kw(
                credentials,
                "res.partner",
                "search_read",
                vec![Value::Array(domain)],
                kwargs,
            )
            .await?;

        Ok(id_name_pairs(&records)
            .map(|(id, name)| PartnerRef { id, name })
            .collect())
    }

    pub async fn projects(
        &self,
        credentials: &ErpCredentials,
        company_ids: &[i64],
    ) -> Result<Vec<ErpProject>, AppError> {
        let domain = Value::from(vec![Value::from(vec![
            Value::from("company_id"),
            Value::from("in"),
            Value::from(company_ids.to_vec()),
        ])]);

        let records = self
            .execute_kw(
                credentials,
                "project.project",
                "search_read",
                vec![domain],
                fields(&["name", "company_id", "partner_id"]),
            )
            .await?;

        Ok(records
            .as_array()
            .unwrap_or_default()
            .iter()
            .filter_map(|r| {
                Some(ErpProject {
                    id: r.get("id")?.as_i64()?,
                    name: r.get("name")?.as_str()?.to_string(),
                    company: r.get("company_id").and_then(Value::as_many2one),
                    client: r.get("partner_id").and_then(Value::as_many2one),
                })
            })
            .collect())
    }
}

fn fields(names: &[&str]) -> BTreeMap<String, Value> {
    let mut kwargs = BTreeMap::new();
    kwargs.insert("fields".to_string(), Value::from(names.to_vec()));
    kwargs
}

fn id_name_pairs(records: &Value) -> impl Iterator<Item = (i64, String)> + '_ {
    records.as_array().unwrap_or_default().iter().filter_map(|r| {
        let id = r.get("id")?.as_i64()?;
        let name = r.get("name")?.as_str()?.to_string();
        Some((id, name))
    })
}
