// src/models/project.rs

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// --- Limites ---

/// Teto para valores, custos e quantidades (1e12). Mantém toda a aritmética
/// das curvas longe do limite do `Decimal`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Faixa de anos aceita nas datas de tarefa.
pub const MIN_TASK_YEAR: i32 = 1900;
pub const MAX_TASK_YEAR: i32 = 2200;

/// Duração máxima de uma tarefa (~100 anos).
pub const MAX_TASK_SPAN_DAYS: i64 = 36_500;

pub fn year_in_range(date: NaiveDate) -> bool {
    (MIN_TASK_YEAR..=MAX_TASK_YEAR).contains(&date.year())
}

// --- Enums ---

/// Ciclo de vida da tarefa. Nunca é definido diretamente: sempre derivado do consumo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "pendiente")]
    Pendiente,
    #[serde(rename = "en-progreso")]
    EnProgreso,
    #[serde(rename = "completado")]
    Completado,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    // Id do project.project no ERP, quando veio de uma sincronização
    #[schema(example = 42)]
    pub erp_id: Option<i64>,
    #[schema(example = "Pavimentação Av. Central")]
    pub name: String,
    #[schema(example = 1)]
    pub company_id: i64,
    #[schema(example = "Construtora Andina")]
    pub company_name: String,
    #[schema(example = "Municipalidad de Lima")]
    pub client: String,
    #[schema(example = "250000.00")]
    pub total_value: Decimal,
    #[schema(example = "180000.00")]
    pub total_cost: Decimal,

    // Agregados derivados das tarefas
    #[serde(default)]
    pub task_count: usize,
    #[serde(default)]
    pub completed_tasks: usize,
    #[serde(default)]
    pub consumed_value: Decimal,
    #[serde(default)]
    #[schema(example = "37.50")]
    pub progress: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyConsumption {
    #[schema(example = "2024-08-01")]
    pub date: NaiveDate,
    #[schema(example = "40")]
    pub consumed_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskValidation {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[schema(example = "/uploads/550e8400-e29b-41d4-a716-446655440000.jpg")]
    pub image_url: String,
    #[schema(example = "-12.046374,-77.042793")]
    pub location: String,
}

/// Fornecedor (res.partner no ERP) responsável pela execução da tarefa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRef {
    #[schema(example = 17)]
    pub id: i64,
    #[schema(example = "Concretos del Sur SAC")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    #[schema(example = "Vaciado de losa")]
    pub name: String,
    #[schema(example = "100")]
    pub quantity: Decimal,
    #[schema(example = "1000.00")]
    pub value: Decimal,
    #[schema(example = "2024-08-01")]
    pub start_date: NaiveDate,
    #[schema(example = "2024-08-10")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub daily_consumption: Vec<DailyConsumption>,
    #[serde(default)]
    pub validations: Vec<TaskValidation>,
    pub partner: Option<PartnerRef>,
}

impl Task {
    pub fn total_consumed(&self) -> Decimal {
        self.daily_consumption
            .iter()
            .fold(Decimal::ZERO, |acc, c| acc.saturating_add(c.consumed_quantity))
    }

    /// Converte uma quantidade executada em valor monetário, à taxa unitária da tarefa.
    /// Tarefas com quantidade planejada zero não geram valor.
    /// Satura em `Decimal::MAX` em vez de estourar.
    pub fn value_of(&self, consumed: Decimal) -> Decimal {
        if self.quantity.is_zero() {
            return Decimal::ZERO;
        }
        consumed
            .checked_mul(self.value)
            .and_then(|v| v.checked_div(self.quantity))
            .or_else(|| consumed.checked_div(self.quantity)?.checked_mul(self.value))
            .unwrap_or(Decimal::MAX)
    }
}

/// O documento único do armazenamento em arquivo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(quantity: Decimal, value: Decimal) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            name: "Relleno".into(),
            quantity,
            value,
            start_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 8, 2).unwrap(),
            status: TaskStatus::Pendiente,
            daily_consumption: Vec::new(),
            validations: Vec::new(),
            partner: None,
        }
    }

    #[test]
    fn max_amount_is_one_trillion() {
        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000i64));
    }

    #[test]
    fn value_of_saturates_instead_of_overflowing() {
        let huge = Decimal::from(1_000_000_000_000_000i64);
        let t = task(Decimal::ONE, huge);

        assert_eq!(t.value_of(huge), Decimal::MAX);
    }

    #[test]
    fn value_of_uses_unit_rate() {
        let t = task(Decimal::from(100), Decimal::from(1000));
        assert_eq!(t.value_of(Decimal::from(40)), Decimal::from(400));
        assert_eq!(task(Decimal::ZERO, Decimal::from(1000)).value_of(Decimal::ONE), Decimal::ZERO);
    }

    #[test]
    fn task_years_are_bounded() {
        assert!(year_in_range(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(!year_in_range(NaiveDate::from_ymd_opt(1, 1, 1).unwrap()));
        assert!(!year_in_range(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap()));
    }
}
