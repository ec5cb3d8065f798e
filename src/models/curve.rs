// src/models/curve.rs

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

// Pontos da Curva S. Nunca são persistidos: recalculados a cada leitura.

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPoint {
    #[schema(example = "2024-08-01")]
    pub date: NaiveDate,
    #[schema(example = "45.00")]
    pub planned: Decimal,
    #[schema(example = "60.00")]
    pub actual: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostPoint {
    #[schema(example = "2024-08-01")]
    pub date: NaiveDate,
    pub planned: Decimal,
    pub actual: Decimal,
    // Percentual acumulado por fornecedor
    pub cumulative_providers: BTreeMap<String, Decimal>,
    // actual - planned (positivo = adiantado)
    #[schema(example = "15.00")]
    pub deviation: Decimal,
}
