//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::{CaseId, InvoiceId};
use domain_billing::{CreateInvoice, InvoiceUpdate};

use crate::dto::billing::{BalanceResponse, InvoiceResponse};
use crate::{error::ApiError, AppState};

/// Creates an invoice, retrying transient numbering failures
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let invoice = state
        .retry
        .run("create_invoice", || state.ledger.create_invoice(request.clone()))
        .await?;

    Ok((StatusCode::CREATED, Json(invoice.into())))
}

/// Gets an invoice by ID
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice = state.ledger.get_invoice(InvoiceId::from_uuid(id)).await?;
    Ok(Json(invoice.into()))
}

/// Updates the allow-listed fields of an invoice
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<InvoiceUpdate>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice = state
        .ledger
        .update_invoice(InvoiceId::from_uuid(id), update)
        .await?;
    Ok(Json(invoice.into()))
}

/// Deletes an invoice and its payments
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.ledger.delete_invoice(InvoiceId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Paid and outstanding amounts of an invoice
pub async fn invoice_balance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.processor.balance(InvoiceId::from_uuid(id)).await?;
    Ok(Json(balance.into()))
}

/// Lists the invoices of a case
pub async fn case_invoices(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    let invoices = state
        .ledger
        .invoices_for_case(CaseId::from_uuid(case_id))
        .await?;
    Ok(Json(invoices.into_iter().map(Into::into).collect()))
}
