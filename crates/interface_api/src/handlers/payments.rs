//! Payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;
use uuid::Uuid;

use core_kernel::CaseId;
use domain_billing::{BillingError, RecordPayment};

use crate::dto::billing::PaymentResponse;
use crate::{error::ApiError, AppState};

/// Records a payment against an invoice
///
/// The payment itself is written once. If only the status update after it
/// fails, the recompute is retried; the payment is never written twice.
pub async fn record_payment(
    State(state): State<AppState>,
    Json(request): Json<RecordPayment>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let (payment_id, invoice_id) = match state.processor.record_payment(request).await {
        Ok(payment) => return Ok((StatusCode::CREATED, Json(payment.into()))),
        Err(BillingError::StatusRecomputeFailed {
            payment_id,
            invoice_id,
            source,
        }) => {
            warn!(%payment_id, %invoice_id, error = %source, "retrying status recompute");
            (payment_id, invoice_id)
        }
        Err(e) => return Err(e.into()),
    };

    state
        .retry
        .run("recompute_status", || state.processor.recompute_status(invoice_id))
        .await?;

    let payment = state
        .store
        .payments_for_invoice(invoice_id)
        .await
        .map_err(BillingError::from)?
        .into_iter()
        .find(|p| p.id == payment_id)
        .ok_or_else(|| ApiError::Internal(format!("payment {} vanished after recording", payment_id)))?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// Lists the payments filed under a case
pub async fn case_payments(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments = state
        .processor
        .payments_for_case(CaseId::from_uuid(case_id))
        .await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}
