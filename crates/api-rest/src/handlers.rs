use crate::dto::{
    AddAddendumReq, AddAddendumRes, AuditEventsRes, AuditParams, ClinicalFieldsReq,
    ClinicianChartRes, ErrorRes, ListQueueRes, PatientChartRes, QueueParams, RedFlagCatalogueRes,
    RedFlagRes, SubmitConsultationReq, SubmitConsultationRes, SuccessRes,
};
use crate::error::ApiError;
use crate::session::Caller;
use crate::AppState;
use api_shared::{HealthRes, HealthService};
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use telecare_core::triage::BlockedTriage;
use telecare_core::{ConsultationId, RedFlag};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/red-flags",
    responses(
        (status = 200, description = "Every red flag the intake form can offer", body = RedFlagCatalogueRes)
    )
)]
/// Red-flag catalogue for intake forms.
///
/// Pediatric flags are listed too; clients offer them only while the subject is a child.
pub async fn red_flags() -> Json<RedFlagCatalogueRes> {
    let flags = RedFlag::ALL
        .into_iter()
        .map(|flag| RedFlagRes {
            code: flag.code().to_string(),
            category: flag.category().as_str().to_string(),
            label: flag.label().to_string(),
        })
        .collect();
    Json(RedFlagCatalogueRes {
        flags,
        guidance: BlockedTriage::GUIDANCE.to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/consultations",
    request_body = SubmitConsultationReq,
    responses(
        (status = 201, description = "Consultation created", body = SubmitConsultationRes),
        (status = 403, description = "Caller may not submit for this membership", body = ErrorRes),
        (status = 404, description = "Subject not found", body = ErrorRes),
        (status = 422, description = "Blocked by a red flag or missing acknowledgement", body = ErrorRes)
    )
)]
/// Submit an intake.
///
/// Any red flag blocks the submission; the 422 body carries the emergency guidance.
pub async fn submit_consultation(
    State(state): State<AppState>,
    Caller(session): Caller,
    Json(req): Json<SubmitConsultationReq>,
) -> Result<(StatusCode, Json<SubmitConsultationRes>), ApiError> {
    let submission = req.into_submission()?;
    let id = state
        .service()
        .submit_consultation_request(&session, submission)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitConsultationRes {
            consultation_id: id.to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/queue",
    params(QueueParams),
    responses(
        (status = 200, description = "Matching consultations, oldest first", body = ListQueueRes),
        (status = 403, description = "Patients cannot view the queue", body = ErrorRes)
    )
)]
pub async fn list_queue(
    State(state): State<AppState>,
    Caller(session): Caller,
    Query(params): Query<QueueParams>,
) -> Result<Json<ListQueueRes>, ApiError> {
    let filter = params.into_filter(&session)?;
    let entries = state.service().list_queue(&session, Some(filter)).await?;
    Ok(Json(entries.into()))
}

#[utoipa::path(
    get,
    path = "/queue/events",
    params(QueueParams),
    responses(
        (status = 200, description = "Server-sent `queue` events, each a full ListQueueRes snapshot"),
        (status = 403, description = "Patients cannot view the queue", body = ErrorRes)
    )
)]
/// Live queue: one snapshot on connect, then a fresh one after every relevant change.
pub async fn queue_events(
    State(state): State<AppState>,
    Caller(session): Caller,
    Query(params): Query<QueueParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = params.into_filter(&session)?;
    let subscription = state.service().subscribe_queue(&session, Some(filter))?;

    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = match subscription.next().await? {
            Ok(entries) => Event::default()
                .event("queue")
                .json_data(ListQueueRes::from(entries))
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
            Err(e) => {
                tracing::warn!("queue refetch failed: {}", e);
                Event::default().event("error").data(e.to_string())
            }
        };
        Some((Ok(event), subscription))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/claim",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Claimed by the caller", body = SuccessRes),
        (status = 409, description = "Already claimed or no longer open", body = ErrorRes)
    )
)]
pub async fn claim(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<SuccessRes>, ApiError> {
    let id: ConsultationId = id.parse()?;
    state.service().claim(&session, id).await?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    put,
    path = "/consultations/{id}/draft",
    params(("id" = String, Path, description = "Consultation id")),
    request_body = ClinicalFieldsReq,
    responses(
        (status = 200, description = "Draft saved", body = SuccessRes),
        (status = 403, description = "Assigned to another clinician", body = ErrorRes),
        (status = 409, description = "Not claimed yet, or closed", body = ErrorRes)
    )
)]
pub async fn save_draft(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ClinicalFieldsReq>,
) -> Result<Json<SuccessRes>, ApiError> {
    let id: ConsultationId = id.parse()?;
    state.service().save_draft(&session, id, req.into()).await?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/complete",
    params(("id" = String, Path, description = "Consultation id")),
    request_body = ClinicalFieldsReq,
    responses(
        (status = 200, description = "Consultation completed", body = SuccessRes),
        (status = 409, description = "Not InProgress", body = ErrorRes),
        (status = 422, description = "Diagnosis or summary missing", body = ErrorRes)
    )
)]
pub async fn complete(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ClinicalFieldsReq>,
) -> Result<Json<SuccessRes>, ApiError> {
    let id: ConsultationId = id.parse()?;
    state.service().complete(&session, id, req.into()).await?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/cancel",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation cancelled", body = SuccessRes),
        (status = 409, description = "Already closed", body = ErrorRes)
    )
)]
pub async fn cancel(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<SuccessRes>, ApiError> {
    let id: ConsultationId = id.parse()?;
    state.service().cancel(&session, id).await?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/addenda",
    params(("id" = String, Path, description = "Consultation id")),
    request_body = AddAddendumReq,
    responses(
        (status = 201, description = "Addendum appended", body = AddAddendumRes),
        (status = 409, description = "Consultation is not Completed", body = ErrorRes)
    )
)]
pub async fn add_addendum(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<AddAddendumReq>,
) -> Result<(StatusCode, Json<AddAddendumRes>), ApiError> {
    let id: ConsultationId = id.parse()?;
    let addendum_id = state
        .service()
        .add_addendum(&session, id, req.into_new_addendum()?)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AddAddendumRes {
            addendum_id: addendum_id.to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/consultations/{id}/chart",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Full record with internal notes and addenda", body = ClinicianChartRes),
        (status = 403, description = "Clinicians only", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub async fn clinician_chart(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ClinicianChartRes>, ApiError> {
    let id: ConsultationId = id.parse()?;
    let chart = state.service().clinician_chart(&session, id).await?;
    Ok(Json(ClinicianChartRes { chart }))
}

#[utoipa::path(
    get,
    path = "/consultations/{id}/summary",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Patient-facing record", body = PatientChartRes),
        (status = 403, description = "Another membership's consultation", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub async fn patient_chart(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<PatientChartRes>, ApiError> {
    let id: ConsultationId = id.parse()?;
    let chart = state.service().patient_chart(&session, id).await?;
    Ok(Json(PatientChartRes { chart }))
}

#[utoipa::path(
    get,
    path = "/consultations/{id}/audit",
    params(("id" = String, Path, description = "Consultation id"), AuditParams),
    responses(
        (status = 200, description = "Audit events, newest first", body = AuditEventsRes),
        (status = 403, description = "Staff only", body = ErrorRes)
    )
)]
pub async fn audit_events(
    State(state): State<AppState>,
    Caller(session): Caller,
    AxumPath(id): AxumPath<String>,
    Query(params): Query<AuditParams>,
) -> Result<Json<AuditEventsRes>, ApiError> {
    let id: ConsultationId = id.parse()?;
    let events = state
        .service()
        .audit_events(&session, id, params.limit)
        .await?;
    Ok(Json(AuditEventsRes { events }))
}
