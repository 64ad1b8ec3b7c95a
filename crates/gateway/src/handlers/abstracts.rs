//! Abstract CRUD, status and attachment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use super::{ensure_owner, ensure_visible, load_abstract, load_settings};
use crate::AppState;
use atlas_common::{
    abstracts::{
        self, prepare_submission, Abstract, AbstractStatus, Action, AttachmentInput, Owner,
        RegistrantSummary, RevisionInput, StatusChange, SubmitAbstractRequest,
    },
    auth::{AuthContext, Role},
    envelope::{ApiEnvelope, WithStatus},
    errors::{AppError, Result},
    listing::{paginate, ListQuery, Page},
    metrics,
};

type PathIds = Path<(String, String)>;

/// Filter and page `records` with the query's predicates
async fn list_page(
    state: &AppState,
    event_id: &str,
    records: Vec<Abstract>,
    query: &ListQuery,
) -> Result<Page<Abstract>> {
    let categories = state
        .store
        .find_settings(event_id)
        .await?
        .map(|s| s.categories)
        .unwrap_or_default();

    let limits = &state.config.abstracts;
    let limit = query
        .limit
        .unwrap_or(limits.default_page_size)
        .clamp(1, limits.fetch_limit.max(1));

    let filters = query.filters();
    let matching: Vec<Abstract> = records
        .into_iter()
        .filter(|record| filters.matches(record, &categories))
        .collect();

    Ok(paginate(matching, query.page.unwrap_or(1), limit))
}

/// The caller's own abstracts
pub async fn list_own(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<ApiEnvelope<Page<Abstract>>> {
    let records = state
        .store
        .list_abstracts(&event_id)
        .await?
        .into_iter()
        .filter(|record| record.is_owned_by(&auth.user_id))
        .collect();

    let page = list_page(&state, &event_id, records, &query).await?;
    Ok(ApiEnvelope::ok(page))
}

/// Every abstract of the event; reviewers only get their assignments
pub async fn list_event(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<ApiEnvelope<Page<Abstract>>> {
    auth.require_role(
        &[Role::Admin, Role::EventManager, Role::Reviewer],
        "list event abstracts",
    )?;

    let mut records = state.store.list_abstracts(&event_id).await?;
    if auth.role == Role::Reviewer {
        records.retain(|record| record.is_assigned(&auth.user_id));
    }

    let page = list_page(&state, &event_id, records, &query).await?;
    tracing::debug!(
        event_id = %event_id,
        role = %auth.role,
        total = page.total_items,
        "Listed event abstracts"
    );
    Ok(ApiEnvelope::ok(page))
}

pub async fn get_one(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
) -> Result<ApiEnvelope<Abstract>> {
    let record = load_abstract(&state, &event_id, &aid).await?;
    ensure_visible(&auth, &record)?;
    Ok(ApiEnvelope::ok(record))
}

/// Submit a new abstract, or save it as a draft
pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<String>,
    Json(request): Json<SubmitAbstractRequest>,
) -> Result<WithStatus<Abstract>> {
    auth.require_role(&[Role::Registrant, Role::Author], "submit abstracts")?;

    let settings = load_settings(&state, &event_id).await?;
    let now = Utc::now();
    settings.ensure_accepting(now)?;
    let input = prepare_submission(request.input, &settings)?;

    let (owner, registration_id) = match auth.role {
        Role::Author => (Owner::Author(auth.user_id.clone()), String::new()),
        _ => (Owner::Registration(auth.user_id.clone()), auth.user_id.clone()),
    };
    let status = if request.draft {
        AbstractStatus::Draft
    } else {
        AbstractStatus::Submitted
    };
    let number = state.store.next_abstract_number(&event_id).await?;

    let record = Abstract {
        id: Uuid::new_v4().to_string(),
        event_id: event_id.clone(),
        abstract_number: Some(number),
        title: input.title,
        authors: input.authors,
        author_affiliations: input.author_affiliations,
        content: input.content,
        category: input.category,
        sub_topic: input.sub_topic,
        file: input.file,
        owner,
        registrant: Some(RegistrantSummary {
            registration_id,
            name: auth.name.clone().unwrap_or_default(),
            email: auth.email.clone().unwrap_or_default(),
        }),
        status,
        assigned_reviewers: Default::default(),
        reviews: Vec::new(),
        revision: None,
        decision_reason: None,
        registration_proof_url: None,
        registration_verified: false,
        final_file_url: None,
        created_at: now,
        updated_at: now,
    };

    state.store.save_abstract(&record).await?;
    metrics::record_submission(status.as_str());

    tracing::info!(
        event_id = %event_id,
        abstract_id = %record.id,
        abstract_number = number,
        status = %status,
        "Abstract created"
    );

    let message = if request.draft {
        "Draft saved"
    } else {
        "Abstract submitted successfully"
    };
    Ok(WithStatus(
        StatusCode::CREATED,
        ApiEnvelope::ok(record).with_message(message),
    ))
}

/// Edit an own abstract. Saving without `draft` submits a draft or a
/// requested revision.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
    Json(request): Json<SubmitAbstractRequest>,
) -> Result<ApiEnvelope<Abstract>> {
    let mut record = load_abstract(&state, &event_id, &aid).await?;
    ensure_owner(&auth, &record, "edit this abstract")?;

    let settings = load_settings(&state, &event_id).await?;
    let now = Utc::now();
    abstracts::ensure_editable(&record, &settings, now)?;
    let input = prepare_submission(request.input, &settings)?;

    let from = record.status;
    let to = abstracts::apply_edit(&mut record, input, request.draft, auth.role, now)?;
    if to != from {
        metrics::record_submission(to.as_str());
    }

    state.store.save_abstract(&record).await?;
    tracing::info!(
        event_id = %event_id,
        abstract_id = %aid,
        from = %from,
        to = %record.status,
        "Abstract updated"
    );
    Ok(ApiEnvelope::ok(record).with_message("Abstract updated"))
}

/// Staff may delete any abstract; submitters only their own before review
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
) -> Result<ApiEnvelope<()>> {
    let record = load_abstract(&state, &event_id, &aid).await?;
    if !auth.role.is_staff() {
        ensure_owner(&auth, &record, "delete this abstract")?;
        if !matches!(record.status, AbstractStatus::Draft | AbstractStatus::Submitted) {
            return Err(AppError::transition(record.status, "delete"));
        }
    }

    if !state.store.delete_abstract(&event_id, &aid).await? {
        return Err(AppError::AbstractNotFound { id: aid });
    }

    tracing::info!(
        event_id = %event_id,
        abstract_id = %aid,
        user_id = %auth.user_id,
        "Abstract deleted"
    );
    Ok(ApiEnvelope::message("Abstract deleted"))
}

/// Who may run an action besides passing the workflow's role check
#[derive(Clone, Copy)]
enum Caller {
    /// Anyone who can see the abstract
    Viewer,
    /// Only the submitter who owns it; the text names the action for the error
    Owner(&'static str),
}

/// Load, apply one lifecycle action, persist
async fn run_action(
    state: &AppState,
    auth: &AuthContext,
    event_id: &str,
    aid: &str,
    caller: Caller,
    action: Action,
) -> Result<Abstract> {
    let mut record = load_abstract(state, event_id, aid).await?;
    match caller {
        Caller::Viewer => ensure_visible(auth, &record)?,
        Caller::Owner(what) => ensure_owner(auth, &record, what)?,
    }

    let from = record.status;
    let to = abstracts::apply(&mut record, action, auth.role, Utc::now())?;
    state.store.save_abstract(&record).await?;

    if to != from {
        metrics::record_transition(to.as_str());
    }
    Ok(record)
}

/// Admin status override
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
    Json(change): Json<StatusChange>,
) -> Result<ApiEnvelope<Abstract>> {
    let action = Action::SetStatus {
        status: change.status,
        reason: change.reason,
    };
    let record = run_action(&state, &auth, &event_id, &aid, Caller::Viewer, action).await?;
    let message = format!("Abstract status updated to {}", record.status);
    Ok(ApiEnvelope::ok(record).with_message(message))
}

pub async fn request_revision(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
    Json(revision): Json<RevisionInput>,
) -> Result<ApiEnvelope<Abstract>> {
    let action = Action::RequestRevision {
        instructions: revision.instructions,
        deadline: revision.deadline,
    };
    let record = run_action(&state, &auth, &event_id, &aid, Caller::Viewer, action).await?;
    Ok(ApiEnvelope::ok(record).with_message("Revision requested"))
}

/// Replace the abstract's attached file
pub async fn attach_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
    Json(file): Json<AttachmentInput>,
) -> Result<ApiEnvelope<Abstract>> {
    let mut record = load_abstract(&state, &event_id, &aid).await?;
    ensure_owner(&auth, &record, "attach files to this abstract")?;

    let settings = load_settings(&state, &event_id).await?;
    if !settings.allow_file_upload {
        return Err(AppError::Validation {
            message: "File upload is not enabled for this event".to_string(),
            field: Some("file".to_string()),
        });
    }
    if file.url.trim().is_empty() {
        return Err(AppError::Validation {
            message: "File is required".to_string(),
            field: Some("url".to_string()),
        });
    }

    record.file = Some(file.into_file_ref());
    record.updated_at = Utc::now();
    state.store.save_abstract(&record).await?;
    Ok(ApiEnvelope::ok(record).with_message("File attached"))
}

pub async fn upload_registration_proof(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
    Json(file): Json<AttachmentInput>,
) -> Result<ApiEnvelope<Abstract>> {
    let action = Action::UploadRegistrationProof { url: file.url };
    let caller = Caller::Owner("upload a registration proof");
    let record = run_action(&state, &auth, &event_id, &aid, caller, action).await?;
    Ok(ApiEnvelope::ok(record).with_message("Registration proof uploaded"))
}

pub async fn verify_registration(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
) -> Result<ApiEnvelope<Abstract>> {
    let action = Action::VerifyRegistration;
    let record = run_action(&state, &auth, &event_id, &aid, Caller::Viewer, action).await?;
    tracing::info!(
        event_id = %event_id,
        abstract_id = %aid,
        verified_by = %auth.user_id,
        "Registration verified"
    );
    Ok(ApiEnvelope::ok(record).with_message("Registration verified"))
}

pub async fn upload_final_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): PathIds,
    Json(file): Json<AttachmentInput>,
) -> Result<ApiEnvelope<Abstract>> {
    let action = Action::UploadFinalFile { url: file.url };
    let caller = Caller::Owner("upload the final file");
    let record = run_action(&state, &auth, &event_id, &aid, caller, action).await?;
    Ok(ApiEnvelope::ok(record).with_message("Final file uploaded"))
}
