//! `POST /api/contact` handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use crate::config::MailConfig;
use crate::contact::mailer::Mailer;
use crate::contact::message::OutgoingMail;
use crate::contact::submission::ContactSubmission;
use crate::error::ContactError;
use crate::observability::metrics;

/// Dependencies of the contact handler.
#[derive(Clone)]
pub struct ContactState {
    pub mailer: Arc<dyn Mailer>,
    pub mail: Arc<MailConfig>,
}

impl ContactState {
    pub fn new(mailer: Arc<dyn Mailer>, mail: MailConfig) -> Self {
        Self {
            mailer,
            mail: Arc::new(mail),
        }
    }
}

pub async fn submit_contact(
    State(state): State<ContactState>,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Result<Json<Value>, ContactError> {
    let result = handle(&state, payload).await;
    metrics::record_contact_submission(match &result {
        Ok(_) => "sent",
        Err(ContactError::InvalidBody(_)) | Err(ContactError::Validation(_)) => "rejected",
        Err(ContactError::Mail(_)) => "failed",
    });
    result
}

async fn handle(
    state: &ContactState,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Result<Json<Value>, ContactError> {
    let Json(submission) = payload.map_err(|e| ContactError::InvalidBody(e.body_text()))?;

    let valid = submission.validate().map_err(|issues| {
        tracing::debug!(issues = issues.len(), "Contact submission rejected");
        ContactError::Validation(issues)
    })?;

    let mail = OutgoingMail::compose(&valid, &state.mail);
    state.mailer.send(&mail).await?;

    Ok(Json(json!({ "success": true })))
}
