#![forbid(unsafe_code)]

use chrono::Utc;
use uuid::Uuid;

use icl_contracts::submission::{CreatedAt, SubmissionId};
use icl_contracts::ContractViolation;

/// Fresh globally-unique submission id. Never reused; collisions are
/// probabilistically excluded per standard v4 UUID generation.
pub fn fresh_submission_id() -> Result<SubmissionId, ContractViolation> {
    SubmissionId::new(Uuid::new_v4().to_string())
}

/// Server-side persistence date (UTC). The user never supplies this.
pub fn current_date() -> Result<CreatedAt, ContractViolation> {
    CreatedAt::new(Utc::now().date_naive().format("%Y-%m-%d").to_string())
}
