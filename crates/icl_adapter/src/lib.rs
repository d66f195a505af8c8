#![forbid(unsafe_code)]

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use icl_contracts::identity::AuthState;
use icl_contracts::measurement::{
    Auge, FieldControl, Geschlecht, MeasurementRecord, MEASUREMENT_FIELD_SPECS,
};
use icl_contracts::submission::{InputDataRow, ModelResultRow};
use icl_engines::credential_auth::{CredentialAuthRuntime, IssuedCookie};
use icl_engines::hosted_auth::{HostedAuthConfig, HostedAuthRuntime};
use icl_engines::ingress;
use icl_engines::vault_model::{VaultModelConfig, VaultModelRuntime};
use icl_os::app_ingress::{SubmissionError, SubmissionPipeline};
use icl_storage::warehouse::WarehouseStore;

const JOURNAL_SCHEMA_VERSION: u8 = 1;

pub const OUTCOME_ACCEPTED: &str = "ACCEPTED";
pub const OUTCOME_REJECTED: &str = "REJECTED";
pub const OUTCOME_UNAUTHENTICATED: &str = "UNAUTHENTICATED";
pub const OUTCOME_PERSISTENCE_FAILED: &str = "PERSISTENCE_FAILED";
pub const OUTCOME_UNAVAILABLE: &str = "UNAVAILABLE";

#[derive(Debug, Clone, Serialize, Default)]
pub struct AdapterTableCounts {
    pub input_data_rows: usize,
    pub model_result_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub tables: AdapterTableCounts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginAdapterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginAdapterResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub display_name: Option<String>,
}

/// Wire shape of one form submission. Field names match the warehouse columns
/// so the HTML form, the JSON API and the journal all share one vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAdapterRequest {
    pub geschlecht: String,
    pub alter: u8,
    pub auge: String,
    pub implant_size: f64,
    #[serde(rename = "ACD")]
    pub acd: f64,
    #[serde(rename = "ACA_nasal")]
    pub aca_nasal: f64,
    #[serde(rename = "ACA_temporal")]
    pub aca_temporal: f64,
    #[serde(rename = "AtA")]
    pub ata: f64,
    #[serde(rename = "ACW")]
    pub acw: f64,
    #[serde(rename = "ARtAR_LR")]
    pub artar_lr: u16,
    #[serde(rename = "StS")]
    pub sts: f64,
    #[serde(rename = "StS_LR")]
    pub sts_lr: u16,
    #[serde(rename = "CBID")]
    pub cbid: f64,
    #[serde(rename = "CBID_LR")]
    pub cbid_lr: u16,
    #[serde(rename = "mPupil")]
    pub m_pupil: f64,
    #[serde(rename = "WtW_MS_39")]
    pub wtw_ms_39: f64,
    #[serde(rename = "WtW_IOL_Master")]
    pub wtw_iol_master: f64,
    #[serde(rename = "Sphaere")]
    pub sphaere: f64,
    #[serde(rename = "Zylinder")]
    pub zylinder: f64,
    #[serde(rename = "Achse")]
    pub achse: u16,
}

impl SubmissionAdapterRequest {
    pub fn to_record(&self) -> Result<MeasurementRecord, String> {
        let geschlecht = Geschlecht::parse(&self.geschlecht)
            .ok_or_else(|| format!("geschlecht: unknown value '{}'", self.geschlecht))?;
        let auge = Auge::parse(&self.auge)
            .ok_or_else(|| format!("auge: unknown value '{}'", self.auge))?;
        MeasurementRecord::v1(
            geschlecht,
            self.alter,
            auge,
            self.implant_size,
            self.acd,
            self.aca_nasal,
            self.aca_temporal,
            self.ata,
            self.acw,
            self.artar_lr,
            self.sts,
            self.sts_lr,
            self.cbid,
            self.cbid_lr,
            self.m_pupil,
            self.wtw_ms_39,
            self.wtw_iol_master,
            self.sphaere,
            self.zylinder,
            self.achse,
        )
        .map_err(|violation| violation.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionAdapterResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub id: Option<String>,
    pub vault: Option<f64>,
    pub created_at: Option<String>,
}

impl SubmissionAdapterResponse {
    fn accepted(id: String, vault: f64, created_at: String) -> Self {
        Self {
            status: "ok".to_string(),
            outcome: OUTCOME_ACCEPTED.to_string(),
            reason: None,
            id: Some(id),
            vault: Some(vault),
            created_at: Some(created_at),
        }
    }

    fn refused(outcome: &str, reason: String) -> Self {
        Self {
            status: "error".to_string(),
            outcome: outcome.to_string(),
            reason: Some(reason),
            id: None,
            vault: None,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    schema_version: u8,
    input: InputDataRow,
    result: ModelResultRow,
}

/// Session-guard strategy in effect for this process. `CredentialsDegraded`
/// is the config-missing mode: the process keeps serving, every request is
/// unauthenticated and login is disabled.
pub enum SessionGuard {
    Credentials(CredentialAuthRuntime),
    CredentialsDegraded,
    Hosted(HostedAuthRuntime),
}

pub struct AdapterRuntime {
    guard: SessionGuard,
    pipeline: SubmissionPipeline,
    store: WarehouseStore,
    journal_path: Option<PathBuf>,
}

impl AdapterRuntime {
    pub fn new(
        guard: SessionGuard,
        store: WarehouseStore,
        journal_path: Option<PathBuf>,
    ) -> Result<Self, String> {
        let mut runtime = Self {
            guard,
            pipeline: SubmissionPipeline::new(VaultModelRuntime::new(VaultModelConfig::v1())),
            store,
            journal_path,
        };
        runtime.ensure_journal_file()?;
        runtime.replay_journal_into_store()?;
        Ok(runtime)
    }

    pub fn default_from_env() -> Result<Self, String> {
        let guard = match env::var("ICL_AUTH_MODE")
            .unwrap_or_else(|_| "credentials".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "credentials" => {
                let path = PathBuf::from(
                    env::var("ICL_CREDENTIALS_PATH")
                        .unwrap_or_else(|_| "icl_credentials.json".to_string()),
                );
                if path.exists() {
                    // A present-but-broken file is a deploy mistake; fail fast.
                    let runtime = CredentialAuthRuntime::from_file(&path).map_err(|err| {
                        format!(
                            "failed to load credentials config '{}': {err}",
                            path.display()
                        )
                    })?;
                    SessionGuard::Credentials(runtime)
                } else {
                    eprintln!(
                        "icl_adapter: credentials file '{}' does not exist; serving in unauthenticated mode",
                        path.display()
                    );
                    SessionGuard::CredentialsDegraded
                }
            }
            "hosted" => {
                let auth_url =
                    env::var("ICL_AUTH_URL").map_err(|_| "ICL_AUTH_URL is required".to_string())?;
                let api_key = env::var("ICL_AUTH_API_KEY")
                    .map_err(|_| "ICL_AUTH_API_KEY is required".to_string())?;
                let timeout_ms = env::var("ICL_AUTH_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
                    .filter(|v| (100..=60_000).contains(v))
                    .unwrap_or(5_000);
                SessionGuard::Hosted(HostedAuthRuntime::new(HostedAuthConfig {
                    auth_url,
                    api_key,
                    timeout_ms,
                })?)
            }
            other => return Err(format!("unknown ICL_AUTH_MODE '{other}'")),
        };
        let journal_path = env::var("ICL_ADAPTER_STORE_PATH").ok().map(PathBuf::from);
        Self::new(guard, WarehouseStore::new_in_memory(), journal_path)
    }

    pub fn session_cookie_name(&self) -> Option<&str> {
        match &self.guard {
            SessionGuard::Credentials(runtime) => Some(runtime.cookie_name()),
            SessionGuard::CredentialsDegraded | SessionGuard::Hosted(_) => None,
        }
    }

    pub fn session_state(&self, cookie_header: Option<&str>) -> AuthState {
        match &self.guard {
            SessionGuard::Credentials(runtime) => {
                let Some(header) = cookie_header else {
                    return AuthState::Unauthenticated;
                };
                match cookie_value(header, runtime.cookie_name()) {
                    Some(value) => runtime.authenticate_cookie(value, now_unix()),
                    None => AuthState::Unauthenticated,
                }
            }
            SessionGuard::CredentialsDegraded => AuthState::Unauthenticated,
            SessionGuard::Hosted(runtime) => match runtime.authenticate(cookie_header) {
                Ok(state) => state,
                Err(err) => {
                    eprintln!("icl_adapter: {err}; treating request as unauthenticated");
                    AuthState::Unauthenticated
                }
            },
        }
    }

    pub fn handle_login(
        &self,
        request: &LoginAdapterRequest,
    ) -> (LoginAdapterResponse, AuthState, Option<IssuedCookie>) {
        match &self.guard {
            SessionGuard::Credentials(runtime) => {
                let (state, cookie) =
                    runtime.login(&request.username, &request.password, now_unix());
                let response = match state.identity() {
                    Some(identity) => LoginAdapterResponse {
                        status: "ok".to_string(),
                        outcome: OUTCOME_ACCEPTED.to_string(),
                        reason: None,
                        display_name: Some(identity.name.clone()),
                    },
                    None => LoginAdapterResponse {
                        status: "error".to_string(),
                        outcome: OUTCOME_REJECTED.to_string(),
                        reason: Some("Username/password is incorrect".to_string()),
                        display_name: None,
                    },
                };
                (response, state, cookie)
            }
            SessionGuard::CredentialsDegraded => (
                LoginAdapterResponse {
                    status: "error".to_string(),
                    outcome: OUTCOME_UNAVAILABLE.to_string(),
                    reason: Some("credential store unavailable; login is disabled".to_string()),
                    display_name: None,
                },
                AuthState::Unauthenticated,
                None,
            ),
            SessionGuard::Hosted(_) => (
                LoginAdapterResponse {
                    status: "error".to_string(),
                    outcome: OUTCOME_UNAVAILABLE.to_string(),
                    reason: Some("login is handled by the hosted identity provider".to_string()),
                    display_name: None,
                },
                AuthState::Unauthenticated,
                None,
            ),
        }
    }

    /// One form submission end to end. Unauthenticated callers are refused
    /// before any id is generated or any append is attempted.
    pub fn handle_submission(
        &mut self,
        request: &SubmissionAdapterRequest,
        cookie_header: Option<&str>,
    ) -> SubmissionAdapterResponse {
        let state = self.session_state(cookie_header);
        let Some(identity) = state.identity().cloned() else {
            return SubmissionAdapterResponse::refused(
                OUTCOME_UNAUTHENTICATED,
                "please log in before submitting".to_string(),
            );
        };
        let record = match request.to_record() {
            Ok(record) => record,
            Err(reason) => return SubmissionAdapterResponse::refused(OUTCOME_REJECTED, reason),
        };
        let id = match ingress::fresh_submission_id() {
            Ok(id) => id,
            Err(violation) => {
                return SubmissionAdapterResponse::refused(OUTCOME_REJECTED, violation.to_string())
            }
        };
        let created_at = match ingress::current_date() {
            Ok(created_at) => created_at,
            Err(violation) => {
                return SubmissionAdapterResponse::refused(OUTCOME_REJECTED, violation.to_string())
            }
        };
        let payload =
            match self
                .pipeline
                .submit(&mut self.store, record, &identity, id, created_at)
            {
                Ok(payload) => payload,
                Err(SubmissionError::Contract(violation)) => {
                    return SubmissionAdapterResponse::refused(
                        OUTCOME_REJECTED,
                        violation.to_string(),
                    )
                }
                Err(SubmissionError::Persistence(err)) => {
                    return SubmissionAdapterResponse::refused(
                        OUTCOME_PERSISTENCE_FAILED,
                        err.to_string(),
                    )
                }
            };
        if let Err(reason) = self.append_journal_entry(&payload.id) {
            return SubmissionAdapterResponse::refused(OUTCOME_PERSISTENCE_FAILED, reason);
        }
        println!(
            "icl_adapter: submission {} by {}",
            payload.id.as_str(),
            identity.username
        );
        SubmissionAdapterResponse::accepted(
            payload.id.as_str().to_string(),
            payload.vault,
            payload.created_at.as_str().to_string(),
        )
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            tables: AdapterTableCounts {
                input_data_rows: self.store.input_data_rows().len(),
                model_result_rows: self.store.model_result_rows().len(),
            },
        }
    }

    pub fn store(&self) -> &WarehouseStore {
        &self.store
    }

    fn ensure_journal_file(&self) -> Result<(), String> {
        let Some(path) = &self.journal_path else {
            return Ok(());
        };
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| {
                format!(
                    "failed to create adapter store journal '{}': {err}",
                    path.display()
                )
            })?;
        Ok(())
    }

    fn replay_journal_into_store(&mut self) -> Result<(), String> {
        let Some(path) = self.journal_path.clone() else {
            return Ok(());
        };
        let file = File::open(&path).map_err(|err| {
            format!(
                "failed to open adapter store journal '{}': {err}",
                path.display()
            )
        })?;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| {
                format!(
                    "failed reading adapter store journal '{}' at line {}: {err}",
                    path.display(),
                    line_no + 1
                )
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry = serde_json::from_str(&line).map_err(|err| {
                format!(
                    "failed parsing adapter store journal '{}' at line {}: {err}",
                    path.display(),
                    line_no + 1
                )
            })?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(format!(
                    "unsupported adapter store journal schema_version={} at line {}",
                    entry.schema_version,
                    line_no + 1
                ));
            }
            self.store
                .append_input_data_row(entry.input)
                .map_err(|err| format!("journal replay failed on input_data: {err}"))?;
            self.store
                .append_model_result_row(entry.result)
                .map_err(|err| format!("journal replay failed on model_v1: {err}"))?;
        }
        Ok(())
    }

    fn append_journal_entry(
        &self,
        id: &icl_contracts::submission::SubmissionId,
    ) -> Result<(), String> {
        let Some(path) = &self.journal_path else {
            return Ok(());
        };
        let input = self
            .store
            .input_row_by_id(id)
            .ok_or_else(|| "journal append: input row missing from store".to_string())?;
        let result = self
            .store
            .model_row_by_id(id)
            .ok_or_else(|| "journal append: model row missing from store".to_string())?;
        let entry = JournalEntry {
            schema_version: JOURNAL_SCHEMA_VERSION,
            input: input.clone(),
            result: result.clone(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|err| format!("journal append: serialization failed: {err}"))?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|err| {
                format!(
                    "failed to open adapter store journal '{}': {err}",
                    path.display()
                )
            })?;
        writeln!(file, "{line}")
            .map_err(|err| format!("failed to append adapter store journal: {err}"))
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for cookie in header.split(';') {
        if let Some((key, value)) = cookie.split_once('=') {
            if key.trim() == name && !value.trim().is_empty() {
                return Some(value.trim());
            }
        }
    }
    None
}

fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_field_control(out: &mut String, spec: &icl_contracts::measurement::FieldSpec) {
    out.push_str("<label>");
    out.push_str(&html_escape(spec.label));
    out.push_str("<br>");
    match spec.control {
        FieldControl::Choice { options, default } => {
            out.push_str(&format!("<select name=\"{}\">", spec.column));
            for option in options {
                if *option == default {
                    out.push_str(&format!("<option selected>{option}</option>"));
                } else {
                    out.push_str(&format!("<option>{option}</option>"));
                }
            }
            out.push_str("</select>");
        }
        FieldControl::Number {
            min,
            max,
            step,
            default,
            decimals,
        } => {
            out.push_str(&format!(
                "<input type=\"number\" name=\"{}\" min=\"{min}\" max=\"{max}\" step=\"{step}\" value=\"{default:.prec$}\" required>",
                spec.column,
                prec = decimals as usize,
            ));
        }
        FieldControl::Integer { min, max, default } => {
            out.push_str(&format!(
                "<input type=\"number\" name=\"{}\" min=\"{min}\" max=\"{max}\" step=\"1\" value=\"{default}\" required>",
                spec.column,
            ));
        }
    }
    out.push_str("</label><br>\n");
}

/// Render the single-page surface: login prompt, inline login error, or the
/// measurement form with an optional submission banner and confirmation view.
pub fn render_page(
    state: &AuthState,
    submission: Option<&SubmissionAdapterResponse>,
) -> String {
    let mut out = String::new();
    out.push_str("<!doctype html>\n<html lang=\"de\">\n<head><meta charset=\"utf-8\">");
    out.push_str("<title>ICL Sizing Input Form</title></head>\n<body>\n");
    match state {
        AuthState::Authenticated(identity) => {
            out.push_str(&format!(
                "<p>Welcome <em>{}</em></p>\n",
                html_escape(&identity.name)
            ));
            out.push_str(
                "<form method=\"post\" action=\"/logout\"><button type=\"submit\">Logout</button></form>\n",
            );
            out.push_str("<h1>ICL Sizing Input Form</h1>\n");
            if let Some(response) = submission {
                push_submission_banner(&mut out, response);
            }
            out.push_str("<form method=\"post\" action=\"/submit\">\n");
            for spec in MEASUREMENT_FIELD_SPECS.iter() {
                push_field_control(&mut out, spec);
            }
            out.push_str("<button type=\"submit\">Submit</button>\n</form>\n");
        }
        AuthState::Rejected => {
            out.push_str("<p class=\"error\">Username/password is incorrect</p>\n");
            push_login_form(&mut out);
        }
        AuthState::Unauthenticated => {
            out.push_str("<p>Please enter your username and password</p>\n");
            push_login_form(&mut out);
        }
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn push_login_form(out: &mut String) {
    out.push_str("<form method=\"post\" action=\"/login\">\n");
    out.push_str("<label>Username<br><input name=\"username\" required></label><br>\n");
    out.push_str(
        "<label>Password<br><input type=\"password\" name=\"password\" required></label><br>\n",
    );
    out.push_str("<button type=\"submit\">Login</button>\n</form>\n");
}

fn push_submission_banner(out: &mut String, response: &SubmissionAdapterResponse) {
    if response.outcome == OUTCOME_ACCEPTED {
        out.push_str("<p class=\"success\">Data successfully submitted!</p>\n");
        if let (Some(id), Some(vault), Some(created_at)) =
            (&response.id, response.vault, &response.created_at)
        {
            out.push_str("<table><tr><th>id</th><th>vault</th><th>created_at</th></tr>");
            out.push_str(&format!(
                "<tr><td>{}</td><td>{vault:.2}</td><td>{}</td></tr></table>\n",
                html_escape(id),
                html_escape(created_at),
            ));
        }
    } else {
        let reason = response.reason.as_deref().unwrap_or("submission failed");
        out.push_str(&format!(
            "<p class=\"error\">{}</p>\n",
            html_escape(reason)
        ));
    }
}
