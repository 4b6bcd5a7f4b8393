use std::collections::BTreeSet;

use idig_repo::{RepoError, TrenchRepository};
use idig_store::{ObjectStore, RefStore};
use idig_survey::{diff_surveys, Survey};
use idig_types::ObjectId;

use crate::error::SyncResult;
use crate::message::{SyncRequest, SyncResponse, SyncStatus};

/// Run one sync decision against a trench.
///
/// Branches are evaluated in a fixed order; the first match wins:
///
/// 1. `pull` — the server head exists and differs from the client's.
/// 2. `ok` / `forbidden` — the principal is read-only: report whether the
///    client matches the server, with roll-back patches when it does not.
/// 3. `missing` — some referenced attachment has not been staged.
/// 4. `pushed` / `ok` — the snapshot was committed / was a no-op.
///
/// An empty server head always takes the write branch, which bootstraps a
/// fresh server even when clients remember an old head.
pub fn sync<S: ObjectStore + RefStore>(
    repo: &TrenchRepository<S>,
    request: &SyncRequest,
) -> SyncResult<SyncResponse> {
    tracing::info!(trench = %repo.trench(), request = %request, "> SYNC");
    let response = decide(repo, request)?;
    tracing::info!(trench = %repo.trench(), response = %response, "< SYNC");
    Ok(response)
}

fn decide<S: ObjectStore + RefStore>(
    repo: &TrenchRepository<S>,
    request: &SyncRequest,
) -> SyncResult<SyncResponse> {
    let head = repo.head()?;

    // The pull check precedes any write attempt: a client on a stale base
    // must reconcile locally and retry, never overwrite newer server state.
    if let Some(head) = head {
        if request.head != head.to_hex() {
            return pull_response(repo, head, &request.head);
        }
    }

    if repo.is_read_only() {
        return read_only_response(repo, head, request);
    }

    // Every referenced attachment must be staged before the commit.
    let missing = missing_attachments(repo, &request.surveys)?;
    if !missing.is_empty() {
        let mut response = SyncResponse::new(SyncStatus::Missing, version_text(head));
        response.missing = Some(missing);
        return Ok(response);
    }

    match repo.write_trench(
        &request.device,
        &request.message,
        &request.preferences,
        &request.surveys,
    ) {
        Ok(new_head) => {
            let status = if Some(new_head) == head {
                SyncStatus::Ok
            } else {
                SyncStatus::Pushed
            };
            Ok(SyncResponse::new(status, new_head.to_hex()))
        }
        // A concurrent writer advanced the head underneath the commit. The
        // new head necessarily differs from the client's base, so the losing
        // request resolves as a pull.
        Err(RepoError::HeadMoved) => match repo.head()? {
            Some(new_head) => pull_response(repo, new_head, &request.head),
            None => Err(RepoError::HeadMoved.into()),
        },
        Err(e) => Err(e.into()),
    }
}

/// The server has advanced past the client: ship the patches that take the
/// client's version to the head.
fn pull_response<S: ObjectStore + RefStore>(
    repo: &TrenchRepository<S>,
    head: ObjectId,
    client_head: &str,
) -> SyncResult<SyncResponse> {
    // An unresolvable client head falls back to an empty old state; the
    // resulting patch set may be large but is always safe to apply.
    let old_surveys = repo.read_surveys_at_version(client_head).unwrap_or_default();
    let new_surveys = repo.read_surveys()?;
    let updates = diff_surveys(&old_surveys, &new_surveys);

    let old_preferences = repo
        .read_preferences_at_version(client_head)
        .unwrap_or_default();
    let new_preferences = repo.read_preferences()?;

    let mut response = SyncResponse::new(SyncStatus::Pull, head.to_hex());
    if new_preferences != old_preferences {
        response.preferences = Some(new_preferences);
    }
    if !updates.is_empty() {
        response.updates = Some(updates);
    }
    Ok(response)
}

/// Read-only principals never mutate state. When the client matches the
/// server this is an `ok`; otherwise `forbidden` carries the patches that
/// roll the client's local edits back to the server state.
fn read_only_response<S: ObjectStore + RefStore>(
    repo: &TrenchRepository<S>,
    head: Option<ObjectId>,
    request: &SyncRequest,
) -> SyncResult<SyncResponse> {
    let server_surveys = repo.read_surveys()?;
    let patches = diff_surveys(&request.surveys, &server_surveys);
    let server_preferences = repo.read_preferences()?;
    let preferences_differ = server_preferences != request.preferences;

    if patches.is_empty() && !preferences_differ {
        return Ok(SyncResponse::new(SyncStatus::Ok, version_text(head)));
    }

    let mut response = SyncResponse::new(SyncStatus::Forbidden, version_text(head));
    if preferences_differ {
        response.preferences = Some(server_preferences);
    }
    if !patches.is_empty() {
        response.updates = Some(patches);
    }
    Ok(response)
}

/// Sorted unique names of referenced attachments with no staging reference.
fn missing_attachments<S: ObjectStore + RefStore>(
    repo: &TrenchRepository<S>,
    surveys: &[Survey],
) -> SyncResult<Vec<String>> {
    let mut missing = BTreeSet::new();
    for survey in surveys {
        for attachment in survey.attachments() {
            if !repo.exists_attachment(&attachment.name, &attachment.checksum)? {
                missing.insert(attachment.name);
            }
        }
    }
    Ok(missing.into_iter().collect())
}

fn version_text(head: Option<ObjectId>) -> String {
    head.map(|id| id.to_hex()).unwrap_or_default()
}
