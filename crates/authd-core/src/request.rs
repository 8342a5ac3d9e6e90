//! Front-end request model.
//!
//! The front-end router delivers a [`Request`] carrying one of three
//! targets: an online check, an account lookup, or a PAM task. Every
//! request resolves with exactly one [`Reply`]; the [`Responder`] is a
//! drop guard, so a request abandoned mid-flight still completes.

use tokio::sync::oneshot;
use zeroize::Zeroizing;

use crate::status::Completion;

// ============================================================================
// Account requests
// ============================================================================

/// Kind of directory entity a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// A user entry.
    User,
    /// A group entry.
    Group,
    /// The set of groups a user is a member of.
    Initgroups,
}

/// How the filter value selects entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Match on the entity name attribute.
    Name,
    /// Match on the numeric id attribute (uid/gid).
    IdNum,
}

/// Which attribute set the caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// The core identity attributes.
    Core,
    /// Membership attributes.
    Mem,
    /// Everything mapped.
    All,
}

/// Payload of an account-information request.
#[derive(Debug, Clone)]
pub struct AccountRequest {
    /// Entity kind to look up.
    pub entry_type: EntryType,

    /// Filter selector.
    pub filter_type: FilterType,

    /// Requested attribute set.
    pub attr_type: AttrType,

    /// Filter value (a name or a decimal id).
    pub filter_value: String,
}

impl AccountRequest {
    /// Convenience constructor for a lookup by name.
    #[must_use]
    pub fn by_name(entry_type: EntryType, name: impl Into<String>) -> Self {
        Self {
            entry_type,
            filter_type: FilterType::Name,
            attr_type: AttrType::Core,
            filter_value: name.into(),
        }
    }

    /// Convenience constructor for a lookup by numeric id.
    #[must_use]
    pub fn by_id(entry_type: EntryType, id: u32) -> Self {
        Self {
            entry_type,
            filter_type: FilterType::IdNum,
            attr_type: AttrType::Core,
            filter_value: id.to_string(),
        }
    }
}

// ============================================================================
// PAM requests
// ============================================================================

/// PAM task commands understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PamCommand {
    /// Verify the user's credentials.
    Authenticate = 1,
    /// Change the user's authentication token.
    Chauthtok = 2,
    /// Account management check.
    AcctMgmt = 3,
    /// Establish credentials.
    SetCred = 4,
    /// Open a session.
    OpenSession = 5,
    /// Close a session.
    CloseSession = 6,
}

impl PamCommand {
    /// Wire value of the command.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// PAM status codes, numerically compatible with Linux-PAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PamStatus {
    /// Successful function return.
    Success = 0,
    /// System error.
    SystemErr = 4,
    /// Permission denied.
    PermDenied = 6,
    /// Authentication failure.
    AuthErr = 7,
    /// Insufficient credentials to access authentication data.
    CredInsufficient = 8,
    /// The authentication service cannot retrieve authentication info.
    AuthinfoUnavail = 9,
    /// User not known to the underlying module.
    UserUnknown = 10,
    /// Authentication token manipulation error.
    AuthtokErr = 20,
}

impl PamStatus {
    /// Numeric PAM status value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps a numeric status back, when it is one we know.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            4 => Some(Self::SystemErr),
            6 => Some(Self::PermDenied),
            7 => Some(Self::AuthErr),
            8 => Some(Self::CredInsufficient),
            9 => Some(Self::AuthinfoUnavail),
            10 => Some(Self::UserUnknown),
            20 => Some(Self::AuthtokErr),
            _ => None,
        }
    }

    /// Completion message for a raw status value.
    #[must_use]
    pub fn describe(value: i32) -> &'static str {
        Self::from_i32(value).map_or("PAM status", Self::message)
    }

    /// Short description used in completion messages.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::SystemErr => "System error",
            Self::PermDenied => "Permission denied",
            Self::AuthErr => "Authentication failure",
            Self::CredInsufficient => "Insufficient credentials",
            Self::AuthinfoUnavail => "Authentication service unavailable",
            Self::UserUnknown => "Unknown user",
            Self::AuthtokErr => "Authentication token error",
        }
    }
}

/// Response item kind: a message to relay to the PAM conversation.
pub const PAM_RESPONSE_MESSAGE: i32 = 1;

/// Response item kind: an environment variable for the PAM session.
pub const PAM_RESPONSE_ENV_ITEM: i32 = 2;

/// A single response item attached to a PAM request on its way back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PamResponse {
    /// Item kind; either one of the `PAM_RESPONSE_*` constants or a raw
    /// kind forwarded from the credential helper.
    pub kind: i32,

    /// Item payload.
    pub data: Vec<u8>,
}

/// Payload of a PAM request.
///
/// `upn` is populated by the auth pipeline after resolution; `pam_status`
/// and `responses` carry the outcome back to the front-end.
pub struct PamRequest {
    /// The PAM task to perform.
    pub cmd: PamCommand,

    /// Login name of the user.
    pub user: String,

    /// Uid of the requesting user; the helper child runs as this identity.
    pub uid: u32,

    /// Primary gid of the requesting user.
    pub gid: u32,

    /// Current authentication token. Wiped on drop.
    pub authtok: Zeroizing<Vec<u8>>,

    /// New authentication token (CHAUTHTOK only). Wiped on drop.
    pub newauthtok: Zeroizing<Vec<u8>>,

    /// Resolved user principal name, filled in by the auth pipeline.
    pub upn: Option<String>,

    /// PAM status of the request; starts out as a system error.
    pub pam_status: i32,

    /// Response items accumulated while handling the request.
    pub responses: Vec<PamResponse>,
}

impl PamRequest {
    /// Creates a new PAM request for the given task.
    #[must_use]
    pub fn new(cmd: PamCommand, user: impl Into<String>, uid: u32, gid: u32) -> Self {
        Self {
            cmd,
            user: user.into(),
            uid,
            gid,
            authtok: Zeroizing::new(Vec::new()),
            newauthtok: Zeroizing::new(Vec::new()),
            upn: None,
            pam_status: PamStatus::SystemErr.as_i32(),
            responses: Vec::new(),
        }
    }

    /// Sets the current authentication token.
    pub fn set_authtok(&mut self, tok: &[u8]) {
        self.authtok = Zeroizing::new(tok.to_vec());
    }

    /// Sets the new authentication token (CHAUTHTOK).
    pub fn set_newauthtok(&mut self, tok: &[u8]) {
        self.newauthtok = Zeroizing::new(tok.to_vec());
    }

    /// Appends a response item.
    pub fn add_response(&mut self, kind: i32, data: &[u8]) {
        self.responses.push(PamResponse {
            kind,
            data: data.to_vec(),
        });
    }
}

/// Authentication tokens are redacted; only their lengths are shown.
impl std::fmt::Debug for PamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PamRequest")
            .field("cmd", &self.cmd)
            .field("user", &self.user)
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("authtok_len", &self.authtok.len())
            .field("newauthtok_len", &self.newauthtok.len())
            .field("upn", &self.upn)
            .field("pam_status", &self.pam_status)
            .field("responses", &self.responses.len())
            .finish()
    }
}

// ============================================================================
// Requests and replies
// ============================================================================

/// Current reachability of the backing server, as seen by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineStatus {
    /// The server is assumed reachable.
    Online,
    /// The backend is inside its sticky offline window.
    Offline,
}

/// What a request asks the backend to do.
#[derive(Debug)]
pub enum RequestTarget {
    /// Report the current online/offline state.
    CheckOnline,
    /// Resolve an account lookup.
    AccountInfo(AccountRequest),
    /// Handle a PAM task.
    Pam(Box<PamRequest>),
}

/// The completion delivered to the front-end, exactly once per request.
#[derive(Debug)]
pub enum Reply {
    /// Outcome of a `CheckOnline` target.
    Online(OnlineStatus),
    /// Outcome of an `AccountInfo` target.
    Account(Completion),
    /// Outcome of a `Pam` target; the mutated payload travels back with
    /// its response items.
    Pam {
        /// The request payload, with `pam_status` and `responses` set.
        request: Box<PamRequest>,
        /// The completion (status mirrors `pam_status`).
        completion: Completion,
    },
    /// The request was abandoned before a handler resolved it.
    Dropped(Completion),
}

/// A request as delivered by the front-end router.
#[derive(Debug)]
pub struct Request {
    /// The requested operation.
    pub target: RequestTarget,

    /// Completion channel; fires exactly once.
    pub responder: Responder,
}

impl Request {
    /// Creates a request together with the receiver for its reply.
    #[must_use]
    pub fn new(target: RequestTarget) -> (Self, oneshot::Receiver<Reply>) {
        let (responder, rx) = Responder::new();
        (Self { target, responder }, rx)
    }
}

/// Drop-guarded completion channel.
///
/// Sending consumes the responder. If a responder is dropped without being
/// sent (the owning task panicked, was cancelled, or the request was
/// discarded), a [`Reply::Dropped`] carrying a system error is delivered
/// instead, preserving the exactly-once completion contract.
#[derive(Debug)]
pub struct Responder {
    tx: Option<oneshot::Sender<Reply>>,
}

impl Responder {
    /// Creates a responder and the matching receiver.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Resolves the request. The front-end may have gone away; a closed
    /// receiver is not an error.
    pub fn send(mut self, reply: Reply) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(reply);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Reply::Dropped(Completion::system_error(
                "Request abandoned before completion",
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responder_sends_exactly_once() {
        let (responder, rx) = Responder::new();
        responder.send(Reply::Account(Completion::ok()));
        match rx.await.unwrap() {
            Reply::Account(c) => assert!(c.is_ok()),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_responder_still_completes() {
        let (responder, rx) = Responder::new();
        drop(responder);
        match rx.await.unwrap() {
            Reply::Dropped(c) => assert_eq!(c.status, libc::EIO),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn pam_request_accumulates_responses() {
        let mut req = PamRequest::new(PamCommand::Authenticate, "alice", 1000, 1000);
        req.set_authtok(b"hunter2");
        req.add_response(PAM_RESPONSE_ENV_ITEM, b"SSSD_REALM=EXAMPLE.COM");

        assert_eq!(req.responses.len(), 1);
        assert_eq!(req.responses[0].kind, PAM_RESPONSE_ENV_ITEM);
        assert_eq!(req.pam_status, PamStatus::SystemErr.as_i32());
    }

    #[test]
    fn pam_status_values_match_linux_pam() {
        assert_eq!(PamStatus::Success.as_i32(), 0);
        assert_eq!(PamStatus::SystemErr.as_i32(), 4);
        assert_eq!(PamStatus::AuthErr.as_i32(), 7);
        assert_eq!(PamStatus::AuthinfoUnavail.as_i32(), 9);
    }
}
