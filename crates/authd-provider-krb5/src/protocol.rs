//! Helper-child wire format.
//!
//! One framed request down the pipe, one framed reply back, little-endian
//! host order:
//!
//! ```text
//! request:  u32 cmd
//!           u32 upn_len,        upn bytes (no NUL)
//!           u32 authtok_len,    authtok bytes
//!           u32 newauthtok_len, newauthtok bytes   (CHAUTHTOK only)
//!
//! reply:    i32 pam_status
//!           i32 msg_type
//!           i32 msg_len,        msg bytes
//! ```
//!
//! A reply shorter than the 12-byte header, or whose length disagrees
//! with `msg_len`, is rejected.

use authd_core::{PamCommand, PamRequest};

use crate::error::{AuthError, AuthResult};

/// Upper bound on the helper's reply.
pub const MAX_CHILD_MSG_SIZE: usize = 4096;

/// Size of the fixed reply header.
const REPLY_HEADER_LEN: usize = 12;

/// Builds the framed request for the helper child.
///
/// ## Errors
///
/// Fails when the principal name has not been resolved yet.
pub fn encode_request(req: &PamRequest) -> AuthResult<Vec<u8>> {
    let upn = req.upn.as_deref().ok_or(AuthError::MissingUpn)?;

    let mut buf = Vec::with_capacity(
        3 * 4 + upn.len() + req.authtok.len() + 4 + req.newauthtok.len(),
    );
    buf.extend_from_slice(&req.cmd.as_u32().to_le_bytes());
    buf.extend_from_slice(&(upn.len() as u32).to_le_bytes());
    buf.extend_from_slice(upn.as_bytes());
    buf.extend_from_slice(&(req.authtok.len() as u32).to_le_bytes());
    buf.extend_from_slice(&req.authtok);

    if req.cmd == PamCommand::Chauthtok {
        buf.extend_from_slice(&(req.newauthtok.len() as u32).to_le_bytes());
        buf.extend_from_slice(&req.newauthtok);
    }

    Ok(buf)
}

/// A parsed helper reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReply {
    /// PAM status reported by the helper.
    pub pam_status: i32,

    /// Kind of the attached message.
    pub msg_type: i32,

    /// Message payload.
    pub message: Vec<u8>,
}

/// Parses the helper's framed reply.
pub fn decode_reply(buf: &[u8]) -> AuthResult<ChildReply> {
    if buf.len() < REPLY_HEADER_LEN {
        return Err(AuthError::protocol("message too short"));
    }

    let pam_status = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let msg_type = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let msg_len = i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);

    let msg_len = usize::try_from(msg_len)
        .map_err(|_| AuthError::protocol("negative message length"))?;
    if REPLY_HEADER_LEN + msg_len != buf.len() {
        return Err(AuthError::protocol("message format error"));
    }

    Ok(ChildReply {
        pam_status,
        msg_type,
        message: buf[REPLY_HEADER_LEN..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use authd_core::PamStatus;

    use super::*;

    /// A child-side parser matching what the helper binary implements.
    fn parse_request(buf: &[u8]) -> (u32, Vec<u8>, Vec<u8>, Option<Vec<u8>>) {
        let mut pos = 0usize;
        let read_u32 = |pos: &mut usize| {
            let v = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
            *pos += 4;
            v
        };

        let cmd = read_u32(&mut pos);
        let upn_len = read_u32(&mut pos) as usize;
        let upn = buf[pos..pos + upn_len].to_vec();
        pos += upn_len;
        let authtok_len = read_u32(&mut pos) as usize;
        let authtok = buf[pos..pos + authtok_len].to_vec();
        pos += authtok_len;

        let newauthtok = if pos < buf.len() {
            let len = read_u32(&mut pos) as usize;
            let tok = buf[pos..pos + len].to_vec();
            pos += len;
            Some(tok)
        } else {
            None
        };
        assert_eq!(pos, buf.len());

        (cmd, upn, authtok, newauthtok)
    }

    fn encode_reply(reply: &ChildReply) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&reply.pam_status.to_le_bytes());
        buf.extend_from_slice(&reply.msg_type.to_le_bytes());
        buf.extend_from_slice(&(reply.message.len() as i32).to_le_bytes());
        buf.extend_from_slice(&reply.message);
        buf
    }

    fn pam_request(cmd: PamCommand) -> PamRequest {
        let mut req = PamRequest::new(cmd, "alice", 1000, 1000);
        req.upn = Some("alice@EXAMPLE.COM".to_string());
        req.set_authtok(b"hunter2");
        req.set_newauthtok(b"correct horse");
        req
    }

    #[test]
    fn authenticate_request_round_trips() {
        let req = pam_request(PamCommand::Authenticate);
        let buf = encode_request(&req).unwrap();

        let (cmd, upn, authtok, newauthtok) = parse_request(&buf);
        assert_eq!(cmd, PamCommand::Authenticate.as_u32());
        assert_eq!(upn, b"alice@EXAMPLE.COM");
        assert_eq!(authtok, b"hunter2");
        assert_eq!(newauthtok, None);
    }

    #[test]
    fn chauthtok_request_carries_new_token() {
        let req = pam_request(PamCommand::Chauthtok);
        let buf = encode_request(&req).unwrap();

        let (cmd, _, authtok, newauthtok) = parse_request(&buf);
        assert_eq!(cmd, PamCommand::Chauthtok.as_u32());
        assert_eq!(authtok, b"hunter2");
        assert_eq!(newauthtok.as_deref(), Some(b"correct horse".as_slice()));
    }

    #[test]
    fn request_without_upn_is_refused() {
        let mut req = pam_request(PamCommand::Authenticate);
        req.upn = None;
        assert!(matches!(
            encode_request(&req),
            Err(AuthError::MissingUpn)
        ));
    }

    #[test]
    fn reply_round_trips() {
        let reply = ChildReply {
            pam_status: PamStatus::Success.as_i32(),
            msg_type: 1,
            message: b"ticket acquired".to_vec(),
        };
        let decoded = decode_reply(&encode_reply(&reply)).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn short_reply_is_rejected() {
        assert!(decode_reply(&[0u8; 11]).is_err());
        assert!(decode_reply(&[]).is_err());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut buf = encode_reply(&ChildReply {
            pam_status: 0,
            msg_type: 0,
            message: b"abc".to_vec(),
        });
        buf.push(0); // trailing garbage
        assert!(decode_reply(&buf).is_err());
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut buf = vec![0u8; 12];
        buf[8..12].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(decode_reply(&buf).is_err());
    }

    #[test]
    fn empty_message_reply_is_valid() {
        let decoded = decode_reply(&[0u8; 12]).unwrap();
        assert_eq!(decoded.pam_status, 0);
        assert!(decoded.message.is_empty());
    }
}
