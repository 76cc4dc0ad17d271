//! Wire codec for the IPC messages (§4.4).
//!
//! One discriminator byte, then each field in declared order: a `u32`
//! big-endian length prefix followed by that many raw bytes (empty slices
//! encode as length `0`); `Option<T>` fields get a `u8` presence flag
//! immediately before the field. `ReplyCode` is a `u8`-tagged enum. This is
//! "our choice" framing per §4.4 — the externally observable contract is
//! the field set and in-order delivery, not this exact byte layout.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::IpcError;
use crate::ipc::messages::{
    AuthCookieReply, AuthCookieRequest, ReplyCode, SecAuthCont, SecAuthInit, SecAuthReply,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    SecAuthInit = 1,
    SecAuthCont = 2,
    SecAuthReply = 3,
    AuthCookieRequest = 4,
    AuthCookieReply = 5,
}

impl MessageKind {
    fn from_u8(b: u8) -> Result<Self, IpcError> {
        match b {
            1 => Ok(MessageKind::SecAuthInit),
            2 => Ok(MessageKind::SecAuthCont),
            3 => Ok(MessageKind::SecAuthReply),
            4 => Ok(MessageKind::AuthCookieRequest),
            5 => Ok(MessageKind::AuthCookieReply),
            _ => Err(IpcError::Malformed("unknown message discriminator")),
        }
    }
}

fn put_bytes_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

fn put_str_field(buf: &mut BytesMut, field: &str) {
    put_bytes_field(buf, field.as_bytes());
}

fn put_opt_bytes_field(buf: &mut BytesMut, field: Option<&[u8]>) {
    match field {
        Some(bytes) => {
            buf.put_u8(1);
            put_bytes_field(buf, bytes);
        }
        None => buf.put_u8(0),
    }
}

fn put_opt_str_field(buf: &mut BytesMut, field: Option<&str>) {
    put_opt_bytes_field(buf, field.map(|s| s.as_bytes()));
}

fn put_str_list_field(buf: &mut BytesMut, items: &[String]) {
    buf.put_u32(items.len() as u32);
    for item in items {
        put_str_field(buf, item);
    }
}

fn get_bytes_field(buf: &mut &[u8]) -> Result<Vec<u8>, IpcError> {
    if buf.len() < 4 {
        return Err(IpcError::Malformed("truncated length prefix"));
    }
    let len = buf.get_u32() as usize;
    if buf.len() < len {
        return Err(IpcError::Malformed("truncated field body"));
    }
    let value = buf[..len].to_vec();
    buf.advance(len);
    Ok(value)
}

fn get_str_field(buf: &mut &[u8]) -> Result<String, IpcError> {
    let raw = get_bytes_field(buf)?;
    String::from_utf8(raw).map_err(|_| IpcError::Malformed("field is not valid utf-8"))
}

fn get_opt_bytes_field(buf: &mut &[u8]) -> Result<Option<Vec<u8>>, IpcError> {
    if buf.is_empty() {
        return Err(IpcError::Malformed("truncated presence flag"));
    }
    let present = buf.get_u8();
    match present {
        0 => Ok(None),
        1 => Ok(Some(get_bytes_field(buf)?)),
        _ => Err(IpcError::Malformed("invalid presence flag")),
    }
}

fn get_opt_str_field(buf: &mut &[u8]) -> Result<Option<String>, IpcError> {
    match get_opt_bytes_field(buf)? {
        Some(raw) => Ok(Some(
            String::from_utf8(raw).map_err(|_| IpcError::Malformed("field is not valid utf-8"))?,
        )),
        None => Ok(None),
    }
}

fn get_str_list_field(buf: &mut &[u8]) -> Result<Vec<String>, IpcError> {
    if buf.len() < 4 {
        return Err(IpcError::Malformed("truncated list length"));
    }
    let count = buf.get_u32() as usize;
    let mut items = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        items.push(get_str_field(buf)?);
    }
    Ok(items)
}

fn reply_code_to_u8(code: Option<ReplyCode>) -> u8 {
    code.unwrap_or(ReplyCode::Failed).to_u8()
}

fn reply_code_from_byte(b: u8) -> Result<ReplyCode, IpcError> {
    ReplyCode::from_u8(b).ok_or(IpcError::Malformed("invalid reply code"))
}

pub fn encode_sec_auth_init(msg: &SecAuthInit) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(MessageKind::SecAuthInit as u8);
    put_opt_str_field(&mut buf, msg.user_name.as_deref());
    put_opt_str_field(&mut buf, msg.group_name.as_deref());
    put_str_field(&mut buf, &msg.hostname);
    put_str_field(&mut buf, &msg.ip);
    buf.put_u8(msg.tls_auth_ok as u8);
    put_opt_str_field(&mut buf, msg.cert_user_name.as_deref());
    match &msg.cert_group_names {
        Some(names) => {
            buf.put_u8(1);
            put_str_list_field(&mut buf, names);
        }
        None => buf.put_u8(0),
    }
    buf
}

pub fn decode_sec_auth_init(mut body: &[u8]) -> Result<SecAuthInit, IpcError> {
    let user_name = get_opt_str_field(&mut body)?;
    let group_name = get_opt_str_field(&mut body)?;
    let hostname = get_str_field(&mut body)?;
    let ip = get_str_field(&mut body)?;
    if body.is_empty() {
        return Err(IpcError::Malformed("truncated tls_auth_ok"));
    }
    let tls_auth_ok = body.get_u8() != 0;
    let cert_user_name = get_opt_str_field(&mut body)?;
    if body.is_empty() {
        return Err(IpcError::Malformed("truncated cert_group_names presence"));
    }
    let cert_group_names = if body.get_u8() != 0 {
        Some(get_str_list_field(&mut body)?)
    } else {
        None
    };
    Ok(SecAuthInit {
        user_name,
        group_name,
        hostname,
        ip,
        tls_auth_ok,
        cert_user_name,
        cert_group_names,
    })
}

pub fn encode_sec_auth_cont(msg: &SecAuthCont) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(MessageKind::SecAuthCont as u8);
    put_str_field(&mut buf, &msg.password);
    put_opt_bytes_field(&mut buf, msg.sid.as_deref());
    buf
}

pub fn decode_sec_auth_cont(mut body: &[u8]) -> Result<SecAuthCont, IpcError> {
    let password = get_str_field(&mut body)?;
    let sid = get_opt_bytes_field(&mut body)?;
    Ok(SecAuthCont { password, sid })
}

pub fn encode_sec_auth_reply(msg: &SecAuthReply) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(MessageKind::SecAuthReply as u8);
    buf.put_u8(reply_code_to_u8(msg.reply));
    put_opt_str_field(&mut buf, msg.msg.as_deref());
    put_opt_bytes_field(&mut buf, msg.sid.as_deref());
    put_opt_bytes_field(&mut buf, msg.cookie.as_deref());
    put_opt_bytes_field(&mut buf, msg.dtls_session_id.as_deref());
    put_opt_str_field(&mut buf, msg.user_name.as_deref());
    buf
}

pub fn decode_sec_auth_reply(mut body: &[u8]) -> Result<SecAuthReply, IpcError> {
    if body.is_empty() {
        return Err(IpcError::Malformed("truncated reply code"));
    }
    let reply = Some(reply_code_from_byte(body.get_u8())?);
    let msg = get_opt_str_field(&mut body)?;
    let sid = get_opt_bytes_field(&mut body)?;
    let cookie = get_opt_bytes_field(&mut body)?;
    let dtls_session_id = get_opt_bytes_field(&mut body)?;
    let user_name = get_opt_str_field(&mut body)?;
    Ok(SecAuthReply {
        reply,
        msg,
        sid,
        cookie,
        dtls_session_id,
        user_name,
    })
}

pub fn encode_auth_cookie_request(msg: &AuthCookieRequest) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(MessageKind::AuthCookieRequest as u8);
    put_bytes_field(&mut buf, &msg.cookie);
    buf.put_u8(msg.tls_auth_ok as u8);
    buf
}

pub fn decode_auth_cookie_request(mut body: &[u8]) -> Result<AuthCookieRequest, IpcError> {
    let cookie = get_bytes_field(&mut body)?;
    if body.is_empty() {
        return Err(IpcError::Malformed("truncated tls_auth_ok"));
    }
    let tls_auth_ok = body.get_u8() != 0;
    Ok(AuthCookieRequest { cookie, tls_auth_ok })
}

pub fn encode_auth_cookie_reply(msg: &AuthCookieReply) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(MessageKind::AuthCookieReply as u8);
    buf.put_u8(reply_code_to_u8(msg.reply));
    put_opt_str_field(&mut buf, msg.vname.as_deref());
    put_opt_str_field(&mut buf, msg.user_name.as_deref());
    put_opt_str_field(&mut buf, msg.group_name.as_deref());
    put_bytes_field(&mut buf, &msg.session_id);
    put_opt_str_field(&mut buf, msg.ipv4.as_deref());
    put_opt_str_field(&mut buf, msg.ipv6.as_deref());
    put_opt_str_field(&mut buf, msg.ipv4_local.as_deref());
    put_opt_str_field(&mut buf, msg.ipv6_local.as_deref());
    put_opt_str_field(&mut buf, msg.ipv4_netmask.as_deref());
    put_opt_str_field(&mut buf, msg.ipv6_netmask.as_deref());
    match msg.ipv6_prefix {
        Some(p) => {
            buf.put_u8(1);
            buf.put_u8(p);
        }
        None => buf.put_u8(0),
    }
    match msg.rx_per_sec {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u32(v);
        }
        None => buf.put_u8(0),
    }
    match msg.tx_per_sec {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u32(v);
        }
        None => buf.put_u8(0),
    }
    match msg.net_priority {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u8(v);
        }
        None => buf.put_u8(0),
    }
    match msg.no_udp {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u8(v as u8);
        }
        None => buf.put_u8(0),
    }
    put_str_list_field(&mut buf, &msg.routes);
    put_str_list_field(&mut buf, &msg.dns);
    put_str_list_field(&mut buf, &msg.nbns);
    buf
}

pub fn decode_auth_cookie_reply(mut body: &[u8]) -> Result<AuthCookieReply, IpcError> {
    if body.is_empty() {
        return Err(IpcError::Malformed("truncated reply code"));
    }
    let reply = Some(reply_code_from_byte(body.get_u8())?);
    let vname = get_opt_str_field(&mut body)?;
    let user_name = get_opt_str_field(&mut body)?;
    let group_name = get_opt_str_field(&mut body)?;
    let session_id = get_bytes_field(&mut body)?;
    let ipv4 = get_opt_str_field(&mut body)?;
    let ipv6 = get_opt_str_field(&mut body)?;
    let ipv4_local = get_opt_str_field(&mut body)?;
    let ipv6_local = get_opt_str_field(&mut body)?;
    let ipv4_netmask = get_opt_str_field(&mut body)?;
    let ipv6_netmask = get_opt_str_field(&mut body)?;

    if body.is_empty() {
        return Err(IpcError::Malformed("truncated ipv6_prefix presence"));
    }
    let ipv6_prefix = if body.get_u8() != 0 {
        if body.is_empty() {
            return Err(IpcError::Malformed("truncated ipv6_prefix"));
        }
        Some(body.get_u8())
    } else {
        None
    };

    if body.is_empty() {
        return Err(IpcError::Malformed("truncated rx_per_sec presence"));
    }
    let rx_per_sec = if body.get_u8() != 0 {
        if body.len() < 4 {
            return Err(IpcError::Malformed("truncated rx_per_sec"));
        }
        Some(body.get_u32())
    } else {
        None
    };

    if body.is_empty() {
        return Err(IpcError::Malformed("truncated tx_per_sec presence"));
    }
    let tx_per_sec = if body.get_u8() != 0 {
        if body.len() < 4 {
            return Err(IpcError::Malformed("truncated tx_per_sec"));
        }
        Some(body.get_u32())
    } else {
        None
    };

    if body.is_empty() {
        return Err(IpcError::Malformed("truncated net_priority presence"));
    }
    let net_priority = if body.get_u8() != 0 {
        if body.is_empty() {
            return Err(IpcError::Malformed("truncated net_priority"));
        }
        Some(body.get_u8())
    } else {
        None
    };

    if body.is_empty() {
        return Err(IpcError::Malformed("truncated no_udp presence"));
    }
    let no_udp = if body.get_u8() != 0 {
        if body.is_empty() {
            return Err(IpcError::Malformed("truncated no_udp"));
        }
        Some(body.get_u8() != 0)
    } else {
        None
    };

    let routes = get_str_list_field(&mut body)?;
    let dns = get_str_list_field(&mut body)?;
    let nbns = get_str_list_field(&mut body)?;

    Ok(AuthCookieReply {
        reply,
        vname,
        user_name,
        group_name,
        session_id,
        ipv4,
        ipv6,
        ipv4_local,
        ipv6_local,
        ipv4_netmask,
        ipv6_netmask,
        ipv6_prefix,
        rx_per_sec,
        tx_per_sec,
        net_priority,
        no_udp,
        routes,
        dns,
        nbns,
    })
}

/// Peek the discriminator byte off a framed message, for callers that
/// demultiplex on a single connection (not used within this core, which
/// always knows which reply type it expects, but kept for IPC transports
/// that multiplex message kinds on one socket).
pub fn peek_kind(body: &[u8]) -> Result<MessageKind, IpcError> {
    let first = body.first().ok_or(IpcError::Malformed("empty message"))?;
    MessageKind::from_u8(*first)
}
