//! Minimal HTTP response construction (the out-of-scope request parser and
//! wire transport live outside this crate; only response *construction* —
//! building a complete, correctly length-prefixed document — is core, per
//! §4.3/§4.6).

/// A fully-built HTTP response. Headers and body are assembled in memory
/// before being handed to the (out-of-scope) transport, which is the
/// natural Rust equivalent of the original's cork/uncork buffering: the
/// whole response becomes available to flush in one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn builder(status: u16, reason: &'static str) -> HttpResponseBuilder {
        HttpResponseBuilder {
            status,
            reason,
            headers: Vec::new(),
        }
    }

    /// Render the status line, headers, and body into one buffer, matching
    /// the "build fully, then flush atomically" discipline of §4.3.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 256);
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct HttpResponseBuilder {
    status: u16,
    reason: &'static str,
    headers: Vec<(String, String)>,
}

impl HttpResponseBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets `Content-Type`, `Connection: Keep-Alive`, `X-Transcend-Version: 1`,
    /// and a `Content-Length` matching `body`'s byte length exactly (§8
    /// invariant 2), then finishes the response.
    pub fn xml_body(mut self, body: Vec<u8>) -> HttpResponse {
        self.headers
            .push(("Content-Type".into(), "text/xml".into()));
        self.headers
            .push(("Connection".into(), "Keep-Alive".into()));
        self.headers
            .push(("X-Transcend-Version".into(), "1".into()));
        self.headers
            .push(("Content-Length".into(), body.len().to_string()));
        HttpResponse {
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            body,
        }
    }

    pub fn finish(self, body: Vec<u8>) -> HttpResponse {
        HttpResponse {
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            body,
        }
    }
}

/// A 401 with `X-Reason: <reason>`, per §6.
pub fn auth_fail_response(reason: &str) -> HttpResponse {
    HttpResponse::builder(401, "Unauthorized")
        .header("X-Reason", reason)
        .header("Connection", "close")
        .finish(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_body_sets_required_headers() {
        let resp = HttpResponse::builder(200, "OK").xml_body(b"hello".to_vec());
        assert_eq!(resp.header("Content-Type"), Some("text/xml"));
        assert_eq!(resp.header("Connection"), Some("Keep-Alive"));
        assert_eq!(resp.header("X-Transcend-Version"), Some("1"));
        assert_eq!(resp.header("Content-Length"), Some("5"));
    }

    #[test]
    fn to_bytes_matches_content_length() {
        let resp = HttpResponse::builder(200, "OK").xml_body(b"abcdef".to_vec());
        let bytes = resp.to_bytes();
        let body_start = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap()
            + 4;
        assert_eq!(&bytes[body_start..], b"abcdef");
    }

    #[test]
    fn auth_fail_sets_reason_header() {
        let resp = auth_fail_response("No password");
        assert_eq!(resp.status, 401);
        assert_eq!(resp.header("X-Reason"), Some("No password"));
    }
}
