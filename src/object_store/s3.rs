use std::error::Error as _;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};

use super::sigv4::{self, CanonicalRequest, Credentials};
use super::{ByteStream, ObjectStore, ObjectStoreError};

const SERVICE: &str = "s3";
const DEFAULT_REGION: &str = "us-east-1";

/// Bytes buffered per upload part. Every part but the last must be at
/// least 5 MiB.
const PART_SIZE: usize = 8 * 1024 * 1024;

/// Most parts a single multipart upload may have.
const MAX_PARTS: usize = 10_000;

/// Connection settings for an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3Options {
    /// `host` or `host:port`, without scheme.
    pub endpoint: String,
    /// Use https instead of plain http.
    pub secure: bool,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: Option<String>,
}

/// S3-compatible object store backend using path-style addressing.
///
/// Uploads of unknown length are buffered one part at a time. A stream that
/// ends within the first part is sent as a single signed `PUT`; anything
/// longer becomes a multipart upload, aborted if the stream fails.
pub struct S3Store {
    bucket: String,
    client: Client,
    credentials: Credentials,
    /// Value of the `Host` header, as reqwest will send it.
    host: String,
    part_size: usize,
    region: String,
    scheme: &'static str,
}

impl S3Store {
    pub fn new(options: S3Options) -> Result<Self, ObjectStoreError> {
        if options.endpoint.trim().is_empty() {
            return Err(ObjectStoreError::Config("endpoint not set".to_string()));
        }
        if options.bucket.trim().is_empty() {
            return Err(ObjectStoreError::Config("bucket not set".to_string()));
        }

        let scheme = if options.secure { "https" } else { "http" };
        let base = Url::parse(&format!("{scheme}://{}/", options.endpoint.trim()))
            .map_err(|e| ObjectStoreError::Config(format!("invalid endpoint: {e}")))?;
        if base.path() != "/" {
            return Err(ObjectStoreError::Config(
                "endpoint must not contain a path".to_string(),
            ));
        }
        let host = match (base.host_str(), base.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ObjectStoreError::Config(
                    "endpoint has no host".to_string(),
                ))
            }
        };

        let client = Client::builder()
            .build()
            .map_err(|e| ObjectStoreError::Config(e.to_string()))?;

        Ok(Self {
            bucket: options.bucket,
            client,
            credentials: Credentials {
                access_key: options.access_key,
                secret_key: options.secret_key,
            },
            host,
            part_size: PART_SIZE,
            region: options
                .region
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            scheme,
        })
    }

    fn object_url(&self, path: &str, query: &str) -> Result<Url, ObjectStoreError> {
        let mut url = format!("{}://{}{}", self.scheme, self.host, path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        Url::parse(&url).map_err(|e| ObjectStoreError::Backend(format!("invalid object URL: {e}")))
    }

    /// Build a signed request for one object.
    fn signed_request(
        &self,
        method: Method,
        key: &str,
        query: &[(&str, &str)],
        payload_hash: &str,
    ) -> Result<RequestBuilder, ObjectStoreError> {
        let path = sigv4::encode_object_path(&self.bucket, key);
        let query = sigv4::canonical_query(query);
        let url = self.object_url(&path, &query)?;

        let now = chrono::Utc::now();
        let timestamp = sigv4::amz_date(now);
        let headers = [
            ("host", self.host.as_str()),
            ("x-amz-content-sha256", payload_hash),
            ("x-amz-date", timestamp.as_str()),
        ];
        let authorization = sigv4::authorization(
            &self.credentials,
            &self.region,
            SERVICE,
            &CanonicalRequest {
                method: method.as_str(),
                path: &path,
                query: &query,
                headers: &headers,
                payload_hash,
            },
            now,
        );

        Ok(self
            .client
            .request(method, url)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", timestamp)
            .header(reqwest::header::AUTHORIZATION, authorization))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ObjectStoreError> {
        request
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(describe(&e)))
    }

    async fn put_single(&self, key: &str, body: Bytes) -> Result<(), ObjectStoreError> {
        let request = self
            .signed_request(Method::PUT, key, &[], &sigv4::sha256_hex(&body))?
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);
        let resp = self.send(request).await?;

        if !resp.status().is_success() {
            return Err(failure("upload", resp).await);
        }
        Ok(())
    }

    async fn create_multipart(&self, key: &str) -> Result<String, ObjectStoreError> {
        let request = self
            .signed_request(
                Method::POST,
                key,
                &[("uploads", "")],
                sigv4::EMPTY_PAYLOAD_SHA256,
            )?
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream");
        let resp = self.send(request).await?;

        if !resp.status().is_success() {
            return Err(failure("multipart create", resp).await);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ObjectStoreError::Backend(describe(&e)))?;
        xml_element(&body, "UploadId")
            .map(str::to_string)
            .ok_or_else(|| {
                ObjectStoreError::Backend(format!("S3 multipart create returned no UploadId: {body}"))
            })
    }

    /// Upload every part of the stream, starting with what is already in
    /// `buffer`. Returns part numbers with their ETags.
    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: &mut ByteStream,
        mut buffer: BytesMut,
    ) -> Result<Vec<(usize, String)>, ObjectStoreError> {
        let mut parts = Vec::new();
        let mut exhausted = false;

        loop {
            if !exhausted {
                exhausted = fill_part(data, &mut buffer, self.part_size).await?;
            }
            if buffer.is_empty() {
                break;
            }
            if parts.len() == MAX_PARTS {
                return Err(ObjectStoreError::Backend(format!(
                    "object exceeds {MAX_PARTS} parts of {} bytes",
                    self.part_size
                )));
            }

            let number = parts.len() + 1;
            let part = buffer.split_to(buffer.len().min(self.part_size)).freeze();
            let etag = self.upload_part(key, upload_id, number, part).await?;
            parts.push((number, etag));
        }

        Ok(parts)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        number: usize,
        part: Bytes,
    ) -> Result<String, ObjectStoreError> {
        let number = number.to_string();
        let request = self
            .signed_request(
                Method::PUT,
                key,
                &[("partNumber", number.as_str()), ("uploadId", upload_id)],
                &sigv4::sha256_hex(&part),
            )?
            .body(part);
        let resp = self.send(request).await?;

        if !resp.status().is_success() {
            return Err(failure("part upload", resp).await);
        }
        resp.headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ObjectStoreError::Backend(format!("S3 part {number} returned no ETag")))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[(usize, String)],
    ) -> Result<(), ObjectStoreError> {
        let mut body = String::from("<CompleteMultipartUpload>");
        for (number, etag) in parts {
            body.push_str(&format!(
                "<Part><PartNumber>{number}</PartNumber><ETag>{etag}</ETag></Part>"
            ));
        }
        body.push_str("</CompleteMultipartUpload>");

        let request = self
            .signed_request(
                Method::POST,
                key,
                &[("uploadId", upload_id)],
                &sigv4::sha256_hex(body.as_bytes()),
            )?
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(body);
        let resp = self.send(request).await?;

        if !resp.status().is_success() {
            return Err(failure("multipart complete", resp).await);
        }
        // A 200 response can still carry an error document.
        let text = resp
            .text()
            .await
            .map_err(|e| ObjectStoreError::Backend(describe(&e)))?;
        if text.contains("<Error>") {
            return Err(ObjectStoreError::Backend(format!(
                "S3 multipart complete failed: {text}"
            )));
        }
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        let request = match self.signed_request(
            Method::DELETE,
            key,
            &[("uploadId", upload_id)],
            sigv4::EMPTY_PAYLOAD_SHA256,
        ) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(key, upload_id, error = %e, "Failed to abort multipart upload");
                return;
            }
        };

        match self.send(request).await {
            Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {}
            Ok(resp) => {
                let err = failure("multipart abort", resp).await;
                tracing::warn!(key, upload_id, error = %err, "Failed to abort multipart upload");
            }
            Err(e) => {
                tracing::warn!(key, upload_id, error = %e, "Failed to abort multipart upload");
            }
        }
    }
}

/// Whether `key` names a single object. An empty key addresses the bucket,
/// and `.`/`..` segments are rewritten by URL normalization.
fn addressable(key: &str) -> bool {
    !key.is_empty() && key.split('/').all(|segment| segment != "." && segment != "..")
}

/// Pull chunks until `buffer` holds at least `limit` bytes. Returns `true`
/// once the stream has ended.
async fn fill_part(
    data: &mut ByteStream,
    buffer: &mut BytesMut,
    limit: usize,
) -> std::io::Result<bool> {
    while buffer.len() < limit {
        match data.try_next().await? {
            Some(chunk) => buffer.extend_from_slice(&chunk),
            None => return Ok(true),
        }
    }
    Ok(false)
}

fn xml_element<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = start + body[start..].find(&close)?;
    Some(&body[start..end])
}

/// Render a reqwest error with its source chain.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn failure(op: &str, resp: Response) -> ObjectStoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    ObjectStoreError::Backend(format!("S3 {op} failed ({status}): {body}"))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, mut data: ByteStream) -> Result<(), ObjectStoreError> {
        if !addressable(key) {
            return Err(ObjectStoreError::Backend(format!(
                "key does not name an S3 object: {key:?}"
            )));
        }

        let mut buffer = BytesMut::new();
        if fill_part(&mut data, &mut buffer, self.part_size).await? {
            return self.put_single(key, buffer.freeze()).await;
        }

        let upload_id = self.create_multipart(key).await?;
        let result = match self.upload_parts(key, &upload_id, &mut data, buffer).await {
            Ok(parts) => self.complete_multipart(key, &upload_id, &parts).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::debug!(key, upload_id = %upload_id, error = %e, "Aborting multipart upload");
            self.abort_multipart(key, &upload_id).await;
        }
        result
    }

    async fn get(&self, key: &str) -> Result<ByteStream, ObjectStoreError> {
        if !addressable(key) {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        let request = self.signed_request(Method::GET, key, &[], sigv4::EMPTY_PAYLOAD_SHA256)?;
        let resp = self.send(request).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            return Err(failure("download", resp).await);
        }

        Ok(resp.bytes_stream().map_err(std::io::Error::other).boxed())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        // No object can live under such a key
        if !addressable(key) {
            return Ok(());
        }

        let request =
            self.signed_request(Method::DELETE, key, &[], sigv4::EMPTY_PAYLOAD_SHA256)?;
        let resp = self.send(request).await?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            return Err(failure("delete", resp).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    fn options(endpoint: &str) -> S3Options {
        S3Options {
            endpoint: endpoint.to_string(),
            secure: false,
            access_key: "access".to_string(),
            secret_key: "secret".to_string(),
            bucket: "mail".to_string(),
            region: None,
        }
    }

    fn stream_of(items: Vec<std::io::Result<&'static str>>) -> ByteStream {
        futures::stream::iter(items.into_iter().map(|item| item.map(Bytes::from))).boxed()
    }

    // ------------------------------------------------------------------------
    // Fake S3 endpoint
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        target: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        }

        fn line(&self) -> String {
            format!("{} {}", self.method, self.target)
        }
    }

    struct Reply {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    }

    fn reply(status: u16, body: &str) -> Reply {
        Reply {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    async fn read_request<R: AsyncRead + Unpin>(stream: R) -> std::io::Result<Captured> {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let mut request_line = line.split_whitespace();
        let method = request_line.next().unwrap_or_default().to_string();
        let target = request_line.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        loop {
            line.clear();
            reader.read_line(&mut line).await?;
            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        let length = headers
            .iter()
            .find(|(n, _)| n == "content-length")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await?;

        Ok(Captured {
            method,
            target,
            headers,
            body,
        })
    }

    /// Start a one-request-per-connection HTTP server answering with
    /// `respond`, and a store pointed at it.
    async fn fake_s3<F>(respond: F) -> (S3Store, Arc<Mutex<Vec<Captured>>>)
    where
        F: Fn(&Captured) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond = Arc::new(respond);

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = Arc::clone(&respond);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let (read_half, mut write_half) = socket.split();
                    let Ok(request) = read_request(read_half).await else {
                        return;
                    };
                    let reply = respond(&request);
                    log.lock().unwrap().push(request);

                    let mut head = format!(
                        "HTTP/1.1 {} Fake\r\ncontent-length: {}\r\nconnection: close\r\n",
                        reply.status,
                        reply.body.len()
                    );
                    for (name, value) in &reply.headers {
                        head.push_str(&format!("{name}: {value}\r\n"));
                    }
                    head.push_str("\r\n");
                    let _ = write_half.write_all(head.as_bytes()).await;
                    let _ = write_half.write_all(reply.body.as_bytes()).await;
                    let _ = write_half.shutdown().await;
                });
            }
        });

        let mut store = S3Store::new(options(&endpoint)).unwrap();
        store.client = Client::builder().no_proxy().build().unwrap();
        (store, requests)
    }

    /// Answers the multipart calls the way S3 does.
    fn multipart_service(request: &Captured) -> Reply {
        match request.method.as_str() {
            "POST" if request.target.ends_with("?uploads=") => reply(
                200,
                "<InitiateMultipartUploadResult><Bucket>mail</Bucket><Key>k</Key>\
                 <UploadId>upload-1</UploadId></InitiateMultipartUploadResult>",
            ),
            "PUT" => {
                let number = request
                    .target
                    .split(['?', '&'])
                    .find_map(|p| p.strip_prefix("partNumber="))
                    .unwrap_or("0")
                    .to_string();
                let mut ok = reply(200, "");
                ok.headers.push(("etag", format!("\"etag-{number}\"")));
                ok
            }
            "POST" => reply(
                200,
                "<CompleteMultipartUploadResult><Key>k</Key></CompleteMultipartUploadResult>",
            ),
            "DELETE" => reply(204, ""),
            _ => reply(400, "unexpected request"),
        }
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    #[test]
    fn test_empty_endpoint_rejected() {
        let err = S3Store::new(options("")).err().expect("must fail");
        assert!(matches!(err, ObjectStoreError::Config(_)));
    }

    #[test]
    fn test_endpoint_with_path_rejected() {
        assert!(S3Store::new(options("minio:9000/extra")).is_err());
    }

    #[test]
    fn test_host_header_keeps_explicit_port() {
        let store = S3Store::new(options("minio:9000")).unwrap();
        assert_eq!(store.host, "minio:9000");
        assert_eq!(store.region, "us-east-1");

        let url = store.object_url("/mail/a%20b", "").unwrap();
        assert_eq!(url.as_str(), "http://minio:9000/mail/a%20b");

        let url = store.object_url("/mail/a", "uploads=").unwrap();
        assert_eq!(url.as_str(), "http://minio:9000/mail/a?uploads=");
    }

    #[test]
    fn test_host_header_drops_default_port() {
        let store = S3Store::new(options("minio:80")).unwrap();
        assert_eq!(store.host, "minio");
    }

    // ------------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_small_upload_is_one_put_with_length() {
        let (store, requests) = fake_s3(|_| reply(200, "")).await;

        store
            .put("k", stream_of(vec![Ok("hello"), Ok(" world")]))
            .await
            .unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let put = &requests[0];
        assert_eq!(put.line(), "PUT /mail/k");
        assert_eq!(put.body, b"hello world");
        assert_eq!(put.header("content-length"), Some("11"));
        assert_eq!(put.header("transfer-encoding"), None);
        assert_eq!(
            put.header("x-amz-content-sha256"),
            Some(sigv4::sha256_hex(b"hello world").as_str())
        );
        assert!(put
            .header("authorization")
            .unwrap()
            .starts_with("AWS4-HMAC-SHA256 Credential=access/"));
    }

    #[tokio::test]
    async fn test_large_upload_goes_multipart() {
        let (mut store, requests) = fake_s3(multipart_service).await;
        store.part_size = 4;

        store
            .put("k", stream_of(vec![Ok("hel"), Ok("lo wor"), Ok("ld!")]))
            .await
            .unwrap();

        let requests = requests.lock().unwrap();
        let lines: Vec<String> = requests.iter().map(Captured::line).collect();
        assert_eq!(
            lines,
            vec![
                "POST /mail/k?uploads=",
                "PUT /mail/k?partNumber=1&uploadId=upload-1",
                "PUT /mail/k?partNumber=2&uploadId=upload-1",
                "PUT /mail/k?partNumber=3&uploadId=upload-1",
                "POST /mail/k?uploadId=upload-1",
            ]
        );

        let uploaded: Vec<u8> = requests[1..4]
            .iter()
            .flat_map(|r| {
                assert_eq!(r.header("content-length"), Some("4"));
                r.body.clone()
            })
            .collect();
        assert_eq!(uploaded, b"hello world!");

        let complete = String::from_utf8(requests[4].body.clone()).unwrap();
        assert!(complete.contains("<PartNumber>1</PartNumber><ETag>\"etag-1\"</ETag>"));
        assert!(complete.contains("<PartNumber>3</PartNumber><ETag>\"etag-3\"</ETag>"));
    }

    #[tokio::test]
    async fn test_failed_stream_aborts_multipart_upload() {
        let (mut store, requests) = fake_s3(multipart_service).await;
        store.part_size = 4;

        let data = stream_of(vec![
            Ok("hello"),
            Err(std::io::Error::other("handle closed without commit")),
        ]);
        let err = store.put("k", data).await.unwrap_err();
        assert!(err.to_string().contains("handle closed without commit"));

        let requests = requests.lock().unwrap();
        let lines: Vec<String> = requests.iter().map(Captured::line).collect();
        assert_eq!(
            lines,
            vec![
                "POST /mail/k?uploads=",
                "PUT /mail/k?partNumber=1&uploadId=upload-1",
                "DELETE /mail/k?uploadId=upload-1",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_first_part_sends_nothing() {
        let (store, requests) = fake_s3(|_| reply(200, "")).await;

        let data = stream_of(vec![Ok("partial"), Err(std::io::Error::other("aborted"))]);
        assert!(store.put("k", data).await.is_err());
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_error_document_fails_upload() {
        let (mut store, requests) = fake_s3(|request| {
            if request.method == "POST" && request.target.contains("uploadId=") {
                reply(200, "<Error><Code>InternalError</Code></Error>")
            } else {
                multipart_service(request)
            }
        })
        .await;
        store.part_size = 4;

        let err = store
            .put("k", stream_of(vec![Ok("12345678")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("InternalError"));

        let requests = requests.lock().unwrap();
        assert_eq!(
            requests.last().unwrap().line(),
            "DELETE /mail/k?uploadId=upload-1"
        );
    }

    // ------------------------------------------------------------------------
    // Reads and deletes
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_maps_statuses() {
        let (store, _) = fake_s3(|request| match request.target.as_str() {
            "/mail/present" => reply(200, "content"),
            "/mail/missing" => reply(404, "<Error><Code>NoSuchKey</Code></Error>"),
            _ => reply(500, "<Error><Code>InternalError</Code></Error>"),
        })
        .await;

        let chunks: Vec<Bytes> = store
            .get("present")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"content");

        assert!(matches!(
            store.get("missing").await,
            Err(ObjectStoreError::NotFound(_))
        ));

        match store.get("broken").await {
            Err(ObjectStoreError::Backend(message)) => {
                assert!(message.contains("500"));
                assert!(message.contains("InternalError"));
            }
            _ => panic!("expected a backend error"),
        }
    }

    #[tokio::test]
    async fn test_delete_maps_statuses() {
        let (store, _) = fake_s3(|request| match request.target.as_str() {
            "/mail/gone" => reply(404, ""),
            "/mail/present" => reply(204, ""),
            _ => reply(403, "<Error><Code>AccessDenied</Code></Error>"),
        })
        .await;

        store.delete("present").await.unwrap();
        store.delete("gone").await.unwrap();

        match store.delete("locked").await {
            Err(ObjectStoreError::Backend(message)) => assert!(message.contains("AccessDenied")),
            _ => panic!("expected a backend error"),
        }
    }

    #[tokio::test]
    async fn test_keys_that_name_no_object_never_reach_the_bucket() {
        let (store, requests) = fake_s3(|_| reply(200, "<ListBucketResult/>")).await;

        for key in ["", "a/../b", "./a", "a/."] {
            assert!(
                matches!(store.get(key).await, Err(ObjectStoreError::NotFound(_))),
                "get {key:?}"
            );
            assert!(store.put(key, stream_of(vec![Ok("x")])).await.is_err());
            store.delete(key).await.unwrap();
        }

        assert!(requests.lock().unwrap().is_empty());
    }
}
