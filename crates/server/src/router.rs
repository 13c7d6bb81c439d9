use std::convert::Infallible;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use http::{Method, StatusCode};
use sharpd_http::handler::Handler;
use sharpd_http::protocol::{Request, Response};
use sharpd_http::upload::transcode_target;
use tracing::{debug, warn};

use crate::transcode::Transcoder;

const VIDEO_MP4: &str = "video/mp4";
const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Ping,
    Status,
    Index,
    Echo,
    VideoSharpness,
}

/// The route table of the server.
///
/// | request | response |
/// |---|---|
/// | `GET /ping` | `pong` |
/// | `GET /status` | `y` |
/// | `GET /`, `GET /index.html` | `index.html` of the static root |
/// | `GET /<other>` | the file under the static root, or 404 |
/// | `POST /echo` | the request body |
/// | `POST /video_sharpness` | the transcoded upload as an attachment, or 404 |
/// | anything else | 501 |
///
/// A request whose multipart upload could not be persisted gets 404 whatever its route.
pub struct Routes<T> {
    router: matchit::Router<Route>,
    static_root: PathBuf,
    transcoder: T,
}

impl<T> fmt::Debug for Routes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routes").field("static_root", &self.static_root).finish_non_exhaustive()
    }
}

impl<T: Transcoder> Routes<T> {
    pub fn new(static_root: impl Into<PathBuf>, transcoder: T) -> Result<Self, matchit::InsertError> {
        let mut router = matchit::Router::new();
        router.insert("/ping", Route::Ping)?;
        router.insert("/status", Route::Status)?;
        router.insert("/", Route::Index)?;
        router.insert("/index.html", Route::Index)?;
        router.insert("/echo", Route::Echo)?;
        router.insert("/video_sharpness", Route::VideoSharpness)?;

        Ok(Self { router, static_root: static_root.into(), transcoder })
    }

    async fn route(&self, req: Request) -> Response {
        if let Some(e) = req.upload().error()
            && !e.is_no_upload()
        {
            debug!(cause = %e, path = req.path(), "rejecting request with a failed upload");
            return Response::not_found();
        }

        let route = self.router.at(req.path()).map(|matched| *matched.value).ok();
        match (req.method(), route) {
            (&Method::GET, Some(Route::Ping)) => Response::with_body(StatusCode::OK, mime::TEXT_PLAIN.as_ref(), "pong"),
            (&Method::GET, Some(Route::Status)) => Response::with_body(StatusCode::OK, mime::TEXT_PLAIN.as_ref(), "y"),
            (&Method::GET, Some(Route::Index)) => self.serve_static(Path::new(INDEX_FILE)).await,
            (&Method::GET, _) => match relative_path(req.path()) {
                Some(path) => self.serve_static(&path).await,
                None => {
                    debug!(path = req.path(), "refusing static path");
                    Response::not_found()
                }
            },
            (&Method::POST, Some(Route::Echo)) => echo(req),
            (&Method::POST, Some(Route::VideoSharpness)) => self.video_sharpness(&req).await,
            _ => Response::not_implemented(),
        }
    }

    async fn serve_static(&self, relative: &Path) -> Response {
        let path = self.static_root.join(relative);
        match Response::file(&path, content_type(&path)).await {
            Ok(response) => response,
            Err(e) => {
                debug!(path = %path.display(), cause = %e, "static file unavailable");
                Response::not_found()
            }
        }
    }

    async fn video_sharpness(&self, req: &Request) -> Response {
        let Some(source) = req.latest_upload() else {
            debug!("no upload to transcode");
            return Response::not_found();
        };

        let target = match transcode_target(source).await {
            Ok(target) => target,
            Err(e) => {
                warn!(source = %source.display(), cause = %e, "no name for transcoded file");
                return Response::not_found();
            }
        };

        req.scratch().register(target.clone());

        if !self.transcoder.transcode(source, &target).await {
            return Response::not_found();
        }

        match Response::attachment(&target, VIDEO_MP4).await {
            Ok(response) => response,
            Err(e) => {
                warn!(target = %target.display(), cause = %e, "can't open transcoded file");
                Response::not_found()
            }
        }
    }
}

#[async_trait]
impl<T: Transcoder> Handler for Routes<T> {
    type Error = Infallible;

    async fn call(&self, req: Request) -> Result<Response, Self::Error> {
        Ok(self.route(req).await)
    }
}

fn echo(req: Request) -> Response {
    let content_type = req.message().content_type().unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref()).to_owned();
    Response::with_body(StatusCode::OK, &content_type, req.body_bytes())
}

/// Maps a request path to a path below the static root.
///
/// Returns `None` when the path has a `..` segment or anything but plain names.
fn relative_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }

    let path = PathBuf::from(trimmed);
    path.components().all(|component| matches!(component, Component::Normal(_))).then_some(path)
}

fn content_type(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("mp4") => VIDEO_MP4,
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::MockTranscoder;
    use sharpd_http::upload::ScratchFiles;
    use sharpd_http::protocol::{BodyBuf, ProtocolVersion, RequestMessage, ResponseBody, UploadError, UploadOutcome};

    fn request(method: Method, path: &str) -> Request {
        Request::new(RequestMessage::request(method, path, ProtocolVersion::HTTP_11), UploadOutcome::None, None)
    }

    fn routes(static_root: &Path, transcoder: MockTranscoder) -> Routes<MockTranscoder> {
        Routes::new(static_root, transcoder).unwrap()
    }

    fn idle_transcoder() -> MockTranscoder {
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_transcode().never();
        transcoder
    }

    fn body_text(response: &Response) -> String {
        match response.body() {
            ResponseBody::Bytes(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let routes = routes(dir.path(), idle_transcoder());

        let response = routes.call(request(Method::GET, "/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.message().content_type(), Some("text/plain"));
        assert_eq!(body_text(&response), "pong");

        let response = routes.call(request(Method::GET, "/status?verbose")).await.unwrap();
        assert_eq!(body_text(&response), "y");
    }

    #[tokio::test]
    async fn index_and_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "p {}").unwrap();
        let routes = routes(dir.path(), idle_transcoder());

        for path in ["/", "/index.html"] {
            let response = routes.call(request(Method::GET, path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.message().content_type(), Some("text/html"));
            assert!(matches!(response.body(), ResponseBody::File { len: 9, attachment: None, .. }));
        }

        let response = routes.call(request(Method::GET, "/css/site.css")).await.unwrap();
        assert_eq!(response.message().content_type(), Some("text/css"));
    }

    #[tokio::test]
    async fn missing_and_escaping_paths_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "s").unwrap();
        let routes = routes(&dir.path().join("public"), idle_transcoder());

        for path in ["/nope.html", "/../secret.txt", "/a/../../secret.txt", "/..\\secret.txt", "/"] {
            let response = routes.call(request(Method::GET, path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
            assert_eq!(body_text(&response), "<html><body><center><h1>Not Found</h1></center></body></html>");
        }
    }

    #[tokio::test]
    async fn echo_returns_the_body() {
        let dir = tempfile::tempdir().unwrap();
        let routes = routes(dir.path(), idle_transcoder());

        let mut message = RequestMessage::request(Method::POST, "/echo", ProtocolVersion::HTTP_11);
        message.set_content_type("application/json");
        message.set_body(BodyBuf::from_bytes(br#"{"a":1}"#));
        let response = routes.call(Request::new(message, UploadOutcome::None, None)).await.unwrap();

        assert_eq!(response.message().content_type(), Some("application/json"));
        assert_eq!(body_text(&response), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        let routes = routes(dir.path(), idle_transcoder());

        for (method, path) in [(Method::POST, "/ping"), (Method::DELETE, "/"), (Method::POST, "/nope")] {
            let response = routes.call(request(method, path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        }
    }

    #[tokio::test]
    async fn failed_upload_is_not_found_on_any_route() {
        let dir = tempfile::tempdir().unwrap();
        let routes = routes(dir.path(), idle_transcoder());

        let message = RequestMessage::request(Method::POST, "/echo", ProtocolVersion::HTTP_11);
        let failed = UploadOutcome::Failed(UploadError::name_too_long(300, 255));
        let response = routes.call(Request::new(message, failed, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let message = RequestMessage::request(Method::POST, "/echo", ProtocolVersion::HTTP_11);
        let response = routes.call(Request::new(message, UploadOutcome::Failed(UploadError::NoUploadFound), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn video_sharpness_without_upload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let routes = routes(dir.path(), idle_transcoder());

        let response = routes.call(request(Method::POST, "/video_sharpness")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn video_sharpness_serves_the_transcoded_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mov");
        std::fs::write(&source, b"frames").unwrap();

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .times(1)
            .returning(|source, target| source != target && std::fs::copy(source, target).is_ok());
        let routes = routes(dir.path(), transcoder);

        // uploaded by an earlier request on the connection
        let message = RequestMessage::request(Method::POST, "/video_sharpness", ProtocolVersion::HTTP_11);
        let scratch = ScratchFiles::default();
        let request = Request::new(message, UploadOutcome::None, Some(source)).with_scratch_files(scratch.clone());
        let response = routes.call(request).await.unwrap();
        assert_eq!(scratch.take(), [dir.path().join("clip.mp4")]);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.message().content_type(), Some("video/mp4"));
        match response.body() {
            ResponseBody::File { len, attachment, .. } => {
                assert_eq!(*len, 6);
                assert_eq!(attachment.as_deref(), Some("clip.mp4"));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_transcode_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"frames").unwrap();

        let mut transcoder = MockTranscoder::new();
        // the target is reserved and registered before the transcoder runs
        transcoder.expect_transcode().times(1).returning(|_, target| {
            assert!(target.exists());
            false
        });
        let routes = routes(dir.path(), transcoder);

        let scratch = ScratchFiles::default();
        let message = RequestMessage::request(Method::POST, "/video_sharpness", ProtocolVersion::HTTP_11);
        let request = Request::new(message, UploadOutcome::Saved(source), None).with_scratch_files(scratch.clone());
        let response = routes.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(scratch.take(), [dir.path().join("clip2.mp4")]);
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_path("/a/b.css"), Some(PathBuf::from("a/b.css")));
        assert_eq!(relative_path("//a.txt"), Some(PathBuf::from("a.txt")));
        assert_eq!(relative_path("/./a.txt"), None);
        assert_eq!(relative_path("/a/.."), None);
        assert_eq!(relative_path("/"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a/INDEX.HTML")), "text/html");
        assert_eq!(content_type(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(content_type(Path::new("README")), "application/octet-stream");
    }

    mod over_a_connection {
        use super::*;
        use sharpd_http::connection::{ConnectionConfig, HttpConnection};
        use std::sync::Arc;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        fn upload_request(path: &str, payload: &[u8], extra_header: &str) -> Vec<u8> {
            let mut body = indoc::indoc! {r#"
                --xyz
                Content-Disposition: form-data; name="video_file"; filename="clip.mov"
                Content-Type: video/quicktime

            "#}
            .replace('\n', "\r\n")
            .into_bytes();
            body.extend_from_slice(payload);
            body.extend_from_slice(b"\r\n--xyz--\r\n");

            let mut request = format!(
                "POST {path} HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=xyz\r\nContent-Length: {}\r\n{extra_header}\r\n",
                body.len()
            )
            .into_bytes();
            request.extend_from_slice(&body);
            request
        }

        async fn exchange(routes: Routes<MockTranscoder>, upload_dir: &Path, requests: &[u8]) -> String {
            let (mut client, server) = tokio::io::duplex(256 * 1024);
            let config = ConnectionConfig { upload_dir: upload_dir.to_path_buf(), ..Default::default() };
            let connection = tokio::spawn(async move {
                let (reader, writer) = tokio::io::split(server);
                HttpConnection::new(reader, writer, &config).process(Arc::new(routes)).await
            });

            client.write_all(requests).await.unwrap();
            let mut responses = Vec::new();
            client.read_to_end(&mut responses).await.unwrap();
            connection.await.unwrap().unwrap();
            String::from_utf8_lossy(&responses).into_owned()
        }

        fn copying_transcoder() -> MockTranscoder {
            let mut transcoder = MockTranscoder::new();
            transcoder.expect_transcode().times(1).returning(|source, target| std::fs::copy(source, target).is_ok());
            transcoder
        }

        #[tokio::test]
        async fn upload_and_transcode_in_one_request() {
            let static_root = tempfile::tempdir().unwrap();
            let upload_dir = tempfile::tempdir().unwrap();
            let routes = routes(static_root.path(), copying_transcoder());

            let mut requests = b"GET /ping HTTP/1.1\r\n\r\n".to_vec();
            requests.extend(upload_request("/video_sharpness", b"not really a video", "Connection: close\r\n"));
            let responses = exchange(routes, upload_dir.path(), &requests).await;

            let (ping, transcoded) = responses.split_once("pong").unwrap();
            assert!(ping.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(transcoded.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(transcoded.contains("Content-Disposition: attachment; filename=\"clip.mp4\"\r\n"));
            assert!(transcoded.contains("Connection: close\r\n"));
            assert!(transcoded.ends_with("\r\n\r\nnot really a video"));

            // the upload and its transcoded copy go with the connection
            assert_eq!(std::fs::read_dir(upload_dir.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn upload_then_transcode_on_the_same_connection() {
            let static_root = tempfile::tempdir().unwrap();
            let upload_dir = tempfile::tempdir().unwrap();
            let routes = routes(static_root.path(), copying_transcoder());

            let mut requests = upload_request("/echo", b"frames", "");
            requests.extend_from_slice(b"POST /video_sharpness HTTP/1.1\r\nConnection: close\r\n\r\n");
            let responses = exchange(routes, upload_dir.path(), &requests).await;

            let (echoed, transcoded) = responses.split_at(responses.rfind("HTTP/1.1 ").unwrap());
            assert!(echoed.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(echoed.contains("Content-Length: 0\r\n"));
            assert!(transcoded.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(transcoded.ends_with("\r\n\r\nframes"));
            assert_eq!(std::fs::read_dir(upload_dir.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn not_found_and_not_implemented() {
            let static_root = tempfile::tempdir().unwrap();
            let upload_dir = tempfile::tempdir().unwrap();
            let routes = routes(static_root.path(), idle_transcoder());

            let requests = b"GET /missing.html HTTP/1.1\r\n\r\nPUT /ping HTTP/1.0\r\n\r\n";
            let responses = exchange(routes, upload_dir.path(), requests).await;

            assert!(responses.starts_with("HTTP/1.1 404 Not Found\r\n"));
            assert!(responses.contains("<h1>Not Found</h1>"));
            assert!(responses.contains("HTTP/1.0 501 Not Implemented\r\n"));
            assert!(responses.ends_with("<h1>Not Implemented</h1></center></body></html>"));
        }
    }
}
