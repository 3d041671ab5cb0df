//! The Resource Client: authenticated get, list and delete calls against the api server.
//!
//! `Client` is the async http client. Everything else in kdtool goes through the synchronous
//! `ResourceClient` trait instead, which `BlockingClient` implements by driving a `Client` on a
//! single threaded runtime, one request at a time.
mod blocking;
mod request;

pub use self::blocking::BlockingClient;

use crate::config::{CAData, ClientConfig, Credentials};
use crate::k8s_types::K8sType;
use crate::resource::{ObjectIdRef, ObjectList};

use bytes::Buf;
use http::{Request, Response, StatusCode};
use hyper::client::{Client as HyperClient, HttpConnector};
use hyper::Body;
use hyper_openssl::HttpsConnector;
use openssl::pkey::PKey;
use openssl::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use serde::de::DeserializeOwned;

use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Synchronous access to cluster resources. Every call blocks until the api server has
/// responded, and nothing is cached between calls.
pub trait ResourceClient {
    /// Reads a single named resource
    fn get<T: DeserializeOwned>(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>)
        -> Result<T, Error>;

    /// Lists every resource of the given type in a namespace
    fn list<T: DeserializeOwned>(
        &self,
        k8s_type: &K8sType,
        namespace: &str,
    ) -> Result<ObjectList<T>, Error>;

    /// Deletes a resource. A resource that's already gone, or already being deleted, is not an error.
    fn delete(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<(), Error>;
}

#[derive(Debug)]
pub enum Error {
    Io(hyper::Error),
    Serde(serde_json::Error),
    Http(StatusCode),
    Api(ApiError),
    Request(http::Error),
    Url(String),
    Timeout(Duration),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Serde(e) => Some(e),
            Error::Api(e) => Some(e),
            Error::Request(e) => Some(e),
            Error::Http(_) | Error::Url(_) | Error::Timeout(_) => None,
        }
    }
}

impl Error {
    pub fn http(status: StatusCode) -> Error {
        Error::Http(status)
    }

    pub fn is_http_status(&self, code: u16) -> bool {
        match self {
            Error::Http(status) => status.as_u16() == code,
            Error::Api(api) => api.code == code,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.is_http_status(404)
    }

    /// A best-effort message suitable for showing to a user: the message from the api server's
    /// error response if there was one, otherwise the http status reason or transport error.
    pub fn message(&self) -> String {
        match self {
            Error::Api(api) if !api.message.is_empty() => api.message.clone(),
            Error::Api(api) if !api.reason.is_empty() => api.reason.clone(),
            Error::Api(api) => format!("http status {}", api.code),
            Error::Http(status) => status
                .canonical_reason()
                .map(str::to_lowercase)
                .unwrap_or_else(|| format!("http status {}", status.as_u16())),
            Error::Io(e) => e.to_string(),
            Error::Serde(e) => format!("invalid response from api server: {}", e),
            Error::Request(e) => e.to_string(),
            Error::Url(msg) => msg.clone(),
            Error::Timeout(limit) => format!("request timed out after {}s", limit.as_secs()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "api request failed: {}", e),
            Error::Serde(e) => write!(f, "invalid response from api server: {}", e),
            Error::Http(status) => write!(f, "api server responded with {}", status),
            Error::Api(e) => Display::fmt(e, f),
            Error::Request(e) => write!(f, "cannot build api request: {}", e),
            Error::Url(e) => write!(f, "invalid api server url: {}", e),
            Error::Timeout(limit) => write!(f, "api request timed out after {:?}", limit),
        }
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Error {
        Error::Io(e)
    }
}
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Serde(e)
    }
}
impl From<http::Error> for Error {
    fn from(e: http::Error) -> Error {
        Error::Request(e)
    }
}

/// The `Status` object that the api server returns in the body of error responses
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
pub struct ApiError {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub code: u16,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "api error {} ({}): {}", self.code, self.reason, self.message)
    }
}
impl std::error::Error for ApiError {}

fn decode_base64(field: &str, content: &str) -> Result<Vec<u8>, io::Error> {
    base64::decode(content.trim()).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not valid base64: {}", field, err),
        )
    })
}

/// Trusts the configured CA, either inline PEM data from a kubeconfig or a file
fn add_ca(ssl: &mut SslConnectorBuilder, ca_data: Option<CAData>) -> Result<(), io::Error> {
    match ca_data {
        Some(CAData::Contents(encoded)) => {
            let pem = decode_base64("certificate-authority-data", encoded.as_str())?;
            let store = ssl.cert_store_mut();
            for cert in X509::stack_from_pem(pem.as_slice())? {
                store.add_cert(cert)?;
            }
        }
        Some(CAData::File(path)) => ssl.set_ca_file(path.as_str())?,
        None => {}
    }
    Ok(())
}

/// Presents a client certificate, for credentials that use one
fn add_client_identity(ssl: &mut SslConnectorBuilder, credentials: &Credentials) -> Result<(), io::Error> {
    let (cert_pem, key_pem) = match credentials {
        Credentials::PemPath {
            certificate_path,
            private_key_path,
        } => (fs::read(certificate_path)?, fs::read(private_key_path)?),
        Credentials::Pem {
            certificate_base64,
            private_key_base64,
        } => (
            decode_base64("client-certificate-data", certificate_base64)?,
            decode_base64("client-key-data", private_key_base64)?,
        ),
        _ => return Ok(()),
    };
    let cert = X509::from_pem(cert_pem.as_slice())?;
    let key = PKey::private_key_from_pem(key_pem.as_slice())?;
    ssl.set_certificate(&cert)?;
    ssl.set_private_key(&key)?;
    ssl.check_private_key()?;
    Ok(())
}

fn https_connector(config: &mut ClientConfig) -> Result<HttpsConnector<HttpConnector>, io::Error> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let mut ssl = SslConnector::builder(SslMethod::tls())?;
    ssl.set_alpn_protos(b"\x02h2\x08http/1.1")?;
    add_ca(&mut ssl, config.ca_data.take())?;
    add_client_identity(&mut ssl, &config.credentials)?;
    if config.verify_ssl_certs {
        ssl.set_verify(SslVerifyMode::PEER);
    } else {
        log::warn!("TLS certificate verification is disabled, the connection to {} is insecure", config.api_server_endpoint);
        ssl.set_verify(SslVerifyMode::NONE);
    }
    Ok(HttpsConnector::with_connector(http, ssl)?)
}

#[derive(Debug)]
struct ClientInner {
    http_client: HyperClient<HttpsConnector<HttpConnector>>,
    config: ClientConfig,
}

#[derive(Debug, Clone)]
pub struct Client(Arc<ClientInner>);

impl Client {
    pub fn new(mut config: ClientConfig) -> Result<Client, io::Error> {
        let https = https_connector(&mut config)?;
        let http_client = HyperClient::builder().build(https);
        Ok(Client(Arc::new(ClientInner { http_client, config })))
    }

    pub async fn get_resource<T: DeserializeOwned>(
        &self,
        k8s_type: &K8sType,
        id: &ObjectIdRef<'_>,
    ) -> Result<T, Error> {
        let req = request::get_request(&self.0.config, k8s_type, id)?;
        self.send_and_decode(req).await
    }

    pub async fn list_all<T: DeserializeOwned>(
        &self,
        k8s_type: &K8sType,
        namespace: &str,
    ) -> Result<ObjectList<T>, Error> {
        let req = request::list_request(&self.0.config, k8s_type, namespace)?;
        self.send_and_decode(req).await
    }

    /// 404 (already gone) and 409 (already being deleted) count as success
    pub async fn delete_resource(&self, k8s_type: &K8sType, id: &ObjectIdRef<'_>) -> Result<(), Error> {
        log::info!("Deleting {} {}", k8s_type, id);
        let req = request::delete_request(&self.0.config, k8s_type, id)?;
        let response = self.send(req).await?;
        match response.status().as_u16() {
            200..=299 | 404 | 409 => Ok(()),
            status => {
                log::debug!("Delete of {} {} failed with status {}", k8s_type, id, status);
                Err(error_from_response(response).await)
            }
        }
    }

    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, Error> {
        let started = Instant::now();
        let description = format!("{} {}", req.method(), req.uri());
        log::debug!("Sending {}", description);
        let result = self.0.http_client.request(req).await;
        match result.as_ref() {
            Ok(response) => log::debug!(
                "{} returned {} in {}ms",
                description,
                response.status().as_u16(),
                started.elapsed().as_millis()
            ),
            Err(err) => log::debug!("{} failed: {}", description, err),
        }
        Ok(result?)
    }

    async fn send_and_decode<T: DeserializeOwned>(&self, req: Request<Body>) -> Result<T, Error> {
        let response = self.send(req).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        if log::log_enabled!(log::Level::Trace) {
            let body = hyper::body::to_bytes(response.into_body()).await?;
            log::trace!("Response body: {}", String::from_utf8_lossy(body.as_ref()));
            Ok(serde_json::from_slice(body.as_ref())?)
        } else {
            let body = hyper::body::aggregate(response.into_body()).await?;
            Ok(serde_json::from_reader(body.reader())?)
        }
    }
}

/// Turns an unsuccessful response into an error, using the `Status` in the body if the api
/// server sent one
async fn error_from_response(response: Response<Body>) -> Error {
    let status = response.status();
    let body = match hyper::body::to_bytes(response.into_body()).await {
        Ok(body) => body,
        Err(err) => {
            log::debug!("Cannot read body of error response: {}", err);
            return Error::http(status);
        }
    };
    match serde_json::from_slice::<ApiError>(body.as_ref()) {
        Ok(mut api_error) => {
            if api_error.code == 0 {
                api_error.code = status.as_u16();
            }
            Error::Api(api_error)
        }
        Err(_) => {
            log::debug!(
                "Error response {} without a Status body: {}",
                status,
                String::from_utf8_lossy(body.as_ref())
            );
            Error::http(status)
        }
    }
}
