use crate::client::Error;
use crate::config::ClientConfig;
use crate::k8s_types::K8sType;
use crate::resource::ObjectIdRef;

use http::{header, Method, Request};
use hyper::Body;
use url::Url;

const IMPERSONATE_USER: &str = "Impersonate-User";
const IMPERSONATE_GROUP: &str = "Impersonate-Group";

pub fn get_request(
    client_config: &ClientConfig,
    k8s_type: &K8sType,
    id: &ObjectIdRef<'_>,
) -> Result<Request<Body>, Error> {
    let url = make_url(client_config, k8s_type, id.namespace(), Some(id.name()))?;
    let req = make_req(url, Method::GET, client_config).body(Body::empty())?;
    Ok(req)
}

pub fn list_request(
    client_config: &ClientConfig,
    k8s_type: &K8sType,
    namespace: &str,
) -> Result<Request<Body>, Error> {
    let url = make_url(client_config, k8s_type, namespace, None)?;
    let req = make_req(url, Method::GET, client_config).body(Body::empty())?;
    Ok(req)
}

pub fn delete_request(
    client_config: &ClientConfig,
    k8s_type: &K8sType,
    id: &ObjectIdRef<'_>,
) -> Result<Request<Body>, Error> {
    let url = make_url(client_config, k8s_type, id.namespace(), Some(id.name()))?;
    let req = make_req(url, Method::DELETE, client_config)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))?;
    Ok(req)
}

fn make_req(url: Url, method: Method, client_config: &ClientConfig) -> http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(String::from(url))
        .header(header::ACCEPT, "application/json")
        .header(header::USER_AGENT, client_config.user_agent.as_str());
    if let Some(auth) = client_config.credentials.authorization_header() {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    if let Some(user) = client_config.impersonate.as_ref() {
        builder = builder.header(IMPERSONATE_USER, user.as_str());
    }
    for group in client_config.impersonate_groups.iter() {
        builder = builder.header(IMPERSONATE_GROUP, group.as_str());
    }
    builder
}

/// A namespace or name as a single path segment. `/` is percent-encoded by the url, but the
/// dot segments would be collapsed, turning a resource path into its collection's.
fn path_segment(value: &str) -> Result<&str, Error> {
    match value {
        "" | "." | ".." => Err(Error::Url(format!("'{}' cannot be used in a resource path", value))),
        _ => Ok(value),
    }
}

/// Appends the api path to the configured endpoint, so that any path prefix on the endpoint
/// (as used by some authenticating proxies) is preserved
fn make_url(
    client_config: &ClientConfig,
    k8s_type: &K8sType,
    namespace: &str,
    name: Option<&str>,
) -> Result<Url, Error> {
    let endpoint = client_config.api_server_endpoint.as_str();
    let mut url = Url::parse(endpoint)
        .map_err(|err| Error::Url(format!("'{}': {}", endpoint, err)))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| Error::Url(format!("'{}' cannot be used as a base url", endpoint)))?;
        segments.pop_if_empty();
        if k8s_type.group().is_empty() {
            segments.push("api");
        } else {
            segments.push("apis").push(k8s_type.group());
        }
        segments
            .push(k8s_type.version())
            .push("namespaces")
            .push(path_segment(namespace)?)
            .push(k8s_type.plural_kind);
        if let Some(name) = name {
            segments.push(path_segment(name)?);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Credentials;
    use crate::k8s_types::{core, extensions};

    fn config(endpoint: &str) -> ClientConfig {
        ClientConfig::new(endpoint, Credentials::bearer_token("tok"))
    }

    #[test]
    fn list_request_targets_namespaced_collection() {
        let req = list_request(
            &config("https://k8s.example.com"),
            extensions::v1beta1::ReplicaSet,
            "web",
        )
        .unwrap();
        assert_eq!(Method::GET, *req.method());
        assert_eq!(
            "https://k8s.example.com/apis/extensions/v1beta1/namespaces/web/replicasets",
            req.uri().to_string()
        );
        assert_eq!("Bearer tok", req.headers()[header::AUTHORIZATION]);
    }

    #[test]
    fn endpoint_path_prefix_is_preserved() {
        let id = ObjectIdRef::new("web", "myapp-data");
        let req = get_request(
            &config("https://rancher.example.com/k8s/clusters/c-1/"),
            core::v1::PersistentVolumeClaim,
            &id,
        )
        .unwrap();
        assert_eq!(
            "https://rancher.example.com/k8s/clusters/c-1/api/v1/namespaces/web/persistentvolumeclaims/myapp-data",
            req.uri().to_string()
        );
    }

    #[test]
    fn anonymous_requests_have_no_authorization_header() {
        let conf = ClientConfig::new("http://localhost:8080", Credentials::Anonymous);
        let id = ObjectIdRef::new("web", "myapp");
        let req = delete_request(&conf, core::v1::Service, &id).unwrap();
        assert_eq!(Method::DELETE, *req.method());
        assert!(req.headers().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn dot_names_never_address_the_collection() {
        let conf = config("https://k8s.example.com");
        for name in ["", ".", ".."] {
            let err = delete_request(&conf, core::v1::Secret, &ObjectIdRef::new("web", name)).unwrap_err();
            assert!(matches!(err, Error::Url(_)), "name: {:?}", name);
            let err = get_request(&conf, extensions::v1beta1::Deployment, &ObjectIdRef::new("web", name)).unwrap_err();
            assert!(matches!(err, Error::Url(_)), "name: {:?}", name);
        }
        let err = list_request(&conf, core::v1::Pod, "..").unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn slashes_in_names_stay_in_one_segment() {
        let conf = config("https://k8s.example.com");
        let req = delete_request(&conf, core::v1::Secret, &ObjectIdRef::new("web", "x/../../pods")).unwrap();
        assert_eq!(
            "https://k8s.example.com/api/v1/namespaces/web/secrets/x%2F..%2F..%2Fpods",
            req.uri().to_string()
        );
    }

    #[test]
    fn invalid_endpoint_is_an_error() {
        let err = list_request(&config("not a url"), core::v1::Pod, "web").unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }
}
