//! Docker Hub specific rewrites.
//!
//! Docker Hub serves official images from the implicit `library/`
//! namespace, so `busybox` really is `library/busybox`. Both the token
//! scope and the API paths need the qualified name.

/// Namespace of Docker Hub official images.
pub static LIBRARY_NAMESPACE: &str = "library";

/// Qualify the repository name of a `type:name:actions` scope.
///
/// Scopes for other upstreams, scopes which do not have exactly three parts,
/// and names which already carry a namespace are returned unchanged.
pub fn normalize_scope(scope: &str, docker_hub: bool) -> String {
    if !docker_hub {
        return scope.to_string();
    }

    let parts: Vec<&str> = scope.split(':').collect();
    match parts.as_slice() {
        [kind, name, actions] if !name.contains('/') => {
            format!("{}:{}/{}:{}", kind, LIBRARY_NAMESPACE, name, actions)
        }
        _ => scope.to_string(),
    }
}

/// Return the qualified path for a manifest or blob request on an
/// unqualified image name, e.g. `/v2/busybox/manifests/latest`.
///
/// Paths which need no rewrite yield `None`.
pub fn library_path(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        ["", "v2", name, kind, reference]
            if !name.is_empty()
                && !reference.is_empty()
                && (*kind == "manifests" || *kind == "blobs") =>
        {
            Some(format!(
                "/v2/{}/{}/{}/{}",
                LIBRARY_NAMESPACE, name, kind, reference
            ))
        }
        _ => None,
    }
}
