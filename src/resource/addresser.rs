use sha2::{Digest, Sha256};

/// Computes the content address of a resource
///
/// Returns the hex-encoded SHA-256 digest of `data`. The hex alphabet is
/// safe in file names and URLs, so the result is used verbatim in output
/// names.
///
/// # Examples
///
/// ```
/// use static_mirror::resource::content_hash;
///
/// let hash = content_hash(b"body { color: red; }");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, content_hash(b"body { color: red; }"));
/// ```
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
