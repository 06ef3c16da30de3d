use serde::Serialize;

use super::types::Attachment;

/// Public URL of a stored object: base url plus the percent-encoded path segments.
pub fn public_url(base: &str, file_path: &str) -> String {
    let path = file_path
        .trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentView {
    #[serde(flatten)]
    pub anexo: Attachment,
    pub public_url: String,
}

impl AttachmentView {
    pub fn new(anexo: Attachment, base: &str) -> Self {
        let public_url = public_url(base, &anexo.file_path);
        Self { anexo, public_url }
    }
}
