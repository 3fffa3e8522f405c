use hive_core::{StoreResult, UploadNode};
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;

const DIRECTORY_MIME: &str = "application/x-directory";
const SYMLINK_MIME: &str = "application/symlink";
const FILE_MIME: &str = "application/octet-stream";

/// Builds the multipart body of an `add` request.
///
/// Every node becomes one `file` part named by its slash-separated path
/// relative to the upload, parents before children. File parts stream
/// from disk.
pub async fn multipart_form(root: &UploadNode) -> StoreResult<Form> {
    let mut form = Form::new();
    let mut stack = vec![(String::new(), root)];
    while let Some((parent, node)) = stack.pop() {
        let rel = if parent.is_empty() {
            node.name().to_owned()
        } else {
            format!("{parent}/{}", node.name())
        };
        let part = match node {
            UploadNode::File { source, size, .. } => {
                let file = tokio::fs::File::open(source).await?;
                let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
                Part::stream_with_length(body, *size).mime_str(FILE_MIME)
            }
            UploadNode::Directory { entries, .. } => {
                stack.extend(entries.iter().rev().map(|e| (rel.clone(), e)));
                Part::bytes(Vec::new()).mime_str(DIRECTORY_MIME)
            }
            UploadNode::Symlink { target, .. } => {
                Part::text(target.clone()).mime_str(SYMLINK_MIME)
            }
        }
        .map_err(anyhow::Error::from)?;
        form = form.part("file", part.file_name(rel));
    }
    Ok(form)
}
