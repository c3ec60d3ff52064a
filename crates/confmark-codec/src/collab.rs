//! Integration seams for platform clients.
//!
//! The codec never talks to a Confluence instance itself. Callers that do
//! implement these traits; the codec only hands them the work it produced.

use crate::writer::MarkdownConversion;

/// Uploads page attachments produced by a conversion.
pub trait AttachmentUploader {
    type Error;

    /// Upload `bytes` as an attachment named `filename` on the target page.
    fn upload(&mut self, filename: &str, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Fetches a page body in storage format.
pub trait StorageFetcher {
    type Error;

    /// Fetch the storage-format body of the page identified by `page_id`.
    fn fetch(&self, page_id: &str) -> Result<String, Self::Error>;
}

impl MarkdownConversion {
    /// Upload every pending attachment through `uploader`.
    ///
    /// The storage body references attachments by filename, so all of them
    /// must be uploaded before the body is persisted.
    ///
    /// # Errors
    ///
    /// Propagates the first uploader failure; earlier uploads are not
    /// rolled back.
    pub fn upload_pending<U: AttachmentUploader>(
        &self,
        uploader: &mut U,
    ) -> Result<(), U::Error> {
        for attachment in &self.attachments {
            tracing::debug!(filename = %attachment.filename, "uploading pending attachment");
            uploader.upload(&attachment.filename, &attachment.bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::writer::MarkdownConverter;

    #[derive(Default)]
    struct RecordingUploader {
        uploaded: Vec<(String, Vec<u8>)>,
        fail_on: Option<String>,
    }

    impl AttachmentUploader for RecordingUploader {
        type Error = String;

        fn upload(&mut self, filename: &str, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.fail_on.as_deref() == Some(filename) {
                return Err(format!("refused {filename}"));
            }
            self.uploaded.push((filename.to_owned(), bytes.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_upload_pending_pushes_all_attachments() {
        let conversion = MarkdownConverter::new()
            .convert("```drawio\n<mxfile/>\n```\n\n```drawio\n<mxfile id=\"2\"/>\n```")
            .unwrap();
        assert_eq!(conversion.attachments.len(), 2);

        let mut uploader = RecordingUploader::default();
        conversion.upload_pending(&mut uploader).unwrap();
        assert_eq!(
            uploader.uploaded,
            vec![
                (String::from("diagram-1.drawio"), b"<mxfile/>".to_vec()),
                (
                    String::from("diagram-2.drawio"),
                    b"<mxfile id=\"2\"/>".to_vec()
                ),
            ]
        );
    }

    #[test]
    fn test_upload_pending_propagates_failure() {
        let conversion = MarkdownConverter::new()
            .convert("```drawio\n<mxfile/>\n```")
            .unwrap();
        let mut uploader = RecordingUploader {
            fail_on: Some(String::from("diagram-1.drawio")),
            ..Default::default()
        };
        let err = conversion.upload_pending(&mut uploader).unwrap_err();
        assert_eq!(err, "refused diagram-1.drawio");
    }
}
