// card_viewer_client/src/upload.rs

//! 卡片图片上传表单。
//!
//! 表单在发起任何网络请求之前完成校验：卡片类型、UID 与图片文件都是必填项。
//! 图片内容以 data URL (`data:<mime>;base64,<内容>`) 形式放进 `upload_image` 请求。

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use card_models::OutboundRequest;
use std::path::Path;

use crate::error::AppError;

/// 用户选中的图片文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }

    /// 从磁盘读取文件，文件名取路径的最后一段。
    pub async fn read(path: &Path) -> Result<Self, AppError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }

    /// 按扩展名推断 MIME 类型。
    pub fn mime_type(&self) -> &'static str {
        let extension = Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("bmp") => "image/bmp",
            _ => "application/octet-stream",
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), BASE64_STANDARD.encode(&self.bytes))
    }
}

/// 上传表单的当前内容。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    pub card_type: String,
    pub uid: String,
    pub file: Option<SelectedFile>,
}

impl UploadForm {
    pub fn new(card_type: impl Into<String>, uid: impl Into<String>, file: Option<SelectedFile>) -> Self {
        Self { card_type: card_type.into(), uid: uid.into(), file }
    }

    /// 校验并构造 `upload_image` 请求。任一必填项缺失时返回 `AppError::MissingField`。
    pub fn into_request(self) -> Result<OutboundRequest, AppError> {
        let card_type = self.card_type.trim();
        if card_type.is_empty() {
            return Err(AppError::MissingField("card_type"));
        }
        let uid = self.uid.trim();
        if uid.is_empty() {
            return Err(AppError::MissingField("uid"));
        }
        let file = match self.file {
            Some(file) if !file.filename.is_empty() => file,
            _ => return Err(AppError::MissingField("file")),
        };

        Ok(OutboundRequest::UploadImage {
            card_type: card_type.to_string(),
            uid: uid.to_string(),
            image_data: file.to_data_url(),
            filename: file.filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> SelectedFile {
        SelectedFile::new("worker.png", vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_valid_form_builds_upload_request() {
        let form = UploadForm::new(" WORKER ", "04AABBCC", Some(png()));
        match form.into_request().unwrap() {
            OutboundRequest::UploadImage { card_type, uid, image_data, filename } => {
                assert_eq!(card_type, "WORKER");
                assert_eq!(uid, "04AABBCC");
                assert_eq!(image_data, "data:image/png;base64,iVBORw==");
                assert_eq!(filename, "worker.png");
            }
            other => panic!("预期 UploadImage，实际: {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        assert!(matches!(
            UploadForm::new("", "04AABBCC", Some(png())).into_request(),
            Err(AppError::MissingField("card_type"))
        ));
        assert!(matches!(
            UploadForm::new("KEY", "   ", Some(png())).into_request(),
            Err(AppError::MissingField("uid"))
        ));
        assert!(matches!(
            UploadForm::new("KEY", "04AABBCC", None).into_request(),
            Err(AppError::MissingField("file"))
        ));
    }

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(SelectedFile::new("a.JPG", vec![]).mime_type(), "image/jpeg");
        assert_eq!(SelectedFile::new("a.webp", vec![]).mime_type(), "image/webp");
        assert_eq!(SelectedFile::new("noext", vec![]).mime_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_read_selected_file_from_disk() {
        let path = std::env::temp_dir().join(format!("card_viewer_upload_{}.jpg", std::process::id()));
        tokio::fs::write(&path, b"jpeg-bytes").await.unwrap();
        let file = SelectedFile::read(&path).await;
        let _ = tokio::fs::remove_file(&path).await;

        let file = file.unwrap();
        assert_eq!(file.bytes, b"jpeg-bytes");
        assert!(file.filename.ends_with(".jpg"));
        assert_eq!(file.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    /// 本地文件读取失败报告为文件错误，而不是传输错误。
    async fn test_read_missing_file_is_io_error() {
        let path = std::env::temp_dir().join(format!("card_viewer_missing_{}.png", std::process::id()));
        match SelectedFile::read(&path).await {
            Err(AppError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("预期 AppError::Io，实际: {:?}", other),
        }
    }
}
