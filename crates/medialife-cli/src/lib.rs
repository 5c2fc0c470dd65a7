//! Helpers for the `medialife` binary.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use futures::{stream, Stream, StreamExt};
use medialife_core::constants::STREAM_BUFFER_SIZE;
use medialife_core::AppError;
use medialife_services::{UploadChunk, UploadInfo};
use serde::Serialize;
use tokio_util::io::ReaderStream;

/// Parse repeated `key=value` arguments. Values may be empty; keys may not.
pub fn parse_metadata(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut metadata = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Metadata '{}' must look like key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Metadata '{}' has an empty key", pair);
        }
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}

/// Content type from a file extension, for the formats the service accepts by default.
pub fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

/// Name to record for an uploaded file when none is given.
pub fn file_name_of(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a file name from {}", path.display()))
}

/// Info header followed by the file contents in `STREAM_BUFFER_SIZE` pieces.
pub fn file_chunks(
    file: tokio::fs::File,
    info: UploadInfo,
) -> impl Stream<Item = Result<UploadChunk, AppError>> + Send {
    let data = ReaderStream::with_capacity(file, STREAM_BUFFER_SIZE)
        .map(|chunk| chunk.map(UploadChunk::Data).map_err(AppError::from));
    stream::once(async move { Ok(UploadChunk::Info(info)) }).chain(data)
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn metadata_pairs() {
        let parsed = parse_metadata(&["tag=foo".to_string(), "empty=".to_string()]).unwrap();
        assert_eq!(parsed.get("tag").map(String::as_str), Some("foo"));
        assert_eq!(parsed.get("empty").map(String::as_str), Some(""));

        assert!(parse_metadata(&["novalue".to_string()]).is_err());
        assert!(parse_metadata(&["=x".to_string()]).is_err());
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(guess_mime(Path::new("a/b/Photo.JPG")), Some("image/jpeg"));
        assert_eq!(guess_mime(Path::new("clip.mov")), Some("video/quicktime"));
        assert_eq!(guess_mime(Path::new("README")), None);
        assert_eq!(guess_mime(Path::new("x.unknown")), None);
    }

    #[test]
    fn file_name_from_path() {
        assert_eq!(file_name_of(Path::new("/tmp/a.png")).unwrap(), "a.png");
        assert!(file_name_of(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn file_is_streamed_after_info() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let payload = vec![7u8; STREAM_BUFFER_SIZE + 10];
        file.write_all(&payload).unwrap();

        let handle = tokio::fs::File::open(file.path()).await.unwrap();
        let chunks: Vec<UploadChunk> = file_chunks(
            handle,
            UploadInfo {
                file_name: "a.bin".to_string(),
                created_by: "u1".to_string(),
                ..UploadInfo::default()
            },
        )
        .map(|c| c.unwrap())
        .collect()
        .await;

        assert!(matches!(&chunks[0], UploadChunk::Info(info) if info.file_name == "a.bin"));
        let total: usize = chunks[1..]
            .iter()
            .map(|c| match c {
                UploadChunk::Data(bytes) => bytes.len(),
                UploadChunk::Info(_) => panic!("info sent twice"),
            })
            .sum();
        assert_eq!(total, payload.len());
        assert!(chunks.len() >= 3);
    }
}
