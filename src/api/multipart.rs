/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use std::io;
use std::pin::Pin;

/// Stream of body chunks handed to the transport
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Name of the form field Flickr expects the photo data in
pub const PHOTO_FIELD: &str = "photo";

/// Photo (or video) data to upload along with its declared length.
///
/// The stream is consumed as the body is sent. It is dropped if the request is
/// cancelled, so retrying an upload needs a fresh `UploadStream`.
pub struct UploadStream {
    length: u64,
    stream: ByteStream,
}

impl UploadStream {
    /// `length` is what the stream promises to yield in total
    pub fn new<S>(length: u64, stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self {
            length,
            stream: Box::pin(stream),
        }
    }

    /// Uploads an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self::new(data.len() as u64, stream::iter([Ok(data)]))
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl std::fmt::Debug for UploadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStream")
            .field("length", &self.length)
            .finish()
    }
}

/// A `multipart/form-data` body whose size is known before anything is sent
pub struct MultipartBody {
    boundary: String,
    preamble: Bytes,
    epilogue: Bytes,
    upload: UploadStream,
}

impl MultipartBody {
    /// Lays out `fields` followed by the file part carrying `upload`
    pub fn new<K, V>(fields: &[(K, V)], file_name: &str, mime_type: &str, upload: UploadStream) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let boundary = format!("----------flickr{:016x}", rand::random::<u64>());

        let mut preamble = String::new();
        for (name, value) in fields {
            preamble.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                name.as_ref(),
                value.as_ref()
            ));
        }
        preamble.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{PHOTO_FIELD}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_quotes(file_name),
            mime_type
        ));
        let epilogue = format!("\r\n--{boundary}--\r\n");

        Self {
            boundary,
            preamble: Bytes::from(preamble),
            epilogue: Bytes::from(epilogue),
            upload,
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Total body size including the upload's declared length
    pub fn len(&self) -> u64 {
        self.preamble.len() as u64 + self.upload.length + self.epilogue.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole body as one stream: fields, file data, closing boundary
    pub fn into_stream(self) -> ByteStream {
        let head = stream::iter([Ok(self.preamble)]);
        let tail = stream::iter([Ok(self.epilogue)]);
        Box::pin(head.chain(self.upload.stream).chain(tail))
    }
}

impl std::fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("len", &self.len())
            .finish()
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "%22")
}
