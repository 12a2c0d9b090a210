//! Streaming translation through the generate-content API.
//!
//! The service answers with server-sent events. Every `data:` payload is a
//! JSON response chunk whose candidate parts carry the next slice of text.
//! Fragments are yielded in arrival order and written straight to disk by
//! [`write_stream`].

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ApiKey, TranslatorConfig};
use crate::error::CoreError;
use crate::prompt::TranslationRequest;

pub trait Translator {
    type Stream: Iterator<Item = Result<String, CoreError>>;

    fn translate(&self, request: &TranslationRequest) -> Result<Self::Stream, CoreError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct ResponseChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(request: &'a TranslationRequest, temperature: f32) -> Self {
        Self {
            contents: [Content {
                role: Some("user"),
                parts: [Part {
                    text: &request.payload,
                }],
            }],
            system_instruction: Content {
                role: None,
                parts: [Part {
                    text: &request.system_instruction,
                }],
            },
            generation_config: GenerationConfig { temperature },
        }
    }
}

/// Client for the Vertex AI `streamGenerateContent` endpoint.
#[derive(Debug)]
pub struct VertexTranslator {
    client: Client,
    config: TranslatorConfig,
    key: ApiKey,
}

impl VertexTranslator {
    pub fn new(config: TranslatorConfig, key: ApiKey) -> Result<Self, CoreError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            key,
        })
    }
}

impl Translator for VertexTranslator {
    type Stream = SseFragments<BufReader<Response>>;

    fn translate(&self, request: &TranslationRequest) -> Result<Self::Stream, CoreError> {
        let url = self.config.stream_url();
        info!(model = %self.config.model, bytes = request.payload.len(), "requesting translation");
        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse"), ("key", self.key.expose())])
            .json(&GenerateContentRequest::new(request, self.config.temperature))
            .send()
            .map_err(|err| CoreError::Http(err.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|err| err.without_url().to_string());
            return Err(CoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        debug!(%status, "translation stream opened");
        Ok(SseFragments::new(BufReader::new(response)))
    }
}

/// Iterator over the text fragments of a server-sent-event stream.
pub struct SseFragments<R> {
    reader: R,
    line: String,
    done: bool,
}

impl<R: BufRead> SseFragments<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            done: false,
        }
    }

    /// Reads the `data` payload of the next event, joining multi-line data
    /// with `\n`. Other fields and comments are skipped.
    fn next_event(&mut self) -> Result<Option<String>, CoreError> {
        let mut data: Option<String> = None;
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(CoreError::StreamIo)?;
            if read == 0 {
                self.done = true;
                return Ok(data);
            }
            let line = self.line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if data.is_some() {
                    return Ok(data);
                }
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                let value = value.strip_prefix(' ').unwrap_or(value);
                match data.as_mut() {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for SseFragments<R> {
    type Item = Result<String, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let data = match self.next_event() {
                Ok(Some(data)) => data,
                Ok(None) => return None,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            match chunk_text(&data) {
                Ok(Some(text)) => return Some(Ok(text)),
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

/// Text of the first candidate, or `None` when the chunk carries none.
fn chunk_text(data: &str) -> Result<Option<String>, CoreError> {
    let chunk: ResponseChunk = serde_json::from_str(data)?;
    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    Ok((!text.is_empty()).then_some(text))
}

/// Writes every fragment to `path` as it arrives and returns the byte count.
///
/// The first error fragment stops the write; whatever arrived before it stays
/// on disk.
pub fn write_stream<I>(fragments: I, path: &Path) -> Result<u64, CoreError>
where
    I: IntoIterator<Item = Result<String, CoreError>>,
{
    let output_err = |source| CoreError::OutputIo {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(output_err)?;
        }
    }
    let mut file = File::create(path).map_err(output_err)?;
    let mut written = 0u64;
    for fragment in fragments {
        let fragment = fragment?;
        file.write_all(fragment.as_bytes()).map_err(output_err)?;
        file.flush().map_err(output_err)?;
        written += fragment.len() as u64;
    }
    debug!(path = %path.display(), bytes = written, "stream written");
    Ok(written)
}
