//! HTTP gateway to the agent backend.
//!
//! One turn opens one chunked response; the byte stream is re-framed into
//! lines, fed through [`FrameParser`], and handed downstream as
//! [`RelayEvent`]s. A non-streaming counterpart returns the complete
//! message in one round trip.

use std::pin::Pin;

use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use reqwest::Client;

use crate::error::RelayError;
use crate::models::{ChatMessage, TurnRequest};

use super::frame::RelayEvent;
use super::parser::FrameParser;

/// Client for the agent backend's turn endpoints.
pub struct AgentClient {
    /// Base URL for the agent API
    pub base_url: String,
    /// Reusable HTTP client
    client: Client,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    /// Open a streaming turn.
    ///
    /// Sends `POST /v1/stream` and returns the decoded frame sequence.
    /// Frames are yielded strictly in arrival order; the only buffering is
    /// what it takes to assemble one frame from transport chunks.
    pub async fn stream(
        &self,
        request: &TurnRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<RelayEvent, RelayError>> + Send>>, RelayError>
    {
        let url = format!("{}/v1/stream", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RelayError::Status { status, message });
        }

        let bytes_stream = response.bytes_stream();

        let event_stream = stream::unfold(
            (bytes_stream, FrameParser::new(), String::new()),
            |(mut bytes_stream, mut parser, mut buffer)| async move {
                loop {
                    // Process any complete line already buffered
                    if let Some(newline_pos) = buffer.find('\n') {
                        let line = buffer[..newline_pos].trim_end_matches('\r').to_string();
                        buffer = buffer[newline_pos + 1..].to_string();

                        match parser.feed_line(&line) {
                            Ok(Some(event)) => {
                                return Some((Ok(event), (bytes_stream, parser, buffer)));
                            }
                            Ok(None) => continue,
                            Err(err) => {
                                return Some((
                                    Err(RelayError::Parse(err)),
                                    (bytes_stream, parser, buffer),
                                ));
                            }
                        }
                    }

                    // Need more data from the transport
                    match bytes_stream.next().await {
                        Some(Ok(chunk)) => {
                            if let Ok(text) = String::from_utf8(chunk.to_vec()) {
                                buffer.push_str(&text);
                            }
                        }
                        Some(Err(err)) => {
                            return Some((
                                Err(RelayError::Http(err)),
                                (bytes_stream, parser, buffer),
                            ));
                        }
                        None => {
                            // Transport closed: flush any trailing line,
                            // then any half-assembled frame
                            if !buffer.is_empty() {
                                let line = buffer.trim_end_matches('\r').to_string();
                                buffer.clear();
                                match parser.feed_line(&line) {
                                    Ok(Some(event)) => {
                                        return Some((
                                            Ok(event),
                                            (bytes_stream, parser, buffer),
                                        ));
                                    }
                                    Ok(None) => {}
                                    Err(err) => {
                                        return Some((
                                            Err(RelayError::Parse(err)),
                                            (bytes_stream, parser, buffer),
                                        ));
                                    }
                                }
                            }
                            match parser.finish() {
                                Ok(Some(event)) => {
                                    return Some((Ok(event), (bytes_stream, parser, buffer)));
                                }
                                _ => return None,
                            }
                        }
                    }
                }
            },
        );

        Ok(Box::pin(event_stream))
    }

    /// Run a turn without streaming.
    ///
    /// Sends `POST /v1/invoke` and returns the single complete message.
    /// Feeding the result through the assembler yields the same final
    /// timeline state the streaming form produces.
    pub async fn invoke(&self, request: &TurnRequest) -> Result<ChatMessage, RelayError> {
        let url = format!("{}/v1/invoke", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RelayError::Status { status, message });
        }

        let message: ChatMessage = serde_json::from_slice(&response.bytes().await?)?;
        Ok(message)
    }
}
