//! Streaming re-formatting of the agent's stdout.
//!
//! The agent emits newline-delimited JSON events, but chunks arrive at
//! arbitrary byte boundaries. Formatting works per chunk: each complete
//! line that parses as JSON is re-emitted pretty-printed, everything else
//! passes through verbatim. The raw bytes are what get accumulated and
//! persisted; formatting only affects the live console view.

use std::pin::Pin;

use futures::Stream;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;

const READ_BUF_SIZE: usize = 8192;

/// Expose the agent's stdout as a stream of raw byte chunks.
///
/// The stream ends at EOF. A read error is logged and also ends the
/// stream; it never fails the run.
pub fn chunk_stream(stdout: ChildStdout) -> Pin<Box<dyn Stream<Item = Vec<u8>> + Send>> {
    Box::pin(async_stream::stream! {
        let mut stdout = stdout;
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield buf[..n].to_vec(),
                Err(e) => {
                    tracing::warn!(error = %e, "error reading agent stdout");
                    break;
                }
            }
        }
    })
}

/// Re-format one stdout chunk for display.
///
/// Splits on newlines, drops whitespace-only segments, pretty-prints
/// segments that parse as JSON (2-space indent) and passes the rest
/// through unchanged. A newline follows every segment except the last,
/// which gets one only if the chunk itself ended with a newline. That
/// keeps the displayed stream's trailing-newline shape identical to the
/// source chunk's.
pub fn format_chunk(chunk: &str) -> String {
    let segments: Vec<&str> = chunk.split('\n').collect();
    let last = segments.len() - 1;
    let ends_with_newline = chunk.ends_with('\n');

    let mut formatted = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if segment.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(segment) {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(pretty) => formatted.push_str(&pretty),
                Err(_) => formatted.push_str(segment),
            },
            Err(_) => formatted.push_str(segment),
        }
        if i < last || ends_with_newline {
            formatted.push('\n');
        }
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_are_pretty_printed() {
        let out = format_chunk("{\"ok\":true,\"type\":\"result\"}\n");
        assert_eq!(out, "{\n  \"ok\": true,\n  \"type\": \"result\"\n}\n");
    }

    #[test]
    fn formatting_preserves_the_logical_value() {
        let input = r#"{"a":[1,2,{"b":null}],"c":"d"}"#;
        let out = format_chunk(input);
        let reparsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        let original: serde_json::Value = serde_json::from_str(input).unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn non_json_lines_pass_through_verbatim() {
        assert_eq!(format_chunk("plain progress text\n"), "plain progress text\n");
        assert_eq!(format_chunk("{not json"), "{not json");
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(format_chunk("\n"), "");
        assert_eq!(format_chunk("   \n\n  \n"), "");
    }

    #[test]
    fn mixed_chunk_formats_each_line_independently() {
        let out = format_chunk("{\"a\":1}\nnot json\n");
        assert_eq!(out, "{\n  \"a\": 1\n}\nnot json\n");
    }

    #[test]
    fn partial_trailing_line_gets_no_newline() {
        let out = format_chunk("{\"a\":1}\n{\"partial\":");
        assert_eq!(out, "{\n  \"a\": 1\n}\n{\"partial\":");
    }

    #[test]
    fn trailing_newline_presence_is_preserved() {
        assert!(format_chunk("{\"a\":1}\n").ends_with('\n'));
        assert!(!format_chunk("{\"a\":1}").ends_with('\n'));
    }

    #[test]
    fn bare_json_scalars_still_format() {
        assert_eq!(format_chunk("42\n"), "42\n");
        assert_eq!(format_chunk("\"text\"\n"), "\"text\"\n");
    }

    #[tokio::test]
    async fn chunk_stream_yields_child_output_to_eof() {
        use futures::StreamExt;
        use std::process::Stdio;

        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "printf 'one\\ntwo\\n'"])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();

        let mut collected = Vec::new();
        let mut chunks = chunk_stream(stdout);
        while let Some(chunk) = chunks.next().await {
            collected.extend_from_slice(&chunk);
        }
        child.wait().await.unwrap();
        assert_eq!(collected, b"one\ntwo\n");
    }
}
