//! Plugin server loop
//!
//! Prints the handshake, then answers newline-delimited JSON requests until
//! `stop_provider` or end of input. Stdout carries only protocol traffic.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::protocol::{Diagnostic, DiagnosticsResponse, Request, Response, HANDSHAKE};
use crate::provider::AviatrixProvider;

/// Serve requests from `reader`, writing responses to `writer`
pub async fn serve<R, W>(provider: &AviatrixProvider, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{}\n", HANDSHAKE).as_bytes()).await?;
    writer.flush().await?;
    info!("Handshake sent, serving requests");

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (response, stop) = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let stop = matches!(request, Request::StopProvider);
                (provider.handle(request).await, stop)
            }
            Err(e) => {
                warn!("Malformed request: {}", e);
                let response = Response::Error(DiagnosticsResponse {
                    diagnostics: vec![Diagnostic::error("Malformed request", e.to_string())],
                });
                (response, false)
            }
        };

        if !response.diagnostics().is_empty() {
            debug!("Responding with {} diagnostics", response.diagnostics().len());
        }

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;

        if stop {
            break;
        }
    }

    info!("Provider shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::io::BufReader;

    async fn run(input: &str) -> Vec<String> {
        let provider = AviatrixProvider::new();
        let mut output = Vec::new();
        serve(&provider, BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_handshake_then_responses() {
        let lines = run("{\"method\":\"get_provider_schema\"}\n").await;

        assert_eq!(lines[0], HANDSHAKE);
        let response: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(response["method"], "get_provider_schema");
        assert!(response["resource_schemas"]
            .get("aviatrix_branch_router_transit_gateway_attachment")
            .is_some());
    }

    #[tokio::test]
    async fn test_malformed_line_gets_error_response() {
        let lines = run("not json\n\n{\"method\":\"stop_provider\"}\n").await;

        assert_eq!(lines.len(), 3);
        let response: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(response["method"], "error");
        assert_eq!(response["diagnostics"][0]["summary"], "Malformed request");
    }

    #[tokio::test]
    async fn test_stop_ends_the_loop() {
        let lines = run(
            "{\"method\":\"stop_provider\"}\n{\"method\":\"get_provider_schema\"}\n",
        )
        .await;

        assert_eq!(lines.len(), 2);
        let response: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(response["method"], "stop_provider");
    }
}
