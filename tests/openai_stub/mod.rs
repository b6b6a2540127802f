use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// Answers `/v1/responses` by recognising which kind of request the
/// instructions describe.
pub struct OpenAiStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenAiStub {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post || path != "/v1/responses" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let instructions = parsed
                    .get("instructions")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let input = parsed
                    .get("input")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();

                let Some(output_text) = reply(instructions, input) else {
                    let _ = request.respond(
                        tiny_http::Response::from_string(
                            r#"{"error":{"message":"unknown prompt mode"}}"#,
                        )
                        .with_status_code(400),
                    );
                    continue;
                };

                let response_body = serde_json::json!({
                    "id": "resp_stub",
                    "object": "response",
                    "output": [
                        {
                            "type": "message",
                            "role": "assistant",
                            "content": [
                                { "type": "output_text", "text": output_text }
                            ]
                        }
                    ]
                });

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(200)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn reply(instructions: &str, input: &str) -> Option<String> {
    if instructions.contains("section headings") {
        let heading = extract_between(input, "Heading: ", "\n")?;
        let (labels, scores) = if heading.contains("History") {
            (["Preface", "Body Text"], [0.9, 0.1])
        } else {
            (["Body Text", "Preface"], [0.8, 0.2])
        };
        return Some(serde_json::json!({ "labels": labels, "scores": scores }).to_string());
    }
    if instructions.contains("study questions") {
        return Some("Questions:\n1. What does the crawler fetch?\n2. Why are sections pruned?".to_owned());
    }
    if instructions.starts_with("Answer the question") {
        let question = input.rsplit("Question: ").next()?;
        return Some(format!("Stub answer to: {question}"));
    }
    if instructions.starts_with("Summarize") || instructions.starts_with("Combine") {
        return Some("Stub summary.".to_owned());
    }
    None
}

fn extract_between<'a>(text: &'a str, begin: &str, end: &str) -> Option<&'a str> {
    let start = text.find(begin)? + begin.len();
    let rest = &text[start..];
    let end_rel = rest.find(end)?;
    Some(&rest[..end_rel])
}
