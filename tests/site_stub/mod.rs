use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Static pages served by path; anything else is a 404.
pub struct SiteStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SiteStub {
    pub fn spawn(pages: &[(&str, &str, &str)]) -> Self {
        let pages: HashMap<String, (String, String)> = pages
            .iter()
            .map(|(path, content_type, body)| {
                (
                    (*path).to_owned(),
                    ((*content_type).to_owned(), (*body).to_owned()),
                )
            })
            .collect();

        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or(&url).to_owned();
                let Some((content_type, body)) = pages.get(&path) else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                        .expect("build header");
                let response = tiny_http::Response::from_string(body.clone())
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

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for SiteStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(dead_code)]
pub const HTML: &str = "text/html; charset=utf-8";
#[allow(dead_code)]
pub const XML: &str = "application/xml";

#[allow(dead_code)]
pub fn article(title: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head><title>{title}</title></head>
  <body>
    <nav><a href="/">Home</a></nav>
    <article>
      <h1>{title}</h1>
      <p>This paragraph explains the {title} page in enough words to clear every word count floor the filter applies.</p>
      <p><img src="/img/{title}.png" alt="{title}"></p>
    </article>
  </body>
</html>
"#
    )
}
