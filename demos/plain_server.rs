//! A server without routes: every request goes to one fallback handler.
//!
//! `/404` answers 404, paths starting with `/json` answer a fixed JSON
//! document, anything else echoes the requested path.

use serde::Serialize;
use webserver_rs::{HttpResponse, HttpServer, ServerConfig, StatusCode};

#[derive(Serialize)]
struct Test {
    foo: &'static str,
}

#[derive(Serialize)]
struct Payload {
    ok: bool,
    test: Test,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let server = HttpServer::new(ServerConfig::default().with_port(8080)).fallback(|req| async move {
        if req.path == "/404" {
            Ok(HttpResponse::plain(StatusCode::NotFound, "not found what what"))
        } else if req.path.starts_with("/json") {
            HttpResponse::new(StatusCode::Ok).with_json(&Payload {
                ok: true,
                test: Test { foo: "bar" },
            })
        } else {
            Ok(HttpResponse::plain(StatusCode::Ok, format!("You requested: {}", req.path)))
        }
    });

    server.start().await?;

    Ok(())
}
