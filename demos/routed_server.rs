//! The routed demo server: a handful of handlers on port 4567.
//!
//! Try it with curl:
//!
//! ```text
//! curl -i http://127.0.0.1:4567/hello
//! curl -i -d 'x' http://127.0.0.1:4567/hello
//! curl -i http://127.0.0.1:4567/whois
//! curl -i http://127.0.0.1:4567/boom
//! curl -i -X GET -d 'echo me' http://127.0.0.1:4567/getbody
//! ```

use log::info;
use webserver_rs::{HttpServer, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let server = HttpServer::new(ServerConfig::default())
        .get("/hello", |_req| async { Ok("Hello world".to_string()) })
        .post("/hello", |req| async move { Ok(format!("Hello world: {}", req.body_string())) })
        .get("/whois", |_req| async { Ok("Cody Ebberson".to_string()) })
        .get("/boom", |_req| async { Err(ServerError::InternalError("boom".to_string())) })
        // GET with a body is accepted and echoed back
        .get("/getbody", |req| async move { Ok(req.body_string()) });

    info!("Starting server on http://{}", server.config.addr);
    server.start().await?;

    Ok(())
}
