//! Decode a burst of pipelined requests the way a connection does.

use webserver_rs::{parse_request, DecoderLimits, RequestDecoder};

fn main() {
    let mut buf = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n\
        POST /hello HTTP/1.1\r\nHost: example.com\r\nTransfer-Encoding: chunked\r\n\r\n\
        5\r\nhello\r\n0\r\n\r\n\
        GET /bye HTTP/1.0\r\n\r\n"
        .to_vec();

    let mut decoder = RequestDecoder::new(DecoderLimits::default());
    loop {
        match decoder.decode(&mut buf) {
            Ok(Some(request)) => {
                println!(
                    "{} {} {} body={:?} keep-alive={}",
                    request.method,
                    request.path,
                    request.version,
                    request.body_string(),
                    request.is_keep_alive()
                );
            }
            Ok(None) => break,
            Err(err) => {
                println!("Error decoding request: {}", err);
                break;
            }
        }
    }

    // A single head can also be parsed directly
    let invalid_request = b"INVALID /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
    match parse_request(invalid_request) {
        Ok(_) => println!("\nUnexpectedly parsed invalid request!"),
        Err(err) => println!("\nExpected error parsing invalid request: {}", err),
    }
}
