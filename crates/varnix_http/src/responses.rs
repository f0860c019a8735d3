use tokio::io::AsyncWriteExt;

use crate::ClientStream;

/// Generic helper to send an HTTP response with a binary body.
pub async fn send_response(
    stream: &mut dyn ClientStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> anyhow::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Server: varnix/0.1.0\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );

    stream.write_all(response.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

/// Helper for plain text responses.
async fn send_text_response(
    stream: &mut dyn ClientStream,
    status: &str,
    body: &str,
) -> anyhow::Result<()> {
    send_response(stream, status, "text/plain; charset=utf-8", body.as_bytes()).await
}

pub async fn send_400(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "400 Bad Request", "400 Bad Request\n").await
}

pub async fn send_408(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "408 Request Timeout", "408 Request Timeout\n").await
}

pub async fn send_413(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "413 Payload Too Large", "413 Payload Too Large\n").await
}

pub async fn send_431(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(
        stream,
        "431 Request Header Fields Too Large",
        "431 Request Header Fields Too Large\n",
    )
    .await
}

pub async fn send_500(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(
        stream,
        "500 Internal Server Error",
        "Internal Server Error\n",
    )
    .await
}

/// 500 with a caller-supplied detail line in the body.
pub async fn send_500_message(stream: &mut dyn ClientStream, detail: &str) -> anyhow::Result<()> {
    let body = format!("{detail}\n");
    send_text_response(stream, "500 Internal Server Error", &body).await
}
