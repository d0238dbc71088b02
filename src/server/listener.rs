//! Newline-delimited JSON over TCP. One task per connection; each request is
//! handled on the blocking pool so storage flushes and collaborator calls
//! never stall the runtime.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::game::errors::ErrorKind;
use crate::server::context::GameContext;
use crate::server::messages::{encode_line, ServerMessage};
use crate::server::session::GameSession;
use crate::validation::InputError;

/// Accept connections until the listener fails. Connections beyond
/// `server.max_connections` receive an error line and are closed.
pub async fn serve(ctx: GameContext, listener: TcpListener) -> Result<()> {
    let slots = Arc::new(Semaphore::new(ctx.config.server.max_connections));
    info!("listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let permit = match slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("connection limit reached, refusing {}", peer);
                tokio::spawn(refuse(stream));
                continue;
            }
        };
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(ctx, stream, peer).await {
                warn!("connection {} ended with error: {}", peer, e);
            }
        });
    }
}

async fn refuse(mut stream: TcpStream) {
    let msg = ServerMessage::error(ErrorKind::Unavailable, "Server is full, try again later.");
    let _ = stream.write_all(encode_line(&msg).as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Read a line of at most `max` bytes. `Ok(None)` on end of stream,
/// `Ok(Some(false))` when the line was too long and has been skipped.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> Result<Option<bool>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = max as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(None);
    }
    let terminated = buf.last() == Some(&b'\n');
    if terminated || buf.len() <= max {
        return Ok(Some(true));
    }
    // Oversized: discard up to and including the next newline.
    loop {
        buf.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if n == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(Some(false))
}

pub async fn handle_connection(ctx: GameContext, stream: TcpStream, peer: SocketAddr) -> Result<()> {
    let conn_id = Uuid::new_v4().to_string();
    let max = ctx.config.server.max_frame_bytes;
    info!("[{}] connected from {}", conn_id, peer);

    let (rd, mut wr) = stream.into_split();
    let mut rd = BufReader::new(rd);
    wr.write_all(encode_line(&ServerMessage::connected()).as_bytes()).await?;

    let mut session = GameSession::new(ctx, conn_id.clone());
    let mut buf = Vec::with_capacity(1024);
    while let Some(fits) = read_frame(&mut rd, &mut buf, max).await? {
        if !fits {
            warn!("[{}] dropped frame over {} bytes", conn_id, max);
            let msg = ServerMessage::invalid_input(InputError::FrameTooLarge { limit: max }.to_string());
            wr.write_all(encode_line(&msg).as_bytes()).await?;
            continue;
        }
        let line = String::from_utf8_lossy(&buf).trim().to_string();
        if line.is_empty() {
            continue;
        }

        let (returned, replies) = tokio::task::spawn_blocking(move || {
            let replies = session.handle_line(&line);
            (session, replies)
        })
        .await?;
        session = returned;

        for reply in &replies {
            debug!("[{}] -> {:?}", conn_id, reply.kind);
            wr.write_all(encode_line(reply).as_bytes()).await?;
        }
    }

    info!(
        "[{}] {} disconnected{}",
        conn_id,
        peer,
        session.player_id().map(|p| format!(" ({p})")).unwrap_or_default()
    );
    Ok(())
}
